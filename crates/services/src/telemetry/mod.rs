//! Event capture, batching and delivery.

mod collector;
mod sink;

pub use collector::{FlushReport, TelemetryCollector, TelemetryHandle};
pub use sink::{EventSink, FanoutSink, HttpSink, RecordingSink, TracingSink};
