#![forbid(unsafe_code)]

pub mod analytics_service;
pub mod config;
pub mod error;
pub mod practice;
pub mod review_session;
pub mod telemetry;

pub use learn_core::Clock;

pub use analytics_service::AnalyticsService;
pub use config::{PracticeConfig, TelemetryConfig};
pub use error::{ConfigError, SessionError, SinkError, TelemetryError};
pub use practice::{
    Countdown, CountdownEvent, DrillResult, DrillStep, PracticeHooks, PracticeResult,
    QuestionPool, Quiz, QuizOptions, QuizResult, QuizStep, ResultListener, SpeedDrill,
};
pub use review_session::{ReviewSession, ReviewSummary};
pub use telemetry::{
    EventSink, FanoutSink, FlushReport, HttpSink, RecordingSink, TelemetryCollector,
    TelemetryHandle, TracingSink,
};
