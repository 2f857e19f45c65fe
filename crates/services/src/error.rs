//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::model::{HistoryError, PracticeError};

/// Invalid collector or practice configuration.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
    #[error("flush interval must be greater than zero")]
    ZeroFlushInterval,
    #[error("session duration must be greater than zero")]
    ZeroSessionDuration,
    #[error("target rate must be a positive number, got {0}")]
    InvalidTargetRate(f64),
    #[error("penalty fraction must be within [0, 1], got {0}")]
    InvalidPenaltyFraction(f64),
    #[error("{var} has an invalid value: {value:?}")]
    Env { var: &'static str, value: String },
}

/// Errors emitted by an `EventSink`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    #[error("ingestion endpoint returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("sink rejected the batch: {0}")]
    Rejected(String),
}

/// Errors emitted by the telemetry collector.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("delivery of {events} events failed; they were re-queued")]
    Delivery {
        events: usize,
        #[source]
        source: SinkError,
    },
    #[error("flush worker stopped unexpectedly")]
    WorkerStopped,
}

/// Errors emitted by review, drill and quiz sessions.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no cards or questions available for session")]
    Empty,
    #[error("session already completed")]
    Completed,
    #[error("session is not paused")]
    NotPaused,
    #[error(transparent)]
    Practice(#[from] PracticeError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
