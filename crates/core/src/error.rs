use thiserror::Error;

use crate::model::{ContentError, HistoryError, PracticeError};
use crate::scheduler::SchedulerError;

/// Umbrella error for callers that do not care which domain rule failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Practice(#[from] PracticeError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
