//! Timed and scored practice modes built on the core adaptive rules.

mod countdown;
mod drill;
mod quiz;
mod result;

use std::fmt;
use std::sync::Arc;

use learn_core::model::EventPayload;

use crate::telemetry::TelemetryHandle;

pub use countdown::{Countdown, CountdownEvent};
pub use drill::{DrillStep, QuestionPool, SpeedDrill};
pub use quiz::{Quiz, QuizOptions, QuizStep};
pub use result::{DrillResult, PracticeResult, QuizResult};

/// Callback invoked once with the result of every completed practice.
pub type ResultListener = Arc<dyn Fn(&PracticeResult) + Send + Sync>;

/// Optional collaborators shared by review sessions, drills and quizzes.
#[derive(Clone, Default)]
pub struct PracticeHooks {
    telemetry: Option<TelemetryHandle>,
    listener: Option<ResultListener>,
}

impl PracticeHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetryHandle) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: impl Fn(&PracticeResult) + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub(crate) fn emit(&self, payload: EventPayload) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.track_event(payload);
        }
    }

    pub(crate) fn completed(&self, result: &PracticeResult) {
        self.emit(EventPayload::PracticeCompleted {
            practice_id: result.practice_id(),
            mode: result.mode(),
            score: result.score(),
            accuracy: result.accuracy(),
        });
        if let Some(listener) = &self.listener {
            listener(result);
        }
    }
}

impl fmt::Debug for PracticeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PracticeHooks")
            .field("telemetry", &self.telemetry.is_some())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}
