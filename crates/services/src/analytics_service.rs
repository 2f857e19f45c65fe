use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;

use learn_core::analytics::{AnalyticsReport, ReportContext, TimeRange, aggregate};
use learn_core::model::{PracticeSession, SessionHistory};

/// Range selection for the analytics view.
///
/// Holds no practice data; every report is computed from the host's history
/// snapshot passed by reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyticsService {
    range: TimeRange,
}

impl AnalyticsService {
    #[must_use]
    pub fn new(range: TimeRange) -> Self {
        Self { range }
    }

    #[must_use]
    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn set_range(&mut self, range: TimeRange) {
        if self.range != range {
            debug!(from = %self.range, to = %range, "analytics range changed");
            self.range = range;
        }
    }

    /// Aggregate `sessions` for the selected range. `offset` defines calendar days.
    #[must_use]
    pub fn report(
        &self,
        sessions: &[PracticeSession],
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> AnalyticsReport {
        let ctx = ReportContext::new(now, self.range).with_offset(offset);
        aggregate(sessions, &ctx)
    }

    #[must_use]
    pub fn report_history(
        &self,
        history: &SessionHistory,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> AnalyticsReport {
        self.report(history.as_slice(), now, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Offset};
    use learn_core::model::{AnswerRecord, Difficulty, PracticeMode, QuestionId};
    use learn_core::time::fixed_now;

    fn closed_session(at: DateTime<Utc>, correct: bool) -> PracticeSession {
        let mut session = PracticeSession::start(PracticeMode::Quiz, Vec::new(), Difficulty::default(), at);
        session
            .record_answer(AnswerRecord {
                question_id: QuestionId::new(1),
                topic: "rust".into(),
                correct,
                response_ms: 1_000,
                points_awarded: u32::from(correct),
                answered_at: at,
            })
            .unwrap();
        session.complete(at + Duration::minutes(10), Duration::minutes(10)).unwrap();
        session
    }

    #[test]
    fn range_selection_filters_report() {
        let now = fixed_now();
        let mut history = SessionHistory::new();
        history.append(closed_session(now - Duration::days(40), false)).unwrap();
        history.append(closed_session(now - Duration::days(1), true)).unwrap();

        let mut service = AnalyticsService::default();
        assert_eq!(service.range(), TimeRange::Last30Days);
        let recent = service.report_history(&history, now, Utc.fix());
        assert_eq!(recent.summary.session_count, 1);

        service.set_range(TimeRange::AllTime);
        let all = service.report_history(&history, now, Utc.fix());
        assert_eq!(all.summary.session_count, 2);
        assert_eq!(all.streak, recent.streak);
    }

    #[test]
    fn empty_history_gives_empty_report() {
        let service = AnalyticsService::new(TimeRange::Last7Days);
        let report = service.report(&[], fixed_now(), Utc.fix());
        assert!(report.is_empty());
    }
}
