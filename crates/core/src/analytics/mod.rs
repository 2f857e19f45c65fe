//! Streak, topic and mode analytics over a practice history.
//!
//! [`aggregate`] is a pure function of the history slice and a
//! [`ReportContext`]; it never fails and returns a zero report for an empty
//! history.

mod insights;
mod range;
mod streak;
mod topics;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{PracticeSession, percent};
use crate::time::calendar_day;

pub use insights::{
    CONSISTENT_STREAK_DAYS, EXCELLENT_SCORE, Insight, InsightKind, NOTABLE_TREND_POINTS,
    SHORT_SESSION_SECONDS, STRUGGLING_SCORE,
};
pub use range::{TimeRange, TimeRangeError};
pub use streak::LearningStreak;
pub use topics::{ModePerformance, TopicAnalytics, improvement, mode_breakdown, topic_breakdown};

//
// ─── CONTEXT ───────────────────────────────────────────────────────────────────
//

/// When and where a report is computed.
///
/// `offset` decides which calendar day a session falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportContext {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
    pub range: TimeRange,
}

impl ReportContext {
    /// Context in UTC.
    #[must_use]
    pub fn new(now: DateTime<Utc>, range: TimeRange) -> Self {
        Self {
            now,
            offset: Utc.fix(),
            range,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        calendar_day(self.now, self.offset)
    }
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

/// Totals across the sessions inside the reporting window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSummary {
    pub session_count: u32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    /// Mean of per-session scores, in percent.
    pub average_score: f64,
    /// Pooled correct over answered, in percent.
    pub accuracy: f64,
    pub total_time_seconds: u64,
    pub average_session_seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub range: TimeRange,
    pub streak: LearningStreak,
    pub summary: PracticeSummary,
    pub topics: Vec<TopicAnalytics>,
    pub modes: Vec<ModePerformance>,
    pub insights: Vec<Insight>,
}

impl AnalyticsReport {
    /// Topics with the lowest average score first, at most `n`.
    #[must_use]
    pub fn weakest_topics(&self, n: usize) -> Vec<&TopicAnalytics> {
        let mut topics: Vec<&TopicAnalytics> = self.topics.iter().collect();
        topics.sort_by(|a, b| a.average_score.total_cmp(&b.average_score));
        topics.truncate(n);
        topics
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.session_count == 0 && self.streak.longest == 0
    }
}

/// Build a report over the host's history.
///
/// The streak looks at the whole history; topics, modes and the summary only
/// at sessions whose start falls inside `ctx.range`.
#[must_use]
pub fn aggregate(history: &[PracticeSession], ctx: &ReportContext) -> AnalyticsReport {
    let streak = LearningStreak::from_sessions(history, ctx.today(), ctx.offset);

    let in_range: Vec<&PracticeSession> = history
        .iter()
        .filter(|s| ctx.range.contains(s.start_time(), ctx.now))
        .collect();

    let summary = summarize(&in_range);
    let topics = topic_breakdown(&in_range);
    let modes = mode_breakdown(&in_range);
    let insights = insights::derive_insights(&summary, &streak, &topics, !history.is_empty());

    tracing::debug!(
        range = %ctx.range,
        sessions = summary.session_count,
        topics = topics.len(),
        streak = streak.current,
        "analytics report aggregated"
    );

    AnalyticsReport {
        range: ctx.range,
        streak,
        summary,
        topics,
        modes,
        insights,
    }
}

fn summarize(sessions: &[&PracticeSession]) -> PracticeSummary {
    let session_count = u32::try_from(sessions.len()).unwrap_or(u32::MAX);
    let questions_answered = sessions
        .iter()
        .fold(0u32, |acc, s| acc.saturating_add(s.answered_count()));
    let correct_answers = sessions
        .iter()
        .fold(0u32, |acc, s| acc.saturating_add(s.correct_count()));
    let total_time_seconds = sessions
        .iter()
        .fold(0u64, |acc, s| acc.saturating_add(s.time_spent_seconds()));
    let scores: Vec<f64> = sessions.iter().map(|s| s.score_percent()).collect();

    #[allow(clippy::cast_precision_loss)]
    let average_session_seconds = if sessions.is_empty() {
        0.0
    } else {
        total_time_seconds as f64 / f64::from(session_count)
    };

    PracticeSummary {
        session_count,
        questions_answered,
        correct_answers,
        average_score: topics::mean(&scores),
        accuracy: percent(correct_answers, questions_answered),
        total_time_seconds,
        average_session_seconds,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnswerRecord, Difficulty, PracticeMode, PracticeQuestion, QuestionId,
    };
    use crate::time::fixed_now;
    use chrono::Duration;

    fn session(
        mode: PracticeMode,
        topic: &str,
        correct: u32,
        total: u32,
        started: DateTime<Utc>,
        minutes: i64,
    ) -> PracticeSession {
        let questions = (0..total)
            .map(|i| {
                PracticeQuestion::free_text(QuestionId::new(u64::from(i)), "q", "a", topic, 1)
                    .unwrap()
            })
            .collect();
        let mut s = PracticeSession::start(mode, questions, Difficulty::default(), started);
        for i in 0..total {
            s.record_answer(AnswerRecord {
                question_id: QuestionId::new(u64::from(i)),
                topic: topic.into(),
                correct: i < correct,
                response_ms: 1_500,
                points_awarded: u32::from(i < correct),
                answered_at: started,
            })
            .unwrap();
        }
        s.complete(started + Duration::minutes(minutes), Duration::minutes(minutes))
            .unwrap();
        s
    }

    #[test]
    fn empty_history_yields_zero_report() {
        let report = aggregate(&[], &ReportContext::new(fixed_now(), TimeRange::AllTime));
        assert!(report.is_empty());
        assert_eq!(report.summary, PracticeSummary::default());
        assert!(report.topics.is_empty());
        assert!(report.insights.is_empty());
    }

    #[test]
    fn streak_uses_whole_history_topics_use_range() {
        let now = fixed_now();
        let history = vec![
            session(PracticeMode::Quiz, "old", 5, 10, now - Duration::days(40), 10),
            session(PracticeMode::Quiz, "rust", 8, 10, now - Duration::days(1), 10),
            session(PracticeMode::SpeedDrill, "rust", 10, 10, now, 10),
        ];
        let report = aggregate(&history, &ReportContext::new(now, TimeRange::Last7Days));

        assert_eq!(report.streak.current, 2);
        assert_eq!(report.summary.session_count, 2);
        assert_eq!(report.topics.len(), 1);

        let rust = &report.topics[0];
        assert_eq!(rust.topic, "rust");
        assert_eq!(rust.session_count, 2);
        assert!((rust.average_score - 90.0).abs() < 1e-9);
        assert!((rust.improvement - 20.0).abs() < 1e-9);
        assert!((rust.time_spent_seconds - 1200.0).abs() < 1e-9);
        assert_eq!(rust.last_practiced_at, now);

        let modes: Vec<PracticeMode> = report.modes.iter().map(|m| m.mode).collect();
        assert_eq!(modes, vec![PracticeMode::SpeedDrill, PracticeMode::Quiz]);
    }

    #[test]
    fn insight_rules_fire_once_each() {
        let now = fixed_now();
        let history: Vec<PracticeSession> = (0..8)
            .map(|d| session(PracticeMode::Quiz, "rust", 10, 10, now - Duration::days(d), 2))
            .collect();
        let report = aggregate(&history, &ReportContext::new(now, TimeRange::AllTime));

        let kinds: Vec<&InsightKind> = report.insights.iter().map(|i| &i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &InsightKind::Excellent,
                &InsightKind::ShortSessions,
                &InsightKind::Consistency,
                &InsightKind::SingleTopic {
                    topic: "rust".into()
                },
            ]
        );
    }

    #[test]
    fn trends_and_lapsed_streak_produce_insights() {
        let now = fixed_now();
        let history = vec![
            session(PracticeMode::Quiz, "sql", 2, 10, now - Duration::days(20), 10),
            session(PracticeMode::Quiz, "css", 9, 10, now - Duration::days(19), 10),
            session(PracticeMode::Quiz, "sql", 8, 10, now - Duration::days(10), 10),
            session(PracticeMode::Quiz, "css", 3, 10, now - Duration::days(9), 10),
        ];
        let report = aggregate(&history, &ReportContext::new(now, TimeRange::Last30Days));

        assert_eq!(report.streak.current, 0);
        assert!(report.insights.iter().any(|i| i.kind == InsightKind::RestartStreak));
        assert!(report.insights.iter().any(|i| i.kind
            == InsightKind::MostImproved {
                topic: "sql".into()
            }));
        assert!(report.insights.iter().any(|i| i.kind
            == InsightKind::Declining {
                topic: "css".into()
            }));
        assert!(report.insights.iter().any(|i| i.kind == InsightKind::RevisitFundamentals));

        let weakest: Vec<&str> = report
            .weakest_topics(1)
            .iter()
            .map(|t| t.topic.as_str())
            .collect();
        assert_eq!(weakest, vec!["sql"]);
    }

    #[test]
    fn offset_defines_the_calendar_day() {
        let now = fixed_now(); // 2023-11-14T22:13:20Z
        let history = vec![session(PracticeMode::Quiz, "rust", 1, 1, now, 1)];

        let utc = aggregate(&history, &ReportContext::new(now, TimeRange::AllTime));
        assert_eq!(utc.streak.last_active_date, NaiveDate::from_ymd_opt(2023, 11, 14));

        let east = FixedOffset::east_opt(3 * 3600).unwrap();
        let ctx = ReportContext::new(now, TimeRange::AllTime).with_offset(east);
        let shifted = aggregate(&history, &ctx);
        assert_eq!(shifted.streak.last_active_date, NaiveDate::from_ymd_opt(2023, 11, 15));
        assert_eq!(shifted.streak.current, 1);
    }
}
