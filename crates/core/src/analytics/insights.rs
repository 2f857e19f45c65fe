use serde::{Deserialize, Serialize};

use super::streak::LearningStreak;
use super::topics::TopicAnalytics;
use super::PracticeSummary;

pub const EXCELLENT_SCORE: f64 = 90.0;
pub const STRUGGLING_SCORE: f64 = 60.0;
pub const CONSISTENT_STREAK_DAYS: u32 = 7;
pub const SHORT_SESSION_SECONDS: f64 = 5.0 * 60.0;
pub const NOTABLE_TREND_POINTS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightKind {
    Excellent,
    RevisitFundamentals,
    Consistency,
    RestartStreak,
    ShortSessions,
    SingleTopic { topic: String },
    MostImproved { topic: String },
    Declining { topic: String },
}

/// A human-readable observation derived from a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(flatten)]
    pub kind: InsightKind,
    pub message: String,
}

impl Insight {
    fn new(kind: InsightKind, message: String) -> Self {
        Self { kind, message }
    }
}

/// Run the insight rules. Each rule fires at most once.
pub(crate) fn derive_insights(
    summary: &PracticeSummary,
    streak: &LearningStreak,
    topics: &[TopicAnalytics],
    has_history: bool,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    if summary.session_count > 0 {
        if summary.average_score >= EXCELLENT_SCORE {
            insights.push(Insight::new(
                InsightKind::Excellent,
                format!(
                    "Excellent work: you are averaging {:.0}% across {} sessions.",
                    summary.average_score, summary.session_count
                ),
            ));
        } else if summary.average_score < STRUGGLING_SCORE {
            insights.push(Insight::new(
                InsightKind::RevisitFundamentals,
                format!(
                    "Your average score is {:.0}%. Revisiting the fundamentals should help.",
                    summary.average_score
                ),
            ));
        }

        if summary.average_session_seconds < SHORT_SESSION_SECONDS {
            insights.push(Insight::new(
                InsightKind::ShortSessions,
                "Your sessions are short. Try practicing for at least 5 minutes at a time."
                    .to_owned(),
            ));
        }
    }

    if streak.current >= CONSISTENT_STREAK_DAYS {
        insights.push(Insight::new(
            InsightKind::Consistency,
            format!("{} days in a row. Great consistency!", streak.current),
        ));
    } else if streak.current == 0 && has_history {
        insights.push(Insight::new(
            InsightKind::RestartStreak,
            "Your streak has ended. Practice today to start a new one.".to_owned(),
        ));
    }

    if let [only] = topics {
        insights.push(Insight::new(
            InsightKind::SingleTopic {
                topic: only.topic.clone(),
            },
            format!(
                "You have only practiced {}. Mixing in another topic helps retention.",
                only.topic
            ),
        ));
    }

    let best = topics
        .iter()
        .filter(|t| t.improvement > NOTABLE_TREND_POINTS)
        .max_by(|a, b| a.improvement.total_cmp(&b.improvement));
    if let Some(best) = best {
        insights.push(Insight::new(
            InsightKind::MostImproved {
                topic: best.topic.clone(),
            },
            format!(
                "{} improved by {:.0} points. Keep it up!",
                best.topic, best.improvement
            ),
        ));
    }

    let worst = topics
        .iter()
        .filter(|t| t.improvement < -NOTABLE_TREND_POINTS)
        .min_by(|a, b| a.improvement.total_cmp(&b.improvement));
    if let Some(worst) = worst {
        insights.push(Insight::new(
            InsightKind::Declining {
                topic: worst.topic.clone(),
            },
            format!(
                "{} dropped by {:.0} points. Consider a review session.",
                worst.topic, -worst.improvement
            ),
        ));
    }

    insights
}
