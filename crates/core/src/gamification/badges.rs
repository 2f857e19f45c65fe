use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsReport;
use crate::model::PracticeMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeId {
    /// 30 day streak.
    MonthlyStreak,
    /// Five or more topics in the reporting window.
    Polymath,
    /// Every practice mode used in the reporting window.
    AllRounder,
    /// Average score of 90% or more across at least 10 sessions.
    Sharpshooter,
    /// Ten hours of practice in the reporting window.
    Marathoner,
}

impl BadgeId {
    #[must_use]
    pub fn all() -> &'static [BadgeId] {
        &[
            Self::MonthlyStreak,
            Self::Polymath,
            Self::AllRounder,
            Self::Sharpshooter,
            Self::Marathoner,
        ]
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::MonthlyStreak => "Monthly Streak",
            Self::Polymath => "Polymath",
            Self::AllRounder => "All-Rounder",
            Self::Sharpshooter => "Sharpshooter",
            Self::Marathoner => "Marathoner",
        }
    }

    /// Whether the report satisfies this badge's condition.
    #[must_use]
    pub fn is_earned(&self, report: &AnalyticsReport) -> bool {
        match self {
            Self::MonthlyStreak => report.streak.current >= 30 || report.streak.longest >= 30,
            Self::Polymath => report.topics.len() >= 5,
            Self::AllRounder => [
                PracticeMode::Flashcards,
                PracticeMode::SpeedDrill,
                PracticeMode::Quiz,
            ]
            .iter()
            .all(|mode| report.modes.iter().any(|m| m.mode == *mode)),
            Self::Sharpshooter => {
                report.summary.session_count >= 10 && report.summary.average_score >= 90.0
            }
            Self::Marathoner => report.summary.total_time_seconds >= 10 * 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: BadgeId,
    pub unlocked_at: DateTime<Utc>,
}

/// Badges earned by a report that are not in `owned` yet.
///
/// Evaluating the same report twice against the updated set yields nothing.
#[must_use]
pub fn newly_earned(report: &AnalyticsReport, owned: &[Badge]) -> Vec<BadgeId> {
    BadgeId::all()
        .iter()
        .copied()
        .filter(|id| !owned.iter().any(|b| b.id == *id))
        .filter(|id| id.is_earned(report))
        .collect()
}
