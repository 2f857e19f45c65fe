//! Achievement definitions and per-learner unlock progress.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AchievementError {
    #[error("unknown achievement: {0}")]
    UnknownId(String),
    #[error("{id} needs {expected} to unlock, record says {found}")]
    TotalMismatch {
        id: AchievementId,
        expected: u32,
        found: u32,
    },
    #[error("{id} progress {progress} exceeds its total {total}")]
    ProgressExceedsTotal {
        id: AchievementId,
        progress: u32,
        total: u32,
    },
    #[error("{id} unlock time does not match its progress")]
    UnlockMismatch { id: AchievementId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    // sessions
    FirstSession,
    TenSessions,
    FiftySessions,

    // mastery
    PerfectSession,
    FivePerfect,

    // flashcards
    HundredCards,
    ThousandCards,

    // speed
    DrillAdvanced,
    DrillMaster,

    // streaks
    Streak3,
    Streak7,
    Streak30,
}

impl AchievementId {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstSession => "first_session",
            Self::TenSessions => "ten_sessions",
            Self::FiftySessions => "fifty_sessions",
            Self::PerfectSession => "perfect_session",
            Self::FivePerfect => "five_perfect",
            Self::HundredCards => "hundred_cards",
            Self::ThousandCards => "thousand_cards",
            Self::DrillAdvanced => "drill_advanced",
            Self::DrillMaster => "drill_master",
            Self::Streak3 => "streak_3",
            Self::Streak7 => "streak_7",
            Self::Streak30 => "streak_30",
        }
    }

    #[must_use]
    pub fn all() -> &'static [AchievementId] {
        &[
            Self::FirstSession,
            Self::TenSessions,
            Self::FiftySessions,
            Self::PerfectSession,
            Self::FivePerfect,
            Self::HundredCards,
            Self::ThousandCards,
            Self::DrillAdvanced,
            Self::DrillMaster,
            Self::Streak3,
            Self::Streak7,
            Self::Streak30,
        ]
    }

    #[must_use]
    pub fn definition(self) -> AchievementDefinition {
        use AchievementCategory as C;
        use Rarity as R;

        let (title, description, category, rarity, xp_reward, total) = match self {
            Self::FirstSession => ("First Steps", "Complete your first practice session", C::Sessions, R::Common, 10, 1),
            Self::TenSessions => ("Getting Serious", "Complete 10 practice sessions", C::Sessions, R::Common, 25, 10),
            Self::FiftySessions => ("Dedicated", "Complete 50 practice sessions", C::Sessions, R::Rare, 75, 50),
            Self::PerfectSession => ("Flawless", "Finish a session with every answer correct", C::Mastery, R::Common, 20, 1),
            Self::FivePerfect => ("Perfectionist", "Finish 5 flawless sessions", C::Mastery, R::Epic, 100, 5),
            Self::HundredCards => ("Card Shark", "Review 100 flashcards", C::Flashcards, R::Rare, 50, 100),
            Self::ThousandCards => ("Memory Palace", "Review 1000 flashcards", C::Flashcards, R::Legendary, 250, 1000),
            Self::DrillAdvanced => ("Quick Thinker", "Reach the Advanced tier in a speed drill", C::Speed, R::Rare, 40, 1),
            Self::DrillMaster => ("Lightning", "Reach the Master tier in a speed drill", C::Speed, R::Legendary, 150, 1),
            Self::Streak3 => ("Warming Up", "Practice 3 days in a row", C::Streak, R::Common, 15, 3),
            Self::Streak7 => ("On Fire", "Practice 7 days in a row", C::Streak, R::Rare, 50, 7),
            Self::Streak30 => ("Unstoppable", "Practice 30 days in a row", C::Streak, R::Legendary, 300, 30),
        };

        AchievementDefinition {
            id: self,
            title,
            description,
            category,
            rarity,
            xp_reward,
            total,
        }
    }
}

impl fmt::Display for AchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementId {
    type Err = AchievementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| AchievementError::UnknownId(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Sessions,
    Mastery,
    Flashcards,
    Speed,
    Streak,
}

impl AchievementCategory {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sessions => "Sessions",
            Self::Mastery => "Mastery",
            Self::Flashcards => "Flashcards",
            Self::Speed => "Speed",
            Self::Streak => "Streaks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// Static metadata for one achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementDefinition {
    pub id: AchievementId,
    pub title: &'static str,
    pub description: &'static str,
    pub category: AchievementCategory,
    pub rarity: Rarity,
    pub xp_reward: u32,
    /// Progress value that unlocks the achievement.
    pub total: u32,
}

/// A learner's progress towards one achievement.
///
/// `unlocked_at` flips from `None` to `Some` exactly once, when progress
/// reaches the total. Deserialization checks the same rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AchievementRecord", rename_all = "camelCase")]
pub struct AchievementProgress {
    id: AchievementId,
    progress: u32,
    total: u32,
    unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AchievementRecord {
    id: AchievementId,
    #[serde(default)]
    progress: u32,
    total: u32,
    #[serde(default)]
    unlocked_at: Option<DateTime<Utc>>,
}

impl TryFrom<AchievementRecord> for AchievementProgress {
    type Error = AchievementError;

    fn try_from(record: AchievementRecord) -> Result<Self, Self::Error> {
        let AchievementRecord {
            id,
            progress,
            total,
            unlocked_at,
        } = record;
        let expected = id.definition().total;
        if total != expected {
            return Err(AchievementError::TotalMismatch {
                id,
                expected,
                found: total,
            });
        }
        if progress > total {
            return Err(AchievementError::ProgressExceedsTotal {
                id,
                progress,
                total,
            });
        }
        if unlocked_at.is_some() != (progress >= total) {
            return Err(AchievementError::UnlockMismatch { id });
        }
        Ok(Self {
            id,
            progress,
            total,
            unlocked_at,
        })
    }
}

impl AchievementProgress {
    #[must_use]
    pub fn new(id: AchievementId) -> Self {
        Self {
            id,
            progress: 0,
            total: id.definition().total,
            unlocked_at: None,
        }
    }

    /// Raise progress to `value` (never lowers it).
    ///
    /// Returns `true` only on the call that unlocks the achievement.
    pub fn update(&mut self, value: u32, now: DateTime<Utc>) -> bool {
        self.progress = self.progress.max(value.min(self.total));
        if self.unlocked_at.is_none() && self.progress >= self.total {
            self.unlocked_at = Some(now);
            return true;
        }
        false
    }

    #[must_use]
    pub fn id(&self) -> AchievementId {
        self.id
    }

    #[must_use]
    pub fn progress(&self) -> u32 {
        self.progress
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }

    #[must_use]
    pub fn unlocked_at(&self) -> Option<DateTime<Utc>> {
        self.unlocked_at
    }

    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        f64::from(self.progress) / f64::from(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn unlock_happens_exactly_once() {
        let now = fixed_now();
        let mut p = AchievementProgress::new(AchievementId::Streak3);
        assert!(!p.update(2, now));
        assert!(p.update(3, now));
        assert!(!p.update(4, now + Duration::days(1)));
        assert_eq!(p.unlocked_at(), Some(now));
        assert_eq!(p.progress(), 3);
    }

    #[test]
    fn progress_never_goes_backwards() {
        let mut p = AchievementProgress::new(AchievementId::TenSessions);
        p.update(6, fixed_now());
        p.update(2, fixed_now());
        assert_eq!(p.progress(), 6);
        assert!((p.fraction() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn ids_round_trip_through_strings() {
        for id in AchievementId::all() {
            assert_eq!(id.as_str().parse::<AchievementId>(), Ok(*id));
            assert!(id.definition().total > 0);
        }
        assert_eq!(
            "nope".parse::<AchievementId>(),
            Err(AchievementError::UnknownId("nope".to_owned()))
        );
    }

    #[test]
    fn persisted_progress_is_validated() {
        let mut unlocked = AchievementProgress::new(AchievementId::Streak3);
        unlocked.update(3, fixed_now());
        let json = serde_json::to_string(&unlocked).unwrap();
        let back: AchievementProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unlocked);

        let parse = |json: &str| serde_json::from_str::<AchievementProgress>(json);
        assert!(parse(r#"{"id":"streak_3","progress":1,"total":3}"#).is_ok());
        // total must match the definition
        assert!(parse(r#"{"id":"streak_3","progress":1,"total":1}"#).is_err());
        assert!(parse(r#"{"id":"streak_3","progress":9,"total":3}"#).is_err());
        // complete but never unlocked
        assert!(parse(r#"{"id":"streak_3","progress":3,"total":3}"#).is_err());
        assert!(
            parse(r#"{"id":"streak_3","progress":1,"total":3,"unlockedAt":"2023-11-14T22:13:20Z"}"#)
                .is_err()
        );
    }
}
