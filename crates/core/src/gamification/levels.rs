//! XP thresholds and level titles.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub level: u32,
    pub xp_required: u32,
    pub title: &'static str,
}

/// Sorted by level; the first entry requires 0 XP.
pub static LEVELS: &[Level] = &[
    Level { level: 1, xp_required: 0, title: "Newcomer" },
    Level { level: 2, xp_required: 50, title: "Learner" },
    Level { level: 3, xp_required: 150, title: "Learner" },
    Level { level: 4, xp_required: 300, title: "Student" },
    Level { level: 5, xp_required: 500, title: "Student" },
    Level { level: 6, xp_required: 800, title: "Scholar" },
    Level { level: 7, xp_required: 1200, title: "Scholar" },
    Level { level: 8, xp_required: 1700, title: "Expert" },
    Level { level: 9, xp_required: 2400, title: "Expert" },
    Level { level: 10, xp_required: 3200, title: "Master" },
    Level { level: 11, xp_required: 4200, title: "Master" },
    Level { level: 12, xp_required: 5500, title: "Sage" },
];

impl Level {
    #[must_use]
    pub fn for_xp(xp: u32) -> &'static Level {
        LEVELS
            .iter()
            .rev()
            .find(|l| xp >= l.xp_required)
            .unwrap_or(&LEVELS[0])
    }

    /// Total XP needed for the level after `current_level`, `None` at the cap.
    #[must_use]
    pub fn xp_for_next(current_level: u32) -> Option<u32> {
        LEVELS
            .iter()
            .find(|l| l.level == current_level + 1)
            .map(|l| l.xp_required)
    }

    #[must_use]
    pub fn max_level() -> u32 {
        LEVELS.last().map_or(1, |l| l.level)
    }
}

/// Where a learner stands inside their current level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub total_xp: u32,
    pub level: u32,
    pub title: String,
    pub xp_into_level: u32,
    /// XP between this level and the next, `None` at max level.
    pub xp_for_next_level: Option<u32>,
    /// Progress to the next level in `[0, 1]`; 1 at max level.
    pub fraction: f64,
}

impl LevelProgress {
    #[must_use]
    pub fn for_xp(total_xp: u32) -> Self {
        let level = Level::for_xp(total_xp);
        let xp_into_level = total_xp - level.xp_required;
        let xp_for_next_level =
            Level::xp_for_next(level.level).map(|next| next - level.xp_required);
        let fraction = match xp_for_next_level {
            Some(span) if span > 0 => f64::from(xp_into_level) / f64::from(span),
            _ => 1.0,
        };

        Self {
            total_xp,
            level: level.level,
            title: level.title.to_owned(),
            xp_into_level,
            xp_for_next_level,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    #[must_use]
    pub fn is_max_level(&self) -> bool {
        self.xp_for_next_level.is_none()
    }
}

/// XP paid for practice actions.
pub struct XpRewards;

impl XpRewards {
    pub const SESSION_COMPLETED: u32 = 10;
    pub const CORRECT_ANSWER: u32 = 2;
    pub const PERFECT_SESSION: u32 = 20;
    pub const CARD_REVIEWED: u32 = 1;
    pub const VIDEO_COMPLETED: u32 = 5;

    /// Day 1 = 2 XP, day 2 = 4 XP, capped at 20.
    #[must_use]
    pub fn streak_bonus(streak_days: u32) -> u32 {
        streak_days.saturating_mul(2).min(20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_for_xp() {
        assert_eq!(Level::for_xp(0).level, 1);
        assert_eq!(Level::for_xp(49).level, 1);
        assert_eq!(Level::for_xp(50).level, 2);
        assert_eq!(Level::for_xp(1_000_000).level, Level::max_level());
    }

    #[test]
    fn progress_inside_level() {
        let p = LevelProgress::for_xp(100);
        assert_eq!(p.level, 2);
        assert_eq!(p.xp_into_level, 50);
        assert_eq!(p.xp_for_next_level, Some(100));
        assert!((p.fraction - 0.5).abs() < 1e-9);

        let top = LevelProgress::for_xp(9_999);
        assert!(top.is_max_level());
        assert_eq!(top.fraction, 1.0);
    }

    #[test]
    fn streak_bonus_is_capped() {
        assert_eq!(XpRewards::streak_bonus(1), 2);
        assert_eq!(XpRewards::streak_bonus(50), 20);
    }
}
