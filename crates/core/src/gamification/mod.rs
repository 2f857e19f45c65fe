//! XP, levels, achievements and badges.

mod achievements;
mod badges;
mod engine;
mod levels;

pub use achievements::{
    AchievementCategory, AchievementDefinition, AchievementError, AchievementId,
    AchievementProgress, Rarity,
};
pub use badges::{Badge, BadgeId, newly_earned};
pub use engine::{
    GamificationEngine, GamificationEvent, LevelUp, PracticeCounters, UnlockedAchievement,
};
pub use levels::{LEVELS, Level, LevelProgress, XpRewards};
