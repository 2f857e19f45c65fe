use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::time::seconds_f64;

/// Drill throughput band, by answers per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTier {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Master,
}

impl SpeedTier {
    /// <20 Beginner, 20–29 Intermediate, 30–44 Advanced, 45–59 Expert, ≥60 Master.
    #[must_use]
    pub fn from_rate(per_minute: f64) -> Self {
        match per_minute {
            r if r >= 60.0 => Self::Master,
            r if r >= 45.0 => Self::Expert,
            r if r >= 30.0 => Self::Advanced,
            r if r >= 20.0 => Self::Intermediate,
            _ => Self::Beginner,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
            Self::Expert => "Expert",
            Self::Master => "Master",
        }
    }
}

impl fmt::Display for SpeedTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Answers per minute of active time; 0 when no time has elapsed.
#[must_use]
pub fn answers_per_minute(answered: u32, active: Duration) -> f64 {
    let minutes = seconds_f64(active) / 60.0;
    if minutes <= 0.0 {
        return 0.0;
    }
    f64::from(answered) / minutes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_answers_in_five_minutes_is_beginner() {
        let rate = answers_per_minute(10, Duration::seconds(300));
        assert!((rate - 2.0).abs() < f64::EPSILON);
        assert_eq!(SpeedTier::from_rate(rate), SpeedTier::Beginner);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(SpeedTier::from_rate(19.9), SpeedTier::Beginner);
        assert_eq!(SpeedTier::from_rate(20.0), SpeedTier::Intermediate);
        assert_eq!(SpeedTier::from_rate(30.0), SpeedTier::Advanced);
        assert_eq!(SpeedTier::from_rate(45.0), SpeedTier::Expert);
        assert_eq!(SpeedTier::from_rate(60.0), SpeedTier::Master);
        assert!(SpeedTier::Master > SpeedTier::Advanced);
    }

    #[test]
    fn zero_elapsed_gives_zero_rate() {
        assert_eq!(answers_per_minute(5, Duration::zero()), 0.0);
        assert_eq!(answers_per_minute(5, Duration::seconds(-3)), 0.0);
    }
}
