use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TimeRangeError {
    #[error("unknown time range: {0}")]
    Unknown(String),
}

/// Reporting window for topic, mode and summary figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    #[default]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[serde(rename = "all")]
    AllTime,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        Self::Last7Days,
        Self::Last30Days,
        Self::Last90Days,
        Self::AllTime,
    ];

    #[must_use]
    pub fn days(self) -> Option<i64> {
        match self {
            Self::Last7Days => Some(7),
            Self::Last30Days => Some(30),
            Self::Last90Days => Some(90),
            Self::AllTime => None,
        }
    }

    /// Earliest instant inside the window ending at `now`.
    #[must_use]
    pub fn start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days().map(|days| now - Duration::days(days))
    }

    #[must_use]
    pub fn contains(self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.start(now).is_none_or(|start| at >= start)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
            Self::Last90Days => "90d",
            Self::AllTime => "all",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = TimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7d" | "week" => Ok(Self::Last7Days),
            "30d" | "month" => Ok(Self::Last30Days),
            "90d" | "quarter" => Ok(Self::Last90Days),
            "all" => Ok(Self::AllTime),
            other => Err(TimeRangeError::Unknown(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn window_boundaries() {
        let now = fixed_now();
        assert!(TimeRange::Last7Days.contains(now - Duration::days(7), now));
        assert!(!TimeRange::Last7Days.contains(now - Duration::days(8), now));
        assert!(TimeRange::AllTime.contains(now - Duration::days(5000), now));
    }

    #[test]
    fn parses_short_names() {
        assert_eq!("90D".parse::<TimeRange>(), Ok(TimeRange::Last90Days));
        assert_eq!("all".parse::<TimeRange>(), Ok(TimeRange::AllTime));
        assert_eq!(
            " Yesterday ".parse::<TimeRange>(),
            Err(TimeRangeError::Unknown("yesterday".to_owned()))
        );
        assert_eq!(
            "yesterday".parse::<TimeRange>().unwrap_err().to_string(),
            "unknown time range: yesterday"
        );
        assert_eq!(serde_json::to_string(&TimeRange::Last7Days).unwrap(), "\"7d\"");
    }
}
