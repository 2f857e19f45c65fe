use std::collections::BTreeSet;

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::PracticeSession;
use crate::time::calendar_day;

/// Consecutive practice days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStreak {
    pub current: u32,
    pub longest: u32,
    pub last_active_date: Option<NaiveDate>,
}

impl LearningStreak {
    /// Build from the calendar days of every session start.
    ///
    /// The current streak is the run ending today or yesterday; any older
    /// run counts only towards `longest`. Days after `today` are ignored.
    #[must_use]
    pub fn from_sessions(
        sessions: &[PracticeSession],
        today: NaiveDate,
        offset: FixedOffset,
    ) -> Self {
        let days: BTreeSet<NaiveDate> = sessions
            .iter()
            .map(|s| calendar_day(s.start_time(), offset))
            .collect();
        Self::from_days(&days, today)
    }

    /// Build from a set of active calendar days. Days after `today` are
    /// ignored.
    #[must_use]
    pub fn from_days(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> Self {
        let mut longest = 0;
        let mut run = 0;
        let mut previous: Option<NaiveDate> = None;

        for day in days.range(..=today) {
            run = match previous {
                Some(prev) if prev.succ_opt() == Some(*day) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            previous = Some(*day);
        }

        let current = match previous {
            Some(last) if (today - last).num_days() <= 1 => run,
            _ => 0,
        };

        Self {
            current,
            longest,
            last_active_date: previous,
        }
    }

    /// Activity today or yesterday keeps the streak alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current > 0
    }
}
