use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Flashcard, MAX_REPETITION_LEVEL, ReviewOutcome};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SchedulerError {
    #[error("review intervals must be strictly increasing")]
    NonIncreasingIntervals,
    #[error("lapse interval must be positive, got {seconds}s")]
    InvalidLapseInterval { seconds: i64 },
}

//
// ─── POLICY ────────────────────────────────────────────────────────────────────
//

/// What an incorrect review does to a card's repetition level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapsePolicy {
    /// Drop one level, floored at 0.
    #[default]
    StepDown,
    /// Start over at level 0.
    Reset,
}

impl LapsePolicy {
    #[must_use]
    pub fn apply(self, level: u8) -> u8 {
        match self {
            Self::StepDown => level.saturating_sub(1),
            Self::Reset => 0,
        }
    }
}

/// Days until the next review, indexed by repetition level 0..=5.
pub const DEFAULT_INTERVAL_DAYS: [i64; MAX_REPETITION_LEVEL as usize + 1] = [1, 3, 7, 14, 30, 60];

/// Same-day retry after a lapse.
pub const DEFAULT_LAPSE_MINUTES: i64 = 10;

//
// ─── SCHEDULED REVIEW ──────────────────────────────────────────────────────────
//

/// What happened to a card after an outcome was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedReview {
    pub outcome: ReviewOutcome,
    pub previous_level: u8,
    pub level: u8,
    pub next_review_due_at: Option<DateTime<Utc>>,
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Level-based spaced-repetition scheduler.
///
/// Orders a deck for review (due cards first, weakest first) and moves a
/// card's repetition level and due date after each outcome.
///
/// # Examples
///
/// ```
/// # use learn_core::scheduler::Scheduler;
/// # use learn_core::model::{CardId, Difficulty, Flashcard, ReviewOutcome};
/// let scheduler = Scheduler::new();
/// let now = chrono::Utc::now();
/// let mut card = Flashcard::new(CardId::new(1), "front", "back", "topic", Difficulty::MIN).unwrap();
///
/// let applied = scheduler.apply_outcome(&mut card, ReviewOutcome::Correct, now);
/// assert_eq!(applied.level, 1);
/// assert_eq!(card.next_review_due_at(), Some(now + chrono::Duration::days(3)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduler {
    intervals: [Duration; MAX_REPETITION_LEVEL as usize + 1],
    lapse_interval: Duration,
    lapse_policy: LapsePolicy,
}

impl Scheduler {
    /// Default intervals (1, 3, 7, 14, 30, 60 days), 10 minute lapse, step-down policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            intervals: DEFAULT_INTERVAL_DAYS.map(Duration::days),
            lapse_interval: Duration::minutes(DEFAULT_LAPSE_MINUTES),
            lapse_policy: LapsePolicy::default(),
        }
    }

    /// Build a scheduler with a custom interval table.
    ///
    /// # Errors
    ///
    /// - `NonIncreasingIntervals` unless each interval is longer than the previous
    /// - `InvalidLapseInterval` if the lapse interval is not positive
    pub fn try_with_intervals(
        intervals: [Duration; MAX_REPETITION_LEVEL as usize + 1],
        lapse_interval: Duration,
    ) -> Result<Self, SchedulerError> {
        if intervals.windows(2).any(|w| w[1] <= w[0]) || intervals[0] <= Duration::zero() {
            return Err(SchedulerError::NonIncreasingIntervals);
        }
        if lapse_interval <= Duration::zero() {
            return Err(SchedulerError::InvalidLapseInterval {
                seconds: lapse_interval.num_seconds(),
            });
        }
        Ok(Self {
            intervals,
            lapse_interval,
            lapse_policy: LapsePolicy::default(),
        })
    }

    #[must_use]
    pub fn with_lapse_policy(mut self, policy: LapsePolicy) -> Self {
        self.lapse_policy = policy;
        self
    }

    #[must_use]
    pub fn lapse_policy(&self) -> LapsePolicy {
        self.lapse_policy
    }

    /// Interval after reaching `level`; levels above the table use the last entry.
    #[must_use]
    pub fn interval(&self, level: u8) -> Duration {
        let index = usize::from(level.min(MAX_REPETITION_LEVEL));
        self.intervals[index]
    }

    /// Pick up to `session_size` cards in review order.
    ///
    /// Stable two-key order: due cards (no due date, or due at or before
    /// `now`) first, then ascending success rate inside each partition.
    #[must_use]
    pub fn schedule<'a>(
        &self,
        deck: &'a [Flashcard],
        session_size: usize,
        now: DateTime<Utc>,
    ) -> Vec<&'a Flashcard> {
        let mut ordered: Vec<&Flashcard> = deck.iter().collect();
        ordered.sort_by(|a, b| {
            b.is_due(now)
                .cmp(&a.is_due(now))
                .then_with(|| a.success_rate().total_cmp(&b.success_rate()))
        });
        ordered.truncate(session_size);
        ordered
    }

    /// Owned variant of [`Scheduler::schedule`] for building a session queue.
    #[must_use]
    pub fn schedule_owned(
        &self,
        deck: Vec<Flashcard>,
        session_size: usize,
        now: DateTime<Utc>,
    ) -> Vec<Flashcard> {
        let mut ordered = deck;
        ordered.sort_by(|a, b| {
            b.is_due(now)
                .cmp(&a.is_due(now))
                .then_with(|| a.success_rate().total_cmp(&b.success_rate()))
        });
        ordered.truncate(session_size);
        ordered
    }

    /// Apply a review outcome to a card.
    ///
    /// - Correct: level +1 (max 5), due after `interval(level)`.
    /// - Incorrect: level per [`LapsePolicy`], due after the lapse interval.
    /// - Skip: card untouched.
    pub fn apply_outcome(
        &self,
        card: &mut Flashcard,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> AppliedReview {
        let previous_level = card.repetition_level();
        match outcome {
            ReviewOutcome::Correct => {
                let level = previous_level.saturating_add(1).min(MAX_REPETITION_LEVEL);
                card.record_review(true, level, now + self.interval(level), now);
            }
            ReviewOutcome::Incorrect => {
                let level = self.lapse_policy.apply(previous_level);
                card.record_review(false, level, now + self.lapse_interval, now);
            }
            ReviewOutcome::Skip => {}
        }

        AppliedReview {
            outcome,
            previous_level,
            level: card.repetition_level(),
            next_review_due_at: card.next_review_due_at(),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
