use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CardId, Difficulty};

/// Highest repetition level a card can reach.
pub const MAX_REPETITION_LEVEL: u8 = 5;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum FlashcardError {
    #[error("flashcard front cannot be empty")]
    EmptyFront,

    #[error("flashcard back cannot be empty")]
    EmptyBack,

    #[error("success rate must be within [0, 1], got {0}")]
    InvalidSuccessRate(f64),

    #[error("repetition level must be within [0, {MAX_REPETITION_LEVEL}], got {0}")]
    InvalidRepetitionLevel(u8),
}

//
// ─── REVIEW OUTCOME ────────────────────────────────────────────────────────────
//

/// Result of showing a card to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Correct,
    Incorrect,
    /// Card was passed over; it goes to the back of the queue untouched.
    Skip,
}

impl ReviewOutcome {
    #[must_use]
    pub fn from_correct(correct: bool) -> Self {
        if correct { Self::Correct } else { Self::Incorrect }
    }

    #[must_use]
    pub fn is_graded(self) -> bool {
        !matches!(self, Self::Skip)
    }
}

//
// ─── FLASHCARD ─────────────────────────────────────────────────────────────────
//

/// A reviewable card together with its spaced-repetition state.
///
/// Deserialization goes through [`Flashcard::from_persisted`], so stored
/// state that breaks a card invariant is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FlashcardRecord", rename_all = "camelCase")]
pub struct Flashcard {
    id: CardId,
    front: String,
    back: String,
    difficulty: Difficulty,
    topic: String,
    last_reviewed_at: Option<DateTime<Utc>>,
    review_count: u32,
    success_rate: f64,
    next_review_due_at: Option<DateTime<Utc>>,
    repetition_level: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlashcardRecord {
    id: CardId,
    front: String,
    back: String,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    review_count: u32,
    #[serde(default)]
    success_rate: f64,
    #[serde(default)]
    next_review_due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    repetition_level: u8,
}

impl TryFrom<FlashcardRecord> for Flashcard {
    type Error = FlashcardError;

    fn try_from(r: FlashcardRecord) -> Result<Self, Self::Error> {
        Self::from_persisted(
            r.id,
            r.front,
            r.back,
            r.topic,
            r.difficulty,
            r.last_reviewed_at,
            r.review_count,
            r.success_rate,
            r.next_review_due_at,
            r.repetition_level,
        )
    }
}

impl Flashcard {
    /// Create a never-reviewed card.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError::EmptyFront` / `EmptyBack` for blank sides.
    pub fn new(
        id: CardId,
        front: impl Into<String>,
        back: impl Into<String>,
        topic: impl Into<String>,
        difficulty: Difficulty,
    ) -> Result<Self, FlashcardError> {
        let front = front.into();
        let back = back.into();
        if front.trim().is_empty() {
            return Err(FlashcardError::EmptyFront);
        }
        if back.trim().is_empty() {
            return Err(FlashcardError::EmptyBack);
        }

        Ok(Self {
            id,
            front,
            back,
            difficulty,
            topic: topic.into(),
            last_reviewed_at: None,
            review_count: 0,
            success_rate: 0.0,
            next_review_due_at: None,
            repetition_level: 0,
        })
    }

    /// Rehydrate a card whose review state came from the backend.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError` when the stored state breaks a card invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: CardId,
        front: impl Into<String>,
        back: impl Into<String>,
        topic: impl Into<String>,
        difficulty: Difficulty,
        last_reviewed_at: Option<DateTime<Utc>>,
        review_count: u32,
        success_rate: f64,
        next_review_due_at: Option<DateTime<Utc>>,
        repetition_level: u8,
    ) -> Result<Self, FlashcardError> {
        if !(0.0..=1.0).contains(&success_rate) {
            return Err(FlashcardError::InvalidSuccessRate(success_rate));
        }
        if repetition_level > MAX_REPETITION_LEVEL {
            return Err(FlashcardError::InvalidRepetitionLevel(repetition_level));
        }

        let mut card = Self::new(id, front, back, topic, difficulty)?;
        card.last_reviewed_at = last_reviewed_at;
        card.review_count = review_count;
        card.success_rate = success_rate;
        card.next_review_due_at = next_review_due_at;
        card.repetition_level = repetition_level;
        Ok(card)
    }

    #[must_use]
    pub fn id(&self) -> CardId {
        self.id
    }

    #[must_use]
    pub fn front(&self) -> &str {
        &self.front
    }

    #[must_use]
    pub fn back(&self) -> &str {
        &self.back
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn last_reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed_at
    }

    #[must_use]
    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    #[must_use]
    pub fn next_review_due_at(&self) -> Option<DateTime<Utc>> {
        self.next_review_due_at
    }

    #[must_use]
    pub fn repetition_level(&self) -> u8 {
        self.repetition_level
    }

    /// A card with no due date has never been scheduled and is always due.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_due_at.is_none_or(|due| due <= now)
    }

    /// Record a graded review.
    ///
    /// The success rate is the cumulative average of all graded observations,
    /// so it stays in `[0, 1]`. The level is clamped to `MAX_REPETITION_LEVEL`.
    pub(crate) fn record_review(
        &mut self,
        correct: bool,
        repetition_level: u8,
        next_review_due_at: DateTime<Utc>,
        reviewed_at: DateTime<Utc>,
    ) {
        let observed = if correct { 1.0 } else { 0.0 };
        let previous = f64::from(self.review_count);
        let rate = (self.success_rate * previous + observed) / (previous + 1.0);

        self.success_rate = rate.clamp(0.0, 1.0);
        self.review_count = self.review_count.saturating_add(1);
        self.repetition_level = repetition_level.min(MAX_REPETITION_LEVEL);
        self.next_review_due_at = Some(next_review_due_at);
        self.last_reviewed_at = Some(reviewed_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn card() -> Flashcard {
        Flashcard::new(CardId::new(1), "ownership", "one owner per value", "rust", Difficulty::default())
            .unwrap()
    }

    #[test]
    fn blank_sides_are_rejected() {
        let err = Flashcard::new(CardId::new(1), "  ", "b", "t", Difficulty::MIN).unwrap_err();
        assert_eq!(err, FlashcardError::EmptyFront);
        let err = Flashcard::new(CardId::new(1), "f", "", "t", Difficulty::MIN).unwrap_err();
        assert_eq!(err, FlashcardError::EmptyBack);
    }

    #[test]
    fn new_card_is_due() {
        assert!(card().is_due(fixed_now()));
    }

    #[test]
    fn success_rate_is_cumulative_average() {
        let mut c = card();
        let now = fixed_now();
        c.record_review(true, 1, now, now);
        c.record_review(false, 0, now, now);
        c.record_review(true, 1, now, now);
        c.record_review(true, 2, now, now);
        assert_eq!(c.review_count(), 4);
        assert!((c.success_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn persisted_state_is_validated() {
        let err = Flashcard::from_persisted(
            CardId::new(1), "f", "b", "t", Difficulty::MIN, None, 3, 1.5, None, 1,
        )
        .unwrap_err();
        assert_eq!(err, FlashcardError::InvalidSuccessRate(1.5));

        let err = Flashcard::from_persisted(
            CardId::new(1), "f", "b", "t", Difficulty::MIN, None, 3, 0.5, None, 6,
        )
        .unwrap_err();
        assert_eq!(err, FlashcardError::InvalidRepetitionLevel(6));
    }

    #[test]
    fn deserialization_enforces_card_invariants() {
        let raw = |rate: f64, level: u8| {
            format!(
                r#"{{"id":1,"front":"f","back":"b","topic":"t","difficulty":1,"reviewCount":3,"successRate":{rate},"repetitionLevel":{level}}}"#
            )
        };
        assert!(serde_json::from_str::<Flashcard>(&raw(7.5, 2)).is_err());
        assert!(serde_json::from_str::<Flashcard>(&raw(0.5, 200)).is_err());
        assert!(serde_json::from_str::<Flashcard>(r#"{"id":1,"front":" ","back":"b"}"#).is_err());

        let card: Flashcard = serde_json::from_str(&raw(0.5, 5)).unwrap();
        assert_eq!(card.repetition_level(), 5);
        assert_eq!(card.review_count(), 3);

        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(serde_json::from_str::<Flashcard>(&json).unwrap(), card);
    }
}
