use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use learn_core::Clock;
use learn_core::model::{
    AcceptedAnswers, AnswerRecord, Difficulty, EventPayload, Flashcard, PracticeId, PracticeMode,
    PracticeQuestion, PracticeSession, QuestionId, QuestionKind, ReviewOutcome, percent,
};
use learn_core::scheduler::{AppliedReview, Scheduler};
use learn_core::time::seconds_f64;

use crate::error::SessionError;
use crate::practice::{PracticeHooks, PracticeResult};

//
// ─── SUMMARY ───────────────────────────────────────────────────────────────────
//

/// Figures of a finished flashcard review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub practice_id: PracticeId,
    /// Graded cards (skips excluded).
    pub cards_reviewed: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub skipped: u32,
    pub elapsed_seconds: f64,
    pub average_response_seconds: f64,
    /// Correct over graded, in percent.
    pub accuracy: f64,
    /// Topics with at least one incorrect card.
    pub weak_topics: BTreeSet<String>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Steps through a scheduled flashcard queue.
///
/// The front of the queue is the current card; it is timed from the moment
/// it became current. A skipped card goes to the back of the queue
/// unchanged. The session completes when the queue is empty or on
/// [`ReviewSession::finish_at`].
pub struct ReviewSession {
    scheduler: Scheduler,
    queue: VecDeque<Flashcard>,
    reviewed: Vec<Flashcard>,
    practice: PracticeSession,
    current_since: DateTime<Utc>,
    skipped: u32,
    weak_topics: BTreeSet<String>,
    summary: Option<ReviewSummary>,
    hooks: PracticeHooks,
    clock: Clock,
}

impl ReviewSession {
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when no card was scheduled.
    pub fn start(
        deck: Vec<Flashcard>,
        session_size: usize,
        scheduler: Scheduler,
        hooks: PracticeHooks,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        Self::start_at(deck, session_size, scheduler, hooks, clock, clock.now())
    }

    /// Schedule up to `session_size` cards from `deck` and start reviewing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` when no card was scheduled.
    pub fn start_at(
        deck: Vec<Flashcard>,
        session_size: usize,
        scheduler: Scheduler,
        hooks: PracticeHooks,
        clock: Clock,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let queue: VecDeque<Flashcard> = scheduler.schedule_owned(deck, session_size, now).into();
        if queue.is_empty() {
            return Err(SessionError::Empty);
        }

        let questions: Vec<PracticeQuestion> = queue.iter().filter_map(card_question).collect();
        let difficulty = queue.front().map_or(Difficulty::default(), Flashcard::difficulty);
        let practice = PracticeSession::start(PracticeMode::Flashcards, questions, difficulty, now);

        info!(practice_id = %practice.id(), cards = queue.len(), "flashcard review started");
        hooks.emit(EventPayload::PracticeStarted {
            practice_id: practice.id(),
            mode: PracticeMode::Flashcards,
        });

        Ok(Self {
            scheduler,
            queue,
            reviewed: Vec::new(),
            practice,
            current_since: now,
            skipped: 0,
            weak_topics: BTreeSet::new(),
            summary: None,
            hooks,
            clock,
        })
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Flashcard> {
        if self.is_complete() {
            return None;
        }
        self.queue.front()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        if self.is_complete() { 0 } else { self.queue.len() }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.summary.is_some()
    }

    #[must_use]
    pub fn summary(&self) -> Option<&ReviewSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn practice(&self) -> &PracticeSession {
        &self.practice
    }

    /// # Errors
    ///
    /// See [`ReviewSession::answer_at`].
    pub fn answer(&mut self, outcome: ReviewOutcome) -> Result<AppliedReview, SessionError> {
        self.answer_at(outcome, self.clock.now())
    }

    /// Apply an outcome to the current card and move on.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` once the session has finished.
    pub fn answer_at(
        &mut self,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<AppliedReview, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        let mut card = self.queue.pop_front().ok_or(SessionError::Completed)?;
        let response_ms = u64::try_from((now - self.current_since).num_milliseconds()).unwrap_or(0);
        let applied = self.scheduler.apply_outcome(&mut card, outcome, now);

        self.hooks.emit(EventPayload::FlashcardReviewed {
            card_id: card.id(),
            outcome,
            response_ms,
        });

        if outcome.is_graded() {
            let correct = outcome == ReviewOutcome::Correct;
            if !correct {
                self.weak_topics.insert(card.topic().to_owned());
            }
            self.practice.record_answer(AnswerRecord {
                question_id: QuestionId::new(card.id().value()),
                topic: card.topic().to_owned(),
                correct,
                response_ms,
                points_awarded: u32::from(correct),
                answered_at: now,
            })?;
            debug!(card_id = %card.id(), level = applied.level, ?outcome, "card reviewed");
            self.reviewed.push(card);
        } else {
            self.skipped += 1;
            self.queue.push_back(card);
        }

        self.current_since = now;
        if self.queue.is_empty() {
            self.finish_internal(now)?;
        }
        Ok(applied)
    }

    /// # Errors
    ///
    /// See [`ReviewSession::finish_at`].
    pub fn finish(&mut self) -> Result<ReviewSummary, SessionError> {
        self.finish_at(self.clock.now())
    }

    /// End the session early; cards still queued stay untouched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if already finished.
    pub fn finish_at(&mut self, now: DateTime<Utc>) -> Result<ReviewSummary, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        self.finish_internal(now)
    }

    /// Every card of the session (reviewed first, then untouched) and the
    /// practice record for the host's history.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Flashcard>, PracticeSession) {
        let mut cards = self.reviewed;
        cards.extend(self.queue);
        (cards, self.practice)
    }

    fn finish_internal(&mut self, now: DateTime<Utc>) -> Result<ReviewSummary, SessionError> {
        let elapsed = (now - self.practice.start_time()).max(chrono::Duration::zero());
        self.practice.complete(now, elapsed)?;

        let correct = self.practice.correct_count();
        let graded = self.practice.answered_count();
        let summary = ReviewSummary {
            practice_id: self.practice.id(),
            cards_reviewed: graded,
            correct,
            incorrect: self.practice.incorrect_count(),
            skipped: self.skipped,
            elapsed_seconds: seconds_f64(elapsed),
            average_response_seconds: self.practice.average_response_seconds(),
            accuracy: percent(correct, graded),
            weak_topics: self.weak_topics.clone(),
        };

        info!(
            practice_id = %summary.practice_id,
            reviewed = summary.cards_reviewed,
            skipped = summary.skipped,
            accuracy = summary.accuracy,
            "flashcard review finished"
        );
        self.hooks.completed(&PracticeResult::Flashcards(summary.clone()));
        self.summary = Some(summary.clone());
        Ok(summary)
    }
}

/// Practice record entry for a card, so flashcard sessions feed topic analytics.
fn card_question(card: &Flashcard) -> Option<PracticeQuestion> {
    PracticeQuestion::new(
        QuestionId::new(card.id().value()),
        QuestionKind::FreeText,
        card.front(),
        AcceptedAnswers::one(card.back()),
        card.difficulty(),
        card.topic(),
        0,
        1,
    )
    .ok()
}

impl fmt::Debug for ReviewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewSession")
            .field("practice_id", &self.practice.id())
            .field("queued", &self.queue.len())
            .field("reviewed", &self.reviewed.len())
            .field("skipped", &self.skipped)
            .field("complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use learn_core::model::CardId;
    use learn_core::time::fixed_now;

    fn card(id: u64, topic: &str) -> Flashcard {
        Flashcard::new(CardId::new(id), format!("front {id}"), "back", topic, Difficulty::default())
            .unwrap()
    }

    fn session(cards: Vec<Flashcard>, size: usize) -> ReviewSession {
        ReviewSession::start_at(
            cards,
            size,
            Scheduler::new(),
            PracticeHooks::new(),
            Clock::default(),
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn empty_deck_is_rejected() {
        let err = ReviewSession::start_at(
            Vec::new(),
            10,
            Scheduler::new(),
            PracticeHooks::new(),
            Clock::default(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::Empty);
    }

    #[test]
    fn reviews_every_card_then_completes() {
        let start = fixed_now();
        let mut s = session(vec![card(1, "rust"), card(2, "sql"), card(3, "rust")], 10);

        s.answer_at(ReviewOutcome::Correct, start + Duration::seconds(4)).unwrap();
        s.answer_at(ReviewOutcome::Incorrect, start + Duration::seconds(10)).unwrap();
        s.answer_at(ReviewOutcome::Correct, start + Duration::seconds(12)).unwrap();

        let summary = s.summary().unwrap().clone();
        assert_eq!(summary.cards_reviewed, 3);
        assert_eq!((summary.correct, summary.incorrect, summary.skipped), (2, 1, 0));
        assert!((summary.average_response_seconds - 4.0).abs() < 1e-9);
        assert_eq!(summary.elapsed_seconds, 12.0);
        assert_eq!(summary.weak_topics, BTreeSet::from(["sql".to_owned()]));
        assert_eq!(
            s.answer_at(ReviewOutcome::Correct, start),
            Err(SessionError::Completed)
        );

        let (cards, practice) = s.into_parts();
        assert!(practice.is_complete());
        assert_eq!(cards.iter().map(Flashcard::review_count).sum::<u32>(), 3);
    }

    #[test]
    fn skip_moves_card_to_back_unchanged() {
        let start = fixed_now();
        let mut s = session(vec![card(1, "a"), card(2, "b")], 10);

        s.answer_at(ReviewOutcome::Skip, start).unwrap();
        assert_eq!(s.current_card().unwrap().id(), CardId::new(2));
        s.answer_at(ReviewOutcome::Correct, start).unwrap();

        let skipped = s.current_card().unwrap();
        assert_eq!(skipped.id(), CardId::new(1));
        assert_eq!(skipped.review_count(), 0);
        assert_eq!(skipped.next_review_due_at(), None);

        s.answer_at(ReviewOutcome::Correct, start).unwrap();
        assert_eq!(s.summary().unwrap().skipped, 1);
    }

    #[test]
    fn early_finish_keeps_queued_cards_untouched() {
        let mut s = session(vec![card(1, "a"), card(2, "b"), card(3, "c")], 2);
        assert_eq!(s.remaining(), 2);
        s.answer_at(ReviewOutcome::Correct, fixed_now()).unwrap();

        let summary = s.finish_at(fixed_now() + Duration::minutes(1)).unwrap();
        assert_eq!(summary.cards_reviewed, 1);
        assert_eq!(summary.accuracy, 100.0);
        assert_eq!(s.remaining(), 0);

        let (cards, _) = s.into_parts();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].review_count(), 0);
    }
}
