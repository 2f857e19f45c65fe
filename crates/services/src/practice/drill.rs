use std::fmt;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use learn_core::Clock;
use learn_core::model::{
    AnswerRecord, Difficulty, EventPayload, PracticeError, PracticeMode, PracticeQuestion,
    PracticeSession,
};
use learn_core::practice::{AnswerFeedback, DifficultyController, SpeedTier, answers_per_minute};
use learn_core::time::seconds_f64;

use super::countdown::Countdown;
use super::result::{DrillResult, PracticeResult};
use super::PracticeHooks;
use crate::config::PracticeConfig;
use crate::error::SessionError;

//
// ─── QUESTION POOL ─────────────────────────────────────────────────────────────
//

/// Endless question supply for a drill.
///
/// Serves the question whose difficulty is closest to the target, rotating
/// through ties so the same question does not repeat while others match.
#[derive(Debug, Clone, Default)]
pub struct QuestionPool {
    questions: Vec<PracticeQuestion>,
    cursor: usize,
}

impl QuestionPool {
    #[must_use]
    pub fn new(questions: Vec<PracticeQuestion>) -> Self {
        Self {
            questions,
            cursor: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn next_for(&mut self, target: Difficulty) -> Option<PracticeQuestion> {
        let n = self.questions.len();
        let best = (0..n)
            .map(|offset| (self.cursor + offset) % n)
            .min_by_key(|&i| self.questions[i].difficulty().value().abs_diff(target.value()))?;
        self.cursor = (best + 1) % n;
        Some(self.questions[best].clone())
    }
}

//
// ─── DRILL ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrillState {
    Running { resumed_at: DateTime<Utc> },
    Paused { since: DateTime<Utc> },
    Finished,
}

/// What a submitted answer led to.
#[derive(Debug, Clone, PartialEq)]
pub enum DrillStep {
    Answered(AnswerFeedback),
    /// The drill ran out of time before the answer counted.
    TimeUp(DrillResult),
}

/// Fixed-duration drill with an unlimited stream of questions.
///
/// Time only runs while the drill is not paused. The answer rate is
/// answers per minute of that active time.
pub struct SpeedDrill {
    config: PracticeConfig,
    pool: QuestionPool,
    controller: DifficultyController,
    session: PracticeSession,
    current: PracticeQuestion,
    question_shown_at: DateTime<Utc>,
    active_before_resume: Duration,
    state: DrillState,
    result: Option<DrillResult>,
    countdown: Option<Countdown>,
    hooks: PracticeHooks,
    clock: Clock,
}

impl SpeedDrill {
    /// Start a drill at the clock's current time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` for an empty pool.
    pub fn start(
        config: PracticeConfig,
        pool: QuestionPool,
        initial: Difficulty,
        hooks: PracticeHooks,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        Self::start_at(config, pool, initial, hooks, clock, clock.now())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Empty` for an empty pool.
    pub fn start_at(
        config: PracticeConfig,
        mut pool: QuestionPool,
        initial: Difficulty,
        hooks: PracticeHooks,
        clock: Clock,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let current = pool.next_for(initial).ok_or(SessionError::Empty)?;
        let session = PracticeSession::start(PracticeMode::SpeedDrill, Vec::new(), initial, now);

        info!(
            practice_id = %session.id(),
            seconds = config.session_duration().as_secs(),
            pool = pool.len(),
            "speed drill started"
        );
        hooks.emit(EventPayload::PracticeStarted {
            practice_id: session.id(),
            mode: PracticeMode::SpeedDrill,
        });

        Ok(Self {
            config,
            pool,
            controller: DifficultyController::new(initial),
            session,
            current,
            question_shown_at: now,
            active_before_resume: Duration::zero(),
            state: DrillState::Running { resumed_at: now },
            result: None,
            countdown: None,
            hooks,
            clock,
        })
    }

    /// Question waiting for an answer; `None` once finished.
    #[must_use]
    pub fn current_question(&self) -> Option<&PracticeQuestion> {
        (self.state != DrillState::Finished).then_some(&self.current)
    }

    #[must_use]
    pub fn session(&self) -> &PracticeSession {
        &self.session
    }

    #[must_use]
    pub fn target_difficulty(&self) -> Difficulty {
        self.controller.target_difficulty()
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.controller.streak()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        matches!(self.state, DrillState::Paused { .. })
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == DrillState::Finished
    }

    #[must_use]
    pub fn result(&self) -> Option<&DrillResult> {
        self.result.as_ref()
    }

    /// Time spent running, pauses excluded.
    #[must_use]
    pub fn active_elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.state {
            DrillState::Running { resumed_at } => {
                self.active_before_resume + (now - resumed_at).max(Duration::zero())
            }
            DrillState::Paused { .. } | DrillState::Finished => self.active_before_resume,
        }
    }

    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.config.session_length() - self.active_elapsed(now)).max(Duration::zero())
    }

    /// Past the deadline; an answer landing exactly on it still counts.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.active_elapsed(now) > self.config.session_length()
    }

    /// # Errors
    ///
    /// See [`SpeedDrill::submit_at`].
    pub fn submit(&mut self, answer: &str) -> Result<DrillStep, SessionError> {
        self.submit_at(answer, self.clock.now())
    }

    /// Grade an answer to the current question and serve the next one.
    ///
    /// An answer arriving after the time is up finishes the drill instead of
    /// counting.
    ///
    /// # Errors
    ///
    /// - `SessionError::Completed` after the drill finished
    /// - `PracticeError::Paused` while paused
    /// - `PracticeError::EmptyAnswer` for a blank answer (nothing recorded)
    pub fn submit_at(&mut self, answer: &str, now: DateTime<Utc>) -> Result<DrillStep, SessionError> {
        match self.state {
            DrillState::Finished => return Err(SessionError::Completed),
            DrillState::Paused { .. } => return Err(PracticeError::Paused.into()),
            DrillState::Running { .. } => {}
        }
        if self.is_expired(now) {
            return self.finish_internal(now, true).map(DrillStep::TimeUp);
        }

        let feedback = self.controller.answer(&self.current, answer)?;
        let response_ms = u64::try_from((now - self.question_shown_at).num_milliseconds()).unwrap_or(0);

        self.session.push_question(self.current.clone())?;
        self.session.record_answer(AnswerRecord {
            question_id: self.current.id(),
            topic: self.current.topic().to_owned(),
            correct: feedback.correct,
            response_ms,
            points_awarded: feedback.points_awarded,
            answered_at: now,
        })?;
        self.session.set_difficulty(feedback.difficulty)?;

        self.hooks.emit(EventPayload::QuestionAnswered {
            practice_id: self.session.id(),
            question_id: self.current.id(),
            correct: feedback.correct,
            response_ms,
            difficulty: self.current.difficulty(),
        });
        if let Some(change) = feedback.difficulty_change {
            debug!(?change, difficulty = feedback.difficulty.value(), "drill difficulty adjusted");
        }

        if let Some(next) = self.pool.next_for(feedback.difficulty) {
            self.current = next;
        }
        self.question_shown_at = now;
        Ok(DrillStep::Answered(feedback))
    }

    /// # Errors
    ///
    /// See [`SpeedDrill::pause_at`].
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.pause_at(self.clock.now())
    }

    /// Freeze the drill clock and the countdown. Pausing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after the drill finished.
    pub fn pause_at(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            DrillState::Finished => Err(SessionError::Completed),
            DrillState::Paused { .. } => Ok(()),
            DrillState::Running { resumed_at } => {
                self.active_before_resume += (now - resumed_at).max(Duration::zero());
                self.state = DrillState::Paused { since: now };
                if let Some(countdown) = &self.countdown {
                    countdown.pause();
                }
                debug!(practice_id = %self.session.id(), "drill paused");
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// See [`SpeedDrill::resume_at`].
    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.resume_at(self.clock.now())
    }

    /// Continue the same drill; the paused span counts neither towards the
    /// drill time nor the current question's response time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotPaused` unless paused, and
    /// `SessionError::Completed` after the drill finished.
    pub fn resume_at(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            DrillState::Finished => Err(SessionError::Completed),
            DrillState::Running { .. } => Err(SessionError::NotPaused),
            DrillState::Paused { since } => {
                self.question_shown_at += (now - since).max(Duration::zero());
                self.state = DrillState::Running { resumed_at: now };
                if let Some(countdown) = &self.countdown {
                    countdown.resume();
                }
                debug!(practice_id = %self.session.id(), "drill resumed");
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// See [`SpeedDrill::finish_at`].
    pub fn finish(&mut self) -> Result<DrillResult, SessionError> {
        self.finish_at(self.clock.now())
    }

    /// End the drill early.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if already finished.
    pub fn finish_at(&mut self, now: DateTime<Utc>) -> Result<DrillResult, SessionError> {
        self.finish_internal(now, false)
    }

    /// Finish because the countdown reached zero; active time is the full
    /// session duration.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if already finished.
    pub fn time_up_at(&mut self, now: DateTime<Utc>) -> Result<DrillResult, SessionError> {
        self.finish_internal(now, true)
    }

    /// Finish the drill if its time has run out.
    pub fn check_timeout_at(&mut self, now: DateTime<Utc>) -> Option<DrillResult> {
        if self.state == DrillState::Finished || !self.is_expired(now) {
            return None;
        }
        self.finish_internal(now, true).ok()
    }

    /// Start a one-second countdown for the remaining time.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn attach_countdown(&mut self) {
        if self.state == DrillState::Finished {
            return;
        }
        let remaining = self.remaining(self.clock.now()).to_std().unwrap_or_default();
        let countdown = Countdown::start(remaining);
        if self.is_paused() {
            countdown.pause();
        }
        self.countdown = Some(countdown);
    }

    pub fn countdown_mut(&mut self) -> Option<&mut Countdown> {
        self.countdown.as_mut()
    }

    /// Wait for the attached countdown, then finish the drill as timed out.
    ///
    /// Returns `None` without a countdown, or if it was cancelled.
    pub async fn run_until_time_up(&mut self) -> Option<DrillResult> {
        let finished = self.countdown.as_mut()?.finished().await;
        if !finished {
            return None;
        }
        let now = self.clock.now();
        self.time_up_at(now).ok()
    }

    /// The underlying session, for the host's history.
    #[must_use]
    pub fn into_session(self) -> PracticeSession {
        self.session
    }

    fn finish_internal(&mut self, now: DateTime<Utc>, timed_out: bool) -> Result<DrillResult, SessionError> {
        if self.state == DrillState::Finished {
            return Err(SessionError::Completed);
        }

        let length = self.config.session_length();
        let active = if timed_out {
            length
        } else {
            self.active_elapsed(now).min(length)
        };
        self.session.complete(now, active)?;
        self.state = DrillState::Finished;
        self.countdown = None;

        let rate = answers_per_minute(self.session.answered_count(), active);
        let result = DrillResult {
            practice_id: self.session.id(),
            total_answered: self.session.answered_count(),
            correct: self.session.correct_count(),
            incorrect: self.session.incorrect_count(),
            average_response_seconds: self.session.average_response_seconds(),
            rate_per_minute: rate,
            accuracy: self.session.accuracy(),
            best_streak: self.controller.best_streak(),
            points: self.session.score(),
            tier: SpeedTier::from_rate(rate),
            met_target: rate >= self.config.target_rate(),
            active_seconds: seconds_f64(active),
            timed_out,
            final_difficulty: self.controller.target_difficulty(),
        };

        info!(
            practice_id = %result.practice_id,
            answered = result.total_answered,
            rate = result.rate_per_minute,
            tier = %result.tier,
            timed_out,
            "speed drill finished"
        );
        self.hooks.completed(&PracticeResult::SpeedDrill(result.clone()));
        self.result = Some(result.clone());
        Ok(result)
    }
}

impl fmt::Debug for SpeedDrill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeedDrill")
            .field("practice_id", &self.session.id())
            .field("state", &self.state)
            .field("answered", &self.session.answered_count())
            .field("difficulty", &self.controller.target_difficulty())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::QuestionId;
    use learn_core::time::fixed_now;
    use std::sync::{Arc, Mutex};

    fn question(id: u64, difficulty: u8) -> PracticeQuestion {
        PracticeQuestion::new(
            QuestionId::new(id),
            learn_core::model::QuestionKind::FreeText,
            format!("{id} + {id}"),
            learn_core::model::AcceptedAnswers::one((id * 2).to_string()),
            Difficulty::new(i64::from(difficulty)),
            "arithmetic",
            10,
            1,
        )
        .unwrap()
    }

    fn pool() -> QuestionPool {
        QuestionPool::new((1..=5).map(|d| question(u64::from(d), d)).collect())
    }

    fn config(seconds: u64) -> PracticeConfig {
        PracticeConfig::new(std::time::Duration::from_secs(seconds), 20.0).unwrap()
    }

    fn correct_answer(drill: &SpeedDrill) -> String {
        drill.current_question().unwrap().correct_answer().as_slice()[0].clone()
    }

    #[test]
    fn pool_prefers_closest_difficulty_and_rotates() {
        let mut p = QuestionPool::new(vec![question(1, 1), question(2, 1), question(3, 5)]);
        assert_eq!(p.next_for(Difficulty::MIN).unwrap().id().value(), 1);
        assert_eq!(p.next_for(Difficulty::MIN).unwrap().id().value(), 2);
        assert_eq!(p.next_for(Difficulty::MAX).unwrap().id().value(), 3);
        assert!(QuestionPool::default().next_for(Difficulty::MIN).is_none());
    }

    #[test]
    fn empty_pool_cannot_start() {
        let err = SpeedDrill::start_at(
            config(60),
            QuestionPool::default(),
            Difficulty::MIN,
            PracticeHooks::new(),
            Clock::default(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::Empty);
    }

    #[test]
    fn ten_correct_in_five_minutes_rates_beginner_with_one_bonus() {
        let start = fixed_now();
        let mut drill = SpeedDrill::start_at(
            config(300),
            pool(),
            Difficulty::MIN,
            PracticeHooks::new(),
            Clock::default(),
            start,
        )
        .unwrap();

        for i in 1..=10 {
            let answer = correct_answer(&drill);
            let step = drill.submit_at(&answer, start + Duration::seconds(30 * i)).unwrap();
            assert!(matches!(step, DrillStep::Answered(f) if f.correct));
        }

        let result = drill.time_up_at(start + Duration::seconds(300)).unwrap();
        assert_eq!(result.total_answered, 10);
        assert!((result.rate_per_minute - 2.0).abs() < 1e-9);
        assert_eq!(result.tier, SpeedTier::Beginner);
        assert_eq!(result.points, 15);
        assert_eq!(result.best_streak, 10);
        assert!((result.average_response_seconds - 30.0).abs() < 1e-9);
        assert!(!result.met_target);
        assert!(result.timed_out);
    }

    #[test]
    fn pause_excludes_time_and_blocks_answers() {
        let start = fixed_now();
        let mut drill = SpeedDrill::start_at(
            config(60),
            pool(),
            Difficulty::MIN,
            PracticeHooks::new(),
            Clock::default(),
            start,
        )
        .unwrap();

        drill.pause_at(start + Duration::seconds(10)).unwrap();
        let answer = correct_answer(&drill);
        assert_eq!(
            drill.submit_at(&answer, start + Duration::seconds(20)),
            Err(SessionError::Practice(PracticeError::Paused))
        );
        assert_eq!(
            drill.active_elapsed(start + Duration::seconds(500)),
            Duration::seconds(10)
        );

        drill.resume_at(start + Duration::seconds(510)).unwrap();
        assert_eq!(drill.resume_at(start + Duration::seconds(511)), Err(SessionError::NotPaused));
        assert_eq!(drill.remaining(start + Duration::seconds(520)), Duration::seconds(40));

        drill.submit_at(&answer, start + Duration::seconds(515)).unwrap();
        assert_eq!(drill.session().answers()[0].response_ms, 15_000);
    }

    #[test]
    fn late_answer_forces_completion_like_manual_finish() {
        let start = fixed_now();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hooks = PracticeHooks::new().with_listener(move |r: &PracticeResult| {
            sink.lock().unwrap().push(r.mode());
        });
        let mut drill =
            SpeedDrill::start_at(config(60), pool(), Difficulty::MIN, hooks, Clock::default(), start)
                .unwrap();

        let answer = correct_answer(&drill);
        let step = drill.submit_at(&answer, start + Duration::seconds(61)).unwrap();
        let DrillStep::TimeUp(result) = step else {
            panic!("expected time up");
        };
        assert_eq!(result.total_answered, 0);
        assert_eq!(result.active_seconds, 60.0);
        assert!(drill.is_finished());
        assert_eq!(drill.submit_at(&answer, start), Err(SessionError::Completed));
        assert_eq!(*seen.lock().unwrap(), vec![PracticeMode::SpeedDrill]);
        assert!(drill.into_session().is_complete());
    }

    #[test]
    fn blank_answer_records_nothing() {
        let start = fixed_now();
        let mut drill = SpeedDrill::start_at(
            config(60),
            pool(),
            Difficulty::MIN,
            PracticeHooks::new(),
            Clock::default(),
            start,
        )
        .unwrap();
        assert_eq!(
            drill.submit_at("  ", start),
            Err(SessionError::Practice(PracticeError::EmptyAnswer))
        );
        assert_eq!(drill.session().answered_count(), 0);
        assert!(drill.check_timeout_at(start + Duration::seconds(30)).is_none());
        assert!(drill.check_timeout_at(start + Duration::seconds(61)).is_some());
    }

    #[test]
    fn answer_on_the_deadline_still_counts() {
        let start = fixed_now();
        let mut drill = SpeedDrill::start_at(
            config(60),
            pool(),
            Difficulty::MIN,
            PracticeHooks::new(),
            Clock::default(),
            start,
        )
        .unwrap();

        let deadline = start + Duration::seconds(60);
        assert!(drill.check_timeout_at(deadline).is_none());
        let answer = correct_answer(&drill);
        assert!(matches!(
            drill.submit_at(&answer, deadline).unwrap(),
            DrillStep::Answered(f) if f.correct
        ));

        let answer = correct_answer(&drill);
        let step = drill.submit_at(&answer, deadline + Duration::milliseconds(1)).unwrap();
        let DrillStep::TimeUp(result) = step else {
            panic!("expected time up just past the deadline");
        };
        assert_eq!(result.total_answered, 1);
        assert_eq!(result.active_seconds, 60.0);
    }
}
