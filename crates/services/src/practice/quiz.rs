use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use learn_core::Clock;
use learn_core::model::{
    AnswerRecord, Difficulty, EventPayload, PracticeError, PracticeMode, PracticeQuestion,
    PracticeSession,
};
use learn_core::practice::{AnswerFeedback, DifficultyController};
use learn_core::time::seconds_f64;

use super::countdown::Countdown;
use super::result::{PracticeResult, QuizResult};
use super::PracticeHooks;
use crate::error::{ConfigError, SessionError};

//
// ─── OPTIONS ───────────────────────────────────────────────────────────────────
//

/// How a quiz orders, scores and times its questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuizOptionsFile", rename_all = "camelCase")]
pub struct QuizOptions {
    shuffle: bool,
    penalty_fraction: f64,
    time_limit_secs: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizOptionsFile {
    #[serde(default)]
    shuffle: bool,
    #[serde(default)]
    penalty_fraction: f64,
    #[serde(default)]
    time_limit_secs: Option<u64>,
}

impl TryFrom<QuizOptionsFile> for QuizOptions {
    type Error = ConfigError;

    fn try_from(file: QuizOptionsFile) -> Result<Self, Self::Error> {
        let options = Self::new(file.shuffle, file.penalty_fraction)?;
        match file.time_limit_secs {
            Some(secs) => options.with_time_limit(std::time::Duration::from_secs(secs)),
            None => Ok(options),
        }
    }
}

impl QuizOptions {
    /// `penalty_fraction` of a question's points is deducted per wrong answer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPenaltyFraction` outside `[0, 1]`.
    pub fn new(shuffle: bool, penalty_fraction: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&penalty_fraction) {
            return Err(ConfigError::InvalidPenaltyFraction(penalty_fraction));
        }
        Ok(Self {
            shuffle,
            penalty_fraction,
            time_limit_secs: None,
        })
    }

    /// Limit the quiz to `limit` of active (unpaused) time.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ZeroSessionDuration` for a zero limit.
    pub fn with_time_limit(mut self, limit: std::time::Duration) -> Result<Self, ConfigError> {
        if limit.as_secs() == 0 {
            return Err(ConfigError::ZeroSessionDuration);
        }
        self.time_limit_secs = Some(limit.as_secs());
        Ok(self)
    }

    #[must_use]
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    #[must_use]
    pub fn penalty_fraction(&self) -> f64 {
        self.penalty_fraction
    }

    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(|secs| {
            i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX)
        })
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuizState {
    Running { resumed_at: DateTime<Utc> },
    Paused { since: DateTime<Utc> },
    Finished,
}

/// What a submitted answer led to.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizStep {
    Answered {
        feedback: AnswerFeedback,
        remaining: usize,
    },
    /// The last question was answered.
    Completed {
        feedback: AnswerFeedback,
        result: QuizResult,
    },
    /// The time limit passed before the answer counted.
    TimeUp(QuizResult),
}

/// Fixed set of questions answered in order, optionally against the clock.
pub struct Quiz {
    session: PracticeSession,
    controller: DifficultyController,
    options: QuizOptions,
    current: usize,
    question_shown_at: DateTime<Utc>,
    active_before_resume: Duration,
    state: QuizState,
    result: Option<QuizResult>,
    countdown: Option<Countdown>,
    hooks: PracticeHooks,
    clock: Clock,
}

impl Quiz {
    /// # Errors
    ///
    /// Returns `SessionError::Empty` without questions.
    pub fn start(
        questions: Vec<PracticeQuestion>,
        options: QuizOptions,
        hooks: PracticeHooks,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        Self::start_at(questions, options, hooks, clock, clock.now())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Empty` without questions.
    pub fn start_at(
        mut questions: Vec<PracticeQuestion>,
        options: QuizOptions,
        hooks: PracticeHooks,
        clock: Clock,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let Some(first) = questions.first() else {
            return Err(SessionError::Empty);
        };
        let initial = first.difficulty();
        if options.shuffle {
            questions.shuffle(&mut rand::rng());
        }

        let session = PracticeSession::start(PracticeMode::Quiz, questions, initial, now);
        info!(
            practice_id = %session.id(),
            questions = session.total_questions(),
            shuffle = options.shuffle,
            penalty = options.penalty_fraction,
            time_limit_secs = ?options.time_limit_secs,
            "quiz started"
        );
        hooks.emit(EventPayload::PracticeStarted {
            practice_id: session.id(),
            mode: PracticeMode::Quiz,
        });

        Ok(Self {
            session,
            controller: DifficultyController::new(initial),
            options,
            current: 0,
            question_shown_at: now,
            active_before_resume: Duration::zero(),
            state: QuizState::Running { resumed_at: now },
            result: None,
            countdown: None,
            hooks,
            clock,
        })
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&PracticeQuestion> {
        if self.state == QuizState::Finished {
            return None;
        }
        self.session.questions().get(self.current)
    }

    /// Zero-based position of the current question.
    #[must_use]
    pub fn position(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.session.questions().len().saturating_sub(self.current)
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
    pub fn is_paused(&self) -> bool {
        matches!(self.state, QuizState::Paused { .. })
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == QuizState::Finished
    }

    #[must_use]
    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    /// Time spent running, pauses excluded.
    #[must_use]
    pub fn active_elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.state {
            QuizState::Running { resumed_at } => {
                self.active_before_resume + (now - resumed_at).max(Duration::zero())
            }
            QuizState::Paused { .. } | QuizState::Finished => self.active_before_resume,
        }
    }

    /// Time left under the limit; `None` for an untimed quiz.
    #[must_use]
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let limit = self.options.time_limit()?;
        Some((limit - self.active_elapsed(now)).max(Duration::zero()))
    }

    /// Past the limit; an answer landing exactly on it still counts.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.options
            .time_limit()
            .is_some_and(|limit| self.active_elapsed(now) > limit)
    }

    /// # Errors
    ///
    /// See [`Quiz::submit_at`].
    pub fn submit(&mut self, answer: &str) -> Result<QuizStep, SessionError> {
        self.submit_at(answer, self.clock.now())
    }

    /// Grade the current question and advance.
    ///
    /// A wrong answer costs `penalty_fraction` of the question's points. An
    /// answer arriving after the time limit finishes the quiz instead.
    ///
    /// # Errors
    ///
    /// - `SessionError::Completed` after the quiz finished
    /// - `PracticeError::Paused` while paused
    /// - `PracticeError::EmptyAnswer` for a blank answer (nothing recorded)
    pub fn submit_at(
        &mut self,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<QuizStep, SessionError> {
        match self.state {
            QuizState::Finished => return Err(SessionError::Completed),
            QuizState::Paused { .. } => return Err(PracticeError::Paused.into()),
            QuizState::Running { .. } => {}
        }
        if self.is_expired(now) {
            return self.finish_internal(now, true).map(QuizStep::TimeUp);
        }

        let question = self.current_question().cloned().ok_or(SessionError::Completed)?;
        let feedback = self.controller.answer(&question, answer)?;
        let response_ms =
            u64::try_from((now - self.question_shown_at).num_milliseconds()).unwrap_or(0);

        self.session.record_answer(AnswerRecord {
            question_id: question.id(),
            topic: question.topic().to_owned(),
            correct: feedback.correct,
            response_ms,
            points_awarded: feedback.points_awarded,
            answered_at: now,
        })?;
        if !feedback.correct {
            self.session
                .add_penalty(f64::from(question.points()) * self.options.penalty_fraction)?;
        }
        self.session.set_difficulty(feedback.difficulty)?;

        self.hooks.emit(EventPayload::QuestionAnswered {
            practice_id: self.session.id(),
            question_id: question.id(),
            correct: feedback.correct,
            response_ms,
            difficulty: question.difficulty(),
        });

        self.current += 1;
        self.question_shown_at = now;

        if self.current >= self.session.questions().len() {
            let result = self.finish_internal(now, false)?;
            return Ok(QuizStep::Completed { feedback, result });
        }
        Ok(QuizStep::Answered {
            feedback,
            remaining: self.remaining(),
        })
    }

    /// Count a hint on the current question. Returns hints used so far.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after the quiz finished and
    /// `PracticeError::Paused` while paused.
    pub fn use_hint(&mut self) -> Result<u32, SessionError> {
        if self.is_paused() {
            return Err(PracticeError::Paused.into());
        }
        let question_id = self
            .current_question()
            .map(PracticeQuestion::id)
            .ok_or(SessionError::Completed)?;
        let used = self.session.use_hint()?;
        self.hooks.emit(EventPayload::HintUsed {
            practice_id: self.session.id(),
            question_id,
        });
        Ok(used)
    }

    /// # Errors
    ///
    /// See [`Quiz::pause_at`].
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.pause_at(self.clock.now())
    }

    /// Freeze the quiz clock and the countdown. Pausing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after the quiz finished.
    pub fn pause_at(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            QuizState::Finished => Err(SessionError::Completed),
            QuizState::Paused { .. } => Ok(()),
            QuizState::Running { resumed_at } => {
                self.active_before_resume += (now - resumed_at).max(Duration::zero());
                self.state = QuizState::Paused { since: now };
                if let Some(countdown) = &self.countdown {
                    countdown.pause();
                }
                debug!(practice_id = %self.session.id(), "quiz paused");
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// See [`Quiz::resume_at`].
    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.resume_at(self.clock.now())
    }

    /// Continue the quiz; the paused span counts neither towards the time
    /// limit nor the current question's response time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotPaused` unless paused, and
    /// `SessionError::Completed` after the quiz finished.
    pub fn resume_at(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            QuizState::Finished => Err(SessionError::Completed),
            QuizState::Running { .. } => Err(SessionError::NotPaused),
            QuizState::Paused { since } => {
                self.question_shown_at += (now - since).max(Duration::zero());
                self.state = QuizState::Running { resumed_at: now };
                if let Some(countdown) = &self.countdown {
                    countdown.resume();
                }
                debug!(practice_id = %self.session.id(), "quiz resumed");
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// See [`Quiz::finish_at`].
    pub fn finish(&mut self) -> Result<QuizResult, SessionError> {
        self.finish_at(self.clock.now())
    }

    /// End early; unanswered questions count as not correct.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if already finished.
    pub fn finish_at(&mut self, now: DateTime<Utc>) -> Result<QuizResult, SessionError> {
        self.finish_internal(now, false)
    }

    /// Finish because the time limit ran out; active time is the full limit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if already finished.
    pub fn time_up_at(&mut self, now: DateTime<Utc>) -> Result<QuizResult, SessionError> {
        self.finish_internal(now, true)
    }

    /// Finish the quiz if its time limit has passed.
    pub fn check_timeout_at(&mut self, now: DateTime<Utc>) -> Option<QuizResult> {
        if self.state == QuizState::Finished || !self.is_expired(now) {
            return None;
        }
        self.finish_internal(now, true).ok()
    }

    /// Start a one-second countdown for the time left. Untimed quizzes
    /// get none.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn attach_countdown(&mut self) {
        if self.state == QuizState::Finished {
            return;
        }
        let Some(remaining) = self.time_remaining(self.clock.now()) else {
            return;
        };
        let countdown = Countdown::start(remaining.to_std().unwrap_or_default());
        if self.is_paused() {
            countdown.pause();
        }
        self.countdown = Some(countdown);
    }

    pub fn countdown_mut(&mut self) -> Option<&mut Countdown> {
        self.countdown.as_mut()
    }

    /// Wait for the attached countdown, then finish the quiz as timed out.
    ///
    /// Returns `None` without a countdown, or if it was cancelled.
    pub async fn run_until_time_up(&mut self) -> Option<QuizResult> {
        let finished = self.countdown.as_mut()?.finished().await;
        if !finished {
            return None;
        }
        let now = self.clock.now();
        self.time_up_at(now).ok()
    }

    #[must_use]
    pub fn into_session(self) -> PracticeSession {
        self.session
    }

    fn finish_internal(
        &mut self,
        now: DateTime<Utc>,
        timed_out: bool,
    ) -> Result<QuizResult, SessionError> {
        if self.state == QuizState::Finished {
            return Err(SessionError::Completed);
        }
        let active = match (timed_out, self.options.time_limit()) {
            (true, Some(limit)) => limit,
            (_, Some(limit)) => self.active_elapsed(now).min(limit),
            (_, None) => self.active_elapsed(now),
        };
        self.session.complete(now, active)?;
        self.state = QuizState::Finished;
        self.countdown = None;

        let result = QuizResult {
            practice_id: self.session.id(),
            total_questions: self.session.total_questions(),
            answered: self.session.answered_count(),
            correct: self.session.correct_count(),
            incorrect: self.session.incorrect_count(),
            average_response_seconds: self.session.average_response_seconds(),
            accuracy: self.session.accuracy(),
            best_streak: self.controller.best_streak(),
            points: self.session.score(),
            penalty: self.session.penalty(),
            net_score: self.session.net_score(),
            score_percent: self.session.score_percent(),
            hints_used: self.session.hints_used(),
            elapsed_seconds: self.session.wall_seconds(now),
            active_seconds: seconds_f64(active),
            timed_out,
            final_difficulty: self.controller.target_difficulty(),
        };

        info!(
            practice_id = %result.practice_id,
            correct = result.correct,
            total = result.total_questions,
            net_score = result.net_score,
            timed_out,
            "quiz finished"
        );
        self.hooks.completed(&PracticeResult::Quiz(result.clone()));
        self.result = Some(result.clone());
        Ok(result)
    }
}

impl fmt::Debug for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quiz")
            .field("practice_id", &self.session.id())
            .field("state", &self.state)
            .field("position", &self.current)
            .field("total", &self.session.total_questions())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
