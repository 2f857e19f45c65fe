use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{Difficulty, PracticeId, PracticeQuestion, QuestionId};
use crate::time::seconds_f64;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("answer cannot be empty")]
    EmptyAnswer,

    #[error("practice session already completed")]
    SessionClosed,

    #[error("practice session is paused")]
    Paused,

    #[error("no question is currently being asked")]
    NoCurrentQuestion,

    #[error("practice session has no questions")]
    NoQuestions,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("only completed sessions can be added to history")]
    SessionOpen,

    #[error("session {0} is already in history")]
    Duplicate(PracticeId),
}

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeMode {
    Flashcards,
    SpeedDrill,
    Quiz,
}

impl PracticeMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flashcards => "flashcards",
            Self::SpeedDrill => "speed_drill",
            Self::Quiz => "quiz",
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Flashcards => "Flashcards",
            Self::SpeedDrill => "Speed Drill",
            Self::Quiz => "Quiz",
        }
    }
}

impl fmt::Display for PracticeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ─── ANSWER RECORD ─────────────────────────────────────────────────────────────
//

/// One submitted answer inside a practice run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub topic: String,
    pub correct: bool,
    pub response_ms: u64,
    pub points_awarded: u32,
    pub answered_at: DateTime<Utc>,
}

//
// ─── PRACTICE SESSION ──────────────────────────────────────────────────────────
//

/// A single practice run.
///
/// Mutable only until [`PracticeSession::complete`] sets `end_time`; every
/// mutator afterwards returns `PracticeError::SessionClosed`. Earned points
/// never decrease; negative marking accumulates in a separate penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    id: PracticeId,
    mode: PracticeMode,
    questions: Vec<PracticeQuestion>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    score: u32,
    penalty: f64,
    total_questions: u32,
    time_spent_seconds: u64,
    hints_used: u32,
    difficulty: Difficulty,
    answers: Vec<AnswerRecord>,
}

impl PracticeSession {
    #[must_use]
    pub fn start(
        mode: PracticeMode,
        questions: Vec<PracticeQuestion>,
        difficulty: Difficulty,
        start_time: DateTime<Utc>,
    ) -> Self {
        let total_questions = u32::try_from(questions.len()).unwrap_or(u32::MAX);
        Self {
            id: PracticeId::generate(),
            mode,
            questions,
            start_time,
            end_time: None,
            score: 0,
            penalty: 0.0,
            total_questions,
            time_spent_seconds: 0,
            hints_used: 0,
            difficulty,
            answers: Vec::new(),
        }
    }

    fn ensure_open(&self) -> Result<(), PracticeError> {
        if self.is_complete() {
            return Err(PracticeError::SessionClosed);
        }
        Ok(())
    }

    /// Add a question served on the fly (speed drills).
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionClosed` after completion.
    pub fn push_question(&mut self, question: PracticeQuestion) -> Result<(), PracticeError> {
        self.ensure_open()?;
        self.questions.push(question);
        self.total_questions = self.total_questions.saturating_add(1);
        Ok(())
    }

    /// Record an answer and add its points to the score.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionClosed` after completion.
    pub fn record_answer(&mut self, answer: AnswerRecord) -> Result<(), PracticeError> {
        self.ensure_open()?;
        self.score = self.score.saturating_add(answer.points_awarded);
        self.answers.push(answer);
        Ok(())
    }

    /// Accumulate a negative-marking deduction.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionClosed` after completion.
    pub fn add_penalty(&mut self, amount: f64) -> Result<(), PracticeError> {
        self.ensure_open()?;
        if amount.is_finite() && amount > 0.0 {
            self.penalty += amount;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `PracticeError::SessionClosed` after completion.
    pub fn use_hint(&mut self) -> Result<u32, PracticeError> {
        self.ensure_open()?;
        self.hints_used = self.hints_used.saturating_add(1);
        Ok(self.hints_used)
    }

    /// Attach the controller's current advisory difficulty.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionClosed` after completion.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Result<(), PracticeError> {
        self.ensure_open()?;
        self.difficulty = difficulty;
        Ok(())
    }

    /// Close the session. `active_time` excludes pauses.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::SessionClosed` if already completed.
    pub fn complete(
        &mut self,
        end_time: DateTime<Utc>,
        active_time: Duration,
    ) -> Result<(), PracticeError> {
        self.ensure_open()?;
        let end_time = end_time.max(self.start_time);
        self.end_time = Some(end_time);
        self.time_spent_seconds = u64::try_from(active_time.num_seconds()).unwrap_or(0);
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> PracticeId {
        self.id
    }

    #[must_use]
    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    #[must_use]
    pub fn questions(&self) -> &[PracticeQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    /// Points earned so far; never decreases.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// Earned points minus negative marking, never below zero.
    #[must_use]
    pub fn net_score(&self) -> f64 {
        (f64::from(self.score) - self.penalty).max(0.0)
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }

    #[must_use]
    pub fn hints_used(&self) -> u32 {
        self.hints_used
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    #[must_use]
    pub fn answered_count(&self) -> u32 {
        u32::try_from(self.answers.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        let correct = self.answers.iter().filter(|a| a.correct).count();
        u32::try_from(correct).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.answered_count().saturating_sub(self.correct_count())
    }

    /// Correct answers over answered questions, in percent; 0 when nothing was answered.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        percent(self.correct_count(), self.answered_count())
    }

    /// Correct answers over questions asked, in percent; 0 for an empty session.
    #[must_use]
    pub fn score_percent(&self) -> f64 {
        percent(self.correct_count(), self.total_questions)
    }

    /// Mean response time across answers, in seconds.
    #[must_use]
    pub fn average_response_seconds(&self) -> f64 {
        if self.answers.is_empty() {
            return 0.0;
        }
        let total_ms: u64 = self.answers.iter().map(|a| a.response_ms).sum();
        #[allow(clippy::cast_precision_loss)]
        let avg = total_ms as f64 / self.answers.len() as f64;
        avg / 1000.0
    }

    /// Score for one topic: correct answers in that topic over its questions.
    #[must_use]
    pub fn topic_score_percent(&self, topic: &str) -> Option<f64> {
        let asked = self.questions.iter().filter(|q| q.topic() == topic).count();
        if asked == 0 {
            return None;
        }
        let correct = self
            .answers
            .iter()
            .filter(|a| a.correct && a.topic == topic)
            .count();
        Some(percent(
            u32::try_from(correct).unwrap_or(u32::MAX),
            u32::try_from(asked).unwrap_or(u32::MAX),
        ))
    }

    /// Distinct topics referenced by this session's questions, in first-seen order.
    #[must_use]
    pub fn topics(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for question in &self.questions {
            if !seen.contains(&question.topic()) {
                seen.push(question.topic());
            }
        }
        seen
    }

    /// Seconds elapsed between start and `now` (or end time once closed).
    #[must_use]
    pub fn wall_seconds(&self, now: DateTime<Utc>) -> f64 {
        let end = self.end_time.unwrap_or(now);
        seconds_f64(end - self.start_time)
    }
}

/// `part / whole` in percent, 0 when `whole` is 0.
#[must_use]
pub fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    f64::from(part) / f64::from(whole) * 100.0
}

//
// ─── SESSION HISTORY ───────────────────────────────────────────────────────────
//

/// Append-only log of completed practice sessions, owned by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHistory {
    sessions: Vec<PracticeSession>,
}

impl SessionHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed session.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::SessionOpen` for a session without an end time,
    /// and `HistoryError::Duplicate` if the same session was appended before.
    pub fn append(&mut self, session: PracticeSession) -> Result<(), HistoryError> {
        if !session.is_complete() {
            return Err(HistoryError::SessionOpen);
        }
        if self.sessions.iter().any(|s| s.id() == session.id()) {
            return Err(HistoryError::Duplicate(session.id()));
        }
        self.sessions.push(session);
        Ok(())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[PracticeSession] {
        &self.sessions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PracticeSession> {
        self.sessions.iter()
    }
}
