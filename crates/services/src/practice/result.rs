use serde::{Deserialize, Serialize};

use learn_core::model::{Difficulty, PracticeId, PracticeMode};
use learn_core::practice::SpeedTier;

use crate::review_session::ReviewSummary;

/// Final figures of a speed drill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillResult {
    pub practice_id: PracticeId,
    pub total_answered: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub average_response_seconds: f64,
    /// Answers per minute of active time.
    pub rate_per_minute: f64,
    pub accuracy: f64,
    pub best_streak: u32,
    pub points: u32,
    pub tier: SpeedTier,
    pub met_target: bool,
    pub active_seconds: f64,
    pub timed_out: bool,
    pub final_difficulty: Difficulty,
}

/// Final figures of a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub practice_id: PracticeId,
    pub total_questions: u32,
    pub answered: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub average_response_seconds: f64,
    pub accuracy: f64,
    pub best_streak: u32,
    pub points: u32,
    pub penalty: f64,
    /// `max(0, points - penalty)`.
    pub net_score: f64,
    pub score_percent: f64,
    pub hints_used: u32,
    pub elapsed_seconds: f64,
    /// Time spent answering, pauses excluded.
    pub active_seconds: f64,
    pub timed_out: bool,
    pub final_difficulty: Difficulty,
}

/// What the host receives when any practice mode completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PracticeResult {
    Flashcards(ReviewSummary),
    SpeedDrill(DrillResult),
    Quiz(QuizResult),
}

impl PracticeResult {
    #[must_use]
    pub fn mode(&self) -> PracticeMode {
        match self {
            Self::Flashcards(_) => PracticeMode::Flashcards,
            Self::SpeedDrill(_) => PracticeMode::SpeedDrill,
            Self::Quiz(_) => PracticeMode::Quiz,
        }
    }

    #[must_use]
    pub fn practice_id(&self) -> PracticeId {
        match self {
            Self::Flashcards(r) => r.practice_id,
            Self::SpeedDrill(r) => r.practice_id,
            Self::Quiz(r) => r.practice_id,
        }
    }

    /// Correct cards for flashcards, points for drills, net score for quizzes.
    #[must_use]
    pub fn score(&self) -> f64 {
        match self {
            Self::Flashcards(r) => f64::from(r.correct),
            Self::SpeedDrill(r) => f64::from(r.points),
            Self::Quiz(r) => r.net_score,
        }
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        match self {
            Self::Flashcards(r) => r.accuracy,
            Self::SpeedDrill(r) => r.accuracy,
            Self::Quiz(r) => r.accuracy,
        }
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        match self {
            Self::Flashcards(r) => r.cards_reviewed,
            Self::SpeedDrill(r) => r.total_answered,
            Self::Quiz(r) => r.answered,
        }
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        match self {
            Self::Flashcards(r) => r.elapsed_seconds,
            Self::SpeedDrill(r) => r.active_seconds,
            Self::Quiz(r) => r.elapsed_seconds,
        }
    }
}
