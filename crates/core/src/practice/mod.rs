//! Adaptive practice rules shared by the speed drill and the quiz.
//!
//! Answer grading lives on [`crate::model::PracticeQuestion::check`]; this
//! module turns a stream of graded answers into streaks, points and an
//! advisory difficulty, and rates drill throughput.

mod controller;
mod speed;

pub use controller::{
    AnswerFeedback, DifficultyChange, DifficultyController, RUN_LENGTH_FOR_STEP_UP,
    STREAK_BONUS_POINTS, STREAK_BONUS_THRESHOLD,
};
pub use speed::{SpeedTier, answers_per_minute};
