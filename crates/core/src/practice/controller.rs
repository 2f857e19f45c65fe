use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, PracticeError, PracticeQuestion};

/// Streak length that pays the bonus.
pub const STREAK_BONUS_THRESHOLD: u32 = 5;
/// Bonus points paid when the streak reaches [`STREAK_BONUS_THRESHOLD`].
pub const STREAK_BONUS_POINTS: u32 = 5;
/// Consecutive correct answers needed for one difficulty step up.
pub const RUN_LENGTH_FOR_STEP_UP: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyChange {
    Increased,
    Decreased,
}

/// Outcome of one graded answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub correct: bool,
    /// Question points plus any streak bonus; 0 for an incorrect answer.
    pub points_awarded: u32,
    pub bonus_awarded: bool,
    pub streak: u32,
    pub difficulty: Difficulty,
    pub difficulty_change: Option<DifficultyChange>,
}

/// Tracks the answer streak and steers the advisory difficulty.
///
/// - correct: streak +1; the streak reaching 5 pays a 5 point bonus once per
///   streak window; every 3rd consecutive correct answer raises difficulty.
/// - incorrect: streak resets; difficulty drops one step.
///
/// # Examples
///
/// ```
/// # use learn_core::practice::DifficultyController;
/// # use learn_core::model::Difficulty;
/// let mut controller = DifficultyController::new(Difficulty::MIN);
/// for _ in 0..3 {
///     controller.record(true, 1);
/// }
/// assert_eq!(controller.target_difficulty().value(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyController {
    difficulty: Difficulty,
    streak: u32,
    best_streak: u32,
}

impl DifficultyController {
    #[must_use]
    pub fn new(initial: Difficulty) -> Self {
        Self {
            difficulty: initial,
            streak: 0,
            best_streak: 0,
        }
    }

    #[must_use]
    pub fn target_difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    /// Grade a submission against a question and record the result.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::EmptyAnswer` for a blank submission; the
    /// controller state is unchanged in that case.
    pub fn answer(
        &mut self,
        question: &PracticeQuestion,
        submission: &str,
    ) -> Result<AnswerFeedback, PracticeError> {
        let correct = question.check(submission)?;
        Ok(self.record(correct, question.points()))
    }

    /// Record an already graded answer worth `points` when correct.
    pub fn record(&mut self, correct: bool, points: u32) -> AnswerFeedback {
        if !correct {
            self.streak = 0;
            let lowered = self.difficulty.step_down();
            let difficulty_change = (lowered != self.difficulty).then_some(DifficultyChange::Decreased);
            self.difficulty = lowered;
            return AnswerFeedback {
                correct,
                points_awarded: 0,
                bonus_awarded: false,
                streak: 0,
                difficulty: self.difficulty,
                difficulty_change,
            };
        }

        self.streak = self.streak.saturating_add(1);
        self.best_streak = self.best_streak.max(self.streak);

        let bonus_awarded = self.streak == STREAK_BONUS_THRESHOLD;
        let points_awarded = if bonus_awarded {
            points.saturating_add(STREAK_BONUS_POINTS)
        } else {
            points
        };

        let mut difficulty_change = None;
        if self.streak % RUN_LENGTH_FOR_STEP_UP == 0 {
            let raised = self.difficulty.step_up();
            if raised != self.difficulty {
                difficulty_change = Some(DifficultyChange::Increased);
            }
            self.difficulty = raised;
        }

        AnswerFeedback {
            correct,
            points_awarded,
            bonus_awarded,
            streak: self.streak,
            difficulty: self.difficulty,
            difficulty_change,
        }
    }
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new(Difficulty::default())
    }
}
