use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Difficulty, PracticeError, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question has no accepted answer")]
    MissingAnswer,

    #[error("multiple choice question needs at least two options")]
    TooFewOptions,

    #[error("accepted answer `{0}` is not one of the options")]
    AnswerNotAnOption(String),
}

//
// ─── QUESTION KIND ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    FreeText,
    MultipleChoice { options: Vec<String> },
    TrueFalse,
}

/// Accepted answers; content may send a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AnswerRepr", into = "Vec<String>")]
pub struct AcceptedAnswers(Vec<String>);

impl AcceptedAnswers {
    #[must_use]
    pub fn one(answer: impl Into<String>) -> Self {
        Self(vec![answer.into()])
    }

    #[must_use]
    pub fn many<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(answers.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    fn contains_normalized(&self, normalized: &str) -> bool {
        self.0.iter().any(|accepted| normalize(accepted) == normalized)
    }
}

impl From<AcceptedAnswers> for Vec<String> {
    fn from(value: AcceptedAnswers) -> Self {
        value.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerRepr {
    One(String),
    Many(Vec<String>),
}

impl From<AnswerRepr> for AcceptedAnswers {
    fn from(value: AnswerRepr) -> Self {
        match value {
            AnswerRepr::One(answer) => Self(vec![answer]),
            AnswerRepr::Many(answers) => Self(answers),
        }
    }
}

/// Trimmed, case-insensitive comparison key.
fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A question supplied by the content collaborator. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuestion {
    id: QuestionId,
    #[serde(flatten)]
    kind: QuestionKind,
    prompt: String,
    correct_answer: AcceptedAnswers,
    #[serde(default)]
    difficulty: Difficulty,
    topic: String,
    #[serde(default = "default_estimated_time")]
    estimated_time_seconds: u32,
    #[serde(default = "default_points")]
    points: u32,
}

fn default_estimated_time() -> u32 {
    30
}

fn default_points() -> u32 {
    1
}

impl PracticeQuestion {
    /// Build and validate a question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt is blank, no answer is accepted,
    /// or a multiple-choice answer is not among the options.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: QuestionId,
        kind: QuestionKind,
        prompt: impl Into<String>,
        correct_answer: AcceptedAnswers,
        difficulty: Difficulty,
        topic: impl Into<String>,
        estimated_time_seconds: u32,
        points: u32,
    ) -> Result<Self, QuestionError> {
        let question = Self {
            id,
            kind,
            prompt: prompt.into(),
            correct_answer,
            difficulty,
            topic: topic.into(),
            estimated_time_seconds,
            points,
        };
        question.validate()?;
        Ok(question)
    }

    /// Shorthand for a free-text question worth `points`.
    ///
    /// # Errors
    ///
    /// See [`PracticeQuestion::new`].
    pub fn free_text(
        id: QuestionId,
        prompt: impl Into<String>,
        answer: impl Into<String>,
        topic: impl Into<String>,
        points: u32,
    ) -> Result<Self, QuestionError> {
        Self::new(
            id,
            QuestionKind::FreeText,
            prompt,
            AcceptedAnswers::one(answer),
            Difficulty::default(),
            topic,
            default_estimated_time(),
            points,
        )
    }

    /// Check structural rules. Called at construction and at the content boundary.
    ///
    /// # Errors
    ///
    /// See [`PracticeQuestion::new`].
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if self
            .correct_answer
            .as_slice()
            .iter()
            .all(|a| a.trim().is_empty())
        {
            return Err(QuestionError::MissingAnswer);
        }
        if let QuestionKind::MultipleChoice { options } = &self.kind {
            if options.len() < 2 {
                return Err(QuestionError::TooFewOptions);
            }
            for accepted in self.correct_answer.as_slice() {
                let key = normalize(accepted);
                if !options.iter().any(|o| normalize(o) == key) {
                    return Err(QuestionError::AnswerNotAnOption(accepted.clone()));
                }
            }
        }
        Ok(())
    }

    /// Decide whether a submission is correct.
    ///
    /// Free text matches any accepted answer after trimming and lowercasing;
    /// choice questions test membership in the accepted set.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::EmptyAnswer` for a blank submission.
    pub fn check(&self, submission: &str) -> Result<bool, PracticeError> {
        let key = normalize(submission);
        if key.is_empty() {
            return Err(PracticeError::EmptyAnswer);
        }

        let correct = match &self.kind {
            QuestionKind::FreeText => self.correct_answer.contains_normalized(&key),
            QuestionKind::MultipleChoice { options } => {
                options.iter().any(|o| normalize(o) == key)
                    && self.correct_answer.contains_normalized(&key)
            }
            QuestionKind::TrueFalse => {
                let canonical = match key.as_str() {
                    "t" | "yes" => "true",
                    "f" | "no" => "false",
                    other => other,
                };
                self.correct_answer.contains_normalized(canonical)
            }
        };
        Ok(correct)
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> Option<&[String]> {
        match &self.kind {
            QuestionKind::MultipleChoice { options } => Some(options),
            _ => None,
        }
    }

    #[must_use]
    pub fn correct_answer(&self) -> &AcceptedAnswers {
        &self.correct_answer
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
    pub fn estimated_time_seconds(&self) -> u32 {
        self.estimated_time_seconds
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice() -> PracticeQuestion {
        PracticeQuestion::new(
            QuestionId::new(2),
            QuestionKind::MultipleChoice {
                options: vec!["Box".into(), "Rc".into(), "Arc".into()],
            },
            "Which pointer is thread-safe?",
            AcceptedAnswers::one("Arc"),
            Difficulty::new(2),
            "rust",
            20,
            2,
        )
        .unwrap()
    }

    #[test]
    fn free_text_is_trimmed_and_case_insensitive() {
        let q = PracticeQuestion::free_text(QuestionId::new(1), "2+2?", "Four", "math", 1).unwrap();
        assert!(q.check("  four ").unwrap());
        assert!(!q.check("five").unwrap());
    }

    #[test]
    fn blank_submission_is_rejected() {
        let q = PracticeQuestion::free_text(QuestionId::new(1), "2+2?", "4", "math", 1).unwrap();
        assert_eq!(q.check("   ").unwrap_err(), PracticeError::EmptyAnswer);
    }

    #[test]
    fn multiple_choice_uses_membership() {
        let q = choice();
        assert!(q.check("arc").unwrap());
        assert!(!q.check("Rc").unwrap());
        assert!(!q.check("Mutex").unwrap());
    }

    #[test]
    fn true_false_accepts_short_forms() {
        let q = PracticeQuestion::new(
            QuestionId::new(3),
            QuestionKind::TrueFalse,
            "Rust has a garbage collector",
            AcceptedAnswers::one("false"),
            Difficulty::MIN,
            "rust",
            10,
            1,
        )
        .unwrap();
        assert!(q.check("F").unwrap());
        assert!(q.check("no").unwrap());
        assert!(!q.check("true").unwrap());
    }

    #[test]
    fn answer_must_be_an_option() {
        let err = PracticeQuestion::new(
            QuestionId::new(4),
            QuestionKind::MultipleChoice {
                options: vec!["a".into(), "b".into()],
            },
            "pick",
            AcceptedAnswers::one("c"),
            Difficulty::MIN,
            "t",
            10,
            1,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::AnswerNotAnOption("c".into()));
    }

    #[test]
    fn deserializes_content_shape() {
        let raw = r#"{
            "id": 9,
            "type": "multiple_choice",
            "options": ["x", "y"],
            "prompt": "pick y",
            "correctAnswer": "y",
            "difficulty": "hard",
            "topic": "letters"
        }"#;
        let q: PracticeQuestion = serde_json::from_str(raw).unwrap();
        assert_eq!(q.points(), 1);
        assert_eq!(q.difficulty().value(), 4);
        assert_eq!(q.options().unwrap().len(), 2);
        assert!(q.check("Y").unwrap());
    }
}
