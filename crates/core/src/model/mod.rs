pub mod content;
mod difficulty;
mod event;
mod flashcard;
mod ids;
mod practice;
mod question;

pub use content::{ContentError, ContentPayload, MindmapNode, RoleplayScenario};
pub use difficulty::Difficulty;
pub use event::{EventKind, EventPayload, InteractionEvent, Session, SessionMetadata};
pub use flashcard::{Flashcard, FlashcardError, MAX_REPETITION_LEVEL, ReviewOutcome};
pub use ids::{CardId, EventId, PracticeId, QuestionId, SessionId};
pub use practice::{
    AnswerRecord, HistoryError, PracticeError, PracticeMode, PracticeSession, SessionHistory,
    percent,
};
pub use question::{AcceptedAnswers, PracticeQuestion, QuestionError, QuestionKind};
