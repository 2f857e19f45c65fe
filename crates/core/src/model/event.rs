use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{CardId, Difficulty, EventId, PracticeId, PracticeMode, QuestionId, ReviewOutcome, SessionId};

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Who is learning what; attached to a telemetry session at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub user_id: String,
    pub course_id: Option<String>,
}

impl SessionMetadata {
    #[must_use]
    pub fn new(user_id: impl Into<String>, course_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            course_id,
        }
    }
}

/// The live telemetry session owned by one collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: SessionId,
    started_at: DateTime<Utc>,
    is_active: bool,
    metadata: SessionMetadata,
}

impl Session {
    #[must_use]
    pub fn start(metadata: SessionMetadata, started_at: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::generate(),
            started_at,
            is_active: true,
            metadata,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Mark the session as torn down. Idempotent.
    pub fn end(&mut self) {
        self.is_active = false;
    }
}

//
// ─── EVENT KINDS ───────────────────────────────────────────────────────────────
//

/// Discriminant of an [`EventPayload`], useful for filtering and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    SessionStarted,
    SessionEnded,
    PageViewed,
    VideoPlayed,
    VideoPaused,
    VideoSeeked,
    VideoCompleted,
    ChatMessageSent,
    VoiceStarted,
    VoiceEnded,
    QuestionAnswered,
    HintUsed,
    FlashcardReviewed,
    PracticeStarted,
    PracticeCompleted,
    Custom,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::SessionEnded => "session_ended",
            Self::PageViewed => "page_viewed",
            Self::VideoPlayed => "video_played",
            Self::VideoPaused => "video_paused",
            Self::VideoSeeked => "video_seeked",
            Self::VideoCompleted => "video_completed",
            Self::ChatMessageSent => "chat_message_sent",
            Self::VoiceStarted => "voice_started",
            Self::VoiceEnded => "voice_ended",
            Self::QuestionAnswered => "question_answered",
            Self::HintUsed => "hint_used",
            Self::FlashcardReviewed => "flashcard_reviewed",
            Self::PracticeStarted => "practice_started",
            Self::PracticeCompleted => "practice_completed",
            Self::Custom => "custom",
        }
    }
}

//
// ─── PAYLOADS ──────────────────────────────────────────────────────────────────
//

/// Typed payload of an interaction event, one case per kind.
///
/// On the wire the discriminant is written as `kind` next to a `payload`
/// object, matching the ingestion contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum EventPayload {
    SessionStarted {
        course_id: Option<String>,
    },
    SessionEnded {
        duration_seconds: u64,
    },
    PageViewed {
        path: String,
    },
    VideoPlayed {
        video_id: String,
        position_seconds: f64,
    },
    VideoPaused {
        video_id: String,
        position_seconds: f64,
    },
    VideoSeeked {
        video_id: String,
        from_seconds: f64,
        to_seconds: f64,
    },
    VideoCompleted {
        video_id: String,
    },
    ChatMessageSent {
        characters: u32,
    },
    VoiceStarted {
        language: Option<String>,
    },
    VoiceEnded {
        duration_seconds: u64,
    },
    QuestionAnswered {
        practice_id: PracticeId,
        question_id: QuestionId,
        correct: bool,
        response_ms: u64,
        difficulty: Difficulty,
    },
    HintUsed {
        practice_id: PracticeId,
        question_id: QuestionId,
    },
    FlashcardReviewed {
        card_id: CardId,
        outcome: ReviewOutcome,
        response_ms: u64,
    },
    PracticeStarted {
        practice_id: PracticeId,
        mode: PracticeMode,
    },
    PracticeCompleted {
        practice_id: PracticeId,
        mode: PracticeMode,
        score: f64,
        accuracy: f64,
    },
    Custom {
        name: String,
        data: Map<String, Value>,
    },
}

impl EventPayload {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SessionStarted { .. } => EventKind::SessionStarted,
            Self::SessionEnded { .. } => EventKind::SessionEnded,
            Self::PageViewed { .. } => EventKind::PageViewed,
            Self::VideoPlayed { .. } => EventKind::VideoPlayed,
            Self::VideoPaused { .. } => EventKind::VideoPaused,
            Self::VideoSeeked { .. } => EventKind::VideoSeeked,
            Self::VideoCompleted { .. } => EventKind::VideoCompleted,
            Self::ChatMessageSent { .. } => EventKind::ChatMessageSent,
            Self::VoiceStarted { .. } => EventKind::VoiceStarted,
            Self::VoiceEnded { .. } => EventKind::VoiceEnded,
            Self::QuestionAnswered { .. } => EventKind::QuestionAnswered,
            Self::HintUsed { .. } => EventKind::HintUsed,
            Self::FlashcardReviewed { .. } => EventKind::FlashcardReviewed,
            Self::PracticeStarted { .. } => EventKind::PracticeStarted,
            Self::PracticeCompleted { .. } => EventKind::PracticeCompleted,
            Self::Custom { .. } => EventKind::Custom,
        }
    }

    /// Free-form event for collaborators that have no dedicated variant yet.
    #[must_use]
    pub fn custom(name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::Custom {
            name: name.into(),
            data,
        }
    }
}

//
// ─── EVENT ─────────────────────────────────────────────────────────────────────
//

/// One captured interaction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    id: EventId,
    timestamp: DateTime<Utc>,
    session_id: SessionId,
    #[serde(flatten)]
    payload: EventPayload,
}

impl InteractionEvent {
    #[must_use]
    pub fn new(session_id: SessionId, payload: EventPayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: EventId::generate(),
            timestamp,
            session_id,
            payload,
        }
    }

    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    #[must_use]
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }
}
