//! Boundary parsing for content supplied as JSON strings.
//!
//! Every payload is validated once, here, and converted into a typed value.
//! Malformed input never reaches the practice components: decks degrade to an
//! empty list and structured payloads to [`ContentPayload::Invalid`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::model::{CardId, Difficulty, Flashcard, FlashcardError, PracticeQuestion, QuestionError};

/// Deepest mind map accepted from content.
pub const MAX_MINDMAP_DEPTH: usize = 8;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ContentError {
    #[error("malformed JSON: {0}")]
    Json(String),

    #[error("expected a JSON array of items")]
    NotAList,

    #[error("invalid flashcard: {0}")]
    Flashcard(#[from] FlashcardError),

    #[error("invalid question: {0}")]
    Question(#[from] QuestionError),

    #[error("invalid {kind}: {reason}")]
    Schema { kind: &'static str, reason: String },
}

//
// ─── STRUCTURED PAYLOADS ───────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleplayRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleplayScenario {
    pub title: String,
    #[serde(default)]
    pub setting: String,
    pub roles: Vec<RoleplayRole>,
    #[serde(default)]
    pub objectives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapNode {
    pub label: String,
    #[serde(default)]
    pub children: Vec<MindmapNode>,
}

impl MindmapNode {
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(MindmapNode::depth).max().unwrap_or(0)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(MindmapNode::node_count).sum::<usize>()
    }

    fn has_blank_label(&self) -> bool {
        self.label.trim().is_empty() || self.children.iter().any(MindmapNode::has_blank_label)
    }
}

/// A structured content payload, or the single fallback for anything malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPayload {
    Roleplay(RoleplayScenario),
    Mindmap(MindmapNode),
    Invalid { reason: String },
}

impl ContentPayload {
    #[must_use]
    pub fn parse_roleplay(raw: &str) -> Self {
        match try_parse_roleplay(raw) {
            Ok(scenario) => Self::Roleplay(scenario),
            Err(err) => Self::invalid(&err),
        }
    }

    #[must_use]
    pub fn parse_mindmap(raw: &str) -> Self {
        match try_parse_mindmap(raw) {
            Ok(root) => Self::Mindmap(root),
            Err(err) => Self::invalid(&err),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid { .. })
    }

    fn invalid(err: &ContentError) -> Self {
        warn!(error = %err, "discarding invalid content payload");
        Self::Invalid {
            reason: err.to_string(),
        }
    }
}

/// # Errors
///
/// Returns `ContentError` for malformed JSON, no roles, or a blank title.
pub fn try_parse_roleplay(raw: &str) -> Result<RoleplayScenario, ContentError> {
    let scenario: RoleplayScenario =
        serde_json::from_str(raw).map_err(|e| ContentError::Json(e.to_string()))?;
    if scenario.title.trim().is_empty() {
        return Err(schema("roleplay", "title is empty"));
    }
    if scenario.roles.is_empty() {
        return Err(schema("roleplay", "at least one role is required"));
    }
    if scenario.roles.iter().any(|r| r.name.trim().is_empty()) {
        return Err(schema("roleplay", "role name is empty"));
    }
    Ok(scenario)
}

/// # Errors
///
/// Returns `ContentError` for malformed JSON, blank labels, or excessive depth.
pub fn try_parse_mindmap(raw: &str) -> Result<MindmapNode, ContentError> {
    let root: MindmapNode =
        serde_json::from_str(raw).map_err(|e| ContentError::Json(e.to_string()))?;
    if root.has_blank_label() {
        return Err(schema("mindmap", "node label is empty"));
    }
    if root.depth() > MAX_MINDMAP_DEPTH {
        return Err(schema(
            "mindmap",
            format!("depth {} exceeds {MAX_MINDMAP_DEPTH}", root.depth()),
        ));
    }
    Ok(root)
}

fn schema(kind: &'static str, reason: impl Into<String>) -> ContentError {
    ContentError::Schema {
        kind,
        reason: reason.into(),
    }
}

//
// ─── DECKS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct FlashcardDraft {
    id: CardId,
    front: String,
    back: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    difficulty: Difficulty,
}

fn parse_items(raw: &str) -> Result<Vec<Value>, ContentError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| ContentError::Json(e.to_string()))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(ContentError::NotAList),
    }
}

/// Parse a whole flashcard deck, failing on the first bad card.
///
/// # Errors
///
/// Returns `ContentError` describing the first problem found.
pub fn try_parse_flashcards(raw: &str) -> Result<Vec<Flashcard>, ContentError> {
    parse_items(raw)?
        .into_iter()
        .map(|item| {
            let draft: FlashcardDraft =
                serde_json::from_value(item).map_err(|e| ContentError::Json(e.to_string()))?;
            Ok(Flashcard::new(draft.id, draft.front, draft.back, draft.topic, draft.difficulty)?)
        })
        .collect()
}

/// Lenient deck parsing: bad cards are skipped, a bad document yields no cards.
#[must_use]
pub fn parse_flashcards(raw: &str) -> Vec<Flashcard> {
    let items = match parse_items(raw) {
        Ok(items) => items,
        Err(err) => {
            warn!(error = %err, "flashcard deck is unreadable; using an empty deck");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let parsed = serde_json::from_value::<FlashcardDraft>(item)
                .map_err(|e| ContentError::Json(e.to_string()))
                .and_then(|d| {
                    Flashcard::new(d.id, d.front, d.back, d.topic, d.difficulty)
                        .map_err(ContentError::from)
                });
            match parsed {
                Ok(card) => Some(card),
                Err(err) => {
                    warn!(index, error = %err, "skipping invalid flashcard");
                    None
                }
            }
        })
        .collect()
}

/// Lenient question parsing: bad questions are skipped, a bad document yields none.
#[must_use]
pub fn parse_questions(raw: &str) -> Vec<PracticeQuestion> {
    let items = match parse_items(raw) {
        Ok(items) => items,
        Err(err) => {
            warn!(error = %err, "question set is unreadable; using no questions");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let parsed = serde_json::from_value::<PracticeQuestion>(item)
                .map_err(|e| ContentError::Json(e.to_string()))
                .and_then(|q| q.validate().map(|()| q).map_err(ContentError::from));
            match parsed {
                Ok(question) => Some(question),
                Err(err) => {
                    warn!(index, error = %err, "skipping invalid question");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roleplay_parses_and_validates() {
        let raw = r#"{"title":"Ordering coffee","roles":[{"name":"barista"},{"name":"customer"}],"objectives":["greet"]}"#;
        let ContentPayload::Roleplay(scenario) = ContentPayload::parse_roleplay(raw) else {
            panic!("expected a roleplay");
        };
        assert_eq!(scenario.roles.len(), 2);
        assert!(scenario.setting.is_empty());
    }

    #[test]
    fn roleplay_without_roles_is_invalid() {
        let payload = ContentPayload::parse_roleplay(r#"{"title":"x","roles":[]}"#);
        assert!(!payload.is_valid());
        let payload = ContentPayload::parse_roleplay("{not json");
        assert!(matches!(payload, ContentPayload::Invalid { .. }));
    }

    #[test]
    fn mindmap_depth_is_bounded() {
        let mut raw = String::from(r#"{"label":"leaf"}"#);
        for _ in 0..MAX_MINDMAP_DEPTH {
            raw = format!(r#"{{"label":"n","children":[{raw}]}}"#);
        }
        assert!(matches!(
            try_parse_mindmap(&raw),
            Err(ContentError::Schema { kind: "mindmap", .. })
        ));

        let ok = try_parse_mindmap(r#"{"label":"root","children":[{"label":"a"},{"label":"b"}]}"#)
            .unwrap();
        assert_eq!(ok.node_count(), 3);
        assert_eq!(ok.depth(), 2);
    }

    #[test]
    fn lenient_deck_skips_bad_cards() {
        let raw = r#"[
            {"id": 1, "front": "borrow", "back": "reference", "topic": "rust"},
            {"id": 2, "front": "", "back": "missing front"},
            {"front": "no id", "back": "x"}
        ]"#;
        let cards = parse_flashcards(raw);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].topic(), "rust");

        assert!(try_parse_flashcards(raw).is_err());
        assert!(parse_flashcards("{}").is_empty());
        assert!(parse_flashcards("garbage").is_empty());
    }

    #[test]
    fn lenient_questions_skip_invalid_entries() {
        let raw = r#"[
            {"id": 1, "type": "free_text", "prompt": "2+2", "correctAnswer": "4", "topic": "math"},
            {"id": 2, "type": "multiple_choice", "options": ["a"], "prompt": "p", "correctAnswer": "a", "topic": "t"}
        ]"#;
        let questions = parse_questions(raw);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].topic(), "math");
    }
}
