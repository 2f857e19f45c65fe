use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal difficulty on a 1..=5 scale.
///
/// Content collaborators send either a number or a label; both normalize here.
/// Numbers outside the scale are clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "DifficultyRepr", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: Self = Self(1);
    pub const MAX: Self = Self(5);

    /// Clamp any integer into the supported range.
    #[must_use]
    pub fn new(level: i64) -> Self {
        let clamped = level.clamp(i64::from(Self::MIN.0), i64::from(Self::MAX.0));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self(clamped as u8)
    }

    /// Parse a textual label such as `"easy"` or `"advanced"`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "beginner" | "easy" => Some(Self(1)),
            "elementary" => Some(Self(2)),
            "intermediate" | "medium" => Some(Self(3)),
            "advanced" | "hard" => Some(Self(4)),
            "expert" => Some(Self(5)),
            other => other.parse::<i64>().ok().map(Self::new),
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// One step harder, capped at `MAX`.
    #[must_use]
    pub fn step_up(self) -> Self {
        Self(self.0.saturating_add(1).min(Self::MAX.0))
    }

    /// One step easier, floored at `MIN`.
    #[must_use]
    pub fn step_down(self) -> Self {
        Self(self.0.saturating_sub(1).max(Self::MIN.0))
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "beginner",
            2 => "elementary",
            3 => "intermediate",
            4 => "advanced",
            _ => "expert",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(3)
    }
}

impl From<Difficulty> for u8 {
    fn from(value: Difficulty) -> Self {
        value.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DifficultyRepr {
    Number(i64),
    Label(String),
}

impl TryFrom<DifficultyRepr> for Difficulty {
    type Error = String;

    fn try_from(value: DifficultyRepr) -> Result<Self, Self::Error> {
        match value {
            DifficultyRepr::Number(n) => Ok(Self::new(n)),
            DifficultyRepr::Label(label) => {
                Self::from_label(&label).ok_or_else(|| format!("unknown difficulty `{label}`"))
            }
        }
    }
}
