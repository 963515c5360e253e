use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentAction {
    Query,
    Create,
    Update,
    Delete,
    Unknown,
}

impl IntentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse used on model output; anything unrecognised is `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "query" | "search" | "find" | "read" => Self::Query,
            "create" | "insert" | "add" => Self::Create,
            "update" | "edit" => Self::Update,
            "delete" | "remove" => Self::Delete,
            _ => Self::Unknown,
        }
    }
}

/// Advisory classification of a user request. Not used as a routing gate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: IntentAction,
    pub confidence: f32,
}

impl Intent {
    pub fn new(action: IntentAction, confidence: f32) -> Self {
        let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
        Self { action, confidence }
    }

    pub fn unknown() -> Self {
        Self { action: IntentAction::Unknown, confidence: 0.0 }
    }
}

impl Default for Intent {
    fn default() -> Self {
        Self::unknown()
    }
}
