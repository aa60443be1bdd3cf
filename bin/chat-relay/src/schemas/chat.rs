//! Chat request / response types.
//!
//! The request shape mirrors what browser chat hooks post: a JSON object with
//! a `messages` array of `{ role, content }` turns.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Maximum number of turns forwarded upstream per request.
pub const MAX_WINDOW_TURNS: usize = 10;

/// Author of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Only user and assistant turns are forwarded; the system slot belongs
    /// to the relay's own instruction.
    pub fn is_forwarded(self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }
}

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    /// The role of the message author (`"user"`, `"assistant"`, `"system"`).
    pub role: Role,
    /// The text of the message.
    pub content: String,
}

impl ChatTurn {
    #[cfg(test)]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Request body accepted by the relay.
///
/// Used for the OpenAPI document; the handler itself inspects the raw JSON so
/// that malformed entries can be dropped one by one instead of rejecting the
/// whole request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// Conversation history, oldest first.
    pub messages: Vec<ChatTurn>,
}

/// The filtered, length-capped turns actually sent to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationWindow {
    turns: Vec<ChatTurn>,
}

impl ConversationWindow {
    /// Build a window from raw JSON entries. Entries that do not deserialize
    /// into a [`ChatTurn`] are dropped silently.
    pub fn from_values<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        Self::from_turns(
            entries
                .into_iter()
                .filter_map(|v| ChatTurn::deserialize(v).ok()),
        )
    }

    /// Keep forwarded roles only, then the last [`MAX_WINDOW_TURNS`] of them.
    pub fn from_turns<I>(turns: I) -> Self
    where
        I: IntoIterator<Item = ChatTurn>,
    {
        let mut turns: Vec<ChatTurn> = turns
            .into_iter()
            .filter(|t| t.role.is_forwarded())
            .collect();
        let excess = turns.len().saturating_sub(MAX_WINDOW_TURNS);
        turns.drain(..excess);
        Self { turns }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[cfg(test)]
    pub fn into_turns(self) -> Vec<ChatTurn> {
        self.turns
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hint: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), details: None, hint: None }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
