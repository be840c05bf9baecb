//! The core models for keeping track of token usage in a chat session.
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

/// A single turn in the conversation. The token count is computed
/// once when the message is recorded and can't be changed after.
/// Only a `Ledger` creates messages, so they can't be read back in
/// with an arbitrary count:
///
/// ```compile_fail
/// let msg: tokenledger::chat::Message =
///     serde_json::from_str(r#"{"role":"user","content":"hi","token_count":99}"#).unwrap();
/// ```
#[derive(Clone, Serialize, Debug, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
    token_count: usize,
}

impl Message {
    pub(crate) fn new(role: Role, content: &str, token_count: usize) -> Self {
        Message {
            role,
            content: content.to_string(),
            token_count,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }
}

/// Token usage for one exchange. `history_tokens` is the context
/// consumed by the request, measured before the reply was appended.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct UsageRecord {
    pub prompt_tokens: usize,
    pub history_tokens: usize,
    pub response_tokens: usize,
}

/// A completed user/assistant round trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    pub prompt: Message,
    pub response: Message,
    pub usage: UsageRecord,
}

/// Reported when the history has crossed the warning threshold of
/// the context window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextWarning {
    pub token_count: usize,
    pub context_window: usize,
    pub percent: u32,
}
