//! Lines printed to the terminal about token usage.
use std::fmt;

use crate::chat::models::{ContextWarning, UsageRecord};

impl fmt::Display for UsageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Tokens - Prompt: {} | History: {} | Response: {}]",
            self.prompt_tokens, self.history_tokens, self.response_tokens
        )
    }
}

impl fmt::Display for ContextWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Warning: Context window at {}/{} tokens ({}%)\nConsider using '/clear' to reset conversation history.",
            self.token_count, self.context_window, self.percent
        )
    }
}

pub fn prompt_prefix(percent: u32) -> String {
    format!("[{}%] > ", percent)
}

pub fn clear_notice(session_tokens_used: usize) -> String {
    format!("[History cleared. Tokens used in session: {}]", session_tokens_used)
}

pub fn command_help() -> String {
    [
        "=== Available Commands ===",
        "  /help       - Show this help message",
        "  /exit       - Exit the session",
        "  /quit       - Exit the session",
        "  /clear      - Clear conversation history",
    ]
    .join("\n")
}

pub fn session_summary(session_tokens_used: usize) -> String {
    format!("Total tokens used in session: {}", session_tokens_used)
}
