//! Token counting for chat messages.
//!
//! The ledger only needs a way to turn text into a number of tokens
//! so the tokenizer is a trait. Swapping model providers means
//! swapping the implementation, nothing else.
use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};
use tiktoken_rs::CoreBPE;

use crate::chat::Message;

pub const DEFAULT_ENCODING: &str = "cl100k_base";

/// Framing added to each message when the history is sent to an
/// OpenAI style chat endpoint (role and separators).
pub const MESSAGE_OVERHEAD: usize = 4;

/// Framing added once for the whole message list.
pub const LIST_OVERHEAD: usize = 2;

pub trait Tokenizer {
    fn count_tokens(&self, text: &str) -> usize;
    fn name(&self) -> &str;
}

pub type SharedTokenizer = Arc<dyn Tokenizer + Send + Sync + 'static>;

/// Byte pair encoding tokenizer backed by `tiktoken`.
pub struct BpeTokenizer {
    encoding: String,
    bpe: CoreBPE,
}

impl BpeTokenizer {
    /// Loads the named encoding. Anything other than the encodings
    /// bundled with `tiktoken` is a configuration error.
    pub fn from_encoding(name: &str) -> Result<Self> {
        let bpe = match name {
            "cl100k_base" => tiktoken_rs::cl100k_base()?,
            "p50k_base" => tiktoken_rs::p50k_base()?,
            "p50k_edit" => tiktoken_rs::p50k_edit()?,
            "r50k_base" => tiktoken_rs::r50k_base()?,
            other => bail!(
                "Unknown tokenizer encoding '{}'. Expected one of: cl100k_base, p50k_base, p50k_edit, r50k_base",
                other
            ),
        };
        tracing::debug!("Loaded tokenizer encoding {}", name);

        Ok(Self {
            encoding: name.to_string(),
            bpe,
        })
    }

    pub fn shared(self) -> SharedTokenizer {
        Arc::new(self)
    }
}

impl fmt::Debug for BpeTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BpeTokenizer")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl Tokenizer for BpeTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        // Special tokens in message text count as plain text
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.encoding
    }
}

/// Estimates how many tokens `messages` occupy on the wire,
/// including the per-message framing the chat endpoint adds.
pub fn count_messages(messages: &[Message]) -> usize {
    let content: usize = messages.iter().map(Message::token_count).sum();
    content + messages.len() * MESSAGE_OVERHEAD + LIST_OVERHEAD
}
