//! Test utilities for integration tests
#![allow(dead_code)]
use std::sync::Arc;

use tokenledger::chat::Ledger;
use tokenledger::core::LedgerConfig;
use tokenledger::tokenizer::{BpeTokenizer, DEFAULT_ENCODING, SharedTokenizer, Tokenizer};

/// Counts one token per whitespace separated word so expected totals
/// are easy to work out by hand.
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn name(&self) -> &str {
        "words"
    }
}

pub fn words() -> SharedTokenizer {
    Arc::new(WordTokenizer)
}

pub fn cl100k() -> SharedTokenizer {
    BpeTokenizer::from_encoding(DEFAULT_ENCODING)
        .expect("Failed to load cl100k_base")
        .shared()
}

/// A message of exactly `n` words.
pub fn text_of(n: usize) -> String {
    vec!["w"; n].join(" ")
}

pub fn word_ledger(system_prompt: Option<&str>) -> Ledger {
    match system_prompt {
        Some(prompt) => Ledger::with_system_prompt(words(), LedgerConfig::default(), prompt),
        None => Ledger::new(words(), LedgerConfig::default()),
    }
    .expect("Failed to create ledger")
}
