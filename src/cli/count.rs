use anyhow::Result;

use crate::core::AppConfig;
use crate::tokenizer::{BpeTokenizer, Tokenizer};

pub fn run(text: &str, config: &AppConfig) -> Result<()> {
    let tokenizer = BpeTokenizer::from_encoding(&config.encoding)?;
    let count = tokenizer.count_tokens(text);
    tracing::debug!("Counted {} tokens with {}", count, tokenizer.name());
    println!("{}", count);
    Ok(())
}
