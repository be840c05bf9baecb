use std::io;
use std::path::Path;

use anyhow::Result;

use crate::chat::Ledger;
use crate::chat::Transcript;
use crate::chat::transcript::replay;
use crate::core::AppConfig;
use crate::tokenizer::BpeTokenizer;

pub fn run(path: &Path, config: &AppConfig) -> Result<()> {
    let transcript = Transcript::from_path(path)?;
    let tokenizer = BpeTokenizer::from_encoding(&config.encoding)?.shared();

    // A prompt in the transcript wins over the configured one
    let system_prompt = transcript
        .system_prompt
        .as_deref()
        .unwrap_or(config.system_prompt.as_str());
    let mut ledger = Ledger::with_system_prompt(tokenizer, config.ledger, system_prompt)?;

    let summary = replay(&mut ledger, &transcript.turns, &mut io::stdout().lock())?;
    tracing::info!(
        "Replayed {} exchanges ({} clears, {} warnings) from {}",
        summary.exchanges,
        summary.clears,
        summary.warnings,
        path.display()
    );

    Ok(())
}
