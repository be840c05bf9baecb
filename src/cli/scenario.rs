use anyhow::Result;

use crate::chat::Role;
use crate::chat::display::session_summary;
use crate::core::AppConfig;
use crate::scenarios::{self, Scenario};
use crate::tokenizer::BpeTokenizer;

pub fn run(scenario: Scenario, config: &AppConfig) -> Result<()> {
    let tokenizer = BpeTokenizer::from_encoding(&config.encoding)?.shared();
    let report = scenarios::run(scenario, tokenizer, config.ledger)?;

    for (i, step) in report.steps.iter().enumerate() {
        let flag = if step.exceeds_threshold { " *" } else { "" };
        println!("{:>3}: {} total {}{}", i + 1, step.usage, step.history_tokens, flag);
    }

    println!();
    match report.threshold_crossed_at {
        Some(crossing) => println!(
            "Warning threshold ({:.1} tokens) crossed at exchange {} by the {} message ({} tokens)",
            config.ledger.threshold(),
            crossing.exchange + 1,
            match crossing.role {
                Role::User => "user",
                _ => "assistant",
            },
            crossing.history_tokens
        ),
        None => println!(
            "Warning threshold ({:.1} tokens) not reached",
            config.ledger.threshold()
        ),
    }
    if report.over_context_window() {
        println!(
            "History is over the context window ({}/{} tokens)",
            report.final_history_tokens, report.context_window
        );
    }
    println!("{}", session_summary(report.session_tokens_used));

    Ok(())
}
