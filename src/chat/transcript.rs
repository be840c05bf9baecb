//! Replaying a scripted conversation through a ledger.
//!
//! Each turn's assistant text stands in for the model's reply so a
//! whole session can be accounted for offline. Chat commands in the
//! user text are handled the same way the interactive agent does:
//! they are matched against the raw line and never sent to the model.
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::chat::Ledger;
use crate::chat::display::{clear_notice, command_help, prompt_prefix, session_summary};

pub const CLEAR_COMMAND: &str = "/clear";
pub const HELP_COMMAND: &str = "/help";
const EXIT_COMMANDS: [&str; 2] = ["/exit", "/quit"];

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    #[serde(default)]
    pub assistant: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct Transcript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub turns: Vec<Turn>,
}

impl Transcript {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        Self::from_json(&data)
            .with_context(|| format!("Failed to parse transcript {}", path.display()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub exchanges: usize,
    pub clears: usize,
    pub helps: usize,
    pub warnings: usize,
    pub session_tokens_used: usize,
}

enum Command {
    Clear,
    Help,
    Exit,
    Skip,
    Say,
}

fn parse_command(input: &str) -> Command {
    if EXIT_COMMANDS.contains(&input.to_lowercase().as_str()) {
        Command::Exit
    } else if input == HELP_COMMAND {
        Command::Help
    } else if input == CLEAR_COMMAND {
        Command::Clear
    } else if input.trim().is_empty() {
        Command::Skip
    } else {
        Command::Say
    }
}

/// Plays `turns` through `ledger`, writing what a user would see in
/// the terminal to `out`.
pub fn replay<W: Write>(ledger: &mut Ledger, turns: &[Turn], out: &mut W) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for turn in turns {
        match parse_command(&turn.user) {
            Command::Skip => continue,
            Command::Exit => break,
            Command::Help => {
                writeln!(out, "{}\n", command_help())?;
                summary.helps += 1;
            }
            Command::Clear => {
                writeln!(out, "{}\n", clear_notice(ledger.session_tokens_used()))?;
                ledger.clear(true);
                summary.clears += 1;
            }
            Command::Say => {
                writeln!(out, "{}{}", prompt_prefix(ledger.percent_used()), turn.user)?;
                let exchange = ledger.exchange(&turn.user, |_| Ok(turn.assistant.clone()))?;
                writeln!(out, "\n{}\n", exchange.response.content())?;
                writeln!(out, "{}\n", exchange.usage)?;
                summary.exchanges += 1;

                if let Some(warning) = ledger.warning() {
                    writeln!(out, "{}\n", warning)?;
                    summary.warnings += 1;
                }
            }
        }
    }

    summary.session_tokens_used = ledger.session_tokens_used();
    writeln!(out, "{}", session_summary(summary.session_tokens_used))?;

    Ok(summary)
}
