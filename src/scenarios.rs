//! Scripted conversations for checking token accounting without a
//! model on the other end.
//!
//! - A: a short dialog
//! - B: a long dialog that walks up to the warning threshold
//! - C: a dialog that keeps going past the context window
use anyhow::{Result, bail};
use clap::ValueEnum;

use crate::chat::{Ledger, Role, UsageRecord};
use crate::core::LedgerConfig;
use crate::tokenizer::SharedTokenizer;

pub const SCENARIO_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const FILLER_WORD: &str = " token";
const USER_FILLER_WORDS: usize = 120;
const ASSISTANT_FILLER_WORDS: usize = 280;

/// Upper bound on exchanges in the long scenarios so a huge context
/// window fails instead of growing the history forever.
pub const MAX_SCENARIO_EXCHANGES: usize = 1_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Short dialog
    A,
    /// Long dialog approaching the limit
    B,
    /// Dialog that exceeds the limit
    C,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioStep {
    pub usage: UsageRecord,
    pub history_tokens: usize,
    /// Threshold check right after the prompt was appended
    pub prompt_exceeds_threshold: bool,
    /// Threshold check after the reply was appended
    pub exceeds_threshold: bool,
}

impl ScenarioStep {
    /// Which append in this exchange first put the history at or over
    /// the threshold, if either did.
    fn crossing(&self) -> Option<Role> {
        if self.prompt_exceeds_threshold {
            Some(Role::User)
        } else if self.exceeds_threshold {
            Some(Role::Assistant)
        } else {
            None
        }
    }
}

/// The append that first put the history at or over the warning
/// threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThresholdCrossing {
    /// Index into `ScenarioReport::steps`
    pub exchange: usize,
    /// `User` when the prompt crossed it, `Assistant` for the reply
    pub role: Role,
    /// History total right after that append
    pub history_tokens: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub steps: Vec<ScenarioStep>,
    pub threshold_crossed_at: Option<ThresholdCrossing>,
    pub final_history_tokens: usize,
    pub session_tokens_used: usize,
    pub context_window: usize,
}

impl ScenarioReport {
    pub fn over_context_window(&self) -> bool {
        self.final_history_tokens > self.context_window
    }
}

pub fn run(
    scenario: Scenario,
    tokenizer: SharedTokenizer,
    config: LedgerConfig,
) -> Result<ScenarioReport> {
    let mut ledger = Ledger::with_system_prompt(tokenizer, config, SCENARIO_SYSTEM_PROMPT)?;
    tracing::info!("Running scenario {:?} in session {}", scenario, ledger.session_id());

    let mut steps = Vec::new();
    match scenario {
        Scenario::A => {
            steps.push(step(&mut ledger, "Hello", "Hi there!")?);
        }
        Scenario::B => {
            let (user, assistant) = filler_pair();
            loop {
                check_bound(steps.len())?;
                let s = step(&mut ledger, &user, &assistant)?;
                let crossed = s.exceeds_threshold;
                steps.push(s);
                if crossed {
                    break;
                }
            }
        }
        Scenario::C => {
            let (user, assistant) = filler_pair();
            while ledger.current_history_tokens() <= config.context_window {
                check_bound(steps.len())?;
                steps.push(step(&mut ledger, &user, &assistant)?);
            }
            // One more round once over the window to show counts keep going
            steps.push(step(&mut ledger, &user, &assistant)?);
        }
    }

    let threshold_crossed_at = steps.iter().enumerate().find_map(|(i, s)| {
        s.crossing().map(|role| ThresholdCrossing {
            exchange: i,
            role,
            history_tokens: match role {
                Role::User => s.usage.history_tokens,
                _ => s.history_tokens,
            },
        })
    });

    Ok(ScenarioReport {
        scenario,
        steps,
        threshold_crossed_at,
        final_history_tokens: ledger.current_history_tokens(),
        session_tokens_used: ledger.session_tokens_used(),
        context_window: config.context_window,
    })
}

fn step(ledger: &mut Ledger, user: &str, assistant: &str) -> Result<ScenarioStep> {
    let before = ledger.current_history_tokens();
    let exchange = ledger.exchange(user, |_| Ok(assistant.to_string()))?;
    if ledger.current_history_tokens() == before {
        // The long scenarios would never reach the threshold
        bail!("Tokenizer counted no tokens in the scenario dialog");
    }
    let threshold = ledger.config().threshold();
    Ok(ScenarioStep {
        usage: exchange.usage,
        history_tokens: ledger.current_history_tokens(),
        // The usage history figure is the total right after the prompt
        prompt_exceeds_threshold: exchange.usage.history_tokens as f64 >= threshold,
        exceeds_threshold: ledger.warning().is_some(),
    })
}

fn check_bound(exchanges: usize) -> Result<()> {
    if exchanges >= MAX_SCENARIO_EXCHANGES {
        bail!(
            "Scenario gave up after {} exchanges, the context window is too large to reach",
            MAX_SCENARIO_EXCHANGES
        );
    }
    Ok(())
}

fn filler_pair() -> (String, String) {
    let user = format!("Tell me more.{}", FILLER_WORD.repeat(USER_FILLER_WORDS));
    let assistant = format!("Here is more.{}", FILLER_WORD.repeat(ASSISTANT_FILLER_WORDS));
    (user, assistant)
}
