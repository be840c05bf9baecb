use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use crate::tokenizer::DEFAULT_ENCODING;

pub const DEFAULT_CONTEXT_WINDOW: usize = 8192;
pub const DEFAULT_WARNING_FRACTION: f64 = 0.80;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Limits the ledger checks token usage against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LedgerConfig {
    pub context_window: usize,
    pub warning_fraction: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            warning_fraction: DEFAULT_WARNING_FRACTION,
        }
    }
}

impl LedgerConfig {
    pub fn new(context_window: usize, warning_fraction: f64) -> Result<Self> {
        let config = Self {
            context_window,
            warning_fraction,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.context_window == 0 {
            bail!("Context window must be greater than zero");
        }
        if !self.warning_fraction.is_finite()
            || self.warning_fraction <= 0.0
            || self.warning_fraction > 1.0
        {
            bail!(
                "Warning fraction must be in (0, 1], got {}",
                self.warning_fraction
            );
        }
        Ok(())
    }

    /// Number of tokens at which the history is considered close to
    /// the context window.
    pub fn threshold(&self) -> f64 {
        self.context_window as f64 * self.warning_fraction
    }
}

/// Settings for the command line, read from the environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub encoding: String,
    pub system_prompt: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let context_window = env_or("TOKENLEDGER_CONTEXT_WINDOW", DEFAULT_CONTEXT_WINDOW)?;
        let warning_fraction = env_or("TOKENLEDGER_WARNING_FRACTION", DEFAULT_WARNING_FRACTION)?;
        let encoding =
            env::var("TOKENLEDGER_ENCODING").unwrap_or_else(|_| DEFAULT_ENCODING.to_string());
        let system_prompt = env::var("TOKENLEDGER_SYSTEM_PROMPT")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

        Ok(Self {
            ledger: LedgerConfig {
                context_window,
                warning_fraction,
            },
            encoding,
            system_prompt,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            encoding: DEFAULT_ENCODING.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for env var {}: {}", key, val)),
        Err(_) => Ok(default),
    }
}
