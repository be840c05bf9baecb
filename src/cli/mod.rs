use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod count;
pub mod replay;
pub mod scenario;

use crate::core::AppConfig;
use crate::scenarios::Scenario;

#[derive(Subcommand)]
enum Command {
    /// Count the tokens in some text
    Count {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Replay a JSON transcript and print token usage for each exchange
    Replay {
        file: PathBuf,
    },
    /// Run one of the scripted test scenarios
    Scenario {
        #[arg(value_enum)]
        name: Scenario,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Context window size in tokens
    #[arg(long, global = true)]
    context_window: Option<usize>,

    /// Fraction of the context window that triggers a warning
    #[arg(long, global = true)]
    warning_fraction: Option<f64>,

    /// Tokenizer encoding
    #[arg(long, global = true)]
    encoding: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(context_window) = self.context_window {
            config.ledger.context_window = context_window;
        }
        if let Some(warning_fraction) = self.warning_fraction {
            config.ledger.warning_fraction = warning_fraction;
        }
        if let Some(encoding) = &self.encoding {
            config.encoding = encoding.clone();
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub fn run() -> Result<()> {
    let args = Cli::parse();
    init_tracing();

    let mut config = AppConfig::from_env()?;
    args.apply(&mut config);
    config.ledger.validate()?;

    // Handle each sub command
    match args.command {
        Some(Command::Count { text }) => {
            count::run(&text.join(" "), &config)?;
        }
        Some(Command::Replay { file }) => {
            replay::run(&file, &config)?;
        }
        Some(Command::Scenario { name }) => {
            scenario::run(name, &config)?;
        }
        None => {}
    }

    Ok(())
}
