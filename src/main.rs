use anyhow::Result;
use tokenledger::cli;

fn main() -> Result<()> {
    cli::run()
}
