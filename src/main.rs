use anyhow::Result;
use clap::Parser;

use agent_deck::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI --log-level takes precedence over RUST_LOG, then AGENT_DECK_DEBUG
    agent_deck::debug::init_log_bridge(cli.log_level.map(|level| level.to_level_filter()));
    log::info!("agent-deck {}", agent_deck::VERSION);

    let result = cli::run(cli);
    if let Err(ref e) = result {
        log::error!("agent-deck: {e:#}");
        eprintln!("agent-deck: error: {e:#}");
    }
    result
}
