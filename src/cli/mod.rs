//! Command-line interface for agent-deck.
//!
//! Offline tooling around the workspace snapshot: inspect what a snapshot
//! hydrates to, migrate or sanitize it in place, and compute persistent
//! session keys.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::session::{
    FileSnapshotStore, Hydration, HydrationOutcome, SnapshotStore, hydrate,
    parse_persistent_session_key, persistent_session_key, to_json,
};
use crate::pane::PaneAddress;

/// agent-deck - workspace shell for coding-assistant terminals
#[derive(Parser)]
#[command(name = "agent-deck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set debug log level (overrides config and RUST_LOG)
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Use this config file instead of ~/.config/agent-deck/config.yaml
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

/// Log level argument for CLI
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevelArg {
    /// Convert to `log::LevelFilter`
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevelArg::Off => log::LevelFilter::Off,
            LogLevelArg::Error => log::LevelFilter::Error,
            LogLevelArg::Warn => log::LevelFilter::Warn,
            LogLevelArg::Info => log::LevelFilter::Info,
            LogLevelArg::Debug => log::LevelFilter::Debug,
            LogLevelArg::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print what a workspace snapshot hydrates to
    Inspect {
        /// Snapshot file (defaults to the configured snapshot path)
        snapshot: Option<PathBuf>,
    },

    /// Migrate or sanitize a workspace snapshot
    Migrate {
        /// Snapshot file (defaults to the configured snapshot path)
        snapshot: Option<PathBuf>,

        /// Rewrite the file instead of printing the result
        #[arg(short, long)]
        write: bool,
    },

    /// Print the persistent session key of a pane
    Key {
        workspace: String,
        tab: String,
        pane: String,
    },

    /// Decode a persistent session key back into pane ids
    DecodeKey { key: String },
}

/// Load config from `path` or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn snapshot_path(explicit: Option<PathBuf>, config: &Config) -> PathBuf {
    explicit.unwrap_or_else(|| config.snapshot_file_path())
}

fn read_snapshot(path: &Path) -> Result<Option<String>> {
    FileSnapshotStore::new(path)
        .load()
        .with_context(|| format!("Failed to read snapshot {:?}", path))
}

/// Human readable summary of a hydration result
pub fn render_summary(hydration: &Hydration) -> String {
    let mut out = String::new();
    let outcome = match &hydration.outcome {
        HydrationOutcome::Empty => "empty".to_string(),
        HydrationOutcome::Restored => "restored".to_string(),
        HydrationOutcome::Migrated => "migrated from legacy format".to_string(),
        HydrationOutcome::Discarded { reason } => format!("discarded ({reason})"),
    };
    let _ = writeln!(out, "outcome: {outcome}");
    if hydration.handles_stripped {
        let _ = writeln!(out, "stale terminal handles stripped");
    }

    let state = &hydration.state;
    for workspace in &state.workspaces {
        let marker = if state.active_workspace_id.as_deref() == Some(workspace.id.as_str()) {
            "*"
        } else {
            " "
        };
        let _ = writeln!(
            out,
            "{marker} [{}] {} ({}) {:?}",
            workspace.order, workspace.title, workspace.project_path, workspace.status
        );
        for tab in &workspace.terminal_tabs {
            let active = workspace.active_terminal_tab_id.as_deref() == Some(tab.id.as_str());
            let _ = writeln!(
                out,
                "    {} {} {:?} \"{}\" {} pane(s)",
                if active { "*" } else { "-" },
                tab.id,
                tab.kind,
                tab.title,
                tab.pane_tree.pane_count()
            );
            for address in tab.pane_addresses(&workspace.id) {
                let session = tab
                    .pane_states
                    .get(&address.pane_id)
                    .and_then(|s| s.session_id.as_deref())
                    .unwrap_or("-");
                let _ = writeln!(
                    out,
                    "        {} session={} key={}",
                    address.pane_id,
                    session,
                    persistent_session_key(&address)
                );
            }
        }
    }
    out
}

fn inspect(path: &Path) -> Result<()> {
    let raw = read_snapshot(path)?.unwrap_or_default();
    print!("{}", render_summary(&hydrate(&raw)));
    Ok(())
}

fn migrate(path: &Path, write: bool) -> Result<()> {
    let raw = read_snapshot(path)?.unwrap_or_default();
    let hydration = hydrate(&raw);
    if let HydrationOutcome::Discarded { reason } = &hydration.outcome {
        anyhow::bail!("Snapshot {:?} cannot be restored: {}", path, reason);
    }
    let json = to_json(&hydration.state).context("Failed to serialize snapshot")?;
    if write {
        FileSnapshotStore::new(path).save(&json)?;
        eprintln!("Wrote sanitized snapshot to {}", path.display());
    } else {
        println!("{json}");
    }
    Ok(())
}

/// Run a parsed command line
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Key {
            workspace,
            tab,
            pane,
        } => {
            println!("{}", persistent_session_key(&PaneAddress::new(workspace, tab, pane)));
            Ok(())
        }
        Commands::DecodeKey { key } => {
            let address = parse_persistent_session_key(&key)
                .with_context(|| format!("Not a persistent session key: {key}"))?;
            println!(
                "workspace={} tab={} pane={}",
                address.workspace_id, address.terminal_tab_id, address.pane_id
            );
            Ok(())
        }
        Commands::Inspect { snapshot } => {
            let config = load_config(cli.config.as_deref())?;
            inspect(&snapshot_path(snapshot, &config))
        }
        Commands::Migrate { snapshot, write } => {
            let config = load_config(cli.config.as_deref())?;
            migrate(&snapshot_path(snapshot, &config), write)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySnapshotStore;
    use crate::session::restore_state;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::parse_from(["agent-deck", "migrate", "snap.json", "--write"]);
        match cli.command {
            Commands::Migrate { snapshot, write } => {
                assert_eq!(snapshot, Some(PathBuf::from("snap.json")));
                assert!(write);
            }
            _ => panic!("expected migrate"),
        }
    }

    #[test]
    fn test_summary_of_migrated_snapshot() {
        let store = MemorySnapshotStore::new(Some(
            r#"{"activeTabId":"p1","tabs":[{"id":"p1","projectPath":"/work/alpha","sessionId":"s1"}]}"#
                .to_string(),
        ));
        let summary = render_summary(&restore_state(&store).unwrap());
        assert!(summary.starts_with("outcome: migrated"));
        assert!(summary.contains("* [0] alpha (/work/alpha)"));
        assert!(summary.contains("session=s1"));
        assert!(summary.contains("key=ad.p1.p1-terminal.p1-pane"));
    }

    #[test]
    fn test_migrate_writes_sanitized_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("workspaces.json");
        std::fs::write(&path, r#"{"tabs":[{"id":"p1","projectPath":"/a"}]}"#).unwrap();
        migrate(&path, true).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"version\": 2"));
        assert_eq!(hydrate(&written).outcome, HydrationOutcome::Restored);
    }

    #[test]
    fn test_migrate_refuses_invalid_snapshot() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("workspaces.json");
        std::fs::write(&path, "{\"version\": 7}").unwrap();
        assert!(migrate(&path, true).is_err());
        // The broken file is left for inspection
        assert!(path.exists());
    }
}
