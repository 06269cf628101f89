//! Snapshot storage
//!
//! Snapshots are stored in `~/.config/agent-deck/workspaces.json` unless the
//! config overrides the path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use agent_deck_config::Config;

use super::{Hydration, HydrationOutcome, hydrate, to_json};
use crate::workspace::WorkspaceState;

/// Where the serialized workspace snapshot lives
pub trait SnapshotStore {
    /// Raw snapshot, or `None` if nothing is stored
    fn load(&self) -> Result<Option<String>>;
    /// Replace the stored snapshot
    fn save(&self, contents: &str) -> Result<()>;
    /// Remove the stored snapshot
    fn clear(&self) -> Result<()>;
}

/// Snapshot file on disk
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the location configured in `config`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.snapshot_file_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read workspace snapshot from {:?}", self.path))?;
        Ok(Some(contents))
    }

    fn save(&self, contents: &str) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create snapshot directory {:?}", parent))?;
        }

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents)
            .with_context(|| format!("Failed to write workspace snapshot to {:?}", temp_path))?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to move workspace snapshot into place at {:?}", self.path))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove workspace snapshot {:?}", self.path))?;
        }
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    contents: Mutex<Option<String>>,
}

impl MemorySnapshotStore {
    pub fn new(contents: Option<String>) -> Self {
        Self {
            contents: Mutex::new(contents),
        }
    }

    /// Current stored snapshot
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.contents.lock().clone())
    }

    fn save(&self, contents: &str) -> Result<()> {
        *self.contents.lock() = Some(contents.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.contents.lock() = None;
        Ok(())
    }
}

/// Load and hydrate the stored snapshot.
///
/// A discarded snapshot is removed from the store; a migrated snapshot or one
/// that carried live handles is rewritten in sanitized form.
pub fn restore_state(store: &impl SnapshotStore) -> Result<Hydration> {
    let Some(raw) = store.load().context("Failed to load workspace snapshot")? else {
        return Ok(hydrate(""));
    };

    let hydration = hydrate(&raw);
    if hydration.needs_clear() {
        store
            .clear()
            .context("Failed to clear discarded workspace snapshot")?;
        if let HydrationOutcome::Discarded { reason } = &hydration.outcome {
            log::warn!("Cleared stored workspace snapshot: {}", reason);
        }
    } else if hydration.needs_rewrite() {
        persist_state(store, &hydration.state)?;
        log::info!("Rewrote sanitized workspace snapshot");
    }
    Ok(hydration)
}

/// Serialize and store `state`
pub fn persist_state(store: &impl SnapshotStore, state: &WorkspaceState) -> Result<()> {
    let json = to_json(state).context("Failed to serialize workspace snapshot")?;
    store.save(&json).context("Failed to save workspace snapshot")?;
    log::debug!("Saved workspace snapshot ({} workspaces)", state.workspaces.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{Action, WorkspaceSeed, reduce};
    use tempfile::tempdir;

    fn sample_state() -> WorkspaceState {
        reduce(
            &WorkspaceState::default(),
            Action::CreateWorkspace {
                seed: WorkspaceSeed::new("/home/user/work", "work", 1),
            },
        )
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp = tempdir().unwrap();
        let store = FileSnapshotStore::new(temp.path().join("nonexistent.json"));
        assert!(store.load().unwrap().is_none());
        let hydration = restore_state(&store).unwrap();
        assert_eq!(hydration.outcome, HydrationOutcome::Empty);
    }

    #[test]
    fn test_save_and_restore_roundtrip() {
        let temp = tempdir().unwrap();
        let store = FileSnapshotStore::new(temp.path().join("nested").join("workspaces.json"));
        let state = sample_state();
        persist_state(&store, &state).unwrap();

        let hydration = restore_state(&store).unwrap();
        assert_eq!(hydration.outcome, HydrationOutcome::Restored);
        assert_eq!(hydration.state, state);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_cleared() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("workspaces.json");
        std::fs::write(&path, "{\"version\": 2, \"tabs\": [[[").unwrap();
        let store = FileSnapshotStore::new(&path);

        let hydration = restore_state(&store).unwrap();
        assert!(hydration.state.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_missing_file_is_ok() {
        let temp = tempdir().unwrap();
        let store = FileSnapshotStore::new(temp.path().join("none.json"));
        store.clear().unwrap();
    }

    #[test]
    fn test_memory_store_rewrites_migrated_snapshot() {
        let store = MemorySnapshotStore::new(Some(
            r#"{"tabs":[{"id":"p1","projectPath":"/a","embeddedTerminalId":"old"}]}"#.to_string(),
        ));
        let hydration = restore_state(&store).unwrap();
        assert_eq!(hydration.outcome, HydrationOutcome::Migrated);
        assert!(hydration.handles_stripped);

        let rewritten = store.contents().unwrap();
        assert!(rewritten.contains("\"version\": 2"));
        assert!(!rewritten.contains("embeddedTerminalId"));
    }
}
