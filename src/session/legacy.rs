//! Migration of the version 1 snapshot format.
//!
//! Version 1 stored a flat tab list where each entry was either a project
//! (one terminal bound to a folder) or some other overlay. Project entries
//! become workspaces with one chat tab and one pane; everything else is
//! dropped. Migrated ids are derived from the legacy id so that repeated
//! migrations of the same file produce the same persistent session keys.

use serde::Deserialize;
use serde_json::Value;

use super::SnapshotError;
use crate::pane::{PaneStatePatch, PatchField, RestorePreference};
use crate::tab::{TerminalTabKind, TerminalTabSeed};
use crate::workspace::{Workspace, WorkspaceSeed, WorkspaceState};

/// Tab kind that carries a project
const PROJECT_KIND: &str = "project";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySnapshot {
    #[serde(default)]
    active_tab_id: Option<String>,
    #[serde(default)]
    tabs: Vec<LegacyTab>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTab {
    id: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    project_path: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    provider_id: Option<String>,
    #[serde(default)]
    restore_preference: Option<RestorePreference>,
    #[serde(default)]
    created_at: Option<u64>,
}

impl LegacyTab {
    /// Entries without a kind predate overlays and are always projects
    fn is_project(&self) -> bool {
        self.kind.as_deref().is_none_or(|kind| kind == PROJECT_KIND)
    }
}

/// Title of a migrated project that had neither a title nor a path
const UNTITLED_PROJECT: &str = "Project";

/// Folder name of a project path, used when a legacy tab had no title
fn title_from_path(path: &str) -> String {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(path)
        .to_string()
}

fn migrate_tab(tab: LegacyTab, order: usize) -> Option<Workspace> {
    if !tab.is_project() {
        log::debug!("Dropping legacy {:?} tab {}", tab.kind, tab.id);
        return None;
    }
    // A project tab that lost its path still migrates; the host can rebind it later
    let project_path = tab
        .project_path
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_default();
    if project_path.is_empty() {
        log::warn!("Legacy project tab {} has no project path", tab.id);
    }

    let created_at = tab.created_at.unwrap_or(0);
    let tab_seed = TerminalTabSeed {
        id: format!("{}-terminal", tab.id),
        pane_id: format!("{}-pane", tab.id),
        kind: TerminalTabKind::Chat,
        title: "Chat".to_string(),
        provider_id: tab.provider_id.clone(),
        created_at,
    };
    let pane_id = tab_seed.pane_id.clone();
    let seed = WorkspaceSeed {
        title: tab
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| match project_path.as_str() {
                "" => UNTITLED_PROJECT.to_string(),
                path => title_from_path(path),
            }),
        id: tab.id,
        project_path,
        initial_tab: tab_seed,
    };

    let mut workspace = Workspace::new(seed, order);
    let patch = PaneStatePatch {
        project_path: if workspace.project_path.is_empty() {
            PatchField::Clear
        } else {
            PatchField::Keep
        },
        session_id: tab.session_id.map_or(PatchField::Keep, PatchField::Set),
        restore_preference: tab.restore_preference.map_or(PatchField::Keep, PatchField::Set),
        ..PaneStatePatch::default()
    };
    for terminal_tab in &mut workspace.terminal_tabs {
        terminal_tab.update_pane_state(&pane_id, &patch);
    }
    Some(workspace)
}

/// Migrate a version 1 snapshot
pub fn migrate(value: Value) -> Result<WorkspaceState, SnapshotError> {
    let legacy: LegacySnapshot = serde_json::from_value(value)?;
    let total = legacy.tabs.len();

    let mut workspaces: Vec<Workspace> = Vec::new();
    for tab in legacy.tabs {
        if workspaces.iter().any(|w| w.id == tab.id) {
            return Err(SnapshotError::DuplicateWorkspace(tab.id));
        }
        if let Some(workspace) = migrate_tab(tab, workspaces.len()) {
            workspaces.push(workspace);
        }
    }

    // A dangling or non-project active id falls back to the first workspace
    let active_workspace_id = legacy
        .active_tab_id
        .filter(|id| workspaces.iter().any(|w| &w.id == id))
        .or_else(|| workspaces.first().map(|w| w.id.clone()));

    log::info!(
        "Migrated legacy snapshot: {} of {} tabs became workspaces",
        workspaces.len(),
        total
    );
    Ok(WorkspaceState {
        workspaces,
        active_workspace_id,
    })
}
