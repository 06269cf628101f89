//! Per-pane runtime record and the partial patch used to update it.

use serde::{Deserialize, Serialize};

use super::common::HandleId;

/// What a pane should do when its session starts without a live handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePreference {
    /// Ask the backend to resume the latest session for the project
    ResumeLatest,
    /// Always spawn a brand new session
    StartFresh,
}

/// Runtime record of one pane, keyed by pane id in the owning tab
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneRuntimeState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    /// Backend-assigned logical session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Live process-channel handle. Never persisted.
    #[serde(default, skip_serializing)]
    pub embedded_terminal_id: Option<HandleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_preference: Option<RestorePreference>,
}

impl PaneRuntimeState {
    /// State of a newly created pane: only provider and project path are known
    pub fn fresh(provider_id: Option<String>, project_path: Option<String>) -> Self {
        Self {
            provider_id,
            project_path,
            ..Self::default()
        }
    }

    /// Whether a live handle is currently bound
    pub fn is_attached(&self) -> bool {
        self.embedded_terminal_id.is_some()
    }
}

/// One field of a [`PaneStatePatch`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PatchField<T> {
    /// Leave the current value alone
    #[default]
    Keep,
    /// Replace the current value
    Set(T),
    /// Remove the current value
    Clear,
}

impl<T: Clone> PatchField<T> {
    fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            PatchField::Keep => {}
            PatchField::Set(value) => *slot = Some(value.clone()),
            PatchField::Clear => *slot = None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, PatchField::Keep)
    }
}

impl<T> From<Option<T>> for PatchField<T> {
    /// `Some` sets, `None` clears
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => PatchField::Set(v),
            None => PatchField::Clear,
        }
    }
}

/// Partial update of a [`PaneRuntimeState`]; untouched fields are kept
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaneStatePatch {
    pub provider_id: PatchField<String>,
    pub project_path: PatchField<String>,
    pub session_id: PatchField<String>,
    pub embedded_terminal_id: PatchField<HandleId>,
    pub restore_preference: PatchField<RestorePreference>,
}

impl PaneStatePatch {
    /// Shallow-merge into `state`
    pub fn apply(&self, state: &mut PaneRuntimeState) {
        self.provider_id.apply_to(&mut state.provider_id);
        self.project_path.apply_to(&mut state.project_path);
        self.session_id.apply_to(&mut state.session_id);
        self.embedded_terminal_id.apply_to(&mut state.embedded_terminal_id);
        self.restore_preference.apply_to(&mut state.restore_preference);
    }

    pub fn is_empty(&self) -> bool {
        self.provider_id.is_keep()
            && self.project_path.is_keep()
            && self.session_id.is_keep()
            && self.embedded_terminal_id.is_keep()
            && self.restore_preference.is_keep()
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = PatchField::Set(session_id.into());
        self
    }

    pub fn embedded_terminal_id(mut self, handle: impl Into<HandleId>) -> Self {
        self.embedded_terminal_id = PatchField::Set(handle.into());
        self
    }

    pub fn clear_embedded_terminal_id(mut self) -> Self {
        self.embedded_terminal_id = PatchField::Clear;
        self
    }

    pub fn provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = PatchField::Set(provider_id.into());
        self
    }

    pub fn project_path(mut self, project_path: impl Into<String>) -> Self {
        self.project_path = PatchField::Set(project_path.into());
        self
    }

    pub fn restore_preference(mut self, preference: RestorePreference) -> Self {
        self.restore_preference = PatchField::Set(preference);
        self
    }
}
