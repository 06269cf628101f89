//! Terminal session lifecycle.
//!
//! One [`SessionController`] per mounted pane binds a [`RenderSurface`] to a
//! live handle of a [`ProcessBackend`]. The controller survives reloads by
//! reattaching to the persistent session key of the pane, recovers silently
//! stalled sessions, and restarts once after an unexpected exit.
//!
//! Every asynchronous step is tagged with a startup generation. Starting
//! again, closing or unmounting bumps the generation; work belonging to an
//! older generation is discarded when it resumes.
//!
//! Sub-modules:
//! - [`backend`]: process backend trait, start request, validated events
//! - [`surface`]: rendering surface trait
//! - [`controller`]: the per pane state machine
//! - [`registry`]: controllers keyed by pane address
//! - [`recovery`] / [`focus`]: pure decisions used by the controller

pub mod backend;
pub mod controller;
pub mod error;
pub mod focus;
pub mod recovery;
pub mod registry;
pub mod surface;

pub use backend::{
    EventListener, ProcessBackend, SessionEvent, StartRequest, StartResponse, Subscription,
};
pub use controller::SessionController;
pub use error::{BackendError, SessionError};
pub use registry::{RegistrySync, SessionRegistry};
pub use surface::{Geometry, RenderSurface};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use agent_deck_config::{Config, SessionTimings};

use crate::cache::BoundedCache;
use crate::diagnostics::SharedDiagnostics;
use crate::pane::{HandleId, PaneAddress, PaneRuntimeState, RestorePreference};
use crate::session::persistent_session_key;
use crate::workspace::{Action, WorkspaceState};

/// Lifecycle state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Reattaching,
    Running,
    StaleRecoveryPending,
    Exited,
}

/// Why a start sequence was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartReason {
    Mount,
    Restart,
    AutoRecover,
    StaleRecovery,
    SessionNotFound,
    ProjectPathChanged,
}

impl std::fmt::Display for StartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StartReason::Mount => "mount",
            StartReason::Restart => "restart",
            StartReason::AutoRecover => "auto recover",
            StartReason::StaleRecovery => "stale recovery",
            StartReason::SessionNotFound => "session not found",
            StartReason::ProjectPathChanged => "project path changed",
        };
        f.write_str(name)
    }
}

/// How a live handle is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Detach listeners only; the backend session keeps running
    Detach,
    /// End the backend's persistent session
    Terminate,
}

impl CloseMode {
    pub fn terminates(self) -> bool {
        self == CloseMode::Terminate
    }
}

/// Snapshot of a controller for the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub status_text: String,
    /// Short lived error banner
    pub error: Option<String>,
    /// A handle is bound and running
    pub ready: bool,
    pub handle_id: Option<HandleId>,
    pub session_id: Option<String>,
}

/// Which pane a controller serves and what it starts with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub address: PaneAddress,
    pub project_path: String,
    pub provider_id: Option<String>,
    /// Pane runtime state at mount time (existing handle, session id, preference)
    pub runtime: PaneRuntimeState,
    /// Ask the backend to keep the session alive under a persistent key
    pub use_persistent_key: bool,
    /// Key of the pane this one was split from; its backend session lives on here
    pub inherited_key: Option<String>,
}

impl SessionBinding {
    pub fn new(address: PaneAddress, project_path: impl Into<String>) -> Self {
        Self {
            address,
            project_path: project_path.into(),
            provider_id: None,
            runtime: PaneRuntimeState::default(),
            use_persistent_key: true,
            inherited_key: None,
        }
    }

    /// Binding for a pane of `state`, or `None` if the pane does not exist
    pub fn from_state(state: &WorkspaceState, address: &PaneAddress) -> Option<Self> {
        let workspace = state.workspace(&address.workspace_id)?;
        let tab = workspace.tab(&address.terminal_tab_id)?;
        let runtime = tab.pane_states.get(&address.pane_id)?.clone();
        Some(Self {
            address: address.clone(),
            project_path: runtime
                .project_path
                .clone()
                .unwrap_or_else(|| workspace.project_path.clone()),
            provider_id: runtime.provider_id.clone().or_else(|| tab.provider_id.clone()),
            runtime,
            use_persistent_key: true,
            inherited_key: None,
        })
    }

    pub fn with_runtime(mut self, runtime: PaneRuntimeState) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn without_persistent_key(mut self) -> Self {
        self.use_persistent_key = false;
        self
    }

    /// Persistent session key, when enabled
    pub fn persistent_key(&self) -> Option<String> {
        self.use_persistent_key.then(|| {
            self.inherited_key
                .clone()
                .unwrap_or_else(|| persistent_session_key(&self.address))
        })
    }

    /// Serve `address` while keeping the persistent key the session runs under
    pub fn rebind(&mut self, address: PaneAddress) {
        if self.inherited_key.is_none() {
            self.inherited_key = Some(persistent_session_key(&self.address));
        }
        self.address = address;
    }

    /// Key used for diagnostics whether or not persistence is enabled
    pub fn pane_key(&self) -> String {
        persistent_session_key(&self.address)
    }

    pub fn start_fresh(&self) -> bool {
        self.runtime.restore_preference == Some(RestorePreference::StartFresh)
    }
}

/// Latest-session-id cache shared by all controllers
pub type SharedSessionCache = Arc<Mutex<BoundedCache<String>>>;

/// Create the shared latest-session-id cache
pub fn create_session_cache(capacity: usize) -> SharedSessionCache {
    Arc::new(Mutex::new(BoundedCache::new(capacity)))
}

/// Session cache sized by `session_id_cache_capacity`
pub fn create_session_cache_from_config(config: &Config) -> SharedSessionCache {
    create_session_cache(config.session_id_cache_capacity)
}

/// Collaborators and knobs handed to [`SessionController::mount`]
#[derive(Debug, Clone)]
pub struct MountOptions {
    pub timings: SessionTimings,
    /// The pane is visible and may take keyboard focus
    pub interactive: bool,
    /// Run the auto-focus retry after startup
    pub auto_focus: bool,
    pub diagnostics: SharedDiagnostics,
    pub session_cache: SharedSessionCache,
    /// Receives `UpdatePaneState` actions for runtime discovered ids
    pub actions: mpsc::UnboundedSender<Action>,
    /// Grid size used while the surface reports no geometry
    pub fallback_geometry: Geometry,
}

impl MountOptions {
    pub fn new(
        timings: SessionTimings,
        diagnostics: SharedDiagnostics,
        session_cache: SharedSessionCache,
        actions: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self {
            timings,
            interactive: true,
            auto_focus: true,
            diagnostics,
            session_cache,
            actions,
            fallback_geometry: Geometry::new(
                agent_deck_config::defaults::cols(),
                agent_deck_config::defaults::rows(),
            ),
        }
    }

    pub fn from_config(
        config: &Config,
        diagnostics: SharedDiagnostics,
        session_cache: SharedSessionCache,
        actions: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self::new(config.session.clone(), diagnostics, session_cache, actions)
            .fallback_geometry(Geometry::new(config.cols, config.rows))
    }

    pub fn fallback_geometry(mut self, geometry: Geometry) -> Self {
        self.fallback_geometry = geometry;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn auto_focus(mut self, auto_focus: bool) -> Self {
        self.auto_focus = auto_focus;
        self
    }
}
