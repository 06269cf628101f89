//! Process backend collaborator.
//!
//! The backend owns the real processes. The controller asks it to start or
//! reuse a session, writes input, resizes, closes, and subscribes to the raw
//! event stream of a handle. Raw events are untyped JSON at the boundary and
//! are validated into [`SessionEvent`] before anything else sees them.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::BackendError;
use crate::diagnostics::BackendSessionSnapshot;
use crate::pane::HandleId;

/// Parameters of a backend start call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub project_path: String,
    pub cols: u16,
    pub rows: u16,
    /// Provider CLI the session runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Key under which the backend keeps the session alive across reloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_session_key: Option<String>,
    /// Provider session to resume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_session_id: Option<String>,
    /// Ignore any resumable provider session
    #[serde(default)]
    pub start_fresh: bool,
}

/// Result of a backend start call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub handle_id: HandleId,
    /// The backend attached to a session it already had for the key
    #[serde(default)]
    pub reused_existing_session: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Validated backend event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    /// Process output, written verbatim to the surface
    Output { data: String },
    /// The process exited
    Exit {
        #[serde(default)]
        code: Option<i32>,
    },
    /// Backend side error for this handle
    Error { message: String },
    /// The provider reported its session id
    SessionId { session_id: String },
}

impl SessionEvent {
    /// Validate a raw payload
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Callback receiving raw event payloads of one handle
pub type EventListener = Box<dyn Fn(Value) + Send + Sync>;

/// Disposer returned by [`ProcessBackend::subscribe`].
///
/// Disposing (or dropping) detaches the listener. Disposal runs at most once.
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Subscription with nothing to detach
    pub fn noop() -> Self {
        Self { disposer: None }
    }

    /// Detach the listener now
    pub fn dispose(mut self) {
        self.run_disposer();
    }

    fn run_disposer(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_disposer();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.disposer.is_some())
            .finish()
    }
}

/// Host side process backend
pub trait ProcessBackend: Send + Sync + 'static {
    /// Start a session, or reuse the one the backend keeps for the key
    fn start(
        &self,
        request: StartRequest,
    ) -> impl Future<Output = Result<StartResponse, BackendError>> + Send;

    /// Write raw input; an empty write doubles as a liveness probe
    fn write_input(
        &self,
        handle_id: &str,
        data: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn resize(
        &self,
        handle_id: &str,
        cols: u16,
        rows: u16,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Release a handle; the persistent session survives unless terminated
    fn close(
        &self,
        handle_id: &str,
        terminate_persistent_session: bool,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Attach `listener` to the event stream of `handle_id`
    fn subscribe(
        &self,
        handle_id: &str,
        listener: EventListener,
    ) -> impl Future<Output = Result<Subscription, BackendError>> + Send;

    /// What the backend knows about a persistent session, for diagnostics
    fn session_snapshot(
        &self,
        _persistent_session_key: &str,
    ) -> impl Future<Output = Option<BackendSessionSnapshot>> + Send {
        async { None }
    }
}
