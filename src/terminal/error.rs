//! Error types for the terminal session lifecycle.

/// Failure reported by the process backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The handle is stale; the backend has no memory of it
    #[error("Session not found for handle {0}")]
    SessionNotFound(String),

    #[error("Failed to write to session: {0}")]
    WriteFailed(String),

    #[error("Failed to resize session: {0}")]
    ResizeFailed(String),

    #[error("Failed to start session: {0}")]
    StartFailed(String),

    #[error("Failed to attach session listener: {0}")]
    ListenerAttachFailed(String),

    /// No host event bridge exists at all
    #[error("Host event bridge is unavailable")]
    BridgeUnavailable,
}

impl BackendError {
    /// Errors the user should see in the error banner
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, BackendError::SessionNotFound(_))
    }
}

/// Failure of a controller operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Session is not running")]
    NotRunning,

    /// A newer start or an unmount invalidated this operation
    #[error("Operation superseded by a newer session generation")]
    Superseded,

    #[error("Session controller is closed")]
    Closed,
}

impl SessionError {
    /// The backend lost track of the handle
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, SessionError::Backend(BackendError::SessionNotFound(_)))
    }
}
