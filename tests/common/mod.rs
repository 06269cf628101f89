//! Shared integration test helpers for agent-deck.
//!
//! Provides an in-memory [`FakeBackend`] and [`FakeSurface`] plus a
//! [`Harness`] that mounts a controller wired to both.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::{FakeBackend, Harness, settle};
//! ```
//!
//! The `#[allow(dead_code)]` attribute suppresses warnings when only a subset
//! of helpers is used per test file.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use agent_deck::config::SessionTimings;
use agent_deck::diagnostics::{
    BackendSessionSnapshot, Diagnostics, IncidentCapture, IncidentEventKind, IncidentLog,
    SharedDiagnostics,
};
use agent_deck::pane::{PaneAddress, PaneStatePatch};
use agent_deck::terminal::{
    BackendError, EventListener, Geometry, MountOptions, ProcessBackend, RenderSurface,
    SessionBinding, SessionController, SharedSessionCache, StartRequest, StartResponse,
    Subscription, create_session_cache,
};
use agent_deck::workspace::Action;

// ---------------------------------------------------------------------------
// Fake backend
// ---------------------------------------------------------------------------

/// A call received by [`FakeBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(StartRequest),
    Write { handle: String, data: String },
    Resize { handle: String, cols: u16, rows: u16 },
    Close { handle: String, terminate: bool },
    Subscribe { handle: String },
}

#[derive(Default)]
struct BackendState {
    calls: Vec<Call>,
    next_handle: u32,
    /// Handles the backend still knows; anything else is "session not found"
    live: HashSet<String>,
    listeners: HashMap<String, (u64, Arc<EventListener>)>,
    next_listener: u64,
    start_delays: VecDeque<Duration>,
    subscribe_failures: HashMap<String, BackendError>,
    start_failure: Option<BackendError>,
    reuse_existing: bool,
    start_session_id: Option<String>,
    snapshot: Option<BackendSessionSnapshot>,
}

/// In-memory process backend issuing handles `h1`, `h2`, ...
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pretend the backend already has `handle` (kept alive across a reload)
    pub fn add_live_handle(&self, handle: &str) {
        self.state.lock().live.insert(handle.to_string());
    }

    /// Forget `handle` as if the backend process restarted
    pub fn drop_handle(&self, handle: &str) {
        let mut state = self.state.lock();
        state.live.remove(handle);
        state.listeners.remove(handle);
    }

    /// Delay the next start call by `delay`
    pub fn delay_next_start(&self, delay: Duration) {
        self.state.lock().start_delays.push_back(delay);
    }

    pub fn fail_subscribe(&self, handle: &str, error: BackendError) {
        self.state
            .lock()
            .subscribe_failures
            .insert(handle.to_string(), error);
    }

    pub fn fail_next_start(&self, error: BackendError) {
        self.state.lock().start_failure = Some(error);
    }

    pub fn reuse_existing(&self, reuse: bool) {
        self.state.lock().reuse_existing = reuse;
    }

    pub fn start_with_session_id(&self, session_id: &str) {
        self.state.lock().start_session_id = Some(session_id.to_string());
    }

    pub fn set_snapshot(&self, snapshot: BackendSessionSnapshot) {
        self.state.lock().snapshot = Some(snapshot);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn starts(&self) -> Vec<StartRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Start(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Non-empty writes (liveness probes excluded)
    pub fn writes(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write { handle, data } if !data.is_empty() => Some((handle, data)),
                _ => None,
            })
            .collect()
    }

    pub fn probes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Write { data, .. } if data.is_empty()))
            .count()
    }

    pub fn closes(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Close { handle, terminate } => Some((handle, terminate)),
                _ => None,
            })
            .collect()
    }

    pub fn resizes(&self) -> Vec<(String, u16, u16)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Resize { handle, cols, rows } => Some((handle, cols, rows)),
                _ => None,
            })
            .collect()
    }

    pub fn has_listener(&self, handle: &str) -> bool {
        self.state.lock().listeners.contains_key(handle)
    }

    /// Deliver a raw event to the listener of `handle`; false if none is attached
    pub fn emit(&self, handle: &str, event: Value) -> bool {
        let listener = self
            .state
            .lock()
            .listeners
            .get(handle)
            .map(|(_, listener)| Arc::clone(listener));
        match listener {
            Some(listener) => {
                (**listener)(event);
                true
            }
            None => false,
        }
    }

    pub fn emit_output(&self, handle: &str, data: &str) -> bool {
        self.emit(handle, serde_json::json!({"type": "output", "data": data}))
    }

    pub fn emit_exit(&self, handle: &str, code: i32) -> bool {
        self.emit(handle, serde_json::json!({"type": "exit", "code": code}))
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

impl ProcessBackend for FakeBackend {
    async fn start(&self, request: StartRequest) -> Result<StartResponse, BackendError> {
        self.record(Call::Start(request));
        let delay = self.state.lock().start_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if let Some(error) = state.start_failure.take() {
            return Err(error);
        }
        state.next_handle += 1;
        let handle_id = format!("h{}", state.next_handle);
        state.live.insert(handle_id.clone());
        Ok(StartResponse {
            handle_id,
            reused_existing_session: state.reuse_existing,
            session_id: state.start_session_id.clone(),
        })
    }

    async fn write_input(&self, handle_id: &str, data: &str) -> Result<(), BackendError> {
        self.record(Call::Write {
            handle: handle_id.to_string(),
            data: data.to_string(),
        });
        if self.state.lock().live.contains(handle_id) {
            Ok(())
        } else {
            Err(BackendError::SessionNotFound(handle_id.to_string()))
        }
    }

    async fn resize(&self, handle_id: &str, cols: u16, rows: u16) -> Result<(), BackendError> {
        self.record(Call::Resize {
            handle: handle_id.to_string(),
            cols,
            rows,
        });
        if self.state.lock().live.contains(handle_id) {
            Ok(())
        } else {
            Err(BackendError::SessionNotFound(handle_id.to_string()))
        }
    }

    async fn close(&self, handle_id: &str, terminate: bool) -> Result<(), BackendError> {
        self.record(Call::Close {
            handle: handle_id.to_string(),
            terminate,
        });
        let mut state = self.state.lock();
        state.live.remove(handle_id);
        state.listeners.remove(handle_id);
        Ok(())
    }

    async fn subscribe(
        &self,
        handle_id: &str,
        listener: EventListener,
    ) -> Result<Subscription, BackendError> {
        self.record(Call::Subscribe {
            handle: handle_id.to_string(),
        });
        let mut state = self.state.lock();
        if let Some(error) = state.subscribe_failures.get(handle_id) {
            return Err(error.clone());
        }
        if !state.live.contains(handle_id) {
            return Err(BackendError::SessionNotFound(handle_id.to_string()));
        }
        state.next_listener += 1;
        let id = state.next_listener;
        state
            .listeners
            .insert(handle_id.to_string(), (id, Arc::new(listener)));

        let shared = Arc::clone(&self.state);
        let handle = handle_id.to_string();
        Ok(Subscription::new(move || {
            let mut state = shared.lock();
            if state.listeners.get(&handle).is_some_and(|(current, _)| *current == id) {
                state.listeners.remove(&handle);
            }
        }))
    }

    async fn session_snapshot(&self, _persistent_session_key: &str) -> Option<BackendSessionSnapshot> {
        self.state.lock().snapshot.clone()
    }
}

// ---------------------------------------------------------------------------
// Fake surface
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SurfaceState {
    pub written: String,
    pub focus_calls: usize,
    pub focused: bool,
    /// `focus()` actually moves focus into the surface
    pub focus_sticks: bool,
    pub disposed: bool,
    pub scrolled: Vec<i32>,
    pub geometry: Geometry,
}

/// Render surface whose state stays inspectable after it moved into a controller
#[derive(Debug, Clone)]
pub struct FakeSurface {
    pub state: Arc<Mutex<SurfaceState>>,
}

impl FakeSurface {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(SurfaceState {
                written: String::new(),
                focus_calls: 0,
                focused: false,
                focus_sticks: false,
                disposed: false,
                scrolled: Vec::new(),
                geometry: Geometry::new(cols, rows),
            })),
        }
    }

    pub fn written(&self) -> String {
        self.state.lock().written.clone()
    }

    pub fn focus_calls(&self) -> usize {
        self.state.lock().focus_calls
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn scrolled(&self) -> Vec<i32> {
        self.state.lock().scrolled.clone()
    }
}

impl RenderSurface for FakeSurface {
    fn write(&mut self, data: &str) {
        self.state.lock().written.push_str(data);
    }

    fn focus(&mut self) {
        let mut state = self.state.lock();
        state.focus_calls += 1;
        if state.focus_sticks {
            state.focused = true;
        }
    }

    fn has_focus(&self) -> bool {
        self.state.lock().focused
    }

    fn dispose(&mut self) {
        self.state.lock().disposed = true;
    }

    fn geometry(&self) -> Geometry {
        self.state.lock().geometry
    }

    fn scroll_lines(&mut self, lines: i32) {
        self.state.lock().scrolled.push(lines);
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn address() -> PaneAddress {
    PaneAddress::new("w1", "t1", "p1")
}

pub fn binding() -> SessionBinding {
    SessionBinding::new(address(), "/work/alpha").with_provider("claude")
}

/// Diagnostics that record everything and keep bundles in memory
pub fn recording_diagnostics() -> SharedDiagnostics {
    Arc::new(Mutex::new(Diagnostics::new(
        IncidentLog::new(true, 400),
        IncidentCapture::new(60_000, None),
    )))
}

/// Mount options with recording diagnostics and a fresh cache
pub fn mount_options(timings: SessionTimings) -> (MountOptions, mpsc::UnboundedReceiver<Action>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let options = MountOptions::new(timings, recording_diagnostics(), create_session_cache(16), tx);
    (options, rx)
}

/// A mounted controller with its collaborators
pub struct Harness {
    pub controller: SessionController<FakeBackend, FakeSurface>,
    pub backend: Arc<FakeBackend>,
    pub surface: FakeSurface,
    pub actions: mpsc::UnboundedReceiver<Action>,
    pub diagnostics: SharedDiagnostics,
    pub cache: SharedSessionCache,
}

impl Harness {
    pub fn mount(binding: SessionBinding, backend: Arc<FakeBackend>) -> Self {
        Self::mount_with(binding, backend, SessionTimings::default())
    }

    pub fn mount_with(
        binding: SessionBinding,
        backend: Arc<FakeBackend>,
        timings: SessionTimings,
    ) -> Self {
        Self::mount_full(binding, backend, timings, recording_diagnostics())
    }

    pub fn mount_full(
        binding: SessionBinding,
        backend: Arc<FakeBackend>,
        timings: SessionTimings,
        diagnostics: SharedDiagnostics,
    ) -> Self {
        let surface = FakeSurface::new(100, 30);
        let cache = create_session_cache(16);
        let (tx, actions) = mpsc::unbounded_channel();
        let options = MountOptions::new(timings, Arc::clone(&diagnostics), Arc::clone(&cache), tx);
        let controller =
            SessionController::mount(binding, surface.clone(), Arc::clone(&backend), options);
        Self {
            controller,
            backend,
            surface,
            actions,
            diagnostics,
            cache,
        }
    }

    /// Pane state patches published so far
    pub fn patches(&mut self) -> Vec<PaneStatePatch> {
        let mut patches = Vec::new();
        while let Ok(action) = self.actions.try_recv() {
            if let Action::UpdatePaneState { patch, .. } = action {
                patches.push(patch);
            }
        }
        patches
    }

    /// Recorded diagnostic event kinds, oldest first
    pub fn event_kinds(&self) -> Vec<IncidentEventKind> {
        self.diagnostics
            .lock()
            .log
            .events()
            .into_iter()
            .map(|event| event.kind)
            .collect()
    }
}

/// Let the pump and timers catch up (auto-advances paused time by 1ms)
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Advance paused time by `ms`, letting everything due run
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
