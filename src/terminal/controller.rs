//! Per pane session controller.
//!
//! The controller owns the liveness of one pane: it starts or reattaches the
//! backend session, pumps backend events into the surface, probes for stale
//! handles and silently stalled input, and releases the handle on close.
//!
//! Backend events and timer ticks are delivered as messages to a single pump
//! task per controller. Each message carries the startup generation it was
//! produced for and is dropped once that generation is no longer current.
//! Controller state sits behind `parking_lot` locks that are never held
//! across an await.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use agent_deck_config::SessionTimings;
use agent_deck_input::{
    KeyInput, WheelDeltaMode, encode_terminal_key_input, normalize_wheel_delta_to_scroll_lines,
};

use super::backend::{EventListener, ProcessBackend, SessionEvent, StartRequest, Subscription};
use super::error::{BackendError, SessionError};
use super::focus::{FocusContext, FocusDecision, focus_decision};
use super::recovery::{is_stale_recovery_eligible, should_escalate};
use super::surface::{Geometry, RenderSurface};
use super::{
    CloseMode, MountOptions, SessionBinding, SessionState, SessionStatus, SharedSessionCache,
    StartReason,
};
use crate::cache::session_cache_key;
use crate::diagnostics::{IncidentEvent, IncidentEventKind, SharedDiagnostics};
use crate::pane::{HandleId, PaneAddress, PaneStatePatch};
use crate::workspace::Action;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Epoch millisecond clock driven by tokio time, so paused test time applies
#[derive(Debug, Clone, Copy)]
struct Clock {
    origin: Instant,
    origin_epoch_ms: u64,
}

impl Clock {
    fn new() -> Self {
        let origin_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            origin: Instant::now(),
            origin_epoch_ms,
        }
    }

    fn now_ms(&self) -> u64 {
        self.origin_epoch_ms + self.origin.elapsed().as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// Work delivered to the pump task
#[derive(Debug)]
enum PumpMessage {
    Backend { generation: u64, event: SessionEvent },
    LivenessProbe { generation: u64 },
    StalePoll { generation: u64 },
    RecoveryGrace { generation: u64 },
    FocusAttempt { generation: u64, sequence: u64 },
    Restart { generation: u64, reason: StartReason },
}

/// Backend operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailedOp {
    Write,
    Probe,
    Resize,
}

impl FailedOp {
    fn event_kind(self) -> IncidentEventKind {
        match self {
            FailedOp::Write => IncidentEventKind::WriteFailure,
            FailedOp::Probe => IncidentEventKind::ProbeFailed,
            FailedOp::Resize => IncidentEventKind::ResizeFailure,
        }
    }
}

#[derive(Debug, Clone)]
struct ErrorBanner {
    message: String,
    shown_at: u64,
}

struct Runtime {
    binding: SessionBinding,
    state: SessionState,
    generation: u64,
    handle: Option<HandleId>,
    session_id: Option<String>,
    running: bool,
    interactive: bool,
    external_editable_focus: bool,
    last_input_attempt_at: u64,
    last_output_at: u64,
    last_recovery_at: u64,
    auto_recover_attempts: u32,
    exit_code: Option<i32>,
    error: Option<ErrorBanner>,
    wheel_remainder: f64,
    focus_sequence: u64,
    focus_pending: bool,
    subscription: Option<Subscription>,
    timers: Vec<JoinHandle<()>>,
    closed: bool,
}

impl Runtime {
    fn new(binding: SessionBinding, interactive: bool) -> Self {
        Self {
            handle: binding.runtime.embedded_terminal_id.clone(),
            session_id: binding.runtime.session_id.clone(),
            binding,
            state: SessionState::Idle,
            generation: 0,
            running: false,
            interactive,
            external_editable_focus: false,
            last_input_attempt_at: 0,
            last_output_at: 0,
            last_recovery_at: 0,
            auto_recover_attempts: 0,
            exit_code: None,
            error: None,
            wheel_remainder: 0.0,
            focus_sequence: 0,
            focus_pending: false,
            subscription: None,
            timers: Vec::new(),
            closed: false,
        }
    }

    /// Abort timers and hand back the listener for disposal outside the lock
    fn teardown(&mut self) -> Option<Subscription> {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
        self.focus_pending = false;
        self.subscription.take()
    }

    /// Forget the live handle
    fn clear_handle(&mut self) -> Option<HandleId> {
        self.running = false;
        self.binding.runtime.embedded_terminal_id = None;
        self.handle.take()
    }

    fn status_text(&self) -> String {
        match self.state {
            SessionState::Idle => "Idle".to_string(),
            SessionState::Starting => "Starting session".to_string(),
            SessionState::Reattaching => "Reattaching to session".to_string(),
            SessionState::Running => "Running".to_string(),
            SessionState::StaleRecoveryPending => "Recovering unresponsive session".to_string(),
            SessionState::Exited => match self.exit_code {
                Some(code) => format!("Exited with code {code}"),
                None => "Exited".to_string(),
            },
        }
    }
}

struct Inner<B, S> {
    backend: Arc<B>,
    surface: Mutex<S>,
    rt: Mutex<Runtime>,
    timings: SessionTimings,
    auto_focus: bool,
    diagnostics: SharedDiagnostics,
    session_cache: SharedSessionCache,
    actions: mpsc::UnboundedSender<Action>,
    fallback_geometry: Geometry,
    pump_tx: mpsc::UnboundedSender<PumpMessage>,
    clock: Clock,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Lifecycle controller of one mounted pane
pub struct SessionController<B: ProcessBackend, S: RenderSurface> {
    inner: Arc<Inner<B, S>>,
    pump: JoinHandle<()>,
}

impl<B: ProcessBackend, S: RenderSurface> SessionController<B, S> {
    /// Create the controller and its event pump. Must run inside a tokio runtime.
    ///
    /// Nothing is started until [`SessionController::start`] is called.
    pub fn mount(binding: SessionBinding, surface: S, backend: Arc<B>, options: MountOptions) -> Self {
        let (pump_tx, pump_rx) = mpsc::unbounded_channel();
        log::debug!(
            "Mounting session controller for {} (persistent key: {})",
            binding.address,
            binding.use_persistent_key
        );
        let inner = Arc::new(Inner {
            backend,
            surface: Mutex::new(surface),
            rt: Mutex::new(Runtime::new(binding, options.interactive)),
            timings: options.timings,
            auto_focus: options.auto_focus,
            diagnostics: options.diagnostics,
            session_cache: options.session_cache,
            actions: options.actions,
            fallback_geometry: options.fallback_geometry,
            pump_tx,
            clock: Clock::new(),
        });
        let pump = tokio::spawn(Arc::clone(&inner).run_pump(pump_rx));
        Self { inner, pump }
    }

    pub fn address(&self) -> PaneAddress {
        self.inner.rt.lock().binding.address.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.rt.lock().state
    }

    /// Current startup generation
    pub fn generation(&self) -> u64 {
        self.inner.rt.lock().generation
    }

    pub fn handle_id(&self) -> Option<HandleId> {
        self.inner.rt.lock().handle.clone()
    }

    /// Snapshot for the UI
    pub fn status(&self) -> SessionStatus {
        let now = self.inner.clock.now_ms();
        let ttl = self.inner.timings.error_banner_ttl_ms;
        let rt = self.inner.rt.lock();
        let error = rt
            .error
            .as_ref()
            .filter(|banner| now.saturating_sub(banner.shown_at) < ttl)
            .map(|banner| banner.message.clone());
        SessionStatus {
            state: rt.state,
            status_text: rt.status_text(),
            error,
            ready: rt.running && rt.handle.is_some(),
            handle_id: rt.handle.clone(),
            session_id: rt.session_id.clone(),
        }
    }

    /// Run the startup sequence: reattach to a known handle or start fresh
    pub async fn start(&self, reason: StartReason) -> Result<(), SessionError> {
        self.inner.start(reason).await
    }

    /// Forward input to the backend unchanged
    pub async fn send_input(&self, data: &str) -> Result<(), SessionError> {
        self.inner.send_input(data).await
    }

    /// Type `command` followed by Enter
    pub async fn run_command(&self, command: &str) -> Result<(), SessionError> {
        self.inner.send_input(&format!("{command}\r")).await
    }

    /// Encode and send a key press.
    ///
    /// Returns false when the key is left to the host (chords, unknown keys).
    pub async fn handle_key(&self, input: &KeyInput) -> Result<bool, SessionError> {
        let Some(sequence) = encode_terminal_key_input(input) else {
            return Ok(false);
        };
        self.inner.send_input(&sequence).await?;
        Ok(true)
    }

    /// Scroll the surface by a wheel delta; returns the lines scrolled
    pub fn handle_wheel(&self, delta_y: f64, mode: WheelDeltaMode) -> i32 {
        let rows = self.inner.geometry().rows;
        let scroll = {
            let mut rt = self.inner.rt.lock();
            let scroll = normalize_wheel_delta_to_scroll_lines(delta_y, mode, rows, rt.wheel_remainder);
            rt.wheel_remainder = scroll.remainder;
            scroll
        };
        self.inner.record(
            IncidentEventKind::WheelInput,
            Some(format!("delta {delta_y} ({mode:?}) -> {} lines", scroll.lines)),
        );
        if scroll.lines != 0 {
            self.inner.surface.lock().scroll_lines(scroll.lines);
        }
        scroll.lines
    }

    /// Push new grid geometry to the backend
    pub async fn resize(&self, cols: u16, rows: u16) -> Result<(), SessionError> {
        let generation = self.generation();
        self.inner.resize_handle(generation, cols, rows).await
    }

    /// Whether the pane is visible and may take focus.
    ///
    /// Becoming interactive while running schedules the auto-focus retry.
    pub fn set_interactive(&self, interactive: bool) {
        let refocus = {
            let mut rt = self.inner.rt.lock();
            let became = interactive && !rt.interactive;
            rt.interactive = interactive;
            (became && rt.running).then_some(rt.generation)
        };
        if let Some(generation) = refocus {
            self.inner.schedule_focus_retry(generation);
        }
    }

    /// Whether an editable control outside the terminal holds focus
    pub fn set_external_editable_focus(&self, focused: bool) {
        self.inner.rt.lock().external_editable_focus = focused;
    }

    /// Rebind to another project path, restarting a live session.
    ///
    /// Returns true if a restart happened.
    pub async fn set_project_path(&self, project_path: &str) -> Result<bool, SessionError> {
        let live = {
            let mut rt = self.inner.rt.lock();
            if rt.closed {
                return Err(SessionError::Closed);
            }
            if rt.binding.project_path == project_path {
                return Ok(false);
            }
            rt.binding.project_path = project_path.to_string();
            rt.binding.runtime.project_path = Some(project_path.to_string());
            rt.running || rt.handle.is_some()
        };
        self.inner
            .publish(PaneStatePatch::default().project_path(project_path));
        if live {
            log::info!("Project path changed to {}; restarting session", project_path);
            self.inner.restart(StartReason::ProjectPathChanged).await?;
        }
        Ok(live)
    }

    /// Terminate the backend session and start again
    pub async fn restart(&self) -> Result<(), SessionError> {
        self.inner.restart(StartReason::Restart).await
    }

    /// Release the live handle with `mode`; the controller stays usable
    pub async fn close_with(&self, mode: CloseMode) -> Result<(), SessionError> {
        self.inner.close_with(mode).await
    }

    /// Terminate the session and dispose the surface
    pub async fn close(&self) -> Result<(), SessionError> {
        {
            let mut rt = self.inner.rt.lock();
            if rt.closed {
                return Ok(());
            }
            rt.closed = true;
        }
        let result = self.inner.close_with(CloseMode::Terminate).await;
        self.inner.surface.lock().dispose();
        self.pump.abort();
        result
    }

    /// Serve another pane address, keeping the live handle and persistent key.
    ///
    /// A split hands the pane's session to the child that inherited its
    /// runtime state; later patches and soft reattaches follow the new address.
    pub fn rebind(&self, address: PaneAddress) {
        let mut rt = self.inner.rt.lock();
        crate::debug_info!(
            "SESSION",
            "Rebinding {} to {} (handle {:?})",
            rt.binding.address,
            address,
            rt.handle
        );
        rt.binding.rebind(address);
    }

    /// Stop all work without touching the backend; the session survives a reload
    pub fn unmount(&self) {
        let stale = {
            let mut rt = self.inner.rt.lock();
            rt.generation += 1;
            rt.closed = true;
            rt.running = false;
            rt.teardown()
        };
        drop(stale);
        self.pump.abort();
        log::debug!("Unmounted session controller for {}", self.address());
    }
}

impl<B: ProcessBackend, S: RenderSurface> Drop for SessionController<B, S> {
    fn drop(&mut self) {
        let stale = self.inner.rt.lock().teardown();
        drop(stale);
        self.pump.abort();
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

impl<B: ProcessBackend, S: RenderSurface> Inner<B, S> {
    fn is_current(&self, generation: u64) -> bool {
        self.rt.lock().generation == generation
    }

    /// Surface geometry, or the configured fallback before the surface has one
    fn geometry(&self) -> Geometry {
        let geometry = self.surface.lock().geometry();
        if geometry.cols == 0 || geometry.rows == 0 {
            self.fallback_geometry
        } else {
            geometry
        }
    }

    /// Listener forwarding validated events of `generation` to the pump
    fn listener(&self, generation: u64) -> EventListener {
        let tx = self.pump_tx.clone();
        Box::new(move |raw: serde_json::Value| match SessionEvent::from_value(raw) {
            Ok(event) => {
                let _ = tx.send(PumpMessage::Backend { generation, event });
            }
            Err(e) => log::warn!("Dropping malformed session event: {}", e),
        })
    }

    fn start_request(&self) -> StartRequest {
        let geometry = self.geometry();
        let rt = self.rt.lock();
        let binding = &rt.binding;
        let start_fresh = binding.start_fresh();
        let resume_session_id = if start_fresh {
            None
        } else {
            rt.session_id.clone().or_else(|| {
                binding.provider_id.as_deref().and_then(|provider| {
                    self.session_cache
                        .lock()
                        .get(&session_cache_key(provider, &binding.project_path))
                })
            })
        };
        StartRequest {
            project_path: binding.project_path.clone(),
            cols: geometry.cols,
            rows: geometry.rows,
            provider_id: binding.provider_id.clone(),
            persistent_session_key: binding.persistent_key(),
            resume_session_id,
            start_fresh,
        }
    }

    async fn start(&self, reason: StartReason) -> Result<(), SessionError> {
        let (generation, existing, use_key, address, stale) = {
            let mut rt = self.rt.lock();
            if rt.closed {
                return Err(SessionError::Closed);
            }
            rt.generation += 1;
            let stale = rt.teardown();
            rt.running = false;
            rt.exit_code = None;
            let use_key = rt.binding.use_persistent_key;
            let existing = rt.handle.clone();
            rt.state = if existing.is_some() && use_key {
                SessionState::Reattaching
            } else {
                SessionState::Starting
            };
            (rt.generation, existing, use_key, rt.binding.address.clone(), stale)
        };
        drop(stale);
        log::info!(
            "Starting session for {} ({}, generation {})",
            address,
            reason,
            generation
        );
        crate::debug_log!(
            "SESSION",
            "start {} reason={} generation={} existing={:?}",
            address,
            reason,
            generation,
            existing
        );

        if let Some(handle) = existing {
            if use_key {
                self.record(IncidentEventKind::Reattach, Some(reason.to_string()));
                match self.backend.subscribe(&handle, self.listener(generation)).await {
                    Ok(subscription) => {
                        return if self.bind(generation, &handle, None, subscription) {
                            self.after_bind(generation).await;
                            Ok(())
                        } else {
                            Err(SessionError::Superseded)
                        };
                    }
                    Err(e) => {
                        log::warn!("Reattach to {} failed for {}: {}", handle, address, e);
                        self.record(IncidentEventKind::ListenerAttachFailed, Some(e.to_string()));
                        if e == BackendError::BridgeUnavailable {
                            self.fail_start(generation, &e);
                            return Err(e.into());
                        }
                    }
                }
            }
            self.discard_handle(generation, &handle).await?;
        }

        {
            let mut rt = self.rt.lock();
            if rt.generation != generation {
                return Err(SessionError::Superseded);
            }
            rt.state = SessionState::Starting;
        }
        self.record(IncidentEventKind::Start, Some(reason.to_string()));

        let request = self.start_request();
        let response = match self.backend.start(request).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Failed to start session for {}: {}", address, e);
                self.fail_start(generation, &e);
                return Err(e.into());
            }
        };
        if !self.is_current(generation) {
            self.release_superseded(&response.handle_id).await;
            return Err(SessionError::Superseded);
        }
        if response.reused_existing_session {
            self.record(
                IncidentEventKind::Reuse,
                Some(format!("handle {}", response.handle_id)),
            );
        }

        let subscription = match self
            .backend
            .subscribe(&response.handle_id, self.listener(generation))
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                log::warn!("Listener attach failed for {}: {}", response.handle_id, e);
                self.record(IncidentEventKind::ListenerAttachFailed, Some(e.to_string()));
                if let Err(close_err) = self.backend.close(&response.handle_id, false).await {
                    log::debug!("Detach of {} failed: {}", response.handle_id, close_err);
                }
                self.fail_start(generation, &e);
                return Err(e.into());
            }
        };

        if self.bind(
            generation,
            &response.handle_id,
            response.session_id,
            subscription,
        ) {
            self.after_bind(generation).await;
            Ok(())
        } else {
            self.release_superseded(&response.handle_id).await;
            Err(SessionError::Superseded)
        }
    }

    /// Detach a stale handle before a fresh start
    async fn discard_handle(&self, generation: u64, handle: &str) -> Result<(), SessionError> {
        if let Err(e) = self.backend.close(handle, false).await {
            log::debug!("Detach of stale handle {} failed: {}", handle, e);
        }
        {
            let mut rt = self.rt.lock();
            if rt.generation != generation {
                return Err(SessionError::Superseded);
            }
            if rt.handle.as_deref() == Some(handle) {
                rt.clear_handle();
            }
        }
        self.publish(PaneStatePatch::default().clear_embedded_terminal_id());
        Ok(())
    }

    /// A handle obtained by a superseded start is detached, never terminated
    async fn release_superseded(&self, handle: &str) {
        log::debug!("Releasing handle {} from a superseded start", handle);
        if let Err(e) = self.backend.close(handle, false).await {
            log::debug!("Detach of superseded handle {} failed: {}", handle, e);
        }
    }

    fn fail_start(&self, generation: u64, error: &BackendError) {
        {
            let mut rt = self.rt.lock();
            if rt.generation != generation {
                return;
            }
            rt.state = SessionState::Idle;
            rt.running = false;
        }
        self.show_error(format!("Could not start session: {error}"));
    }

    /// Bind `handle` if `generation` is still current; drops the subscription otherwise
    fn bind(
        &self,
        generation: u64,
        handle: &str,
        session_id: Option<String>,
        subscription: Subscription,
    ) -> bool {
        let (patch, cache_entry) = {
            let mut rt = self.rt.lock();
            if rt.generation != generation || rt.closed {
                return false;
            }
            rt.handle = Some(handle.to_string());
            rt.binding.runtime.embedded_terminal_id = Some(handle.to_string());
            rt.subscription = Some(subscription);
            rt.running = true;
            rt.state = SessionState::Running;
            rt.last_input_attempt_at = 0;
            rt.last_output_at = 0;
            rt.error = None;

            let mut patch = PaneStatePatch::default().embedded_terminal_id(handle);
            let mut cache_entry = None;
            if let Some(session_id) = session_id {
                rt.session_id = Some(session_id.clone());
                rt.binding.runtime.session_id = Some(session_id.clone());
                cache_entry = rt
                    .binding
                    .provider_id
                    .as_deref()
                    .map(|provider| (session_cache_key(provider, &rt.binding.project_path), session_id.clone()));
                patch = patch.session_id(session_id);
            }
            (patch, cache_entry)
        };
        if let Some((key, session_id)) = cache_entry {
            self.session_cache.lock().put(key, session_id);
        }
        self.publish(patch);
        log::info!("Bound handle {} (generation {})", handle, generation);
        crate::debug_info!("SESSION", "bound handle {} generation={}", handle, generation);
        true
    }

    /// Geometry sync, timers and auto-focus for a freshly bound handle
    async fn after_bind(&self, generation: u64) {
        let geometry = self.geometry();
        // Failures are reported through the banner and diagnostics
        let _ = self
            .resize_handle(generation, geometry.cols, geometry.rows)
            .await;
        if !self.is_current(generation) {
            return;
        }
        self.arm_timers(generation);
        if self.auto_focus {
            self.schedule_focus_retry(generation);
        }
    }

    async fn restart(&self, reason: StartReason) -> Result<(), SessionError> {
        if let Err(e) = self.close_with(CloseMode::Terminate).await {
            log::warn!("Close before restart failed: {}", e);
        }
        self.start(reason).await
    }

    async fn close_with(&self, mode: CloseMode) -> Result<(), SessionError> {
        let (handle, stale) = {
            let mut rt = self.rt.lock();
            rt.generation += 1;
            let stale = rt.teardown();
            rt.state = SessionState::Idle;
            (rt.clear_handle(), stale)
        };
        drop(stale);
        self.record(IncidentEventKind::Close, Some(format!("{mode:?}")));
        self.publish(PaneStatePatch::default().clear_embedded_terminal_id());

        if let Some(handle) = handle {
            log::info!("Closing handle {} ({:?})", handle, mode);
            self.backend
                .close(&handle, mode.terminates())
                .await
                .map_err(SessionError::from)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Running session
// ---------------------------------------------------------------------------

impl<B: ProcessBackend, S: RenderSurface> Inner<B, S> {
    async fn send_input(&self, data: &str) -> Result<(), SessionError> {
        let now = self.clock.now_ms();
        let (generation, handle) = {
            let mut rt = self.rt.lock();
            if rt.closed {
                return Err(SessionError::Closed);
            }
            let handle = match (&rt.handle, rt.running) {
                (Some(handle), true) => handle.clone(),
                _ => return Err(SessionError::NotRunning),
            };
            rt.last_input_attempt_at = now;
            (rt.generation, handle)
        };
        self.record(IncidentEventKind::Input, Some(format!("{} bytes", data.len())));
        match self.backend.write_input(&handle, data).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.on_backend_failure(generation, FailedOp::Write, &e);
                Err(e.into())
            }
        }
    }

    async fn resize_handle(&self, generation: u64, cols: u16, rows: u16) -> Result<(), SessionError> {
        let handle = {
            let rt = self.rt.lock();
            match (&rt.handle, rt.running) {
                (Some(handle), true) if rt.generation == generation => handle.clone(),
                _ => return Err(SessionError::NotRunning),
            }
        };
        match self.backend.resize(&handle, cols, rows).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.on_backend_failure(generation, FailedOp::Resize, &e);
                Err(e.into())
            }
        }
    }

    /// React to a failed backend call
    fn on_backend_failure(&self, generation: u64, op: FailedOp, error: &BackendError) {
        let kind = match error {
            BackendError::SessionNotFound(_) => IncidentEventKind::SessionNotFound,
            _ => op.event_kind(),
        };
        self.record(kind, Some(error.to_string()));
        if !self.is_current(generation) {
            return;
        }

        if let BackendError::SessionNotFound(_) = error {
            let stale = {
                let mut rt = self.rt.lock();
                if rt.generation != generation || rt.handle.is_none() {
                    return;
                }
                let stale = rt.teardown();
                rt.clear_handle();
                rt.state = SessionState::Starting;
                stale
            };
            drop(stale);
            log::warn!("Backend lost the handle during {:?}; soft reattaching", op);
            self.publish(PaneStatePatch::default().clear_embedded_terminal_id());
            self.schedule_restart(
                generation,
                self.timings.soft_reattach_delay(),
                StartReason::SessionNotFound,
            );
        } else {
            log::warn!("Backend {:?} failed: {}", op, error);
            self.show_error(error.to_string());
        }
    }

    fn show_error(&self, message: String) {
        let now = self.clock.now_ms();
        self.rt.lock().error = Some(ErrorBanner {
            message,
            shown_at: now,
        });
    }

    fn publish(&self, patch: PaneStatePatch) {
        let address = self.rt.lock().binding.address.clone();
        if self
            .actions
            .send(Action::update_pane_state(&address, patch))
            .is_err()
        {
            log::trace!("Pane state receiver for {} is gone", address);
        }
    }

    fn record(&self, kind: IncidentEventKind, detail: Option<String>) {
        if !self.diagnostics.lock().log.is_enabled() {
            return;
        }
        let now = self.clock.now_ms();
        let event = {
            let rt = self.rt.lock();
            let event = IncidentEvent::new(now, kind, &rt.binding.address, &rt.binding.pane_key())
                .with_terminal(rt.handle.clone());
            match detail {
                Some(detail) => event.with_detail(detail),
                None => event,
            }
        };
        self.diagnostics.lock().log.record(event);
    }

    /// Classify recent events and capture a bundle (debounced per pane)
    async fn capture_incident(&self, reason: &str) {
        let enabled = self.diagnostics.lock().log.is_enabled();
        if !enabled {
            return;
        }
        let (pane_key, persistent_key) = {
            let rt = self.rt.lock();
            (rt.binding.pane_key(), rt.binding.persistent_key())
        };
        let snapshot = match persistent_key {
            Some(key) => self.backend.session_snapshot(&key).await,
            None => None,
        };
        let now = self.clock.now_ms();
        let bundle = self
            .diagnostics
            .lock()
            .capture_incident(&pane_key, reason, snapshot, now);
        if let Some(bundle) = bundle {
            log::warn!("Incident on {}: {}", pane_key, bundle.label);
        }
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

impl<B: ProcessBackend, S: RenderSurface> Inner<B, S> {
    fn push_timer(&self, generation: u64, timer: JoinHandle<()>) {
        let mut rt = self.rt.lock();
        if rt.generation == generation {
            rt.timers.push(timer);
        } else {
            timer.abort();
        }
    }

    fn spawn_interval(
        &self,
        generation: u64,
        period: Duration,
        message: fn(u64) -> PumpMessage,
    ) {
        let period = period.max(Duration::from_millis(1));
        let tx = self.pump_tx.clone();
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if tx.send(message(generation)).is_err() {
                    break;
                }
            }
        });
        self.push_timer(generation, timer);
    }

    fn spawn_delayed(&self, generation: u64, delay: Duration, message: PumpMessage) {
        let tx = self.pump_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message);
        });
        self.push_timer(generation, timer);
    }

    /// Liveness probe and stale-input poll
    fn arm_timers(&self, generation: u64) {
        self.spawn_interval(
            generation,
            self.timings.liveness_probe_interval(),
            |generation| PumpMessage::LivenessProbe { generation },
        );
        self.spawn_interval(
            generation,
            self.timings.stale_poll_interval(),
            |generation| PumpMessage::StalePoll { generation },
        );
    }

    /// Restart after `delay` unless `generation` has been superseded by then
    fn schedule_restart(&self, generation: u64, delay: Duration, reason: StartReason) {
        log::debug!("Scheduling {} restart in {:?}", reason, delay);
        self.spawn_delayed(generation, delay, PumpMessage::Restart { generation, reason });
    }

    fn schedule_focus_retry(&self, generation: u64) {
        let delays = self.timings.focus_retry_delays_ms.clone();
        if delays.is_empty() {
            return;
        }
        let sequence = {
            let mut rt = self.rt.lock();
            if rt.generation != generation {
                return;
            }
            rt.focus_sequence += 1;
            rt.focus_pending = true;
            rt.focus_sequence
        };
        let tx = self.pump_tx.clone();
        let timer = tokio::spawn(async move {
            let first = Instant::now();
            for offset in delays {
                tokio::time::sleep_until(first + Duration::from_millis(offset)).await;
                if tx
                    .send(PumpMessage::FocusAttempt {
                        generation,
                        sequence,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });
        self.push_timer(generation, timer);
    }
}

// ---------------------------------------------------------------------------
// Event pump
// ---------------------------------------------------------------------------

impl<B: ProcessBackend, S: RenderSurface> Inner<B, S> {
    async fn run_pump(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<PumpMessage>) {
        while let Some(message) = rx.recv().await {
            self.handle_message(message).await;
        }
    }

    async fn handle_message(&self, message: PumpMessage) {
        match message {
            PumpMessage::Backend { generation, event } => {
                if !self.is_current(generation) {
                    log::trace!("Discarding event from stale generation {}", generation);
                    return;
                }
                self.on_event(generation, event);
            }
            PumpMessage::LivenessProbe { generation } => self.on_liveness_probe(generation).await,
            PumpMessage::StalePoll { generation } => self.on_stale_poll(generation).await,
            PumpMessage::RecoveryGrace { generation } => self.on_recovery_grace(generation).await,
            PumpMessage::FocusAttempt {
                generation,
                sequence,
            } => self.on_focus_attempt(generation, sequence),
            PumpMessage::Restart { generation, reason } => {
                if !self.is_current(generation) {
                    log::debug!("Dropping {} restart superseded by a newer start", reason);
                    return;
                }
                if let Err(e) = self.start(reason).await {
                    log::warn!("{} restart failed: {}", reason, e);
                }
            }
        }
    }

    fn on_event(&self, generation: u64, event: SessionEvent) {
        match event {
            SessionEvent::Output { data } => {
                crate::debug_trace!("OUTPUT", "{} bytes", data.len());
                let now = self.clock.now_ms();
                self.rt.lock().last_output_at = now;
                self.surface.lock().write(&data);
                self.record(IncidentEventKind::Output, Some(format!("{} bytes", data.len())));
            }
            SessionEvent::Exit { code } => self.on_exit(generation, code),
            SessionEvent::Error { message } => {
                log::warn!("Backend reported an error: {}", message);
                self.show_error(message);
            }
            SessionEvent::SessionId { session_id } => self.on_session_id(session_id),
        }
    }

    fn on_session_id(&self, session_id: String) {
        let cache_entry = {
            let mut rt = self.rt.lock();
            if rt.session_id.as_deref() == Some(session_id.as_str()) {
                return;
            }
            rt.session_id = Some(session_id.clone());
            rt.binding.runtime.session_id = Some(session_id.clone());
            rt.binding
                .provider_id
                .as_deref()
                .map(|provider| session_cache_key(provider, &rt.binding.project_path))
        };
        if let Some(key) = cache_entry {
            self.session_cache.lock().put(key, session_id.clone());
        }
        log::debug!("Session id discovered: {}", session_id);
        self.publish(PaneStatePatch::default().session_id(session_id));
    }

    fn on_exit(&self, generation: u64, code: Option<i32>) {
        let (stale, recover) = {
            let mut rt = self.rt.lock();
            if rt.generation != generation {
                return;
            }
            let stale = rt.teardown();
            rt.clear_handle();
            rt.state = SessionState::Exited;
            rt.exit_code = code;
            let recover = rt.binding.use_persistent_key
                && rt.auto_recover_attempts < self.timings.max_auto_recover_attempts;
            if recover {
                rt.auto_recover_attempts += 1;
            }
            (stale, recover)
        };
        drop(stale);
        self.record(IncidentEventKind::Exit, code.map(|c| format!("code {c}")));
        self.publish(PaneStatePatch::default().clear_embedded_terminal_id());

        if recover {
            log::info!("Session exited ({:?}); scheduling automatic recovery", code);
            self.schedule_restart(
                generation,
                self.timings.auto_recover_delay(),
                StartReason::AutoRecover,
            );
        } else {
            log::info!("Session exited ({:?})", code);
        }
    }

    async fn on_liveness_probe(&self, generation: u64) {
        let handle = {
            let rt = self.rt.lock();
            if rt.generation != generation || !rt.running || !rt.interactive {
                return;
            }
            match &rt.handle {
                Some(handle) => handle.clone(),
                None => return,
            }
        };
        if let Err(e) = self.backend.write_input(&handle, "").await {
            self.on_backend_failure(generation, FailedOp::Probe, &e);
        }
    }

    async fn on_stale_poll(&self, generation: u64) {
        let now = self.clock.now_ms();
        let last_output_at = {
            let mut rt = self.rt.lock();
            if rt.generation != generation
                || !rt.running
                || !rt.interactive
                || rt.state != SessionState::Running
            {
                return;
            }
            if !is_stale_recovery_eligible(
                now,
                rt.last_input_attempt_at,
                rt.last_output_at,
                rt.last_recovery_at,
                &self.timings,
            ) {
                return;
            }
            rt.state = SessionState::StaleRecoveryPending;
            rt.last_recovery_at = now;
            rt.last_output_at
        };
        log::info!("Input looks stale; refocusing and resizing");
        crate::debug_info!("RECOVERY", "stale input at {}, last output at {}", now, last_output_at);
        self.record(IncidentEventKind::StaleRecoveryAttempt, None);
        self.surface.lock().focus();
        let geometry = self.geometry();
        // A failure here is handled like any other resize failure
        let _ = self
            .resize_handle(generation, geometry.cols, geometry.rows)
            .await;
        self.spawn_delayed(
            generation,
            self.timings.recovery_grace(),
            PumpMessage::RecoveryGrace { generation },
        );
    }

    async fn on_recovery_grace(&self, generation: u64) {
        let (escalate, can_reattach) = {
            let mut rt = self.rt.lock();
            if rt.generation != generation || rt.state != SessionState::StaleRecoveryPending {
                return;
            }
            let escalate = should_escalate(rt.last_input_attempt_at, rt.last_output_at);
            let can_reattach = rt.binding.use_persistent_key;
            if !escalate || !can_reattach {
                rt.state = SessionState::Running;
            }
            (escalate, can_reattach)
        };
        if !escalate {
            log::debug!("Output resumed during recovery grace");
            return;
        }

        log::warn!("Output still lags input after recovery grace; escalating");
        crate::debug_error!(
            "RECOVERY",
            "escalating stale recovery (soft reattach: {})",
            can_reattach
        );
        self.record(IncidentEventKind::StaleRecoveryEscalated, None);
        self.capture_incident("stale recovery escalated").await;
        if !can_reattach {
            return;
        }
        if !self.is_current(generation) {
            return;
        }
        if let Err(e) = self.start(StartReason::StaleRecovery).await {
            log::warn!("Soft reattach after stale input failed: {}", e);
        }
    }

    fn on_focus_attempt(&self, generation: u64, sequence: u64) {
        let ctx = {
            let rt = self.rt.lock();
            if rt.generation != generation || rt.focus_sequence != sequence || !rt.focus_pending {
                return;
            }
            FocusContext {
                has_handle: rt.handle.is_some(),
                interactive: rt.interactive,
                running: rt.running,
                external_editable_focus: rt.external_editable_focus,
                surface_has_focus: false,
            }
        };
        let surface_has_focus = self.surface.lock().has_focus();
        match focus_decision(FocusContext {
            surface_has_focus,
            ..ctx
        }) {
            FocusDecision::Attempt => {
                self.surface.lock().focus();
                self.record(IncidentEventKind::FocusAttempt, None);
            }
            FocusDecision::Stop(reason) => {
                self.rt.lock().focus_pending = false;
                if reason.is_gated() {
                    self.record(IncidentEventKind::FocusGated, Some(format!("{reason:?}")));
                }
                log::trace!("Auto-focus retry stopped: {:?}", reason);
            }
        }
    }
}
