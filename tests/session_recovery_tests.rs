//! Tests for stale input recovery, lost handle soft reattach, liveness
//! probing, error banners and the auto-focus retry.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use agent_deck::config::SessionTimings;
use agent_deck::diagnostics::{Diagnostics, IncidentCapture, IncidentEventKind, IncidentLog};
use agent_deck::terminal::{BackendError, SessionError, SessionState, StartReason};
use common::{Call, FakeBackend, Harness, advance, binding, settle};

fn subscribe_count(backend: &FakeBackend, handle: &str) -> usize {
    backend
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Subscribe { handle: h } if h == handle))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_stale_input_escalates_to_soft_reattach() {
    let incidents = tempfile::tempdir().unwrap();
    let diagnostics = Arc::new(Mutex::new(Diagnostics::new(
        IncidentLog::new(true, 400),
        IncidentCapture::new(60_000, Some(incidents.path().to_path_buf())),
    )));
    let backend = FakeBackend::new();
    let h = Harness::mount_full(
        binding(),
        Arc::clone(&backend),
        SessionTimings::default(),
        diagnostics,
    );
    h.controller.start(StartReason::Mount).await.unwrap();
    h.controller.send_input("hello").await.unwrap();

    // Auto-focus retries are done well before the threshold
    advance(600).await;
    let focus_before = h.surface.focus_calls();

    // Threshold is exclusive: the 8s poll does nothing, the 9s poll recovers
    advance(8_450).await;
    assert_eq!(h.controller.state(), SessionState::StaleRecoveryPending);
    assert_eq!(h.surface.focus_calls(), focus_before + 1);
    assert_eq!(backend.resizes().len(), 2);

    // No output during the grace period
    advance(1_300).await;
    assert_eq!(h.controller.state(), SessionState::Running);
    assert_eq!(h.controller.handle_id().as_deref(), Some("h1"));
    assert_eq!(subscribe_count(&backend, "h1"), 2);
    assert_eq!(backend.starts().len(), 1);

    let kinds = h.event_kinds();
    assert!(kinds.contains(&IncidentEventKind::StaleRecoveryAttempt));
    assert!(kinds.contains(&IncidentEventKind::StaleRecoveryEscalated));
    assert!(kinds.contains(&IncidentEventKind::Reattach));

    let files: Vec<_> = std::fs::read_dir(incidents.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let bundle: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(bundle["paneKey"], "ad.w1.t1.p1");
    assert_eq!(bundle["reason"], "stale recovery escalated");
}

#[tokio::test(start_paused = true)]
async fn test_output_during_grace_cancels_escalation() {
    let backend = FakeBackend::new();
    let h = Harness::mount(binding(), Arc::clone(&backend));
    h.controller.start(StartReason::Mount).await.unwrap();
    h.controller.send_input("hello").await.unwrap();

    advance(9_050).await;
    assert_eq!(h.controller.state(), SessionState::StaleRecoveryPending);

    backend.emit_output("h1", "world");
    settle().await;
    advance(1_300).await;

    assert_eq!(h.controller.state(), SessionState::Running);
    assert_eq!(subscribe_count(&backend, "h1"), 1);
    assert!(!h.event_kinds().contains(&IncidentEventKind::StaleRecoveryEscalated));
    assert_eq!(h.surface.written(), "world");
}

#[tokio::test(start_paused = true)]
async fn test_answered_input_is_never_stale() {
    let backend = FakeBackend::new();
    let h = Harness::mount(binding(), Arc::clone(&backend));
    h.controller.start(StartReason::Mount).await.unwrap();
    h.controller.send_input("hello").await.unwrap();
    advance(10).await;
    backend.emit_output("h1", "hi");

    advance(12_000).await;

    assert_eq!(h.controller.state(), SessionState::Running);
    assert!(!h.event_kinds().contains(&IncidentEventKind::StaleRecoveryAttempt));
}

#[tokio::test(start_paused = true)]
async fn test_stale_poll_skips_hidden_panes() {
    let backend = FakeBackend::new();
    let h = Harness::mount(binding(), Arc::clone(&backend));
    h.controller.start(StartReason::Mount).await.unwrap();
    h.controller.send_input("hello").await.unwrap();
    h.controller.set_interactive(false);

    advance(12_000).await;

    assert_eq!(h.controller.state(), SessionState::Running);
    assert!(!h.event_kinds().contains(&IncidentEventKind::StaleRecoveryAttempt));
}

#[tokio::test(start_paused = true)]
async fn test_stale_escalation_without_persistent_key_stays_bound() {
    let backend = FakeBackend::new();
    let h = Harness::mount(binding().without_persistent_key(), Arc::clone(&backend));
    h.controller.start(StartReason::Mount).await.unwrap();
    h.controller.send_input("hello").await.unwrap();

    advance(10_500).await;

    assert!(h.event_kinds().contains(&IncidentEventKind::StaleRecoveryEscalated));
    assert_eq!(h.controller.state(), SessionState::Running);
    assert_eq!(subscribe_count(&backend, "h1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_lost_handle_on_write_soft_reattaches() {
    let backend = FakeBackend::new();
    let mut h = Harness::mount(binding(), Arc::clone(&backend));
    h.controller.start(StartReason::Mount).await.unwrap();
    backend.drop_handle("h1");
    h.patches();

    let err = h.controller.send_input("x").await.unwrap_err();
    assert!(err.is_session_not_found());
    assert_eq!(h.controller.state(), SessionState::Starting);
    assert_eq!(h.controller.handle_id(), None);
    // Not surfaced as a banner
    assert_eq!(h.controller.status().error, None);

    advance(150).await;

    assert_eq!(h.controller.state(), SessionState::Running);
    assert_eq!(h.controller.handle_id().as_deref(), Some("h2"));
    assert!(h.event_kinds().contains(&IncidentEventKind::SessionNotFound));
    let patches = h.patches();
    assert_eq!(
        patches.first(),
        Some(&agent_deck::pane::PaneStatePatch::default().clear_embedded_terminal_id())
    );
}

#[tokio::test(start_paused = true)]
async fn test_liveness_probe_detects_lost_handle() {
    let backend = FakeBackend::new();
    let h = Harness::mount(binding(), Arc::clone(&backend));
    h.controller.start(StartReason::Mount).await.unwrap();

    advance(14_000).await;
    assert_eq!(backend.probes(), 0);

    backend.drop_handle("h1");
    advance(1_200).await;

    assert_eq!(backend.probes(), 1);
    assert!(h.event_kinds().contains(&IncidentEventKind::SessionNotFound));
    assert_eq!(h.controller.handle_id().as_deref(), Some("h2"));
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_shows_banner_for_ttl() {
    let backend = FakeBackend::new();
    backend.fail_next_start(BackendError::StartFailed("pty exhausted".to_string()));
    let h = Harness::mount(binding(), Arc::clone(&backend));

    let err = h.controller.start(StartReason::Mount).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Backend(BackendError::StartFailed("pty exhausted".to_string()))
    );
    let status = h.controller.status();
    assert_eq!(status.state, SessionState::Idle);
    assert!(status.error.unwrap().contains("pty exhausted"));

    advance(5_000).await;
    assert!(h.controller.status().error.is_some());
    advance(1_500).await;
    assert_eq!(h.controller.status().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_backend_error_event_shows_banner() {
    let backend = FakeBackend::new();
    let h = Harness::mount(binding(), Arc::clone(&backend));
    h.controller.start(StartReason::Mount).await.unwrap();

    backend.emit("h1", serde_json::json!({"type": "error", "message": "bridge hiccup"}));
    settle().await;

    assert_eq!(h.controller.status().error.as_deref(), Some("bridge hiccup"));
    assert_eq!(h.controller.state(), SessionState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_auto_focus_retries_until_focused() {
    let backend = FakeBackend::new();
    let h = Harness::mount(binding(), Arc::clone(&backend));
    h.controller.start(StartReason::Mount).await.unwrap();

    advance(600).await;

    // Focus never sticks, so every scheduled attempt runs
    assert_eq!(h.surface.focus_calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_auto_focus_stops_once_focused() {
    let backend = FakeBackend::new();
    let h = Harness::mount(binding(), Arc::clone(&backend));
    h.surface.state.lock().focus_sticks = true;
    h.controller.start(StartReason::Mount).await.unwrap();

    advance(600).await;

    assert_eq!(h.surface.focus_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auto_focus_gated_by_external_editor() {
    let backend = FakeBackend::new();
    let h = Harness::mount(binding(), Arc::clone(&backend));
    h.controller.set_external_editable_focus(true);
    h.controller.start(StartReason::Mount).await.unwrap();

    advance(600).await;
    assert_eq!(h.surface.focus_calls(), 0);
    assert!(h.event_kinds().contains(&IncidentEventKind::FocusGated));

    // Becoming interactive again retries once the editor let go
    h.controller.set_external_editable_focus(false);
    h.controller.set_interactive(false);
    h.controller.set_interactive(true);
    advance(600).await;
    assert_eq!(h.surface.focus_calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_restart_timings_are_configurable() {
    let timings = SessionTimings {
        auto_recover_delay_ms: 5_000,
        ..SessionTimings::default()
    };
    let backend = FakeBackend::new();
    let h = Harness::mount_with(binding(), Arc::clone(&backend), timings);
    h.controller.start(StartReason::Mount).await.unwrap();

    backend.emit_exit("h1", 2);
    settle().await;
    advance(4_000).await;
    assert_eq!(h.controller.state(), SessionState::Exited);

    advance(1_500).await;
    assert_eq!(h.controller.state(), SessionState::Running);
}
