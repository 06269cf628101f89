// Library exports for testing and for hosts embedding the workspace shell
//
// # Mutex Usage Policy
//
// agent-deck state is shared between tokio tasks (event pumps, timers) and
// the host's synchronous UI code.
//
//   - `parking_lot::Mutex`: use for all shared controller, diagnostics and
//     cache state. Guards are never held across an `.await`; copy what you
//     need out of the guard and drop it before calling the backend.
//
//   - Lock order is controller runtime, then the session cache or the
//     diagnostics log. The surface lock is never taken while another lock
//     is held.

/// Application version (root crate version, for use by sub-crates).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod cache;
pub mod cli;
pub mod diagnostics;
pub mod pane;
pub mod session;
pub mod tab;
pub mod terminal;
pub mod workspace;

pub use agent_deck_config as config;
pub use agent_deck_input as input;
