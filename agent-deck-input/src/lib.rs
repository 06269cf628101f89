//! Input sequence generation for agent-deck terminal panes.
//!
//! Converts host key events into the bytes written to a terminal session and
//! normalizes wheel deltas into whole scroll lines.

pub mod keys;
pub mod wheel;

pub use keys::{Key, KeyInput, Modifiers, NamedKey, encode_terminal_key_input};
pub use wheel::{WheelDeltaMode, WheelScroll, normalize_wheel_delta_to_scroll_lines};
