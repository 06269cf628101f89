//! Auto-focus retry gating.

/// What the focus retry loop can see when an attempt is due
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusContext {
    pub has_handle: bool,
    pub interactive: bool,
    pub running: bool,
    /// An editable control outside the terminal holds focus
    pub external_editable_focus: bool,
    pub surface_has_focus: bool,
}

/// Why the retry loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusStopReason {
    NoHandle,
    NotInteractive,
    NotRunning,
    ExternalEditableFocus,
    AlreadyFocused,
}

impl FocusStopReason {
    /// Stops caused by the host withholding focus rather than success
    pub fn is_gated(self) -> bool {
        matches!(
            self,
            FocusStopReason::NotInteractive | FocusStopReason::ExternalEditableFocus
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDecision {
    Attempt,
    Stop(FocusStopReason),
}

pub fn focus_decision(ctx: FocusContext) -> FocusDecision {
    let stop = if !ctx.has_handle {
        FocusStopReason::NoHandle
    } else if !ctx.interactive {
        FocusStopReason::NotInteractive
    } else if !ctx.running {
        FocusStopReason::NotRunning
    } else if ctx.external_editable_focus {
        FocusStopReason::ExternalEditableFocus
    } else if ctx.surface_has_focus {
        FocusStopReason::AlreadyFocused
    } else {
        return FocusDecision::Attempt;
    };
    FocusDecision::Stop(stop)
}
