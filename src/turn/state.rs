//! Controller state and the transition report returned to front-ends.

use std::fmt;

// ---------------------------------------------------------------------------
// TurnId
// ---------------------------------------------------------------------------

/// Monotonic handle of a submitted turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ControllerState
// ---------------------------------------------------------------------------

/// States of the push-to-talk controller.
///
/// ```text
/// Idle ──start──▶ Recording ──stop (frames)──▶ Busy ──outcome──▶ Idle
///                     └──────stop (no frames)──────────────────▶ Idle
/// Busy ignores start edges.
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// Waiting for a start edge.
    #[default]
    Idle,

    /// The recording buffer is armed and collecting frames.
    Recording,

    /// An artifact was submitted and its turn has not completed.
    Busy,
}

impl ControllerState {
    /// Returns `true` while a turn is unresolved.
    ///
    /// ```
    /// use ptt_agent::turn::ControllerState;
    ///
    /// assert!(!ControllerState::Idle.is_busy());
    /// assert!(!ControllerState::Recording.is_busy());
    /// assert!(ControllerState::Busy.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, ControllerState::Busy)
    }

    /// Short label for the talk button / status line.
    pub fn label(&self) -> &'static str {
        match self {
            ControllerState::Idle => "Ready",
            ControllerState::Recording => "Recording…",
            ControllerState::Busy => "Processing…",
        }
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// What a controller call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Not valid in the current state; nothing changed.
    Ignored,
    /// Idle → Recording.
    Armed,
    /// Recording → Idle, nothing was captured.
    Discarded,
    /// Recording → Busy, the artifact was submitted.
    Dispatched(TurnId),
    /// Recording → Idle, the artifact could not be written.
    CaptureFailed(String),
    /// Busy → Idle.
    Released(TurnId),
}

impl Transition {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Transition::Ignored)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
