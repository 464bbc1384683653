//! Push-to-talk input sources.
//!
//! Every source reduces to the same ordered stream of [`InputEdge`]s:
//!
//! * [`WindowedInput`] — key / pointer events inside the application window.
//! * [`GlobalHotkeyInput`] — OS-level key listener backed by `rdev`, running
//!   on a dedicated thread.
//! * [`ConsoleInput`] — stdin, each Enter toggles; used when the global
//!   listener is unavailable.
//!
//! Thread-based sources deliver [`InputEvent`]s over a `tokio::sync::mpsc`
//! channel and may call a waker so an event-driven loop picks them up
//! immediately.
//!
//! # Usage
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use ptt_agent::input::{parse_key, GlobalHotkeyInput, InputEvent};
//!
//! let (tx, mut rx) = mpsc::channel::<InputEvent>(16);
//! let key = parse_key("Space").expect("unknown key");
//! let _listener = GlobalHotkeyInput::start(key, tx, None).expect("spawn listener");
//!
//! // In your async loop:
//! // while let Some(ev) = rx.recv().await { ... }
//! ```

pub mod console;
pub mod hotkey;
pub mod keys;
pub mod window;

use thiserror::Error;

pub use console::ConsoleInput;
pub use hotkey::GlobalHotkeyInput;
pub use keys::{parse_key, parse_window_key};
pub use window::{Control, WindowedInput};

// ---------------------------------------------------------------------------
// InputEdge / InputEvent
// ---------------------------------------------------------------------------

/// A push-to-talk edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEdge {
    /// The control went down: begin recording.
    Start,
    /// The control came up: end recording.
    Stop,
}

/// Messages sent by thread-based input sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Edge(InputEdge),
    /// The OS-level listener could not be started or has exited.  The
    /// source produces no further edges.
    ListenerFailed(String),
}

// ---------------------------------------------------------------------------
// InputError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InputError {
    #[error("unknown key name {0:?}")]
    UnknownKey(String),

    #[error("failed to spawn input thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// EdgeLatch
// ---------------------------------------------------------------------------

/// Turns raw press/release notifications into clean edges.
///
/// Only the control that produced `Start` can produce the matching `Stop`;
/// repeated presses while held (OS auto-repeat, a second control) are
/// swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeLatch<C> {
    held_by: Option<C>,
}

impl<C: Copy + PartialEq> EdgeLatch<C> {
    pub fn new() -> Self {
        Self { held_by: None }
    }

    pub fn press(&mut self, control: C) -> Option<InputEdge> {
        if self.held_by.is_some() {
            return None;
        }
        self.held_by = Some(control);
        Some(InputEdge::Start)
    }

    pub fn release(&mut self, control: C) -> Option<InputEdge> {
        if self.held_by != Some(control) {
            return None;
        }
        self.held_by = None;
        Some(InputEdge::Stop)
    }

    pub fn held_by(&self) -> Option<C> {
        self.held_by
    }

    pub fn is_held(&self) -> bool {
        self.held_by.is_some()
    }
}

impl<C: Copy + PartialEq> Default for EdgeLatch<C> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
