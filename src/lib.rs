//! Push-to-talk voice agent.
//!
//! Hold a key (or the window's talk button), speak, release: the audio is
//! written to a WAV artifact and handed to a transcribe → reason → speak
//! pipeline on a worker thread.  The reasoning stage can switch a remote LED
//! through the [`actuator`] client.

pub mod actuator;
pub mod agent;
pub mod app;
pub mod audio;
pub mod config;
pub mod input;
pub mod turn;

use std::sync::Arc;

/// Callback that wakes the presentation loop after background work
/// (an input event or a turn outcome) has been queued.
pub type Waker = Arc<dyn Fn() + Send + Sync>;
