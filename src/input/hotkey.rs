//! Dedicated OS-thread hotkey listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`GlobalHotkeyInput`] owns that thread and a stop flag; dropping it sets
//! the flag so the callback silently ignores further events.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**.  Setting the stop flag
//! prevents events from being forwarded, but the OS thread itself will remain
//! blocked in the rdev event loop until the process exits.
//!
//! # Degraded mode
//!
//! When the OS refuses the listener (no display server, missing
//! accessibility permission) `rdev::listen` returns an error.  The source
//! then raises its degraded flag, sends [`InputEvent::ListenerFailed`] once
//! and never produces an edge.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::{EdgeLatch, InputError, InputEvent};
use crate::Waker;

// ---------------------------------------------------------------------------
// GlobalHotkeyInput
// ---------------------------------------------------------------------------

/// Handle to a running global hotkey listener thread.
pub struct GlobalHotkeyInput {
    /// Shared stop flag, set on [`Drop`].
    stop: Arc<AtomicBool>,
    degraded: Arc<AtomicBool>,
    /// Never joined: `rdev::listen` does not return while it is healthy.
    _thread: std::thread::JoinHandle<()>,
}

impl GlobalHotkeyInput {
    /// Spawn a dedicated OS thread that listens for global key events and
    /// forwards `Start` / `Stop` edges on `tx` whenever `key` is pressed or
    /// released.
    ///
    /// # Arguments
    ///
    /// * `key`   — The [`rdev::Key`] to watch.  Use
    ///   [`crate::input::parse_key`] to obtain this from a config string.
    /// * `tx`    — A `tokio::sync::mpsc` sender.  The background thread uses
    ///   `blocking_send` so it works correctly from a non-async context.
    /// * `waker` — Called after every forwarded event.
    ///
    /// # Errors
    ///
    /// [`InputError::Spawn`] if the OS refuses to create the thread.
    pub fn start(
        key: rdev::Key,
        tx: mpsc::Sender<InputEvent>,
        waker: Option<Waker>,
    ) -> Result<Self, InputError> {
        let stop = Arc::new(AtomicBool::new(false));
        let degraded = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let degraded_clone = Arc::clone(&degraded);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                // blocking_send is safe to call from non-async threads.
                let notify = move |event: InputEvent| {
                    if tx.blocking_send(event).is_ok() {
                        if let Some(wake) = &waker {
                            wake();
                        }
                    }
                };

                let mut latch = EdgeLatch::new();
                let forward = notify.clone();
                let result = rdev::listen(move |event| {
                    if stop_clone.load(Ordering::Relaxed) {
                        return;
                    }

                    let edge = match event.event_type {
                        rdev::EventType::KeyPress(k) if k == key => latch.press(()),
                        rdev::EventType::KeyRelease(k) if k == key => latch.release(()),
                        _ => None,
                    };
                    if let Some(edge) = edge {
                        forward(InputEvent::Edge(edge));
                    }
                });

                if let Err(e) = result {
                    degraded_clone.store(true, Ordering::Relaxed);
                    log::error!("hotkey-listener: rdev::listen exited with error: {:?}", e);
                    notify(InputEvent::ListenerFailed(format!("{e:?}")));
                }
            })?;

        log::info!("hotkey-listener: watching {:?}", key);
        Ok(Self {
            stop,
            degraded,
            _thread: thread,
        })
    }

    /// `true` once the OS listener has failed.  No further edges will arrive.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }
}

impl Drop for GlobalHotkeyInput {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
