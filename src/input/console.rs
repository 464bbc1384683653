//! Stdin fallback input: each Enter toggles between `Start` and `Stop`.

use std::io::BufRead;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::{InputEdge, InputError, InputEvent};
use crate::Waker;

/// Handle to the stdin reader thread.  Dropping it stops forwarding.
pub struct ConsoleInput {
    stop: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl ConsoleInput {
    pub fn start(tx: mpsc::Sender<InputEvent>, waker: Option<Waker>) -> Result<Self, InputError> {
        Self::start_with(std::io::BufReader::new(std::io::stdin()), tx, waker)
    }

    /// Read toggles from any line source.
    pub fn start_with<R>(
        reader: R,
        tx: mpsc::Sender<InputEvent>,
        waker: Option<Waker>,
    ) -> Result<Self, InputError>
    where
        R: BufRead + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("console-input".into())
            .spawn(move || {
                let mut toggle = Toggle::default();
                for line in reader.lines() {
                    if stop_clone.load(Ordering::Relaxed) || line.is_err() {
                        break;
                    }
                    if tx.blocking_send(InputEvent::Edge(toggle.next())).is_err() {
                        break;
                    }
                    if let Some(wake) = &waker {
                        wake();
                    }
                }
                log::debug!("console-input: reader finished");
            })?;

        Ok(Self {
            stop,
            _thread: thread,
        })
    }
}

impl Drop for ConsoleInput {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Alternates Start, Stop, Start, ...
#[derive(Debug, Default)]
struct Toggle {
    held: bool,
}

impl Toggle {
    fn next(&mut self) -> InputEdge {
        self.held = !self.held;
        if self.held {
            InputEdge::Start
        } else {
            InputEdge::Stop
        }
    }
}
