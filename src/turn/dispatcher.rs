//! Turn dispatcher and result sink.
//!
//! [`TurnDispatcher::submit`] runs the pipeline for one artifact on a fresh
//! named OS thread.  The outcome, success or failure, is always delivered
//! through the [`ResultSink`]; panics inside the pipeline are caught at the
//! thread boundary and reported as failures.
//!
//! The dispatcher does not gate submissions itself.  The controller's `Busy`
//! state guarantees at most one turn in flight.
//!
//! ```text
//! submit(artifact) ──spawn "turn-N"──▶ Pipeline::run ──▶ TurnOutcome ──mpsc──▶ ResultSink
//!                                                                      └──▶ waker()
//! ```

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::mpsc;

use crate::agent::{Message, Pipeline};
use crate::audio::Artifact;
use crate::Waker;

use super::state::TurnId;

// ---------------------------------------------------------------------------
// TurnOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    Succeeded(Vec<Message>),
    /// Human-readable diagnostic.
    Failed(String),
}

/// Result of one turn, delivered exactly once per submission.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub id: TurnId,
    pub artifact: Artifact,
    pub submitted_at: SystemTime,
    /// Wall time spent in the pipeline.
    pub elapsed: Duration,
    pub status: TurnStatus,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TurnStatus::Succeeded(_))
    }

    /// Messages of a successful turn; empty for a failed one.
    pub fn messages(&self) -> &[Message] {
        match &self.status {
            TurnStatus::Succeeded(messages) => messages,
            TurnStatus::Failed(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            TurnStatus::Failed(reason) => Some(reason),
            TurnStatus::Succeeded(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// channel
// ---------------------------------------------------------------------------

/// Create a dispatcher and the sink its outcomes arrive on.
///
/// `waker` is called after every delivered outcome so a presentation loop
/// can wake without polling.
pub fn channel(pipeline: Arc<dyn Pipeline>, waker: Option<Waker>) -> (TurnDispatcher, ResultSink) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        TurnDispatcher {
            pipeline,
            tx,
            waker,
            next_id: 1,
            worker: None,
        },
        ResultSink { rx },
    )
}

// ---------------------------------------------------------------------------
// TurnDispatcher
// ---------------------------------------------------------------------------

pub struct TurnDispatcher {
    pipeline: Arc<dyn Pipeline>,
    tx: mpsc::UnboundedSender<TurnOutcome>,
    waker: Option<Waker>,
    next_id: u64,
    worker: Option<JoinHandle<()>>,
}

impl TurnDispatcher {
    /// Start one worker thread running the pipeline on `artifact`.
    ///
    /// Never fails: if the thread cannot be spawned a failed outcome is
    /// delivered immediately.
    pub fn submit(&mut self, artifact: Artifact) -> TurnId {
        let id = TurnId(self.next_id);
        self.next_id += 1;
        let submitted_at = SystemTime::now();

        let pipeline = Arc::clone(&self.pipeline);
        let tx = self.tx.clone();
        let waker = self.waker.clone();
        let worker_artifact = artifact.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("turn-{}", id.0))
            .spawn(move || {
                let started = Instant::now();
                let status = match catch_unwind(AssertUnwindSafe(|| {
                    pipeline.run(&worker_artifact)
                })) {
                    Ok(Ok(messages)) => TurnStatus::Succeeded(messages),
                    Ok(Err(e)) => TurnStatus::Failed(e.to_string()),
                    Err(panic) => {
                        TurnStatus::Failed(format!("pipeline panicked: {}", panic_message(&*panic)))
                    }
                };
                let elapsed = started.elapsed();
                match &status {
                    TurnStatus::Succeeded(m) => log::info!(
                        "dispatcher: turn {id} succeeded with {} messages in {elapsed:?}",
                        m.len()
                    ),
                    TurnStatus::Failed(e) => {
                        log::warn!("dispatcher: turn {id} failed after {elapsed:?}: {e}")
                    }
                }
                deliver(
                    &tx,
                    waker.as_ref(),
                    TurnOutcome {
                        id,
                        artifact: worker_artifact,
                        submitted_at,
                        elapsed,
                        status,
                    },
                );
            });

        match spawned {
            Ok(handle) => {
                log::info!(
                    "dispatcher: turn {id} submitted ({})",
                    artifact.path().display()
                );
                self.worker = Some(handle);
            }
            Err(e) => {
                log::error!("dispatcher: could not spawn worker for turn {id}: {e}");
                deliver(
                    &self.tx,
                    self.waker.as_ref(),
                    TurnOutcome {
                        id,
                        artifact,
                        submitted_at,
                        elapsed: Duration::ZERO,
                        status: TurnStatus::Failed(format!("could not start turn worker: {e}")),
                    },
                );
            }
        }
        id
    }

    /// Join the worker of the turn whose outcome was just received.
    ///
    /// The outcome is the worker's last send, so this waits at most for the
    /// waker call and the thread's exit.
    pub fn reap(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::warn!("dispatcher: worker thread panicked after delivering its outcome");
            }
        }
    }

    /// `true` while a worker thread is still running.
    pub fn in_flight(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }
}

fn deliver(tx: &mpsc::UnboundedSender<TurnOutcome>, waker: Option<&Waker>, outcome: TurnOutcome) {
    if tx.send(outcome).is_err() {
        log::debug!("dispatcher: result sink closed, outcome dropped");
        return;
    }
    if let Some(wake) = waker {
        wake();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".into()
    }
}

// ---------------------------------------------------------------------------
// ResultSink
// ---------------------------------------------------------------------------

/// Receiving end of turn outcomes, owned by the presentation loop.
pub struct ResultSink {
    rx: mpsc::UnboundedReceiver<TurnOutcome>,
}

impl ResultSink {
    /// Return a delivered outcome, if any.  Never blocks.
    pub fn try_receive(&mut self) -> Option<TurnOutcome> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next outcome.  `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<TurnOutcome> {
        self.rx.recv().await
    }

    /// Blocking wait for callers outside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<TurnOutcome> {
        self.rx.blocking_recv()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::PipelineError;
    use crate::audio::{AudioFrame, PcmFormat, RecordingBuffer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo;

    impl Pipeline for Echo {
        fn run(&self, artifact: &Artifact) -> Result<Vec<Message>, PipelineError> {
            Ok(vec![Message::user(format!("{} samples", artifact.sample_count()))])
        }
    }

    struct Broken;

    impl Pipeline for Broken {
        fn run(&self, _: &Artifact) -> Result<Vec<Message>, PipelineError> {
            Err(PipelineError::EmptyTranscript)
        }
    }

    struct Panics;

    impl Pipeline for Panics {
        fn run(&self, _: &Artifact) -> Result<Vec<Message>, PipelineError> {
            panic!("model exploded")
        }
    }

    fn artifact(dir: &std::path::Path) -> Artifact {
        let format = PcmFormat::default();
        let mut buf = RecordingBuffer::new(format, dir.join("turn.wav"));
        buf.arm();
        buf.feed(AudioFrame::new(vec![1; 160], format));
        buf.flush().unwrap().unwrap()
    }

    #[test]
    fn success_is_delivered_with_messages() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dispatcher, mut sink) = channel(Arc::new(Echo), None);

        let id = dispatcher.submit(artifact(dir.path()));
        let outcome = sink.blocking_recv().unwrap();

        assert_eq!(outcome.id, id);
        assert!(outcome.is_success());
        assert_eq!(outcome.messages(), &[Message::user("160 samples")]);
        assert!(outcome.error().is_none());
    }

    #[test]
    fn pipeline_error_becomes_failed_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dispatcher, mut sink) = channel(Arc::new(Broken), None);

        dispatcher.submit(artifact(dir.path()));
        let outcome = sink.blocking_recv().unwrap();

        assert_eq!(outcome.error(), Some("nothing was heard in the recording"));
        assert!(outcome.messages().is_empty());
    }

    #[test]
    fn panic_is_caught_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dispatcher, mut sink) = channel(Arc::new(Panics), None);

        dispatcher.submit(artifact(dir.path()));
        let outcome = sink.blocking_recv().unwrap();

        assert_eq!(outcome.error(), Some("pipeline panicked: model exploded"));
    }

    #[test]
    fn ids_are_monotonic_and_waker_fires() {
        let dir = tempfile::tempdir().unwrap();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let waker: Waker = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (mut dispatcher, mut sink) = channel(Arc::new(Echo), Some(waker));

        let first = dispatcher.submit(artifact(dir.path()));
        sink.blocking_recv().unwrap();
        dispatcher.reap();
        let second = dispatcher.submit(artifact(dir.path()));
        sink.blocking_recv().unwrap();

        assert!(second > first);
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reap_waits_for_the_worker_to_exit() {
        let dir = tempfile::tempdir().unwrap();
        let woken = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&woken);
        // Runs on the worker after the outcome is already in the channel.
        let waker: Waker = Arc::new(move || {
            std::thread::sleep(Duration::from_millis(100));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (mut dispatcher, mut sink) = channel(Arc::new(Echo), Some(waker));

        dispatcher.submit(artifact(dir.path()));
        sink.blocking_recv().unwrap();
        dispatcher.reap();

        assert_eq!(woken.load(Ordering::SeqCst), 1);
        assert!(!dispatcher.in_flight());
    }

    #[test]
    fn try_receive_is_non_blocking() {
        let (_dispatcher, mut sink) = channel(Arc::new(Echo), None);
        assert!(sink.try_receive().is_none());
    }

    #[tokio::test]
    async fn async_recv_wakes_on_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dispatcher, mut sink) = channel(Arc::new(Echo), None);

        let id = dispatcher.submit(artifact(dir.path()));
        let outcome = tokio::time::timeout(Duration::from_secs(5), sink.recv())
            .await
            .expect("outcome within timeout")
            .unwrap();
        assert_eq!(outcome.id, id);
    }

    #[test]
    fn recv_ends_when_dispatcher_dropped() {
        let (dispatcher, mut sink) = channel(Arc::new(Echo), None);
        drop(dispatcher);
        assert!(sink.blocking_recv().is_none());
    }
}
