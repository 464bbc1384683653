//! Push-to-talk controller: the only writer of [`ControllerState`].
//!
//! # Flow
//!
//! ```text
//! on_start            Idle      ─▶ arm buffer             ─▶ Recording
//! on_stop             Recording ─▶ flush buffer
//!                                  ├─ artifact ─▶ submit  ─▶ Busy
//!                                  ├─ nothing             ─▶ Idle
//!                                  └─ write error         ─▶ Idle
//! on_turn_complete    Busy      ─▶ reap worker            ─▶ Idle
//! ```
//!
//! Calls that are not valid in the current state are ignored and logged at
//! debug level.  Ignoring start edges while `Busy` is what keeps turns from
//! overlapping.

use crate::audio::SharedRecordingBuffer;
use crate::input::InputEdge;

use super::dispatcher::{TurnDispatcher, TurnOutcome};
use super::state::{ControllerState, Transition, TurnId};

pub struct PushToTalkController {
    state: ControllerState,
    buffer: SharedRecordingBuffer,
    dispatcher: TurnDispatcher,
    pending: Option<TurnId>,
}

impl PushToTalkController {
    pub fn new(buffer: SharedRecordingBuffer, dispatcher: TurnDispatcher) -> Self {
        Self {
            state: ControllerState::Idle,
            buffer,
            dispatcher,
            pending: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Turn currently awaiting its outcome.
    pub fn pending(&self) -> Option<TurnId> {
        self.pending
    }

    /// Buffer shared with the capture stream.
    pub fn buffer(&self) -> &SharedRecordingBuffer {
        &self.buffer
    }

    /// Route an input edge to [`on_start`](Self::on_start) or
    /// [`on_stop`](Self::on_stop).
    pub fn handle_edge(&mut self, edge: InputEdge) -> Transition {
        match edge {
            InputEdge::Start => self.on_start(),
            InputEdge::Stop => self.on_stop(),
        }
    }

    pub fn on_start(&mut self) -> Transition {
        if self.state != ControllerState::Idle {
            log::debug!("controller: start ignored while {:?}", self.state);
            return Transition::Ignored;
        }
        self.buffer.arm();
        self.state = ControllerState::Recording;
        log::info!("controller: recording");
        Transition::Armed
    }

    pub fn on_stop(&mut self) -> Transition {
        if self.state != ControllerState::Recording {
            log::debug!("controller: stop ignored while {:?}", self.state);
            return Transition::Ignored;
        }

        match self.buffer.flush() {
            Ok(Some(artifact)) => {
                log::info!(
                    "controller: captured {:.2}s ({} bytes)",
                    artifact.duration().as_secs_f32(),
                    artifact.payload_bytes()
                );
                let id = self.dispatcher.submit(artifact);
                self.pending = Some(id);
                self.state = ControllerState::Busy;
                Transition::Dispatched(id)
            }
            Ok(None) => {
                log::info!("controller: nothing captured, discarding session");
                self.state = ControllerState::Idle;
                Transition::Discarded
            }
            Err(e) => {
                log::error!("controller: {e}");
                self.state = ControllerState::Idle;
                Transition::CaptureFailed(e.to_string())
            }
        }
    }

    /// Release the Busy gate when the pending turn's outcome arrives,
    /// whether it succeeded or failed.
    pub fn on_turn_complete(&mut self, outcome: &TurnOutcome) -> Transition {
        if self.state != ControllerState::Busy || self.pending != Some(outcome.id) {
            log::debug!(
                "controller: outcome for turn {} ignored while {:?}",
                outcome.id,
                self.state
            );
            return Transition::Ignored;
        }
        self.dispatcher.reap();
        self.pending = None;
        self.state = ControllerState::Idle;
        Transition::Released(outcome.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::agent::{Message, Pipeline, PipelineError};
    use crate::audio::{Artifact, AudioFrame, PcmFormat, RecordingBuffer};
    use crate::turn::dispatcher::{channel, ResultSink};

    struct Echo;

    impl Pipeline for Echo {
        fn run(&self, _: &Artifact) -> Result<Vec<Message>, PipelineError> {
            Ok(vec![Message::assistant("done")])
        }
    }

    fn setup(dir: &std::path::Path) -> (PushToTalkController, ResultSink) {
        let buffer = SharedRecordingBuffer::new(RecordingBuffer::new(
            PcmFormat::default(),
            dir.join("turn.wav"),
        ));
        let (dispatcher, sink) = channel(Arc::new(Echo), None);
        (PushToTalkController::new(buffer, dispatcher), sink)
    }

    fn speak(controller: &PushToTalkController) {
        controller
            .buffer()
            .offer(AudioFrame::new(vec![100; 320], PcmFormat::default()));
    }

    #[test]
    fn start_arms_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctl, _sink) = setup(dir.path());

        assert_eq!(ctl.on_start(), Transition::Armed);
        assert_eq!(ctl.state(), ControllerState::Recording);
        assert!(ctl.buffer().is_collecting());
    }

    #[test]
    fn stop_without_frames_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctl, mut sink) = setup(dir.path());

        ctl.on_start();
        assert_eq!(ctl.on_stop(), Transition::Discarded);
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(sink.try_receive().is_none());
    }

    #[test]
    fn stop_with_frames_dispatches_and_blocks_until_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctl, mut sink) = setup(dir.path());

        ctl.on_start();
        speak(&ctl);
        let Transition::Dispatched(id) = ctl.on_stop() else {
            panic!("expected dispatch");
        };
        assert_eq!(ctl.state(), ControllerState::Busy);
        assert_eq!(ctl.pending(), Some(id));

        for _ in 0..5 {
            assert_eq!(ctl.on_start(), Transition::Ignored);
        }
        assert_eq!(ctl.state(), ControllerState::Busy);

        let outcome = sink.blocking_recv().unwrap();
        assert_eq!(ctl.on_turn_complete(&outcome), Transition::Released(id));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(ctl.pending().is_none());
    }

    #[test]
    fn stop_while_idle_and_outcome_while_idle_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctl, mut sink) = setup(dir.path());

        assert_eq!(ctl.on_stop(), Transition::Ignored);

        ctl.on_start();
        speak(&ctl);
        ctl.on_stop();
        let outcome = sink.blocking_recv().unwrap();
        ctl.on_turn_complete(&outcome);

        // A duplicate delivery changes nothing.
        assert_eq!(ctl.on_turn_complete(&outcome), Transition::Ignored);
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[test]
    fn handle_edge_routes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctl, _sink) = setup(dir.path());

        assert_eq!(ctl.handle_edge(InputEdge::Start), Transition::Armed);
        assert_eq!(ctl.handle_edge(InputEdge::Start), Transition::Ignored);
        assert_eq!(ctl.handle_edge(InputEdge::Stop), Transition::Discarded);
    }

    #[test]
    fn capture_failure_returns_to_idle_and_next_session_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = SharedRecordingBuffer::new(RecordingBuffer::new(
            PcmFormat::default(),
            dir.path().join("missing").join("turn.wav"),
        ));
        let (dispatcher, _sink) = channel(Arc::new(Echo), None);
        let mut ctl = PushToTalkController::new(buffer, dispatcher);

        ctl.on_start();
        speak(&ctl);
        assert!(matches!(ctl.on_stop(), Transition::CaptureFailed(_)));
        assert_eq!(ctl.state(), ControllerState::Idle);

        ctl.on_start();
        assert_eq!(ctl.buffer().collected_samples(), 0);
    }
}
