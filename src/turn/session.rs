//! [`VoiceSession`]: the context object a front-end owns.
//!
//! Bundles the controller, the capture stream and the stream parameters so
//! front-ends hold one value instead of process-wide state.  Both the
//! windowed app and the headless loop drive it from a single thread.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::agent::Pipeline;
use crate::audio::{
    DeviceError, RecordingBuffer, SharedRecordingBuffer, StreamHandle, StreamParams, StreamSource,
};
use crate::config::{AppConfig, AppPaths};
use crate::input::InputEdge;
use crate::Waker;

use super::controller::PushToTalkController;
use super::dispatcher::{self, ResultSink, TurnOutcome};
use super::state::{ControllerState, Transition};

pub struct VoiceSession {
    controller: PushToTalkController,
    params: StreamParams,
    stream: Option<StreamHandle>,
}

impl VoiceSession {
    /// Build a session from configuration.  The capture stream is not opened
    /// yet; call [`open_stream`](Self::open_stream).
    pub fn new(
        config: &AppConfig,
        paths: &AppPaths,
        pipeline: Arc<dyn Pipeline>,
        waker: Option<Waker>,
    ) -> Result<(Self, ResultSink)> {
        paths
            .ensure_data_dir()
            .with_context(|| format!("creating {}", paths.data_dir.display()))?;

        let params = StreamParams::from_config(&config.audio);
        let buffer = SharedRecordingBuffer::new(RecordingBuffer::new(
            params.pcm_format(),
            config.artifact_path(paths),
        ));
        Ok(Self::with_buffer(params, buffer, pipeline, waker))
    }

    /// Build a session around an existing buffer.
    pub fn with_buffer(
        params: StreamParams,
        buffer: SharedRecordingBuffer,
        pipeline: Arc<dyn Pipeline>,
        waker: Option<Waker>,
    ) -> (Self, ResultSink) {
        let (dispatcher, sink) = dispatcher::channel(pipeline, waker);
        let session = Self {
            controller: PushToTalkController::new(buffer, dispatcher),
            params,
            stream: None,
        };
        (session, sink)
    }

    /// Open the input device and start feeding the recording buffer.
    pub fn open_stream(&mut self) -> Result<(), DeviceError> {
        let handle = StreamSource::open(&self.params, self.controller.buffer().clone())?;
        self.stream = Some(handle);
        Ok(())
    }

    /// Close the current stream (if any) and open a new one.
    pub fn reopen(&mut self) -> Result<(), DeviceError> {
        if let Some(old) = self.stream.take() {
            old.close();
        }
        log::info!("session: reopening capture stream");
        self.open_stream()
    }

    /// `true` when no stream is open or the open stream reported an error.
    pub fn stream_failed(&self) -> bool {
        self.stream.as_ref().map_or(true, StreamHandle::has_failed)
    }

    pub fn handle_edge(&mut self, edge: InputEdge) -> Transition {
        self.controller.handle_edge(edge)
    }

    pub fn complete_turn(&mut self, outcome: &TurnOutcome) -> Transition {
        self.controller.on_turn_complete(outcome)
    }

    pub fn state(&self) -> ControllerState {
        self.controller.state()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.controller.buffer().dropped_frames()
    }

    pub fn buffer(&self) -> &SharedRecordingBuffer {
        self.controller.buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Message, PipelineError};
    use crate::audio::{Artifact, AudioFrame, PcmFormat};
    use crate::config::AudioConfig;

    struct Silent;

    impl Pipeline for Silent {
        fn run(&self, _: &Artifact) -> Result<Vec<Message>, PipelineError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn session_without_stream_reports_failed_stream() {
        let dir = tempfile::tempdir().unwrap();
        let params = StreamParams::from_config(&AudioConfig::default());
        let buffer = SharedRecordingBuffer::new(RecordingBuffer::new(
            params.pcm_format(),
            dir.path().join("t.wav"),
        ));
        let (session, _sink) = VoiceSession::with_buffer(params, buffer, Arc::new(Silent), None);
        assert!(session.stream_failed());
        assert_eq!(session.state(), ControllerState::Idle);
        assert_eq!(session.dropped_frames(), 0);
    }

    #[test]
    fn full_turn_through_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let params = StreamParams::from_config(&AudioConfig::default());
        let buffer = SharedRecordingBuffer::new(RecordingBuffer::new(
            params.pcm_format(),
            dir.path().join("t.wav"),
        ));
        let (mut session, mut sink) =
            VoiceSession::with_buffer(params, buffer, Arc::new(Silent), None);

        assert_eq!(session.handle_edge(InputEdge::Start), Transition::Armed);
        session
            .buffer()
            .offer(AudioFrame::new(vec![0; 160], PcmFormat::default()));
        assert!(matches!(
            session.handle_edge(InputEdge::Stop),
            Transition::Dispatched(_)
        ));

        let outcome = sink.blocking_recv().unwrap();
        assert!(matches!(
            session.complete_turn(&outcome),
            Transition::Released(_)
        ));
        assert_eq!(session.state(), ControllerState::Idle);
    }
}
