//! End-to-end push-to-talk turns without a microphone: frames are offered to
//! the shared buffer exactly as the capture callback would.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ptt_agent::agent::{Message, Pipeline, PipelineError};
use ptt_agent::audio::{Artifact, AudioFrame, PcmFormat, RecordingBuffer, SharedRecordingBuffer};
use ptt_agent::input::InputEdge;
use ptt_agent::turn::{
    channel, ControllerState, PushToTalkController, ResultSink, Transition,
};

fn controller(dir: &Path, pipeline: Arc<dyn Pipeline>) -> (PushToTalkController, ResultSink) {
    let buffer = SharedRecordingBuffer::new(RecordingBuffer::new(
        PcmFormat::default(),
        dir.join("turn.wav"),
    ));
    let (dispatcher, sink) = channel(pipeline, None);
    (PushToTalkController::new(buffer, dispatcher), sink)
}

fn offer(ctl: &PushToTalkController, samples: Vec<i16>) {
    ctl.buffer()
        .offer(AudioFrame::new(samples, PcmFormat::default()));
}

fn read_samples(path: &Path) -> Vec<i16> {
    hound::WavReader::open(path)
        .unwrap()
        .into_samples::<i16>()
        .map(Result::unwrap)
        .collect()
}

/// Reports the transcript as the number of samples it read.
struct CountSamples;

impl Pipeline for CountSamples {
    fn run(&self, artifact: &Artifact) -> Result<Vec<Message>, PipelineError> {
        let n = read_samples(artifact.path()).len();
        Ok(vec![Message::user(format!("{n} samples"))])
    }
}

#[test]
fn one_second_of_speech_becomes_a_16k_mono_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctl, mut sink) = controller(dir.path(), Arc::new(CountSamples));

    assert_eq!(ctl.handle_edge(InputEdge::Start), Transition::Armed);

    // 1 s of a 440 Hz tone in 100 callback-sized frames.
    let tone: Vec<i16> = (0..16_000)
        .map(|i| {
            let t = i as f32 / 16_000.0;
            ((t * 440.0 * std::f32::consts::TAU).sin() * 8_000.0) as i16
        })
        .collect();
    for chunk in tone.chunks(160) {
        offer(&ctl, chunk.to_vec());
    }

    assert!(matches!(
        ctl.handle_edge(InputEdge::Stop),
        Transition::Dispatched(_)
    ));

    let outcome = sink.blocking_recv().unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.artifact.payload_bytes(), 32_000);
    assert_eq!(outcome.artifact.duration(), Duration::from_secs(1));
    assert_eq!(outcome.messages()[0].content, "16000 samples");

    let reader = hound::WavReader::open(outcome.artifact.path()).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 16_000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(read_samples(outcome.artifact.path()), tone);

    assert!(matches!(
        ctl.on_turn_complete(&outcome),
        Transition::Released(_)
    ));
    assert_eq!(ctl.state(), ControllerState::Idle);
}

#[test]
fn release_before_any_frame_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctl, mut sink) = controller(dir.path(), Arc::new(CountSamples));

    ctl.handle_edge(InputEdge::Start);
    assert_eq!(ctl.handle_edge(InputEdge::Stop), Transition::Discarded);
    assert_eq!(ctl.state(), ControllerState::Idle);
    assert!(!dir.path().join("turn.wav").exists());

    std::thread::sleep(Duration::from_millis(20));
    assert!(sink.try_receive().is_none());
}

#[test]
fn frames_outside_a_session_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctl, mut sink) = controller(dir.path(), Arc::new(CountSamples));

    offer(&ctl, vec![1; 500]);
    ctl.handle_edge(InputEdge::Start);
    offer(&ctl, vec![2; 320]);
    ctl.handle_edge(InputEdge::Stop);

    // While Busy the stream keeps running; nothing of it lands in the turn.
    offer(&ctl, vec![3; 500]);

    let outcome = sink.blocking_recv().unwrap();
    assert_eq!(read_samples(outcome.artifact.path()), vec![2; 320]);
}

/// Blocks until released by the test, tracking overlap.
struct Gated {
    running: AtomicUsize,
    max_running: AtomicUsize,
    delay: Duration,
}

impl Gated {
    fn new(delay: Duration) -> Self {
        Self {
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            delay,
        }
    }
}

impl Pipeline for Gated {
    fn run(&self, _: &Artifact) -> Result<Vec<Message>, PipelineError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![Message::assistant("ok")])
    }
}

#[test]
fn busy_ignores_new_presses_and_turns_never_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(Gated::new(Duration::from_millis(30)));
    let (mut ctl, mut sink) = controller(dir.path(), pipeline.clone());

    for _ in 0..4 {
        ctl.handle_edge(InputEdge::Start);
        offer(&ctl, vec![7; 160]);
        assert!(matches!(
            ctl.handle_edge(InputEdge::Stop),
            Transition::Dispatched(_)
        ));

        // Hammer the controller while the turn is running.
        for _ in 0..10 {
            assert_eq!(ctl.handle_edge(InputEdge::Start), Transition::Ignored);
            assert_eq!(ctl.handle_edge(InputEdge::Stop), Transition::Ignored);
        }
        assert_eq!(ctl.state(), ControllerState::Busy);

        let outcome = sink.blocking_recv().unwrap();
        ctl.on_turn_complete(&outcome);
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    assert_eq!(pipeline.max_running.load(Ordering::SeqCst), 1);
}

struct Explodes;

impl Pipeline for Explodes {
    fn run(&self, _: &Artifact) -> Result<Vec<Message>, PipelineError> {
        panic!("speech service returned garbage");
    }
}

#[test]
fn panicking_pipeline_still_releases_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let (mut ctl, mut sink) = controller(dir.path(), Arc::new(Explodes));

    ctl.handle_edge(InputEdge::Start);
    offer(&ctl, vec![1; 160]);
    ctl.handle_edge(InputEdge::Stop);

    let outcome = sink.blocking_recv().unwrap();
    let reason = outcome.error().unwrap();
    assert!(reason.contains("speech service returned garbage"), "{reason}");

    assert!(matches!(
        ctl.on_turn_complete(&outcome),
        Transition::Released(_)
    ));
    assert_eq!(ctl.handle_edge(InputEdge::Start), Transition::Armed);
}

/// Records the distinct sample values in each artifact it sees.
#[derive(Default)]
struct Distinct {
    seen: Mutex<Vec<BTreeSet<i16>>>,
}

impl Pipeline for Distinct {
    fn run(&self, artifact: &Artifact) -> Result<Vec<Message>, PipelineError> {
        let values: BTreeSet<i16> = read_samples(artifact.path()).into_iter().collect();
        self.seen.lock().unwrap().push(values);
        Ok(Vec::new())
    }
}

#[test]
fn arbitrary_edge_sequences_never_mix_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(Distinct::default());
    let (mut ctl, mut sink) = controller(dir.path(), pipeline.clone());

    // Small LCG so the sequence is reproducible.
    let mut seed: u32 = 0x2545_f491;
    let mut next = move || {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (seed >> 16) % 4
    };

    let mut session_tag: i16 = 0;
    let mut dispatched = 0;
    for _ in 0..300 {
        match next() {
            0 => {
                if ctl.handle_edge(InputEdge::Start) == Transition::Armed {
                    session_tag += 1;
                }
            }
            1 => {
                if let Transition::Dispatched(_) = ctl.handle_edge(InputEdge::Stop) {
                    dispatched += 1;
                }
            }
            2 => offer(&ctl, vec![session_tag; 80]),
            _ => {
                if let Some(outcome) = sink.try_receive() {
                    ctl.on_turn_complete(&outcome);
                }
            }
        }
    }

    if ctl.state() == ControllerState::Recording {
        if let Transition::Dispatched(_) = ctl.handle_edge(InputEdge::Stop) {
            dispatched += 1;
        }
    }
    while ctl.state() == ControllerState::Busy {
        let outcome = sink.blocking_recv().unwrap();
        ctl.on_turn_complete(&outcome);
    }

    let seen = pipeline.seen.lock().unwrap();
    assert_eq!(seen.len(), dispatched);
    assert!(dispatched > 0);
    for values in seen.iter() {
        assert_eq!(values.len(), 1, "artifact mixed sessions: {values:?}");
    }
}
