//! Audio side of a push-to-talk turn: microphone stream → recording buffer → WAV artifact.
//!
//! # Flow
//!
//! ```text
//! Microphone → cpal callback → AudioFrame → SharedRecordingBuffer::offer (try_lock)
//!           → RecordingBuffer (armed only while Recording) → flush → Artifact (WAV)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ptt_agent::audio::{PcmFormat, RecordingBuffer, SharedRecordingBuffer, StreamParams, StreamSource};
//! use ptt_agent::config::AudioConfig;
//!
//! let params = StreamParams::from_config(&AudioConfig::default());
//! let buffer = SharedRecordingBuffer::new(RecordingBuffer::new(params.pcm_format(), "turn.wav"));
//! let _handle = StreamSource::open(&params, buffer.clone()).unwrap(); // drop → stops stream
//!
//! buffer.arm();
//! // ... speak ...
//! if let Some(artifact) = buffer.flush().unwrap() {
//!     println!("wrote {} bytes to {}", artifact.payload_bytes(), artifact.path().display());
//! }
//! ```

pub mod buffer;
pub mod capture;
pub mod convert;
pub mod frame;
pub mod playback;

pub use buffer::{Artifact, CaptureError, CaptureSession, RecordingBuffer, SharedRecordingBuffer};
pub use capture::{DeviceError, StreamHandle, StreamParams, StreamSource};
pub use convert::{f32_to_i16, i16_to_f32, remix, resample, StreamResampler};
pub use frame::{AudioFrame, PcmFormat};
pub use playback::{play_wav, read_wav, DecodedWav};
