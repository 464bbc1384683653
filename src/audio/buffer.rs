//! Push-to-talk recording buffer and the WAV artifact it produces.
//!
//! [`RecordingBuffer`] collects [`AudioFrame`]s only while armed.  On
//! [`flush`](RecordingBuffer::flush) the collected frames are written, in
//! arrival order, to a 16-bit PCM WAV file and an [`Artifact`] is returned.
//! A flush with no collected frames returns `None` and writes nothing.
//!
//! The capture callback never touches the buffer directly; it goes through
//! [`SharedRecordingBuffer::offer`], which uses `try_lock` so the audio
//! thread cannot block on the presentation thread.  Frames that arrive while
//! the lock is held elsewhere are dropped and counted.
//!
//! # Example
//!
//! ```rust
//! use ptt_agent::audio::{AudioFrame, PcmFormat, RecordingBuffer};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let format = PcmFormat::new(16_000, 1);
//! let mut buf = RecordingBuffer::new(format, dir.path().join("turn.wav"));
//!
//! buf.arm();
//! buf.feed(AudioFrame::new(vec![0; 1_600], format));
//! let artifact = buf.flush().unwrap().expect("one frame was collected");
//! assert_eq!(artifact.payload_bytes(), 3_200);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, SystemTime};

use thiserror::Error;

use super::frame::{AudioFrame, PcmFormat};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while turning a capture session into an artifact.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to write WAV artifact {path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("failed to finalize artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// A fully written, immutable WAV file produced by one capture session.
#[derive(Debug, Clone)]
pub struct Artifact {
    path: PathBuf,
    format: PcmFormat,
    sample_count: usize,
    created_at: SystemTime,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Interleaved samples in the payload (all channels).
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Size of the raw PCM payload in bytes (the `data` chunk).
    pub fn payload_bytes(&self) -> u64 {
        self.sample_count as u64 * PcmFormat::SAMPLE_WIDTH as u64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f32(self.format.duration_secs(self.sample_count))
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// Frames collected between one `arm` and the following `flush`.
#[derive(Debug)]
pub struct CaptureSession {
    started_at: SystemTime,
    format: PcmFormat,
    frames: Vec<AudioFrame>,
}

impl CaptureSession {
    fn new(format: PcmFormat) -> Self {
        Self {
            started_at: SystemTime::now(),
            format,
            frames: Vec::new(),
        }
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn sample_count(&self) -> usize {
        self.frames.iter().map(AudioFrame::len).sum()
    }

    /// Write all frames in arrival order to `path`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when the session is
    /// empty.  The file is written next to `path` and renamed into place once
    /// finalized, so a reader never observes a partial artifact.
    pub fn write_artifact(self, path: &Path) -> Result<Option<Artifact>, CaptureError> {
        if self.frames.is_empty() {
            return Ok(None);
        }

        let spec = hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: self.format.bits_per_sample(),
            sample_format: hound::SampleFormat::Int,
        };

        let partial = partial_path(path);
        let wav_err = |source| CaptureError::Wav {
            path: path.to_path_buf(),
            source,
        };

        let write = || -> Result<usize, CaptureError> {
            let mut writer = hound::WavWriter::create(&partial, spec).map_err(wav_err)?;
            let mut written = 0usize;
            for frame in &self.frames {
                for &sample in frame.samples() {
                    writer.write_sample(sample).map_err(wav_err)?;
                }
                written += frame.len();
            }
            writer.finalize().map_err(wav_err)?;
            Ok(written)
        };

        let sample_count = match write() {
            Ok(n) => n,
            Err(e) => {
                let _ = std::fs::remove_file(&partial);
                return Err(e);
            }
        };

        std::fs::rename(&partial, path).map_err(|source| CaptureError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(Artifact {
            path: path.to_path_buf(),
            format: self.format,
            sample_count,
            created_at: SystemTime::now(),
        }))
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// RecordingBuffer
// ---------------------------------------------------------------------------

/// Collects frames between `arm` and `flush`.
#[derive(Debug)]
pub struct RecordingBuffer {
    format: PcmFormat,
    artifact_path: PathBuf,
    session: Option<CaptureSession>,
    /// Frames refused because their format did not match the session.
    rejected: u64,
}

impl RecordingBuffer {
    pub fn new(format: PcmFormat, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            artifact_path: artifact_path.into(),
            session: None,
            rejected: 0,
        }
    }

    /// Discard any residual frames and start collecting a fresh session.
    pub fn arm(&mut self) {
        self.session = Some(CaptureSession::new(self.format));
    }

    /// Append `frame` if collecting; otherwise drop it.
    pub fn feed(&mut self, frame: AudioFrame) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if frame.format() != session.format {
            self.rejected += 1;
            return;
        }
        if !frame.is_empty() {
            session.frames.push(frame);
        }
    }

    /// Stop collecting and hand back the session without writing it.
    pub fn stop(&mut self) -> Option<CaptureSession> {
        self.session.take()
    }

    /// Stop collecting and write the artifact (see [`CaptureSession::write_artifact`]).
    pub fn flush(&mut self) -> Result<Option<Artifact>, CaptureError> {
        match self.stop() {
            Some(session) => session.write_artifact(&self.artifact_path),
            None => Ok(None),
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.session.is_some()
    }

    /// Interleaved samples collected so far in the current session.
    pub fn collected_samples(&self) -> usize {
        self.session
            .as_ref()
            .map(CaptureSession::sample_count)
            .unwrap_or(0)
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn rejected_frames(&self) -> u64 {
        self.rejected
    }
}

// ---------------------------------------------------------------------------
// SharedRecordingBuffer
// ---------------------------------------------------------------------------

/// Thread-safe handle shared between the capture callback and the controller.
///
/// Cheap to clone.  The audio side only ever calls [`offer`](Self::offer).
#[derive(Debug, Clone)]
pub struct SharedRecordingBuffer {
    inner: Arc<Mutex<RecordingBuffer>>,
    dropped: Arc<AtomicU64>,
}

impl SharedRecordingBuffer {
    pub fn new(buffer: RecordingBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Non-blocking handoff from the audio thread.
    ///
    /// If the buffer is locked by another thread the frame is dropped and the
    /// drop counter is incremented.
    pub fn offer(&self, frame: AudioFrame) {
        match self.inner.try_lock() {
            Ok(mut buf) => buf.feed(frame),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().feed(frame),
            Err(TryLockError::WouldBlock) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn arm(&self) {
        self.lock().arm();
    }

    /// Stop collecting and write the artifact.
    ///
    /// The session is detached under the lock; the file is written after the
    /// lock is released so the audio thread is never kept waiting on disk I/O.
    pub fn flush(&self) -> Result<Option<Artifact>, CaptureError> {
        let (session, path) = {
            let mut buf = self.lock();
            (buf.stop(), buf.artifact_path().to_path_buf())
        };
        match session {
            Some(session) => session.write_artifact(&path),
            None => Ok(None),
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.lock().is_collecting()
    }

    pub fn collected_samples(&self) -> usize {
        self.lock().collected_samples()
    }

    pub fn format(&self) -> PcmFormat {
        self.lock().format()
    }

    /// Frames dropped because the buffer was busy when they arrived.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, RecordingBuffer> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
