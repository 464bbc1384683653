//! Microphone stream via `cpal`.
//!
//! [`StreamSource`] wraps the cpal host/device/config selection.  Call
//! [`StreamSource::start`] (or the one-shot [`StreamSource::open`]) to begin
//! delivering [`AudioFrame`]s to a [`SharedRecordingBuffer`].  The returned
//! [`StreamHandle`] is a RAII guard: dropping it, or calling
//! [`StreamHandle::close`], stops the device stream.
//!
//! The stream runs continuously.  Whether frames are kept is decided by the
//! recording buffer, not by the stream.
//!
//! When the device supports the requested rate, channel count and sample
//! format, callback buffers are handed off unchanged (apart from the i16
//! conversion for `F32` capture).  Otherwise the device's default
//! configuration is used and every buffer is remixed and resampled to the
//! requested format first.  The resampler keeps its state between
//! callbacks, so a recording's length does not drift with the buffer size.
//!
//! After the device reports an error the callback stops handing frames to
//! the buffer, even if the backend keeps calling it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use thiserror::Error;

use crate::config::{AudioConfig, CaptureFormat};

use super::buffer::SharedRecordingBuffer;
use super::convert::{f32_to_i16, remix, StreamResampler};
use super::frame::{AudioFrame, PcmFormat};

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening or running an audio device stream.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("no output device found on the default audio host")]
    NoOutputDevice,

    #[error("failed to enumerate audio devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query supported stream configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported device sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to read audio file: {0}")]
    Decode(#[from] hound::Error),
}

// ---------------------------------------------------------------------------
// StreamParams
// ---------------------------------------------------------------------------

/// What the caller wants the frames to look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: CaptureFormat,
    /// Input device name; `None` selects the system default.
    pub device: Option<String>,
}

impl StreamParams {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            sample_format: config.sample_format,
            device: config.device.clone(),
        }
    }

    /// Format of the frames delivered to the recording buffer.
    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate, self.channels)
    }
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
pub struct StreamHandle {
    _stream: cpal::Stream,
    failed: Arc<AtomicBool>,
    converting: bool,
}

impl StreamHandle {
    /// `true` once the device reported a runtime error.  Delivery has
    /// stopped; the caller must reopen the stream to continue.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// `true` when device buffers are converted to the requested format.
    pub fn is_converting(&self) -> bool {
        self.converting
    }

    /// Stop delivery and release the device.
    pub fn close(self) {
        log::debug!("capture: stream closed");
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("failed", &self.has_failed())
            .field("converting", &self.converting)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// StreamSource
// ---------------------------------------------------------------------------

/// Input device plus the stream configuration chosen for it.
pub struct StreamSource {
    device: cpal::Device,
    config: cpal::StreamConfig,
    device_format: cpal::SampleFormat,
    target: PcmFormat,
    /// Device config differs from `target`; buffers must be converted.
    converting: bool,
}

impl StreamSource {
    /// Select the input device and a stream configuration for `params`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NoDevice`] / [`DeviceError::DeviceNotFound`]
    /// when no matching input device exists, or a config error when the
    /// device cannot describe its capabilities.
    pub fn new(params: &StreamParams) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = match &params.device {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::DeviceNotFound(name.clone()))?,
            None => host.default_input_device().ok_or(DeviceError::NoDevice)?,
        };

        let wanted = match params.sample_format {
            CaptureFormat::I16 => cpal::SampleFormat::I16,
            CaptureFormat::F32 => cpal::SampleFormat::F32,
        };
        let rate = cpal::SampleRate(params.sample_rate);

        let exact = device.supported_input_configs()?.find(|c| {
            c.channels() == params.channels
                && c.sample_format() == wanted
                && c.min_sample_rate() <= rate
                && c.max_sample_rate() >= rate
        });

        let (config, device_format, converting) = match exact {
            Some(range) => (range.with_sample_rate(rate).config(), wanted, false),
            None => {
                let fallback = device.default_input_config()?;
                log::warn!(
                    "capture: device does not support {} Hz / {} ch / {:?}; converting from {} Hz / {} ch / {:?}",
                    params.sample_rate,
                    params.channels,
                    wanted,
                    fallback.sample_rate().0,
                    fallback.channels(),
                    fallback.sample_format(),
                );
                let format = fallback.sample_format();
                (fallback.into(), format, true)
            }
        };

        Ok(Self {
            device,
            config,
            device_format,
            target: params.pcm_format(),
            converting,
        })
    }

    /// Select a device and start delivering frames to `sink` in one step.
    pub fn open(
        params: &StreamParams,
        sink: SharedRecordingBuffer,
    ) -> Result<StreamHandle, DeviceError> {
        Self::new(params)?.start(sink)
    }

    /// Start the stream.  Each device buffer becomes one [`AudioFrame`]
    /// offered to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BuildStream`] or [`DeviceError::PlayStream`] if
    /// the platform rejects the configuration.
    pub fn start(&self, sink: SharedRecordingBuffer) -> Result<StreamHandle, DeviceError> {
        let failed = Arc::new(AtomicBool::new(false));

        let stream = match self.device_format {
            cpal::SampleFormat::I16 => self.build::<i16>(sink, Arc::clone(&failed))?,
            cpal::SampleFormat::F32 => self.build::<f32>(sink, Arc::clone(&failed))?,
            cpal::SampleFormat::U16 => self.build::<u16>(sink, Arc::clone(&failed))?,
            cpal::SampleFormat::I32 => self.build::<i32>(sink, Arc::clone(&failed))?,
            other => return Err(DeviceError::UnsupportedFormat(other)),
        };

        stream.play()?;
        log::info!(
            "capture: stream started ({} Hz, {} ch, {:?}{})",
            self.config.sample_rate.0,
            self.config.channels,
            self.device_format,
            if self.converting { ", converting" } else { "" }
        );

        Ok(StreamHandle {
            _stream: stream,
            failed,
            converting: self.converting,
        })
    }

    fn build<T>(
        &self,
        sink: SharedRecordingBuffer,
        failed: Arc<AtomicBool>,
    ) -> Result<cpal::Stream, DeviceError>
    where
        T: SizedSample,
        i16: FromSample<T>,
        f32: FromSample<T>,
    {
        let mut handoff = FrameHandoff::new(
            sink,
            Arc::clone(&failed),
            self.target,
            self.config.channels,
            self.config.sample_rate.0,
            self.converting,
        );

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[T], _: &cpal::InputCallbackInfo| handoff.push(data),
            move |err: cpal::StreamError| {
                failed.store(true, Ordering::Relaxed);
                log::error!("capture: stream error: {err}");
            },
            None,
        )?;

        Ok(stream)
    }

    /// Format of the frames this source delivers.
    pub fn target_format(&self) -> PcmFormat {
        self.target
    }

    /// `true` when device buffers are converted before handoff.
    pub fn is_converting(&self) -> bool {
        self.converting
    }
}

// ---------------------------------------------------------------------------
// FrameHandoff
// ---------------------------------------------------------------------------

/// Per-stream state owned by the data callback: converts each device buffer
/// to the target format and offers it to the recording buffer.
struct FrameHandoff {
    sink: SharedRecordingBuffer,
    /// Set by the error callback; no frame is offered afterwards.
    failed: Arc<AtomicBool>,
    target: PcmFormat,
    source_channels: u16,
    /// `None` when device buffers already match `target`.
    resampler: Option<StreamResampler>,
}

impl FrameHandoff {
    fn new(
        sink: SharedRecordingBuffer,
        failed: Arc<AtomicBool>,
        target: PcmFormat,
        source_channels: u16,
        source_rate: u32,
        converting: bool,
    ) -> Self {
        let resampler = converting
            .then(|| StreamResampler::new(target.channels, source_rate, target.sample_rate));
        Self {
            sink,
            failed,
            target,
            source_channels,
            resampler,
        }
    }

    fn push<T>(&mut self, data: &[T])
    where
        T: SizedSample,
        i16: FromSample<T>,
        f32: FromSample<T>,
    {
        if self.failed.load(Ordering::Relaxed) {
            return;
        }
        let samples: Vec<i16> = match &mut self.resampler {
            Some(resampler) => {
                let as_f32: Vec<f32> = data.iter().map(|&s| f32::from_sample(s)).collect();
                let remixed = remix(&as_f32, self.source_channels, self.target.channels);
                resampler
                    .process(&remixed)
                    .into_iter()
                    .map(f32_to_i16)
                    .collect()
            }
            None => data.iter().map(|&s| i16::from_sample(s)).collect(),
        };
        self.sink.offer(AudioFrame::new(samples, self.target));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RecordingBuffer;

    fn armed_buffer(dir: &std::path::Path) -> SharedRecordingBuffer {
        let buffer = SharedRecordingBuffer::new(RecordingBuffer::new(
            PcmFormat::default(),
            dir.join("capture.wav"),
        ));
        buffer.arm();
        buffer
    }

    #[test]
    fn params_from_default_config() {
        let params = StreamParams::from_config(&AudioConfig::default());
        assert_eq!(params.sample_rate, 16_000);
        assert_eq!(params.channels, 1);
        assert_eq!(params.sample_format, CaptureFormat::I16);
        assert!(params.device.is_none());
        assert_eq!(params.pcm_format(), PcmFormat::new(16_000, 1));
    }

    #[test]
    fn device_error_messages_are_descriptive() {
        assert_eq!(
            DeviceError::NoDevice.to_string(),
            "no input device found on the default audio host"
        );
        assert!(DeviceError::DeviceNotFound("USB Mic".into())
            .to_string()
            .contains("USB Mic"));
    }

    #[test]
    fn matching_i16_buffers_are_offered_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = armed_buffer(dir.path());
        let mut handoff = FrameHandoff::new(
            buffer.clone(),
            Arc::new(AtomicBool::new(false)),
            PcmFormat::default(),
            1,
            16_000,
            false,
        );

        handoff.push(&[1_i16, -2, 3]);
        assert_eq!(buffer.collected_samples(), 3);
    }

    #[test]
    fn f32_device_at_44100_stereo_yields_one_second_at_16k() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = armed_buffer(dir.path());
        let mut handoff = FrameHandoff::new(
            buffer.clone(),
            Arc::new(AtomicBool::new(false)),
            PcmFormat::default(),
            2,
            44_100,
            true,
        );

        let second = vec![0.25_f32; 44_100 * 2];
        for chunk in second.chunks(512 * 2) {
            handoff.push(chunk);
        }

        let collected = buffer.collected_samples();
        assert!((15_999..=16_001).contains(&collected), "got {collected}");
        let artifact = buffer.flush().unwrap().unwrap();
        assert_eq!(artifact.format(), PcmFormat::new(16_000, 1));
    }

    #[test]
    fn nothing_is_offered_after_a_stream_error() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = armed_buffer(dir.path());
        let failed = Arc::new(AtomicBool::new(false));
        let mut handoff = FrameHandoff::new(
            buffer.clone(),
            Arc::clone(&failed),
            PcmFormat::default(),
            1,
            16_000,
            false,
        );

        handoff.push(&[5_i16; 160]);
        failed.store(true, Ordering::Relaxed);
        handoff.push(&[6_i16; 160]);
        handoff.push(&[7_i16; 160]);

        assert_eq!(buffer.collected_samples(), 160);
    }
}
