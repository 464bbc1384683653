//! PCM frame types shared by the capture stream and the recording buffer.

// ---------------------------------------------------------------------------
// PcmFormat
// ---------------------------------------------------------------------------

/// Layout of 16-bit interleaved PCM audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl PcmFormat {
    /// Width of one sample in bytes.  Artifacts are always 16-bit.
    pub const SAMPLE_WIDTH: u16 = 2;

    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Bits per sample as written into the WAV header.
    pub fn bits_per_sample(&self) -> u16 {
        Self::SAMPLE_WIDTH * 8
    }

    /// Payload bytes per second of audio.
    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * Self::SAMPLE_WIDTH as u64
    }

    /// Duration in seconds of `samples` interleaved samples.
    pub fn duration_secs(&self, samples: usize) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        samples as f32 / (self.sample_rate as f32 * self.channels as f32)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::new(16_000, 1)
    }
}

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One device buffer of interleaved 16-bit samples.
///
/// Not `Clone`.  A frame is created by the capture callback and moved into
/// the recording buffer exactly once.
#[derive(Debug)]
pub struct AudioFrame {
    samples: Vec<i16>,
    format: PcmFormat,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, format: PcmFormat) -> Self {
        Self { samples, format }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Number of interleaved samples (all channels).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
