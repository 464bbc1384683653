//! Channel remixing and sample-rate conversion for device buffers.
//!
//! Used when the input device cannot run at the requested artifact format,
//! and when playing a reply on an output device with a different layout.
//!
//! 1. [`remix`]: change the interleaved channel count.
//! 2. [`resample`]: linear interpolation over one complete signal.
//! 3. [`StreamResampler`]: the same interpolation over a stream that arrives
//!    in arbitrary buffers.  Position and the previous buffer's last frame
//!    carry over, so the output does not depend on how the input was split.

// ---------------------------------------------------------------------------
// remix
// ---------------------------------------------------------------------------

/// Convert interleaved audio from `from` channels to `to` channels.
///
/// * Same count: returned unchanged.
/// * Down to mono: each frame is averaged.
/// * Any other change: frames are averaged to mono and the mono value is
///   copied into every output channel.
///
/// ```rust
/// use ptt_agent::audio::remix;
///
/// let stereo = vec![0.5_f32, -0.5, 0.25, 0.75];
/// assert_eq!(remix(&stereo, 2, 1), vec![0.0, 0.5]);
/// assert_eq!(remix(&[0.25_f32], 1, 2), vec![0.25, 0.25]);
/// ```
pub fn remix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }
    if from == 0 || to == 0 {
        return Vec::new();
    }

    let from = from as usize;
    let to = to as usize;
    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        let mono = frame.iter().sum::<f32>() / from as f32;
        out.extend(std::iter::repeat(mono).take(to));
    }
    out
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample interleaved audio from `source_rate` to `target_rate` Hz using
/// linear interpolation on each channel.
///
/// The output holds `ceil(frames * target_rate / source_rate)` frames.
///
/// ```rust
/// use ptt_agent::audio::resample;
///
/// // 48 kHz → 16 kHz mono (ratio = 1/3)
/// let hi = vec![0.5_f32; 480];
/// assert_eq!(resample(&hi, 1, 48_000, 16_000).len(), 160);
///
/// // Stereo frames stay interleaved.
/// let st = vec![0.1_f32, 0.9, 0.1, 0.9];
/// assert_eq!(resample(&st, 2, 8_000, 16_000).len(), 8);
/// ```
pub fn resample(samples: &[f32], channels: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return samples.to_vec();
    }
    let channels = channels.max(1) as usize;
    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let out_frames = ((frames as u64 * target_rate as u64).div_ceil(source_rate as u64)) as usize;
    let mut out = Vec::with_capacity(out_frames * channels);

    for i in 0..out_frames {
        let src_pos = i as f64 / ratio;
        let idx = (src_pos as usize).min(frames - 1);
        let next = (idx + 1).min(frames - 1);
        let frac = (src_pos - idx as f64).clamp(0.0, 1.0) as f32;

        for ch in 0..channels {
            let a = samples[idx * channels + ch];
            let b = samples[next * channels + ch];
            out.push(a * (1.0 - frac) + b * frac);
        }
    }

    out
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Linear resampler for one continuous interleaved stream.
///
/// ```rust
/// use ptt_agent::audio::StreamResampler;
///
/// let mut rs = StreamResampler::new(1, 48_000, 16_000);
/// let total: usize = (0..100).map(|_| rs.process(&[0.0_f32; 480]).len()).sum();
/// assert_eq!(total, 16_000);
/// ```
#[derive(Debug, Clone)]
pub struct StreamResampler {
    channels: usize,
    /// Source frames advanced per output frame.
    step: f64,
    /// Source position of the next output frame, relative to the first frame
    /// of the next buffer.  Never below `-1.0`.
    pos: f64,
    /// Last frame of the previous buffer; empty before the first one.
    last: Vec<f32>,
    passthrough: bool,
}

impl StreamResampler {
    pub fn new(channels: u16, source_rate: u32, target_rate: u32) -> Self {
        let passthrough = source_rate == target_rate || source_rate == 0 || target_rate == 0;
        Self {
            channels: channels.max(1) as usize,
            step: if passthrough {
                1.0
            } else {
                source_rate as f64 / target_rate as f64
            },
            pos: 0.0,
            last: Vec::new(),
            passthrough,
        }
    }

    /// Convert the next buffer of the stream.  A trailing partial frame is
    /// ignored.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        if self.passthrough {
            return samples.to_vec();
        }
        let ch = self.channels;
        let frames = samples.len() / ch;
        if frames == 0 {
            return Vec::new();
        }

        let last_index = (frames - 1) as f64;
        let mut out = Vec::with_capacity(((frames as f64 / self.step) as usize + 1) * ch);
        let mut pos = self.pos;

        while pos <= last_index {
            let base = pos.floor();
            let frac = (pos - base) as f32;
            let idx = base as isize;
            let next = ((idx + 1).max(0) as usize).min(frames - 1);

            for c in 0..ch {
                let a = if idx < 0 {
                    self.last.get(c).copied().unwrap_or(samples[c])
                } else {
                    samples[idx as usize * ch + c]
                };
                let b = samples[next * ch + c];
                out.push(a + (b - a) * frac);
            }
            pos += self.step;
        }

        self.pos = pos - frames as f64;
        self.last.clear();
        self.last
            .extend_from_slice(&samples[(frames - 1) * ch..frames * ch]);
        out
    }
}

/// Convert an `f32` sample in `[-1.0, 1.0]` to 16-bit PCM, clamping.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Convert a 16-bit PCM sample to `f32` in `[-1.0, 1.0)`.
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- remix ----------------------------------------------------------------

    #[test]
    fn remix_same_count_is_identity() {
        let input = vec![0.1_f32, 0.2, 0.3, 0.4];
        assert_eq!(remix(&input, 2, 2), input);
    }

    #[test]
    fn remix_four_channels_to_mono() {
        let input = vec![1.0_f32, 0.0, 1.0, 0.0];
        let out = remix(&input, 4, 1);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn remix_mono_to_stereo_duplicates() {
        let out = remix(&[0.1_f32, -0.2], 1, 2);
        assert_eq!(out, vec![0.1, 0.1, -0.2, -0.2]);
    }

    #[test]
    fn remix_ignores_trailing_partial_frame() {
        let out = remix(&[0.2_f32, 0.4, 0.6], 2, 1);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn remix_zero_channels_returns_empty() {
        assert!(remix(&[0.1_f32], 0, 1).is_empty());
    }

    // ---- resample -------------------------------------------------------------

    #[test]
    fn resample_same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 * 0.001).collect();
        assert_eq!(resample(&input, 1, 16_000, 16_000), input);
    }

    #[test]
    fn resample_empty_returns_empty() {
        assert!(resample(&[], 1, 48_000, 16_000).is_empty());
    }

    #[test]
    fn resample_44100_length() {
        let input = vec![0.0_f32; 44_100];
        let out = resample(&input, 1, 44_100, 16_000);
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn resample_constant_signal_stays_constant() {
        let input = vec![0.5_f32; 960];
        for s in resample(&input, 1, 48_000, 16_000) {
            assert!((s - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn resample_keeps_channels_separate() {
        let input: Vec<f32> = std::iter::repeat([0.25_f32, -0.75])
            .take(300)
            .flatten()
            .collect();
        let out = resample(&input, 2, 48_000, 16_000);
        assert_eq!(out.len(), 200);
        for pair in out.chunks_exact(2) {
            assert!((pair[0] - 0.25).abs() < 1e-6);
            assert!((pair[1] + 0.75).abs() < 1e-6);
        }
    }

    // ---- StreamResampler ------------------------------------------------------

    fn process_in_chunks(rs: &mut StreamResampler, input: &[f32], chunk: usize) -> Vec<f32> {
        input.chunks(chunk).flat_map(|c| rs.process(c)).collect()
    }

    #[test]
    fn chunked_44100_second_is_16000_frames() {
        let input: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.01).sin()).collect();
        let mut rs = StreamResampler::new(1, 44_100, 16_000);
        let out = process_in_chunks(&mut rs, &input, 512);
        assert!(
            (15_999..=16_001).contains(&out.len()),
            "got {} frames",
            out.len()
        );
    }

    #[test]
    fn chunked_48000_stereo_second_is_16000_frames() {
        let input = vec![0.1_f32; 48_000 * 2];
        let mut rs = StreamResampler::new(2, 48_000, 16_000);
        let out = process_in_chunks(&mut rs, &input, 441 * 2);
        let frames = out.len() / 2;
        assert!((15_999..=16_001).contains(&frames), "got {frames} frames");
    }

    #[test]
    fn output_does_not_depend_on_buffer_boundaries() {
        let input: Vec<f32> = (0..4_410).map(|i| i as f32 / 4_410.0).collect();

        let whole = StreamResampler::new(1, 44_100, 16_000).process(&input);
        for chunk in [1, 7, 256, 1_000] {
            let mut rs = StreamResampler::new(1, 44_100, 16_000);
            let split = process_in_chunks(&mut rs, &input, chunk);
            assert_eq!(split.len(), whole.len(), "chunk {chunk}");
            for (a, b) in split.iter().zip(&whole) {
                assert!((a - b).abs() < 1e-4, "chunk {chunk}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn upsampling_across_boundaries_interpolates_from_previous_buffer() {
        let mut rs = StreamResampler::new(1, 8_000, 16_000);
        assert_eq!(rs.process(&[0.0, 1.0]), vec![0.0, 0.5, 1.0]);
        // Next output sits halfway between the previous buffer's last frame
        // and this buffer's first.
        assert_eq!(rs.process(&[0.0]), vec![0.5, 0.0]);
    }

    #[test]
    fn stream_resampler_same_rate_passes_through() {
        let mut rs = StreamResampler::new(1, 16_000, 16_000);
        assert_eq!(rs.process(&[0.1, 0.2]), vec![0.1, 0.2]);
    }

    // ---- sample conversion ----------------------------------------------------

    #[test]
    fn f32_to_i16_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[test]
    fn i16_round_trip_is_close() {
        for v in [-32_000_i16, -1, 0, 1, 12_345] {
            let back = f32_to_i16(i16_to_f32(v));
            assert!((back as i32 - v as i32).abs() <= 1);
        }
    }
}
