//! Blocking WAV playback on the default output device.
//!
//! Used by the speech stage to play the synthesized reply.  The file is
//! decoded with `hound`, converted to the output device's default layout and
//! played to completion before [`play_wav`] returns.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};

use super::capture::DeviceError;
use super::convert::{i16_to_f32, remix, resample};

/// Extra time allowed after the expected duration before giving up.
const DRAIN_GRACE: Duration = Duration::from_millis(750);

/// Decoded WAV contents as interleaved `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedWav {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedWav {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }
}

/// Read a PCM or float WAV file into interleaved `f32` samples.
pub fn read_wav(path: &Path) -> Result<DecodedWav, DeviceError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, _) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(i16_to_f32))
            .collect::<Result<Vec<_>, _>>()?,
        (hound::SampleFormat::Int, bits) => {
            let scale = (1_i64 << (bits.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(DecodedWav {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Play `path` on the default output device and block until it has finished.
///
/// # Errors
///
/// Returns [`DeviceError`] when the file cannot be decoded or no output
/// device can be opened.
pub fn play_wav(path: &Path) -> Result<(), DeviceError> {
    let wav = read_wav(path)?;
    if wav.samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(DeviceError::NoOutputDevice)?;
    let supported = device.default_output_config()?;
    let config: cpal::StreamConfig = supported.config();

    let remixed = remix(&wav.samples, wav.channels, config.channels);
    let samples = resample(
        &remixed,
        config.channels,
        wav.sample_rate,
        config.sample_rate.0,
    );
    let expected = wav.duration();

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_output::<f32>(&device, &config, samples, done_tx)?,
        cpal::SampleFormat::I16 => build_output::<i16>(&device, &config, samples, done_tx)?,
        cpal::SampleFormat::U16 => build_output::<u16>(&device, &config, samples, done_tx)?,
        cpal::SampleFormat::I32 => build_output::<i32>(&device, &config, samples, done_tx)?,
        other => return Err(DeviceError::UnsupportedFormat(other)),
    };
    stream.play()?;

    if done_rx.recv_timeout(expected + DRAIN_GRACE).is_err() {
        log::warn!("playback: did not drain within {:?}", expected + DRAIN_GRACE);
    }
    drop(stream);

    log::debug!("playback: finished {} ({:?})", path.display(), expected);
    Ok(())
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Vec<f32>,
    done: mpsc::Sender<()>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut position = 0usize;
    let mut done = Some(done);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for out in data.iter_mut() {
                let sample = samples.get(position).copied().unwrap_or(0.0);
                *out = T::from_sample(sample);
                position += 1;
            }
            if position >= samples.len() {
                if let Some(tx) = done.take() {
                    let _ = tx.send(());
                }
            }
        },
        |err| log::error!("playback: stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn read_wav_scales_16_bit_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reply.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 24_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [0_i16, 16_384, -32_768] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let wav = read_wav(&path).unwrap();
        assert_eq!(wav.sample_rate, 24_000);
        assert_eq!(wav.channels, 1);
        assert_eq!(wav.samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn read_wav_accepts_float_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [0.25_f32, -0.25, 0.5, -0.5] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let wav = read_wav(&path).unwrap();
        assert_eq!(wav.samples, vec![0.25, -0.25, 0.5, -0.5]);
        assert_eq!(wav.duration(), Duration::from_secs_f64(2.0 / 48_000.0));
    }

    #[test]
    fn read_wav_missing_file_is_decode_error() {
        let dir = tempdir().unwrap();
        let err = read_wav(&dir.path().join("nope.wav")).unwrap_err();
        assert!(matches!(err, DeviceError::Decode(_)));
    }
}
