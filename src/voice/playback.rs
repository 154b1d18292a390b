//! Audio playback with mid-stream abort
//!
//! Playback is a blocking operation: the caller (normally a `spawn_blocking`
//! task) feeds samples to the output device and re-checks the halt callback
//! at a fixed sub-second interval, so a stop or pause lands well inside the
//! interrupt-latency budget instead of at the utterance boundary.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// How often the halt callback is re-checked during playback
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace added to the expected duration before giving up on the device
const COMPLETION_GRACE: Duration = Duration::from_secs(2);

/// How one playback run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// All frames were written
    Completed,
    /// The halt callback fired and the stream was torn down mid-utterance
    Interrupted,
}

/// Play a WAV file, aborting as soon as `halt` returns true.
///
/// # Errors
///
/// Returns error if the file cannot be decoded or no output device is
/// available.
pub fn play_wav_file(path: &Path, halt: &dyn Fn() -> bool) -> Result<PlaybackEnd> {
    let (samples, sample_rate) = read_wav(path)?;
    tracing::debug!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate,
        "starting playback"
    );
    play_samples(samples, sample_rate, halt)
}

/// Play mono f32 samples, aborting as soon as `halt` returns true.
///
/// # Errors
///
/// Returns error if no output device supports the sample rate.
pub fn play_samples(
    samples: Vec<f32>,
    sample_rate: u32,
    halt: &dyn Fn() -> bool,
) -> Result<PlaybackEnd> {
    if samples.is_empty() {
        return Ok(PlaybackEnd::Completed);
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let config = output_config(&device, sample_rate)?;
    let channels = usize::from(config.channels);

    let sample_count = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let cb_samples = Arc::clone(&samples);
    let cb_position = Arc::clone(&position);
    let cb_finished = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let pos = cb_position.load(Ordering::Relaxed);
                    let sample = cb_samples.get(pos).copied().map_or_else(
                        || {
                            cb_finished.store(true, Ordering::Relaxed);
                            0.0
                        },
                        |s| {
                            cb_position.store(pos + 1, Ordering::Relaxed);
                            s
                        },
                    );
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let expected = Duration::from_millis(
        (sample_count as u64).saturating_mul(1000) / u64::from(sample_rate),
    );
    let deadline = Instant::now() + expected + COMPLETION_GRACE;

    let outcome = loop {
        if finished.load(Ordering::Relaxed) {
            break PlaybackEnd::Completed;
        }
        if halt() {
            tracing::debug!(
                written = position.load(Ordering::Relaxed),
                total = sample_count,
                "playback halted"
            );
            break PlaybackEnd::Interrupted;
        }
        if Instant::now() > deadline {
            tracing::warn!("playback deadline exceeded, treating as complete");
            break PlaybackEnd::Completed;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    drop(stream);
    Ok(outcome)
}

/// Pick a mono (or stereo fallback) output config at the given sample rate
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| c.channels() == 1 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .or_else(|| {
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        })
        .ok_or_else(|| {
            Error::Audio(format!("no output config supports {sample_rate} Hz"))
        })?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Decode a WAV file to mono f32 samples plus its sample rate
fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| Error::Audio(format!("wav open: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / 32768.0))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(format!("wav decode: {e}")))?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(format!("wav decode: {e}")))?,
    };

    let samples = if spec.channels == 2 {
        downmix_to_mono(&samples)
    } else {
        samples
    };

    Ok((samples, spec.sample_rate))
}

/// Average interleaved stereo samples into mono
fn downmix_to_mono(samples: &[f32]) -> Vec<f32> {
    samples
        .chunks(2)
        .map(|pair| {
            let left = pair[0];
            let right = pair.get(1).copied().unwrap_or(left);
            f32::midpoint(left, right)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix_to_mono(&stereo), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn empty_samples_complete_immediately() {
        let end = play_samples(Vec::new(), 22_050, &|| false).unwrap();
        assert_eq!(end, PlaybackEnd::Completed);
    }
}
