//! Energy-based speech segmentation
//!
//! Watches the capture buffer for the start of speech and the trailing
//! silence that marks the end of an utterance, so the foreground loop can
//! wait for the user to finish speaking before transcribing.

/// Minimum RMS energy to count a chunk as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length for a usable utterance (samples at 16 kHz)
const MIN_SPEECH_SAMPLES: usize = 4_800; // 0.3 s

/// Trailing silence that ends an utterance (samples)
const SILENCE_SAMPLES: usize = 16_000; // 1.0 s

/// Segmenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    /// Waiting for speech to start
    Idle,
    /// Accumulating a candidate utterance
    Listening,
}

/// Accumulates speech and reports when a complete utterance is available
pub struct SpeechSegmenter {
    state: SegmentState,
    speech: Vec<f32>,
    silence: usize,
}

impl Default for SpeechSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSegmenter {
    /// Create an idle segmenter
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SegmentState::Idle,
            speech: Vec::new(),
            silence: 0,
        }
    }

    /// Feed captured samples; returns true once a complete utterance
    /// (speech followed by sustained silence) is buffered.
    pub fn push(&mut self, samples: &[f32]) -> bool {
        if samples.is_empty() {
            return false;
        }

        let speaking = rms_energy(samples) > ENERGY_THRESHOLD;

        match self.state {
            SegmentState::Idle => {
                if speaking {
                    self.state = SegmentState::Listening;
                    self.speech.clear();
                    self.speech.extend_from_slice(samples);
                    self.silence = 0;
                    tracing::trace!("speech started");
                }
                false
            }
            SegmentState::Listening => {
                self.speech.extend_from_slice(samples);
                if speaking {
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                }

                if self.silence > SILENCE_SAMPLES {
                    if self.speech.len() > MIN_SPEECH_SAMPLES + self.silence {
                        tracing::debug!(samples = self.speech.len(), "utterance complete");
                        return true;
                    }
                    // Too short to be speech: a door slam, a cough
                    self.reset();
                }
                false
            }
        }
    }

    /// Take the buffered utterance and return to idle
    pub fn take_utterance(&mut self) -> Vec<f32> {
        self.state = SegmentState::Idle;
        self.silence = 0;
        std::mem::take(&mut self.speech)
    }

    /// Discard any partial segment
    pub fn reset(&mut self) {
        self.state = SegmentState::Idle;
        self.speech.clear();
        self.silence = 0;
    }

    /// Whether a candidate utterance is being accumulated
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == SegmentState::Listening
    }
}

/// RMS energy of a sample chunk
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud(n: usize) -> Vec<f32> {
        vec![0.5; n]
    }

    fn quiet(n: usize) -> Vec<f32> {
        vec![0.0; n]
    }

    #[test]
    fn silence_has_no_energy() {
        assert!(rms_energy(&quiet(100)) < 0.001);
        assert!(rms_energy(&loud(100)) > 0.4);
        assert!(rms_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn speech_then_silence_completes_an_utterance() {
        let mut segmenter = SpeechSegmenter::new();
        assert!(!segmenter.push(&loud(8_000)));
        assert!(segmenter.is_listening());
        assert!(segmenter.push(&quiet(20_000)));

        let utterance = segmenter.take_utterance();
        assert!(utterance.len() >= 8_000);
        assert!(!segmenter.is_listening());
    }

    #[test]
    fn short_blips_are_discarded() {
        let mut segmenter = SpeechSegmenter::new();
        assert!(!segmenter.push(&loud(1_000)));
        assert!(!segmenter.push(&quiet(20_000)));
        assert!(!segmenter.is_listening());
    }

    #[test]
    fn silence_alone_never_starts_a_segment() {
        let mut segmenter = SpeechSegmenter::new();
        assert!(!segmenter.push(&quiet(50_000)));
        assert!(!segmenter.is_listening());
    }
}
