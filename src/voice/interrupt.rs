//! Spoken-interrupt watcher
//!
//! While the session is speaking, a background task captures short audio
//! windows, transcribes them against a short deadline, and checks the text
//! for interrupt keywords. The first match performs exactly one session
//! transition — pause or stop — then the watcher exits. Recognition
//! failures are ignored and the loop continues.

use crate::voice::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use crate::voice::segment::rms_energy;
use crate::voice::session::{InterruptOptions, Phase, SessionHandle};
use crate::voice::stt::SttOutcome;

/// Minimum RMS energy before a window is worth transcribing
const ENERGY_FLOOR: f32 = 0.02;

/// Minimum window length worth transcribing (samples)
const MIN_WINDOW_SAMPLES: usize = SAMPLE_RATE as usize / 4;

/// Classification of a recognized interrupt phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptClass {
    /// Halt playback but keep the utterance resumable
    Pause,
    /// Abandon the utterance
    Stop,
}

/// Classify a transcript against the configured keyword sets.
///
/// Pause-class words are checked first, so "wait" wins over a transcript
/// that also contains a stop word. Plain substring containment — "don't
/// stop" still reads as a stop; a known limitation of the heuristic.
#[must_use]
pub fn classify(transcript: &str, pause_words: &[String], stop_words: &[String]) -> Option<InterruptClass> {
    let lower = transcript.to_lowercase();
    if pause_words.iter().any(|w| lower.contains(w.as_str())) {
        return Some(InterruptClass::Pause);
    }
    if stop_words.iter().any(|w| lower.contains(w.as_str())) {
        return Some(InterruptClass::Stop);
    }
    None
}

/// Background listener for one `Speaking` period
pub struct InterruptWatcher {
    handle: SessionHandle,
    options: InterruptOptions,
}

impl InterruptWatcher {
    /// Create a watcher bound to a session
    #[must_use]
    pub const fn new(handle: SessionHandle, options: InterruptOptions) -> Self {
        Self { handle, options }
    }

    /// Run the watcher on a blocking thread.
    ///
    /// The microphone and the blocking STT client both live entirely on
    /// that thread, away from the async runtime workers.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::task::spawn_blocking(move || self.run())
    }

    fn run(self) {
        let mut capture = match AudioCapture::new() {
            Ok(capture) => capture,
            Err(e) => {
                tracing::warn!(error = %e, "interrupt watcher has no microphone");
                return;
            }
        };
        if let Err(e) = capture.start() {
            tracing::warn!(error = %e, "interrupt watcher could not start capture");
            return;
        }

        tracing::debug!("interrupt watcher listening");

        while self.handle.phase() == Phase::Speaking {
            std::thread::sleep(self.options.poll);

            let window = capture.take_buffer();
            if window.len() < MIN_WINDOW_SAMPLES || rms_energy(&window) < ENERGY_FLOOR {
                continue;
            }

            let Ok(wav) = samples_to_wav(&window, SAMPLE_RATE) else {
                continue;
            };

            match self.options.stt.transcribe_blocking(wav) {
                Ok(SttOutcome::Transcript(text)) => {
                    let class =
                        classify(&text, &self.options.pause_words, &self.options.stop_words);
                    if let Some(class) = class {
                        tracing::info!(transcript = %text, ?class, "interrupt recognized");
                        self.act(class);
                        break;
                    }
                }
                // Inaudible, unintelligible, or a slow/unreachable server:
                // keep listening
                Ok(SttOutcome::Timeout | SttOutcome::Unintelligible) | Err(_) => {}
            }
        }

        capture.stop();
        tracing::debug!("interrupt watcher exited");
    }

    /// Apply exactly one session transition for the recognized class
    fn act(&self, class: InterruptClass) {
        let acted = match class {
            InterruptClass::Pause => self.handle.try_pause(),
            InterruptClass::Stop => self.handle.request_stop(),
        };
        if !acted {
            tracing::debug!(?class, "interrupt lost the race against playback end");
        }
    }
}

/// Default pause-class keywords
#[must_use]
pub fn default_pause_words() -> Vec<String> {
    ["wait", "pause", "hold on", "one moment"]
        .map(String::from)
        .to_vec()
}

/// Default stop-class keywords
#[must_use]
pub fn default_stop_words() -> Vec<String> {
    ["stop", "shut up", "quiet", "silence", "cancel", "never mind"]
        .map(String::from)
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_words_classify_as_pause() {
        let pause = default_pause_words();
        let stop = default_stop_words();
        assert_eq!(
            classify("Hold on a second", &pause, &stop),
            Some(InterruptClass::Pause)
        );
        assert_eq!(classify("WAIT", &pause, &stop), Some(InterruptClass::Pause));
    }

    #[test]
    fn stop_words_classify_as_stop() {
        let pause = default_pause_words();
        let stop = default_stop_words();
        assert_eq!(
            classify("okay stop now", &pause, &stop),
            Some(InterruptClass::Stop)
        );
        assert_eq!(
            classify("be quiet", &pause, &stop),
            Some(InterruptClass::Stop)
        );
    }

    #[test]
    fn pause_wins_over_stop_in_one_phrase() {
        let pause = default_pause_words();
        let stop = default_stop_words();
        assert_eq!(
            classify("wait stop", &pause, &stop),
            Some(InterruptClass::Pause)
        );
    }

    #[test]
    fn ordinary_speech_is_not_an_interrupt() {
        let pause = default_pause_words();
        let stop = default_stop_words();
        assert_eq!(classify("tell me more about that", &pause, &stop), None);
    }
}
