//! Voice pipeline: capture, segmentation, STT, TTS, playback, and the
//! spoken-turn session that coordinates them

pub mod capture;
pub mod interrupt;
pub mod playback;
pub mod segment;
pub mod session;
pub mod stt;
pub mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use interrupt::{InterruptClass, InterruptWatcher, classify};
pub use playback::{PlaybackEnd, play_samples, play_wav_file};
pub use segment::SpeechSegmenter;
pub use session::{AudioSession, InterruptOptions, Phase, SessionHandle};
pub use stt::{SpeechToText, SttOutcome};
pub use tts::{Synthesis, TtsEngine, TtsSettings};
