//! Spoken-turn session state machine
//!
//! One utterance at a time moves through `Idle → Generating → Speaking →
//! {Finished | Stopped | Paused}`. Three actors share the state: the
//! foreground conversation loop, the synthesis-and-playback task, and the
//! interrupt watcher. Every read-modify-write happens under the single
//! internal lock, so no transition is ever observed half-applied.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::voice::interrupt::InterruptWatcher;
use crate::voice::playback::{self, PlaybackEnd};
use crate::voice::tts::{Synthesis, TtsEngine};
use crate::{Error, Result};

/// Phase of the current utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No utterance in flight
    #[default]
    Idle,
    /// TTS subprocess is producing audio
    Generating,
    /// Audio is being written to the output device
    Speaking,
    /// Playback halted by a pause-class interrupt; pending text retained
    Paused,
    /// Utterance abandoned by a stop request or a synthesis failure
    Stopped,
    /// Playback ran to the end of the audio data
    Finished,
}

#[derive(Debug, Default)]
struct SessionState {
    phase: Phase,
    stop_requested: bool,
    pending_text: Option<String>,
}

/// Cheap-to-clone handle to the shared session state.
///
/// Each method acquires the lock exactly once and applies one transition,
/// so transitions are totally ordered across actors.
#[derive(Clone, Default)]
pub struct SessionHandle {
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    /// Create a fresh idle session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// True from the start of audio generation until playback ends or is
    /// interrupted
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        matches!(self.lock().phase, Phase::Generating | Phase::Speaking)
    }

    /// True while a pause-class interrupt holds the utterance
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.lock().phase == Phase::Paused
    }

    /// Whether a stop has been requested for the in-flight utterance
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    /// Text of the utterance that would be resumed, if any
    #[must_use]
    pub fn pending_text(&self) -> Option<String> {
        self.lock().pending_text.clone()
    }

    /// Begin a new utterance: `Idle`/`Finished`/`Stopped`/`Paused` → `Generating`.
    ///
    /// Calling this while paused supersedes the paused utterance — the new
    /// text overwrites `pending_text` and the old utterance is never resumed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if an utterance is already in flight
    /// (`Generating` or `Speaking`); that is a caller bug, not a runtime
    /// condition.
    pub fn begin_utterance(&self, text: &str) -> Result<()> {
        let mut state = self.lock();
        if matches!(state.phase, Phase::Generating | Phase::Speaking) {
            return Err(Error::Session(format!(
                "speak() while an utterance is in flight ({:?})",
                state.phase
            )));
        }
        state.pending_text = Some(text.to_string());
        state.stop_requested = false;
        state.phase = Phase::Generating;
        Ok(())
    }

    /// Generation finished: `Generating` → `Speaking`.
    ///
    /// Returns false (and settles into `Stopped`) if a stop arrived while
    /// the audio was being produced, in which case playback must not start.
    #[must_use]
    pub fn start_speaking(&self) -> bool {
        let mut state = self.lock();
        if state.stop_requested || state.phase != Phase::Generating {
            state.phase = Phase::Stopped;
            state.pending_text = None;
            return false;
        }
        state.phase = Phase::Speaking;
        true
    }

    /// Synthesis failed or was abandoned: settle into `Stopped`
    pub fn fail_utterance(&self) {
        let mut state = self.lock();
        state.phase = Phase::Stopped;
        state.pending_text = None;
    }

    /// Pause-class interrupt: `Speaking` → `Paused`, retaining the pending
    /// text so the utterance can be resumed.
    ///
    /// Returns false without acting if the session is no longer speaking or
    /// a stop request already landed — pause and stop are mutually
    /// exclusive outcomes, and stop wins.
    #[must_use]
    pub fn try_pause(&self) -> bool {
        let mut state = self.lock();
        if state.phase != Phase::Speaking || state.stop_requested {
            return false;
        }
        state.phase = Phase::Paused;
        true
    }

    /// Request a best-effort immediate stop of the in-flight utterance.
    ///
    /// The generating/playback actor observes the flag at its next poll
    /// point and settles the phase; the pending text is discarded here so a
    /// paused resume can never revive it.
    pub fn request_stop(&self) -> bool {
        let mut state = self.lock();
        if !matches!(state.phase, Phase::Generating | Phase::Speaking) {
            return false;
        }
        state.stop_requested = true;
        state.pending_text = None;
        true
    }

    /// Poll point for the playback actor: halt when a stop was requested or
    /// the phase left `Speaking` (pause or supersession).
    #[must_use]
    pub fn playback_should_halt(&self) -> bool {
        let state = self.lock();
        state.stop_requested || state.phase != Phase::Speaking
    }

    /// Playback drained all frames: `Speaking` → `Finished`
    pub fn complete_utterance(&self) {
        let mut state = self.lock();
        if state.stop_requested {
            state.phase = Phase::Stopped;
        } else if state.phase == Phase::Speaking {
            state.phase = Phase::Finished;
        } else {
            // Paused just before the final frame: keep the pause
            return;
        }
        state.pending_text = None;
    }

    /// Playback halted early; settle the phase according to why.
    ///
    /// A stop request lands in `Stopped`; a pause leaves the `Paused` state
    /// (and its pending text) untouched.
    pub fn settle_after_halt(&self) {
        let mut state = self.lock();
        if state.stop_requested {
            state.phase = Phase::Stopped;
            state.pending_text = None;
        }
    }

    /// Read the pending text for a resume.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the session is not paused or holds no
    /// pending text — both caller bugs.
    pub fn resume_text(&self) -> Result<String> {
        let state = self.lock();
        if state.phase != Phase::Paused {
            return Err(Error::Session(format!(
                "resume() while not paused ({:?})",
                state.phase
            )));
        }
        state.pending_text.clone().ok_or_else(|| {
            Error::Session("paused session has no pending text".to_string())
        })
    }

    /// Consume a leftover stop request (set after the utterance settled)
    pub fn take_stop_request(&self) -> bool {
        let mut state = self.lock();
        std::mem::take(&mut state.stop_requested)
    }
}

/// Interrupt listening configuration for a session
#[derive(Debug, Clone)]
pub struct InterruptOptions {
    /// STT server used for recognizing interrupt phrases
    pub stt: crate::voice::stt::SpeechToText,
    /// Pause-class keywords
    pub pause_words: Vec<String>,
    /// Stop-class keywords
    pub stop_words: Vec<String>,
    /// Capture window between checks
    pub poll: std::time::Duration,
    /// Per-recognition timeout
    pub stt_timeout: std::time::Duration,
}

/// Owns the speak pipeline: synthesis, playback, and the interrupt watcher.
pub struct AudioSession {
    handle: SessionHandle,
    tts: Arc<TtsEngine>,
    interrupt: Option<InterruptOptions>,
    output_dir: PathBuf,
}

impl AudioSession {
    /// Create a session around a TTS engine.
    ///
    /// `interrupt` enables the spoken-interrupt watcher; pass `None` on
    /// machines without a microphone.
    #[must_use]
    pub fn new(tts: TtsEngine, interrupt: Option<InterruptOptions>, output_dir: PathBuf) -> Self {
        Self {
            handle: SessionHandle::new(),
            tts: Arc::new(tts),
            interrupt,
            output_dir,
        }
    }

    /// Shared state handle for other actors (foreground loop, tests)
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Speak `text`: synthesize, then play while watching for interrupts.
    ///
    /// Returns as soon as the utterance is admitted; the pipeline runs in a
    /// background task. While paused, a new `speak` supersedes the paused
    /// utterance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if an utterance is already in flight.
    pub fn speak(&self, text: &str) -> Result<()> {
        self.handle.begin_utterance(text)?;

        let handle = self.handle.clone();
        let tts = Arc::clone(&self.tts);
        let interrupt = self.interrupt.clone();
        let output_dir = self.output_dir.clone();
        let text = text.to_string();

        tokio::spawn(async move {
            run_utterance(handle, tts, interrupt, output_dir, text).await;
        });

        Ok(())
    }

    /// Resume the paused utterance by re-synthesizing its pending text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the session is not paused.
    pub fn resume(&self) -> Result<()> {
        let text = self.handle.resume_text()?;
        tracing::info!("resuming paused utterance");
        self.speak(&text)
    }
}

/// One utterance, start to settled phase.
async fn run_utterance(
    handle: SessionHandle,
    tts: Arc<TtsEngine>,
    interrupt: Option<InterruptOptions>,
    output_dir: PathBuf,
    text: String,
) {
    let cancel = {
        let handle = handle.clone();
        move || handle.stop_requested()
    };

    let wav = match tts.synthesize(&text, &output_dir, cancel).await {
        Ok(Synthesis::Completed(path)) => path,
        Ok(Synthesis::Cancelled) => {
            tracing::debug!("synthesis cancelled by stop request");
            handle.fail_utterance();
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "TTS failed, abandoning utterance");
            handle.fail_utterance();
            return;
        }
    };

    if !handle.start_speaking() {
        remove_audio_file(&wav);
        return;
    }

    if let Some(options) = interrupt {
        let _watcher = InterruptWatcher::new(handle.clone(), options).spawn();
    }

    let playback_handle = handle.clone();
    let playback_path = wav.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        playback::play_wav_file(&playback_path, &|| playback_handle.playback_should_halt())
    })
    .await;

    match outcome {
        Ok(Ok(PlaybackEnd::Completed)) => handle.complete_utterance(),
        Ok(Ok(PlaybackEnd::Interrupted)) => handle.settle_after_halt(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "playback failed");
            handle.fail_utterance();
        }
        Err(e) => {
            tracing::error!(error = %e, "playback task panicked");
            handle.fail_utterance();
        }
    }

    remove_audio_file(&wav);
}

/// Utterance audio is transient; leftovers are not an error
fn remove_audio_file(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::debug!(path = %path.display(), error = %e, "could not remove utterance audio");
    }
}
