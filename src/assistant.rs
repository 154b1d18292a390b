//! Foreground conversation loop
//!
//! Listen, think, act, speak: one turn at a time. The loop cooperates with
//! the speak pipeline through the shared session handle — it waits while an
//! utterance plays, handles "continue" while paused, and lets a new turn
//! supersede a paused reply.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::directive::{self, Directive};
use crate::llm::{ChatMessage, LanguageModel};
use crate::memory::MemoryStore;
use crate::tools::{ToolRegistry, ToolResult, builtin_registry};
use crate::voice::{
    AudioCapture, AudioSession, InterruptOptions, SAMPLE_RATE, SpeechSegmenter, SpeechToText,
    SttOutcome, TtsEngine, TtsSettings, samples_to_wav,
};
use crate::{Error, Result, prompt};

/// Words that end the session when spoken on their own
const EXIT_WORDS: &[&str] = &["exit", "quit", "goodbye", "bye"];

/// Give up listening when no speech starts within this window
const LISTEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest utterance accepted before transcribing what we have
const MAX_UTTERANCE: Duration = Duration::from_secs(30);

/// Poll interval for the wait-while-speaking loop
const SPEAK_POLL: Duration = Duration::from_millis(100);

/// Settle time between playback ending and the microphone reopening
const MIC_SETTLE: Duration = Duration::from_millis(300);

/// The assistant: configuration, collaborators, and conversation state
pub struct Assistant {
    config: Config,
    llm: LanguageModel,
    stt: SpeechToText,
    session: AudioSession,
    registry: Arc<ToolRegistry>,
    memory: Arc<MemoryStore>,
    history: Vec<ChatMessage>,
    system_prompt: String,
    session_id: String,
    user_name: String,
}

impl Assistant {
    /// Wire up all collaborators.
    ///
    /// # Errors
    ///
    /// Returns error if a collaborator cannot be constructed (no voice
    /// model, bad URLs)
    pub fn new(config: Config, memory: Arc<MemoryStore>) -> Result<Self> {
        let llm = LanguageModel::new(&config.llm.base_url, &config.llm.model, config.llm.timeout)?;
        let stt = SpeechToText::new(&config.stt.base_url, config.stt.timeout)?;

        let tts = TtsEngine::new(TtsSettings {
            command: config.tts.command.clone(),
            voice_model: config.require_voice_model()?,
            length_scale: config.tts.length_scale,
            sentence_silence: config.tts.sentence_silence,
            timeout: config.tts.timeout,
        });

        let interrupt_stt = SpeechToText::new(&config.stt.base_url, config.interrupt.stt_timeout)?;
        let interrupt = InterruptOptions {
            stt: interrupt_stt,
            pause_words: config.interrupt.pause_words.clone(),
            stop_words: config.interrupt.stop_words.clone(),
            poll: config.interrupt.poll,
            stt_timeout: config.interrupt.stt_timeout,
        };

        let session = AudioSession::new(tts, Some(interrupt), config.output_dir.clone());
        let registry = Arc::new(builtin_registry(&memory));

        let user_name = memory
            .preference("name")
            .or_else(|| config.user_name.clone())
            .unwrap_or_else(|| "friend".to_string());

        let system_prompt = prompt::build_system_prompt(
            &user_name,
            config.personality,
            &memory.context_summary(),
            &registry.descriptions(),
        );

        let session_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        tracing::info!(
            session_id = %session_id,
            model = %config.llm.model,
            tools = registry.len(),
            "assistant ready"
        );

        Ok(Self {
            config,
            llm,
            stt,
            session,
            registry,
            memory,
            history: Vec::new(),
            system_prompt,
            session_id,
            user_name,
        })
    }

    /// Run the conversation loop until an exit word or Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error only for unrecoverable audio failures; collaborator
    /// hiccups are spoken to the user and the loop continues
    pub async fn run(&mut self) -> Result<()> {
        let greeting = if self.config.wake_word_mode {
            format!(
                "Hey {}! Say '{}' when you need me.",
                self.user_name, self.config.wake_word
            )
        } else {
            format!("Hey {}! I'm ready to help. What can I do for you?", self.user_name)
        };
        self.say(&greeting);

        loop {
            self.wait_until_listenable().await;

            let Some(user_text) = self.listen().await? else {
                continue;
            };
            let lowered = user_text.to_lowercase();

            // Resume a paused utterance
            if self.session.handle().is_paused() && lowered.contains("continue") {
                if let Err(e) = self.session.resume() {
                    tracing::warn!(error = %e, "resume failed");
                }
                continue;
            }

            if EXIT_WORDS.iter().any(|w| lowered.trim() == *w) {
                let farewell = format!(
                    "Goodbye {}! I'll remember everything for next time.",
                    self.user_name
                );
                self.say(&farewell);
                self.wait_for_silence(Duration::from_secs(15)).await;
                return Ok(());
            }

            // Discard a stop left over from the interrupted utterance
            let _ = self.session.handle().take_stop_request();

            let reply = self.process_turn(&user_text).await;

            // A stop spoken during this turn's thinking suppresses the reply
            if self.session.handle().take_stop_request() {
                tracing::debug!("reply suppressed by stop request");
                continue;
            }
            self.say(&reply);
        }
    }

    /// One language-model turn: chat, run directives, splice results.
    pub async fn process_turn(&mut self, user_text: &str) -> String {
        let mut messages = vec![ChatMessage::system(&self.system_prompt)];
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(user_text));

        let response = match self.llm.chat(&messages).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "chat failed");
                return spoken_failure(&e);
            }
        };

        let (reply, tools_used) = self.apply_directives(response).await;

        self.history.push(ChatMessage::user(user_text));
        self.history.push(ChatMessage::assistant(&reply));
        let overflow = self.history.len().saturating_sub(self.config.history_limit);
        if overflow > 0 {
            self.history.drain(..overflow);
        }

        if let Err(e) =
            self.memory
                .save_conversation(user_text, &reply, &tools_used, &self.session_id)
        {
            tracing::warn!(error = %e, "could not save conversation");
        }

        reply
    }

    /// Extract directives, dispatch them in order, fold results into the reply
    async fn apply_directives(&self, response: String) -> (String, Vec<String>) {
        let (directives, cleaned) = directive::extract(&response);
        if directives.is_empty() {
            return (response, Vec::new());
        }

        tracing::info!(count = directives.len(), "running tool directives");
        let tools_used: Vec<String> = directives.iter().map(|d| d.name.clone()).collect();

        let registry = Arc::clone(&self.registry);
        let batch = directives.clone();
        let results = match tokio::task::spawn_blocking(move || registry.dispatch_all(&batch)).await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(error = %e, "dispatch task failed");
                return (cleaned, tools_used);
            }
        };

        (fold_results(&cleaned, &directives, &results), tools_used)
    }

    /// Speak a reply, logging instead of failing the loop
    fn say(&self, text: &str) {
        println!("Assistant: {text}");
        if let Err(e) = self.session.speak(text) {
            tracing::error!(error = %e, "speak rejected");
        }
    }

    /// Block (cooperatively) while an utterance is in flight and not paused
    async fn wait_until_listenable(&self) {
        let handle = self.session.handle();
        if !handle.is_speaking() {
            return;
        }
        while handle.is_speaking() && !handle.is_paused() {
            tokio::time::sleep(SPEAK_POLL).await;
        }
        // Let the interrupt watcher release the microphone
        tokio::time::sleep(MIC_SETTLE).await;
    }

    /// Wait for the current utterance to finish, up to `limit`
    async fn wait_for_silence(&self, limit: Duration) {
        let handle = self.session.handle();
        let deadline = Instant::now() + limit;
        while handle.is_speaking() && Instant::now() < deadline {
            tokio::time::sleep(SPEAK_POLL).await;
        }
    }

    /// Capture one utterance and transcribe it.
    ///
    /// Returns `None` on silence, unintelligible audio, or (in wake-word
    /// mode) a transcript without the wake word.
    async fn listen(&self) -> Result<Option<String>> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        if self.config.wake_word_mode {
            println!("(waiting for '{}')", self.config.wake_word);
        } else {
            println!("Listening...");
        }

        let mut segmenter = SpeechSegmenter::new();
        let started = Instant::now();

        let utterance = loop {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let chunk = capture.take_buffer();
            if segmenter.push(&chunk) {
                break segmenter.take_utterance();
            }
            if !segmenter.is_listening() && started.elapsed() > LISTEN_TIMEOUT {
                capture.stop();
                tracing::debug!("no speech detected");
                return Ok(None);
            }
            if started.elapsed() > MAX_UTTERANCE {
                break segmenter.take_utterance();
            }
        };
        capture.stop();

        if utterance.is_empty() {
            return Ok(None);
        }

        let wav = samples_to_wav(&utterance, SAMPLE_RATE)?;
        let transcript = match self.stt.transcribe(wav).await {
            Ok(SttOutcome::Transcript(text)) => text,
            Ok(SttOutcome::Timeout) => {
                tracing::debug!("transcription timed out");
                return Ok(None);
            }
            Ok(SttOutcome::Unintelligible) => {
                tracing::debug!("could not understand speech");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                self.say(&spoken_failure(&e));
                return Ok(None);
            }
        };

        if self.config.wake_word_mode {
            if !contains_wake_phrase(&transcript, &self.config.wake_word) {
                tracing::debug!(transcript = %transcript, "wake word not present");
                return Ok(None);
            }
            let command = strip_wake_phrase(&transcript, &self.config.wake_word);
            if command.is_empty() {
                self.say("Yes?");
                return Ok(None);
            }
            println!("You said: {command}");
            return Ok(Some(command));
        }

        println!("You said: {transcript}");
        Ok(Some(transcript))
    }
}

/// Append tool outcomes to the cleaned reply, in dispatch order
fn fold_results(cleaned: &str, directives: &[Directive], results: &[ToolResult]) -> String {
    let lines: Vec<String> = directives
        .iter()
        .zip(results)
        .map(|(directive, result)| {
            let mark = if result.success { '✓' } else { '✗' };
            format!("{mark} {}: {}", directive.name, result.output)
        })
        .collect();

    if cleaned.is_empty() {
        lines.join("\n")
    } else {
        format!("{cleaned}\n\n{}", lines.join("\n"))
    }
}

/// Whether a transcript contains the wake phrase (case-insensitive)
fn contains_wake_phrase(transcript: &str, wake_word: &str) -> bool {
    transcript.to_lowercase().contains(&wake_word.to_lowercase())
}

/// Remove the wake phrase and leading punctuation from a transcript
fn strip_wake_phrase(transcript: &str, wake_word: &str) -> String {
    let lower = transcript.to_lowercase();
    let wake_lower = wake_word.to_lowercase();

    lower.find(&wake_lower).map_or_else(
        || transcript.trim().to_string(),
        |pos| {
            transcript[pos + wake_word.len()..]
                .trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '.')
                .trim_end()
                .to_string()
        },
    )
}

/// Turn a collaborator failure into something worth saying out loud
fn spoken_failure(error: &Error) -> String {
    match error {
        Error::Llm(_) => {
            "I can't reach my language model right now. Is the model server running?".to_string()
        }
        Error::Stt(_) => "I'm having trouble hearing you, my ears are offline.".to_string(),
        Error::Tts(_) => "My voice isn't working right now.".to_string(),
        other => {
            tracing::error!(error = %other, "unexpected failure");
            "Sorry, something went wrong.".to_string()
        }
    }
}
