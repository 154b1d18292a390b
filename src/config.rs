//! Configuration for the assistant
//!
//! Defaults are overridden by an optional TOML config file, then by
//! environment variables, then by CLI arguments. The voice model is
//! discovered by scanning for piper `.onnx` files when not set explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::prompt::Personality;
use crate::{Error, Result};

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// User's name from the CLI, if given (otherwise memory or first-run prompt)
    pub user_name: Option<String>,

    /// Speaking style
    pub personality: Personality,

    /// Require the wake word before processing speech
    pub wake_word_mode: bool,

    /// Wake word checked against transcripts
    pub wake_word: String,

    /// Language-model server settings
    pub llm: LlmConfig,

    /// Transcription server settings
    pub stt: SttConfig,

    /// Synthesizer subprocess settings
    pub tts: TtsConfig,

    /// Interrupt keyword settings
    pub interrupt: InterruptConfig,

    /// Persistent memory directory
    pub data_dir: PathBuf,

    /// Directory for transient utterance audio
    pub output_dir: PathBuf,

    /// Chat messages of history kept per turn
    pub history_limit: usize,
}

/// Language-model server settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the chat server
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Per-request deadline
    pub timeout: Duration,
}

/// Transcription server settings
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Base URL of the whisper-style server
    pub base_url: String,
    /// Deadline for foreground transcriptions
    pub timeout: Duration,
}

/// Synthesizer subprocess settings
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Synthesizer binary
    pub command: String,
    /// Voice model path; discovered by scanning when absent
    pub voice_model: Option<PathBuf>,
    /// Phoneme length scale
    pub length_scale: f32,
    /// Silence between sentences, seconds
    pub sentence_silence: f32,
    /// Hard deadline for one synthesis run
    pub timeout: Duration,
}

/// Interrupt watcher settings
#[derive(Debug, Clone)]
pub struct InterruptConfig {
    /// Pause-class keywords
    pub pause_words: Vec<String>,
    /// Stop-class keywords
    pub stop_words: Vec<String>,
    /// Capture window between checks
    pub poll: Duration,
    /// Deadline for one interrupt recognition
    pub stt_timeout: Duration,
}

/// Optional config-file overrides (`~/.config/vesper/config.toml`)
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    llm_url: Option<String>,
    llm_model: Option<String>,
    llm_timeout_secs: Option<u64>,
    stt_url: Option<String>,
    tts_command: Option<String>,
    voice_model: Option<PathBuf>,
    wake_word: Option<String>,
    personality: Option<String>,
    pause_words: Option<Vec<String>>,
    stop_words: Option<Vec<String>>,
}

impl Config {
    /// Assemble the configuration.
    ///
    /// CLI arguments win over environment variables, which win over the
    /// config file, which wins over defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the config file is malformed or a personality
    /// string does not parse
    pub fn load(
        model: Option<&str>,
        personality: Option<&str>,
        user_name: Option<&str>,
        wake_word_mode: bool,
    ) -> Result<Self> {
        let file = load_config_file()?;

        let llm = LlmConfig {
            base_url: std::env::var("VESPER_LLM_URL")
                .ok()
                .or(file.llm_url)
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: model
                .map(ToString::to_string)
                .or_else(|| std::env::var("VESPER_LLM_MODEL").ok())
                .or(file.llm_model)
                .unwrap_or_else(|| "mistral".to_string()),
            timeout: Duration::from_secs(file.llm_timeout_secs.unwrap_or(300)),
        };

        let stt = SttConfig {
            base_url: std::env::var("VESPER_STT_URL")
                .ok()
                .or(file.stt_url)
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            timeout: Duration::from_secs(30),
        };

        let voice_model = std::env::var("VESPER_VOICE_MODEL")
            .ok()
            .map(PathBuf::from)
            .or(file.voice_model)
            .or_else(find_voice_model);

        let tts = TtsConfig {
            command: std::env::var("VESPER_TTS_COMMAND")
                .ok()
                .or(file.tts_command)
                .unwrap_or_else(|| "piper".to_string()),
            voice_model,
            length_scale: 0.9,
            sentence_silence: 0.08,
            timeout: Duration::from_secs(90),
        };

        let personality = personality
            .map(ToString::to_string)
            .or_else(|| std::env::var("VESPER_PERSONALITY").ok())
            .or(file.personality)
            .map_or(Ok(Personality::default()), |s| {
                s.parse().map_err(Error::Config)
            })?;

        let interrupt = InterruptConfig {
            pause_words: file
                .pause_words
                .unwrap_or_else(crate::voice::interrupt::default_pause_words),
            stop_words: file
                .stop_words
                .unwrap_or_else(crate::voice::interrupt::default_stop_words),
            poll: Duration::from_millis(250),
            stt_timeout: Duration::from_secs(2),
        };

        let wake_word = std::env::var("VESPER_WAKE_WORD")
            .ok()
            .or(file.wake_word)
            .unwrap_or_else(|| "vesper".to_string());

        let data_dir = data_dir();
        let output_dir = data_dir.join("voice_output");
        std::fs::create_dir_all(&output_dir).ok();

        Ok(Self {
            user_name: user_name.map(ToString::to_string),
            personality,
            wake_word_mode,
            wake_word,
            llm,
            stt,
            tts,
            interrupt,
            data_dir,
            output_dir,
            history_limit: 16,
        })
    }

    /// Voice model path, or a configuration error telling the user where
    /// to put one
    ///
    /// # Errors
    ///
    /// Returns error if no voice model was configured or discovered
    pub fn require_voice_model(&self) -> Result<PathBuf> {
        self.tts.voice_model.clone().ok_or_else(|| {
            Error::Config(
                "no voice model found; place a piper .onnx model (with its .onnx.json) \
                 in ./piper_models or set VESPER_VOICE_MODEL"
                    .to_string(),
            )
        })
    }
}

/// Data directory (`~/.local/share/vesper` on Linux)
fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "vesper", "vesper")
        .map_or_else(|| PathBuf::from(".vesper"), |d| d.data_dir().to_path_buf())
}

fn load_config_file() -> Result<ConfigFile> {
    let path = directories::ProjectDirs::from("dev", "vesper", "vesper")
        .map(|d| d.config_dir().join("config.toml"));

    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(ConfigFile::default());
    };

    let content = std::fs::read_to_string(&path)?;
    let parsed = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(parsed)
}

/// Scan for a piper voice model: `piper_models/*.onnx` first, then the
/// working directory. A model counts only with its sibling `.onnx.json`.
fn find_voice_model() -> Option<PathBuf> {
    for dir in [Path::new("piper_models"), Path::new(".")] {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.extension().is_some_and(|ext| ext == "onnx")
                    && sibling_json(p).exists()
            })
            .collect();
        candidates.sort();
        if let Some(model) = candidates.into_iter().next() {
            tracing::debug!(model = %model.display(), "voice model discovered");
            return Some(model);
        }
    }
    None
}

fn sibling_json(model: &Path) -> PathBuf {
    let mut name = model.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_json_appends_suffix() {
        assert_eq!(
            sibling_json(Path::new("voices/en_US.onnx")),
            PathBuf::from("voices/en_US.onnx.json")
        );
    }

    #[test]
    fn defaults_are_sensible() {
        let config = Config::load(None, None, None, false).unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.personality, Personality::Friendly);
        assert!(!config.wake_word_mode);
        assert_eq!(config.history_limit, 16);
        assert!(!config.interrupt.pause_words.is_empty());
    }

    #[test]
    fn cli_model_wins() {
        let config = Config::load(Some("llama3"), Some("witty"), None, true).unwrap();
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.personality, Personality::Witty);
        assert!(config.wake_word_mode);
    }
}
