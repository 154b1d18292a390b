//! Error types for the Vesper assistant

use thiserror::Error;

/// Result type alias for Vesper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Language-model server error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Audio session transition contract violation.
    ///
    /// This is a programming error (e.g. `resume()` while not paused), not a
    /// recoverable runtime condition. Callers should treat it as a bug.
    #[error("session contract violation: {0}")]
    Session(String),

    /// Memory store error
    #[error("memory error: {0}")]
    Memory(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
