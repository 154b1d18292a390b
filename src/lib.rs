//! Vesper - local voice assistant harness
//!
//! Speech in, speech out, with everything heavy delegated to local
//! collaborators: a whisper-style STT server, an Ollama-style chat server,
//! and a piper-style TTS subprocess.
//!
//! # Architecture
//!
//! ```text
//! microphone ──▶ segment ──▶ STT ──▶ conversation loop ──▶ LLM
//!                                         │                 │
//!                                         │      TOOL: name(...) directives
//!                                         │                 │
//!                                         ▼                 ▼
//!                                   AudioSession ◀── parser + dispatcher
//!                                    │        ▲
//!                               TTS + playback │ pause / stop
//!                                    └── InterruptWatcher
//! ```

pub mod assistant;
pub mod config;
pub mod directive;
pub mod error;
pub mod llm;
pub mod memory;
pub mod prompt;
pub mod tools;
pub mod voice;

pub use assistant::Assistant;
pub use config::Config;
pub use directive::{Directive, extract};
pub use error::{Error, Result};
pub use llm::{ChatMessage, LanguageModel};
pub use memory::MemoryStore;
pub use prompt::Personality;
pub use tools::{Arity, ToolRegistry, ToolResult, builtin_registry};
pub use voice::{
    AudioSession, InterruptClass, InterruptOptions, Phase, SessionHandle, SpeechToText,
    SttOutcome, TtsEngine, TtsSettings,
};
