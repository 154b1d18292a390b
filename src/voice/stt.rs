//! Speech-to-text via a local whisper-style HTTP server
//!
//! The server (e.g. `whisper-server` / whisper.cpp) accepts a WAV upload on
//! `/inference` and answers `{"text": "..."}`. Recognition has three
//! non-transport outcomes the callers treat differently: a transcript, a
//! timeout, and unintelligible audio.

use std::time::Duration;

use crate::{Error, Result};

/// Response body from the transcription endpoint
#[derive(serde::Deserialize)]
struct InferenceResponse {
    text: String,
}

/// Outcome of one recognition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SttOutcome {
    /// Recognized text (non-blank)
    Transcript(String),
    /// The server did not answer within the deadline
    Timeout,
    /// The server answered but heard nothing usable
    Unintelligible,
}

/// Client for the local transcription server
#[derive(Debug, Clone)]
pub struct SpeechToText {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl SpeechToText {
    /// Create a client for `base_url` with a per-request deadline.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Stt(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    /// Transcribe WAV audio.
    ///
    /// # Errors
    ///
    /// Returns error only for transport-level failures (unreachable server,
    /// bad status); timeouts and unusable audio are [`SttOutcome`] values.
    pub async fn transcribe(&self, wav: Vec<u8>) -> Result<SttOutcome> {
        tracing::debug!(audio_bytes = wav.len(), "transcribing");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("response_format", "json");

        let response = match self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Ok(SttOutcome::Timeout),
            Err(e) => return Err(Error::Stt(e.to_string())),
        };

        Self::parse_response(response.status(), &response.text().await.unwrap_or_default())
    }

    /// Transcribe WAV audio from a non-async thread.
    ///
    /// Builds a blocking client per call; must not be invoked from an async
    /// runtime worker (the interrupt watcher runs it on a blocking thread).
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::transcribe`]
    pub fn transcribe_blocking(&self, wav: Vec<u8>) -> Result<SttOutcome> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Stt(e.to_string()))?;

        let form = reqwest::blocking::multipart::Form::new()
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("response_format", "json");

        let response = match client.post(self.endpoint()).multipart(form).send() {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Ok(SttOutcome::Timeout),
            Err(e) => return Err(Error::Stt(e.to_string())),
        };

        Self::parse_response(response.status(), &response.text().unwrap_or_default())
    }

    fn endpoint(&self) -> String {
        format!("{}/inference", self.base_url)
    }

    fn parse_response(status: reqwest::StatusCode, body: &str) -> Result<SttOutcome> {
        if !status.is_success() {
            return Err(Error::Stt(format!("STT server error {status}: {body}")));
        }

        let parsed: InferenceResponse = serde_json::from_str(body)
            .map_err(|e| Error::Stt(format!("bad STT response: {e}")))?;

        let text = parsed.text.trim();
        if text.is_empty() {
            return Ok(SttOutcome::Unintelligible);
        }

        tracing::debug!(transcript = %text, "transcription complete");
        Ok(SttOutcome::Transcript(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_transcript_is_unintelligible() {
        let outcome =
            SpeechToText::parse_response(reqwest::StatusCode::OK, r#"{"text": "  \n"}"#).unwrap();
        assert_eq!(outcome, SttOutcome::Unintelligible);
    }

    #[test]
    fn transcript_is_trimmed() {
        let outcome =
            SpeechToText::parse_response(reqwest::StatusCode::OK, r#"{"text": " hello "}"#)
                .unwrap();
        assert_eq!(outcome, SttOutcome::Transcript("hello".to_string()));
    }

    #[test]
    fn server_error_is_transport_class() {
        let result =
            SpeechToText::parse_response(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(result.is_err());
    }
}
