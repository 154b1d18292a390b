//! Text-to-speech via a piper-style subprocess
//!
//! The synthesizer reads text on stdin and writes a WAV file. The caller
//! owns the time budget: a hard timeout bounds a hung subprocess, and an
//! explicit cancellation check runs at a fixed interval so a stop request
//! kills generation instead of waiting it out.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use crate::{Error, Result};

/// Interval between cancellation checks while the subprocess runs
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Grace period between the kill signal and forcing reap
const KILL_GRACE: Duration = Duration::from_millis(500);

/// How synthesis ended
#[derive(Debug)]
pub enum Synthesis {
    /// Audio was written to the returned path
    Completed(PathBuf),
    /// The cancellation check fired and the subprocess was terminated
    Cancelled,
}

/// Settings for the TTS subprocess
#[derive(Debug, Clone)]
pub struct TtsSettings {
    /// Synthesizer binary (e.g. `piper`)
    pub command: String,
    /// Voice model path (`.onnx` with a sibling `.onnx.json`)
    pub voice_model: PathBuf,
    /// Phoneme length scale (lower is faster speech)
    pub length_scale: f32,
    /// Silence between sentences, in seconds
    pub sentence_silence: f32,
    /// Hard deadline for one synthesis run
    pub timeout: Duration,
}

/// Spawns and supervises the synthesizer subprocess
pub struct TtsEngine {
    settings: TtsSettings,
}

impl TtsEngine {
    /// Create an engine from settings
    #[must_use]
    pub const fn new(settings: TtsSettings) -> Self {
        Self { settings }
    }

    /// Synthesize `text` into a fresh WAV file under `output_dir`.
    ///
    /// `cancelled` is polled at a fixed interval; when it returns true the
    /// subprocess is killed and `Synthesis::Cancelled` is returned. A
    /// subprocess that outlives the configured timeout is killed and
    /// reported as an error.
    ///
    /// # Errors
    ///
    /// Returns error if the subprocess cannot be spawned, exits nonzero,
    /// produces no audio, or exceeds the timeout
    pub async fn synthesize<F>(
        &self,
        text: &str,
        output_dir: &Path,
        cancelled: F,
    ) -> Result<Synthesis>
    where
        F: Fn() -> bool,
    {
        let output = tempfile::Builder::new()
            .prefix("utterance-")
            .suffix(".wav")
            .tempfile_in(output_dir)
            .map_err(|e| Error::Tts(format!("cannot create output file: {e}")))?
            .into_temp_path();
        let output: PathBuf = output
            .keep()
            .map_err(|e| Error::Tts(format!("cannot keep output file: {e}")))?;

        tracing::debug!(
            chars = text.len(),
            output = %output.display(),
            "starting synthesis"
        );

        let mut child = Command::new(&self.settings.command)
            .arg("--model")
            .arg(&self.settings.voice_model)
            .arg("--output_file")
            .arg(&output)
            .arg("--length_scale")
            .arg(self.settings.length_scale.to_string())
            .arg("--sentence_silence")
            .arg(self.settings.sentence_silence.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Tts(format!("cannot spawn {}: {e}", self.settings.command))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Tts("subprocess stdin unavailable".to_string()))?;
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| Error::Tts(format!("cannot write text: {e}")))?;
        drop(stdin);

        let deadline = Instant::now() + self.settings.timeout;
        let status = loop {
            tokio::select! {
                status = child.wait() => {
                    break status.map_err(|e| Error::Tts(e.to_string()))?;
                }
                () = tokio::time::sleep(CANCEL_POLL) => {
                    if cancelled() {
                        kill_subprocess(&mut child).await;
                        remove_partial(&output);
                        return Ok(Synthesis::Cancelled);
                    }
                    if Instant::now() > deadline {
                        kill_subprocess(&mut child).await;
                        remove_partial(&output);
                        return Err(Error::Tts(format!(
                            "synthesis timed out after {}s",
                            self.settings.timeout.as_secs()
                        )));
                    }
                }
            }
        };

        if !status.success() {
            let stderr = read_stderr(&mut child).await;
            remove_partial(&output);
            return Err(Error::Tts(format!(
                "synthesizer exited with {status}: {stderr}"
            )));
        }

        let produced = std::fs::metadata(&output).map_or(0, |m| m.len());
        if produced == 0 {
            remove_partial(&output);
            return Err(Error::Tts("synthesizer produced no audio".to_string()));
        }

        tracing::debug!(bytes = produced, "synthesis complete");
        Ok(Synthesis::Completed(output))
    }
}

/// Kill the subprocess with a short grace period before forcing reap
async fn kill_subprocess(child: &mut Child) {
    if child.start_kill().is_err() {
        return; // already exited
    }
    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        if let Err(e) = child.kill().await {
            tracing::warn!(error = %e, "could not reap TTS subprocess");
        }
    }
}

async fn read_stderr(child: &mut Child) -> String {
    use tokio::io::AsyncReadExt;

    let Some(mut stderr) = child.stderr.take() else {
        return String::new();
    };
    let mut buf = String::new();
    let _ = stderr.read_to_string(&mut buf).await;
    buf.trim().chars().take(400).collect()
}

fn remove_partial(path: &Path) {
    let _ = std::fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(command: &str) -> TtsSettings {
        TtsSettings {
            command: command.to_string(),
            voice_model: PathBuf::from("voice.onnx"),
            length_scale: 0.9,
            sentence_silence: 0.1,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let engine = TtsEngine::new(settings("definitely-not-a-real-synth"));
        let dir = tempfile::tempdir().unwrap();
        let result = engine.synthesize("hello", dir.path(), || false).await;
        assert!(matches!(result, Err(Error::Tts(_))));
    }
}
