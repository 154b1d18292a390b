use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vesper_assistant::voice::{self, AudioCapture, SAMPLE_RATE};
use vesper_assistant::{Assistant, Config, MemoryStore, TtsEngine, TtsSettings};

/// Vesper - local voice assistant
#[derive(Parser)]
#[command(name = "vesper", version, about)]
struct Cli {
    /// Language model to use (e.g. "mistral", "llama3")
    #[arg(short, long, env = "VESPER_LLM_MODEL")]
    model: Option<String>,

    /// Personality: friendly, professional, witty, minimalist
    #[arg(short, long, env = "VESPER_PERSONALITY")]
    personality: Option<String>,

    /// What the assistant should call you
    #[arg(short, long)]
    name: Option<String>,

    /// Require the wake word before responding
    #[arg(short, long)]
    wake_word: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,vesper_assistant=info",
        1 => "info,vesper_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(
        cli.model.as_deref(),
        cli.personality.as_deref(),
        cli.name.as_deref(),
        cli.wake_word,
    )?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration),
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&config, &text).await,
        };
    }

    let memory = Arc::new(MemoryStore::open(&config.data_dir)?);
    resolve_user_name(&memory, config.user_name.as_deref())?;
    memory.set_preference("personality", config.personality.as_str())?;

    let mut assistant = Assistant::new(config, memory)?;
    assistant.run().await?;
    Ok(())
}

/// CLI name wins; otherwise stored preference; otherwise ask once
fn resolve_user_name(memory: &MemoryStore, cli_name: Option<&str>) -> anyhow::Result<()> {
    if let Some(name) = cli_name {
        memory.set_preference("name", name)?;
        return Ok(());
    }
    if memory.preference("name").is_some() {
        return Ok(());
    }

    let name: String = dialoguer::Input::new()
        .with_prompt("Hi! I'm your new assistant. What should I call you?")
        .default("friend".to_string())
        .interact_text()
        .unwrap_or_else(|_| "friend".to_string());
    memory.set_preference("name", name.trim())?;
    Ok(())
}

/// Record for a few seconds and report what the microphone heard
#[allow(clippy::cast_precision_loss)]
fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Recording for {duration}s, say something...");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    std::thread::sleep(Duration::from_secs(duration));
    let samples = capture.take_buffer();
    capture.stop();

    let energy = voice::segment::rms_energy(&samples);
    println!(
        "Captured {} samples ({:.1}s) with RMS energy {energy:.4}",
        samples.len(),
        samples.len() as f64 / f64::from(SAMPLE_RATE),
    );
    if energy < 0.01 {
        println!("That sounded silent. Check your input device.");
    }
    Ok(())
}

/// Play a short tone on the default output device
fn test_speaker() -> anyhow::Result<()> {
    println!("Playing a one-second tone...");

    let samples: Vec<f32> = (0..SAMPLE_RATE)
        .map(|i| {
            let t = f64::from(i) / f64::from(SAMPLE_RATE);
            #[allow(clippy::cast_possible_truncation)]
            let s = (0.3 * (2.0 * std::f64::consts::PI * 440.0 * t).sin()) as f32;
            s
        })
        .collect();

    voice::play_samples(samples, SAMPLE_RATE, &|| false)?;
    println!("Done.");
    Ok(())
}

/// Synthesize and play a test phrase
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    let engine = TtsEngine::new(TtsSettings {
        command: config.tts.command.clone(),
        voice_model: config.require_voice_model()?,
        length_scale: config.tts.length_scale,
        sentence_silence: config.tts.sentence_silence,
        timeout: config.tts.timeout,
    });

    println!("Synthesizing...");
    let wav = match engine.synthesize(text, &config.output_dir, || false).await? {
        voice::Synthesis::Completed(path) => path,
        voice::Synthesis::Cancelled => anyhow::bail!("synthesis cancelled"),
    };

    println!("Playing...");
    voice::play_wav_file(&wav, &|| false)?;
    std::fs::remove_file(&wav).ok();
    println!("Done.");
    Ok(())
}
