//! Offline cue-track generator.
//!
//! Writes `<stem>_sync.json` next to an audio file: timed mouth cues derived
//! from word timings, either read from a saved transcription or fetched from
//! the configured transcription server.

use std::path::PathBuf;

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use lipbridge::BridgeConfig;
use lipbridge::collab::{HttpTranscriber, Transcriber};
use lipbridge::transcript::Transcript;
use lipbridge::viseme::CueTrack;
use lipbridge::viseme::track::default_output_path;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Generate a mouth-cue track for a speech recording.
#[derive(Parser)]
#[command(name = "lipbridge-cues", version, about)]
struct Cli {
    /// Audio file the track belongs to.
    audio: PathBuf,

    /// Saved `verbose_json` transcription with word timings. When absent the
    /// audio is sent to the configured transcription server.
    #[arg(short, long)]
    words: Option<PathBuf>,

    /// Output path (default: `<stem>_sync.json` beside the audio).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Model tag recorded in the metadata.
    #[arg(long)]
    model: Option<String>,

    /// Language tag recorded in the metadata and passed to transcription.
    #[arg(long)]
    language: Option<String>,

    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lipbridge=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = BridgeConfig::load(cli.config.as_deref())?;
    if cli.language.is_some() {
        config.stt.language = cli.language.clone();
    }

    let transcript = match &cli.words {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Transcript::from_json(&json)?
        }
        None => {
            let audio = std::fs::read(&cli.audio)
                .with_context(|| format!("reading {}", cli.audio.display()))?;
            let transcriber = HttpTranscriber::new(&config.stt);
            info!(
                file = %cli.audio.display(),
                model = transcriber.model(),
                "transcribing"
            );
            transcriber
                .transcribe(Bytes::from(audio), &file_name(&cli.audio))
                .await?
        }
    };

    let model = cli.model.clone().unwrap_or_else(|| config.stt.model.clone());
    let track = CueTrack::from_transcript(
        &file_name(&cli.audio),
        &transcript,
        &model,
        cli.language.as_deref(),
    );

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.audio));
    track.write_atomic(&output)?;
    println!("{}", output.display());
    Ok(())
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
