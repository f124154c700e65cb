//! Cue-track documents: timed mouth cues plus accounting metadata.
//!
//! The on-disk layout is the one avatar players read:
//!
//! ```json
//! {
//!   "metadata": {"soundFile": "reply.wav", "duration": 1.8, "model": "whisper-medium",
//!                "language": "ru", "wordCount": 2, "phonemeCount": 8},
//!   "mouthCues": [{"start": 0.0, "end": 0.167, "value": "BMP"}]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{MouthCue, estimate_cues, round3};
use crate::error::{BridgeError, Result};
use crate::transcript::Transcript;

/// Accounting fields written alongside the cues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CueMetadata {
    pub sound_file: String,
    /// End of the last transcribed segment, in seconds.
    pub duration: f64,
    pub model: String,
    pub language: String,
    pub word_count: usize,
    /// Number of emitted cues.
    pub phoneme_count: usize,
}

/// A complete cue track for one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueTrack {
    pub metadata: CueMetadata,
    #[serde(rename = "mouthCues")]
    pub mouth_cues: Vec<MouthCue>,
}

impl CueTrack {
    /// Build a track from a transcript.
    ///
    /// `language` falls back to the transcript's detected language when the
    /// caller passes `None`, and to `"unknown"` after that.
    pub fn from_transcript(
        sound_file: &str,
        transcript: &Transcript,
        model: &str,
        language: Option<&str>,
    ) -> Self {
        let mouth_cues = estimate_cues(&transcript.words());
        let language = language
            .map(str::to_owned)
            .or_else(|| transcript.language.clone())
            .unwrap_or_else(|| "unknown".to_owned());

        Self {
            metadata: CueMetadata {
                sound_file: sound_file.to_owned(),
                duration: round3(transcript.total_duration()),
                model: model.to_owned(),
                language,
                word_count: transcript.word_count(),
                phoneme_count: mouth_cues.len(),
            },
            mouth_cues,
        }
    }

    /// Pretty-printed JSON (non-ASCII kept as-is).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Track`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BridgeError::Track(format!("failed to encode cue track: {e}")))
    }

    /// Read a track written by [`write_atomic`](Self::write_atomic).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a cue track.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| BridgeError::Track(format!("invalid cue track {}: {e}", path.display())))
    }

    /// Write the track so that `path` either holds the whole document or is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = tmp_path_for(path);
        if let Err(e) = std::fs::write(&tmp, json) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            path = %path.display(),
            cues = self.mouth_cues.len(),
            words = self.metadata.word_count,
            "wrote cue track"
        );
        Ok(())
    }
}

/// `<dir>/<stem>_sync.json` beside the audio file.
pub fn default_output_path(audio_path: &Path) -> PathBuf {
    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_owned());
    audio_path.with_file_name(format!("{stem}_sync.json"))
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track.json".to_owned());
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}
