//! Transcription output with word-level timing.
//!
//! Accepts both shapes in common use: Whisper's native output (words nested
//! inside each segment) and the OpenAI-compatible `verbose_json` response
//! (words in a top-level array).

use serde::{Deserialize, Serialize};

/// One recognized word and its span in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    /// The word as recognized, possibly with surrounding whitespace or punctuation.
    #[serde(alias = "word")]
    pub text: String,
    /// Start of the word in seconds.
    pub start: f64,
    /// End of the word in seconds.
    pub end: f64,
}

impl WordTiming {
    /// Create a word timing.
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// Span length in seconds (negative for malformed input).
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A transcribed segment (roughly a sentence).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TranscriptSegment {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

/// Full transcription result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    /// Top-level word list (OpenAI `verbose_json` layout).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordTiming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Transcript {
    /// Parse a transcript from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BridgeError::Stt`] if the JSON does not describe a transcript.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::BridgeError::Stt(format!("invalid transcript JSON: {e}")))
    }

    /// All word timings in transcript order.
    ///
    /// Segment-nested words win when present; otherwise the top-level list
    /// is used.
    pub fn words(&self) -> Vec<WordTiming> {
        let nested: Vec<WordTiming> = self
            .segments
            .iter()
            .flat_map(|s| s.words.iter().cloned())
            .collect();
        if nested.is_empty() {
            self.words.clone()
        } else {
            nested
        }
    }

    /// Number of words whose text is non-blank.
    pub fn word_count(&self) -> usize {
        self.words()
            .iter()
            .filter(|w| !w.text.trim().is_empty())
            .count()
    }

    /// End of the last segment, falling back to the reported duration.
    pub fn total_duration(&self) -> f64 {
        self.segments
            .last()
            .map(|s| s.end)
            .or(self.duration)
            .unwrap_or(0.0)
    }
}
