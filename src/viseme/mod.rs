//! Viseme estimation for avatar lip-sync.
//!
//! A viseme is a visual mouth shape that corresponds to a speech sound. Two
//! estimators answer different latency/accuracy tradeoffs:
//!
//! - [`energy`]: per audio frame, loudness → mouth openness. Streaming.
//! - [`phoneme`]: per transcribed word, letters → timed viseme cues. Batch.
//!
//! [`estimate`] picks one by what the caller has at hand.

pub mod energy;
pub mod phoneme;
pub mod track;

use serde::{Deserialize, Serialize};

use crate::audio::AudioFrame;
use crate::transcript::WordTiming;

pub use energy::{estimate_frame, estimate_wav};
pub use phoneme::estimate_cues;
pub use track::{CueMetadata, CueTrack};

/// Viseme tags of the cue alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Viseme {
    /// Open jaw, /a/.
    A,
    /// Mid spread, /e/ /i/.
    E,
    /// Narrow spread, /ɨ/.
    I,
    /// Rounded, /o/ /u/.
    O,
    /// Tight rounded, /ju/.
    U,
    /// Lips pressed together.
    Bmp,
    /// Teeth on lower lip.
    Fv,
    /// Teeth together, tongue forward.
    S,
    /// Lips pushed out, postalveolar fricative.
    Sh,
    /// Postalveolar affricate.
    Ch,
    /// Tongue on alveolar ridge.
    D,
    N,
    L,
    R,
    /// Back of tongue raised.
    G,
    K,
    /// Neutral / unmapped.
    X,
}

impl Viseme {
    /// Whether the tag belongs to the vowel family (weighted double in time).
    pub fn is_vowel(self) -> bool {
        matches!(self, Self::A | Self::E | Self::I | Self::O | Self::U)
    }

    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::E => "E",
            Self::I => "I",
            Self::O => "O",
            Self::U => "U",
            Self::Bmp => "BMP",
            Self::Fv => "FV",
            Self::S => "S",
            Self::Sh => "SH",
            Self::Ch => "CH",
            Self::D => "D",
            Self::N => "N",
            Self::L => "L",
            Self::R => "R",
            Self::G => "G",
            Self::K => "K",
            Self::X => "X",
        }
    }
}

impl std::fmt::Display for Viseme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mouth parameters for one audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisemeSample {
    /// Jaw openness in `[0, 1]`.
    pub open: f32,
    /// Mouth shape in `[0, 1]`, derived from `open`.
    pub form: f32,
}

impl VisemeSample {
    /// Closed mouth; the answer for silence and for every failure.
    pub const CLOSED: Self = Self {
        open: 0.0,
        form: 0.0,
    };

    /// Whether both values are exactly zero.
    pub fn is_closed(&self) -> bool {
        self.open == 0.0 && self.form == 0.0
    }
}

/// A viseme held over `[start, end)` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    pub start: f64,
    pub end: f64,
    pub value: Viseme,
}

impl MouthCue {
    /// Cue length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// What the caller has to estimate from.
#[derive(Debug, Clone, Copy)]
pub enum VisemeSource<'a> {
    /// A decoded audio frame (streaming playback).
    Frame(&'a AudioFrame),
    /// A WAV container holding one chunk (streaming transport).
    Wav(&'a [u8]),
    /// Word timings for a whole utterance (batch).
    Words(&'a [WordTiming]),
}

/// Result of [`estimate`], matching the source kind.
#[derive(Debug, Clone, PartialEq)]
pub enum VisemeEstimate {
    Sample(VisemeSample),
    Cues(Vec<MouthCue>),
}

/// Estimate visemes with the strategy that fits `source`.
///
/// Audio goes through the energy estimator, word timings through the
/// phoneme estimator. Neither path can fail.
pub fn estimate(source: VisemeSource<'_>) -> VisemeEstimate {
    match source {
        VisemeSource::Frame(frame) => VisemeEstimate::Sample(estimate_frame(frame)),
        VisemeSource::Wav(bytes) => VisemeEstimate::Sample(estimate_wav(bytes)),
        VisemeSource::Words(words) => VisemeEstimate::Cues(estimate_cues(words)),
    }
}

/// Round to three decimals.
pub(crate) fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn only_five_tags_are_vowels() {
        let vowels = [Viseme::A, Viseme::E, Viseme::I, Viseme::O, Viseme::U];
        for v in vowels {
            assert!(v.is_vowel());
        }
        for v in [Viseme::Bmp, Viseme::Sh, Viseme::K, Viseme::X] {
            assert!(!v.is_vowel());
        }
    }

    #[test]
    fn tags_serialize_as_wire_names() {
        for v in [Viseme::Bmp, Viseme::Fv, Viseme::Sh, Viseme::Ch, Viseme::A, Viseme::X] {
            let json = serde_json::to_string(&v).unwrap();
            assert_eq!(json, format!("\"{}\"", v.as_str()));
            let back: Viseme = serde_json::from_str(&json).unwrap();
            assert_eq!(back, v);
        }
    }

    #[test]
    fn estimate_dispatches_by_source() {
        let silent = AudioFrame::new(vec![0.0; 100], 44_100);
        assert_eq!(
            estimate(VisemeSource::Frame(&silent)),
            VisemeEstimate::Sample(VisemeSample::CLOSED)
        );
        assert_eq!(
            estimate(VisemeSource::Wav(b"garbage")),
            VisemeEstimate::Sample(VisemeSample::CLOSED)
        );

        let words = [WordTiming::new("да", 0.0, 0.3)];
        match estimate(VisemeSource::Words(&words)) {
            VisemeEstimate::Cues(cues) => assert_eq!(cues.len(), 2),
            other => panic!("expected cues, got {other:?}"),
        }
    }

    #[test]
    fn round3_keeps_three_decimals() {
        assert_eq!(round3(1.0 / 6.0), 0.167);
        assert_eq!(round3(2.0 / 3.0), 0.667);
        assert_eq!(round3(2.0), 2.0);
    }
}
