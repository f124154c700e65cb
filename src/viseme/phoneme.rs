//! Letter-based viseme cues from word timings.
//!
//! Each Cyrillic letter maps to one viseme tag through a fixed table; a
//! word's time span is then shared among its tags, vowels taking twice the
//! time of consonants.

use tracing::debug;

use super::{MouthCue, Viseme, round3};
use crate::transcript::WordTiming;

/// Time weight of a vowel-family tag relative to a consonant.
const VOWEL_WEIGHT: u32 = 2;
const CONSONANT_WEIGHT: u32 = 1;

/// Map one uppercase letter to its viseme. Total: anything unmapped is `X`.
pub fn viseme_for_char(c: char) -> Viseme {
    match c {
        'А' | 'Я' => Viseme::A,
        'О' | 'У' | 'Ё' => Viseme::O,
        'Ы' => Viseme::I,
        'Э' | 'И' | 'Е' | 'Й' | 'Ь' => Viseme::E,
        'Ю' => Viseme::U,
        'Б' | 'П' | 'М' => Viseme::Bmp,
        'Ф' | 'В' => Viseme::Fv,
        'С' | 'З' => Viseme::S,
        'Ш' | 'Ж' | 'Щ' => Viseme::Sh,
        'Ч' => Viseme::Ch,
        'Т' | 'Д' => Viseme::D,
        'Н' => Viseme::N,
        'Л' => Viseme::L,
        'Р' => Viseme::R,
        'Г' => Viseme::G,
        'К' => Viseme::K,
        _ => Viseme::X,
    }
}

/// Viseme sequence for a word.
///
/// Non-letters are dropped and the rest uppercased. A word with no mapped
/// letter (nothing left, or only `X` tags) collapses to a single `X` so it
/// occupies its time span with one cue.
pub fn word_to_visemes(word: &str) -> Vec<Viseme> {
    let visemes: Vec<Viseme> = word
        .chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_alphabetic())
        .map(viseme_for_char)
        .collect();
    if visemes.iter().all(|&v| v == Viseme::X) {
        vec![Viseme::X]
    } else {
        visemes
    }
}

/// Share `[start, end)` among `visemes` and return one cue per tag.
///
/// Vowel-family tags get two time units, the rest one. Cue boundaries are
/// rounded to milliseconds from an unrounded cursor, so consecutive cues
/// meet exactly and the last ends at `end`. A non-positive span yields no
/// cues.
pub fn distribute_durations(start: f64, end: f64, visemes: &[Viseme]) -> Vec<MouthCue> {
    let duration = end - start;
    if !(duration > 0.0) || visemes.is_empty() {
        return Vec::new();
    }

    let vowels = visemes.iter().filter(|v| v.is_vowel()).count() as u32;
    let consonants = visemes.len() as u32 - vowels;
    let total_weight = (vowels * VOWEL_WEIGHT + consonants * CONSONANT_WEIGHT).max(1);
    let unit = duration / f64::from(total_weight);

    let mut cues: Vec<MouthCue> = Vec::with_capacity(visemes.len());
    let mut cursor = start;
    for &viseme in visemes {
        let weight = if viseme.is_vowel() {
            VOWEL_WEIGHT
        } else {
            CONSONANT_WEIGHT
        };
        let span = unit * f64::from(weight);
        cues.push(MouthCue {
            start: round3(cursor),
            end: round3(cursor + span),
            value: viseme,
        });
        cursor += span;
    }
    cues
}

/// Timed cues for a sequence of words.
///
/// Words arrive in transcript order and are not re-sorted. Blank words are
/// skipped; words with a non-positive span contribute nothing.
pub fn estimate_cues(words: &[WordTiming]) -> Vec<MouthCue> {
    let mut cues = Vec::new();
    for word in words {
        let text = word.text.trim();
        if text.is_empty() {
            continue;
        }
        let visemes = word_to_visemes(text);
        let word_cues = distribute_durations(word.start, word.end, &visemes);
        if word_cues.is_empty() {
            debug!(word = text, start = word.start, end = word.end, "skipping zero-length word");
        }
        cues.extend(word_cues);
    }
    cues
}
