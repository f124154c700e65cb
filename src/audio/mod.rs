//! PCM audio frames and format normalization.
//!
//! Everything downstream of the TTS engine works on [`AudioFrame`]: mono
//! samples normalized to `[-1.0, 1.0]` at a known sample rate.

pub mod decode;

pub use decode::{decode_and_normalize, decode_wav, encode_wav, resample_linear};

/// Sample rate used by the online lip-sync path.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// A mono PCM frame with samples normalized to `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Normalized mono samples.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// One slice of a longer frame, tagged with where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Start of this chunk relative to the start of the utterance.
    pub offset_ms: u64,
    /// The chunk's samples.
    pub frame: AudioFrame,
}

impl AudioFrame {
    /// Create a frame from normalized samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// An empty frame at `sample_rate`.
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    /// Whether the frame holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Duration in milliseconds (truncated).
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / u64::from(self.sample_rate)
    }

    /// Split into consecutive chunks of `chunk_ms` milliseconds.
    ///
    /// Every sample lands in exactly one chunk; the last chunk may be
    /// shorter. An empty frame yields no chunks.
    pub fn chunks(&self, chunk_ms: u32) -> impl Iterator<Item = AudioChunk> + '_ {
        let chunk_ms = chunk_ms.max(1);
        let per_chunk =
            ((u64::from(self.sample_rate) * u64::from(chunk_ms)) / 1000).max(1) as usize;
        self.samples
            .chunks(per_chunk)
            .enumerate()
            .map(move |(i, slice)| AudioChunk {
                offset_ms: i as u64 * u64::from(chunk_ms),
                frame: AudioFrame::new(slice.to_vec(), self.sample_rate),
            })
    }
}
