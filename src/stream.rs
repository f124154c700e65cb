//! Paced lip-sync event streaming for one utterance.
//!
//! The utterance is cut into fixed-length chunks; each chunk is wrapped in a
//! WAV container, estimated, and emitted, then the streamer waits one chunk
//! length before the next. The wait keeps events in step with playback:
//! without it the client would receive the whole utterance's mouth track
//! before the first syllable is heard.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::{AudioFrame, encode_wav};
use crate::config::AudioConfig;
use crate::viseme::{VisemeSample, estimate_wav};

/// One event of a lip-sync stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LipSyncEvent {
    /// Mouth parameters for the chunk starting at `timestamp_ms`.
    Frame {
        sample: VisemeSample,
        timestamp_ms: u64,
    },
    /// End of utterance.
    Done,
}

/// Wire form of a [`LipSyncEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipSyncMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: LipSyncData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

/// Payload of a [`LipSyncMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LipSyncData {
    pub open: f32,
    pub form: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl LipSyncEvent {
    /// Convert to the JSON message sent to clients.
    pub fn to_message(&self) -> LipSyncMessage {
        match *self {
            Self::Frame {
                sample,
                timestamp_ms,
            } => LipSyncMessage {
                kind: "lipsync".to_owned(),
                data: LipSyncData {
                    open: sample.open,
                    form: sample.form,
                    timestamp: Some(timestamp_ms),
                },
                done: None,
            },
            Self::Done => LipSyncMessage {
                kind: "lipsync".to_owned(),
                data: LipSyncData {
                    open: 0.0,
                    form: 0.0,
                    timestamp: None,
                },
                done: Some(true),
            },
        }
    }

    /// Serialized JSON text.
    pub fn to_json(&self) -> String {
        // Plain struct of numbers and strings: serialization cannot fail.
        serde_json::to_string(&self.to_message()).unwrap_or_default()
    }
}

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every chunk and the final `Done` were delivered.
    Completed { frames: usize },
    /// The client went away or the session was cancelled; no `Done` was sent.
    Cancelled { frames: usize },
}

/// Chunks, estimates, and paces one utterance.
#[derive(Debug, Clone, Copy)]
pub struct LipSyncStreamer {
    chunk_ms: u32,
    pacing: Duration,
}

impl LipSyncStreamer {
    /// Create a streamer with `chunk_ms` chunks and `pacing` between them.
    pub fn new(chunk_ms: u32, pacing: Duration) -> Self {
        Self {
            chunk_ms: chunk_ms.max(1),
            pacing,
        }
    }

    /// Streamer configured from the `[audio]` config section.
    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(
            config.chunk_ms,
            Duration::from_millis(u64::from(config.pacing_ms)),
        )
    }

    /// Chunk length in milliseconds.
    pub fn chunk_ms(&self) -> u32 {
        self.chunk_ms
    }

    /// Estimate every chunk of `frame` without pacing or a channel.
    pub fn estimate_all(&self, frame: &AudioFrame) -> Vec<LipSyncEvent> {
        frame
            .chunks(self.chunk_ms)
            .map(|chunk| LipSyncEvent::Frame {
                sample: estimate_chunk(&chunk.frame),
                timestamp_ms: chunk.offset_ms,
            })
            .collect()
    }

    /// Stream `frame` into `sink`, pausing between chunks.
    ///
    /// Stops as soon as `cancel` fires or the receiver is dropped.
    pub async fn run(
        &self,
        frame: &AudioFrame,
        sink: &mpsc::Sender<LipSyncEvent>,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let mut frames = 0usize;
        info!(
            duration_ms = frame.duration_ms(),
            chunk_ms = self.chunk_ms,
            "streaming lip-sync"
        );

        let mut chunks = frame.chunks(self.chunk_ms).peekable();
        while let Some(chunk) = chunks.next() {
            if cancel.is_cancelled() {
                return StreamOutcome::Cancelled { frames };
            }

            let event = LipSyncEvent::Frame {
                sample: estimate_chunk(&chunk.frame),
                timestamp_ms: chunk.offset_ms,
            };
            if sink.send(event).await.is_err() {
                debug!(frames, "lip-sync receiver dropped");
                return StreamOutcome::Cancelled { frames };
            }
            frames += 1;

            if chunks.peek().is_some() && !self.pacing.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return StreamOutcome::Cancelled { frames },
                    _ = tokio::time::sleep(self.pacing) => {}
                }
            }
        }

        if cancel.is_cancelled() || sink.send(LipSyncEvent::Done).await.is_err() {
            return StreamOutcome::Cancelled { frames };
        }
        info!(frames, "lip-sync stream finished");
        StreamOutcome::Completed { frames }
    }
}

impl Default for LipSyncStreamer {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

/// Chunks travel as WAV containers; anything that goes wrong on the way is
/// a closed mouth, never an error.
fn estimate_chunk(frame: &AudioFrame) -> VisemeSample {
    match encode_wav(frame) {
        Ok(wav) => estimate_wav(&wav),
        Err(e) => {
            warn!(error = %e, "failed to wrap lip-sync chunk, closing mouth");
            VisemeSample::CLOSED
        }
    }
}
