//! lipbridge: chat-to-avatar voice bridge with audio-driven lip-sync.
//!
//! A chat client sends text, the bridge asks a language model for a reply,
//! speaks it through a synthesis engine, and tells the avatar how to move
//! its mouth while the audio plays.
//!
//! # Architecture
//!
//! - **Audio**: decodes compressed speech to mono 16-bit-range PCM via `symphonia`
//! - **Viseme**: energy estimator for live playback, phoneme estimator for
//!   transcribed recordings
//! - **Stream**: paced per-chunk lip-sync events for one utterance
//! - **Collaborators**: HTTP adapters for the model, synthesis, and transcription
//! - **Store**: SQLite chat history; **Tickets**: short-lived parked audio
//! - **Server**: `axum` HTTP and WebSocket front end

pub mod app_dirs;
pub mod audio;
pub mod collab;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod stream;
pub mod ticket;
pub mod transcript;
pub mod viseme;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use server::{AppState, BridgeServer};
pub use stream::{LipSyncEvent, LipSyncStreamer};
pub use viseme::{MouthCue, Viseme, VisemeSample};
