//! Error types for the lip-sync bridge.

/// Top-level error type for the bridge.
///
/// The viseme estimators never return this type: the energy estimator is a
/// total function and the phoneme estimator cannot fail. Everything around
/// them (decoding, collaborators, storage) reports through here.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Compressed or container audio could not be turned into PCM.
    #[error("decode error: {0}")]
    Decode(String),

    /// Audio encoding error (writing WAV containers).
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text collaborator error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Language model collaborator error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech collaborator error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Chat transcript storage error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Cue-track serialization error.
    #[error("cue track error: {0}")]
    Track(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BridgeError>;
