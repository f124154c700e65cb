//! Configuration types for the lip-sync bridge.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP/WebSocket listener settings.
    pub server: ServerConfig,
    /// PCM normalization and lip-sync chunking.
    pub audio: AudioConfig,
    /// Language model collaborator.
    pub llm: LlmConfig,
    /// Text-to-speech collaborator.
    pub tts: TtsConfig,
    /// Speech-to-text collaborator.
    pub stt: SttConfig,
    /// Chat transcript storage.
    pub store: StoreConfig,
    /// Temporary audio tickets.
    pub tickets: TicketConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port (0 = auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        }
    }
}

/// Audio normalization and streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target PCM sample rate in Hz for estimation.
    pub sample_rate: u32,
    /// Length of one lip-sync chunk in milliseconds.
    pub chunk_ms: u32,
    /// Delay between streamed chunks in milliseconds.
    ///
    /// Matches `chunk_ms` so events arrive at playback cadence. Set to 0 only
    /// for batch consumers that do their own scheduling.
    pub pacing_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::audio::TARGET_SAMPLE_RATE,
            chunk_ms: 100,
            pacing_ms: 100,
        }
    }
}

/// Language model configuration (Ollama chat API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_owned(),
            model: "mistral".to_owned(),
            timeout_secs: 120,
        }
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Synthesis endpoint accepting `{"text", "voice"}` and returning audio bytes.
    pub endpoint: String,
    /// Voice identifier passed to the engine.
    pub voice: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5050/synthesize".to_owned(),
            voice: "ru-RU-DariyaNeural".to_owned(),
            timeout_secs: 60,
        }
    }
}

/// Speech-to-text configuration (OpenAI-compatible transcription API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Base URL including `/v1`.
    pub base_url: String,
    /// Model name sent with each request and recorded in cue-track metadata.
    pub model: String,
    /// Language hint (ISO 639-1).
    pub language: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/v1".to_owned(),
            model: "whisper-medium".to_owned(),
            language: Some("ru".to_owned()),
            timeout_secs: 300,
        }
    }
}

/// Chat store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path.
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: crate::app_dirs::chat_db_file(),
        }
    }
}

/// Audio ticket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketConfig {
    /// Directory holding ticketed audio files.
    pub dir: PathBuf,
    /// Seconds a ticket stays redeemable.
    pub ttl_secs: u64,
    /// Seconds between expiry sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            dir: crate::app_dirs::audio_cache_dir(),
            ttl_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::BridgeError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::BridgeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/lipbridge/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }

    /// Load from `path` if given, else from the default path when it exists,
    /// else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: Option<&std::path::Path>) -> crate::error::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_matches_online_path() {
        let config = BridgeConfig::default();
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.chunk_ms, 100);
        assert_eq!(config.audio.pacing_ms, config.audio.chunk_ms);
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.tts.voice, "ru-RU-DariyaNeural");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = BridgeConfig::default();
        config.server.port = 9123;
        config.audio.chunk_ms = 40;
        config.stt.language = None;
        config.save_to_file(&path).unwrap();

        let loaded = BridgeConfig::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 9123);
        assert_eq!(loaded.audio.chunk_ms, 40);
        assert!(loaded.stt.language.is_none());
    }

    #[test]
    fn partial_file_uses_defaults_for_missing_fields() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [audio]
            chunk_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.chunk_ms, 50);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = BridgeConfig::from_file(std::path::Path::new("/nonexistent/lipbridge.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is [not valid").unwrap();
        let err = BridgeConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, crate::error::BridgeError::Config(_)));
    }

    #[test]
    fn load_with_explicit_path_reads_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "[server]\nport = 1234\n").unwrap();
        let config = BridgeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 1234);
    }
}
