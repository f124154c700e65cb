//! Centralized application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Environment Overrides
//!
//! - `LIPBRIDGE_DATA_DIR`: overrides [`data_dir`]
//! - `LIPBRIDGE_CONFIG_DIR`: overrides [`config_dir`]
//! - `LIPBRIDGE_CACHE_DIR`: overrides [`cache_dir`]

use std::path::PathBuf;

/// Application data root directory (chat database).
///
/// Resolves to `dirs::data_dir()/lipbridge/` by default.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LIPBRIDGE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("lipbridge"))
        .unwrap_or_else(|| PathBuf::from("/tmp/lipbridge-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LIPBRIDGE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("lipbridge"))
        .unwrap_or_else(|| PathBuf::from("/tmp/lipbridge-config"))
}

/// Application cache directory.
///
/// Temporary synthesized audio referenced by tickets lives under here.
#[must_use]
pub fn cache_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LIPBRIDGE_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::cache_dir()
        .map(|d| d.join("lipbridge"))
        .unwrap_or_else(|| PathBuf::from("/tmp/lipbridge-cache"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Chat database path (`data_dir()/chats.db`).
#[must_use]
pub fn chat_db_file() -> PathBuf {
    data_dir().join("chats.db")
}

/// Ticketed audio directory (`cache_dir()/audio/`).
#[must_use]
pub fn audio_cache_dir() -> PathBuf {
    cache_dir().join("audio")
}
