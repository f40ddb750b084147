//! Configuration types for the Atticus engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::credentials::CredentialRef;
use crate::error::{AtticusError, Result};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Completion gateway settings.
    pub gateway: GatewayConfig,
    /// Speech playback settings.
    pub audio: AudioConfig,
    /// Persistence settings.
    pub storage: StorageConfig,
}

/// Completion gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the generateContent API family.
    pub api_url: String,
    /// Model used for chat, summarize, and analyze requests.
    pub chat_model: String,
    /// Model used for speech synthesis requests.
    pub tts_model: String,
    /// Prebuilt voice name for speech synthesis.
    pub voice: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// API key reference.
    pub api_key: CredentialRef,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com".to_owned(),
            chat_model: "gemini-2.5-flash".to_owned(),
            tts_model: "gemini-2.5-flash-preview-tts".to_owned(),
            voice: "Kore".to_owned(),
            request_timeout_secs: 60,
            api_key: CredentialRef::default(),
        }
    }
}

/// Speech playback configuration.
///
/// The synthesis endpoint returns 24kHz mono PCM; these fields describe what
/// the playback sink should expect, not a resampling request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Playback sample rate in Hz.
    pub sample_rate: u32,
    /// Number of output channels (1 = mono).
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory override (None = platform default).
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AtticusError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AtticusError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the default config path, or defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error only when a config file exists but cannot be parsed.
    pub fn load_or_default() -> Result<Self> {
        let path = crate::app_dirs::config_file();
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Effective data directory: the `[storage]` override or the platform default.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(crate::app_dirs::data_dir)
    }
}
