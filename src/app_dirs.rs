//! Centralized application directory paths for Atticus.
//!
//! Provides a single source of truth for all filesystem paths used by the
//! engine. Uses the [`dirs`] crate for platform-appropriate directory
//! resolution, which is sandbox-transparent on macOS (returns
//! container-relative paths under App Sandbox automatically).
//!
//! # Directory Layout
//!
//! | Purpose | macOS (sandbox) | Linux |
//! |---------|----------------|-------|
//! | App data | `~/Library/Application Support/atticus/` | `~/.local/share/atticus/` |
//! | Config | `~/Library/Application Support/atticus/` | `~/.config/atticus/` |
//!
//! # Environment Overrides
//!
//! All paths can be overridden for testing or custom deployments:
//! - `ATTICUS_DATA_DIR` — overrides [`data_dir`]
//! - `ATTICUS_CONFIG_DIR` — overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Used for persistent user data: the document vault record and the
/// conversation history.
///
/// Resolves to `dirs::data_dir()/atticus/` by default. Override with
/// the `ATTICUS_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ATTICUS_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("atticus"))
        .unwrap_or_else(|| PathBuf::from("/tmp/atticus-data"))
}

/// Application config directory.
///
/// Used for `config.toml` and other configuration files.
///
/// Resolves to `dirs::config_dir()/atticus/` by default. Override with
/// the `ATTICUS_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ATTICUS_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("atticus"))
        .unwrap_or_else(|| PathBuf::from("/tmp/atticus-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
