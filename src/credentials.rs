//! Gateway API credential references and resolution.
//!
//! `config.toml` names where the API key lives rather than storing it inline:
//! an environment variable, the platform credential store (via the `keyring`
//! crate), an inline literal, or nothing at all. Resolution is late-binding:
//! the engine resolves at startup and again whenever asked, so a key that
//! appears after launch is picked up without a restart.
//!
//! Absence is not an error here. An unset variable or a missing keychain
//! entry resolves to `None` and the engine reports the gateway as
//! unconfigured; only storage-level failures surface as errors.

use serde::{Deserialize, Serialize};

use crate::error::{AtticusError, Result};

/// Environment variable consulted by the default credential reference.
pub const DEFAULT_ENV_VAR: &str = "GEMINI_API_KEY";

/// Keychain service name for Atticus credentials.
pub const KEYCHAIN_SERVICE: &str = "atticus-credentials";

/// Reference to the gateway API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialRef {
    /// Resolve from an environment variable.
    Env {
        var: String,
    },
    /// Resolve from the platform credential store.
    Keychain {
        service: String,
        account: String,
    },
    /// Inline literal key (discouraged; use env/keychain when possible).
    Literal {
        value: String,
    },
    /// No credential; the gateway stays unconfigured.
    None,
}

impl Default for CredentialRef {
    fn default() -> Self {
        Self::Env {
            var: DEFAULT_ENV_VAR.to_owned(),
        }
    }
}

impl CredentialRef {
    /// Reference into the Atticus keychain service for `account`.
    #[must_use]
    pub fn keychain(account: &str) -> Self {
        Self::Keychain {
            service: KEYCHAIN_SERVICE.to_owned(),
            account: account.to_owned(),
        }
    }

    /// Resolve the reference to an API key, if one is available.
    ///
    /// Returns `Ok(None)` when the referenced location exists but holds
    /// nothing: unset or blank environment variable, absent keychain entry,
    /// blank literal, or [`CredentialRef::None`].
    ///
    /// # Errors
    ///
    /// Returns [`AtticusError::Config`] when the credential store itself
    /// cannot be reached.
    pub fn resolve(&self) -> Result<Option<String>> {
        match self {
            Self::None => Ok(None),
            Self::Literal { value } => {
                let value = value.trim();
                if value.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(value.to_owned()))
                }
            }
            Self::Env { var } => match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => Ok(Some(value.trim().to_owned())),
                _ => Ok(None),
            },
            Self::Keychain { service, account } => {
                let entry = keyring::Entry::new(service, account).map_err(|e| {
                    AtticusError::Config(format!("failed to open keyring entry: {e}"))
                })?;
                match entry.get_password() {
                    Ok(password) => Ok(Some(password)),
                    Err(keyring::Error::NoEntry) => Ok(None),
                    Err(e) => Err(AtticusError::Config(format!(
                        "failed to read credential from keyring: {e}"
                    ))),
                }
            }
        }
    }
}

/// Store an API key in the platform credential store.
///
/// Returns the [`CredentialRef::Keychain`] reference to persist in config.
///
/// # Errors
///
/// Returns [`AtticusError::Config`] when the credential store rejects the
/// write.
pub fn store_api_key(account: &str, value: &str) -> Result<CredentialRef> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, account)
        .map_err(|e| AtticusError::Config(format!("failed to open keyring entry: {e}")))?;
    entry
        .set_password(value)
        .map_err(|e| AtticusError::Config(format!("failed to store credential: {e}")))?;
    Ok(CredentialRef::keychain(account))
}
