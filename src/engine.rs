//! Engine assembly: configuration, credential state, and component wiring.
//!
//! [`Engine::start`] builds the whole orchestrator from an [`AppConfig`]
//! plus the two host capabilities (audio output, speech recognition) and
//! loads persisted state. Everything else is reached through accessors.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::audio::{AudioSink, PlaybackController};
use crate::config::AppConfig;
use crate::dictation::{DictationController, SpeechRecognizer};
use crate::error::Result;
use crate::gateway::{CompletionGateway, GeminiGateway};
use crate::session::SessionCoordinator;
use crate::store::{JsonStateStore, StateStore};
use crate::vault::DocumentVault;

/// Emitted whenever credential availability flips.
///
/// Hosts gate every request-issuing affordance on this one boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfiguredChanged {
    /// Whether a credential is now available.
    pub configured: bool,
}

/// The assembled orchestrator.
pub struct Engine {
    config: AppConfig,
    gateway: Arc<GeminiGateway>,
    coordinator: SessionCoordinator,
    vault: DocumentVault,
    playback: PlaybackController,
    dictation: Arc<DictationController>,
    configured_tx: broadcast::Sender<ConfiguredChanged>,
}

impl Engine {
    /// Build the engine and load persisted state.
    ///
    /// A missing credential is not an error; the engine starts unconfigured
    /// and reports availability through [`Engine::subscribe_configured`]
    /// once a key arrives. Unreadable state records are logged and skipped
    /// so a damaged file never blocks startup.
    pub async fn start(
        config: AppConfig,
        sink: Arc<dyn AudioSink>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Result<Self> {
        let api_key = match config.gateway.api_key.resolve() {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "credential resolution failed; starting unconfigured");
                None
            }
        };

        let gateway = Arc::new(GeminiGateway::new(config.gateway.clone()));
        gateway.set_api_key(api_key);

        let store: Arc<dyn StateStore> = Arc::new(JsonStateStore::new(config.data_dir())?);
        let dictation = Arc::new(DictationController::new(recognizer));

        let coordinator =
            SessionCoordinator::new(gateway.clone(), store.clone(), dictation.clone());
        if let Err(e) = coordinator.load().await {
            warn!(error = %e, "failed to load session history; starting empty");
        }

        let vault = DocumentVault::new(gateway.clone(), store.clone());
        if let Err(e) = vault.load().await {
            warn!(error = %e, "failed to load document record; starting empty");
        }

        let playback = PlaybackController::new(gateway.clone(), sink, config.audio.clone());
        let (configured_tx, _) = broadcast::channel(8);

        info!(
            chat_model = %config.gateway.chat_model,
            tts_model = %config.gateway.tts_model,
            configured = gateway.is_configured(),
            "engine started"
        );

        Ok(Self {
            config,
            gateway,
            coordinator,
            vault,
            playback,
            dictation,
            configured_tx,
        })
    }

    // ── Credential state ─────────────────────────────────────────────────────

    /// Whether a credential is loaded and requests can be issued.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.gateway.is_configured()
    }

    /// Subscribe to credential availability transitions.
    #[must_use]
    pub fn subscribe_configured(&self) -> broadcast::Receiver<ConfiguredChanged> {
        self.configured_tx.subscribe()
    }

    /// Re-resolve the configured credential reference.
    ///
    /// Returns the resulting availability. Resolution errors are logged and
    /// treated as "no credential".
    pub fn refresh_credentials(&self) -> bool {
        let resolved = match self.config.gateway.api_key.resolve() {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "credential resolution failed");
                None
            }
        };
        self.apply_api_key(resolved)
    }

    /// Install or clear the API key directly, for hosts that obtain one at
    /// runtime.
    pub fn set_api_key(&self, value: Option<String>) -> bool {
        self.apply_api_key(value)
    }

    fn apply_api_key(&self, value: Option<String>) -> bool {
        let was = self.gateway.is_configured();
        self.gateway.set_api_key(value);
        let now = self.gateway.is_configured();
        if now != was {
            info!(configured = now, "credential availability changed");
            // No subscribers is not an error.
            let _ = self.configured_tx.send(ConfiguredChanged { configured: now });
        }
        now
    }

    // ── Components ───────────────────────────────────────────────────────────

    /// The conversation coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    /// The document vault.
    #[must_use]
    pub fn vault(&self) -> &DocumentVault {
        &self.vault
    }

    /// The audio playback controller.
    #[must_use]
    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    /// The dictation controller.
    #[must_use]
    pub fn dictation(&self) -> &DictationController {
        &self.dictation
    }

    /// The configuration the engine was started with.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
