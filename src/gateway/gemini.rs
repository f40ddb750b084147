//! Gemini generateContent API adapter.
//!
//! One endpoint family serves every request mode:
//! `POST {base}/v1beta/models/{model}:generateContent` with the API key in
//! the `x-goog-api-key` header.
//!
//! - Chat turns carry a `systemInstruction` and, when grounding is on, the
//!   `google_search` tool.
//! - Document requests inline the payload as base64 `inlineData`.
//! - Speech requests switch to the TTS model, ask for the `AUDIO` response
//!   modality with a prebuilt voice, and read raw PCM16 bytes back out of
//!   the response's `inlineData`.
//!
//! Grounding chunks are parsed from
//! `candidates[*].groundingMetadata.groundingChunks[*].web` and handed to
//! the citation normalizer untouched.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;

use crate::config::GatewayConfig;
use crate::error::{AtticusError, Result};
use crate::gateway::{
    CompletionGateway, CompletionRequest, CompletionResponse, ContentPart, GroundingChunk,
    RequestKind,
};

// ── Request Building ───────────────────────────────────────────

/// Build a generateContent request body.
///
/// `voice` is only consulted for speech requests.
pub fn build_generate_request(request: &CompletionRequest, voice: &str) -> serde_json::Value {
    let parts: Vec<serde_json::Value> = request.parts.iter().map(part_to_json).collect();

    let mut body = serde_json::json!({
        "contents": [{"role": "user", "parts": parts}],
    });

    if !request.persona.is_empty() {
        body["systemInstruction"] = serde_json::json!({"parts": [{"text": request.persona}]});
    }

    if request.grounded_search {
        body["tools"] = serde_json::json!([{"google_search": {}}]);
    }

    if request.kind == RequestKind::Speak {
        body["generationConfig"] = serde_json::json!({
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": voice}}
            }
        });
    }

    body
}

fn part_to_json(part: &ContentPart) -> serde_json::Value {
    match part {
        ContentPart::Text(text) => serde_json::json!({"text": text}),
        ContentPart::Inline { media_type, data } => serde_json::json!({
            "inlineData": {
                "mimeType": media_type,
                "data": BASE64_STANDARD.encode(data),
            }
        }),
    }
}

// ── Response Parsing ───────────────────────────────────────────

/// Concatenate the text of all response parts.
pub fn extract_text(root: &serde_json::Value) -> String {
    let mut collected: Vec<String> = Vec::new();
    if let Some(candidates) = root.get("candidates").and_then(|c| c.as_array()) {
        for candidate in candidates {
            let Some(parts) = candidate.pointer("/content/parts").and_then(|p| p.as_array())
            else {
                continue;
            };
            for part in parts {
                if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        collected.push(trimmed.to_owned());
                    }
                }
            }
        }
    }
    collected.join("\n\n")
}

/// Grounding chunks in wire order.
///
/// No deduplication here; the citation normalizer owns that.
pub fn extract_grounding(root: &serde_json::Value) -> Vec<GroundingChunk> {
    let mut chunks = Vec::new();
    let Some(candidates) = root.get("candidates").and_then(|c| c.as_array()) else {
        return chunks;
    };
    for candidate in candidates {
        let Some(raw) = candidate
            .pointer("/groundingMetadata/groundingChunks")
            .and_then(|c| c.as_array())
        else {
            continue;
        };
        for chunk in raw {
            let Some(web) = chunk.get("web") else {
                continue;
            };
            chunks.push(GroundingChunk {
                uri: web.get("uri").and_then(|v| v.as_str()).map(str::to_owned),
                title: web.get("title").and_then(|v| v.as_str()).map(str::to_owned),
            });
        }
    }
    chunks
}

/// First inline audio payload in the response, base64-decoded.
pub fn extract_audio(root: &serde_json::Value) -> Option<Bytes> {
    let candidates = root.get("candidates")?.as_array()?;
    for candidate in candidates {
        let Some(parts) = candidate.pointer("/content/parts").and_then(|p| p.as_array()) else {
            continue;
        };
        for part in parts {
            if let Some(data) = part.pointer("/inlineData/data").and_then(|d| d.as_str())
                && let Ok(bytes) = BASE64_STANDARD.decode(data)
            {
                return Some(Bytes::from(bytes));
            }
        }
    }
    None
}

// ── Error Mapping ──────────────────────────────────────────────

/// Map a non-success HTTP response to a request failure.
pub fn map_http_error(status: reqwest::StatusCode, body: &str) -> AtticusError {
    AtticusError::RequestFailed(format!("HTTP {status}: {}", extract_error_message(body)))
}

/// Extract a human-readable message from a Gemini error response.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_owned()
            } else {
                body.chars().take(500).collect()
            }
        })
}

// ── Adapter ────────────────────────────────────────────────────

/// Gateway backed by the Gemini generateContent API.
///
/// The credential slot is interior-mutable so the engine can load a key that
/// appears after startup without rebuilding the gateway.
pub struct GeminiGateway {
    config: GatewayConfig,
    api_key: RwLock<Option<String>>,
    client: reqwest::Client,
}

impl GeminiGateway {
    /// Create a gateway with no credential loaded.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            api_key: RwLock::new(None),
            client: reqwest::Client::new(),
        }
    }

    /// Create a gateway with a credential already loaded.
    #[must_use]
    pub fn with_api_key(config: GatewayConfig, api_key: impl Into<String>) -> Self {
        let gateway = Self::new(config);
        gateway.set_api_key(Some(api_key.into()));
        gateway
    }

    /// Load or clear the credential. Blank keys count as absent.
    pub fn set_api_key(&self, api_key: Option<String>) {
        if let Ok(mut slot) = self.api_key.write() {
            *slot = api_key.filter(|k| !k.trim().is_empty());
        }
    }

    /// Returns a reference to the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn current_key(&self) -> Option<String> {
        self.api_key.read().ok().and_then(|slot| slot.clone())
    }

    fn model_for(&self, kind: RequestKind) -> &str {
        match kind {
            RequestKind::Speak => &self.config.tts_model,
            RequestKind::Chat | RequestKind::Summarize | RequestKind::Analyze => {
                &self.config.chat_model
            }
        }
    }
}

#[async_trait]
impl CompletionGateway for GeminiGateway {
    fn is_configured(&self) -> bool {
        self.api_key.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let Some(api_key) = self.current_key() else {
            return Err(AtticusError::NotConfigured);
        };

        let model = self.model_for(request.kind);
        let url = format!(
            "{}/v1beta/models/{model}:generateContent",
            self.config.api_url
        );
        let body = build_generate_request(&request, &self.config.voice);

        tracing::debug!(model, kind = ?request.kind, "sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &api_key)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "gateway request failed");
                AtticusError::RequestFailed(format!("connection error: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read body".into());
            tracing::error!(status = %status, body = %body, "gateway request returned error");
            return Err(map_http_error(status, &body));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AtticusError::RequestFailed(format!("failed to parse response: {e}")))?;

        Ok(CompletionResponse {
            text: extract_text(&payload),
            grounding: extract_grounding(&payload),
            audio: extract_audio(&payload),
        })
    }
}
