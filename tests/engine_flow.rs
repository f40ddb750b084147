//! End-to-end engine flow tests.
//!
//! These run the assembled engine against a mock Gemini backend and a real
//! on-disk state directory: conversation turns, document actions, credential
//! arrival, playback, and restart behaviour.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use atticus::audio::{AudioSink, PcmBuffer, PlaybackOutcome};
use atticus::config::{GatewayConfig, StorageConfig};
use atticus::dictation::SpeechRecognizer;
use atticus::error::AtticusError;
use atticus::session::TurnOutcome;
use atticus::vault::{ActionOutcome, FileInput};
use atticus::{AppConfig, CredentialRef, Engine};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";
const TTS_PATH: &str = "/v1beta/models/gemini-2.5-flash-preview-tts:generateContent";

struct CountingSink {
    plays: AtomicUsize,
    stops: AtomicUsize,
}

impl CountingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            plays: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }
}

impl AudioSink for CountingSink {
    fn play(&self, _buffer: PcmBuffer, done: Box<dyn FnOnce() + Send>) {
        self.plays.fetch_add(1, Ordering::SeqCst);
        // Hold playback open until an explicit stop.
        drop(done);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct NullRecognizer;

impl SpeechRecognizer for NullRecognizer {
    fn start(&self) -> atticus::Result<()> {
        Ok(())
    }

    fn stop(&self) {}
}

fn engine_config(server: &MockServer, dir: &TempDir, api_key: CredentialRef) -> AppConfig {
    AppConfig {
        gateway: GatewayConfig {
            api_url: server.uri(),
            api_key,
            ..GatewayConfig::default()
        },
        storage: StorageConfig {
            data_dir: Some(dir.path().to_path_buf()),
        },
        ..AppConfig::default()
    }
}

async fn start_engine(config: AppConfig) -> (Engine, Arc<CountingSink>) {
    let sink = CountingSink::new();
    let engine = Engine::start(config, sink.clone(), Arc::new(NullRecognizer))
        .await
        .expect("engine start");
    (engine, sink)
}

fn literal_key() -> CredentialRef {
    CredentialRef::Literal {
        value: "test-key".to_owned(),
    }
}

fn text_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"parts": [{"text": text}]}
        }]
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Conversation and persistence
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn turn_history_survives_engine_restart() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("temp dir");

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(text_reply("Six years from accrual, in most cases.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _sink) = start_engine(engine_config(&server, &dir, literal_key())).await;
    let outcome = engine
        .coordinator()
        .submit_turn("What is the limitation period for contract claims?", None)
        .await
        .expect("turn");
    assert_eq!(outcome, TurnOutcome::Completed);

    let sessions = engine.coordinator().sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].title, "What is the limitation period for contra…");
    let session_id = sessions[0].id.clone();
    drop(engine);

    // A fresh engine over the same directory sees the stored conversation.
    let (engine, _sink) = start_engine(engine_config(&server, &dir, literal_key())).await;
    let sessions = engine.coordinator().sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, session_id);

    engine
        .coordinator()
        .load_session(&session_id)
        .expect("load session");
    let messages = engine.coordinator().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].text, "Six years from accrual, in most cases.");
}

#[tokio::test]
async fn document_summary_survives_restart_but_payload_does_not() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("temp dir");

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [
                {"text": "Summarize this document."},
                {"inlineData": {"mimeType": "application/pdf"}}
            ]}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(text_reply("A commercial lease for office premises.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _sink) = start_engine(engine_config(&server, &dir, literal_key())).await;
    let created = engine
        .vault()
        .ingest(
            vec![FileInput::new(
                "lease.pdf",
                "application/pdf",
                Bytes::from_static(b"%PDF-1.4 lease"),
            )],
            |_| {},
        )
        .await
        .expect("ingest");
    let doc_id = created[0].id.clone();

    let outcome = engine.vault().summarize(&doc_id).await.expect("summarize");
    assert_eq!(outcome, ActionOutcome::Completed);
    drop(engine);

    let (engine, _sink) = start_engine(engine_config(&server, &dir, literal_key())).await;
    let doc = engine.vault().document(&doc_id).expect("document survives");
    assert_eq!(
        doc.summary.as_deref(),
        Some("A commercial lease for office premises.")
    );
    assert!(!doc.has_payload(), "raw bytes must not be persisted");

    // Without the bytes the action is refused before any request.
    let err = engine.vault().summarize(&doc_id).await.unwrap_err();
    assert!(matches!(err, AtticusError::PayloadUnavailable(_)));
}

#[tokio::test]
async fn citations_follow_the_latest_turn() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("temp dir");

    // First turn comes back grounded, second does not.
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Recent authority supports that."}]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://law.example/a", "title": "Case A"}}
                ]}
            }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("No sources needed.")))
        .mount(&server)
        .await;

    let (engine, _sink) = start_engine(engine_config(&server, &dir, literal_key())).await;

    engine
        .coordinator()
        .submit_turn("any recent cases?", None)
        .await
        .expect("first turn");
    let citations = engine.coordinator().citations();
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].title, "Case A");
    assert!(citations[0].verified);

    engine
        .coordinator()
        .submit_turn("thanks, and the statute itself?", None)
        .await
        .expect("second turn");
    assert!(engine.coordinator().citations().is_empty());
}

#[tokio::test]
async fn second_submission_is_ignored_while_one_is_pending() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("temp dir");

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(text_reply("slow answer"))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _sink) = start_engine(engine_config(&server, &dir, literal_key())).await;
    let engine = Arc::new(engine);

    let background = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.coordinator().submit_turn("first", None).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = engine
        .coordinator()
        .submit_turn("second", None)
        .await
        .expect("gated turn");
    assert_eq!(second, TurnOutcome::Ignored);

    let first = background.await.expect("join").expect("first turn");
    assert_eq!(first, TurnOutcome::Completed);
    assert_eq!(engine.coordinator().messages().len(), 2);
}

// ────────────────────────────────────────────────────────────────────────────
// Credential arrival
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_credential_blocks_requests_until_a_key_arrives() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("temp dir");

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("x-goog-api-key", "late-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("configured now")))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _sink) = start_engine(engine_config(&server, &dir, CredentialRef::None)).await;
    assert!(!engine.is_configured());

    let err = engine
        .coordinator()
        .submit_turn("hello", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AtticusError::NotConfigured));
    assert!(
        engine.coordinator().messages().is_empty(),
        "a refused turn leaves no transcript entries"
    );

    let mut events = engine.subscribe_configured();
    assert!(engine.set_api_key(Some("late-key".to_owned())));
    assert!(events.recv().await.expect("signal").configured);

    let outcome = engine
        .coordinator()
        .submit_turn("hello again", None)
        .await
        .expect("turn after key");
    assert_eq!(outcome, TurnOutcome::Completed);
}

// ────────────────────────────────────────────────────────────────────────────
// Playback
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn assistant_reply_can_be_spoken_and_stopped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("temp dir");
    let pcm: Vec<u8> = vec![0, 0, 0, 64, 0, 128, 0, 64];

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("Read me aloud.")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{
                    "inlineData": {
                        "mimeType": "audio/L16;codec=pcm;rate=24000",
                        "data": BASE64_STANDARD.encode(&pcm)
                    }
                }]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, sink) = start_engine(engine_config(&server, &dir, literal_key())).await;
    engine
        .coordinator()
        .submit_turn("say something", None)
        .await
        .expect("turn");
    let messages = engine.coordinator().messages();
    let reply = messages.last().expect("assistant message");

    let outcome = engine.playback().toggle(&reply.id, &reply.text).await;
    assert_eq!(outcome, PlaybackOutcome::Started);
    assert_eq!(sink.plays.load(Ordering::SeqCst), 1);

    // Toggling the same message releases the slot.
    let outcome = engine.playback().toggle(&reply.id, &reply.text).await;
    assert_eq!(outcome, PlaybackOutcome::Stopped);
    assert!(sink.stops.load(Ordering::SeqCst) >= 1);
}
