//! Exclusive speech playback slot with toggle semantics.
//!
//! At most one message plays at a time, engine-wide. Requesting the message
//! that is already playing stops it; requesting a different message stops
//! the current one, synthesizes the new text through the gateway, decodes
//! it, and plays it. The slot is claimed for the whole synthesize-decode-play
//! span so a second request during synthesis takes the slot over cleanly.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::audio::{AudioSink, PcmBuffer, decode_pcm16};
use crate::config::AudioConfig;
use crate::gateway::{CompletionGateway, CompletionRequest};

/// What a toggle request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Synthesis succeeded and playback began.
    Started,
    /// The request named the playing message; playback stopped.
    Stopped,
    /// Synthesis or decoding produced nothing playable; the slot is free
    /// again and the request can be retried.
    Failed,
}

/// Which message holds the slot, stamped with a generation counter.
///
/// The generation advances on every claim or stop, so a done callback from
/// an earlier playback compares stale and cannot release a newer one.
#[derive(Debug, Default)]
struct PlaybackSlot {
    playing: Option<String>,
    generation: u64,
}

/// Global exclusive playback controller.
pub struct PlaybackController {
    gateway: Arc<dyn CompletionGateway>,
    sink: Arc<dyn AudioSink>,
    audio: AudioConfig,
    slot: Arc<Mutex<PlaybackSlot>>,
}

impl PlaybackController {
    /// Create a controller over the given gateway and sink.
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        sink: Arc<dyn AudioSink>,
        audio: AudioConfig,
    ) -> Self {
        Self {
            gateway,
            sink,
            audio,
            slot: Arc::new(Mutex::new(PlaybackSlot::default())),
        }
    }

    /// Message currently holding the playback slot, if any.
    #[must_use]
    pub fn playing(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.playing.clone())
    }

    /// Toggle playback of `message_id`, reading `text` aloud.
    ///
    /// Never returns an error: failures release the slot and come back as
    /// [`PlaybackOutcome::Failed`].
    pub async fn toggle(&self, message_id: &str, text: &str) -> PlaybackOutcome {
        // Claim or release the slot before any slow work.
        let my_gen = {
            let Ok(mut slot) = self.slot.lock() else {
                return PlaybackOutcome::Failed;
            };
            if slot.playing.as_deref() == Some(message_id) {
                self.sink.stop();
                slot.playing = None;
                slot.generation += 1;
                debug!(message_id, "playback stopped by toggle");
                return PlaybackOutcome::Stopped;
            }
            if slot.playing.is_some() {
                self.sink.stop();
            }
            slot.playing = Some(message_id.to_owned());
            slot.generation += 1;
            slot.generation
        };

        // Slow section: no lock held across the gateway call.
        let audio = match self.gateway.complete(CompletionRequest::speak(text)).await {
            Ok(response) => response.audio,
            Err(e) => {
                warn!("speech synthesis failed: {e}");
                self.release_if_current(my_gen);
                return PlaybackOutcome::Failed;
            }
        };
        let Some(audio) = audio.filter(|a| !a.is_empty()) else {
            warn!(message_id, "speech synthesis returned no audio");
            self.release_if_current(my_gen);
            return PlaybackOutcome::Failed;
        };

        let buffer = match decode_pcm16(&audio, self.audio.channels, self.audio.sample_rate) {
            Ok(buffer) if !buffer.is_empty() => buffer,
            Ok(_) => {
                warn!(message_id, "decoded audio was empty");
                self.release_if_current(my_gen);
                return PlaybackOutcome::Failed;
            }
            Err(e) => {
                warn!("audio decode failed: {e}");
                self.release_if_current(my_gen);
                return PlaybackOutcome::Failed;
            }
        };

        self.play_if_current(my_gen, message_id, buffer)
    }

    /// Release the slot, but only if this claim still owns it.
    fn release_if_current(&self, my_gen: u64) {
        if let Ok(mut slot) = self.slot.lock()
            && slot.generation == my_gen
        {
            slot.playing = None;
        }
    }

    /// Hand the buffer to the sink if this claim still owns the slot.
    fn play_if_current(&self, my_gen: u64, message_id: &str, buffer: PcmBuffer) -> PlaybackOutcome {
        let Ok(slot_guard) = self.slot.lock() else {
            return PlaybackOutcome::Failed;
        };
        if slot_guard.generation != my_gen {
            // A newer toggle took the slot while we were synthesizing.
            debug!(message_id, "playback superseded before start");
            return PlaybackOutcome::Failed;
        }

        let slot = Arc::clone(&self.slot);
        let done: Box<dyn FnOnce() + Send> = Box::new(move || {
            if let Ok(mut slot) = slot.lock()
                && slot.generation == my_gen
            {
                slot.playing = None;
            }
        });
        debug!(message_id, frames = buffer.frames(), "playback starting");
        self.sink.play(buffer, done);
        PlaybackOutcome::Started
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::error::{AtticusError, Result};
    use crate::gateway::CompletionResponse;

    struct FakeGateway {
        audio: Option<Bytes>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeGateway {
        fn with_audio(bytes: &[u8]) -> Self {
            Self {
                audio: Some(Bytes::copy_from_slice(bytes)),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                audio: None,
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn without_audio() -> Self {
            Self {
                audio: None,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionGateway for FakeGateway {
        fn is_configured(&self) -> bool {
            true
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AtticusError::RequestFailed("synthesis unavailable".into()));
            }
            Ok(CompletionResponse {
                text: String::new(),
                grounding: Vec::new(),
                audio: self.audio.clone(),
            })
        }
    }

    #[derive(Default)]
    struct FakeSink {
        played: Mutex<Vec<usize>>,
        stops: AtomicUsize,
        done_callbacks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    }

    impl FakeSink {
        fn play_count(&self) -> usize {
            self.played.lock().unwrap().len()
        }

        fn stop_count(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }

        fn fire_done(&self, index: usize) {
            let done = self.done_callbacks.lock().unwrap().remove(index);
            done();
        }
    }

    impl AudioSink for FakeSink {
        fn play(&self, buffer: PcmBuffer, done: Box<dyn FnOnce() + Send>) {
            self.played.lock().unwrap().push(buffer.frames());
            self.done_callbacks.lock().unwrap().push(done);
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn controller(
        gateway: FakeGateway,
    ) -> (PlaybackController, Arc<FakeSink>, Arc<FakeGateway>) {
        let gateway = Arc::new(gateway);
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(
            Arc::clone(&gateway) as Arc<dyn CompletionGateway>,
            Arc::clone(&sink) as Arc<dyn AudioSink>,
            AudioConfig::default(),
        );
        (controller, sink, gateway)
    }

    const PCM: &[u8] = &[0x00, 0x00, 0x00, 0x40, 0x00, 0xC0, 0xFF, 0x7F];

    #[tokio::test]
    async fn toggle_starts_playback() {
        let (controller, sink, gateway) = controller(FakeGateway::with_audio(PCM));

        let outcome = controller.toggle("msg-1", "read this").await;

        assert_eq!(outcome, PlaybackOutcome::Started);
        assert_eq!(controller.playing().as_deref(), Some("msg-1"));
        assert_eq!(sink.play_count(), 1);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn toggling_the_playing_message_stops_it() {
        let (controller, sink, gateway) = controller(FakeGateway::with_audio(PCM));

        controller.toggle("msg-1", "read this").await;
        let outcome = controller.toggle("msg-1", "read this").await;

        assert_eq!(outcome, PlaybackOutcome::Stopped);
        assert_eq!(controller.playing(), None);
        assert_eq!(sink.stop_count(), 1);
        // No second synthesis for a stop.
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn toggling_a_different_message_replaces_playback() {
        let (controller, sink, gateway) = controller(FakeGateway::with_audio(PCM));

        controller.toggle("msg-1", "first").await;
        let outcome = controller.toggle("msg-2", "second").await;

        assert_eq!(outcome, PlaybackOutcome::Started);
        assert_eq!(controller.playing().as_deref(), Some("msg-2"));
        assert_eq!(sink.stop_count(), 1);
        assert_eq!(sink.play_count(), 2);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn natural_end_releases_the_slot() {
        let (controller, sink, _gateway) = controller(FakeGateway::with_audio(PCM));

        controller.toggle("msg-1", "read this").await;
        assert_eq!(controller.playing().as_deref(), Some("msg-1"));

        sink.fire_done(0);
        assert_eq!(controller.playing(), None);
    }

    #[tokio::test]
    async fn stale_done_callback_cannot_release_newer_playback() {
        let (controller, sink, _gateway) = controller(FakeGateway::with_audio(PCM));

        controller.toggle("msg-1", "first").await;
        controller.toggle("msg-2", "second").await;

        // The done callback of msg-1 arrives late.
        sink.fire_done(0);
        assert_eq!(controller.playing().as_deref(), Some("msg-2"));

        // The current playback's own callback still works.
        sink.fire_done(0);
        assert_eq!(controller.playing(), None);
    }

    #[tokio::test]
    async fn synthesis_failure_releases_the_slot() {
        let (controller, sink, _gateway) = controller(FakeGateway::failing());

        let outcome = controller.toggle("msg-1", "read this").await;

        assert_eq!(outcome, PlaybackOutcome::Failed);
        assert_eq!(controller.playing(), None);
        assert_eq!(sink.play_count(), 0);
    }

    #[tokio::test]
    async fn missing_audio_payload_fails_without_playing() {
        let (controller, sink, _gateway) = controller(FakeGateway::without_audio());

        let outcome = controller.toggle("msg-1", "read this").await;

        assert_eq!(outcome, PlaybackOutcome::Failed);
        assert_eq!(controller.playing(), None);
        assert_eq!(sink.play_count(), 0);
    }

    #[tokio::test]
    async fn undecodable_audio_fails_without_playing() {
        // Odd byte count cannot be PCM16.
        let (controller, sink, _gateway) = controller(FakeGateway::with_audio(&[0x00, 0x01, 0x02]));

        let outcome = controller.toggle("msg-1", "read this").await;

        assert_eq!(outcome, PlaybackOutcome::Failed);
        assert_eq!(controller.playing(), None);
        assert_eq!(sink.play_count(), 0);
    }

    #[tokio::test]
    async fn failed_playback_can_be_retried() {
        let (controller, _sink, gateway) = controller(FakeGateway::failing());

        assert_eq!(
            controller.toggle("msg-1", "text").await,
            PlaybackOutcome::Failed
        );
        assert_eq!(
            controller.toggle("msg-1", "text").await,
            PlaybackOutcome::Failed
        );
        // Each retry reached the gateway; nothing was left claiming the slot.
        assert_eq!(gateway.calls(), 2);
    }
}
