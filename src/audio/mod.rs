//! Speech audio: PCM decoding and the playback seam.
//!
//! The synthesis endpoint returns raw little-endian signed 16-bit PCM.
//! [`decode_pcm16`] normalizes it into the f32 buffer a playback sink
//! consumes; [`AudioSink`] is the capability trait the host shell implements
//! (cpal in the desktop shell, a fake in tests). The engine itself never
//! touches an audio device.

pub mod playback;

pub use playback::{PlaybackController, PlaybackOutcome};

use crate::error::{AtticusError, Result};

/// Sample rate of synthesized speech in Hz.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Channel count of synthesized speech.
pub const SPEECH_CHANNELS: u16 = 1;

/// Decoded audio ready for a playback sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    /// Interleaved samples normalized to [-1.0, 1.0).
    pub samples: Vec<f32>,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl PcmBuffer {
    /// Number of frames (samples per channel).
    #[must_use]
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Playback duration in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f32 / self.sample_rate as f32
        }
    }

    /// True when there is nothing to play.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode little-endian signed 16-bit PCM into normalized f32 samples.
///
/// Each sample is divided by 32768, mapping the i16 range onto
/// [-1.0, 1.0).
///
/// # Errors
///
/// Returns [`AtticusError::Audio`] for a zero channel count or an odd byte
/// length (a truncated final sample).
pub fn decode_pcm16(bytes: &[u8], channels: u16, sample_rate: u32) -> Result<PcmBuffer> {
    if channels == 0 {
        return Err(AtticusError::Audio("channel count must be nonzero".to_owned()));
    }
    if bytes.len() % 2 != 0 {
        return Err(AtticusError::Audio(format!(
            "PCM16 payload has odd byte length {}",
            bytes.len()
        )));
    }

    let mut samples = Vec::with_capacity(bytes.len() / 2);
    for chunk in bytes.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        samples.push(sample as f32 / 32768.0);
    }

    Ok(PcmBuffer {
        samples,
        channels,
        sample_rate,
    })
}

/// Playback capability implemented by the host shell.
///
/// `play` must return promptly (hand the buffer to a device/thread) and
/// invoke `done` when playback ends naturally, from outside the `play` call
/// itself. `stop` halts whatever is playing; a stopped playback may or may
/// not still invoke its `done` callback, the controller tolerates both.
pub trait AudioSink: Send + Sync {
    /// Start playing `buffer` without blocking.
    fn play(&self, buffer: PcmBuffer, done: Box<dyn FnOnce() + Send>);

    /// Halt current playback, if any.
    fn stop(&self);
}
