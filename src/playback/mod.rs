//! Pull-based playback on top of a decode-ahead buffer
//!
//! A real-time mixer asks for a fixed number of stereo frames per callback.
//! [`Playback`] decodes synchronously from its [`SampleSource`] until the
//! request can be met or the source runs dry, then hands out exactly what was
//! asked for.

pub mod ring_buffer;

use crate::config::PlaybackConfig;
use crate::error::PlaybackError;
use crate::source::{Decoded, SampleSource};

use ring_buffer::{SampleRing, StereoFrame};

/// Playback state for one source.
pub struct Playback<S: SampleSource> {
    source: S,
    ring: SampleRing,
    /// Converted samples that did not fit into the ring on the last decode
    carry: Vec<i16>,
    carry_channels: u16,
    playing: bool,
    exhausted: bool,
    delivered: u64,
    mix_rate: u32,
}

impl<S: SampleSource> Playback<S> {
    /// Wrap `source` with a buffer sized from `config`.
    pub fn new(source: S, config: &PlaybackConfig) -> Self {
        let capacity = config.capacity_frames(source.sample_rate());
        Self::with_capacity(source, capacity)
    }

    /// Wrap `source` with a buffer holding `capacity` stereo frames.
    pub fn with_capacity(source: S, capacity: usize) -> Self {
        let mix_rate = source.sample_rate();
        tracing::debug!(capacity, mix_rate, "Created playback buffer");
        Self {
            source,
            ring: SampleRing::new(capacity.max(1)),
            carry: Vec::new(),
            carry_channels: 2,
            playing: false,
            exhausted: false,
            delivered: 0,
            mix_rate,
        }
    }

    /// Mark playback as active. Playback always continues from the current
    /// read position; `from_position` is only logged.
    pub fn start(&mut self, from_position: f64) {
        if from_position > 0.0 {
            tracing::debug!(
                from_position,
                "Seeking is not supported, starting from current position"
            );
        }
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Seconds of audio handed to the mixer so far.
    pub fn position(&self) -> f64 {
        if self.mix_rate == 0 {
            return 0.0;
        }
        self.delivered as f64 / f64::from(self.mix_rate)
    }

    /// Seeking is not supported; the request is logged and ignored.
    pub fn seek(&mut self, position: f64) {
        tracing::debug!(position, "Seek requested but not supported, ignoring");
    }

    /// Move carried-over samples into the ring. Returns `true` if all fit.
    fn drain_carry(&mut self) -> bool {
        if self.carry.is_empty() {
            return true;
        }
        let channels = usize::from(self.carry_channels.max(1));
        let accepted = self.ring.push_interleaved(&self.carry, self.carry_channels);
        self.carry.drain(..accepted * channels);
        self.carry.is_empty()
    }

    /// Decode until at least `frames` are buffered or the source is exhausted.
    ///
    /// Returns the number of frames buffered afterwards. A decode failure
    /// leaves the buffered content untouched.
    pub fn ensure(&mut self, frames: usize) -> Result<usize, PlaybackError> {
        let capacity = self.ring.capacity();
        if frames > capacity {
            return Err(PlaybackError::RequestTooLarge {
                requested: frames,
                capacity,
            });
        }

        while self.ring.len() < frames {
            if !self.drain_carry() {
                break;
            }
            if self.exhausted {
                break;
            }

            match self.source.decode_next()? {
                Decoded::Samples(chunk) => {
                    self.mix_rate = chunk.sample_rate;
                    let channels = usize::from(chunk.channels.max(1));
                    let accepted = self.ring.push_interleaved(chunk.data, chunk.channels);
                    let end = (chunk.frames * channels).min(chunk.data.len());
                    if accepted * channels < end {
                        self.carry.extend_from_slice(&chunk.data[accepted * channels..end]);
                        self.carry_channels = chunk.channels;
                    }
                }
                Decoded::EndOfStream => {
                    tracing::debug!(
                        delivered = self.delivered,
                        buffered = self.ring.len(),
                        "Source exhausted"
                    );
                    self.exhausted = true;
                }
            }
        }

        Ok(self.ring.len())
    }

    /// Fill all of `out` or nothing.
    ///
    /// Returns `out.len()` on success, or 0 once the source cannot supply
    /// that many frames any more.
    pub fn mix(&mut self, out: &mut [StereoFrame]) -> Result<usize, PlaybackError> {
        if out.is_empty() {
            return Ok(0);
        }
        self.ensure(out.len())?;
        let n = self.ring.pull_into(out);
        self.delivered += n as u64;
        Ok(n)
    }

    /// Fill `out` with whatever can be decoded and zero the remainder.
    ///
    /// Never fails for size: requests larger than the buffer are served up to
    /// its capacity. Returns the number of real frames written.
    pub fn mix_padded(&mut self, out: &mut [StereoFrame]) -> Result<usize, PlaybackError> {
        let wanted = out.len().min(self.ring.capacity());
        self.ensure(wanted)?;
        let n = self.ring.pull_padded_into(out);
        self.delivered += n as u64;
        Ok(n)
    }

    /// `true` once the source has ended and every buffered frame was handed out.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.ring.is_empty() && self.carry.is_empty()
    }

    pub fn buffered_frames(&self) -> usize {
        self.ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn frames_delivered(&self) -> u64 {
        self.delivered
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
