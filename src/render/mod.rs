//! Render pipeline: RGBA frames plus one PCM soundtrack into a container file
//!
//! Usage follows a fixed order: `open`, then `send_audio` once (when an
//! audio codec is configured), then any number of `send_frame`, then
//! `close`. Every call returns a typed error with a distinct status code.

pub mod audio;
pub mod options;
pub mod session;
pub mod video;

pub use options::RenderOptions;
pub use session::AudioState;

use crate::error::RenderError;
use session::OutputSession;

/// Totals reported when a container is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub video_frames: u64,
    pub video_packets: usize,
    pub audio_packets: usize,
}

/// Owner of at most one open output container.
#[derive(Default)]
pub struct Renderer {
    session: Option<OutputSession>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Audio ingestion state, `None` when closed.
    pub fn audio_state(&self) -> Option<AudioState> {
        self.session.as_ref().map(|s| s.audio_state())
    }

    /// Create the container described by `options` and write its header.
    pub fn open(&mut self, options: &RenderOptions) -> Result<(), RenderError> {
        if self.session.is_some() {
            tracing::error!("Render already open!");
            return Err(RenderError::AlreadyOpen);
        }
        match OutputSession::open(options) {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                tracing::error!(path = %options.path, code = e.code(), error = %e, "Opening renderer failed");
                Err(e)
            }
        }
    }

    /// Encode one tightly packed RGBA frame of the configured size.
    pub fn send_frame(&mut self, rgba: &[u8]) -> Result<(), RenderError> {
        let session = self.session.as_mut().ok_or(RenderError::NotOpen)?;
        session.send_frame(rgba).inspect_err(|e| {
            tracing::error!(code = e.code(), error = %e, "Sending video frame failed");
        })
    }

    /// Encode the complete soundtrack: interleaved stereo signed 16-bit PCM
    /// at `sample_rate`.
    pub fn send_audio(&mut self, pcm: &[u8], sample_rate: u32) -> Result<(), RenderError> {
        let session = self.session.as_mut().ok_or(RenderError::NotOpen)?;
        session.send_audio(pcm, sample_rate).inspect_err(|e| {
            tracing::error!(code = e.code(), error = %e, "Sending audio failed");
        })
    }

    /// Flush, write the trailer and release the container.
    pub fn close(&mut self) -> Result<RenderSummary, RenderError> {
        let session = self.session.take().ok_or_else(|| {
            tracing::error!("Renderer isn't open!");
            RenderError::NotOpen
        })?;
        session.finish()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let path = session.path().to_string();
            if let Err(e) = session.finish() {
                tracing::warn!(path = %path, error = %e, "Closing renderer on drop failed");
            }
        }
    }
}
