//! Audio sources for the playback pipeline
//!
//! A source owns an open container and yields 16-bit interleaved samples one
//! decoded frame at a time. [`SourceHandle`] is the FFmpeg-backed
//! implementation; the playback buffer only depends on [`SampleSource`].

pub mod handle;
pub mod resampler;

use std::path::Path;

pub use handle::SourceHandle;

use crate::error::SourceError;

/// One decoded frame after conversion to the playback format.
#[derive(Debug, Clone, Copy)]
pub struct ConvertedSamples<'a> {
    /// Interleaved samples, `frames * channels` long
    pub data: &'a [i16],
    pub frames: usize,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Result of one decode step.
#[derive(Debug)]
pub enum Decoded<'a> {
    Samples(ConvertedSamples<'a>),
    EndOfStream,
}

/// Anything that can feed the playback buffer.
pub trait SampleSource {
    /// Produce the next block of samples. The returned slice is only valid
    /// until the next call.
    fn decode_next(&mut self) -> Result<Decoded<'_>, SourceError>;

    /// Sample rate of the delivered samples.
    fn sample_rate(&self) -> u32;

    /// Channel count of the delivered samples.
    fn output_channels(&self) -> u16;
}

/// Open a media file and prepare its first usable audio track.
pub fn load_source<P: AsRef<Path>>(path: P) -> Result<SourceHandle, SourceError> {
    SourceHandle::open(path)
}
