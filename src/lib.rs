//! mediaflow
//!
//! Two FFmpeg-backed pipelines:
//! - a decode/playback pipeline that turns the first usable audio track of a
//!   container into 16-bit interleaved samples behind a pull-based buffer, and
//! - a render pipeline that encodes RGBA frames plus one PCM buffer into a
//!   finished container file.

pub(crate) mod codecs;
pub mod config;
pub(crate) mod config_file;
pub(crate) mod error;
pub(crate) mod ffmpeg_utils;
pub(crate) mod playback;
pub(crate) mod render;
pub(crate) mod source;
pub mod testcard;

#[cfg(test)]
pub(crate) mod tests;

pub use codecs::{codec_id_by_name, list_available_encoders};
pub use config_file::{generate_default_config, ConfigFile};
pub use error::{FfmpegError, MediaError, PlaybackError, RenderError, Result, SourceError};
pub use ffmpeg_utils::version_info as ffmpeg_version_info;
pub use ffmpeg_utils::{init, install_log_filter};
pub use playback::ring_buffer::{SampleRing, StereoFrame};
pub use playback::Playback;
pub use render::{RenderOptions, RenderSummary, Renderer};
pub use source::{load_source, ConvertedSamples, Decoded, SampleSource, SourceHandle};

/// Re-export of the FFmpeg bindings so callers can name codec ids.
pub use ffmpeg_next as ffmpeg;
