//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::codecs::codec_id_by_name;
use crate::error::{MediaError, Result};
use crate::render::RenderOptions;

/// Render pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Video encoder, by codec or encoder name
    pub video_codec: String,

    /// Audio encoder; `None` renders video only
    pub audio_codec: Option<String>,

    pub width: u32,
    pub height: u32,

    /// Frames per second
    pub framerate: u32,

    /// Video bit rate in bps
    pub bit_rate: usize,

    /// Keyframe interval in frames
    pub gop_size: u32,

    /// x264 preset, only used for H.264
    pub h264_preset: String,

    /// Sample rate of the PCM that will be ingested; required for audio
    pub sample_rate: Option<u32>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            video_codec: "mpeg4".to_string(),
            audio_codec: Some("aac".to_string()),
            width: 1280,
            height: 720,
            framerate: 30,
            bit_rate: 2_000_000,
            gop_size: 12,
            h264_preset: "medium".to_string(),
            sample_rate: Some(44100),
        }
    }
}

impl RenderConfig {
    /// Resolve codec names and build options for rendering to `path`.
    pub fn to_options(&self, path: &str) -> Result<RenderOptions> {
        let video_codec = codec_id_by_name(&self.video_codec)?;
        let audio_codec = match &self.audio_codec {
            Some(name) => Some(codec_id_by_name(name)?),
            None => None,
        };

        Ok(RenderOptions {
            path: path.to_string(),
            video_codec: Some(video_codec),
            audio_codec,
            width: self.width,
            height: self.height,
            framerate: self.framerate,
            bit_rate: self.bit_rate,
            gop_size: self.gop_size,
            h264_preset: self.h264_preset.clone(),
            sample_rate: self.sample_rate,
        })
    }
}

/// Playback buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Decode-ahead buffer length in seconds
    pub buffer_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { buffer_secs: 10.0 }
    }
}

impl PlaybackConfig {
    /// Buffer capacity in frames for a source at `sample_rate`
    pub fn capacity_frames(&self, sample_rate: u32) -> usize {
        let frames = (self.buffer_secs * f64::from(sample_rate)).round();
        if frames < 1.0 {
            1
        } else {
            frames as usize
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub render: RenderConfig,
    pub playback: PlaybackConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| MediaError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| MediaError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.render.video_codec, "mpeg4");
        assert_eq!(config.render.width, 1280);
        assert_eq!(config.render.framerate, 30);
        assert_eq!(config.playback.buffer_secs, 10.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_capacity_frames() {
        let playback = PlaybackConfig::default();
        assert_eq!(playback.capacity_frames(44_100), 441_000);

        let tiny = PlaybackConfig { buffer_secs: 0.0 };
        assert_eq!(tiny.capacity_frames(48_000), 1);
    }

    #[test]
    fn test_to_options_resolves_codecs() {
        crate::init().unwrap();
        let config = RenderConfig {
            width: 320,
            height: 240,
            ..Default::default()
        };
        let options = config.to_options("out.mp4").unwrap();
        assert_eq!(options.path, "out.mp4");
        assert_eq!(options.video_codec, Some(crate::ffmpeg::codec::Id::MPEG4));
        assert_eq!(options.audio_codec, Some(crate::ffmpeg::codec::Id::AAC));
        assert_eq!(options.width, 320);
    }

    #[test]
    fn test_to_options_unknown_codec() {
        crate::init().unwrap();
        let config = RenderConfig {
            video_codec: "no-such-codec".to_string(),
            ..Default::default()
        };
        let err = config.to_options("out.mp4").unwrap_err();
        assert_eq!(err.status_code(), -70);
    }

    #[test]
    fn test_file_roundtrip() {
        let mut config = AppConfig::default();
        config.render.audio_codec = None;
        config.playback.buffer_secs = 2.5;

        let file = NamedTempFile::new().unwrap();
        config.to_file(file.path()).unwrap();
        let loaded = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.render.audio_codec, None);
        assert_eq!(loaded.playback.buffer_secs, 2.5);
    }
}
