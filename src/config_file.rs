//! Configuration file support
//!
//! Loads configuration from TOML files. Every section and field is optional;
//! anything missing falls back to the defaults in [`crate::config`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{AppConfig, LoggingConfig, PlaybackConfig, RenderConfig};
use crate::error::{MediaError, Result};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Render settings
    pub render: Option<RenderSettings>,
    /// Playback settings
    pub playback: Option<PlaybackSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Video codec or encoder name
    pub video_codec: Option<String>,
    /// Audio codec or encoder name; `"none"` disables audio
    pub audio_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub framerate: Option<u32>,
    /// Video bit rate in bps
    pub bit_rate: Option<usize>,
    pub gop_size: Option<u32>,
    pub h264_preset: Option<String>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Decode-ahead buffer length in seconds
    pub buffer_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| {
            MediaError::Config(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| MediaError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let render = RenderConfig::default();
        let playback = PlaybackConfig::default();
        let logging = LoggingConfig::default();
        Self {
            render: Some(RenderSettings {
                video_codec: Some(render.video_codec),
                audio_codec: render.audio_codec,
                width: Some(render.width),
                height: Some(render.height),
                framerate: Some(render.framerate),
                bit_rate: Some(render.bit_rate),
                gop_size: Some(render.gop_size),
                h264_preset: Some(render.h264_preset),
                sample_rate: render.sample_rate,
            }),
            playback: Some(PlaybackSettings {
                buffer_secs: Some(playback.buffer_secs),
            }),
            logging: Some(LoggingSettings {
                level: Some(logging.level),
                format: Some(logging.format),
            }),
        }
    }

    /// Convert to AppConfig
    pub fn into_app_config(self) -> AppConfig {
        let defaults = AppConfig::default();

        let render = match self.render {
            Some(r) => RenderConfig {
                video_codec: r.video_codec.unwrap_or(defaults.render.video_codec),
                audio_codec: match r.audio_codec {
                    Some(name) if name.eq_ignore_ascii_case("none") => None,
                    Some(name) => Some(name),
                    None => defaults.render.audio_codec,
                },
                width: r.width.unwrap_or(defaults.render.width),
                height: r.height.unwrap_or(defaults.render.height),
                framerate: r.framerate.unwrap_or(defaults.render.framerate),
                bit_rate: r.bit_rate.unwrap_or(defaults.render.bit_rate),
                gop_size: r.gop_size.unwrap_or(defaults.render.gop_size),
                h264_preset: r.h264_preset.unwrap_or(defaults.render.h264_preset),
                sample_rate: r.sample_rate.or(defaults.render.sample_rate),
            },
            None => defaults.render,
        };

        let playback = PlaybackConfig {
            buffer_secs: self
                .playback
                .and_then(|p| p.buffer_secs)
                .unwrap_or(defaults.playback.buffer_secs),
        };

        let logging = match self.logging {
            Some(l) => LoggingConfig {
                level: l.level.unwrap_or(defaults.logging.level),
                format: l.format.unwrap_or(defaults.logging.format),
            },
            None => defaults.logging,
        };

        AppConfig {
            render,
            playback,
            logging,
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}
