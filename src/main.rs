//! mediaflow command line
//!
//! - `mediaflow encoders <codec>`: list the encoders FFmpeg has for a codec
//! - `mediaflow probe <file> [--json]`: decode a file's first audio track
//!   through the playback buffer and report what came out
//! - `mediaflow render <output> [config.toml] [--seconds N]`: render a test card
//! - `mediaflow init-config [path]`: write a default configuration file

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediaflow::config::{AppConfig, LoggingConfig};
use mediaflow::{testcard, ConfigFile, MediaError, Playback, Renderer, Result, StereoFrame};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "mediaflow";

/// Config file used when none is given explicitly
const DEFAULT_CONFIG_PATH: &str = "mediaflow.toml";

/// Frames pulled from the playback buffer per probe iteration
const PROBE_BLOCK_FRAMES: usize = 1024;

/// FFmpeg-backed audio playback buffering and test-card rendering.
#[derive(Parser, Debug)]
#[command(name = "mediaflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List the encoders FFmpeg has for a codec family
    Encoders {
        /// Codec name, e.g. `aac` or `h264`
        codec: String,
    },
    /// Decode a file's first audio track through the playback buffer
    Probe {
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render a test card with a sine soundtrack
    Render {
        output: String,

        /// Config file (defaults to $MEDIAFLOW_CONFIG or mediaflow.toml)
        config: Option<PathBuf>,

        /// Length of the rendered clip
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
        seconds: u32,
    },
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },
}

impl Command {
    /// Config file given on the command line, if any
    fn explicit_config(&self) -> Option<&Path> {
        match self {
            Command::Render { config, .. } => config.as_deref(),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let explicit_config = cli.command.explicit_config().map(Path::to_path_buf);
    let config_path = explicit_config
        .clone()
        .or_else(|| std::env::var_os("MEDIAFLOW_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (config, config_error) = load_config(&config_path, explicit_config.is_some());

    init_logging(&config.logging);
    if let Some(e) = config_error {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path.display(),
            e
        );
    }

    tracing::debug!("{} v{} starting", APP_NAME, VERSION);
    mediaflow::init()?;
    mediaflow::install_log_filter();
    tracing::debug!("FFmpeg version: {}", mediaflow::ffmpeg_version_info());

    match cli.command {
        Command::Encoders { codec } => list_encoders(&codec),
        Command::Probe { file, json } => probe(&file, &config, json),
        Command::Render {
            output, seconds, ..
        } => render(&output, &config, seconds),
        Command::InitConfig { path } => {
            mediaflow::generate_default_config(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

/// Load the config file if it exists. A missing default file is not an error.
fn load_config(path: &Path, required: bool) -> (AppConfig, Option<MediaError>) {
    if !required && !path.exists() {
        return (AppConfig::default(), None);
    }
    match ConfigFile::from_file(path) {
        Ok(cf) => (cf.into_app_config(), None),
        Err(e) => (AppConfig::default(), Some(e)),
    }
}

/// Initialize logging with tracing
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}={},ffmpeg=warn", APP_NAME, logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn list_encoders(name: &str) -> Result<()> {
    let codec_id = mediaflow::codec_id_by_name(name)?;
    let encoders = mediaflow::list_available_encoders(codec_id);
    if encoders.is_empty() {
        println!("No encoders available for {}", codec_id.name());
    }
    for encoder in encoders {
        println!("{}", encoder);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    path: String,
    stream_index: usize,
    codec: String,
    sample_rate: u32,
    source_channels: u16,
    output_channels: u16,
    container_duration_secs: Option<f64>,
    decoded_frames: u64,
    decoded_secs: f64,
}

fn probe(path: &Path, config: &AppConfig, json: bool) -> Result<()> {
    let source = mediaflow::load_source(path)?;
    let mut report = ProbeReport {
        path: path.display().to_string(),
        stream_index: source.stream_index(),
        codec: source.codec_name().to_string(),
        sample_rate: source.sample_rate(),
        source_channels: source.source_channels(),
        output_channels: source.output_channels(),
        container_duration_secs: source.duration_secs(),
        decoded_frames: 0,
        decoded_secs: 0.0,
    };

    let mut playback = Playback::new(source, &config.playback);
    playback.start(0.0);
    let mut block = vec![StereoFrame::default(); PROBE_BLOCK_FRAMES];
    while !playback.is_exhausted() {
        if playback.mix_padded(&mut block)? == 0 {
            break;
        }
    }
    playback.stop();

    report.decoded_frames = playback.frames_delivered();
    report.decoded_secs = playback.position();

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| MediaError::Config(e.to_string()))?;
        println!("{}", out);
    } else {
        println!("{}", report.path);
        println!("  stream:     #{} {}", report.stream_index, report.codec);
        println!("  rate:       {} Hz", report.sample_rate);
        println!(
            "  channels:   {} -> {}",
            report.source_channels, report.output_channels
        );
        if let Some(d) = report.container_duration_secs {
            println!("  container:  {:.3} s", d);
        }
        println!(
            "  decoded:    {} frames ({:.3} s)",
            report.decoded_frames, report.decoded_secs
        );
    }
    Ok(())
}

fn render(output: &str, config: &AppConfig, seconds: u32) -> Result<()> {
    let options = config.render.to_options(output)?;
    let mut renderer = Renderer::new();
    renderer.open(&options)?;

    if options.audio_codec().is_some() {
        let rate = options.sample_rate.unwrap_or(44_100);
        let frames = rate as usize * seconds as usize;
        renderer.send_audio(&testcard::sine_pcm(rate, frames, 440.0), rate)?;
    }

    let total = u64::from(options.framerate) * u64::from(seconds);
    for frame in 0..total {
        let rgb = testcard::color_for_frame(frame, options.framerate);
        renderer.send_frame(&testcard::solid_frame(options.width, options.height, rgb))?;
    }

    let summary = renderer.close()?;
    println!(
        "Rendered {} ({} frames, {} video packets, {} audio packets)",
        output, summary.video_frames, summary.video_packets, summary.audio_packets
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once(APP_NAME).chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_flags_in_any_position() {
        assert_eq!(
            parse(&["probe", "--json", "clip.wav"]),
            Command::Probe {
                file: PathBuf::from("clip.wav"),
                json: true,
            }
        );
        assert_eq!(
            parse(&["render", "out.mp4", "--seconds", "5", "my.toml"]),
            Command::Render {
                output: "out.mp4".to_string(),
                config: Some(PathBuf::from("my.toml")),
                seconds: 5,
            }
        );
    }

    #[test]
    fn test_render_defaults() {
        let command = parse(&["render", "out.mp4"]);
        assert_eq!(
            command,
            Command::Render {
                output: "out.mp4".to_string(),
                config: None,
                seconds: 3,
            }
        );
        assert_eq!(command.explicit_config(), None);
        assert_eq!(
            parse(&["render", "out.mp4", "a.toml"]).explicit_config(),
            Some(Path::new("a.toml"))
        );
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let try_parse = |args: &[&str]| {
            Cli::try_parse_from(std::iter::once(APP_NAME).chain(args.iter().copied()))
        };
        assert!(try_parse(&["render", "out.mp4", "--seconds", "0"]).is_err());
        assert!(try_parse(&["render", "out.mp4", "--seconds"]).is_err());
        assert!(try_parse(&["probe"]).is_err());
        assert!(try_parse(&["encoders"]).is_err());
    }

    #[test]
    fn test_init_config_default_path() {
        assert_eq!(
            parse(&["init-config"]),
            Command::InitConfig {
                path: PathBuf::from(DEFAULT_CONFIG_PATH),
            }
        );
    }

    #[test]
    fn test_missing_default_config_is_fine() {
        let (config, err) = load_config(Path::new("/nonexistent/mediaflow.toml"), false);
        assert!(err.is_none());
        assert_eq!(config.render.framerate, 30);

        let (_, err) = load_config(Path::new("/nonexistent/mediaflow.toml"), true);
        assert!(err.is_some());
    }
}
