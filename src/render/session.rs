//! One open output container and everything that writes into it

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec::threading;
use ffmpeg_next::format::context::Output;

use super::audio::{self, AudioTrack};
use super::options::RenderOptions;
use super::video::{PixelConverter, VideoTrack};
use super::RenderSummary;
use crate::error::RenderError;
use crate::ffmpeg_utils::{helpers, io};

/// Where an encoder's packets go.
#[derive(Debug, Clone, Copy)]
pub struct StreamTarget {
    pub index: usize,
    pub codec_time_base: ffmpeg::Rational,
    /// Settled by the muxer in `write_header`
    pub stream_time_base: ffmpeg::Rational,
}

impl StreamTarget {
    pub fn new(index: usize, time_base: ffmpeg::Rational) -> Self {
        Self {
            index,
            codec_time_base: time_base,
            stream_time_base: time_base,
        }
    }
}

/// Pick the threading mode the codec supports, frame threads first.
pub fn threading_for(codec: &ffmpeg::Codec) -> threading::Config {
    let caps = codec.capabilities();
    let kind = if caps.contains(ffmpeg::codec::Capabilities::FRAME_THREADS) {
        threading::Type::Frame
    } else if caps.contains(ffmpeg::codec::Capabilities::SLICE_THREADS) {
        threading::Type::Slice
    } else {
        threading::Type::None
    };
    threading::Config {
        kind,
        ..Default::default()
    }
}

/// Pull every ready packet out of `encoder` and write it to `output`.
///
/// Returns the number of packets written.
pub fn write_packets(
    encoder: &mut ffmpeg::encoder::Encoder,
    output: &mut Output,
    target: &StreamTarget,
) -> Result<usize, RenderError> {
    let mut written = 0;
    loop {
        let mut packet = ffmpeg::Packet::empty();
        match encoder.receive_packet(&mut packet) {
            Ok(()) => {}
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => break,
            Err(ffmpeg::Error::Eof) => break,
            Err(e) => return Err(RenderError::Encode(e.to_string())),
        }

        packet.set_stream(target.index);
        packet.rescale_ts(target.codec_time_base, target.stream_time_base);
        packet
            .write_interleaved(output)
            .map_err(|e| RenderError::WritePacket(e.to_string()))?;
        written += 1;
    }
    Ok(written)
}

/// Audio ingestion state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    /// No audio stream in this container
    Disabled,
    /// Audio stream exists, PCM not ingested yet
    Pending,
    Added,
    /// Ingestion started but did not complete
    Failed,
}

/// A container with its header written.
///
/// Fields drop in declaration order: encoders first, the container last.
pub struct OutputSession {
    video: VideoTrack,
    audio: Option<AudioTrack>,
    converter: PixelConverter,
    output: Output,
    path: String,
    audio_state: AudioState,
}

impl OutputSession {
    /// Build the container, its streams and encoders, and write the header.
    ///
    /// On failure everything acquired so far is released before returning.
    pub fn open(options: &RenderOptions) -> Result<Self, RenderError> {
        let video_codec = options.validate()?;
        let audio_codec = options.audio_codec();
        let path = options.path.clone();

        let mut output = io::alloc_output(&path)
            .map_err(|e| RenderError::ContainerAlloc(format!("{}: {}", path, e)))?;
        let global_header = helpers::output_wants_global_header(&output);

        let mut video = VideoTrack::open(&mut output, options, video_codec, global_header)?;
        let mut audio = match audio_codec {
            Some(codec_id) => Some(AudioTrack::open(&mut output, codec_id, global_header)?),
            None => None,
        };
        let converter = PixelConverter::new(options.width, options.height)?;

        io::open_output_io(&mut output, &path)
            .map_err(|e| RenderError::OutputIo(format!("{}: {}", path, e)))?;
        output
            .write_header()
            .map_err(|e| RenderError::WriteHeader(e.to_string()))?;

        if let Some(tb) = helpers::stream_time_base(&output, video.target.index) {
            video.target.stream_time_base = tb;
        }
        if let Some(track) = audio.as_mut() {
            if let Some(tb) = helpers::stream_time_base(&output, track.target.index) {
                track.target.stream_time_base = tb;
            }
        }

        let audio_state = if audio.is_some() {
            AudioState::Pending
        } else {
            AudioState::Disabled
        };

        tracing::info!(
            path = %path,
            format = output.format().name(),
            video_codec = video_codec.name(),
            audio_codec = audio_codec.map(|c| c.name()).unwrap_or("none"),
            audio_rate = audio.as_ref().map_or(0, |track| track.sample_rate()),
            width = options.width,
            height = options.height,
            framerate = options.framerate,
            "Opened output container"
        );

        Ok(Self {
            video,
            audio,
            converter,
            output,
            path,
            audio_state,
        })
    }

    /// Encode one RGBA frame. Audio must have been ingested first when the
    /// container has an audio stream.
    pub fn send_frame(&mut self, rgba: &[u8]) -> Result<(), RenderError> {
        if self.audio_state == AudioState::Pending {
            return Err(RenderError::AudioNotAdded);
        }
        self.video
            .send_frame(&mut self.output, &mut self.converter, rgba)
    }

    /// Ingest the complete soundtrack. Allowed once per container.
    pub fn send_audio(&mut self, pcm: &[u8], sample_rate: u32) -> Result<(), RenderError> {
        let Some(track) = self.audio.as_mut() else {
            return Err(RenderError::AudioNotEnabled);
        };
        if self.audio_state != AudioState::Pending {
            return Err(RenderError::AudioAlreadyAdded);
        }
        audio::validate_pcm(pcm, sample_rate)?;

        self.audio_state = AudioState::Failed;
        track.encode_batch(&mut self.output, pcm, sample_rate)?;
        self.audio_state = AudioState::Added;
        Ok(())
    }

    pub fn audio_state(&self) -> AudioState {
        self.audio_state
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn summary(&self) -> RenderSummary {
        RenderSummary {
            video_frames: self.video.frames_sent(),
            video_packets: self.video.packets_written(),
            audio_packets: self
                .audio
                .as_ref()
                .map_or(0, |track| track.packets_written()),
        }
    }

    /// Flush the video encoder, write the trailer and release everything.
    ///
    /// The trailer is written and resources are released even if flushing
    /// fails; the first error is returned.
    pub fn finish(mut self) -> Result<RenderSummary, RenderError> {
        let flushed = self.video.finish(&mut self.output);
        if let Err(e) = &flushed {
            tracing::warn!(path = %self.path, error = %e, "Flushing video encoder failed");
        }
        let trailer = self
            .output
            .write_trailer()
            .map_err(|e| RenderError::WriteTrailer(e.to_string()));
        let summary = self.summary();

        let OutputSession {
            video,
            audio,
            converter,
            output,
            path,
            ..
        } = self;
        drop(video);
        drop(audio);
        drop(converter);
        drop(output);

        flushed?;
        trailer?;

        tracing::info!(
            path = %path,
            video_frames = summary.video_frames,
            video_packets = summary.video_packets,
            audio_packets = summary.audio_packets,
            "Closed output container"
        );
        Ok(summary)
    }
}
