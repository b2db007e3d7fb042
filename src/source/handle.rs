//! Decoder session for one audio source
//!
//! Opens a container, selects the first decodable audio track and turns its
//! packets into playback-format samples one decoded frame at a time.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use super::resampler::{PlaybackResampler, PLAYBACK_SAMPLE_FORMAT};
use super::{ConvertedSamples, Decoded, SampleSource};
use crate::error::SourceError;
use crate::ffmpeg_utils::{helpers, io, utils};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Packets are still being read from the container
    Reading,
    /// End of input reached, decoder is being drained
    Draining,
    /// Decoder drained, resampler tail still pending
    Flushing,
    /// Nothing more to deliver
    Finished,
}

/// An open audio source: demuxer, decoder and playback resampler.
pub struct SourceHandle {
    resampler: PlaybackResampler,
    decoder: ffmpeg::decoder::Audio,
    frame: ffmpeg::util::frame::Audio,
    packet: ffmpeg::Packet,
    input: ffmpeg::format::context::Input,
    path: PathBuf,
    stream_index: usize,
    codec: ffmpeg::codec::Id,
    source_channels: u16,
    duration_secs: Option<f64>,
    state: DecodeState,
}

impl SourceHandle {
    /// Open `path` and prepare its first decodable audio track.
    ///
    /// Tracks whose codec has no registered decoder are marked as discarded
    /// so the demuxer does not hand us their packets.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let display = path.display().to_string();
        let mut input = io::open_input(&path)?;

        let streams: Vec<(usize, ffmpeg::media::Type, ffmpeg::codec::Id)> = input
            .streams()
            .map(|s| {
                utils::debug_stream_info(&s, s.index());
                (s.index(), s.parameters().medium(), s.parameters().id())
            })
            .collect();

        let mut selected = None;
        for (index, medium, codec_id) in streams {
            if !helpers::decoder_exists(codec_id) {
                tracing::debug!(
                    stream_index = index,
                    codec = codec_id.name(),
                    "No decoder available, discarding stream"
                );
                helpers::discard_stream(&mut input, index);
                continue;
            }
            if selected.is_none() && medium == ffmpeg::media::Type::Audio {
                selected = Some((index, codec_id));
            }
        }

        let Some((stream_index, codec)) = selected else {
            tracing::warn!(path = %display, "No usable audio track found");
            return Err(SourceError::NoUsableAudioTrack(display));
        };

        let stream = input
            .stream(stream_index)
            .ok_or_else(|| SourceError::NoUsableAudioTrack(display.clone()))?;
        let mut context = ffmpeg::codec::Context::from_parameters(stream.parameters())
            .map_err(|e| {
                SourceError::DecoderCreate(format!(
                    "Failed to create codec context for stream {}: {}",
                    stream_index, e
                ))
            })?;
        helpers::set_request_sample_format(&mut context, PLAYBACK_SAMPLE_FORMAT);
        let decoder = context.decoder().audio().map_err(|e| {
            SourceError::DecoderCreate(format!(
                "Failed to open audio decoder for stream {}: {}",
                stream_index, e
            ))
        })?;

        let source_channels = decoder.channels();
        let resampler = PlaybackResampler::new(
            decoder.format(),
            decoder.channel_layout(),
            source_channels,
            decoder.rate(),
        )?;
        let duration_secs = utils::input_duration_secs(&input);

        tracing::info!(
            path = %display,
            stream_index,
            codec = codec.name(),
            sample_rate = decoder.rate(),
            source_channels,
            output_channels = resampler.output_channels(),
            "Opened audio source"
        );

        Ok(Self {
            resampler,
            decoder,
            frame: ffmpeg::util::frame::Audio::empty(),
            packet: ffmpeg::Packet::empty(),
            input,
            path,
            stream_index,
            codec,
            source_channels,
            duration_secs,
            state: DecodeState::Reading,
        })
    }

    /// Read packets until one for the selected track has been handed to the
    /// decoder, or signal end of input.
    fn feed_packet(&mut self) -> Result<(), SourceError> {
        loop {
            self.packet = ffmpeg::Packet::empty();
            match self.packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => {
                    match self.decoder.send_eof() {
                        Ok(()) | Err(ffmpeg::Error::Eof) => {}
                        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {}
                        Err(e) => return Err(SourceError::Decode(e.to_string())),
                    }
                    self.state = DecodeState::Draining;
                    return Ok(());
                }
                Err(e) => return Err(SourceError::Decode(e.to_string())),
            }

            if self.packet.stream() != self.stream_index {
                continue;
            }

            return match self.decoder.send_packet(&self.packet) {
                Ok(()) => Ok(()),
                Err(ffmpeg::Error::InvalidData) => {
                    tracing::debug!(
                        stream_index = self.stream_index,
                        "send_packet: skipping invalid packet"
                    );
                    Ok(())
                }
                Err(e) => Err(SourceError::Decode(format!(
                    "send_packet error on stream {}: {}",
                    self.stream_index, e
                ))),
            };
        }
    }

    fn converted(&self, frames: usize) -> Result<ConvertedSamples<'_>, SourceError> {
        Ok(ConvertedSamples {
            data: self.resampler.samples(frames)?,
            frames,
            channels: self.resampler.output_channels(),
            sample_rate: self.resampler.rate(),
        })
    }

    /// Decode and convert the next frame of the selected track.
    ///
    /// Returns `Decoded::EndOfStream` once the track is exhausted and every
    /// buffered sample has been delivered; later calls keep returning it.
    pub fn decode_next(&mut self) -> Result<Decoded<'_>, SourceError> {
        loop {
            match self.state {
                DecodeState::Finished => return Ok(Decoded::EndOfStream),
                DecodeState::Flushing => {
                    self.state = DecodeState::Finished;
                    let frames = self.resampler.flush()?;
                    if frames == 0 {
                        return Ok(Decoded::EndOfStream);
                    }
                    return Ok(Decoded::Samples(self.converted(frames)?));
                }
                DecodeState::Reading | DecodeState::Draining => {}
            }

            match self.decoder.receive_frame(&mut self.frame) {
                Ok(()) => {
                    let frames = self.resampler.convert(&mut self.frame)?;
                    if frames == 0 {
                        continue;
                    }
                    return Ok(Decoded::Samples(self.converted(frames)?));
                }
                Err(ffmpeg::Error::Eof) => {
                    self.state = DecodeState::Flushing;
                    continue;
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {}
                Err(e) => {
                    return Err(SourceError::Decode(format!(
                        "receive_frame error on stream {}: {}",
                        self.stream_index, e
                    )))
                }
            }

            if self.state == DecodeState::Draining {
                self.state = DecodeState::Flushing;
                continue;
            }
            self.feed_packet()?;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index of the selected track within the container.
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Sample rate of the delivered samples.
    pub fn sample_rate(&self) -> u32 {
        self.resampler.rate()
    }

    /// Channel count after the layout policy has been applied.
    pub fn output_channels(&self) -> u16 {
        self.resampler.output_channels()
    }

    /// Channel count of the selected track before conversion.
    pub fn source_channels(&self) -> u16 {
        self.source_channels
    }

    /// Container duration, when the demuxer reports one.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }
}

impl SampleSource for SourceHandle {
    fn decode_next(&mut self) -> Result<Decoded<'_>, SourceError> {
        SourceHandle::decode_next(self)
    }

    fn sample_rate(&self) -> u32 {
        SourceHandle::sample_rate(self)
    }

    fn output_channels(&self) -> u16 {
        SourceHandle::output_channels(self)
    }
}
