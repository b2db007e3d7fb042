//! Audio track: one-shot PCM ingestion and the audio encoder
//!
//! The application hands over the whole soundtrack as one buffer of signed
//! 16-bit interleaved stereo. It is resampled to the encoder's format and
//! rate, cut into encoder-sized frames and written in a single pass.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

use super::session::{threading_for, write_packets, StreamTarget};
use crate::error::RenderError;
use crate::ffmpeg_utils::helpers;

/// Format of the PCM passed to `send_audio`
pub const INPUT_SAMPLE_FORMAT: Sample = Sample::I16(Type::Packed);
/// Bytes per stereo S16 frame
pub const INPUT_BYTES_PER_FRAME: usize = 4;
/// Audio bit rate in bps
pub const AUDIO_BIT_RATE: usize = 128_000;
/// Samples per encoder frame when the encoder does not say
pub const FALLBACK_FRAME_SIZE: usize = 1024;

/// 48 kHz if the encoder lists it, 44.1 kHz otherwise.
pub fn preferred_sample_rate<I: Iterator<Item = i32>>(rates: Option<I>) -> u32 {
    match rates {
        Some(mut rates) if rates.any(|r| r == 48_000) => 48_000,
        _ => 44_100,
    }
}

/// Reject buffers that are not whole stereo S16 frames.
pub fn validate_pcm(pcm: &[u8], sample_rate: u32) -> Result<(), RenderError> {
    if sample_rate == 0 {
        return Err(RenderError::InvalidAudioBuffer(
            "sample rate must be greater than zero".to_string(),
        ));
    }
    if pcm.len() % INPUT_BYTES_PER_FRAME != 0 {
        return Err(RenderError::InvalidAudioBuffer(format!(
            "{} bytes is not a whole number of stereo 16-bit frames",
            pcm.len()
        )));
    }
    Ok(())
}

/// Converts the ingested PCM to the encoder's format. Lives for one
/// `send_audio` call.
pub struct BatchResampler {
    context: resampling::Context,
    input_rate: u32,
    output_format: Sample,
    output_rate: u32,
}

impl BatchResampler {
    pub fn new(input_rate: u32, output_format: Sample, output_rate: u32) -> Result<Self, RenderError> {
        let context = resampling::Context::get(
            INPUT_SAMPLE_FORMAT,
            ChannelLayout::STEREO,
            input_rate,
            output_format,
            ChannelLayout::STEREO,
            output_rate,
        )
        .map_err(|e| RenderError::ResamplerCreate(e.to_string()))?;

        Ok(Self {
            context,
            input_rate,
            output_format,
            output_rate,
        })
    }

    fn output_frame(&mut self, in_samples: usize) -> Option<ffmpeg::util::frame::Audio> {
        let capacity = helpers::resampler_out_samples(&mut self.context, in_samples);
        if capacity == 0 {
            return None;
        }
        let mut out =
            ffmpeg::util::frame::Audio::new(self.output_format, capacity, ChannelLayout::STEREO);
        out.set_rate(self.output_rate);
        Some(out)
    }

    /// Convert a chunk of whole S16 stereo frames.
    pub fn convert(&mut self, chunk: &[u8]) -> Result<ffmpeg::util::frame::Audio, RenderError> {
        let frames = chunk.len() / INPUT_BYTES_PER_FRAME;
        let mut input =
            ffmpeg::util::frame::Audio::new(INPUT_SAMPLE_FORMAT, frames, ChannelLayout::STEREO);
        input.set_rate(self.input_rate);
        helpers::audio_plane_data_mut(&mut input, 0)[..chunk.len()].copy_from_slice(chunk);

        let mut out = match self.output_frame(frames) {
            Some(out) => out,
            None => {
                // Nothing can come out yet; the input still has to be consumed.
                let mut out =
                    ffmpeg::util::frame::Audio::new(self.output_format, 1, ChannelLayout::STEREO);
                out.set_rate(self.output_rate);
                out
            }
        };
        self.context
            .run(&input, &mut out)
            .map_err(|e| RenderError::Resample(e.to_string()))?;
        Ok(out)
    }

    /// Drain samples still buffered inside the resampler.
    pub fn flush(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>, RenderError> {
        let Some(mut out) = self.output_frame(0) else {
            return Ok(None);
        };
        self.context
            .flush(&mut out)
            .map_err(|e| RenderError::Resample(e.to_string()))?;
        if out.samples() == 0 {
            return Ok(None);
        }
        Ok(Some(out))
    }
}

/// Byte-level FIFO of stereo samples in an arbitrary sample format.
///
/// Planar formats keep one queue per channel; packed formats keep one.
pub struct SampleFifo {
    format: Sample,
    planes: Vec<Vec<u8>>,
    /// Bytes one sample frame occupies in each queue
    frame_stride: usize,
    silence: u8,
}

impl SampleFifo {
    pub fn new(format: Sample) -> Self {
        let channels = ChannelLayout::STEREO.channels().max(1) as usize;
        let (plane_count, frame_stride) = if format.is_planar() {
            (channels, format.bytes())
        } else {
            (1, format.bytes() * channels)
        };
        Self {
            format,
            planes: vec![Vec::new(); plane_count],
            frame_stride,
            silence: if matches!(format, Sample::U8(_)) { 0x80 } else { 0 },
        }
    }

    /// Sample frames queued.
    pub fn len(&self) -> usize {
        if self.frame_stride == 0 {
            return 0;
        }
        self.planes.first().map_or(0, |p| p.len() / self.frame_stride)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, frame: &ffmpeg::util::frame::Audio) {
        let used = frame.samples() * self.frame_stride;
        for (index, plane) in self.planes.iter_mut().enumerate() {
            let data = helpers::audio_plane_data(frame, index);
            plane.extend_from_slice(&data[..used.min(data.len())]);
        }
    }

    /// Take up to `samples` frames. With `pad`, the frame is filled up to
    /// exactly `samples` with silence.
    pub fn pop(&mut self, samples: usize, pad: bool) -> ffmpeg::util::frame::Audio {
        let available = samples.min(self.len());
        let size = if pad { samples } else { available };
        let stride = self.frame_stride;
        let silence = self.silence;

        let mut frame = ffmpeg::util::frame::Audio::new(self.format, size, ChannelLayout::STEREO);
        let used = available * stride;
        let total = size * stride;
        for (index, plane) in self.planes.iter_mut().enumerate() {
            let dst = helpers::audio_plane_data_mut(&mut frame, index);
            dst[..used].copy_from_slice(&plane[..used]);
            dst[used..total].fill(silence);
            plane.drain(..used);
        }
        frame
    }
}

/// The audio stream and its encoder.
pub struct AudioTrack {
    encoder: ffmpeg::encoder::Audio,
    pub(crate) target: StreamTarget,
    format: Sample,
    rate: u32,
    frame_size: usize,
    short_last_frame: bool,
    next_pts: i64,
    packets: usize,
}

impl AudioTrack {
    /// Add the audio stream to `output` and open its encoder.
    pub fn open(
        output: &mut Output,
        codec_id: codec::Id,
        global_header: bool,
    ) -> Result<Self, RenderError> {
        let codec = ffmpeg::encoder::find(codec_id)
            .ok_or_else(|| RenderError::AudioEncoderNotFound(codec_id.name().to_string()))?;
        let (format, rate) = {
            let caps = codec.audio().map_err(|e| {
                RenderError::AudioEncoderNotFound(format!("{}: {}", codec_id.name(), e))
            })?;
            let format = caps
                .formats()
                .and_then(|mut formats| formats.next())
                .unwrap_or(INPUT_SAMPLE_FORMAT);
            (format, preferred_sample_rate(caps.rates()))
        };
        let rate_i32 = i32::try_from(rate)
            .map_err(|_| RenderError::AudioCodecOpen(format!("sample rate {} out of range", rate)))?;
        let time_base = ffmpeg::Rational::new(1, rate_i32);

        let index = {
            let mut stream = output
                .add_stream(codec)
                .map_err(|e| RenderError::StreamCreate(e.to_string()))?;
            stream.set_time_base(time_base);
            stream.index()
        };
        helpers::set_stream_id(output, index, index as i32);

        let mut context = codec::Context::new_with_codec(codec);
        context.set_threading(threading_for(&codec));
        context.set_time_base(time_base);
        let mut audio = context
            .encoder()
            .audio()
            .map_err(|e| RenderError::AudioCodecOpen(e.to_string()))?;

        audio.set_rate(rate_i32);
        audio.set_format(format);
        audio.set_channel_layout(ChannelLayout::STEREO);
        audio.set_bit_rate(AUDIO_BIT_RATE);
        if global_header {
            audio.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = audio
            .open_as(codec)
            .map_err(|e| RenderError::AudioCodecOpen(e.to_string()))?;

        helpers::copy_encoder_parameters(output, index, &encoder)
            .map_err(|e| RenderError::AudioParameters(e.to_string()))?;

        let reported = encoder.frame_size() as usize;
        let frame_size = if reported == 0 {
            FALLBACK_FRAME_SIZE
        } else {
            reported
        };
        let short_last_frame = reported == 0
            || codec.capabilities().intersects(
                codec::Capabilities::SMALL_LAST_FRAME | codec::Capabilities::VARIABLE_FRAME_SIZE,
            );

        tracing::debug!(
            stream_index = index,
            codec = codec_id.name(),
            format = ?format,
            rate,
            frame_size,
            "Opened audio encoder"
        );

        Ok(Self {
            encoder,
            target: StreamTarget::new(index, time_base),
            format,
            rate,
            frame_size,
            short_last_frame,
            next_pts: 0,
            packets: 0,
        })
    }

    fn encode_frame(
        &mut self,
        output: &mut Output,
        mut frame: ffmpeg::util::frame::Audio,
    ) -> Result<(), RenderError> {
        frame.set_rate(self.rate);
        frame.set_pts(Some(self.next_pts));
        self.encoder
            .send_frame(&frame)
            .map_err(|e| RenderError::SendFrame(e.to_string()))?;
        self.next_pts += frame.samples() as i64;
        self.packets += write_packets(&mut self.encoder, output, &self.target)?;
        Ok(())
    }

    fn encode_ready(&mut self, output: &mut Output, fifo: &mut SampleFifo) -> Result<(), RenderError> {
        while fifo.len() >= self.frame_size {
            let frame = fifo.pop(self.frame_size, false);
            self.encode_frame(output, frame)?;
        }
        Ok(())
    }

    /// Resample, encode and write the whole PCM buffer, then flush the encoder.
    pub fn encode_batch(
        &mut self,
        output: &mut Output,
        pcm: &[u8],
        sample_rate: u32,
    ) -> Result<(), RenderError> {
        let mut resampler = BatchResampler::new(sample_rate, self.format, self.rate)?;
        let mut fifo = SampleFifo::new(self.format);

        for chunk in pcm.chunks(self.frame_size * INPUT_BYTES_PER_FRAME) {
            let converted = resampler.convert(chunk)?;
            fifo.push(&converted);
            self.encode_ready(output, &mut fifo)?;
        }

        if let Some(tail) = resampler.flush()? {
            fifo.push(&tail);
        }
        self.encode_ready(output, &mut fifo)?;

        if !fifo.is_empty() {
            let frame = fifo.pop(self.frame_size, !self.short_last_frame);
            self.encode_frame(output, frame)?;
        }

        match self.encoder.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => {}
            Err(e) => return Err(RenderError::SendFrame(e.to_string())),
        }
        self.packets += write_packets(&mut self.encoder, output, &self.target)?;

        tracing::debug!(
            input_frames = pcm.len() / INPUT_BYTES_PER_FRAME,
            encoded_samples = self.next_pts,
            packets = self.packets,
            "Audio ingested"
        );
        Ok(())
    }

    pub fn packets_written(&self) -> usize {
        self.packets
    }

    pub fn sample_rate(&self) -> u32 {
        self.rate
    }
}
