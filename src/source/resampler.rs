//! Resampler for the playback pipeline
//!
//! Converts decoded frames of any sample format to interleaved signed 16-bit
//! PCM at the source's own sample rate. Sources with up to three channels
//! keep their layout; anything wider is downmixed to stereo.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

use crate::error::SourceError;
use crate::ffmpeg_utils::helpers;
use crate::ffmpeg_utils::utils::layout_for_channels;

/// Sample format handed to the playback buffer
pub const PLAYBACK_SAMPLE_FORMAT: Sample = Sample::I16(Type::Packed);
/// Widest source layout that is passed through unchanged
pub const MAX_NATIVE_CHANNELS: u16 = 3;

/// Output layout for a source with `channels` channels and layout `native`.
pub fn playback_layout(channels: u16, native: ChannelLayout) -> ChannelLayout {
    if channels > MAX_NATIVE_CHANNELS {
        return ChannelLayout::STEREO;
    }
    if native.bits() == 0 {
        layout_for_channels(channels)
    } else {
        native
    }
}

/// Input side of a conversion, used to detect mid-stream format changes.
#[derive(Debug, Clone, Copy, PartialEq)]
struct InputFormat {
    format: Sample,
    layout: ChannelLayout,
    rate: u32,
}

/// Stateful S16 converter owned by one source.
pub struct PlaybackResampler {
    context: resampling::Context,
    input: InputFormat,
    output_layout: ChannelLayout,
    output_channels: u16,
    converted: ffmpeg::util::frame::Audio,
}

impl PlaybackResampler {
    /// Create a converter for frames of `format`/`layout`/`rate`.
    pub fn new(
        format: Sample,
        layout: ChannelLayout,
        channels: u16,
        rate: u32,
    ) -> Result<Self, SourceError> {
        let input = InputFormat {
            format,
            layout: if layout.bits() == 0 {
                layout_for_channels(channels)
            } else {
                layout
            },
            rate,
        };
        let output_layout = playback_layout(channels, layout);
        let context = Self::build(input, output_layout)?;

        tracing::debug!(
            format = ?format,
            rate,
            source_channels = channels,
            output_channels = output_layout.channels(),
            "Created playback resampler"
        );

        Ok(Self {
            context,
            input,
            output_layout,
            output_channels: output_layout.channels().max(0) as u16,
            converted: ffmpeg::util::frame::Audio::empty(),
        })
    }

    fn build(
        input: InputFormat,
        output_layout: ChannelLayout,
    ) -> Result<resampling::Context, SourceError> {
        if input.rate == 0 || input.format == Sample::None {
            return Err(SourceError::ResamplerCreate(format!(
                "unusable input format {:?} at {} Hz",
                input.format, input.rate
            )));
        }
        resampling::Context::get(
            input.format,
            input.layout,
            input.rate,
            PLAYBACK_SAMPLE_FORMAT,
            output_layout,
            input.rate,
        )
        .map_err(|e| SourceError::ResamplerCreate(e.to_string()))
    }

    /// Rebuild the context if `frame` does not match the configured input.
    fn follow_input(&mut self, frame: &mut ffmpeg::util::frame::Audio) -> Result<(), SourceError> {
        let channels = frame.channels();
        if frame.channel_layout().bits() == 0 {
            frame.set_channel_layout(layout_for_channels(channels));
        }
        let seen = InputFormat {
            format: frame.format(),
            layout: frame.channel_layout(),
            rate: frame.rate(),
        };
        if seen == self.input {
            return Ok(());
        }

        tracing::debug!(
            from = ?self.input,
            to = ?seen,
            "Decoded audio format changed, rebuilding resampler"
        );
        let output_layout = playback_layout(channels, seen.layout);
        self.context = Self::build(seen, output_layout)?;
        self.input = seen;
        self.output_layout = output_layout;
        self.output_channels = output_layout.channels().max(0) as u16;
        Ok(())
    }

    /// Prepare an output frame able to hold everything `in_samples` more
    /// input samples can produce. Returns its capacity in frames.
    fn prepare_output(&mut self, in_samples: usize) -> usize {
        let capacity = helpers::resampler_out_samples(&mut self.context, in_samples);
        if capacity == 0 {
            return 0;
        }
        let mut out =
            ffmpeg::util::frame::Audio::new(PLAYBACK_SAMPLE_FORMAT, capacity, self.output_layout);
        out.set_rate(self.input.rate);
        self.converted = out;
        capacity
    }

    /// Convert one decoded frame. Returns the number of frames produced.
    pub fn convert(&mut self, frame: &mut ffmpeg::util::frame::Audio) -> Result<usize, SourceError> {
        self.follow_input(frame)?;
        if self.prepare_output(frame.samples()) == 0 {
            return Ok(0);
        }
        self.context
            .run(frame, &mut self.converted)
            .map_err(|e| SourceError::Convert(e.to_string()))?;
        Ok(self.converted.samples())
    }

    /// Drain samples still buffered inside the converter.
    pub fn flush(&mut self) -> Result<usize, SourceError> {
        if self.prepare_output(0) == 0 {
            return Ok(0);
        }
        match self.context.flush(&mut self.converted) {
            Ok(_) => Ok(self.converted.samples()),
            Err(e) => {
                tracing::debug!("Resampler flush returned non-fatal error: {}", e);
                Ok(0)
            }
        }
    }

    /// Interleaved samples of the last conversion, `frames * channels` long.
    ///
    /// Fails if the converted plane is misaligned or holds fewer samples.
    pub fn samples(&self, frames: usize) -> Result<&[i16], SourceError> {
        let count = frames
            .checked_mul(usize::from(self.output_channels))
            .ok_or_else(|| SourceError::Convert(format!("{} frames overflow", frames)))?;
        let plane = helpers::audio_plane_data(&self.converted, 0);
        helpers::s16_plane_as_i16(plane, count).ok_or_else(|| {
            SourceError::Convert(format!(
                "converted plane holds {} bytes, need {} samples",
                plane.len(),
                count
            ))
        })
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }

    pub fn rate(&self) -> u32 {
        self.input.rate
    }
}
