//! Video track: RGBA→YUV conversion and the video encoder

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;

use super::options::RenderOptions;
use super::session::{threading_for, write_packets, StreamTarget};
use crate::error::RenderError;
use crate::ffmpeg_utils::helpers;

/// Pixel format fed to every video encoder
pub const VIDEO_PIXEL_FORMAT: Pixel = Pixel::YUV420P;
/// Layout of application frames
pub const INPUT_PIXEL_FORMAT: Pixel = Pixel::RGBA;

/// Converts tightly packed RGBA buffers into encoder frames.
pub struct PixelConverter {
    context: scaling::Context,
    staging: ffmpeg::util::frame::Video,
    row_bytes: usize,
    height: usize,
}

impl PixelConverter {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let context = scaling::Context::get(
            INPUT_PIXEL_FORMAT,
            width,
            height,
            VIDEO_PIXEL_FORMAT,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| RenderError::ScalerCreate(e.to_string()))?;

        Ok(Self {
            context,
            staging: ffmpeg::util::frame::Video::new(INPUT_PIXEL_FORMAT, width, height),
            row_bytes: width as usize * 4,
            height: height as usize,
        })
    }

    /// Bytes one input frame must have.
    pub fn frame_bytes(&self) -> usize {
        self.row_bytes * self.height
    }

    /// Convert `rgba` into `dst`, which must be writable.
    pub fn convert(
        &mut self,
        rgba: &[u8],
        dst: &mut ffmpeg::util::frame::Video,
    ) -> Result<(), RenderError> {
        if rgba.len() != self.frame_bytes() {
            return Err(RenderError::InvalidFrameSize {
                expected: self.frame_bytes(),
                actual: rgba.len(),
            });
        }

        // The staging frame rows may be padded past width * 4.
        let stride = self.staging.stride(0);
        let plane = self.staging.data_mut(0);
        for (y, row) in rgba.chunks_exact(self.row_bytes).enumerate() {
            let start = y * stride;
            plane[start..start + self.row_bytes].copy_from_slice(row);
        }

        self.context
            .run(&self.staging, dst)
            .map_err(|e| RenderError::ScaleFailed(e.to_string()))
    }
}

/// The video stream and its encoder.
pub struct VideoTrack {
    encoder: ffmpeg::encoder::Video,
    frame: ffmpeg::util::frame::Video,
    pub(crate) target: StreamTarget,
    frame_bytes: usize,
    next_pts: i64,
    packets: usize,
}

impl VideoTrack {
    /// Add the video stream to `output` and open its encoder.
    pub fn open(
        output: &mut Output,
        options: &RenderOptions,
        codec_id: codec::Id,
        global_header: bool,
    ) -> Result<Self, RenderError> {
        let codec = ffmpeg::encoder::find(codec_id)
            .ok_or_else(|| RenderError::VideoEncoderNotFound(codec_id.name().to_string()))?;
        let fps = i32::try_from(options.framerate).map_err(|_| RenderError::InvalidFramerate)?;
        let time_base = ffmpeg::Rational::new(1, fps);

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
        let mut video = context
            .encoder()
            .video()
            .map_err(|e| RenderError::VideoCodecOpen(e.to_string()))?;

        video.set_width(options.width);
        video.set_height(options.height);
        video.set_format(VIDEO_PIXEL_FORMAT);
        video.set_time_base(time_base);
        video.set_frame_rate(Some(ffmpeg::Rational::new(fps, 1)));
        video.set_bit_rate(options.bit_rate);
        video.set_gop(options.gop_size);
        video.set_max_b_frames(if codec_id == codec::Id::MPEG2VIDEO { 2 } else { 1 });
        if codec_id == codec::Id::MPEG1VIDEO {
            // Some MPEG-1 macroblocks would otherwise be badly coded.
            video.set_mb_decision(codec::encoder::Decision::RateDistortion);
        }
        if global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = ffmpeg::Dictionary::new();
        if codec_id == codec::Id::H264 {
            opts.set("preset", &options.h264_preset);
        }

        let encoder = video
            .open_as_with(codec, opts)
            .map_err(|e| RenderError::VideoCodecOpen(e.to_string()))?;

        let frame =
            ffmpeg::util::frame::Video::new(VIDEO_PIXEL_FORMAT, options.width, options.height);
        if !helpers::video_frame_has_buffer(&frame) {
            return Err(RenderError::FrameAlloc(format!(
                "{}x{} {:?}",
                options.width, options.height, VIDEO_PIXEL_FORMAT
            )));
        }

        helpers::copy_encoder_parameters(output, index, &encoder)
            .map_err(|e| RenderError::VideoParameters(e.to_string()))?;

        tracing::debug!(
            stream_index = index,
            codec = codec_id.name(),
            width = options.width,
            height = options.height,
            framerate = options.framerate,
            "Opened video encoder"
        );

        Ok(Self {
            encoder,
            frame,
            target: StreamTarget::new(index, time_base),
            frame_bytes: options.frame_bytes(),
            next_pts: 0,
            packets: 0,
        })
    }

    /// Convert, encode and write one RGBA frame.
    ///
    /// The presentation timestamp only advances once the encoder has
    /// accepted the frame.
    pub fn send_frame(
        &mut self,
        output: &mut Output,
        converter: &mut PixelConverter,
        rgba: &[u8],
    ) -> Result<(), RenderError> {
        if rgba.len() != self.frame_bytes {
            return Err(RenderError::InvalidFrameSize {
                expected: self.frame_bytes,
                actual: rgba.len(),
            });
        }

        helpers::frame_make_writable(&mut self.frame)
            .map_err(|e| RenderError::FrameNotWritable(e.to_string()))?;
        converter.convert(rgba, &mut self.frame)?;

        self.frame.set_pts(Some(self.next_pts));
        self.encoder
            .send_frame(&self.frame)
            .map_err(|e| RenderError::SendFrame(e.to_string()))?;
        self.next_pts += 1;

        self.packets += write_packets(&mut self.encoder, output, &self.target)?;
        Ok(())
    }

    /// Signal end of stream and write every remaining packet.
    pub fn finish(&mut self, output: &mut Output) -> Result<(), RenderError> {
        match self.encoder.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => {}
            Err(e) => return Err(RenderError::SendFrame(e.to_string())),
        }
        self.packets += write_packets(&mut self.encoder, output, &self.target)?;
        Ok(())
    }

    /// Frames accepted by the encoder so far.
    pub fn frames_sent(&self) -> u64 {
        self.next_pts as u64
    }

    pub fn packets_written(&self) -> usize {
        self.packets
    }
}
