//! Render settings

use ffmpeg_next as ffmpeg;

use crate::error::RenderError;

/// Everything needed to open an output container.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Output path; the container is guessed from its extension
    pub path: String,
    pub video_codec: Option<ffmpeg::codec::Id>,
    /// Audio is only rendered when both this and `sample_rate` are set
    pub audio_codec: Option<ffmpeg::codec::Id>,
    pub width: u32,
    pub height: u32,
    /// Frames per second; also the video time base denominator
    pub framerate: u32,
    /// Video bit rate in bps
    pub bit_rate: usize,
    /// Keyframe interval in frames
    pub gop_size: u32,
    /// x264 preset, applied to H.264 only
    pub h264_preset: String,
    /// Sample rate of the PCM that will be passed to `send_audio`
    pub sample_rate: Option<u32>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            path: String::new(),
            video_codec: None,
            audio_codec: None,
            width: 1280,
            height: 720,
            framerate: 30,
            bit_rate: 2_000_000,
            gop_size: 12,
            h264_preset: "medium".to_string(),
            sample_rate: None,
        }
    }
}

impl RenderOptions {
    pub fn new(path: impl Into<String>, video_codec: ffmpeg::codec::Id) -> Self {
        Self {
            path: path.into(),
            video_codec: Some(video_codec),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_audio(mut self, codec: ffmpeg::codec::Id, sample_rate: u32) -> Self {
        self.audio_codec = Some(codec);
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Check the settings that can be rejected without touching FFmpeg.
    ///
    /// Returns the video codec id on success.
    pub fn validate(&self) -> Result<ffmpeg::codec::Id, RenderError> {
        if self.path.is_empty() {
            return Err(RenderError::PathNotSet);
        }
        let video_codec = self.video_codec.ok_or(RenderError::VideoCodecNotSet)?;
        if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(RenderError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        if self.framerate == 0 || i32::try_from(self.framerate).is_err() {
            return Err(RenderError::InvalidFramerate);
        }
        Ok(video_codec)
    }

    /// The audio codec, if audio will actually be rendered.
    pub fn audio_codec(&self) -> Option<ffmpeg::codec::Id> {
        match (self.audio_codec, self.sample_rate) {
            (Some(codec), Some(rate)) if rate > 0 => Some(codec),
            (Some(codec), _) => {
                tracing::warn!(
                    codec = codec.name(),
                    "Audio codec set but no sample rate, audio disabled"
                );
                None
            }
            (None, _) => None,
        }
    }

    /// Bytes of RGBA data expected per video frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}
