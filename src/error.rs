use thiserror::Error;

/// Main error type for the media pipelines
#[derive(Error, Debug)]
pub enum MediaError {
    /// An error originating from FFmpeg setup or lookup
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// Opening or decoding an audio source failed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The playback buffer rejected a request
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// Building or feeding an output container failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or resolved
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MediaError {
    /// Negative status code for callers that speak integers.
    pub fn status_code(&self) -> i32 {
        match self {
            MediaError::Ffmpeg(e) => e.code(),
            MediaError::Source(e) => e.code(),
            MediaError::Playback(e) => e.code(),
            MediaError::Render(e) => e.code(),
            MediaError::Io(_) => -71,
            MediaError::Config(_) => -72,
        }
    }
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// No encoder or decoder is registered under the given name
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),
}

impl FfmpegError {
    pub fn code(&self) -> i32 {
        -70
    }
}

/// Errors from opening and decoding an audio source
#[derive(Error, Debug)]
pub enum SourceError {
    /// The demuxer context could not be allocated
    #[error("Failed to allocate demuxer context")]
    CreatingContextFailed,

    /// The container could not be opened
    #[error("Failed to open {path}: {reason}")]
    OpeningFailed { path: String, reason: String },

    /// Stream metadata probing failed
    #[error("No stream info found in {path}: {reason}")]
    NoStreamInfoFound { path: String, reason: String },

    /// No audio stream with an available decoder
    #[error("No usable audio track in {0}")]
    NoUsableAudioTrack(String),

    /// The decoder for the selected track could not be created or opened
    #[error("Failed to create decoder: {0}")]
    DecoderCreate(String),

    /// The playback resampler could not be created
    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    /// Reading or decoding a packet failed
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// Converting a decoded frame to the playback format failed
    #[error("Failed to convert audio frame: {0}")]
    Convert(String),
}

impl SourceError {
    pub fn code(&self) -> i32 {
        match self {
            SourceError::CreatingContextFailed => -50,
            SourceError::OpeningFailed { .. } => -51,
            SourceError::NoStreamInfoFound { .. } => -52,
            SourceError::NoUsableAudioTrack(_) => -53,
            SourceError::DecoderCreate(_) => -54,
            SourceError::ResamplerCreate(_) => -55,
            SourceError::Decode(_) => -56,
            SourceError::Convert(_) => -57,
        }
    }
}

/// Errors from the decode-ahead playback buffer
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// More frames were requested than the buffer can ever hold
    #[error("Requested {requested} frames but buffer capacity is {capacity}")]
    RequestTooLarge { requested: usize, capacity: usize },

    /// The underlying source failed while filling the buffer
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl PlaybackError {
    pub fn code(&self) -> i32 {
        match self {
            PlaybackError::RequestTooLarge { .. } => -60,
            PlaybackError::Source(e) => e.code(),
        }
    }
}

/// Errors from the render (encode/mux) pipeline.
///
/// Each variant maps to a distinct negative status code, see [`RenderError::code`].
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Renderer already open")]
    AlreadyOpen,

    #[error("Output path is not set")]
    PathNotSet,

    #[error("Video codec not set")]
    VideoCodecNotSet,

    #[error("Couldn't allocate output context for {0}")]
    ContainerAlloc(String),

    #[error("Video encoder not found: {0}")]
    VideoEncoderNotFound(String),

    #[error("Couldn't create stream: {0}")]
    StreamCreate(String),

    #[error("Couldn't open video codec: {0}")]
    VideoCodecOpen(String),

    #[error("Couldn't allocate frame: {0}")]
    FrameAlloc(String),

    #[error("Couldn't copy video stream params: {0}")]
    VideoParameters(String),

    #[error("Couldn't open output file: {0}")]
    OutputIo(String),

    #[error("Error when writing header: {0}")]
    WriteHeader(String),

    #[error("Couldn't create pixel converter: {0}")]
    ScalerCreate(String),

    #[error("Audio encoder not found: {0}")]
    AudioEncoderNotFound(String),

    #[error("Couldn't open audio codec: {0}")]
    AudioCodecOpen(String),

    #[error("Couldn't copy audio stream params: {0}")]
    AudioParameters(String),

    #[error("Resolution {width}x{height} must be non-zero and divisible by 2")]
    InvalidResolution { width: u32, height: u32 },

    #[error("Framerate must be greater than zero")]
    InvalidFramerate,

    #[error("Renderer isn't open")]
    NotOpen,

    #[error("Audio codec set but audio not added yet")]
    AudioNotAdded,

    #[error("Video frame is not writable: {0}")]
    FrameNotWritable(String),

    #[error("Frame buffer is {actual} bytes, expected {expected}")]
    InvalidFrameSize { expected: usize, actual: usize },

    #[error("Scaling frame data failed: {0}")]
    ScaleFailed(String),

    #[error("Error sending frame to encoder: {0}")]
    SendFrame(String),

    #[error("Error receiving packet from encoder: {0}")]
    Encode(String),

    #[error("Error writing output packet: {0}")]
    WritePacket(String),

    #[error("Audio not enabled for this renderer")]
    AudioNotEnabled,

    #[error("Audio already added")]
    AudioAlreadyAdded,

    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    #[error("Error during resampling: {0}")]
    Resample(String),

    #[error("Invalid audio buffer: {0}")]
    InvalidAudioBuffer(String),

    #[error("Error when writing trailer: {0}")]
    WriteTrailer(String),
}

impl RenderError {
    pub fn code(&self) -> i32 {
        match self {
            RenderError::AlreadyOpen => -1,
            RenderError::PathNotSet => -2,
            RenderError::VideoCodecNotSet => -3,
            RenderError::ContainerAlloc(_) => -4,
            RenderError::VideoEncoderNotFound(_) => -5,
            RenderError::StreamCreate(_) => -6,
            RenderError::VideoCodecOpen(_) => -7,
            RenderError::FrameAlloc(_) => -8,
            RenderError::VideoParameters(_) => -9,
            RenderError::OutputIo(_) => -10,
            RenderError::WriteHeader(_) => -11,
            RenderError::ScalerCreate(_) => -12,
            RenderError::AudioEncoderNotFound(_) => -13,
            RenderError::AudioCodecOpen(_) => -14,
            RenderError::AudioParameters(_) => -15,
            RenderError::InvalidResolution { .. } => -16,
            RenderError::InvalidFramerate => -17,
            RenderError::NotOpen => -20,
            RenderError::AudioNotAdded => -21,
            RenderError::FrameNotWritable(_) => -22,
            RenderError::InvalidFrameSize { .. } => -23,
            RenderError::ScaleFailed(_) => -24,
            RenderError::SendFrame(_) => -25,
            RenderError::Encode(_) => -26,
            RenderError::WritePacket(_) => -27,
            RenderError::AudioNotEnabled => -30,
            RenderError::AudioAlreadyAdded => -31,
            RenderError::ResamplerCreate(_) => -32,
            RenderError::Resample(_) => -33,
            RenderError::InvalidAudioBuffer(_) => -34,
            RenderError::WriteTrailer(_) => -40,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_codes_are_distinct() {
        let errors = vec![
            RenderError::AlreadyOpen,
            RenderError::PathNotSet,
            RenderError::VideoCodecNotSet,
            RenderError::ContainerAlloc(String::new()),
            RenderError::VideoEncoderNotFound(String::new()),
            RenderError::StreamCreate(String::new()),
            RenderError::VideoCodecOpen(String::new()),
            RenderError::FrameAlloc(String::new()),
            RenderError::VideoParameters(String::new()),
            RenderError::OutputIo(String::new()),
            RenderError::WriteHeader(String::new()),
            RenderError::ScalerCreate(String::new()),
            RenderError::AudioEncoderNotFound(String::new()),
            RenderError::AudioCodecOpen(String::new()),
            RenderError::AudioParameters(String::new()),
            RenderError::InvalidResolution {
                width: 0,
                height: 0,
            },
            RenderError::InvalidFramerate,
            RenderError::NotOpen,
            RenderError::AudioNotAdded,
            RenderError::FrameNotWritable(String::new()),
            RenderError::InvalidFrameSize {
                expected: 0,
                actual: 0,
            },
            RenderError::ScaleFailed(String::new()),
            RenderError::SendFrame(String::new()),
            RenderError::Encode(String::new()),
            RenderError::WritePacket(String::new()),
            RenderError::AudioNotEnabled,
            RenderError::AudioAlreadyAdded,
            RenderError::ResamplerCreate(String::new()),
            RenderError::Resample(String::new()),
            RenderError::InvalidAudioBuffer(String::new()),
            RenderError::WriteTrailer(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        assert!(codes.iter().all(|c| *c < 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_status_code_passthrough() {
        let err = MediaError::from(SourceError::NoUsableAudioTrack("a.mkv".into()));
        assert_eq!(err.status_code(), -53);

        let err = MediaError::from(PlaybackError::Source(SourceError::CreatingContextFailed));
        assert_eq!(err.status_code(), -50);

        let err = MediaError::from(RenderError::AudioAlreadyAdded);
        assert_eq!(err.status_code(), -31);
    }
}
