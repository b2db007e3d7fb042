//! FFmpeg utility functions

use ffmpeg_next as ffmpeg;

use ffmpeg::channel_layout::ChannelLayout;

/// Get the media type name
pub fn media_type_name(media_type: ffmpeg::media::Type) -> &'static str {
    match media_type {
        ffmpeg::media::Type::Video => "video",
        ffmpeg::media::Type::Audio => "audio",
        ffmpeg::media::Type::Subtitle => "subtitle",
        ffmpeg::media::Type::Data => "data",
        ffmpeg::media::Type::Attachment => "attachment",
        _ => "unknown",
    }
}

/// Container duration in seconds, if the demuxer knows it
pub fn input_duration_secs(input: &ffmpeg::format::context::Input) -> Option<f64> {
    let duration = input.duration();
    if duration <= 0 {
        return None;
    }
    Some(duration as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE))
}

/// Default channel layout for a bare channel count.
///
/// Used when a decoder reports a channel count without a layout mask.
pub fn layout_for_channels(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        2 => ChannelLayout::STEREO,
        3 => ChannelLayout::_2POINT1,
        4 => ChannelLayout::QUAD,
        5 => ChannelLayout::_5POINT0,
        6 => ChannelLayout::_5POINT1,
        7 => ChannelLayout::_6POINT1,
        8 => ChannelLayout::_7POINT1,
        _ => ChannelLayout::STEREO,
    }
}

/// Print stream information for debugging
pub fn debug_stream_info(stream: &ffmpeg::Stream, index: usize) {
    let codec_id = stream.parameters().id();
    let media_type = stream.parameters().medium();

    tracing::debug!(
        "Stream {}: type={}, codec={}",
        index,
        media_type_name(media_type),
        codec_id.name()
    );
}
