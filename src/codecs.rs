//! Encoder introspection

use ffmpeg_next as ffmpeg;

use crate::error::FfmpegError;
use crate::ffmpeg_utils::helpers;

/// Names of every registered encoder for `codec_id`.
///
/// A codec family can have several implementations (e.g. `libx264` and
/// `h264_nvenc` for H.264); all of them are returned in registry order.
pub fn list_available_encoders(codec_id: ffmpeg::codec::Id) -> Vec<String> {
    let names = helpers::encoder_names(codec_id);
    tracing::debug!(codec = codec_id.name(), count = names.len(), "Listed encoders");
    names
}

/// Resolve a codec name to its id.
///
/// Accepts codec descriptor names (`"h264"`, `"aac"`) as well as encoder
/// names (`"libx264"`).
pub fn codec_id_by_name(name: &str) -> Result<ffmpeg::codec::Id, FfmpegError> {
    if let Some(id) = helpers::codec_id_from_descriptor(name) {
        return Ok(id);
    }
    if let Some(codec) = ffmpeg::encoder::find_by_name(name) {
        return Ok(codec.id());
    }
    Err(FfmpegError::UnknownCodec(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_pcm_encoders() {
        crate::init().unwrap();
        let names = list_available_encoders(ffmpeg::codec::Id::PCM_S16LE);
        assert_eq!(names, vec!["pcm_s16le".to_string()]);
    }

    #[test]
    fn test_list_includes_builtin_mpeg4() {
        crate::init().unwrap();
        if ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4).is_none() {
            return;
        }
        let names = list_available_encoders(ffmpeg::codec::Id::MPEG4);
        assert!(names.iter().any(|n| n == "mpeg4"));
    }

    #[test]
    fn test_no_encoders_for_decoder_only_codec() {
        crate::init().unwrap();
        assert!(list_available_encoders(ffmpeg::codec::Id::VP6).is_empty());
    }

    #[test]
    fn test_codec_id_by_name() {
        crate::init().unwrap();
        assert_eq!(codec_id_by_name("aac").unwrap(), ffmpeg::codec::Id::AAC);
        assert_eq!(codec_id_by_name("mpeg4").unwrap(), ffmpeg::codec::Id::MPEG4);
        assert_eq!(codec_id_by_name("pcm_s16le").unwrap(), ffmpeg::codec::Id::PCM_S16LE);
        assert!(matches!(
            codec_id_by_name("not-a-codec"),
            Err(FfmpegError::UnknownCodec(_))
        ));
    }
}
