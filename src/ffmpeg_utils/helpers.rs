//! Safe wrappers around FFmpeg FFI calls.
//!
//! Every function in this module is `pub` and **safe** to call.  All `unsafe`
//! blocks are contained here with explicit safety arguments.  Callers outside
//! this module should never need to write `unsafe` for routine FFmpeg access.

use ffmpeg_next as ffmpeg;

// ── Codec lookup ─────────────────────────────────────────────────────────────

/// Returns `true` if a decoder is registered for `codec_id`.
pub fn decoder_exists(codec_id: ffmpeg::codec::Id) -> bool {
    // SAFETY: `avcodec_find_decoder` is thread-safe (reads a global read-only
    // registry after `ffmpeg::init()`).  The returned pointer is only used for
    // a null check; we never dereference it.
    let ptr = unsafe { ffmpeg::ffi::avcodec_find_decoder(codec_id.into()) };
    !ptr.is_null()
}

/// Names of every registered encoder implementing `codec_id`, in registry order.
pub fn encoder_names(codec_id: ffmpeg::codec::Id) -> Vec<String> {
    let wanted: ffmpeg::ffi::AVCodecID = codec_id.into();
    let mut names = Vec::new();
    let mut opaque: *mut std::ffi::c_void = std::ptr::null_mut();

    // SAFETY: `av_codec_iterate` walks the static codec registry; the
    // returned pointers stay valid for the lifetime of the process and are
    // only read here.
    unsafe {
        loop {
            let codec = ffmpeg::ffi::av_codec_iterate(&mut opaque);
            if codec.is_null() {
                break;
            }
            if (*codec).id != wanted || ffmpeg::ffi::av_codec_is_encoder(codec) == 0 {
                continue;
            }
            if (*codec).name.is_null() {
                continue;
            }
            let name = std::ffi::CStr::from_ptr((*codec).name);
            names.push(name.to_string_lossy().into_owned());
        }
    }

    names
}

/// Resolve a codec descriptor name (e.g. `"aac"`, `"h264"`) to its id.
pub fn codec_id_from_descriptor(name: &str) -> Option<ffmpeg::codec::Id> {
    let c_name = std::ffi::CString::new(name).ok()?;
    // SAFETY: the descriptor table is static; the returned pointer is either
    // null or valid for the process lifetime.
    unsafe {
        let desc = ffmpeg::ffi::avcodec_descriptor_get_by_name(c_name.as_ptr());
        if desc.is_null() {
            return None;
        }
        Some(ffmpeg::codec::Id::from((*desc).id))
    }
}

// ── Decoder setup ────────────────────────────────────────────────────────────

/// Ask the decoder to output `format` directly if it is able to.
///
/// Must be called before the decoder is opened. Decoders that cannot honor
/// the request ignore it.
pub fn set_request_sample_format(
    context: &mut ffmpeg::codec::Context,
    format: ffmpeg::format::Sample,
) {
    // SAFETY: `context.as_mut_ptr()` is valid for the lifetime of `context`.
    // `request_sample_fmt` is a plain enum field read at open time.
    unsafe {
        (*context.as_mut_ptr()).request_sample_fmt = format.into();
    }
}

/// Mark a stream as discarded so the demuxer skips its packets.
pub fn discard_stream(input: &mut ffmpeg::format::context::Input, index: usize) {
    // SAFETY: `index` comes from iterating `input.streams()`, so it is below
    // `nb_streams` and the stream pointer is non-null.
    unsafe {
        let ctx = input.as_mut_ptr();
        if index >= (*ctx).nb_streams as usize {
            return;
        }
        let stream = *(*ctx).streams.add(index);
        (*stream).discard = ffmpeg::ffi::AVDiscard::AVDISCARD_ALL;
    }
}

// ── Output context accessors ─────────────────────────────────────────────────

/// Raw `AVOutputFormat.flags` of an output context.
fn output_format_flags(output: &ffmpeg::format::context::Output) -> std::ffi::c_int {
    // SAFETY: an allocated output context always carries a non-null
    // `oformat`; `flags` is a plain int.
    unsafe {
        let ctx = output.as_ptr();
        if ctx.is_null() || (*ctx).oformat.is_null() {
            return 0;
        }
        (*(*ctx).oformat).flags
    }
}

/// `true` when the container wants codec extradata in global headers.
pub fn output_wants_global_header(output: &ffmpeg::format::context::Output) -> bool {
    output_format_flags(output) & ffmpeg::ffi::AVFMT_GLOBALHEADER as std::ffi::c_int != 0
}

/// `true` when the container writes no file of its own (e.g. `null`, `image2`).
pub fn output_is_nofile(output: &ffmpeg::format::context::Output) -> bool {
    output_format_flags(output) & ffmpeg::ffi::AVFMT_NOFILE as std::ffi::c_int != 0
}

/// Set the container-level `id` of an output stream.
pub fn set_stream_id(output: &mut ffmpeg::format::context::Output, index: usize, id: i32) {
    // SAFETY: `index` was returned by `add_stream` on this same context.
    unsafe {
        let ctx = output.as_mut_ptr();
        if index >= (*ctx).nb_streams as usize {
            return;
        }
        (*(*(*ctx).streams.add(index))).id = id;
    }
}

/// Copy the parameters of an opened encoder into output stream `index`.
pub fn copy_encoder_parameters(
    output: &mut ffmpeg::format::context::Output,
    index: usize,
    encoder: &ffmpeg::codec::Context,
) -> Result<(), ffmpeg::Error> {
    // SAFETY: the stream index belongs to this context and its `codecpar`
    // was allocated by `avformat_new_stream`. The encoder context is live.
    unsafe {
        let ctx = output.as_mut_ptr();
        if index >= (*ctx).nb_streams as usize {
            return Err(ffmpeg::Error::StreamNotFound);
        }
        let stream = *(*ctx).streams.add(index);
        let ret = ffmpeg::ffi::avcodec_parameters_from_context(
            (*stream).codecpar,
            encoder.as_ptr() as *mut _,
        );
        if ret < 0 {
            return Err(ffmpeg::Error::from(ret));
        }
    }
    Ok(())
}

/// Time base the muxer settled on for stream `index` (valid after `write_header`).
pub fn stream_time_base(
    output: &ffmpeg::format::context::Output,
    index: usize,
) -> Option<ffmpeg::Rational> {
    output.stream(index).map(|s| s.time_base())
}

// ── Frame helpers ────────────────────────────────────────────────────────────

/// Ensure the frame's buffers are not shared with the encoder before writing.
pub fn frame_make_writable(frame: &mut ffmpeg::util::frame::Video) -> Result<(), ffmpeg::Error> {
    // SAFETY: the frame pointer is valid for the lifetime of `frame`;
    // `av_frame_make_writable` may reallocate the data buffers in place.
    let ret = unsafe { ffmpeg::ffi::av_frame_make_writable(frame.as_mut_ptr()) };
    if ret < 0 {
        return Err(ffmpeg::Error::from(ret));
    }
    Ok(())
}

/// `true` when the frame owns allocated image buffers.
pub fn video_frame_has_buffer(frame: &ffmpeg::util::frame::Video) -> bool {
    // SAFETY: reading `data[0]` only for a null check.
    unsafe { !(*frame.as_ptr()).data[0].is_null() }
}

/// Upper bound on output samples the resampler produces for `in_samples`
/// more input samples, counting what it already buffers.
pub fn resampler_out_samples(
    context: &mut ffmpeg::software::resampling::Context,
    in_samples: usize,
) -> usize {
    // SAFETY: the context is initialized by `Context::get`; the call only
    // reads its internal delay.
    let n = unsafe {
        ffmpeg::ffi::swr_get_out_samples(context.as_mut_ptr(), in_samples as std::ffi::c_int)
    };
    n.max(0) as usize
}

// ── Audio plane access ───────────────────────────────────────────────────────

/// Reinterpret a raw byte slice from an S16 audio plane as `&[i16]`.
///
/// Returns `None` if the pointer is not 2-byte aligned or the slice holds
/// fewer than `sample_count` samples.
pub fn s16_plane_as_i16(byte_slice: &[u8], sample_count: usize) -> Option<&[i16]> {
    if sample_count == 0 {
        return Some(&[]);
    }
    let expected_bytes = sample_count.checked_mul(2)?;
    if byte_slice.len() < expected_bytes {
        return None;
    }
    let ptr = byte_slice.as_ptr();
    if !(ptr as usize).is_multiple_of(std::mem::align_of::<i16>()) {
        return None;
    }
    // SAFETY: alignment and length are verified above.  S16 planes are
    // native-endian i16 values laid out contiguously.
    Some(unsafe { std::slice::from_raw_parts(ptr as *const i16, sample_count) })
}

/// Extract an audio plane slice from an `AVFrame`.
///
/// Works around a bug in `ffmpeg-next`'s `Audio::data(index)` method where it
/// stops counting planes if `linesize[1] == 0`. In FFmpeg, planar audio frames
/// often only populate `linesize[0]` to represent the size of *every* plane.
pub fn audio_plane_data(frame: &ffmpeg::util::frame::Audio, index: usize) -> &[u8] {
    unsafe {
        let f = frame.as_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        let is_planar = frame.format().is_planar();
        if is_planar {
            if index >= channels {
                return &[];
            }
        } else if index > 0 {
            return &[];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &[];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &[];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts(plane_ptr, size)
    }
}

/// Mutable version of `audio_plane_data`.
pub fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    unsafe {
        let f = frame.as_mut_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        let is_planar = frame.format().is_planar();
        if is_planar {
            if index >= channels {
                return &mut [];
            }
        } else if index > 0 {
            return &mut [];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &mut [];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &mut [];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts_mut(plane_ptr, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s16_plane_reinterpret() {
        let samples: [i16; 4] = [1, -1, 300, -300];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
        // Vec<u8> is not guaranteed 2-aligned, so allow either outcome but
        // check the values when it succeeds.
        if let Some(view) = s16_plane_as_i16(&bytes, 4) {
            assert_eq!(view, &samples);
        }
        assert!(s16_plane_as_i16(&bytes, 5).is_none());
        assert_eq!(s16_plane_as_i16(&[], 0), Some(&[] as &[i16]));
    }

    #[test]
    fn test_codec_lookup() {
        ffmpeg::init().unwrap();
        assert_eq!(
            codec_id_from_descriptor("aac"),
            Some(ffmpeg::codec::Id::AAC)
        );
        assert_eq!(codec_id_from_descriptor("definitely-not-a-codec"), None);
        assert!(decoder_exists(ffmpeg::codec::Id::PCM_S16LE));
        assert!(encoder_names(ffmpeg::codec::Id::PCM_S16LE)
            .iter()
            .any(|n| n == "pcm_s16le"));
    }
}
