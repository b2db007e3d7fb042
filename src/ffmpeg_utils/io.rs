//! Opening input and output format contexts.
//!
//! `ffmpeg::format::input` folds every failure into one error. The source
//! pipeline reports allocation, open and probe failures separately, so the
//! steps are done by hand here.

use std::ffi::CString;
use std::path::Path;
use std::ptr;

use ffmpeg_next as ffmpeg;

use crate::error::SourceError;

/// Container used when the output path does not name a known format.
pub const FALLBACK_OUTPUT_FORMAT: &std::ffi::CStr = c"mpeg";

/// Open `path` for demuxing and probe its stream info.
pub fn open_input(path: &Path) -> Result<ffmpeg::format::context::Input, SourceError> {
    let display = path.display().to_string();
    let c_path =
        CString::new(path.to_string_lossy().as_bytes()).map_err(|_| SourceError::OpeningFailed {
            path: display.clone(),
            reason: "path contains a NUL byte".to_string(),
        })?;

    // SAFETY: the context pointer is either null (checked) or owned by us
    // until it is handed to `Input::wrap`. `avformat_open_input` frees the
    // context itself on failure; after a failed probe we close it explicitly.
    unsafe {
        let mut ctx = ffmpeg::ffi::avformat_alloc_context();
        if ctx.is_null() {
            return Err(SourceError::CreatingContextFailed);
        }

        let ret = ffmpeg::ffi::avformat_open_input(
            &mut ctx,
            c_path.as_ptr(),
            ptr::null_mut(),
            ptr::null_mut(),
        );
        if ret < 0 {
            return Err(SourceError::OpeningFailed {
                path: display,
                reason: ffmpeg::Error::from(ret).to_string(),
            });
        }

        let ret = ffmpeg::ffi::avformat_find_stream_info(ctx, ptr::null_mut());
        if ret < 0 {
            ffmpeg::ffi::avformat_close_input(&mut ctx);
            return Err(SourceError::NoStreamInfoFound {
                path: display,
                reason: ffmpeg::Error::from(ret).to_string(),
            });
        }

        Ok(ffmpeg::format::context::Input::wrap(ctx))
    }
}

/// Allocate an output context, guessing the container from the path.
///
/// Falls back to MPEG program stream when nothing matches the extension.
pub fn alloc_output(path: &str) -> Result<ffmpeg::format::context::Output, ffmpeg::Error> {
    let c_path = CString::new(path).map_err(|_| ffmpeg::Error::InvalidData)?;

    // SAFETY: on success the allocated context is handed to `Output::wrap`,
    // which takes ownership and frees it on drop.
    unsafe {
        let mut ctx = ptr::null_mut();
        let ret = ffmpeg::ffi::avformat_alloc_output_context2(
            &mut ctx,
            ptr::null_mut(),
            ptr::null(),
            c_path.as_ptr(),
        );
        if ret < 0 || ctx.is_null() {
            tracing::warn!(
                path,
                "Couldn't deduce output format from file extension, using MPEG"
            );
            let ret = ffmpeg::ffi::avformat_alloc_output_context2(
                &mut ctx,
                ptr::null_mut(),
                FALLBACK_OUTPUT_FORMAT.as_ptr(),
                c_path.as_ptr(),
            );
            if ret < 0 {
                return Err(ffmpeg::Error::from(ret));
            }
            if ctx.is_null() {
                return Err(ffmpeg::Error::Unknown);
            }
        }

        Ok(ffmpeg::format::context::Output::wrap(ctx))
    }
}

/// Open the byte-level output for `path`, unless the container writes no file.
///
/// The handle is closed when the `Output` is dropped.
pub fn open_output_io(
    output: &mut ffmpeg::format::context::Output,
    path: &str,
) -> Result<(), ffmpeg::Error> {
    if super::helpers::output_is_nofile(output) {
        return Ok(());
    }

    let c_path = CString::new(path).map_err(|_| ffmpeg::Error::InvalidData)?;

    // SAFETY: `pb` belongs to this context; `avio_open` stores the new
    // handle there and `Output`'s destructor closes it.
    unsafe {
        let ctx = output.as_mut_ptr();
        let ret = ffmpeg::ffi::avio_open(
            &mut (*ctx).pb,
            c_path.as_ptr(),
            ffmpeg::ffi::AVIO_FLAG_WRITE as std::ffi::c_int,
        );
        if ret < 0 {
            return Err(ffmpeg::Error::from(ret));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_input() {
        ffmpeg::init().unwrap();
        let err = open_input(Path::new("/nonexistent/dir/missing.wav")).unwrap_err();
        assert!(matches!(err, SourceError::OpeningFailed { .. }));
        assert_eq!(err.code(), -51);
    }

    #[test]
    fn test_alloc_output_by_extension() {
        ffmpeg::init().unwrap();
        let output = alloc_output("clip.mp4").unwrap();
        assert_eq!(output.format().name(), "mp4");
    }

    #[test]
    fn test_alloc_output_falls_back_to_mpeg() {
        ffmpeg::init().unwrap();
        let output = alloc_output("clip.unknownext").unwrap();
        assert_eq!(output.format().name(), "mpeg");
    }
}
