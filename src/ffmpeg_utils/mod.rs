//! FFmpeg module - provides wrappers and utilities for FFmpeg library access
//!
//! This module handles:
//! - FFmpeg initialization
//! - Routing FFmpeg's own log output into `tracing`
//! - Input/output context allocation with distinct failure reporting
//! - Raw field accessors that `ffmpeg-next` does not expose safely

pub mod helpers;
pub mod io;
pub mod utils;

pub use ffmpeg_next as ffmpeg;
#[allow(unused_imports)]
pub use utils::*;

/// Initialize the FFmpeg library.
///
/// Call once before opening sources or renderers. Repeated calls are
/// harmless.
pub fn init() -> Result<(), crate::error::FfmpegError> {
    ffmpeg::init().map_err(|e| {
        crate::error::FfmpegError::InitFailed(format!("ffmpeg::init() failed: {}", e))
    })?;

    tracing::debug!("FFmpeg initialized");

    Ok(())
}

/// Install a custom FFmpeg log callback that forwards messages to `tracing`.
///
/// Messages at `AV_LOG_WARNING` and above are forwarded under the `ffmpeg`
/// target; a handful of known-benign lines are dropped.
///
/// **Safety & Ordering:** Must be called after `init()` and before any other
/// thread starts using FFmpeg, because altering the global log callback is not
/// thread-safe.
pub fn install_log_filter() {
    // SAFETY: both functions modify global FFmpeg state and are safe to call
    // after `ffmpeg::init()`. They are called once at startup.
    unsafe {
        ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_WARNING as i32);
        ffmpeg_next::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Messages that are expected during normal decode/encode and should be suppressed.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "Could not update timestamps for skipped samples",
    "Could not update timestamps for discarded samples",
    "Estimating duration from bitrate, this may be inaccurate",
    "Guessed Channel Layout",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg_next::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg_next::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg_next::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() {
        return;
    }

    for suppressed in SUPPRESSED_MESSAGES {
        if msg.contains(suppressed) {
            return;
        }
    }

    if level <= ffmpeg_next::ffi::AV_LOG_ERROR as i32 {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg_next::ffi::AV_LOG_WARNING as i32 {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::debug!(target: "ffmpeg", "{}", msg);
    }
}

/// Version of the linked libavcodec, as `major.minor.micro`.
pub fn version_info() -> String {
    let v = ffmpeg::codec::version();
    format!("libavcodec {}.{}.{}", v >> 16, (v >> 8) & 0xff, v & 0xff)
}
