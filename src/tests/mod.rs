//! Integration testing module
//!
//! End-to-end tests that drive both pipelines against real files:
//! - Decoding generated WAV files through the playback buffer
//! - Rendering test-card video and a sine soundtrack to MP4
//! - Lifecycle and ordering errors of the renderer

pub mod e2e;
