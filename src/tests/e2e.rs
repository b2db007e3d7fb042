//! End-to-end integration tests
//!
//! Decode: generated WAV files pulled through `Playback`.
//! Render: test-card frames and a sine soundtrack written to MP4, then read
//! back with FFmpeg and the `mp4` crate.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::Rescale;

use crate::config::PlaybackConfig;
use crate::error::{RenderError, SourceError};
use crate::ffmpeg::codec::Id;
use crate::tests::fixtures::{self, WAV_RATE};
use crate::render::AudioState;
use crate::{load_source, testcard, Playback, RenderOptions, Renderer, StereoFrame};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn setup() {
    crate::init().expect("ffmpeg init");
}

/// Pull everything out of `path` through a playback buffer.
fn drain(path: &Path) -> (Vec<StereoFrame>, u16, u32) {
    let source = load_source(path).expect("open source");
    let channels = source.output_channels();
    let rate = source.sample_rate();
    let mut playback = Playback::new(source, &PlaybackConfig { buffer_secs: 0.25 });
    playback.start(0.0);

    let mut all = Vec::new();
    let mut block = vec![StereoFrame::default(); 512];
    while !playback.is_exhausted() {
        let n = playback.mix_padded(&mut block).expect("mix");
        if n == 0 {
            break;
        }
        all.extend_from_slice(&block[..n]);
    }
    assert_eq!(playback.frames_delivered(), all.len() as u64);
    (all, channels, rate)
}

fn frame(index: u64, framerate: u32) -> Vec<u8> {
    testcard::solid_frame(WIDTH, HEIGHT, testcard::color_for_frame(index, framerate))
}

fn video_options(path: &Path, framerate: u32) -> RenderOptions {
    RenderOptions::new(path.to_string_lossy(), Id::MPEG4)
        .with_size(WIDTH, HEIGHT)
        .with_framerate(framerate)
}

fn can_render_video() -> bool {
    setup();
    if !fixtures::has_encoder(Id::MPEG4) {
        eprintln!("MPEG-4 encoder not available, skipping");
        return false;
    }
    true
}

fn can_render_audio() -> bool {
    if !can_render_video() {
        return false;
    }
    if !fixtures::has_encoder(Id::AAC) {
        eprintln!("AAC encoder not available, skipping");
        return false;
    }
    true
}

/// Render one frame with `pcm` as soundtrack, calling `send_audio` `calls`
/// times. Returns the summary and the audio stream's frame count on disk.
fn render_with_audio(path: &Path, pcm: &[u8], calls: usize) -> (crate::RenderSummary, i64) {
    let mut renderer = Renderer::new();
    renderer
        .open(&video_options(path, 10).with_audio(Id::AAC, 44_100))
        .unwrap();
    renderer.send_audio(pcm, 44_100).unwrap();
    for _ in 1..calls {
        let err = renderer.send_audio(pcm, 44_100).unwrap_err();
        assert_eq!(err.code(), RenderError::AudioAlreadyAdded.code());
        assert_eq!(renderer.audio_state(), Some(AudioState::Added));
    }
    renderer.send_frame(&frame(0, 10)).unwrap();
    let summary = renderer.close().unwrap();

    let input = ffmpeg::format::input(path).unwrap();
    let audio = input.streams().best(ffmpeg::media::Type::Audio).unwrap();
    (summary, audio.frames())
}

fn rms(frames: &[StereoFrame], pick: fn(&StereoFrame) -> f32) -> f64 {
    let sum: f64 = frames.iter().map(|f| f64::from(pick(f)).powi(2)).sum();
    (sum / frames.len().max(1) as f64).sqrt()
}

// ── decode ───────────────────────────────────────────────────────────────

#[test]
fn test_decode_stereo_keeps_channels_apart() {
    setup();
    let media = fixtures::stereo_wav();
    let (frames, channels, rate) = drain(media.path());

    assert_eq!(channels, 2);
    assert_eq!(rate, WAV_RATE);
    assert_eq!(frames.len(), media.frames);
    let mid = frames[frames.len() / 2];
    assert!((mid.left - 16_000.0 / 32_767.0).abs() < 1e-4);
    assert!((mid.right + 8_000.0 / 32_767.0).abs() < 1e-4);
}

#[test]
fn test_decode_mono_is_duplicated() {
    setup();
    let media = fixtures::mono_wav();
    let source = load_source(media.path()).expect("open mono");
    assert_eq!(source.source_channels(), media.channels);
    assert_eq!(source.output_channels(), 1);
    drop(source);

    let (frames, _, _) = drain(media.path());
    assert_eq!(frames.len(), media.frames);
    for f in &frames {
        assert_eq!(f.left, f.right);
        assert!(f.left > 0.2);
    }
}

#[test]
fn test_decode_surround_is_downmixed() {
    setup();
    let media = fixtures::surround_wav();
    let source = load_source(media.path()).expect("open surround");
    assert_eq!(source.source_channels(), 6);
    assert_eq!(source.output_channels(), 2);
    drop(source);

    let (frames, channels, _) = drain(media.path());
    assert_eq!(channels, 2);
    assert_eq!(frames.len(), media.frames);
    let mid = frames[frames.len() / 2];
    // Front left only reaches the left output.
    assert!(mid.left > 0.05, "left = {}", mid.left);
    assert!(mid.right.abs() < 1e-3, "right = {}", mid.right);
}

#[test]
fn test_decode_missing_file() {
    setup();
    let err = load_source("/nonexistent/missing.wav").err().expect("missing file");
    assert!(matches!(err, SourceError::OpeningFailed { .. }));
    assert_eq!(err.code(), -51);
}

#[test]
fn test_decode_file_without_audio() {
    if !can_render_video() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::video_only(dir.path());
    match load_source(&path) {
        Err(SourceError::NoUsableAudioTrack(_)) => {}
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("video-only file has no audio track"),
    }
}

#[test]
fn test_decode_position_tracks_delivery() {
    setup();
    let media = fixtures::stereo_wav();
    let source = load_source(media.path()).unwrap();
    let mut playback = Playback::with_capacity(source, 1000);
    playback.start(0.0);

    let mut block = vec![StereoFrame::default(); 800];
    assert_eq!(playback.mix(&mut block).unwrap(), 800);
    assert_eq!(playback.mix(&mut block).unwrap(), 800);
    assert!((playback.position() - 1600.0 / f64::from(WAV_RATE)).abs() < 1e-9);

    let mut too_big = vec![StereoFrame::default(); 1001];
    assert!(playback.mix(&mut too_big).is_err());
    assert_eq!(playback.frames_delivered(), 1600);
}

// ── render ───────────────────────────────────────────────────────────────

#[test]
fn test_render_video_frame_count_and_duration() {
    if !can_render_video() {
        return;
    }
    const FRAMES: u64 = 25;
    const FPS: u32 = 10;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("count.mp4");

    let mut renderer = Renderer::new();
    renderer.open(&video_options(&path, FPS)).unwrap();
    for i in 0..FRAMES {
        renderer.send_frame(&frame(i, FPS)).unwrap();
    }
    let summary = renderer.close().unwrap();
    assert_eq!(summary.video_frames, FRAMES);
    assert_eq!(summary.video_packets, FRAMES as usize);
    assert_eq!(summary.audio_packets, 0);

    let mut input = ffmpeg::format::input(&path).unwrap();
    let stream = input.streams().best(ffmpeg::media::Type::Video).unwrap();
    let index = stream.index();
    let time_base = stream.time_base();
    assert_eq!(stream.frames(), FRAMES as i64);
    let duration = stream.duration() as f64 * f64::from(time_base);
    let expected = FRAMES as f64 / f64::from(FPS);
    assert!(
        (duration - expected).abs() <= 1.0 / f64::from(FPS),
        "duration {} expected {}",
        duration,
        expected
    );

    let frame_base = ffmpeg::Rational::new(1, FPS as i32);
    let mut pts: Vec<i64> = input
        .packets()
        .filter(|(s, _)| s.index() == index)
        .filter_map(|(_, p)| p.pts())
        .map(|ts| ts.rescale(time_base, frame_base))
        .collect();
    pts.sort_unstable();
    assert_eq!(pts, (0..FRAMES as i64).collect::<Vec<_>>());
}

#[test]
fn test_render_mp4_sample_table() {
    if !can_render_video() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = fixtures::video_only(dir.path());

    let file = std::fs::File::open(&path).unwrap();
    let size = file.metadata().unwrap().len();
    let reader = mp4::Mp4Reader::read_header(std::io::BufReader::new(file), size).unwrap();
    let tracks: Vec<_> = reader.tracks().values().collect();
    assert_eq!(tracks.len(), 1);
    let track = tracks[0];
    assert_eq!(track.track_type().unwrap(), mp4::TrackType::Video);
    assert_eq!(track.sample_count(), 5);
    assert_eq!(track.width(), WIDTH as u16);
    assert_eq!(track.height(), HEIGHT as u16);
}

#[test]
fn test_render_audio_round_trip() {
    if !can_render_audio() {
        return;
    }
    const IN_RATE: u32 = 44_100;
    const FPS: u32 = 10;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("av.mp4");
    let pcm_frames = IN_RATE as usize;

    let mut renderer = Renderer::new();
    renderer
        .open(&video_options(&path, FPS).with_audio(Id::AAC, IN_RATE))
        .unwrap();
    assert_eq!(renderer.audio_state(), Some(AudioState::Pending));
    renderer
        .send_audio(&testcard::sine_pcm(IN_RATE, pcm_frames, 440.0), IN_RATE)
        .unwrap();
    assert_eq!(renderer.audio_state(), Some(AudioState::Added));
    for i in 0..u64::from(FPS) {
        renderer.send_frame(&frame(i, FPS)).unwrap();
    }
    let summary = renderer.close().unwrap();
    assert!(summary.audio_packets > 0);
    assert!(!renderer.is_open());

    let (frames, channels, rate) = drain(&path);
    assert_eq!(channels, 2);
    let expected = pcm_frames as f64 * f64::from(rate) / f64::from(IN_RATE);
    assert!(
        (frames.len() as f64 - expected).abs() < 3072.0,
        "decoded {} frames, expected about {}",
        frames.len(),
        expected
    );

    // The right channel was written at half the amplitude of the left.
    let body = &frames[2048..frames.len() - 2048];
    let ratio = rms(body, |f| f.left) / rms(body, |f| f.right);
    assert!((1.6..2.4).contains(&ratio), "left/right ratio {}", ratio);
}

#[test]
fn test_render_audio_not_enabled() {
    if !can_render_video() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut renderer = Renderer::new();
    renderer
        .open(&video_options(&dir.path().join("a.mp4"), 10))
        .unwrap();
    assert_eq!(renderer.audio_state(), Some(AudioState::Disabled));
    let err = renderer
        .send_audio(&testcard::sine_pcm(44_100, 100, 440.0), 44_100)
        .unwrap_err();
    assert_eq!(err.code(), RenderError::AudioNotEnabled.code());
    renderer.send_frame(&frame(0, 10)).unwrap();
    let summary = renderer.close().unwrap();
    assert_eq!(summary.audio_packets, 0);

    let input = ffmpeg::format::input(&dir.path().join("a.mp4")).unwrap();
    assert!(input.streams().best(ffmpeg::media::Type::Audio).is_none());
}

#[test]
fn test_render_second_audio_leaves_output_unchanged() {
    if !can_render_audio() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let pcm = testcard::sine_pcm(44_100, 22_050, 440.0);

    let (once, once_frames) = render_with_audio(&dir.path().join("once.mp4"), &pcm, 1);
    let (twice, twice_frames) = render_with_audio(&dir.path().join("twice.mp4"), &pcm, 2);

    assert!(once.audio_packets > 0);
    assert_eq!(twice.audio_packets, once.audio_packets);
    assert_eq!(twice_frames, once_frames);
    assert_eq!(twice_frames, once.audio_packets as i64);
}

#[test]
fn test_render_audio_ordering() {
    if !can_render_audio() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut renderer = Renderer::new();
    renderer
        .open(&video_options(&dir.path().join("b.mp4"), 10).with_audio(Id::AAC, 44_100))
        .unwrap();

    let err = renderer.send_frame(&frame(0, 10)).unwrap_err();
    assert_eq!(err.code(), RenderError::AudioNotAdded.code());

    let err = renderer.send_audio(&[1, 2, 3], 44_100).unwrap_err();
    assert!(matches!(err, RenderError::InvalidAudioBuffer(_)));
    assert_eq!(renderer.audio_state(), Some(AudioState::Pending));

    let pcm = testcard::sine_pcm(44_100, 4_410, 440.0);
    renderer.send_audio(&pcm, 44_100).unwrap();
    let err = renderer.send_audio(&pcm, 44_100).unwrap_err();
    assert_eq!(err.code(), RenderError::AudioAlreadyAdded.code());

    renderer.send_frame(&frame(0, 10)).unwrap();
    let summary = renderer.close().unwrap();
    assert_eq!(summary.video_frames, 1);
}

#[test]
fn test_render_lifecycle_errors() {
    if !can_render_video() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut renderer = Renderer::new();

    assert_eq!(
        renderer.send_frame(&frame(0, 10)).unwrap_err().code(),
        RenderError::NotOpen.code()
    );
    assert_eq!(
        renderer.send_audio(&[0; 4], 44_100).unwrap_err().code(),
        RenderError::NotOpen.code()
    );
    assert_eq!(renderer.close().unwrap_err().code(), RenderError::NotOpen.code());

    let options = video_options(&dir.path().join("c.mp4"), 10);
    renderer.open(&options).unwrap();
    assert_eq!(
        renderer.open(&options).unwrap_err().code(),
        RenderError::AlreadyOpen.code()
    );

    let err = renderer.send_frame(&[0; 16]).unwrap_err();
    assert!(matches!(
        err,
        RenderError::InvalidFrameSize {
            expected,
            actual: 16
        } if expected == (WIDTH * HEIGHT * 4) as usize
    ));

    renderer.send_frame(&frame(0, 10)).unwrap();
    renderer.close().unwrap();
    assert!(!renderer.is_open());

    // Closed renderers can be reopened.
    renderer
        .open(&video_options(&dir.path().join("d.mp4"), 10))
        .unwrap();
    renderer.close().unwrap();
}

#[test]
fn test_render_rejects_missing_video_codec() {
    setup();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.mp4");
    let options = RenderOptions {
        path: path.to_string_lossy().into_owned(),
        ..Default::default()
    };

    let mut renderer = Renderer::new();
    let err = renderer.open(&options).unwrap_err();
    assert_eq!(err.code(), RenderError::VideoCodecNotSet.code());
    assert!(!renderer.is_open());
    assert!(!path.exists());
}

#[test]
fn test_render_drop_finalizes_file() {
    if !can_render_video() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dropped.mp4");
    {
        let mut renderer = Renderer::new();
        renderer.open(&video_options(&path, 10)).unwrap();
        for i in 0..3 {
            renderer.send_frame(&frame(i, 10)).unwrap();
        }
    }
    let input = ffmpeg::format::input(&path).unwrap();
    let stream = input.streams().best(ffmpeg::media::Type::Video).unwrap();
    assert_eq!(stream.frames(), 3);
}
