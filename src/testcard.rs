//! Synthetic media for the `render` command and tests
//!
//! A solid colour per frame cycling through a small palette, and a sine tone
//! as interleaved stereo S16 bytes.

/// Colours the test card cycles through, one per second.
pub const PALETTE: [[u8; 3]; 6] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
];

/// RGB colour shown at `frame` when running at `framerate`.
pub fn color_for_frame(frame: u64, framerate: u32) -> [u8; 3] {
    let second = frame / u64::from(framerate.max(1));
    PALETTE[(second % PALETTE.len() as u64) as usize]
}

/// One tightly packed RGBA frame filled with `rgb`.
pub fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let pixels = width as usize * height as usize;
    let mut data = Vec::with_capacity(pixels * 4);
    for _ in 0..pixels {
        data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
    }
    data
}

/// `frames` stereo frames of a sine at `frequency` Hz, little-endian S16.
///
/// The right channel is played at half amplitude so the two sides can be
/// told apart after a round trip.
pub fn sine_pcm(sample_rate: u32, frames: usize, frequency: f64) -> Vec<u8> {
    let mut data = Vec::with_capacity(frames * 4);
    let step = 2.0 * std::f64::consts::PI * frequency / f64::from(sample_rate.max(1));
    for i in 0..frames {
        let value = (i as f64 * step).sin();
        let left = (value * 16_000.0) as i16;
        let right = (value * 8_000.0) as i16;
        data.extend_from_slice(&left.to_le_bytes());
        data.extend_from_slice(&right.to_le_bytes());
    }
    data
}
