//! Bounded stereo sample buffer
//!
//! Holds decoded audio as interleaved 16-bit stereo frames. Writers append at
//! the fill mark; readers take from the front and the remainder is shifted
//! down, so the buffered region always starts at index zero.

/// One stereo output frame, each channel scaled into `[-1.0, 1.0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn from_i16(left: i16, right: i16) -> Self {
        Self {
            left: f32::from(left) / 32767.0,
            right: f32::from(right) / 32767.0,
        }
    }
}

/// Fixed-capacity FIFO of stereo S16 frames.
#[derive(Debug, Clone)]
pub struct SampleRing {
    data: Vec<i16>,
    capacity: usize,
    fill: usize,
}

impl SampleRing {
    /// Create a buffer holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity * 2],
            capacity,
            fill: 0,
        }
    }

    /// Frames currently buffered.
    pub fn len(&self) -> usize {
        self.fill
    }

    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames that can still be appended.
    pub fn free(&self) -> usize {
        self.capacity - self.fill
    }

    /// Append interleaved samples with `channels` channels per frame.
    ///
    /// Mono is duplicated to both sides; extra channels beyond the first two
    /// are dropped. Returns the number of frames accepted, which is less than
    /// offered when the buffer fills up.
    pub fn push_interleaved(&mut self, samples: &[i16], channels: u16) -> usize {
        let channels = usize::from(channels.max(1));
        let offered = samples.len() / channels;
        let accepted = offered.min(self.free());
        let start = self.fill * 2;

        match channels {
            2 => {
                self.data[start..start + accepted * 2].copy_from_slice(&samples[..accepted * 2]);
            }
            1 => {
                for (i, s) in samples[..accepted].iter().enumerate() {
                    self.data[start + i * 2] = *s;
                    self.data[start + i * 2 + 1] = *s;
                }
            }
            _ => {
                for (i, frame) in samples.chunks_exact(channels).take(accepted).enumerate() {
                    self.data[start + i * 2] = frame[0];
                    self.data[start + i * 2 + 1] = frame[1];
                }
            }
        }

        self.fill += accepted;
        accepted
    }

    /// Move `n` frames from the front into `out` and shift the rest down.
    fn take_front(&mut self, out: &mut [StereoFrame], n: usize) {
        for (dst, src) in out.iter_mut().zip(self.data[..n * 2].chunks_exact(2)) {
            *dst = StereoFrame::from_i16(src[0], src[1]);
        }
        self.data.copy_within(n * 2..self.fill * 2, 0);
        self.fill -= n;
    }

    /// Fill all of `out`, or nothing if fewer frames are buffered.
    pub fn pull_into(&mut self, out: &mut [StereoFrame]) -> usize {
        let n = out.len();
        if n > self.fill {
            return 0;
        }
        self.take_front(out, n);
        n
    }

    /// Fill `out` with whatever is buffered and zero the rest.
    pub fn pull_padded_into(&mut self, out: &mut [StereoFrame]) -> usize {
        let n = out.len().min(self.fill);
        self.take_front(out, n);
        out[n..].fill(StereoFrame::default());
        n
    }
}
