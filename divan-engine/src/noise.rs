//! Shared white-noise material.
//!
//! A [`NoiseBuffer`] is generated once per engine and handed out as
//! `Arc<NoiseBuffer>` to every voice that needs noise (breath texture, reveal
//! whoosh). It is never mutated after creation.

use rand::Rng;

use crate::nodes::Frame;

/// Peak level of generated noise; leaves headroom for filter resonance and gain stages downstream.
pub const NOISE_HEADROOM: f32 = 0.5;

/// Stereo buffer of uniform white noise.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseBuffer {
    sample_rate: u32,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl NoiseBuffer {
    /// Generate `duration_secs * sample_rate` frames from the thread-local RNG.
    pub fn generate(duration_secs: f32, sample_rate: u32) -> Self {
        Self::generate_with(&mut rand::thread_rng(), duration_secs, sample_rate)
    }

    /// Generate from a caller-supplied RNG (seeded in tests).
    ///
    /// Each channel draws its own samples so the stereo image stays wide.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, duration_secs: f32, sample_rate: u32) -> Self {
        let len = (duration_secs.max(0.0) * sample_rate as f32).round() as usize;
        let mut channel = || -> Vec<f32> {
            (0..len).map(|_| rng.gen_range(-1.0f32..1.0) * NOISE_HEADROOM).collect()
        };
        let left = channel();
        let right = channel();
        Self { sample_rate, left, right }
    }

    /// Frames per channel.
    #[inline] pub fn len(&self) -> usize { self.left.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.left.is_empty() }
    #[inline] pub fn sample_rate(&self) -> u32 { self.sample_rate }

    #[inline]
    pub fn duration_secs(&self) -> f32 {
        self.len() as f32 / self.sample_rate.max(1) as f32
    }

    /// Samples of channel `ch` (0 = left, 1 = right).
    pub fn channel(&self, ch: usize) -> &[f32] {
        if ch == 0 { &self.left } else { &self.right }
    }

    #[inline]
    pub fn frame(&self, i: usize) -> Frame {
        [self.left[i], self.right[i]]
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn length_matches_duration_times_rate() {
        for (secs, sr) in [(2.0, 48_000), (2.0, 44_100), (0.5, 22_050)] {
            let buf = NoiseBuffer::generate(secs, sr);
            let expected = (secs * sr as f32) as usize;
            assert_eq!(buf.channel(0).len(), expected);
            assert_eq!(buf.channel(1).len(), expected);
        }
    }

    #[test]
    fn samples_stay_within_headroom() {
        let buf = NoiseBuffer::generate_with(&mut StdRng::seed_from_u64(7), 2.0, 48_000);
        for ch in 0..2 {
            assert!(buf.channel(ch).iter().all(|s| (-0.5..=0.5).contains(s)));
        }
    }

    #[test]
    fn channels_are_independent() {
        let buf = NoiseBuffer::generate_with(&mut StdRng::seed_from_u64(11), 0.1, 48_000);
        let same = buf.channel(0).iter().zip(buf.channel(1)).filter(|(l, r)| l == r).count();
        assert!(same < buf.len() / 100, "mirrored samples: {same}");
    }

    #[test]
    fn noise_is_roughly_centred() {
        let buf = NoiseBuffer::generate_with(&mut StdRng::seed_from_u64(3), 1.0, 48_000);
        let mean: f32 = buf.channel(0).iter().sum::<f32>() / buf.len() as f32;
        assert!(mean.abs() < 0.01, "mean={mean}");
    }

    #[test]
    fn empty_for_zero_duration() {
        let buf = NoiseBuffer::generate(0.0, 48_000);
        assert!(buf.is_empty());
        assert_eq!(buf.duration_secs(), 0.0);
    }
}
