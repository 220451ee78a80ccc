//! Filters: a TPT state-variable filter for swept low/high-pass voices.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Stable under fast cutoff modulation (breath and whoosh sweep every sample)
//! - Clear APIs and predictable parameterization
//!
//! Contents
//! - `SvfMode`    : LP/HP/BP/Notch taps
//! - `SvfTpt`     : State-Variable Filter via Topology Preserving Transform
//!
//! Notes
//! - `SvfTpt` uses the “g = tan(π fc / sr)” formulation with `R = 1/(2Q)`.
//!   Coefficients are only recomputed when cutoff or Q actually change, so
//!   per-sample `set_cutoff_hz` calls on a flat automation segment stay cheap.

use crate::dsp::{kill_denormals, tpt_g};
use core::fmt::Debug;

/// SVF output tap selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SvfMode {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

/// Topology-Preserving Transform SVF (State-Variable Filter).
///
/// Parameters:
/// - `cut_hz`  : cutoff / center frequency in Hz
/// - `q`       : quality factor (0.5–0.8 gives the soft, barely resonant shape used for breath)
///
/// Internals:
/// - `g = tan(π fc / sr)`
/// - `R = 1 / (2Q)`
#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    sr: f32,
    cut: f32,
    q: f32,
    // derived
    g: f32,
    r: f32,
    // states
    ic1eq: f32,
    ic2eq: f32,
}

impl SvfTpt {
    #[inline]
    pub fn new(cut_hz: f32, q: f32, sr: f32) -> Self {
        let mut s = Self {
            sr: sr.max(1.0),
            cut: cut_hz.max(0.0),
            q: q.max(1e-4),
            g: 0.0,
            r: 0.0,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        s.recalc();
        s
    }

    #[inline] pub fn set_sample_rate(&mut self, sr: f32) { self.sr = sr.max(1.0); self.recalc(); }
    #[inline] pub fn cutoff_hz(&self) -> f32 { self.cut }

    #[inline]
    pub fn set_cutoff_hz(&mut self, cut_hz: f32) {
        let cut = cut_hz.max(0.0);
        if cut != self.cut {
            self.cut = cut;
            self.recalc();
        }
    }

    #[inline]
    pub fn set_q(&mut self, q: f32) {
        let q = q.max(1e-4);
        if q != self.q {
            self.q = q;
            self.recalc();
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    #[inline]
    fn recalc(&mut self) {
        self.g = tpt_g(self.cut, self.sr);
        self.r = 1.0 / (2.0 * self.q);
    }

    /// Process one sample and return all four taps `(lp, bp, hp, notch)`.
    #[inline]
    pub fn process_all(&mut self, x: f32) -> (f32, f32, f32, f32) {
        // Zavalishin's resolved form:
        // hp = (x - (2R + g) s1 - s2) / (1 + 2R g + g²)
        // bp = g hp + s1 ; lp = g bp + s2
        let g = self.g;
        let r2 = 2.0 * self.r;
        let hp = (x - (r2 + g) * self.ic1eq - self.ic2eq) / (1.0 + r2 * g + g * g);
        let bp = g * hp + self.ic1eq;
        let lp = g * bp + self.ic2eq;

        self.ic1eq = kill_denormals(g * hp + bp);
        self.ic2eq = kill_denormals(g * bp + lp);

        (lp, bp, hp, lp + hp)
    }

    /// Process one sample, returning only the mode requested.
    #[inline]
    pub fn process(&mut self, x: f32, mode: SvfMode) -> f32 {
        let (lp, bp, hp, n) = self.process_all(x);
        match mode {
            SvfMode::Lowpass => lp,
            SvfMode::Highpass => hp,
            SvfMode::Bandpass => bp,
            SvfMode::Notch => n,
        }
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_rms(f: &mut SvfTpt, mode: SvfMode, hz: f32, sr: f32) -> f32 {
        let n = sr as usize / 2;
        let mut acc = 0.0;
        for i in 0..n {
            let x = (crate::dsp::TAU * hz * i as f32 / sr).sin();
            let y = f.process(x, mode);
            // skip the settling tail
            if i > n / 2 {
                acc += y * y;
            }
        }
        (acc / (n / 2) as f32).sqrt()
    }

    #[test]
    fn lowpass_passes_dc() {
        let sr = 48000.0;
        let mut svf = SvfTpt::new(1000.0, 0.707, sr);
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = svf.process(1.0, SvfMode::Lowpass);
        }
        assert!((y - 1.0).abs() < 1e-3, "y={y}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let sr = 48000.0;
        let mut svf = SvfTpt::new(500.0, 0.707, sr);
        let mut y = 1.0;
        for _ in 0..(sr as usize) {
            y = svf.process(1.0, SvfMode::Highpass);
        }
        assert!(y.abs() < 1e-3, "y={y}");
    }

    #[test]
    fn lowpass_attenuates_above_cutoff() {
        let sr = 48000.0;
        let mut low = SvfTpt::new(150.0, 0.6, sr);
        let mut open = SvfTpt::new(3500.0, 0.6, sr);
        let muffled = sine_rms(&mut low, SvfMode::Lowpass, 2000.0, sr);
        let airy = sine_rms(&mut open, SvfMode::Lowpass, 2000.0, sr);
        assert!(muffled < 0.1 * airy, "muffled={muffled} airy={airy}");
    }

    #[test]
    fn cutoff_change_is_tracked() {
        let mut svf = SvfTpt::new(150.0, 0.6, 48000.0);
        svf.set_cutoff_hz(3500.0);
        assert_eq!(svf.cutoff_hz(), 3500.0);
        svf.set_cutoff_hz(-5.0);
        assert_eq!(svf.cutoff_hz(), 0.0);
    }
}
