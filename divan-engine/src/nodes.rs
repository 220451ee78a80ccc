//! Building blocks (nodes) of the Divan signal graph.
//!
//! Each node is a small per-sample processor. The [`Graph`](crate::graph::Graph)
//! owns them, wires them together and feeds each one the sum of its inputs
//! plus any audio-rate modulation aimed at its parameters.
//!
//! Contents:
//! - `Wave`, `Osc`  : basic oscillator core (Sine/Tri/Saw/Square) with stable phase wrap
//! - `Span`         : start/stop window of a source node
//! - `Param`        : addressable automation slot on a node
//! - `NodeKind`     : oscillator, noise buffer source, filter, gain, destination
//!
//! Notes:
//! - Frequency is **Hz**; methods expect the current **sample rate** when stepping.
//! - Frames are stereo `[left, right]`; oscillators write the same value to both sides.

use std::sync::Arc;

use divan_core::automation::Automation;
use divan_core::dsp::{fast_sin, wrap_phase01, TAU};
use divan_core::filters::{SvfMode, SvfTpt};

use crate::noise::NoiseBuffer;

/// One stereo sample.
pub type Frame = [f32; 2];

pub const SILENCE: Frame = [0.0, 0.0];

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wave { Sine, Tri, Saw, Square }

/// Naive (non band-limited) shapes; the engine only plays them at low pitches or as sines.
#[inline]
fn osc_sample(phase01: f32, wave: Wave) -> f32 {
    match wave {
        Wave::Sine   => fast_sin(TAU * phase01),
        Wave::Tri    => 1.0 - 4.0 * (phase01 - 0.5).abs(),
        Wave::Saw    => 2.0 * phase01 - 1.0,
        Wave::Square => if phase01 < 0.5 { 1.0 } else { -1.0 },
    }
}

/// Free-running phase accumulator. Frequency is supplied per sample so it can follow automation.
#[derive(Copy, Clone, Debug)]
pub struct Osc {
    phase: f32, // [0,1)
    wave: Wave,
}

impl Osc {
    #[inline] pub fn new(wave: Wave) -> Self { Self { phase: 0.0, wave } }
    #[inline] pub fn wave(&self) -> Wave { self.wave }

    /// Emit the sample at the current phase, then advance by `freq / sr`.
    #[inline]
    pub fn next(&mut self, freq: f32, sr: f32) -> f32 {
        let s = osc_sample(self.phase, self.wave);
        self.phase = wrap_phase01(self.phase + freq / sr);
        s
    }
}

/// Start/stop window of a source node.
#[derive(Copy, Clone, Debug, Default)]
pub struct Span {
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub ended: bool,
}

impl Span {
    /// Whether the source plays at `t`. Marks the span ended once `t` reaches the stop time.
    #[inline]
    fn active(&mut self, t: f64) -> bool {
        if self.ended {
            return false;
        }
        let Some(start) = self.start else { return false };
        if t < start {
            return false;
        }
        if matches!(self.stop, Some(stop) if t >= stop) {
            self.ended = true;
            return false;
        }
        true
    }
}

/// Automatable parameter slot on a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Param {
    Gain,
    Frequency,
    Q,
}

impl Param {
    pub(crate) const COUNT: usize = 3;

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Param::Gain => 0,
            Param::Frequency => 1,
            Param::Q => 2,
        }
    }
}

/// Audio-rate modulation summed per parameter for the current sample.
pub(crate) type ParamMods = [f32; Param::COUNT];

/// What a node does.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Output sink; sums its inputs.
    Destination,
    Gain {
        gain: Automation,
    },
    Oscillator {
        osc: Osc,
        frequency: Automation,
        span: Span,
    },
    Filter {
        mode: SvfMode,
        frequency: Automation,
        q: Automation,
        left: SvfTpt,
        right: SvfTpt,
    },
    BufferSource {
        buffer: Arc<NoiseBuffer>,
        looping: bool,
        pos: usize,
        span: Span,
    },
}

impl NodeKind {
    pub fn gain(level: f32) -> Self {
        NodeKind::Gain { gain: Automation::new(level) }
    }

    pub fn oscillator(wave: Wave, freq_hz: f32) -> Self {
        NodeKind::Oscillator { osc: Osc::new(wave), frequency: Automation::new(freq_hz), span: Span::default() }
    }

    pub fn filter(mode: SvfMode, cut_hz: f32, q: f32, sr: f32) -> Self {
        NodeKind::Filter {
            mode,
            frequency: Automation::new(cut_hz),
            q: Automation::new(q),
            left: SvfTpt::new(cut_hz, q, sr),
            right: SvfTpt::new(cut_hz, q, sr),
        }
    }

    pub fn buffer_source(buffer: Arc<NoiseBuffer>, looping: bool) -> Self {
        NodeKind::BufferSource { buffer, looping, pos: 0, span: Span::default() }
    }

    #[inline]
    pub fn is_source(&self) -> bool {
        matches!(self, NodeKind::Oscillator { .. } | NodeKind::BufferSource { .. })
    }

    pub(crate) fn span_mut(&mut self) -> Option<&mut Span> {
        match self {
            NodeKind::Oscillator { span, .. } | NodeKind::BufferSource { span, .. } => Some(span),
            _ => None,
        }
    }

    pub fn span(&self) -> Option<&Span> {
        match self {
            NodeKind::Oscillator { span, .. } | NodeKind::BufferSource { span, .. } => Some(span),
            _ => None,
        }
    }

    pub fn param(&self, p: Param) -> Option<&Automation> {
        match (self, p) {
            (NodeKind::Gain { gain }, Param::Gain) => Some(gain),
            (NodeKind::Oscillator { frequency, .. }, Param::Frequency)
            | (NodeKind::Filter { frequency, .. }, Param::Frequency) => Some(frequency),
            (NodeKind::Filter { q, .. }, Param::Q) => Some(q),
            _ => None,
        }
    }

    pub fn param_mut(&mut self, p: Param) -> Option<&mut Automation> {
        match (self, p) {
            (NodeKind::Gain { gain }, Param::Gain) => Some(gain),
            (NodeKind::Oscillator { frequency, .. }, Param::Frequency)
            | (NodeKind::Filter { frequency, .. }, Param::Frequency) => Some(frequency),
            (NodeKind::Filter { q, .. }, Param::Q) => Some(q),
            _ => None,
        }
    }

    /// Fold finished automation on every parameter of this node.
    pub(crate) fn settle(&mut self, now: f64) {
        match self {
            NodeKind::Gain { gain } => gain.settle(now),
            NodeKind::Oscillator { frequency, .. } => frequency.settle(now),
            NodeKind::Filter { frequency, q, .. } => {
                frequency.settle(now);
                q.settle(now);
            }
            NodeKind::Destination | NodeKind::BufferSource { .. } => {}
        }
    }

    /// Produce one frame at time `t`.
    #[inline]
    pub(crate) fn process(&mut self, input: Frame, mods: &ParamMods, t: f64, sr: f32) -> Frame {
        match self {
            NodeKind::Destination => input,
            NodeKind::Gain { gain } => {
                let g = gain.value_at(t) + mods[Param::Gain.index()];
                [input[0] * g, input[1] * g]
            }
            NodeKind::Oscillator { osc, frequency, span } => {
                if !span.active(t) {
                    return SILENCE;
                }
                let hz = frequency.value_at(t) + mods[Param::Frequency.index()];
                let s = osc.next(hz, sr);
                [s, s]
            }
            NodeKind::Filter { mode, frequency, q, left, right } => {
                let hz = frequency.value_at(t) + mods[Param::Frequency.index()];
                let q = q.value_at(t) + mods[Param::Q.index()];
                for f in [&mut *left, &mut *right] {
                    f.set_cutoff_hz(hz);
                    f.set_q(q);
                }
                [left.process(input[0], *mode), right.process(input[1], *mode)]
            }
            NodeKind::BufferSource { buffer, looping, pos, span } => {
                if !span.active(t) || buffer.is_empty() {
                    return SILENCE;
                }
                if *pos >= buffer.len() {
                    if *looping {
                        *pos = 0;
                    } else {
                        span.ended = true;
                        return SILENCE;
                    }
                }
                let f = buffer.frame(*pos);
                *pos += 1;
                f
            }
        }
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_starts_at_zero_crossing() {
        let mut o = Osc::new(Wave::Sine);
        assert!(o.next(440.0, 48_000.0).abs() < 1e-6);
        assert!(o.next(440.0, 48_000.0) > 0.0);
    }

    #[test]
    fn triangle_spans_unit_range() {
        let mut o = Osc::new(Wave::Tri);
        let (mut lo, mut hi) = (f32::MAX, f32::MIN);
        for _ in 0..48_000 {
            let s = o.next(100.0, 48_000.0);
            lo = lo.min(s);
            hi = hi.max(s);
        }
        assert!(lo < -0.99 && hi > 0.99, "lo={lo} hi={hi}");
    }

    #[test]
    fn span_respects_start_and_stop() {
        let mut s = Span { start: Some(1.0), stop: Some(2.0), ended: false };
        assert!(!s.active(0.5));
        assert!(s.active(1.0));
        assert!(s.active(1.999));
        assert!(!s.active(2.0));
        assert!(s.ended);
        // an ended source never comes back
        assert!(!s.active(1.5));
    }

    #[test]
    fn unstarted_source_is_silent() {
        let mut n = NodeKind::oscillator(Wave::Sine, 440.0);
        let out = n.process(SILENCE, &[0.0; Param::COUNT], 1.0, 48_000.0);
        assert_eq!(out, SILENCE);
    }

    #[test]
    fn gain_modulation_adds_to_automation() {
        let mut n = NodeKind::gain(1.0);
        let mut mods = [0.0; Param::COUNT];
        mods[Param::Gain.index()] = -0.15;
        let out = n.process([1.0, -1.0], &mods, 0.0, 48_000.0);
        assert!((out[0] - 0.85).abs() < 1e-6 && (out[1] + 0.85).abs() < 1e-6);
    }

    #[test]
    fn params_are_addressable_per_kind() {
        let g = NodeKind::gain(0.4);
        assert!(g.param(Param::Gain).is_some());
        assert!(g.param(Param::Frequency).is_none());
        let f = NodeKind::filter(SvfMode::Lowpass, 150.0, 0.6, 48_000.0);
        assert_eq!(f.param(Param::Q).map(Automation::intrinsic), Some(0.6));
    }
}
