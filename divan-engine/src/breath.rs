//! Press-and-hold breath gesture.
//!
//! [`BreathGesture`] is the idle/charging state machine plus the tick cadence
//! (one tick per fifth of the hold, none at completion). [`BreathVoice`] is the
//! sound: looping noise through a low-pass that opens while the gesture is held
//! and closes again on release.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use divan_core::filters::SvfMode;

use crate::config::BreathPreset;
use crate::graph::{Graph, NodeId};
use crate::noise::NoiseBuffer;
use crate::nodes::{NodeKind, Param};

/// Progress marks at which a tick fires: 0, 20, 40, 60 and 80 %.
pub const TICK_STEPS: u8 = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum BreathState {
    #[default]
    Idle,
    Charging,
}

#[derive(Clone, Debug)]
pub struct BreathGesture {
    state: BreathState,
    ticks_fired: u8,
    duration: Duration,
}

impl BreathGesture {
    pub fn new(duration_secs: f32) -> Self {
        Self {
            state: BreathState::Idle,
            ticks_fired: 0,
            duration: Duration::from_secs_f32(duration_secs.max(1e-3)),
        }
    }

    #[inline] pub fn state(&self) -> BreathState { self.state }
    #[inline] pub fn is_charging(&self) -> bool { self.state == BreathState::Charging }

    /// Enter charging. Returns false if already charging.
    pub fn begin(&mut self) -> bool {
        if self.is_charging() {
            return false;
        }
        self.state = BreathState::Charging;
        self.ticks_fired = 0;
        true
    }

    /// Progress for a hold of `held`, in [0, 1], and how many ticks became due
    /// since the last call. Idle gestures report zero and fire nothing.
    pub fn progress(&mut self, held: Duration) -> (f32, u8) {
        if !self.is_charging() {
            return (0.0, 0);
        }
        let p = (held.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        // integer arithmetic so marks land exactly on 20 % boundaries
        let fifths = held.as_nanos() * u128::from(TICK_STEPS) / self.duration.as_nanos().max(1);
        let crossed = (fifths.min(u128::from(TICK_STEPS)) as u8 + 1).min(TICK_STEPS);
        let due = crossed.saturating_sub(self.ticks_fired);
        self.ticks_fired = self.ticks_fired.max(crossed);
        (p, due)
    }

    /// Leave charging. Returns false if the gesture was idle.
    pub fn end(&mut self) -> bool {
        if !self.is_charging() {
            return false;
        }
        self.state = BreathState::Idle;
        true
    }
}

/// Nodes of one breath session.
#[derive(Clone, Debug)]
pub struct BreathVoice {
    source: NodeId,
    filter: NodeId,
    gain: NodeId,
}

impl BreathVoice {
    /// Wire noise → low-pass → gain → `master` and start the inhale now.
    pub fn start(graph: &mut Graph, noise: Arc<NoiseBuffer>, master: NodeId, preset: &BreathPreset) -> Self {
        let now = graph.now();
        let sr = graph.sample_rate();
        let open_at = now + f64::from(preset.duration);

        let source = graph.add(NodeKind::buffer_source(noise, true));
        let filter = graph.add(NodeKind::filter(SvfMode::Lowpass, preset.closed_cutoff, preset.q, sr));
        let gain = graph.add(NodeKind::gain(0.0));
        graph.connect(source, filter);
        graph.connect(filter, gain);
        graph.connect(gain, master);

        if let Some(a) = graph.param_mut(filter, Param::Frequency) {
            a.set_value_at(preset.closed_cutoff, now).exponential_ramp_to(preset.open_cutoff, open_at);
        }
        if let Some(a) = graph.param_mut(gain, Param::Gain) {
            a.set_value_at(0.0, now).linear_ramp_to(preset.peak_gain, open_at);
        }
        graph.start(source, now);
        debug!("breath: inhale started at {now:.3}s");

        Self { source, filter, gain }
    }

    /// Close the breath from its current state and hand the nodes back to the
    /// graph. Returns the time at which the source stops.
    pub fn release(self, graph: &mut Graph, completed: bool, preset: &BreathPreset) -> f64 {
        let now = graph.now();
        let (cutoff, window) = if completed {
            (preset.exhale_cutoff, preset.exhale_time)
        } else {
            (preset.closed_cutoff, preset.interrupt_time)
        };
        let end = now + f64::from(window);

        if let Some(a) = graph.param_mut(self.filter, Param::Frequency) {
            a.hold_at(now);
            a.exponential_ramp_to(cutoff, end);
        }
        if let Some(a) = graph.param_mut(self.gain, Param::Gain) {
            a.hold_at(now);
            a.linear_ramp_to(0.0, end);
        }
        graph.stop(self.source, end);
        for id in [self.source, self.filter, self.gain] {
            graph.release(id);
        }
        debug!("breath: {} release until {end:.3}s", if completed { "exhale" } else { "interrupted" });
        end
    }

    /// Current (cutoff Hz, gain).
    pub fn levels(&self, graph: &Graph) -> (f32, f32) {
        (
            graph.param_value(self.filter, Param::Frequency).unwrap_or(0.0),
            graph.param_value(self.gain, Param::Gain).unwrap_or(0.0),
        )
    }

    #[inline] pub fn source(&self) -> NodeId { self.source }
}

// ------------------------------------ Tests --------------------------------------
