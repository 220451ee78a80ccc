//! Ambient drone: a sustained pad on its own sub-bus.
//!
//! Oscillators → mix gain (slowly modulated by an LFO) → ambient sub-bus → master.
//! The drone never stops once started; it is only ducked and restored through
//! the sub-bus, which leaves one-shots layered on top untouched.

use log::debug;

use crate::config::AmbientPreset;
use crate::graph::{Graph, NodeId};
use crate::nodes::{NodeKind, Param, Wave};

#[derive(Clone, Debug)]
pub struct AmbientDrone {
    bus: NodeId,
    mix: NodeId,
    voices: Vec<NodeId>,
    lfo: NodeId,
    base_level: f32,
    duck_level: f32,
}

/// Re-anchor `p` at the current instant and ramp linearly to `target` over `secs`.
fn ramp_from_now(graph: &mut Graph, id: NodeId, p: Param, target: f32, secs: f32) {
    let now = graph.now();
    if let Some(a) = graph.param_mut(id, p) {
        a.hold_at(now);
        a.linear_ramp_to(target, now + f64::from(secs.max(0.0)));
    }
}

impl AmbientDrone {
    /// Build the pad, start every oscillator now and fade the sub-bus in.
    pub fn start(graph: &mut Graph, master: NodeId, preset: &AmbientPreset) -> Self {
        let now = graph.now();

        let bus = graph.add(NodeKind::gain(0.0));
        graph.connect(bus, master);

        let mix = graph.add(NodeKind::gain(preset.mix_level));
        graph.connect(mix, bus);

        let voices: Vec<NodeId> = preset
            .voices
            .iter()
            .map(|&(wave, hz)| {
                let osc = graph.add(NodeKind::oscillator(wave, hz));
                graph.connect(osc, mix);
                graph.start(osc, now);
                osc
            })
            .collect();

        let lfo = graph.add(NodeKind::oscillator(Wave::Sine, preset.lfo_rate));
        let depth = graph.add(NodeKind::gain(preset.lfo_depth));
        graph.connect(lfo, depth);
        graph.connect_param(depth, mix, Param::Gain);
        graph.start(lfo, now);

        debug!("ambient: {} voices, lfo {:.3} Hz", voices.len(), preset.lfo_rate);

        let drone = Self {
            bus,
            mix,
            voices,
            lfo,
            base_level: preset.base_level,
            duck_level: preset.duck_level,
        };
        drone.fade_in(graph, preset.initial_fade);
        drone
    }

    /// Duck to the residual level over `secs`.
    pub fn fade_out(&self, graph: &mut Graph, secs: f32) {
        ramp_from_now(graph, self.bus, Param::Gain, self.duck_level, secs);
    }

    /// Restore the base level over `secs`.
    pub fn fade_in(&self, graph: &mut Graph, secs: f32) {
        ramp_from_now(graph, self.bus, Param::Gain, self.base_level, secs);
    }

    /// Current sub-bus level.
    pub fn level(&self, graph: &Graph) -> f32 {
        graph.param_value(self.bus, Param::Gain).unwrap_or(0.0)
    }

    #[inline] pub fn bus(&self) -> NodeId { self.bus }
    #[inline] pub fn mix(&self) -> NodeId { self.mix }
    #[inline] pub fn voices(&self) -> &[NodeId] { &self.voices }
    #[inline] pub fn lfo(&self) -> NodeId { self.lfo }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::SILENCE;
    use approx::assert_relative_eq;

    const SR: f32 = 48_000.0;

    fn setup() -> (Graph, NodeId, AmbientDrone) {
        let mut g = Graph::new(SR);
        let master = g.add(NodeKind::gain(0.4));
        g.connect(master, g.destination());
        let drone = AmbientDrone::start(&mut g, master, &AmbientPreset::default());
        (g, master, drone)
    }

    fn run(g: &mut Graph, secs: f64) {
        let mut buf = vec![SILENCE; (secs * f64::from(SR)) as usize];
        g.render(&mut buf);
    }

    #[test]
    fn starts_silent_and_fades_to_base() {
        let (mut g, _, drone) = setup();
        assert_eq!(drone.level(&g), 0.0);
        run(&mut g, 1.5);
        assert_relative_eq!(drone.level(&g), 0.075, epsilon = 1e-3);
        run(&mut g, 2.0);
        assert_relative_eq!(drone.level(&g), 0.15, epsilon = 1e-6);
    }

    #[test]
    fn pad_is_audible_and_breathes() {
        let (mut g, _, drone) = setup();
        run(&mut g, 3.0);
        assert_eq!(drone.voices().len(), 3);
        let mut buf = vec![SILENCE; 4800];
        g.render(&mut buf);
        assert!(buf.iter().any(|f| f[0].abs() > 0.005));
        // LFO is wired into the mix gain
        assert!(g.contains(drone.lfo()));
        assert_eq!(g.param_value(drone.mix(), Param::Gain), Some(1.0));
    }

    #[test]
    fn fade_out_ducks_to_residual_not_silence() {
        let (mut g, _, drone) = setup();
        run(&mut g, 3.0);
        drone.fade_out(&mut g, 2.0);
        run(&mut g, 2.5);
        assert_relative_eq!(drone.level(&g), 0.02, epsilon = 1e-6);
    }

    #[test]
    fn fade_in_continues_from_instantaneous_value() {
        let (mut g, _, drone) = setup();
        run(&mut g, 3.0);
        drone.fade_out(&mut g, 3.0);
        run(&mut g, 1.0);
        let mid = drone.level(&g);
        // 1/3 of the way from 0.15 down to 0.02
        assert_relative_eq!(mid, 0.15 - (0.13 / 3.0), epsilon = 1e-3);
        drone.fade_in(&mut g, 2.0);
        // no step at the switch
        assert_relative_eq!(drone.level(&g), mid, epsilon = 1e-6);
        run(&mut g, 0.01);
        let after = drone.level(&g);
        assert!(after > mid && after - mid < 1e-3, "mid={mid} after={after}");
    }

    #[test]
    fn never_reclaimed() {
        let (mut g, _, drone) = setup();
        let live = g.node_count();
        run(&mut g, 5.0);
        assert_eq!(g.node_count(), live);
        assert!(g.contains(drone.bus()));
    }
}
