//! One-shot sounds described as data.
//!
//! A [`OneShot`] is a list of [`Voice`]s; each voice is a source (oscillator or
//! shared noise) with a frequency plan, a gain plan, an optional swept filter,
//! a start offset and a duration. [`OneShot::schedule`] turns the description
//! into graph nodes, starts and stops them, and immediately releases them: the
//! caller keeps no handle and the graph reclaims the nodes once they end.

use std::sync::Arc;

use log::debug;
use rand::Rng;

use divan_core::automation::Automation;
use divan_core::filters::SvfMode;

use crate::graph::{Graph, NodeId};
use crate::noise::NoiseBuffer;
use crate::nodes::{NodeKind, Param, Wave};

/// One segment of a parameter plan; `at` is relative to the voice start.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Step {
    Linear { value: f32, at: f64 },
    Exponential { value: f32, at: f64 },
}

/// Starting value plus ramps, applied relative to a voice's start time.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub initial: f32,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(initial: f32) -> Self {
        Self { initial, steps: Vec::new() }
    }

    pub fn linear(mut self, value: f32, at: f64) -> Self {
        self.steps.push(Step::Linear { value, at });
        self
    }

    pub fn exponential(mut self, value: f32, at: f64) -> Self {
        self.steps.push(Step::Exponential { value, at });
        self
    }

    /// Write the plan onto `a`, anchored at `t0`.
    pub fn apply(&self, a: &mut Automation, t0: f64) {
        a.set_value_at(self.initial, t0);
        for step in &self.steps {
            match *step {
                Step::Linear { value, at } => a.linear_ramp_to(value, t0 + at),
                Step::Exponential { value, at } => a.exponential_ramp_to(value, t0 + at),
            };
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    Osc { wave: Wave, frequency: Plan },
    /// Looping read of the engine's shared noise buffer.
    Noise,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterSpec {
    pub mode: SvfMode,
    pub q: f32,
    pub cutoff: Plan,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Voice {
    pub source: Source,
    pub gain: Plan,
    pub filter: Option<FilterSpec>,
    pub offset: f64,
    pub duration: f64,
}

impl Voice {
    pub fn osc(wave: Wave, frequency: Plan, gain: Plan, duration: f64) -> Self {
        Self { source: Source::Osc { wave, frequency }, gain, filter: None, offset: 0.0, duration }
    }

    pub fn noise(filter: FilterSpec, gain: Plan, duration: f64) -> Self {
        Self { source: Source::Noise, gain, filter: Some(filter), offset: 0.0, duration }
    }

    pub fn delayed(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }
}

/// A fire-and-forget sound.
#[derive(Clone, Debug, PartialEq)]
pub struct OneShot {
    pub name: &'static str,
    pub voices: Vec<Voice>,
}

impl OneShot {
    /// Time from trigger until the last voice stops.
    pub fn duration(&self) -> f64 {
        self.voices.iter().map(|v| v.offset + v.duration).fold(0.0, f64::max)
    }

    /// Build, start and release every voice at `at`, routed into `bus`.
    /// Noise voices are skipped when no buffer is supplied. Returns the number of voices scheduled.
    pub fn schedule(&self, graph: &mut Graph, bus: NodeId, noise: Option<&Arc<NoiseBuffer>>, at: f64) -> usize {
        let mut scheduled = 0;
        for v in &self.voices {
            let t0 = at + v.offset;
            let src = match &v.source {
                Source::Osc { wave, frequency } => {
                    let id = graph.add(NodeKind::oscillator(*wave, frequency.initial));
                    if let Some(a) = graph.param_mut(id, Param::Frequency) {
                        frequency.apply(a, t0);
                    }
                    id
                }
                Source::Noise => {
                    let Some(buf) = noise else {
                        debug!("{}: noise voice skipped, no buffer", self.name);
                        continue;
                    };
                    graph.add(NodeKind::buffer_source(Arc::clone(buf), true))
                }
            };

            let amp = graph.add(NodeKind::gain(v.gain.initial));
            if let Some(a) = graph.param_mut(amp, Param::Gain) {
                v.gain.apply(a, t0);
            }

            let mut chain = vec![src];
            if let Some(spec) = &v.filter {
                let sr = graph.sample_rate();
                let f = graph.add(NodeKind::filter(spec.mode, spec.cutoff.initial, spec.q, sr));
                if let Some(a) = graph.param_mut(f, Param::Frequency) {
                    spec.cutoff.apply(a, t0);
                }
                chain.push(f);
            }
            chain.push(amp);
            for pair in chain.windows(2) {
                graph.connect(pair[0], pair[1]);
            }
            graph.connect(amp, bus);

            graph.start(src, t0);
            graph.stop(src, t0 + v.duration);
            for id in chain {
                graph.release(id);
            }
            scheduled += 1;
        }
        debug!("{}: scheduled {scheduled} voices at {at:.3}s", self.name);
        scheduled
    }
}

// --------------------------------- Presets ---------------------------------------

/// Short downward ping for UI taps.
pub fn click() -> OneShot {
    OneShot {
        name: "click",
        voices: vec![Voice::osc(
            Wave::Sine,
            Plan::new(800.0).exponential(100.0, 0.15),
            Plan::new(0.05).exponential(0.001, 0.1),
            0.15,
        )],
    }
}

/// Bell on C5 with a quieter octave partial.
pub fn completion_chime() -> OneShot {
    OneShot {
        name: "chime",
        voices: vec![
            Voice::osc(
                Wave::Sine,
                Plan::new(523.25),
                Plan::new(0.0).linear(0.3, 0.05).exponential(0.001, 3.0),
                3.0,
            ),
            Voice::osc(
                Wave::Sine,
                Plan::new(1046.50),
                Plan::new(0.0).linear(0.1, 0.05).exponential(0.001, 2.5),
                2.5,
            ),
        ],
    }
}

const SWELL_CHORD: [f32; 3] = [146.83, 185.00, 220.00];
const SPARKLES: usize = 6;

/// Chord swell, noise whoosh and scattered high sparkles, layered.
pub fn reveal_swell<R: Rng + ?Sized>(rng: &mut R) -> OneShot {
    let mut voices: Vec<Voice> = SWELL_CHORD
        .iter()
        .map(|&hz| {
            Voice::osc(
                Wave::Tri,
                Plan::new(hz),
                Plan::new(0.0).linear(0.1, 2.0).exponential(0.001, 10.0),
                10.0,
            )
        })
        .collect();

    voices.push(Voice::noise(
        FilterSpec {
            mode: SvfMode::Highpass,
            q: 0.7,
            cutoff: Plan::new(500.0).exponential(8000.0, 1.5),
        },
        Plan::new(0.0).linear(0.15, 0.8).linear(0.0, 2.0),
        2.0,
    ));

    for i in 0..SPARKLES {
        let hz = rng.gen_range(2000.0f32..5000.0);
        let offset = i as f64 * 0.15 + rng.gen_range(0.0..0.1);
        voices.push(
            Voice::osc(
                Wave::Sine,
                Plan::new(hz),
                Plan::new(0.0).linear(0.05, 0.05).exponential(0.001, 1.05),
                1.1,
            )
            .delayed(offset),
        );
    }

    OneShot { name: "reveal", voices }
}

// ------------------------------------ Tests --------------------------------------
