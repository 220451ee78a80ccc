//! Engine presets.
//!
//! Every constant that shapes a sound lives here so hosts can retune the
//! experience without touching the synthesis code. The defaults are the
//! values the ritual was voiced with.

use crate::nodes::Wave;

/// Sustained drone pad.
#[derive(Clone, Debug, PartialEq)]
pub struct AmbientPreset {
    /// Oscillators of the pad (D2, A2, E3: a suspended voicing).
    pub voices: Vec<(Wave, f32)>,
    /// Level of the internal mix stage before modulation.
    pub mix_level: f32,
    /// "Breathing" LFO rate in Hz (0.05 Hz = 20 s cycle).
    pub lfo_rate: f32,
    /// LFO depth added to the mix level.
    pub lfo_depth: f32,
    /// Sub-bus level when fully faded in.
    pub base_level: f32,
    /// Sub-bus level when ducked; never true silence.
    pub duck_level: f32,
    /// Fade-in time when the drone first starts.
    pub initial_fade: f32,
}

impl Default for AmbientPreset {
    fn default() -> Self {
        Self {
            voices: vec![(Wave::Sine, 73.42), (Wave::Tri, 110.00), (Wave::Sine, 164.81)],
            mix_level: 1.0,
            lfo_rate: 0.05,
            lfo_depth: 0.15,
            base_level: 0.15,
            duck_level: 0.02,
            initial_fade: 3.0,
        }
    }
}

/// Press-and-hold breath gesture.
#[derive(Clone, Debug, PartialEq)]
pub struct BreathPreset {
    /// Nominal hold time for a completed breath.
    pub duration: f32,
    /// Low-pass cutoff at the start of the inhale.
    pub closed_cutoff: f32,
    /// Cutoff reached at the end of the inhale.
    pub open_cutoff: f32,
    pub q: f32,
    /// Gain reached at the end of the inhale.
    pub peak_gain: f32,
    /// Release window of a completed breath (exhale).
    pub exhale_time: f32,
    /// Cutoff the exhale sweeps down to.
    pub exhale_cutoff: f32,
    /// Release window of an interrupted breath.
    pub interrupt_time: f32,
}

impl Default for BreathPreset {
    fn default() -> Self {
        Self {
            duration: 3.0,
            closed_cutoff: 150.0,
            open_cutoff: 3500.0,
            q: 0.6,
            peak_gain: 1.0,
            exhale_time: 2.0,
            exhale_cutoff: 100.0,
            interrupt_time: 0.2,
        }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Rate used by offline contexts; realtime contexts take the device rate.
    pub sample_rate: u32,
    /// Unmuted master level.
    pub master_level: f32,
    /// Time constant of the mute/unmute approach, in seconds.
    pub mute_time_constant: f32,
    /// Length of the shared noise buffer.
    pub noise_seconds: f32,
    /// Seed for noise and sparkle pitches; `None` draws from entropy.
    pub seed: Option<u64>,
    pub ambient: AmbientPreset,
    pub breath: BreathPreset,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            master_level: 0.4,
            mute_time_constant: 0.1,
            noise_seconds: 2.0,
            seed: None,
            ambient: AmbientPreset::default(),
            breath: BreathPreset::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }
}
