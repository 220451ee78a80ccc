//! The engine facade the application talks to.
//!
//! [`SoundEngine`] is the whole surface: mute, the three one-shots, the ambient
//! drone, the breath gesture and raw haptics. [`Engine`] renders through an
//! [`AudioContext`]; [`SilentEngine`] stands in when the host has no audio and
//! keeps only the haptic side. [`open`] picks between them.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ambient::AmbientDrone;
use crate::breath::{BreathGesture, BreathVoice};
use crate::config::EngineConfig;
use crate::context::AudioContext;
use crate::error::Result;
use crate::graph::NodeId;
use crate::haptics::{HapticKind, Haptics};
use crate::noise::NoiseBuffer;
use crate::nodes::{NodeKind, Param};
use crate::voices::{self, OneShot};

/// Everything the application can ask of the sound layer.
///
/// No method fails: missing capabilities turn calls into no-ops and invalid
/// transitions (stopping an idle breath, fading a drone that never started)
/// are ignored.
pub trait SoundEngine {
    /// Unlock output, build the noise buffer and start the ambient drone.
    /// Call from a user gesture. Idempotent.
    fn init(&mut self);

    /// Flip the mute flag and return the new value.
    fn toggle_mute(&mut self) -> bool;

    fn is_muted(&self) -> bool;

    fn play_click(&mut self);

    fn play_completion(&mut self);

    fn play_reveal(&mut self);

    /// Duck the drone to its residual level over `secs`.
    fn fade_ambient_out(&mut self, secs: f32);

    /// Restore the drone to its base level over `secs`.
    fn fade_ambient_in(&mut self, secs: f32);

    /// Begin the inhale. Ignored while a breath is already charging.
    fn start_breath(&mut self);

    /// Report how long the gesture has been held; fires due tick haptics and
    /// returns progress in [0, 1].
    fn breath_progress(&mut self, held: Duration) -> f32;

    /// End the breath: an exhale when `completed`, a quick cut otherwise.
    fn stop_breath(&mut self, completed: bool);

    fn trigger_haptic(&mut self, kind: HapticKind);

    /// Whether sound is actually produced.
    fn is_audible(&self) -> bool {
        true
    }
}

/// Live engine over an audio context.
pub struct Engine {
    ctx: AudioContext,
    master: NodeId,
    noise: Option<Arc<NoiseBuffer>>,
    ambient: Option<AmbientDrone>,
    breath: Option<BreathVoice>,
    gesture: BreathGesture,
    haptics: Haptics,
    muted: bool,
    rng: StdRng,
    config: EngineConfig,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("ctx", &self.ctx)
            .field("muted", &self.muted)
            .field("ambient", &self.ambient.is_some())
            .field("breathing", &self.gesture.is_charging())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build the master stage on `ctx`. The context stays suspended until [`SoundEngine::init`].
    pub fn new(ctx: AudioContext, config: EngineConfig, haptics: Haptics) -> Self {
        let level = config.master_level;
        let master = ctx.with_graph(|g| {
            let m = g.add(NodeKind::gain(level));
            g.connect(m, g.destination());
            m
        });
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!("engine: master {level} @ {} Hz", ctx.sample_rate());
        Self {
            ctx,
            master,
            noise: None,
            ambient: None,
            breath: None,
            gesture: BreathGesture::new(config.breath.duration),
            haptics,
            muted: false,
            rng,
            config,
        }
    }

    /// Engine over a host-pulled context at `config.sample_rate`.
    pub fn offline(config: EngineConfig, haptics: Haptics) -> Self {
        let ctx = AudioContext::offline(config.sample_rate);
        Self::new(ctx, config, haptics)
    }

    /// Engine on a cpal output device (`None` for the default one).
    #[cfg(feature = "realtime")]
    pub fn realtime(config: EngineConfig, device: Option<&str>, haptics: Haptics) -> Result<Self> {
        let ctx = AudioContext::realtime(device)?;
        Ok(Self::new(ctx, config, haptics))
    }

    #[inline] pub fn context(&self) -> &AudioContext { &self.ctx }

    /// Follow a host-pulled output that changed rate. The noise buffer is
    /// rebuilt at the new rate on next use; playing sources keep the old one.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        self.ctx.set_sample_rate(sample_rate)?;
        self.noise = None;
        Ok(())
    }
    #[inline] pub fn config(&self) -> &EngineConfig { &self.config }

    /// Instantaneous master level.
    pub fn master_level(&self) -> f32 {
        let master = self.master;
        self.ctx.with_graph(|g| g.param_value(master, Param::Gain).unwrap_or(0.0))
    }

    /// Instantaneous drone sub-bus level, once the drone runs.
    pub fn ambient_level(&self) -> Option<f32> {
        let drone = self.ambient.as_ref()?;
        Some(self.ctx.with_graph(|g| drone.level(g)))
    }

    /// Instantaneous (cutoff, gain) of the charging breath.
    pub fn breath_levels(&self) -> Option<(f32, f32)> {
        let voice = self.breath.as_ref()?;
        Some(self.ctx.with_graph(|g| voice.levels(g)))
    }

    /// Shared noise buffer, generated on first use.
    fn noise(&mut self) -> Arc<NoiseBuffer> {
        if let Some(buf) = &self.noise {
            return Arc::clone(buf);
        }
        let buf = Arc::new(NoiseBuffer::generate_with(
            &mut self.rng,
            self.config.noise_seconds,
            self.ctx.sample_rate(),
        ));
        debug!("engine: noise buffer {} frames", buf.len());
        self.noise = Some(Arc::clone(&buf));
        buf
    }

    fn schedule(&mut self, shot: &OneShot) {
        let noise = shot.voices.iter().any(|v| v.source == voices::Source::Noise).then(|| self.noise());
        let master = self.master;
        self.ctx.with_graph(|g| {
            let now = g.now();
            shot.schedule(g, master, noise.as_ref(), now)
        });
    }
}

impl SoundEngine for Engine {
    fn init(&mut self) {
        if let Err(e) = self.ctx.resume() {
            warn!("audio resume failed: {e}");
        }
        self.noise();
        if self.ambient.is_none() {
            let master = self.master;
            let preset = &self.config.ambient;
            self.ambient = Some(self.ctx.with_graph(|g| AmbientDrone::start(g, master, preset)));
        }
    }

    fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        let target = if self.muted { 0.0 } else { self.config.master_level };
        let tau = self.config.mute_time_constant;
        let master = self.master;
        self.ctx.with_graph(|g| {
            let now = g.now();
            if let Some(a) = g.param_mut(master, Param::Gain) {
                a.hold_at(now);
                a.set_target_at(target, now, tau);
            }
        });
        debug!("engine: muted={}", self.muted);
        self.muted
    }

    #[inline]
    fn is_muted(&self) -> bool {
        self.muted
    }

    fn play_click(&mut self) {
        self.haptics.trigger(HapticKind::Light);
        self.schedule(&voices::click());
    }

    fn play_completion(&mut self) {
        self.haptics.trigger(HapticKind::Success);
        self.schedule(&voices::completion_chime());
    }

    fn play_reveal(&mut self) {
        self.haptics.trigger(HapticKind::Medium);
        let shot = voices::reveal_swell(&mut self.rng);
        self.schedule(&shot);
    }

    fn fade_ambient_out(&mut self, secs: f32) {
        if let Some(drone) = &self.ambient {
            self.ctx.with_graph(|g| drone.fade_out(g, secs));
        }
    }

    fn fade_ambient_in(&mut self, secs: f32) {
        if let Some(drone) = &self.ambient {
            self.ctx.with_graph(|g| drone.fade_in(g, secs));
        }
    }

    fn start_breath(&mut self) {
        if !self.gesture.begin() {
            return;
        }
        let noise = self.noise();
        let master = self.master;
        let preset = &self.config.breath;
        self.breath = Some(self.ctx.with_graph(|g| BreathVoice::start(g, noise, master, preset)));
        self.breath_progress(Duration::ZERO);
    }

    fn breath_progress(&mut self, held: Duration) -> f32 {
        let (p, due) = self.gesture.progress(held);
        for _ in 0..due {
            self.haptics.trigger(HapticKind::Tick);
        }
        p
    }

    fn stop_breath(&mut self, completed: bool) {
        if !self.gesture.end() {
            return;
        }
        if let Some(voice) = self.breath.take() {
            let preset = &self.config.breath;
            self.ctx.with_graph(|g| voice.release(g, completed, preset));
        }
        self.haptics.trigger(if completed { HapticKind::Success } else { HapticKind::Failure });
    }

    fn trigger_haptic(&mut self, kind: HapticKind) {
        self.haptics.trigger(kind);
    }
}

/// Stand-in for hosts without audio output. Haptics still fire for the
/// one-shots and the breath tick cadence still runs; nothing is rendered.
#[derive(Debug)]
pub struct SilentEngine {
    haptics: Haptics,
    gesture: BreathGesture,
    muted: bool,
}

impl SilentEngine {
    pub fn new(haptics: Haptics, config: &EngineConfig) -> Self {
        Self { haptics, gesture: BreathGesture::new(config.breath.duration), muted: false }
    }
}

impl SoundEngine for SilentEngine {
    fn init(&mut self) {}

    fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn play_click(&mut self) {
        self.haptics.trigger(HapticKind::Light);
    }

    fn play_completion(&mut self) {
        self.haptics.trigger(HapticKind::Success);
    }

    fn play_reveal(&mut self) {
        self.haptics.trigger(HapticKind::Medium);
    }

    fn fade_ambient_out(&mut self, _secs: f32) {}

    fn fade_ambient_in(&mut self, _secs: f32) {}

    fn start_breath(&mut self) {
        if self.gesture.begin() {
            self.breath_progress(Duration::ZERO);
        }
    }

    fn breath_progress(&mut self, held: Duration) -> f32 {
        let (p, due) = self.gesture.progress(held);
        for _ in 0..due {
            self.haptics.trigger(HapticKind::Tick);
        }
        p
    }

    fn stop_breath(&mut self, _completed: bool) {
        self.gesture.end();
    }

    fn trigger_haptic(&mut self, kind: HapticKind) {
        self.haptics.trigger(kind);
    }

    fn is_audible(&self) -> bool {
        false
    }
}

/// Open the default output device, or fall back to [`SilentEngine`] when the
/// host has none (or the crate was built without `realtime`).
pub fn open(config: EngineConfig, haptics: Haptics) -> Box<dyn SoundEngine> {
    #[cfg(feature = "realtime")]
    match AudioContext::realtime(None) {
        Ok(ctx) => return Box::new(Engine::new(ctx, config, haptics)),
        Err(e) => warn!("audio unavailable, continuing silently: {e}"),
    }
    #[cfg(not(feature = "realtime"))]
    warn!("built without realtime audio, continuing silently");

    Box::new(SilentEngine::new(haptics, &config))
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haptics::testing::Recorder;
    use crate::nodes::Frame;
    use approx::assert_relative_eq;

    fn engine() -> (Engine, Recorder) {
        let rec = Recorder::default();
        let e = Engine::offline(EngineConfig::default().with_seed(7), Haptics::new(rec.clone()));
        (e, rec)
    }

    fn run(e: &Engine, secs: f32) -> Vec<Frame> {
        e.context().render_seconds(secs)
    }

    fn looping_sources(e: &Engine) -> usize {
        e.context().with_graph(|g| {
            g.count_where(|k| matches!(k, NodeKind::BufferSource { looping: true, .. }))
        })
    }

    #[test]
    fn mute_twice_restores_flag_and_level() {
        let (mut e, _) = engine();
        e.init();
        assert!(e.toggle_mute());
        run(&e, 1.0);
        assert!(e.master_level() < 1e-4);
        assert!(!e.toggle_mute());
        assert!(!e.is_muted());
        run(&e, 1.0);
        assert_relative_eq!(e.master_level(), 0.4, epsilon = 1e-4);
    }

    #[test]
    fn mute_is_smooth() {
        let (mut e, _) = engine();
        e.init();
        run(&e, 0.5);
        e.toggle_mute();
        assert_relative_eq!(e.master_level(), 0.4, epsilon = 1e-6);
        run(&e, 0.1);
        // one time constant: 1/e of the way left
        assert_relative_eq!(e.master_level(), 0.4 * (-1.0f32).exp(), epsilon = 1e-3);
    }

    #[test]
    fn double_start_breath_is_one_session() {
        let (mut e, rec) = engine();
        e.init();
        e.start_breath();
        e.start_breath();
        assert_eq!(looping_sources(&e), 1);
        assert_eq!(rec.count(HapticKind::Tick), 1);
    }

    #[test]
    fn stop_while_idle_is_ignored() {
        let (mut e, rec) = engine();
        e.init();
        e.stop_breath(true);
        e.stop_breath(false);
        assert!(rec.patterns().is_empty());
    }

    #[test]
    fn three_second_hold_then_exhale() {
        let (mut e, rec) = engine();
        e.init();
        e.start_breath();
        for ms in (100..=3000).step_by(100) {
            run(&e, 0.1);
            e.breath_progress(Duration::from_millis(ms));
        }
        let Some((cut, gain)) = e.breath_levels() else { panic!("breath is charging") };
        assert_relative_eq!(cut, 3500.0, max_relative = 1e-3);
        assert_relative_eq!(gain, 1.0, epsilon = 1e-3);
        assert_eq!(rec.count(HapticKind::Tick), 5);

        e.stop_breath(true);
        assert!(e.breath_levels().is_none());
        assert_eq!(rec.count(HapticKind::Success), 1);
        run(&e, 1.9);
        assert_eq!(looping_sources(&e), 1, "still exhaling");
        run(&e, 0.15);
        assert_eq!(looping_sources(&e), 0, "breath reclaimed after the exhale");
    }

    #[test]
    fn interrupted_breath_fires_failure() {
        let (mut e, rec) = engine();
        e.init();
        e.start_breath();
        run(&e, 0.5);
        e.stop_breath(false);
        assert_eq!(rec.count(HapticKind::Failure), 1);
        run(&e, 0.25);
        assert_eq!(looping_sources(&e), 0);
    }

    #[test]
    fn interrupt_right_after_start_closes_in_the_release_window() {
        let (mut e, rec) = engine();
        e.init();
        e.start_breath();
        let Some(voice) = e.breath.clone() else { panic!("breath is charging") };
        e.stop_breath(false);
        assert_eq!(rec.count(HapticKind::Failure), 1);

        run(&e, 0.2);
        let gain = e.context().with_graph(|g| voice.levels(g).1);
        assert!(gain.abs() <= 1e-6, "gain={gain}");
        assert_eq!(looping_sources(&e), 1, "stop time is exclusive");
        run(&e, 0.01);
        assert_eq!(looping_sources(&e), 0);
        assert!(!e.context().with_graph(|g| g.contains(voice.source())));
    }

    #[test]
    fn ambient_fades_without_steps() {
        let (mut e, _) = engine();
        assert!(e.ambient_level().is_none());
        e.fade_ambient_out(1.0);
        e.init();
        run(&e, 3.0);
        assert_relative_eq!(e.ambient_level().unwrap_or(0.0), 0.15, epsilon = 1e-4);
        e.fade_ambient_out(3.0);
        run(&e, 1.5);
        let mid = e.ambient_level().unwrap_or(0.0);
        e.fade_ambient_in(2.0);
        assert_relative_eq!(e.ambient_level().unwrap_or(0.0), mid, epsilon = 1e-6);
        run(&e, 2.0);
        assert_relative_eq!(e.ambient_level().unwrap_or(0.0), 0.15, epsilon = 1e-4);
    }

    #[test]
    fn one_shots_sound_and_fire_haptics() {
        let (mut e, rec) = engine();
        assert!(e.context().resume().is_ok());
        assert!(run(&e, 0.05).iter().all(|f| f[0] == 0.0));

        e.play_click();
        let click = run(&e, 0.05).iter().map(|f| f[0].abs()).fold(0.0, f32::max);
        assert!(click > 0.005, "click={click}");

        e.play_completion();
        e.play_reveal();
        assert_eq!(
            rec.patterns(),
            vec![
                HapticKind::Light.pattern().to_vec(),
                HapticKind::Success.pattern().to_vec(),
                HapticKind::Medium.pattern().to_vec(),
            ]
        );
        run(&e, 11.0);
        let left = e.context().with_graph(|g| g.count_where(NodeKind::is_source));
        assert_eq!(left, 0, "every one-shot voice reclaimed");
    }

    #[test]
    fn nothing_audible_before_init() {
        let (mut e, _) = engine();
        e.play_click();
        assert!(run(&e, 0.1).iter().all(|f| f[0] == 0.0));
        e.init();
        let out = run(&e, 0.1);
        assert!(out.iter().any(|f| f[0] != 0.0), "click queued before resume still plays");
    }

    #[test]
    fn init_is_idempotent() {
        let (mut e, _) = engine();
        e.init();
        let nodes = e.context().with_graph(|g| g.node_count());
        let noise = e.noise.clone();
        e.init();
        assert_eq!(e.context().with_graph(|g| g.node_count()), nodes);
        match (&noise, &e.noise) {
            (Some(a), Some(b)) => assert!(Arc::ptr_eq(a, b), "noise buffer rebuilt"),
            _ => panic!("init builds the noise buffer"),
        }
    }

    #[test]
    fn rate_change_rebuilds_noise_at_the_new_rate() {
        let (mut e, _) = engine();
        e.init();
        let before = e.noise.as_ref().map(|n| n.len());
        assert!(e.set_sample_rate(24_000).is_ok());
        assert!(e.noise.is_none());
        e.start_breath();
        let after = e.noise.as_ref().map(|n| n.len());
        assert_eq!(before.zip(after).map(|(b, a)| b / a), Some(2));
        assert!(run(&e, 0.1).iter().any(|f| f[0] != 0.0));
    }

    #[test]
    fn open_always_yields_a_usable_engine() {
        let rec = Recorder::default();
        let mut s = open(EngineConfig::default().with_seed(7), Haptics::new(rec.clone()));
        #[cfg(not(feature = "realtime"))]
        assert!(!s.is_audible());
        s.init();
        s.init();
        assert!(s.toggle_mute());
        assert!(s.is_muted());
        assert!(!s.toggle_mute());
        s.play_click();
        s.play_completion();
        s.play_reveal();
        s.fade_ambient_out(0.5);
        s.fade_ambient_in(0.5);
        s.start_breath();
        assert_relative_eq!(s.breath_progress(Duration::from_millis(1500)), 0.5, epsilon = 1e-6);
        s.stop_breath(false);
        s.stop_breath(true);
        s.trigger_haptic(HapticKind::Heavy);
        assert_eq!(rec.count(HapticKind::Light), 1);
        assert_eq!(rec.count(HapticKind::Tick), 3);
        assert_eq!(rec.count(HapticKind::Heavy), 1);
    }

    #[test]
    fn silent_engine_is_safe() {
        let rec = Recorder::default();
        let mut s = SilentEngine::new(Haptics::new(rec.clone()), &EngineConfig::default());
        assert!(!s.is_audible());
        s.init();
        assert!(s.toggle_mute());
        assert!(!s.toggle_mute());
        s.play_click();
        s.play_completion();
        s.play_reveal();
        s.fade_ambient_out(3.0);
        s.fade_ambient_in(2.0);
        s.start_breath();
        assert_relative_eq!(s.breath_progress(Duration::from_millis(1500)), 0.5);
        s.stop_breath(true);
        s.stop_breath(false);
        s.trigger_haptic(HapticKind::Heavy);
        assert_eq!(rec.count(HapticKind::Tick), 3);
        assert_eq!(rec.count(HapticKind::Heavy), 1);

        let mut bare = SilentEngine::new(Haptics::none(), &EngineConfig::default());
        bare.play_reveal();
        bare.start_breath();
    }
}
