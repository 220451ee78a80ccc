//! C ABI wrapper for the Divan sound engine.
//!
//! Exposes the whole `SoundEngine` surface over an offline engine: the host
//! owns the audio device and pulls interleaved f32 samples from its callback.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `DivanEngine` (heap-allocated; you own/delete it).
//! - Null handles are ignored by every function.
//! - Vibration is forwarded to an optional host callback.
//!
//! Threading
//! - The object is NOT thread-safe; serialize calls. Rendering from the audio
//!   thread while controlling from the UI thread needs a host-side lock.

use std::ffi::c_void;
use std::time::Duration;

use divan_engine::{Engine, EngineConfig, EngineError, HapticKind, Haptics, SoundEngine, Vibrator};

/// Host vibration callback: `pattern` points to `len` millisecond values
/// (alternating on/off). Return 0 on success.
pub type DivanVibrateFn = extern "C" fn(pattern: *const u32, len: u32, user: *mut c_void) -> i32;

struct CallbackVibrator {
    callback: DivanVibrateFn,
    user: *mut c_void,
}

impl Vibrator for CallbackVibrator {
    fn vibrate(&mut self, pattern_ms: &[u32]) -> divan_engine::Result<()> {
        match (self.callback)(pattern_ms.as_ptr(), pattern_ms.len() as u32, self.user) {
            0 => Ok(()),
            code => Err(EngineError::Haptic(format!("host callback returned {code}"))),
        }
    }
}

/// Opaque engine handle.
pub struct DivanEngine {
    inner: Engine,
}

impl DivanEngine {
    fn new(sample_rate: u32, seed: u64, vibrate: Option<DivanVibrateFn>, user: *mut c_void) -> Self {
        let mut config = EngineConfig::default().with_sample_rate(sample_rate);
        if seed != 0 {
            config = config.with_seed(seed);
        }
        let haptics = match vibrate {
            Some(callback) => Haptics::new(CallbackVibrator { callback, user }),
            None => Haptics::none(),
        };
        Self { inner: Engine::offline(config, haptics) }
    }
}

fn engine_mut<'a>(engine: *mut DivanEngine) -> Option<&'a mut Engine> {
    // SAFETY: non-null handles come from `divan_create` and are not aliased by contract.
    unsafe { engine.as_mut() }.map(|e| &mut e.inner)
}

fn haptic_kind(kind: u32) -> Option<HapticKind> {
    Some(match kind {
        0 => HapticKind::Tick,
        1 => HapticKind::Light,
        2 => HapticKind::Medium,
        3 => HapticKind::Heavy,
        4 => HapticKind::Success,
        5 => HapticKind::Failure,
        _ => return None,
    })
}

// --- Creation / destruction -------------------------------------------------------

/// Create an engine rendering at `sample_rate`. `seed` 0 draws from entropy.
/// `vibrate` may be null when the device cannot vibrate; `user` is passed back
/// to it untouched.
#[no_mangle]
pub extern "C" fn divan_create(
    sample_rate: u32,
    seed: u64,
    vibrate: Option<DivanVibrateFn>,
    user: *mut c_void,
) -> *mut DivanEngine {
    Box::into_raw(Box::new(DivanEngine::new(sample_rate, seed, vibrate, user)))
}

/// Destroy an engine previously returned by `divan_create`.
#[no_mangle]
pub extern "C" fn divan_destroy(engine: *mut DivanEngine) {
    if !engine.is_null() {
        // SAFETY: pointer came from `Box::into_raw` in `divan_create`.
        unsafe { drop(Box::from_raw(engine)) };
    }
}

/// Unlock output, build the noise buffer and start the ambient drone.
#[no_mangle]
pub extern "C" fn divan_init(engine: *mut DivanEngine) {
    if let Some(e) = engine_mut(engine) {
        e.init();
    }
}

/// Resume rendering without starting the drone. Returns 1 on success.
#[no_mangle]
pub extern "C" fn divan_resume(engine: *mut DivanEngine) -> i32 {
    engine_mut(engine).map_or(0, |e| i32::from(e.context().resume().is_ok()))
}

/// Tell the engine the host output now runs at `sample_rate`. Returns 1 on success.
#[no_mangle]
pub extern "C" fn divan_set_sample_rate(engine: *mut DivanEngine, sample_rate: u32) -> i32 {
    engine_mut(engine).map_or(0, |e| i32::from(e.set_sample_rate(sample_rate).is_ok()))
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` frames into an interleaved f32 buffer of `channels` channels.
/// Stereo fills the first two channels, mono gets the average, extra channels are zeroed.
///
/// Returns the number of frames rendered (0 on error).
#[no_mangle]
pub extern "C" fn divan_render_interleaved_f32(
    engine: *mut DivanEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let Some(e) = engine_mut(engine) else { return 0 };
    let len = frames as usize * channels as usize;
    // SAFETY: the caller provides `frames * channels` writable samples.
    let out = unsafe { std::slice::from_raw_parts_mut(out_interleaved, len) };
    e.context().render(out, channels as usize) as u32
}

// --- Controls --------------------------------------------------------------------

/// Flip mute; returns the new flag (1 muted, 0 unmuted).
#[no_mangle]
pub extern "C" fn divan_toggle_mute(engine: *mut DivanEngine) -> i32 {
    engine_mut(engine).map_or(0, |e| i32::from(e.toggle_mute()))
}

#[no_mangle]
pub extern "C" fn divan_is_muted(engine: *mut DivanEngine) -> i32 {
    engine_mut(engine).map_or(0, |e| i32::from(e.is_muted()))
}

#[no_mangle]
pub extern "C" fn divan_play_click(engine: *mut DivanEngine) {
    if let Some(e) = engine_mut(engine) {
        e.play_click();
    }
}

#[no_mangle]
pub extern "C" fn divan_play_completion(engine: *mut DivanEngine) {
    if let Some(e) = engine_mut(engine) {
        e.play_completion();
    }
}

#[no_mangle]
pub extern "C" fn divan_play_reveal(engine: *mut DivanEngine) {
    if let Some(e) = engine_mut(engine) {
        e.play_reveal();
    }
}

/// Duck the ambient drone over `seconds`.
#[no_mangle]
pub extern "C" fn divan_fade_ambient_out(engine: *mut DivanEngine, seconds: f32) {
    if let Some(e) = engine_mut(engine) {
        e.fade_ambient_out(if seconds.is_finite() { seconds } else { 0.0 });
    }
}

/// Restore the ambient drone over `seconds`.
#[no_mangle]
pub extern "C" fn divan_fade_ambient_in(engine: *mut DivanEngine, seconds: f32) {
    if let Some(e) = engine_mut(engine) {
        e.fade_ambient_in(if seconds.is_finite() { seconds } else { 0.0 });
    }
}

#[no_mangle]
pub extern "C" fn divan_start_breath(engine: *mut DivanEngine) {
    if let Some(e) = engine_mut(engine) {
        e.start_breath();
    }
}

/// Report the hold time in milliseconds; returns progress in [0, 1] and fires due ticks.
#[no_mangle]
pub extern "C" fn divan_breath_progress(engine: *mut DivanEngine, held_ms: u32) -> f32 {
    engine_mut(engine).map_or(0.0, |e| e.breath_progress(Duration::from_millis(u64::from(held_ms))))
}

/// End the breath; nonzero `completed` plays the exhale.
#[no_mangle]
pub extern "C" fn divan_stop_breath(engine: *mut DivanEngine, completed: i32) {
    if let Some(e) = engine_mut(engine) {
        e.stop_breath(completed != 0);
    }
}

/// Fire a haptic: 0 tick, 1 light, 2 medium, 3 heavy, 4 success, 5 failure.
/// Unknown kinds are ignored.
#[no_mangle]
pub extern "C" fn divan_trigger_haptic(engine: *mut DivanEngine, kind: u32) {
    if let (Some(e), Some(kind)) = (engine_mut(engine), haptic_kind(kind)) {
        e.trigger_haptic(kind);
    }
}
