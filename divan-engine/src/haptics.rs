//! Haptic companion: vibration patterns fired alongside sounds.
//!
//! The host supplies a [`Vibrator`] when the device can vibrate. Without one,
//! or when the vibrator reports an error, triggering is a silent no-op.

use log::{debug, info};

use crate::error::Result;

/// Semantic feedback kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HapticKind {
    Tick,
    Light,
    Medium,
    Heavy,
    Success,
    Failure,
}

impl HapticKind {
    /// Vibration pattern in milliseconds, alternating on/off.
    pub fn pattern(self) -> &'static [u32] {
        match self {
            HapticKind::Tick    => &[5],
            HapticKind::Light   => &[10],
            HapticKind::Medium  => &[40],
            HapticKind::Heavy   => &[70],
            HapticKind::Success => &[50, 50, 150],
            HapticKind::Failure => &[100, 50, 100],
        }
    }
}

/// Host vibration facility.
pub trait Vibrator {
    fn vibrate(&mut self, pattern_ms: &[u32]) -> Result<()>;
}

/// Writes patterns to the log instead of a motor; handy on desktops.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogVibrator;

impl Vibrator for LogVibrator {
    fn vibrate(&mut self, pattern_ms: &[u32]) -> Result<()> {
        info!("haptic: vibrate {pattern_ms:?}");
        Ok(())
    }
}

/// Optional vibration capability.
#[derive(Default)]
pub struct Haptics {
    device: Option<Box<dyn Vibrator>>,
}

impl core::fmt::Debug for Haptics {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Haptics").field("available", &self.is_available()).finish()
    }
}

impl Haptics {
    /// No vibration capability.
    pub fn none() -> Self {
        Self { device: None }
    }

    pub fn new(device: impl Vibrator + 'static) -> Self {
        Self { device: Some(Box::new(device)) }
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.device.is_some()
    }

    /// Fire the pattern for `kind`. Failures are logged and dropped.
    pub fn trigger(&mut self, kind: HapticKind) {
        let Some(device) = self.device.as_mut() else { return };
        if let Err(e) = device.vibrate(kind.pattern()) {
            debug!("haptic {kind:?} dropped: {e}");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Records every pattern it is asked to play.
    #[derive(Clone, Default)]
    pub struct Recorder(pub Arc<Mutex<Vec<Vec<u32>>>>);

    impl Recorder {
        pub fn patterns(&self) -> Vec<Vec<u32>> {
            self.0.lock().clone()
        }

        pub fn count(&self, kind: HapticKind) -> usize {
            self.0.lock().iter().filter(|p| p.as_slice() == kind.pattern()).count()
        }
    }

    impl Vibrator for Recorder {
        fn vibrate(&mut self, pattern_ms: &[u32]) -> Result<()> {
            self.0.lock().push(pattern_ms.to_vec());
            Ok(())
        }
    }
}
