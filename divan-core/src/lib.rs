#![cfg_attr(not(feature = "std"), no_std)]
//! Divan Core — no_std-ready DSP primitives with optional fast-math hooks.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use `libm`/`micromath` math backends
//! - `fast-math`: enable approximations for trig in oscillators and filter coefficients
//!
//! Modules
//! - [`dsp`]        : math backend, utils (clamp, lerp, curves, fast trig)
//! - [`automation`] : scheduled parameter timelines (steps, ramps, target curves)
//! - [`filters`]    : TPT state-variable filter
//!
//! Design
//! - Per-sample primitives are allocation free; automation timelines own a short `Vec`
//! - Clear separation between math helpers and filter/automation building blocks

extern crate alloc;

pub mod automation;
pub mod dsp;
pub mod filters;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::automation::{Automation, Event};
    pub use crate::dsp::{approach, clamp, exp_interp, kill_denormals, lerp, tpt_g, TAU};
    pub use crate::filters::{SvfMode, SvfTpt};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let mut a = Automation::new(0.0);
        a.linear_ramp_to(1.0, 1.0);
        let _ = a.value_at(0.5);
        let mut svf = SvfTpt::new(1000.0, 0.7, 48000.0);
        let _ = svf.process(0.1, SvfMode::Lowpass);
    }
}
