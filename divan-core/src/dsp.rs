//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` approximations for hot paths
//! - Side-effect free helpers that are easy to test
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // micromath preferred if explicitly requested (works in no_std)
    if #[cfg(feature = "micromath")] {
        use micromath::F32Ext as _;
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] fn m_tan(x: f32) -> f32 { (x.sin()) / (x.cos()) }
    // libm (C math) in no_std
    } else if #[cfg(feature = "no-std")] {
        #[inline] fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] fn m_cos(x: f32) -> f32 { libm::cosf(x) }
        #[inline] fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] fn m_ln(x: f32) -> f32 { libm::logf(x) }
        #[inline] fn m_tan(x: f32) -> f32 { libm::tanf(x) }
    // std backend
    } else {
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] fn m_tan(x: f32) -> f32 { x.tan() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f32 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

/// Smallest magnitude an exponential curve may start from or aim at.
/// Exponential segments cannot cross or touch zero, so targets are clamped here.
pub const EXP_FLOOR: f32 = 1.0e-4;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Wrap phase into [0, 1).
#[inline]
pub fn wrap_phase01(mut p: f32) -> f32 {
    p = p - (p + 1.0).floor() + 1.0;
    if p >= 1.0 { p - 1.0 } else { p }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

// --------------------------------- Curves ----------------------------------------

/// Geometric interpolation between `a` and `b` at position `t` in [0,1]:
/// `a * (b/a)^t`. Both ends must share a sign and be non-zero; callers
/// clamp with [`EXP_FLOOR`] first.
#[inline]
pub fn exp_interp(a: f32, b: f32, t: f32) -> f32 {
    a * m_exp(t * m_ln(b / a))
}

/// First-order approach towards `target` after `dt` seconds with time constant `tau`:
/// `target + (start - target) * e^(-dt/tau)`.
///
/// A non-positive `tau` jumps straight to the target.
#[inline]
pub fn approach(start: f32, target: f32, dt: f32, tau: f32) -> f32 {
    if tau <= 0.0 {
        return target;
    }
    target + (start - target) * m_exp(-dt / tau)
}

// --------------------------------- Fast trig -------------------------------------

/// Fast sine with range reduction into [-π, π] and 5th-order minimax-style poly.
/// Max abs error ~1e-3 for musical uses when `fast-math` is enabled; falls back to exact otherwise.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let mut xr = x;
            let k = (xr / TAU).round();
            xr -= k * TAU;

            // 5th-order odd polynomial: sin(x) ≈ x * (a + b x^2 + c x^4)
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            m_sin(x)
        }
    }
}

#[inline]
pub fn fast_cos(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            // cos(x) = sin(x + π/2)
            fast_sin(x + core::f32::consts::PI * 0.5)
        } else {
            m_cos(x)
        }
    }
}

/// TPT (Topology-Preserving Transform) `g = tan(π fc / sr)` helper for state-variable filters.
///
/// If `fast-math` is enabled, `tan(x)` is computed as `sin(x)/cos(x)` from the fast
/// approximations, which is sufficient for musical ranges.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    // keep the pole strictly below Nyquist; tan blows up at π/2
    let fc = clamp(cut_hz, 1.0, 0.49 * sr);
    let x = PI * (fc / sr);
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            fast_sin(x) / fast_cos(x)
        } else {
            m_tan(x)
        }
    }
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clamp_bounds_both_sides() {
        assert_eq!(clamp(-3.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(3.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(0.25, -1.0, 1.0), 0.25);
    }

    #[test]
    fn exp_interp_hits_endpoints_and_midpoint() {
        assert_relative_eq!(exp_interp(150.0, 3500.0, 0.0), 150.0, epsilon = 1e-3);
        assert_relative_eq!(exp_interp(150.0, 3500.0, 1.0), 3500.0, max_relative = 1e-4);
        // geometric mean at the halfway point
        let mid = (150.0f32 * 3500.0).sqrt();
        assert_relative_eq!(exp_interp(150.0, 3500.0, 0.5), mid, max_relative = 1e-4);
    }

    #[test]
    fn approach_converges() {
        let v = approach(0.4, 0.0, 1.0, 0.1);
        assert!(v < 0.4 * 1e-4, "v={v}");
        assert_eq!(approach(0.4, 0.0, 0.5, 0.0), 0.0);
    }

    #[test]
    fn wrap_phase_stays_in_unit_interval() {
        for p in [-2.5, -1.0, -0.25, 0.0, 0.5, 0.999, 1.0, 3.75] {
            let w = wrap_phase01(p);
            assert!((0.0..1.0).contains(&w), "p={p} w={w}");
        }
    }

    #[test]
    fn tpt_g_is_finite_at_nyquist() {
        assert!(tpt_g(24_000.0, 48_000.0).is_finite());
        assert!(tpt_g(0.0, 48_000.0) > 0.0);
    }
}
