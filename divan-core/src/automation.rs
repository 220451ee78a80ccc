//! Sample-accurate parameter automation.
//!
//! An [`Automation`] is the timeline behind one automatable parameter (a gain
//! level, a filter cutoff, an oscillator frequency). It owns an intrinsic value
//! plus a time-ordered list of scheduled [`Event`]s, and answers "what is the
//! value at time `t`?" without any per-sample state, so the control side can
//! query the exact instantaneous value while the renderer is running.
//!
//! Curves
//! - `set_value_at`        : step at a time
//! - `linear_ramp_to`      : straight line from the previous event to `(time, value)`
//! - `exponential_ramp_to` : geometric curve from the previous event to `(time, value)`
//! - `set_target_at`       : first-order approach towards a target (RC curve)
//!
//! Ramps are anchored on the event that precedes them. To change direction
//! mid-flight without a step, call [`Automation::hold_at`] first: it captures the
//! instantaneous value, cancels everything at or after `t` and re-anchors there.
//!
//! A target curve runs until the next event's time; a ramp scheduled directly
//! after one only takes over at its end time, so always `hold_at` before
//! ramping away from a target curve.
//!
//! Times are `f64` seconds on the context clock; values are `f32`.

use alloc::vec::Vec;

use crate::dsp::{approach, exp_interp, lerp, EXP_FLOOR};

/// One scheduled change on a parameter timeline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Event {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
    ExponentialRamp { time: f64, value: f32 },
    SetTarget { time: f64, target: f32, tau: f32 },
}

impl Event {
    #[inline]
    pub fn time(&self) -> f64 {
        match *self {
            Event::SetValue { time, .. }
            | Event::LinearRamp { time, .. }
            | Event::ExponentialRamp { time, .. }
            | Event::SetTarget { time, .. } => time,
        }
    }
}

/// Keep exponential end points away from zero, preserving sign.
#[inline]
fn exp_safe(v: f32) -> f32 {
    if v.abs() >= EXP_FLOOR {
        v
    } else if v < 0.0 {
        -EXP_FLOOR
    } else {
        EXP_FLOOR
    }
}

/// Timeline of one automatable parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Automation {
    value: f32,
    events: Vec<Event>,
}

impl Automation {
    #[inline]
    pub fn new(value: f32) -> Self {
        Self { value, events: Vec::new() }
    }

    /// Intrinsic value used before the first event (and after settling).
    #[inline]
    pub fn intrinsic(&self) -> f32 {
        self.value
    }

    /// Replace the intrinsic value and drop every scheduled event.
    #[inline]
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        self.events.clear();
    }

    #[inline]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Time of the last scheduled event, if any.
    #[inline]
    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(Event::time)
    }

    fn insert(&mut self, ev: Event) -> &mut Self {
        // stable: equal times keep insertion order
        let at = self.events.partition_point(|e| e.time() <= ev.time());
        self.events.insert(at, ev);
        self
    }

    pub fn set_value_at(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Event::SetValue { time, value })
    }

    pub fn linear_ramp_to(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Event::LinearRamp { time, value })
    }

    /// Geometric ramp. Targets closer to zero than [`EXP_FLOOR`] are clamped to it.
    pub fn exponential_ramp_to(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Event::ExponentialRamp { time, value: exp_safe(value) })
    }

    /// Approach `target` from `time` on with time constant `tau` seconds.
    pub fn set_target_at(&mut self, target: f32, time: f64, tau: f32) -> &mut Self {
        self.insert(Event::SetTarget { time, target, tau })
    }

    /// Drop every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) -> &mut Self {
        self.events.retain(|e| e.time() < time);
        self
    }

    /// Capture the value at `time`, cancel everything from `time` on and pin the
    /// captured value there. Returns the captured value.
    pub fn hold_at(&mut self, time: f64) -> f32 {
        let v = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.set_value_at(v, time);
        v
    }

    /// Value of the parameter at `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        let mut v = self.value;
        let mut t0 = 0.0f64;

        for (i, ev) in self.events.iter().enumerate() {
            match *ev {
                Event::SetValue { time, value } => {
                    if time > t {
                        break;
                    }
                    v = value;
                    t0 = time;
                }
                Event::LinearRamp { time, value } => {
                    if time > t {
                        let span = time - t0;
                        if span <= 0.0 {
                            return value;
                        }
                        return lerp(v, value, ((t - t0) / span) as f32);
                    }
                    v = value;
                    t0 = time;
                }
                Event::ExponentialRamp { time, value } => {
                    if time > t {
                        let span = time - t0;
                        if span <= 0.0 {
                            return value;
                        }
                        // start on the same side of zero as the end point
                        let start = if v * value > 0.0 { exp_safe(v) } else if value < 0.0 { -EXP_FLOOR } else { EXP_FLOOR };
                        return exp_interp(start, value, ((t - t0) / span) as f32);
                    }
                    v = value;
                    t0 = time;
                }
                Event::SetTarget { time, target, tau } => {
                    if time > t {
                        break;
                    }
                    match self.events.get(i + 1).map(Event::time) {
                        Some(next) if next <= t => {
                            v = approach(v, target, (next - time) as f32, tau);
                            t0 = next;
                        }
                        _ => return approach(v, target, (t - time) as f32, tau),
                    }
                }
            }
        }
        v
    }

    /// Fold everything that finished before `now` into the intrinsic value.
    ///
    /// Keeps event lists short on long-lived parameters. A trailing target curve
    /// is only folded once it has converged (ten time constants).
    pub fn settle(&mut self, now: f64) {
        let Some(last) = self.events.last().copied() else { return };
        let done = match last {
            Event::SetTarget { time, tau, .. } => now - time >= f64::from(tau) * 10.0,
            other => other.time() <= now,
        };
        if done {
            self.value = match last {
                Event::SetTarget { target, .. } => target,
                _ => self.value_at(now),
            };
            self.events.clear();
        }
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn intrinsic_value_before_any_event() {
        let a = Automation::new(0.4);
        assert_eq!(a.value_at(0.0), 0.4);
        assert_eq!(a.value_at(10.0), 0.4);
    }

    #[test]
    fn linear_ramp_interpolates_from_previous_event() {
        let mut a = Automation::new(0.0);
        a.set_value_at(0.0, 1.0).linear_ramp_to(1.0, 4.0);
        assert_eq!(a.value_at(0.5), 0.0);
        assert_relative_eq!(a.value_at(2.5), 0.5, epsilon = 1e-6);
        assert_eq!(a.value_at(4.0), 1.0);
        assert_eq!(a.value_at(9.0), 1.0);
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut a = Automation::new(800.0);
        a.set_value_at(800.0, 0.0).exponential_ramp_to(100.0, 0.15);
        let mid = a.value_at(0.075);
        assert_relative_eq!(mid, (800.0f32 * 100.0).sqrt(), max_relative = 1e-4);
        assert_relative_eq!(a.value_at(0.15), 100.0);
    }

    #[test]
    fn exponential_ramp_to_zero_is_clamped() {
        let mut a = Automation::new(1.0);
        a.set_value_at(1.0, 0.0).exponential_ramp_to(0.0, 1.0);
        let end = a.value_at(1.0);
        assert!(end > 0.0 && end <= EXP_FLOOR);
    }

    #[test]
    fn target_curve_approaches_goal() {
        let mut a = Automation::new(0.4);
        a.set_target_at(0.0, 1.0, 0.1);
        assert_eq!(a.value_at(0.5), 0.4);
        assert_relative_eq!(a.value_at(1.1), 0.4 * (-1.0f32).exp(), max_relative = 1e-4);
        assert!(a.value_at(2.0) < 1e-4);
    }

    #[test]
    fn hold_at_reanchors_a_ramp_in_flight() {
        let mut a = Automation::new(0.0);
        a.set_value_at(0.0, 0.0).linear_ramp_to(1.0, 2.0);
        let held = a.hold_at(1.0);
        assert_relative_eq!(held, 0.5, epsilon = 1e-6);
        a.linear_ramp_to(0.0, 1.5);
        // continuous at the anchor, no step back to 0 or on to 1
        assert_relative_eq!(a.value_at(1.0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(a.value_at(1.25), 0.25, epsilon = 1e-6);
        assert_eq!(a.value_at(3.0), 0.0);
    }

    #[test]
    fn hold_at_freezes_a_target_curve() {
        let mut a = Automation::new(0.4);
        a.set_target_at(0.0, 0.0, 0.1);
        let held = a.hold_at(0.05);
        a.set_target_at(0.4, 0.05, 0.1);
        assert_relative_eq!(a.value_at(0.05), held, epsilon = 1e-6);
        assert!(a.value_at(1.5) > 0.399);
    }

    #[test]
    fn cancel_drops_future_events_only() {
        let mut a = Automation::new(0.0);
        a.set_value_at(0.2, 1.0).set_value_at(0.8, 3.0);
        a.cancel_scheduled_values(2.0);
        assert_eq!(a.events().len(), 1);
        assert_eq!(a.value_at(5.0), 0.2);
    }

    #[test]
    fn settle_folds_finished_events() {
        let mut a = Automation::new(0.0);
        a.set_value_at(0.0, 0.0).linear_ramp_to(0.15, 3.0);
        a.settle(1.0);
        assert_eq!(a.events().len(), 2);
        a.settle(3.5);
        assert!(a.events().is_empty());
        assert_relative_eq!(a.intrinsic(), 0.15);
    }

    #[test]
    fn settle_waits_for_target_convergence() {
        let mut a = Automation::new(0.4);
        a.set_target_at(0.0, 0.0, 0.1);
        a.settle(0.5);
        assert_eq!(a.events().len(), 1);
        a.settle(1.1);
        assert!(a.events().is_empty());
        assert_eq!(a.intrinsic(), 0.0);
    }
}
