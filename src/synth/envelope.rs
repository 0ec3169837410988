//! ADSR envelope as an automation driver.
//!
//! Unlike a rendering envelope, this one never produces samples. It owns a
//! connection to a single automatable parameter and, on trigger/release,
//! schedules the whole curve on the provider's clock using its ramp
//! primitives. Once scheduled, the curve plays out sample-accurately no
//! matter how late the next host timer wake arrives.
//!
//! Curve shape on `trigger(t, velocity)`:
//!
//! ```text
//!   velocity ┐    ╱╲
//!            │   ╱  ╲______________      linear attack ramp,
//!   sustain· │  ╱                  ╲     exponential decay and
//!   velocity │ ╱                    ╲    release ramps
//!      floor └╱──────────────────────╲──→ t
//!             A    D    (sustain)  R
//! ```
//!
//! The provider rejects exponential ramps targeting exactly zero, so every
//! scheduled value is clamped to [`crate::EPSILON_FLOOR`]. Release re-anchors
//! at the parameter's current value first; releasing mid-attack ramps down
//! from wherever the curve actually is instead of jumping to sustain.

use crate::patch::NodeSpec;
use crate::provider::ParamHandle;
use crate::EPSILON_FLOOR;

/// Schedules ADSR curves onto one connected parameter.
#[derive(Clone)]
pub struct AdsrEnvelope {
    attack: f64,
    decay: f64,
    sustain: f64,
    release: f64,
    target: Option<ParamHandle>,
}

impl AdsrEnvelope {
    pub fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.0),
            target: None,
        }
    }

    /// Build from an `ADSR` node spec, falling back to the stock defaults
    /// for missing params.
    pub fn from_spec(spec: &NodeSpec) -> Self {
        let get = |name: &str, default: f64| {
            spec.params
                .get(name)
                .and_then(|v| v.as_number())
                .unwrap_or(default)
        };
        Self::new(
            get("attack", 0.1),
            get("decay", 0.1),
            get("sustain", 0.5),
            get("release", 0.5),
        )
    }

    /// Attach the envelope to the parameter it will automate.
    pub fn connect(&mut self, param: ParamHandle) {
        self.target = Some(param);
    }

    pub fn is_connected(&self) -> bool {
        self.target.is_some()
    }

    pub fn release_secs(&self) -> f64 {
        self.release
    }

    /// Schedule attack and decay starting at `time`, peaking at `velocity`.
    pub fn trigger(&self, time: f64, velocity: f64) {
        let Some(param) = &self.target else { return };

        let peak = velocity.max(EPSILON_FLOOR);
        let sustain_level = (self.sustain * peak).max(EPSILON_FLOOR);

        param.cancel_scheduled_values(time);
        param.set_value_at_time(EPSILON_FLOOR, time);
        param.linear_ramp_to_value_at_time(peak, time + self.attack);
        param.exponential_ramp_to_value_at_time(sustain_level, time + self.attack + self.decay);
    }

    /// Schedule the release ramp starting at `time`.
    pub fn release_at(&self, time: f64) {
        let Some(param) = &self.target else { return };

        // Re-anchor at the current value so the ramp starts from wherever
        // the curve actually is. The anchor itself must stay off zero.
        let current = param.value().max(EPSILON_FLOOR);

        param.cancel_scheduled_values(time);
        param.set_value_at_time(current, time);
        param.exponential_ramp_to_value_at_time(EPSILON_FLOOR, time + self.release);
    }
}
