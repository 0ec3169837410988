//! Shared rhythm patterns.
//!
//! A pattern is a grid of per-instrument hits at 1/16 resolution, looped
//! independently of the block that references it and shared by id across
//! blocks and tracks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named rhythm grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmPattern {
    pub id: String,
    pub name: String,
    /// Grid length in pattern steps (1/16 notes).
    #[serde(rename = "steps")]
    pub step_count: usize,
    /// instrument name → pattern step → velocity
    pub events: HashMap<String, HashMap<usize, f64>>,
}

impl RhythmPattern {
    pub fn new(id: impl Into<String>, name: impl Into<String>, step_count: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step_count,
            events: HashMap::new(),
        }
    }

    /// Set (or overwrite) a hit.
    pub fn set_event(&mut self, instrument: impl Into<String>, step: usize, velocity: f64) {
        self.events
            .entry(instrument.into())
            .or_default()
            .insert(step, velocity);
    }

    /// Remove a hit, dropping the instrument row once empty.
    pub fn clear_event(&mut self, instrument: &str, step: usize) {
        if let Some(row) = self.events.get_mut(instrument) {
            row.remove(&step);
            if row.is_empty() {
                self.events.remove(instrument);
            }
        }
    }

    pub fn velocity_at(&self, instrument: &str, step: usize) -> Option<f64> {
        self.events.get(instrument)?.get(&step).copied()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// A stock 16-step rock beat, handy as a starting point.
    pub fn basic_rock() -> Self {
        let mut pattern = Self::new("basic-rock", "Basic Rock", 16);
        for step in [0, 8] {
            pattern.set_event("Kick", step, 1.0);
        }
        for step in [4, 12] {
            pattern.set_event("Snare", step, 0.9);
        }
        for step in (0..16).step_by(2) {
            pattern.set_event("HiHat", step, 0.6);
        }
        pattern
    }
}
