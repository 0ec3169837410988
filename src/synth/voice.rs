//! One live instantiation of a patch.
//!
//! A voice is built from a snapshot of its synthesizer's patch at trigger
//! time, owns the provider nodes it instantiated, and is destroyed after its
//! release tail; nodes are never reused across notes.
//!
//! Building and starting are deliberately separate steps: `build` only
//! creates and wires nodes, `trigger` is what calls `start` on the sources.
//! A failure while wiring therefore can never leave a half-built graph
//! making sound.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::patch::{ConnectionTarget, NodeKind, Patch};
use crate::provider::{AudioProvider, NodeHandle};
use crate::synth::envelope::AdsrEnvelope;
use crate::STOP_SAFETY_MARGIN;

/// Lifecycle of a voice.
///
/// `Built → Sounding → Releasing → Disposed`, with `stop_now` short-cutting
/// to `Disposed` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Built,
    Sounding,
    Releasing,
    Disposed,
}

pub struct Voice {
    /// Provider nodes this voice created, keyed by patch id.
    nodes: HashMap<String, NodeHandle>,
    /// Ids of the nodes that need start/stop scheduling.
    source_ids: Vec<String>,
    envelopes: Vec<AdsrEnvelope>,
    state: VoiceState,
    /// When the last scheduled stop lands; the owner reaps past this.
    stop_time: Option<f64>,
}

impl Voice {
    /// Instantiate the patch's node graph, resolving `frequency` for
    /// freq-tracking nodes and wiring `"out"` connections to `output`.
    ///
    /// Unresolvable connection endpoints are logged and skipped: a malformed
    /// patch degrades to a partially connected voice, never a build failure.
    /// No source node is started here.
    pub fn build(
        provider: &dyn AudioProvider,
        patch: &Patch,
        frequency: f64,
        output: &NodeHandle,
    ) -> Self {
        let mut nodes: HashMap<String, NodeHandle> = HashMap::new();
        let mut source_ids = Vec::new();
        let mut envelopes: HashMap<String, AdsrEnvelope> = HashMap::new();

        for spec in &patch.nodes {
            let node = match spec.kind {
                NodeKind::Adsr => {
                    envelopes.insert(spec.id.clone(), AdsrEnvelope::from_spec(spec));
                    continue;
                }
                // The patch's output sink is the synthesizer's shared bus;
                // nothing to create, connections just resolve to it.
                NodeKind::Destination => continue,
                NodeKind::Oscillator => provider.create_oscillator(),
                NodeKind::Noise => provider.create_noise(),
                NodeKind::Constant => provider.create_constant(),
                NodeKind::BiquadFilter => provider.create_biquad_filter(),
                NodeKind::CombFilter => provider.create_comb_filter(),
                NodeKind::Gain => provider.create_gain(),
            };

            for (name, value) in &spec.params {
                if let Some(text) = value.as_text() {
                    node.set_attribute(name, text);
                    continue;
                }
                if spec.freq_track && name == "frequency" {
                    continue; // literal frequency loses to note tracking
                }
                let Some(number) = value.as_number() else { continue };
                match node.param(name) {
                    Some(param) => param.set_value(number),
                    None => debug!(node = %spec.id, param = %name, "no such param, ignoring"),
                }
            }

            if spec.freq_track {
                if let Some(param) = node.param("frequency") {
                    param.set_value(frequency);
                }
            }

            if spec.kind.is_source() {
                source_ids.push(spec.id.clone());
            }
            nodes.insert(spec.id.clone(), node);
        }

        for conn in &patch.connections {
            if let Some(env) = envelopes.get_mut(conn.from.as_str()) {
                // Envelopes are automation drivers: their only legal target
                // is a named parameter.
                match conn.target() {
                    ConnectionTarget::Param(id, name) => {
                        match Self::resolve_param(&nodes, id, name) {
                            Some(param) => env.connect(param),
                            None => {
                                warn!(from = %conn.from, to = %conn.to, "skipping connection: target not found")
                            }
                        }
                    }
                    _ => {
                        warn!(from = %conn.from, to = %conn.to, "skipping connection: envelope must target a parameter")
                    }
                }
                continue;
            }

            let Some(source) = nodes.get(conn.from.as_str()) else {
                warn!(from = %conn.from, to = %conn.to, "skipping connection: source not found");
                continue;
            };

            match conn.target() {
                ConnectionTarget::Out => source.connect(output.as_ref()),
                ConnectionTarget::Node(id) => match Self::resolve_node(patch, &nodes, output, id) {
                    Some(target) => source.connect(target.as_ref()),
                    None => {
                        warn!(from = %conn.from, to = %conn.to, "skipping connection: target not found")
                    }
                },
                ConnectionTarget::Param(id, name) => {
                    match Self::resolve_param(&nodes, id, name) {
                        Some(param) => source.connect_param(param.as_ref()),
                        None => {
                            warn!(from = %conn.from, to = %conn.to, "skipping connection: target not found")
                        }
                    }
                }
            }
        }

        Self {
            nodes,
            source_ids,
            envelopes: envelopes.into_values().collect(),
            state: VoiceState::Built,
            stop_time: None,
        }
    }

    fn resolve_node(
        patch: &Patch,
        nodes: &HashMap<String, NodeHandle>,
        output: &NodeHandle,
        id: &str,
    ) -> Option<NodeHandle> {
        if let Some(node) = nodes.get(id) {
            return Some(node.clone());
        }
        // A `Destination` spec stands for the shared output bus
        match patch.node(id).map(|s| s.kind) {
            Some(NodeKind::Destination) => Some(output.clone()),
            _ => None,
        }
    }

    fn resolve_param(
        nodes: &HashMap<String, NodeHandle>,
        id: &str,
        name: &str,
    ) -> Option<crate::provider::ParamHandle> {
        nodes.get(id)?.param(name)
    }

    /// Start every source at `time` and kick off the envelopes.
    pub fn trigger(&mut self, time: f64, velocity: f64) {
        if self.state != VoiceState::Built {
            return;
        }
        for id in &self.source_ids {
            self.nodes[id].start(time);
        }
        for env in &self.envelopes {
            env.trigger(time, velocity);
        }
        self.state = VoiceState::Sounding;
    }

    /// Begin the release tail at `time`; sources stop once the longest
    /// release has rung out plus a safety margin.
    pub fn release(&mut self, time: f64) {
        if self.state != VoiceState::Sounding {
            return;
        }
        for env in &self.envelopes {
            env.release_at(time);
        }

        let max_release = self
            .envelopes
            .iter()
            .map(AdsrEnvelope::release_secs)
            .fold(0.0, f64::max);
        let stop_time = time + max_release + STOP_SAFETY_MARGIN;

        for id in &self.source_ids {
            self.nodes[id].stop(stop_time);
        }
        self.stop_time = Some(stop_time);
        self.state = VoiceState::Releasing;
    }

    /// Trigger and pre-schedule the release in one atomic step.
    ///
    /// This is the sequencer path: the whole note, tail included, is handed
    /// to the provider ahead of time.
    pub fn schedule_fixed_duration(&mut self, start: f64, duration: f64, velocity: f64) {
        self.trigger(start, velocity);
        self.release(start + duration);
    }

    /// Stop everything at `now` and disconnect, skipping the release ramp.
    /// Used for panic and same-pitch retrigger.
    pub fn stop_now(&mut self, now: f64) {
        if self.state == VoiceState::Disposed {
            return;
        }
        for id in &self.source_ids {
            self.nodes[id].stop(now);
        }
        self.dispose();
    }

    /// True once the release tail has fully passed `now`.
    pub fn is_finished(&self, now: f64) -> bool {
        match self.state {
            VoiceState::Disposed => true,
            VoiceState::Releasing => self.stop_time.is_some_and(|t| t <= now),
            _ => false,
        }
    }

    /// Disconnect every created node and mark the voice dead.
    pub fn dispose(&mut self) {
        for node in self.nodes.values() {
            node.disconnect();
        }
        self.state = VoiceState::Disposed;
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn envelope_count(&self) -> usize {
        self.envelopes.len()
    }
}
