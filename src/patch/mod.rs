//! Declarative patch graphs.
//!
//! A `Patch` describes one voice's signal path as data: a flat list of node
//! specs keyed by string id plus a list of connections resolved by id lookup.
//! Keeping the graph declarative (an arena of ids rather than direct
//! references) is what makes patches serializable and hot-swappable: the
//! synthesizer replaces its patch wholesale and every voice built afterwards
//! picks up the new graph, while voices already sounding keep the snapshot
//! they were built from.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of node types a patch may instantiate.
///
/// `Adsr` specs become envelope automation drivers rather than provider
/// nodes; everything else maps 1:1 onto a provider capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Oscillator,
    Noise,
    Constant,
    BiquadFilter,
    CombFilter,
    Gain,
    #[serde(rename = "ADSR")]
    Adsr,
    Destination,
}

impl NodeKind {
    /// Source nodes are the ones that need `start`/`stop` scheduling.
    pub fn is_source(self) -> bool {
        matches!(
            self,
            NodeKind::Oscillator | NodeKind::Noise | NodeKind::Constant
        )
    }
}

/// A parameter value in a node spec: numeric for automatable params,
/// text for discrete switches (oscillator waveform, filter response).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Number(_) => None,
            ParamValue::Text(s) => Some(s),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_owned())
    }
}

/// One node in a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique within the patch.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, ParamValue>,
    /// Oscillators with `freq_track` take the triggered note's frequency
    /// instead of their literal `frequency` param.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub freq_track: bool,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            params: HashMap::new(),
            freq_track: false,
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn freq_track(mut self, track: bool) -> Self {
        self.freq_track = track;
        self
    }
}

/// A directed edge: `from` is always a node (or envelope) id, `to` is a raw
/// target path parsed on demand by [`ConnectionTarget::parse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn target(&self) -> ConnectionTarget<'_> {
        ConnectionTarget::parse(&self.to)
    }
}

/// Parsed form of a connection's `to` path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTarget<'a> {
    /// The sentinel `"out"`: the synthesizer's shared output bus.
    Out,
    /// `"nodeId"`: the target node's main audio input.
    Node(&'a str),
    /// `"nodeId.paramName"`: a named automatable parameter.
    Param(&'a str, &'a str),
}

impl<'a> ConnectionTarget<'a> {
    pub fn parse(path: &'a str) -> Self {
        if path == "out" {
            return ConnectionTarget::Out;
        }
        match path.split_once('.') {
            Some((node, param)) => ConnectionTarget::Param(node, param),
            None => ConnectionTarget::Node(path),
        }
    }
}

/// Structural problems in a patch.
///
/// These are import-time diagnostics only. Voice building never fails on
/// them: an unresolvable connection is logged and skipped so a malformed
/// patch degrades instead of halting playback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("duplicate node id '{0}'")]
    DuplicateId(String),
    #[error("connection source '{0}' is not a node in this patch")]
    UnknownSource(String),
    #[error("connection target '{0}' is not a node in this patch")]
    UnknownTarget(String),
}

/// A complete voice description: nodes plus connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub nodes: Vec<NodeSpec>,
    pub connections: Vec<Connection>,
}

impl Patch {
    pub fn new(nodes: Vec<NodeSpec>, connections: Vec<Connection>) -> Self {
        Self { nodes, connections }
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check ids are unique and every connection endpoint resolves.
    ///
    /// Returns all problems found rather than stopping at the first, so an
    /// importer can report them in one pass.
    pub fn validate(&self) -> Result<(), Vec<PatchError>> {
        let mut errors = Vec::new();
        let mut ids = HashSet::new();

        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                errors.push(PatchError::DuplicateId(node.id.clone()));
            }
        }

        for conn in &self.connections {
            if !ids.contains(conn.from.as_str()) {
                errors.push(PatchError::UnknownSource(conn.from.clone()));
            }
            match conn.target() {
                ConnectionTarget::Out => {}
                ConnectionTarget::Node(id) | ConnectionTarget::Param(id, _) => {
                    if !ids.contains(id) {
                        errors.push(PatchError::UnknownTarget(conn.to.clone()));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Serialize to the JSON wire format.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from the JSON wire format.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Order-independent equivalence: same node set, same connection set.
    pub fn is_equivalent(&self, other: &Patch) -> bool {
        if self.nodes.len() != other.nodes.len()
            || self.connections.len() != other.connections.len()
        {
            return false;
        }
        self.nodes.iter().all(|n| other.nodes.iter().any(|m| m == n))
            && self.connections.iter().all(|c| other.connections.contains(c))
    }

    /// The stock two-oscillator subtractive voice.
    pub fn default_voice() -> Self {
        Patch::new(
            vec![
                NodeSpec::new("vco1", NodeKind::Oscillator)
                    .param("type", "sawtooth")
                    .freq_track(true),
                NodeSpec::new("vco2", NodeKind::Oscillator)
                    .param("type", "square")
                    .param("detune", 8.0)
                    .freq_track(true),
                NodeSpec::new("vcf", NodeKind::BiquadFilter)
                    .param("type", "lowpass")
                    .param("frequency", 2_400.0)
                    .param("q", 1.0),
                NodeSpec::new("vca", NodeKind::Gain).param("gain", 0.0),
                NodeSpec::new("env", NodeKind::Adsr)
                    .param("attack", 0.01)
                    .param("decay", 0.2)
                    .param("sustain", 0.6)
                    .param("release", 0.3),
            ],
            vec![
                Connection::new("vco1", "vcf"),
                Connection::new("vco2", "vcf"),
                Connection::new("vcf", "vca"),
                Connection::new("vca", "out"),
                Connection::new("env", "vca.gain"),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_paths_parse() {
        assert_eq!(ConnectionTarget::parse("out"), ConnectionTarget::Out);
        assert_eq!(ConnectionTarget::parse("vcf"), ConnectionTarget::Node("vcf"));
        assert_eq!(
            ConnectionTarget::parse("vca.gain"),
            ConnectionTarget::Param("vca", "gain")
        );
    }

    #[test]
    fn default_voice_validates() {
        assert!(Patch::default_voice().validate().is_ok());
    }

    #[test]
    fn validate_reports_all_problems() {
        let patch = Patch::new(
            vec![
                NodeSpec::new("osc", NodeKind::Oscillator),
                NodeSpec::new("osc", NodeKind::Gain),
            ],
            vec![
                Connection::new("osc", "missing.gain"),
                Connection::new("ghost", "out"),
            ],
        );

        let errors = patch.validate().unwrap_err();
        assert!(errors.contains(&PatchError::DuplicateId("osc".into())));
        assert!(errors.contains(&PatchError::UnknownSource("ghost".into())));
        assert!(errors.contains(&PatchError::UnknownTarget("missing.gain".into())));
    }

    #[test]
    fn json_round_trip_is_equivalent() {
        let patch = Patch::default_voice();
        let json = patch.to_json().unwrap();
        let restored = Patch::from_json(&json).unwrap();
        assert!(patch.is_equivalent(&restored));
    }

    #[test]
    fn equivalence_ignores_order() {
        let a = Patch::default_voice();
        let mut b = a.clone();
        b.nodes.reverse();
        b.connections.reverse();
        assert!(a.is_equivalent(&b));
    }

    #[test]
    fn wire_format_field_names() {
        let patch = Patch::new(
            vec![NodeSpec::new("env", NodeKind::Adsr).param("attack", 0.01)],
            vec![Connection::new("env", "vca.gain")],
        );
        let json = patch.to_json().unwrap();
        assert!(json.contains("\"type\": \"ADSR\""));
        assert!(json.contains("\"from\": \"env\""));
        // freq_track defaults are omitted from the wire form
        assert!(!json.contains("freq_track"));
    }

    #[test]
    fn freq_track_survives_round_trip() {
        let patch = Patch::new(
            vec![NodeSpec::new("vco", NodeKind::Oscillator).freq_track(true)],
            vec![Connection::new("vco", "out")],
        );
        let restored = Patch::from_json(&patch.to_json().unwrap()).unwrap();
        assert!(restored.node("vco").unwrap().freq_track);
    }
}
