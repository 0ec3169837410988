//! The audio node provider seam.
//!
//! This crate never renders samples. It schedules work against a host audio
//! engine (in a browser, the Web Audio context) through the traits below,
//! relying on the provider's own sample-accurate clock to execute automation
//! that was scheduled slightly ahead of real time. The two-tier design is
//! what keeps playback glitch-free on a coarse host timer: our polling loop
//! only has to stay ~100 ms ahead, the provider does the precise part.
//!
//! Everything here is single-threaded by design (one logical thread runs the
//! UI, the scheduler, and all provider calls), so handles are `Rc` and no
//! call blocks: they are all "schedule for later" operations.

use std::rc::Rc;

pub mod fake;

/// Opaque identity the provider assigns to each node it creates.
///
/// Connections are recorded and diagnosed in terms of these ids; the core
/// never inspects a node beyond its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// Identity of an automatable parameter endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamRef {
    pub node: NodeId,
    pub name: String,
}

impl std::fmt::Display for ParamRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.node.0, self.name)
    }
}

pub type NodeHandle = Rc<dyn AudioNode>;
pub type ParamHandle = Rc<dyn AudioParam>;

/// An `AudioParam`-shaped automation target.
///
/// Ramps are scheduled, not applied: the provider interpolates them on its
/// own clock. Exponential ramps cannot target exactly zero; callers clamp to
/// [`crate::EPSILON_FLOOR`] first.
pub trait AudioParam {
    fn param_ref(&self) -> ParamRef;

    fn value(&self) -> f64;
    fn set_value(&self, value: f64);

    fn set_value_at_time(&self, value: f64, time: f64);
    fn linear_ramp_to_value_at_time(&self, value: f64, time: f64);
    fn exponential_ramp_to_value_at_time(&self, value: f64, time: f64);
    fn cancel_scheduled_values(&self, time: f64);
}

/// A provider audio node.
///
/// `start`/`stop` are meaningful only on source nodes (oscillator, noise,
/// constant); the default implementations are no-ops so non-sources can be
/// driven uniformly.
pub trait AudioNode {
    fn id(&self) -> NodeId;

    /// Connect this node's output to another node's main audio input.
    fn connect(&self, target: &dyn AudioNode);
    /// Connect this node's output into an automatable parameter.
    fn connect_param(&self, target: &dyn AudioParam);
    /// Remove every outgoing connection.
    fn disconnect(&self);

    /// Look up a named automatable parameter, if this node has one.
    fn param(&self, name: &str) -> Option<ParamHandle>;
    /// Set a discrete text attribute (oscillator waveform, filter response).
    fn set_attribute(&self, name: &str, value: &str);

    fn start(&self, _time: f64) {}
    fn stop(&self, _time: f64) {}
}

/// The host audio engine capability set.
///
/// Mirrors the Web Audio constructors one to one. `now` is the provider's
/// monotonic clock in seconds; all scheduling times are expressed on it.
pub trait AudioProvider {
    fn now(&self) -> f64;

    fn create_oscillator(&self) -> NodeHandle;
    fn create_noise(&self) -> NodeHandle;
    fn create_constant(&self) -> NodeHandle;
    fn create_biquad_filter(&self) -> NodeHandle;
    fn create_comb_filter(&self) -> NodeHandle;
    fn create_gain(&self) -> NodeHandle;
    fn create_delay(&self, max_delay_secs: f64) -> NodeHandle;
    fn create_convolver(&self) -> NodeHandle;
    fn create_compressor(&self) -> NodeHandle;
    fn create_analyser(&self) -> NodeHandle;

    /// The terminal mix bus (the context destination).
    fn destination(&self) -> NodeHandle;
}
