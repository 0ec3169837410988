pub mod engine; // Transport and lookahead scheduling
pub mod patch; // Declarative synth patch graphs
pub mod provider; // Audio backend abstraction
pub mod sequencing; // Tracks, blocks, rhythm patterns
pub mod synth; // Voices, envelopes, drum machine
pub mod tuning; // 5-limit lattice pitch model

/// Floor for exponential ramps; an exponential ramp to zero is undefined.
pub const EPSILON_FLOOR: f64 = 1e-3;
/// Extra seconds a source keeps running after its release ends.
pub(crate) const STOP_SAFETY_MARGIN: f64 = 0.1;
