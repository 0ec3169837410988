//! Playback engine: transport state and the lookahead scheduler.

pub mod scheduler;

pub use scheduler::{Sequencer, DEFAULT_VELOCITY, SCHEDULE_AHEAD_SECS, TIMER_INTERVAL_MS};
