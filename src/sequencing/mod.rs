//! Musical content: blocks, rhythm patterns, and tracks.

pub mod block;
pub mod pattern;
pub mod track;

pub use block::{Block, BlockContent, BlockSummary, EditError};
pub use pattern::RhythmPattern;
pub use track::{Arpeggiator, Track, TrackInstrument, TrackKind};
