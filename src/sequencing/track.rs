//! Tracks: blocks plus the instrument that plays them.
//!
//! A melodic track owns a [`Synthesizer`], a rhythmic track owns the fixed
//! [`DrumMachine`]. Mute/solo/volume live here; the scheduler resolves the
//! audible set each step so the flags can change freely during playback.

use std::rc::Rc;

use tracing::debug;

use crate::provider::AudioProvider;
use crate::sequencing::block::Block;
use crate::synth::{DrumMachine, Synthesizer};
use crate::tuning::LatticeCoord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Melodic,
    Rhythmic,
}

pub enum TrackInstrument {
    Melodic(Synthesizer),
    Rhythmic(DrumMachine),
}

/// One note of an expanded arpeggio, in steps relative to its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpNote {
    pub coord: LatticeCoord,
    pub offset_steps: usize,
    pub length_steps: usize,
}

/// Staggers a block's notes instead of sounding them together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arpeggiator {
    /// Steps between successive notes.
    pub division: usize,
    /// How many octaves the note list is cycled through.
    pub octaves: u32,
}

impl Default for Arpeggiator {
    fn default() -> Self {
        Self {
            division: 1,
            octaves: 1,
        }
    }
}

impl Arpeggiator {
    /// Expand `notes` into staggered arpeggio notes for a block of
    /// `block_len` steps.
    ///
    /// Note *i* of the expanded list starts `i · division` steps in and
    /// lasts until the block ends. Offsets are clipped to the block: a note
    /// whose offset reaches the block length is dropped, not wrapped.
    pub fn expand(&self, notes: &[LatticeCoord], block_len: usize) -> Vec<ArpNote> {
        let division = self.division.max(1);
        let mut out = Vec::new();

        let cycled = (0..self.octaves.max(1))
            .flat_map(|oct| notes.iter().map(move |n| n.shifted_octave(oct as i32)));

        for (index, coord) in cycled.enumerate() {
            let offset_steps = index * division;
            if offset_steps >= block_len {
                debug!(index, "arpeggio note past block end, dropped");
                continue;
            }
            out.push(ArpNote {
                coord,
                offset_steps,
                length_steps: block_len - offset_steps,
            });
        }
        out
    }
}

pub struct Track {
    pub name: String,
    pub blocks: Vec<Block>,
    pub mute: bool,
    pub solo: bool,
    pub arpeggiator: Option<Arpeggiator>,
    instrument: TrackInstrument,
}

impl Track {
    /// A melodic track with the stock patch, wired to the provider's
    /// destination.
    pub fn melodic(provider: Rc<dyn AudioProvider>, name: impl Into<String>) -> Self {
        let synth = Synthesizer::new(Rc::clone(&provider));
        synth.connect(provider.destination().as_ref());
        Self::with_instrument(name, TrackInstrument::Melodic(synth))
    }

    /// A rhythmic track backed by the fixed drum machine, wired to the
    /// provider's destination.
    pub fn rhythmic(provider: Rc<dyn AudioProvider>, name: impl Into<String>) -> Self {
        let drums = DrumMachine::new(Rc::clone(&provider));
        drums.connect(provider.destination().as_ref());
        Self::with_instrument(name, TrackInstrument::Rhythmic(drums))
    }

    pub fn with_instrument(name: impl Into<String>, instrument: TrackInstrument) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            mute: false,
            solo: false,
            arpeggiator: None,
            instrument,
        }
    }

    pub fn kind(&self) -> TrackKind {
        match self.instrument {
            TrackInstrument::Melodic(_) => TrackKind::Melodic,
            TrackInstrument::Rhythmic(_) => TrackKind::Rhythmic,
        }
    }

    /// Whether this track sounds this step, given whether any track is
    /// soloed.
    pub fn audible(&self, any_solo: bool) -> bool {
        !self.mute && (!any_solo || self.solo)
    }

    pub fn set_volume(&self, volume: f64) {
        match &self.instrument {
            TrackInstrument::Melodic(synth) => synth.set_volume(volume),
            TrackInstrument::Rhythmic(drums) => drums.set_volume(volume),
        }
    }

    pub fn synth(&self) -> Option<&Synthesizer> {
        match &self.instrument {
            TrackInstrument::Melodic(synth) => Some(synth),
            TrackInstrument::Rhythmic(_) => None,
        }
    }

    pub fn synth_mut(&mut self) -> Option<&mut Synthesizer> {
        match &mut self.instrument {
            TrackInstrument::Melodic(synth) => Some(synth),
            TrackInstrument::Rhythmic(_) => None,
        }
    }

    pub fn drums_mut(&mut self) -> Option<&mut DrumMachine> {
        match &mut self.instrument {
            TrackInstrument::Rhythmic(drums) => Some(drums),
            TrackInstrument::Melodic(_) => None,
        }
    }

    pub(crate) fn instrument_mut(&mut self) -> &mut TrackInstrument {
        &mut self.instrument
    }

    /// Blocks whose span begins exactly at `step`.
    pub fn blocks_starting_at(&self, step: usize) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.start_step == step)
    }

    /// The first block whose span covers `step`.
    pub fn block_covering(&self, step: usize) -> Option<&Block> {
        self.blocks.iter().find(|b| b.covers(step))
    }

    /// Cut everything this track is sounding.
    pub fn all_notes_off(&mut self) {
        match &mut self.instrument {
            TrackInstrument::Melodic(synth) => synth.all_notes_off(),
            TrackInstrument::Rhythmic(drums) => drums.all_notes_off(),
        }
    }
}
