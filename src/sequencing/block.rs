//! Blocks: timed spans of content on a track.
//!
//! A melodic block carries explicit lattice notes; a rhythmic block points
//! at a shared rhythm pattern by id. Edit operations on melodic blocks are
//! all-or-nothing: a shift that would push any note out of the editable
//! range leaves the whole block untouched.

use serde::Serialize;
use thiserror::Error;

use crate::tuning::{LatticeAxis, LatticeCoord};

/// Editable range for the X axis (`b`).
pub const B_RANGE: std::ops::RangeInclusive<i32> = -3..=3;
/// Editable range for the active Y axis.
pub const Y_RANGE: std::ops::RangeInclusive<i32> = -2..=2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("shift would move a note outside the editable lattice range")]
    OutOfBounds,
    #[error("operation applies only to melodic blocks")]
    NotMelodic,
}

/// What a block contains.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    /// Explicit notes (melodic tracks).
    Notes(Vec<LatticeCoord>),
    /// Reference to a shared [`RhythmPattern`](super::RhythmPattern) by id.
    Pattern(String),
}

/// A timed span on a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// First sequencer step (1/32 resolution) this block occupies.
    pub start_step: usize,
    /// Length in sequencer steps.
    pub length: usize,
    pub content: BlockContent,
    /// Display label from the chord library, when the block was drawn
    /// from a chord template.
    pub chord_name: Option<String>,
}

/// UI-facing wire summary of a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSummary {
    pub start: usize,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chord_name: Option<String>,
}

impl Block {
    pub fn melodic(start_step: usize, length: usize) -> Self {
        Self {
            start_step,
            length,
            content: BlockContent::Notes(Vec::new()),
            chord_name: None,
        }
    }

    pub fn with_notes(start_step: usize, length: usize, notes: Vec<LatticeCoord>) -> Self {
        Self {
            start_step,
            length,
            content: BlockContent::Notes(notes),
            chord_name: None,
        }
    }

    pub fn rhythmic(start_step: usize, length: usize, pattern_id: impl Into<String>) -> Self {
        Self {
            start_step,
            length,
            content: BlockContent::Pattern(pattern_id.into()),
            chord_name: None,
        }
    }

    /// True when `step` falls inside this block's span.
    pub fn covers(&self, step: usize) -> bool {
        step >= self.start_step && step < self.start_step + self.length
    }

    pub fn notes(&self) -> Option<&[LatticeCoord]> {
        match &self.content {
            BlockContent::Notes(notes) => Some(notes),
            BlockContent::Pattern(_) => None,
        }
    }

    /// Toggle the editor cell `(b, y)` on the active axis: removes every
    /// note in the cell (octaves included), or inserts a fresh note at
    /// octave zero when the cell is empty.
    pub fn toggle_note(&mut self, b: i32, y: i32, axis: LatticeAxis) -> Result<(), EditError> {
        let BlockContent::Notes(notes) = &mut self.content else {
            return Err(EditError::NotMelodic);
        };

        let before = notes.len();
        notes.retain(|n| !n.same_cell(b, y, axis));
        if notes.len() == before {
            notes.push(LatticeCoord::on_axis(b, y, axis));
        }
        Ok(())
    }

    /// Shift the octave of every note in the cell `(b, y)` by `delta`.
    pub fn shift_octave(
        &mut self,
        b: i32,
        y: i32,
        axis: LatticeAxis,
        delta: i32,
    ) -> Result<(), EditError> {
        let BlockContent::Notes(notes) = &mut self.content else {
            return Err(EditError::NotMelodic);
        };

        for note in notes.iter_mut() {
            if note.same_cell(b, y, axis) {
                *note = note.shifted_octave(delta);
            }
        }
        Ok(())
    }

    /// Shift every note by `(db, dy)`.
    ///
    /// All-or-nothing: every shifted note must land inside [`B_RANGE`] ×
    /// [`Y_RANGE`], otherwise nothing moves and `OutOfBounds` is returned.
    pub fn shift_notes(&mut self, db: i32, dy: i32, axis: LatticeAxis) -> Result<(), EditError> {
        let BlockContent::Notes(notes) = &mut self.content else {
            return Err(EditError::NotMelodic);
        };

        let shifted: Vec<LatticeCoord> = notes.iter().map(|n| n.shifted(db, dy, axis)).collect();
        let in_bounds = shifted
            .iter()
            .all(|n| B_RANGE.contains(&n.b) && Y_RANGE.contains(&n.axis_value(axis)));
        if !in_bounds {
            return Err(EditError::OutOfBounds);
        }

        *notes = shifted;
        Ok(())
    }

    pub fn summary(&self) -> BlockSummary {
        let (notes_count, pattern_id) = match &self.content {
            BlockContent::Notes(notes) => (Some(notes.len()), None),
            BlockContent::Pattern(id) => (None, Some(id.clone())),
        };
        BlockSummary {
            start: self.start_step,
            length: self.length,
            notes_count,
            pattern_id,
            chord_name: self.chord_name.clone(),
        }
    }
}
