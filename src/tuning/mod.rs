//! 5-limit-and-beyond just-intonation lattice tuning.
//!
//! Pitches are not MIDI note numbers but coordinates on a harmonic lattice:
//! five signed integers giving the exponents of the octave (2/1) and four
//! just-intonation generators. `frequency` folds a coordinate down to Hz
//! against a root frequency.

use serde::{Deserialize, Serialize};

/// Generator ratio for each lattice dimension, octave first.
///
/// An earlier revision shipped `7/8` for the fourth dimension, which turned
/// the harmonic-seventh axis upside down. `7/4` is the canonical value.
const GENERATORS: [f64; 5] = [2.0, 3.0 / 2.0, 5.0 / 4.0, 7.0 / 4.0, 11.0 / 4.0];

/// A point on the harmonic lattice.
///
/// `a` is the octave exponent; `b` through `e` are the exponents of the
/// 3/2, 5/4, 7/4 and 11/4 generators. Coordinates are plain value types:
/// edits go through the explicit shift constructors rather than field
/// mutation so a block can validate a whole move before committing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LatticeCoord {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
    pub e: i32,
}

/// Which of the upper lattice dimensions is the active editing axis.
///
/// The melodic editor is two-dimensional: `b` is always the X axis, and the
/// Y axis is one of the remaining generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatticeAxis {
    /// 5/4 generator (`c`), the 5-limit default.
    Third,
    /// 7/4 generator (`d`).
    Seventh,
    /// 11/4 generator (`e`).
    Eleventh,
}

impl LatticeCoord {
    pub const ORIGIN: LatticeCoord = LatticeCoord {
        a: 0,
        b: 0,
        c: 0,
        d: 0,
        e: 0,
    };

    /// Coordinate at octave zero with `b` on the X axis and `y` on the
    /// given editing axis. The remaining dimensions are zero.
    pub fn on_axis(b: i32, y: i32, axis: LatticeAxis) -> Self {
        let mut coord = LatticeCoord { b, ..Self::ORIGIN };
        match axis {
            LatticeAxis::Third => coord.c = y,
            LatticeAxis::Seventh => coord.d = y,
            LatticeAxis::Eleventh => coord.e = y,
        }
        coord
    }

    /// Value of the active editing axis.
    pub fn axis_value(&self, axis: LatticeAxis) -> i32 {
        match axis {
            LatticeAxis::Third => self.c,
            LatticeAxis::Seventh => self.d,
            LatticeAxis::Eleventh => self.e,
        }
    }

    /// Copy with the active axis shifted by `delta`.
    pub fn shifted_on_axis(&self, axis: LatticeAxis, delta: i32) -> Self {
        let mut coord = *self;
        match axis {
            LatticeAxis::Third => coord.c += delta,
            LatticeAxis::Seventh => coord.d += delta,
            LatticeAxis::Eleventh => coord.e += delta,
        }
        coord
    }

    /// Copy shifted by `delta` octaves.
    pub fn shifted_octave(&self, delta: i32) -> Self {
        LatticeCoord {
            a: self.a + delta,
            ..*self
        }
    }

    /// Copy shifted along X (`b`) by `db` and the active axis by `dy`.
    pub fn shifted(&self, db: i32, dy: i32, axis: LatticeAxis) -> Self {
        let mut coord = self.shifted_on_axis(axis, dy);
        coord.b += db;
        coord
    }

    /// True when two coordinates occupy the same editor cell: same `b` and
    /// same value on the active axis, octave ignored.
    pub fn same_cell(&self, b: i32, y: i32, axis: LatticeAxis) -> bool {
        self.b == b && self.axis_value(axis) == y
    }
}

/// Map a lattice coordinate to a frequency in Hz.
///
/// ```
/// use lattice_seq::tuning::{frequency, LatticeCoord};
///
/// let root = 261.63;
/// assert_eq!(frequency(root, LatticeCoord::ORIGIN), root);
/// ```
///
/// Pure and total: every integer coordinate is valid. Exponents within
/// [-8, 8] stay comfortably inside f64 range.
pub fn frequency(root_hz: f64, coord: LatticeCoord) -> f64 {
    let exponents = [coord.a, coord.b, coord.c, coord.d, coord.e];
    exponents
        .iter()
        .zip(GENERATORS.iter())
        .fold(root_hz, |f, (&exp, &base)| f * base.powi(exp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ROOT: f64 = 261.63;

    #[test]
    fn origin_returns_root_exactly() {
        assert_eq!(frequency(ROOT, LatticeCoord::ORIGIN), ROOT);
    }

    #[test]
    fn octave_shift_doubles_frequency() {
        for a in -8..8 {
            let low = LatticeCoord {
                a,
                b: 2,
                c: -1,
                d: 1,
                e: 0,
            };
            let high = low.shifted_octave(1);
            assert_relative_eq!(
                frequency(ROOT, high),
                2.0 * frequency(ROOT, low),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn generators_match_design_ratios() {
        let fifth = LatticeCoord {
            b: 1,
            ..LatticeCoord::ORIGIN
        };
        assert_relative_eq!(frequency(ROOT, fifth), ROOT * 1.5);

        let seventh = LatticeCoord {
            d: 1,
            ..LatticeCoord::ORIGIN
        };
        // 7/4, not the historical 7/8
        assert_relative_eq!(frequency(ROOT, seventh), ROOT * 1.75);
    }

    #[test]
    fn stable_and_positive_across_full_range() {
        for a in [-8, 0, 8] {
            for b in [-8, 0, 8] {
                for d in [-8, 0, 8] {
                    for e in [-8, 0, 8] {
                        let coord = LatticeCoord { a, b, c: 3, d, e };
                        let f = frequency(ROOT, coord);
                        assert!(f.is_finite() && f > 0.0, "degenerate freq for {coord:?}");
                        // Deterministic: same input, same output
                        assert_eq!(f, frequency(ROOT, coord));
                    }
                }
            }
        }
    }

    #[test]
    fn cell_matching_ignores_octave() {
        let note = LatticeCoord {
            a: 2,
            b: 1,
            c: -1,
            d: 0,
            e: 0,
        };
        assert!(note.same_cell(1, -1, LatticeAxis::Third));
        assert!(!note.same_cell(1, -1, LatticeAxis::Seventh));
    }
}
