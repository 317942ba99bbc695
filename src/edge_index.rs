//! Reverse lookup from `(side, color)` to candidate `(piece, rotation)`
//! pairs, built once per puzzle and never mutated afterward.

use std::collections::HashMap;

use crate::piece::{Color, Piece, Side};

/// A `(piece index into the owning slice, rotation)` candidate.  Stored as
/// an index rather than a `Piece` copy so that the index is cheap to
/// intersect and cheap to carry around in domain sets.
pub type Candidate = (u32, u8);

/// For every `(side, color)` pair seen in the puzzle, the list of
/// `(piece_id, rotation)` pairs whose rotated edge on that side equals that
/// color.
///
/// Built once at puzzle load time via [`EdgeIndex::build`] and shared
/// read-only by every worker thread afterward (§3 Ownership).
pub struct EdgeIndex {
    // Indexed by `side as usize`, then keyed by color.
    by_side: [HashMap<Color, Vec<Candidate>>; 4],
}

impl EdgeIndex {
    /// Build the index from the puzzle's full piece set.  Each piece
    /// contributes one entry per unique rotation (see
    /// [`Piece::unique_rotation_count`]) per side.
    pub fn build(pieces: &[Piece]) -> EdgeIndex {
        let mut by_side: [HashMap<Color, Vec<Candidate>>; 4] =
            [HashMap::new(), HashMap::new(), HashMap::new(), HashMap::new()];

        for piece in pieces {
            for rotation in 0..piece.unique_rotation_count() {
                let edges = piece.rotated_edges(rotation);
                for &side in &Side::ALL {
                    by_side[side as usize]
                        .entry(edges[side as usize])
                        .or_default()
                        .push((piece.id, rotation));
                }
            }
        }

        EdgeIndex { by_side }
    }

    /// Candidates whose rotated edge on `side` equals `color`.  Empty slice
    /// if none exist.
    pub fn candidates(&self, side: Side, color: Color) -> &[Candidate] {
        self.by_side[side as usize]
            .get(&color)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::BORDER;

    #[test]
    fn finds_rotation_that_faces_the_requested_color() {
        let pieces = vec![Piece::new(1, 1, 2, 3, 4)];
        let index = EdgeIndex::build(&pieces);

        // Rotation 1 maps [1,2,3,4] -> [4,1,2,3], so north = 4.
        let north_matches = index.candidates(Side::North, 4);
        assert!(north_matches.contains(&(1, 1)));
    }

    #[test]
    fn symmetric_piece_only_indexes_unique_rotations() {
        let pieces = vec![Piece::new(1, BORDER, BORDER, BORDER, BORDER)];
        let index = EdgeIndex::build(&pieces);
        assert_eq!(index.candidates(Side::North, BORDER).len(), 1);
    }
}
