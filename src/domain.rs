//! Per-cell candidate sets, maintained under the current partial
//! assignment via neighbor-local forward checking (§4.3).

use std::collections::HashMap;

use crate::board::{opposite_side, Board};
use crate::edge_index::{Candidate, EdgeIndex};
use crate::piece::{Piece, Side, BORDER};

/// Outcome of a propagation step.  Infeasibility is a normal search
/// outcome, never an error (§7) — the kernel reads this and backtracks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropagationResult {
    Ok,
    /// Some empty cell's domain became empty; the caller must backtrack.
    DeadEnd,
}

/// The exact set of per-cell domain contents overwritten by a single
/// [`DomainManager::propagate_after_place`] call, in the order they were
/// first touched.
///
/// This is the "flat arena, undo is a truncation" design (§9): rather than
/// diffing domains, we simply remember what every touched cell looked like
/// immediately before the placement, and restore it verbatim on undo.
#[derive(Clone, Debug, Default)]
pub struct DomainSnapshot {
    touched: Vec<(usize, Vec<Candidate>)>,
}

/// Maintains, for every currently-empty cell, the set of `(piece_id,
/// rotation)` pairs still locally feasible there.
pub struct DomainManager {
    rows: usize,
    cols: usize,
    domains: Vec<Vec<Candidate>>,
    pieces_by_id: HashMap<u32, Piece>,
}

impl DomainManager {
    pub fn new(rows: usize, cols: usize, pieces: &[Piece]) -> DomainManager {
        DomainManager {
            rows,
            cols,
            domains: vec![Vec::new(); rows * cols],
            pieces_by_id: pieces.iter().map(|p| (p.id, *p)).collect(),
        }
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn domain(&self, row: usize, col: usize) -> &[Candidate] {
        &self.domains[self.index(row, col)]
    }

    pub fn piece(&self, id: u32) -> Piece {
        self.pieces_by_id[&id]
    }

    /// Compute every empty cell's domain from scratch against the current
    /// board (used at startup, and to rebuild after a replay — §4.5).
    pub fn initialize(&mut self, board: &Board, edge_index: &EdgeIndex, unused: &[u32]) {
        let unused: std::collections::HashSet<u32> = unused.iter().copied().collect();

        for row in 0..self.rows {
            for col in 0..self.cols {
                let idx = self.index(row, col);
                if !board.is_empty_cell(row, col) {
                    self.domains[idx] = Vec::new();
                    continue;
                }
                self.domains[idx] = self.feasible_candidates(board, edge_index, row, col, &unused);
            }
        }
    }

    fn feasible_candidates(
        &self,
        board: &Board,
        edge_index: &EdgeIndex,
        row: usize,
        col: usize,
        unused: &std::collections::HashSet<u32>,
    ) -> Vec<Candidate> {
        let boundary = board.boundary_sides(row, col);

        // Start from the most constrained single side, then intersect the
        // rest in — this keeps the working set small, matching §4.2's
        // "intersection of up to four lookups" design.
        let mut constraints: Vec<(Side, crate::piece::Color)> = Vec::new();
        for (i, &side) in Side::ALL.iter().enumerate() {
            if boundary[i] {
                constraints.push((side, BORDER));
            } else if let Some((nr, nc)) = board.neighbor(row, col, side) {
                if let Some(neighbor) = board.get(nr, nc) {
                    constraints.push((side, neighbor.edge(opposite_side(side))));
                }
            }
        }

        if constraints.is_empty() {
            // No constraints yet: every unused piece, every unique rotation.
            return unused
                .iter()
                .filter_map(|&id| self.pieces_by_id.get(&id))
                .flat_map(|piece| (0..piece.unique_rotation_count()).map(move |r| (piece.id, r)))
                .collect();
        }

        let (first_side, first_color) = constraints[0];
        let mut candidates: Vec<Candidate> = edge_index
            .candidates(first_side, first_color)
            .iter()
            .copied()
            .filter(|(id, _)| unused.contains(id))
            .collect();

        for &(side, color) in &constraints[1..] {
            candidates.retain(|&(id, rotation)| {
                self.pieces_by_id
                    .get(&id)
                    .map(|piece| piece.rotated_edge(side, rotation) == color)
                    .unwrap_or(false)
            });
        }

        candidates
    }

    /// Apply the effects of placing `piece_id`/`rotation` at `(row, col)`:
    /// the piece leaves every other cell's domain, and empty neighbors are
    /// refiltered against the newly-known edge.  Returns the snapshot
    /// needed to undo this call exactly, plus whether the result is a
    /// dead end.
    pub fn propagate_after_place(
        &mut self,
        board: &Board,
        row: usize,
        col: usize,
        piece_id: u32,
        rotation: u8,
    ) -> (DomainSnapshot, PropagationResult) {
        let mut snapshot = DomainSnapshot::default();
        let mut touched_idx = std::collections::HashSet::new();

        let placed_idx = self.index(row, col);
        self.touch(placed_idx, &mut snapshot, &mut touched_idx);
        self.domains[placed_idx] = Vec::new();

        // Remove the used piece from every other empty cell's domain.
        for r in 0..self.rows {
            for c in 0..self.cols {
                let idx = self.index(r, c);
                if idx == placed_idx || !board.is_empty_cell(r, c) {
                    continue;
                }
                if self.domains[idx].iter().any(|&(id, _)| id == piece_id) {
                    self.touch(idx, &mut snapshot, &mut touched_idx);
                    self.domains[idx].retain(|&(id, _)| id != piece_id);
                }
            }
        }

        // Refilter empty neighbors against the newly-placed edge.
        let piece = self.pieces_by_id[&piece_id];
        let edges = piece.rotated_edges(rotation);

        for &side in &Side::ALL {
            if let Some((nr, nc)) = board.neighbor(row, col, side) {
                if !board.is_empty_cell(nr, nc) {
                    continue;
                }
                let idx = self.index(nr, nc);
                self.touch(idx, &mut snapshot, &mut touched_idx);

                let required_color = edges[side as usize];
                let opposite = opposite_side(side);
                self.domains[idx].retain(|&(id, rot)| {
                    self.pieces_by_id
                        .get(&id)
                        .map(|p| p.rotated_edge(opposite, rot) == required_color)
                        .unwrap_or(false)
                });
            }
        }

        let dead_end = (0..self.rows).any(|r| {
            (0..self.cols).any(|c| board.is_empty_cell(r, c) && self.domain(r, c).is_empty())
        });

        let result = if dead_end {
            PropagationResult::DeadEnd
        } else {
            PropagationResult::Ok
        };

        (snapshot, result)
    }

    /// Exactly undo a prior [`propagate_after_place`] call.
    pub fn undo_after_remove(&mut self, snapshot: DomainSnapshot) {
        for (idx, contents) in snapshot.touched {
            self.domains[idx] = contents;
        }
    }

    fn touch(
        &self,
        idx: usize,
        snapshot: &mut DomainSnapshot,
        touched: &mut std::collections::HashSet<usize>,
    ) {
        if touched.insert(idx) {
            snapshot.touched.push((idx, self.domains[idx].clone()));
        }
    }
}
