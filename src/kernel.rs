//! Backtracking search kernel (§4.5): singleton propagation, MRV cell
//! selection, LCV candidate ordering, and resumable replay.

use std::collections::HashSet;

use log::trace;

use crate::board::{Board, Placement};
use crate::domain::{DomainManager, PropagationResult};
use crate::edge_index::Candidate;
use crate::heuristics::{
    find_singleton, order_candidates_lcv, order_candidates_lcv_with_forced, select_cell_mrv,
};
use crate::metrics::{Event, MetricsSink};
use crate::puzzle::Puzzle;
use crate::save::PlacementOrderEntry;
use crate::shared_state::SharedSearchState;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KernelOutcome {
    Solved,
    Exhausted,
    Stopped,
}

pub struct Kernel<'a> {
    puzzle: &'a Puzzle,
    shared: &'a SharedSearchState,
    sink: &'a dyn MetricsSink,
    worker_id: usize,
}

impl<'a> Kernel<'a> {
    pub fn new(
        puzzle: &'a Puzzle,
        shared: &'a SharedSearchState,
        sink: &'a dyn MetricsSink,
        worker_id: usize,
    ) -> Kernel<'a> {
        Kernel { puzzle, shared, sink, worker_id }
    }

    /// Run the search to completion, a deadline, or an external
    /// solution-found signal, from whatever state `board`/`domains`/`unused`
    /// already hold.
    pub fn run(
        &self,
        board: &mut Board,
        domains: &mut DomainManager,
        unused: &mut HashSet<u32>,
        placement_order: &mut Vec<PlacementOrderEntry>,
    ) -> KernelOutcome {
        if self.shared.should_stop() {
            return KernelOutcome::Stopped;
        }

        if board.is_full() {
            return self.accept_solution(board, placement_order);
        }

        if let Some((row, col, candidate)) = find_singleton(board, domains) {
            return self.try_candidates(board, domains, unused, placement_order, row, col, vec![candidate], None);
        }

        let Some((row, col)) = select_cell_mrv(board, domains, self.puzzle.prioritize_borders) else {
            // Every empty cell has a nonempty domain (else find_singleton or
            // the dead-end check on the prior propagation would have caught
            // it), but `is_full` says we're not done: unreachable in
            // practice, treated as an ordinary dead end rather than a panic.
            return KernelOutcome::Exhausted;
        };

        let candidates = order_candidates_lcv(board, domains, row, col, self.puzzle.sort_order);
        self.try_candidates(board, domains, unused, placement_order, row, col, candidates, None)
    }

    /// Resume from a previously saved placement order (§4.5): directly
    /// places `saved`'s entries one at a time, in their recorded order,
    /// through the same place/propagate/undo machinery live search uses —
    /// no cell-selection heuristic decides which cell comes next, since the
    /// save already recorded that. A replayed placement is never treated as
    /// fixed: backtracking can remove it exactly like a live choice, and per
    /// §8 property 11 it tries that cell's remaining same-piece rotations
    /// before any other piece when it does. Once `saved` is exhausted, or a
    /// recorded cell is already filled (e.g. by a fixed placement), control
    /// falls through to ordinary `run`.
    pub fn resume(
        &self,
        board: &mut Board,
        domains: &mut DomainManager,
        unused: &mut HashSet<u32>,
        placement_order: &mut Vec<PlacementOrderEntry>,
        saved: &[PlacementOrderEntry],
    ) -> KernelOutcome {
        if self.shared.should_stop() {
            return KernelOutcome::Stopped;
        }

        if board.is_full() {
            return self.accept_solution(board, placement_order);
        }

        let Some((entry, rest)) = saved.split_first() else {
            return self.run(board, domains, unused, placement_order);
        };

        if !board.is_empty_cell(entry.row, entry.col) {
            return self.resume(board, domains, unused, placement_order, rest);
        }

        let forced = (entry.piece_id, entry.rotation);
        let candidates = order_candidates_lcv_with_forced(
            board,
            domains,
            entry.row,
            entry.col,
            self.puzzle.sort_order,
            forced,
        );
        self.try_candidates(board, domains, unused, placement_order, entry.row, entry.col, candidates, Some(rest))
    }

    fn accept_solution(&self, board: &Board, placement_order: &[PlacementOrderEntry]) -> KernelOutcome {
        self.shared.publish_solution(board, placement_order);
        self.sink.emit(Event::SolutionFound { worker_id: self.worker_id });
        KernelOutcome::Solved
    }

    /// Try each candidate at `(row, col)` in order. `replay_rest`, when
    /// `Some`, means the *first* candidate in `candidates` is the forced
    /// replayed choice: if it succeeds, the search continues replaying
    /// `replay_rest` rather than falling into live MRV/LCV selection. Every
    /// other candidate (including the forced piece's later rotations
    /// grouped right behind it by [`order_candidates_lcv_with_forced`])
    /// continues via ordinary live search, since only the exact recorded
    /// choice has a recorded continuation.
    fn try_candidates(
        &self,
        board: &mut Board,
        domains: &mut DomainManager,
        unused: &mut HashSet<u32>,
        placement_order: &mut Vec<PlacementOrderEntry>,
        row: usize,
        col: usize,
        candidates: Vec<Candidate>,
        replay_rest: Option<&[PlacementOrderEntry]>,
    ) -> KernelOutcome {
        for (index, (piece_id, rotation)) in candidates.into_iter().enumerate() {
            if self.shared.should_stop() {
                return KernelOutcome::Stopped;
            }

            let piece = domains.piece(piece_id);
            let edges = piece.rotated_edges(rotation);
            trace!("placing piece {piece_id} rotation {rotation} at ({row}, {col})");
            board.place(row, col, Placement { piece_id, rotation, edges });
            unused.remove(&piece_id);
            placement_order.push(PlacementOrderEntry { row, col, piece_id, rotation });

            let (snapshot, propagation) = domains.propagate_after_place(board, row, col, piece_id, rotation);

            let outcome = if propagation == PropagationResult::DeadEnd {
                KernelOutcome::Exhausted
            } else {
                if self.shared.note_depth(placement_order.len(), board, placement_order) {
                    self.sink.emit(Event::DepthAdvanced { worker_id: self.worker_id, depth: placement_order.len() });
                }
                match (index, replay_rest) {
                    (0, Some(rest)) => self.resume(board, domains, unused, placement_order, rest),
                    _ => self.run(board, domains, unused, placement_order),
                }
            };

            match outcome {
                KernelOutcome::Solved | KernelOutcome::Stopped => return outcome,
                KernelOutcome::Exhausted => {
                    trace!("undoing piece {piece_id} at ({row}, {col})");
                    domains.undo_after_remove(snapshot);
                    board.remove(row, col);
                    unused.insert(piece_id);
                    placement_order.pop();
                }
            }
        }

        KernelOutcome::Exhausted
    }
}
