//! Work-stealing driver (§4.7): fans the search out across worker threads,
//! each seeded with a different corner-piece ordering so they explore
//! distinct branches instead of retracing each other's steps, and
//! optionally autosaves progress on a fixed interval.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::board::{Board, Placement};
use crate::domain::DomainManager;
use crate::edge_index::EdgeIndex;
use crate::kernel::{Kernel, KernelOutcome};
use crate::metrics::{Event, MetricsSink};
use crate::piece::{Piece, Side, BORDER};
use crate::puzzle::{border_edge_count, Puzzle};
use crate::save::{self, PlacementOrderEntry, SaveRecord};
use crate::shared_state::SharedSearchState;

/// Parameters for periodic in-flight saves, independent of the rotator's
/// own per-configuration timeout.
#[derive(Clone)]
pub struct AutosaveParams {
    pub save_root: PathBuf,
    pub interval: Duration,
    pub binary: bool,
    pub keep_best: usize,
}

pub struct DriverOutcome {
    pub outcome: KernelOutcome,
    pub best_board: Option<Board>,
    pub best_depth: usize,
    pub best_placement_order: Vec<PlacementOrderEntry>,
}

/// Run up to `thread_count` diversified workers until one finds a
/// solution, every worker exhausts its branch, or `deadline` passes.
///
/// `resume_placements` seeds every worker with the same recorded placement
/// order (§4.5), replayed then extended rather than merely biasing
/// candidate order; pass an empty slice for a fresh start.
pub fn run(
    puzzle: &Puzzle,
    edge_index: &EdgeIndex,
    thread_count: usize,
    deadline: Option<Instant>,
    resume_placements: &[PlacementOrderEntry],
    autosave: Option<AutosaveParams>,
    sink: &dyn MetricsSink,
) -> DriverOutcome {
    let shared = SharedSearchState::new(deadline);
    let worker_count = thread_count.max(1);
    shared.set_worker_count(worker_count);

    let corners = corner_permutations();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count)
        .build()
        .expect("failed to build worker thread pool");

    pool.scope(|scope| {
        for worker_id in 0..worker_count {
            let shared = &shared;
            scope.spawn(move |_| {
                let corner_order = if worker_id < corners.len() {
                    corners[worker_id]
                } else {
                    randomized_corner_order(worker_id)
                };

                debug!("worker {worker_id} starting with corner order {corner_order:?}");
                sink.emit(Event::WorkerStarted { worker_id });
                run_worker(puzzle, edge_index, shared, corner_order, resume_placements, sink, worker_id);
                shared.worker_finished();
            });
        }

        if let Some(params) = autosave {
            scope.spawn(move |_| autosave_loop(puzzle, shared, params, sink));
        }
    });

    let snapshot = shared.snapshot();
    let outcome = if shared.is_solution_found() {
        KernelOutcome::Solved
    } else if shared.should_stop() {
        KernelOutcome::Stopped
    } else {
        KernelOutcome::Exhausted
    };

    DriverOutcome {
        outcome,
        best_depth: shared.best_depth(),
        best_placement_order: snapshot.as_ref().map(|s| s.placement_order.clone()).unwrap_or_default(),
        best_board: snapshot.map(|s| s.board),
    }
}

fn run_worker(
    puzzle: &Puzzle,
    edge_index: &EdgeIndex,
    shared: &SharedSearchState,
    corner_order: [usize; 4],
    resume_placements: &[PlacementOrderEntry],
    sink: &dyn MetricsSink,
    worker_id: usize,
) {
    let mut board = Board::empty(puzzle.rows, puzzle.cols);
    let mut unused: HashSet<u32> = puzzle.pieces.iter().map(|p| p.id).collect();
    let mut placement_order = Vec::new();

    for fixed in &puzzle.fixed {
        let piece = find_piece(puzzle, fixed.piece_id);
        board.place(
            fixed.row,
            fixed.col,
            Placement { piece_id: fixed.piece_id, rotation: fixed.rotation, edges: piece.rotated_edges(fixed.rotation) },
        );
        unused.remove(&fixed.piece_id);
        placement_order.push(PlacementOrderEntry {
            row: fixed.row,
            col: fixed.col,
            piece_id: fixed.piece_id,
            rotation: fixed.rotation,
        });
    }

    // Only cells still empty after fixed placements are genuinely resumable;
    // a recorded entry whose cell a fixed placement already fills is simply
    // skipped (the kernel's own `resume` does the same for cells filled by
    // an earlier replayed entry).
    let resume_placements: Vec<PlacementOrderEntry> = resume_placements
        .iter()
        .copied()
        .filter(|entry| board.is_empty_cell(entry.row, entry.col))
        .collect();

    if resume_placements.is_empty() {
        seed_corner_diversification(puzzle, &mut board, &mut unused, &mut placement_order, corner_order);
    }

    let mut domains = DomainManager::new(puzzle.rows, puzzle.cols, &puzzle.pieces);
    let unused_vec: Vec<u32> = unused.iter().copied().collect();
    domains.initialize(&board, edge_index, &unused_vec);

    let kernel = Kernel::new(puzzle, shared, sink, worker_id);
    let outcome = if resume_placements.is_empty() {
        kernel.run(&mut board, &mut domains, &mut unused, &mut placement_order)
    } else {
        kernel.resume(&mut board, &mut domains, &mut unused, &mut placement_order, &resume_placements)
    };
    debug!("worker {worker_id} finished with {outcome:?}");
}

fn autosave_loop(puzzle: &Puzzle, shared: &SharedSearchState, params: AutosaveParams, sink: &dyn MetricsSink) {
    while shared.workers_remaining() > 0 {
        std::thread::sleep(params.interval);
        if shared.workers_remaining() == 0 {
            break;
        }
        let Some(snapshot) = shared.snapshot() else { continue };

        info!(
            "heartbeat {}: depth {}/{}, {} workers remaining",
            puzzle.name,
            snapshot.depth,
            puzzle.rows * puzzle.cols,
            shared.workers_remaining()
        );

        let placed_ids: HashSet<u32> = snapshot
            .placement_order
            .iter()
            .map(|e| e.piece_id)
            .collect();
        let unused_piece_ids: Vec<u32> =
            puzzle.pieces.iter().map(|p| p.id).filter(|id| !placed_ids.contains(id)).collect();

        let record = SaveRecord::capture(
            &puzzle.name,
            &snapshot.board,
            &snapshot.placement_order,
            &unused_piece_ids,
            0,
            true,
        );

        match save::write_current(&params.save_root, &record, params.binary) {
            Ok(path) => {
                debug!("autosaved {} at depth {} to {}", puzzle.name, snapshot.depth, path.display());
                sink.emit(Event::Autosaved { path: path.display().to_string(), depth: snapshot.depth });
            }
            Err(err) => log::warn!("autosave failed for {}: {err}", puzzle.name),
        }
        let _ = save::write_best(&params.save_root, &record, params.keep_best);
    }
}

fn find_piece(puzzle: &Puzzle, id: u32) -> Piece {
    *puzzle.pieces.iter().find(|p| p.id == id).expect("unknown piece id")
}

/// The 24 permutations of 4 elements, used to assign each of up to 24
/// workers a distinct corner-piece ordering.
fn corner_permutations() -> Vec<[usize; 4]> {
    let mut perms = Vec::with_capacity(24);
    let mut indices = [0usize, 1, 2, 3];
    permute(&mut indices, 0, &mut perms);
    perms
}

fn permute(arr: &mut [usize; 4], k: usize, out: &mut Vec<[usize; 4]>) {
    if k == arr.len() {
        out.push(*arr);
        return;
    }
    for i in k..arr.len() {
        arr.swap(k, i);
        permute(arr, k + 1, out);
        arr.swap(k, i);
    }
}

/// Beyond the 24 corner permutations, decorrelate extra workers with a
/// tiny dependency-free PRNG (not cryptographic; it only needs to spread
/// workers across different initial branches).
fn randomized_corner_order(worker_id: usize) -> [usize; 4] {
    let mut state = (worker_id as u64 + 1).wrapping_mul(0x9E3779B97F4A7C15);
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut order = [0usize, 1, 2, 3];
    for i in (1..order.len()).rev() {
        let j = (next() as usize) % (i + 1);
        order.swap(i, j);
    }
    order
}

/// Diversify a worker by placing corner pieces into the puzzle's four
/// geometric corners in a worker-specific order before general search
/// starts, using whichever corner piece is still unused and locally
/// feasible. A no-op on a grid with no border cells, or when a corner cell
/// is already fixed.
fn seed_corner_diversification(
    puzzle: &Puzzle,
    board: &mut Board,
    unused: &mut HashSet<u32>,
    placement_order: &mut Vec<PlacementOrderEntry>,
    corner_order: [usize; 4],
) {
    if puzzle.rows == 0 || puzzle.cols == 0 {
        return;
    }
    let corner_cells = [
        (0, 0),
        (0, puzzle.cols - 1),
        (puzzle.rows - 1, puzzle.cols - 1),
        (puzzle.rows - 1, 0),
    ];

    let corner_piece_ids: Vec<u32> =
        puzzle.pieces.iter().filter(|p| border_edge_count(p) == 2).map(|p| p.id).collect();

    for &corner_index in &corner_order {
        let (row, col) = corner_cells[corner_index];
        if !board.is_empty_cell(row, col) {
            continue;
        }
        let Some(&piece_id) = corner_piece_ids.iter().find(|id| unused.contains(id)) else { continue };
        let piece = find_piece(puzzle, piece_id);
        let boundary = board.boundary_sides(row, col);

        let Some(rotation) = (0..piece.unique_rotation_count()).find(|&k| {
            let edges = piece.rotated_edges(k);
            Side::ALL.iter().enumerate().all(|(i, &side)| !boundary[i] || edges[side as usize] == BORDER)
        }) else {
            continue;
        };

        board.place(row, col, Placement { piece_id, rotation, edges: piece.rotated_edges(rotation) });
        unused.remove(&piece_id);
        placement_order.push(PlacementOrderEntry { row, col, piece_id, rotation });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopSink;
    use crate::piece::BORDER;
    use crate::puzzle::SortOrder;

    fn three_piece_row_puzzle() -> Puzzle {
        Puzzle {
            name: "d".to_string(),
            rows: 1,
            cols: 3,
            pieces: vec![
                Piece::new(1, BORDER, 5, BORDER, BORDER),
                Piece::new(2, BORDER, 7, BORDER, 5),
                Piece::new(3, BORDER, BORDER, BORDER, 7),
            ],
            fixed: Vec::new(),
            sort_order: SortOrder::Ascending,
            prioritize_borders: false,
            min_depth_to_show: 0,
        }
    }

    #[test]
    fn corner_permutations_cover_all_24_orderings() {
        let perms = corner_permutations();
        let unique: HashSet<[usize; 4]> = perms.iter().copied().collect();
        assert_eq!(unique.len(), 24);
    }

    #[test]
    fn run_solves_a_small_puzzle_with_multiple_workers() {
        let puzzle = three_piece_row_puzzle();
        let edge_index = EdgeIndex::build(&puzzle.pieces);
        let outcome = run(&puzzle, &edge_index, 2, None, &[], None, &NoopSink);

        assert_eq!(outcome.outcome, KernelOutcome::Solved);
        let board = outcome.best_board.unwrap();
        assert!(board.is_full());
        assert!(board.is_consistent());
    }
}
