//! Shared search state (§4.6): the only mutable structure every worker
//! thread touches concurrently. Constructed fresh per solve — never a
//! process-wide singleton — so independent solves (or tests) never alias
//! each other's state.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;

use crate::board::Board;
use crate::save::PlacementOrderEntry;

/// The best partial (or full) solve observed so far.
#[derive(Clone)]
pub struct BestSnapshot {
    pub board: Board,
    pub depth: usize,
    pub score: (usize, usize),
    pub placement_order: Vec<PlacementOrderEntry>,
}

pub struct SharedSearchState {
    solution_found: AtomicBool,
    best_depth: CachePadded<AtomicUsize>,
    best: Mutex<Option<BestSnapshot>>,
    active_workers: CachePadded<AtomicUsize>,
    deadline: Option<Instant>,
}

impl SharedSearchState {
    pub fn new(deadline: Option<Instant>) -> SharedSearchState {
        SharedSearchState {
            solution_found: AtomicBool::new(false),
            best_depth: CachePadded::new(AtomicUsize::new(0)),
            best: Mutex::new(None),
            active_workers: CachePadded::new(AtomicUsize::new(0)),
            deadline,
        }
    }

    pub fn set_worker_count(&self, count: usize) {
        self.active_workers.store(count, Ordering::Release);
    }

    pub fn worker_finished(&self) {
        self.active_workers.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn workers_remaining(&self) -> usize {
        self.active_workers.load(Ordering::Acquire)
    }

    pub fn is_solution_found(&self) -> bool {
        self.solution_found.load(Ordering::Acquire)
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    /// Whether a worker should stop descending: either someone already
    /// found a full solution, or the configured deadline passed. Checked
    /// at every kernel recursion step so workers react promptly (§4.6).
    pub fn should_stop(&self) -> bool {
        self.is_solution_found() || self.deadline_passed()
    }

    pub fn best_depth(&self) -> usize {
        self.best_depth.load(Ordering::Acquire)
    }

    /// Record that a worker reached `depth`. Only actually publishes the
    /// board snapshot if `depth` strictly improves on the current global
    /// best, via compare-and-swap so concurrent improvements never race
    /// each other into a stale write (§8: global best is monotonic
    /// non-decreasing across the whole search). Returns whether this call
    /// was the one that published the improvement.
    pub fn note_depth(&self, depth: usize, board: &Board, placement_order: &[PlacementOrderEntry]) -> bool {
        loop {
            let current = self.best_depth.load(Ordering::Acquire);
            if depth <= current {
                return false;
            }
            if self
                .best_depth
                .compare_exchange(current, depth, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let mut best = self.best.lock();
                let replace = best.as_ref().map(|b| b.depth < depth).unwrap_or(true);
                if replace {
                    *best = Some(BestSnapshot {
                        board: board.clone(),
                        depth,
                        score: board.score(),
                        placement_order: placement_order.to_vec(),
                    });
                }
                return true;
            }
        }
    }

    /// Record a full solution and signal every other worker to stop.
    pub fn publish_solution(&self, board: &Board, placement_order: &[PlacementOrderEntry]) {
        let depth = board.rows() * board.cols();
        self.note_depth(depth, board, placement_order);
        self.solution_found.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> Option<BestSnapshot> {
        self.best.lock().clone()
    }
}
