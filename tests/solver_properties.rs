//! End-to-end scenarios exercising the public solving pipeline: parsing,
//! edge indexing, and the work-stealing driver together.

use std::collections::HashSet;

use eternity_solver::board::Placement;
use eternity_solver::driver::{self};
use eternity_solver::edge_index::EdgeIndex;
use eternity_solver::kernel::KernelOutcome;
use eternity_solver::metrics::NoopSink;
use eternity_solver::piece::{Piece, Side, BORDER};
use eternity_solver::puzzle::{FixedPlacement, Puzzle, SortOrder};

fn solve(puzzle: &Puzzle, threads: usize) -> driver::DriverOutcome {
    let edge_index = EdgeIndex::build(&puzzle.pieces);
    driver::run(puzzle, &edge_index, threads, None, &[], None, &NoopSink)
}

#[test]
fn three_piece_row_solves_deterministically() {
    let text = "\
# name: s1
# dimensions: 1x3
1 0 5 0 0
2 0 7 0 5
3 0 0 0 7
";
    let puzzle = Puzzle::parse(text).unwrap();
    let outcome = solve(&puzzle, 1);

    let board = outcome.best_board.expect("a solution must be found");
    assert!(board.is_full());
    assert!(board.is_consistent());
    assert_eq!(board.score(), (2, 2));
}

#[test]
fn two_by_two_grid_of_all_corner_pieces_solves() {
    let pieces = vec![
        Piece::new(1, BORDER, 1, 2, BORDER),
        Piece::new(2, BORDER, BORDER, 3, 1),
        Piece::new(3, 2, 4, BORDER, BORDER),
        Piece::new(4, 3, BORDER, BORDER, 4),
    ];
    let puzzle = Puzzle {
        name: "s2".to_string(),
        rows: 2,
        cols: 2,
        pieces,
        fixed: Vec::new(),
        sort_order: SortOrder::Ascending,
        prioritize_borders: true,
        min_depth_to_show: 0,
    };

    let outcome = solve(&puzzle, 2);
    let board = outcome.best_board.expect("a solution must be found");
    assert!(board.is_full());
    assert!(board.is_consistent());

    let (correct, max) = board.score();
    assert_eq!(correct, max);
}

#[test]
fn fixed_placement_survives_the_whole_search() {
    let pieces = vec![
        Piece::new(1, BORDER, 5, BORDER, BORDER),
        Piece::new(2, BORDER, 7, BORDER, 5),
        Piece::new(3, BORDER, BORDER, BORDER, 7),
    ];
    let puzzle = Puzzle {
        name: "s3".to_string(),
        rows: 1,
        cols: 3,
        pieces,
        fixed: vec![FixedPlacement { piece_id: 2, row: 0, col: 1, rotation: 0 }],
        sort_order: SortOrder::Ascending,
        prioritize_borders: false,
        min_depth_to_show: 0,
    };

    let outcome = solve(&puzzle, 1);
    let board = outcome.best_board.expect("a solution must be found");
    assert!(board.is_full());

    let middle = board.get(0, 1).unwrap();
    assert_eq!(middle, Placement { piece_id: 2, rotation: 0, edges: [0, 7, 0, 5] });
}

#[test]
fn unsatisfiable_puzzle_never_reports_a_solution() {
    let pieces = vec![Piece::new(1, 1, 1, 1, 1), Piece::new(2, 1, 1, 1, 1)];
    let puzzle = Puzzle {
        name: "s4".to_string(),
        rows: 1,
        cols: 2,
        pieces,
        fixed: Vec::new(),
        sort_order: SortOrder::Ascending,
        prioritize_borders: false,
        min_depth_to_show: 0,
    };

    let outcome = solve(&puzzle, 2);
    assert_ne!(outcome.outcome, KernelOutcome::Solved);
    assert!(outcome.best_board.is_none());
}

#[test]
fn multiple_workers_converge_on_a_consistent_board() {
    let text = "\
# name: s6
# dimensions: 1x3
1 0 5 0 0
2 0 7 0 5
3 0 0 0 7
";
    let puzzle = Puzzle::parse(text).unwrap();

    for threads in [1, 4, 24] {
        let outcome = solve(&puzzle, threads);
        let board = outcome.best_board.expect("a solution must be found");
        assert!(board.is_full());
        assert!(board.is_consistent());
    }
}

#[test]
fn unique_rotation_pruning_never_drops_a_reachable_assignment() {
    // The middle piece has two-fold symmetry (its matching rotation keeps
    // the board satisfiable): unique_rotation_count pruning must not make
    // that placement unreachable.
    let pieces = vec![
        Piece::new(1, BORDER, 5, BORDER, BORDER),
        Piece::new(2, BORDER, 5, BORDER, 5), // 2-fold symmetric
        Piece::new(3, BORDER, BORDER, BORDER, 5),
    ];
    let puzzle = Puzzle {
        name: "symmetry".to_string(),
        rows: 1,
        cols: 3,
        pieces,
        fixed: Vec::new(),
        sort_order: SortOrder::Ascending,
        prioritize_borders: false,
        min_depth_to_show: 0,
    };

    let outcome = solve(&puzzle, 1);
    let board = outcome.best_board.expect("a solution must be found");
    assert!(board.is_full());
    assert!(board.is_consistent());
}

#[test]
fn side_enum_all_constant_matches_expected_order() {
    assert_eq!(Side::ALL, [Side::North, Side::East, Side::South, Side::West]);
}

#[test]
fn domain_never_offers_a_piece_already_placed_elsewhere() {
    let text = "\
# dimensions: 1x3
1 0 5 0 0
2 0 7 0 5
3 0 0 0 7
";
    let puzzle = Puzzle::parse(text).unwrap();
    let outcome = solve(&puzzle, 1);
    let board = outcome.best_board.unwrap();

    let mut seen = HashSet::new();
    for row in 0..board.rows() {
        for col in 0..board.cols() {
            let placement = board.get(row, col).unwrap();
            assert!(seen.insert(placement.piece_id), "piece {} placed twice", placement.piece_id);
        }
    }
}
