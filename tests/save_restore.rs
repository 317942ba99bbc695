//! Integration coverage for the save/resume path: a configuration that
//! only gets partway solved should resume from exactly where it left off.

use std::fs;

use eternity_solver::board::{Board, Placement};
use eternity_solver::config::SolverConfig;
use eternity_solver::metrics::NoopSink;
use eternity_solver::puzzle::Puzzle;
use eternity_solver::rotator;
use eternity_solver::save::{self, PlacementOrderEntry, SaveRecord};

fn write_puzzle(dir: &std::path::Path, filename: &str, text: &str) {
    fs::write(dir.join(filename), text).unwrap();
}

#[test]
fn rotator_resumes_a_partially_solved_configuration() {
    let configs_dir = tempfile::tempdir().unwrap();
    let save_root = tempfile::tempdir().unwrap();

    write_puzzle(
        configs_dir.path(),
        "resume_me.txt",
        "# name: resume_me\n# dimensions: 1x3\n1 0 5 0 0\n2 0 7 0 5\n3 0 0 0 7\n",
    );

    let mut config = SolverConfig::with_defaults(save_root.path().to_path_buf());
    config.thread_count = 1;
    config.minutes_per_configuration = 1.0;

    // First rotation solves it outright (the puzzle is tiny and fully
    // determined), which exercises the same save path a partial run would
    // use.
    let configurations = rotator::discover(configs_dir.path(), save_root.path()).unwrap();
    rotator::run_one(&configurations[0], &config, &NoopSink).unwrap();

    let record = save::find_current_save(save_root.path(), "resume_me").unwrap().unwrap();
    assert_eq!(record.depth, 3);
    assert!(record.cumulative_compute_time_ms > 0);

    // A second rotation should find the same configuration already at
    // full depth and not regress it.
    let configurations = rotator::discover(configs_dir.path(), save_root.path()).unwrap();
    assert_eq!(configurations[0].cumulative_compute_time_ms, record.cumulative_compute_time_ms);
    rotator::run_one(&configurations[0], &config, &NoopSink).unwrap();

    let second_record = save::find_current_save(save_root.path(), "resume_me").unwrap().unwrap();
    assert_eq!(second_record.depth, 3);
    assert!(second_record.cumulative_compute_time_ms >= record.cumulative_compute_time_ms);
}

#[test]
fn resume_continues_from_a_genuinely_partial_save() {
    // Hand-craft a save as if the process had been interrupted mid-search
    // (depth 1, short of this puzzle's full depth 3), then confirm the
    // rotator rebuilds the board to match it and finishes the solve from
    // there rather than restarting (§4.5, §8 property S5).
    let configs_dir = tempfile::tempdir().unwrap();
    let save_root = tempfile::tempdir().unwrap();

    write_puzzle(
        configs_dir.path(),
        "resume_partial.txt",
        "# name: resume_partial\n# dimensions: 1x3\n1 0 5 0 0\n2 0 7 0 5\n3 0 0 0 7\n",
    );

    let mut board = Board::empty(1, 3);
    board.place(0, 0, Placement { piece_id: 1, rotation: 0, edges: [0, 5, 0, 0] });
    let placement_order = vec![PlacementOrderEntry { row: 0, col: 0, piece_id: 1, rotation: 0 }];
    let partial = SaveRecord::capture("resume_partial", &board, &placement_order, &[2, 3], 5_000, true);
    assert!(partial.depth < 3);
    save::write_current(save_root.path(), &partial, false).unwrap();

    let mut config = SolverConfig::with_defaults(save_root.path().to_path_buf());
    config.thread_count = 1;
    config.minutes_per_configuration = 1.0;

    let configurations = rotator::discover(configs_dir.path(), save_root.path()).unwrap();
    assert_eq!(configurations[0].cumulative_compute_time_ms, 5_000);
    rotator::run_one(&configurations[0], &config, &NoopSink).unwrap();

    let record = save::find_current_save(save_root.path(), "resume_partial").unwrap().unwrap();
    assert_eq!(record.depth, 3);
    assert!(record.cumulative_compute_time_ms > 5_000);

    // The replayed placement is exactly what was saved, not rediscovered
    // independently by live search.
    let first = record.placement_order.first().expect("placement order non-empty");
    assert_eq!((first.row, first.col, first.piece_id, first.rotation), (0, 0, 1, 0));
}

#[test]
fn best_save_is_kept_once_a_full_solution_is_found() {
    let configs_dir = tempfile::tempdir().unwrap();
    let save_root = tempfile::tempdir().unwrap();

    write_puzzle(
        configs_dir.path(),
        "best.txt",
        "# name: best\n# dimensions: 1x3\n1 0 5 0 0\n2 0 7 0 5\n3 0 0 0 7\n",
    );

    let mut config = SolverConfig::with_defaults(save_root.path().to_path_buf());
    config.thread_count = 1;

    let configurations = rotator::discover(configs_dir.path(), save_root.path()).unwrap();
    rotator::run_one(&configurations[0], &config, &NoopSink).unwrap();

    let best_saves = save::find_all_best_saves(save_root.path(), "best").unwrap();
    assert!(!best_saves.is_empty());
    assert_eq!(best_saves[0].depth, 3);
}

#[test]
fn puzzle_round_trips_through_the_text_format_unchanged_in_shape() {
    let text = "# name: rt\n# dimensions: 1x1\n1 0 0 0 0\n";
    let puzzle = Puzzle::parse(text).unwrap();
    let again = Puzzle::parse(&puzzle.to_text()).unwrap();
    assert_eq!(puzzle.rows, again.rows);
    assert_eq!(puzzle.cols, again.cols);
    assert_eq!(puzzle.pieces.len(), again.pieces.len());
}
