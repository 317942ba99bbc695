//! Configuration rotator (§4.9): cycles across puzzle configurations,
//! always advancing whichever one has accumulated the least compute time,
//! and handing each a bounded time slice before moving on.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::SolverConfig;
use crate::driver::{self, AutosaveParams};
use crate::edge_index::EdgeIndex;
use crate::error::SolveError;
use crate::metrics::{Event, MetricsSink};
use crate::puzzle::Puzzle;
use crate::save::{self, SaveRecord};

/// A configuration file discovered under the configurations directory,
/// plus how much compute time has already been sunk into it per its most
/// recent save, if any.
pub struct Configuration {
    pub path: PathBuf,
    pub puzzle: Puzzle,
    pub cumulative_compute_time_ms: u64,
}

/// Find every `.txt` puzzle file in `configs_dir`, load its most recent
/// save (if any) to learn how much time is already sunk into it, and order
/// them ascending by cumulative compute time (never-started configurations
/// carry `0` and sort first) — the order the rotator attempts them in.
pub fn discover(configs_dir: &Path, save_root: &Path) -> Result<Vec<Configuration>, SolveError> {
    let mut configs = Vec::new();

    for entry in fs::read_dir(configs_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let text = fs::read_to_string(&path)?;
        let puzzle = Puzzle::parse(&text)?;

        let cumulative_compute_time_ms = save::find_current_save(save_root, &puzzle.name)
            .ok()
            .flatten()
            .map(|record| record.cumulative_compute_time_ms)
            .unwrap_or(0);

        configs.push(Configuration { path, puzzle, cumulative_compute_time_ms });
    }

    configs.sort_by_key(|c| c.cumulative_compute_time_ms);
    Ok(configs)
}

fn unused_piece_ids(puzzle: &Puzzle, placed_ids: &HashSet<u32>) -> Vec<u32> {
    puzzle.pieces.iter().map(|p| p.id).filter(|id| !placed_ids.contains(id)).collect()
}

/// Run one configuration for up to `config.minutes_per_configuration`,
/// resuming from its current save if one exists, then writing a fresh
/// current save (and a best save, if depth improved) before returning.
pub fn run_one(configuration: &Configuration, config: &SolverConfig, sink: &dyn MetricsSink) -> Result<(), SolveError> {
    let puzzle = &configuration.puzzle;
    let edge_index = EdgeIndex::build(&puzzle.pieces);

    let resume_record = save::find_current_save(&config.save_root, &puzzle.name)?;
    let resume_placements = if let Some(record) = &resume_record {
        info!(
            "resuming {} at depth {} ({} ms already spent)",
            puzzle.name, record.depth, record.cumulative_compute_time_ms
        );
        record.placement_order.clone()
    } else {
        info!("starting {} fresh", puzzle.name);
        Vec::new()
    };

    debug!("reserving {} for up to {} minute(s)", puzzle.name, config.minutes_per_configuration);
    sink.emit(Event::ConfigurationStarted { puzzle_name: puzzle.name.clone() });

    let deadline = config.deadline_from_now();
    let started_at = Instant::now();

    let autosave = AutosaveParams {
        save_root: config.save_root.clone(),
        interval: config.autosave_interval,
        binary: config.binary_saves,
        keep_best: config.keep_best_saves,
    };

    let outcome = driver::run(
        puzzle,
        &edge_index,
        config.thread_count,
        Some(deadline),
        &resume_placements,
        Some(autosave),
        sink,
    );

    let elapsed_ms = started_at.elapsed().as_millis() as u64;
    let cumulative_compute_time_ms = configuration.cumulative_compute_time_ms + elapsed_ms;

    let Some(board) = outcome.best_board else {
        warn!("{} made no progress this rotation", puzzle.name);
        return Ok(());
    };

    let placed_ids: HashSet<u32> = outcome.best_placement_order.iter().map(|e| e.piece_id).collect();
    let record = SaveRecord::capture(
        &puzzle.name,
        &board,
        &outcome.best_placement_order,
        &unused_piece_ids(puzzle, &placed_ids),
        cumulative_compute_time_ms,
        true,
    );

    save::write_current(&config.save_root, &record, config.binary_saves)?;
    save::write_best(&config.save_root, &record, config.keep_best_saves)?;

    info!(
        "{} reached depth {}/{} this rotation ({} ms cumulative)",
        puzzle.name,
        outcome.best_depth,
        puzzle.rows * puzzle.cols,
        cumulative_compute_time_ms
    );
    sink.emit(Event::ConfigurationFinished { puzzle_name: puzzle.name.clone(), depth: outcome.best_depth });

    Ok(())
}

/// Repeatedly pick the least-advanced configuration and give it one time
/// slice. Runs forever unless `max_rotations` bounds the number of slices
/// handed out in total (mainly useful for tests and single-pass CLI runs).
pub fn rotate(
    configs_dir: &Path,
    config: &SolverConfig,
    max_rotations: Option<usize>,
    sink: &dyn MetricsSink,
) -> Result<(), SolveError> {
    let mut rotations = 0;
    loop {
        let mut configurations = discover(configs_dir, &config.save_root)?;
        if configurations.is_empty() {
            warn!("no configurations found in {}", configs_dir.display());
            return Ok(());
        }
        configurations.sort_by_key(|c| c.cumulative_compute_time_ms);

        run_one(&configurations[0], config, sink)?;

        rotations += 1;
        if let Some(max) = max_rotations {
            if rotations >= max {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopSink;
    use std::io::Write as _;

    #[test]
    fn discover_orders_never_started_configurations_first() {
        let configs_dir = tempfile::tempdir().unwrap();
        let save_root = tempfile::tempdir().unwrap();

        let mut f = fs::File::create(configs_dir.path().join("a.txt")).unwrap();
        writeln!(f, "# name: a\n# dimensions: 1x1\n1 0 0 0 0").unwrap();

        let configs = discover(configs_dir.path(), save_root.path()).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].cumulative_compute_time_ms, 0);
    }

    #[test]
    fn run_one_writes_a_current_save() {
        let configs_dir = tempfile::tempdir().unwrap();
        let save_root = tempfile::tempdir().unwrap();

        let mut f = fs::File::create(configs_dir.path().join("row.txt")).unwrap();
        writeln!(
            f,
            "# name: row\n# dimensions: 1x3\n1 0 5 0 0\n2 0 7 0 5\n3 0 0 0 7"
        )
        .unwrap();

        let mut config = SolverConfig::with_defaults(save_root.path().to_path_buf());
        config.thread_count = 1;
        config.minutes_per_configuration = 1.0;

        let configurations = discover(configs_dir.path(), save_root.path()).unwrap();
        run_one(&configurations[0], &config, &NoopSink).unwrap();

        let saved = save::find_current_save(save_root.path(), "row").unwrap();
        assert!(saved.is_some());
    }
}
