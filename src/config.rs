//! Runtime-tunable solver configuration: the ambient stack's typed
//! settings object, threaded from the CLI down into the driver and
//! rotator rather than re-read deep in the call stack.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Solver-wide settings for one run of the rotator (or a single
/// configuration solved directly).
#[derive(Clone, Debug)]
pub struct SolverConfig {
    pub thread_count: usize,
    pub minutes_per_configuration: f64,
    pub autosave_interval: Duration,
    pub min_depth_to_show: usize,
    pub save_root: PathBuf,
    pub binary_saves: bool,
    pub keep_best_saves: usize,
}

impl SolverConfig {
    pub fn with_defaults(save_root: PathBuf) -> SolverConfig {
        SolverConfig {
            thread_count: num_cpus::get(),
            minutes_per_configuration: 1.0,
            autosave_interval: Duration::from_secs(60),
            min_depth_to_show: 0,
            save_root,
            binary_saves: false,
            keep_best_saves: 5,
        }
    }

    pub fn deadline_from_now(&self) -> Instant {
        Instant::now() + Duration::from_secs_f64(self.minutes_per_configuration * 60.0)
    }
}
