//! Rotator CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eternity_solver::config::SolverConfig;
use eternity_solver::metrics::NoopSink;
use eternity_solver::rotator;
use log::LevelFilter;

/// Solve (or keep rotating across) a directory of edge-matching puzzle
/// configurations.
#[derive(Parser, Debug)]
#[command(name = "solver", version, about)]
struct CliArgs {
    /// Directory containing `*.txt` puzzle configuration files.
    puzzle_dir: PathBuf,

    /// Directory to read/write save files under.
    #[arg(long, default_value = "saves")]
    save_root: PathBuf,

    /// Worker thread count. Defaults to the number of available CPUs.
    #[arg(short = 't', long = "thread-count")]
    thread_count: Option<usize>,

    /// Minutes to spend on each configuration before rotating to the next.
    #[arg(short = 'm', long = "minutes-per-configuration", default_value_t = 1.0)]
    minutes_per_configuration: f64,

    /// Seconds between in-flight autosaves.
    #[arg(long, default_value_t = 60)]
    autosave_interval_secs: u64,

    /// Write saves in the compact binary format instead of text.
    #[arg(long)]
    binary_saves: bool,

    /// How many best-depth saves to keep per puzzle.
    #[arg(long, default_value_t = 5)]
    keep_best_saves: usize,

    /// Stop after this many rotations instead of running forever.
    #[arg(long)]
    max_rotations: Option<usize>,

    /// Increase log verbosity. Repeatable: `-v` (info), `-vv` (debug),
    /// `-vvv` (trace). Unset defaults to warnings only.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    env_logger::Builder::new().filter_level(level_for(args.verbose)).init();

    let mut config = SolverConfig::with_defaults(args.save_root);
    if let Some(thread_count) = args.thread_count {
        config.thread_count = thread_count;
    }
    config.minutes_per_configuration = args.minutes_per_configuration;
    config.autosave_interval = std::time::Duration::from_secs(args.autosave_interval_secs);
    config.binary_saves = args.binary_saves;
    config.keep_best_saves = args.keep_best_saves;

    match rotator::rotate(&args.puzzle_dir, &config, args.max_rotations, &NoopSink) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
