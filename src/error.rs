//! The crate's public error taxonomy (§7).
//!
//! Infeasibility during search is *not* an error — see
//! [`crate::domain::PropagationResult`] — and never appears here.

use thiserror::Error;

/// Errors surfaced to callers of the library's fallible entry points.
///
/// Programmer errors (out-of-range coordinates, double placement) are not
/// represented here: they panic via `assert!`/`debug_assert!` at the point
/// of misuse, per §7.
#[derive(Debug, Error)]
pub enum SolveError {
    /// A malformed puzzle file, a piece-count/dimension mismatch, or a
    /// piece-id collision. The core does not retry; the caller must fix
    /// the input.
    #[error("invalid puzzle: {0}")]
    Validation(String),

    /// A save file exists but could not be parsed. Per §7 this is treated
    /// as "no save available", never as corruption of live state; callers
    /// should log and fall back to starting fresh rather than propagating
    /// this further.
    #[error("corrupt save data: {0}")]
    Corrupt(String),

    /// Underlying I/O failure (reading a puzzle or save file).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
