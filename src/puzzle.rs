//! Puzzle definitions: dimensions, piece set, fixed placements, and the
//! text file format that produces them.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::error::SolveError;
use crate::piece::{Color, Piece, BORDER};

/// Candidate ordering for the initial (pre-LCV) traversal of a cell's
/// unused pieces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A pre-placed piece that the search must never remove.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FixedPlacement {
    pub piece_id: u32,
    pub row: usize,
    pub col: usize,
    pub rotation: u8,
}

/// A fully-parsed, validated puzzle definition.
///
/// Invariants (checked by [`Puzzle::validate`], relied on everywhere else):
/// `pieces.len() == rows * cols`; piece ids are unique; every
/// [`FixedPlacement`] refers to an existing piece id and an in-range cell.
#[derive(Clone, Debug)]
pub struct Puzzle {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub pieces: Vec<Piece>,
    pub fixed: Vec<FixedPlacement>,
    pub sort_order: SortOrder,
    pub prioritize_borders: bool,
    pub min_depth_to_show: usize,
}

impl Puzzle {
    /// Validate the structural invariants documented on [`Puzzle`].
    pub fn validate(&self) -> Result<(), SolveError> {
        if self.pieces.len() != self.rows * self.cols {
            return Err(SolveError::Validation(format!(
                "piece count {} does not match grid {}x{} ({} cells)",
                self.pieces.len(),
                self.rows,
                self.cols,
                self.rows * self.cols
            )));
        }

        let mut seen_ids = HashSet::with_capacity(self.pieces.len());
        for piece in &self.pieces {
            if !seen_ids.insert(piece.id) {
                return Err(SolveError::Validation(format!("duplicate piece id {}", piece.id)));
            }
        }

        for fixed in &self.fixed {
            if fixed.row >= self.rows || fixed.col >= self.cols {
                return Err(SolveError::Validation(format!(
                    "fixed placement for piece {} targets out-of-range cell ({}, {})",
                    fixed.piece_id, fixed.row, fixed.col
                )));
            }
            if !seen_ids.contains(&fixed.piece_id) {
                return Err(SolveError::Validation(format!(
                    "fixed placement references unknown piece id {}",
                    fixed.piece_id
                )));
            }
        }

        // `expected_piece_geometry`'s corner count is degenerate (always 4,
        // even when that exceeds the piece count) for single-row/column
        // grids, so the distribution check only applies to genuine
        // rectangles of at least 2x2.
        if self.rows >= 2 && self.cols >= 2 {
            let (expected_corners, expected_edges, expected_interior) =
                expected_piece_geometry(self.rows, self.cols);
            let (mut corners, mut edges, mut interior) = (0usize, 0usize, 0usize);
            for piece in &self.pieces {
                match border_edge_count(piece) {
                    2 => corners += 1,
                    1 => edges += 1,
                    0 => interior += 1,
                    n => {
                        return Err(SolveError::Validation(format!(
                            "piece {} has {n} border-colored edges; a piece may have at most 2",
                            piece.id
                        )))
                    }
                }
            }
            if (corners, edges, interior) != (expected_corners, expected_edges, expected_interior) {
                return Err(SolveError::Validation(format!(
                    "piece geometry ({corners} corner, {edges} edge, {interior} interior) does not \
                     match the {}x{} grid's expected ({expected_corners} corner, {expected_edges} edge, \
                     {expected_interior} interior)",
                    self.rows, self.cols
                )));
            }
        }

        Ok(())
    }

    /// Parse the puzzle text format described in the crate's README: header
    /// comment lines (`#...`) declaring metadata, `PieceFixePosition:` lines
    /// declaring fixed placements, and `id north east south west` lines
    /// declaring pieces.
    pub fn parse(text: &str) -> Result<Puzzle, SolveError> {
        let mut name = String::from("puzzle");
        let mut rows = 0usize;
        let mut cols = 0usize;
        let mut sort_order = SortOrder::Ascending;
        let mut prioritize_borders = false;
        let mut min_depth_to_show = 0usize;
        let mut fixed = Vec::new();
        let mut pieces = Vec::new();

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                let comment = comment.trim();
                if let Some(rest) = comment.strip_prefix("PieceFixePosition:") {
                    fixed.push(parse_fixed_placement(rest.trim())?);
                } else if let Some((key, value)) = comment.split_once(':') {
                    let key = key.trim().to_ascii_lowercase();
                    let value = value.trim();
                    match key.as_str() {
                        "name" => name = value.to_string(),
                        "dimensions" => {
                            let (r, c) = parse_dimensions(value)?;
                            rows = r;
                            cols = c;
                        }
                        "sort" | "sort-order" => {
                            sort_order = match value.to_ascii_lowercase().as_str() {
                                "ascending" => SortOrder::Ascending,
                                "descending" => SortOrder::Descending,
                                other => {
                                    return Err(SolveError::Validation(format!(
                                        "unknown sort order {other:?}"
                                    )))
                                }
                            };
                        }
                        "prioritize-borders" => {
                            prioritize_borders = value.eq_ignore_ascii_case("true");
                        }
                        "min-depth-to-show" => {
                            min_depth_to_show = value.parse().map_err(|_| {
                                SolveError::Validation(format!("invalid min-depth-to-show {value:?}"))
                            })?;
                        }
                        // "type" and "difficulty" are accepted but not acted on by the core.
                        _ => {}
                    }
                }
                continue;
            }

            pieces.push(parse_piece_line(line)?);
        }

        if rows == 0 || cols == 0 {
            return Err(SolveError::Validation(
                "missing or invalid `# dimensions: RxC` header".to_string(),
            ));
        }

        let puzzle = Puzzle {
            name,
            rows,
            cols,
            pieces,
            fixed,
            sort_order,
            prioritize_borders,
            min_depth_to_show,
        };
        puzzle.validate()?;
        Ok(puzzle)
    }

    /// Serialize back to the same text header/piece-line format, for round
    /// trip tests and for humans inspecting generated puzzles.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# name: {}", self.name);
        let _ = writeln!(out, "# dimensions: {}x{}", self.rows, self.cols);
        let _ = writeln!(
            out,
            "# sort: {}",
            match self.sort_order {
                SortOrder::Ascending => "ascending",
                SortOrder::Descending => "descending",
            }
        );
        let _ = writeln!(out, "# prioritize-borders: {}", self.prioritize_borders);
        let _ = writeln!(out, "# min-depth-to-show: {}", self.min_depth_to_show);
        for fixed in &self.fixed {
            let _ = writeln!(
                out,
                "# PieceFixePosition: {} {} {} {}",
                fixed.piece_id, fixed.row, fixed.col, fixed.rotation
            );
        }
        for piece in &self.pieces {
            let _ = writeln!(out, "{piece}");
        }
        out
    }
}

fn parse_dimensions(value: &str) -> Result<(usize, usize), SolveError> {
    let (r, c) = value
        .split_once('x')
        .or_else(|| value.split_once('X'))
        .ok_or_else(|| SolveError::Validation(format!("invalid dimensions {value:?}, expected RxC")))?;
    let rows = r
        .trim()
        .parse()
        .map_err(|_| SolveError::Validation(format!("invalid row count {r:?}")))?;
    let cols = c
        .trim()
        .parse()
        .map_err(|_| SolveError::Validation(format!("invalid column count {c:?}")))?;
    Ok((rows, cols))
}

fn parse_fixed_placement(rest: &str) -> Result<FixedPlacement, SolveError> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(SolveError::Validation(format!(
            "expected `id row col rotation`, got {rest:?}"
        )));
    }
    let parse = |s: &str| -> Result<u32, SolveError> {
        s.parse()
            .map_err(|_| SolveError::Validation(format!("invalid integer {s:?}")))
    };
    Ok(FixedPlacement {
        piece_id: parse(fields[0])?,
        row: parse(fields[1])? as usize,
        col: parse(fields[2])? as usize,
        rotation: parse(fields[3])? as u8,
    })
}

fn parse_piece_line(line: &str) -> Result<Piece, SolveError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(SolveError::Validation(format!(
            "expected `id north east south west`, got {line:?}"
        )));
    }
    let parse = |s: &str| -> Result<Color, SolveError> {
        s.parse()
            .map_err(|_| SolveError::Validation(format!("invalid integer {s:?}")))
    };
    let id: u32 = fields[0]
        .parse()
        .map_err(|_| SolveError::Validation(format!("invalid piece id {:?}", fields[0])))?;
    Ok(Piece::new(id, parse(fields[1])?, parse(fields[2])?, parse(fields[3])?, parse(fields[4])?))
}

/// The expected count of corner pieces (two border edges), edge pieces
/// (one border edge), and interior pieces, for an `rows x cols` grid.
pub fn expected_piece_geometry(rows: usize, cols: usize) -> (usize, usize, usize) {
    let corners = 4;
    let edges = 2 * rows.saturating_sub(2) + 2 * cols.saturating_sub(2);
    let interior = rows * cols - corners - edges;
    (corners, edges, interior)
}

/// Count how many of a piece's base edges equal [`BORDER`].
pub fn border_edge_count(piece: &Piece) -> usize {
    piece.base_edges().iter().filter(|&&c| c == BORDER).count()
}
