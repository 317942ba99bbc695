//! Save/restore subsystem (§4.8): text and binary snapshot formats, atomic
//! writes, and the selection rules the Rotator relies on.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::board::{Board, Placement};
use crate::error::SolveError;

/// One entry of the chronological placement order (§3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlacementOrderEntry {
    pub row: usize,
    pub col: usize,
    pub piece_id: u32,
    pub rotation: u8,
}

/// Everything needed to resume a partial solve, or to let the Rotator
/// compare progress across configurations.
#[derive(Clone, Debug)]
pub struct SaveRecord {
    pub timestamp_ms: u64,
    pub puzzle_name: String,
    pub rows: usize,
    pub cols: usize,
    pub depth: usize,
    pub placement_order: Vec<PlacementOrderEntry>,
    /// Canonical snapshot: one entry per currently-occupied cell. May
    /// differ from a naive replay of `placement_order` because
    /// backtracking can remove entries that remain in the order for
    /// history-aware resume (§4.5).
    pub placements: Vec<(usize, usize, Placement)>,
    pub unused_piece_ids: Vec<u32>,
    pub cumulative_compute_time_ms: u64,
    pub ascii_board_dump: Option<String>,
}

impl SaveRecord {
    /// Build a save record from live solver state.
    pub fn capture(
        puzzle_name: &str,
        board: &Board,
        placement_order: &[PlacementOrderEntry],
        unused_piece_ids: &[u32],
        cumulative_compute_time_ms: u64,
        include_ascii_dump: bool,
    ) -> SaveRecord {
        let mut placements = Vec::new();
        for row in 0..board.rows() {
            for col in 0..board.cols() {
                if let Some(placement) = board.get(row, col) {
                    placements.push((row, col, placement));
                }
            }
        }
        let depth = placements.len();

        SaveRecord {
            timestamp_ms: now_epoch_ms(),
            puzzle_name: puzzle_name.to_string(),
            rows: board.rows(),
            cols: board.cols(),
            depth,
            placement_order: placement_order.to_vec(),
            placements,
            unused_piece_ids: unused_piece_ids.to_vec(),
            cumulative_compute_time_ms,
            ascii_board_dump: if include_ascii_dump {
                Some(ascii_dump(board))
            } else {
                None
            },
        }
    }

    /// Rebuild a [`Board`] from this record's canonical placement
    /// snapshot. The resulting board is bit-for-bit what was on the grid
    /// when the record was captured (§8 property 6).
    pub fn to_board(&self) -> Board {
        let mut board = Board::empty(self.rows, self.cols);
        for &(row, col, placement) in &self.placements {
            board.place(row, col, placement);
        }
        board
    }
}

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn ascii_dump(board: &Board) -> String {
    let mut out = String::new();
    for row in 0..board.rows() {
        for col in 0..board.cols() {
            if col > 0 {
                out.push(' ');
            }
            match board.get(row, col) {
                Some(p) => out.push_str(&format!("{}r{}", p.piece_id, p.rotation)),
                None => out.push('.'),
            }
        }
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------
// Text format
// ---------------------------------------------------------------------

pub fn render_text(record: &SaveRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("# timestamp: {}\n", record.timestamp_ms));
    out.push_str(&format!("# puzzle: {}\n", record.puzzle_name));
    out.push_str(&format!("# dimensions: {}x{}\n", record.rows, record.cols));
    out.push_str(&format!("# depth: {}\n", record.depth));
    out.push_str(&format!(
        "# cumulative-compute-ms: {}\n",
        record.cumulative_compute_time_ms
    ));
    if let Some(dump) = &record.ascii_board_dump {
        out.push_str("# board:\n");
        for line in dump.lines() {
            out.push_str("#   ");
            out.push_str(line);
            out.push('\n');
        }
    }

    out.push_str("[placement-order]\n");
    for e in &record.placement_order {
        out.push_str(&format!("{},{} {} {}\n", e.row, e.col, e.piece_id, e.rotation));
    }

    out.push_str("[placements]\n");
    for &(row, col, p) in &record.placements {
        out.push_str(&format!("{row},{col} {} {}\n", p.piece_id, p.rotation));
    }

    out.push_str("[unused]\n");
    let unused: Vec<String> = record.unused_piece_ids.iter().map(u32::to_string).collect();
    out.push_str(&unused.join(" "));
    out.push('\n');

    out
}

pub fn parse_text(text: &str) -> Result<SaveRecord, SolveError> {
    let mut timestamp_ms = 0u64;
    let mut puzzle_name = String::new();
    let mut rows = 0usize;
    let mut cols = 0usize;
    let mut cumulative_compute_time_ms = 0u64;

    let mut placement_order = Vec::new();
    let mut placements = Vec::new();
    let mut unused_piece_ids = Vec::new();

    #[derive(PartialEq)]
    enum Section {
        Header,
        PlacementOrder,
        Placements,
        Unused,
    }
    let mut section = Section::Header;

    let bad = |msg: &str| SolveError::Corrupt(msg.to_string());

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('#') {
            let comment = trimmed.trim_start_matches('#').trim();
            if let Some((key, value)) = comment.split_once(':') {
                match key.trim() {
                    "timestamp" => timestamp_ms = value.trim().parse().map_err(|_| bad("bad timestamp"))?,
                    "puzzle" => puzzle_name = value.trim().to_string(),
                    "dimensions" => {
                        let (r, c) = value
                            .trim()
                            .split_once('x')
                            .ok_or_else(|| bad("bad dimensions"))?;
                        rows = r.parse().map_err(|_| bad("bad rows"))?;
                        cols = c.parse().map_err(|_| bad("bad cols"))?;
                    }
                    "cumulative-compute-ms" => {
                        cumulative_compute_time_ms =
                            value.trim().parse().map_err(|_| bad("bad cumulative time"))?
                    }
                    _ => {}
                }
            }
            continue;
        }

        match trimmed {
            "[placement-order]" => {
                section = Section::PlacementOrder;
                continue;
            }
            "[placements]" => {
                section = Section::Placements;
                continue;
            }
            "[unused]" => {
                section = Section::Unused;
                continue;
            }
            _ => {}
        }

        match section {
            Section::Header => return Err(bad("data line before any section header")),
            Section::PlacementOrder => {
                let (row, col, piece_id, rotation) = parse_placement_line(trimmed)?;
                placement_order.push(PlacementOrderEntry { row, col, piece_id, rotation });
            }
            Section::Placements => {
                let (row, col, piece_id, rotation) = parse_placement_line(trimmed)?;
                placements.push((
                    row,
                    col,
                    Placement {
                        piece_id,
                        rotation,
                        // Edges are not persisted directly; re-derive them
                        // lazily is the caller's job once pieces are known.
                        // Here we store rotation-only placements and leave
                        // edges empty; `SaveRecord::to_board` is only used
                        // by callers that re-resolve edges via the piece
                        // table before placing. See `resolve_edges`.
                        edges: [0; 4],
                    },
                ));
            }
            Section::Unused => {
                for tok in trimmed.split_whitespace() {
                    unused_piece_ids.push(tok.parse().map_err(|_| bad("bad unused piece id"))?);
                }
            }
        }
    }

    if rows == 0 || cols == 0 {
        return Err(bad("missing dimensions header"));
    }

    let depth = placements.len();

    Ok(SaveRecord {
        timestamp_ms,
        puzzle_name,
        rows,
        cols,
        depth,
        placement_order,
        placements,
        unused_piece_ids,
        cumulative_compute_time_ms,
        ascii_board_dump: None,
    })
}

/// Re-derive each placement's rotated edge tuple from a piece table. The
/// text/binary formats only persist `(piece_id, rotation)`; edges are a
/// pure function of those plus the piece set, so storing them again would
/// just be redundant bytes.
pub fn resolve_edges(record: &mut SaveRecord, pieces: &std::collections::HashMap<u32, crate::piece::Piece>) {
    for (_, _, placement) in record.placements.iter_mut() {
        if let Some(piece) = pieces.get(&placement.piece_id) {
            placement.edges = piece.rotated_edges(placement.rotation);
        }
    }
}

fn parse_placement_line(line: &str) -> Result<(usize, usize, u32, u8), SolveError> {
    let bad = || SolveError::Corrupt(format!("malformed placement line {line:?}"));
    let (coord, rest) = line.split_once(' ').ok_or_else(bad)?;
    let (row, col) = coord.split_once(',').ok_or_else(bad)?;
    let mut fields = rest.split_whitespace();
    let piece_id = fields.next().ok_or_else(bad)?;
    let rotation = fields.next().ok_or_else(bad)?;
    Ok((
        row.parse().map_err(|_| bad())?,
        col.parse().map_err(|_| bad())?,
        piece_id.parse().map_err(|_| bad())?,
        rotation.parse().map_err(|_| bad())?,
    ))
}

// ---------------------------------------------------------------------
// Binary format: compact, little-endian, zstd-compressed on disk.
// ---------------------------------------------------------------------

const BINARY_MAGIC: u32 = 0x4532_5342; // "E2SB"
const BINARY_VERSION: u16 = 1;

pub fn render_binary(record: &SaveRecord) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&BINARY_MAGIC.to_le_bytes());
    raw.extend_from_slice(&BINARY_VERSION.to_le_bytes());
    raw.extend_from_slice(&(record.rows as u16).to_le_bytes());
    raw.extend_from_slice(&(record.cols as u16).to_le_bytes());
    raw.extend_from_slice(&(record.depth as u32).to_le_bytes());
    raw.extend_from_slice(&record.timestamp_ms.to_le_bytes());
    raw.extend_from_slice(&record.cumulative_compute_time_ms.to_le_bytes());

    raw.extend_from_slice(&(record.placement_order.len() as u32).to_le_bytes());
    for e in &record.placement_order {
        raw.extend_from_slice(&(e.row as u16).to_le_bytes());
        raw.extend_from_slice(&(e.col as u16).to_le_bytes());
        raw.extend_from_slice(&e.piece_id.to_le_bytes());
        raw.push(e.rotation);
    }

    raw.extend_from_slice(&(record.unused_piece_ids.len() as u32).to_le_bytes());
    for &id in &record.unused_piece_ids {
        raw.extend_from_slice(&id.to_le_bytes());
    }

    zstd::encode_all(raw.as_slice(), 0).unwrap_or(raw)
}

pub fn parse_binary(bytes: &[u8]) -> Result<SaveRecord, SolveError> {
    let decompressed = zstd::decode_all(bytes).map_err(|e| SolveError::Corrupt(e.to_string()))?;
    let mut cursor = decompressed.as_slice();

    let bad = || SolveError::Corrupt("truncated binary save".to_string());

    let magic = take_u32(&mut cursor).ok_or_else(bad)?;
    if magic != BINARY_MAGIC {
        return Err(SolveError::Corrupt("bad magic number".to_string()));
    }
    let version = take_u16(&mut cursor).ok_or_else(bad)?;
    if version != BINARY_VERSION {
        return Err(SolveError::Corrupt(format!("unsupported version {version}")));
    }

    let rows = take_u16(&mut cursor).ok_or_else(bad)? as usize;
    let cols = take_u16(&mut cursor).ok_or_else(bad)? as usize;
    let depth = take_u32(&mut cursor).ok_or_else(bad)? as usize;
    let timestamp_ms = take_u64(&mut cursor).ok_or_else(bad)?;
    let cumulative_compute_time_ms = take_u64(&mut cursor).ok_or_else(bad)?;

    let order_count = take_u32(&mut cursor).ok_or_else(bad)? as usize;
    let mut placement_order = Vec::with_capacity(order_count);
    for _ in 0..order_count {
        let row = take_u16(&mut cursor).ok_or_else(bad)? as usize;
        let col = take_u16(&mut cursor).ok_or_else(bad)? as usize;
        let piece_id = take_u32(&mut cursor).ok_or_else(bad)?;
        let rotation = take_u8(&mut cursor).ok_or_else(bad)?;
        placement_order.push(PlacementOrderEntry { row, col, piece_id, rotation });
    }

    let unused_count = take_u32(&mut cursor).ok_or_else(bad)? as usize;
    let mut unused_piece_ids = Vec::with_capacity(unused_count);
    for _ in 0..unused_count {
        unused_piece_ids.push(take_u32(&mut cursor).ok_or_else(bad)?);
    }

    Ok(SaveRecord {
        timestamp_ms,
        puzzle_name: String::new(),
        rows,
        cols,
        depth,
        placement_order,
        placements: Vec::new(),
        unused_piece_ids,
        cumulative_compute_time_ms,
        ascii_board_dump: None,
    })
}

fn take_u8(cursor: &mut &[u8]) -> Option<u8> {
    let (&first, rest) = cursor.split_first()?;
    *cursor = rest;
    Some(first)
}

fn take_u16(cursor: &mut &[u8]) -> Option<u16> {
    if cursor.len() < 2 {
        return None;
    }
    let (bytes, rest) = cursor.split_at(2);
    *cursor = rest;
    Some(u16::from_le_bytes(bytes.try_into().ok()?))
}

fn take_u32(cursor: &mut &[u8]) -> Option<u32> {
    if cursor.len() < 4 {
        return None;
    }
    let (bytes, rest) = cursor.split_at(4);
    *cursor = rest;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn take_u64(cursor: &mut &[u8]) -> Option<u64> {
    if cursor.len() < 8 {
        return None;
    }
    let (bytes, rest) = cursor.split_at(8);
    *cursor = rest;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

// ---------------------------------------------------------------------
// Disk layout, atomic writes, selection rules (§4.8).
// ---------------------------------------------------------------------

/// The puzzle-family subdirectory a given puzzle name belongs to: the
/// portion of the name before the first `_`, or the whole name if there is
/// none (e.g. `eternity2_corner03` -> `eternity2`).
pub fn family_of(puzzle_name: &str) -> &str {
    puzzle_name.split('_').next().unwrap_or(puzzle_name)
}

pub fn family_dir(save_root: &Path, puzzle_name: &str) -> PathBuf {
    save_root.join(family_of(puzzle_name))
}

/// Atomically write `contents` to `final_path`: write to a sibling temp
/// file, `fsync`, then `rename`. Never leaves a partially-written file at
/// `final_path` (§4.8 "Write atomicity").
fn write_atomic(final_path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = final_path.with_extension(format!(
        "tmp-{}-{}",
        std::process::id(),
        now_epoch_ms()
    ));

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, final_path)
}

/// Write a "current" snapshot, unlinking any older current snapshot for
/// the same puzzle configuration first.
pub fn write_current(save_root: &Path, record: &SaveRecord, binary: bool) -> io::Result<PathBuf> {
    let dir = family_dir(save_root, &record.puzzle_name);
    let ext = if binary { "bin" } else { "txt" };
    let path = dir.join(format!(
        "{}_current_{}.{ext}",
        record.puzzle_name, record.timestamp_ms
    ));

    let contents = if binary {
        render_binary(record)
    } else {
        render_text(record).into_bytes()
    };
    write_atomic(&path, &contents)?;

    for stale in list_current_saves(save_root, &record.puzzle_name)? {
        if stale != path {
            let _ = fs::remove_file(stale);
        }
    }

    Ok(path)
}

/// Write a "best" record, keeping only the top `keep` by depth.
pub fn write_best(save_root: &Path, record: &SaveRecord, keep: usize) -> io::Result<PathBuf> {
    let dir = family_dir(save_root, &record.puzzle_name);
    let path = dir.join(format!("{}_best_{}.txt", record.puzzle_name, record.depth));
    write_atomic(&path, render_text(record).as_bytes())?;

    let mut best_saves = list_best_saves(save_root, &record.puzzle_name)?;
    best_saves.sort_by(|a, b| b.1.cmp(&a.1));
    for (stale_path, _) in best_saves.into_iter().skip(keep) {
        let _ = fs::remove_file(stale_path);
    }

    Ok(path)
}

fn list_current_saves(save_root: &Path, puzzle_name: &str) -> io::Result<Vec<PathBuf>> {
    let dir = family_dir(save_root, puzzle_name);
    let prefix = format!("{puzzle_name}_current_");
    list_matching(&dir, &prefix)
}

fn list_best_saves(save_root: &Path, puzzle_name: &str) -> io::Result<Vec<(PathBuf, usize)>> {
    let dir = family_dir(save_root, puzzle_name);
    let prefix = format!("{puzzle_name}_best_");
    let mut out = Vec::new();
    for path in list_matching(&dir, &prefix)? {
        if let Some(depth) = depth_from_best_filename(&path, &prefix) {
            out.push((path, depth));
        }
    }
    Ok(out)
}

fn depth_from_best_filename(path: &Path, prefix: &str) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(prefix)?.parse().ok()
}

fn list_matching(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(prefix) {
                out.push(entry.path());
            }
        }
    }
    Ok(out)
}

/// The "least cumulative compute time" current save for a puzzle
/// configuration, per §4.8's selection rule (this — not wall-clock
/// freshness — is what makes the Rotator prefer least-advanced
/// configurations). Falls back to a legacy `<puzzle>_current.txt` if no
/// new-style file exists.
pub fn find_current_save(save_root: &Path, puzzle_name: &str) -> io::Result<Option<SaveRecord>> {
    let candidates = list_current_saves(save_root, puzzle_name)?;

    let mut best: Option<SaveRecord> = None;
    for path in candidates {
        let record = match read_save_file(&path) {
            Ok(r) => r,
            Err(_) => continue,
        };
        best = Some(match best {
            None => record,
            Some(current) => {
                if (record.cumulative_compute_time_ms, record.timestamp_ms)
                    < (current.cumulative_compute_time_ms, current.timestamp_ms)
                {
                    record
                } else {
                    current
                }
            }
        });
    }

    if best.is_some() {
        return Ok(best);
    }

    let legacy = save_root.join(format!("{puzzle_name}_current.txt"));
    if legacy.exists() {
        if let Ok(record) = read_save_file(&legacy) {
            return Ok(Some(record));
        }
    }

    Ok(None)
}

/// All `<puzzle>_best_*` records, sorted by depth descending.
pub fn find_all_best_saves(save_root: &Path, puzzle_name: &str) -> io::Result<Vec<SaveRecord>> {
    let mut records: Vec<SaveRecord> = list_best_saves(save_root, puzzle_name)?
        .into_iter()
        .filter_map(|(path, _)| read_save_file(&path).ok())
        .collect();
    records.sort_by(|a, b| b.depth.cmp(&a.depth));
    Ok(records)
}

fn read_save_file(path: &Path) -> Result<SaveRecord, SolveError> {
    let mut file = File::open(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("bin") {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        parse_binary(&bytes)
    } else {
        let reader = BufReader::new(file);
        let mut text = String::new();
        for line in reader.lines() {
            text.push_str(&line?);
            text.push('\n');
        }
        parse_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Placement;

    fn sample_record(puzzle: &str, cumulative_ms: u64) -> SaveRecord {
        let mut board = Board::empty(1, 2);
        board.place(
            0,
            0,
            Placement { piece_id: 1, rotation: 0, edges: [0, 1, 0, 0] },
        );
        SaveRecord::capture(
            puzzle,
            &board,
            &[PlacementOrderEntry { row: 0, col: 0, piece_id: 1, rotation: 0 }],
            &[2],
            cumulative_ms,
            true,
        )
    }

    #[test]
    fn text_round_trips_placements_and_unused() {
        let record = sample_record("p", 500);
        let text = render_text(&record);
        let parsed = parse_text(&text).unwrap();
        assert_eq!(parsed.rows, record.rows);
        assert_eq!(parsed.cols, record.cols);
        assert_eq!(parsed.placements.len(), record.placements.len());
        assert_eq!(parsed.unused_piece_ids, record.unused_piece_ids);
        assert_eq!(parsed.cumulative_compute_time_ms, 500);
    }

    #[test]
    fn binary_round_trips_placement_order_and_unused() {
        let record = sample_record("p", 900);
        let bytes = render_binary(&record);
        let parsed = parse_binary(&bytes).unwrap();
        assert_eq!(parsed.placement_order, record.placement_order);
        assert_eq!(parsed.unused_piece_ids, record.unused_piece_ids);
        assert_eq!(parsed.depth, record.depth);
    }

    #[test]
    fn family_of_splits_on_first_underscore() {
        assert_eq!(family_of("eternity2_corner03"), "eternity2");
        assert_eq!(family_of("solo"), "solo");
    }

    #[test]
    fn write_current_keeps_only_the_latest_file() {
        let dir = tempfile::tempdir().unwrap();
        let record_a = sample_record("pz", 1000);
        let path_a = write_current(dir.path(), &record_a, false).unwrap();
        assert!(path_a.exists());

        let mut record_b = sample_record("pz", 500);
        record_b.timestamp_ms = record_a.timestamp_ms + 1;
        let path_b = write_current(dir.path(), &record_b, false).unwrap();

        assert!(!path_a.exists());
        assert!(path_b.exists());
    }

    #[test]
    fn find_current_save_prefers_least_cumulative_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut record_a = sample_record("pz", 2000);
        record_a.timestamp_ms = 1;
        let mut record_b = sample_record("pz", 100);
        record_b.timestamp_ms = 2;

        // Write both "current" snapshots under distinct timestamps so
        // neither write_current call unlinks the other (they'd collide in
        // a real single-configuration flow, but this test exercises
        // selection across files directly).
        let dir_path = family_dir(dir.path(), "pz");
        fs::create_dir_all(&dir_path).unwrap();
        fs::write(
            dir_path.join(format!("pz_current_{}.txt", record_a.timestamp_ms)),
            render_text(&record_a),
        )
        .unwrap();
        fs::write(
            dir_path.join(format!("pz_current_{}.txt", record_b.timestamp_ms)),
            render_text(&record_b),
        )
        .unwrap();

        let found = find_current_save(dir.path(), "pz").unwrap().unwrap();
        assert_eq!(found.cumulative_compute_time_ms, 100);
    }

    #[test]
    fn best_saves_sorted_by_depth_descending() {
        let dir = tempfile::tempdir().unwrap();
        let mut shallow = sample_record("pz", 10);
        shallow.depth = 3;
        let mut deep = sample_record("pz", 10);
        deep.depth = 9;

        write_best(dir.path(), &shallow, 5).unwrap();
        write_best(dir.path(), &deep, 5).unwrap();

        let found = find_all_best_saves(dir.path(), "pz").unwrap();
        assert_eq!(found[0].depth, 9);
    }
}
