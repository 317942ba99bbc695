//! Cell and value ordering: MRV, singleton detection, and least-constraining
//! value (§4.4).

use crate::board::{opposite_side, Board};
use crate::domain::DomainManager;
use crate::edge_index::Candidate;
use crate::piece::Side;
use crate::puzzle::SortOrder;

/// Scan every empty cell for one with exactly one feasible candidate.
/// Singletons are placed ahead of any MRV decision (§4.4) because they
/// involve no real choice.
pub fn find_singleton(board: &Board, domains: &DomainManager) -> Option<(usize, usize, Candidate)> {
    for row in 0..domains.rows() {
        for col in 0..domains.cols() {
            if !board.is_empty_cell(row, col) {
                continue;
            }
            let domain = domains.domain(row, col);
            if domain.len() == 1 {
                return Some((row, col, domain[0]));
            }
        }
    }
    None
}

/// Minimum-Remaining-Values cell selection, with the tie-break chain from
/// §4.4: border-first (if enabled), then most occupied neighbors, then
/// lexicographic `(row, col)`.
pub fn select_cell_mrv(
    board: &Board,
    domains: &DomainManager,
    prioritize_borders: bool,
) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut best_key: Option<(usize, bool, usize)> = None;

    for row in 0..domains.rows() {
        for col in 0..domains.cols() {
            if !board.is_empty_cell(row, col) {
                continue;
            }
            let remaining = domains.domain(row, col).len();
            let is_border = prioritize_borders && is_border_cell(board, row, col);
            let occupied_neighbors = count_occupied_neighbors(board, row, col);

            // Lower remaining wins; then border cells before interior
            // (encoded as `!is_border` so `false < true` sorts borders
            // first); then *more* occupied neighbors wins (so negate it).
            let key = (remaining, !is_border, usize::MAX - occupied_neighbors);

            let better = match best_key {
                None => true,
                Some(current) => key < current,
            };

            if better {
                best_key = Some(key);
                best = Some((row, col));
            }
        }
    }

    best
}

fn is_border_cell(board: &Board, row: usize, col: usize) -> bool {
    let [n, e, s, w] = board.boundary_sides(row, col);
    n || e || s || w
}

fn count_occupied_neighbors(board: &Board, row: usize, col: usize) -> usize {
    Side::ALL
        .iter()
        .filter(|&&side| {
            board
                .neighbor(row, col, side)
                .map(|(r, c)| !board.is_empty_cell(r, c))
                .unwrap_or(false)
        })
        .count()
}

/// Order a cell's candidates by least-constraining-value: the candidate
/// that leaves empty neighbors with the most remaining options overall is
/// tried first.  Ties are broken by the pre-sort order established by
/// [`SortOrder`] (ascending/descending piece id), matching §4.4's
/// "deterministic tie-break by `(pieceId, rotation)`".
pub fn order_candidates_lcv(
    board: &Board,
    domains: &DomainManager,
    row: usize,
    col: usize,
    sort_order: SortOrder,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = domains.domain(row, col).to_vec();

    candidates.sort_by(|a, b| match sort_order {
        SortOrder::Ascending => a.cmp(b),
        SortOrder::Descending => b.cmp(a),
    });

    let scores: Vec<(Candidate, usize)> = candidates
        .iter()
        .map(|&candidate| (candidate, lcv_score(board, domains, row, col, candidate)))
        .collect();

    // Stable sort: candidates with equal score keep the pre-sort order
    // established above.
    let mut scored = scores;
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    scored.into_iter().map(|(c, _)| c).collect()
}

/// Like [`order_candidates_lcv`], but with a specific `forced` candidate
/// pinned to the front. Per §8 property 11, backtracking over a replayed
/// placement must try the *same piece*'s remaining rotations before any
/// other piece, so those are pulled out of the normal LCV order and placed
/// immediately behind `forced` (ordered by rotation), ahead of everything
/// else.
pub fn order_candidates_lcv_with_forced(
    board: &Board,
    domains: &DomainManager,
    row: usize,
    col: usize,
    sort_order: SortOrder,
    forced: Candidate,
) -> Vec<Candidate> {
    let mut rest = order_candidates_lcv(board, domains, row, col, sort_order);
    rest.retain(|&c| c != forced);

    let (forced_piece, forced_rotation) = forced;
    let mut same_piece_later = Vec::new();
    rest.retain(|&(piece_id, rotation)| {
        if piece_id == forced_piece && rotation > forced_rotation {
            same_piece_later.push((piece_id, rotation));
            false
        } else {
            true
        }
    });
    same_piece_later.sort_by_key(|&(_, rotation)| rotation);

    let mut ordered = Vec::with_capacity(1 + same_piece_later.len() + rest.len());
    ordered.push(forced);
    ordered.extend(same_piece_later);
    ordered.extend(rest);
    ordered
}

fn lcv_score(
    board: &Board,
    domains: &DomainManager,
    row: usize,
    col: usize,
    candidate: Candidate,
) -> usize {
    let (piece_id, rotation) = candidate;
    let piece = domains.piece(piece_id);
    let edges = piece.rotated_edges(rotation);

    let mut total = 0;
    for &side in &Side::ALL {
        let Some((nr, nc)) = board.neighbor(row, col, side) else { continue };
        if !board.is_empty_cell(nr, nc) {
            continue;
        }

        let required_color = edges[side as usize];
        let opposite = opposite_side(side);

        total += domains
            .domain(nr, nc)
            .iter()
            .filter(|&&(id, rot)| {
                id != piece_id && domains.piece(id).rotated_edge(opposite, rot) == required_color
            })
            .count();
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_index::EdgeIndex;
    use crate::piece::{Piece, BORDER};

    #[test]
    fn singleton_detected_for_fully_constrained_corner() {
        let pieces = vec![Piece::new(1, BORDER, 5, 5, BORDER)];
        let board = Board::empty(1, 1);
        let edge_index = EdgeIndex::build(&pieces);
        let mut domains = DomainManager::new(1, 1, &pieces);
        domains.initialize(&board, &edge_index, &[1]);

        let singleton = find_singleton(&board, &domains);
        assert_eq!(singleton, Some((0, 0, (1, 0))));
    }

    #[test]
    fn forced_ordering_groups_the_same_pieces_later_rotations_first() {
        // At the middle cell of an empty 1x3 row (north/south bordered,
        // east/west open), piece 1 (north == south, east != west) has two
        // border-feasible rotations (0 and 2); piece 2 has only one.
        // Forcing piece 1 rotation 0 must put piece 1 rotation 2
        // immediately next, ahead of piece 2 entirely, regardless of LCV
        // score (§8 property 11).
        let pieces = vec![Piece::new(1, BORDER, 5, BORDER, 7), Piece::new(2, BORDER, 9, BORDER, 9)];
        let board = Board::empty(1, 3);
        let edge_index = EdgeIndex::build(&pieces);
        let mut domains = DomainManager::new(1, 3, &pieces);
        domains.initialize(&board, &edge_index, &[1, 2]);

        let ordered = order_candidates_lcv_with_forced(&board, &domains, 0, 1, SortOrder::Ascending, (1, 0));
        assert_eq!(ordered[0], (1, 0));
        assert_eq!(ordered[1], (1, 2));
        assert!(ordered[2..].iter().all(|&(id, _)| id == 2));
    }

    #[test]
    fn mrv_prefers_smallest_domain() {
        let pieces = vec![
            Piece::new(1, BORDER, 5, BORDER, BORDER),
            Piece::new(2, BORDER, BORDER, BORDER, 5),
        ];
        let board = Board::empty(1, 2);
        let edge_index = EdgeIndex::build(&pieces);
        let mut domains = DomainManager::new(1, 2, &pieces);
        domains.initialize(&board, &edge_index, &[1, 2]);

        // Both cells are singletons here, but the call must still resolve
        // deterministically.
        let cell = select_cell_mrv(&board, &domains, false);
        assert!(cell.is_some());
    }
}
