//! Built-in opening book.
//!
//! A small set of replies for early standard-opening positions, keyed by
//! zobrist hash. Consulted only when the OwnBook option is on and the
//! engine is not in analysis mode; a miss falls through to search.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::board::{Board, Move};
use crate::zobrist::mix64;

/// Opening lines: moves leading to a position, then the book replies.
const BOOK_LINES: &[(&[&str], &[&str])] = &[
    (&[], &["e2e4", "d2d4", "c2c4", "g1f3"]),
    (&["e2e4"], &["e7e5", "c7c5", "e7e6", "c7c6"]),
    (&["d2d4"], &["g8f6", "d7d5"]),
    (&["c2c4"], &["e7e5", "g8f6", "c7c5"]),
    (&["g1f3"], &["d7d5", "g8f6", "c7c5"]),
    (&["e2e4", "e7e5"], &["g1f3"]),
    (&["e2e4", "c7c5"], &["g1f3", "b1c3"]),
    (&["e2e4", "e7e6"], &["d2d4"]),
    (&["e2e4", "c7c6"], &["d2d4"]),
    (&["d2d4", "d7d5"], &["c2c4", "g1f3"]),
    (&["d2d4", "g8f6"], &["c2c4", "g1f3"]),
    (&["e2e4", "e7e5", "g1f3"], &["b8c6"]),
    (&["e2e4", "e7e5", "g1f3", "b8c6"], &["f1b5", "f1c4"]),
];

static BOOK: Lazy<HashMap<u64, Vec<Move>>> = Lazy::new(|| {
    let mut book = HashMap::new();
    for (line, replies) in BOOK_LINES {
        let mut pos = Board::new();
        let mut valid = true;
        for token in *line {
            match pos.parse_move(token) {
                Ok(mv) => pos.make_move(mv),
                Err(_) => {
                    valid = false;
                    break;
                }
            }
        }
        if !valid {
            continue;
        }
        let moves: Vec<Move> = replies
            .iter()
            .filter_map(|token| pos.parse_move(token).ok())
            .collect();
        if !moves.is_empty() {
            book.insert(pos.hash(), moves);
        }
    }
    book
});

/// Pick a book reply for the position, if one is known. The choice is
/// deterministic for a given position and per-game seed.
#[must_use]
pub fn book_move(pos: &Board, seed: u64) -> Option<Move> {
    let replies = BOOK.get(&pos.hash())?;
    let idx = (mix64(seed ^ pos.hash()) % replies.len() as u64) as usize;
    Some(replies[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_has_a_book_move() {
        let board = Board::new();
        let mv = book_move(&board, 1).expect("startpos should be in book");
        assert!(board.legal_moves().contains(&mv));
    }

    #[test]
    fn pick_is_deterministic_per_seed() {
        let board = Board::new();
        assert_eq!(book_move(&board, 42), book_move(&board, 42));
    }

    #[test]
    fn middlegame_positions_miss_the_book() {
        let middlegame =
            Board::try_from_fen("r2q1rk1/ppp2ppp/2np1n2/2b1p3/2B1P3/2NP1N2/PPP2PPP/R1BQ1RK1 w - - 0 8")
                .unwrap();
        assert!(book_move(&middlegame, 0).is_none());
    }

    #[test]
    fn every_line_builds_and_stores_replies() {
        for (hash, moves) in BOOK.iter() {
            assert!(!moves.is_empty(), "empty reply list for {hash:#x}");
        }
        assert_eq!(BOOK.len(), BOOK_LINES.len());
    }
}
