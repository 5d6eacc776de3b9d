pub mod board;
pub mod engine;
pub mod search;
pub mod tt;
pub mod uci;
pub mod zobrist;

pub use board::{Board, Color, Move, Piece};
pub use tt::TranspositionTable;

/// Engine name reported over the protocol.
pub const ENGINE_NAME: &str = "Redstart 0.1.0";
/// Engine author reported over the protocol.
pub const ENGINE_AUTHOR: &str = "Redstart developers";
