//! Search-thread controller and its supporting pieces: time budgeting,
//! strength emulation, the tunable parameter table and the opening book.

pub mod book;
mod controller;
pub mod params;
pub mod strength;
pub mod time;

pub use controller::SearchController;
pub use params::Params;
pub use time::{plan_time, TimePlan};

use crate::board::Move;
use crate::tt::DEFAULT_TT_MB;
use crate::uci::UciOut;
use crate::{ENGINE_AUTHOR, ENGINE_NAME};

/// Everything a `go` command said about one search. Built once per
/// command and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// If non-empty, restrict the root to these moves.
    pub search_moves: Vec<Move>,
    pub wtime: i64,
    pub btime: i64,
    pub winc: i64,
    pub binc: i64,
    /// Moves to the next time control; 0 = unknown.
    pub moves_to_go: i64,
    /// Fixed depth limit; 0 = unset.
    pub depth: i32,
    /// Node limit; 0 = unset.
    pub nodes: i64,
    /// Mate-in-x request; 0 = unset.
    pub mate: i32,
    /// Exact time per move in ms; 0 = unset.
    pub move_time: i64,
    pub infinite: bool,
}

/// Fixed engine options settable over the protocol.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub hash_mb: usize,
    pub own_book: bool,
    /// Whether the GUI may ponder; shrinks the assumed move horizon.
    pub ponder_mode: bool,
    pub analyse_mode: bool,
    pub strength: i32,
    pub limit_strength: bool,
    pub elo: i32,
    pub max_nps: i64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            hash_mb: DEFAULT_TT_MB,
            own_book: false,
            ponder_mode: true,
            analyse_mode: false,
            strength: 1000,
            limit_strength: false,
            elo: i32::MAX,
            max_nps: 0,
        }
    }
}

/// Emit the full option list: fixed options with their defaults, then
/// the tunable parameter table.
pub fn write_options(out: &UciOut, params: &Params) {
    out.line(format_args!(
        "option name Hash type spin default {DEFAULT_TT_MB} min 1 max 2048"
    ));
    out.line(format_args!("option name OwnBook type check default false"));
    out.line(format_args!("option name Ponder type check default true"));
    out.line(format_args!(
        "option name UCI_AnalyseMode type check default false"
    ));
    out.line(format_args!(
        "option name UCI_EngineAbout type string default {ENGINE_NAME} by {ENGINE_AUTHOR}"
    ));
    out.line(format_args!(
        "option name Strength type spin default 1000 min 0 max 1000"
    ));
    out.line(format_args!(
        "option name UCI_LimitStrength type check default false"
    ));
    out.line(format_args!(
        "option name UCI_Elo type spin default 1500 min -625 max 2400"
    ));
    out.line(format_args!(
        "option name maxNPS type spin default 0 min 0 max 10000000"
    ));
    for param in params.iter() {
        out.line(format_args!(
            "option name {} type spin default {} min {} max {}",
            param.name, param.default, param.min, param.max
        ));
    }
}
