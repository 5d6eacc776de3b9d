//! Search-thread controller.
//!
//! Owns the single live search worker: starts it, retargets it on
//! `ponderhit`, cancels and joins it on `stop`, and makes sure exactly
//! one `bestmove` line is emitted per search, only after the worker has
//! stopped and the live-task slot has been cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use crate::board::{Board, Move};
use crate::search::{
    EvalWeights, HistoryTable, PvReport, SearchLimits, SearchListener, Searcher, StrengthProfile,
};
use crate::tt::TranspositionTable;
use crate::uci::UciOut;

use super::{book, plan_time, strength, EngineOptions, Params, SearchRequest, TimePlan};

/// Poll interval while holding back the result of a ponder or infinite
/// search that has already finished internally.
const PONDER_POLL_MS: u64 = 10;
/// Depth cap for the only-move fast path.
const ONLY_MOVE_DEPTH: i32 = 2;
/// Extra capacity reserved in the root position-history array.
const ROOT_HISTORY_MARGIN: usize = 200;

/// State shared between the session's successive searches. The worker
/// holds the lock for the duration of a search; the controller touches
/// it only between searches.
struct SearchState {
    tt: TranspositionTable,
    history: HistoryTable,
}

/// The live search task. At most one exists per controller.
struct SearchJob {
    limits: Arc<SearchLimits>,
    pondering: Arc<AtomicBool>,
    infinite: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct SearchController {
    out: UciOut,
    state: Arc<Mutex<SearchState>>,
    job: Arc<Mutex<Option<SearchJob>>>,
    /// Budget computed for the current request; `ponderhit` re-reads it.
    plan: TimePlan,
    /// Set when the current search has fewer than two root moves.
    one_possible_move: bool,
    opts: EngineOptions,
    params: Params,
    /// Per-game seed for weakened play and book move selection.
    random_seed: u64,
}

impl SearchController {
    #[must_use]
    pub fn new(out: UciOut) -> Self {
        let opts = EngineOptions::default();
        SearchController {
            out,
            state: Arc::new(Mutex::new(SearchState {
                tt: TranspositionTable::new(opts.hash_mb),
                history: HistoryTable::new(),
            })),
            job: Arc::new(Mutex::new(None)),
            plan: TimePlan::unbounded(),
            one_possible_move: false,
            opts,
            params: Params::new(),
            random_seed: 0,
        }
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.opts
    }

    #[must_use]
    pub fn is_searching(&self) -> bool {
        self.job.lock().is_some()
    }

    /// Start a normal search for the position reached by applying
    /// `moves` to `base`.
    pub fn start_search(&mut self, base: &Board, moves: &[Move], req: &SearchRequest) {
        self.stop_search();
        let (root, root_history) = setup_position(base, moves);
        self.plan = plan_time(req, root.white_to_move, self.opts.ponder_mode);
        let infinite = self.plan.is_unbounded();
        log::debug!("starting search, plan {:?}", self.plan);
        self.spawn_worker(root, root_history, req.search_moves.clone(), false, infinite);
    }

    /// Start pondering: search without limits, and hold the result back
    /// until `ponderhit` or `stop` arrives.
    pub fn start_ponder(&mut self, base: &Board, moves: &[Move], req: &SearchRequest) {
        self.stop_search();
        let (root, root_history) = setup_position(base, moves);
        self.plan = plan_time(req, root.white_to_move, self.opts.ponder_mode);
        log::debug!("starting ponder, planned budget {:?}", self.plan);
        self.spawn_worker(root, root_history, req.search_moves.clone(), true, false);
    }

    /// The predicted move was played: convert the ponder search into a
    /// normal one by handing it the planned budget. The worker observes
    /// the new limits without restarting.
    pub fn ponder_hit(&mut self) {
        let slot = self.job.lock();
        if let Some(job) = slot.as_ref() {
            if self.one_possible_move {
                // The reply is forced; do not burn clock time on it.
                if self.plan.min_time_ms > 1 {
                    self.plan.min_time_ms = 1;
                }
                if self.plan.max_time_ms > 1 {
                    self.plan.max_time_ms = 1;
                }
            }
            job.limits.set_time(self.plan.min_time_ms, self.plan.max_time_ms);
            job.limits.set_depth(self.plan.max_depth);
            job.limits.set_nodes(self.plan.max_nodes);
            job.infinite.store(self.plan.is_unbounded(), Ordering::Relaxed);
            job.pondering.store(false, Ordering::Relaxed);
            log::debug!("ponder hit, now bounded by {:?}", self.plan);
        }
    }

    /// Cancel the live search (if any) and wait for the worker to
    /// finish. The worker emits its `bestmove` before the join returns;
    /// the job-slot lock is *not* held across the join so the worker's
    /// completion path can take it.
    pub fn stop_search(&mut self) {
        let job = self.job.lock().take();
        if let Some(job) = job {
            job.limits.force_stop();
            job.infinite.store(false, Ordering::Relaxed);
            job.pondering.store(false, Ordering::Relaxed);
            let _ = job.handle.join();
        }
    }

    /// `ucinewgame`: fresh cache, fresh move-ordering history, fresh
    /// randomness for the new game.
    pub fn new_game(&mut self) {
        self.stop_search();
        self.random_seed = rand::thread_rng().gen();
        let mut st = self.state.lock();
        st.tt.clear();
        st.history.clear();
    }

    /// Apply a `setoption` with lower-cased name and value. Unknown
    /// names and malformed values are ignored; a running search keeps
    /// the settings it started with.
    pub fn set_option(&mut self, name: &str, value: &str) {
        match name {
            "hash" => {
                if let Ok(mb) = value.parse::<usize>() {
                    self.opts.hash_mb = mb;
                }
            }
            "ownbook" => self.opts.own_book = value == "true",
            "ponder" => self.opts.ponder_mode = value == "true",
            "uci_analysemode" => self.opts.analyse_mode = value == "true",
            "strength" => {
                if let Ok(v) = value.parse() {
                    self.opts.strength = v;
                }
            }
            "uci_limitstrength" => self.opts.limit_strength = value == "true",
            "uci_elo" => {
                if let Ok(v) = value.parse() {
                    self.opts.elo = v;
                }
            }
            "maxnps" => {
                if let Ok(v) = value.parse() {
                    self.opts.max_nps = v;
                }
            }
            _ => self.params.set(name, value),
        }
    }

    fn eval_weights(&self) -> EvalWeights {
        EvalWeights {
            bishop_pair: self.params.get("bishoppairbonus").unwrap_or(30) as i32,
            tempo: self.params.get("tempobonus").unwrap_or(10) as i32,
            aspiration_window: self.params.get("aspirationwindow").unwrap_or(25) as i32,
        }
    }

    fn spawn_worker(
        &mut self,
        root: Board,
        root_history: Vec<u64>,
        search_moves: Vec<Move>,
        ponder: bool,
        infinite: bool,
    ) {
        let mut plan = self.plan;

        let mut root_moves = root.legal_moves();
        if !search_moves.is_empty() {
            root_moves.retain(|m| search_moves.contains(m));
        }
        self.one_possible_move = false;
        if root_moves.len() < 2 && !infinite {
            self.one_possible_move = true;
            // No choice to deliberate over; a pondering search still
            // runs normally because the position may never be reached.
            if !ponder && (plan.max_depth < 0 || plan.max_depth > ONLY_MOVE_DEPTH) {
                plan.max_depth = ONLY_MOVE_DEPTH;
            }
        }

        let strength_profile = StrengthProfile {
            strength: strength::effective_strength(&self.opts),
            random_seed: self.random_seed,
            max_nps: strength::effective_max_nps(&self.opts),
        };
        let weights = self.eval_weights();

        {
            let mut st = self.state.lock();
            if st.tt.size_mb() != self.opts.hash_mb {
                st.tt.resize(self.opts.hash_mb);
            }
            st.tt.next_generation();
        }

        let limits = if ponder {
            Arc::new(SearchLimits::unbounded())
        } else {
            Arc::new(SearchLimits::new(
                plan.min_time_ms,
                plan.max_time_ms,
                plan.max_depth,
                plan.max_nodes,
            ))
        };
        let pondering = Arc::new(AtomicBool::new(ponder));
        let infinite_flag = Arc::new(AtomicBool::new(infinite));
        let use_book = self.opts.own_book && !self.opts.analyse_mode;
        let seed = self.random_seed;

        let state = Arc::clone(&self.state);
        let worker_slot = Arc::clone(&self.job);
        let out = self.out.clone();
        let worker_limits = Arc::clone(&limits);
        let worker_pondering = Arc::clone(&pondering);
        let worker_infinite = Arc::clone(&infinite_flag);

        // The slot lock is held across the spawn so the worker's
        // completion path cannot observe the slot before the job is in
        // it; a still-occupied slot here means stop/join discipline was
        // violated somewhere and must not be papered over.
        let mut slot = self.job.lock();
        assert!(slot.is_none(), "started a search while a worker was still live");

        let handle = thread::Builder::new()
            .name("search".to_string())
            .spawn(move || {
                let mut best = if use_book {
                    book::book_move(&root, seed)
                } else {
                    None
                };
                if best.is_none() {
                    let mut st = state.lock();
                    let SearchState { tt, history } = &mut *st;
                    let listener: Box<dyn SearchListener> =
                        Box::new(UciListener { out: out.clone() });
                    let mut searcher = Searcher::new(
                        root.clone(),
                        root_history,
                        tt,
                        history,
                        worker_limits,
                        strength_profile,
                        weights,
                        Some(listener),
                    );
                    best = searcher.run(root_moves);
                }

                // A ponder or infinite search may not answer until told
                // to; the move is simply held back.
                while worker_pondering.load(Ordering::Relaxed)
                    || worker_infinite.load(Ordering::Relaxed)
                {
                    thread::sleep(Duration::from_millis(PONDER_POLL_MS));
                }

                let predicted = best.and_then(|mv| {
                    let st = state.lock();
                    ponder_move(&st.tt, &root, mv)
                });

                let mut slot = worker_slot.lock();
                *slot = None;
                match (best, predicted) {
                    (Some(b), Some(p)) => out.line(format_args!("bestmove {b} ponder {p}")),
                    (Some(b), None) => out.line(format_args!("bestmove {b}")),
                    (None, _) => out.line(format_args!("bestmove 0000")),
                }
            })
            .expect("failed to spawn search thread");

        *slot = Some(SearchJob {
            limits,
            pondering,
            infinite: infinite_flag,
            handle,
        });
    }
}

/// Apply the move list to a private copy of the base position and
/// record the hash of every position along the way.
fn setup_position(base: &Board, moves: &[Move]) -> (Board, Vec<u64>) {
    let mut pos = base.clone();
    let mut history = Vec::with_capacity(moves.len() + ROOT_HISTORY_MARGIN);
    for mv in moves {
        history.push(pos.hash());
        pos.make_move(*mv);
    }
    (pos, history)
}

/// Predict the opponent's reply from the transposition cache: play the
/// chosen move, probe the resulting position, and validate the stored
/// move against the fresh legal-move set.
fn ponder_move(tt: &TranspositionTable, pos: &Board, best: Move) -> Option<Move> {
    let mut next = pos.clone();
    next.make_move(best);
    let entry = tt.probe(next.hash())?;
    if entry.packed_move == 0 {
        return None;
    }
    next.legal_moves()
        .into_iter()
        .find(|m| m.packed() == entry.packed_move)
}

/// Formats search progress as protocol `info` lines.
struct UciListener {
    out: UciOut,
}

impl SearchListener for UciListener {
    fn notify_depth(&mut self, depth: i32) {
        self.out.line(format_args!("info depth {depth}"));
    }

    fn notify_curr_move(&mut self, mv: Move, move_nr: usize) {
        self.out
            .line(format_args!("info currmove {mv} currmovenumber {move_nr}"));
    }

    fn notify_pv(&mut self, report: &PvReport) {
        let kind = if report.mate { "mate" } else { "cp" };
        let bound = if report.upper_bound {
            " upperbound"
        } else if report.lower_bound {
            " lowerbound"
        } else {
            ""
        };
        let mut pv = String::new();
        for mv in &report.pv {
            pv.push(' ');
            pv.push_str(&mv.uci());
        }
        self.out.line(format_args!(
            "info depth {} score {} {}{} time {} nodes {} nps {} pv{}",
            report.depth, kind, report.score, bound, report.time_ms, report.nodes, report.nps, pv
        ));
    }

    fn notify_stats(&mut self, nodes: u64, nps: u64, time_ms: u64) {
        self.out
            .line(format_args!("info nodes {nodes} nps {nps} time {time_ms}"));
    }
}
