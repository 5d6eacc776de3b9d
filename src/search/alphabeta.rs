//! Iterative deepening alpha-beta search.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::board::{Board, Move};
use crate::tt::{Bound, TranspositionTable};
use crate::zobrist::mix64;

use super::eval::{evaluate, PIECE_VALUES};
use super::{
    EvalWeights, HistoryTable, PvReport, SearchLimits, SearchListener, StrengthProfile, INFINITY,
    MATE_SCORE, MATE_THRESHOLD, MAX_PLY,
};

/// Nodes between checks of the shared limit object.
const NODES_BETWEEN_CHECKS: i32 = 1024;
/// Minimum interval between periodic stats reports.
const STATS_INTERVAL_MS: u64 = 1000;
/// Root currmove reporting starts after this much search time.
const CURRMOVE_DELAY_MS: u64 = 1000;
/// Longest single sleep when enforcing a node-rate cap.
const THROTTLE_SLEEP_MS: u64 = 10;

/// Search was told to stop; unwinds the recursion.
struct Interrupted;

type SearchStep<T> = Result<T, Interrupted>;

pub struct Searcher<'a> {
    root: Board,
    /// Hashes of positions before the root, for repetition detection.
    root_history: Vec<u64>,
    tt: &'a mut TranspositionTable,
    history: &'a mut HistoryTable,
    limits: Arc<SearchLimits>,
    listener: Option<Box<dyn SearchListener>>,
    strength: StrengthProfile,
    weights: EvalWeights,
    start: Instant,
    nodes: u64,
    check_countdown: i32,
    last_stats_ms: u64,
    /// Hashes of positions on the current line, root included.
    path: Vec<u64>,
}

impl<'a> Searcher<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root: Board,
        root_history: Vec<u64>,
        tt: &'a mut TranspositionTable,
        history: &'a mut HistoryTable,
        limits: Arc<SearchLimits>,
        strength: StrengthProfile,
        weights: EvalWeights,
        listener: Option<Box<dyn SearchListener>>,
    ) -> Self {
        Searcher {
            root,
            root_history,
            tt,
            history,
            limits,
            listener,
            strength,
            weights,
            start: Instant::now(),
            nodes: 0,
            check_countdown: NODES_BETWEEN_CHECKS,
            last_stats_ms: 0,
            path: Vec::with_capacity(MAX_PLY as usize + 1),
        }
    }

    /// Run iterative deepening over the given root moves and return the
    /// best move found, or `None` when there are no root moves at all.
    pub fn run(&mut self, mut root_moves: Vec<Move>) -> Option<Move> {
        if root_moves.is_empty() {
            return None;
        }
        self.filter_weak_root_moves(&mut root_moves);
        self.start = Instant::now();

        let mut best = root_moves[0];
        let mut best_score = 0;

        let mut depth = 1;
        while depth <= MAX_PLY {
            let depth_limit = self.limits.max_depth();
            if depth_limit >= 0 && depth > depth_limit {
                break;
            }
            self.notify(|l| l.notify_depth(depth));

            let completed =
                self.search_root(&root_moves, depth, best_score, &mut best, &mut best_score);
            if completed.is_err() {
                break;
            }

            // Keep the best move in front for the next iteration.
            if let Some(idx) = root_moves.iter().position(|m| *m == best) {
                root_moves.remove(idx);
                root_moves.insert(0, best);
            }

            // A timed search that already used its minimum budget should
            // not start another, deeper iteration.
            let max_time = self.limits.max_time_ms();
            if max_time >= 0 && self.elapsed_ms() as i64 >= self.limits.min_time_ms().max(0) {
                break;
            }
            let node_limit = self.limits.max_nodes();
            if node_limit >= 0 && self.nodes as i64 >= node_limit {
                break;
            }
            if best_score.abs() > MATE_THRESHOLD && depth >= MATE_SCORE - best_score.abs() {
                // Shortest mate already proven; deeper search cannot improve it.
                break;
            }
            depth += 1;
        }

        self.send_stats();
        Some(best)
    }

    /// One root-level pass at `depth`, with an aspiration window around
    /// the previous score. `best`/`best_score` are updated move by move
    /// so an interrupt keeps the last completed result.
    fn search_root(
        &mut self,
        root_moves: &[Move],
        depth: i32,
        prev_score: i32,
        best: &mut Move,
        best_score: &mut i32,
    ) -> SearchStep<()> {
        let window = self.weights.aspiration_window;
        let (mut alpha_low, mut beta_high) = if depth >= 4 && window > 0 {
            (prev_score - window, prev_score + window)
        } else {
            (-INFINITY, INFINITY)
        };

        loop {
            match self.root_pass(root_moves, depth, alpha_low, beta_high, best, best_score)? {
                RootOutcome::FailLow => {
                    self.report_pv(depth, *best_score, *best, false, true);
                    alpha_low = -INFINITY;
                }
                RootOutcome::FailHigh => {
                    self.report_pv(depth, *best_score, *best, true, false);
                    beta_high = INFINITY;
                }
                RootOutcome::Exact => return Ok(()),
            }
        }
    }

    fn root_pass(
        &mut self,
        root_moves: &[Move],
        depth: i32,
        alpha_low: i32,
        beta_high: i32,
        best: &mut Move,
        best_score: &mut i32,
    ) -> SearchStep<RootOutcome> {
        let mut alpha = alpha_low;
        let mut improved = false;

        self.path.clear();
        self.path.push(self.root.hash());

        for (idx, mv) in root_moves.iter().enumerate() {
            if self.elapsed_ms() >= CURRMOVE_DELAY_MS {
                let mv = *mv;
                self.notify(|l| l.notify_curr_move(mv, idx + 1));
            }
            let mut child = self.root.clone();
            child.make_move(*mv);
            let score = -self.negamax(&child, depth - 1, 1, -beta_high, -alpha)?;
            if score > alpha {
                alpha = score;
                improved = true;
                *best = *mv;
                *best_score = score;
                if score >= beta_high {
                    return Ok(RootOutcome::FailHigh);
                }
                self.report_pv(depth, score, *mv, false, false);
            }
        }

        if improved {
            self.tt
                .store(self.root.hash(), best.packed(), alpha, depth, Bound::Exact);
            Ok(RootOutcome::Exact)
        } else {
            Ok(RootOutcome::FailLow)
        }
    }

    fn negamax(
        &mut self,
        pos: &Board,
        depth: i32,
        ply: i32,
        mut alpha: i32,
        beta: i32,
    ) -> SearchStep<i32> {
        self.tick()?;

        if pos.halfmove_clock >= 100 || self.is_repetition(pos.hash()) {
            return Ok(0);
        }
        if depth <= 0 || ply >= MAX_PLY {
            return self.quiesce(pos, ply, alpha, beta);
        }

        let orig_alpha = alpha;
        let hash = pos.hash();
        let mut tt_move = 0u16;
        if let Some(entry) = self.tt.probe(hash) {
            tt_move = entry.packed_move;
            if entry.depth >= depth {
                let score = score_from_tt(entry.score, ply);
                match entry.bound {
                    Bound::Exact => return Ok(score),
                    Bound::Lower if score >= beta => return Ok(score),
                    Bound::Upper if score <= alpha => return Ok(score),
                    _ => {}
                }
            }
        }

        let mut moves = pos.legal_moves();
        if moves.is_empty() {
            return Ok(if pos.in_check(pos.side()) {
                -(MATE_SCORE - ply)
            } else {
                0
            });
        }
        self.order_moves(&mut moves, tt_move);

        let mut best_score = -INFINITY;
        let mut best_packed = 0u16;
        self.path.push(hash);
        for mv in moves {
            let mut child = pos.clone();
            child.make_move(mv);
            let score = match self.negamax(&child, depth - 1, ply + 1, -beta, -alpha) {
                Ok(s) => -s,
                Err(stop) => {
                    self.path.pop();
                    return Err(stop);
                }
            };
            if score > best_score {
                best_score = score;
                best_packed = mv.packed();
                if score > alpha {
                    alpha = score;
                    if alpha >= beta {
                        if mv.capture.is_none() {
                            self.history.update(&mv, depth);
                        }
                        break;
                    }
                }
            }
        }
        self.path.pop();

        let bound = if best_score <= orig_alpha {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt
            .store(hash, best_packed, score_to_tt(best_score, ply), depth, bound);
        Ok(best_score)
    }

    fn quiesce(&mut self, pos: &Board, ply: i32, mut alpha: i32, beta: i32) -> SearchStep<i32> {
        self.tick()?;

        let moves = pos.legal_moves();
        if moves.is_empty() {
            return Ok(if pos.in_check(pos.side()) {
                -(MATE_SCORE - ply)
            } else {
                0
            });
        }

        let stand_pat = self.evaluate(pos);
        if stand_pat >= beta || ply >= MAX_PLY {
            return Ok(stand_pat);
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        let mut captures: Vec<Move> = moves
            .into_iter()
            .filter(|m| m.capture.is_some() || m.promotion.is_some())
            .collect();
        captures.sort_unstable_by_key(|m| -capture_score(m));

        let mut best = stand_pat;
        for mv in captures {
            let mut child = pos.clone();
            child.make_move(mv);
            let score = -self.quiesce(&child, ply + 1, -beta, -alpha)?;
            if score > best {
                best = score;
                if score > alpha {
                    alpha = score;
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }
        Ok(best)
    }

    fn order_moves(&self, moves: &mut [Move], tt_move: u16) {
        moves.sort_unstable_by_key(|m| {
            let mut score = 0i32;
            if tt_move != 0 && m.packed() == tt_move {
                score += 1 << 20;
            }
            score += capture_score(m);
            score += self.history.score(m);
            -score
        });
    }

    /// Periodic bookkeeping: limit checks, stats, node-rate throttling.
    fn tick(&mut self) -> SearchStep<()> {
        self.nodes += 1;
        self.check_countdown -= 1;
        if self.check_countdown > 0 {
            return Ok(());
        }
        self.check_countdown = NODES_BETWEEN_CHECKS;

        let elapsed = self.elapsed_ms();
        let max_time = self.limits.max_time_ms();
        if max_time >= 0 && elapsed as i64 >= max_time {
            return Err(Interrupted);
        }
        let node_limit = self.limits.max_nodes();
        if node_limit >= 0 && self.nodes as i64 >= node_limit {
            return Err(Interrupted);
        }

        if self.strength.max_nps > 0 {
            let budget_ms = (self.nodes as i64 * 1000) / self.strength.max_nps;
            let behind = budget_ms - elapsed as i64;
            if behind > 0 {
                thread::sleep(Duration::from_millis((behind as u64).min(THROTTLE_SLEEP_MS)));
            }
        }

        if elapsed.saturating_sub(self.last_stats_ms) >= STATS_INTERVAL_MS {
            self.send_stats();
        }
        Ok(())
    }

    fn is_repetition(&self, hash: u64) -> bool {
        self.path.contains(&hash) || self.root_history.contains(&hash)
    }

    fn evaluate(&self, pos: &Board) -> i32 {
        let mut score = evaluate(pos, &self.weights);
        if self.strength.strength < 1000 {
            score += self.eval_noise(pos.hash());
        }
        score
    }

    /// Deterministic pseudo-random evaluation offset; amplitude grows
    /// quadratically as strength drops.
    fn eval_noise(&self, hash: u64) -> i32 {
        let deficit = i64::from(1000 - self.strength.strength.clamp(0, 1000));
        let amplitude = (deficit * deficit) / 2000;
        if amplitude == 0 {
            return 0;
        }
        let rnd = mix64(hash ^ self.strength.random_seed);
        ((rnd % (2 * amplitude as u64 + 1)) as i64 - amplitude) as i32
    }

    /// At very low strength only a random subset of the root moves is
    /// even considered, but never fewer than one.
    fn filter_weak_root_moves(&self, root_moves: &mut Vec<Move>) {
        if self.strength.strength >= 100 || root_moves.len() < 2 {
            return;
        }
        let strength = self.strength.strength.max(0) as u64;
        // Inclusion probability in parts per 10_000 (strength 100 keeps all).
        let p_incl = strength * strength;
        let seed = self.strength.random_seed;
        let kept: Vec<Move> = root_moves
            .iter()
            .copied()
            .filter(|m| mix64(seed ^ u64::from(m.packed())) % 10_000 < p_incl)
            .collect();
        if !kept.is_empty() {
            *root_moves = kept;
        } else {
            root_moves.truncate(1);
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn nps(&self, elapsed_ms: u64) -> u64 {
        if elapsed_ms > 0 {
            self.nodes * 1000 / elapsed_ms
        } else {
            0
        }
    }

    fn notify(&mut self, f: impl FnOnce(&mut dyn SearchListener)) {
        if let Some(listener) = self.listener.as_deref_mut() {
            f(listener);
        }
    }

    fn send_stats(&mut self) {
        let elapsed = self.elapsed_ms();
        let nodes = self.nodes;
        let nps = self.nps(elapsed);
        self.last_stats_ms = elapsed;
        self.notify(|l| l.notify_stats(nodes, nps, elapsed));
    }

    fn report_pv(&mut self, depth: i32, score: i32, first: Move, lower: bool, upper: bool) {
        let pv = extract_pv(self.tt, &self.root, first, depth.max(1) as usize);
        let elapsed = self.elapsed_ms();
        let (display_score, mate) = if score > MATE_THRESHOLD {
            ((MATE_SCORE - score + 1) / 2, true)
        } else if score < -MATE_THRESHOLD {
            (-((MATE_SCORE + score + 1) / 2), true)
        } else {
            (score, false)
        };
        let report = PvReport {
            depth,
            score: display_score,
            mate,
            lower_bound: lower,
            upper_bound: upper,
            time_ms: elapsed,
            nodes: self.nodes,
            nps: self.nps(elapsed),
            pv,
        };
        self.notify(|l| l.notify_pv(&report));
    }
}

enum RootOutcome {
    Exact,
    FailLow,
    FailHigh,
}

fn capture_score(mv: &Move) -> i32 {
    let mut score = 0;
    if let Some(victim) = mv.capture {
        score += 100_000 + PIECE_VALUES[victim.index()] * 10 - PIECE_VALUES[mv.piece.index()] / 10;
    }
    if let Some(promo) = mv.promotion {
        score += PIECE_VALUES[promo.index()];
    }
    score
}

fn score_to_tt(score: i32, ply: i32) -> i32 {
    if score > MATE_THRESHOLD {
        score + ply
    } else if score < -MATE_THRESHOLD {
        score - ply
    } else {
        score
    }
}

fn score_from_tt(score: i32, ply: i32) -> i32 {
    if score > MATE_THRESHOLD {
        score - ply
    } else if score < -MATE_THRESHOLD {
        score + ply
    } else {
        score
    }
}

/// Rebuild the principal variation by walking the transposition table
/// from the root, guarding against cycles.
fn extract_pv(
    tt: &TranspositionTable,
    root: &Board,
    first: Move,
    max_len: usize,
) -> Vec<Move> {
    let mut pv = vec![first];
    let mut pos = root.clone();
    pos.make_move(first);
    let mut seen = vec![root.hash(), pos.hash()];

    while pv.len() < max_len {
        let Some(entry) = tt.probe(pos.hash()) else { break };
        if entry.packed_move == 0 {
            break;
        }
        let Some(mv) = pos
            .legal_moves()
            .into_iter()
            .find(|m| m.packed() == entry.packed_move)
        else {
            break;
        };
        pos.make_move(mv);
        pv.push(mv);
        if seen.contains(&pos.hash()) {
            break;
        }
        seen.push(pos.hash());
    }
    pv
}
