//! Thinking-time computation for a search request.

use super::SearchRequest;

/// Limits planned for one search. A value of -1 means "no limit".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePlan {
    pub min_time_ms: i64,
    pub max_time_ms: i64,
    pub max_depth: i32,
    pub max_nodes: i64,
}

impl TimePlan {
    #[must_use]
    pub fn unbounded() -> Self {
        TimePlan {
            min_time_ms: -1,
            max_time_ms: -1,
            max_depth: -1,
            max_nodes: -1,
        }
    }

    /// True when nothing bounds the search, which is what makes a
    /// search "infinite" from the controller's point of view.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.max_time_ms < 0 && self.max_depth < 0 && self.max_nodes < 0
    }
}

/// Horizon assumed when the GUI does not say how many moves remain.
const MOVES_HORIZON: i64 = 45;
/// Expected ponder hit rate; a hit refunds the move's thinking time.
const PONDER_HIT_RATE: f64 = 0.35;

/// Map a search request and clock state to concrete limits.
///
/// Exactly one bound is chosen: infinite beats depth beats mate beats
/// movetime beats nodes beats the classical clock calculation.
#[must_use]
pub fn plan_time(req: &SearchRequest, white_to_move: bool, ponder_mode: bool) -> TimePlan {
    let mut plan = TimePlan::unbounded();
    if req.infinite {
        // No limits at all.
    } else if req.depth > 0 {
        plan.max_depth = req.depth;
    } else if req.mate > 0 {
        // Mate in m moves is at most 2m-1 plies deep.
        plan.max_depth = req.mate * 2 - 1;
    } else if req.move_time > 0 {
        plan.min_time_ms = req.move_time;
        plan.max_time_ms = req.move_time;
    } else if req.nodes > 0 {
        plan.max_nodes = req.nodes;
    } else {
        let mut moves = if req.moves_to_go > 0 { req.moves_to_go } else { 999 };
        moves = moves.min(MOVES_HORIZON);
        if ponder_mode {
            moves = (moves as f64 * (1.0 - PONDER_HIT_RATE)).ceil() as i64;
        }
        let time = if white_to_move { req.wtime } else { req.btime };
        let inc = if white_to_move { req.winc } else { req.binc };

        // Keep a safety margin on the clock, at most one second.
        let margin = 1000.min(time * 9 / 10);
        let raw = (time + inc * (moves - 1) - margin) / moves;
        let min = (raw as f64 * 0.85) as i64;
        let max = (min as f64 * (moves as f64 * 0.5).clamp(2.5, 4.0)) as i64;

        plan.min_time_ms = clamp(min, 1, time - margin);
        plan.max_time_ms = clamp(max, 1, time - margin);
    }
    plan
}

fn clamp(val: i64, min: i64, max: i64) -> i64 {
    if val < min {
        min
    } else if val > max {
        max
    } else {
        val
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn clock_request(wtime: i64, winc: i64, moves_to_go: i64) -> SearchRequest {
        SearchRequest {
            wtime,
            winc,
            btime: wtime,
            binc: winc,
            moves_to_go,
            ..SearchRequest::default()
        }
    }

    #[test]
    fn infinite_leaves_everything_unbounded() {
        let req = SearchRequest {
            infinite: true,
            wtime: 60_000,
            ..SearchRequest::default()
        };
        let plan = plan_time(&req, true, false);
        assert!(plan.is_unbounded());
        assert_eq!(plan, TimePlan::unbounded());
    }

    #[test]
    fn fixed_depth_only_sets_depth() {
        let req = SearchRequest {
            depth: 7,
            wtime: 60_000,
            ..SearchRequest::default()
        };
        let plan = plan_time(&req, true, false);
        assert_eq!(plan.max_depth, 7);
        assert_eq!(plan.min_time_ms, -1);
        assert_eq!(plan.max_nodes, -1);
        assert!(!plan.is_unbounded());
    }

    #[test]
    fn mate_distance_maps_to_depth() {
        let req = SearchRequest {
            mate: 3,
            ..SearchRequest::default()
        };
        assert_eq!(plan_time(&req, true, false).max_depth, 5);
    }

    #[test]
    fn movetime_pins_both_bounds() {
        let req = SearchRequest {
            move_time: 250,
            wtime: 60_000,
            ..SearchRequest::default()
        };
        let plan = plan_time(&req, true, false);
        assert_eq!(plan.min_time_ms, 250);
        assert_eq!(plan.max_time_ms, 250);
        assert_eq!(plan.max_depth, -1);
    }

    #[test]
    fn node_limit_only_sets_nodes() {
        let req = SearchRequest {
            nodes: 12_345,
            ..SearchRequest::default()
        };
        let plan = plan_time(&req, true, false);
        assert_eq!(plan.max_nodes, 12_345);
        assert_eq!(plan.min_time_ms, -1);
    }

    #[test]
    fn classic_clock_uses_the_right_side() {
        let req = SearchRequest {
            wtime: 60_000,
            btime: 1_000,
            ..SearchRequest::default()
        };
        let white = plan_time(&req, true, false);
        let black = plan_time(&req, false, false);
        assert!(white.min_time_ms > black.min_time_ms);
    }

    #[test]
    fn classic_clock_matches_reference_values() {
        // 5 minutes, no increment, no movestogo, ponder off:
        // margin 1000, moves 45, raw (300000-1000)/45 = 6644,
        // min 5647, max 5647*4 = 22588.
        let plan = plan_time(&clock_request(300_000, 0, 0), true, false);
        assert_eq!(plan.min_time_ms, 5647);
        assert_eq!(plan.max_time_ms, 22_588);
    }

    #[test]
    fn ponder_mode_stretches_the_budget() {
        // Assuming a 35% ponder hit rate shrinks the move horizon, which
        // allocates more time per move than a non-ponder plan.
        let req = clock_request(120_000, 2_000, 0);
        let normal = plan_time(&req, true, false);
        let pondering = plan_time(&req, true, true);
        assert!(pondering.min_time_ms >= normal.min_time_ms);
        assert!(pondering.max_time_ms >= normal.max_time_ms);
    }

    #[test]
    fn movestogo_one_spends_most_of_the_clock() {
        let plan = plan_time(&clock_request(10_000, 0, 1), true, false);
        assert!(plan.min_time_ms > 5_000);
        assert!(plan.max_time_ms <= 9_000);
    }

    #[test]
    fn tiny_clock_still_yields_positive_budget() {
        for time in 1..20 {
            let plan = plan_time(&clock_request(time, 0, 0), true, false);
            assert!(plan.min_time_ms >= 1, "time={time}");
            assert!(plan.min_time_ms <= plan.max_time_ms, "time={time}");
            assert!(plan.max_time_ms <= time.max(1), "time={time}");
        }
    }

    proptest! {
        #[test]
        fn classic_budget_is_ordered_and_bounded(
            time in 1i64..10_000_000,
            inc in 0i64..10_000,
            moves_to_go in 0i64..200,
            ponder in proptest::bool::ANY,
        ) {
            let plan = plan_time(&clock_request(time, inc, moves_to_go), true, ponder);
            prop_assert!(plan.min_time_ms > 0);
            prop_assert!(plan.min_time_ms <= plan.max_time_ms);
            prop_assert!(plan.max_time_ms <= time);
        }
    }
}
