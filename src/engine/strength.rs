//! Strength emulation: Elo targets map to an internal strength value
//! and a node-rate cap.

use super::EngineOptions;

/// Breakpoints mapping an Elo rating to the 0..=1000 strength scale.
/// Values outside the table clamp to the endpoints.
const ELO_TO_STRENGTH: [(i32, i32); 19] = [
    (-625, 0),
    (-572, 10),
    (-396, 20),
    (-145, 30),
    (204, 45),
    (473, 60),
    (679, 75),
    (891, 100),
    (917, 200),
    (1055, 300),
    (1321, 375),
    (1408, 400),
    (1694, 500),
    (1938, 600),
    (2073, 675),
    (2182, 750),
    (2294, 875),
    (2360, 950),
    (2410, 1000),
];

/// NPS ceiling applied below 1350 Elo when strength limiting is on.
const WEAK_NPS_CEILING: i64 = 10_000;
/// NPS ceiling applied at or above 1350 Elo when strength limiting is on.
const STRONG_NPS_CEILING: i64 = 100_000;

/// Interpolate an Elo rating in the breakpoint table.
#[must_use]
pub fn strength_from_elo(elo: i32) -> i32 {
    if elo <= ELO_TO_STRENGTH[0].0 {
        return ELO_TO_STRENGTH[0].1;
    }
    for window in ELO_TO_STRENGTH.windows(2) {
        let (a, fa) = window[0];
        let (b, fb) = window[1];
        if elo <= b {
            let t = f64::from(elo - a) / f64::from(b - a);
            return (f64::from(fa) + t * f64::from(fb - fa)).round() as i32;
        }
    }
    ELO_TO_STRENGTH[ELO_TO_STRENGTH.len() - 1].1
}

/// Strength value a search should run with, honoring strength limiting.
#[must_use]
pub fn effective_strength(opts: &EngineOptions) -> i32 {
    if opts.limit_strength {
        strength_from_elo(opts.elo)
    } else {
        opts.strength
    }
}

/// Resolve the node-rate cap: the configured cap intersected with the
/// Elo-based ceiling. Zero means "unlimited" on both sides of the call.
#[must_use]
pub fn effective_max_nps(opts: &EngineOptions) -> i64 {
    let unlimited = i64::MAX;
    let configured = if opts.max_nps == 0 { unlimited } else { opts.max_nps };
    let mut capped = configured;
    if opts.limit_strength {
        let ceiling = if opts.elo < 1350 {
            WEAK_NPS_CEILING
        } else {
            STRONG_NPS_CEILING
        };
        capped = capped.min(ceiling);
    }
    let nps = configured.min(capped);
    if nps == unlimited {
        0
    } else {
        nps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn limited(elo: i32, max_nps: i64) -> EngineOptions {
        EngineOptions {
            limit_strength: true,
            elo,
            max_nps,
            ..EngineOptions::default()
        }
    }

    #[test]
    fn endpoints_clamp_exactly() {
        assert_eq!(strength_from_elo(-625), 0);
        assert_eq!(strength_from_elo(-10_000), 0);
        assert_eq!(strength_from_elo(2410), 1000);
        assert_eq!(strength_from_elo(9_999), 1000);
    }

    #[test]
    fn breakpoints_map_to_themselves() {
        for (elo, strength) in ELO_TO_STRENGTH {
            assert_eq!(strength_from_elo(elo), strength);
        }
    }

    #[test]
    fn interpolates_between_breakpoints() {
        // Between (1408, 400) and (1694, 500): 92/286 of the way.
        assert_eq!(strength_from_elo(1500), 432);
        // Steep segment between (891, 100) and (917, 200).
        assert_eq!(strength_from_elo(904), 150);
    }

    #[test]
    fn unlimited_nps_round_trips_as_zero() {
        let opts = EngineOptions::default();
        assert_eq!(effective_max_nps(&opts), 0);
    }

    #[test]
    fn explicit_cap_survives_without_limiting() {
        let opts = EngineOptions {
            max_nps: 5_000_000,
            ..EngineOptions::default()
        };
        assert_eq!(effective_max_nps(&opts), 5_000_000);
    }

    #[test]
    fn elo_limiting_caps_node_rate() {
        assert_eq!(effective_max_nps(&limited(1200, 0)), 10_000);
        assert_eq!(effective_max_nps(&limited(1349, 5_000)), 5_000);
        assert_eq!(effective_max_nps(&limited(1350, 0)), 100_000);
        assert_eq!(effective_max_nps(&limited(2000, 1_000_000)), 100_000);
    }

    #[test]
    fn effective_strength_ignores_elo_unless_limited() {
        let mut opts = EngineOptions {
            strength: 700,
            elo: -625,
            ..EngineOptions::default()
        };
        assert_eq!(effective_strength(&opts), 700);
        opts.limit_strength = true;
        assert_eq!(effective_strength(&opts), 0);
    }

    proptest! {
        #[test]
        fn interpolation_is_monotonic(a in -1000i32..3000, b in -1000i32..3000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(strength_from_elo(lo) <= strength_from_elo(hi));
        }

        #[test]
        fn strength_stays_in_range(elo in -10_000i32..10_000) {
            let s = strength_from_elo(elo);
            prop_assert!((0..=1000).contains(&s));
        }
    }
}
