//! Cumulative/delta reconstruction for laps and relay legs

use crate::import::types::{LapSpec, Timing};

/// One fully reconstructed split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LapSplit {
    /// Distance from start, in meters
    pub distance: u32,
    /// Time for this segment alone
    pub delta: Timing,
    /// Elapsed time from the start
    pub cumulative: Timing,
}

/// Reconstruct every lap split from whichever of cumulative/delta the
/// source printed.
///
/// - delta missing: `delta = cumulative - previous_cumulative`
/// - cumulative missing: `cumulative = previous_cumulative + delta`
/// - both missing: the lap is skipped without blocking its parent result
///
/// Laps are processed in increasing distance order regardless of input
/// order. A cumulative below the running total is malformed and degrades
/// that delta to zero.
pub fn reconstruct(laps: &[LapSpec]) -> Vec<LapSplit> {
    let mut ordered: Vec<&LapSpec> = laps.iter().collect();
    ordered.sort_by_key(|lap| lap.distance);

    let mut splits = Vec::with_capacity(ordered.len());
    let mut previous = Timing::default();
    for lap in ordered {
        let cumulative = Timing::parse_opt(lap.timing.as_deref()).filter(|t| !t.is_zero());
        let delta = Timing::parse_opt(lap.delta.as_deref()).filter(|t| !t.is_zero());

        let (delta, cumulative) = match (delta, cumulative) {
            (Some(d), Some(c)) => (d, c),
            (None, Some(c)) => {
                let d = c.checked_sub(previous).unwrap_or_else(|| {
                    log::warn!(
                        "cumulative {} at {}m below running total {}, delta degraded to zero",
                        c,
                        lap.distance,
                        previous
                    );
                    Timing::default()
                });
                (d, c)
            }
            (Some(d), None) => (d, previous.add(d)),
            (None, None) => continue,
        };
        splits.push(LapSplit {
            distance: lap.distance,
            delta,
            cumulative,
        });
        previous = cumulative;
    }
    splits
}

/// Sub-segments of one relay leg: the splits in `(leg_start, leg_end]`,
/// with deltas already running off the whole-line cumulative. Segment
/// numbering restarts at the top of each leg.
pub fn leg_subsplits(splits: &[LapSplit], leg_start: u32, leg_end: u32) -> Vec<LapSplit> {
    splits
        .iter()
        .filter(|s| s.distance > leg_start && s.distance <= leg_end)
        .copied()
        .collect()
}
