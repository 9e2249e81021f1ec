// =============================================================================
// Candle aggregation - pure OHLC grouping over raw price points
// =============================================================================
//
// Two distinct, explicitly selected modes:
//
//   * `group_candles`   - batch mode: bucket points into fixed intervals.
//   * `rolling_candles` - stream mode: one candle per point, chained so that
//                         each candle opens at the previous point's value.
//
// Both are pure and restartable: no state is retained between calls.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::PricePoint;

/// One OHLC candle. Never mutated after emission for a closed bucket.
///
/// Invariant: `low <= min(open, close)` and `high >= max(open, close)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start as Unix epoch seconds.
    pub bucket_start: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Bucket raw points into fixed-interval candles.
///
/// Each point maps to the bucket starting at
/// `floor(timestamp_ms / interval_ms) * interval_ms`. Within a bucket,
/// `open` is the first point's value in input order and `close` the last in
/// input order; out-of-order input is tolerated for bucket assignment but
/// open/close stay positional, not time-sorted. `high`/`low` are the bucket
/// extremes. Output is sorted ascending by bucket start.
///
/// Empty input (or a zero interval) yields an empty output.
pub fn group_candles(points: &[PricePoint], interval_minutes: u32) -> Vec<Candle> {
    if interval_minutes == 0 {
        return Vec::new();
    }
    let interval_ms = i64::from(interval_minutes) * 60_000;

    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();
    for point in points {
        let start_ms = point.timestamp_ms.div_euclid(interval_ms) * interval_ms;
        let candle = buckets.entry(start_ms).or_insert(Candle {
            bucket_start: start_ms / 1_000,
            open: point.value,
            high: point.value,
            low: point.value,
            close: point.value,
        });
        candle.high = candle.high.max(point.value);
        candle.low = candle.low.min(point.value);
        candle.close = point.value;
    }

    buckets.into_values().collect()
}

/// Derive one candle per point from a continuous price stream.
///
/// Points are sorted by time, then candle N opens at point N-1's value and
/// closes at point N's value (the first candle opens at its own value), so
/// consecutive candles chain open-to-close with no gaps.
pub fn rolling_candles(points: &[PricePoint]) -> Vec<Candle> {
    let mut sorted: Vec<&PricePoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.timestamp_ms);

    sorted
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let open = if i == 0 {
                point.value
            } else {
                sorted[i - 1].value
            };
            Candle {
                bucket_start: point.timestamp_ms.div_euclid(1_000),
                open,
                high: open.max(point.value),
                low: open.min(point.value),
                close: point.value,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(timestamp_ms: i64, value: f64) -> PricePoint {
        PricePoint {
            timestamp_ms,
            value,
        }
    }

    fn assert_candle_invariants(candles: &[Candle]) {
        for c in candles {
            assert!(c.low <= c.open.min(c.close), "low violates invariant: {c:?}");
            assert!(c.high >= c.open.max(c.close), "high violates invariant: {c:?}");
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(group_candles(&[], 1).is_empty());
        assert!(rolling_candles(&[]).is_empty());
    }

    #[test]
    fn zero_interval_yields_empty_output() {
        assert!(group_candles(&[pt(0, 10.0)], 0).is_empty());
    }

    #[test]
    fn single_point_collapses_to_flat_candle() {
        let candles = group_candles(&[pt(30_000, 42.0)], 1);
        assert_eq!(candles.len(), 1);
        let c = candles[0];
        assert_eq!(c.bucket_start, 0);
        assert_eq!((c.open, c.high, c.low, c.close), (42.0, 42.0, 42.0, 42.0));
    }

    #[test]
    fn two_buckets_with_expected_ohlc() {
        let points = [pt(0, 10.0), pt(500, 12.0), pt(60_001, 9.0)];
        let candles = group_candles(&points, 1);

        assert_eq!(candles.len(), 2);

        let first = candles[0];
        assert_eq!(first.bucket_start, 0);
        assert_eq!(first.open, 10.0);
        assert_eq!(first.high, 12.0);
        assert_eq!(first.low, 10.0);
        assert_eq!(first.close, 12.0);

        let second = candles[1];
        assert_eq!(second.bucket_start, 60);
        assert_eq!(
            (second.open, second.high, second.low, second.close),
            (9.0, 9.0, 9.0, 9.0)
        );
        assert_candle_invariants(&candles);
    }

    #[test]
    fn open_and_close_are_positional_not_time_sorted() {
        // Out-of-order input within one bucket: open is the first value
        // encountered, close the last, regardless of timestamps.
        let points = [pt(40_000, 7.0), pt(10_000, 11.0), pt(20_000, 5.0)];
        let candles = group_candles(&points, 1);

        assert_eq!(candles.len(), 1);
        let c = candles[0];
        assert_eq!(c.open, 7.0);
        assert_eq!(c.close, 5.0);
        assert_eq!(c.high, 11.0);
        assert_eq!(c.low, 5.0);
        assert_candle_invariants(&candles);
    }

    #[test]
    fn output_is_sorted_by_bucket_start() {
        let points = [pt(180_000, 3.0), pt(0, 1.0), pt(120_000, 2.0)];
        let candles = group_candles(&points, 1);
        let starts: Vec<i64> = candles.iter().map(|c| c.bucket_start).collect();
        assert_eq!(starts, vec![0, 120, 180]);
    }

    #[test]
    fn grouping_is_idempotent_on_single_point_buckets() {
        // One point per bucket: re-running on the output (each candle
        // reduced to its close at its bucket start) yields the same candles.
        let points = [pt(0, 10.0), pt(60_000, 11.5), pt(120_000, 9.25)];
        let first_pass = group_candles(&points, 1);

        let reduced: Vec<PricePoint> = first_pass
            .iter()
            .map(|c| pt(c.bucket_start * 1_000, c.close))
            .collect();
        let second_pass = group_candles(&reduced, 1);

        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn interval_widths_scale_with_minutes(){
        let points = [pt(0, 1.0), pt(4 * 60_000, 2.0), pt(6 * 60_000, 3.0)];
        let candles = group_candles(&points, 5);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].bucket_start, 0);
        assert_eq!(candles[1].bucket_start, 300);
    }

    #[test]
    fn rolling_candles_chain_open_to_close() {
        let points = [pt(0, 100.0), pt(10_000, 102.0), pt(20_000, 101.0)];
        let candles = rolling_candles(&points);

        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[0].close, 100.0);
        for pair in candles.windows(2) {
            assert_eq!(pair[1].open, pair[0].close);
        }
        assert_eq!(candles[1].high, 102.0);
        assert_eq!(candles[2].low, 101.0);
        assert_candle_invariants(&candles);
    }

    #[test]
    fn rolling_candles_sort_unordered_input() {
        let points = [pt(20_000, 101.0), pt(0, 100.0), pt(10_000, 102.0)];
        let candles = rolling_candles(&points);
        let starts: Vec<i64> = candles.iter().map(|c| c.bucket_start).collect();
        assert_eq!(starts, vec![0, 10, 20]);
        assert_eq!(candles[1].open, 100.0);
        assert_eq!(candles[1].close, 102.0);
    }
}
