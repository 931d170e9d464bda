//! Local extrema detection
//!
//! A point is a high pivot when no neighbor within `±distance` is strictly
//! greater, and a low pivot when no neighbor is strictly smaller. Equal
//! neighbors never disqualify, so a flat window yields both kinds.

use serde::{Deserialize, Serialize};

use crate::OHLCV;

/// A confirmed local extremum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub value: f64,
}

impl Pivot {
    #[inline]
    pub fn new(index: usize, value: f64) -> Self {
        Self { index, value }
    }
}

/// High and low pivots in ascending index order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pivots {
    pub highs: Vec<Pivot>,
    pub lows: Vec<Pivot>,
}

impl Pivots {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.highs.is_empty() && self.lows.is_empty()
    }

    /// The last `n` highs (fewer if not available)
    pub fn last_highs(&self, n: usize) -> &[Pivot] {
        &self.highs[self.highs.len().saturating_sub(n)..]
    }

    /// The last `n` lows (fewer if not available)
    pub fn last_lows(&self, n: usize) -> &[Pivot] {
        &self.lows[self.lows.len().saturating_sub(n)..]
    }

    /// Highs and lows merged in index order, tagged `true` for highs
    pub fn alternating(&self) -> Vec<(bool, Pivot)> {
        let mut all: Vec<(bool, Pivot)> = self
            .highs
            .iter()
            .map(|p| (true, *p))
            .chain(self.lows.iter().map(|p| (false, *p)))
            .collect();
        all.sort_by_key(|(_, p)| p.index);
        all
    }
}

/// Find pivots of `series` in `[start, end)`.
///
/// Candidates are restricted to `start + distance .. end - distance` so every
/// candidate has a full window inside the range. Non-finite values are
/// never pivots and disqualify any window they appear in.
pub fn find_pivots(series: &[f64], start: usize, end: usize, distance: usize) -> Pivots {
    scan(start, end.min(series.len()), distance, |i| series[i], |i| series[i])
}

/// Find pivots of a candle slice: highs from candle highs, lows from candle lows
pub fn find_price_pivots<T: OHLCV>(candles: &[T], start: usize, end: usize, distance: usize) -> Pivots {
    scan(
        start,
        end.min(candles.len()),
        distance,
        |i| candles[i].high(),
        |i| candles[i].low(),
    )
}

/// Find pivots of a series whose values may be missing
pub fn find_pivots_sparse(series: &[Option<f64>], start: usize, end: usize, distance: usize) -> Pivots {
    let get = |i: usize| series[i].unwrap_or(f64::NAN);
    scan(start, end.min(series.len()), distance, get, get)
}

fn scan(
    start: usize,
    end: usize,
    distance: usize,
    high_at: impl Fn(usize) -> f64,
    low_at: impl Fn(usize) -> f64,
) -> Pivots {
    let mut pivots = Pivots::default();
    if end <= start || end - start < 2 * distance + 1 {
        return pivots;
    }

    for i in (start + distance)..(end - distance) {
        let window = (i - distance)..=(i + distance);

        let h = high_at(i);
        if h.is_finite()
            && window.clone().all(|j| {
                let v = high_at(j);
                v.is_finite() && v <= h
            })
        {
            pivots.highs.push(Pivot::new(i, h));
        }

        let l = low_at(i);
        if l.is_finite()
            && window.clone().all(|j| {
                let v = low_at(j);
                v.is_finite() && v >= l
            })
        {
            pivots.lows.push(Pivot::new(i, l));
        }
    }

    pivots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    #[test]
    fn test_simple_peak_and_trough() {
        let series = [1.0, 2.0, 5.0, 2.0, 1.0, 0.5, 1.0, 3.0];
        let p = find_pivots(&series, 0, series.len(), 2);
        assert_eq!(p.highs, vec![Pivot::new(2, 5.0)]);
        assert_eq!(p.lows, vec![Pivot::new(5, 0.5)]);
    }

    #[test]
    fn test_range_too_small_is_empty() {
        let series = [1.0, 3.0, 1.0, 0.0];
        assert!(find_pivots(&series, 0, 4, 2).is_empty());
        assert!(find_pivots(&series, 3, 1, 1).is_empty());
    }

    #[test]
    fn test_equal_neighbors_do_not_disqualify() {
        let series = [1.0, 4.0, 4.0, 1.0];
        let p = find_pivots(&series, 0, series.len(), 1);
        assert_eq!(p.highs.len(), 2);

        // Flat window: both a high and a low
        let flat = [2.0; 5];
        let p = find_pivots(&flat, 0, flat.len(), 2);
        assert_eq!(p.highs, vec![Pivot::new(2, 2.0)]);
        assert_eq!(p.lows, vec![Pivot::new(2, 2.0)]);
    }

    #[test]
    fn test_strictly_greater_neighbor_disqualifies() {
        let series = [1.0, 4.0, 4.1, 1.0];
        let p = find_pivots(&series, 0, series.len(), 1);
        assert_eq!(p.highs, vec![Pivot::new(2, 4.1)]);
    }

    #[test]
    fn test_monotonic_has_no_pivots() {
        let series: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let p = find_pivots(&series, 0, series.len(), 3);
        assert!(p.is_empty());
    }

    #[test]
    fn test_nan_is_skipped() {
        let series = [1.0, 2.0, f64::NAN, 2.0, 1.0, 3.0, 1.0];
        let p = find_pivots(&series, 0, series.len(), 1);
        assert_eq!(p.highs, vec![Pivot::new(5, 3.0)]);
    }

    #[test]
    fn test_end_clamped_to_len() {
        let series = [1.0, 3.0, 1.0];
        let p = find_pivots(&series, 0, 100, 1);
        assert_eq!(p.highs, vec![Pivot::new(1, 3.0)]);
    }

    #[test]
    fn test_price_pivots_use_high_and_low() {
        let candles: Vec<Candle> = [(10.0, 9.0), (12.0, 8.0), (11.0, 9.5)]
            .iter()
            .map(|&(h, l)| Candle::new(l, h, l, h, 0.0))
            .collect();
        let p = find_price_pivots(&candles, 0, 3, 1);
        assert_eq!(p.highs, vec![Pivot::new(1, 12.0)]);
        assert_eq!(p.lows, vec![Pivot::new(1, 8.0)]);
    }

    #[test]
    fn test_sparse_series() {
        let series = [None, Some(1.0), Some(5.0), Some(1.0), None];
        let p = find_pivots_sparse(&series, 0, series.len(), 1);
        assert_eq!(p.highs, vec![Pivot::new(2, 5.0)]);
    }

    #[test]
    fn test_alternating_order() {
        let series = [1.0, 5.0, 1.0, 0.0, 1.0, 6.0, 1.0];
        let p = find_pivots(&series, 0, series.len(), 1);
        let kinds: Vec<bool> = p.alternating().iter().map(|(h, _)| *h).collect();
        assert_eq!(kinds, vec![true, false, true]);
    }
}
