//! Double tops and double bottoms

use super::{
    closeness, crossed_down, crossed_up, max_high, min_low, volume_contraction, window,
    ChartPattern, ChartPatternDetector, ChartPatternKind, PatternDraft,
};
use crate::config::PatternConfig;
use crate::pivots::{find_price_pivots, Pivot};
use crate::{Direction, OHLCV};

#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleDetector;

impl ChartPatternDetector for DoubleDetector {
    fn name(&self) -> &'static str {
        "double"
    }

    fn min_bars(&self, config: &PatternConfig) -> usize {
        config.min_double_separation.get() + 2 * config.pivot_distance.get() + 1
    }

    /// Reports a top and a bottom independently; both can be present
    fn detect<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Vec<ChartPattern> {
        if index >= candles.len() {
            return Vec::new();
        }
        let range = window(index, config.lookback.get());
        let pivots = find_price_pivots(candles, range.start, range.end, config.pivot_distance.get());

        let mut found = Vec::new();
        if let &[a, b] = pivots.last_highs(2) {
            found.extend(detect_double(candles, index, config, a, b, false));
        }
        if let &[a, b] = pivots.last_lows(2) {
            found.extend(detect_double(candles, index, config, a, b, true));
        }
        found
    }
}

fn detect_double<T: OHLCV>(
    candles: &[T],
    index: usize,
    config: &PatternConfig,
    first: Pivot,
    second: Pivot,
    bottom: bool,
) -> Option<ChartPattern> {
    if index - second.index > config.max_pattern_age.get() {
        return None;
    }
    let separation = second.index - first.index;
    let min_separation = config.min_double_separation.get();
    if separation < min_separation {
        return None;
    }

    let diff = (first.value - second.value).abs() / first.value.max(second.value);
    let tolerance = config.double_tolerance.get();
    if diff > tolerance {
        return None;
    }

    let between = first.index + 1..second.index;
    let (_, neckline) = if bottom {
        max_high(candles, between)?
    } else {
        min_low(candles, between)?
    };
    let extreme = (first.value + second.value) / 2.0;
    let height = (extreme - neckline).abs();
    let depth = height / extreme.max(neckline);
    let min_depth = config.min_double_depth.get();
    if depth < min_depth || (bottom && neckline <= extreme) || (!bottom && neckline >= extreme) {
        return None;
    }

    let (kind, direction, target, confirmed) = if bottom {
        (
            ChartPatternKind::DoubleBottom,
            Direction::Bullish,
            neckline + height,
            crossed_up(candles, index, neckline),
        )
    } else {
        (
            ChartPatternKind::DoubleTop,
            Direction::Bearish,
            neckline - height,
            crossed_down(candles, index, neckline),
        )
    };

    let distance = config.pivot_distance.get();
    let around = |i: usize| i.saturating_sub(distance)..i + distance + 1;

    PatternDraft {
        kind,
        direction,
        span: (first.index, index),
        levels: vec![("first", first.value), ("second", second.value), ("neckline", neckline)],
        factors: vec![
            (0.35, Some(closeness(diff, tolerance))),
            (0.25, Some((depth / (3.0 * min_depth)).min(1.0))),
            (0.2, Some((separation as f64 / (2 * min_separation) as f64).min(1.0))),
            (0.2, volume_contraction(candles, around(first.index), around(second.index))),
        ],
        target_price: Some(target),
        confirmed,
    }
    .finish()
}

#[cfg(test)]
mod tests {
    use super::super::testutil::path;
    use super::*;

    #[test]
    fn test_double_top() {
        let candles = path(&[(0, 90.0), (10, 110.0), (20, 98.0), (30, 110.0), (38, 102.0)]);
        let found = DoubleDetector.detect(&candles, 36, &PatternConfig::default());
        assert_eq!(found.len(), 1);
        let p = &found[0];
        assert_eq!(p.kind, ChartPatternKind::DoubleTop);
        assert_eq!(p.direction, Direction::Bearish);
        assert!((p.level("neckline").unwrap() - 97.9).abs() < 1e-9);
        assert!((p.target_price.unwrap() - 85.7).abs() < 1e-6);
    }

    #[test]
    fn test_double_bottom() {
        let candles = path(&[(0, 110.0), (10, 90.0), (20, 102.0), (30, 90.0), (38, 98.0)]);
        let found = DoubleDetector.detect(&candles, 36, &PatternConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ChartPatternKind::DoubleBottom);
        assert_eq!(found[0].direction, Direction::Bullish);
        assert!((found[0].target_price.unwrap() - 114.3).abs() < 1e-6);
    }

    #[test]
    fn test_unequal_tops_rejected() {
        let candles = path(&[(0, 90.0), (10, 110.0), (20, 98.0), (30, 115.0), (38, 102.0)]);
        assert!(DoubleDetector.detect(&candles, 36, &PatternConfig::default()).is_empty());
    }

    #[test]
    fn test_tops_too_close_rejected() {
        let candles = path(&[(0, 90.0), (5, 110.0), (9, 100.0), (13, 110.0), (21, 100.0)]);
        assert!(DoubleDetector.detect(&candles, 19, &PatternConfig::default()).is_empty());
    }
}
