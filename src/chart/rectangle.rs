//! Rectangles: flat resistance over flat support

use super::{
    closeness, crossed_down, crossed_up, fit_channel, ChartPattern, ChartPatternDetector,
    ChartPatternKind, PatternDraft,
};
use crate::config::PatternConfig;
use crate::{Direction, OHLCV};

/// Pivots must sit within this relative distance of their level
const LEVEL_TOLERANCE: f64 = 0.015;
/// Minimum height as a fraction of price
const MIN_HEIGHT: f64 = 0.02;

#[derive(Debug, Clone, Copy, Default)]
pub struct RectangleDetector;

impl ChartPatternDetector for RectangleDetector {
    fn name(&self) -> &'static str {
        "rectangle"
    }

    fn min_bars(&self, config: &PatternConfig) -> usize {
        (8 * config.pivot_distance.get()).max(15)
    }

    fn detect<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Vec<ChartPattern> {
        detect_rectangle(candles, index, config).into_iter().collect()
    }
}

fn detect_rectangle<T: OHLCV>(candles: &[T], index: usize, config: &PatternConfig) -> Option<ChartPattern> {
    if index >= candles.len() {
        return None;
    }
    let ch = fit_channel(candles, index, config)?;
    let flat = config.flat_slope_threshold;
    if ch.resistance_slope.abs() >= flat || ch.support_slope.abs() >= flat {
        return None;
    }

    let mean = |values: &[crate::pivots::Pivot]| values.iter().map(|p| p.value).sum::<f64>() / values.len() as f64;
    let resistance = mean(&ch.highs);
    let support = mean(&ch.lows);
    let height = resistance - support;
    if height / ch.reference < MIN_HEIGHT {
        return None;
    }

    let within = |values: &[crate::pivots::Pivot], level: f64| {
        values
            .iter()
            .all(|p| ((p.value - level) / level).abs() <= LEVEL_TOLERANCE)
    };
    if !within(&ch.highs, resistance) || !within(&ch.lows, support) {
        return None;
    }

    let (direction, confirmed, target) = if crossed_up(candles, index, resistance) {
        (Direction::Bullish, true, Some(resistance + height))
    } else if crossed_down(candles, index, support) {
        (Direction::Bearish, true, Some(support - height))
    } else {
        (Direction::Neutral, false, None)
    };

    let touches = (ch.highs.len() + ch.lows.len()) as f64;
    let flatness = closeness(ch.resistance_slope.abs().max(ch.support_slope.abs()), flat);
    let duration = ((ch.end - ch.start) as f64 / 30.0).min(1.0);

    PatternDraft {
        kind: ChartPatternKind::Rectangle,
        direction,
        span: (ch.start, index),
        levels: vec![("resistance", resistance), ("support", support)],
        factors: vec![
            (0.35, Some((touches / 6.0).min(1.0))),
            (0.25, Some(flatness)),
            (0.2, Some(duration)),
            (0.2, ch.volume_score(candles, index)),
        ],
        target_price: target,
        confirmed,
    }
    .finish()
}

#[cfg(test)]
mod tests {
    use super::super::testutil::path;
    use super::*;

    fn range_bound(last: (usize, f64)) -> Vec<crate::Candle> {
        let mut anchors = vec![
            (0, 95.0),
            (8, 110.0),
            (16, 100.0),
            (24, 110.0),
            (32, 100.0),
            (40, 110.0),
            (48, 100.0),
            (56, 110.0),
        ];
        anchors.push(last);
        path(&anchors)
    }

    #[test]
    fn test_rectangle() {
        let candles = range_bound((62, 106.0));
        let found = RectangleDetector.detect(&candles, 60, &PatternConfig::default());
        assert_eq!(found.len(), 1);
        let p = &found[0];
        assert_eq!(p.kind, ChartPatternKind::Rectangle);
        assert_eq!(p.direction, Direction::Neutral);
        assert!(p.target_price.is_none());
        assert!((p.level("support").unwrap() - 99.9).abs() < 1e-9);
    }

    #[test]
    fn test_rectangle_breakout() {
        let candles = range_bound((62, 113.0));
        let found = RectangleDetector.detect(&candles, 57, &PatternConfig::default());
        assert_eq!(found.len(), 1);
        assert!(found[0].confirmed);
        assert_eq!(found[0].direction, Direction::Bullish);
        assert!((found[0].target_price.unwrap() - 120.3).abs() < 1e-6);
    }

    #[test]
    fn test_too_narrow() {
        let candles = path(&[
            (0, 99.0),
            (8, 100.5),
            (16, 100.0),
            (24, 100.5),
            (32, 100.0),
            (40, 100.5),
            (48, 100.0),
            (56, 100.5),
            (62, 100.2),
        ]);
        assert!(RectangleDetector.detect(&candles, 60, &PatternConfig::default()).is_empty());
    }
}
