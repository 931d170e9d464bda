//! Head and shoulders, regular and inverse
//!
//! Three consecutive pivots of one kind where the middle one (head) is the
//! most extreme and the outer two (shoulders) are close in price and in
//! spacing. The neckline is the mean of the opposite extremes between them.

use super::{
    closeness, crossed_down, crossed_up, max_high, min_low, volume_contraction, window,
    ChartPattern, ChartPatternDetector, ChartPatternKind, PatternDraft,
};
use crate::config::PatternConfig;
use crate::pivots::find_price_pivots;
use crate::{Direction, OHLCV};

#[derive(Debug, Clone, Copy)]
pub struct HeadShouldersDetector {
    inverse: bool,
}

impl HeadShouldersDetector {
    /// Tops: three highs, bearish
    pub fn regular() -> Self {
        Self { inverse: false }
    }

    /// Bottoms: three lows, bullish
    pub fn inverse() -> Self {
        Self { inverse: true }
    }

    pub fn is_inverse(&self) -> bool {
        self.inverse
    }
}

impl ChartPatternDetector for HeadShouldersDetector {
    fn name(&self) -> &'static str {
        if self.inverse {
            "inverse_head_and_shoulders"
        } else {
            "head_and_shoulders"
        }
    }

    fn min_bars(&self, config: &PatternConfig) -> usize {
        (10 * config.pivot_distance.get()).max(20)
    }

    fn detect<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Vec<ChartPattern> {
        self.detect_one(candles, index, config).into_iter().collect()
    }
}

impl HeadShouldersDetector {
    fn detect_one<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Option<ChartPattern> {
        if index >= candles.len() {
            return None;
        }
        let range = window(index, config.lookback.get());
        let distance = config.pivot_distance.get();
        let pivots = find_price_pivots(candles, range.start, range.end, distance);
        let points = if self.inverse {
            pivots.last_lows(3)
        } else {
            pivots.last_highs(3)
        };
        let &[left, head, right] = points else {
            return None;
        };
        if index - right.index > config.max_pattern_age.get() {
            return None;
        }

        // Flip comparisons so one code path handles both orientations
        let sign = if self.inverse { -1.0 } else { 1.0 };
        if sign * head.value <= sign * left.value || sign * head.value <= sign * right.value {
            return None;
        }

        let shoulder_diff = (left.value - right.value).abs() / left.value.max(right.value);
        let shoulder_tolerance = config.shoulder_tolerance.get();
        if shoulder_diff >= shoulder_tolerance {
            return None;
        }

        let left_span = (head.index - left.index) as f64;
        let right_span = (right.index - head.index) as f64;
        let asymmetry = (left_span - right_span).abs() / left_span.max(right_span);
        let symmetry_tolerance = config.symmetry_tolerance.get();
        if asymmetry > symmetry_tolerance {
            return None;
        }

        let (v1, v2) = if self.inverse {
            (
                max_high(candles, left.index + 1..head.index)?,
                max_high(candles, head.index + 1..right.index)?,
            )
        } else {
            (
                min_low(candles, left.index + 1..head.index)?,
                min_low(candles, head.index + 1..right.index)?,
            )
        };
        let neckline = (v1.1 + v2.1) / 2.0;
        if sign * (left.value - neckline) <= 0.0 || sign * (right.value - neckline) <= 0.0 {
            return None;
        }

        let height = (head.value - neckline).abs();
        let target = neckline - sign * height;
        let shoulders = (left.value + right.value) / 2.0;
        let prominence = (sign * (head.value - shoulders) / height * 2.0).clamp(0.0, 1.0);

        let (kind, direction, confirmed) = if self.inverse {
            (
                ChartPatternKind::InverseHeadAndShoulders,
                Direction::Bullish,
                crossed_up(candles, index, neckline),
            )
        } else {
            (
                ChartPatternKind::HeadAndShoulders,
                Direction::Bearish,
                crossed_down(candles, index, neckline),
            )
        };

        // Volume should fade from the left shoulder to the right
        let around = |i: usize| i.saturating_sub(distance)..i + distance + 1;
        let volume = volume_contraction(candles, around(left.index), around(right.index));

        PatternDraft {
            kind,
            direction,
            span: (left.index, index),
            levels: vec![
                ("left_shoulder", left.value),
                ("head", head.value),
                ("right_shoulder", right.value),
                ("neckline", neckline),
            ],
            factors: vec![
                (0.3, Some(closeness(shoulder_diff, shoulder_tolerance))),
                (0.25, Some(closeness(asymmetry, symmetry_tolerance))),
                (0.25, Some(prominence)),
                (0.2, volume),
            ],
            target_price: Some(target),
            confirmed,
        }
        .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::path;
    use super::*;
    use crate::Ratio;

    const TOP: &[(usize, f64)] = &[
        (0, 90.0),
        (8, 105.0),
        (16, 95.0),
        (24, 115.0),
        (32, 95.0),
        (40, 105.0),
        (48, 98.0),
    ];

    #[test]
    fn test_head_and_shoulders() {
        let candles = path(TOP);
        let found = HeadShouldersDetector::regular().detect(&candles, 46, &PatternConfig::default());
        assert_eq!(found.len(), 1);
        let p = &found[0];
        assert_eq!(p.kind, ChartPatternKind::HeadAndShoulders);
        assert_eq!(p.direction, Direction::Bearish);
        assert!(!p.confirmed);
        assert!((p.level("neckline").unwrap() - 94.9).abs() < 1e-9);
        assert!((p.target_price.unwrap() - 74.7).abs() < 1e-6);
        assert!(p.reliability > 0.8);
    }

    #[test]
    fn test_neckline_break_confirms() {
        let mut anchors = TOP[..6].to_vec();
        anchors.push((48, 90.0));
        let candles = path(&anchors);
        let found = HeadShouldersDetector::regular().detect(&candles, 46, &PatternConfig::default());
        assert_eq!(found.len(), 1);
        assert!(found[0].confirmed);
    }

    #[test]
    fn test_inverse() {
        let candles = path(&[
            (0, 110.0),
            (8, 95.0),
            (16, 105.0),
            (24, 85.0),
            (32, 105.0),
            (40, 95.0),
            (48, 102.0),
        ]);
        let regular = HeadShouldersDetector::regular().detect(&candles, 46, &PatternConfig::default());
        assert!(regular.is_empty());

        let found = HeadShouldersDetector::inverse().detect(&candles, 46, &PatternConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ChartPatternKind::InverseHeadAndShoulders);
        assert_eq!(found[0].direction, Direction::Bullish);
        assert!((found[0].target_price.unwrap() - 125.3).abs() < 1e-6);
    }

    #[test]
    fn test_shoulder_tolerance_is_exclusive() {
        let candles = path(&[
            (0, 90.0),
            (8, 105.0),
            (16, 95.0),
            (24, 115.0),
            (32, 95.0),
            (40, 100.0),
            (48, 98.0),
        ]);
        // Shoulder pivots sit on the candle highs
        let (left, right) = (105.0_f64 + 0.1, 100.0_f64 + 0.1);
        let diff = (left - right).abs() / left.max(right);
        let with_tolerance = |tolerance: f64| PatternConfig {
            shoulder_tolerance: Ratio::new(tolerance).unwrap(),
            ..PatternConfig::default()
        };
        let detector = HeadShouldersDetector::regular();

        assert!(detector.detect(&candles, 46, &with_tolerance(diff)).is_empty());
        assert_eq!(detector.detect(&candles, 46, &with_tolerance(diff * 1.01)).len(), 1);
    }

    #[test]
    fn test_uneven_shoulders_rejected() {
        let candles = path(&[
            (0, 90.0),
            (8, 105.0),
            (16, 95.0),
            (24, 115.0),
            (32, 95.0),
            (40, 96.0),
            (48, 90.0),
        ]);
        assert!(HeadShouldersDetector::regular()
            .detect(&candles, 46, &PatternConfig::default())
            .is_empty());
    }
}
