//! Ascending, descending and symmetrical triangles
//!
//! Classified from the normalized slopes of the resistance (highs) and
//! support (lows) lines against `flat_slope_threshold`:
//!
//! - ascending: flat resistance, rising support
//! - descending: falling resistance, flat support
//! - symmetrical: falling resistance, rising support
//!
//! Anything else is left to the wedge and rectangle detectors.

use super::{
    crossed_down, crossed_up, fit_channel, ChartPattern, ChartPatternDetector, ChartPatternKind,
    PatternDraft,
};
use crate::config::PatternConfig;
use crate::{Direction, OHLCV};

#[derive(Debug, Clone, Copy, Default)]
pub struct TriangleDetector;

impl ChartPatternDetector for TriangleDetector {
    fn name(&self) -> &'static str {
        "triangle"
    }

    fn min_bars(&self, config: &PatternConfig) -> usize {
        (8 * config.pivot_distance.get()).max(15)
    }

    fn detect<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Vec<ChartPattern> {
        detect_triangle(candles, index, config).into_iter().collect()
    }
}

fn detect_triangle<T: OHLCV>(candles: &[T], index: usize, config: &PatternConfig) -> Option<ChartPattern> {
    if index >= candles.len() {
        return None;
    }
    let ch = fit_channel(candles, index, config)?;
    let flat = config.flat_slope_threshold;
    let (rs, ss) = (ch.resistance_slope, ch.support_slope);

    let kind = if rs.abs() < flat && ss > flat {
        ChartPatternKind::AscendingTriangle
    } else if ss.abs() < flat && rs < -flat {
        ChartPatternKind::DescendingTriangle
    } else if rs < -flat && ss > flat {
        ChartPatternKind::SymmetricalTriangle
    } else {
        return None;
    };

    let x = index as f64;
    let resistance = ch.resistance.value_at(x);
    let support = ch.support.value_at(x);
    // Lines already crossed: the apex is behind us
    if resistance <= support {
        return None;
    }
    let height = ch.height_at(ch.start);
    if height <= 0.0 {
        return None;
    }

    let up = crossed_up(candles, index, resistance);
    let down = crossed_down(candles, index, support);
    let (direction, confirmed, target) = match kind {
        ChartPatternKind::AscendingTriangle => (Direction::Bullish, up, Some(resistance + height)),
        ChartPatternKind::DescendingTriangle => (Direction::Bearish, down, Some(support - height)),
        _ if up => (Direction::Bullish, true, Some(resistance + height)),
        _ if down => (Direction::Bearish, true, Some(support - height)),
        _ => (Direction::Neutral, false, None),
    };

    let apex = ch.resistance.convergence(&ch.support);
    // Breakouts are most reliable between half and ~85% of the way to the apex
    let apex_score = apex.map(|c| {
        let length = c.index - ch.start as f64;
        if length <= 0.0 {
            return 0.0;
        }
        let position = (x - ch.start as f64) / length;
        if (0.5..=0.85).contains(&position) {
            1.0
        } else if position < 1.0 {
            0.6
        } else {
            0.0
        }
    });

    let mut levels = vec![("resistance", resistance), ("support", support)];
    if let Some(c) = apex {
        levels.push(("apex", c.price));
    }

    PatternDraft {
        kind,
        direction,
        span: (ch.start, index),
        levels,
        factors: vec![
            (0.3, Some(ch.touch_score())),
            (0.3, ch.fit_quality()),
            (0.2, apex_score),
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

    const ASCENDING: &[(usize, f64)] = &[
        (0, 95.0),
        (8, 110.0),
        (16, 100.0),
        (24, 110.0),
        (32, 103.0),
        (40, 110.0),
        (48, 106.0),
        (56, 110.0),
        (62, 108.0),
    ];

    #[test]
    fn test_ascending_triangle() {
        let candles = path(ASCENDING);
        let found = TriangleDetector.detect(&candles, 60, &PatternConfig::default());
        assert_eq!(found.len(), 1);
        let p = &found[0];
        assert_eq!(p.kind, ChartPatternKind::AscendingTriangle);
        assert_eq!(p.direction, Direction::Bullish);
        assert!(!p.confirmed);
        assert!((p.level("resistance").unwrap() - 110.1).abs() < 1e-6);
        assert!(p.target_price.unwrap() > 115.0);
        assert!(p.reliability >= 0.75);
    }

    #[test]
    fn test_ascending_breakout_confirmed() {
        let mut anchors = ASCENDING[..8].to_vec();
        anchors.push((62, 113.0));
        let candles = path(&anchors);
        let found = TriangleDetector.detect(&candles, 57, &PatternConfig::default());
        assert_eq!(found.len(), 1);
        assert!(found[0].confirmed);
    }

    #[test]
    fn test_descending_triangle() {
        let candles = path(&[
            (0, 125.0),
            (8, 110.0),
            (16, 120.0),
            (24, 110.0),
            (32, 117.0),
            (40, 110.0),
            (48, 114.0),
            (56, 110.0),
            (62, 112.0),
        ]);
        let found = TriangleDetector.detect(&candles, 60, &PatternConfig::default());
        assert_eq!(found[0].kind, ChartPatternKind::DescendingTriangle);
        assert_eq!(found[0].direction, Direction::Bearish);
        assert!(found[0].target_price.unwrap() < 110.0);
    }

    #[test]
    fn test_symmetrical_triangle() {
        let candles = path(&[
            (0, 100.0),
            (8, 120.0),
            (16, 100.0),
            (24, 117.0),
            (32, 103.0),
            (40, 114.0),
            (48, 106.0),
            (56, 111.0),
            (62, 108.5),
        ]);
        let found = TriangleDetector.detect(&candles, 60, &PatternConfig::default());
        assert_eq!(found[0].kind, ChartPatternKind::SymmetricalTriangle);
        assert_eq!(found[0].direction, Direction::Neutral);
        assert!(found[0].level("apex").is_some());
    }

    #[test]
    fn test_parallel_channel_is_not_a_triangle() {
        let candles = path(&[
            (0, 100.0),
            (8, 110.0),
            (16, 102.0),
            (24, 112.0),
            (32, 104.0),
            (40, 114.0),
            (48, 106.0),
            (56, 116.0),
            (62, 112.0),
        ]);
        assert!(TriangleDetector.detect(&candles, 60, &PatternConfig::default()).is_empty());
    }

    #[test]
    fn test_short_history() {
        let candles = path(&[(0, 100.0), (5, 110.0), (10, 100.0)]);
        for i in 0..candles.len() {
            assert!(TriangleDetector.detect(&candles, i, &PatternConfig::default()).is_empty());
        }
    }
}
