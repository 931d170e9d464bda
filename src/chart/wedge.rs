//! Rising and falling wedges: both boundary lines slope the same way and converge

use super::{
    crossed_down, crossed_up, fit_channel, ChartPattern, ChartPatternDetector, ChartPatternKind,
    PatternDraft,
};
use crate::config::PatternConfig;
use crate::{Direction, OHLCV};

#[derive(Debug, Clone, Copy, Default)]
pub struct WedgeDetector;

impl ChartPatternDetector for WedgeDetector {
    fn name(&self) -> &'static str {
        "wedge"
    }

    fn min_bars(&self, config: &PatternConfig) -> usize {
        (8 * config.pivot_distance.get()).max(15)
    }

    fn detect<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Vec<ChartPattern> {
        detect_wedge(candles, index, config).into_iter().collect()
    }
}

fn detect_wedge<T: OHLCV>(candles: &[T], index: usize, config: &PatternConfig) -> Option<ChartPattern> {
    if index >= candles.len() {
        return None;
    }
    let ch = fit_channel(candles, index, config)?;
    let flat = config.flat_slope_threshold;
    let (rs, ss) = (ch.resistance_slope, ch.support_slope);

    // Rising: support climbs faster than resistance. Falling: resistance drops faster.
    let kind = if rs > flat && ss > flat && ss > rs {
        ChartPatternKind::RisingWedge
    } else if rs < -flat && ss < -flat && rs < ss {
        ChartPatternKind::FallingWedge
    } else {
        return None;
    };

    let start_height = ch.height_at(ch.start);
    let height = ch.height_at(index);
    if start_height <= 0.0 || height <= 0.0 || height >= start_height {
        return None;
    }

    let x = index as f64;
    let resistance = ch.resistance.value_at(x);
    let support = ch.support.value_at(x);
    let base = ch.start as f64;

    // Rising wedges break down toward their base, falling wedges break up
    let (direction, confirmed, target) = match kind {
        ChartPatternKind::RisingWedge => (
            Direction::Bearish,
            crossed_down(candles, index, support),
            ch.support.value_at(base),
        ),
        _ => (
            Direction::Bullish,
            crossed_up(candles, index, resistance),
            ch.resistance.value_at(base),
        ),
    };

    let convergence = ((1.0 - height / start_height) * 2.0).clamp(0.0, 1.0);

    PatternDraft {
        kind,
        direction,
        span: (ch.start, index),
        levels: vec![("resistance", resistance), ("support", support)],
        factors: vec![
            (0.3, Some(ch.touch_score())),
            (0.3, ch.fit_quality()),
            (0.2, Some(convergence)),
            (0.2, ch.volume_score(candles, index)),
        ],
        target_price: Some(target),
        confirmed,
    }
    .finish()
}
