//! Flags and pennants: a sharp pole followed by a tight consolidation
//!
//! The consolidation is the `flag_length` bars before the current candle and
//! the pole is the `pole_length` bars before that. The current candle is the
//! breakout candidate.

use super::{
    closeness, max_high, min_low, volume_contraction, ChartPattern, ChartPatternDetector,
    ChartPatternKind, PatternDraft,
};
use crate::config::PatternConfig;
use crate::trendline::Trendline;
use crate::{Direction, OHLCV};

/// Consolidation range must stay under this share of the pole
const MAX_RANGE_RATIO: f64 = 0.5;
/// Deepest allowed pullback into the pole
const MAX_RETRACE: f64 = 0.5;
/// Second-half range below this share of the first half reads as a pennant
const PENNANT_CONTRACTION: f64 = 0.6;

#[derive(Debug, Clone, Copy, Default)]
pub struct FlagDetector;

impl ChartPatternDetector for FlagDetector {
    fn name(&self) -> &'static str {
        "flag"
    }

    fn min_bars(&self, config: &PatternConfig) -> usize {
        config.pole_length.get() + config.flag_length.get() + 1
    }

    fn detect<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Vec<ChartPattern> {
        detect_flag(candles, index, config).into_iter().collect()
    }
}

fn detect_flag<T: OHLCV>(candles: &[T], index: usize, config: &PatternConfig) -> Option<ChartPattern> {
    let (pole_len, flag_len) = (config.pole_length.get(), config.flag_length.get());
    if index >= candles.len() || index < pole_len + flag_len {
        return None;
    }
    let flag_start = index - flag_len;
    let pole_start = flag_start - pole_len;
    let pole_end = flag_start - 1;

    let base = candles[pole_start].close();
    let pole = candles[pole_end].close() - base;
    let pole_height = pole.abs();
    if !base.is_finite() || base <= 0.0 || !pole.is_finite() {
        return None;
    }
    let pole_move = pole_height / base;
    let min_pole_move = config.min_pole_move.get();
    if pole_move < min_pole_move {
        return None;
    }
    let bullish = pole > 0.0;

    let flag = flag_start..index;
    let (_, upper) = max_high(candles, flag.clone())?;
    let (_, lower) = min_low(candles, flag.clone())?;
    let range_ratio = (upper - lower) / pole_height;
    if range_ratio >= MAX_RANGE_RATIO {
        return None;
    }

    let pole_top = candles[pole_end].close();
    let pullback = if bullish { pole_top - lower } else { upper - pole_top };
    let retrace = pullback / pole_height;
    if retrace > MAX_RETRACE {
        return None;
    }

    let half = flag_start + flag_len / 2;
    let spread = |r: std::ops::Range<usize>| -> Option<f64> {
        Some(max_high(candles, r.clone())?.1 - min_low(candles, r)?.1)
    };
    let pennant = spread(half..index)? < PENNANT_CONTRACTION * spread(flag_start..half)?;

    let drift = Trendline::fit_xy(flag.clone().map(|i| (i as f64, candles[i].close())))?;
    let reference = (upper + lower) / 2.0;
    let slope = drift.normalized_slope(reference);
    let flat = config.flat_slope_threshold;

    let kind = match (bullish, pennant) {
        (true, true) => ChartPatternKind::BullishPennant,
        (false, true) => ChartPatternKind::BearishPennant,
        // Flags drift against the pole or sideways
        (true, false) if slope <= flat => ChartPatternKind::BullFlag,
        (false, false) if slope >= -flat => ChartPatternKind::BearFlag,
        _ => return None,
    };

    let close = candles[index].close();
    let (direction, confirmed, target) = if bullish {
        (Direction::Bullish, close > upper, upper + pole_height)
    } else {
        (Direction::Bearish, close < lower, lower - pole_height)
    };

    PatternDraft {
        kind,
        direction,
        span: (pole_start, index),
        levels: vec![("pole_base", base), ("upper", upper), ("lower", lower)],
        factors: vec![
            (0.3, Some((pole_move / (2.0 * min_pole_move)).min(1.0))),
            (0.25, Some(closeness(range_ratio, MAX_RANGE_RATIO))),
            (0.25, Some(closeness(retrace.max(0.0), MAX_RETRACE))),
            (0.2, volume_contraction(candles, pole_start..flag_start, flag)),
        ],
        target_price: Some(target),
        confirmed,
    }
    .finish()
}
