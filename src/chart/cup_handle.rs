//! Cup and handle
//!
//! Two rims of similar height with a rounded bottom between them, followed
//! by a shallow pullback (the handle) from the right rim.

use super::{
    closeness, crossed_up, min_low, window, ChartPattern, ChartPatternDetector, ChartPatternKind,
    PatternDraft,
};
use crate::config::PatternConfig;
use crate::pivots::find_price_pivots;
use crate::{Direction, OHLCV};

/// Minimum bars between the two rims
const MIN_CUP_WIDTH: usize = 15;
/// Bottom must sit in this share of the cup width
const BOTTOM_POSITION: (f64, f64) = (0.25, 0.75);
/// Depths beyond this still qualify but score lower
const IDEAL_MAX_DEPTH: f64 = 0.33;

#[derive(Debug, Clone, Copy, Default)]
pub struct CupAndHandleDetector;

impl ChartPatternDetector for CupAndHandleDetector {
    fn name(&self) -> &'static str {
        "cup_and_handle"
    }

    fn min_bars(&self, _config: &PatternConfig) -> usize {
        30
    }

    fn detect<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Vec<ChartPattern> {
        detect_cup(candles, index, config).into_iter().collect()
    }
}

fn detect_cup<T: OHLCV>(candles: &[T], index: usize, config: &PatternConfig) -> Option<ChartPattern> {
    if index >= candles.len() {
        return None;
    }
    let range = window(index, config.lookback.get());
    let pivots = find_price_pivots(candles, range.start, range.end, config.pivot_distance.get());
    let right = *pivots.highs.last()?;
    if index - right.index > config.max_pattern_age.get() {
        return None;
    }

    let left = pivots
        .highs
        .iter()
        .filter(|p| p.index + MIN_CUP_WIDTH <= right.index)
        .max_by(|a, b| a.value.total_cmp(&b.value))
        .copied()?;
    let rim_diff = (left.value - right.value).abs() / left.value.max(right.value);
    let rim_tolerance = config.cup_rim_tolerance.get();
    if rim_diff > rim_tolerance {
        return None;
    }

    let (bottom_index, bottom) = min_low(candles, left.index + 1..right.index)?;
    let rim = (left.value + right.value) / 2.0;
    let depth = (rim - bottom) / rim;
    if depth < config.cup_min_depth || depth > config.cup_max_depth {
        return None;
    }

    let width = (right.index - left.index) as f64;
    let position = (bottom_index - left.index) as f64 / width;
    if position < BOTTOM_POSITION.0 || position > BOTTOM_POSITION.1 {
        return None;
    }

    // Handle: the pullback since the right rim
    let (_, handle_low) = min_low(candles, right.index + 1..index + 1)?;
    let cup_height = right.value - bottom;
    let retrace = (right.value - handle_low) / cup_height;
    let max_retrace = config.handle_max_retrace.get();
    if retrace <= 0.0 || retrace > max_retrace {
        return None;
    }

    // U-shaped cups spend a good share of their width near the bottom
    let floor = bottom + (rim - bottom) / 3.0;
    let near_bottom = candles[left.index..=right.index]
        .iter()
        .filter(|c| c.low() <= floor)
        .count() as f64;
    let roundness = (near_bottom / (width + 1.0) / 0.3).min(1.0);

    let depth_score = if depth <= IDEAL_MAX_DEPTH { 1.0 } else { 0.6 };
    let centering = 1.0 - (position - 0.5).abs() * 2.0;

    PatternDraft {
        kind: ChartPatternKind::CupAndHandle,
        direction: Direction::Bullish,
        span: (left.index, index),
        levels: vec![
            ("left_rim", left.value),
            ("right_rim", right.value),
            ("bottom", bottom),
            ("handle_low", handle_low),
        ],
        factors: vec![
            (0.25, Some(closeness(rim_diff, rim_tolerance))),
            (0.25, Some(depth_score)),
            (0.2, Some(centering)),
            (0.15, Some(closeness(retrace, max_retrace))),
            (0.15, Some(roundness)),
        ],
        target_price: Some(right.value + cup_height),
        confirmed: crossed_up(candles, index, right.value),
    }
    .finish()
}
