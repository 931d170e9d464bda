//! Two-bar candlestick patterns: Bullish/Bearish Engulfing

use super::helpers::{is_usable, quality};
use crate::{Direction, OHLCVExt, PatternDetector, PatternId, PatternMatch, OHLCV};

impl_with_defaults!(EngulfingDetector);

/// Direction reversal where the second real body covers the first.
///
/// Reports `CDL_ENGULFING_BULL` or `CDL_ENGULFING_BEAR` depending on the
/// direction of the engulfing candle.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngulfingDetector;

impl PatternDetector for EngulfingDetector {
    fn id(&self) -> PatternId {
        PatternId("CDL_ENGULFING_BULL")
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 1 {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let cur = bars.get(index)?;
        if !is_usable(prev) || !is_usable(cur) {
            return None;
        }

        let prev_top = prev.open().max(prev.close());
        let prev_bottom = prev.open().min(prev.close());
        let cur_top = cur.open().max(cur.close());
        let cur_bottom = cur.open().min(cur.close());

        // Full-body overlap with a strictly larger body
        if cur_top < prev_top || cur_bottom > prev_bottom || cur.body() <= prev.body() {
            return None;
        }

        let (pattern_id, direction) = if prev.is_bearish() && cur.is_bullish() {
            (PatternId("CDL_ENGULFING_BULL"), Direction::Bullish)
        } else if prev.is_bullish() && cur.is_bearish() {
            (PatternId("CDL_ENGULFING_BEAR"), Direction::Bearish)
        } else {
            return None;
        };

        // 0.3 for a bare engulf, 1.0 once the body is twice the previous one
        let ratio = if prev.body() > f64::EPSILON {
            cur.body() / prev.body()
        } else {
            2.0
        };

        Some(PatternMatch {
            pattern_id,
            direction,
            strength: quality(0.3 + 0.7 * (ratio - 1.0)),
            start_index: index - 1,
            end_index: index,
        })
    }
}
