//! Single-bar candlestick patterns: Doji, Hammer, Shooting Star

use super::helpers::{self, is_doji, is_long_shadow, is_short_shadow, is_usable, quality};
use crate::config::CandlestickConfig;
use crate::{Direction, OHLCVExt, PatternDetector, PatternId, PatternMatch, OHLCV};

impl_with_defaults!(DojiDetector, HammerDetector, ShootingStarDetector);

// ============================================================
// DOJI
// ============================================================

/// Body under `doji_ratio` of the range
#[derive(Debug, Clone, Copy)]
pub struct DojiDetector {
    pub doji_ratio: f64,
}

impl Default for DojiDetector {
    fn default() -> Self {
        Self {
            doji_ratio: helpers::DOJI_RATIO,
        }
    }
}

impl DojiDetector {
    pub fn from_config(config: &CandlestickConfig) -> Self {
        Self {
            doji_ratio: config.doji_ratio.get(),
        }
    }
}

impl PatternDetector for DojiDetector {
    fn id(&self) -> PatternId {
        PatternId("CDL_DOJI")
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if !is_usable(bar) {
            return None;
        }
        let (body, range) = (bar.body(), bar.range());
        if !is_doji(body, range, self.doji_ratio) {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Neutral,
            strength: quality(1.0 - body / range / self.doji_ratio),
            start_index: index,
            end_index: index,
        })
    }
}

// ============================================================
// HAMMER / SHOOTING STAR
// ============================================================

/// Long lower shadow, short upper shadow
#[derive(Debug, Clone, Copy)]
pub struct HammerDetector {
    pub shadow_body_multiple: f64,
    pub opposite_shadow_ratio: f64,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self {
            shadow_body_multiple: helpers::SHADOW_BODY_MULTIPLE,
            opposite_shadow_ratio: helpers::OPPOSITE_SHADOW_RATIO,
        }
    }
}

impl HammerDetector {
    pub fn from_config(config: &CandlestickConfig) -> Self {
        Self {
            shadow_body_multiple: config.shadow_body_multiple,
            opposite_shadow_ratio: config.opposite_shadow_ratio,
        }
    }
}

impl PatternDetector for HammerDetector {
    fn id(&self) -> PatternId {
        PatternId("CDL_HAMMER")
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if !is_usable(bar) {
            return None;
        }
        let body = bar.body();
        let (long, short) = (bar.lower_shadow(), bar.upper_shadow());
        shadow_reversal(
            self.id(),
            Direction::Bullish,
            index,
            body,
            long,
            short,
            self.shadow_body_multiple,
            self.opposite_shadow_ratio,
        )
    }
}

/// Long upper shadow, short lower shadow
#[derive(Debug, Clone, Copy)]
pub struct ShootingStarDetector {
    pub shadow_body_multiple: f64,
    pub opposite_shadow_ratio: f64,
}

impl Default for ShootingStarDetector {
    fn default() -> Self {
        Self {
            shadow_body_multiple: helpers::SHADOW_BODY_MULTIPLE,
            opposite_shadow_ratio: helpers::OPPOSITE_SHADOW_RATIO,
        }
    }
}

impl ShootingStarDetector {
    pub fn from_config(config: &CandlestickConfig) -> Self {
        Self {
            shadow_body_multiple: config.shadow_body_multiple,
            opposite_shadow_ratio: config.opposite_shadow_ratio,
        }
    }
}

impl PatternDetector for ShootingStarDetector {
    fn id(&self) -> PatternId {
        PatternId("CDL_SHOOTINGSTAR")
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if !is_usable(bar) {
            return None;
        }
        let body = bar.body();
        let (long, short) = (bar.upper_shadow(), bar.lower_shadow());
        shadow_reversal(
            self.id(),
            Direction::Bearish,
            index,
            body,
            long,
            short,
            self.shadow_body_multiple,
            self.opposite_shadow_ratio,
        )
    }
}

#[allow(clippy::too_many_arguments)]
#[inline]
fn shadow_reversal(
    id: PatternId,
    direction: Direction,
    index: usize,
    body: f64,
    long: f64,
    short: f64,
    multiple: f64,
    opposite_ratio: f64,
) -> Option<PatternMatch> {
    if !is_long_shadow(long, body, multiple) || !is_short_shadow(short, body, opposite_ratio) {
        return None;
    }
    // Longer tail and cleaner opposite side score higher
    let tail = quality((long / body - multiple) / multiple);
    let clean = quality(1.0 - short / (body * opposite_ratio));

    Some(PatternMatch {
        pattern_id: id,
        direction,
        strength: quality(0.4 + 0.4 * tail + 0.2 * clean),
        start_index: index,
        end_index: index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(o, h, l, c, 1000.0)
    }

    #[test]
    fn test_doji() {
        let d = DojiDetector::with_defaults();
        let m = d.detect(&[bar(100.0, 105.0, 95.0, 100.2)], 0).unwrap();
        assert_eq!(m.direction, Direction::Neutral);
        assert!(m.strength > 0.7);
        assert!(d.detect(&[bar(100.0, 105.0, 95.0, 102.0)], 0).is_none());
    }

    #[test]
    fn test_hammer() {
        let d = HammerDetector::with_defaults();
        // body 1, lower shadow 5, upper shadow 0.2
        let m = d.detect(&[bar(100.0, 101.2, 95.0, 101.0)], 0).unwrap();
        assert_eq!(m.direction, Direction::Bullish);
        assert!(m.strength >= 0.4 && m.strength <= 1.0);
    }

    #[test]
    fn test_hammer_rejects_long_upper_shadow() {
        let d = HammerDetector::with_defaults();
        assert!(d.detect(&[bar(100.0, 102.0, 95.0, 101.0)], 0).is_none());
    }

    #[test]
    fn test_shooting_star() {
        let d = ShootingStarDetector::with_defaults();
        let m = d.detect(&[bar(101.0, 106.0, 99.8, 100.0)], 0).unwrap();
        assert_eq!(m.direction, Direction::Bearish);
        assert!(HammerDetector::with_defaults()
            .detect(&[bar(101.0, 106.0, 99.8, 100.0)], 0)
            .is_none());
    }

    #[test]
    fn test_zero_range_is_ignored() {
        let flat = [bar(100.0, 100.0, 100.0, 100.0)];
        assert!(DojiDetector::with_defaults().detect(&flat, 0).is_none());
        assert!(HammerDetector::with_defaults().detect(&flat, 0).is_none());
    }

    #[test]
    fn test_out_of_bounds() {
        let bars = [bar(100.0, 105.0, 95.0, 100.2)];
        assert!(DojiDetector::with_defaults().detect(&bars, 1).is_none());
    }
}
