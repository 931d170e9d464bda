//! Three-bar candlestick patterns: Morning Star, Evening Star

use super::helpers::{self, is_usable, penetration, quality};
use crate::config::CandlestickConfig;
use crate::{Direction, OHLCVExt, PatternDetector, PatternId, PatternMatch, OHLCV};

impl_with_defaults!(MorningStarDetector, EveningStarDetector);

/// Bearish candle, small-bodied star, bullish close above the first body's midpoint
#[derive(Debug, Clone, Copy)]
pub struct MorningStarDetector {
    pub star_body_ratio: f64,
}

impl Default for MorningStarDetector {
    fn default() -> Self {
        Self {
            star_body_ratio: helpers::STAR_BODY_RATIO,
        }
    }
}

impl MorningStarDetector {
    pub fn from_config(config: &CandlestickConfig) -> Self {
        Self {
            star_body_ratio: config.star_body_ratio.get(),
        }
    }
}

impl PatternDetector for MorningStarDetector {
    fn id(&self) -> PatternId {
        PatternId("CDL_MORNINGSTAR")
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let (first, star, last) = triple(bars, index)?;

        if !first.is_bearish() || !last.is_bullish() {
            return None;
        }
        if star.body() > first.body() * self.star_body_ratio {
            return None;
        }
        // Star trades below the first close, last candle closes through the midpoint
        if star.open().max(star.close()) > first.close() + first.body() * self.star_body_ratio {
            return None;
        }
        if last.close() <= first.body_midpoint() {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bullish,
            strength: star_quality(first.body(), star.body(), penetration(first, last.close())),
            start_index: index - 2,
            end_index: index,
        })
    }
}

/// Bullish candle, small-bodied star, bearish close below the first body's midpoint
#[derive(Debug, Clone, Copy)]
pub struct EveningStarDetector {
    pub star_body_ratio: f64,
}

impl Default for EveningStarDetector {
    fn default() -> Self {
        Self {
            star_body_ratio: helpers::STAR_BODY_RATIO,
        }
    }
}

impl EveningStarDetector {
    pub fn from_config(config: &CandlestickConfig) -> Self {
        Self {
            star_body_ratio: config.star_body_ratio.get(),
        }
    }
}

impl PatternDetector for EveningStarDetector {
    fn id(&self) -> PatternId {
        PatternId("CDL_EVENINGSTAR")
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let (first, star, last) = triple(bars, index)?;

        if !first.is_bullish() || !last.is_bearish() {
            return None;
        }
        if star.body() > first.body() * self.star_body_ratio {
            return None;
        }
        if star.open().min(star.close()) < first.close() - first.body() * self.star_body_ratio {
            return None;
        }
        if last.close() >= first.body_midpoint() {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bearish,
            strength: star_quality(first.body(), star.body(), penetration(first, last.close())),
            start_index: index - 2,
            end_index: index,
        })
    }
}

#[inline]
fn triple<T: OHLCV>(bars: &[T], index: usize) -> Option<(&T, &T, &T)> {
    if index < 2 {
        return None;
    }
    let first = bars.get(index - 2)?;
    let star = bars.get(index - 1)?;
    let last = bars.get(index)?;
    if !is_usable(first) || !is_usable(star) || !is_usable(last) || first.body() <= f64::EPSILON {
        return None;
    }
    Some((first, star, last))
}

#[inline]
fn star_quality(first_body: f64, star_body: f64, penetration: f64) -> f64 {
    let smallness = quality(1.0 - star_body / first_body);
    quality(0.2 + 0.4 * smallness + 0.4 * penetration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(o, h, l, c, 1000.0)
    }

    #[test]
    fn test_morning_star() {
        let bars = [
            bar(110.0, 110.5, 99.5, 100.0),
            bar(99.0, 99.8, 97.5, 98.5),
            bar(99.0, 108.5, 98.8, 108.0),
        ];
        let m = MorningStarDetector::with_defaults().detect(&bars, 2).unwrap();
        assert_eq!(m.direction, Direction::Bullish);
        assert_eq!(m.start_index, 0);
        assert!(m.strength > 0.5);
    }

    #[test]
    fn test_morning_star_needs_close_through_midpoint() {
        let bars = [
            bar(110.0, 110.5, 99.5, 100.0),
            bar(99.0, 99.8, 97.5, 98.5),
            bar(99.0, 104.5, 98.8, 104.0),
        ];
        assert!(MorningStarDetector::with_defaults().detect(&bars, 2).is_none());
    }

    #[test]
    fn test_morning_star_rejects_large_star() {
        let bars = [
            bar(110.0, 110.5, 99.5, 100.0),
            bar(99.0, 99.8, 94.5, 95.0),
            bar(99.0, 108.5, 98.8, 108.0),
        ];
        assert!(MorningStarDetector::with_defaults().detect(&bars, 2).is_none());
    }

    #[test]
    fn test_evening_star() {
        let bars = [
            bar(100.0, 110.5, 99.5, 110.0),
            bar(111.0, 112.5, 110.2, 111.5),
            bar(111.0, 111.2, 101.5, 102.0),
        ];
        let m = EveningStarDetector::with_defaults().detect(&bars, 2).unwrap();
        assert_eq!(m.direction, Direction::Bearish);
        assert_eq!(m.pattern_id.display_name(), "Evening Star");
    }

    #[test]
    fn test_needs_three_bars() {
        let bars = [bar(110.0, 110.5, 99.5, 100.0), bar(99.0, 99.8, 97.5, 98.5)];
        assert!(MorningStarDetector::with_defaults().detect(&bars, 1).is_none());
    }
}
