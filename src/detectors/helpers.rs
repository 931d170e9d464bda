//! Common body/shadow checks shared by the candlestick detectors

use crate::{OHLCVExt, OHLCV};

// ============================================================
// DEFAULT THRESHOLDS
// ============================================================

/// body / range below this is a doji
pub const DOJI_RATIO: f64 = 0.1;
/// Long shadow must exceed this multiple of the body
pub const SHADOW_BODY_MULTIPLE: f64 = 2.0;
/// Opposite shadow must stay below this fraction of the body
pub const OPPOSITE_SHADOW_RATIO: f64 = 0.5;
/// Star body must stay below this fraction of the first candle's body
pub const STAR_BODY_RATIO: f64 = 0.3;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// Finite prices with high >= low and a non-zero range
#[inline]
pub fn is_usable<T: OHLCV>(bar: &T) -> bool {
    let (o, h, l, c) = (bar.open(), bar.high(), bar.low(), bar.close());
    o.is_finite() && h.is_finite() && l.is_finite() && c.is_finite() && h >= l && bar.range() > f64::EPSILON
}

/// body / range strictly below `ratio`
#[inline]
pub fn is_doji(body: f64, range: f64, ratio: f64) -> bool {
    range > f64::EPSILON && body / range < ratio
}

/// Shadow strictly longer than `multiple × body`; needs a real body
#[inline]
pub fn is_long_shadow(shadow: f64, body: f64, multiple: f64) -> bool {
    body > f64::EPSILON && shadow > body * multiple
}

/// Shadow strictly shorter than `ratio × body`
#[inline]
pub fn is_short_shadow(shadow: f64, body: f64, ratio: f64) -> bool {
    shadow < body * ratio
}

/// Clamp a raw score into 0.0..=1.0 (NaN -> 0)
#[inline]
pub fn quality(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// How far a close pushed past the first candle's body midpoint, as a
/// fraction of half that body
#[inline]
pub fn penetration<T: OHLCV>(first: &T, close: f64) -> f64 {
    let half = first.body() / 2.0;
    if half <= f64::EPSILON {
        return 0.0;
    }
    ((close - first.body_midpoint()).abs() / half).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    #[test]
    fn test_doji_ratio_is_strict() {
        assert!(is_doji(0.9, 10.0, DOJI_RATIO));
        assert!(!is_doji(1.0, 10.0, DOJI_RATIO));
        assert!(!is_doji(0.0, 0.0, DOJI_RATIO));
    }

    #[test]
    fn test_shadow_checks() {
        assert!(is_long_shadow(2.1, 1.0, 2.0));
        assert!(!is_long_shadow(2.0, 1.0, 2.0));
        assert!(!is_long_shadow(5.0, 0.0, 2.0));
        assert!(is_short_shadow(0.4, 1.0, 0.5));
        assert!(!is_short_shadow(0.5, 1.0, 0.5));
    }

    #[test]
    fn test_usable() {
        assert!(is_usable(&Candle::new(1.0, 2.0, 0.5, 1.5, 0.0)));
        assert!(!is_usable(&Candle::new(1.0, 1.0, 1.0, 1.0, 0.0)));
        assert!(!is_usable(&Candle::new(f64::NAN, 2.0, 0.5, 1.5, 0.0)));
    }

    #[test]
    fn test_penetration() {
        let first = Candle::new(110.0, 111.0, 99.0, 100.0, 0.0);
        assert!((penetration(&first, 107.5) - 0.5).abs() < 1e-12);
        assert_eq!(penetration(&first, 120.0), 1.0);
    }
}
