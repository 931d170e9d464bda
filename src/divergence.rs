//! Price/oscillator divergence classification
//!
//! Compares the two most recent price pivots of one kind (lows for bullish,
//! highs for bearish) with the oscillator pivots nearest to them.
//!
//! | kind            | price        | oscillator   |
//! |-----------------|--------------|--------------|
//! | regular bullish | lower low    | higher low   |
//! | regular bearish | higher high  | lower high   |
//! | hidden bullish  | higher low   | lower low    |
//! | hidden bearish  | lower high   | higher high  |

use serde::{Deserialize, Serialize};

use crate::config::DivergenceConfig;
use crate::pivots::{Pivot, Pivots};
use crate::Direction;

const REGULAR_BASE: f64 = 80.0;
const HIDDEN_BASE: f64 = 75.0;
const MAX_MAGNITUDE_BONUS: f64 = 15.0;
const MIN_STRENGTH: f64 = 50.0;
const MAX_STRENGTH: f64 = 100.0;

/// Price move (in %) that counts as large for confidence
const LARGE_PRICE_MOVE_PCT: f64 = 2.0;
/// Oscillator move (in % of its magnitude) that counts as large
const LARGE_OSC_MOVE_PCT: f64 = 10.0;
const SHORT_SEPARATION: usize = 10;
const LONG_SEPARATION: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DivergenceKind {
    RegularBullish,
    RegularBearish,
    HiddenBullish,
    HiddenBearish,
}

impl DivergenceKind {
    /// Signal value used by every oscillator evaluator
    pub fn label(self) -> &'static str {
        match self {
            DivergenceKind::RegularBullish => "Bullish Divergence",
            DivergenceKind::RegularBearish => "Bearish Divergence",
            DivergenceKind::HiddenBullish => "Hidden Bullish Divergence",
            DivergenceKind::HiddenBearish => "Hidden Bearish Divergence",
        }
    }

    #[inline]
    pub fn is_regular(self) -> bool {
        matches!(self, DivergenceKind::RegularBullish | DivergenceKind::RegularBearish)
    }

    pub fn direction(self) -> Direction {
        match self {
            DivergenceKind::RegularBullish | DivergenceKind::HiddenBullish => Direction::Bullish,
            DivergenceKind::RegularBearish | DivergenceKind::HiddenBearish => Direction::Bearish,
        }
    }
}

/// A classified divergence. Created fresh per call, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub kind: DivergenceKind,
    pub price_pivots: [Pivot; 2],
    pub oscillator_pivots: [Pivot; 2],
    /// 50..=100
    pub strength: f64,
    /// 0..=1
    pub confidence: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceParams {
    pub min_distance: usize,
    pub max_distance: usize,
    /// Minimum relative price move between the two pivots, in %
    pub min_price_move_pct: f64,
    /// Minimum absolute oscillator move between the two pivots
    pub min_osc_move: f64,
}

impl Default for DivergenceParams {
    fn default() -> Self {
        Self::from_config(&DivergenceConfig::default(), 0.0)
    }
}

impl DivergenceParams {
    pub fn from_config(config: &DivergenceConfig, min_osc_move: f64) -> Self {
        Self {
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_price_move_pct: config.min_price_move_pct,
            min_osc_move,
        }
    }
}

#[derive(Clone, Copy)]
enum Side {
    Lows,
    Highs,
}

/// Check both sides and return the stronger divergence.
/// On equal strength the one confirmed more recently wins.
pub fn detect(price: &Pivots, oscillator: &Pivots, params: &DivergenceParams) -> Option<Divergence> {
    let bullish = detect_bullish(&price.lows, &oscillator.lows, params);
    let bearish = detect_bearish(&price.highs, &oscillator.highs, params);
    match (bullish, bearish) {
        (Some(a), Some(b)) => {
            let a_key = (a.strength, a.price_pivots[1].index);
            let b_key = (b.strength, b.price_pivots[1].index);
            Some(if b_key > a_key { b } else { a })
        }
        (a, b) => a.or(b),
    }
}

/// Regular/hidden bullish divergence from low pivots
pub fn detect_bullish(
    price_lows: &[Pivot],
    osc_lows: &[Pivot],
    params: &DivergenceParams,
) -> Option<Divergence> {
    classify(price_lows, osc_lows, params, Side::Lows)
}

/// Regular/hidden bearish divergence from high pivots
pub fn detect_bearish(
    price_highs: &[Pivot],
    osc_highs: &[Pivot],
    params: &DivergenceParams,
) -> Option<Divergence> {
    classify(price_highs, osc_highs, params, Side::Highs)
}

fn classify(
    price: &[Pivot],
    osc: &[Pivot],
    params: &DivergenceParams,
    side: Side,
) -> Option<Divergence> {
    let [p1, p2] = last_two(price)?;

    let separation = p2.index.checked_sub(p1.index)?;
    if separation < params.min_distance || separation > params.max_distance {
        return None;
    }

    let o2 = nearest(osc, p2.index, params.max_distance, usize::MAX)?;
    let o1 = nearest(osc, p1.index, params.max_distance, o2.index)?;

    if p1.value.abs() < f64::EPSILON {
        return None;
    }
    let price_move_pct = ((p2.value - p1.value) / p1.value).abs() * 100.0;
    let osc_move = (o2.value - o1.value).abs();
    if !price_move_pct.is_finite() || !osc_move.is_finite() {
        return None;
    }
    if price_move_pct < params.min_price_move_pct || osc_move < params.min_osc_move {
        return None;
    }

    let price_up = p2.value > p1.value;
    let price_down = p2.value < p1.value;
    let osc_up = o2.value > o1.value;
    let osc_down = o2.value < o1.value;

    let kind = match side {
        Side::Lows if price_down && osc_up => DivergenceKind::RegularBullish,
        Side::Lows if price_up && osc_down => DivergenceKind::HiddenBullish,
        Side::Highs if price_up && osc_down => DivergenceKind::RegularBearish,
        Side::Highs if price_down && osc_up => DivergenceKind::HiddenBearish,
        _ => return None,
    };

    let osc_scale = o1.value.abs().max(o2.value.abs());
    let osc_move_pct = if osc_scale > f64::EPSILON {
        osc_move / osc_scale * 100.0
    } else {
        0.0
    };

    let base = if kind.is_regular() {
        REGULAR_BASE
    } else {
        HIDDEN_BASE
    };
    let bonus = (price_move_pct.min(10.0) * 0.5 + osc_move_pct.min(20.0) * 0.5).min(MAX_MAGNITUDE_BONUS);
    let multiplier = if separation < SHORT_SEPARATION {
        0.9
    } else if separation > LONG_SEPARATION {
        1.1
    } else {
        1.0
    };
    let strength = ((base + bonus) * multiplier).clamp(MIN_STRENGTH, MAX_STRENGTH);

    let mut confidence: f64 = 0.7;
    if price_move_pct >= LARGE_PRICE_MOVE_PCT {
        confidence += 0.1;
    }
    if osc_move_pct >= LARGE_OSC_MOVE_PCT {
        confidence += 0.1;
    }
    if (SHORT_SEPARATION..=LONG_SEPARATION).contains(&separation) {
        confidence += 0.1;
    }

    let description = format!(
        "{}: price {:.2} -> {:.2}, oscillator {:.2} -> {:.2} over {} bars",
        kind.label(),
        p1.value,
        p2.value,
        o1.value,
        o2.value,
        separation
    );

    Some(Divergence {
        kind,
        price_pivots: [p1, p2],
        oscillator_pivots: [o1, o2],
        strength,
        confidence: confidence.min(1.0),
        description,
    })
}

fn last_two(pivots: &[Pivot]) -> Option<[Pivot; 2]> {
    match pivots {
        [.., a, b] => Some([*a, *b]),
        _ => None,
    }
}

/// Oscillator pivot nearest to `index`, within `max_distance` bars and
/// strictly before `before`. Ties prefer the later pivot.
fn nearest(osc: &[Pivot], index: usize, max_distance: usize, before: usize) -> Option<Pivot> {
    osc.iter()
        .filter(|o| o.index < before && o.index.abs_diff(index) <= max_distance)
        .min_by_key(|o| (o.index.abs_diff(index), usize::MAX - o.index))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pivots(v: &[(usize, f64)]) -> Vec<Pivot> {
        v.iter().map(|&(i, x)| Pivot::new(i, x)).collect()
    }

    #[test]
    fn test_regular_bullish_reference_case() {
        let price = pivots(&[(5, 10.0), (15, 8.0)]);
        let osc = pivots(&[(5, 30.0), (15, 40.0)]);
        let d = detect_bullish(&price, &osc, &DivergenceParams::default()).unwrap();
        assert_eq!(d.kind, DivergenceKind::RegularBullish);
        assert!(d.strength >= 80.0);
        assert!((d.confidence - 1.0).abs() < 1e-12);
        assert_eq!(d.kind.label(), "Bullish Divergence");
    }

    #[test]
    fn test_hidden_bullish() {
        let price = pivots(&[(5, 8.0), (20, 10.0)]);
        let osc = pivots(&[(5, 40.0), (20, 30.0)]);
        let d = detect_bullish(&price, &osc, &DivergenceParams::default()).unwrap();
        assert_eq!(d.kind, DivergenceKind::HiddenBullish);
        assert!(d.strength >= 75.0 && d.strength <= 90.0);
    }

    #[test]
    fn test_regular_and_hidden_bearish() {
        let params = DivergenceParams::default();
        let d = detect_bearish(
            &pivots(&[(10, 100.0), (25, 110.0)]),
            &pivots(&[(10, 70.0), (25, 60.0)]),
            &params,
        )
        .unwrap();
        assert_eq!(d.kind, DivergenceKind::RegularBearish);

        let d = detect_bearish(
            &pivots(&[(10, 110.0), (25, 100.0)]),
            &pivots(&[(10, 60.0), (25, 70.0)]),
            &params,
        )
        .unwrap();
        assert_eq!(d.kind, DivergenceKind::HiddenBearish);
    }

    #[test]
    fn test_no_divergence_when_both_agree() {
        let price = pivots(&[(5, 10.0), (15, 8.0)]);
        let osc = pivots(&[(5, 40.0), (15, 30.0)]);
        assert!(detect_bullish(&price, &osc, &DivergenceParams::default()).is_none());
    }

    #[test]
    fn test_separation_bounds() {
        let params = DivergenceParams::default();
        let too_close = pivots(&[(5, 10.0), (8, 8.0)]);
        let osc = pivots(&[(5, 30.0), (8, 40.0)]);
        assert!(detect_bullish(&too_close, &osc, &params).is_none());

        let too_far = pivots(&[(0, 10.0), (100, 8.0)]);
        let osc = pivots(&[(0, 30.0), (100, 40.0)]);
        assert!(detect_bullish(&too_far, &osc, &params).is_none());
    }

    #[test]
    fn test_distance_multiplier() {
        let params = DivergenceParams::default();
        let short = detect_bullish(
            &pivots(&[(0, 10.0), (6, 9.9)]),
            &pivots(&[(0, 30.0), (6, 30.5)]),
            &params,
        )
        .unwrap();
        let normal = detect_bullish(
            &pivots(&[(0, 10.0), (20, 9.9)]),
            &pivots(&[(0, 30.0), (20, 30.5)]),
            &params,
        )
        .unwrap();
        assert!(short.strength < normal.strength);
        assert!(short.confidence < normal.confidence);
    }

    #[test]
    fn test_small_moves_rejected() {
        let params = DivergenceParams {
            min_osc_move: 5.0,
            ..DivergenceParams::default()
        };
        let price = pivots(&[(5, 10.0), (15, 8.0)]);
        let osc = pivots(&[(5, 30.0), (15, 32.0)]);
        assert!(detect_bullish(&price, &osc, &params).is_none());

        let flat_price = pivots(&[(5, 10.0), (15, 9.99)]);
        let osc = pivots(&[(5, 30.0), (15, 40.0)]);
        assert!(detect_bullish(&flat_price, &osc, &DivergenceParams::default()).is_none());
    }

    #[test]
    fn test_oscillator_matching_uses_distinct_pivots() {
        // Only one oscillator pivot near both price pivots
        let price = pivots(&[(5, 10.0), (15, 8.0)]);
        let osc = pivots(&[(14, 40.0)]);
        assert!(detect_bullish(&price, &osc, &DivergenceParams::default()).is_none());
    }

    #[test]
    fn test_detect_picks_stronger_side() {
        let price = Pivots {
            lows: pivots(&[(5, 10.0), (15, 8.0)]),
            highs: pivots(&[(8, 12.0), (18, 12.1)]),
        };
        let osc = Pivots {
            lows: pivots(&[(5, 30.0), (15, 40.0)]),
            highs: pivots(&[(8, 70.0), (18, 69.9)]),
        };
        let d = detect(&price, &osc, &DivergenceParams::default()).unwrap();
        assert_eq!(d.kind, DivergenceKind::RegularBullish);
    }
}
