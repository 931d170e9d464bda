//! Shared evaluator math

use crate::divergence::{self, DivergenceParams};
use crate::pivots::{find_pivots_sparse, find_price_pivots};
use crate::series::{IndicatorKey, SeriesValue};
use crate::{Signal, SignalType, OHLCV};

use super::EvalContext;

/// Monotone state strength: `floor` at zero magnitude, `ceil` at `scale` and beyond
#[inline]
pub fn ramp(floor: f64, ceil: f64, magnitude: f64, scale: f64) -> f64 {
    if !magnitude.is_finite() || scale <= 0.0 {
        return floor;
    }
    floor + (ceil - floor) * (magnitude.abs() / scale).min(1.0)
}

/// `(value - reference) / reference` in percent
#[inline]
pub fn pct_from(value: f64, reference: f64) -> Option<f64> {
    if reference.abs() < f64::EPSILON {
        return None;
    }
    let pct = (value - reference) / reference * 100.0;
    pct.is_finite().then_some(pct)
}

/// `a` crossed from at-or-below `b` to above it
#[inline]
pub fn crossed_above(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a <= prev_b && a > b
}

/// `a` crossed from at-or-above `b` to below it
#[inline]
pub fn crossed_below(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a >= prev_b && a < b
}

/// Mean of the values of `key` over `count` candles ending at `end` (inclusive).
/// Missing values are skipped; `None` when none are present.
pub fn mean_scalar<T: OHLCV>(ctx: &EvalContext<'_, T>, key: IndicatorKey, end: usize, count: usize) -> Option<f64> {
    let start = (end + 1).saturating_sub(count);
    let (sum, n) = (start..=end)
        .filter_map(|i| ctx.scalar_at(key, i))
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Divergence between price and an oscillator read from `key`.
///
/// Only reported on the candle that confirms the latest price pivot, so
/// each divergence fires once.
pub fn oscillator_divergence<T, V>(
    ctx: &EvalContext<'_, T>,
    signal_type: SignalType,
    key: IndicatorKey,
    lookback: usize,
    min_osc_move: f64,
    read: impl Fn(&V) -> f64,
) -> Option<Signal>
where
    T: OHLCV,
    V: SeriesValue,
{
    let config = &ctx.config.divergence;
    let distance = config.pivot_distance.get();
    let end = ctx.index + 1;
    let start = end.saturating_sub(lookback);

    let mut oscillator = vec![None; end];
    for (i, slot) in oscillator.iter_mut().enumerate().skip(start) {
        *slot = ctx.value_at::<V>(key, i).map(&read).filter(|v| v.is_finite());
    }

    let osc_pivots = find_pivots_sparse(&oscillator, start, end, distance);
    let price_pivots = find_price_pivots(ctx.candles, start, end, distance);
    let params = DivergenceParams::from_config(config, min_osc_move);
    let found = divergence::detect(&price_pivots, &osc_pivots, &params)?;

    if found.price_pivots[1].index + distance != ctx.index {
        return None;
    }
    Some(
        Signal::event(signal_type, found.kind.label(), found.strength, ctx.index)
            .with_details(found.description)
            .with_priority(4),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp() {
        assert_eq!(ramp(30.0, 70.0, 0.0, 3.0), 30.0);
        assert_eq!(ramp(30.0, 70.0, 1.5, 3.0), 50.0);
        assert_eq!(ramp(30.0, 70.0, -9.0, 3.0), 70.0);
        assert_eq!(ramp(30.0, 70.0, f64::NAN, 3.0), 30.0);
        assert_eq!(ramp(30.0, 70.0, 1.0, 0.0), 30.0);
    }

    #[test]
    fn test_crosses() {
        assert!(crossed_above(99.0, 100.0, 101.0, 100.0));
        assert!(crossed_above(100.0, 100.0, 100.5, 100.0));
        assert!(!crossed_above(101.0, 100.0, 102.0, 100.0));
        assert!(crossed_below(101.0, 100.0, 99.0, 100.0));
    }

    #[test]
    fn test_pct_from() {
        assert_eq!(pct_from(110.0, 100.0), Some(10.0));
        assert_eq!(pct_from(1.0, 0.0), None);
    }
}
