//! Structure evaluators: Support/Resistance, Pivot Points, Fibonacci

use super::helpers::{crossed_above, crossed_below, ramp};
use super::{EvalContext, IndicatorEvaluator};
use crate::config::{EngineConfig, SupportResistanceConfig};
use crate::pivots::find_price_pivots;
use crate::series::{FibonacciValue, IndicatorKey, LevelsValue, PivotPointsValue};
use crate::{OHLCVExt, Signal, SignalType, OHLCV};

// ============================================================
// SUPPORT / RESISTANCE
// ============================================================

/// Horizontal levels. Taken from the `SupportResistance` slot when present,
/// otherwise derived from clustered price pivots.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportResistanceEvaluator;

/// Merge sorted prices whose distance to the running cluster mean is within
/// `merge_pct`; each cluster becomes its mean.
fn cluster_levels(mut prices: Vec<f64>, merge_pct: f64) -> Vec<f64> {
    prices.retain(|p| p.is_finite() && *p > 0.0);
    prices.sort_by(f64::total_cmp);

    let mut levels: Vec<(f64, usize)> = Vec::new();
    for price in prices {
        match levels.last_mut() {
            Some((sum, n)) if (price - *sum / *n as f64).abs() / price * 100.0 <= merge_pct => {
                *sum += price;
                *n += 1;
            }
            _ => levels.push((price, 1)),
        }
    }
    levels.into_iter().map(|(sum, n)| sum / n as f64).collect()
}

/// Levels derived from the pivots confirmed before `index`, split around
/// `reference` and limited to the nearest `max_levels` on each side
fn derive_levels<T: OHLCV>(
    candles: &[T],
    index: usize,
    reference: f64,
    config: &SupportResistanceConfig,
) -> LevelsValue {
    let start = index.saturating_sub(config.lookback.get());
    let pivots = find_price_pivots(candles, start, index, config.pivot_distance.get());
    let prices = pivots.highs.iter().chain(&pivots.lows).map(|p| p.value).collect();
    let levels = cluster_levels(prices, config.merge_pct);

    let max = config.max_levels.get();
    let mut support: Vec<f64> = levels.iter().copied().filter(|&l| l < reference).collect();
    support.reverse();
    support.truncate(max);
    let mut resistance: Vec<f64> = levels.into_iter().filter(|&l| l > reference).collect();
    resistance.truncate(max);
    LevelsValue { support, resistance }
}

impl IndicatorEvaluator for SupportResistanceEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::SupportResistance
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        2 * config.support_resistance.pivot_distance.get() + 1
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::SupportResistance;
        let cfg = &ctx.config.support_resistance;
        let i = ctx.index;
        let Some(candle) = ctx.candle() else {
            return Vec::new();
        };
        let close = candle.close();
        let prev_close = ctx.prev().map(|p| p.close());

        let levels = match ctx.value::<LevelsValue>(IndicatorKey::SupportResistance) {
            Some(levels) => levels.clone(),
            None => derive_levels(ctx.candles, i, prev_close.unwrap_or(close), cfg),
        };

        let proximity = cfg.proximity_pct;
        let tol = proximity / 100.0;
        let distance_pct = |level: f64| (close - level).abs() / level * 100.0;
        let mut out = Vec::new();

        for &level in levels.support.iter().filter(|l| **l > 0.0) {
            let details = format!("support {:.4}", level);
            let dist = distance_pct(level);
            if dist <= proximity {
                let s = ramp(40.0, 70.0, proximity - dist, proximity);
                out.push(Signal::state(TY, "Near Support", s, i).with_details(details.clone()));
            }
            if prev_close.is_some_and(|pc| pc >= level) && close < level {
                out.push(Signal::event(TY, "Support Breakdown", 85.0, i).with_details(details));
            } else if candle.low() <= level * (1.0 + tol) && close > level && candle.is_bullish() {
                let (s, c) = ctx.confluence().boost(75.0, level, i);
                out.push(
                    Signal::event(TY, "Support Bounce", s, i)
                        .with_details(format!("{}; {}", details, c.description)),
                );
            }
        }

        for &level in levels.resistance.iter().filter(|l| **l > 0.0) {
            let details = format!("resistance {:.4}", level);
            let dist = distance_pct(level);
            if dist <= proximity {
                let s = ramp(40.0, 70.0, proximity - dist, proximity);
                out.push(Signal::state(TY, "Near Resistance", s, i).with_details(details.clone()));
            }
            if prev_close.is_some_and(|pc| pc <= level) && close > level {
                out.push(Signal::event(TY, "Resistance Breakout", 85.0, i).with_details(details));
            } else if candle.high() >= level * (1.0 - tol) && close < level && candle.is_bearish() {
                let (s, c) = ctx.confluence().boost(75.0, level, i);
                out.push(
                    Signal::event(TY, "Resistance Rejection", s, i)
                        .with_details(format!("{}; {}", details, c.description)),
                );
            }
        }

        out
    }
}

// ============================================================
// PIVOT POINTS
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PivotPointsEvaluator;

impl IndicatorEvaluator for PivotPointsEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::PivotPoints
    }

    fn min_lookback(&self, _config: &EngineConfig) -> usize {
        1
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::PivotPoints;
        let i = ctx.index;
        let (Some(candle), Some(cur)) = (ctx.candle(), ctx.value::<PivotPointsValue>(IndicatorKey::PivotPoints)) else {
            return Vec::new();
        };
        let close = candle.close();
        let tolerance = ctx.config.pivot_points.tolerance_pct;
        let mut out = Vec::new();

        if close > cur.pivot {
            out.push(Signal::state(TY, "Above Pivot", 35.0, i));
        } else if close < cur.pivot {
            out.push(Signal::state(TY, "Below Pivot", 35.0, i));
        }

        for (name, level) in cur.levels() {
            if level <= 0.0 || (close - level).abs() / level * 100.0 > tolerance {
                continue;
            }
            let (s, c) = ctx.confluence().boost(55.0, level, i);
            out.push(Signal::state(TY, format!("At {}", name), s, i).with_details(c.description));
        }

        // Levels normally hold for a whole session; fall back to the current
        // set when the previous bar has none
        let prev_levels = ctx.prev_value::<PivotPointsValue>(IndicatorKey::PivotPoints).unwrap_or(cur);
        if let Some(prev) = ctx.prev() {
            let pc = prev.close();
            let p = prev_levels;

            if crossed_above(pc, p.pivot, close, cur.pivot) {
                out.push(Signal::event(TY, "Pivot Cross Up", 70.0, i));
            } else if crossed_below(pc, p.pivot, close, cur.pivot) {
                out.push(Signal::event(TY, "Pivot Cross Down", 70.0, i));
            }

            for (name, before, now, strength) in [("R1", p.r1, cur.r1, 75.0), ("R2", p.r2, cur.r2, 80.0)] {
                if crossed_above(pc, before, close, now) {
                    out.push(Signal::event(TY, format!("{} Breakout", name), strength, i));
                }
            }
            for (name, before, now, strength) in [("S1", p.s1, cur.s1, 75.0), ("S2", p.s2, cur.s2, 80.0)] {
                if crossed_below(pc, before, close, now) {
                    out.push(Signal::event(TY, format!("{} Breakdown", name), strength, i));
                }
            }
        }

        out
    }
}

// ============================================================
// FIBONACCI
// ============================================================

/// Retracement levels keyed in per-mille
#[derive(Debug, Clone, Copy, Default)]
pub struct FibonacciEvaluator;

/// Per-mille key as a percent label: 618 -> "61.8", 500 -> "50"
pub fn fib_label(per_mille: u32) -> String {
    if per_mille % 10 == 0 {
        format!("{}", per_mille / 10)
    } else {
        format!("{}.{}", per_mille / 10, per_mille % 10)
    }
}

/// Base strength of a level before the proximity penalty
fn fib_base(per_mille: u32) -> f64 {
    match per_mille {
        618 => 70.0,
        500 | 382 => 65.0,
        786 => 60.0,
        236 => 55.0,
        _ => 50.0,
    }
}

impl IndicatorEvaluator for FibonacciEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Fibonacci
    }

    fn min_lookback(&self, _config: &EngineConfig) -> usize {
        1
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Fibonacci;
        let i = ctx.index;
        let (Some(candle), Some(fib)) = (ctx.candle(), ctx.value::<FibonacciValue>(IndicatorKey::Fibonacci)) else {
            return Vec::new();
        };
        let close = candle.close();
        let tol = ctx.config.fibonacci.tolerance.get();
        let prev_close = ctx.prev().map(|p| p.close());
        let mut out = Vec::new();

        for (&pm, &level) in &fib.levels {
            if !level.is_finite() || level <= 0.0 {
                continue;
            }
            let label = fib_label(pm);
            let dist = (close - level).abs() / level;

            if dist <= tol {
                let penalty = if tol > 0.0 { dist / tol * 10.0 } else { 0.0 };
                let (s, c) = ctx.confluence().boost(fib_base(pm) - penalty, level, i);
                out.push(
                    Signal::state(TY, format!("At {}% Level", label), s, i)
                        .with_details(format!("level {:.4}; {}", level, c.description)),
                );
            }

            let touched = (candle.low() - level).abs() <= level * tol;
            if touched && close > level && candle.is_bullish() {
                out.push(Signal::event(TY, format!("Bounce From {}% Level", label), 75.0, i));
            }

            if let Some(pc) = prev_close {
                if crossed_above(pc, level, close, level) {
                    out.push(Signal::event(TY, format!("Break Above {}% Level", label), 70.0, i));
                } else if crossed_below(pc, level, close, level) {
                    out.push(Signal::event(TY, format!("Break Below {}% Level", label), 70.0, i));
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::series::{IndicatorSeries, Series, SeriesData};
    use crate::Candle;

    fn names(signals: &[Signal]) -> Vec<&str> {
        signals.iter().map(|s| s.value.as_str()).collect()
    }

    #[test]
    fn test_fib_labels() {
        assert_eq!(fib_label(618), "61.8");
        assert_eq!(fib_label(500), "50");
        assert_eq!(fib_label(236), "23.6");
        assert_eq!(fib_label(1000), "100");
        assert_eq!(fib_label(0), "0");
    }

    #[test]
    fn test_at_golden_ratio_level() {
        let cfg = config();
        let regime = neutral();
        let c = candles(&[162.0; 5]);
        let fib = FibonacciValue::new([(0, 100.0), (618, 161.8), (1000, 200.0)]);
        let series = single(
            IndicatorKey::Fibonacci,
            SeriesData::Fibonacci(Series::from_values(vec![fib; 5])),
        );
        let ctx = EvalContext::new(&c, &series, 4, &cfg, &regime);
        let out = FibonacciEvaluator.evaluate(&ctx);
        let at = out.iter().find(|s| s.value == "At 61.8% Level").unwrap();
        assert!(at.strength >= 60.0);
        assert!(!at.is_event);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_fib_break_and_bounce() {
        let cfg = config();
        let regime = neutral();
        let mut c = candles(&[148.0; 5]);
        c[4] = Candle::new(149.0, 152.0, 149.5, 151.2, 1000.0);
        let fib = FibonacciValue::new([(500, 150.0)]);
        let series = single(
            IndicatorKey::Fibonacci,
            SeriesData::Fibonacci(Series::from_values(vec![fib; 5])),
        );
        let ctx = EvalContext::new(&c, &series, 4, &cfg, &regime);
        let n: Vec<String> = FibonacciEvaluator.evaluate(&ctx).into_iter().map(|s| s.value).collect();
        assert!(n.contains(&"Break Above 50% Level".to_string()));
        assert!(n.contains(&"Bounce From 50% Level".to_string()));
        assert!(n.contains(&"At 50% Level".to_string()));
    }

    fn pivot_points() -> PivotPointsValue {
        PivotPointsValue {
            pivot: 100.0,
            r1: 102.0,
            r2: 104.0,
            r3: 106.0,
            s1: 98.0,
            s2: 96.0,
            s3: 94.0,
        }
    }

    #[test]
    fn test_pivot_r1_breakout() {
        let cfg = config();
        let regime = neutral();
        let c = candles(&[101.0, 101.5, 102.1]);
        let series = single(
            IndicatorKey::PivotPoints,
            SeriesData::PivotPoints(Series::from_values(vec![pivot_points(); 3])),
        );
        let ctx = EvalContext::new(&c, &series, 2, &cfg, &regime);
        let out = PivotPointsEvaluator.evaluate(&ctx);
        let n = names(&out);
        assert!(n.contains(&"R1 Breakout"));
        assert!(n.contains(&"At R1"));
        assert!(n.contains(&"Above Pivot"));
        assert!(!n.contains(&"R2 Breakout"));

        // Index 0 is still warming up
        let ctx = EvalContext::new(&c, &series, 0, &cfg, &regime);
        assert!(PivotPointsEvaluator.evaluate(&ctx).is_empty());
    }

    #[test]
    fn test_pivot_cross_down() {
        let cfg = config();
        let regime = neutral();
        let c = candles(&[100.5, 99.2]);
        let series = single(
            IndicatorKey::PivotPoints,
            SeriesData::PivotPoints(Series::from_values(vec![pivot_points(); 2])),
        );
        let ctx = EvalContext::new(&c, &series, 1, &cfg, &regime);
        let out = PivotPointsEvaluator.evaluate(&ctx);
        assert!(names(&out).contains(&"Pivot Cross Down"));
        assert!(names(&out).contains(&"Below Pivot"));
    }

    #[test]
    fn test_cluster_levels() {
        let levels = cluster_levels(vec![100.0, 100.3, 110.0, 99.9, f64::NAN], 0.5);
        assert_eq!(levels.len(), 2);
        assert!((levels[0] - 100.066_666_666_666_66).abs() < 1e-9);
        assert_eq!(levels[1], 110.0);
    }

    #[test]
    fn test_support_from_series() {
        let cfg = config();
        let regime = neutral();
        let mut c = candles(&[101.0; 20]);
        c[19] = Candle::new(100.2, 100.9, 99.8, 100.7, 1000.0);
        let levels = LevelsValue {
            support: vec![100.0],
            resistance: vec![110.0],
        };
        let series = single(
            IndicatorKey::SupportResistance,
            SeriesData::Levels(Series::from_values(vec![levels; 20])),
        );
        let ctx = EvalContext::new(&c, &series, 19, &cfg, &regime);
        let out = SupportResistanceEvaluator.evaluate(&ctx);
        let n = names(&out);
        assert!(n.contains(&"Near Support"));
        let bounce = out.iter().find(|s| s.value == "Support Bounce").unwrap();
        assert!(bounce.base_strength >= 75.0);
        assert!(!n.contains(&"Near Resistance"));
    }

    #[test]
    fn test_derived_resistance_breakout() {
        let cfg = config();
        let regime = neutral();
        // Two peaks near 110 then a push through them
        let mut closes: Vec<f64> = Vec::new();
        for k in 0..40 {
            let phase = k % 20;
            let p = if phase <= 10 { 100.0 + phase as f64 } else { 110.0 - (phase - 10) as f64 };
            closes.push(p);
        }
        closes.extend([104.0, 106.0, 108.0, 109.5, 111.5]);
        let c = candles(&closes);
        let series = IndicatorSeries::new();
        let ctx = EvalContext::new(&c, &series, closes.len() - 1, &cfg, &regime);
        let out = SupportResistanceEvaluator.evaluate(&ctx);
        assert!(names(&out).contains(&"Resistance Breakout"));
    }
}
