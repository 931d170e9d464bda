//! Volatility evaluators: Bollinger, BBW, ATR, Keltner, Donchian, TTM Squeeze

use super::helpers::{crossed_above, crossed_below, mean_scalar, pct_from, ramp};
use super::{EvalContext, IndicatorEvaluator};
use crate::config::EngineConfig;
use crate::logging::LogLevel;
use crate::series::{BandValue, IndicatorKey, SqueezeValue};
use crate::{OHLCVExt, Signal, SignalType, OHLCV};

/// Longest squeeze walked back when measuring its duration
const MAX_SQUEEZE_SCAN: usize = 100;

/// Channel at `index` with upper/lower in order. A swapped band is logged
/// (only for the evaluated candle) and used with its edges exchanged.
fn band_at<T: OHLCV>(ctx: &EvalContext<'_, T>, key: IndicatorKey, index: usize) -> Option<BandValue> {
    let (band, swapped) = ctx.value_at::<BandValue>(key, index)?.ordered();
    if swapped && index == ctx.index {
        ctx.log.log(
            &format!("{} at {}: upper band below lower band, swapping", key, index),
            LogLevel::Warn,
        );
    }
    Some(band)
}

// ============================================================
// BOLLINGER BANDS
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct BollingerEvaluator;

impl IndicatorEvaluator for BollingerEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Bollinger
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.bollinger.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Bollinger;
        let cfg = &ctx.config.bollinger;
        let i = ctx.index;
        let (Some(candle), Some(band)) = (ctx.candle(), band_at(ctx, IndicatorKey::Bollinger, i)) else {
            return Vec::new();
        };
        let close = candle.close();
        let tol = cfg.touch_tolerance_pct / 100.0;
        let mut out = Vec::new();

        if close > band.upper {
            let s = ramp(55.0, 80.0, pct_from(close, band.upper).unwrap_or(0.0), 2.0);
            out.push(Signal::state(TY, "Above Upper Band", s, i));
        } else if close < band.lower {
            let s = ramp(55.0, 80.0, pct_from(close, band.lower).unwrap_or(0.0), 2.0);
            out.push(Signal::state(TY, "Below Lower Band", s, i));
        } else if close >= band.middle {
            let half = band.upper - band.middle;
            let depth = if half > 0.0 { (close - band.middle) / half } else { 0.0 };
            out.push(Signal::state(TY, "Upper Half", ramp(25.0, 50.0, depth, 1.0), i));
        } else {
            let half = band.middle - band.lower;
            let depth = if half > 0.0 { (band.middle - close) / half } else { 0.0 };
            out.push(Signal::state(TY, "Lower Half", ramp(25.0, 50.0, depth, 1.0), i));
        }

        // Walks: repeated touches of the same band
        let start = (i + 1).saturating_sub(cfg.band_walk_lookback.get());
        let (mut up, mut down) = (0usize, 0usize);
        for j in start..=i {
            let (Some(c), Some(b)) = (ctx.candles.get(j), band_at(ctx, IndicatorKey::Bollinger, j)) else {
                continue;
            };
            if c.high() >= b.upper * (1.0 - tol) {
                up += 1;
            }
            if c.low() <= b.lower * (1.0 + tol) {
                down += 1;
            }
        }
        let needed = cfg.band_walk_touches.get();
        if up >= needed && up >= down {
            out.push(Signal::state(TY, "Band Walk Up", 65.0, i));
        } else if down >= needed {
            out.push(Signal::state(TY, "Band Walk Down", 65.0, i));
        }

        let prev_band = i.checked_sub(1).and_then(|j| band_at(ctx, IndicatorKey::Bollinger, j));
        if let (Some(prev), Some(pb)) = (ctx.prev(), prev_band) {
            let pc = prev.close();
            if crossed_above(pc, pb.upper, close, band.upper) {
                out.push(Signal::event(TY, "Upper Band Break", 75.0, i));
            } else if crossed_below(pc, pb.lower, close, band.lower) {
                out.push(Signal::event(TY, "Lower Band Break", 75.0, i));
            }

            if crossed_above(pc, pb.middle, close, band.middle) {
                out.push(Signal::event(TY, "Middle Band Cross Up", 60.0, i));
            } else if crossed_below(pc, pb.middle, close, band.middle) {
                out.push(Signal::event(TY, "Middle Band Cross Down", 60.0, i));
            }
        }

        if candle.high() >= band.upper * (1.0 - tol) && close < band.upper && candle.is_bearish() {
            let (s, c) = ctx.confluence().boost(70.0, band.upper, i);
            out.push(Signal::event(TY, "Upper Band Rejection", s, i).with_details(c.description));
        } else if candle.low() <= band.lower * (1.0 + tol) && close > band.lower && candle.is_bullish() {
            let (s, c) = ctx.confluence().boost(70.0, band.lower, i);
            out.push(Signal::event(TY, "Lower Band Bounce", s, i).with_details(c.description));
        }

        out
    }
}

// ============================================================
// BOLLINGER BAND WIDTH
// ============================================================

/// Band width in % of the middle band
#[derive(Debug, Clone, Copy, Default)]
pub struct BbwEvaluator;

impl IndicatorEvaluator for BbwEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Bbw
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.bbw.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Bbw;
        let cfg = &ctx.config.bbw;
        let i = ctx.index;
        let Some(cur) = ctx.scalar(IndicatorKey::Bbw) else {
            return Vec::new();
        };
        let threshold = cfg.squeeze_threshold;
        let mut out = Vec::new();

        if cur < threshold {
            let tightness = if threshold > 0.0 { (threshold - cur) / threshold } else { 0.0 };
            out.push(Signal::state(TY, "squeeze", ramp(40.0, 70.0, tightness, 1.0), i));
        } else if cur >= cfg.high_volatility_threshold {
            out.push(Signal::state(TY, "high_volatility", 60.0, i));
        } else {
            out.push(Signal::state(TY, "normal_volatility", 30.0, i));
        }

        if let Some(prev) = ctx.prev_scalar(IndicatorKey::Bbw) {
            if prev < threshold && cur >= threshold {
                out.push(Signal::event(TY, "squeeze_release", 80.0, i));
            } else if prev >= threshold && cur < threshold {
                out.push(Signal::event(TY, "squeeze_start", 70.0, i));
            }
            if prev > 0.0 && cur >= cfg.expansion_ratio * prev {
                out.push(Signal::event(TY, "volatility_expansion", 65.0, i));
            }
        }

        out
    }
}

// ============================================================
// ATR
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct AtrEvaluator;

impl AtrEvaluator {
    /// ATR relative to its own recent average
    fn ratio<T: OHLCV>(ctx: &EvalContext<'_, T>, index: usize) -> Option<f64> {
        let atr = ctx.scalar_at(IndicatorKey::Atr, index)?;
        let avg = mean_scalar(ctx, IndicatorKey::Atr, index, ctx.config.atr.average_period.get())?;
        (avg > 0.0).then(|| atr / avg)
    }
}

impl IndicatorEvaluator for AtrEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Atr
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.atr.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Atr;
        let cfg = &ctx.config.atr;
        let i = ctx.index;
        let (Some(candle), Some(atr), Some(ratio)) = (
            ctx.candle(),
            ctx.scalar(IndicatorKey::Atr),
            Self::ratio(ctx, i),
        ) else {
            return Vec::new();
        };
        let close = candle.close();
        let stops = format!(
            "ATR {:.4}, long stop {:.4}, short stop {:.4}",
            atr,
            close - cfg.multiplier * atr,
            close + cfg.multiplier * atr
        );
        let mut out = Vec::new();

        let state = if ratio >= cfg.expansion_ratio {
            Signal::state(TY, "High Volatility", ramp(50.0, 80.0, ratio - cfg.expansion_ratio, 1.0), i)
        } else if ratio <= cfg.contraction_ratio {
            Signal::state(TY, "Low Volatility", 40.0, i)
        } else {
            Signal::state(TY, "Normal Volatility", 30.0, i)
        };
        out.push(state.with_details(stops.clone()));

        let prev_close = ctx.prev().map(|p| p.close());
        if candle.true_range(prev_close) > cfg.multiplier * atr {
            out.push(Signal::event(TY, "Volatility Spike", 80.0, i).with_details(stops));
        }

        if let Some(prev_ratio) = i.checked_sub(1).and_then(|j| Self::ratio(ctx, j)) {
            if prev_ratio < cfg.expansion_ratio && ratio >= cfg.expansion_ratio {
                out.push(Signal::event(TY, "Volatility Expansion", 70.0, i));
            } else if prev_ratio > cfg.contraction_ratio && ratio <= cfg.contraction_ratio {
                out.push(Signal::event(TY, "Volatility Contraction", 70.0, i));
            }
        }

        out
    }
}

// ============================================================
// KELTNER CHANNEL
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct KeltnerEvaluator;

impl IndicatorEvaluator for KeltnerEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Keltner
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.keltner.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Keltner;
        let i = ctx.index;
        let (Some(candle), Some(band)) = (ctx.candle(), band_at(ctx, IndicatorKey::Keltner, i)) else {
            return Vec::new();
        };
        let close = candle.close();
        let mut out = Vec::new();

        if close > band.upper {
            let s = ramp(50.0, 75.0, pct_from(close, band.upper).unwrap_or(0.0), 2.0);
            out.push(Signal::state(TY, "Above Keltner Channel", s, i));
        } else if close < band.lower {
            let s = ramp(50.0, 75.0, pct_from(close, band.lower).unwrap_or(0.0), 2.0);
            out.push(Signal::state(TY, "Below Keltner Channel", s, i));
        } else {
            out.push(Signal::state(TY, "Inside Keltner Channel", 25.0, i));
        }

        let prev_band = i.checked_sub(1).and_then(|j| band_at(ctx, IndicatorKey::Keltner, j));
        if let (Some(prev), Some(pb)) = (ctx.prev(), prev_band) {
            let pc = prev.close();
            if crossed_above(pc, pb.upper, close, band.upper) {
                out.push(Signal::event(TY, "Keltner Breakout Up", 80.0, i));
            } else if crossed_below(pc, pb.lower, close, band.lower) {
                out.push(Signal::event(TY, "Keltner Breakout Down", 80.0, i));
            }

            if crossed_above(pc, pb.middle, close, band.middle) {
                out.push(Signal::event(TY, "Keltner Middle Cross Up", 60.0, i));
            } else if crossed_below(pc, pb.middle, close, band.middle) {
                out.push(Signal::event(TY, "Keltner Middle Cross Down", 60.0, i));
            }
        }

        out
    }
}

// ============================================================
// DONCHIAN CHANNEL
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DonchianEvaluator;

impl IndicatorEvaluator for DonchianEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Donchian
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.donchian.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Donchian;
        let i = ctx.index;
        let (Some(candle), Some(band)) = (ctx.candle(), band_at(ctx, IndicatorKey::Donchian, i)) else {
            return Vec::new();
        };
        let close = candle.close();
        let proximity = ctx.config.donchian.proximity.get();
        let mut out = Vec::new();

        let height = band.width();
        let position = if height > 0.0 { (close - band.lower) / height } else { 0.5 };
        if position >= 1.0 - proximity {
            let s = ramp(40.0, 70.0, position - (1.0 - proximity), proximity);
            out.push(Signal::state(TY, "Near Donchian High", s, i));
        } else if position <= proximity {
            let s = ramp(40.0, 70.0, proximity - position, proximity);
            out.push(Signal::state(TY, "Near Donchian Low", s, i));
        } else {
            out.push(Signal::state(TY, "Donchian Mid Range", 25.0, i));
        }

        // The current channel already contains this bar, so breakouts are
        // measured against the previous one
        if let Some(pb) = i.checked_sub(1).and_then(|j| band_at(ctx, IndicatorKey::Donchian, j)) {
            if close > pb.upper {
                out.push(Signal::event(TY, "Donchian Breakout Up", 85.0, i));
            } else if close < pb.lower {
                out.push(Signal::event(TY, "Donchian Breakout Down", 85.0, i));
            }
        }

        out
    }
}

// ============================================================
// TTM SQUEEZE
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TtmSqueezeEvaluator;

impl TtmSqueezeEvaluator {
    /// Consecutive squeeze bars ending at `end`
    fn duration<T: OHLCV>(ctx: &EvalContext<'_, T>, end: usize) -> usize {
        (0..=end)
            .rev()
            .take(MAX_SQUEEZE_SCAN)
            .take_while(|&j| {
                ctx.value_at::<SqueezeValue>(IndicatorKey::TtmSqueeze, j)
                    .is_some_and(|v| v.squeeze_on)
            })
            .count()
    }
}

impl IndicatorEvaluator for TtmSqueezeEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::TtmSqueeze
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.ttm_squeeze.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::TtmSqueeze;
        let cfg = &ctx.config.ttm_squeeze;
        if !cfg.enabled {
            return Vec::new();
        }
        let i = ctx.index;
        let (Some(candle), Some(cur)) = (ctx.candle(), ctx.value::<SqueezeValue>(IndicatorKey::TtmSqueeze)) else {
            return Vec::new();
        };
        let mut out = Vec::new();

        if cur.squeeze_on {
            out.push(Signal::state(TY, "Squeeze On", 50.0, i));
        } else {
            out.push(Signal::state(TY, "No Squeeze", 25.0, i));
        }

        let close = candle.close();
        let momentum_pct = pct_from(close + cur.momentum.abs(), close).unwrap_or(0.0);
        let s = ramp(30.0, 60.0, momentum_pct, 1.0);
        if cur.momentum > 0.0 {
            out.push(Signal::state(TY, "Bullish Momentum", s, i));
        } else if cur.momentum < 0.0 {
            out.push(Signal::state(TY, "Bearish Momentum", s, i));
        }

        let released = !cur.squeeze_on
            && ctx
                .prev_value::<SqueezeValue>(IndicatorKey::TtmSqueeze)
                .is_some_and(|p| p.squeeze_on);
        if released {
            let duration = Self::duration(ctx, i - 1);
            let min = cfg.min_squeeze_duration.get();
            if duration >= min {
                let smoothing = cfg.momentum_smoothing.get();
                let (sum, n) = ((i + 1).saturating_sub(smoothing)..=i)
                    .filter_map(|j| ctx.value_at::<SqueezeValue>(IndicatorKey::TtmSqueeze, j))
                    .fold((0.0, 0usize), |(s, n), v| (s + v.momentum, n + 1));
                let smoothed = if n > 0 { sum / n as f64 } else { 0.0 };
                let bonus = ((duration - min) as f64).min(cfg.max_duration_bonus.max(0.0));
                let details = format!("squeeze lasted {} bars", duration);
                if smoothed > 0.0 {
                    out.push(Signal::event(TY, "Squeeze Release Bullish", 85.0 + bonus, i).with_details(details));
                } else if smoothed < 0.0 {
                    out.push(Signal::event(TY, "Squeeze Release Bearish", 85.0 + bonus, i).with_details(details));
                }
            }
        }

        out
    }
}
