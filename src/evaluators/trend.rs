//! Trend evaluators: MACD, EMA, MA200, Ichimoku, ADX, PSAR, WMA/TEMA/DEMA/HMA, MA Ribbon

use super::helpers::{crossed_above, crossed_below, oscillator_divergence, pct_from, ramp};
use super::{EvalContext, IndicatorEvaluator, MaKind};
use crate::config::EngineConfig;
use crate::series::{AdxValue, IchimokuValue, IndicatorKey, MacdValue, RibbonValue};
use crate::{Signal, SignalType, OHLCV};

// ============================================================
// MACD
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MacdEvaluator;

impl IndicatorEvaluator for MacdEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Macd
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.macd.slow_period.get() + config.macd.signal_period.get() - 1
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Macd;
        let cfg = &ctx.config.macd;
        let i = ctx.index;
        let (Some(candle), Some(cur)) = (ctx.candle(), ctx.value::<MacdValue>(IndicatorKey::Macd)) else {
            return Vec::new();
        };
        let close = candle.close();
        let scale = cfg.strength_scale_pct;
        let mut out = Vec::new();

        let hist_pct = pct_from(close + cur.histogram.abs(), close).unwrap_or(0.0);
        if cur.macd > cur.signal {
            out.push(Signal::state(TY, "MACD Above Signal", ramp(30.0, 70.0, hist_pct, scale), i));
        } else if cur.macd < cur.signal {
            out.push(Signal::state(TY, "MACD Below Signal", ramp(30.0, 70.0, hist_pct, scale), i));
        }
        let macd_pct = pct_from(close + cur.macd.abs(), close).unwrap_or(0.0);
        if cur.macd > 0.0 {
            out.push(Signal::state(TY, "MACD Above Zero", ramp(30.0, 70.0, macd_pct, scale), i));
        } else if cur.macd < 0.0 {
            out.push(Signal::state(TY, "MACD Below Zero", ramp(30.0, 70.0, macd_pct, scale), i));
        }

        if let Some(prev) = ctx.prev_value::<MacdValue>(IndicatorKey::Macd) {
            // Crosses on the far side of zero carry more weight
            if crossed_above(prev.macd, prev.signal, cur.macd, cur.signal) {
                let s = if cur.macd < 0.0 { 85.0 } else { 75.0 };
                out.push(Signal::event(TY, "Bullish Cross", s, i));
            } else if crossed_below(prev.macd, prev.signal, cur.macd, cur.signal) {
                let s = if cur.macd > 0.0 { 85.0 } else { 75.0 };
                out.push(Signal::event(TY, "Bearish Cross", s, i));
            }

            if crossed_above(prev.macd, 0.0, cur.macd, 0.0) {
                out.push(Signal::event(TY, "Zero Line Cross Up", 70.0, i));
            } else if crossed_below(prev.macd, 0.0, cur.macd, 0.0) {
                out.push(Signal::event(TY, "Zero Line Cross Down", 70.0, i));
            }

            if let Some(before) = i.checked_sub(2).and_then(|j| ctx.value_at::<MacdValue>(IndicatorKey::Macd, j)) {
                if prev.histogram < before.histogram && cur.histogram > prev.histogram {
                    out.push(Signal::event(TY, "Histogram Turning Up", 60.0, i));
                } else if prev.histogram > before.histogram && cur.histogram < prev.histogram {
                    out.push(Signal::event(TY, "Histogram Turning Down", 60.0, i));
                }
            }
        }

        if cfg.divergence {
            out.extend(oscillator_divergence(
                ctx,
                TY,
                IndicatorKey::Macd,
                cfg.divergence_lookback.get(),
                cfg.min_oscillator_move,
                |v: &MacdValue| v.histogram,
            ));
        }

        out
    }
}

// ============================================================
// EMA
// ============================================================

/// Fast/slow EMA pair
#[derive(Debug, Clone, Copy, Default)]
pub struct EmaEvaluator;

impl IndicatorEvaluator for EmaEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Ema
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.ema.slow_period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Ema;
        let cfg = &ctx.config.ema;
        let i = ctx.index;
        let (Some(candle), Some(fast), Some(slow)) = (
            ctx.candle(),
            ctx.scalar(IndicatorKey::EmaFast),
            ctx.scalar(IndicatorKey::EmaSlow),
        ) else {
            return Vec::new();
        };
        let close = candle.close();
        let mut out = Vec::new();

        if let Some(dist) = pct_from(close, fast) {
            let s = ramp(30.0, 70.0, dist, cfg.distance_scale_pct);
            if dist > 0.0 {
                out.push(Signal::state(TY, "Price Above EMA", s, i));
            } else if dist < 0.0 {
                out.push(Signal::state(TY, "Price Below EMA", s, i));
            }
        }

        if let Some(spread) = pct_from(fast, slow) {
            let s = ramp(40.0, 80.0, spread, cfg.spread_scale_pct);
            if close > fast && fast > slow {
                out.push(Signal::state(TY, "EMA Bullish Alignment", s, i));
            } else if close < fast && fast < slow {
                out.push(Signal::state(TY, "EMA Bearish Alignment", s, i));
            }
        }

        if let (Some(pf), Some(ps)) = (
            ctx.prev_scalar(IndicatorKey::EmaFast),
            ctx.prev_scalar(IndicatorKey::EmaSlow),
        ) {
            if crossed_above(pf, ps, fast, slow) {
                out.push(Signal::event(TY, "Bullish Cross", 80.0, i));
            } else if crossed_below(pf, ps, fast, slow) {
                out.push(Signal::event(TY, "Bearish Cross", 80.0, i));
            }

            if let Some(prev) = ctx.prev() {
                if crossed_above(prev.close(), pf, close, fast) {
                    out.push(Signal::event(TY, "Price Cross Above EMA", 70.0, i));
                } else if crossed_below(prev.close(), pf, close, fast) {
                    out.push(Signal::event(TY, "Price Cross Below EMA", 70.0, i));
                }
            }
        }

        out
    }
}

// ============================================================
// MA200
// ============================================================

/// Long-term average with the SMA50 golden/death cross
#[derive(Debug, Clone, Copy, Default)]
pub struct Ma200Evaluator;

impl IndicatorEvaluator for Ma200Evaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Ma200
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.ma200.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Ma200;
        let cfg = &ctx.config.ma200;
        let i = ctx.index;
        let (Some(candle), Some(ma)) = (ctx.candle(), ctx.scalar(IndicatorKey::Ma200)) else {
            return Vec::new();
        };
        let close = candle.close();
        let Some(dist) = pct_from(close, ma) else {
            return Vec::new();
        };
        let mut out = Vec::new();

        let s = ramp(35.0, 75.0, dist, cfg.distance_scale_pct);
        if dist > 0.0 {
            out.push(Signal::state(TY, "Above MA200", s, i));
        } else if dist < 0.0 {
            out.push(Signal::state(TY, "Below MA200", s, i));
        }

        let prev_ma = ctx.prev_scalar(IndicatorKey::Ma200);

        if let (Some(fast), Some(prev_fast), Some(prev_ma)) = (
            ctx.scalar(IndicatorKey::Sma50),
            ctx.prev_scalar(IndicatorKey::Sma50),
            prev_ma,
        ) {
            if crossed_above(prev_fast, prev_ma, fast, ma) {
                out.push(Signal::event(TY, "Golden Cross", 90.0, i));
            } else if crossed_below(prev_fast, prev_ma, fast, ma) {
                out.push(Signal::event(TY, "Death Cross", 90.0, i));
            }
        }

        let mut crossed = false;
        if let (Some(prev), Some(prev_ma)) = (ctx.prev(), prev_ma) {
            if crossed_above(prev.close(), prev_ma, close, ma) {
                out.push(Signal::event(TY, "MA200 Cross Above", 85.0, i));
                crossed = true;
            } else if crossed_below(prev.close(), prev_ma, close, ma) {
                out.push(Signal::event(TY, "MA200 Cross Below", 85.0, i));
                crossed = true;
            }
        }

        if !crossed {
            let tolerance = ma * cfg.test_tolerance_pct / 100.0;
            let near = |price: f64| (price - ma).abs() <= tolerance;
            if close > ma && near(candle.low()) {
                let (s, c) = ctx.confluence().boost(70.0, ma, i);
                out.push(Signal::event(TY, "MA200 Support Test", s, i).with_details(c.description));
            } else if close < ma && near(candle.high()) {
                let (s, c) = ctx.confluence().boost(70.0, ma, i);
                out.push(Signal::event(TY, "MA200 Resistance Test", s, i).with_details(c.description));
            }
        }

        out
    }
}

// ============================================================
// ICHIMOKU
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct IchimokuEvaluator;

impl IndicatorEvaluator for IchimokuEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Ichimoku
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.ichimoku.senkou_b_period.get() + config.ichimoku.kijun_period.get() - 1
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Ichimoku;
        let cfg = &ctx.config.ichimoku;
        let i = ctx.index;
        let (Some(candle), Some(cur)) = (ctx.candle(), ctx.value::<IchimokuValue>(IndicatorKey::Ichimoku)) else {
            return Vec::new();
        };
        let close = candle.close();
        let (top, bottom) = (cur.cloud_top(), cur.cloud_bottom());
        let mut out = Vec::new();

        if close > top {
            let s = ramp(40.0, 80.0, pct_from(close, top).unwrap_or(0.0), cfg.distance_scale_pct);
            out.push(Signal::state(TY, "Above Cloud", s, i));
        } else if close < bottom {
            let s = ramp(40.0, 80.0, pct_from(close, bottom).unwrap_or(0.0), cfg.distance_scale_pct);
            out.push(Signal::state(TY, "Below Cloud", s, i));
        } else {
            out.push(Signal::state(TY, "Inside Cloud", 30.0, i));
        }

        if cur.senkou_a > cur.senkou_b {
            out.push(Signal::state(TY, "Bullish Cloud", 35.0, i));
        } else if cur.senkou_a < cur.senkou_b {
            out.push(Signal::state(TY, "Bearish Cloud", 35.0, i));
        }

        if let Some(prev) = ctx.prev_value::<IchimokuValue>(IndicatorKey::Ichimoku) {
            if crossed_above(prev.tenkan, prev.kijun, cur.tenkan, cur.kijun) {
                let s = if close > top { 85.0 } else { 75.0 };
                out.push(Signal::event(TY, "TK Bullish Cross", s, i));
            } else if crossed_below(prev.tenkan, prev.kijun, cur.tenkan, cur.kijun) {
                let s = if close < bottom { 85.0 } else { 75.0 };
                out.push(Signal::event(TY, "TK Bearish Cross", s, i));
            }

            if let Some(prev_candle) = ctx.prev() {
                let pc = prev_candle.close();
                if crossed_above(pc, prev.cloud_top(), close, top) {
                    out.push(Signal::event(TY, "Cloud Breakout Bullish", 85.0, i));
                } else if crossed_below(pc, prev.cloud_bottom(), close, bottom) {
                    out.push(Signal::event(TY, "Cloud Breakout Bearish", 85.0, i));
                }
            }
        }

        out
    }
}

// ============================================================
// ADX
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct AdxEvaluator;

impl IndicatorEvaluator for AdxEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Adx
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        2 * config.adx.period.get() - 1
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Adx;
        let cfg = &ctx.config.adx;
        let i = ctx.index;
        let Some(cur) = ctx.value::<AdxValue>(IndicatorKey::Adx) else {
            return Vec::new();
        };
        let (weak, strong) = (cfg.weak_threshold, cfg.strong_threshold);
        let mut out = Vec::new();

        if cur.adx < weak {
            out.push(Signal::state(TY, "No Trend", 30.0, i));
        } else if cur.adx < strong {
            out.push(Signal::state(TY, "Developing Trend", 45.0, i));
        } else {
            out.push(Signal::state(TY, "Strong Trend", ramp(60.0, 90.0, cur.adx - strong, 25.0), i));
        }

        let spread = cur.plus_di - cur.minus_di;
        if spread > 0.0 {
            out.push(Signal::state(TY, "Bullish Direction", ramp(30.0, 70.0, spread, cfg.di_scale), i));
        } else if spread < 0.0 {
            out.push(Signal::state(TY, "Bearish Direction", ramp(30.0, 70.0, spread, cfg.di_scale), i));
        }

        if let Some(prev) = ctx.prev_value::<AdxValue>(IndicatorKey::Adx) {
            let trending = cur.adx >= strong;
            if crossed_above(prev.plus_di, prev.minus_di, cur.plus_di, cur.minus_di) {
                let s = if trending { 85.0 } else { 75.0 };
                out.push(Signal::event(TY, "DI Bullish Cross", s, i));
            } else if crossed_below(prev.plus_di, prev.minus_di, cur.plus_di, cur.minus_di) {
                let s = if trending { 85.0 } else { 75.0 };
                out.push(Signal::event(TY, "DI Bearish Cross", s, i));
            }

            if prev.adx < strong && cur.adx >= strong {
                out.push(Signal::event(TY, "Trend Strengthening", 80.0, i));
            } else if prev.adx >= weak && cur.adx < weak {
                out.push(Signal::event(TY, "Trend Weakening", 70.0, i));
            }
        }

        out
    }
}

// ============================================================
// PSAR
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PsarEvaluator;

impl IndicatorEvaluator for PsarEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Psar
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.psar.min_bars.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Psar;
        let i = ctx.index;
        let (Some(candle), Some(sar)) = (ctx.candle(), ctx.scalar(IndicatorKey::Psar)) else {
            return Vec::new();
        };
        let close = candle.close();
        let mut out = Vec::new();

        let dist = pct_from(close, sar).unwrap_or(0.0);
        let s = ramp(30.0, 70.0, dist, ctx.config.psar.distance_scale_pct);
        if sar < close {
            out.push(Signal::state(TY, "PSAR Bullish", s, i));
        } else if sar > close {
            out.push(Signal::state(TY, "PSAR Bearish", s, i));
        }

        if let (Some(prev), Some(prev_sar)) = (ctx.prev(), ctx.prev_scalar(IndicatorKey::Psar)) {
            let pc = prev.close();
            if prev_sar >= pc && sar < close {
                out.push(Signal::event(TY, "PSAR Bullish Flip", 85.0, i));
            } else if prev_sar <= pc && sar > close {
                out.push(Signal::event(TY, "PSAR Bearish Flip", 85.0, i));
            }
        }

        out
    }
}

// ============================================================
// WMA / TEMA / DEMA / HMA
// ============================================================

/// Price and slope signals against one moving average
#[derive(Debug, Clone, Copy)]
pub struct MovingAverageEvaluator {
    pub kind: MaKind,
}

impl Default for MovingAverageEvaluator {
    fn default() -> Self {
        MaKind::Wma.into()
    }
}

impl From<MaKind> for MovingAverageEvaluator {
    fn from(kind: MaKind) -> Self {
        Self { kind }
    }
}

impl IndicatorEvaluator for MovingAverageEvaluator {
    fn signal_type(&self) -> SignalType {
        self.kind.signal_type()
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        let cfg = self.kind.config(config);
        self.kind.warmup(cfg.period.get()) + cfg.slope_lookback.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        let ty = self.kind.signal_type();
        let label = self.kind.label();
        let key = self.kind.key();
        let cfg = self.kind.config(ctx.config);
        let lag = cfg.slope_lookback.get();
        let i = ctx.index;
        let (Some(candle), Some(ma)) = (ctx.candle(), ctx.scalar(key)) else {
            return Vec::new();
        };
        let close = candle.close();
        let mut out = Vec::new();

        if let Some(dist) = pct_from(close, ma) {
            let s = ramp(30.0, 70.0, dist, cfg.distance_scale_pct);
            if dist > 0.0 {
                out.push(Signal::state(ty, format!("Price Above {}", label), s, i));
            } else if dist < 0.0 {
                out.push(Signal::state(ty, format!("Price Below {}", label), s, i));
            }
        }

        let past = i.checked_sub(lag).and_then(|j| ctx.scalar_at(key, j));
        if let Some(past) = past {
            let slope = pct_from(ma, past).unwrap_or(0.0);
            let s = ramp(30.0, 60.0, slope, 1.0);
            if slope > 0.0 {
                out.push(Signal::state(ty, format!("{} Rising", label), s, i));
            } else if slope < 0.0 {
                out.push(Signal::state(ty, format!("{} Falling", label), s, i));
            }

            let older = i.checked_sub(2 * lag).and_then(|j| ctx.scalar_at(key, j));
            if let Some(older) = older {
                if past < older && ma > past {
                    out.push(Signal::event(ty, format!("{} Turning Up", label), 70.0, i));
                } else if past > older && ma < past {
                    out.push(Signal::event(ty, format!("{} Turning Down", label), 70.0, i));
                }
            }
        }

        if let (Some(prev), Some(prev_ma)) = (ctx.prev(), ctx.prev_scalar(key)) {
            if crossed_above(prev.close(), prev_ma, close, ma) {
                out.push(Signal::event(ty, format!("Price Cross Above {}", label), 75.0, i));
            } else if crossed_below(prev.close(), prev_ma, close, ma) {
                out.push(Signal::event(ty, format!("Price Cross Below {}", label), 75.0, i));
            }
        }

        out
    }
}

// ============================================================
// MA RIBBON
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MaRibbonEvaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RibbonOrder {
    Bullish,
    Bearish,
    Mixed,
}

fn ribbon_order(values: &[f64]) -> RibbonOrder {
    if values.windows(2).all(|w| w[0] > w[1]) {
        RibbonOrder::Bullish
    } else if values.windows(2).all(|w| w[0] < w[1]) {
        RibbonOrder::Bearish
    } else {
        RibbonOrder::Mixed
    }
}

/// Distance between the outermost averages, % of price
fn ribbon_spread(values: &[f64], price: f64) -> Option<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    if price <= 0.0 || !max.is_finite() || !min.is_finite() {
        return None;
    }
    Some((max - min) / price * 100.0)
}

impl IndicatorEvaluator for MaRibbonEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::MaRibbon
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.ma_ribbon.periods.iter().copied().max().unwrap_or(1)
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::MaRibbon;
        let cfg = &ctx.config.ma_ribbon;
        let i = ctx.index;
        let (Some(candle), Some(cur)) = (ctx.candle(), ctx.value::<RibbonValue>(IndicatorKey::MaRibbon)) else {
            return Vec::new();
        };
        if cur.values.len() < 2 {
            return Vec::new();
        }
        let close = candle.close();
        let order = ribbon_order(&cur.values);
        let spread = ribbon_spread(&cur.values, close);
        let mut out = Vec::new();

        let s = ramp(45.0, 80.0, spread.unwrap_or(0.0), cfg.expansion_pct);
        match order {
            RibbonOrder::Bullish => out.push(Signal::state(TY, "Bullish Ribbon", s, i)),
            RibbonOrder::Bearish => out.push(Signal::state(TY, "Bearish Ribbon", s, i)),
            RibbonOrder::Mixed => out.push(Signal::state(TY, "Mixed Ribbon", 30.0, i)),
        }

        let prev = ctx
            .prev_value::<RibbonValue>(IndicatorKey::MaRibbon)
            .filter(|p| p.values.len() >= 2);
        if let (Some(prev), Some(prev_candle)) = (prev, ctx.prev()) {
            let prev_order = ribbon_order(&prev.values);
            if order != prev_order {
                match order {
                    RibbonOrder::Bullish => out.push(Signal::event(TY, "Ribbon Bullish Alignment", 80.0, i)),
                    RibbonOrder::Bearish => out.push(Signal::event(TY, "Ribbon Bearish Alignment", 80.0, i)),
                    RibbonOrder::Mixed => {}
                }
            }

            if let (Some(now), Some(before)) = (spread, ribbon_spread(&prev.values, prev_candle.close())) {
                if now < cfg.compression_pct && before >= cfg.compression_pct {
                    out.push(Signal::event(TY, "Ribbon Compression", 65.0, i));
                } else if now > cfg.expansion_pct && before <= cfg.expansion_pct {
                    out.push(Signal::event(TY, "Ribbon Expansion", 65.0, i));
                }
            }
        }

        out
    }
}
