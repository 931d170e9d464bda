//! Volume evaluators: Volume, MFI, OBV, CMF, AD Line

use super::helpers::{crossed_above, crossed_below, mean_scalar, oscillator_divergence, pct_from, ramp};
use super::{EvalContext, IndicatorEvaluator};
use crate::config::EngineConfig;
use crate::series::IndicatorKey;
use crate::trendline::Trendline;
use crate::{OHLCVExt, Signal, SignalType, OHLCV};

/// Divergence on a scalar oscillator slot
fn scalar_divergence<T: OHLCV>(
    ctx: &EvalContext<'_, T>,
    ty: SignalType,
    key: IndicatorKey,
    lookback: usize,
    min_osc_move: f64,
) -> Option<Signal> {
    oscillator_divergence(ctx, ty, key, lookback, min_osc_move, |v: &f64| *v)
}

// ============================================================
// VOLUME
// ============================================================

/// Raw volume against its moving average
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeEvaluator;

impl VolumeEvaluator {
    /// Volume over its average at `index`. Uses the `VolumeSma` slot when
    /// present, otherwise averages candle volumes directly.
    fn ratio<T: OHLCV>(ctx: &EvalContext<'_, T>, index: usize) -> Option<f64> {
        let volume = ctx.candles.get(index)?.volume();
        let average = match ctx.scalar_at(IndicatorKey::VolumeSma, index) {
            Some(avg) => avg,
            None => {
                let period = ctx.config.volume.period.get();
                let window = &ctx.candles[(index + 1).saturating_sub(period)..=index];
                window.iter().map(|c| c.volume()).sum::<f64>() / window.len() as f64
            }
        };
        let ratio = volume / average;
        (average > 0.0 && ratio.is_finite()).then_some(ratio)
    }
}

impl IndicatorEvaluator for VolumeEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Volume
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.volume.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Volume;
        let cfg = &ctx.config.volume;
        let i = ctx.index;
        let (Some(candle), Some(ratio)) = (ctx.candle(), Self::ratio(ctx, i)) else {
            return Vec::new();
        };
        let details = format!("volume {:.2}x average", ratio);
        let mut out = Vec::new();

        if ratio >= cfg.high_ratio {
            let s = ramp(50.0, 80.0, ratio - cfg.high_ratio, cfg.spike_multiplier - cfg.high_ratio);
            out.push(Signal::state(TY, "High Volume", s, i).with_details(details.clone()));
        } else if ratio <= cfg.low_ratio {
            out.push(Signal::state(TY, "Low Volume", 35.0, i).with_details(details.clone()));
        } else {
            out.push(Signal::state(TY, "Normal Volume", 25.0, i).with_details(details.clone()));
        }

        if ratio >= cfg.spike_multiplier {
            out.push(Signal::event(TY, "Volume Spike", 80.0, i).with_details(details));
        }

        if let Some(prev) = ctx.prev() {
            if ratio >= cfg.high_ratio {
                if candle.is_bullish() && candle.close() > prev.close() {
                    out.push(Signal::event(TY, "Bullish Volume Confirmation", 70.0, i));
                } else if candle.is_bearish() && candle.close() < prev.close() {
                    out.push(Signal::event(TY, "Bearish Volume Confirmation", 70.0, i));
                }
            }

            let was_active = Self::ratio(ctx, i - 1).is_some_and(|r| r > cfg.low_ratio);
            if ratio <= cfg.low_ratio && was_active {
                out.push(Signal::event(TY, "Volume Dry Up", 60.0, i));
            }
        }

        out
    }
}

// ============================================================
// MFI
// ============================================================

/// Money Flow Index. Zone boundaries are exclusive: exactly 80 is neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct MfiEvaluator;

impl IndicatorEvaluator for MfiEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Mfi
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.mfi.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Mfi;
        let cfg = &ctx.config.mfi;
        let i = ctx.index;
        let Some(cur) = ctx.scalar(IndicatorKey::Mfi) else {
            return Vec::new();
        };
        let (ob, os) = (cfg.overbought, cfg.oversold);
        let mut out = Vec::new();

        if cur > ob {
            out.push(Signal::state(TY, "Overbought", ramp(55.0, 80.0, cur - ob, 100.0 - ob), i));
        } else if cur < os {
            out.push(Signal::state(TY, "Oversold", ramp(55.0, 80.0, os - cur, os), i));
        } else {
            out.push(Signal::state(TY, "Neutral", 25.0, i));
        }

        if let Some(prev) = ctx.prev_scalar(IndicatorKey::Mfi) {
            if prev > ob && cur <= ob {
                out.push(Signal::event(TY, "Exit Overbought", 75.0, i));
            } else if prev < os && cur >= os {
                out.push(Signal::event(TY, "Exit Oversold", 75.0, i));
            } else if prev <= ob && cur > ob {
                out.push(Signal::event(TY, "Enter Overbought", 65.0, i));
            } else if prev >= os && cur < os {
                out.push(Signal::event(TY, "Enter Oversold", 65.0, i));
            }
        }

        if cfg.divergence {
            out.extend(scalar_divergence(
                ctx,
                TY,
                IndicatorKey::Mfi,
                cfg.divergence_lookback.get(),
                cfg.min_oscillator_move,
            ));
        }

        out
    }
}

// ============================================================
// OBV
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ObvEvaluator;

impl IndicatorEvaluator for ObvEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Obv
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.obv.trend_lookback.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Obv;
        let cfg = &ctx.config.obv;
        let i = ctx.index;
        let Some(cur) = ctx.scalar(IndicatorKey::Obv) else {
            return Vec::new();
        };
        let mut out = Vec::new();

        let start = (i + 1).saturating_sub(cfg.trend_lookback.get());
        let points: Vec<(f64, f64)> = (start..=i)
            .filter_map(|j| ctx.scalar_at(IndicatorKey::Obv, j).map(|v| (j as f64, v)))
            .collect();
        if let Some(line) = Trendline::fit_xy(points.iter().copied()) {
            // OBV has no natural scale, so the slope is read against its mean magnitude
            let reference = points.iter().map(|(_, v)| v.abs()).sum::<f64>() / points.len() as f64;
            let slope = line.normalized_slope(reference) * 100.0;
            let s = ramp(35.0, 65.0, slope, 2.0);
            if line.slope > 0.0 {
                out.push(Signal::state(TY, "OBV Rising", s, i));
            } else if line.slope < 0.0 {
                out.push(Signal::state(TY, "OBV Falling", s, i));
            }
        }

        let lookback = cfg.breakout_lookback.get();
        let prior: Vec<f64> = ((i.saturating_sub(lookback))..i)
            .filter_map(|j| ctx.scalar_at(IndicatorKey::Obv, j))
            .collect();
        if !prior.is_empty() {
            let high = prior.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let low = prior.iter().copied().fold(f64::INFINITY, f64::min);
            if cur > high {
                out.push(Signal::event(TY, "OBV Breakout Up", 75.0, i));
            } else if cur < low {
                out.push(Signal::event(TY, "OBV Breakdown", 75.0, i));
            }
        }

        if cfg.divergence {
            out.extend(scalar_divergence(ctx, TY, IndicatorKey::Obv, cfg.divergence_lookback.get(), 0.0));
        }

        out
    }
}

// ============================================================
// CMF
// ============================================================

/// Chaikin Money Flow
#[derive(Debug, Clone, Copy, Default)]
pub struct CmfEvaluator;

impl IndicatorEvaluator for CmfEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Cmf
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.cmf.period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::Cmf;
        let cfg = &ctx.config.cmf;
        let i = ctx.index;
        let Some(cur) = ctx.scalar(IndicatorKey::Cmf) else {
            return Vec::new();
        };
        let (threshold, strong) = (cfg.threshold, cfg.strong_threshold);
        let mut out = Vec::new();

        let s = ramp(40.0, 75.0, cur.abs() - threshold, strong - threshold);
        if cur > threshold {
            out.push(Signal::state(TY, "Buying Pressure", s, i));
        } else if cur < -threshold {
            out.push(Signal::state(TY, "Selling Pressure", s, i));
        } else {
            out.push(Signal::state(TY, "Neutral Flow", 25.0, i));
        }

        if let Some(prev) = ctx.prev_scalar(IndicatorKey::Cmf) {
            if crossed_above(prev, 0.0, cur, 0.0) {
                out.push(Signal::event(TY, "CMF Cross Above Zero", 70.0, i));
            } else if crossed_below(prev, 0.0, cur, 0.0) {
                out.push(Signal::event(TY, "CMF Cross Below Zero", 70.0, i));
            }

            if crossed_above(prev, strong, cur, strong) {
                out.push(Signal::event(TY, "CMF Strong Buying", 80.0, i));
            } else if crossed_below(prev, -strong, cur, -strong) {
                out.push(Signal::event(TY, "CMF Strong Selling", 80.0, i));
            }
        }

        out
    }
}

// ============================================================
// AD LINE
// ============================================================

/// Accumulation/Distribution line against its own SMA
#[derive(Debug, Clone, Copy, Default)]
pub struct AdLineEvaluator;

impl IndicatorEvaluator for AdLineEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::AdLine
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        config.ad_line.average_period.get()
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::AdLine;
        let cfg = &ctx.config.ad_line;
        let period = cfg.average_period.get();
        let i = ctx.index;
        let (Some(cur), Some(avg)) = (
            ctx.scalar(IndicatorKey::AdLine),
            mean_scalar(ctx, IndicatorKey::AdLine, i, period),
        ) else {
            return Vec::new();
        };
        let mut out = Vec::new();

        let deviation = pct_from(cur, avg).map(f64::abs).unwrap_or(0.0);
        let s = ramp(35.0, 65.0, deviation, 5.0);
        if cur > avg {
            out.push(Signal::state(TY, "Accumulation", s, i));
        } else if cur < avg {
            out.push(Signal::state(TY, "Distribution", s, i));
        }

        let prev_avg = i.checked_sub(1).and_then(|j| mean_scalar(ctx, IndicatorKey::AdLine, j, period));
        if let (Some(prev), Some(prev_avg)) = (ctx.prev_scalar(IndicatorKey::AdLine), prev_avg) {
            if crossed_above(prev, prev_avg, cur, avg) {
                out.push(Signal::event(TY, "AD Line Cross Above Average", 65.0, i));
            } else if crossed_below(prev, prev_avg, cur, avg) {
                out.push(Signal::event(TY, "AD Line Cross Below Average", 65.0, i));
            }
        }

        if cfg.divergence {
            out.extend(scalar_divergence(ctx, TY, IndicatorKey::AdLine, cfg.divergence_lookback.get(), 0.0));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::Candle;

    fn names(signals: &[Signal]) -> Vec<&str> {
        signals.iter().map(|s| s.value.as_str()).collect()
    }

    #[test]
    fn test_volume_spike_without_sma_slot() {
        let cfg = config();
        let regime = neutral();
        let mut c = candles(&[100.0; 30]);
        c[29] = Candle::new(100.0, 102.5, 99.5, 102.0, 5000.0);
        let series = crate::series::IndicatorSeries::new();
        let ctx = EvalContext::new(&c, &series, 29, &cfg, &regime);
        let out = VolumeEvaluator.evaluate(&ctx);
        let n = names(&out);
        assert!(n.contains(&"Volume Spike"));
        assert!(n.contains(&"High Volume"));
        assert!(n.contains(&"Bullish Volume Confirmation"));
    }

    #[test]
    fn test_volume_dry_up() {
        let cfg = config();
        let regime = neutral();
        let mut c = candles(&[100.0; 30]);
        c[29].volume = 300.0;
        let series = single(IndicatorKey::VolumeSma, scalar(vec![1000.0; 30]));
        let ctx = EvalContext::new(&c, &series, 29, &cfg, &regime);
        let out = VolumeEvaluator.evaluate(&ctx);
        assert!(names(&out).contains(&"Volume Dry Up"));
        assert!(names(&out).contains(&"Low Volume"));
    }

    #[test]
    fn test_mfi_boundaries_are_strict() {
        let cfg = config();
        let regime = neutral();
        let c = candles(&[100.0; 20]);
        let series = single(IndicatorKey::Mfi, scalar(padded(20, 50.0, &[80.0])));
        let ctx = EvalContext::new(&c, &series, 19, &cfg, &regime);
        let out = MfiEvaluator.evaluate(&ctx);
        assert!(names(&out).contains(&"Neutral"));
        assert!(!names(&out).contains(&"Enter Overbought"));

        let series = single(IndicatorKey::Mfi, scalar(padded(20, 85.0, &[79.0])));
        let ctx = EvalContext::new(&c, &series, 19, &cfg, &regime);
        let out = MfiEvaluator.evaluate(&ctx);
        assert!(names(&out).contains(&"Exit Overbought"));

        let series = single(IndicatorKey::Mfi, scalar(padded(20, 30.0, &[15.0])));
        let ctx = EvalContext::new(&c, &series, 19, &cfg, &regime);
        let out = MfiEvaluator.evaluate(&ctx);
        assert!(names(&out).contains(&"Enter Oversold"));
        assert!(names(&out).contains(&"Oversold"));
    }

    #[test]
    fn test_obv_trend_and_breakout() {
        let cfg = config();
        let regime = neutral();
        let c = candles(&[100.0; 30]);
        let obv: Vec<f64> = (0..30).map(|i| 1000.0 + 50.0 * i as f64).collect();
        let series = single(IndicatorKey::Obv, scalar(obv));
        let ctx = EvalContext::new(&c, &series, 29, &cfg, &regime);
        let out = ObvEvaluator.evaluate(&ctx);
        assert!(names(&out).contains(&"OBV Rising"));
        assert!(names(&out).contains(&"OBV Breakout Up"));
    }

    #[test]
    fn test_cmf_crosses() {
        let cfg = config();
        let regime = neutral();
        let c = candles(&[100.0; 25]);
        let series = single(IndicatorKey::Cmf, scalar(padded(25, -0.02, &[0.3])));
        let ctx = EvalContext::new(&c, &series, 24, &cfg, &regime);
        let out = CmfEvaluator.evaluate(&ctx);
        let n = names(&out);
        assert!(n.contains(&"CMF Cross Above Zero"));
        assert!(n.contains(&"CMF Strong Buying"));
        let pressure = out.iter().find(|s| s.value == "Buying Pressure").unwrap();
        assert_eq!(pressure.base_strength, 75.0);
    }

    #[test]
    fn test_ad_line_cross() {
        let cfg = config();
        let regime = neutral();
        let c = candles(&[100.0; 25]);
        let series = single(IndicatorKey::AdLine, scalar(padded(25, 1000.0, &[990.0, 1100.0])));
        let ctx = EvalContext::new(&c, &series, 24, &cfg, &regime);
        let out = AdLineEvaluator.evaluate(&ctx);
        assert!(names(&out).contains(&"AD Line Cross Above Average"));
        assert!(names(&out).contains(&"Accumulation"));
    }
}
