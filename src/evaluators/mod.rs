//! Per-indicator signal evaluators
//!
//! Each evaluator reads the indicator values at one candle (plus the
//! previous candle for transitions) and emits two classes of [`Signal`]:
//!
//! - **state** signals describe a persistent condition ("Price Above EMA")
//! - **event** signals describe a transition ("Bullish Cross")
//!
//! Output always passes through [`normalize`] before it is returned.
//!
//! # Families
//!
//! - **Trend (11)**: MACD, EMA, MA200, Ichimoku, ADX, PSAR, WMA, TEMA, DEMA, HMA, MA Ribbon
//! - **Volatility (6)**: Bollinger, BBW, ATR, Keltner, Donchian, TTM Squeeze
//! - **Volume (5)**: Volume, MFI, OBV, CMF, AD Line
//! - **Structure (3)**: Support/Resistance, Pivot Points, Fibonacci
//! - **Pattern (2)**: chart patterns, candlestick patterns

use crate::config::EngineConfig;
use crate::confluence::ConfluenceScorer;
use crate::logging::{LogSink, TRACING_SINK};
use crate::normalizer::normalize;
use crate::series::{IndicatorKey, IndicatorSeries, SeriesValue};
use crate::{MarketRegime, Signal, SignalType, OHLCV};

pub(crate) mod helpers;

pub mod patterns;
pub mod structure;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use patterns::*;
pub use structure::*;
pub use trend::*;
pub use volatility::*;
pub use volume::*;

// ============================================================
// CONTEXT
// ============================================================

/// Inputs for evaluating one candle
pub struct EvalContext<'a, T> {
    pub candles: &'a [T],
    pub series: &'a IndicatorSeries,
    pub index: usize,
    pub config: &'a EngineConfig,
    pub regime: &'a MarketRegime,
    pub log: &'a dyn LogSink,
}

impl<'a, T: OHLCV> EvalContext<'a, T> {
    pub fn new(
        candles: &'a [T],
        series: &'a IndicatorSeries,
        index: usize,
        config: &'a EngineConfig,
        regime: &'a MarketRegime,
    ) -> Self {
        Self {
            candles,
            series,
            index,
            config,
            regime,
            log: &TRACING_SINK,
        }
    }

    pub fn with_log(mut self, log: &'a dyn LogSink) -> Self {
        self.log = log;
        self
    }

    /// The candle being evaluated
    #[inline]
    pub fn candle(&self) -> Option<&'a T> {
        self.candles.get(self.index)
    }

    /// The candle before it
    #[inline]
    pub fn prev(&self) -> Option<&'a T> {
        self.index.checked_sub(1).and_then(|i| self.candles.get(i))
    }

    /// Valid value of `key` at candle `index`
    #[inline]
    pub fn value_at<V: SeriesValue>(&self, key: IndicatorKey, index: usize) -> Option<&'a V> {
        self.series.value_at::<V>(key, index, self.candles.len(), self.log)
    }

    /// Value at the current candle
    #[inline]
    pub fn value<V: SeriesValue>(&self, key: IndicatorKey) -> Option<&'a V> {
        self.value_at(key, self.index)
    }

    /// Value at the previous candle
    #[inline]
    pub fn prev_value<V: SeriesValue>(&self, key: IndicatorKey) -> Option<&'a V> {
        self.value_at(key, self.index.checked_sub(1)?)
    }

    #[inline]
    pub fn scalar_at(&self, key: IndicatorKey, index: usize) -> Option<f64> {
        self.value_at::<f64>(key, index).copied()
    }

    #[inline]
    pub fn scalar(&self, key: IndicatorKey) -> Option<f64> {
        self.scalar_at(key, self.index)
    }

    #[inline]
    pub fn prev_scalar(&self, key: IndicatorKey) -> Option<f64> {
        self.scalar_at(key, self.index.checked_sub(1)?)
    }

    /// Confluence scorer over the same inputs
    pub fn confluence(&self) -> ConfluenceScorer<'a, T> {
        ConfluenceScorer::new(self.candles, self.series, &self.config.confluence).with_log(self.log)
    }
}

// ============================================================
// EVALUATOR TRAIT
// ============================================================

/// One indicator family
pub trait IndicatorEvaluator: Send + Sync {
    fn signal_type(&self) -> SignalType;

    /// First candle index at which the evaluator may emit anything
    fn min_lookback(&self, config: &EngineConfig) -> usize;

    /// Unnormalized output at `ctx.index`. May contain duplicate values and
    /// out-of-range strengths; [`IndicatorEvaluator::evaluate`] cleans both.
    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal>;

    /// Normalized output at `ctx.index`, empty during warmup
    fn evaluate<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        if ctx.index >= ctx.candles.len() || ctx.index < self.min_lookback(ctx.config) {
            return Vec::new();
        }
        normalize(self.raw_signals(ctx), ctx.regime)
    }
}

/// Moving average flavors sharing [`MovingAverageEvaluator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaKind {
    Wma,
    Tema,
    Dema,
    Hma,
}

impl MaKind {
    pub const ALL: [MaKind; 4] = [MaKind::Wma, MaKind::Tema, MaKind::Dema, MaKind::Hma];

    /// Label used inside signal values ("Price Above HMA")
    pub fn label(self) -> &'static str {
        match self {
            MaKind::Wma => "WMA",
            MaKind::Tema => "TEMA",
            MaKind::Dema => "DEMA",
            MaKind::Hma => "HMA",
        }
    }

    pub fn key(self) -> IndicatorKey {
        match self {
            MaKind::Wma => IndicatorKey::Wma,
            MaKind::Tema => IndicatorKey::Tema,
            MaKind::Dema => IndicatorKey::Dema,
            MaKind::Hma => IndicatorKey::Hma,
        }
    }

    pub fn signal_type(self) -> SignalType {
        match self {
            MaKind::Wma => SignalType::Wma,
            MaKind::Tema => SignalType::Tema,
            MaKind::Dema => SignalType::Dema,
            MaKind::Hma => SignalType::Hma,
        }
    }

    pub fn config(self, config: &EngineConfig) -> &crate::config::MovingAverageConfig {
        match self {
            MaKind::Wma => &config.wma,
            MaKind::Tema => &config.tema,
            MaKind::Dema => &config.dema,
            MaKind::Hma => &config.hma,
        }
    }

    /// Index of the first defined value for `period`
    pub fn warmup(self, period: usize) -> usize {
        let p = period.max(1);
        match self {
            MaKind::Wma => p - 1,
            MaKind::Dema => 2 * p - 2,
            MaKind::Tema => 3 * p - 3,
            MaKind::Hma => p + (p as f64).sqrt().floor() as usize - 2,
        }
    }
}

// ============================================================
// DISPATCH
// ============================================================

macro_rules! define_builtin_evaluators {
    (
        $(
            $variant:ident($evaluator:ty)
        ),* $(,)?
    ) => {
        /// All builtin evaluators - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinEvaluator {
            $($variant($evaluator)),*
        }

        impl BuiltinEvaluator {
            #[inline]
            pub fn evaluate<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
                match self {
                    $(Self::$variant(e) => IndicatorEvaluator::evaluate(e, ctx)),*
                }
            }

            #[inline]
            pub fn signal_type(&self) -> SignalType {
                match self {
                    $(Self::$variant(e) => IndicatorEvaluator::signal_type(e)),*
                }
            }

            #[inline]
            pub fn min_lookback(&self, config: &EngineConfig) -> usize {
                match self {
                    $(Self::$variant(e) => IndicatorEvaluator::min_lookback(e, config)),*
                }
            }
        }
    };
}

define_builtin_evaluators! {
    // Trend
    Macd(MacdEvaluator),
    Ema(EmaEvaluator),
    Ma200(Ma200Evaluator),
    Ichimoku(IchimokuEvaluator),
    Adx(AdxEvaluator),
    Psar(PsarEvaluator),
    MovingAverage(MovingAverageEvaluator),
    MaRibbon(MaRibbonEvaluator),

    // Volatility
    Bollinger(BollingerEvaluator),
    Bbw(BbwEvaluator),
    Atr(AtrEvaluator),
    Keltner(KeltnerEvaluator),
    Donchian(DonchianEvaluator),
    TtmSqueeze(TtmSqueezeEvaluator),

    // Volume
    Volume(VolumeEvaluator),
    Mfi(MfiEvaluator),
    Obv(ObvEvaluator),
    Cmf(CmfEvaluator),
    AdLine(AdLineEvaluator),

    // Structure
    SupportResistance(SupportResistanceEvaluator),
    PivotPoints(PivotPointsEvaluator),
    Fibonacci(FibonacciEvaluator),

    // Patterns
    ChartPattern(ChartPatternEvaluator),
    Candlestick(CandlestickEvaluator),
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[test]
    fn test_ma_warmups() {
        assert_eq!(MaKind::Wma.warmup(20), 19);
        assert_eq!(MaKind::Dema.warmup(20), 38);
        assert_eq!(MaKind::Tema.warmup(20), 57);
        assert_eq!(MaKind::Hma.warmup(16), 18);
    }

    #[test]
    fn test_warmup_gate() {
        let cfg = config();
        let regime = neutral();
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let c = candles(&closes);
        let series = IndicatorSeries::new()
            .with(IndicatorKey::EmaFast, scalar(closes.iter().map(|x| x - 1.0).collect()))
            .with(IndicatorKey::EmaSlow, scalar(closes.iter().map(|x| x - 2.0).collect()));

        let ema = BuiltinEvaluator::Ema(EmaEvaluator);
        let lookback = ema.min_lookback(&cfg);
        for i in 0..lookback {
            let ctx = EvalContext::new(&c, &series, i, &cfg, &regime);
            assert!(ema.evaluate(&ctx).is_empty());
        }
        let ctx = EvalContext::new(&c, &series, lookback, &cfg, &regime);
        assert!(!ema.evaluate(&ctx).is_empty());

        let past_end = EvalContext::new(&c, &series, 99, &cfg, &regime);
        assert!(ema.evaluate(&past_end).is_empty());
    }

    #[test]
    fn test_wrong_variant_is_logged_and_skipped() {
        use crate::logging::{FnSink, LogLevel};
        use std::sync::Mutex;

        let errors = Mutex::new(0usize);
        let sink = FnSink(|_: &str, level: LogLevel| {
            if level == LogLevel::Error {
                *errors.lock().unwrap() += 1;
            }
        });
        let cfg = config();
        let regime = neutral();
        let c = candles(&[100.0; 40]);
        // PSAR slot holding a MACD payload
        let series = single(
            IndicatorKey::Psar,
            crate::series::SeriesData::Macd(crate::series::Series::from_values(vec![
                crate::series::MacdValue {
                    macd: 0.0,
                    signal: 0.0,
                    histogram: 0.0,
                };
                40
            ])),
        );
        let ctx = EvalContext::new(&c, &series, 39, &cfg, &regime).with_log(&sink);
        assert!(BuiltinEvaluator::Psar(PsarEvaluator).evaluate(&ctx).is_empty());
        assert!(*errors.lock().unwrap() > 0);
    }
}
