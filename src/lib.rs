//! # tasig - Technical-Analysis Signal evaluation
//!
//! Turns a candle series plus precomputed indicator series into a normalized
//! stream of weighted [`Signal`] records: indicator states, crossovers,
//! breakouts, divergences, chart patterns and candlestick patterns.
//!
//! ## Quick Start
//!
//! ```rust
//! use tasig::prelude::*;
//!
//! let candles: Vec<Candle> = (0..40)
//!     .map(|i| {
//!         let p = 100.0 + i as f64;
//!         Candle::new(p, p + 1.0, p - 1.0, p + 0.5, 1_000.0)
//!     })
//!     .collect();
//!
//! let mut series = IndicatorSeries::new();
//! series.insert(
//!     IndicatorKey::EmaFast,
//!     SeriesData::Scalar(Series::from_values(candles.iter().map(|c| c.close - 1.0).collect())),
//! );
//! series.insert(
//!     IndicatorKey::EmaSlow,
//!     SeriesData::Scalar(Series::from_values(candles.iter().map(|c| c.close - 2.0).collect())),
//! );
//!
//! let engine = EngineBuilder::new().with_trend_defaults().build().unwrap();
//! let regime = MarketRegime::new("uptrend", 0.8);
//! let signals = engine.evaluate_latest(&candles, &series, &regime).unwrap();
//! assert!(signals.iter().all(|s| (0.0..=100.0).contains(&s.strength)));
//! ```

pub mod chart;
pub mod config;
pub mod confluence;
pub mod detectors;
pub mod divergence;
pub mod evaluators;
pub mod logging;
pub mod normalizer;
pub mod pivots;
pub mod series;
pub mod trendline;

pub mod prelude {
    pub use crate::{
        // Chart patterns
        chart::{
            ChartPattern, ChartPatternKind, ChartPatternRecognizer, PatternConfidence,
            PatternFamily,
        },
        // Configuration
        config::*,
        // Confluence
        confluence::{apply_bonus, Confluence, ConfluenceResult, ConfluenceScorer},
        // Candlestick detectors
        detectors::*,
        // Divergence
        divergence::{Divergence, DivergenceKind, DivergenceParams},
        // Evaluators
        evaluators::{BuiltinEvaluator, EvalContext, IndicatorEvaluator, MaKind},
        // Logging
        logging::{FnSink, LogLevel, LogSink, NullSink, TracingSink},
        // Normalization
        normalizer::{normalize, regime_factor},
        // Geometry
        pivots::{find_pivots, find_price_pivots, Pivot, Pivots},
        // Indicator input
        series::*,
        trendline::{Convergence, Trendline},
        // Batch
        evaluate_parallel,
        BarSignals,
        BuiltinDetector,
        Candle,
        CandlestickRecognizer,
        Direction,
        EngineBuilder,
        EvaluationError,
        Instrument,
        MarketRegime,
        OHLCVExt,
        PatternDetector,
        PatternId,
        PatternMatch,
        Period,
        Ratio,
        RegimeTrend,
        Result,
        Signal,
        SignalCategory,
        SignalEngine,
        SignalError,
        SignalType,
        SymbolSignals,
        OHLCV,
    };
}

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{CandlestickConfig, EngineConfig};
use crate::evaluators::{BuiltinEvaluator, EvalContext, MaKind};
use crate::logging::{LogLevel, LogSink, TracingSink};
use crate::series::IndicatorSeries;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors raised for contract violations. Data-quality problems never
/// produce an error; they yield empty or reduced signal lists instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Index {index} out of range for {len} candles")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unknown chart pattern: {0}")]
    UnknownPattern(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(SignalError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(SignalError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(SignalError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Midpoint of the real body
    #[inline]
    fn body_midpoint(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    /// Body as ratio of range. Returns None if range is ~0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    /// True range against the previous close (plain range when there is none)
    #[inline]
    fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) => self.range().max((self.high() - pc).abs()).max((self.low() - pc).abs()),
            None => self.range(),
        }
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        if self.open().is_nan()
            || self.high().is_nan()
            || self.low().is_nan()
            || self.close().is_nan()
        {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if self.open().is_infinite()
            || self.high().is_infinite()
            || self.low().is_infinite()
            || self.close().is_infinite()
        {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(SignalError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Plain candle record. Callers with their own bar type can implement
/// [`OHLCV`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

/// Direction/bias of a pattern or signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

// ============================================================
// SIGNALS
// ============================================================

/// Broad grouping used by the regime multiplier table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalCategory {
    Trend,
    Volatility,
    Volume,
    Structure,
    Pattern,
}

/// Indicator family that produced a signal. The serialized names are part
/// of the matching contract with strategy code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "EMA")]
    Ema,
    #[serde(rename = "MA200")]
    Ma200,
    Ichimoku,
    #[serde(rename = "ADX")]
    Adx,
    #[serde(rename = "PSAR")]
    Psar,
    #[serde(rename = "WMA")]
    Wma,
    #[serde(rename = "TEMA")]
    Tema,
    #[serde(rename = "DEMA")]
    Dema,
    #[serde(rename = "HMA")]
    Hma,
    #[serde(rename = "MA Ribbon")]
    MaRibbon,
    Bollinger,
    #[serde(rename = "BBW")]
    Bbw,
    #[serde(rename = "ATR")]
    Atr,
    Keltner,
    Donchian,
    #[serde(rename = "TTM Squeeze")]
    TtmSqueeze,
    Volume,
    #[serde(rename = "MFI")]
    Mfi,
    #[serde(rename = "OBV")]
    Obv,
    #[serde(rename = "CMF")]
    Cmf,
    #[serde(rename = "AD Line")]
    AdLine,
    #[serde(rename = "Support Resistance")]
    SupportResistance,
    #[serde(rename = "Pivot Points")]
    PivotPoints,
    Fibonacci,
    #[serde(rename = "Chart Pattern")]
    ChartPattern,
    Candlestick,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Macd => "MACD",
            SignalType::Ema => "EMA",
            SignalType::Ma200 => "MA200",
            SignalType::Ichimoku => "Ichimoku",
            SignalType::Adx => "ADX",
            SignalType::Psar => "PSAR",
            SignalType::Wma => "WMA",
            SignalType::Tema => "TEMA",
            SignalType::Dema => "DEMA",
            SignalType::Hma => "HMA",
            SignalType::MaRibbon => "MA Ribbon",
            SignalType::Bollinger => "Bollinger",
            SignalType::Bbw => "BBW",
            SignalType::Atr => "ATR",
            SignalType::Keltner => "Keltner",
            SignalType::Donchian => "Donchian",
            SignalType::TtmSqueeze => "TTM Squeeze",
            SignalType::Volume => "Volume",
            SignalType::Mfi => "MFI",
            SignalType::Obv => "OBV",
            SignalType::Cmf => "CMF",
            SignalType::AdLine => "AD Line",
            SignalType::SupportResistance => "Support Resistance",
            SignalType::PivotPoints => "Pivot Points",
            SignalType::Fibonacci => "Fibonacci",
            SignalType::ChartPattern => "Chart Pattern",
            SignalType::Candlestick => "Candlestick",
        }
    }

    pub fn category(self) -> SignalCategory {
        match self {
            SignalType::Macd
            | SignalType::Ema
            | SignalType::Ma200
            | SignalType::Ichimoku
            | SignalType::Adx
            | SignalType::Psar
            | SignalType::Wma
            | SignalType::Tema
            | SignalType::Dema
            | SignalType::Hma
            | SignalType::MaRibbon => SignalCategory::Trend,
            SignalType::Bollinger
            | SignalType::Bbw
            | SignalType::Atr
            | SignalType::Keltner
            | SignalType::Donchian
            | SignalType::TtmSqueeze => SignalCategory::Volatility,
            SignalType::Volume
            | SignalType::Mfi
            | SignalType::Obv
            | SignalType::Cmf
            | SignalType::AdLine => SignalCategory::Volume,
            SignalType::SupportResistance | SignalType::PivotPoints | SignalType::Fibonacci => {
                SignalCategory::Structure
            }
            SignalType::ChartPattern | SignalType::Candlestick => SignalCategory::Pattern,
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One weighted observation about the market at a candle.
///
/// `value` is the matching key used by strategy code. `base_strength` is the
/// clamped strength before the regime multiplier; `strength` is always
/// derived from it, which keeps normalization idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub value: String,
    pub strength: f64,
    pub base_strength: f64,
    pub is_event: bool,
    pub details: String,
    pub priority: i32,
    pub candle_index: usize,
}

impl Signal {
    fn build(
        signal_type: SignalType,
        value: impl Into<String>,
        strength: f64,
        is_event: bool,
        candle_index: usize,
    ) -> Self {
        Self {
            signal_type,
            value: value.into(),
            strength,
            base_strength: strength,
            is_event,
            details: String::new(),
            priority: if is_event { 3 } else { 1 },
            candle_index,
        }
    }

    /// Persistent condition at the candle
    pub fn state(
        signal_type: SignalType,
        value: impl Into<String>,
        strength: f64,
        candle_index: usize,
    ) -> Self {
        Self::build(signal_type, value, strength, false, candle_index)
    }

    /// Transition detected at the candle
    pub fn event(
        signal_type: SignalType,
        value: impl Into<String>,
        strength: f64,
        candle_index: usize,
    ) -> Self {
        Self::build(signal_type, value, strength, true, candle_index)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

// ============================================================
// MARKET REGIME
// ============================================================

/// Externally computed market condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRegime {
    pub trend: String,
    pub confidence: f64,
}

impl MarketRegime {
    pub fn new(trend: impl Into<String>, confidence: f64) -> Self {
        Self {
            trend: trend.into(),
            confidence,
        }
    }

    /// Regime that leaves strengths untouched
    pub fn neutral() -> Self {
        Self::new("unknown", 0.0)
    }

    pub fn trend_kind(&self) -> RegimeTrend {
        RegimeTrend::parse(&self.trend)
    }
}

impl Default for MarketRegime {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Parsed form of [`MarketRegime::trend`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegimeTrend {
    StrongUptrend,
    Uptrend,
    Ranging,
    Downtrend,
    StrongDowntrend,
    Volatile,
    #[default]
    Unknown,
}

impl RegimeTrend {
    /// Lenient parse: case, spaces and dashes are ignored
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match key.as_str() {
            "strong_uptrend" | "strong_bullish" | "strong_up" => RegimeTrend::StrongUptrend,
            "uptrend" | "bullish" | "up" | "trending_up" => RegimeTrend::Uptrend,
            "ranging" | "sideways" | "range" | "neutral" | "consolidation" => RegimeTrend::Ranging,
            "downtrend" | "bearish" | "down" | "trending_down" => RegimeTrend::Downtrend,
            "strong_downtrend" | "strong_bearish" | "strong_down" => RegimeTrend::StrongDowntrend,
            "volatile" | "high_volatility" | "choppy" => RegimeTrend::Volatile,
            _ => RegimeTrend::Unknown,
        }
    }
}

// ============================================================
// CANDLESTICK DETECTOR TRAITS
// ============================================================

/// Unique identifier for a candlestick pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(pub &'static str);

impl PatternId {
    /// Returns the string identifier
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Label used as the signal value
    pub fn display_name(&self) -> &'static str {
        match self.0 {
            "CDL_DOJI" => "Doji",
            "CDL_HAMMER" => "Hammer",
            "CDL_SHOOTINGSTAR" => "Shooting Star",
            "CDL_ENGULFING_BULL" => "Bullish Engulfing",
            "CDL_ENGULFING_BEAR" => "Bearish Engulfing",
            "CDL_MORNINGSTAR" => "Morning Star",
            "CDL_EVENINGSTAR" => "Evening Star",
            other => other,
        }
    }

    /// Returns the typical/expected direction of this pattern.
    pub fn typical_direction(&self) -> Option<Direction> {
        match self.0 {
            "CDL_HAMMER" | "CDL_ENGULFING_BULL" | "CDL_MORNINGSTAR" => Some(Direction::Bullish),
            "CDL_SHOOTINGSTAR" | "CDL_ENGULFING_BEAR" | "CDL_EVENINGSTAR" => {
                Some(Direction::Bearish)
            }
            "CDL_DOJI" => Some(Direction::Neutral),
            _ => None,
        }
    }
}

/// Result of candlestick detection - Copy, no allocations
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch {
    pub pattern_id: PatternId,
    pub direction: Direction,
    /// Quality/confidence score 0.0..=1.0
    pub strength: f64,
    pub start_index: usize,
    pub end_index: usize,
}

/// Generic candlestick detector trait
pub trait PatternDetector: Send + Sync {
    fn id(&self) -> PatternId;
    fn min_bars(&self) -> usize;
    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch>;
}

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin candlestick detectors - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars, index)),*
                }
            }

            #[inline]
            pub fn id(&self) -> PatternId {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Single bar
    Doji(DojiDetector),
    Hammer(HammerDetector),
    ShootingStar(ShootingStarDetector),

    // Two bar
    Engulfing(EngulfingDetector),

    // Three bar
    MorningStar(MorningStarDetector),
    EveningStar(EveningStarDetector),
}

/// Runs every candlestick detector at one bar
#[derive(Debug, Clone)]
pub struct CandlestickRecognizer {
    detectors: Vec<BuiltinDetector>,
}

impl CandlestickRecognizer {
    pub fn from_config(config: &CandlestickConfig) -> Self {
        Self {
            detectors: vec![
                BuiltinDetector::Doji(DojiDetector::from_config(config)),
                BuiltinDetector::Hammer(HammerDetector::from_config(config)),
                BuiltinDetector::ShootingStar(ShootingStarDetector::from_config(config)),
                BuiltinDetector::Engulfing(EngulfingDetector::default()),
                BuiltinDetector::MorningStar(MorningStarDetector::from_config(config)),
                BuiltinDetector::EveningStar(EveningStarDetector::from_config(config)),
            ],
        }
    }

    pub fn with_defaults() -> Self {
        Self::from_config(&CandlestickConfig::default())
    }

    pub fn detectors(&self) -> &[BuiltinDetector] {
        &self.detectors
    }

    /// Detect candlestick patterns completing at `index`
    pub fn scan_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Vec<PatternMatch> {
        if index >= bars.len() {
            return Vec::new();
        }
        self.detectors
            .iter()
            .filter(|d| index + 1 >= d.min_bars())
            .filter_map(|d| d.detect(bars, index))
            .collect()
    }
}

impl Default for CandlestickRecognizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================
// SIGNAL ENGINE
// ============================================================

/// Signals produced for one candle
#[derive(Debug, Clone)]
pub struct BarSignals {
    pub index: usize,
    pub signals: Vec<Signal>,
}

/// Runs a set of evaluators against one candle at a time
pub struct SignalEngine {
    evaluators: Vec<BuiltinEvaluator>,
    config: EngineConfig,
    log: Arc<dyn LogSink>,
    validate_data: bool,
}

impl SignalEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluators(&self) -> &[BuiltinEvaluator] {
        &self.evaluators
    }

    /// Evaluate every registered evaluator at `index`.
    ///
    /// Each evaluator runs behind its own isolation boundary: a panic inside
    /// one is logged and contributes no signals, the others still run.
    pub fn evaluate_at<T: OHLCV>(
        &self,
        candles: &[T],
        series: &IndicatorSeries,
        index: usize,
        regime: &MarketRegime,
    ) -> Result<Vec<Signal>> {
        if index >= candles.len() {
            return Err(SignalError::IndexOutOfRange {
                index,
                len: candles.len(),
            });
        }
        if self.validate_data {
            validate_candles(&candles[..=index])?;
        }
        Ok(self.evaluate_unchecked(candles, series, index, regime))
    }

    /// Evaluate at the last candle
    pub fn evaluate_latest<T: OHLCV>(
        &self,
        candles: &[T],
        series: &IndicatorSeries,
        regime: &MarketRegime,
    ) -> Result<Vec<Signal>> {
        match candles.len() {
            0 => Ok(Vec::new()),
            len => self.evaluate_at(candles, series, len - 1, regime),
        }
    }

    /// Evaluate a range of candles, grouped per candle
    pub fn evaluate_range<T: OHLCV>(
        &self,
        candles: &[T],
        series: &IndicatorSeries,
        range: std::ops::Range<usize>,
        regime: &MarketRegime,
    ) -> Result<Vec<BarSignals>> {
        if range.end > candles.len() {
            return Err(SignalError::IndexOutOfRange {
                index: range.end.saturating_sub(1),
                len: candles.len(),
            });
        }
        if self.validate_data {
            validate_candles(&candles[..range.end])?;
        }
        Ok(range
            .map(|index| BarSignals {
                index,
                signals: self.evaluate_unchecked(candles, series, index, regime),
            })
            .collect())
    }

    fn evaluate_unchecked<T: OHLCV>(
        &self,
        candles: &[T],
        series: &IndicatorSeries,
        index: usize,
        regime: &MarketRegime,
    ) -> Vec<Signal> {
        let ctx = EvalContext::new(candles, series, index, &self.config, regime)
            .with_log(self.log.as_ref());
        let mut out = Vec::new();

        for evaluator in &self.evaluators {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                evaluator.evaluate(&ctx)
            }));
            match outcome {
                Ok(signals) => {
                    tracing::debug!(
                        target: "tasig",
                        evaluator = %evaluator.signal_type(),
                        index,
                        count = signals.len(),
                        "evaluator finished"
                    );
                    out.extend(signals);
                }
                Err(_) => {
                    tracing::error!(
                        target: "tasig",
                        evaluator = %evaluator.signal_type(),
                        index,
                        "evaluator panicked"
                    );
                    self.log.log(
                        &format!("{} evaluator failed at index {}", evaluator.signal_type(), index),
                        LogLevel::Error,
                    );
                }
            }
        }

        out
    }
}

fn validate_candles<T: OHLCV>(candles: &[T]) -> Result<()> {
    for (i, candle) in candles.iter().enumerate() {
        candle.validate().map_err(|e| match e {
            SignalError::InvalidCandle { reason, .. } => SignalError::InvalidCandle { index: i, reason },
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating SignalEngine instances
pub struct EngineBuilder {
    evaluators: Vec<BuiltinEvaluator>,
    config: EngineConfig,
    log: Arc<dyn LogSink>,
    validate_data: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
            config: EngineConfig::default(),
            log: Arc::new(TracingSink),
            validate_data: false,
        }
    }

    /// Add every builtin evaluator
    pub fn with_all_defaults(self) -> Self {
        self.with_trend_defaults()
            .with_volatility_defaults()
            .with_volume_defaults()
            .with_structure_defaults()
            .with_pattern_defaults()
    }

    /// MACD, EMA, MA200, Ichimoku, ADX, PSAR, WMA/TEMA/DEMA/HMA, MA Ribbon
    pub fn with_trend_defaults(mut self) -> Self {
        self.evaluators.extend([
            BuiltinEvaluator::Macd(Default::default()),
            BuiltinEvaluator::Ema(Default::default()),
            BuiltinEvaluator::Ma200(Default::default()),
            BuiltinEvaluator::Ichimoku(Default::default()),
            BuiltinEvaluator::Adx(Default::default()),
            BuiltinEvaluator::Psar(Default::default()),
            BuiltinEvaluator::MovingAverage(MaKind::Wma.into()),
            BuiltinEvaluator::MovingAverage(MaKind::Tema.into()),
            BuiltinEvaluator::MovingAverage(MaKind::Dema.into()),
            BuiltinEvaluator::MovingAverage(MaKind::Hma.into()),
            BuiltinEvaluator::MaRibbon(Default::default()),
        ]);
        self
    }

    /// Bollinger, BBW, ATR, Keltner, Donchian, TTM Squeeze
    pub fn with_volatility_defaults(mut self) -> Self {
        self.evaluators.extend([
            BuiltinEvaluator::Bollinger(Default::default()),
            BuiltinEvaluator::Bbw(Default::default()),
            BuiltinEvaluator::Atr(Default::default()),
            BuiltinEvaluator::Keltner(Default::default()),
            BuiltinEvaluator::Donchian(Default::default()),
            BuiltinEvaluator::TtmSqueeze(Default::default()),
        ]);
        self
    }

    /// Volume, MFI, OBV, CMF, AD Line
    pub fn with_volume_defaults(mut self) -> Self {
        self.evaluators.extend([
            BuiltinEvaluator::Volume(Default::default()),
            BuiltinEvaluator::Mfi(Default::default()),
            BuiltinEvaluator::Obv(Default::default()),
            BuiltinEvaluator::Cmf(Default::default()),
            BuiltinEvaluator::AdLine(Default::default()),
        ]);
        self
    }

    /// Support/Resistance, Pivot Points, Fibonacci
    pub fn with_structure_defaults(mut self) -> Self {
        self.evaluators.extend([
            BuiltinEvaluator::SupportResistance(Default::default()),
            BuiltinEvaluator::PivotPoints(Default::default()),
            BuiltinEvaluator::Fibonacci(Default::default()),
        ]);
        self
    }

    /// Chart patterns and candlestick patterns
    pub fn with_pattern_defaults(mut self) -> Self {
        self.evaluators.extend([
            BuiltinEvaluator::ChartPattern(Default::default()),
            BuiltinEvaluator::Candlestick(Default::default()),
        ]);
        self
    }

    /// Add a single evaluator
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, evaluator: BuiltinEvaluator) -> Self {
        self.evaluators.push(evaluator);
        self
    }

    /// Replace the configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Route diagnostics to a custom sink
    pub fn log_sink<S: LogSink + 'static>(mut self, sink: S) -> Self {
        self.log = Arc::new(sink);
        self
    }

    /// Enable/disable candle validation before evaluation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<SignalEngine> {
        self.config.validate()?;
        Ok(SignalEngine {
            evaluators: self.evaluators,
            config: self.config,
            log: self.log,
            validate_data: self.validate_data,
        })
    }
}

// ============================================================
// PARALLEL EVALUATION
// ============================================================

use rayon::prelude::*;

/// One symbol's input for batch evaluation
pub struct Instrument<'a, T> {
    pub symbol: &'a str,
    pub candles: &'a [T],
    pub series: &'a IndicatorSeries,
    pub regime: &'a MarketRegime,
}

/// Result of evaluating the latest candle of one instrument
#[derive(Debug)]
pub struct SymbolSignals {
    pub symbol: String,
    pub signals: Vec<Signal>,
}

/// Error from evaluating a single instrument
#[derive(Debug)]
pub struct EvaluationError {
    pub symbol: String,
    pub error: SignalError,
}

/// Evaluate the latest candle of many instruments in parallel.
///
/// Output for each symbol is identical to a serial `evaluate_latest` call.
pub fn evaluate_parallel<'a, T, I>(
    engine: &SignalEngine,
    instruments: I,
) -> (Vec<SymbolSignals>, Vec<EvaluationError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = Instrument<'a, T>>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|inst| {
            engine
                .evaluate_latest(inst.candles, inst.series, inst.regime)
                .map(|signals| SymbolSignals {
                    symbol: inst.symbol.to_string(),
                    signals,
                })
                .map_err(|error| EvaluationError {
                    symbol: inst.symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
