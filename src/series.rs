//! Precomputed indicator input
//!
//! Every slot holds one tagged [`SeriesData`] variant with a concrete record
//! type per indicator family. Series may be shorter than the candle slice
//! (indicators whose first value appears after a warmup); the offset is
//! re-derived against the candle count on every lookup.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::logging::{LogLevel, LogSink};

// ============================================================
// SERIES
// ============================================================

/// Values aligned to candles, possibly starting at an offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series<T> {
    pub values: Vec<Option<T>>,
    /// Candle index of `values[0]`. When absent or inconsistent with the
    /// candle count it is re-derived as `candle_count - values.len()`.
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Resolved mapping from candle index to series position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    pub offset: usize,
    /// A declared offset disagreed with the candle count
    pub mismatch: bool,
}

impl<T> Series<T> {
    pub fn new(values: Vec<Option<T>>) -> Self {
        Self {
            values,
            offset: None,
        }
    }

    /// Fully populated series
    pub fn from_values(values: Vec<T>) -> Self {
        Self::new(values.into_iter().map(Some).collect())
    }

    /// Series whose first value belongs to candle `offset`
    pub fn with_offset(values: Vec<T>, offset: usize) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
            offset: Some(offset),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve the offset for a given candle count
    pub fn alignment(&self, candle_count: usize) -> Alignment {
        let derived = candle_count.saturating_sub(self.values.len());
        match self.offset {
            None => Alignment {
                offset: derived,
                mismatch: false,
            },
            Some(declared) if declared + self.values.len() == candle_count => Alignment {
                offset: declared,
                mismatch: false,
            },
            // A series covering the whole slice with a declared offset of 0
            // is still aligned even when it runs past the last candle.
            Some(0) if self.values.len() >= candle_count => Alignment {
                offset: 0,
                mismatch: false,
            },
            Some(_) => Alignment {
                offset: derived,
                mismatch: true,
            },
        }
    }

    /// Value at candle `index`, `None` before the first valid value
    pub fn at(&self, index: usize, candle_count: usize) -> Option<&T> {
        let Alignment { offset, .. } = self.alignment(candle_count);
        let pos = index.checked_sub(offset)?;
        self.values.get(pos)?.as_ref()
    }
}

// ============================================================
// VALUE RECORDS
// ============================================================

/// A value that can be stored in a series slot
pub trait SeriesValue: Sized {
    /// Variant name used in diagnostics
    const KIND: &'static str;

    fn extract(data: &SeriesData) -> Option<&Series<Self>>;

    /// Numeric sanity (finite fields)
    fn is_valid(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Upper/middle/lower channel (Bollinger, Keltner, Donchian)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BandValue {
    /// Returns the band with upper/lower ordered, and whether they were swapped
    pub fn ordered(self) -> (Self, bool) {
        if self.upper < self.lower {
            (
                Self {
                    upper: self.lower,
                    middle: self.middle,
                    lower: self.upper,
                },
                true,
            )
        } else {
            (self, false)
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IchimokuValue {
    pub tenkan: f64,
    pub kijun: f64,
    pub senkou_a: f64,
    pub senkou_b: f64,
}

impl IchimokuValue {
    #[inline]
    pub fn cloud_top(&self) -> f64 {
        self.senkou_a.max(self.senkou_b)
    }

    #[inline]
    pub fn cloud_bottom(&self) -> f64 {
        self.senkou_a.min(self.senkou_b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdxValue {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// Moving averages ordered from the shortest to the longest period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RibbonValue {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqueezeValue {
    pub squeeze_on: bool,
    pub momentum: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelsValue {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

/// Classic floor pivots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPointsValue {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

impl PivotPointsValue {
    /// Named levels, lowest first
    pub fn levels(&self) -> [(&'static str, f64); 7] {
        [
            ("S3", self.s3),
            ("S2", self.s2),
            ("S1", self.s1),
            ("Pivot", self.pivot),
            ("R1", self.r1),
            ("R2", self.r2),
            ("R3", self.r3),
        ]
    }
}

/// Retracement levels keyed in per-mille (618 = 61.8%)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FibonacciValue {
    pub levels: BTreeMap<u32, f64>,
}

impl FibonacciValue {
    pub fn new(levels: impl IntoIterator<Item = (u32, f64)>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
        }
    }
}

macro_rules! impl_series_value {
    ($($ty:ty => $variant:ident, $kind:literal, |$v:ident| $valid:expr;)*) => {
        $(
            impl SeriesValue for $ty {
                const KIND: &'static str = $kind;

                #[inline]
                fn extract(data: &SeriesData) -> Option<&Series<Self>> {
                    match data {
                        SeriesData::$variant(s) => Some(s),
                        _ => None,
                    }
                }

                #[inline]
                fn is_valid(&self) -> bool {
                    let $v = self;
                    $valid
                }
            }
        )*
    };
}

impl_series_value! {
    f64 => Scalar, "scalar", |v| v.is_finite();
    MacdValue => Macd, "macd", |v| v.macd.is_finite() && v.signal.is_finite() && v.histogram.is_finite();
    BandValue => Bands, "bands", |v| v.upper.is_finite() && v.middle.is_finite() && v.lower.is_finite();
    IchimokuValue => Ichimoku, "ichimoku", |v| {
        v.tenkan.is_finite() && v.kijun.is_finite() && v.senkou_a.is_finite() && v.senkou_b.is_finite()
    };
    AdxValue => Adx, "adx", |v| v.adx.is_finite() && v.plus_di.is_finite() && v.minus_di.is_finite();
    RibbonValue => Ribbon, "ribbon", |v| !v.values.is_empty() && v.values.iter().all(|x| x.is_finite());
    SqueezeValue => Squeeze, "squeeze", |v| v.momentum.is_finite();
    LevelsValue => Levels, "levels", |v| {
        v.support.iter().chain(&v.resistance).all(|x| x.is_finite())
    };
    PivotPointsValue => PivotPoints, "pivot_points", |v| v.levels().iter().all(|(_, x)| x.is_finite());
    FibonacciValue => Fibonacci, "fibonacci", |v| !v.levels.is_empty();
}

// ============================================================
// SLOTS
// ============================================================

/// Named indicator slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKey {
    Macd,
    EmaFast,
    EmaSlow,
    Sma50,
    Ma200,
    Ichimoku,
    Adx,
    Psar,
    Wma,
    Tema,
    Dema,
    Hma,
    MaRibbon,
    Bollinger,
    Bbw,
    Atr,
    Keltner,
    Donchian,
    TtmSqueeze,
    VolumeSma,
    Mfi,
    Obv,
    Cmf,
    AdLine,
    SupportResistance,
    PivotPoints,
    Fibonacci,
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tagged payload for one indicator slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "series", rename_all = "snake_case")]
pub enum SeriesData {
    Scalar(Series<f64>),
    Macd(Series<MacdValue>),
    Bands(Series<BandValue>),
    Ichimoku(Series<IchimokuValue>),
    Adx(Series<AdxValue>),
    Ribbon(Series<RibbonValue>),
    Squeeze(Series<SqueezeValue>),
    Levels(Series<LevelsValue>),
    PivotPoints(Series<PivotPointsValue>),
    Fibonacci(Series<FibonacciValue>),
}

impl SeriesData {
    pub fn kind(&self) -> &'static str {
        match self {
            SeriesData::Scalar(_) => f64::KIND,
            SeriesData::Macd(_) => MacdValue::KIND,
            SeriesData::Bands(_) => BandValue::KIND,
            SeriesData::Ichimoku(_) => IchimokuValue::KIND,
            SeriesData::Adx(_) => AdxValue::KIND,
            SeriesData::Ribbon(_) => RibbonValue::KIND,
            SeriesData::Squeeze(_) => SqueezeValue::KIND,
            SeriesData::Levels(_) => LevelsValue::KIND,
            SeriesData::PivotPoints(_) => PivotPointsValue::KIND,
            SeriesData::Fibonacci(_) => FibonacciValue::KIND,
        }
    }
}

/// Keyed collection of indicator series for one instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorSeries {
    slots: HashMap<IndicatorKey, SeriesData>,
}

impl IndicatorSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: IndicatorKey, data: SeriesData) -> Option<SeriesData> {
        self.slots.insert(key, data)
    }

    /// Builder-style insert
    pub fn with(mut self, key: IndicatorKey, data: SeriesData) -> Self {
        self.slots.insert(key, data);
        self
    }

    pub fn contains(&self, key: IndicatorKey) -> bool {
        self.slots.contains_key(&key)
    }

    pub fn raw(&self, key: IndicatorKey) -> Option<&SeriesData> {
        self.slots.get(&key)
    }

    /// Typed access. A slot holding a different variant is reported at
    /// error level and treated as missing.
    pub fn get<V: SeriesValue>(&self, key: IndicatorKey, log: &dyn LogSink) -> Option<&Series<V>> {
        let data = self.slots.get(&key)?;
        match V::extract(data) {
            Some(series) => Some(series),
            None => {
                log.log(
                    &format!(
                        "indicator {} holds {} data, expected {}",
                        key,
                        data.kind(),
                        V::KIND
                    ),
                    LogLevel::Error,
                );
                None
            }
        }
    }

    /// Valid value of `key` at candle `index`. Non-finite values read as missing.
    pub fn value_at<V: SeriesValue>(
        &self,
        key: IndicatorKey,
        index: usize,
        candle_count: usize,
        log: &dyn LogSink,
    ) -> Option<&V> {
        let series = self.get::<V>(key, log)?;
        let alignment = series.alignment(candle_count);
        if alignment.mismatch {
            log.log(
                &format!(
                    "indicator {} declares offset {:?} for {} values over {} candles, using {}",
                    key,
                    series.offset,
                    series.len(),
                    candle_count,
                    alignment.offset
                ),
                LogLevel::Warn,
            );
        }
        let pos = index.checked_sub(alignment.offset)?;
        series
            .values
            .get(pos)?
            .as_ref()
            .filter(|v| v.is_valid())
    }

    pub fn scalar(&self, key: IndicatorKey, log: &dyn LogSink) -> Option<&Series<f64>> {
        self.get::<f64>(key, log)
    }

    pub fn macd(&self, log: &dyn LogSink) -> Option<&Series<MacdValue>> {
        self.get::<MacdValue>(IndicatorKey::Macd, log)
    }

    pub fn bands(&self, key: IndicatorKey, log: &dyn LogSink) -> Option<&Series<BandValue>> {
        self.get::<BandValue>(key, log)
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{FnSink, NullSink};
    use std::sync::{Arc, Mutex};

    fn capture() -> (FnSink<impl Fn(&str, LogLevel) + Send + Sync>, Arc<Mutex<Vec<LogLevel>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        (
            FnSink(move |_: &str, level: LogLevel| captured.lock().unwrap().push(level)),
            seen,
        )
    }

    #[test]
    fn test_offset_derived_when_missing() {
        // ATR-style series: 6 values for 10 candles, first value at index 4
        let s = Series::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(s.at(3, 10), None);
        assert_eq!(s.at(4, 10), Some(&1.0));
        assert_eq!(s.at(9, 10), Some(&6.0));
        assert_eq!(s.at(10, 10), None);
    }

    #[test]
    fn test_inconsistent_offset_is_rederived() {
        let s = Series::with_offset(vec![1.0, 2.0, 3.0], 0);
        let a = s.alignment(5);
        assert!(a.mismatch);
        assert_eq!(a.offset, 2);
        assert_eq!(s.at(2, 5), Some(&1.0));

        let consistent = Series::with_offset(vec![1.0, 2.0, 3.0], 2);
        assert!(!consistent.alignment(5).mismatch);
    }

    #[test]
    fn test_leading_none_values() {
        let s = Series::new(vec![None, None, Some(5.0)]);
        assert_eq!(s.at(1, 3), None);
        assert_eq!(s.at(2, 3), Some(&5.0));
    }

    #[test]
    fn test_wrong_variant_logs_error() {
        let series = IndicatorSeries::new().with(
            IndicatorKey::Bollinger,
            SeriesData::Scalar(Series::from_values(vec![1.0])),
        );
        let (sink, seen) = capture();
        assert!(series.bands(IndicatorKey::Bollinger, &sink).is_none());
        assert_eq!(*seen.lock().unwrap(), vec![LogLevel::Error]);
    }

    #[test]
    fn test_mismatch_logs_warning() {
        let series = IndicatorSeries::new().with(
            IndicatorKey::Atr,
            SeriesData::Scalar(Series::with_offset(vec![1.0, 2.0], 0)),
        );
        let (sink, seen) = capture();
        assert_eq!(series.value_at::<f64>(IndicatorKey::Atr, 4, 5, &sink), Some(&2.0));
        assert_eq!(*seen.lock().unwrap(), vec![LogLevel::Warn]);
    }

    #[test]
    fn test_non_finite_reads_as_missing() {
        let series = IndicatorSeries::new().with(
            IndicatorKey::Mfi,
            SeriesData::Scalar(Series::from_values(vec![50.0, f64::NAN])),
        );
        assert_eq!(series.value_at::<f64>(IndicatorKey::Mfi, 0, 2, &NullSink), Some(&50.0));
        assert_eq!(series.value_at::<f64>(IndicatorKey::Mfi, 1, 2, &NullSink), None);
    }

    #[test]
    fn test_band_ordering() {
        let (band, swapped) = BandValue {
            upper: 90.0,
            middle: 100.0,
            lower: 110.0,
        }
        .ordered();
        assert!(swapped);
        assert_eq!(band.upper, 110.0);
        assert_eq!(band.lower, 90.0);
    }

    #[test]
    fn test_tagged_json() {
        let json = r#"{
            "bbw": { "kind": "scalar", "series": { "values": [1.8, 2.3] } },
            "fibonacci": { "kind": "fibonacci", "series": { "values": [{ "levels": { "618": 161.8 } }] } }
        }"#;
        let series: IndicatorSeries = serde_json::from_str(json).unwrap();
        assert_eq!(
            series.value_at::<f64>(IndicatorKey::Bbw, 1, 2, &NullSink),
            Some(&2.3)
        );
        let fib = series
            .value_at::<FibonacciValue>(IndicatorKey::Fibonacci, 0, 1, &NullSink)
            .unwrap();
        assert_eq!(fib.levels.get(&618), Some(&161.8));
    }
}
