//! Geometric chart patterns
//!
//! Each detector looks back over a window ending at the current candle,
//! extracts price pivots, validates its geometry with explicit tolerances,
//! and scores reliability as a weighted sum of named factors.
//!
//! # Detectors
//!
//! - **triangle**: ascending, descending, symmetrical
//! - **head_and_shoulders** / **inverse_head_and_shoulders**
//! - **double**: double top, double bottom
//! - **flag**: bull/bear flag, bullish/bearish pennant
//! - **wedge**: rising, falling
//! - **rectangle**
//! - **cup_and_handle**

use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;

use crate::config::PatternConfig;
use crate::pivots::{find_price_pivots, Pivot};
use crate::trendline::Trendline;
use crate::{Direction, Result, SignalError, OHLCV};

pub mod cup_handle;
pub mod double;
pub mod flag;
pub mod head_shoulders;
pub mod rectangle;
pub mod triangle;
pub mod wedge;

pub use cup_handle::CupAndHandleDetector;
pub use double::DoubleDetector;
pub use flag::FlagDetector;
pub use head_shoulders::HeadShouldersDetector;
pub use rectangle::RectangleDetector;
pub use triangle::TriangleDetector;
pub use wedge::WedgeDetector;

// ============================================================
// PATTERN RECORDS
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFamily {
    Triangle,
    HeadAndShoulders,
    Double,
    Flag,
    Wedge,
    Rectangle,
    CupAndHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChartPatternKind {
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    DoubleTop,
    DoubleBottom,
    BullFlag,
    BearFlag,
    BullishPennant,
    BearishPennant,
    RisingWedge,
    FallingWedge,
    Rectangle,
    CupAndHandle,
}

impl ChartPatternKind {
    pub fn family(self) -> PatternFamily {
        use ChartPatternKind::*;
        match self {
            AscendingTriangle | DescendingTriangle | SymmetricalTriangle => PatternFamily::Triangle,
            HeadAndShoulders | InverseHeadAndShoulders => PatternFamily::HeadAndShoulders,
            DoubleTop | DoubleBottom => PatternFamily::Double,
            BullFlag | BearFlag | BullishPennant | BearishPennant => PatternFamily::Flag,
            RisingWedge | FallingWedge => PatternFamily::Wedge,
            Rectangle => PatternFamily::Rectangle,
            CupAndHandle => PatternFamily::CupAndHandle,
        }
    }

    pub fn subtype(self) -> &'static str {
        use ChartPatternKind::*;
        match self {
            AscendingTriangle => "ascending",
            DescendingTriangle => "descending",
            SymmetricalTriangle => "symmetrical",
            HeadAndShoulders => "regular",
            InverseHeadAndShoulders => "inverse",
            DoubleTop => "top",
            DoubleBottom => "bottom",
            BullFlag => "bull_flag",
            BearFlag => "bear_flag",
            BullishPennant => "bullish_pennant",
            BearishPennant => "bearish_pennant",
            RisingWedge => "rising",
            FallingWedge => "falling",
            Rectangle => "rectangle",
            CupAndHandle => "cup_and_handle",
        }
    }

    /// Signal value for the pattern
    pub fn display_name(self) -> &'static str {
        use ChartPatternKind::*;
        match self {
            AscendingTriangle => "Ascending Triangle",
            DescendingTriangle => "Descending Triangle",
            SymmetricalTriangle => "Symmetrical Triangle",
            HeadAndShoulders => "Head and Shoulders",
            InverseHeadAndShoulders => "Inverse Head and Shoulders",
            DoubleTop => "Double Top",
            DoubleBottom => "Double Bottom",
            BullFlag => "Bull Flag",
            BearFlag => "Bear Flag",
            BullishPennant => "Bullish Pennant",
            BearishPennant => "Bearish Pennant",
            RisingWedge => "Rising Wedge",
            FallingWedge => "Falling Wedge",
            Rectangle => "Rectangle",
            CupAndHandle => "Cup and Handle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternConfidence {
    Low,
    Medium,
    High,
}

impl PatternConfidence {
    pub fn from_reliability(reliability: f64) -> Self {
        if reliability >= 0.75 {
            PatternConfidence::High
        } else if reliability >= 0.5 {
            PatternConfidence::Medium
        } else {
            PatternConfidence::Low
        }
    }
}

/// A detected pattern. Created fresh per call, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPattern {
    pub kind: ChartPatternKind,
    pub start_index: usize,
    pub end_index: usize,
    /// Named price levels (neckline, resistance, support, ...)
    pub key_levels: BTreeMap<&'static str, f64>,
    /// 0..=1
    pub reliability: f64,
    pub target_price: Option<f64>,
    pub confidence: PatternConfidence,
    pub direction: Direction,
    /// The current candle closed through the breakout level
    pub confirmed: bool,
    pub description: String,
}

impl ChartPattern {
    #[inline]
    pub fn family(&self) -> PatternFamily {
        self.kind.family()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind.display_name()
    }

    pub fn level(&self, name: &str) -> Option<f64> {
        self.key_levels.get(name).copied()
    }
}

/// Fields shared by every detector's output
pub(crate) struct PatternDraft {
    pub kind: ChartPatternKind,
    pub direction: Direction,
    pub span: (usize, usize),
    pub levels: Vec<(&'static str, f64)>,
    pub factors: Vec<(f64, Option<f64>)>,
    pub target_price: Option<f64>,
    pub confirmed: bool,
}

impl PatternDraft {
    pub fn finish(self) -> Option<ChartPattern> {
        let reliability = weighted_reliability(&self.factors);
        if !reliability.is_finite() || self.levels.iter().any(|(_, v)| !v.is_finite()) {
            return None;
        }
        let target_price = self.target_price.filter(|t| t.is_finite() && *t > 0.0);
        let key_levels: BTreeMap<&'static str, f64> = self.levels.into_iter().collect();
        let description = describe(self.kind, &key_levels, target_price, reliability);
        Some(ChartPattern {
            kind: self.kind,
            start_index: self.span.0,
            end_index: self.span.1,
            key_levels,
            reliability,
            target_price,
            confidence: PatternConfidence::from_reliability(reliability),
            direction: self.direction,
            confirmed: self.confirmed,
            description,
        })
    }
}

fn describe(
    kind: ChartPatternKind,
    levels: &BTreeMap<&'static str, f64>,
    target: Option<f64>,
    reliability: f64,
) -> String {
    let levels: Vec<String> = levels.iter().map(|(k, v)| format!("{} {:.4}", k, v)).collect();
    let target = target.map_or_else(|| "none".to_string(), |t| format!("{:.4}", t));
    format!(
        "{} ({}), target {}, reliability {:.0}%",
        kind.display_name(),
        levels.join(", "),
        target,
        reliability * 100.0
    )
}

// ============================================================
// SHARED GEOMETRY
// ============================================================

/// Weighted mean of the present factor scores. Missing factors are skipped
/// and the remaining weights renormalized.
pub fn weighted_reliability(factors: &[(f64, Option<f64>)]) -> f64 {
    let (mut total, mut weight) = (0.0, 0.0);
    for &(w, score) in factors {
        if let Some(s) = score.filter(|s| s.is_finite()) {
            total += w * s.clamp(0.0, 1.0);
            weight += w;
        }
    }
    if weight <= f64::EPSILON {
        0.0
    } else {
        (total / weight).clamp(0.0, 1.0)
    }
}

/// Lookback window ending at (and including) `index`
#[inline]
pub(crate) fn window(index: usize, lookback: usize) -> Range<usize> {
    (index + 1).saturating_sub(lookback)..index + 1
}

/// Previous close at or below `level`, current close above it
pub(crate) fn crossed_up<T: OHLCV>(candles: &[T], index: usize, level: f64) -> bool {
    if index == 0 || index >= candles.len() || !level.is_finite() {
        return false;
    }
    candles[index - 1].close() <= level && candles[index].close() > level
}

/// Previous close at or above `level`, current close below it
pub(crate) fn crossed_down<T: OHLCV>(candles: &[T], index: usize, level: f64) -> bool {
    if index == 0 || index >= candles.len() || !level.is_finite() {
        return false;
    }
    candles[index - 1].close() >= level && candles[index].close() < level
}

pub(crate) fn mean_close<T: OHLCV>(candles: &[T], range: Range<usize>) -> Option<f64> {
    let slice = candles.get(range)?;
    if slice.is_empty() {
        return None;
    }
    let mean = slice.iter().map(|c| c.close()).sum::<f64>() / slice.len() as f64;
    (mean.is_finite() && mean > 0.0).then_some(mean)
}

/// Lowest low in `range` as (index, value)
pub(crate) fn min_low<T: OHLCV>(candles: &[T], range: Range<usize>) -> Option<(usize, f64)> {
    let start = range.start;
    candles
        .get(range)?
        .iter()
        .enumerate()
        .filter(|(_, c)| c.low().is_finite())
        .min_by(|a, b| a.1.low().total_cmp(&b.1.low()))
        .map(|(i, c)| (start + i, c.low()))
}

/// Highest high in `range` as (index, value)
pub(crate) fn max_high<T: OHLCV>(candles: &[T], range: Range<usize>) -> Option<(usize, f64)> {
    let start = range.start;
    candles
        .get(range)?
        .iter()
        .enumerate()
        .filter(|(_, c)| c.high().is_finite())
        .max_by(|a, b| a.1.high().total_cmp(&b.1.high()))
        .map(|(i, c)| (start + i, c.high()))
}

/// Mean volume, `None` when the feed carries no volume
pub(crate) fn avg_volume<T: OHLCV>(candles: &[T], range: Range<usize>) -> Option<f64> {
    let slice = candles.get(range)?;
    if slice.is_empty() {
        return None;
    }
    let mean = slice.iter().map(|c| c.volume()).sum::<f64>() / slice.len() as f64;
    (mean.is_finite() && mean > 0.0).then_some(mean)
}

/// 1.0 when volume contracted from `earlier` to `later`, 0.4 otherwise
pub(crate) fn volume_contraction<T: OHLCV>(
    candles: &[T],
    earlier: Range<usize>,
    later: Range<usize>,
) -> Option<f64> {
    let (a, b) = (avg_volume(candles, earlier)?, avg_volume(candles, later)?);
    Some(if b < a { 1.0 } else { 0.4 })
}

/// `1 - value / limit`, clamped to 0..=1
#[inline]
pub(crate) fn closeness(value: f64, limit: f64) -> f64 {
    if limit <= f64::EPSILON {
        return 0.0;
    }
    (1.0 - value / limit).clamp(0.0, 1.0)
}

/// Pivots per side used for boundary lines
const LINE_PIVOTS: usize = 4;
/// Relative distance from a boundary line that counts as a touch
pub(crate) const TOUCH_TOLERANCE: f64 = 0.01;

/// Resistance and support lines through the most recent pivots
pub(crate) struct Channel {
    pub resistance: Trendline,
    pub support: Trendline,
    pub highs: Vec<Pivot>,
    pub lows: Vec<Pivot>,
    /// Slopes as a fraction of the mean close per bar
    pub resistance_slope: f64,
    pub support_slope: f64,
    pub reference: f64,
    /// First pivot
    pub start: usize,
    /// Last pivot
    pub end: usize,
}

impl Channel {
    #[inline]
    pub fn height_at(&self, index: usize) -> f64 {
        let x = index as f64;
        self.resistance.value_at(x) - self.support.value_at(x)
    }

    /// Mean R² of both lines
    pub fn fit_quality(&self) -> Option<f64> {
        let r = self.resistance.r_squared(&self.highs)?;
        let s = self.support.r_squared(&self.lows)?;
        Some((r + s) / 2.0)
    }

    /// Share of pivots lying on their line
    pub fn touch_score(&self) -> f64 {
        let touches = self.resistance.touches(&self.highs, TOUCH_TOLERANCE)
            + self.support.touches(&self.lows, TOUCH_TOLERANCE);
        touches as f64 / (self.highs.len() + self.lows.len()) as f64
    }

    /// Volume contraction across the first and second half of the channel
    pub fn volume_score<T: OHLCV>(&self, candles: &[T], index: usize) -> Option<f64> {
        let mid = self.start + (index + 1 - self.start) / 2;
        volume_contraction(candles, self.start..mid, mid..index + 1)
    }
}

/// Fit boundary lines through the last pivots in the lookback window.
/// `None` when either side has fewer than two pivots or the latest pivot is
/// older than `max_pattern_age`.
pub(crate) fn fit_channel<T: OHLCV>(candles: &[T], index: usize, config: &PatternConfig) -> Option<Channel> {
    let range = window(index, config.lookback.get());
    let pivots = find_price_pivots(candles, range.start, range.end, config.pivot_distance.get());
    let highs = pivots.last_highs(LINE_PIVOTS).to_vec();
    let lows = pivots.last_lows(LINE_PIVOTS).to_vec();
    if highs.len() < 2 || lows.len() < 2 {
        return None;
    }

    let start = highs[0].index.min(lows[0].index);
    let end = highs[highs.len() - 1].index.max(lows[lows.len() - 1].index);
    if index.saturating_sub(end) > config.max_pattern_age.get() {
        return None;
    }

    let resistance = Trendline::fit(&highs)?;
    let support = Trendline::fit(&lows)?;
    let reference = mean_close(candles, start..index + 1)?;

    Some(Channel {
        resistance_slope: resistance.normalized_slope(reference),
        support_slope: support.normalized_slope(reference),
        resistance,
        support,
        highs,
        lows,
        reference,
        start,
        end,
    })
}

// ============================================================
// DETECTOR TRAIT + DISPATCH
// ============================================================

/// Chart pattern detector
pub trait ChartPatternDetector: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Bars required before the detector can report anything
    fn min_bars(&self, config: &PatternConfig) -> usize;

    /// Patterns visible at `index`. Never panics on short input.
    fn detect<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Vec<ChartPattern>;
}

macro_rules! define_chart_detectors {
    (
        $(
            $variant:ident($detector:ty) = $name:literal => $ctor:expr
        ),* $(,)?
    ) => {
        /// All builtin chart pattern detectors - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinChartDetector {
            $($variant($detector)),*
        }

        impl BuiltinChartDetector {
            /// Registered detector names
            pub const NAMES: &'static [&'static str] = &[$($name),*];

            /// Look up a detector by registry name
            pub fn from_name(name: &str) -> Result<Self> {
                match name {
                    $($name => Ok(Self::$variant($ctor)),)*
                    other => Err(SignalError::UnknownPattern(other.to_string())),
                }
            }

            #[inline]
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(d) => ChartPatternDetector::name(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self, config: &PatternConfig) -> usize {
                match self {
                    $(Self::$variant(d) => ChartPatternDetector::min_bars(d, config)),*
                }
            }

            #[inline]
            pub fn detect<T: OHLCV>(
                &self,
                candles: &[T],
                index: usize,
                config: &PatternConfig,
            ) -> Vec<ChartPattern> {
                match self {
                    $(Self::$variant(d) => ChartPatternDetector::detect(d, candles, index, config)),*
                }
            }
        }
    };
}

define_chart_detectors! {
    Triangle(TriangleDetector) = "triangle" => TriangleDetector,
    HeadShoulders(HeadShouldersDetector) = "head_and_shoulders" => HeadShouldersDetector::regular(),
    InverseHeadShoulders(HeadShouldersDetector) = "inverse_head_and_shoulders" => HeadShouldersDetector::inverse(),
    Double(DoubleDetector) = "double" => DoubleDetector,
    Flag(FlagDetector) = "flag" => FlagDetector,
    Wedge(WedgeDetector) = "wedge" => WedgeDetector,
    Rectangle(RectangleDetector) = "rectangle" => RectangleDetector,
    CupAndHandle(CupAndHandleDetector) = "cup_and_handle" => CupAndHandleDetector,
}

// ============================================================
// RECOGNIZER
// ============================================================

/// Runs a set of chart pattern detectors at one candle
#[derive(Debug, Clone)]
pub struct ChartPatternRecognizer {
    detectors: Vec<BuiltinChartDetector>,
}

impl Default for ChartPatternRecognizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ChartPatternRecognizer {
    /// Every builtin detector
    pub fn with_defaults() -> Self {
        Self {
            detectors: BuiltinChartDetector::NAMES
                .iter()
                .filter_map(|name| BuiltinChartDetector::from_name(name).ok())
                .collect(),
        }
    }

    /// Only the named detectors. Unknown names are a programming error.
    pub fn with_patterns<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let detectors = names
            .iter()
            .map(|n| BuiltinChartDetector::from_name(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { detectors })
    }

    pub fn detectors(&self) -> &[BuiltinChartDetector] {
        &self.detectors
    }

    /// Patterns at `index` whose reliability reaches `config.min_reliability`
    pub fn detect_at<T: OHLCV>(&self, candles: &[T], index: usize, config: &PatternConfig) -> Vec<ChartPattern> {
        if index >= candles.len() {
            return Vec::new();
        }
        let min_reliability = config.min_reliability.get();
        self.detectors
            .iter()
            .filter(|d| index + 1 >= d.min_bars(config))
            .flat_map(|d| d.detect(candles, index, config))
            .filter(|p| p.reliability >= min_reliability)
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::Candle;

    pub fn candle(price: f64) -> Candle {
        Candle::new(price, price + 0.1, price - 0.1, price, 1000.0)
    }

    /// Closes interpolated linearly through `(index, price)` anchors
    pub fn path(anchors: &[(usize, f64)]) -> Vec<Candle> {
        let mut out = Vec::new();
        for w in anchors.windows(2) {
            let ((i0, p0), (i1, p1)) = (w[0], w[1]);
            for i in i0..i1 {
                let t = (i - i0) as f64 / (i1 - i0) as f64;
                out.push(candle(p0 + (p1 - p0) * t));
            }
        }
        if let Some(&(_, p)) = anchors.last() {
            out.push(candle(p));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    #[test]
    fn test_weighted_reliability_renormalizes() {
        let r = weighted_reliability(&[(0.5, Some(1.0)), (0.3, None), (0.2, Some(0.5))]);
        assert!((r - (0.5 + 0.1) / 0.7).abs() < 1e-12);
        assert_eq!(weighted_reliability(&[(1.0, None)]), 0.0);
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(PatternConfidence::from_reliability(0.8), PatternConfidence::High);
        assert_eq!(PatternConfidence::from_reliability(0.6), PatternConfidence::Medium);
        assert_eq!(PatternConfidence::from_reliability(0.4), PatternConfidence::Low);
    }

    #[test]
    fn test_unknown_pattern_name() {
        let err = ChartPatternRecognizer::with_patterns(&["triangle", "butterfly"]).unwrap_err();
        assert!(matches!(err, SignalError::UnknownPattern(name) if name == "butterfly"));
        let ok = ChartPatternRecognizer::with_patterns(&["double", "wedge"]).unwrap();
        assert_eq!(ok.detectors().len(), 2);
    }

    #[test]
    fn test_defaults_register_all() {
        let r = ChartPatternRecognizer::with_defaults();
        assert_eq!(r.detectors().len(), BuiltinChartDetector::NAMES.len());
    }

    #[test]
    fn test_short_input_is_empty() {
        let r = ChartPatternRecognizer::with_defaults();
        let config = PatternConfig::default();
        let candles: Vec<Candle> = (0..10)
            .map(|i| Candle::new(100.0, 101.0 + i as f64, 99.0, 100.0, 1.0))
            .collect();
        for i in 0..10 {
            assert!(r.detect_at(&candles, i, &config).is_empty());
        }
        assert!(r.detect_at(&candles, 50, &config).is_empty());
    }

    #[test]
    fn test_cross_helpers() {
        let candles = vec![
            Candle::new(99.0, 100.0, 98.0, 99.5, 1.0),
            Candle::new(99.5, 102.0, 99.0, 101.0, 1.0),
        ];
        assert!(crossed_up(&candles, 1, 100.0));
        assert!(!crossed_down(&candles, 1, 100.0));
        assert!(!crossed_up(&candles, 0, 100.0));
    }
}
