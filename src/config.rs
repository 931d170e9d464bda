//! Evaluation configuration
//!
//! One immutable, serde-deserializable struct per indicator family. Every
//! field has a documented default so partial JSON documents work:
//!
//! ```rust
//! use tasig::config::EngineConfig;
//!
//! let json = r#"{ "ttm_squeeze": { "minSqueezeDuration": 4 }, "mfi": { "overbought": 85 } }"#;
//! let config: EngineConfig = serde_json::from_str(json).unwrap();
//! assert_eq!(config.ttm_squeeze.min_squeeze_duration.get(), 4);
//! assert_eq!(config.ttm_squeeze.momentum_smoothing.get(), 3);
//! assert_eq!(config.mfi.oversold, 20.0);
//! config.validate().unwrap();
//! ```

use serde::{Deserialize, Serialize};

use crate::{Period, Ratio, Result, SignalError};

// ============================================================
// ENGINE CONFIG
// ============================================================

/// Full configuration passed by reference into every evaluator call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub macd: MacdConfig,
    pub ema: EmaConfig,
    pub ma200: Ma200Config,
    pub ichimoku: IchimokuConfig,
    pub adx: AdxConfig,
    pub psar: PsarConfig,
    pub wma: MovingAverageConfig,
    pub tema: MovingAverageConfig,
    pub dema: MovingAverageConfig,
    pub hma: MovingAverageConfig,
    pub ma_ribbon: MaRibbonConfig,
    pub bollinger: BollingerConfig,
    pub bbw: BbwConfig,
    pub atr: AtrConfig,
    pub keltner: KeltnerConfig,
    pub donchian: DonchianConfig,
    pub ttm_squeeze: TtmSqueezeConfig,
    pub volume: VolumeConfig,
    pub mfi: MfiConfig,
    pub obv: ObvConfig,
    pub cmf: CmfConfig,
    pub ad_line: AdLineConfig,
    pub support_resistance: SupportResistanceConfig,
    pub pivot_points: PivotPointsConfig,
    pub fibonacci: FibonacciConfig,
    pub patterns: PatternConfig,
    pub candlestick: CandlestickConfig,
    pub divergence: DivergenceConfig,
    pub confluence: ConfluenceConfig,
}

impl EngineConfig {
    /// Check cross-field constraints that the newtypes cannot express
    pub fn validate(&self) -> Result<()> {
        ensure(
            self.macd.fast_period < self.macd.slow_period,
            "macd.fastPeriod must be below macd.slowPeriod",
        )?;
        ensure(
            self.ema.fast_period < self.ema.slow_period,
            "ema.fastPeriod must be below ema.slowPeriod",
        )?;
        ensure(
            self.ma200.fast_period < self.ma200.period,
            "ma200.fastPeriod must be below ma200.period",
        )?;
        ensure(
            self.ichimoku.tenkan_period <= self.ichimoku.kijun_period
                && self.ichimoku.kijun_period <= self.ichimoku.senkou_b_period,
            "ichimoku periods must be ordered tenkan <= kijun <= senkouB",
        )?;

        check_range("adx.weakThreshold", self.adx.weak_threshold, 0.0, 100.0)?;
        check_range("adx.strongThreshold", self.adx.strong_threshold, 0.0, 100.0)?;
        ensure(
            self.adx.weak_threshold < self.adx.strong_threshold,
            "adx.weakThreshold must be below adx.strongThreshold",
        )?;

        ensure(
            self.ma_ribbon.periods.len() >= 2 && self.ma_ribbon.periods.iter().all(|&p| p > 0),
            "maRibbon.periods needs at least two positive periods",
        )?;
        ensure(
            self.ma_ribbon.compression_pct < self.ma_ribbon.expansion_pct,
            "maRibbon.compressionPct must be below maRibbon.expansionPct",
        )?;

        ensure(
            self.bollinger.band_walk_touches.get() <= self.bollinger.band_walk_lookback.get(),
            "bollinger.bandWalkTouches cannot exceed bollinger.bandWalkLookback",
        )?;
        ensure(
            self.bbw.squeeze_threshold > 0.0
                && self.bbw.squeeze_threshold < self.bbw.high_volatility_threshold,
            "bbw.squeezeThreshold must be positive and below bbw.highVolatilityThreshold",
        )?;
        ensure(self.bbw.expansion_ratio > 1.0, "bbw.expansionRatio must exceed 1")?;

        ensure(self.atr.multiplier > 0.0, "atr.multiplier must be positive")?;
        ensure(
            self.atr.contraction_ratio < self.atr.expansion_ratio,
            "atr.contractionRatio must be below atr.expansionRatio",
        )?;

        ensure(
            self.volume.low_ratio < self.volume.high_ratio
                && self.volume.high_ratio <= self.volume.spike_multiplier,
            "volume ratios must be ordered lowRatio < highRatio <= spikeMultiplier",
        )?;

        check_range("mfi.overbought", self.mfi.overbought, 0.0, 100.0)?;
        check_range("mfi.oversold", self.mfi.oversold, 0.0, 100.0)?;
        ensure(
            self.mfi.oversold < self.mfi.overbought,
            "mfi.oversold must be below mfi.overbought",
        )?;

        ensure(
            self.cmf.threshold >= 0.0 && self.cmf.threshold < self.cmf.strong_threshold,
            "cmf.threshold must be non-negative and below cmf.strongThreshold",
        )?;

        ensure(
            self.patterns.cup_min_depth < self.patterns.cup_max_depth,
            "patterns.cupMinDepth must be below patterns.cupMaxDepth",
        )?;
        ensure(
            self.patterns.lookback.get() > 2 * self.patterns.pivot_distance.get(),
            "patterns.lookback must exceed twice patterns.pivotDistance",
        )?;

        ensure(
            self.patterns.flat_slope_threshold >= 0.0,
            "patterns.flatSlopeThreshold must be non-negative",
        )?;

        ensure(
            self.ma200.test_tolerance_pct >= 0.0,
            "ma200.testTolerancePct must be non-negative",
        )?;
        ensure(
            self.bollinger.touch_tolerance_pct >= 0.0,
            "support_resistance.touchTolerancePct must be non-negative",
        )?;
        ensure(
            self.pivot_points.tolerance_pct >= 0.0,
            "pivot_points.tolerancePct must be non-negative",
        )?;

        ensure(
            self.candlestick.shadow_body_multiple > 0.0,
            "candlestick.shadowBodyMultiple must be positive",
        )?;

        ensure(
            self.divergence.min_distance <= self.divergence.max_distance,
            "divergence.minDistance cannot exceed divergence.maxDistance",
        )?;

        check_range(
            "confluence.minStrengthGate",
            self.confluence.min_strength_gate,
            0.0,
            100.0,
        )?;
        ensure(
            self.confluence.max_bonus >= 0.0
                && self.confluence.per_confluence_bonus >= 0.0
                && self.confluence.max_score_bonus >= 0.0,
            "confluence bonuses must be non-negative",
        )?;

        Ok(())
    }
}

#[inline]
fn ensure(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(SignalError::InvalidConfig(message.to_string()))
    }
}

#[inline]
fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SignalError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

// ============================================================
// TREND
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MacdConfig {
    pub fast_period: Period,
    pub slow_period: Period,
    pub signal_period: Period,
    /// Scan the histogram for divergences
    pub divergence: bool,
    pub divergence_lookback: Period,
    pub min_oscillator_move: f64,
    /// Histogram size (as % of price) that saturates state strength
    pub strength_scale_pct: f64,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast_period: Period::new_const(12),
            slow_period: Period::new_const(26),
            signal_period: Period::new_const(9),
            divergence: true,
            divergence_lookback: Period::new_const(60),
            min_oscillator_move: 0.0,
            strength_scale_pct: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmaConfig {
    pub fast_period: Period,
    pub slow_period: Period,
    /// Price distance from the slow EMA (in %) that saturates state strength
    pub distance_scale_pct: f64,
    /// Fast/slow spread (in %) that saturates alignment strength
    pub spread_scale_pct: f64,
}

impl Default for EmaConfig {
    fn default() -> Self {
        Self {
            fast_period: Period::new_const(9),
            slow_period: Period::new_const(21),
            distance_scale_pct: 3.0,
            spread_scale_pct: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Ma200Config {
    pub period: Period,
    /// Period of the fast average used for golden/death crosses (SMA50 slot)
    pub fast_period: Period,
    /// Low/high distance (in %) that counts as a test of the average
    pub test_tolerance_pct: f64,
    pub distance_scale_pct: f64,
}

impl Default for Ma200Config {
    fn default() -> Self {
        Self {
            period: Period::new_const(200),
            fast_period: Period::new_const(50),
            test_tolerance_pct: 0.5,
            distance_scale_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IchimokuConfig {
    pub tenkan_period: Period,
    pub kijun_period: Period,
    pub senkou_b_period: Period,
    pub distance_scale_pct: f64,
}

impl Default for IchimokuConfig {
    fn default() -> Self {
        Self {
            tenkan_period: Period::new_const(9),
            kijun_period: Period::new_const(26),
            senkou_b_period: Period::new_const(52),
            distance_scale_pct: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdxConfig {
    pub period: Period,
    pub weak_threshold: f64,
    pub strong_threshold: f64,
    /// DI spread that saturates direction strength
    pub di_scale: f64,
}

impl Default for AdxConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(14),
            weak_threshold: 20.0,
            strong_threshold: 25.0,
            di_scale: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PsarConfig {
    pub min_bars: Period,
    pub distance_scale_pct: f64,
}

impl Default for PsarConfig {
    fn default() -> Self {
        Self {
            min_bars: Period::new_const(5),
            distance_scale_pct: 3.0,
        }
    }
}

/// Shared by the WMA, TEMA, DEMA and HMA evaluators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MovingAverageConfig {
    pub period: Period,
    /// Bars between the slope samples
    pub slope_lookback: Period,
    pub distance_scale_pct: f64,
}

impl Default for MovingAverageConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(20),
            slope_lookback: Period::new_const(1),
            distance_scale_pct: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaRibbonConfig {
    pub periods: Vec<usize>,
    /// Ribbon width (in % of price) below which it counts as compressed
    pub compression_pct: f64,
    /// Ribbon width (in % of price) above which it counts as expanded
    pub expansion_pct: f64,
}

impl Default for MaRibbonConfig {
    fn default() -> Self {
        Self {
            periods: vec![8, 13, 21, 34, 55],
            compression_pct: 0.5,
            expansion_pct: 3.0,
        }
    }
}

// ============================================================
// VOLATILITY
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BollingerConfig {
    pub period: Period,
    pub band_walk_lookback: Period,
    pub band_walk_touches: Period,
    /// Distance (in %) from a band that still counts as a touch
    pub touch_tolerance_pct: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(20),
            band_walk_lookback: Period::new_const(5),
            band_walk_touches: Period::new_const(3),
            touch_tolerance_pct: 0.1,
        }
    }
}

/// Bollinger band width, expressed in percent of the middle band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BbwConfig {
    pub period: Period,
    pub squeeze_threshold: f64,
    pub high_volatility_threshold: f64,
    /// Bar-over-bar width growth that counts as an expansion
    pub expansion_ratio: f64,
}

impl Default for BbwConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(20),
            squeeze_threshold: 2.0,
            high_volatility_threshold: 8.0,
            expansion_ratio: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AtrConfig {
    pub period: Period,
    /// Stop distance and spike threshold, in ATRs
    pub multiplier: f64,
    /// Bars averaged to judge the current ATR
    pub average_period: Period,
    pub expansion_ratio: f64,
    pub contraction_ratio: f64,
}

impl Default for AtrConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(14),
            multiplier: 2.0,
            average_period: Period::new_const(20),
            expansion_ratio: 1.5,
            contraction_ratio: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeltnerConfig {
    pub period: Period,
}

impl Default for KeltnerConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DonchianConfig {
    pub period: Period,
    /// Fraction of the channel height counted as "near" an edge
    pub proximity: Ratio,
}

impl Default for DonchianConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(20),
            proximity: Ratio::new_const(0.2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TtmSqueezeConfig {
    pub enabled: bool,
    pub period: Period,
    pub min_squeeze_duration: Period,
    pub momentum_smoothing: Period,
    /// Cap on the release bonus earned by long squeezes
    pub max_duration_bonus: f64,
}

impl Default for TtmSqueezeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period: Period::new_const(20),
            min_squeeze_duration: Period::new_const(6),
            momentum_smoothing: Period::new_const(3),
            max_duration_bonus: 10.0,
        }
    }
}

// ============================================================
// VOLUME
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VolumeConfig {
    pub period: Period,
    pub spike_multiplier: f64,
    pub high_ratio: f64,
    pub low_ratio: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(20),
            spike_multiplier: 2.0,
            high_ratio: 1.5,
            low_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MfiConfig {
    pub period: Period,
    pub overbought: f64,
    pub oversold: f64,
    pub divergence: bool,
    pub divergence_lookback: Period,
    pub min_oscillator_move: f64,
}

impl Default for MfiConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(14),
            overbought: 80.0,
            oversold: 20.0,
            divergence: true,
            divergence_lookback: Period::new_const(60),
            min_oscillator_move: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObvConfig {
    /// Bars fitted for the OBV slope
    pub trend_lookback: Period,
    /// Bars whose OBV extreme must be exceeded for a breakout
    pub breakout_lookback: Period,
    pub divergence: bool,
    pub divergence_lookback: Period,
}

impl Default for ObvConfig {
    fn default() -> Self {
        Self {
            trend_lookback: Period::new_const(10),
            breakout_lookback: Period::new_const(20),
            divergence: true,
            divergence_lookback: Period::new_const(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CmfConfig {
    pub period: Period,
    pub threshold: f64,
    pub strong_threshold: f64,
}

impl Default for CmfConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(20),
            threshold: 0.05,
            strong_threshold: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdLineConfig {
    /// SMA length of the AD line used as its signal line
    pub average_period: Period,
    pub divergence: bool,
    pub divergence_lookback: Period,
}

impl Default for AdLineConfig {
    fn default() -> Self {
        Self {
            average_period: Period::new_const(20),
            divergence: true,
            divergence_lookback: Period::new_const(60),
        }
    }
}

// ============================================================
// STRUCTURE
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupportResistanceConfig {
    /// Bars scanned when levels are derived from price pivots
    pub lookback: Period,
    pub pivot_distance: Period,
    /// Distance (in %) that counts as near a level
    pub proximity_pct: f64,
    /// Pivots closer than this (in %) merge into one level
    pub merge_pct: f64,
    pub max_levels: Period,
}

impl Default for SupportResistanceConfig {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(100),
            pivot_distance: Period::new_const(5),
            proximity_pct: 1.0,
            merge_pct: 0.5,
            max_levels: Period::new_const(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PivotPointsConfig {
    /// Distance (in %) that counts as at a pivot level
    pub tolerance_pct: f64,
}

impl Default for PivotPointsConfig {
    fn default() -> Self {
        Self { tolerance_pct: 0.3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FibonacciConfig {
    /// Relative distance from a level that counts as at it
    pub tolerance: Ratio,
}

impl Default for FibonacciConfig {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.01),
        }
    }
}

// ============================================================
// PATTERNS
// ============================================================

/// Chart pattern geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatternConfig {
    pub lookback: Period,
    pub pivot_distance: Period,
    /// |normalized slope| below this counts as flat
    pub flat_slope_threshold: f64,
    pub min_reliability: Ratio,
    /// Bars after the last pivot for which a pattern is still reported
    pub max_pattern_age: Period,
    pub shoulder_tolerance: Ratio,
    pub symmetry_tolerance: Ratio,
    pub double_tolerance: Ratio,
    pub min_double_depth: Ratio,
    pub min_double_separation: Period,
    pub pole_length: Period,
    pub flag_length: Period,
    pub min_pole_move: Ratio,
    pub cup_rim_tolerance: Ratio,
    pub cup_min_depth: f64,
    pub cup_max_depth: f64,
    pub handle_max_retrace: Ratio,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(100),
            pivot_distance: Period::new_const(3),
            flat_slope_threshold: 0.001,
            min_reliability: Ratio::new_const(0.4),
            max_pattern_age: Period::new_const(20),
            shoulder_tolerance: Ratio::new_const(0.05),
            symmetry_tolerance: Ratio::new_const(0.5),
            double_tolerance: Ratio::new_const(0.03),
            min_double_depth: Ratio::new_const(0.03),
            min_double_separation: Period::new_const(10),
            pole_length: Period::new_const(10),
            flag_length: Period::new_const(10),
            min_pole_move: Ratio::new_const(0.05),
            cup_rim_tolerance: Ratio::new_const(0.05),
            cup_min_depth: 0.12,
            cup_max_depth: 0.5,
            handle_max_retrace: Ratio::new_const(0.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CandlestickConfig {
    /// body / range below this is a doji
    pub doji_ratio: Ratio,
    /// Long shadow must exceed this multiple of the body
    pub shadow_body_multiple: f64,
    /// Opposite shadow must stay below this fraction of the body
    pub opposite_shadow_ratio: f64,
    /// Star body must stay below this fraction of the first body
    pub star_body_ratio: Ratio,
}

impl Default for CandlestickConfig {
    fn default() -> Self {
        Self {
            doji_ratio: Ratio::new_const(0.1),
            shadow_body_multiple: 2.0,
            opposite_shadow_ratio: 0.5,
            star_body_ratio: Ratio::new_const(0.3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DivergenceConfig {
    pub pivot_distance: Period,
    pub min_distance: usize,
    pub max_distance: usize,
    /// Minimum relative price move between pivots, in %
    pub min_price_move_pct: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            pivot_distance: Period::new_const(3),
            min_distance: 5,
            max_distance: 60,
            min_price_move_pct: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfluenceConfig {
    /// Tolerance as a fraction of the target price
    pub tolerance_radius: Ratio,
    pub min_strength_gate: f64,
    pub max_bonus: f64,
    pub per_confluence_bonus: f64,
    /// Cap on the summed per-source bonus reported by the scorer
    pub max_score_bonus: f64,
    pub swing_lookback: Period,
    pub swing_distance: Period,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            tolerance_radius: Ratio::new_const(0.01),
            min_strength_gate: 50.0,
            max_bonus: 15.0,
            per_confluence_bonus: 5.0,
            max_score_bonus: 40.0,
            swing_lookback: Period::new_const(50),
            swing_distance: Period::new_const(3),
        }
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "bollinger": { "bandWalkLookback": 8 },
            "atr": { "multiplier": 3.0 }
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bollinger.band_walk_lookback.get(), 8);
        assert_eq!(config.bollinger.band_walk_touches.get(), 3);
        assert_eq!(config.atr.multiplier, 3.0);
        assert_eq!(config.atr.period.get(), 14);
        assert_eq!(config.ema, EmaConfig::default());
    }

    #[test]
    fn test_zero_period_rejected_on_parse() {
        let json = r#"{ "macd": { "fastPeriod": 0 } }"#;
        assert!(serde_json::from_str::<EngineConfig>(json).is_err());
    }

    #[test]
    fn test_ratio_out_of_range_rejected_on_parse() {
        let json = r#"{ "fibonacci": { "tolerance": 1.5 } }"#;
        assert!(serde_json::from_str::<EngineConfig>(json).is_err());
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.adx.weak_threshold = 30.0;
        assert!(matches!(config.validate(), Err(SignalError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.mfi.overbought = 120.0;
        assert!(matches!(config.validate(), Err(SignalError::OutOfRange { .. })));

        let mut config = EngineConfig::default();
        config.ema.fast_period = Period::new(30).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_tolerances_rejected() {
        let cases: [fn(&mut EngineConfig); 4] = [
            |c| c.patterns.flat_slope_threshold = -0.1,
            |c| c.ma200.test_tolerance_pct = -0.1,
            |c| c.bollinger.touch_tolerance_pct = -0.1,
            |c| c.pivot_points.tolerance_pct = -0.1,
        ];
        for set in cases {
            let mut config = EngineConfig::default();
            set(&mut config);
            assert!(matches!(config.validate(), Err(SignalError::InvalidConfig(_))));
        }

        let mut config = EngineConfig::default();
        config.pivot_points.tolerance_pct = 0.0;
        config.patterns.flat_slope_threshold = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ribbon_needs_two_periods() {
        let mut config = EngineConfig::default();
        config.ma_ribbon.periods = vec![8];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialize_roundtrip_keeps_camel_case() {
        let json = serde_json::to_string(&EngineConfig::default()).unwrap();
        assert!(json.contains("minSqueezeDuration"));
        assert!(json.contains("\"ttm_squeeze\""));
    }
}
