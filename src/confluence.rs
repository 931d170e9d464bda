//! Price-level agreement scoring
//!
//! Tests a target price against moving averages, channel boundaries, PSAR,
//! Ichimoku lines, session pivot levels, recent swing points and round
//! numbers. Each source within
//! `target × tolerance_radius` contributes a fixed bonus.

use serde::Serialize;

use crate::config::ConfluenceConfig;
use crate::logging::{LogSink, TRACING_SINK};
use crate::pivots::find_price_pivots;
use crate::series::{BandValue, IchimokuValue, IndicatorKey, IndicatorSeries, PivotPointsValue};
use crate::OHLCV;

const MOVING_AVERAGES: [(IndicatorKey, &str, f64); 8] = [
    (IndicatorKey::EmaFast, "EMA Fast", 8.0),
    (IndicatorKey::EmaSlow, "EMA Slow", 10.0),
    (IndicatorKey::Sma50, "SMA50", 12.0),
    (IndicatorKey::Ma200, "MA200", 15.0),
    (IndicatorKey::Wma, "WMA", 8.0),
    (IndicatorKey::Tema, "TEMA", 8.0),
    (IndicatorKey::Dema, "DEMA", 8.0),
    (IndicatorKey::Hma, "HMA", 8.0),
];

/// (slot, upper, middle, lower, edge bonus, middle bonus)
const CHANNELS: [(IndicatorKey, &str, &str, &str, f64, f64); 3] = [
    (IndicatorKey::Bollinger, "Bollinger Upper", "Bollinger Middle", "Bollinger Lower", 10.0, 8.0),
    (IndicatorKey::Keltner, "Keltner Upper", "Keltner Middle", "Keltner Lower", 8.0, 6.0),
    (IndicatorKey::Donchian, "Donchian Upper", "Donchian Middle", "Donchian Lower", 12.0, 6.0),
];

const PSAR_BONUS: f64 = 10.0;
const TENKAN_BONUS: f64 = 8.0;
const KIJUN_BONUS: f64 = 12.0;
const CLOUD_EDGE_BONUS: f64 = 10.0;
const PIVOT_LEVEL_BONUS: f64 = 10.0;
const SWING_BONUS: f64 = 12.0;
const ROUND_NUMBER_BONUS: f64 = 8.0;

/// One agreeing level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confluence {
    pub source: &'static str,
    pub level: f64,
    pub bonus: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfluenceResult {
    pub confluences: Vec<Confluence>,
    /// Sum of source bonuses, capped
    pub total_bonus: f64,
    pub description: String,
}

impl ConfluenceResult {
    pub fn from_confluences(confluences: Vec<Confluence>, max_bonus: f64) -> Self {
        let sum: f64 = confluences.iter().map(|c| c.bonus.max(0.0)).sum();
        let description = if confluences.is_empty() {
            "No confluence".to_string()
        } else {
            let names: Vec<&str> = confluences.iter().map(|c| c.source).collect();
            format!("{} confluences: {}", confluences.len(), names.join(", "))
        };
        Self {
            total_bonus: sum.min(max_bonus.max(0.0)),
            confluences,
            description,
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.confluences.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.confluences.is_empty()
    }
}

/// Bonus applied to a base strength. Only bases at or above the gate earn
/// it; the bonus is `min(count × per_confluence_bonus, max_bonus)` and the
/// result never exceeds 100.
pub fn apply_bonus(
    base_strength: f64,
    result: &ConfluenceResult,
    min_strength_gate: f64,
    max_bonus: f64,
    per_confluence_bonus: f64,
) -> f64 {
    if !base_strength.is_finite() {
        return base_strength;
    }
    if base_strength < min_strength_gate || result.is_empty() {
        return base_strength.min(100.0);
    }
    let bonus = (result.count() as f64 * per_confluence_bonus).min(max_bonus);
    (base_strength + bonus).min(100.0)
}

/// Scores targets against the levels available at one candle
pub struct ConfluenceScorer<'a, T> {
    candles: &'a [T],
    series: &'a IndicatorSeries,
    config: &'a ConfluenceConfig,
    log: &'a dyn LogSink,
}

impl<'a, T: OHLCV> ConfluenceScorer<'a, T> {
    pub fn new(candles: &'a [T], series: &'a IndicatorSeries, config: &'a ConfluenceConfig) -> Self {
        Self {
            candles,
            series,
            config,
            log: &TRACING_SINK,
        }
    }

    pub fn with_log(mut self, log: &'a dyn LogSink) -> Self {
        self.log = log;
        self
    }

    /// Score `target` at candle `index`
    pub fn score(&self, target: f64, index: usize) -> ConfluenceResult {
        if !target.is_finite() || target <= 0.0 || index >= self.candles.len() {
            return ConfluenceResult::from_confluences(Vec::new(), self.config.max_score_bonus);
        }

        let tolerance = target * self.config.tolerance_radius.get();
        let n = self.candles.len();
        let near = |level: f64| level.is_finite() && (level - target).abs() <= tolerance;
        let mut found = Vec::new();

        for (key, name, bonus) in MOVING_AVERAGES {
            if let Some(&level) = self.series.value_at::<f64>(key, index, n, self.log) {
                if near(level) {
                    found.push(Confluence { source: name, level, bonus });
                }
            }
        }

        for (key, upper, middle, lower, edge, mid) in CHANNELS {
            if let Some(band) = self.series.value_at::<BandValue>(key, index, n, self.log) {
                let (band, _) = band.ordered();
                for (source, level, bonus) in [
                    (upper, band.upper, edge),
                    (middle, band.middle, mid),
                    (lower, band.lower, edge),
                ] {
                    if near(level) {
                        found.push(Confluence { source, level, bonus });
                    }
                }
            }
        }

        if let Some(&level) = self.series.value_at::<f64>(IndicatorKey::Psar, index, n, self.log) {
            if near(level) {
                found.push(Confluence {
                    source: "PSAR",
                    level,
                    bonus: PSAR_BONUS,
                });
            }
        }

        if let Some(ichi) =
            self.series
                .value_at::<IchimokuValue>(IndicatorKey::Ichimoku, index, n, self.log)
        {
            for (source, level, bonus) in [
                ("Tenkan", ichi.tenkan, TENKAN_BONUS),
                ("Kijun", ichi.kijun, KIJUN_BONUS),
                ("Senkou A", ichi.senkou_a, CLOUD_EDGE_BONUS),
                ("Senkou B", ichi.senkou_b, CLOUD_EDGE_BONUS),
            ] {
                if near(level) {
                    found.push(Confluence { source, level, bonus });
                }
            }
        }

        if let Some(pp) =
            self.series
                .value_at::<PivotPointsValue>(IndicatorKey::PivotPoints, index, n, self.log)
        {
            for (source, level) in pp.levels() {
                if near(level) {
                    found.push(Confluence { source, level, bonus: PIVOT_LEVEL_BONUS });
                }
            }
        }

        let lookback = self.config.swing_lookback.get();
        let start = (index + 1).saturating_sub(lookback);
        let swings = find_price_pivots(
            self.candles,
            start,
            index + 1,
            self.config.swing_distance.get(),
        );
        let closest = |pivots: &[crate::pivots::Pivot]| {
            pivots
                .iter()
                .filter(|p| near(p.value))
                .min_by(|a, b| {
                    (a.value - target)
                        .abs()
                        .total_cmp(&(b.value - target).abs())
                })
                .map(|p| p.value)
        };
        if let Some(level) = closest(&swings.highs) {
            found.push(Confluence {
                source: "Swing High",
                level,
                bonus: SWING_BONUS,
            });
        }
        if let Some(level) = closest(&swings.lows) {
            found.push(Confluence {
                source: "Swing Low",
                level,
                bonus: SWING_BONUS,
            });
        }

        let step = round_number_step(target);
        let level = (target / step).round() * step;
        if level > 0.0 && near(level) {
            found.push(Confluence {
                source: "Round Number",
                level,
                bonus: ROUND_NUMBER_BONUS,
            });
        }

        ConfluenceResult::from_confluences(found, self.config.max_score_bonus)
    }

    /// Score `target` and fold the result into `base_strength`
    pub fn boost(&self, base_strength: f64, target: f64, index: usize) -> (f64, ConfluenceResult) {
        let result = self.score(target, index);
        let strength = apply_bonus(
            base_strength,
            &result,
            self.config.min_strength_gate,
            self.config.max_bonus,
            self.config.per_confluence_bonus,
        );
        (strength, result)
    }
}

/// Granularity of "round" prices at the magnitude of `price`
pub fn round_number_step(price: f64) -> f64 {
    let p = price.abs();
    if p >= 10_000.0 {
        1_000.0
    } else if p >= 1_000.0 {
        100.0
    } else if p >= 100.0 {
        10.0
    } else if p >= 10.0 {
        1.0
    } else if p >= 1.0 {
        0.1
    } else {
        0.01
    }
}
