//! Pattern evaluators: chart patterns and candlestick patterns

use super::{EvalContext, IndicatorEvaluator};
use crate::chart::ChartPatternRecognizer;
use crate::config::EngineConfig;
use crate::{CandlestickRecognizer, Signal, SignalType, OHLCV};

// ============================================================
// CHART PATTERNS
// ============================================================

/// One signal per detected chart pattern, plus a confirmation event
#[derive(Debug, Clone, Default)]
pub struct ChartPatternEvaluator {
    recognizer: ChartPatternRecognizer,
}

impl ChartPatternEvaluator {
    pub fn new(recognizer: ChartPatternRecognizer) -> Self {
        Self { recognizer }
    }

    pub fn recognizer(&self) -> &ChartPatternRecognizer {
        &self.recognizer
    }
}

impl IndicatorEvaluator for ChartPatternEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::ChartPattern
    }

    fn min_lookback(&self, config: &EngineConfig) -> usize {
        self.recognizer
            .detectors()
            .iter()
            .map(|d| d.min_bars(&config.patterns))
            .min()
            .map_or(0, |bars| bars.saturating_sub(1))
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        const TY: SignalType = SignalType::ChartPattern;
        let i = ctx.index;
        let mut out = Vec::new();

        for pattern in self.recognizer.detect_at(ctx.candles, i, &ctx.config.patterns) {
            let name = pattern.kind.display_name();
            let strength = 50.0 + 45.0 * pattern.reliability;
            out.push(
                Signal::state(TY, name, strength, i)
                    .with_details(pattern.description.clone())
                    .with_priority(2),
            );
            if pattern.confirmed {
                out.push(
                    Signal::event(TY, format!("{} Confirmed", name), strength + 10.0, i)
                        .with_details(pattern.description),
                );
            }
        }

        out
    }
}

// ============================================================
// CANDLESTICK PATTERNS
// ============================================================

/// Candlestick patterns at the evaluated bar. Without an explicit recognizer
/// one is built from `config.candlestick` on each call.
#[derive(Debug, Clone, Default)]
pub struct CandlestickEvaluator {
    recognizer: Option<CandlestickRecognizer>,
}

impl CandlestickEvaluator {
    pub fn with_recognizer(recognizer: CandlestickRecognizer) -> Self {
        Self {
            recognizer: Some(recognizer),
        }
    }
}

impl IndicatorEvaluator for CandlestickEvaluator {
    fn signal_type(&self) -> SignalType {
        SignalType::Candlestick
    }

    fn min_lookback(&self, _config: &EngineConfig) -> usize {
        0
    }

    fn raw_signals<T: OHLCV>(&self, ctx: &EvalContext<'_, T>) -> Vec<Signal> {
        let matches = match &self.recognizer {
            Some(recognizer) => recognizer.scan_at(ctx.candles, ctx.index),
            None => CandlestickRecognizer::from_config(&ctx.config.candlestick).scan_at(ctx.candles, ctx.index),
        };

        matches
            .into_iter()
            .map(|m| {
                Signal::state(
                    SignalType::Candlestick,
                    m.pattern_id.display_name(),
                    50.0 + 40.0 * m.strength,
                    ctx.index,
                )
                .with_details(format!(
                    "{:?}, bars {}..={}",
                    m.direction, m.start_index, m.end_index
                ))
                .with_priority(2)
            })
            .collect()
    }
}
