//! Dedup, clamping and regime adjustment applied to all evaluator output

use std::collections::HashMap;

use crate::{MarketRegime, RegimeTrend, Signal, SignalCategory, SignalType};

/// Regime multiplier at full confidence
fn table(trend: RegimeTrend, category: SignalCategory) -> f64 {
    use RegimeTrend::*;
    use SignalCategory::*;

    match (trend, category) {
        (StrongUptrend | StrongDowntrend, Trend) => 1.15,
        (StrongUptrend | StrongDowntrend, Volatility) => 0.95,
        (StrongUptrend | StrongDowntrend, Volume) => 1.05,
        (StrongUptrend | StrongDowntrend, Structure) => 0.9,
        (Uptrend | Downtrend, Trend) => 1.1,
        (Uptrend | Downtrend, Structure) => 0.95,
        (Ranging, Trend) => 0.85,
        (Ranging, Volatility) => 1.05,
        (Ranging, Structure) => 1.15,
        (Ranging, Pattern) => 1.05,
        (Volatile, Trend) => 0.9,
        (Volatile, Volatility) => 1.15,
        (Volatile, Volume) => 1.1,
        (Volatile, Structure) => 0.9,
        (Volatile, Pattern) => 0.9,
        _ => 1.0,
    }
}

/// Strength multiplier for a signal family under `regime`.
///
/// Interpolates between 1.0 and the table value by the regime confidence,
/// so a zero-confidence regime leaves strengths untouched.
pub fn regime_factor(regime: &MarketRegime, signal_type: SignalType) -> f64 {
    let confidence = if regime.confidence.is_finite() {
        regime.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    1.0 + (table(regime.trend_kind(), signal_type.category()) - 1.0) * confidence
}

#[inline]
fn clamp_strength(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Keep one signal per `value`: the highest base strength wins, the first
/// occurrence wins ties, and output follows first-appearance order.
pub fn dedup(signals: Vec<Signal>) -> Vec<Signal> {
    let mut out: Vec<Signal> = Vec::with_capacity(signals.len());
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(signals.len());

    for signal in signals {
        match seen.get(&signal.value) {
            Some(&pos) => {
                if clamp_strength(signal.base_strength) > clamp_strength(out[pos].base_strength) {
                    out[pos] = signal;
                }
            }
            None => {
                seen.insert(signal.value.clone(), out.len());
                out.push(signal);
            }
        }
    }

    out
}

/// Dedup, clamp `base_strength` to [0, 100], then derive `strength` as the
/// clamped product with the regime factor. Idempotent for a fixed regime.
pub fn normalize(signals: Vec<Signal>, regime: &MarketRegime) -> Vec<Signal> {
    dedup(signals)
        .into_iter()
        .map(|mut signal| {
            signal.base_strength = clamp_strength(signal.base_strength);
            signal.strength = clamp_strength(signal.base_strength * regime_factor(regime, signal.signal_type));
            signal
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(value: &str, strength: f64) -> Signal {
        Signal::state(SignalType::Ema, value, strength, 0)
    }

    #[test]
    fn test_dedup_keeps_highest() {
        let out = normalize(
            vec![sig("A", 40.0), sig("B", 50.0), sig("A", 70.0)],
            &MarketRegime::neutral(),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].value, "A");
        assert_eq!(out[0].strength, 70.0);
        assert_eq!(out[1].value, "B");
    }

    #[test]
    fn test_dedup_tie_keeps_first() {
        let first = sig("A", 60.0).with_details("first");
        let second = sig("A", 60.0).with_details("second");
        let out = dedup(vec![first, second]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].details, "first");
    }

    #[test]
    fn test_clamping() {
        let out = normalize(
            vec![sig("hi", 150.0), sig("lo", -5.0), sig("nan", f64::NAN)],
            &MarketRegime::neutral(),
        );
        assert_eq!(out[0].strength, 100.0);
        assert_eq!(out[1].strength, 0.0);
        assert_eq!(out[2].strength, 0.0);
    }

    #[test]
    fn test_regime_factor_interpolates_confidence() {
        let full = MarketRegime::new("strong_uptrend", 1.0);
        let half = MarketRegime::new("strong_uptrend", 0.5);
        let none = MarketRegime::new("strong_uptrend", 0.0);
        assert!((regime_factor(&full, SignalType::Macd) - 1.15).abs() < 1e-12);
        assert!((regime_factor(&half, SignalType::Macd) - 1.075).abs() < 1e-12);
        assert_eq!(regime_factor(&none, SignalType::Macd), 1.0);
        assert!((regime_factor(&full, SignalType::Fibonacci) - 0.9).abs() < 1e-12);
        assert_eq!(regime_factor(&MarketRegime::neutral(), SignalType::Bbw), 1.0);
    }

    #[test]
    fn test_regime_applied_and_reclamped() {
        let regime = MarketRegime::new("ranging", 1.0);
        let out = normalize(vec![sig("A", 95.0)], &regime);
        assert_eq!(out[0].base_strength, 95.0);
        assert!((out[0].strength - 95.0 * 0.85).abs() < 1e-9);

        let structure = Signal::state(SignalType::SupportResistance, "Near Support", 95.0, 0);
        let out = normalize(vec![structure], &regime);
        assert_eq!(out[0].strength, 100.0);
    }

    #[test]
    fn test_idempotent() {
        let regime = MarketRegime::new("volatile", 0.8);
        let once = normalize(
            vec![sig("A", 40.0), sig("A", 90.0), sig("B", 120.0)],
            &regime,
        );
        let twice = normalize(once.clone(), &regime);
        assert_eq!(once, twice);
    }
}
