//! Property tests for the invariants every caller relies on.

use proptest::prelude::*;
use tasig::prelude::*;

fn arb_strength() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -50.0..150.0f64,
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
    ]
}

fn arb_signals() -> impl Strategy<Value = Vec<Signal>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["Alpha", "Beta", "Gamma", "Delta"]),
            arb_strength(),
            any::<bool>(),
        ),
        0..20,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .map(|(value, strength, event)| {
                if event {
                    Signal::event(SignalType::Macd, value, strength, 7)
                } else {
                    Signal::state(SignalType::Macd, value, strength, 7)
                }
            })
            .collect()
    })
}

fn arb_regime() -> impl Strategy<Value = MarketRegime> {
    (
        prop::sample::select(vec![
            "strong_uptrend",
            "uptrend",
            "ranging",
            "downtrend",
            "strong_downtrend",
            "volatile",
            "unknown",
        ]),
        0.0..=1.0f64,
    )
        .prop_map(|(trend, confidence)| MarketRegime::new(trend, confidence))
}

fn arb_candles() -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((-3.0..3.0f64, 0.1..2.0f64, 100.0..5000.0f64), 30..120).prop_map(
        |steps| {
            let mut price = 100.0;
            steps
                .into_iter()
                .map(|(change, spread, volume)| {
                    let open = price;
                    let close = (price + change).max(1.0);
                    price = close;
                    Candle::new(
                        open,
                        open.max(close) + spread,
                        (open.min(close) - spread).max(0.5),
                        close,
                        volume,
                    )
                })
                .collect()
        },
    )
}

fn clamp(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

proptest! {
    // ============================================================
    // NORMALIZATION
    // ============================================================

    #[test]
    fn normalized_strength_in_bounds(signals in arb_signals(), regime in arb_regime()) {
        for s in normalize(signals, &regime) {
            prop_assert!((0.0..=100.0).contains(&s.strength));
            prop_assert!((0.0..=100.0).contains(&s.base_strength));
        }
    }

    #[test]
    fn normalize_is_idempotent(signals in arb_signals(), regime in arb_regime()) {
        let once = normalize(signals, &regime);
        let twice = normalize(once.clone(), &regime);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn dedup_keeps_strongest(signals in arb_signals()) {
        let out = normalize(signals.clone(), &MarketRegime::neutral());

        let mut values: Vec<&str> = out.iter().map(|s| s.value.as_str()).collect();
        let before = values.len();
        values.sort_unstable();
        values.dedup();
        prop_assert_eq!(before, values.len());

        for s in &out {
            let best = signals
                .iter()
                .filter(|o| o.value == s.value)
                .map(|o| clamp(o.base_strength))
                .fold(0.0, f64::max);
            prop_assert_eq!(s.base_strength, best);
            prop_assert_eq!(s.strength, best);
        }
    }

    #[test]
    fn regime_factor_is_identity_without_confidence(
        regime in arb_regime(),
        ty in prop::sample::select(vec![
            SignalType::Macd,
            SignalType::Bollinger,
            SignalType::Obv,
            SignalType::Fibonacci,
            SignalType::ChartPattern,
        ]),
    ) {
        let flat = MarketRegime::new(regime.trend.clone(), 0.0);
        prop_assert_eq!(regime_factor(&flat, ty), 1.0);
        let f = regime_factor(&regime, ty);
        prop_assert!(f > 0.0 && f.is_finite());
    }

    // ============================================================
    // PIVOTS
    // ============================================================

    #[test]
    fn pivots_dominate_their_window(
        series in prop::collection::vec(-100.0..100.0f64, 0..60),
        distance in 1usize..5,
    ) {
        let pivots = find_pivots(&series, 0, series.len(), distance);
        for p in &pivots.highs {
            prop_assert!(p.index >= distance && p.index + distance < series.len());
            for j in (p.index - distance)..=(p.index + distance) {
                prop_assert!(series[j] <= p.value);
            }
        }
        for p in &pivots.lows {
            prop_assert!(p.index >= distance && p.index + distance < series.len());
            for j in (p.index - distance)..=(p.index + distance) {
                prop_assert!(series[j] >= p.value);
            }
        }
    }

    #[test]
    fn pivots_mirror_under_negation(
        series in prop::collection::vec(-100.0..100.0f64, 0..60),
        distance in 1usize..5,
    ) {
        let negated: Vec<f64> = series.iter().map(|v| -v).collect();
        let a = find_pivots(&series, 0, series.len(), distance);
        let b = find_pivots(&negated, 0, negated.len(), distance);

        let idx = |ps: &[Pivot]| ps.iter().map(|p| p.index).collect::<Vec<_>>();
        prop_assert_eq!(idx(&a.highs), idx(&b.lows));
        prop_assert_eq!(idx(&a.lows), idx(&b.highs));
    }

    #[test]
    fn trendline_recovers_exact_line(
        slope in -5.0..5.0f64,
        intercept in -100.0..100.0f64,
        xs in prop::collection::btree_set(0usize..200, 2..12),
    ) {
        let points: Vec<Pivot> = xs
            .into_iter()
            .map(|x| Pivot::new(x, slope * x as f64 + intercept))
            .collect();
        let line = Trendline::fit(&points).unwrap();
        prop_assert!((line.slope - slope).abs() < 1e-6);
        prop_assert!((line.intercept - intercept).abs() < 1e-4);
    }

    // ============================================================
    // CONFLUENCE
    // ============================================================

    #[test]
    fn confluence_bonus_is_monotonic(base in 0.0..100.0f64, count in 0usize..8) {
        let config = ConfluenceConfig::default();
        let make = |n: usize| {
            ConfluenceResult::from_confluences(
                (0..n)
                    .map(|_| Confluence { source: "SMA50", level: 100.0, bonus: 12.0 })
                    .collect(),
                config.max_score_bonus,
            )
        };
        let apply = |r: &ConfluenceResult| {
            apply_bonus(
                base,
                r,
                config.min_strength_gate,
                config.max_bonus,
                config.per_confluence_bonus,
            )
        };

        let fewer = apply(&make(count));
        let more = apply(&make(count + 1));
        prop_assert!(fewer >= base);
        prop_assert!(more >= fewer);
        prop_assert!(more <= 100.0);
        prop_assert!(more - base <= config.max_bonus + 1e-9);
        if base < config.min_strength_gate {
            prop_assert_eq!(more, base);
        }
    }

    // ============================================================
    // ENGINE
    // ============================================================

    #[test]
    fn engine_output_in_bounds(candles in arb_candles(), regime in arb_regime()) {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let n = candles.len();
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let series = IndicatorSeries::new()
            .with(IndicatorKey::EmaFast, SeriesData::Scalar(Series::from_values(closes.clone())))
            .with(
                IndicatorKey::EmaSlow,
                SeriesData::Scalar(Series::from_values(closes.iter().map(|c| c * 0.99).collect())),
            )
            .with(
                IndicatorKey::Bbw,
                SeriesData::Scalar(Series::from_values(vec![2.5; n])),
            );

        for index in [n / 2, n - 1] {
            let signals = engine.evaluate_at(&candles, &series, index, &regime).unwrap();
            for s in signals {
                prop_assert!((0.0..=100.0).contains(&s.strength), "{:?}", s);
                prop_assert_eq!(s.candle_index, index);
            }
        }
    }
}
