//! Benchmarks for signal evaluation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tasig::evaluators::{EmaEvaluator, SupportResistanceEvaluator};
use tasig::prelude::*;

/// Generate realistic random candles
fn generate_candles(n: usize) -> Vec<Candle> {
  let mut candles = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;
    let volume = 1000.0 + ((i * 11) % 17) as f64 * 100.0;

    let o = price;
    let c = price + change;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;

    candles.push(Candle::new(o, h, l, c, volume));
    price = c;
  }

  candles
}

fn ema(closes: &[f64], period: usize) -> Vec<f64> {
  let k = 2.0 / (period as f64 + 1.0);
  let mut out = Vec::with_capacity(closes.len());
  let mut prev = closes.first().copied().unwrap_or(0.0);
  for &c in closes {
    prev = c * k + prev * (1.0 - k);
    out.push(prev);
  }
  out
}

/// A handful of slots filled from the candles
fn generate_series(candles: &[Candle]) -> IndicatorSeries {
  let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
  let scalar = |v: Vec<f64>| SeriesData::Scalar(Series::from_values(v));
  let fast = ema(&closes, 9);
  let slow = ema(&closes, 21);
  let macd: Vec<MacdValue> = {
    let line: Vec<f64> = ema(&closes, 12).iter().zip(ema(&closes, 26)).map(|(a, b)| a - b).collect();
    let signal = ema(&line, 9);
    line
      .iter()
      .zip(signal)
      .map(|(&macd, signal)| MacdValue { macd, signal, histogram: macd - signal })
      .collect()
  };
  let bands: Vec<BandValue> =
    slow.iter().map(|&m| BandValue { upper: m * 1.02, middle: m, lower: m * 0.98 }).collect();

  IndicatorSeries::new()
    .with(IndicatorKey::EmaFast, scalar(fast))
    .with(IndicatorKey::EmaSlow, scalar(slow.clone()))
    .with(IndicatorKey::Macd, SeriesData::Macd(Series::from_values(macd)))
    .with(IndicatorKey::Bollinger, SeriesData::Bands(Series::from_values(bands)))
    .with(IndicatorKey::Bbw, scalar(vec![4.0; candles.len()]))
    .with(IndicatorKey::VolumeSma, scalar(vec![1800.0; candles.len()]))
}

fn bench_single_evaluator(c: &mut Criterion) {
  let candles = generate_candles(1000);
  let series = generate_series(&candles);
  let regime = MarketRegime::neutral();

  let engine = EngineBuilder::new().add(BuiltinEvaluator::Ema(EmaEvaluator)).build().unwrap();

  c.bench_function("evaluate_ema_latest", |b| {
    b.iter(|| {
      let _ = black_box(engine.evaluate_latest(black_box(&candles), &series, &regime));
    })
  });
}

fn bench_all_evaluators(c: &mut Criterion) {
  let candles = generate_candles(1000);
  let series = generate_series(&candles);
  let regime = MarketRegime::new("uptrend", 0.7);

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("evaluate_all_latest", |b| {
    b.iter(|| {
      let _ = black_box(engine.evaluate_latest(black_box(&candles), &series, &regime));
    })
  });
}

fn bench_derived_levels(c: &mut Criterion) {
  let candles = generate_candles(1000);
  let series = IndicatorSeries::new();
  let regime = MarketRegime::neutral();

  let engine = EngineBuilder::new()
    .add(BuiltinEvaluator::SupportResistance(SupportResistanceEvaluator))
    .build()
    .unwrap();

  c.bench_function("support_resistance_without_series", |b| {
    b.iter(|| {
      let _ = black_box(engine.evaluate_at(black_box(&candles), &series, 900, &regime));
    })
  });
}

fn bench_range(c: &mut Criterion) {
  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
  let regime = MarketRegime::neutral();

  let mut group = c.benchmark_group("range");

  for size in [100, 500, 1000].iter() {
    let candles = generate_candles(*size);
    let series = generate_series(&candles);

    group.bench_with_input(BenchmarkId::new("evaluate_range", size), size, |b, &n| {
      b.iter(|| {
        let _ = black_box(engine.evaluate_range(black_box(&candles), &series, 0..n, &regime));
      })
    });
  }

  group.finish();
}

fn bench_parallel(c: &mut Criterion) {
  let sets: Vec<(Vec<Candle>, IndicatorSeries)> = (0..8)
    .map(|i| {
      let candles = generate_candles(1000 + i * 10);
      let series = generate_series(&candles);
      (candles, series)
    })
    .collect();
  let symbols = ["SYM1", "SYM2", "SYM3", "SYM4", "SYM5", "SYM6", "SYM7", "SYM8"];
  let regime = MarketRegime::neutral();

  let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

  c.bench_function("parallel_8_instruments", |b| {
    b.iter(|| {
      let instruments: Vec<Instrument<'_, Candle>> = sets
        .iter()
        .zip(symbols)
        .map(|((candles, series), symbol)| Instrument {
          symbol,
          candles: candles.as_slice(),
          series,
          regime: &regime,
        })
        .collect();
      let _ = black_box(evaluate_parallel(black_box(&engine), instruments));
    })
  });
}

fn bench_chart_patterns(c: &mut Criterion) {
  let candles = generate_candles(1000);
  let recognizer = ChartPatternRecognizer::with_defaults();
  let config = PatternConfig::default();

  c.bench_function("chart_patterns_at_bar", |b| {
    b.iter(|| {
      let _ = black_box(recognizer.detect_at(black_box(&candles), black_box(900), &config));
    })
  });
}

criterion_group!(
  benches,
  bench_single_evaluator,
  bench_all_evaluators,
  bench_derived_levels,
  bench_range,
  bench_parallel,
  bench_chart_patterns,
);

criterion_main!(benches);
