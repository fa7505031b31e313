use std::hint::black_box;
use std::time::Duration;

use chrono::NaiveDate;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use ndarray::Array2;
use rebalance_rs::backtest::Accumulator;
use rebalance_rs::backtest::MarketData;
use rebalance_rs::backtest::PricePanel;
use rebalance_rs::backtest::SimulationDriver;
use rebalance_rs::strategies::EqualWeight;
use rebalance_rs::strategies::MinVarianceConfig;
use rebalance_rs::strategies::MinimumVariance;

fn panel(rows: usize, assets: usize) -> MarketData {
  let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
  let dates = (0..rows)
    .map(|i| start + chrono::Duration::days(i as i64))
    .collect();
  let prices = Array2::from_shape_fn((rows, assets), |(i, j)| {
    100.0 + ((i * (j + 3)) % 11) as f64 + 0.05 * i as f64
  });
  let tickers = (0..assets).map(|j| format!("T{j:03}")).collect();
  MarketData::new().with_panel("stocks", PricePanel::new(dates, tickers, prices).unwrap())
}

fn bench_run(c: &mut Criterion) {
  let mut group = c.benchmark_group("Simulation/run");
  group.measurement_time(Duration::from_secs(3));
  group.warm_up_time(Duration::from_millis(500));
  let rows = 260usize;
  let data = panel(rows, 20);
  let driver = SimulationDriver::default();

  group.bench_with_input(BenchmarkId::new("equal_weight", rows), &rows, |b, &rows| {
    b.iter(|| {
      let mut acc = Accumulator::new();
      driver
        .run(&mut EqualWeight::default(), &data, 60..rows, 10, &mut acc)
        .unwrap();
      black_box(acc)
    });
  });

  group.bench_with_input(BenchmarkId::new("min_variance", rows), &rows, |b, &rows| {
    b.iter(|| {
      let mut acc = Accumulator::new();
      let mut strategy = MinimumVariance::new(MinVarianceConfig {
        lookback: 60,
        allow_short: true,
        ..MinVarianceConfig::default()
      })
      .unwrap();
      driver
        .run(&mut strategy, &data, 60..rows, 10, &mut acc)
        .unwrap();
      black_box(acc)
    });
  });

  group.finish();
}

criterion_group!(benches, bench_run);
criterion_main!(benches);
