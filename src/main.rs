use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use chrono::Duration;
use chrono::NaiveDate;
use clap::Parser;
use clap::ValueEnum;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::Normal;
use rebalance_rs::backtest::Accumulator;
use rebalance_rs::backtest::DriverConfig;
use rebalance_rs::backtest::MarketData;
use rebalance_rs::backtest::PricePanel;
use rebalance_rs::backtest::SimulationDriver;
use rebalance_rs::backtest::Strategy;
use rebalance_rs::backtest::load;
use rebalance_rs::backtest::resume_index;
use rebalance_rs::strategies::EqualWeight;
use rebalance_rs::strategies::InverseVolatility;
use rebalance_rs::strategies::MinVarianceConfig;
use rebalance_rs::strategies::MinimumVariance;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyKind {
  MinVariance,
  EqualWeight,
  InverseVol,
}

/// Backtest a rebalancing strategy on a simulated price panel.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
  #[arg(long, value_enum, default_value = "min-variance")]
  strategy: StrategyKind,
  /// Number of simulated tickers.
  #[arg(long, default_value_t = 8)]
  assets: usize,
  /// Number of simulated trading days.
  #[arg(long, default_value_t = 500)]
  days: usize,
  /// Trailing window length in returns.
  #[arg(long, default_value_t = 60)]
  lookback: usize,
  /// Maximum number of tickers held.
  #[arg(long, default_value_t = 5)]
  size: usize,
  #[arg(long)]
  allow_short: bool,
  #[arg(long, default_value_t = 42)]
  seed: u64,
  /// Checkpoint directory; an existing checkpoint there is resumed.
  #[arg(long)]
  out: Option<PathBuf>,
}

/// Geometric Brownian motion paths with per-asset drift and volatility.
fn simulated_panel(assets: usize, days: usize, seed: u64) -> Result<PricePanel> {
  let mut rng = StdRng::seed_from_u64(seed);
  let normal = Normal::new(0.0, 1.0)?;
  let dt = 1.0 / 252.0;

  let mut prices = Array2::zeros((days, assets));
  for j in 0..assets {
    let mu = 0.02 + 0.01 * j as f64;
    let sigma = 0.1 + 0.05 * j as f64;
    let mut p = 100.0;
    for i in 0..days {
      prices[[i, j]] = p;
      let z: f64 = normal.sample(&mut rng);
      p *= ((mu - 0.5 * sigma * sigma) * dt + sigma * dt.sqrt() * z).exp();
    }
  }

  let start = NaiveDate::from_ymd_opt(2020, 1, 1).context("invalid start date")?;
  let dates = (0..days).map(|i| start + Duration::days(i as i64)).collect();
  let tickers = (0..assets).map(|j| format!("SIM{j:02}")).collect();
  Ok(PricePanel::new(dates, tickers, prices)?)
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  let panel = simulated_panel(args.assets, args.days, args.seed)?;
  let data = MarketData::new().with_panel("stocks", panel);

  let mut strategy: Box<dyn Strategy> = match args.strategy {
    StrategyKind::MinVariance => Box::new(MinimumVariance::new(MinVarianceConfig {
      lookback: args.lookback,
      allow_short: args.allow_short,
      ..MinVarianceConfig::default()
    })?),
    StrategyKind::EqualWeight => Box::new(EqualWeight::default()),
    StrategyKind::InverseVol => Box::new(InverseVolatility::new("stocks", args.lookback)?),
  };

  let mut acc = Accumulator::new();
  let mut start = args.lookback;
  if let Some(dir) = &args.out {
    if dir.join(rebalance_rs::backtest::persistence::RETURNS_FILE).exists() {
      acc = load(dir).with_context(|| format!("failed to load checkpoint from {dir:?}"))?;
      let panel = data.panel("stocks")?;
      start = resume_index(panel, &acc).context("checkpoint does not match the price panel")?;
      info!(start, recorded = acc.len(), "resuming from checkpoint");
    }
  }

  let driver = SimulationDriver::new(DriverConfig {
    checkpoint_dir: args.out.clone(),
    ..DriverConfig::default()
  });
  let steps = driver.run(&mut strategy, &data, start..args.days, args.size, &mut acc)?;

  let returns = acc.returns().to_frame()?;
  info!(steps, total = acc.len(), "backtest complete");
  println!("{:?}", returns.tail(Some(5)));
  Ok(())
}
