//! # Simulation Driver
//!
//! $$
//! r_{t+1} = \sum_{k} w_{t,k}\left(\frac{P_{t+1,k}}{P_{t,k}} - 1\right)
//! $$
//!
//! Advances a backtest by one rebalancing step. The strategy decides from
//! rows up to `t`; the driver alone reads row `t + 1` to realize the return.

use std::ops::Range;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::accumulator::Accumulator;
use super::error::BacktestError;
use super::error::PersistenceError;
use super::panel::MarketData;
use super::panel::PanelView;
use super::persistence::persist;
use super::strategy::Strategy;
use super::validation::validate;
use super::weights::WeightTable;

/// Runtime configuration for [`SimulationDriver`].
#[derive(Clone, Debug)]
pub struct DriverConfig {
  /// Dataset whose prices realize the portfolio returns.
  pub price_dataset: String,
  /// Directory receiving a checkpoint after every step. `None` disables it.
  pub checkpoint_dir: Option<PathBuf>,
}

impl Default for DriverConfig {
  fn default() -> Self {
    Self {
      price_dataset: "stocks".to_string(),
      checkpoint_dir: None,
    }
  }
}

/// Outcome of one successful step.
#[derive(Debug)]
pub struct StepReport {
  /// Date the return was realized on (row `t + 1`).
  pub date: NaiveDate,
  pub portfolio_return: f64,
  /// Checkpoint result; `Ok` when checkpointing is disabled. A failure here
  /// leaves the accumulator valid.
  pub persistence: Result<(), PersistenceError>,
}

/// Drives any [`Strategy`] over a price history.
#[derive(Clone, Debug, Default)]
pub struct SimulationDriver {
  config: DriverConfig,
}

impl SimulationDriver {
  pub fn new(config: DriverConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &DriverConfig {
    &self.config
  }

  /// Run one step at row `t`, appending the allocation and its realized
  /// return to `accumulator`. On `Err` the accumulator is untouched.
  pub fn step<S: Strategy + ?Sized>(
    &self,
    strategy: &mut S,
    data: &MarketData,
    t: usize,
    size: usize,
    accumulator: &mut Accumulator,
  ) -> Result<StepReport, BacktestError> {
    let panel = data.panel(&self.config.price_dataset)?.view();
    let next = t.checked_add(1).and_then(|n| panel.date(n));
    let (Some(date_t), Some(date_next)) = (panel.date(t), next) else {
      return Err(BacktestError::OutOfRange {
        t,
        len: panel.len(),
      });
    };

    let history = data.history_until(date_t);
    let weights = strategy.calculate_next_weights(&history, t, size)?;

    if !strategy.check_return(&weights, date_t) {
      let reason = validate(&weights, date_t)
        .err()
        .unwrap_or_else(|| format!("rejected by {}", strategy.name()));
      error!(
        strategy = strategy.name(),
        date = %date_t,
        table = %weights,
        %reason,
        "invalid weights"
      );
      return Err(BacktestError::InvalidWeights {
        date: date_t,
        reason,
      });
    }
    if weights.len() > size {
      let reason = format!("{} tickers exceed requested size {size}", weights.len());
      error!(
        strategy = strategy.name(),
        date = %date_t,
        table = %weights,
        %reason,
        "invalid weights"
      );
      return Err(BacktestError::InvalidWeights {
        date: date_t,
        reason,
      });
    }

    let portfolio_return = realized_return(&panel, &weights, t)?;
    accumulator.record_step(weights, date_next, portfolio_return)?;
    debug!(
      strategy = strategy.name(),
      t,
      date = %date_next,
      portfolio_return,
      "step recorded"
    );

    let persistence = match &self.config.checkpoint_dir {
      Some(dir) => {
        let (returns, weights) = accumulator.snapshot();
        persist(dir, returns, weights)
      }
      None => Ok(()),
    };
    if let Err(e) = &persistence {
      warn!(date = %date_next, error = %e, "checkpoint failed");
    }

    Ok(StepReport {
      date: date_next,
      portfolio_return,
      persistence,
    })
  }

  /// Step through `range` until it is exhausted or the price history ends.
  /// Checkpoint failures are logged and skipped; any other error stops the
  /// run. Returns the number of completed steps.
  pub fn run<S: Strategy + ?Sized>(
    &self,
    strategy: &mut S,
    data: &MarketData,
    range: Range<usize>,
    size: usize,
    accumulator: &mut Accumulator,
  ) -> Result<usize, BacktestError> {
    info!(
      strategy = strategy.name(),
      start = range.start,
      end = range.end,
      size,
      "simulation started"
    );

    let mut completed = 0;
    for t in range {
      match self.step(strategy, data, t, size, accumulator) {
        Ok(_) => completed += 1,
        Err(BacktestError::OutOfRange { t, len }) => {
          info!(t, len, "price history exhausted");
          break;
        }
        Err(e) => {
          error!(strategy = strategy.name(), t, error = %e, "simulation aborted");
          return Err(e);
        }
      }
    }

    info!(strategy = strategy.name(), completed, "simulation finished");
    Ok(completed)
  }
}

/// Weighted simple return from row `t` to row `t + 1`. A weighted ticker
/// without a usable price at either row is an error, never a zero.
pub fn realized_return(
  panel: &PanelView<'_>,
  weights: &WeightTable,
  t: usize,
) -> Result<f64, BacktestError> {
  let mut total = 0.0;
  for row in weights {
    let price_at = |i: usize| {
      panel.price(i, &row.ticker).ok_or_else(|| BacktestError::MissingPrice {
        ticker: row.ticker.clone(),
        date: panel.date(i).unwrap_or(row.date),
      })
    };
    let p0 = price_at(t)?;
    let p1 = price_at(t + 1)?;
    total += row.weight * (p1 / p0 - 1.0);
  }
  Ok(total)
}
