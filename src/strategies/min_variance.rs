//! # Minimum Variance
//!
//! $$
//! \mathbf{w}^\* = \arg\min_{\mathbf{1}^\top\mathbf{w}=1} \mathbf{w}^\top \hat\Sigma_t \mathbf{w},
//! \qquad \hat\Sigma_t = \widehat{\operatorname{Cov}}(r_{t-L+1..t}) + \lambda I
//! $$
//!
//! Rebalances into the minimum-variance portfolio of the `size` calmest
//! tickers, estimated over a trailing window of simple returns.

use chrono::NaiveDate;
use tracing::debug;
use tracing::warn;

use super::check_lookback;
use super::low_volatility_window;
use crate::backtest::BacktestError;
use crate::backtest::MarketView;
use crate::backtest::Strategy;
use crate::backtest::WeightTable;
use crate::backtest::strategy::decision_point;
use crate::portfolio::PortfolioResult;
use crate::portfolio::min_variance_closed_form;
use crate::portfolio::optimize_min_variance;
use crate::portfolio::sample_covariance;

/// Runtime configuration for [`MinimumVariance`].
#[derive(Clone, Debug)]
pub struct MinVarianceConfig {
  /// Dataset holding the traded prices.
  pub dataset: String,
  /// Number of trailing returns in the estimation window.
  pub lookback: usize,
  /// Allow negative weights (closed-form solve) instead of the long-only simplex.
  pub allow_short: bool,
  /// Diagonal loading added to the sample covariance.
  pub ridge: f64,
}

impl Default for MinVarianceConfig {
  fn default() -> Self {
    Self {
      dataset: "stocks".to_string(),
      lookback: 60,
      allow_short: false,
      ridge: 1e-8,
    }
  }
}

/// Covariance used for the most recent decision.
#[derive(Clone, Debug)]
pub struct CovarianceEstimate {
  pub date: NaiveDate,
  pub tickers: Vec<String>,
  pub covariance: Vec<Vec<f64>>,
  /// Model volatility of the chosen portfolio.
  pub volatility: f64,
}

#[derive(Clone, Debug, Default)]
pub struct MinimumVariance {
  config: MinVarianceConfig,
  last_estimate: Option<CovarianceEstimate>,
}

impl MinimumVariance {
  /// Fails with [`BacktestError::InvalidConfig`] when the lookback is below
  /// two returns or the ridge is negative.
  pub fn new(config: MinVarianceConfig) -> Result<Self, BacktestError> {
    check_lookback(config.lookback)?;
    if !(config.ridge >= 0.0 && config.ridge.is_finite()) {
      return Err(BacktestError::InvalidConfig(format!(
        "ridge must be finite and non-negative, got {}",
        config.ridge
      )));
    }
    Ok(Self {
      config,
      last_estimate: None,
    })
  }

  pub fn config(&self) -> &MinVarianceConfig {
    &self.config
  }

  /// Estimate behind the last produced allocation.
  pub fn last_estimate(&self) -> Option<&CovarianceEstimate> {
    self.last_estimate.as_ref()
  }

  fn solve(&self, cov: &[Vec<f64>]) -> PortfolioResult {
    if !self.config.allow_short {
      return optimize_min_variance(cov);
    }
    min_variance_closed_form(cov).unwrap_or_else(|| {
      warn!("covariance not positive definite, falling back to long-only solve");
      optimize_min_variance(cov)
    })
  }
}

impl Strategy for MinimumVariance {
  fn name(&self) -> &str {
    "minimum-variance"
  }

  fn calculate_next_weights(
    &mut self,
    data: &MarketView<'_>,
    t: usize,
    size: usize,
  ) -> Result<WeightTable, BacktestError> {
    let (panel, date) = decision_point(data, &self.config.dataset, t)?;
    let window = low_volatility_window(panel, t, self.config.lookback, size)?;

    let mut cov = sample_covariance(&window.returns);
    for (i, row) in cov.iter_mut().enumerate() {
      row[i] += self.config.ridge;
    }
    let result = self.solve(&cov);
    debug!(
      date = %date,
      assets = window.tickers.len(),
      volatility = result.volatility,
      "minimum-variance weights"
    );

    let table = WeightTable::from_weights(
      date,
      window.tickers.iter().cloned().zip(result.weights.iter().copied()),
    );
    self.last_estimate = Some(CovarianceEstimate {
      date,
      tickers: window.tickers,
      covariance: cov,
      volatility: result.volatility,
    });
    Ok(table)
  }
}
