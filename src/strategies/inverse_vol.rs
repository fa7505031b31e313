//! # Inverse Volatility
//!
//! $$
//! w_k \propto \frac{1}{\hat\sigma_k}
//! $$
//!

use super::check_lookback;
use super::low_volatility_window;
use crate::backtest::BacktestError;
use crate::backtest::MarketView;
use crate::backtest::Strategy;
use crate::backtest::WeightTable;
use crate::backtest::strategy::decision_point;
use crate::portfolio::optimize_inverse_vol;
use crate::portfolio::sample_covariance;

/// Volatility-scaled allocation over the `size` calmest tickers.
#[derive(Clone, Debug)]
pub struct InverseVolatility {
  dataset: String,
  lookback: usize,
}

impl InverseVolatility {
  /// Fails with [`BacktestError::InvalidConfig`] when `lookback < 2`.
  pub fn new(dataset: impl Into<String>, lookback: usize) -> Result<Self, BacktestError> {
    check_lookback(lookback)?;
    Ok(Self {
      dataset: dataset.into(),
      lookback,
    })
  }

  pub fn lookback(&self) -> usize {
    self.lookback
  }
}

impl Strategy for InverseVolatility {
  fn name(&self) -> &str {
    "inverse-volatility"
  }

  fn calculate_next_weights(
    &mut self,
    data: &MarketView<'_>,
    t: usize,
    size: usize,
  ) -> Result<WeightTable, BacktestError> {
    let (panel, date) = decision_point(data, &self.dataset, t)?;
    let window = low_volatility_window(panel, t, self.lookback, size)?;
    let result = optimize_inverse_vol(&sample_covariance(&window.returns));

    Ok(WeightTable::from_weights(
      date,
      window.tickers.into_iter().zip(result.weights),
    ))
  }
}
