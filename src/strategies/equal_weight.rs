//! # Equal Weight
//!
//! $$
//! w_k = \frac{1}{|K_t|}
//! $$
//!

use crate::backtest::BacktestError;
use crate::backtest::MarketView;
use crate::backtest::Strategy;
use crate::backtest::WeightTable;
use crate::backtest::strategy::decision_point;
use crate::backtest::strategy::tradable_tickers;

/// Splits the portfolio evenly across the first `size` tradable tickers in
/// lexicographic order.
#[derive(Clone, Debug)]
pub struct EqualWeight {
  dataset: String,
}

impl EqualWeight {
  pub fn new(dataset: impl Into<String>) -> Self {
    Self {
      dataset: dataset.into(),
    }
  }
}

impl Default for EqualWeight {
  fn default() -> Self {
    Self::new("stocks")
  }
}

impl Strategy for EqualWeight {
  fn name(&self) -> &str {
    "equal-weight"
  }

  fn calculate_next_weights(
    &mut self,
    data: &MarketView<'_>,
    t: usize,
    size: usize,
  ) -> Result<WeightTable, BacktestError> {
    let (panel, date) = decision_point(data, &self.dataset, t)?;
    let mut tickers = tradable_tickers(panel, t);
    if tickers.is_empty() {
      return Err(BacktestError::InsufficientData {
        needed: 1,
        available: 0,
      });
    }
    tickers.truncate(size);

    let w = 1.0 / tickers.len().max(1) as f64;
    Ok(WeightTable::from_weights(
      date,
      tickers.into_iter().map(|ticker| (ticker, w)),
    ))
  }
}
