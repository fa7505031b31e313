//! # Strategy Contract
//!
//! $$
//! \mathcal S : (\mathcal F_t, t, n) \mapsto W_t
//! $$
//!
//! Every allocation rule plugs into the driver through [`Strategy`]. The data
//! handed to a strategy is already cut at the decision date, so a strategy can
//! only ever see the trailing window.

use chrono::NaiveDate;

use super::error::BacktestError;
use super::panel::MarketView;
use super::panel::PanelView;
use super::validation;
use super::weights::WeightTable;

/// Allocation rule driven one step at a time by
/// [`SimulationDriver`](super::driver::SimulationDriver).
///
/// Implementations must pick tickers with a deterministic policy so that
/// identical inputs yield identical tables.
pub trait Strategy {
  /// Name used in logs.
  fn name(&self) -> &str;

  /// Target weights for the decision at row `t`, holding at most `size`
  /// tickers and dated at row `t`'s date.
  ///
  /// `data` contains rows dated on or before that date only. Return
  /// [`BacktestError::InsufficientData`] when the window is too short.
  fn calculate_next_weights(
    &mut self,
    data: &MarketView<'_>,
    t: usize,
    size: usize,
  ) -> Result<WeightTable, BacktestError>;

  /// Structural self-check of a produced table.
  fn check_return(&self, table: &WeightTable, date: NaiveDate) -> bool {
    validation::check_return(table, date)
  }
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
  fn name(&self) -> &str {
    (**self).name()
  }

  fn calculate_next_weights(
    &mut self,
    data: &MarketView<'_>,
    t: usize,
    size: usize,
  ) -> Result<WeightTable, BacktestError> {
    (**self).calculate_next_weights(data, t, size)
  }

  fn check_return(&self, table: &WeightTable, date: NaiveDate) -> bool {
    (**self).check_return(table, date)
  }
}

/// Resolve the panel a strategy trades and the date of row `t`.
pub fn decision_point<'a>(
  data: &MarketView<'a>,
  dataset: &str,
  t: usize,
) -> Result<(PanelView<'a>, NaiveDate), BacktestError> {
  let panel = data.panel(dataset)?;
  let date = panel.date(t).ok_or(BacktestError::InsufficientData {
    needed: t + 1,
    available: panel.len(),
  })?;
  Ok((panel, date))
}

/// Tickers with a usable price at row `t`, in ticker order.
pub fn tradable_tickers(panel: PanelView<'_>, t: usize) -> Vec<String> {
  let mut tickers: Vec<String> = panel
    .tickers()
    .iter()
    .filter(|ticker| panel.price(t, ticker).is_some())
    .cloned()
    .collect();
  tickers.sort();
  tickers
}
