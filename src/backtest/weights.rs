//! # Weight Tables
//!
//! $$
//! W_t = \{(d_t, k, w_k)\}_{k \in K_t},\quad |K_t| \le \text{size}
//! $$
//!
//! A portfolio allocation at one rebalancing date.

use std::fmt;

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use polars::prelude::PolarsResult;

use super::error::BacktestError;
use super::frame::weights_frame;
use super::validation::validate_frame;

/// One `(date, ticker, weight)` record.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightRow {
  pub date: NaiveDate,
  pub ticker: String,
  pub weight: f64,
}

/// Allocation produced by a strategy for a single date. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightTable {
  rows: Vec<WeightRow>,
}

impl WeightTable {
  /// Wrap raw rows. No validation happens here; see
  /// [`check_return`](super::validation::check_return).
  pub fn new(rows: Vec<WeightRow>) -> Self {
    Self { rows }
  }

  /// Build a table where every row carries `date`.
  pub fn from_weights<I, S>(date: NaiveDate, weights: I) -> Self
  where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
  {
    Self {
      rows: weights
        .into_iter()
        .map(|(ticker, weight)| WeightRow {
          date,
          ticker: ticker.into(),
          weight,
        })
        .collect(),
    }
  }

  pub fn rows(&self) -> &[WeightRow] {
    &self.rows
  }

  pub fn iter(&self) -> std::slice::Iter<'_, WeightRow> {
    self.rows.iter()
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Date of the first row. Only meaningful for a validated table.
  pub fn date(&self) -> Option<NaiveDate> {
    self.rows.first().map(|r| r.date)
  }

  /// Weight of `ticker`, if present.
  pub fn weight(&self, ticker: &str) -> Option<f64> {
    self
      .rows
      .iter()
      .find(|r| r.ticker == ticker)
      .map(|r| r.weight)
  }

  /// Sum of all weights.
  pub fn total(&self) -> f64 {
    self.rows.iter().map(|r| r.weight).sum()
  }

  /// Columnar `(date, ticker, weight)` view of the table.
  pub fn to_frame(&self) -> PolarsResult<DataFrame> {
    weights_frame(&self.rows)
  }

  /// Decode a columnar allocation for `date`, rejecting it unless it has
  /// exactly the `date`, `ticker` and `weight` columns and valid rows.
  pub fn from_frame(frame: &DataFrame, date: NaiveDate) -> Result<Self, BacktestError> {
    validate_frame(frame, date).map_err(|reason| BacktestError::InvalidWeights { date, reason })
  }

  pub(crate) fn into_rows(self) -> Vec<WeightRow> {
    self.rows
  }
}

impl<'a> IntoIterator for &'a WeightTable {
  type Item = &'a WeightRow;
  type IntoIter = std::slice::Iter<'a, WeightRow>;

  fn into_iter(self) -> Self::IntoIter {
    self.rows.iter()
  }
}

impl fmt::Display for WeightTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    for (i, row) in self.rows.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "({}, {}, {})", row.date, row.ticker, row.weight)?;
    }
    write!(f, "]")
  }
}
