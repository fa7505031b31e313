//! # Return Accumulator
//!
//! $$
//! R = \big((d_{t_0+1}, r_{t_0+1}), \dots, (d_{t_0+n}, r_{t_0+n})\big),\quad
//! H = \bigcup_{s} W_s
//! $$
//!
//! Running realized returns and the audit trail of every accepted allocation.
//! Both series are append-only and strictly ordered by date.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use polars::prelude::PolarsResult;

use super::error::BacktestError;
use super::frame::returns_frame;
use super::frame::weights_frame;
use super::weights::WeightRow;
use super::weights::WeightTable;

/// Realized portfolio returns keyed by realization date.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReturnSeries {
  entries: Vec<(NaiveDate, f64)>,
}

impl ReturnSeries {
  pub fn entries(&self) -> &[(NaiveDate, f64)] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn last_date(&self) -> Option<NaiveDate> {
    self.entries.last().map(|(d, _)| *d)
  }

  pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
    self.entries.iter().map(|(d, _)| *d)
  }

  pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
    self.entries.iter().map(|(_, v)| *v)
  }

  /// Return realized on `date`.
  pub fn get(&self, date: NaiveDate) -> Option<f64> {
    self
      .entries
      .binary_search_by_key(&date, |(d, _)| *d)
      .ok()
      .map(|i| self.entries[i].1)
  }

  pub fn to_frame(&self) -> PolarsResult<DataFrame> {
    returns_frame(&self.entries)
  }

  fn check_next(&self, date: NaiveDate) -> Result<(), BacktestError> {
    check_after(self.last_date(), date)
  }
}

/// Row-concatenation of every allocation accepted so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoricalWeights {
  rows: Vec<WeightRow>,
  dates: BTreeSet<NaiveDate>,
}

impl HistoricalWeights {
  pub fn rows(&self) -> &[WeightRow] {
    &self.rows
  }

  /// Number of rows across all dates.
  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Rebalancing dates in chronological order.
  pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
    self.dates.iter().copied()
  }

  pub fn contains_date(&self, date: NaiveDate) -> bool {
    self.dates.contains(&date)
  }

  pub fn last_date(&self) -> Option<NaiveDate> {
    self.dates.last().copied()
  }

  /// The allocation recorded for `date`.
  pub fn at(&self, date: NaiveDate) -> Option<WeightTable> {
    if !self.contains_date(date) {
      return None;
    }
    Some(WeightTable::new(
      self
        .rows
        .iter()
        .filter(|r| r.date == date)
        .cloned()
        .collect(),
    ))
  }

  pub fn to_frame(&self) -> PolarsResult<DataFrame> {
    weights_frame(&self.rows)
  }

  /// Date the table would be recorded under, after checking it can be.
  /// `None` for an empty table.
  fn check_next(&self, table: &WeightTable) -> Result<Option<NaiveDate>, BacktestError> {
    let Some(date) = table.date() else {
      return Ok(None);
    };
    if let Some(row) = table.iter().find(|r| r.date != date) {
      return Err(BacktestError::InvalidWeights {
        date,
        reason: format!("row for {} is dated {}", row.ticker, row.date),
      });
    }
    check_after(self.last_date(), date)?;
    Ok(Some(date))
  }
}

fn check_after(last: Option<NaiveDate>, date: NaiveDate) -> Result<(), BacktestError> {
  match last {
    Some(last) if last == date => Err(BacktestError::DuplicateDate(date)),
    Some(last) if last > date => Err(BacktestError::OutOfOrder { date, last }),
    _ => Ok(()),
  }
}

/// Owned simulation state threaded through
/// [`SimulationDriver::step`](super::driver::SimulationDriver::step).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Accumulator {
  returns: ReturnSeries,
  weights: HistoricalWeights,
}

impl Accumulator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a single-date allocation to the weights history. An empty table
  /// records nothing.
  pub fn append_weights(&mut self, table: WeightTable) -> Result<(), BacktestError> {
    if let Some(date) = self.weights.check_next(&table)? {
      self.weights.dates.insert(date);
      self.weights.rows.extend(table.into_rows());
    }
    Ok(())
  }

  /// Append one realized return.
  pub fn append_return(&mut self, date: NaiveDate, value: f64) -> Result<(), BacktestError> {
    self.returns.check_next(date)?;
    self.returns.entries.push((date, value));
    Ok(())
  }

  /// Append the allocation and the return it realized, or neither.
  pub fn record_step(
    &mut self,
    table: WeightTable,
    date: NaiveDate,
    value: f64,
  ) -> Result<(), BacktestError> {
    self.weights.check_next(&table)?;
    self.returns.check_next(date)?;
    self.append_weights(table)?;
    self.append_return(date, value)
  }

  /// Current state, for checkpointing or reporting.
  pub fn snapshot(&self) -> (&ReturnSeries, &HistoricalWeights) {
    (&self.returns, &self.weights)
  }

  pub fn returns(&self) -> &ReturnSeries {
    &self.returns
  }

  pub fn weights(&self) -> &HistoricalWeights {
    &self.weights
  }

  pub fn last_return_date(&self) -> Option<NaiveDate> {
    self.returns.last_date()
  }

  /// Number of recorded returns.
  pub fn len(&self) -> usize {
    self.returns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.returns.is_empty() && self.weights.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
  }

  #[test]
  fn appends_keep_chronological_order() {
    let mut acc = Accumulator::new();
    acc
      .record_step(WeightTable::from_weights(d(1), [("AAA", 1.0)]), d(2), 0.01)
      .unwrap();
    acc
      .record_step(WeightTable::from_weights(d(2), [("AAA", 0.4), ("BBB", 0.6)]), d(3), -0.02)
      .unwrap();

    let (returns, weights) = acc.snapshot();
    assert_eq!(returns.entries(), &[(d(2), 0.01), (d(3), -0.02)]);
    assert_eq!(weights.len(), 3);
    assert_eq!(weights.dates().collect::<Vec<_>>(), vec![d(1), d(2)]);
    assert_eq!(weights.at(d(2)).unwrap().weight("BBB"), Some(0.6));
    assert_eq!(returns.get(d(3)), Some(-0.02));
    assert_eq!(acc.last_return_date(), Some(d(3)));
  }

  #[test]
  fn duplicate_return_date_is_rejected() {
    let mut acc = Accumulator::new();
    acc.append_return(d(2), 0.01).unwrap();
    assert!(matches!(
      acc.append_return(d(2), 0.03),
      Err(BacktestError::DuplicateDate(date)) if date == d(2)
    ));
    assert!(matches!(
      acc.append_return(d(1), 0.03),
      Err(BacktestError::OutOfOrder { .. })
    ));
    assert_eq!(acc.len(), 1);
  }

  #[test]
  fn duplicate_weights_date_is_rejected() {
    let mut acc = Accumulator::new();
    acc
      .append_weights(WeightTable::from_weights(d(1), [("AAA", 1.0)]))
      .unwrap();
    assert!(matches!(
      acc.append_weights(WeightTable::from_weights(d(1), [("BBB", 1.0)])),
      Err(BacktestError::DuplicateDate(_))
    ));
    assert_eq!(acc.weights().len(), 1);
  }

  #[test]
  fn mixed_date_table_is_rejected() {
    let mut acc = Accumulator::new();
    let mut rows = WeightTable::from_weights(d(1), [("AAA", 0.5), ("BBB", 0.5)])
      .rows()
      .to_vec();
    rows[1].date = d(2);
    assert!(matches!(
      acc.append_weights(WeightTable::new(rows)),
      Err(BacktestError::InvalidWeights { .. })
    ));
    assert!(acc.is_empty());
  }

  #[test]
  fn record_step_is_all_or_nothing() {
    let mut acc = Accumulator::new();
    acc.append_return(d(5), 0.0).unwrap();

    // weights would be accepted but the return date collides
    let err = acc
      .record_step(WeightTable::from_weights(d(4), [("AAA", 1.0)]), d(5), 0.1)
      .unwrap_err();
    assert!(matches!(err, BacktestError::DuplicateDate(_)));
    assert!(acc.weights().is_empty());
    assert_eq!(acc.len(), 1);
  }
}
