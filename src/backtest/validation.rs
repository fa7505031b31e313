//! # Weight Validation
//!
//! $$
//! \text{valid}(W, d) \iff W \ne \emptyset \wedge \{d_k\} = \{d\} \wedge
//! \text{tickers unique} \wedge w_k \in \mathbb R
//! $$
//!
//! Structural checks applied to every allocation before the driver uses it.
//! The checks never panic; a `false` result is meant to halt the simulation.

use std::collections::HashSet;

use chrono::NaiveDate;
use polars::prelude::*;

use super::frame::DATE_COL;
use super::frame::TICKER_COL;
use super::frame::WEIGHT_COL;
use super::frame::weight_rows;
use super::weights::WeightTable;

const REQUIRED_COLUMNS: [&str; 3] = [DATE_COL, TICKER_COL, WEIGHT_COL];

/// Explain why `table` is not a valid allocation for `date`.
pub fn validate(table: &WeightTable, date: NaiveDate) -> Result<(), String> {
  if table.is_empty() {
    return Err("table is empty".to_string());
  }

  let mut seen = HashSet::with_capacity(table.len());
  for row in table {
    if row.date != date {
      return Err(format!("row for {} is dated {}", row.ticker, row.date));
    }
    if !seen.insert(row.ticker.as_str()) {
      return Err(format!("duplicate ticker {}", row.ticker));
    }
    if !row.weight.is_finite() {
      return Err(format!("non-finite weight {} for {}", row.weight, row.ticker));
    }
  }

  Ok(())
}

/// `true` when `table` is a structurally valid allocation for `date`.
pub fn check_return(table: &WeightTable, date: NaiveDate) -> bool {
  validate(table, date).is_ok()
}

/// Column-level format of a columnar weight table: exactly `date` (Date),
/// `ticker` (String) and `weight` (numeric), without nulls.
pub fn check_frame_format(frame: &DataFrame) -> Result<(), String> {
  if frame.width() != REQUIRED_COLUMNS.len() {
    return Err(format!(
      "expected columns {:?}, found {} columns",
      REQUIRED_COLUMNS,
      frame.width()
    ));
  }

  for name in REQUIRED_COLUMNS {
    let series = frame
      .column(name)
      .map_err(|_| format!("missing column '{name}'"))?;
    if series.null_count() > 0 {
      return Err(format!("column '{name}' contains nulls"));
    }
    let dtype = series.dtype();
    let ok = match name {
      DATE_COL => dtype == &DataType::Date,
      TICKER_COL => dtype == &DataType::String,
      _ => dtype.is_numeric(),
    };
    if !ok {
      return Err(format!("column '{name}' has unexpected type {dtype}"));
    }
  }

  Ok(())
}

/// Validate a columnar weight table against `date`, format first and then the
/// row-level rules of [`check_return`].
pub fn validate_frame(frame: &DataFrame, date: NaiveDate) -> Result<WeightTable, String> {
  check_frame_format(frame)?;
  let rows = weight_rows(frame).map_err(|e| e.to_string())?;
  let table = WeightTable::new(rows);
  validate(&table, date)?;
  Ok(table)
}

/// `true` when `frame` is a valid columnar allocation for `date`.
pub fn check_frame(frame: &DataFrame, date: NaiveDate) -> bool {
  validate_frame(frame, date).is_ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backtest::frame::weights_frame;

  fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
  }

  fn valid_table() -> WeightTable {
    WeightTable::from_weights(day(), [("AAA", 0.5), ("BBB", -0.2), ("CCC", 0.7)])
  }

  #[test]
  fn accepts_well_formed_table() {
    assert!(check_return(&valid_table(), day()));
  }

  #[test]
  fn weights_need_not_sum_to_one_or_be_positive() {
    let table = WeightTable::from_weights(day(), [("AAA", -3.0), ("BBB", 0.0)]);
    assert!(check_return(&table, day()));
  }

  #[test]
  fn rejects_empty_table() {
    assert!(!check_return(&WeightTable::default(), day()));
  }

  #[test]
  fn rejects_wrong_or_mixed_dates() {
    let other = day().succ_opt().unwrap();
    assert!(!check_return(&valid_table(), other));

    let mut rows = valid_table().rows().to_vec();
    rows[1].date = other;
    assert!(!check_return(&WeightTable::new(rows), day()));
  }

  #[test]
  fn rejects_duplicate_ticker() {
    let table = WeightTable::from_weights(day(), [("AAA", 0.5), ("AAA", 0.5)]);
    assert!(!check_return(&table, day()));
  }

  #[test]
  fn rejects_non_finite_weights() {
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
      let table = WeightTable::from_weights(day(), [("AAA", 0.5), ("BBB", bad)]);
      assert!(!check_return(&table, day()));
    }
  }

  #[test]
  fn frame_roundtrip_is_valid() {
    let frame = weights_frame(valid_table().rows()).unwrap();
    assert!(check_frame(&frame, day()));
    assert_eq!(validate_frame(&frame, day()).unwrap(), valid_table());
  }

  #[test]
  fn frame_missing_column_is_rejected() {
    let frame = weights_frame(valid_table().rows())
      .unwrap()
      .drop(WEIGHT_COL)
      .unwrap();
    assert!(!check_frame(&frame, day()));
  }

  #[test]
  fn frame_extra_column_is_rejected() {
    let mut frame = weights_frame(valid_table().rows()).unwrap();
    frame
      .with_column(Series::new("note".into(), &["a", "b", "c"]))
      .unwrap();
    assert!(!check_frame(&frame, day()));
  }

  #[test]
  fn frame_with_text_weights_is_rejected() {
    let mut frame = weights_frame(valid_table().rows()).unwrap();
    frame
      .replace(WEIGHT_COL, Series::new(WEIGHT_COL.into(), &["x", "y", "z"]))
      .unwrap();
    assert!(!check_frame(&frame, day()));
  }
}
