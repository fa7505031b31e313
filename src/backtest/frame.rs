//! # Columnar Frames
//!
//! $$
//! \text{rows} \leftrightarrow \text{DataFrame}
//! $$
//!
//! Conversions between accumulator rows and polars frames. Dates are stored as
//! polars `Date` (days since the Unix epoch).

use chrono::Datelike;
use chrono::NaiveDate;
use polars::prelude::*;

use super::weights::WeightRow;

pub const DATE_COL: &str = "date";
pub const TICKER_COL: &str = "ticker";
pub const WEIGHT_COL: &str = "weight";
pub const RETURN_COL: &str = "portfolio_return";

/// 1970-01-01 counted from 0001-01-01 (day 1).
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

pub(crate) fn date_to_days(date: NaiveDate) -> i32 {
  date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

pub(crate) fn days_to_date(days: i32) -> Option<NaiveDate> {
  NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_FROM_CE)?)
}

fn cast_dates(frame: DataFrame) -> PolarsResult<DataFrame> {
  frame
    .lazy()
    .with_column(col(DATE_COL).cast(DataType::Date))
    .collect()
}

/// `(date, ticker, weight)` frame.
pub fn weights_frame(rows: &[WeightRow]) -> PolarsResult<DataFrame> {
  let days: Vec<i32> = rows.iter().map(|r| date_to_days(r.date)).collect();
  let tickers: Vec<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
  let weights: Vec<f64> = rows.iter().map(|r| r.weight).collect();

  cast_dates(df!(
    DATE_COL => days,
    TICKER_COL => tickers,
    WEIGHT_COL => weights,
  )?)
}

/// `(date, portfolio_return)` frame.
pub fn returns_frame(entries: &[(NaiveDate, f64)]) -> PolarsResult<DataFrame> {
  let days: Vec<i32> = entries.iter().map(|(d, _)| date_to_days(*d)).collect();
  let values: Vec<f64> = entries.iter().map(|(_, v)| *v).collect();

  cast_dates(df!(
    DATE_COL => days,
    RETURN_COL => values,
  )?)
}

/// Read a `Date` column back into chrono dates. Nulls are reported as `None`.
pub(crate) fn read_dates(series: &Series) -> PolarsResult<Vec<Option<NaiveDate>>> {
  let days = series.cast(&DataType::Int32)?;
  Ok(days.i32()?.into_iter().map(|d| d.and_then(days_to_date)).collect())
}

pub(crate) fn read_f64(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
  let values = series.cast(&DataType::Float64)?;
  Ok(values.f64()?.into_iter().collect())
}

pub(crate) fn read_strings(series: &Series) -> PolarsResult<Vec<Option<String>>> {
  Ok(
    series
      .str()?
      .into_iter()
      .map(|s| s.map(str::to_string))
      .collect(),
  )
}

/// Decode a `(date, ticker, weight)` frame. The frame is expected to have
/// passed [`check_frame_format`](super::validation::check_frame_format).
pub(crate) fn weight_rows(frame: &DataFrame) -> PolarsResult<Vec<WeightRow>> {
  let dates = read_dates(frame.column(DATE_COL)?)?;
  let tickers = read_strings(frame.column(TICKER_COL)?)?;
  let weights = read_f64(frame.column(WEIGHT_COL)?)?;

  let mut rows = Vec::with_capacity(frame.height());
  for ((date, ticker), weight) in dates.into_iter().zip(tickers).zip(weights) {
    match (date, ticker, weight) {
      (Some(date), Some(ticker), Some(weight)) => rows.push(WeightRow {
        date,
        ticker,
        weight,
      }),
      _ => {
        return Err(PolarsError::ComputeError(
          "null value in weights frame".into(),
        ));
      }
    }
  }
  Ok(rows)
}
