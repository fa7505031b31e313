//! # Checkpoint Persistence
//!
//! $$
//! \text{persist}(R_{\le t}, H_{\le t}) \;\Rightarrow\;
//! \texttt{returns.parquet},\ \texttt{weights.parquet}
//! $$
//!
//! Full-snapshot parquet checkpoints of an [`Accumulator`]. Every call rewrites
//! both files; a file is first written next to its target and then renamed,
//! so readers never observe a partially written file.
//!
//! Weights are renamed into place before returns. An interruption between the
//! two renames therefore leaves at most one trailing allocation without its
//! return, which [`load`] discards; any other disagreement between the files
//! is reported as [`PersistenceError::Format`].

use std::fs;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;
use tracing::warn;

use super::accumulator::Accumulator;
use super::accumulator::HistoricalWeights;
use super::accumulator::ReturnSeries;
use super::error::PersistenceError;
use super::frame::DATE_COL;
use super::frame::RETURN_COL;
use super::frame::read_dates;
use super::frame::read_f64;
use super::frame::weight_rows;
use super::panel::PricePanel;
use super::validation::check_frame_format;
use super::validation::validate;
use super::weights::WeightRow;
use super::weights::WeightTable;

pub const RETURNS_FILE: &str = "returns.parquet";
pub const WEIGHTS_FILE: &str = "weights.parquet";

/// Overwrite the checkpoint in `dir` with the full current snapshot.
pub fn persist(
  dir: &Path,
  returns: &ReturnSeries,
  weights: &HistoricalWeights,
) -> Result<(), PersistenceError> {
  fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;

  let mut returns_df = returns.to_frame()?;
  let mut weights_df = weights.to_frame()?;
  write_atomic(&dir.join(WEIGHTS_FILE), &mut weights_df)?;
  write_atomic(&dir.join(RETURNS_FILE), &mut returns_df)?;

  debug!(
    dir = %dir.display(),
    returns = returns.len(),
    weight_rows = weights.len(),
    "checkpoint written"
  );
  Ok(())
}

fn write_atomic(path: &Path, frame: &mut DataFrame) -> Result<(), PersistenceError> {
  let mut tmp = PathBuf::from(path);
  tmp.set_extension("parquet.tmp");

  let file = File::create(&tmp).map_err(|e| PersistenceError::io(&tmp, e))?;
  ParquetWriter::new(file).finish(frame)?;
  fs::rename(&tmp, path).map_err(|e| PersistenceError::io(path, e))?;
  Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, PersistenceError> {
  let file = File::open(path).map_err(|e| PersistenceError::io(path, e))?;
  Ok(ParquetReader::new(file).finish()?)
}

/// Rebuild an accumulator from the checkpoint in `dir`.
///
/// Every allocation must be a valid weight table for its own date and must be
/// followed by exactly one return dated after it. A single trailing allocation
/// without a return is an interrupted checkpoint and is dropped.
pub fn load(dir: &Path) -> Result<Accumulator, PersistenceError> {
  let returns_df = read_parquet(&dir.join(RETURNS_FILE))?;
  let weights_df = read_parquet(&dir.join(WEIGHTS_FILE))?;

  check_frame_format(&weights_df).map_err(PersistenceError::Format)?;
  let mut tables = split_by_date(weight_rows(&weights_df)?);
  let returns = read_returns(&returns_df)?;

  if tables.len() == returns.len() + 1 {
    if let Some(dropped) = tables.pop() {
      warn!(
        dir = %dir.display(),
        date = ?dropped.date(),
        "discarding allocation without a realized return"
      );
    }
  }
  if tables.len() != returns.len() {
    return Err(PersistenceError::Format(format!(
      "{} allocations but {} returns",
      tables.len(),
      returns.len()
    )));
  }

  let mut acc = Accumulator::new();
  for (table, (date, value)) in tables.into_iter().zip(returns) {
    let Some(decided) = table.date() else {
      return Err(PersistenceError::Format("empty allocation".to_string()));
    };
    validate(&table, decided)
      .map_err(|reason| PersistenceError::Format(format!("weights at {decided}: {reason}")))?;
    if decided >= date {
      return Err(PersistenceError::Format(format!(
        "return at {date} does not follow allocation at {decided}"
      )));
    }
    acc
      .record_step(table, date, value)
      .map_err(|e| PersistenceError::Format(e.to_string()))?;
  }

  debug!(dir = %dir.display(), returns = acc.len(), "checkpoint loaded");
  Ok(acc)
}

fn read_returns(frame: &DataFrame) -> Result<Vec<(NaiveDate, f64)>, PersistenceError> {
  let dates = read_dates(frame.column(DATE_COL)?)?;
  let values = read_f64(frame.column(RETURN_COL)?)?;
  dates
    .into_iter()
    .zip(values)
    .map(|pair| match pair {
      (Some(date), Some(value)) => Ok((date, value)),
      _ => Err(PersistenceError::Format(
        "null value in returns checkpoint".to_string(),
      )),
    })
    .collect()
}

/// Group consecutive rows sharing a date.
fn split_by_date(rows: Vec<WeightRow>) -> Vec<WeightTable> {
  let mut tables = Vec::new();
  let mut current: Vec<WeightRow> = Vec::new();
  for row in rows {
    if current.last().is_some_and(|last| last.date != row.date) {
      tables.push(WeightTable::new(std::mem::take(&mut current)));
    }
    current.push(row);
  }
  if !current.is_empty() {
    tables.push(WeightTable::new(current));
  }
  tables
}

/// Index `t` at which a resumed simulation continues: the row of the last
/// realized date. `None` when nothing was recorded or the date is not in
/// `panel`.
pub fn resume_index(panel: &PricePanel, acc: &Accumulator) -> Option<usize> {
  panel.index_of(acc.last_return_date()?)
}

#[cfg(test)]
mod tests {
  use ndarray::Array2;

  use super::*;
  use crate::backtest::frame::returns_frame;
use crate::backtest::frame::weights_frame;

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
  }

  fn sample() -> Accumulator {
    let mut acc = Accumulator::new();
    acc
      .record_step(WeightTable::from_weights(d(1), [("AAA", 0.5), ("BBB", 0.5)]), d(2), 0.01)
      .unwrap();
    acc
      .record_step(WeightTable::from_weights(d(2), [("AAA", 1.0)]), d(3), 0.02)
      .unwrap();
    acc
  }

  #[test]
  fn persist_then_load_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let acc = sample();
    let (returns, weights) = acc.snapshot();
    persist(dir.path(), returns, weights).unwrap();

    assert!(dir.path().join(RETURNS_FILE).exists());
    assert!(dir.path().join(WEIGHTS_FILE).exists());
    assert_eq!(load(dir.path()).unwrap(), acc);
  }

  #[test]
  fn persist_overwrites_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut acc = Accumulator::new();
    acc
      .record_step(WeightTable::from_weights(d(1), [("AAA", 1.0)]), d(2), 0.01)
      .unwrap();
    persist(dir.path(), acc.returns(), acc.weights()).unwrap();

    let full = sample();
    persist(dir.path(), full.returns(), full.weights()).unwrap();

    let loaded = load(dir.path()).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.weights().len(), 3);
  }

  #[test]
  fn persist_into_a_file_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"x").unwrap();

    let acc = sample();
    let err = persist(&blocker, acc.returns(), acc.weights()).unwrap_err();
    assert!(matches!(err, PersistenceError::Io { .. }));
  }

  #[test]
  fn load_missing_checkpoint_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      load(dir.path()),
      Err(PersistenceError::Io { .. })
    ));
  }

  #[test]
  fn malformed_weights_are_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let acc = sample();
    persist(dir.path(), acc.returns(), acc.weights()).unwrap();

    for rows in [
      vec![("AAA", f64::NAN), ("BBB", 0.5)],
      vec![("AAA", 0.5), ("AAA", 0.5)],
    ] {
      let mut broken: Vec<WeightRow> = rows
        .into_iter()
        .map(|(ticker, weight)| WeightRow {
          date: d(1),
          ticker: ticker.to_string(),
          weight,
        })
        .collect();
      broken.push(acc.weights().rows()[2].clone());
      let mut frame = weights_frame(&broken).unwrap();
      write_atomic(&dir.path().join(WEIGHTS_FILE), &mut frame).unwrap();

      assert!(matches!(
        load(dir.path()),
        Err(PersistenceError::Format(_))
      ));
    }
  }

  #[test]
  fn interrupted_checkpoint_drops_the_unrealized_allocation() {
    let dir = tempfile::tempdir().unwrap();
    let before = sample();
    persist(dir.path(), before.returns(), before.weights()).unwrap();

    // weights of the next step landed, its returns did not
    let mut after = before.clone();
    after
      .record_step(WeightTable::from_weights(d(3), [("BBB", 1.0)]), d(4), 0.03)
      .unwrap();
    let mut frame = after.weights().to_frame().unwrap();
    write_atomic(&dir.path().join(WEIGHTS_FILE), &mut frame).unwrap();

    assert_eq!(load(dir.path()).unwrap(), before);
  }

  #[test]
  fn returns_ahead_of_weights_are_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut short = Accumulator::new();
    short
      .record_step(WeightTable::from_weights(d(1), [("AAA", 1.0)]), d(2), 0.01)
      .unwrap();
    persist(dir.path(), short.returns(), short.weights()).unwrap();

    let full = sample();
    let mut frame = full.returns().to_frame().unwrap();
    write_atomic(&dir.path().join(RETURNS_FILE), &mut frame).unwrap();

    assert!(matches!(
      load(dir.path()),
      Err(PersistenceError::Format(_))
    ));
  }

  #[test]
  fn return_not_after_its_allocation_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let weights = sample();
    let mut frame = weights.weights().to_frame().unwrap();
    write_atomic(&dir.path().join(WEIGHTS_FILE), &mut frame).unwrap();
    let mut frame = returns_frame(&[(d(1), 0.01), (d(3), 0.02)]).unwrap();
    write_atomic(&dir.path().join(RETURNS_FILE), &mut frame).unwrap();

    assert!(matches!(
      load(dir.path()),
      Err(PersistenceError::Format(_))
    ));
  }

  #[test]
  fn resume_index_points_at_last_realized_row() {
    let dates: Vec<NaiveDate> = (1..=5).map(d).collect();
    let panel = PricePanel::new(dates, vec!["AAA".into()], Array2::ones((5, 1))).unwrap();

    assert_eq!(resume_index(&panel, &Accumulator::new()), None);
    assert_eq!(resume_index(&panel, &sample()), Some(2));
  }
}
