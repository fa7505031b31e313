//! # Backtest Errors
//!
//! $$
//! \text{step}_t : \mathcal A \to \mathcal A' \;\cup\; \{\bot\}
//! $$
//!
//! Fatal step failures and recoverable checkpoint failures are kept in two
//! separate types so a caller cannot confuse one for the other.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Fatal failures of a simulation step. The accumulator is never mutated when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum BacktestError {
  /// The trailing window before `t` is too short for the strategy.
  #[error("insufficient data: strategy needs {needed} observations, {available} available")]
  InsufficientData { needed: usize, available: usize },
  /// The strategy produced a malformed weight table.
  #[error("invalid weights for {date}: {reason}")]
  InvalidWeights { date: NaiveDate, reason: String },
  /// An append targeted a date already present in the accumulator.
  #[error("date {0} is already recorded")]
  DuplicateDate(NaiveDate),
  /// An append targeted a date earlier than the last recorded one.
  #[error("date {date} precedes last recorded date {last}")]
  OutOfOrder { date: NaiveDate, last: NaiveDate },
  /// `t + 1` is past the end of the price history.
  #[error("index {t} has no successor in a panel of {len} rows")]
  OutOfRange { t: usize, len: usize },
  /// A weighted ticker has no usable price at the decision or realization date.
  #[error("missing price for {ticker} at {date}")]
  MissingPrice { ticker: String, date: NaiveDate },
  /// The requested dataset is not part of the market data.
  #[error("unknown dataset '{0}'")]
  UnknownDataset(String),
  /// A price panel violates its structural invariants.
  #[error("invalid price panel: {0}")]
  InvalidPanel(String),
  /// A strategy was configured with parameters it cannot run with.
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
}

/// Recoverable checkpoint failures. The in-memory accumulator stays valid.
#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error("i/o error at {path:?}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("columnar encoding failed: {0}")]
  Polars(#[from] polars::prelude::PolarsError),
  #[error("malformed checkpoint: {0}")]
  Format(String),
}

impl PersistenceError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}
