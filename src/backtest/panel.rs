//! # Price Panels
//!
//! $$
//! P \in \mathbb R^{T \times N},\quad d_0 < d_1 < \dots < d_{T-1}
//! $$
//!
//! Date × ticker price tables and the named collection of them a strategy
//! reads from. Missing observations are stored as `NaN`.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::s;

use super::error::BacktestError;

/// Time-indexed table of adjusted close prices, one row per date and one
/// column per ticker.
#[derive(Clone, Debug)]
pub struct PricePanel {
  dates: Vec<NaiveDate>,
  tickers: Vec<String>,
  index: HashMap<String, usize>,
  prices: Array2<f64>,
}

impl PricePanel {
  /// Build a panel, checking that dates are strictly increasing, tickers are
  /// unique and the price matrix is `dates.len() x tickers.len()`.
  pub fn new(
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    prices: Array2<f64>,
  ) -> Result<Self, BacktestError> {
    if prices.nrows() != dates.len() || prices.ncols() != tickers.len() {
      return Err(BacktestError::InvalidPanel(format!(
        "price matrix is {}x{}, expected {}x{}",
        prices.nrows(),
        prices.ncols(),
        dates.len(),
        tickers.len()
      )));
    }

    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
      return Err(BacktestError::InvalidPanel(format!(
        "dates not strictly increasing at {} -> {}",
        w[0], w[1]
      )));
    }

    let mut index = HashMap::with_capacity(tickers.len());
    for (j, ticker) in tickers.iter().enumerate() {
      if index.insert(ticker.clone(), j).is_some() {
        return Err(BacktestError::InvalidPanel(format!(
          "duplicate ticker '{ticker}'"
        )));
      }
    }

    Ok(Self {
      dates,
      tickers,
      index,
      prices,
    })
  }

  /// Number of dates (rows).
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Date at row `t`.
  pub fn date(&self, t: usize) -> Option<NaiveDate> {
    self.dates.get(t).copied()
  }

  /// Row of `date`, if the panel contains it.
  pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
    self.dates.binary_search(&date).ok()
  }

  /// Borrowed view over every row.
  pub fn view(&self) -> PanelView<'_> {
    self.rows_until(self.dates.len())
  }

  /// Borrowed view over the rows dated on or before `date`.
  pub fn history_until(&self, date: NaiveDate) -> PanelView<'_> {
    self.rows_until(self.dates.partition_point(|d| *d <= date))
  }

  fn rows_until(&self, end: usize) -> PanelView<'_> {
    PanelView {
      dates: &self.dates[..end],
      tickers: &self.tickers,
      index: &self.index,
      prices: self.prices.slice(s![..end, ..]),
    }
  }
}

/// Read-only, row-bounded window onto a [`PricePanel`]. Rows past the bound
/// are not reachable through it.
#[derive(Clone, Copy, Debug)]
pub struct PanelView<'a> {
  dates: &'a [NaiveDate],
  tickers: &'a [String],
  index: &'a HashMap<String, usize>,
  prices: ArrayView2<'a, f64>,
}

impl<'a> PanelView<'a> {
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn dates(&self) -> &'a [NaiveDate] {
    self.dates
  }

  pub fn tickers(&self) -> &'a [String] {
    self.tickers
  }

  pub fn prices(&self) -> ArrayView2<'a, f64> {
    self.prices
  }

  pub fn date(&self, t: usize) -> Option<NaiveDate> {
    self.dates.get(t).copied()
  }

  pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
    self.dates.binary_search(&date).ok()
  }

  pub fn ticker_index(&self, ticker: &str) -> Option<usize> {
    self.index.get(ticker).copied()
  }

  /// Usable price of `ticker` at row `t`: present, finite and positive.
  pub fn price(&self, t: usize, ticker: &str) -> Option<f64> {
    let j = self.ticker_index(ticker)?;
    self
      .prices
      .get((t, j))
      .copied()
      .filter(|p| p.is_finite() && *p > 0.0)
  }
}

/// Named collection of price panels (e.g. `"stocks"`), as handed over by the
/// data provider.
#[derive(Clone, Debug, Default)]
pub struct MarketData {
  panels: BTreeMap<String, PricePanel>,
}

impl MarketData {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert.
  pub fn with_panel(mut self, name: impl Into<String>, panel: PricePanel) -> Self {
    self.panels.insert(name.into(), panel);
    self
  }

  /// Panel registered as `name`.
  pub fn panel(&self, name: &str) -> Result<&PricePanel, BacktestError> {
    self
      .panels
      .get(name)
      .ok_or_else(|| BacktestError::UnknownDataset(name.to_string()))
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.panels.keys().map(String::as_str)
  }

  /// Unbounded view over every panel.
  pub fn view(&self) -> MarketView<'_> {
    MarketView {
      panels: self
        .panels
        .iter()
        .map(|(name, panel)| (name.as_str(), panel.view()))
        .collect(),
    }
  }

  /// Every panel cut down to rows dated on or before `date`. This is the only
  /// view of the data a strategy receives. Nothing is copied.
  pub fn history_until(&self, date: NaiveDate) -> MarketView<'_> {
    MarketView {
      panels: self
        .panels
        .iter()
        .map(|(name, panel)| (name.as_str(), panel.history_until(date)))
        .collect(),
    }
  }
}

/// Borrowed counterpart of [`MarketData`] holding one [`PanelView`] per
/// dataset.
#[derive(Clone, Debug)]
pub struct MarketView<'a> {
  panels: BTreeMap<&'a str, PanelView<'a>>,
}

impl<'a> MarketView<'a> {
  pub fn panel(&self, name: &str) -> Result<PanelView<'a>, BacktestError> {
    self
      .panels
      .get(name)
      .copied()
      .ok_or_else(|| BacktestError::UnknownDataset(name.to_string()))
  }

  pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
    self.panels.keys().copied()
  }
}
