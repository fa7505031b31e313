//! # Strategies
//!
//! $$
//! K_t = \operatorname{top}_n\big(\{k : \text{window complete}\},\ \hat\sigma_k \uparrow\big)
//! $$
//!
//! Allocation rules implementing [`Strategy`](crate::backtest::Strategy).
//!
//! Ticker selection is deterministic everywhere: equal-weight takes tradable
//! tickers in lexicographic order, the window-based strategies rank by
//! ascending trailing volatility and break ties by ticker.

pub mod equal_weight;
pub mod inverse_vol;
pub mod min_variance;

pub use equal_weight::EqualWeight;
pub use inverse_vol::InverseVolatility;
pub use min_variance::CovarianceEstimate;
pub use min_variance::MinVarianceConfig;
pub use min_variance::MinimumVariance;

use crate::backtest::BacktestError;
use crate::backtest::PanelView;
use crate::portfolio::sample_std;
use crate::portfolio::simple_returns_series;

/// Trailing returns of the selected tickers.
#[derive(Clone, Debug)]
pub(crate) struct TrailingWindow {
  pub tickers: Vec<String>,
  pub returns: Vec<Vec<f64>>,
}

/// A volatility window needs at least two returns.
pub(crate) fn check_lookback(lookback: usize) -> Result<(), BacktestError> {
  if lookback < 2 {
    return Err(BacktestError::InvalidConfig(format!(
      "lookback must be at least 2 returns, got {lookback}"
    )));
  }
  Ok(())
}

/// Pick up to `size` tickers with a complete `lookback`-return window ending at
/// row `t`, lowest trailing volatility first.
pub(crate) fn low_volatility_window(
  panel: PanelView<'_>,
  t: usize,
  lookback: usize,
  size: usize,
) -> Result<TrailingWindow, BacktestError> {
  if t < lookback || t >= panel.len() {
    return Err(BacktestError::InsufficientData {
      needed: lookback + 1,
      available: (t + 1).min(panel.len()),
    });
  }

  let prices = panel.prices();
  let mut candidates: Vec<(f64, &String, Vec<f64>)> = panel
    .tickers()
    .iter()
    .enumerate()
    .filter_map(|(j, ticker)| {
      let path = prices.slice(ndarray::s![t - lookback..=t, j]);
      let returns = simple_returns_series(path)?;
      Some((sample_std(&returns), ticker, returns))
    })
    .collect();

  if candidates.is_empty() {
    return Err(BacktestError::InsufficientData {
      needed: lookback + 1,
      available: 0,
    });
  }

  candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
  candidates.truncate(size);
  // restore ticker order so covariance rows are stable across dates
  candidates.sort_by(|a, b| a.1.cmp(b.1));

  let (tickers, returns) = candidates
    .into_iter()
    .map(|(_, ticker, returns)| (ticker.clone(), returns))
    .unzip();
  Ok(TrailingWindow { tickers, returns })
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn window_ranks_by_volatility_then_restores_ticker_order() {
    let data = fixtures::oscillating(30, &["DDD", "AAA", "CCC", "BBB"]);
    let panel = data.panel("stocks").unwrap().view();
    let window = low_volatility_window(panel, 20, 10, 2).unwrap();

    // DDD and AAA have the two smallest amplitudes
    assert_eq!(window.tickers, vec!["AAA", "DDD"]);
    assert!(window.returns.iter().all(|r| r.len() == 10));
  }

  #[test]
  fn short_history_is_insufficient() {
    let data = fixtures::oscillating(30, &["AAA"]);
    let panel = data.panel("stocks").unwrap().view();
    assert!(matches!(
      low_volatility_window(panel, 5, 10, 1),
      Err(BacktestError::InsufficientData { needed: 11, available: 6 })
    ));
  }

  #[test]
  fn lookback_below_two_returns_is_rejected() {
    assert!(matches!(check_lookback(0), Err(BacktestError::InvalidConfig(_))));
    assert!(matches!(check_lookback(1), Err(BacktestError::InvalidConfig(_))));
    assert!(check_lookback(2).is_ok());
  }
}
