//! # Portfolio Types
//!
//! $$
//! \sigma_p = \sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}
//! $$
//!
//! Shared result containers for portfolio optimization.

/// Output of a portfolio optimization run.
#[derive(Clone, Debug, Default)]
pub struct PortfolioResult {
  /// Final portfolio weights, in input order.
  pub weights: Vec<f64>,
  /// Model portfolio volatility per period of the input covariance.
  pub volatility: f64,
}

pub(crate) fn empty_result() -> PortfolioResult {
  PortfolioResult::default()
}
