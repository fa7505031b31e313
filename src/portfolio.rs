//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Covariance estimation and the optimizers used by the allocation strategies.

pub mod data;
pub mod optimizers;
pub mod types;

pub use data::correlation_matrix;
pub use data::covariance_matrix;
pub use data::sample_covariance;
pub use data::sample_std;
pub use data::simple_returns_series;
pub use optimizers::min_variance_closed_form;
pub use optimizers::optimize_inverse_vol;
pub use optimizers::optimize_min_variance;
pub use optimizers::portfolio_volatility;
pub use types::PortfolioResult;
