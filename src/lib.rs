//! # rebalance-rs
//!
//! $$
//! r_{t+1} = \mathbf{w}_t^\top \left(\frac{P_{t+1}}{P_t} - \mathbf 1\right)
//! $$
//!
//! Rolling rebalancing backtests: pluggable allocation strategies, a
//! no-lookahead simulation driver and parquet checkpoints of the running
//! return series and weight history.

pub mod backtest;
pub mod portfolio;
pub mod strategies;
