//! # Backtest
//!
//! $$
//! W_t = \mathcal S(\mathcal F_t),\qquad r_{t+1} = W_t^\top\!\left(\frac{P_{t+1}}{P_t} - 1\right)
//! $$
//!
//! Rolling rebalancing simulation: a strategy decides weights from the
//! trailing window, the driver realizes them one period later, and the
//! running state is checkpointed to parquet.

pub mod accumulator;
pub mod driver;
pub mod error;
pub mod frame;
pub mod panel;
pub mod persistence;
pub mod strategy;
pub mod validation;
pub mod weights;

pub use accumulator::Accumulator;
pub use accumulator::HistoricalWeights;
pub use accumulator::ReturnSeries;
pub use driver::DriverConfig;
pub use driver::SimulationDriver;
pub use driver::StepReport;
pub use driver::realized_return;
pub use error::BacktestError;
pub use error::PersistenceError;
pub use panel::MarketData;
pub use panel::MarketView;
pub use panel::PanelView;
pub use panel::PricePanel;
pub use persistence::load;
pub use persistence::persist;
pub use persistence::resume_index;
pub use strategy::Strategy;
pub use validation::check_frame;
pub use validation::check_return;
pub use weights::WeightRow;
pub use weights::WeightTable;
