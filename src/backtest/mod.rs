//! The event-driven backtester: configuration, the risk-based position
//! sizer, and the bar-by-bar simulation engine.
pub mod config;
pub mod engine;
pub mod risk;

pub use config::{BacktestConfig, BacktestConfigError, StopTarget};
pub use engine::{Backtester, BacktestError};
pub use risk::{PositionSizer, RiskConfig, RiskConfigError};
