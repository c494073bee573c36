//! Data ingestion and bar construction for the tickbars dashboard.
//!
//! This crate handles:
//! - Trade table loading (time, price, volume)
//! - Series table loading (returns, volatility, monthly returns)
//! - Bar construction under time, tick, volume and dollar sampling

pub mod bar_builder;
pub mod loader;

pub use bar_builder::{build_bars, BarBuilder, BarSet, BarSetParams};
pub use loader::{load_series_table, load_trades, read_series_table, read_trades};
