//! Core types and configuration for the tickbars dashboard.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (trades, bars, sampling rules)
//! - Date-indexed series tables for pre-computed datasets
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
