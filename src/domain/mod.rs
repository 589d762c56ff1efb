//! Core domain types and logic. Pure transformations, no I/O.

pub mod backtest;
pub mod bars;
pub mod config_validation;
pub mod error;
pub mod forecast;
pub mod metrics;
pub mod ohlcv;
pub mod rolling;
pub mod simulator;
pub mod strategy;
pub mod timeframe;
