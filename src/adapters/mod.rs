//! Concrete adapter implementations for ports.

pub mod ar_model_adapter;
pub mod cache_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_report_adapter;
