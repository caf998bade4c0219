//! Core domain: event records, the four pipeline stages and the driver.

pub mod event;
pub mod signal;
pub mod risk;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
