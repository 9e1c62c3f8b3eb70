//! Core domain types and logic.

pub mod ohlcv;
pub mod resample;
pub mod indicator;
pub mod strategy;
pub mod signal;
pub mod trade_group;
pub mod stop_loss;
pub mod execution;
pub mod metrics;
pub mod engine;
pub mod config_validation;
pub mod error;
