//! Payment-behaviour analytics and budget forecasting.
//!
//! Ledger rows are aggregated per client or supplier, segmented into
//! ordered tiers, and flagged by a forest classifier. A separate pipeline
//! forecasts monthly budget metrics from the finance service's history.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod finance;
pub mod forecaster;
pub mod forest;
pub mod loader;
pub mod regression;
pub mod rng;
pub mod segmenter;
pub mod service;
pub mod store;
pub mod types;
