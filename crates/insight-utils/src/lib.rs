//! Shared utilities for market-insight
//!
//! This crate provides common functionality used across the workspace:
//! tracing setup and resolution of the directory that holds persisted
//! client state.

pub mod config;
pub mod logging;

pub use config::AppDirs;
pub use logging::{LogFormat, LogOptions, init_tracing};
