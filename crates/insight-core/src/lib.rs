//! Market news search and prospect analysis
//!
//! This crate drives a two-stage pipeline against a generative provider:
//!
//! 1. a grounded web search that returns a news summary with its sources
//! 2. a schema-constrained call that turns that summary into a financial
//!    forecast and a moving-average based technical read
//!
//! # Architecture
//!
//! - [`storage`]: key-value persistence (`FileStore`, `InMemoryStore`)
//! - [`state`]: credential and recent-search history on top of a store
//! - [`gateway`]: the two provider calls, prompt rendering and response
//!   post-processing
//! - [`session`]: the Idle → Searching → Analyzing → Completed/Error state
//!   machine, published through a `tokio::sync::watch` channel
//! - [`render`]: presentation helpers (markdown blocks, price gauge, plain
//!   text report, loading messages)
//!
//! # Example
//!
//! ```rust,ignore
//! use insight_core::{InsightConfig, Session, storage::FileStore};
//! use insight_llm::providers::GeminiProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = InsightConfig::builder().with_env().build()?;
//!     let provider = Arc::new(GeminiProvider::with_config(config.gemini_config())?);
//!     let store = Arc::new(FileStore::open("state.json")?);
//!
//!     let session = Session::open(config, provider, store)?;
//!     session.save_credential("AIza...")?;
//!
//!     let done = session.submit("台積電").await?;
//!     println!("{}", done.analysis.content);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod prompts;
pub mod render;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;

// Re-export main types for convenience
pub use config::{InsightConfig, ModelId, ReportLanguage};
pub use error::{ErrorCategory, InsightError, Result};
pub use gateway::MarketGateway;
pub use session::{AppState, CompletedSearch, Session, SessionSnapshot};
pub use state::ClientState;
pub use types::{AnalysisResult, FinancialForecast, NewsResult, Signal, Source, TechnicalAnalysis};

pub use insight_llm::Credential;
