//! Generative provider abstraction for market-insight
//!
//! This crate provides the provider-agnostic request/response types used by
//! the market gateway and a Gemini implementation. It includes:
//!
//! - [`GenerateRequest`] for both grounded (web search) and structured (JSON
//!   schema) generation
//! - [`GenerateResponse`] with text, grounding citations and token usage
//! - the [`GenerativeProvider`] trait
//! - [`schema`] helpers producing provider-native response schemas
//! - [`providers::GeminiProvider`], the REST client

pub mod credential;
pub mod error;
pub mod provider;
pub mod providers;
pub mod request;
pub mod schema;

// Re-export main types
pub use credential::Credential;
pub use error::{LLMError, Result};
pub use provider::GenerativeProvider;
pub use request::{
    Citation, FinishReason, GenerateRequest, GenerateRequestBuilder, GenerateResponse,
    ResponseFormat, TokenUsage,
};
