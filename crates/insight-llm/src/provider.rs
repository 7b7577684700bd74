//! Generative provider trait definition

use crate::{GenerateRequest, GenerateResponse, Result};
use async_trait::async_trait;

/// Trait for generative providers
///
/// A provider turns one [`GenerateRequest`] into one [`GenerateResponse`].
/// Grounded search and structured output are both expressed through the
/// request; providers reject combinations they cannot serve.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Run a single generation
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Get the provider name (e.g., "gemini")
    fn name(&self) -> &str;
}
