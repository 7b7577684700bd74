//! Error types for provider operations

use thiserror::Error;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while talking to a generative provider
#[derive(Error, Debug)]
pub enum LLMError {
    /// No credential was supplied with the request
    #[error("No API key supplied")]
    MissingCredential,

    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed (HTTP 401)
    #[error("Invalid API key or authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The key is valid but not allowed to use the resource (HTTP 403)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Whether the failure points at the credential
    ///
    /// Gemini answers an invalid key with HTTP 400, so `InvalidRequest` is
    /// counted as well.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            LLMError::MissingCredential
                | LLMError::AuthenticationFailed(_)
                | LLMError::PermissionDenied(_)
                | LLMError::InvalidRequest(_)
        )
    }

    /// HTTP status this error was mapped from, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LLMError::InvalidRequest(_) => Some(400),
            LLMError::AuthenticationFailed(_) => Some(401),
            LLMError::PermissionDenied(_) => Some(403),
            LLMError::ModelNotFound(_) => Some(404),
            LLMError::RateLimitExceeded(_) => Some(429),
            LLMError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
