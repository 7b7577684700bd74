//! Error types for market insight operations

use insight_llm::LLMError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market insight specific errors
///
/// Gateway failures carry user-facing (Traditional Chinese) messages that
/// name the model; the provider error stays available as the source.
#[derive(Debug, Error)]
pub enum InsightError {
    /// No API key stored or supplied
    #[error("請先設定 Gemini API Key。")]
    MissingCredential,

    /// Blank topic submitted
    #[error("請輸入公司或產業名稱。")]
    EmptyTopic,

    /// Stage 1 (grounded news search) failed
    #[error("無法搜尋產業新聞 ({model})，請確認 API Key 是否正確或稍後再試。")]
    NewsSearch {
        model: String,
        #[source]
        source: LLMError,
    },

    /// Stage 2 (structured analysis) provider call failed
    #[error("無法產生策略分析 ({model})，請稍後再試。")]
    Analysis {
        model: String,
        #[source]
        source: LLMError,
    },

    /// Stage 2 returned text that is not the expected JSON shape
    #[error("無法產生策略分析 ({model})，請稍後再試。")]
    MalformedAnalysis { model: String, detail: String },

    /// A newer search or a reset replaced this one while it was in flight
    #[error("Search {search_id} was superseded")]
    Superseded { search_id: u64 },

    /// Unknown model id
    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    /// Key-value store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Prompt template error
    #[error("Prompt error: {0}")]
    Prompt(#[from] minijinja::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Key missing; route to the credential prompt
    Credential,
    /// Provider rejected the key
    Authorization,
    /// Transport or provider failure
    Provider,
    /// Stage 2 output did not match the schema
    MalformedResponse,
    /// Persistence failure
    Storage,
    /// Bad user input
    Input,
    /// Bad configuration
    Config,
}

impl InsightError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            InsightError::MissingCredential => ErrorCategory::Credential,
            InsightError::NewsSearch { source, .. } | InsightError::Analysis { source, .. } => {
                if source.is_authorization() {
                    ErrorCategory::Authorization
                } else {
                    ErrorCategory::Provider
                }
            }
            InsightError::MalformedAnalysis { .. } => ErrorCategory::MalformedResponse,
            InsightError::Storage(_) | InsightError::Io(_) | InsightError::Json(_) => {
                ErrorCategory::Storage
            }
            InsightError::EmptyTopic | InsightError::UnknownModel(_) => ErrorCategory::Input,
            InsightError::Superseded { .. } => ErrorCategory::Input,
            InsightError::Prompt(_) | InsightError::ConfigError(_) => ErrorCategory::Config,
        }
    }

    /// Whether the failure should send the user back to the credential prompt
    pub fn is_authorization(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Authorization | ErrorCategory::Credential
        )
    }

    /// Model named by a gateway failure
    pub fn model(&self) -> Option<&str> {
        match self {
            InsightError::NewsSearch { model, .. }
            | InsightError::Analysis { model, .. }
            | InsightError::MalformedAnalysis { model, .. } => Some(model),
            _ => None,
        }
    }
}

/// Result type alias for market insight operations
pub type Result<T> = std::result::Result<T, InsightError>;
