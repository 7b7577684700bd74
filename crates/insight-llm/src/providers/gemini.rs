//! Gemini provider implementation
//!
//! Implements [`GenerativeProvider`] over the Gemini `generateContent` REST
//! endpoint. See: https://ai.google.dev/api/generate-content
//!
//! # Examples
//!
//! ```no_run
//! use insight_llm::providers::GeminiProvider;
//! use insight_llm::{Credential, GenerateRequest, GenerativeProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = GeminiProvider::from_env()?;
//!
//!     let request = GenerateRequest::builder("gemini-2.5-flash")
//!         .credential(Credential::new("AIza..."))
//!         .prompt("Latest news about TSMC")
//!         .grounded()
//!         .build();
//!
//!     let response = provider.generate(request).await?;
//!     println!("{}", response.text);
//!     for citation in &response.citations {
//!         println!("{:?}", citation.uri);
//!     }
//!     Ok(())
//! }
//! ```

use crate::{
    Citation, FinishReason, GenerateRequest, GenerateResponse, GenerativeProvider, LLMError,
    ResponseFormat, Result, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini provider
///
/// The API key is not part of the configuration: it travels with every
/// request so that it can be replaced at runtime.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL (default: "https://generativelanguage.googleapis.com/v1beta")
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,

    /// Optional list of accepted model ids; any id is accepted when `None`
    pub supported_models: Option<Vec<String>>,
}

impl GeminiConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self {
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            supported_models: None,
        }
    }

    /// Create config from environment
    ///
    /// Reads the base URL from `GEMINI_API_BASE` if set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();
        if let Ok(api_base) = std::env::var("GEMINI_API_BASE") {
            config = config.with_api_base(api_base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Set custom API base URL (trailing slashes are dropped)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Restrict accepted model ids
    pub fn with_supported_models(mut self, models: Vec<String>) -> Self {
        self.supported_models = Some(models);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_base).map_err(|e| {
            LLMError::ConfigurationError(format!("invalid api base '{}': {e}", self.api_base))
        })?;
        if self.timeout_secs == 0 {
            return Err(LLMError::ConfigurationError(
                "timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a new Gemini provider with custom configuration
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(GeminiConfig::new())
    }

    /// Create a provider from environment variables
    pub fn from_env() -> Result<Self> {
        Self::with_config(GeminiConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base,
            normalize_model(model)
        )
    }

    /// Validate model name against supported models list (if configured)
    fn validate_model(&self, model: &str) -> Result<()> {
        if let Some(supported) = &self.config.supported_models {
            if !supported.iter().any(|m| m == model) {
                return Err(LLMError::InvalidRequest(format!(
                    "Model '{model}' is not in the supported models list: {supported:?}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    #[instrument(
        skip(self, request),
        fields(model = %request.model, grounding = request.grounding, json = request.response_format.is_json())
    )]
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        request.validate()?;
        self.validate_model(&request.model)?;

        let url = self.endpoint(&request.model);
        let body = build_gemini_request(&request);

        debug!("Sending request to Gemini API at {}", self.config.api_base);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, request.credential.expose())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw_body = response.text().await?;

        if !status.is_success() {
            warn!(status = %status, "Gemini API returned an error");
            return Err(map_status(status.as_u16(), &raw_body, &request.model));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&raw_body).map_err(|e| {
            LLMError::UnexpectedResponse(format!(
                "Failed to parse response: {e}. Body: {}",
                truncate(&raw_body, 500)
            ))
        })?;

        let response = parse_gemini_response(gemini_response);

        debug!(
            text_len = response.text.len(),
            citations = response.citations.len(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Received Gemini response"
        );

        Ok(response)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// Gemini-specific request types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiTextPart>,
}

#[derive(Debug, Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.max_output_tokens.is_none()
            && self.response_mime_type.is_none()
            && self.response_schema.is_none()
    }
}

// ============================================================================
// Gemini-specific response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: Option<String>,
    status: Option<String>,
}

// ============================================================================
// Conversion functions
// ============================================================================

/// Strip a "gemini/" routing prefix; the API expects the bare id
fn normalize_model(model: &str) -> &str {
    model.strip_prefix("gemini/").unwrap_or(model)
}

fn build_gemini_request(request: &GenerateRequest) -> GeminiRequest {
    let system_instruction = request.system.as_ref().map(|text| GeminiContent {
        role: None,
        parts: vec![GeminiTextPart { text: text.clone() }],
    });

    let tools = if request.grounding {
        vec![GeminiTool {
            google_search: GoogleSearch {},
        }]
    } else {
        Vec::new()
    };

    let mut generation_config = GenerationConfig {
        temperature: request.temperature,
        max_output_tokens: request.max_output_tokens,
        ..Default::default()
    };
    if let ResponseFormat::Json { schema } = &request.response_format {
        generation_config.response_mime_type = Some("application/json".to_string());
        generation_config.response_schema = Some(schema.clone());
    }

    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiTextPart {
                text: request.prompt.clone(),
            }],
        }],
        system_instruction,
        tools,
        generation_config: (!generation_config.is_empty()).then_some(generation_config),
    }
}

/// Convert the wire response into our format
///
/// Only the first candidate is read. A response without candidates yields
/// empty text rather than an error.
fn parse_gemini_response(response: GeminiResponse) -> GenerateResponse {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        warn!(block_reason = reason, "Gemini blocked the prompt");
    }

    let usage = response
        .usage_metadata
        .map(|meta| TokenUsage {
            input_tokens: meta.prompt_token_count.unwrap_or(0),
            output_tokens: meta.candidates_token_count.unwrap_or(0),
        })
        .unwrap_or_default();

    let Some(candidate) = response.candidates.and_then(|c| c.into_iter().next()) else {
        return GenerateResponse {
            usage,
            ..Default::default()
        };
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought.unwrap_or(false))
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    let citations = candidate
        .grounding_metadata
        .map(|meta| {
            meta.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .map(|web| Citation {
                    title: web.title,
                    uri: web.uri,
                })
                .collect()
        })
        .unwrap_or_default();

    GenerateResponse {
        text,
        citations,
        finish_reason: map_finish_reason(candidate.finish_reason.as_deref()),
        usage,
    }
}

/// Map Gemini finish reason to our format
fn map_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        None | Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some("SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => FinishReason::Safety,
        Some(other) => {
            debug!("Unknown finish reason: {}", other);
            FinishReason::Other
        }
    }
}

/// Map a non-success HTTP status to a typed error
fn map_status(status: u16, body: &str, model: &str) -> LLMError {
    let detail = extract_error_message(body);
    match status {
        400 => LLMError::InvalidRequest(detail),
        401 => LLMError::AuthenticationFailed(detail),
        403 => LLMError::PermissionDenied(detail),
        404 => LLMError::ModelNotFound(model.to_string()),
        429 => LLMError::RateLimitExceeded(detail),
        _ => LLMError::RequestFailed(format!("HTTP {status}: {detail}")),
    }
}

/// Pull `error.message` out of a Gemini error body, falling back to the raw text
fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<GeminiErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.status, envelope.error.message) {
            (Some(status), Some(message)) => format!("{status}: {message}"),
            (None, Some(message)) => message,
            (Some(status), None) => status,
            (None, None) => truncate(body, 500).to_string(),
        },
        Err(_) => truncate(body, 500).to_string(),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Tests
// ============================================================================
