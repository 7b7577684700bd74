//! Generation request and response types

use crate::{Credential, LLMError, Result};
use serde::{Deserialize, Serialize};

/// Output mode requested from the model
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseFormat {
    /// Free text (the default)
    #[default]
    Text,
    /// JSON constrained by a provider-native schema
    Json { schema: serde_json::Value },
}

impl ResponseFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, ResponseFormat::Json { .. })
    }
}

/// A single generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model identifier (provider-specific)
    pub model: String,

    /// Key authorizing this call
    pub credential: Credential,

    /// User prompt
    pub prompt: String,

    /// Optional system instruction
    pub system: Option<String>,

    /// Enable the provider's live web search tool
    pub grounding: bool,

    /// Requested output mode
    pub response_format: ResponseFormat,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_output_tokens: Option<u32>,
}

impl GenerateRequest {
    /// Create a builder for generation requests
    pub fn builder(model: impl Into<String>) -> GenerateRequestBuilder {
        GenerateRequestBuilder::new(model)
    }

    /// Check the request before it goes on the wire
    ///
    /// Grounded search and schema-constrained output cannot be combined in a
    /// single call.
    pub fn validate(&self) -> Result<()> {
        if self.credential.is_empty() {
            return Err(LLMError::MissingCredential);
        }
        if self.model.trim().is_empty() {
            return Err(LLMError::ConfigurationError("model id is empty".to_string()));
        }
        if self.grounding && self.response_format.is_json() {
            return Err(LLMError::ConfigurationError(
                "grounded search cannot be combined with structured JSON output".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`GenerateRequest`]
pub struct GenerateRequestBuilder {
    model: String,
    credential: Credential,
    prompt: String,
    system: Option<String>,
    grounding: bool,
    response_format: ResponseFormat,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl GenerateRequestBuilder {
    /// Create a new builder
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            credential: Credential::default(),
            prompt: String::new(),
            system: None,
            grounding: false,
            response_format: ResponseFormat::Text,
            temperature: None,
            max_output_tokens: None,
        }
    }

    /// Set the credential
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    /// Set the prompt
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the system instruction
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Enable web search grounding
    pub fn grounded(mut self) -> Self {
        self.grounding = true;
        self
    }

    /// Request JSON output matching `schema`
    pub fn json_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_format = ResponseFormat::Json { schema };
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum output tokens
    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Build the request
    pub fn build(self) -> GenerateRequest {
        GenerateRequest {
            model: self.model,
            credential: self.credential,
            prompt: self.prompt,
            system: self.system,
            grounding: self.grounding,
            response_format: self.response_format,
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// A web source the answer was grounded on, as reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: Option<String>,
    pub uri: Option<String>,
}

impl Citation {
    pub fn new(title: Option<&str>, uri: Option<&str>) -> Self {
        Self {
            title: title.map(str::to_string),
            uri: uri.map(str::to_string),
        }
    }
}

/// Response from a generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Concatenated text of the first candidate (empty when none)
    pub text: String,

    /// Grounding citations in provider order
    pub citations: Vec<Citation>,

    /// Why generation stopped
    pub finish_reason: FinishReason,

    /// Token usage statistics
    pub usage: TokenUsage,
}

impl GenerateResponse {
    /// Text-only response, mostly useful in tests
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }
}

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion
    #[default]
    Stop,

    /// Hit max tokens limit
    MaxTokens,

    /// Blocked by safety filters
    Safety,

    /// Anything else the provider reports
    Other,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u64,

    /// Number of output tokens
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
