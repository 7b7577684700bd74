//! Configuration for market insight operations

use crate::error::{InsightError, Result};
use insight_llm::providers::{GeminiConfig, gemini::DEFAULT_GEMINI_API_BASE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Maximum number of remembered searches
pub const HISTORY_LIMIT: usize = 5;

/// Models offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    /// gemini-2.5-flash (default for the search stage)
    #[serde(rename = "gemini-2.5-flash")]
    Flash25,
    /// gemini-3-pro-preview (default for the analysis stage)
    #[serde(rename = "gemini-3-pro-preview")]
    Pro3Preview,
}

impl ModelId {
    /// Every selectable model, in menu order
    pub const ALL: [ModelId; 2] = [ModelId::Flash25, ModelId::Pro3Preview];

    /// Wire id sent to the provider
    pub fn id(&self) -> &'static str {
        match self {
            ModelId::Flash25 => "gemini-2.5-flash",
            ModelId::Pro3Preview => "gemini-3-pro-preview",
        }
    }

    /// Menu label
    pub fn name(&self) -> &'static str {
        match self {
            ModelId::Flash25 => "Gemini 2.5 Flash",
            ModelId::Pro3Preview => "Gemini 3 Pro",
        }
    }

    /// Badge label shown next to results
    pub fn display_name(&self) -> String {
        model_display_name(self.id())
    }
}

/// Badge label for an arbitrary model id
pub fn model_display_name(id: &str) -> String {
    if id.contains("flash") {
        "GEMINI 2.5 FLASH".to_string()
    } else if id.contains("pro") {
        "GEMINI 3 PRO".to_string()
    } else {
        id.to_uppercase()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelId {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ModelId::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(wanted))
            .or(match wanted.to_lowercase().as_str() {
                "flash" => Some(ModelId::Flash25),
                "pro" => Some(ModelId::Pro3Preview),
                _ => None,
            })
            .ok_or_else(|| InsightError::UnknownModel(wanted.to_string()))
    }
}

/// Language the model is asked to write in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReportLanguage {
    /// Traditional Chinese (繁體中文)
    #[default]
    #[serde(rename = "zh-TW")]
    TraditionalChinese,
    /// English
    #[serde(rename = "en")]
    English,
}

impl ReportLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            ReportLanguage::TraditionalChinese => "zh-TW",
            ReportLanguage::English => "en",
        }
    }
}

impl FromStr for ReportLanguage {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "zh-tw" | "zh" | "zh-hant" | "繁體中文" => Ok(ReportLanguage::TraditionalChinese),
            "en" | "english" => Ok(ReportLanguage::English),
            other => Err(InsightError::ConfigError(format!(
                "unsupported report language '{other}'"
            ))),
        }
    }
}

/// Configuration for a market insight session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Model used for the grounded news search
    pub search_model: ModelId,

    /// Model used for the structured analysis
    pub analysis_model: ModelId,

    /// Provider base URL
    pub api_base: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Delay before re-prompting for a key after an authorization failure
    pub credential_reprompt_delay: Duration,

    /// How often the loading indicator switches message
    pub loading_message_interval: Duration,

    /// Language of the generated summary and report
    pub report_language: ReportLanguage,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            search_model: ModelId::Flash25,
            analysis_model: ModelId::Pro3Preview,
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            request_timeout: Duration::from_secs(120),
            credential_reprompt_delay: Duration::from_secs(2),
            loading_message_interval: Duration::from_millis(2500),
            report_language: ReportLanguage::TraditionalChinese,
        }
    }
}

impl InsightConfig {
    /// Create a new configuration builder
    pub fn builder() -> InsightConfigBuilder {
        InsightConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_base).map_err(|e| {
            InsightError::ConfigError(format!("invalid api base '{}': {e}", self.api_base))
        })?;

        if self.request_timeout.is_zero() {
            return Err(InsightError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.loading_message_interval.is_zero() {
            return Err(InsightError::ConfigError(
                "loading_message_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Provider configuration derived from this config
    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig::new()
            .with_api_base(&self.api_base)
            .with_timeout(self.request_timeout.as_secs().max(1))
    }
}

/// Builder for InsightConfig
#[derive(Debug, Default)]
pub struct InsightConfigBuilder {
    search_model: Option<ModelId>,
    analysis_model: Option<ModelId>,
    api_base: Option<String>,
    request_timeout: Option<Duration>,
    credential_reprompt_delay: Option<Duration>,
    loading_message_interval: Option<Duration>,
    report_language: Option<ReportLanguage>,
    env_error: Option<String>,
}

impl InsightConfigBuilder {
    /// Set the search stage model
    pub fn search_model(mut self, model: ModelId) -> Self {
        self.search_model = Some(model);
        self
    }

    /// Set the analysis stage model
    pub fn analysis_model(mut self, model: ModelId) -> Self {
        self.analysis_model = Some(model);
        self
    }

    /// Set the provider base URL
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the credential re-prompt delay
    pub fn credential_reprompt_delay(mut self, duration: Duration) -> Self {
        self.credential_reprompt_delay = Some(duration);
        self
    }

    /// Set the loading message rotation interval
    pub fn loading_message_interval(mut self, duration: Duration) -> Self {
        self.loading_message_interval = Some(duration);
        self
    }

    /// Set the report language
    pub fn report_language(mut self, language: ReportLanguage) -> Self {
        self.report_language = Some(language);
        self
    }

    /// Load overrides from the environment
    ///
    /// Reads `GEMINI_API_BASE`, `MARKET_INSIGHT_SEARCH_MODEL`,
    /// `MARKET_INSIGHT_ANALYSIS_MODEL`, `MARKET_INSIGHT_TIMEOUT_SECS` and
    /// `MARKET_INSIGHT_LANGUAGE`. Values set earlier on the builder win.
    /// Unparseable values surface as an error from [`build`](Self::build).
    pub fn with_env(mut self) -> Self {
        if self.api_base.is_none() {
            self.api_base = std::env::var("GEMINI_API_BASE").ok();
        }
        if self.search_model.is_none() {
            if let Ok(raw) = std::env::var("MARKET_INSIGHT_SEARCH_MODEL") {
                match raw.parse() {
                    Ok(model) => self.search_model = Some(model),
                    Err(e) => self.env_error = Some(format!("MARKET_INSIGHT_SEARCH_MODEL: {e}")),
                }
            }
        }
        if self.analysis_model.is_none() {
            if let Ok(raw) = std::env::var("MARKET_INSIGHT_ANALYSIS_MODEL") {
                match raw.parse() {
                    Ok(model) => self.analysis_model = Some(model),
                    Err(e) => {
                        self.env_error = Some(format!("MARKET_INSIGHT_ANALYSIS_MODEL: {e}"));
                    }
                }
            }
        }
        if self.request_timeout.is_none() {
            if let Ok(raw) = std::env::var("MARKET_INSIGHT_TIMEOUT_SECS") {
                match raw.trim().parse::<u64>() {
                    Ok(secs) => self.request_timeout = Some(Duration::from_secs(secs)),
                    Err(e) => self.env_error = Some(format!("MARKET_INSIGHT_TIMEOUT_SECS: {e}")),
                }
            }
        }
        if self.report_language.is_none() {
            if let Ok(raw) = std::env::var("MARKET_INSIGHT_LANGUAGE") {
                match raw.parse() {
                    Ok(language) => self.report_language = Some(language),
                    Err(e) => self.env_error = Some(format!("MARKET_INSIGHT_LANGUAGE: {e}")),
                }
            }
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<InsightConfig> {
        if let Some(err) = self.env_error {
            return Err(InsightError::ConfigError(err));
        }

        let defaults = InsightConfig::default();

        let config = InsightConfig {
            search_model: self.search_model.unwrap_or(defaults.search_model),
            analysis_model: self.analysis_model.unwrap_or(defaults.analysis_model),
            api_base: self
                .api_base
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            credential_reprompt_delay: self
                .credential_reprompt_delay
                .unwrap_or(defaults.credential_reprompt_delay),
            loading_message_interval: self
                .loading_message_interval
                .unwrap_or(defaults.loading_message_interval),
            report_language: self.report_language.unwrap_or(defaults.report_language),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InsightConfig::default();
        assert_eq!(config.search_model, ModelId::Flash25);
        assert_eq!(config.analysis_model, ModelId::Pro3Preview);
        assert_eq!(config.credential_reprompt_delay, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = InsightConfig::builder()
            .search_model(ModelId::Pro3Preview)
            .api_base("http://localhost:9000/v1beta/")
            .request_timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(config.search_model, ModelId::Pro3Preview);
        assert_eq!(config.api_base, "http://localhost:9000/v1beta");
        assert_eq!(config.gemini_config().timeout_secs, 30);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(InsightConfig::builder().api_base("::nope").build().is_err());
        assert!(
            InsightConfig::builder()
                .request_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_model_parse() {
        assert_eq!("gemini-2.5-flash".parse::<ModelId>().unwrap(), ModelId::Flash25);
        assert_eq!("PRO".parse::<ModelId>().unwrap(), ModelId::Pro3Preview);
        assert!(matches!(
            "gpt-4".parse::<ModelId>(),
            Err(InsightError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_model_display_name() {
        assert_eq!(ModelId::Flash25.display_name(), "GEMINI 2.5 FLASH");
        assert_eq!(ModelId::Pro3Preview.display_name(), "GEMINI 3 PRO");
        assert_eq!(model_display_name("custom-model"), "CUSTOM-MODEL");
    }

    #[test]
    fn test_model_serde_uses_wire_id() {
        let json = serde_json::to_string(&ModelId::Pro3Preview).unwrap();
        assert_eq!(json, "\"gemini-3-pro-preview\"");
    }

    #[test]
    fn test_report_language_parse() {
        assert_eq!(
            "zh-TW".parse::<ReportLanguage>().unwrap(),
            ReportLanguage::TraditionalChinese
        );
        assert_eq!("en".parse::<ReportLanguage>().unwrap(), ReportLanguage::English);
        assert!("fr".parse::<ReportLanguage>().is_err());
    }
}
