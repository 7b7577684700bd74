//! The two provider calls behind a search
//!
//! Stage 1 is a grounded web search returning a summary and its citations.
//! Stage 2 feeds that summary back with a response schema and parses the
//! structured forecast. Grounding and schema-constrained output cannot be
//! combined in one request.

use crate::config::{ModelId, ReportLanguage};
use crate::error::{InsightError, Result};
use crate::prompts::Prompts;
use crate::types::{
    AnalysisResult, DEFAULT_SOURCE_TITLE, DEFAULT_SOURCE_URI, FinancialForecast, NO_ANALYSIS,
    NO_SUMMARY, NewsResult, Source, TechnicalAnalysis,
};
use insight_llm::{Citation, Credential, GenerateRequest, GenerativeProvider, schema};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\n?").expect("valid fence pattern"));

/// Client for the news and analysis calls
pub struct MarketGateway {
    provider: Arc<dyn GenerativeProvider>,
    prompts: Prompts,
}

impl MarketGateway {
    pub fn new(provider: Arc<dyn GenerativeProvider>, language: ReportLanguage) -> Result<Self> {
        Ok(Self {
            provider,
            prompts: Prompts::new(language)?,
        })
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Grounded search for recent news about `topic`
    #[instrument(skip(self, credential, model), fields(model = %model, stage = "news"))]
    pub async fn fetch_news(
        &self,
        topic: &str,
        credential: &Credential,
        model: ModelId,
    ) -> Result<NewsResult> {
        let prompt = self.prompts.news_prompt(topic)?;
        let request = GenerateRequest::builder(model.id())
            .credential(credential.clone())
            .prompt(prompt)
            .grounded()
            .build();

        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|source| {
                warn!(error = %source, "News search failed");
                InsightError::NewsSearch {
                    model: model.id().to_string(),
                    source,
                }
            })?;

        let summary = if response.text.trim().is_empty() {
            NO_SUMMARY.to_string()
        } else {
            response.text
        };
        let sources = dedup_sources(&response.citations);

        debug!(
            sources = sources.len(),
            tokens = response.usage.total(),
            "News search complete"
        );

        Ok(NewsResult { summary, sources })
    }

    /// Structured forecast built from the stage 1 summary
    #[instrument(skip(self, news_summary, credential, model), fields(model = %model, stage = "analysis"))]
    pub async fn analyze_prospects(
        &self,
        topic: &str,
        news_summary: &str,
        credential: &Credential,
        model: ModelId,
    ) -> Result<AnalysisResult> {
        let prompt = self.prompts.analysis_prompt(topic, news_summary)?;
        let request = GenerateRequest::builder(model.id())
            .credential(credential.clone())
            .prompt(prompt)
            .json_schema(analysis_schema(self.prompts.language()))
            .build();

        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|source| {
                warn!(error = %source, "Analysis failed");
                InsightError::Analysis {
                    model: model.id().to_string(),
                    source,
                }
            })?;

        let analysis = parse_analysis(&response.text, model.id())?;
        debug!(
            has_financials = analysis.financial_forecast.is_some(),
            has_technical = analysis.technical_analysis.is_some(),
            tokens = response.usage.total(),
            "Analysis complete"
        );
        Ok(analysis)
    }
}

/// Map citations to sources, one per uri
///
/// Order follows the first appearance of each uri; the title is the last one
/// seen for it.
pub fn dedup_sources(citations: &[Citation]) -> Vec<Source> {
    let mut sources: Vec<Source> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for citation in citations {
        let title = citation.title.as_deref().unwrap_or(DEFAULT_SOURCE_TITLE);
        let uri = citation.uri.as_deref().unwrap_or(DEFAULT_SOURCE_URI);

        match index.get(uri) {
            Some(&i) => sources[i].title = title.to_string(),
            None => {
                index.insert(uri.to_string(), sources.len());
                sources.push(Source::new(title, uri));
            }
        }
    }

    sources
}

/// Strip markdown code fences around a JSON body
pub fn clean_json_text(text: &str) -> String {
    if text.is_empty() {
        return "{}".to_string();
    }
    JSON_FENCE.replace_all(text, "").replace("```", "").trim().to_string()
}

/// Response schema for the analysis call
pub fn analysis_schema(language: ReportLanguage) -> Value {
    let content_description = format!(
        "Markdown formatted text in {} containing Verified Industry Outlook, Profitability Forecast, Strategic Opportunities & Risks.",
        language.prompt_name()
    );

    let financials = schema::object(
        json!({
            "epsForecast": schema::string("Projected EPS figures with source citation"),
            "fairValue": schema::string("Calculated fair share price based on consensus"),
            "currentPrice": schema::string("Current market price"),
            "upsidePotential": schema::string("Percentage difference (e.g. '+20.3%')"),
            "valuationMethod": schema::string("Method used"),
            "analystConsensus": schema::string("Summary of broker consensus sentiment"),
            "dataVerification": schema::string("Notes on data accuracy and source discrepancies"),
        }),
        &[
            "epsForecast",
            "fairValue",
            "currentPrice",
            "upsidePotential",
            "valuationMethod",
            "analystConsensus",
            "dataVerification",
        ],
    );

    let technical = schema::object(
        json!({
            "signal": schema::string_enum("Overall Signal", &["BUY", "SELL", "HOLD"]),
            "signalContext": schema::string("Brief context (e.g. 'Granville Rule #3: Support at MA20')"),
            "ma20": schema::string("Estimated 20-day Moving Average price"),
            "ma60": schema::string("Estimated 60-day Moving Average price"),
            "suggestedEntryZone": schema::string("Recommended price range to buy"),
            "stopLossPrice": schema::string("Recommended stop loss price"),
            "granvilleReasoning": schema::string("Explanation based on moving average theory"),
        }),
        &[
            "signal",
            "signalContext",
            "ma20",
            "ma60",
            "suggestedEntryZone",
            "stopLossPrice",
            "granvilleReasoning",
        ],
    );

    schema::object(
        json!({
            "analysisContent": schema::string(&content_description),
            "financials": financials,
            "technicalAnalysis": technical,
        }),
        &[],
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisPayload {
    #[serde(default)]
    analysis_content: Option<String>,
    #[serde(default)]
    financials: Option<FinancialForecast>,
    #[serde(default)]
    technical_analysis: Option<TechnicalAnalysis>,
}

/// Parse the analysis call's text into an [`AnalysisResult`]
pub fn parse_analysis(text: &str, model: &str) -> Result<AnalysisResult> {
    let malformed = |detail: String| InsightError::MalformedAnalysis {
        model: model.to_string(),
        detail,
    };

    let cleaned = clean_json_text(text);
    let value: Value = serde_json::from_str(&cleaned).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed(format!("expected a JSON object, got {cleaned}")));
    }

    let payload: AnalysisPayload =
        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

    let content = payload
        .analysis_content
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| NO_ANALYSIS.to_string());

    Ok(AnalysisResult {
        content,
        financial_forecast: payload.financials,
        technical_analysis: payload.technical_analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signal;
    use async_trait::async_trait;
    use insight_llm::{GenerateResponse, LLMError};
    use std::sync::Mutex;

    const FULL_ANALYSIS: &str = r###"{
        "analysisContent": "## 產業前景\n需求強勁",
        "financials": {
            "epsForecast": "2025: 45 TWD",
            "fairValue": "1,200 TWD",
            "currentPrice": "1,000 TWD",
            "upsidePotential": "+20%",
            "valuationMethod": "P/E 25x",
            "analystConsensus": "Strong Buy",
            "dataVerification": "MS and GS agree"
        },
        "technicalAnalysis": {
            "signal": "BUY",
            "signalContext": "Granville Rule #1",
            "ma20": "980",
            "ma60": "950",
            "suggestedEntryZone": "970 - 990",
            "stopLossPrice": "940",
            "granvilleReasoning": "股價突破翻揚的 20日均線 (法則1)"
        }
    }"###;

    /// Records requests and replays one canned result
    struct ScriptedProvider {
        response: Mutex<Option<insight_llm::Result<GenerateResponse>>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedProvider {
        fn new(response: insight_llm::Result<GenerateResponse>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> GenerateRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl GenerativeProvider for ScriptedProvider {
        async fn generate(&self, request: GenerateRequest) -> insight_llm::Result<GenerateResponse> {
            self.requests.lock().unwrap().push(request);
            self.response.lock().unwrap().take().unwrap()
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn gateway(provider: Arc<ScriptedProvider>) -> MarketGateway {
        MarketGateway::new(provider, ReportLanguage::TraditionalChinese).unwrap()
    }

    fn key() -> Credential {
        Credential::new("AIzaTestKey123")
    }

    #[test]
    fn test_clean_json_text() {
        assert_eq!(clean_json_text(""), "{}");
        assert_eq!(clean_json_text("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json_text("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(clean_json_text("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_fenced_and_plain_parse_identically() {
        let plain = parse_analysis(FULL_ANALYSIS, "m").unwrap();
        let fenced = parse_analysis(&format!("```json\n{FULL_ANALYSIS}\n```"), "m").unwrap();
        assert_eq!(plain, fenced);

        let technical = plain.technical_analysis.unwrap();
        assert_eq!(technical.signal, Signal::Buy);
        assert_eq!(technical.suggested_entry_zone, "970 - 990");
        assert_eq!(plain.financial_forecast.unwrap().fair_value, "1,200 TWD");
    }

    #[test]
    fn test_parse_analysis_defaults() {
        let analysis = parse_analysis("", "m").unwrap();
        assert_eq!(analysis.content, NO_ANALYSIS);
        assert!(analysis.financial_forecast.is_none());
        assert!(analysis.technical_analysis.is_none());

        let analysis = parse_analysis(r#"{"analysisContent": "", "financials": null}"#, "m").unwrap();
        assert_eq!(analysis.content, NO_ANALYSIS);
        assert!(analysis.financial_forecast.is_none());
    }

    #[test]
    fn test_parse_analysis_rejects_bad_shapes() {
        for text in [
            "not json",
            "[1, 2]",
            "\"text\"",
            r#"{"technicalAnalysis": {"signal": "MAYBE"}}"#,
            r#"{"financials": {"fairValue": "100"}}"#,
        ] {
            let err = parse_analysis(text, "gemini-3-pro-preview").unwrap_err();
            assert!(
                matches!(err, InsightError::MalformedAnalysis { ref model, .. } if model == "gemini-3-pro-preview"),
                "{text}: {err:?}"
            );
        }
    }

    #[test]
    fn test_dedup_sources() {
        let citations = vec![
            Citation::new(Some("A"), Some("https://a.example")),
            Citation::new(Some("B"), Some("https://b.example")),
            Citation::new(Some("A2"), Some("https://a.example")),
            Citation::new(None, None),
            Citation::new(Some("Untitled link"), None),
        ];
        let sources = dedup_sources(&citations);
        assert_eq!(
            sources,
            vec![
                Source::new("A2", "https://a.example"),
                Source::new("B", "https://b.example"),
                Source::new("Untitled link", "#"),
            ]
        );
    }

    #[test]
    fn test_analysis_schema_shape() {
        let schema = analysis_schema(ReportLanguage::TraditionalChinese);
        assert_eq!(schema["type"], "OBJECT");
        assert!(schema.get("required").is_none());
        assert_eq!(
            schema["properties"]["financials"]["required"]
                .as_array()
                .unwrap()
                .len(),
            7
        );
        assert_eq!(
            schema["properties"]["technicalAnalysis"]["properties"]["signal"]["enum"],
            json!(["BUY", "SELL", "HOLD"])
        );
    }

    #[tokio::test]
    async fn test_fetch_news_builds_grounded_request() {
        let response = GenerateResponse::text("台積電營收創新高").with_citations(vec![
            Citation::new(Some("Reuters"), Some("https://reuters.example/1")),
            Citation::new(Some("Reuters (updated)"), Some("https://reuters.example/1")),
        ]);
        let provider = ScriptedProvider::new(Ok(response));
        let gateway = gateway(provider.clone());

        let news = gateway
            .fetch_news("台積電", &key(), ModelId::Flash25)
            .await
            .unwrap();
        assert_eq!(news.summary, "台積電營收創新高");
        assert_eq!(
            news.sources,
            vec![Source::new("Reuters (updated)", "https://reuters.example/1")]
        );

        let request = provider.last_request();
        assert!(request.grounding);
        assert!(!request.response_format.is_json());
        assert_eq!(request.model, "gemini-2.5-flash");
        assert_eq!(request.credential.expose(), "AIzaTestKey123");
        assert!(request.prompt.contains("\"台積電\""));
    }

    #[tokio::test]
    async fn test_fetch_news_empty_text_uses_placeholder() {
        let provider = ScriptedProvider::new(Ok(GenerateResponse::default()));
        let news = gateway(provider)
            .fetch_news("AMD", &key(), ModelId::Flash25)
            .await
            .unwrap();
        assert_eq!(news.summary, NO_SUMMARY);
        assert!(news.sources.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_news_error_names_model() {
        let provider = ScriptedProvider::new(Err(LLMError::AuthenticationFailed(
            "API key not valid".to_string(),
        )));
        let err = gateway(provider)
            .fetch_news("AMD", &key(), ModelId::Pro3Preview)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "無法搜尋產業新聞 (gemini-3-pro-preview)，請確認 API Key 是否正確或稍後再試。"
        );
        assert!(err.is_authorization());
    }

    #[tokio::test]
    async fn test_analyze_prospects_requests_json() {
        let provider = ScriptedProvider::new(Ok(GenerateResponse::text(FULL_ANALYSIS)));
        let analysis = gateway(provider.clone())
            .analyze_prospects("台積電", "summary text", &key(), ModelId::Pro3Preview)
            .await
            .unwrap();
        assert!(analysis.content.starts_with("## 產業前景"));

        let request = provider.last_request();
        assert!(!request.grounding);
        assert!(request.response_format.is_json());
        assert!(request.prompt.contains("\"summary text\""));
    }

    #[tokio::test]
    async fn test_analyze_prospects_errors() {
        let provider = ScriptedProvider::new(Err(LLMError::RateLimitExceeded("429".to_string())));
        let err = gateway(provider)
            .analyze_prospects("AMD", "s", &key(), ModelId::Pro3Preview)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "無法產生策略分析 (gemini-3-pro-preview)，請稍後再試。"
        );
        assert!(!err.is_authorization());

        let provider = ScriptedProvider::new(Ok(GenerateResponse::text("I cannot help")));
        let err = gateway(provider)
            .analyze_prospects("AMD", "s", &key(), ModelId::Flash25)
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::MalformedAnalysis { .. }));
        assert_eq!(err.to_string(), "無法產生策略分析 (gemini-2.5-flash)，請稍後再試。");
    }
}
