//! Result types produced by the two pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder when the search stage returns no text
pub const NO_SUMMARY: &str = "無法取得摘要。";

/// Placeholder when the analysis stage returns no narrative
pub const NO_ANALYSIS: &str = "無法產生分析報告。";

/// Title used for a citation without one
pub const DEFAULT_SOURCE_TITLE: &str = "Web Source";

/// Link used for a citation without one
pub const DEFAULT_SOURCE_URI: &str = "#";

/// A web page the search stage cited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl Source {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }
}

/// Output of the grounded news search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsResult {
    /// Narrative summary (markdown)
    pub summary: String,
    /// Cited pages, deduplicated by uri
    pub sources: Vec<Source>,
}

/// Valuation and consensus block of the analysis
///
/// Values are display strings as the model wrote them ("1,050 TWD", "+15%").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialForecast {
    pub current_price: String,
    pub fair_value: String,
    pub upside_potential: String,
    pub eps_forecast: String,
    pub valuation_method: String,
    pub analyst_consensus: String,
    pub data_verification: String,
}

/// Trading signal derived from Granville's rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moving-average read of the price action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalAnalysis {
    pub signal: Signal,
    pub signal_context: String,
    pub ma20: String,
    pub ma60: String,
    pub suggested_entry_zone: String,
    pub stop_loss_price: String,
    pub granville_reasoning: String,
}

/// Output of the structured analysis stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Markdown narrative
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_forecast: Option<FinancialForecast>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_analysis: Option<TechnicalAnalysis>,
}
