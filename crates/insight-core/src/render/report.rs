//! Plain-text exports of a finished search

use crate::types::{AnalysisResult, NewsResult};
use chrono::{DateTime, Utc};

/// Report text with the forecast blocks followed by the narrative
///
/// Layout matches what users paste into notes: a header naming the analysis
/// model, the optional financial and technical blocks, then `[策略分析]`.
pub fn plain_report(analysis: &AnalysisResult, model: &str) -> String {
    let financials = analysis
        .financial_forecast
        .as_ref()
        .map(|f| {
            format!(
                "\n[財務預測與驗證]\n目前股價: {}\n合理股價: {} ({})\n潛在漲幅: {}\nEPS 預估: {}\n法人共識: {}\n數據驗證: {}\n",
                f.current_price,
                f.fair_value,
                f.valuation_method,
                f.upside_potential,
                f.eps_forecast,
                f.analyst_consensus,
                f.data_verification,
            )
        })
        .unwrap_or_default();

    let technicals = analysis
        .technical_analysis
        .as_ref()
        .map(|t| {
            format!(
                "\n[技術面分析 - 葛蘭碧法則]\n訊號: {} ({})\n建議買入區間: {}\n停損點: {}\nMA20: {} | MA60: {}\n分析邏輯: {}\n",
                t.signal,
                t.signal_context,
                t.suggested_entry_zone,
                t.stop_loss_price,
                t.ma20,
                t.ma60,
                t.granville_reasoning,
            )
        })
        .unwrap_or_default();

    format!(
        "MarketInsight AI 分析報告 ({model})\n\n{financials}\n{technicals}\n[策略分析]\n{}",
        analysis.content
    )
}

/// News summary with a numbered source list
pub fn news_text(news: &NewsResult) -> String {
    let mut out = news.summary.clone();
    if !news.sources.is_empty() {
        out.push_str("\n\n[資料來源]\n");
        for (i, source) in news.sources.iter().enumerate() {
            out.push_str(&format!("{}. {} - {}\n", i + 1, source.title, source.uri));
        }
    }
    out
}

/// Full export written by `--save`: topic, news, report and a timestamp
pub fn export_document(
    topic: &str,
    news: &NewsResult,
    analysis: &AnalysisResult,
    model: &str,
    generated_at: DateTime<Utc>,
) -> String {
    format!(
        "# {topic}\n產生時間: {}\n\n[產業新聞]\n{}\n\n{}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        news_text(news).trim_end(),
        plain_report(analysis, model)
    )
}
