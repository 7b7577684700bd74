//! Terminal rendering of session results

use colored::{ColoredString, Colorize};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use insight_core::config::model_display_name;
use insight_core::render::{
    Block, PriceGauge, SignalTone, Span, is_positive_upside, parse_markdown, signal_label,
};
use insight_core::{
    AnalysisResult, FinancialForecast, ModelId, NewsResult, SessionSnapshot, TechnicalAnalysis,
};

const GAUGE_WIDTH: usize = 40;

pub fn banner() -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        " M ".on_blue().white().bold(),
        "MarketInsight AI".bold()
    ));
    out.push_str(&format!(
        "{}\n",
        "結合 Google 即時搜尋與 AI 模型的深度產業分析與估值".dimmed()
    ));
    out.push_str(&format!(
        "{}\n",
        "輸入公司或產業 (例如: 台積電, AI Server, TSLA)，或輸入 /help".dimmed()
    ));
    out
}

pub fn help() -> String {
    [
        "  <topic>                 搜尋並分析 (search and analyze)",
        "  1..5                    重新搜尋歷史紀錄 (re-run a history entry)",
        "  /history                顯示搜尋紀錄",
        "  /clear                  清除搜尋紀錄",
        "  /key                    設定 API Key",
        "  /reset                  清除目前結果",
        "  /models                 顯示可用模型",
        "  /search-model <id>      設定搜尋模型",
        "  /analysis-model <id>    設定分析模型",
        "  /help                   顯示說明",
        "  /exit                   離開",
    ]
    .join("\n")
}

/// History chips, `[1] 台積電  [2] NVDA`
pub fn history_chips(history: &[String]) -> String {
    if history.is_empty() {
        return "尚無搜尋紀錄".dimmed().to_string();
    }
    let chips = history
        .iter()
        .enumerate()
        .map(|(i, topic)| format!("{} {}", format!("[{}]", i + 1).cyan(), topic))
        .collect::<Vec<_>>()
        .join("  ");
    format!("{} {chips}", "最近搜尋:".dimmed())
}

pub fn models(snapshot: &SessionSnapshot) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Model", "Name", "搜尋", "分析"]);

    for model in ModelId::ALL {
        let mark = |selected: bool| if selected { "●" } else { "" };
        table.add_row(vec![
            Cell::new(model.id()),
            Cell::new(model.name()),
            Cell::new(mark(model == snapshot.search_model)).fg(Color::Green),
            Cell::new(mark(model == snapshot.analysis_model)).fg(Color::Green),
        ]);
    }
    table.to_string()
}

pub fn error(message: &str) -> String {
    format!("{} {}", "✗".red().bold(), message.red())
}

/// News, analysis and error of a snapshot, in that order
pub fn snapshot(snapshot: &SessionSnapshot) -> String {
    let mut sections = Vec::new();
    if let Some(news) = &snapshot.news {
        sections.push(news_card(news));
    }
    if let Some(analysis) = &snapshot.analysis {
        sections.push(analysis_card(analysis, snapshot.analysis_model.id()));
    }
    if let Some(message) = &snapshot.error {
        sections.push(error(message));
    }
    sections.join("\n\n")
}

pub fn news_card(news: &NewsResult) -> String {
    let mut out = format!("{}\n\n", "產業新聞與市場動態".bold().underline());
    out.push_str(&markdown(&news.summary));

    if !news.sources.is_empty() {
        out.push_str(&format!("\n\n{}\n", "資料來源".bold()));
        for (i, source) in news.sources.iter().enumerate() {
            out.push_str(&format!(
                "  {} {} {}\n",
                format!("{}.", i + 1).blue(),
                source.title,
                source.uri.dimmed()
            ));
        }
    }
    out
}

pub fn analysis_card(analysis: &AnalysisResult, model: &str) -> String {
    let mut sections = Vec::new();

    if let Some(forecast) = &analysis.financial_forecast {
        sections.push(financial_panel(forecast));
    }
    if let Some(technical) = &analysis.technical_analysis {
        sections.push(technical_panel(technical));
    }

    sections.push(format!(
        "{}  {}\n\n{}",
        "策略分析報告".bold().underline(),
        format!("[{}]", model_display_name(model)).green(),
        markdown(&analysis.content)
    ));

    sections.join("\n\n")
}

fn financial_panel(forecast: &FinancialForecast) -> String {
    let upside_color = if is_positive_upside(&forecast.upside_potential) {
        Color::Green
    } else {
        Color::Red
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "目前股價 (Current)",
            "合理目標價 (Fair Value)",
            "EPS 營收預期",
            "潛在漲幅空間 (Upside)",
        ]);
    table.add_row(vec![
        Cell::new(&forecast.current_price),
        Cell::new(format!("{}\n{}", forecast.fair_value, forecast.valuation_method))
            .fg(Color::Blue),
        Cell::new(&forecast.eps_forecast),
        Cell::new(&forecast.upside_potential).fg(upside_color),
    ]);

    let mut out = format!("{}\n{table}", "財務預測與驗證".bold().underline());

    if let Some(gauge) = PriceGauge::from_forecast(forecast) {
        out.push_str(&format!(
            "\n  0 {} {}\n  {} 目前股價  {} 合理股價",
            gauge.bar(GAUGE_WIDTH),
            "Target".blue(),
            "│".white().bold(),
            "◆".blue()
        ));
    }

    out.push_str(&format!(
        "\n\n{} {}\n{} {}",
        "法人共識 (Analyst Consensus):".blue().bold(),
        forecast.analyst_consensus,
        "數據驗證 (Data Verification):".yellow().bold(),
        forecast.data_verification
    ));
    out
}

fn badge(technical: &TechnicalAnalysis) -> ColoredString {
    let label = signal_label(technical.signal);
    match SignalTone::from(technical.signal) {
        SignalTone::Green => label.green().bold(),
        SignalTone::Red => label.red().bold(),
        SignalTone::Amber => label.yellow().bold(),
    }
}

fn technical_panel(technical: &TechnicalAnalysis) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .add_row(vec![
            Cell::new("建議買入區間 (Entry Zone)"),
            Cell::new(&technical.suggested_entry_zone).fg(Color::Green),
            Cell::new("MA20 (月線)"),
            Cell::new(&technical.ma20).fg(Color::Blue),
        ])
        .add_row(vec![
            Cell::new("停損價格 (Stop Loss)"),
            Cell::new(&technical.stop_loss_price).fg(Color::Red),
            Cell::new("MA60 (季線)"),
            Cell::new(&technical.ma60).fg(Color::Magenta),
        ]);

    format!(
        "{}\n{}  {}\n{table}\n{}",
        "技術面策略 (Granville's 8 Rules)".purple().bold(),
        badge(technical),
        technical.signal_context,
        format!("*分析邏輯: {}", technical.granville_reasoning).dimmed()
    )
}

fn spans(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Span::Plain(text) => text.normal().to_string(),
            Span::Bold(text) => text.white().bold().to_string(),
        })
        .collect()
}

/// Style model markdown for the terminal
pub fn markdown(content: &str) -> String {
    parse_markdown(content)
        .iter()
        .map(|block| match block {
            Block::Heading { level: 1, text } => text.bold().underline().to_string(),
            Block::Heading { level: 2, text } => text.bold().to_string(),
            Block::Heading { text, .. } => text.cyan().bold().to_string(),
            Block::Bullet(items) => format!("  {} {}", "•".blue(), spans(items)),
            Block::Numbered { number, spans: items } => {
                format!("  {} {}", format!("{number}.").blue(), spans(items))
            }
            Block::Blank => String::new(),
            Block::Paragraph(items) => spans(items),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::{InsightConfig, Signal, Source};

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            content: "## 結論\n* **買進** 訊號".to_string(),
            financial_forecast: Some(FinancialForecast {
                current_price: "1,000 TWD".to_string(),
                fair_value: "1,200 TWD".to_string(),
                upside_potential: "-5%".to_string(),
                eps_forecast: "45".to_string(),
                valuation_method: "P/E".to_string(),
                analyst_consensus: "偏多".to_string(),
                data_verification: "一致".to_string(),
            }),
            technical_analysis: Some(TechnicalAnalysis {
                signal: Signal::Sell,
                signal_context: "法則 5".to_string(),
                ma20: "980".to_string(),
                ma60: "950".to_string(),
                suggested_entry_zone: "900 - 920".to_string(),
                stop_loss_price: "880".to_string(),
                granville_reasoning: "跌破月線".to_string(),
            }),
        }
    }

    #[test]
    fn test_markdown_keeps_text() {
        let out = markdown("# 標題\n1. **重點** 一\n- 項目\n\n段落");
        assert!(out.contains("標題"));
        assert!(out.contains("重點"));
        assert!(out.contains("項目"));
        assert!(out.contains("段落"));
        assert_eq!(out.lines().count(), 5);
    }

    #[test]
    fn test_analysis_card_sections() {
        let out = analysis_card(&analysis(), "gemini-3-pro-preview");
        assert!(out.contains("GEMINI 3 PRO"));
        assert!(out.contains("1,200 TWD"));
        assert!(out.contains("賣出訊號 (SELL)"));
        assert!(out.contains("900 - 920"));
        assert!(out.contains("跌破月線"));
        assert!(out.contains("目前股價  "));
    }

    #[test]
    fn test_news_card_lists_sources() {
        let news = NewsResult {
            summary: "摘要".to_string(),
            sources: vec![Source::new("Reuters", "https://r.example")],
        };
        let out = news_card(&news);
        assert!(out.contains("Reuters"));
        assert!(out.contains("https://r.example"));
    }

    #[test]
    fn test_history_chips() {
        let out = history_chips(&["台積電".to_string(), "NVDA".to_string()]);
        assert!(out.contains("台積電"));
        assert!(out.contains("[2]"));
        assert!(history_chips(&[]).contains("尚無搜尋紀錄"));
    }

    #[test]
    fn test_models_table() {
        let config = InsightConfig::default();
        let snapshot = SessionSnapshot {
            state: insight_core::AppState::Idle,
            search_id: 0,
            topic: None,
            news: None,
            analysis: None,
            error: None,
            error_category: None,
            credential_prompt: false,
            has_credential: true,
            history: Vec::new(),
            search_model: config.search_model,
            analysis_model: config.analysis_model,
        };
        let out = models(&snapshot);
        assert!(out.contains("gemini-2.5-flash"));
        assert!(out.contains("Gemini 3 Pro"));
        assert!(super::snapshot(&snapshot).is_empty());
    }
}
