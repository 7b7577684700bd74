//! Prompt templates for the two provider calls
//!
//! Templates are MiniJinja sources compiled once into an [`Environment`]. The
//! only variable besides the user's input is the output language.

use crate::config::ReportLanguage;
use crate::error::Result;
use minijinja::Environment;
use serde_json::json;

const NEWS_TEMPLATE: &str = "news";
const ANALYSIS_TEMPLATE: &str = "analysis";

const NEWS_PROMPT: &str = r#"Find the latest and most significant news, financial reports, and market trends regarding "{{ topic }}".

CRITICAL DATA VERIFICATION TASK:
1. Search for **Investment Bank Research Reports** (e.g., Morgan Stanley, Goldman Sachs, JP Morgan) and **Local Broker Reports**.
2. Find "Consensus EPS Estimates" vs "Actuals".
3. Look for **Divergence in Price Targets** (Highest vs Lowest targets).

TECHNICAL ANALYSIS DATA NEEDED:
- **Moving Averages**: Find current 20-day (MA20) and 60-day (MA60) moving average prices.
- **Price Action**: Recent support and resistance levels.
- **Trend**: Is the stock above or below these MAs?

If "{{ topic }}" is a public company, you MUST find:
- Current Stock Price.
- Next 12M EPS Forecasts.
- Analyst Ratings (Buy/Sell/Hold counts).

Output Requirement:
Summarize the key events, stock performance, technical levels, and **specifically mention which brokers/institutions provided the data**.
**You MUST write the summary in {{ language_name }}.**
"#;

const ANALYSIS_PROMPT: &str = r#"扮演一位極度嚴謹的華爾街高級金融分析師與技術分析專家 (CMT)。

根據以下關於 "{{ topic }}" 的新聞摘要與卷商報告數據：
"{{ summary }}"

請執行以下任務 ({{ answer_instruction }})：

1. **數據驗證與比對 (Data Verification)**:
   - 仔細比對不同來源的數據 (例如：摩根大通看多，但高盛看空)。
   - 找出市場共識 (Consensus) 與極端值。

2. **財務預測 (Financial Forecasting)**:
   - **EPS 預期**: 提供未來 12-24 個月的 EPS 成長預測。若有卷商具體數據，請引用。
   - **合理股價計算**: 綜合各家卷商目標價，計算 "加權平均合理價"。
   - **漲幅空間**: 計算目前股價相對於合理價的潛在漲幅。

3. **技術面策略 (Granville's Rules & MA Theory)**:
   - 根據葛蘭碧八大法則 (Granville's 8 Rules) 與均線理論 (MA20/MA60) 分析目前走勢。
   - 判斷目前是處於買進訊號 (如: 黃金交叉、乖離過大回檔、均線支撐) 還是賣出訊號。
   - **給出具體的建議買入價格區間 (Entry Zone)** 與 **停損點 (Stop Loss)**。

4. **綜合策略分析**:
   - 結合基本面與技術面，分析產業前景與投資風險。

JSON Output Format:
- strictly follow the schema.
- 'technicalAnalysis.signal': Must be 'BUY', 'SELL', or 'HOLD'.
- 'technicalAnalysis.suggestedEntryZone': specific numbers (e.g., "105.0 - 108.5").
- 'technicalAnalysis.granvilleReasoning': Explain strictly using Granville's rules (e.g., "股價突破翻揚的 20日均線 (法則1)").
"#;

impl ReportLanguage {
    /// Language name as written into the prompts
    pub fn prompt_name(&self) -> &'static str {
        match self {
            ReportLanguage::TraditionalChinese => "Traditional Chinese (繁體中文)",
            ReportLanguage::English => "English",
        }
    }

    fn answer_instruction(&self) -> &'static str {
        match self {
            ReportLanguage::TraditionalChinese => "必須使用繁體中文回答",
            ReportLanguage::English => "必須使用英文回答, answer in English",
        }
    }
}

/// Compiled prompt templates
#[derive(Debug)]
pub struct Prompts {
    env: Environment<'static>,
    language: ReportLanguage,
}

impl Prompts {
    pub fn new(language: ReportLanguage) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(NEWS_TEMPLATE, NEWS_PROMPT)?;
        env.add_template(ANALYSIS_TEMPLATE, ANALYSIS_PROMPT)?;
        Ok(Self { env, language })
    }

    pub fn language(&self) -> ReportLanguage {
        self.language
    }

    /// Grounded search instruction for `topic`
    pub fn news_prompt(&self, topic: &str) -> Result<String> {
        let template = self.env.get_template(NEWS_TEMPLATE)?;
        Ok(template.render(json!({
            "topic": topic,
            "language_name": self.language.prompt_name(),
        }))?)
    }

    /// Analyst instruction over the stage 1 summary
    pub fn analysis_prompt(&self, topic: &str, summary: &str) -> Result<String> {
        let template = self.env.get_template(ANALYSIS_TEMPLATE)?;
        Ok(template.render(json!({
            "topic": topic,
            "summary": summary,
            "answer_instruction": self.language.answer_instruction(),
        }))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_prompt_mentions_topic_and_language() {
        let prompts = Prompts::new(ReportLanguage::TraditionalChinese).unwrap();
        let prompt = prompts.news_prompt("台積電").unwrap();
        assert!(prompt.contains("regarding \"台積電\""));
        assert!(prompt.contains("If \"台積電\" is a public company"));
        assert!(prompt.contains("You MUST write the summary in Traditional Chinese (繁體中文)."));
        assert!(prompt.contains("MA60"));
    }

    #[test]
    fn test_analysis_prompt_interpolates_summary() {
        let prompts = Prompts::new(ReportLanguage::TraditionalChinese).unwrap();
        let prompt = prompts
            .analysis_prompt("NVDA", "Revenue beat <guidance> & \"consensus\"")
            .unwrap();
        assert!(prompt.contains("關於 \"NVDA\""));
        assert!(prompt.contains("Revenue beat <guidance> & \"consensus\""));
        assert!(prompt.contains("必須使用繁體中文回答"));
        assert!(prompt.contains("葛蘭碧八大法則"));
    }

    #[test]
    fn test_english_report_language() {
        let prompts = Prompts::new(ReportLanguage::English).unwrap();
        assert_eq!(prompts.language(), ReportLanguage::English);
        assert!(
            prompts
                .news_prompt("AMD")
                .unwrap()
                .contains("You MUST write the summary in English.")
        );
        assert!(
            prompts
                .analysis_prompt("AMD", "")
                .unwrap()
                .contains("answer in English")
        );
    }
}
