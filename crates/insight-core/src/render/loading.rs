//! Rotating status lines shown while a stage is running

use crate::session::AppState;

/// Shown while the grounded search runs
pub const SEARCH_MESSAGES: [&str; 3] = [
    "正在搜尋最新產業新聞...",
    "彙整卷商研究報告...",
    "擷取均線與價格資料...",
];

/// Shown while the structured analysis runs
pub const ANALYSIS_MESSAGES: [&str; 5] = [
    "正在比對各大卷商報告...",
    "驗證財務數據準確性...",
    "計算葛蘭碧八大法則訊號...",
    "分析師評級交叉比對中...",
    "生成策略建議報告...",
];

/// Message for `state` after `tick` intervals, `None` when nothing is loading
pub fn loading_message(state: AppState, tick: usize) -> Option<&'static str> {
    let messages: &[&str] = match state {
        AppState::Searching => &SEARCH_MESSAGES,
        AppState::Analyzing => &ANALYSIS_MESSAGES,
        _ => return None,
    };
    Some(messages[tick % messages.len()])
}

/// Subtitle naming the model doing the work
pub fn loading_subtitle(model_display_name: &str) -> String {
    format!("{model_display_name} 正在驗證市場數據...")
}
