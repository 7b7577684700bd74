//! Presentation helpers shared by front ends
//!
//! Nothing here touches a terminal; the CLI styles these structures.

pub mod gauge;
pub mod loading;
pub mod markdown;
pub mod report;

pub use gauge::{PriceGauge, SignalTone, is_positive_upside, parse_price, signal_label};
pub use loading::{ANALYSIS_MESSAGES, SEARCH_MESSAGES, loading_message, loading_subtitle};
pub use markdown::{Block, Span, parse_markdown, split_bold};
pub use report::{export_document, news_text, plain_report};
