//! Line-oriented markdown reader for model output
//!
//! Only the constructs the analysis text actually uses are recognised:
//! headings, bullets, numbered items, blank lines and `**bold**` spans.

use regex::Regex;
use std::sync::LazyLock;

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*.*?\*\*").expect("valid bold pattern"));

static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("valid numbered pattern"));

/// Inline run of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Plain(String),
    Bold(String),
}

impl Span {
    pub fn text(&self) -> &str {
        match self {
            Span::Plain(text) | Span::Bold(text) => text,
        }
    }
}

/// One rendered line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// `#`, `##` or `###`
    Heading { level: u8, text: String },
    Bullet(Vec<Span>),
    Numbered { number: String, spans: Vec<Span> },
    Blank,
    Paragraph(Vec<Span>),
}

/// Split `content` into blocks, one per line
pub fn parse_markdown(content: &str) -> Vec<Block> {
    if content.is_empty() {
        return Vec::new();
    }
    content.split('\n').map(parse_line).collect()
}

fn parse_line(line: &str) -> Block {
    for (prefix, level) in [("### ", 3), ("## ", 2), ("# ", 1)] {
        if let Some(text) = line.strip_prefix(prefix) {
            return Block::Heading {
                level,
                text: text.to_string(),
            };
        }
    }

    let trimmed = line.trim();

    if let Some(text) = trimmed
        .strip_prefix("* ")
        .or_else(|| trimmed.strip_prefix("- "))
    {
        return Block::Bullet(split_bold(text));
    }

    if NUMBERED.is_match(trimmed) {
        let (number, rest) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        return Block::Numbered {
            number: number.to_string(),
            spans: split_bold(rest.trim()),
        };
    }

    if trimmed.is_empty() {
        return Block::Blank;
    }

    Block::Paragraph(split_bold(line))
}

/// Split `text` around `**bold**` runs; empty plain runs are dropped
pub fn split_bold(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for m in BOLD.find_iter(text) {
        if m.start() > last {
            spans.push(Span::Plain(text[last..m.start()].to_string()));
        }
        let inner = &m.as_str()[2..m.as_str().len() - 2];
        spans.push(Span::Bold(inner.to_string()));
        last = m.end();
    }

    if last < text.len() {
        spans.push(Span::Plain(text[last..].to_string()));
    }

    spans
}

/// Flatten blocks back to unstyled text
pub fn plain_text(blocks: &[Block]) -> String {
    let joined = |spans: &[Span]| spans.iter().map(Span::text).collect::<String>();

    blocks
        .iter()
        .map(|block| match block {
            Block::Heading { text, .. } => text.clone(),
            Block::Bullet(spans) => format!("• {}", joined(spans)),
            Block::Numbered { number, spans } => format!("{number}. {}", joined(spans)),
            Block::Blank => String::new(),
            Block::Paragraph(spans) => joined(spans),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_use_raw_line() {
        let blocks = parse_markdown("# 標題\n## 產業前景\n### 風險\n  ## indented");
        assert_eq!(
            blocks[0],
            Block::Heading {
                level: 1,
                text: "標題".to_string()
            }
        );
        assert_eq!(
            blocks[1],
            Block::Heading {
                level: 2,
                text: "產業前景".to_string()
            }
        );
        assert_eq!(
            blocks[2],
            Block::Heading {
                level: 3,
                text: "風險".to_string()
            }
        );
        assert!(matches!(blocks[3], Block::Paragraph(_)));
    }

    #[test]
    fn test_bullets_and_bold() {
        let blocks = parse_markdown("  * **EPS** 成長 20%\n- plain");
        assert_eq!(
            blocks[0],
            Block::Bullet(vec![
                Span::Bold("EPS".to_string()),
                Span::Plain(" 成長 20%".to_string()),
            ])
        );
        assert_eq!(blocks[1], Block::Bullet(vec![Span::Plain("plain".to_string())]));
    }

    #[test]
    fn test_numbered_keeps_text_after_first_dot() {
        let blocks = parse_markdown("12. 目標價 1.2 倍");
        assert_eq!(
            blocks[0],
            Block::Numbered {
                number: "12".to_string(),
                spans: vec![Span::Plain("目標價 1.2 倍".to_string())],
            }
        );
    }

    #[test]
    fn test_blank_and_paragraph() {
        let blocks = parse_markdown("a **b** c\n   \n");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph(vec![
                    Span::Plain("a ".to_string()),
                    Span::Bold("b".to_string()),
                    Span::Plain(" c".to_string()),
                ]),
                Block::Blank,
                Block::Blank,
            ]
        );
        assert!(parse_markdown("").is_empty());
    }

    #[test]
    fn test_unclosed_bold_is_plain() {
        assert_eq!(split_bold("**open"), vec![Span::Plain("**open".to_string())]);
        assert_eq!(split_bold("****"), vec![Span::Bold(String::new())]);
    }

    #[test]
    fn test_plain_text() {
        let blocks = parse_markdown("## 結論\n* **買進**\n1. 第一");
        assert_eq!(plain_text(&blocks), "結論\n• 買進\n1. 第一");
    }
}
