//! REPL command parsing

use insight_core::ModelId;
use insight_core::config::HISTORY_LIMIT;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '/{0}', type /help")]
    Unknown(String),

    #[error("/{0} needs a model id, see /models")]
    MissingModel(String),

    #[error("{0}")]
    InvalidModel(String),
}

/// Parsed line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Any line that is not a command
    Search { topic: String },
    /// `1`..`5`: re-run a history entry (1-based)
    Recall { index: usize },
    History,
    /// Clear search history
    ClearHistory,
    /// Enter a new API key
    Key,
    Reset,
    Models,
    SearchModel(ModelId),
    AnalysisModel(ModelId),
    Help,
    Exit,
}

impl ReplCommand {
    /// Parse one trimmed, non-empty line
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let input = input.trim();

        if let Ok(index) = input.parse::<usize>() {
            if (1..=HISTORY_LIMIT).contains(&index) {
                return Ok(ReplCommand::Recall { index });
            }
        }

        let Some(rest) = input.strip_prefix('/') else {
            return Ok(ReplCommand::Search {
                topic: input.to_string(),
            });
        };

        let mut parts = rest.split_whitespace();
        let cmd = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();

        let model = |name: &str| -> Result<ModelId, CommandError> {
            arg.ok_or_else(|| CommandError::MissingModel(name.to_string()))?
                .parse()
                .map_err(|e: insight_core::InsightError| CommandError::InvalidModel(e.to_string()))
        };

        match cmd.as_str() {
            "history" | "h" | "歷史" => Ok(ReplCommand::History),
            "clear" => Ok(ReplCommand::ClearHistory),
            "key" | "k" => Ok(ReplCommand::Key),
            "reset" | "r" | "重新搜尋" => Ok(ReplCommand::Reset),
            "models" | "m" => Ok(ReplCommand::Models),
            "search-model" => Ok(ReplCommand::SearchModel(model("search-model")?)),
            "analysis-model" => Ok(ReplCommand::AnalysisModel(model("analysis-model")?)),
            "help" | "?" => Ok(ReplCommand::Help),
            "exit" | "quit" | "q" => Ok(ReplCommand::Exit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_search() {
        assert_eq!(
            ReplCommand::parse("  台積電 先進封裝 ").unwrap(),
            ReplCommand::Search {
                topic: "台積電 先進封裝".to_string()
            }
        );
    }

    #[test]
    fn test_history_recall() {
        assert_eq!(
            ReplCommand::parse("3").unwrap(),
            ReplCommand::Recall { index: 3 }
        );
        assert!(matches!(
            ReplCommand::parse("6").unwrap(),
            ReplCommand::Search { .. }
        ));
        assert!(matches!(
            ReplCommand::parse("0").unwrap(),
            ReplCommand::Search { .. }
        ));
        assert!(matches!(
            ReplCommand::parse("2330").unwrap(),
            ReplCommand::Search { .. }
        ));
    }

    #[test]
    fn test_commands() {
        assert_eq!(ReplCommand::parse("/history").unwrap(), ReplCommand::History);
        assert_eq!(ReplCommand::parse("/clear").unwrap(), ReplCommand::ClearHistory);
        assert_eq!(ReplCommand::parse("/KEY").unwrap(), ReplCommand::Key);
        assert_eq!(ReplCommand::parse("/reset").unwrap(), ReplCommand::Reset);
        assert_eq!(ReplCommand::parse("/exit").unwrap(), ReplCommand::Exit);
        assert_eq!(
            ReplCommand::parse("/search-model gemini-3-pro-preview").unwrap(),
            ReplCommand::SearchModel(ModelId::Pro3Preview)
        );
        assert_eq!(
            ReplCommand::parse("/analysis-model flash").unwrap(),
            ReplCommand::AnalysisModel(ModelId::Flash25)
        );
    }

    #[test]
    fn test_command_errors() {
        assert_eq!(
            ReplCommand::parse("/bogus"),
            Err(CommandError::Unknown("bogus".to_string()))
        );
        assert_eq!(
            ReplCommand::parse("/search-model"),
            Err(CommandError::MissingModel("search-model".to_string()))
        );
        assert!(matches!(
            ReplCommand::parse("/analysis-model gpt-4"),
            Err(CommandError::InvalidModel(_))
        ));
    }
}
