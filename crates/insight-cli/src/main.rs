//! MarketInsight command-line interface
//!
//! Searches recent news about a company or industry with a grounded model
//! call, then asks a second model for a structured forecast and a
//! Granville-rule technical read.
//!
//! # Usage
//!
//! ```bash
//! # Save a key once (or export GEMINI_API_KEY)
//! market-insight key set
//!
//! # One-shot search
//! market-insight search 台積電 --save report.md
//!
//! # Interactive mode
//! market-insight
//! ```

mod commands;
mod dashboard;
mod progress;
mod repl;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use insight_core::render::export_document;
use insight_core::storage::FileStore;
use insight_core::{Credential, InsightConfig, ModelId, ReportLanguage, Session};
use insight_llm::providers::GeminiProvider;
use insight_utils::{AppDirs, LogFormat, LogOptions, init_tracing};
use progress::Progress;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "market-insight")]
#[command(about = "Grounded market news search and prospect analysis", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    /// Provider base URL
    #[arg(long, global = true, env = "GEMINI_API_BASE")]
    api_base: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "MARKET_INSIGHT_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// State file holding the API key and search history
    #[arg(long, global = true, env = "MARKET_INSIGHT_STATE")]
    state_file: Option<PathBuf>,

    /// Report language (zh-TW or en)
    #[arg(long, global = true, env = "MARKET_INSIGHT_LANGUAGE")]
    language: Option<ReportLanguage>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search and analyze a company or industry
    Search {
        /// Company or industry, e.g. 台積電, "AI Server", TSLA
        #[arg(required = true, num_args = 1..)]
        topic: Vec<String>,

        /// Model for the news search stage
        #[arg(long)]
        search_model: Option<ModelId>,

        /// Model for the analysis stage
        #[arg(long)]
        analysis_model: Option<ModelId>,

        /// Write a plain-text report to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent searches
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Manage the saved API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// List available models
    Models,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// Forget all recent searches
    Clear,
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Save a key (prompts when VALUE is omitted)
    Set { value: Option<String> },
    /// Remove the saved key
    Clear,
    /// Show whether a key is configured
    Status,
}

fn build_config(cli: &Cli) -> anyhow::Result<InsightConfig> {
    let mut builder = InsightConfig::builder();
    if let Some(api_base) = &cli.api_base {
        builder = builder.api_base(api_base);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    if let Some(language) = cli.language {
        builder = builder.report_language(language);
    }
    Ok(builder.with_env().build()?)
}

fn open_session(cli: &Cli, config: InsightConfig) -> anyhow::Result<Session> {
    let dirs = cli
        .state_file
        .clone()
        .map_or_else(AppDirs::resolve, AppDirs::with_state_file);
    info!(state_file = %dirs.state_file.display(), "Using state file");

    let store = Arc::new(
        FileStore::open(&dirs.state_file)
            .with_context(|| format!("failed to open {}", dirs.state_file.display()))?,
    );
    let provider = Arc::new(GeminiProvider::with_config(config.gemini_config())?);
    let session = Session::open(config, provider, store)?;

    if !session.snapshot().has_credential {
        if let Some(key) = std::env::var(API_KEY_ENV).ok().and_then(Credential::non_empty) {
            info!("Using API key from {API_KEY_ENV}");
            session.use_credential(key);
        }
    }
    Ok(session)
}

async fn run_search(
    session: &Session,
    topic: &str,
    save: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    if !session.snapshot().has_credential {
        bail!("尚未設定 API Key，請執行 `market-insight key set` 或設定 {API_KEY_ENV}");
    }

    let progress = (!json).then(|| {
        Progress::start(session.subscribe(), session.config().loading_message_interval)
    });
    let result = session.submit(topic).await;
    if let Some(progress) = progress {
        progress.finish().await;
    }

    let done = match result {
        Ok(done) => done,
        Err(e) => {
            if let (false, Some(news)) = (json, &session.snapshot().news) {
                println!("{}\n", dashboard::news_card(news));
            }
            if e.is_authorization() {
                eprintln!("{}", "請確認 API Key: market-insight key set".yellow());
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&done)?);
    } else {
        println!("{}", dashboard::snapshot(&session.snapshot()));
    }

    if let Some(path) = save {
        let document = export_document(
            &done.topic,
            &done.news,
            &done.analysis,
            done.analysis_model.id(),
            chrono::Utc::now(),
        );
        std::fs::write(&path, document)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("{} {}", "✓ 報告已儲存:".green(), path.display());
    }
    Ok(())
}

fn key_command(session: &Session, action: KeyAction) -> anyhow::Result<()> {
    match action {
        KeyAction::Set { value } => {
            let value = match value {
                Some(value) => value,
                None => repl::read_line("API Key: ")?.unwrap_or_default(),
            };
            session.save_credential(&value)?;
            println!(
                "{} {}",
                "✓ 已儲存 API Key".green(),
                session.credential_hint().unwrap_or_default().dimmed()
            );
        }
        KeyAction::Clear => {
            session.clear_credential()?;
            println!("{}", "✓ 已移除 API Key".green());
        }
        KeyAction::Status => match session.credential_hint() {
            Some(hint) => println!("API Key: {} {}", "已設定".green(), hint.dimmed()),
            None => println!("API Key: {}", "未設定".red()),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&LogOptions {
        format: cli.log_format,
        verbose: cli.verbose,
    });

    let config = build_config(&cli)?;
    let session = open_session(&cli, config)?;

    match cli.command {
        None => repl::run(&session).await,
        Some(Commands::Search {
            topic,
            search_model,
            analysis_model,
            save,
            json,
        }) => {
            if let Some(model) = search_model {
                session.set_search_model(model);
            }
            if let Some(model) = analysis_model {
                session.set_analysis_model(model);
            }
            run_search(&session, &topic.join(" "), save, json).await
        }
        Some(Commands::History { action: None }) => {
            let history = session.snapshot().history;
            if history.is_empty() {
                println!("尚無搜尋紀錄");
            }
            for (i, topic) in history.iter().enumerate() {
                println!("{}. {topic}", i + 1);
            }
            Ok(())
        }
        Some(Commands::History {
            action: Some(HistoryAction::Clear),
        }) => {
            session.clear_history()?;
            println!("{}", "✓ 已清除搜尋紀錄".green());
            Ok(())
        }
        Some(Commands::Key { action }) => key_command(&session, action),
        Some(Commands::Models) => {
            println!("{}", dashboard::models(&session.snapshot()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "market-insight",
            "search",
            "AI",
            "Server",
            "--analysis-model",
            "flash",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Search {
                topic,
                analysis_model,
                json,
                ..
            }) => {
                assert_eq!(topic.join(" "), "AI Server");
                assert_eq!(analysis_model, Some(ModelId::Flash25));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_key_and_globals() {
        let cli = Cli::try_parse_from([
            "market-insight",
            "key",
            "set",
            "AIzaTest",
            "--log-format",
            "json",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.timeout, Some(30));
        assert!(matches!(
            cli.command,
            Some(Commands::Key {
                action: KeyAction::Set { value: Some(_) }
            })
        ));
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(
            Cli::try_parse_from(["market-insight", "search", "x", "--search-model", "gpt-4"])
                .is_err()
        );
    }
}
