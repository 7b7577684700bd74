//! Interactive loop

use crate::commands::ReplCommand;
use crate::dashboard;
use crate::progress::Progress;
use colored::Colorize;
use insight_core::{InsightError, Session};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing::debug;

/// Read one line from stdin; `None` on EOF
pub fn read_line(prompt: &str) -> io::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Ask for an API key; blank input leaves the current one in place
pub fn prompt_for_key(session: &Session) -> anyhow::Result<()> {
    println!(
        "{}",
        "請輸入您的 Google Gemini API Key 以使用搜尋與分析功能。".yellow()
    );
    let Some(value) = read_line("API Key: ")? else {
        session.dismiss_credential_prompt();
        return Ok(());
    };

    if value.is_empty() {
        session.dismiss_credential_prompt();
        if !session.snapshot().has_credential {
            println!("{}", "尚未設定 API Key，可稍後輸入 /key 設定。".dimmed());
        }
        return Ok(());
    }

    session.save_credential(&value)?;
    println!(
        "{} {}",
        "✓ 已儲存 API Key".green(),
        session.credential_hint().unwrap_or_default().dimmed()
    );
    Ok(())
}

async fn search(session: &Session, topic: &str) -> anyhow::Result<()> {
    let progress = Progress::start(session.subscribe(), session.config().loading_message_interval);
    let result = session.submit(topic).await;
    progress.finish().await;

    match result {
        Ok(_) => println!("\n{}\n", dashboard::snapshot(&session.snapshot())),
        Err(InsightError::MissingCredential) => prompt_for_key(session)?,
        Err(InsightError::Superseded { search_id }) => debug!(search_id, "Search superseded"),
        Err(e) => {
            println!("\n{}\n", dashboard::snapshot(&session.snapshot()));
            if e.is_authorization() {
                let wait = session.config().credential_reprompt_delay + Duration::from_millis(500);
                if tokio::time::timeout(wait, session.wait_for_credential_prompt())
                    .await
                    .is_ok()
                {
                    prompt_for_key(session)?;
                }
            }
        }
    }
    Ok(())
}

/// Run until `/exit` or EOF
pub async fn run(session: &Session) -> anyhow::Result<()> {
    println!("{}", dashboard::banner());

    loop {
        let snapshot = session.snapshot();
        if snapshot.credential_prompt {
            prompt_for_key(session)?;
            continue;
        }
        if !snapshot.history.is_empty() && !snapshot.state.is_loading() {
            println!("{}", dashboard::history_chips(&snapshot.history));
        }

        let Some(input) = read_line(&format!("{} ", "›".blue().bold()))? else {
            println!("\nGoodbye!");
            break;
        };
        if input.is_empty() {
            continue;
        }

        let command = match ReplCommand::parse(&input) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", dashboard::error(&e.to_string()));
                continue;
            }
        };

        match command {
            ReplCommand::Search { topic } => search(session, &topic).await?,
            ReplCommand::Recall { index } => {
                match session.snapshot().history.get(index - 1).cloned() {
                    Some(topic) => {
                        println!("{} {topic}", "↻".cyan());
                        search(session, &topic).await?;
                    }
                    None => eprintln!("{}", dashboard::error(&format!("沒有第 {index} 筆搜尋紀錄"))),
                }
            }
            ReplCommand::History => println!("{}", dashboard::history_chips(&session.snapshot().history)),
            ReplCommand::ClearHistory => {
                session.clear_history()?;
                println!("{}", "✓ 已清除搜尋紀錄".green());
            }
            ReplCommand::Key => prompt_for_key(session)?,
            ReplCommand::Reset => {
                session.reset();
                println!("{}", "✓ 已重新開始".green());
            }
            ReplCommand::Models => println!("{}", dashboard::models(&session.snapshot())),
            ReplCommand::SearchModel(model) => {
                session.set_search_model(model);
                println!("搜尋模型: {}", model.name().cyan());
            }
            ReplCommand::AnalysisModel(model) => {
                session.set_analysis_model(model);
                println!("分析模型: {}", model.name().cyan());
            }
            ReplCommand::Help => println!("{}", dashboard::help()),
            ReplCommand::Exit => {
                println!("Goodbye!");
                break;
            }
        }
    }

    Ok(())
}
