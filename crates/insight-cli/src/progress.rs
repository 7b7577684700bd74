//! Spinner that follows the session state

use indicatif::{ProgressBar, ProgressStyle};
use insight_core::render::{loading_message, loading_subtitle};
use insight_core::{AppState, SessionSnapshot};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Running spinner; stop it with [`Progress::finish`]
pub struct Progress {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

fn line(snapshot: &SessionSnapshot, tick: usize) -> Option<String> {
    let message = loading_message(snapshot.state, tick)?;
    let model = match snapshot.state {
        AppState::Analyzing => snapshot.analysis_model,
        _ => snapshot.search_model,
    };
    Some(format!(
        "{message}  {}",
        loading_subtitle(&model.display_name())
    ))
}

impl Progress {
    /// Start drawing on stderr, rotating the message every `interval`
    pub fn start(mut rx: watch::Receiver<SessionSnapshot>, interval: Duration) -> Self {
        let (stop, mut stopped) = oneshot::channel();

        let task = tokio::spawn(async move {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg} {elapsed:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));

            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            let mut tick = 0usize;
            let mut state = rx.borrow().state;

            loop {
                let snapshot = rx.borrow().clone();
                if snapshot.state != state {
                    state = snapshot.state;
                    tick = 0;
                }
                match line(&snapshot, tick) {
                    Some(msg) => bar.set_message(msg),
                    None => bar.set_message(String::new()),
                }

                tokio::select! {
                    _ = &mut stopped => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => tick += 1,
                }
            }

            bar.finish_and_clear();
        });

        Self {
            stop: Some(stop),
            task,
        }
    }

    /// Clear the spinner line
    pub async fn finish(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = self.task.await;
    }
}
