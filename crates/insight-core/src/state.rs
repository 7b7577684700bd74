//! Saved credential and recent-search history

use crate::config::HISTORY_LIMIT;
use crate::error::{InsightError, Result};
use crate::storage::{CREDENTIAL_KEY, HISTORY_KEY, KeyValueStore};
use insight_llm::Credential;
use std::sync::Arc;

/// Client state persisted between runs
#[derive(Clone)]
pub struct ClientState {
    store: Arc<dyn KeyValueStore>,
}

impl ClientState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Saved key, if one is stored and not blank
    pub fn load_credential(&self) -> Result<Option<Credential>> {
        Ok(self
            .store
            .get(CREDENTIAL_KEY)?
            .and_then(Credential::non_empty))
    }

    /// Persist a key; blank input is rejected
    pub fn save_credential(&self, value: &str) -> Result<Credential> {
        let credential = Credential::non_empty(value).ok_or(InsightError::MissingCredential)?;
        self.store.set(CREDENTIAL_KEY, credential.expose())?;
        tracing::info!(key = %credential.masked(), "Saved API key");
        Ok(credential)
    }

    pub fn clear_credential(&self) -> Result<()> {
        self.store.remove(CREDENTIAL_KEY)?;
        tracing::info!("Cleared API key");
        Ok(())
    }

    /// Recent topics, newest first
    ///
    /// Unreadable history is logged and treated as empty.
    pub fn load_history(&self) -> Vec<String> {
        match self.store.get(HISTORY_KEY) {
            Ok(raw) => parse_history(raw.as_deref()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read search history");
                Vec::new()
            }
        }
    }

    /// Move `topic` to the front of the history and persist it
    pub fn record_topic(&self, topic: &str) -> Result<Vec<String>> {
        let mut recorded = Vec::new();
        self.store.update(HISTORY_KEY, &mut |current| {
            recorded = push_recent(parse_history(current), topic, HISTORY_LIMIT);
            Ok(Some(serde_json::to_string(&recorded)?))
        })?;
        Ok(recorded)
    }

    pub fn clear_history(&self) -> Result<()> {
        self.store.remove(HISTORY_KEY)
    }
}

fn parse_history(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to parse search history");
        Vec::new()
    })
}

/// Insert `topic` at the front, dropping an older copy and anything past `limit`
pub fn push_recent(mut history: Vec<String>, topic: &str, limit: usize) -> Vec<String> {
    history.retain(|t| t != topic);
    history.insert(0, topic.to_string());
    history.truncate(limit);
    history
}
