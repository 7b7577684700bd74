//! Search session state machine
//!
//! A [`Session`] owns the credential, history and current results, and
//! drives the two gateway calls for each submitted topic:
//!
//! ```text
//! Idle ──submit──▶ Searching ──news ok──▶ Analyzing ──analysis ok──▶ Completed
//!                      │                      │
//!                      └───────failure────────┴──────▶ Error
//! ```
//!
//! Every change is published as a whole [`SessionSnapshot`] on a
//! `tokio::sync::watch` channel. Each submission gets a new search id;
//! results from a search that was replaced (by another submit or a reset)
//! are dropped instead of being applied.

use crate::config::{HISTORY_LIMIT, InsightConfig, ModelId};
use crate::error::{ErrorCategory, InsightError, Result};
use crate::gateway::MarketGateway;
use crate::state::{ClientState, push_recent};
use crate::storage::KeyValueStore;
use crate::types::{AnalysisResult, NewsResult};
use insight_llm::{Credential, GenerativeProvider};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    #[default]
    Idle,
    Searching,
    Analyzing,
    Completed,
    Error,
}

impl AppState {
    /// Whether a provider call is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, AppState::Searching | AppState::Analyzing)
    }
}

/// Everything a front end needs to draw the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: AppState,
    /// Id of the search the results below belong to
    pub search_id: u64,
    pub topic: Option<String>,
    pub news: Option<NewsResult>,
    pub analysis: Option<AnalysisResult>,
    /// User-facing failure message
    pub error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    /// Front end should ask for an API key
    pub credential_prompt: bool,
    pub has_credential: bool,
    /// Recent topics, newest first
    pub history: Vec<String>,
    pub search_model: ModelId,
    pub analysis_model: ModelId,
}

impl SessionSnapshot {
    fn initial(config: &InsightConfig, has_credential: bool, history: Vec<String>) -> Self {
        Self {
            state: AppState::Idle,
            search_id: 0,
            topic: None,
            news: None,
            analysis: None,
            error: None,
            error_category: None,
            credential_prompt: !has_credential,
            has_credential,
            history,
            search_model: config.search_model,
            analysis_model: config.analysis_model,
        }
    }

    fn clear_results(&mut self) {
        self.news = None;
        self.analysis = None;
        self.error = None;
        self.error_category = None;
    }
}

/// Results of a search that reached `Completed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSearch {
    pub search_id: u64,
    pub topic: String,
    pub news: NewsResult,
    pub analysis: AnalysisResult,
    pub search_model: ModelId,
    pub analysis_model: ModelId,
}

/// Interactive search session
pub struct Session {
    config: InsightConfig,
    gateway: MarketGateway,
    client: ClientState,
    credential: Arc<Mutex<Option<Credential>>>,
    next_search_id: AtomicU64,
    state: Arc<watch::Sender<SessionSnapshot>>,
}

impl Session {
    /// Load the saved credential and history and start in `Idle`
    ///
    /// Without a saved credential the snapshot starts with
    /// `credential_prompt` set.
    pub fn open(
        config: InsightConfig,
        provider: Arc<dyn GenerativeProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        config.validate()?;

        let gateway = MarketGateway::new(provider, config.report_language)?;
        let client = ClientState::new(store);
        let credential = client.load_credential()?;
        let history = client.load_history();

        info!(
            has_credential = credential.is_some(),
            history = history.len(),
            provider = gateway.provider_name(),
            "Session opened"
        );

        let snapshot = SessionSnapshot::initial(&config, credential.is_some(), history);
        let (tx, _rx) = watch::channel(snapshot);

        Ok(Self {
            config,
            gateway,
            client,
            credential: Arc::new(Mutex::new(credential)),
            next_search_id: AtomicU64::new(0),
            state: Arc::new(tx),
        })
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    /// Current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Resolves once the session asks for an API key
    pub async fn wait_for_credential_prompt(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this only ends on the flag.
        let _ = rx.wait_for(|s| s.credential_prompt).await;
    }

    fn current_credential(&self) -> Option<Credential> {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_credential(&self, credential: Option<Credential>) {
        let has_credential = credential.is_some();
        *self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = credential;
        self.state.send_modify(|s| {
            s.has_credential = has_credential;
            if has_credential {
                s.credential_prompt = false;
            }
        });
    }

    /// Run both stages for `topic`
    ///
    /// The topic is trimmed and recorded in history before the first call.
    /// Returns [`InsightError::Superseded`] when a later submit or a reset
    /// replaced this search before it finished.
    pub async fn submit(&self, topic: &str) -> Result<CompletedSearch> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(InsightError::EmptyTopic);
        }

        let Some(credential) = self.current_credential() else {
            info!("No API key, requesting one");
            self.state.send_modify(|s| s.credential_prompt = true);
            return Err(InsightError::MissingCredential);
        };

        let (search_model, analysis_model) = {
            let current = self.state.borrow();
            (current.search_model, current.analysis_model)
        };

        // History and search id are assigned under the channel lock, so
        // overlapping submits publish in id order with the latest history.
        let mut search_id = 0;
        self.state.send_modify(|s| {
            let history = match self.client.record_topic(topic) {
                Ok(history) => history,
                Err(e) => {
                    warn!(error = %e, "Failed to persist search history");
                    push_recent(s.history.clone(), topic, HISTORY_LIMIT)
                }
            };
            search_id = self.next_search_id.fetch_add(1, Ordering::SeqCst) + 1;

            s.state = AppState::Searching;
            s.search_id = search_id;
            s.topic = Some(topic.to_string());
            s.history = history;
            s.clear_results();
        });
        info!(search_id, topic, model = %search_model, "Search started");

        let news = match self
            .gateway
            .fetch_news(topic, &credential, search_model)
            .await
        {
            Ok(news) => news,
            Err(e) => return Err(self.fail(search_id, &credential, e)),
        };

        let applied = self.state.send_if_modified(|s| {
            if s.search_id != search_id {
                return false;
            }
            s.news = Some(news.clone());
            s.state = AppState::Analyzing;
            true
        });
        if !applied {
            debug!(search_id, "Dropping news for superseded search");
            return Err(InsightError::Superseded { search_id });
        }
        info!(search_id, sources = news.sources.len(), model = %analysis_model, "Analysis started");

        let analysis = match self
            .gateway
            .analyze_prospects(topic, &news.summary, &credential, analysis_model)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => return Err(self.fail(search_id, &credential, e)),
        };

        let applied = self.state.send_if_modified(|s| {
            if s.search_id != search_id {
                return false;
            }
            s.analysis = Some(analysis.clone());
            s.state = AppState::Completed;
            true
        });
        if !applied {
            debug!(search_id, "Dropping analysis for superseded search");
            return Err(InsightError::Superseded { search_id });
        }
        info!(search_id, "Search completed");

        Ok(CompletedSearch {
            search_id,
            topic: topic.to_string(),
            news,
            analysis,
            search_model,
            analysis_model,
        })
    }

    /// Move to `Error` and, for rejected keys, schedule the key prompt
    fn fail(&self, search_id: u64, credential: &Credential, error: InsightError) -> InsightError {
        let message = error.to_string();
        let category = error.category();

        let applied = self.state.send_if_modified(|s| {
            if s.search_id != search_id {
                return false;
            }
            s.state = AppState::Error;
            s.error = Some(message.clone());
            s.error_category = Some(category);
            true
        });
        if !applied {
            debug!(search_id, error = %error, "Dropping failure for superseded search");
            return InsightError::Superseded { search_id };
        }

        warn!(search_id, error = %error, ?category, "Search failed");

        if error.is_authorization() {
            self.schedule_credential_prompt(search_id, credential.clone());
        }
        error
    }

    /// Ask for a key after the delay, unless the failed search was replaced
    /// or the rejected key was changed in the meantime
    fn schedule_credential_prompt(&self, search_id: u64, rejected: Credential) {
        let state = Arc::clone(&self.state);
        let credential = Arc::clone(&self.credential);
        let delay = self.config.credential_reprompt_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let key_unchanged = credential
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                == Some(&rejected);
            if !key_unchanged {
                debug!(search_id, "API key changed, skipping prompt");
                return;
            }

            let raised = state.send_if_modified(|s| {
                if s.search_id != search_id || s.credential_prompt {
                    return false;
                }
                s.credential_prompt = true;
                true
            });
            if raised {
                debug!(search_id, "Requesting API key after authorization failure");
            }
        });
    }

    /// Back to `Idle`, dropping results and any in-flight search
    pub fn reset(&self) {
        let mut search_id = 0;
        self.state.send_modify(|s| {
            search_id = self.next_search_id.fetch_add(1, Ordering::SeqCst) + 1;
            s.state = AppState::Idle;
            s.search_id = search_id;
            s.topic = None;
            s.clear_results();
        });
        debug!(search_id, "Session reset");
    }

    /// Persist a key and close the prompt
    pub fn save_credential(&self, value: &str) -> Result<()> {
        let credential = self.client.save_credential(value)?;
        self.set_credential(Some(credential));
        Ok(())
    }

    /// Use a key for this process only
    pub fn use_credential(&self, credential: Credential) {
        if credential.is_empty() {
            return;
        }
        self.set_credential(Some(credential));
    }

    /// Masked form of the active key
    pub fn credential_hint(&self) -> Option<String> {
        self.current_credential().map(|c| c.masked())
    }

    pub fn clear_credential(&self) -> Result<()> {
        self.client.clear_credential()?;
        self.set_credential(None);
        Ok(())
    }

    pub fn dismiss_credential_prompt(&self) {
        self.state.send_modify(|s| s.credential_prompt = false);
    }

    pub fn clear_history(&self) -> Result<()> {
        self.client.clear_history()?;
        self.state.send_modify(|s| s.history.clear());
        Ok(())
    }

    /// Model for the next search's news stage
    pub fn set_search_model(&self, model: ModelId) {
        self.state.send_modify(|s| s.search_model = model);
    }

    /// Model for the next search's analysis stage
    pub fn set_analysis_model(&self, model: ModelId) {
        self.state.send_modify(|s| s.analysis_model = model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HISTORY_KEY, InMemoryStore};
    use async_trait::async_trait;
    use insight_llm::{GenerateRequest, GenerateResponse};

    /// Fails the test if the session ever reaches the network
    struct UnreachableProvider;

    #[async_trait]
    impl GenerativeProvider for UnreachableProvider {
        async fn generate(&self, _request: GenerateRequest) -> insight_llm::Result<GenerateResponse> {
            panic!("provider must not be called");
        }

        fn name(&self) -> &str {
            "unreachable"
        }
    }

    fn open(store: Arc<InMemoryStore>) -> Session {
        Session::open(
            InsightConfig::default(),
            Arc::new(UnreachableProvider),
            store,
        )
        .unwrap()
    }

    #[test]
    fn test_open_without_key_requests_prompt() {
        let session = open(Arc::new(InMemoryStore::new()));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, AppState::Idle);
        assert!(snapshot.credential_prompt);
        assert!(!snapshot.has_credential);
        assert_eq!(snapshot.search_model, ModelId::Flash25);
        assert_eq!(snapshot.analysis_model, ModelId::Pro3Preview);
    }

    #[test]
    fn test_open_loads_saved_state() {
        let store = Arc::new(InMemoryStore::new());
        store.set("gemini_api_key", "AIzaSaved123").unwrap();
        store.set(HISTORY_KEY, "[\"NVDA\",\"AMD\"]").unwrap();

        let session = open(store);
        let snapshot = session.snapshot();
        assert!(!snapshot.credential_prompt);
        assert!(snapshot.has_credential);
        assert_eq!(snapshot.history, vec!["NVDA", "AMD"]);
        assert_eq!(session.credential_hint().as_deref(), Some("AIza…123"));
    }

    #[tokio::test]
    async fn test_submit_without_key_stays_idle() {
        let store = Arc::new(InMemoryStore::new());
        let session = open(store.clone());
        session.dismiss_credential_prompt();

        let err = session.submit("台積電").await.unwrap_err();
        assert!(matches!(err, InsightError::MissingCredential));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, AppState::Idle);
        assert!(snapshot.credential_prompt);
        assert!(snapshot.history.is_empty());
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_topic_rejected() {
        let session = open(Arc::new(InMemoryStore::new()));
        session.use_credential(Credential::new("AIzaKey"));
        let before = session.snapshot();

        let err = session.submit("   ").await.unwrap_err();
        assert!(matches!(err, InsightError::EmptyTopic));
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_credential_lifecycle() {
        let store = Arc::new(InMemoryStore::new());
        let session = open(store.clone());

        assert!(session.save_credential("  ").is_err());
        assert!(session.snapshot().credential_prompt);

        session.save_credential("AIzaNewKey99").unwrap();
        let snapshot = session.snapshot();
        assert!(snapshot.has_credential);
        assert!(!snapshot.credential_prompt);
        assert_eq!(
            store.get("gemini_api_key").unwrap().as_deref(),
            Some("AIzaNewKey99")
        );

        session.clear_credential().unwrap();
        assert!(!session.snapshot().has_credential);
        assert_eq!(store.get("gemini_api_key").unwrap(), None);
    }

    #[test]
    fn test_env_credential_is_not_persisted() {
        let store = Arc::new(InMemoryStore::new());
        let session = open(store.clone());
        session.use_credential(Credential::new("AIzaFromEnv1"));
        assert!(session.snapshot().has_credential);
        assert_eq!(store.get("gemini_api_key").unwrap(), None);
    }

    #[test]
    fn test_model_selection_and_reset() {
        let session = open(Arc::new(InMemoryStore::new()));
        session.set_search_model(ModelId::Pro3Preview);
        session.set_analysis_model(ModelId::Flash25);

        let before = session.snapshot().search_id;
        session.reset();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, AppState::Idle);
        assert!(snapshot.search_id > before);
        assert_eq!(snapshot.search_model, ModelId::Pro3Preview);
        assert_eq!(snapshot.analysis_model, ModelId::Flash25);
    }

    #[test]
    fn test_clear_history() {
        let store = Arc::new(InMemoryStore::new());
        store.set(HISTORY_KEY, "[\"NVDA\"]").unwrap();
        let session = open(store.clone());
        session.clear_history().unwrap();
        assert!(session.snapshot().history.is_empty());
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn test_loading_states() {
        assert!(AppState::Searching.is_loading());
        assert!(AppState::Analyzing.is_loading());
        assert!(!AppState::Completed.is_loading());
        assert_eq!(
            serde_json::to_string(&AppState::Analyzing).unwrap(),
            "\"ANALYZING\""
        );
    }
}
