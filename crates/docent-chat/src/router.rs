//! Message router and session lifecycle.
//!
//! The `Assistant` owns per-session state and exposes the event-handler
//! surface the host transport invokes: session start, settings submission,
//! document upload, incoming message, action callback, session end. Each
//! message is dispatched to the retrieval chain when the session has an
//! ingested document, and to the conversational chain otherwise.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use docent_core::types::ChatSettings;
use docent_llm::chat::{DynChatModel, TokenStream};
use docent_llm::embedding::DynEmbeddingService;
use docent_vector::index::DocumentIndex;
use docent_vector::pipeline::{IngestPipeline, IngestReport};

use crate::chain::{ConversationalChain, RetrievalChain};
use crate::error::ChatError;
use crate::store::SessionStore;

/// Reply sent when a message arrives before the agent is configured.
pub const CONFIGURE_SETTINGS_NOTICE: &str = "Please configure the settings for our chat";

/// Fixed reply to the thanks action.
const THANKS_REPLY: &str = "Thank you too!";

/// Routing state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    /// No document ingested; messages go to the conversational chain.
    General,
    /// A document index is attached; messages go to the retrieval chain.
    DocumentQa,
}

/// Outcome of routing one message.
#[derive(Debug)]
pub enum RouterReply {
    /// A streamed model reply.
    Tokens(TokenStream),
    /// A plain notice sent instead of invoking a model.
    Notice(String),
}

#[derive(Default)]
struct SessionState {
    name: Option<String>,
    settings: Option<ChatSettings>,
    chain: Option<Arc<ConversationalChain>>,
    index: Option<Arc<DocumentIndex>>,
    started_at: Option<DateTime<Utc>>,
    last_message_at: Option<DateTime<Utc>>,
}

/// Session-scoped conversational router.
pub struct Assistant {
    model: Arc<dyn DynChatModel>,
    embedder: Arc<dyn DynEmbeddingService>,
    store: Arc<SessionStore>,
    pipeline: IngestPipeline,
    top_k: usize,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl Assistant {
    pub fn new(
        model: Arc<dyn DynChatModel>,
        embedder: Arc<dyn DynEmbeddingService>,
        store: Arc<SessionStore>,
        pipeline: IngestPipeline,
        top_k: usize,
    ) -> Self {
        Self {
            model,
            embedder,
            store,
            pipeline,
            top_k,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The session store backing conversational memory.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Start a session and return the greeting.
    pub fn on_session_start(&self, session_id: &str, name: Option<String>) -> String {
        let greeting = format!(
            "Hello, {}! Please configure the settings for our chat",
            name.as_deref().unwrap_or("stranger")
        );

        let state = SessionState {
            name,
            started_at: Some(Utc::now()),
            ..SessionState::default()
        };
        self.lock_sessions().insert(session_id.to_string(), state);

        info!(session_id, "Session started");
        greeting
    }

    /// Apply submitted settings: validate, then (re)build the
    /// conversational chain. Invalid settings leave any previously built
    /// chain and settings intact.
    pub fn on_settings(&self, session_id: &str, settings: ChatSettings) -> Result<(), ChatError> {
        {
            let sessions = self.lock_sessions();
            if !sessions.contains_key(session_id) {
                return Err(ChatError::SessionNotFound(session_id.to_string()));
            }
        }

        let chain = ConversationalChain::build(
            Arc::clone(&self.model),
            Arc::clone(&self.store),
            settings.clone(),
        )?;

        let mut sessions = self.lock_sessions();
        let state = sessions
            .get_mut(session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
        state.settings = Some(settings);
        state.chain = Some(Arc::new(chain));

        info!(session_id, "Settings applied, conversational chain rebuilt");
        Ok(())
    }

    /// Ingest an uploaded document and attach its index to the session.
    ///
    /// Ingestion failures leave any previously attached index untouched;
    /// a successful ingestion replaces it atomically.
    pub async fn on_upload(
        &self,
        session_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, ChatError> {
        {
            let sessions = self.lock_sessions();
            if !sessions.contains_key(session_id) {
                return Err(ChatError::SessionNotFound(session_id.to_string()));
            }
        }

        let (index, report) = self.pipeline.ingest_bytes(filename, bytes).await?;
        self.attach_index(session_id, index)?;
        Ok(report)
    }

    /// Attach a freshly built index to a session, replacing any prior one.
    ///
    /// The swap happens under the session lock: a message routed
    /// concurrently observes either the fully-old or the fully-new index.
    pub fn attach_index(&self, session_id: &str, index: DocumentIndex) -> Result<(), ChatError> {
        let mut sessions = self.lock_sessions();
        let state = sessions
            .get_mut(session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        let replaced = state.index.replace(Arc::new(index)).is_some();
        info!(session_id, replaced, "Document index attached");
        Ok(())
    }

    /// Route one incoming message to the appropriate chain.
    pub async fn on_message(&self, session_id: &str, text: &str) -> Result<RouterReply, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let mode = self
            .session_mode(session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        let routed = match mode {
            SessionMode::DocumentQa => self.route_document_qa(session_id, text).await,
            SessionMode::General => self.route_general(session_id, text).await,
        };

        match routed {
            // An unconfigured agent is an expected state: prompt for
            // settings instead of surfacing an error.
            Err(ChatError::NotConfigured) => {
                Ok(RouterReply::Notice(CONFIGURE_SETTINGS_NOTICE.to_string()))
            }
            other => other,
        }
    }

    async fn route_document_qa(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<RouterReply, ChatError> {
        match self.retrieval_chain(session_id)? {
            Some(chain) => {
                self.touch(session_id);
                let stream = chain.ask(text).await?;
                Ok(RouterReply::Tokens(stream))
            }
            None => {
                // The index vanished between routing and chain construction.
                warn!(session_id, "Document index disappeared before retrieval");
                Err(ChatError::Internal(
                    "the document index is no longer available; please re-upload".to_string(),
                ))
            }
        }
    }

    async fn route_general(&self, session_id: &str, text: &str) -> Result<RouterReply, ChatError> {
        let chain = {
            let sessions = self.lock_sessions();
            let state = sessions
                .get(session_id)
                .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
            state.chain.clone().ok_or(ChatError::NotConfigured)?
        };

        self.touch(session_id);
        let stream = chain.ask(session_id, text).await?;
        Ok(RouterReply::Tokens(stream))
    }

    /// Build the retrieval chain for a session.
    ///
    /// Returns `None` when the session has no document index, and
    /// `NotConfigured` when an index exists but settings were never
    /// submitted (the model choice comes from the settings form).
    pub fn retrieval_chain(&self, session_id: &str) -> Result<Option<RetrievalChain>, ChatError> {
        let sessions = self.lock_sessions();
        let state = sessions
            .get(session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

        let Some(index) = state.index.clone() else {
            return Ok(None);
        };
        let settings = state.settings.clone().ok_or(ChatError::NotConfigured)?;

        let chain = RetrievalChain::build(
            Arc::clone(&self.model),
            Arc::clone(&self.embedder),
            index,
            settings,
            self.top_k,
        )?;
        Ok(Some(chain))
    }

    /// Handle a registered action callback.
    pub fn on_action(&self, session_id: &str, action: &str) -> Result<String, ChatError> {
        {
            let sessions = self.lock_sessions();
            if !sessions.contains_key(session_id) {
                return Err(ChatError::SessionNotFound(session_id.to_string()));
            }
        }

        match action {
            "thanks" => Ok(THANKS_REPLY.to_string()),
            other => Err(ChatError::UnknownAction(other.to_string())),
        }
    }

    /// End a session, dropping its state and history.
    pub fn on_session_end(&self, session_id: &str) {
        self.lock_sessions().remove(session_id);
        self.store.remove(session_id);
        info!(session_id, "Session ended");
    }

    /// Current routing mode of a session, if it exists.
    pub fn session_mode(&self, session_id: &str) -> Option<SessionMode> {
        let sessions = self.lock_sessions();
        sessions.get(session_id).map(|state| {
            if state.index.is_some() {
                SessionMode::DocumentQa
            } else {
                SessionMode::General
            }
        })
    }

    /// Display name recorded at session start.
    pub fn session_name(&self, session_id: &str) -> Option<String> {
        self.lock_sessions()
            .get(session_id)
            .and_then(|state| state.name.clone())
    }

    /// Number of live sessions.
    pub fn active_sessions(&self) -> usize {
        self.lock_sessions().len()
    }

    fn touch(&self, session_id: &str) {
        if let Some(state) = self.lock_sessions().get_mut(session_id) {
            state.last_message_at = Some(Utc::now());
        }
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionState>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
