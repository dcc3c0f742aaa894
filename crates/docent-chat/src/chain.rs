//! Conversational and retrieval chains.
//!
//! A chain is a stateless, rebuildable pipeline description bound to
//! validated settings. The conversational variant injects session history
//! and records completed exchanges; the retrieval variant is bound to one
//! document index and never touches history.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use docent_core::error::DocentError;
use docent_core::types::ChatSettings;
use docent_llm::chat::{ChatRequest, DynChatModel, TokenStream};
use docent_llm::embedding::DynEmbeddingService;
use docent_vector::index::DocumentIndex;

use crate::prompt;
use crate::store::{HistoryHandle, SessionStore};

/// Capacity of the forwarded fragment channel.
const REPLY_CHANNEL_CAPACITY: usize = 64;

/// General-chat chain: domain system prompt, full history, streamed reply,
/// history append on completion.
pub struct ConversationalChain {
    model: Arc<dyn DynChatModel>,
    store: Arc<SessionStore>,
    settings: ChatSettings,
}

impl std::fmt::Debug for ConversationalChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationalChain")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ConversationalChain {
    /// Build a chain from validated settings. Out-of-range temperatures
    /// are rejected, never clamped.
    pub fn build(
        model: Arc<dyn DynChatModel>,
        store: Arc<SessionStore>,
        settings: ChatSettings,
    ) -> Result<Self, DocentError> {
        settings.validate()?;
        Ok(Self {
            model,
            store,
            settings,
        })
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Ask a question for a session and stream the reply.
    ///
    /// The question and the assembled reply are appended to the session
    /// history exactly once, when the stream ends successfully. A stream
    /// that errors mid-flight appends nothing; the fragments already
    /// forwarded stand.
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<TokenStream, DocentError> {
        let history = self.store.history(session_id);
        let turns = {
            let guard = history
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.turns().to_vec()
        };

        let messages = prompt::conversational_prompt(&self.settings.domain, &turns, question);
        debug!(
            session_id,
            history_turns = turns.len(),
            model = self.settings.model.as_str(),
            "Conversational chain invoked"
        );

        let upstream = self
            .model
            .complete_boxed(ChatRequest {
                model: self.settings.model,
                messages,
                temperature: self.settings.temperature,
            })
            .await?;

        let (tx, rx) = mpsc::channel(REPLY_CHANNEL_CAPACITY);
        tokio::spawn(forward_and_record(
            upstream,
            tx,
            history,
            question.to_string(),
        ));

        Ok(rx)
    }
}

/// Forward fragments downstream while assembling the reply, then record
/// the completed exchange.
async fn forward_and_record(
    mut upstream: TokenStream,
    tx: mpsc::Sender<Result<String, DocentError>>,
    history: HistoryHandle,
    question: String,
) {
    let mut reply = String::new();

    while let Some(item) = upstream.recv().await {
        match item {
            Ok(fragment) => {
                reply.push_str(&fragment);
                if tx.send(Ok(fragment)).await.is_err() {
                    // Consumer dropped the reply; treat as cancelled and
                    // keep history untouched.
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "Reply stream failed mid-flight");
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }

    history
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .record_exchange(&question, &reply);
}

/// Document-QA chain bound to one immutable index.
///
/// Holds no handle to the session store at all: retrieval answers neither
/// read nor extend conversation history.
pub struct RetrievalChain {
    model: Arc<dyn DynChatModel>,
    embedder: Arc<dyn DynEmbeddingService>,
    index: Arc<DocumentIndex>,
    settings: ChatSettings,
    top_k: usize,
}

impl RetrievalChain {
    pub fn build(
        model: Arc<dyn DynChatModel>,
        embedder: Arc<dyn DynEmbeddingService>,
        index: Arc<DocumentIndex>,
        settings: ChatSettings,
        top_k: usize,
    ) -> Result<Self, DocentError> {
        settings.validate()?;
        Ok(Self {
            model,
            embedder,
            index,
            settings,
            top_k,
        })
    }

    /// Answer a question from the document: embed it with the ingestion
    /// embedder, retrieve the top-k chunks, and stream the reply.
    pub async fn ask(&self, question: &str) -> Result<TokenStream, DocentError> {
        let query = self.embedder.embed_boxed(question).await?;
        let hits = self.index.query(&query, self.top_k)?;
        debug!(
            retrieved = hits.len(),
            model = self.settings.model.as_str(),
            "Retrieval chain invoked"
        );

        let context = prompt::format_context(&hits);
        let messages = prompt::retrieval_prompt(&context, question);

        self.model
            .complete_boxed(ChatRequest {
                model: self.settings.model,
                messages,
                temperature: self.settings.temperature,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::types::{ModelId, Role};
    use docent_llm::chat::MockChatModel;
    use docent_llm::embedding::MockEmbedding;
    use docent_vector::pipeline::IngestPipeline;
    use docent_vector::splitter::TextSplitter;

    fn settings(domain: &str, temperature: f32) -> ChatSettings {
        ChatSettings::new(ModelId::GptOss20b, domain, temperature)
    }

    async fn collect(mut stream: TokenStream) -> (String, Option<DocentError>) {
        let mut text = String::new();
        while let Some(item) = stream.recv().await {
            match item {
                Ok(fragment) => text.push_str(&fragment),
                Err(e) => return (text, Some(e)),
            }
        }
        (text, None)
    }

    async fn build_index(text: &str) -> Arc<DocumentIndex> {
        let pipeline = IngestPipeline::new(
            TextSplitter::new(200, 40).unwrap(),
            Arc::new(MockEmbedding::new()),
        );
        let (index, _) = pipeline.ingest_text("doc.pdf", text).await.unwrap();
        Arc::new(index)
    }

    #[test]
    fn test_build_rejects_invalid_temperature() {
        let model = Arc::new(MockChatModel::new(&[]));
        let store = Arc::new(SessionStore::new());
        let err =
            ConversationalChain::build(model, store, settings("IT", 1.5)).unwrap_err();
        assert!(matches!(err, DocentError::InvalidSettings(_)));
    }

    #[tokio::test]
    async fn test_ask_streams_and_records_history() {
        let mock = MockChatModel::new(&["The ", "answer."]);
        let model: Arc<dyn DynChatModel> = Arc::new(mock.clone());
        let store = Arc::new(SessionStore::new());
        let chain =
            ConversationalChain::build(model, Arc::clone(&store), settings("IT", 0.2)).unwrap();

        let stream = chain.ask("s1", "What is Rust?").await.unwrap();
        let (text, err) = collect(stream).await;
        assert_eq!(text, "The answer.");
        assert!(err.is_none());

        let history = store.history("s1");
        let guard = history.lock().unwrap();
        assert_eq!(guard.len(), 2);
        assert_eq!(guard.turns()[0].role, Role::User);
        assert_eq!(guard.turns()[0].text, "What is Rust?");
        assert_eq!(guard.turns()[1].role, Role::Assistant);
        assert_eq!(guard.turns()[1].text, "The answer.");
    }

    #[tokio::test]
    async fn test_history_alternates_over_turns() {
        let mock = MockChatModel::new(&["reply"]);
        let model: Arc<dyn DynChatModel> = Arc::new(mock);
        let store = Arc::new(SessionStore::new());
        let chain =
            ConversationalChain::build(model, Arc::clone(&store), settings("IT", 0.0)).unwrap();

        for i in 0..3 {
            let stream = chain.ask("s1", &format!("question {}", i)).await.unwrap();
            let _ = collect(stream).await;
        }

        let history = store.history("s1");
        let guard = history.lock().unwrap();
        assert_eq!(guard.len(), 6);
        for (i, turn) in guard.turns().iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role, expected);
        }
    }

    #[tokio::test]
    async fn test_second_ask_includes_prior_history_in_prompt() {
        let mock = MockChatModel::new(&["reply"]);
        let model: Arc<dyn DynChatModel> = Arc::new(mock.clone());
        let store = Arc::new(SessionStore::new());
        let chain =
            ConversationalChain::build(model, Arc::clone(&store), settings("IT", 0.0)).unwrap();

        let _ = collect(chain.ask("s1", "first").await.unwrap()).await;
        let _ = collect(chain.ask("s1", "second").await.unwrap()).await;

        // system + (first, reply) + second question.
        let request = mock.last_request().unwrap();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[1].content, "first");
        assert_eq!(request.messages[2].content, "reply");
        assert_eq!(request.messages[3].content, "second");
    }

    #[tokio::test]
    async fn test_mid_stream_failure_appends_nothing() {
        let mock = MockChatModel::new(&["partial ", "more"]).failing_after(1);
        let model: Arc<dyn DynChatModel> = Arc::new(mock);
        let store = Arc::new(SessionStore::new());
        let chain =
            ConversationalChain::build(model, Arc::clone(&store), settings("IT", 0.0)).unwrap();

        let stream = chain.ask("s1", "question").await.unwrap();
        let (text, err) = collect(stream).await;

        // Delivered fragments stand, the error is surfaced once, and the
        // half-finished exchange never reaches history.
        assert_eq!(text, "partial ");
        assert!(matches!(err, Some(DocentError::Model(_))));
        assert!(store.history("s1").lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_prompt_and_temperature_reach_model() {
        let mock = MockChatModel::new(&["ok"]);
        let model: Arc<dyn DynChatModel> = Arc::new(mock.clone());
        let store = Arc::new(SessionStore::new());
        let chain =
            ConversationalChain::build(model, store, settings("Medicine", 0.0)).unwrap();

        let _ = collect(chain.ask("s1", "What is a fracture?").await.unwrap()).await;

        let request = mock.last_request().unwrap();
        assert!(request.messages[0].content.contains("expert in Medicine"));
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.model, ModelId::GptOss20b);
    }

    #[tokio::test]
    async fn test_retrieval_ask_injects_context_not_history() {
        let text = "Sharded storage layers replicate writes across zones. ".repeat(15);
        let index = build_index(&text).await;

        let mock = MockChatModel::new(&["from ", "context"]);
        let model: Arc<dyn DynChatModel> = Arc::new(mock.clone());
        let chain = RetrievalChain::build(
            model,
            Arc::new(MockEmbedding::new()),
            index,
            settings("IT", 0.1),
            3,
        )
        .unwrap();

        let (reply, err) = collect(chain.ask("how are writes replicated?").await.unwrap()).await;
        assert_eq!(reply, "from context");
        assert!(err.is_none());

        let request = mock.last_request().unwrap();
        // System prompt with context plus the raw question; no history slot.
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.contains("Context:"));
        assert!(request.messages[0].content.contains("replicate writes"));
        assert_eq!(request.messages[1].content, "how are writes replicated?");
    }

    #[tokio::test]
    async fn test_retrieval_retrieves_at_most_top_k() {
        let text = "Unique paragraph about topic number one here. ".repeat(40);
        let index = build_index(&text).await;
        assert!(index.len() > 2);

        let mock = MockChatModel::new(&["ok"]);
        let model: Arc<dyn DynChatModel> = Arc::new(mock.clone());
        let chain = RetrievalChain::build(
            model,
            Arc::new(MockEmbedding::new()),
            index,
            settings("IT", 0.0),
            2,
        )
        .unwrap();

        let _ = collect(chain.ask("question").await.unwrap()).await;

        let request = mock.last_request().unwrap();
        let context = request.messages[0]
            .content
            .split("Context: ")
            .nth(1)
            .unwrap();
        // Two chunks joined by exactly one blank line (the corpus itself
        // contains no newlines).
        assert_eq!(context.matches("\n\n").count(), 1);
    }
}
