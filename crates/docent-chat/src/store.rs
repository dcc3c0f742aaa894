//! Session-scoped conversational memory.
//!
//! The store hands out shared history handles keyed by an opaque session
//! id issued by the transport. Histories are created lazily, never pruned,
//! and live for the process lifetime unless the session ends. Every chain
//! bound to a session observes the same handle, so appended turns are
//! visible to all of them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use docent_core::types::ChatTurn;

/// Append-only record of one session's completed turns.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<ChatTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All turns in order of completion.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Record one completed exchange: the user's question, then the
    /// assembled assistant reply.
    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.turns.push(ChatTurn::user(question));
        self.turns.push(ChatTurn::assistant(answer));
    }
}

/// Shared handle to one session's history.
pub type HistoryHandle = Arc<Mutex<ConversationHistory>>;

/// Maps session ids to their conversation histories.
///
/// Creation of histories for different ids may race; the interior lock
/// makes that safe. Access to one session's history is serialized by the
/// transport, which processes at most one message per session at a time.
#[derive(Debug, Default)]
pub struct SessionStore {
    histories: RwLock<HashMap<String, HistoryHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the history handle for a session, allocating an empty history
    /// on first access. Subsequent calls return the same handle.
    pub fn history(&self, session_id: &str) -> HistoryHandle {
        {
            let histories = self
                .histories
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(handle) = histories.get(session_id) {
                return Arc::clone(handle);
            }
        }

        let mut histories = self
            .histories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            histories
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ConversationHistory::new()))),
        )
    }

    /// Drop a session's history when the session ends.
    pub fn remove(&self, session_id: &str) {
        self.histories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }

    /// Number of sessions with an allocated history.
    pub fn session_count(&self) -> usize {
        self.histories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
