//! Conversational engine for Docent.
//!
//! Owns per-session conversational memory, builds the conversational and
//! retrieval chains, and routes each incoming message to the right chain
//! based on whether the session has an ingested document.

pub mod chain;
pub mod error;
pub mod prompt;
pub mod router;
pub mod store;

pub use chain::{ConversationalChain, RetrievalChain};
pub use error::ChatError;
pub use router::{Assistant, RouterReply, SessionMode};
pub use store::{ConversationHistory, SessionStore};
