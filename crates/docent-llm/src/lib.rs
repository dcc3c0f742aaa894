//! Docent LLM crate - chat-model and embedding collaborator interfaces.
//!
//! Provides the streaming `ChatModel` trait with an Ollama-backed
//! implementation and a scripted mock, and the `EmbeddingService` trait
//! with the matching Ollama and mock backends. Replies are delivered as an
//! explicit producer/consumer channel of text fragments.

pub mod chat;
pub mod embedding;

pub use chat::{ChatModel, ChatRequest, DynChatModel, MockChatModel, OllamaChatModel, TokenStream};
pub use embedding::{DynEmbeddingService, EmbeddingService, MockEmbedding, OllamaEmbedding};
