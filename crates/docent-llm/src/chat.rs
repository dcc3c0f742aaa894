//! Chat-model trait and implementations.
//!
//! - `OllamaChatModel` talks to an Ollama server's `/api/chat` endpoint with
//!   `stream: true` and forwards reply fragments as they arrive.
//! - `MockChatModel` emits a scripted reply and records every request, for
//!   testing chains and routing without a model server.
//!
//! Replies are delivered through a bounded mpsc channel: the model-call side
//! produces fragments, the router consumes and forwards them. Dropping the
//! receiver cancels the producer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use docent_core::error::DocentError;
use docent_core::types::{ModelId, PromptMessage};

/// Capacity of the per-reply fragment channel.
const TOKEN_CHANNEL_CAPACITY: usize = 64;

/// A single model invocation: which model, the rendered prompt, and the
/// sampling temperature.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub model: ModelId,
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
}

/// Receiver side of a streamed reply.
///
/// Fragments arrive in model-emission order. The channel closing without a
/// prior `Err` means the reply completed; an `Err` item terminates the
/// stream (nothing follows it).
pub type TokenStream = mpsc::Receiver<Result<String, DocentError>>;

/// Service that turns a rendered prompt into a streamed reply.
pub trait ChatModel: Send + Sync {
    /// Start a completion and return the fragment stream.
    ///
    /// Returns an error only if the request itself cannot be started;
    /// mid-stream failures arrive through the stream.
    fn complete(
        &self,
        request: ChatRequest,
    ) -> impl std::future::Future<Output = Result<TokenStream, DocentError>> + Send;
}

/// Object-safe version of [`ChatModel`] for dynamic dispatch.
///
/// `ChatModel::complete` returns `impl Future`, so the trait is not
/// object-safe. This variant boxes the future, allowing
/// `Arc<dyn DynChatModel>` to be shared across chains without generics.
/// A blanket implementation covers every `ChatModel`.
pub trait DynChatModel: Send + Sync {
    fn complete_boxed<'a>(
        &'a self,
        request: ChatRequest,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<TokenStream, DocentError>> + Send + 'a>,
    >;
}

impl<T: ChatModel> DynChatModel for T {
    fn complete_boxed<'a>(
        &'a self,
        request: ChatRequest,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<TokenStream, DocentError>> + Send + 'a>,
    > {
        Box::pin(self.complete(request))
    }
}

// ---------------------------------------------------------------------------
// OllamaChatModel - streaming /api/chat client
// ---------------------------------------------------------------------------

/// Request body for Ollama `/api/chat`.
#[derive(Debug, Serialize)]
struct OllamaChatBody {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Message in Ollama wire format.
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

/// One newline-delimited JSON chunk of a streamed Ollama reply.
#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Ollama-backed chat model.
///
/// One instance serves every session; the model name and temperature travel
/// with each [`ChatRequest`].
#[derive(Debug, Clone)]
pub struct OllamaChatModel {
    client: reqwest::Client,
    host: String,
}

impl OllamaChatModel {
    /// Create a client for the given Ollama host.
    ///
    /// `read_timeout_secs` bounds the silence between stream chunks, not
    /// the total reply duration.
    pub fn new(host: impl Into<String>, read_timeout_secs: u64) -> Result<Self, DocentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .build()
            .map_err(|e| DocentError::Model(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: host.into(),
        })
    }

    fn to_wire(messages: &[PromptMessage]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }
}

impl ChatModel for OllamaChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<TokenStream, DocentError> {
        let body = OllamaChatBody {
            model: request.model.as_str().to_string(),
            messages: Self::to_wire(&request.messages),
            stream: true,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| DocentError::Model(format!("chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(DocentError::Model(format!(
                "chat request returned {}: {}",
                status, detail
            )));
        }

        debug!(model = request.model.as_str(), "Chat stream opened");

        let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);
        tokio::spawn(read_chat_stream(response, tx));

        Ok(rx)
    }
}

/// Drain a streaming `/api/chat` response into the fragment channel.
///
/// Chunks are newline-delimited JSON objects; a fragment may be split
/// across HTTP chunks, so bytes are buffered until a full line arrives.
async fn read_chat_stream(
    response: reqwest::Response,
    tx: mpsc::Sender<Result<String, DocentError>>,
) {
    use futures::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Chat stream read failed");
                let _ = tx
                    .send(Err(DocentError::Model(format!("stream read failed: {}", e))))
                    .await;
                return;
            }
        };

        buffer.extend_from_slice(&chunk);

        while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parsed: OllamaChatChunk = match serde_json::from_str(line) {
                Ok(p) => p,
                Err(e) => {
                    let _ = tx
                        .send(Err(DocentError::Model(format!(
                            "malformed stream chunk: {}",
                            e
                        ))))
                        .await;
                    return;
                }
            };

            if let Some(error) = parsed.error {
                let _ = tx.send(Err(DocentError::Model(error))).await;
                return;
            }

            if let Some(message) = parsed.message {
                if !message.content.is_empty()
                    && tx.send(Ok(message.content)).await.is_err()
                {
                    // Receiver dropped: the reply was cancelled downstream.
                    return;
                }
            }

            if parsed.done {
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockChatModel - scripted replies for testing
// ---------------------------------------------------------------------------

/// Mock chat model that streams a fixed fragment script.
///
/// Records every request so tests can assert on the rendered prompt and the
/// temperature the chain passed through. `failing_after(n)` makes the
/// stream emit an error after `n` fragments, for mid-stream failure tests.
#[derive(Debug, Clone, Default)]
pub struct MockChatModel {
    script: Vec<String>,
    fail_after: Option<usize>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockChatModel {
    /// A mock that streams the given fragments and completes.
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            script: fragments.iter().map(|s| s.to_string()).collect(),
            fail_after: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that emits `n` fragments of the script and then fails.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// All requests observed so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl ChatModel for MockChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<TokenStream, DocentError> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request);

        let script = self.script.clone();
        let script_len = script.len();
        let fail_after = self.fail_after;
        let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            for (i, fragment) in script.into_iter().enumerate() {
                if fail_after == Some(i) {
                    let _ = tx
                        .send(Err(DocentError::Model("mock stream failure".to_string())))
                        .await;
                    return;
                }
                if tx.send(Ok(fragment)).await.is_err() {
                    return;
                }
            }
            // A failure point past the end of the script fails after the
            // last fragment.
            if fail_after.is_some_and(|n| n >= script_len) {
                let _ = tx
                    .send(Err(DocentError::Model("mock stream failure".to_string())))
                    .await;
            }
        });

        Ok(rx)
    }
}
