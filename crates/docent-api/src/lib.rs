//! HTTP/SSE transport adapter for the Docent assistant.
//!
//! A thin axum layer that translates HTTP requests into router events and
//! streams reply tokens back over server-sent events. All conversational
//! logic lives in `docent-chat`; this crate only carries it over the wire.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
