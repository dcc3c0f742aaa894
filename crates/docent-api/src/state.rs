//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use docent_chat::Assistant;

/// Shared application state, cheap to clone across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// The conversational router.
    pub assistant: Arc<Assistant>,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
    /// Server start time for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>, max_upload_mb: u64) -> Self {
        Self {
            assistant,
            max_upload_bytes: (max_upload_mb as usize) * 1024 * 1024,
            start_time: Instant::now(),
        }
    }
}
