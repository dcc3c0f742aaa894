use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DocentError;

// =============================================================================
// Roles and messages
// =============================================================================

/// The author of a prompt message or conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instruction rendered by a chain.
    System,
    /// The human user.
    User,
    /// The model's reply.
    Assistant,
}

impl Role {
    /// Wire name used by chat-completion APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One rendered entry of a model prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One completed turn of a conversation.
///
/// History holds only `User` and `Assistant` turns, in strict alternation
/// starting with `User`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Model selection and chat settings
// =============================================================================

/// The enumerated set of chat models a session may select.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    /// `gpt-oss:20b` (default).
    #[default]
    #[serde(rename = "gpt-oss:20b")]
    GptOss20b,
    /// `phi4`.
    #[serde(rename = "phi4")]
    Phi4,
}

impl ModelId {
    /// Wire name understood by the model server.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::GptOss20b => "gpt-oss:20b",
            ModelId::Phi4 => "phi4",
        }
    }

    /// All selectable models, in display order.
    pub fn all() -> &'static [ModelId] {
        &[ModelId::GptOss20b, ModelId::Phi4]
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelId {
    type Err = DocentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpt-oss:20b" => Ok(ModelId::GptOss20b),
            "phi4" => Ok(ModelId::Phi4),
            other => Err(DocentError::InvalidSettings(format!(
                "unknown model: {}",
                other
            ))),
        }
    }
}

/// Per-session chat configuration collected from the settings form.
///
/// Replaces the original string-keyed settings map with exactly the three
/// fields the system supports, validated at construction time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Selected chat model.
    pub model: ModelId,
    /// Free-text domain label injected into the system prompt.
    pub domain: String,
    /// Sampling temperature in [0, 1].
    pub temperature: f32,
}

impl ChatSettings {
    pub fn new(model: ModelId, domain: impl Into<String>, temperature: f32) -> Self {
        Self {
            model,
            domain: domain.into(),
            temperature,
        }
    }

    /// Reject out-of-range temperatures.
    ///
    /// Out-of-range values are rejected rather than clamped, so a session
    /// never runs with settings the user did not ask for.
    pub fn validate(&self) -> Result<(), DocentError> {
        if !(0.0..=1.0).contains(&self.temperature) || self.temperature.is_nan() {
            return Err(DocentError::InvalidSettings(format!(
                "temperature {} outside [0, 1]",
                self.temperature
            )));
        }
        Ok(())
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: ModelId::default(),
            domain: "IT".to_string(),
            temperature: 0.0,
        }
    }
}
