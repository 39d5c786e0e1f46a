//! Core conversation types for the a3s-chat client
//!
//! Turns serialize with camelCase keys; payloads that mirror server
//! responses (`ToolCall`, `ModelInfo`, `SessionInfo`) keep the server's
//! snake_case field names.

use serde::{Deserialize, Serialize};

/// Opaque rich card payload (rendering is the consumer's concern)
pub type CardPayload = serde_json::Value;

/// Media file reference, kept verbatim as sent by the server
pub type MediaRef = serde_json::Value;

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Error,
}

/// One entry in the reconstructed conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Process-unique identifier (turn-<uuid>)
    pub id: String,

    pub role: Role,

    pub content: String,

    /// Unix timestamp in milliseconds
    pub timestamp: u64,

    /// Reasoning text accumulated while the reply streamed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Skill invoked while producing this reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<CardPayload>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaRef>>,
}

impl Turn {
    /// Create a turn with a fresh id and timestamp
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: format!("turn-{}", uuid::Uuid::new_v4()),
            role,
            content: content.into(),
            timestamp: now_millis(),
            reasoning: None,
            tool_calls: None,
            skill: None,
            cards: None,
            media: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Error, content)
    }

    /// A finalized assistant turn carrying rich cards
    pub fn with_cards(cards: Vec<CardPayload>) -> Self {
        let mut turn = Self::assistant("");
        turn.cards = Some(cards);
        turn
    }

    /// A finalized assistant turn carrying media files
    pub fn with_media(files: Vec<MediaRef>) -> Self {
        let mut turn = Self::assistant("");
        turn.media = Some(files);
        turn
    }

    /// Tool calls attached to this turn (empty if none)
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// Lifecycle state of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Done,
}

/// A tool invocation inside an assistant reply
///
/// `call_id` joins the `tool_start` and `tool_done` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,

    pub call_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,

    pub status: ToolStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Latest progress message while running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

impl ToolCall {
    /// Create a running tool call
    pub fn running(
        tool: impl Into<String>,
        call_id: impl Into<String>,
        arguments: Option<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            call_id: call_id.into(),
            arguments,
            status: ToolStatus::Running,
            result: None,
            progress: None,
        }
    }

    /// Transition to `done`. Returns false if already done.
    pub fn complete(&mut self, result: Option<String>) -> bool {
        if self.status == ToolStatus::Done {
            return false;
        }
        self.status = ToolStatus::Done;
        self.result = result;
        self.progress = None;
        true
    }

    pub fn is_running(&self) -> bool {
        self.status == ToolStatus::Running
    }
}

/// One word in the current reasoning ticker viewport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowWord {
    pub text: String,

    /// Absolute index in the reasoning buffer
    pub idx: usize,

    /// Distance from the cursor, for emphasis only
    pub distance: usize,
}

/// Connection state of the transport channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

impl ConnectionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionStatus::Open)
    }
}

/// Server-side session summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(default)]
    pub message_count: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SessionInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// A model offered by the agent runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_policy")]
    pub policy: String,

    #[serde(default = "default_billing_multiplier")]
    pub billing_multiplier: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_efforts: Vec<String>,
}

fn default_policy() -> String {
    "enabled".to_string()
}

fn default_billing_multiplier() -> f64 {
    1.0
}

/// Response of the models endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<ModelInfo>,

    /// Currently active model id
    #[serde(default)]
    pub current: Option<String>,
}

/// An installed agent skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillInfo {
    #[serde(alias = "id")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Current time in Unix milliseconds
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
