//! Core conversation types for the Bureau workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a conversation
pub type ConversationId = String;

/// Unique identifier for a message within a conversation
pub type MessageId = String;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

/// User feedback on an agent message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Feedback {
    Helpful,
    NotHelpful,
}

/// Execution status of a single tool call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Running,
    Done,
    Error,
}

/// One tool invocation surfaced on an agent message.
///
/// Created in `Running` state when the provider signals the call start and
/// patched to `Done`/`Error` exactly once. Several tool calls on one message
/// may be running concurrently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    pub status: ToolCallStatus,
}

impl ToolCall {
    /// Create a tool call in the `Running` state
    pub fn running(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            output: None,
            status: ToolCallStatus::Running,
        }
    }
}

/// Status of a plan step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Error,
}

/// One step of an agent's inline plan.
///
/// Steps advance strictly `Pending` → `Running` → `Done` (or `Error` on
/// abort), one running at a time, in array order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStep {
    pub id: String,
    pub label: String,
    pub status: StepStatus,
}

impl AgentStep {
    /// Create a pending step with a fresh id
    pub fn pending(label: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            status: StepStatus::Pending,
        }
    }
}

/// A single chat message.
///
/// `content` is append-only while `is_streaming` is set; once streaming ends
/// (finish or interrupt) the content is immutable by contract. A message is
/// never both streaming and interrupted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID (UUID), insertion-ordered within a conversation
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "isStreaming", default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub interrupted: bool,
    /// Accumulated thinking trace, independent of `content`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(rename = "isThinking", default)]
    pub is_thinking: bool,
    #[serde(rename = "toolCalls", default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<AgentStep>,
    /// Title of the plan this message carries, when a plan was detected
    #[serde(rename = "taskTitle", skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl ChatMessage {
    fn new(role: MessageRole, content: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
            is_streaming: false,
            interrupted: false,
            thinking: None,
            is_thinking: false,
            tool_calls: Vec::new(),
            steps: Vec::new(),
            task_title: None,
            feedback: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content, agent_id)
    }

    /// Create a completed agent message
    pub fn agent(content: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self::new(MessageRole::Agent, content, agent_id)
    }

    /// Create the empty streaming shell for an incoming agent message
    pub fn agent_shell(agent_id: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageRole::Agent, "", agent_id);
        msg.is_streaming = true;
        msg
    }
}

/// A conversation owned by one agent.
///
/// The title is derived once from the first user message and is otherwise
/// only changed by an explicit rename; later messages never overwrite it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty, untitled conversation
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: None,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Maximum number of characters of the first user message used as a derived
/// conversation title.
pub const TITLE_MAX_CHARS: usize = 50;

/// Derive a conversation title from the first user message
pub fn derive_title(content: &str) -> String {
    content.chars().take(TITLE_MAX_CHARS).collect()
}
