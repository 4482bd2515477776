//! Task domain model.
//!
//! Tasks represent agent work items shown on the task board. A task may be
//! linked to the chat message that produced its step plan; its status is
//! advanced by the step animator or by explicit updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents the current status of a task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Created but not yet started
    Scheduled,
    /// Currently being worked
    InProgress,
    /// Blocked on the user
    NeedsInput,
    /// Completed successfully
    Done,
    /// Failed
    Failed,
}

/// Derived status of an agent, computed from its task list.
///
/// Never stored; recomputed on every read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AgentStatus {
    Idle,
    Working,
    NeedsInput,
    Failed,
}

/// A work item owned by one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    /// Whether this task was created from a chat plan
    #[serde(rename = "chatCreated", default)]
    pub chat_created: bool,
    /// Message that produced this task's step plan, for cross-referencing
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl Task {
    /// Create a task produced by a chat plan, linked to its message
    pub fn from_plan(
        agent_id: impl Into<String>,
        title: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::InProgress,
            created_at: now,
            updated_at: now,
            chat_created: true,
            message_id: Some(message_id.into()),
        }
    }
}

/// Derive an agent's status from its task list.
///
/// Priority: any failed task wins, then needs-input, then anything still
/// scheduled or in progress, else idle.
pub fn derive_agent_status(tasks: &[Task]) -> AgentStatus {
    if tasks.iter().any(|t| t.status == TaskStatus::Failed) {
        return AgentStatus::Failed;
    }
    if tasks.iter().any(|t| t.status == TaskStatus::NeedsInput) {
        return AgentStatus::NeedsInput;
    }
    if tasks
        .iter()
        .any(|t| matches!(t.status, TaskStatus::InProgress | TaskStatus::Scheduled))
    {
        return AgentStatus::Working;
    }
    AgentStatus::Idle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: "finance".to_string(),
            title: "t".to_string(),
            description: String::new(),
            status,
            created_at: now,
            updated_at: now,
            chat_created: false,
            message_id: None,
        }
    }

    #[test]
    fn test_failed_wins() {
        let tasks = vec![task(TaskStatus::Done), task(TaskStatus::Failed)];
        assert_eq!(derive_agent_status(&tasks), AgentStatus::Failed);
    }

    #[test]
    fn test_scheduled_is_working() {
        let tasks = vec![task(TaskStatus::Scheduled)];
        assert_eq!(derive_agent_status(&tasks), AgentStatus::Working);
    }

    #[test]
    fn test_needs_input_over_working() {
        let tasks = vec![task(TaskStatus::InProgress), task(TaskStatus::NeedsInput)];
        assert_eq!(derive_agent_status(&tasks), AgentStatus::NeedsInput);
    }

    #[test]
    fn test_empty_is_idle() {
        assert_eq!(derive_agent_status(&[]), AgentStatus::Idle);
    }
}
