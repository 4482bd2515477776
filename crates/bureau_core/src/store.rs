//! Workspace store: the single source of truth for conversation and task
//! state.
//!
//! All mutation goes through [`WorkspaceAction`] variants applied by a
//! reducer; there is no other write path. Actions never fail: an action that
//! references a message or conversation that no longer exists is silently
//! ignored, because stream callbacks routinely race user-driven deletion.
//! Actions for the same message are applied in dispatch order (the store is
//! locked for the duration of each apply), and actions for different agents
//! cannot corrupt each other's data.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tracing::trace;

use crate::task::{derive_agent_status, AgentStatus, Task, TaskStatus};
use crate::types::{
    derive_title, AgentStep, ChatMessage, Conversation, ConversationId, Feedback, MessageId,
    MessageRole, StepStatus, ToolCall, ToolCallStatus,
};

/// The complete mutation surface of the workspace.
///
/// Each variant is a named transform applied atomically by the reducer.
#[derive(Debug, Clone)]
pub enum WorkspaceAction {
    /// Append a message to the agent's active conversation, auto-creating a
    /// conversation if none is active
    AppendMessage { agent_id: String, message: ChatMessage },
    /// Same as `AppendMessage`; used for the streaming shell so intent is
    /// visible in traces
    StartStreaming { agent_id: String, message: ChatMessage },
    /// Concatenate a text chunk onto a streaming message's content
    AppendStreamChunk {
        agent_id: String,
        message_id: MessageId,
        chunk: String,
    },
    /// Concatenate a chunk onto a message's thinking trace
    AppendThinkingChunk {
        agent_id: String,
        message_id: MessageId,
        chunk: String,
    },
    /// Clear the streaming flag; idempotent
    FinishStreaming { agent_id: String, message_id: MessageId },
    /// Clear the streaming flag and mark the message interrupted; no-op on a
    /// message that is not streaming
    InterruptStreaming { agent_id: String, message_id: MessageId },
    /// Record user feedback on a message
    SetFeedback {
        agent_id: String,
        message_id: MessageId,
        feedback: Feedback,
    },
    /// Attach a step plan (and optional task title) to a message; overwrites
    SetSteps {
        agent_id: String,
        message_id: MessageId,
        steps: Vec<AgentStep>,
        task_title: Option<String>,
    },
    /// Update one step's status by (message, step) id
    UpdateStep {
        agent_id: String,
        message_id: MessageId,
        step_id: String,
        status: StepStatus,
    },
    /// Append a tool call to a message's tool-call list
    AppendToolCall {
        agent_id: String,
        message_id: MessageId,
        tool_call: ToolCall,
    },
    /// Patch a tool call by id with a new status and optional output
    UpdateToolCall {
        agent_id: String,
        message_id: MessageId,
        tool_call_id: String,
        status: ToolCallStatus,
        output: Option<serde_json::Value>,
    },
    /// Insert a task at the head of its agent's task list
    AddTask { task: Task },
    /// Patch a task's status and bump its `updated_at`
    UpdateTaskStatus {
        agent_id: String,
        task_id: String,
        status: TaskStatus,
    },
    /// Create a fresh conversation for the agent and make it active
    CreateConversation { agent_id: String },
    /// Make an existing conversation active
    SwitchConversation {
        agent_id: String,
        conversation_id: ConversationId,
    },
    /// Deselect the agent's active conversation
    ClearActiveConversation { agent_id: String },
    /// Explicitly rename a conversation
    RenameConversation {
        agent_id: String,
        conversation_id: ConversationId,
        title: String,
    },
    /// Delete a conversation; if it was active, the most recently created
    /// survivor becomes active
    DeleteConversation {
        agent_id: String,
        conversation_id: ConversationId,
    },
}

impl WorkspaceAction {
    /// Short action name for tracing
    fn name(&self) -> &'static str {
        match self {
            Self::AppendMessage { .. } => "append_message",
            Self::StartStreaming { .. } => "start_streaming",
            Self::AppendStreamChunk { .. } => "append_stream_chunk",
            Self::AppendThinkingChunk { .. } => "append_thinking_chunk",
            Self::FinishStreaming { .. } => "finish_streaming",
            Self::InterruptStreaming { .. } => "interrupt_streaming",
            Self::SetFeedback { .. } => "set_feedback",
            Self::SetSteps { .. } => "set_steps",
            Self::UpdateStep { .. } => "update_step",
            Self::AppendToolCall { .. } => "append_tool_call",
            Self::UpdateToolCall { .. } => "update_tool_call",
            Self::AddTask { .. } => "add_task",
            Self::UpdateTaskStatus { .. } => "update_task_status",
            Self::CreateConversation { .. } => "create_conversation",
            Self::SwitchConversation { .. } => "switch_conversation",
            Self::ClearActiveConversation { .. } => "clear_active_conversation",
            Self::RenameConversation { .. } => "rename_conversation",
            Self::DeleteConversation { .. } => "delete_conversation",
        }
    }
}

/// In-memory workspace state, keyed by agent id.
#[derive(Debug, Default)]
pub struct WorkspaceState {
    /// Conversations per agent, in creation order
    conversations: HashMap<String, Vec<Conversation>>,
    /// Active conversation per agent
    active: HashMap<String, Option<ConversationId>>,
    /// Tasks per agent, newest first
    tasks: HashMap<String, Vec<Task>>,
    /// Bumped on every applied action
    version: u64,
}

impl WorkspaceState {
    fn conversation_mut(
        &mut self,
        agent_id: &str,
        conversation_id: &str,
    ) -> Option<&mut Conversation> {
        self.conversations
            .get_mut(agent_id)?
            .iter_mut()
            .find(|c| c.id == conversation_id)
    }

    /// Find a message anywhere in the agent's conversations and mutate it.
    /// Silently does nothing when the message is gone.
    fn update_message<F>(&mut self, agent_id: &str, message_id: &str, update: F)
    where
        F: FnOnce(&mut ChatMessage),
    {
        let Some(conversations) = self.conversations.get_mut(agent_id) else {
            return;
        };
        for conversation in conversations.iter_mut() {
            if let Some(message) = conversation.messages.iter_mut().find(|m| m.id == message_id) {
                update(message);
                return;
            }
        }
    }

    /// Active conversation for an agent, creating one when none is selected.
    fn active_conversation_mut(&mut self, agent_id: &str) -> &mut Conversation {
        let conversations = self.conversations.entry(agent_id.to_string()).or_default();
        let active = self.active.entry(agent_id.to_string()).or_insert(None);

        let exists = active
            .as_ref()
            .map(|id| conversations.iter().any(|c| &c.id == id))
            .unwrap_or(false);
        if !exists {
            let conversation = Conversation::new();
            *active = Some(conversation.id.clone());
            conversations.push(conversation);
        }

        let id = active.clone().expect("active conversation just ensured");
        conversations
            .iter_mut()
            .find(|c| c.id == id)
            .expect("active conversation just ensured")
    }

    fn append_message(&mut self, agent_id: &str, message: ChatMessage) {
        let conversation = self.active_conversation_mut(agent_id);
        if conversation.title.is_none() && message.role == MessageRole::User {
            conversation.title = Some(derive_title(&message.content));
        }
        conversation.messages.push(message);
    }

    fn apply(&mut self, action: WorkspaceAction) {
        trace!(action = action.name(), "workspace dispatch");
        self.version += 1;

        match action {
            WorkspaceAction::AppendMessage { agent_id, message }
            | WorkspaceAction::StartStreaming { agent_id, message } => {
                self.append_message(&agent_id, message);
            }

            WorkspaceAction::AppendStreamChunk {
                agent_id,
                message_id,
                chunk,
            } => {
                self.update_message(&agent_id, &message_id, |m| {
                    m.content.push_str(&chunk);
                    m.is_thinking = false;
                });
            }

            WorkspaceAction::AppendThinkingChunk {
                agent_id,
                message_id,
                chunk,
            } => {
                self.update_message(&agent_id, &message_id, |m| {
                    m.thinking.get_or_insert_with(String::new).push_str(&chunk);
                });
            }

            WorkspaceAction::FinishStreaming {
                agent_id,
                message_id,
            } => {
                self.update_message(&agent_id, &message_id, |m| {
                    m.is_streaming = false;
                });
            }

            WorkspaceAction::InterruptStreaming {
                agent_id,
                message_id,
            } => {
                self.update_message(&agent_id, &message_id, |m| {
                    if m.is_streaming {
                        m.is_streaming = false;
                        m.interrupted = true;
                        m.is_thinking = false;
                    }
                });
            }

            WorkspaceAction::SetFeedback {
                agent_id,
                message_id,
                feedback,
            } => {
                self.update_message(&agent_id, &message_id, |m| {
                    m.feedback = Some(feedback);
                });
            }

            WorkspaceAction::SetSteps {
                agent_id,
                message_id,
                steps,
                task_title,
            } => {
                self.update_message(&agent_id, &message_id, |m| {
                    m.steps = steps;
                    m.task_title = task_title;
                });
            }

            WorkspaceAction::UpdateStep {
                agent_id,
                message_id,
                step_id,
                status,
            } => {
                self.update_message(&agent_id, &message_id, |m| {
                    if let Some(step) = m.steps.iter_mut().find(|s| s.id == step_id) {
                        step.status = status;
                    }
                });
            }

            WorkspaceAction::AppendToolCall {
                agent_id,
                message_id,
                tool_call,
            } => {
                self.update_message(&agent_id, &message_id, |m| {
                    m.tool_calls.push(tool_call);
                });
            }

            WorkspaceAction::UpdateToolCall {
                agent_id,
                message_id,
                tool_call_id,
                status,
                output,
            } => {
                self.update_message(&agent_id, &message_id, |m| {
                    if let Some(call) = m.tool_calls.iter_mut().find(|c| c.id == tool_call_id) {
                        call.status = status;
                        if output.is_some() {
                            call.output = output;
                        }
                    }
                });
            }

            WorkspaceAction::AddTask { task } => {
                self.tasks
                    .entry(task.agent_id.clone())
                    .or_default()
                    .insert(0, task);
            }

            WorkspaceAction::UpdateTaskStatus {
                agent_id,
                task_id,
                status,
            } => {
                if let Some(tasks) = self.tasks.get_mut(&agent_id) {
                    if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
                        task.status = status;
                        task.updated_at = Utc::now();
                    }
                }
            }

            WorkspaceAction::CreateConversation { agent_id } => {
                let conversation = Conversation::new();
                self.active
                    .insert(agent_id.clone(), Some(conversation.id.clone()));
                self.conversations
                    .entry(agent_id)
                    .or_default()
                    .push(conversation);
            }

            WorkspaceAction::SwitchConversation {
                agent_id,
                conversation_id,
            } => {
                let exists = self
                    .conversations
                    .get(&agent_id)
                    .map(|cs| cs.iter().any(|c| c.id == conversation_id))
                    .unwrap_or(false);
                if exists {
                    self.active.insert(agent_id, Some(conversation_id));
                }
            }

            WorkspaceAction::ClearActiveConversation { agent_id } => {
                self.active.insert(agent_id, None);
            }

            WorkspaceAction::RenameConversation {
                agent_id,
                conversation_id,
                title,
            } => {
                if let Some(conversation) = self.conversation_mut(&agent_id, &conversation_id) {
                    conversation.title = Some(title);
                }
            }

            WorkspaceAction::DeleteConversation {
                agent_id,
                conversation_id,
            } => {
                let Some(conversations) = self.conversations.get_mut(&agent_id) else {
                    return;
                };
                conversations.retain(|c| c.id != conversation_id);

                let active = self.active.entry(agent_id).or_insert(None);
                if active.as_deref() == Some(conversation_id.as_str()) {
                    *active = conversations
                        .iter()
                        .max_by_key(|c| c.created_at)
                        .map(|c| c.id.clone());
                }
            }
        }
    }

    // -- Read selectors --

    /// All conversations for an agent, in creation order
    pub fn conversations(&self, agent_id: &str) -> &[Conversation] {
        self.conversations
            .get(agent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The agent's active conversation, if any
    pub fn active_conversation(&self, agent_id: &str) -> Option<&Conversation> {
        let active_id = self.active.get(agent_id)?.as_ref()?;
        self.conversations
            .get(agent_id)?
            .iter()
            .find(|c| &c.id == active_id)
    }

    /// Messages of the agent's active conversation
    pub fn active_messages(&self, agent_id: &str) -> &[ChatMessage] {
        self.active_conversation(agent_id)
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Find a message by id across the agent's conversations
    pub fn find_message(&self, agent_id: &str, message_id: &str) -> Option<&ChatMessage> {
        self.conversations
            .get(agent_id)?
            .iter()
            .flat_map(|c| c.messages.iter())
            .find(|m| m.id == message_id)
    }

    /// Whether any message of the agent's active conversation is streaming
    pub fn is_streaming(&self, agent_id: &str) -> bool {
        self.active_messages(agent_id).iter().any(|m| m.is_streaming)
    }

    /// Tasks for an agent, newest first
    pub fn tasks(&self, agent_id: &str) -> &[Task] {
        self.tasks.get(agent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Derived status of an agent, recomputed from its tasks
    pub fn agent_status(&self, agent_id: &str) -> AgentStatus {
        derive_agent_status(self.tasks(agent_id))
    }

    /// Number of actions applied so far
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Shared, lock-protected workspace store.
///
/// Dispatch applies one action synchronously under the lock, so dispatch
/// order is observation order. Clone-returning read methods keep lock scopes
/// short for callers that hold results across awaits.
#[derive(Debug, Default)]
pub struct WorkspaceStore {
    state: Mutex<WorkspaceState>,
}

impl WorkspaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action to the workspace state
    pub fn dispatch(&self, action: WorkspaceAction) {
        let mut state = self.state.lock().expect("workspace store poisoned");
        state.apply(action);
    }

    /// Run a closure against a read-only view of the state
    pub fn read<R>(&self, f: impl FnOnce(&WorkspaceState) -> R) -> R {
        let state = self.state.lock().expect("workspace store poisoned");
        f(&state)
    }

    /// All conversations for an agent
    pub fn conversations(&self, agent_id: &str) -> Vec<Conversation> {
        self.read(|s| s.conversations(agent_id).to_vec())
    }

    /// The agent's active conversation
    pub fn active_conversation(&self, agent_id: &str) -> Option<Conversation> {
        self.read(|s| s.active_conversation(agent_id).cloned())
    }

    /// Messages of the agent's active conversation
    pub fn active_messages(&self, agent_id: &str) -> Vec<ChatMessage> {
        self.read(|s| s.active_messages(agent_id).to_vec())
    }

    /// Find a message by id across the agent's conversations
    pub fn find_message(&self, agent_id: &str, message_id: &str) -> Option<ChatMessage> {
        self.read(|s| s.find_message(agent_id, message_id).cloned())
    }

    /// Whether the agent's active conversation has a streaming message
    pub fn is_streaming(&self, agent_id: &str) -> bool {
        self.read(|s| s.is_streaming(agent_id))
    }

    /// Tasks for an agent, newest first
    pub fn tasks(&self, agent_id: &str) -> Vec<Task> {
        self.read(|s| s.tasks(agent_id).to_vec())
    }

    /// Derived status of an agent
    pub fn agent_status(&self, agent_id: &str) -> AgentStatus {
        self.read(|s| s.agent_status(agent_id))
    }

    /// Number of actions applied so far
    pub fn version(&self) -> u64 {
        self.read(|s| s.version())
    }
}
