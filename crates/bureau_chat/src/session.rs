//! Streaming session controller.
//!
//! Orchestrates one in-flight model call per agent: first-chunk watchdog,
//! shell creation, chunk routing (text, thinking, tool calls, plan
//! detection), abort/interrupt handling and error classification. The
//! provider's chunk union is matched exhaustively here and nowhere else.
//!
//! Per submitted message the session moves through
//! `idle → waiting-for-first-chunk → streaming → finished | interrupted |
//! errored`. At most one session is live per agent; submitting again
//! implicitly cancels the previous one. Sessions of different agents are
//! fully independent.
//!
//! Cancellation is cooperative. Aborting cancels the session token and asks
//! the stream to stop by dropping it, but a callback already in flight can
//! still land afterwards; every completion path therefore re-checks that
//! its generation still matches the registry before touching shared state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use bureau_core::{
    AgentStep, ChatMessage, MessageId, MessageRole, Task, ToolCall, ToolCallStatus,
    WorkspaceAction, WorkspaceStore,
};

use crate::animator::StepAnimator;
use crate::catalog;
use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult, ErrorKind};
use crate::plan::{PlanBlock, PlanDetector, PlanScan};
use crate::provider::{ChatProvider, ChatRequest, StreamChunk};

/// One live streaming session for an agent
struct SessionSlot {
    generation: u64,
    message_id: MessageId,
    cancel: CancellationToken,
    /// Set until the first chunk arrives
    waiting: bool,
}

/// Controller for streaming chat sessions across all agents.
///
/// Owns the per-agent session registry, the per-agent step animators and the
/// per-agent retryable error slots. All conversation state flows through the
/// shared [`WorkspaceStore`]. Cloning yields another handle to the same
/// controller.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<WorkspaceStore>,
    provider: Arc<dyn ChatProvider>,
    config: ChatConfig,
    sessions: Mutex<HashMap<String, SessionSlot>>,
    animators: Mutex<HashMap<String, StepAnimator>>,
    errors: Mutex<HashMap<String, ErrorKind>>,
    next_generation: AtomicU64,
}

impl SessionController {
    pub fn new(store: Arc<WorkspaceStore>, provider: Arc<dyn ChatProvider>) -> Self {
        Self::with_config(store, provider, ChatConfig::default())
    }

    pub fn with_config(
        store: Arc<WorkspaceStore>,
        provider: Arc<dyn ChatProvider>,
        config: ChatConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                provider,
                config,
                sessions: Mutex::new(HashMap::new()),
                animators: Mutex::new(HashMap::new()),
                errors: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// The shared workspace store
    pub fn store(&self) -> &Arc<WorkspaceStore> {
        &self.inner.store
    }

    /// Submit user text to an agent and start streaming its reply.
    ///
    /// Appends the user message, aborts any session still in flight for the
    /// agent, and returns a handle that resolves when the stream ends.
    pub fn submit(&self, agent_id: &str, text: &str) -> ChatResult<JoinHandle<()>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        self.inner.store.dispatch(WorkspaceAction::AppendMessage {
            agent_id: agent_id.to_string(),
            message: ChatMessage::user(trimmed, agent_id),
        });

        let history = self.inner.store.active_messages(agent_id);
        Ok(self.start_run(agent_id, history))
    }

    /// Replay the existing conversation after an error, without appending a
    /// new user message. No-op unless the conversation has a user message.
    pub fn retry(&self, agent_id: &str) -> ChatResult<JoinHandle<()>> {
        let history = self.inner.store.active_messages(agent_id);
        if !history.iter().any(|m| m.role == MessageRole::User) {
            return Err(ChatError::NoUserMessage);
        }
        Ok(self.start_run(agent_id, history))
    }

    /// User-initiated stop of the agent's in-flight stream
    pub fn stop(&self, agent_id: &str) {
        self.inner.abort(agent_id);
    }

    /// Leaving an agent context (sidebar switch, unmount): abort its stream
    /// and drop its error banner
    pub fn leave_agent(&self, agent_id: &str) {
        self.inner.abort(agent_id);
        self.inner
            .errors
            .lock()
            .expect("error slots poisoned")
            .remove(agent_id);
    }

    /// Switch the agent's active conversation, aborting any stream bound to
    /// the previous one
    pub fn switch_conversation(&self, agent_id: &str, conversation_id: &str) {
        self.inner.abort(agent_id);
        self.inner.store.dispatch(WorkspaceAction::SwitchConversation {
            agent_id: agent_id.to_string(),
            conversation_id: conversation_id.to_string(),
        });
    }

    /// Start a fresh conversation for the agent, aborting any in-flight
    /// stream first
    pub fn create_conversation(&self, agent_id: &str) {
        self.inner.abort(agent_id);
        self.inner.store.dispatch(WorkspaceAction::CreateConversation {
            agent_id: agent_id.to_string(),
        });
    }

    /// Delete a conversation; an in-flight stream for the agent is aborted
    /// so its callbacks cannot land in deleted state
    pub fn delete_conversation(&self, agent_id: &str, conversation_id: &str) {
        self.inner.abort(agent_id);
        self.inner.store.dispatch(WorkspaceAction::DeleteConversation {
            agent_id: agent_id.to_string(),
            conversation_id: conversation_id.to_string(),
        });
    }

    /// Whether the agent is waiting for the first chunk of a reply
    pub fn is_waiting(&self, agent_id: &str) -> bool {
        self.inner
            .sessions
            .lock()
            .expect("session registry poisoned")
            .get(agent_id)
            .map(|s| s.waiting)
            .unwrap_or(false)
    }

    /// The agent's current retryable error, if any
    pub fn last_error(&self, agent_id: &str) -> Option<ErrorKind> {
        self.inner
            .errors
            .lock()
            .expect("error slots poisoned")
            .get(agent_id)
            .copied()
    }

    /// Dismiss the agent's error banner
    pub fn clear_error(&self, agent_id: &str) {
        self.inner
            .errors
            .lock()
            .expect("error slots poisoned")
            .remove(agent_id);
    }

    fn start_run(&self, agent_id: &str, history: Vec<ChatMessage>) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);

        // One live session per agent: a new submission cancels the old one.
        inner.abort(agent_id);
        inner.errors.lock().expect("error slots poisoned").remove(agent_id);

        let generation = inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let message_id = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        inner.sessions.lock().expect("session registry poisoned").insert(
            agent_id.to_string(),
            SessionSlot {
                generation,
                message_id: message_id.clone(),
                cancel: cancel.clone(),
                waiting: true,
            },
        );

        let agent_id = agent_id.to_string();
        tokio::spawn(async move {
            inner
                .run(agent_id, generation, message_id, cancel, history)
                .await;
        })
    }
}

impl SessionInner {
    async fn run(
        &self,
        agent_id: String,
        generation: u64,
        message_id: MessageId,
        cancel: CancellationToken,
        history: Vec<ChatMessage>,
    ) {
        let request = ChatRequest {
            agent_id: agent_id.clone(),
            messages: history,
            system_prompt: catalog::system_prompt(&agent_id),
            tools: catalog::tool_decls(&agent_id),
        };

        match self
            .drive(&agent_id, generation, &message_id, &cancel, request)
            .await
        {
            Ok(()) => {}
            Err(err) => {
                let kind = ErrorKind::classify(&err);
                warn!(agent_id = %agent_id, error = %err, "streaming session failed");
                // Tear down whatever this session left behind, so no message
                // stays streaming, then surface the error for retry. A stale
                // session (already superseded or stopped) stays silent.
                if self.is_current(&agent_id, generation) {
                    self.abort(&agent_id);
                    self.errors
                        .lock()
                        .expect("error slots poisoned")
                        .insert(agent_id, kind);
                }
            }
        }
    }

    /// Consume the stream to completion, returning Err only for
    /// timeout/provider failures. Aborts resolve to Ok: the abort path has
    /// already settled the message state.
    async fn drive(
        &self,
        agent_id: &str,
        generation: u64,
        message_id: &str,
        cancel: &CancellationToken,
        request: ChatRequest,
    ) -> ChatResult<()> {
        let mut stream = self.provider.stream_chat(request).await?;

        // Watchdog applies only until the first chunk of any kind arrives.
        // Biased so cancellation always wins over a simultaneously ready
        // chunk.
        let first = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            outcome = tokio::time::timeout(self.config.first_chunk_timeout, stream.next()) => outcome,
        };
        let first = match first {
            Err(_) => return Err(ChatError::Timeout),
            Ok(None) => {
                // Stream ended before producing anything; nothing to show.
                self.remove_if_current(agent_id, generation);
                return Ok(());
            }
            Ok(Some(Err(err))) => return Err(err.into()),
            Ok(Some(Ok(chunk))) => chunk,
        };

        self.mark_first_chunk(agent_id, generation);
        debug!(agent_id = %agent_id, "first chunk received");

        let mut detector = PlanDetector::new(&self.config);
        let mut shell_created = false;
        self.route_chunk(agent_id, message_id, first, &mut detector, &mut shell_created);

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                item = stream.next() => item,
            };
            match item {
                None => break,
                Some(Err(err)) => return Err(err.into()),
                Some(Ok(chunk)) => {
                    self.route_chunk(agent_id, message_id, chunk, &mut detector, &mut shell_created);
                }
            }
        }

        // Normal completion, guarded against a stale completion racing a
        // user-triggered abort.
        if self.remove_if_current(agent_id, generation) {
            if let Some(rest) = detector.finish() {
                self.ensure_shell(agent_id, message_id, &mut shell_created, false);
                self.store.dispatch(WorkspaceAction::AppendStreamChunk {
                    agent_id: agent_id.to_string(),
                    message_id: message_id.to_string(),
                    chunk: rest,
                });
            }
            if shell_created {
                self.store.dispatch(WorkspaceAction::FinishStreaming {
                    agent_id: agent_id.to_string(),
                    message_id: message_id.to_string(),
                });
            }
            debug!(agent_id = %agent_id, "stream finished");
        }
        Ok(())
    }

    /// Route one chunk into store actions. This is the single place the
    /// chunk union is taken apart.
    fn route_chunk(
        &self,
        agent_id: &str,
        message_id: &str,
        chunk: StreamChunk,
        detector: &mut PlanDetector,
        shell_created: &mut bool,
    ) {
        match chunk {
            StreamChunk::Thinking { content } => {
                self.ensure_shell(agent_id, message_id, shell_created, true);
                self.store.dispatch(WorkspaceAction::AppendThinkingChunk {
                    agent_id: agent_id.to_string(),
                    message_id: message_id.to_string(),
                    chunk: content,
                });
            }
            StreamChunk::Text { content } => match detector.push(&content) {
                PlanScan::Pending => {}
                PlanScan::Text(text) => {
                    self.ensure_shell(agent_id, message_id, shell_created, false);
                    self.store.dispatch(WorkspaceAction::AppendStreamChunk {
                        agent_id: agent_id.to_string(),
                        message_id: message_id.to_string(),
                        chunk: text,
                    });
                }
                PlanScan::Plan(block) => {
                    self.ensure_shell(agent_id, message_id, shell_created, false);
                    self.start_plan(agent_id, message_id, block);
                }
            },
            StreamChunk::ToolCallStart { id, name, input } => {
                self.ensure_shell(agent_id, message_id, shell_created, false);
                self.store.dispatch(WorkspaceAction::AppendToolCall {
                    agent_id: agent_id.to_string(),
                    message_id: message_id.to_string(),
                    tool_call: ToolCall::running(id, name, input),
                });
            }
            StreamChunk::ToolCallEnd { id, output } => {
                self.store.dispatch(WorkspaceAction::UpdateToolCall {
                    agent_id: agent_id.to_string(),
                    message_id: message_id.to_string(),
                    tool_call_id: id,
                    status: ToolCallStatus::Done,
                    output: Some(output),
                });
            }
        }
    }

    /// Create the agent message shell exactly once per session
    fn ensure_shell(
        &self,
        agent_id: &str,
        message_id: &str,
        shell_created: &mut bool,
        thinking: bool,
    ) {
        if *shell_created {
            return;
        }
        let mut shell = ChatMessage::agent_shell(agent_id);
        shell.id = message_id.to_string();
        shell.is_thinking = thinking;
        self.store.dispatch(WorkspaceAction::StartStreaming {
            agent_id: agent_id.to_string(),
            message: shell,
        });
        *shell_created = true;
    }

    /// Attach a detected plan: steps on the message, a linked task, and the
    /// animator that drives both on its own clock
    fn start_plan(&self, agent_id: &str, message_id: &str, block: PlanBlock) {
        let steps: Vec<AgentStep> = block.steps.iter().map(AgentStep::pending).collect();

        self.store.dispatch(WorkspaceAction::SetSteps {
            agent_id: agent_id.to_string(),
            message_id: message_id.to_string(),
            steps: steps.clone(),
            task_title: Some(block.title.clone()),
        });

        let task = Task::from_plan(agent_id, block.title, message_id);
        let task_id = task.id.clone();
        self.store.dispatch(WorkspaceAction::AddTask { task });

        let animator = StepAnimator::start(
            Arc::clone(&self.store),
            agent_id,
            message_id,
            Some(task_id),
            steps,
            self.config.step_stagger,
        );
        // One live animator per agent; replacing one invalidates its
        // further effects.
        if let Some(previous) = self
            .animators
            .lock()
            .expect("animator registry poisoned")
            .insert(agent_id.to_string(), animator)
        {
            previous.cancel();
        }

        if let Some(rest) = block.remainder {
            self.store.dispatch(WorkspaceAction::AppendStreamChunk {
                agent_id: agent_id.to_string(),
                message_id: message_id.to_string(),
                chunk: rest,
            });
        }
    }

    /// Abort the agent's in-flight session, if any: cancel the stream and
    /// animator and mark the shell interrupted. Safe to call when idle.
    fn abort(&self, agent_id: &str) {
        let slot = self
            .sessions
            .lock()
            .expect("session registry poisoned")
            .remove(agent_id);
        if let Some(slot) = slot {
            slot.cancel.cancel();
            self.store.dispatch(WorkspaceAction::InterruptStreaming {
                agent_id: agent_id.to_string(),
                message_id: slot.message_id,
            });
            debug!(agent_id = %agent_id, "session aborted");
        }
        let animator = self
            .animators
            .lock()
            .expect("animator registry poisoned")
            .remove(agent_id);
        if let Some(animator) = animator {
            animator.cancel();
        }
    }

    fn is_current(&self, agent_id: &str, generation: u64) -> bool {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .get(agent_id)
            .map(|s| s.generation == generation)
            .unwrap_or(false)
    }

    /// Remove the agent's slot when it still belongs to this generation.
    /// Returns whether this run was still the current one.
    fn remove_if_current(&self, agent_id: &str, generation: u64) -> bool {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        let current = sessions
            .get(agent_id)
            .map(|s| s.generation == generation)
            .unwrap_or(false);
        if current {
            sessions.remove(agent_id);
        }
        current
    }

    fn mark_first_chunk(&self, agent_id: &str, generation: u64) {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        if let Some(slot) = sessions.get_mut(agent_id) {
            if slot.generation == generation {
                slot.waiting = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use bureau_core::{StepStatus, TaskStatus};
    use tokio::sync::mpsc;

    use crate::provider::{ChunkStream, MockChatProvider, ProviderError};
    use crate::scripted::{ScriptEvent, ScriptedProvider};

    const AGENT: &str = "finance";

    fn controller(provider: impl ChatProvider + 'static) -> Arc<SessionController> {
        Arc::new(SessionController::new(
            Arc::new(WorkspaceStore::new()),
            Arc::new(provider),
        ))
    }

    /// Provider whose streams are fed by test-held channel senders, one per
    /// call, so tests control chunk arrival precisely.
    struct ChannelProvider {
        receivers: Mutex<Vec<mpsc::UnboundedReceiver<Result<StreamChunk, ProviderError>>>>,
    }

    impl ChannelProvider {
        fn with_calls(
            calls: usize,
        ) -> (
            Self,
            Vec<mpsc::UnboundedSender<Result<StreamChunk, ProviderError>>>,
        ) {
            let mut senders = Vec::new();
            let mut receivers = Vec::new();
            for _ in 0..calls {
                let (tx, rx) = mpsc::unbounded_channel();
                senders.push(tx);
                receivers.push(rx);
            }
            // Streams are handed out in call order
            receivers.reverse();
            (
                Self {
                    receivers: Mutex::new(receivers),
                },
                senders,
            )
        }
    }

    #[async_trait]
    impl ChatProvider for ChannelProvider {
        async fn stream_chat(&self, _request: ChatRequest) -> Result<ChunkStream, ProviderError> {
            let rx = self
                .receivers
                .lock()
                .unwrap()
                .pop()
                .expect("more calls than prepared channels");
            let stream = futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(stream.boxed())
        }
    }

    fn text(content: &str) -> Result<StreamChunk, ProviderError> {
        Ok(StreamChunk::Text {
            content: content.to_string(),
        })
    }

    /// Let spawned session tasks make progress on the current-thread runtime
    async fn drain() {
        for _ in 0..256 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_plain_text_stream_finishes() {
        let provider = ScriptedProvider::streaming_text(["Hello, ", "how are you?"], Duration::ZERO);
        let controller = controller(provider);

        let handle = controller.submit(AGENT, "hi there").unwrap();
        handle.await.unwrap();

        let messages = controller.store().active_messages(AGENT);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        let reply = &messages[1];
        assert_eq!(reply.content, "Hello, how are you?");
        assert!(!reply.is_streaming);
        assert!(!reply.interrupted);
        assert!(reply.steps.is_empty());
        assert!(controller.last_error(AGENT).is_none());
    }

    #[tokio::test]
    async fn test_thinking_then_text() {
        let provider = ScriptedProvider::new(vec![
            ScriptEvent::Chunk(StreamChunk::Thinking {
                content: "weighing options".to_string(),
            }),
            ScriptEvent::Chunk(StreamChunk::Text {
                content: "Use the base case.".to_string(),
            }),
        ]);
        let controller = controller(provider);

        controller.submit(AGENT, "which scenario?").unwrap().await.unwrap();

        let reply = &controller.store().active_messages(AGENT)[1];
        assert_eq!(reply.thinking.as_deref(), Some("weighing options"));
        assert!(!reply.is_thinking, "text chunk clears the thinking flag");
        assert_eq!(reply.content, "Use the base case.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_stream_creates_steps_task_and_animates() {
        let provider = ScriptedProvider::new(vec![
            ScriptEvent::Chunk(StreamChunk::Text {
                content: "<plan>\nDraft Q1 Report\nPulling data\nCompiling\n</plan>\n".to_string(),
            }),
            ScriptEvent::Chunk(StreamChunk::Text {
                content: "Here's the report.".to_string(),
            }),
        ]);
        let controller = controller(provider);

        controller.submit(AGENT, "draft the Q1 report").unwrap().await.unwrap();

        let reply = &controller.store().active_messages(AGENT)[1];
        assert_eq!(reply.task_title.as_deref(), Some("Draft Q1 Report"));
        assert_eq!(reply.steps.len(), 2);
        assert_eq!(reply.content, "Here's the report.");
        assert!(!reply.is_streaming);

        let tasks = controller.store().tasks(AGENT);
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].chat_created);
        assert_eq!(tasks[0].message_id.as_deref(), Some(reply.id.as_str()));
        assert_eq!(tasks[0].status, TaskStatus::InProgress);

        // The animation keeps running after the stream finished
        tokio::time::sleep(Duration::from_millis(3 * 600 + 50)).await;
        let reply = &controller.store().active_messages(AGENT)[1];
        assert!(reply.steps.iter().all(|s| s.status == StepStatus::Done));
        assert_eq!(controller.store().tasks(AGENT)[0].status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_unclosed_plan_buffer_flushed_verbatim() {
        let provider = ScriptedProvider::streaming_text(["<plan>\nOnly a title"], Duration::ZERO);
        let controller = controller(provider);

        controller.submit(AGENT, "hm").unwrap().await.unwrap();

        let reply = &controller.store().active_messages(AGENT)[1];
        assert_eq!(reply.content, "<plan>\nOnly a title");
        assert!(!reply.is_streaming);
        assert!(reply.steps.is_empty());
    }

    #[tokio::test]
    async fn test_tool_call_lifecycle_routed() {
        let provider = ScriptedProvider::new(vec![
            ScriptEvent::Chunk(StreamChunk::ToolCallStart {
                id: "tc-1".to_string(),
                name: "build_financial_model".to_string(),
                input: serde_json::json!({"title": "Q1 Model"}),
            }),
            ScriptEvent::Chunk(StreamChunk::ToolCallEnd {
                id: "tc-1".to_string(),
                output: serde_json::json!({"status": "completed"}),
            }),
            ScriptEvent::Chunk(StreamChunk::Text {
                content: "Model is ready.".to_string(),
            }),
        ]);
        let controller = controller(provider);

        controller.submit(AGENT, "build the model").unwrap().await.unwrap();

        let reply = &controller.store().active_messages(AGENT)[1];
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].status, ToolCallStatus::Done);
        assert_eq!(
            reply.tool_calls[0].output,
            Some(serde_json::json!({"status": "completed"}))
        );
        assert_eq!(reply.content, "Model is ready.");
    }

    #[tokio::test]
    async fn test_stop_interrupts_and_late_chunks_are_dropped() {
        let (provider, mut senders) = ChannelProvider::with_calls(1);
        let controller = controller(provider);
        let tx = senders.remove(0);

        tx.send(text("Hel")).unwrap();
        let handle = controller.submit(AGENT, "hello?").unwrap();
        drain().await;

        assert!(controller.store().is_streaming(AGENT));
        controller.stop(AGENT);

        // A chunk from the cancelled stream arriving late must not mutate
        let _ = tx.send(text("lo"));
        drop(tx);
        handle.await.unwrap();

        let reply = &controller.store().active_messages(AGENT)[1];
        assert_eq!(reply.content, "Hel");
        assert!(reply.interrupted);
        assert!(!reply.is_streaming);
        assert!(controller.last_error(AGENT).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_chunk_timeout_behaves_as_abort() {
        let controller = controller(ScriptedProvider::silent());

        let handle = controller.submit(AGENT, "anyone there?").unwrap();
        handle.await.unwrap();

        assert_eq!(controller.last_error(AGENT), Some(ErrorKind::Timeout));
        assert!(!controller.is_waiting(AGENT));
        // No shell was ever created; only the user message exists
        let messages = controller.store().active_messages(AGENT);
        assert_eq!(messages.len(), 1);
        assert!(!controller.store().is_streaming(AGENT));
    }

    #[tokio::test]
    async fn test_midstream_provider_error_interrupts_shell() {
        let provider = ScriptedProvider::new(vec![
            ScriptEvent::Chunk(StreamChunk::Text {
                content: "partial answer".to_string(),
            }),
            ScriptEvent::Error(ProviderError::Network("connection reset".to_string())),
        ]);
        let controller = controller(provider);

        controller.submit(AGENT, "go").unwrap().await.unwrap();

        assert_eq!(controller.last_error(AGENT), Some(ErrorKind::Network));
        let reply = &controller.store().active_messages(AGENT)[1];
        assert_eq!(reply.content, "partial answer");
        assert!(reply.interrupted);
        assert!(!reply.is_streaming);
    }

    #[tokio::test]
    async fn test_open_error_classified_rate_limited() {
        let mut mock = MockChatProvider::new();
        mock.expect_stream_chat().returning(|_| {
            Err(ProviderError::Api {
                status: 429,
                message: "too many requests".to_string(),
            })
        });
        let controller = controller(mock);

        controller.submit(AGENT, "go").unwrap().await.unwrap();

        assert_eq!(controller.last_error(AGENT), Some(ErrorKind::RateLimited));
        // No shell: the call failed before any chunk
        assert_eq!(controller.store().active_messages(AGENT).len(), 1);
    }

    #[tokio::test]
    async fn test_retry_replays_without_duplicating_user_message() {
        let provider = ScriptedProvider::new(vec![ScriptEvent::Error(ProviderError::Network(
            "fetch failed".to_string(),
        ))]);
        let controller = controller(provider);

        controller.submit(AGENT, "first try").unwrap().await.unwrap();
        assert_eq!(controller.last_error(AGENT), Some(ErrorKind::Network));

        controller.retry(AGENT).unwrap().await.unwrap();

        let messages = controller.store().active_messages(AGENT);
        let user_count = messages.iter().filter(|m| m.role == MessageRole::User).count();
        assert_eq!(user_count, 1);
        assert_eq!(controller.last_error(AGENT), Some(ErrorKind::Network));
    }

    #[tokio::test]
    async fn test_retry_requires_a_user_message() {
        let controller = controller(ScriptedProvider::silent());
        assert!(matches!(
            controller.retry(AGENT),
            Err(ChatError::NoUserMessage)
        ));
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let controller = controller(ScriptedProvider::silent());
        assert!(matches!(
            controller.submit(AGENT, "   "),
            Err(ChatError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn test_new_submission_cancels_previous_session() {
        let (provider, mut senders) = ChannelProvider::with_calls(2);
        let controller = controller(provider);
        let tx2 = senders.remove(1);
        let tx1 = senders.remove(0);

        tx1.send(text("first reply ")).unwrap();
        let first = controller.submit(AGENT, "first").unwrap();
        drain().await;
        assert!(controller.store().is_streaming(AGENT));

        let second = controller.submit(AGENT, "second").unwrap();
        drain().await;

        tx2.send(text("second reply")).unwrap();
        drop(tx2);
        drop(tx1);
        let _ = first.await;
        second.await.unwrap();

        let messages = controller.store().active_messages(AGENT);
        // user, interrupted reply, user, finished reply
        assert_eq!(messages.len(), 4);
        assert!(messages[1].interrupted);
        assert_eq!(messages[3].content, "second reply");
        assert!(!messages[3].interrupted);
        assert!(!messages[3].is_streaming);
        let streaming = messages.iter().filter(|m| m.is_streaming).count();
        assert_eq!(streaming, 0);
    }

    #[tokio::test]
    async fn test_agent_switch_interrupts_only_previous_agent() {
        let (provider, mut senders) = ChannelProvider::with_calls(2);
        let controller = controller(provider);
        let tx_legal = senders.remove(1);
        let tx_finance = senders.remove(0);

        tx_finance.send(text("crunching numbers")).unwrap();
        let finance_handle = controller.submit("finance", "numbers?").unwrap();
        drain().await;

        tx_legal.send(text("reviewing")).unwrap();
        let legal_handle = controller.submit("legal", "contract?").unwrap();
        drain().await;

        // Switching away from finance interrupts its stream only
        controller.leave_agent("finance");
        drain().await;

        assert!(controller.store().active_messages("finance")[1].interrupted);
        assert!(controller.store().is_streaming("legal"));

        drop(tx_legal);
        drop(tx_finance);
        let _ = finance_handle.await;
        legal_handle.await.unwrap();

        let legal_reply = &controller.store().active_messages("legal")[1];
        assert_eq!(legal_reply.content, "reviewing");
        assert!(!legal_reply.interrupted);
    }

    #[tokio::test]
    async fn test_waiting_flag_tracks_first_chunk() {
        let (provider, mut senders) = ChannelProvider::with_calls(1);
        let controller = controller(provider);
        let tx = senders.remove(0);

        let handle = controller.submit(AGENT, "hello").unwrap();
        drain().await;
        assert!(controller.is_waiting(AGENT));

        tx.send(text("hi")).unwrap();
        drain().await;
        assert!(!controller.is_waiting(AGENT));

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_conversation_midstream_leaves_state_consistent() {
        let (provider, mut senders) = ChannelProvider::with_calls(1);
        let controller = controller(provider);
        let tx = senders.remove(0);

        tx.send(text("streaming into doomed conversation")).unwrap();
        let handle = controller.submit(AGENT, "hello").unwrap();
        drain().await;

        let conversation_id = controller
            .store()
            .active_conversation(AGENT)
            .unwrap()
            .id
            .clone();
        controller.delete_conversation(AGENT, &conversation_id);

        // Late chunk targets a deleted conversation; the store ignores it
        let _ = tx.send(text(" more"));
        drop(tx);
        handle.await.unwrap();

        assert!(controller.store().active_conversation(AGENT).is_none());
        assert!(!controller.store().is_streaming(AGENT));
    }
}
