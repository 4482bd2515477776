//! Integration tests for the streaming session pipeline.
//!
//! These drive the full stack (controller, plan detector, step animator and
//! workspace store) against scripted providers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use bureau_chat::{
    ChatProvider, ChatRequest, ChunkStream, ErrorKind, ProviderError, ScriptEvent,
    ScriptedProvider, SessionController, StreamChunk,
};
use bureau_core::{MessageRole, StepStatus, TaskStatus, ToolCallStatus, WorkspaceStore};

fn controller(provider: impl ChatProvider + 'static) -> Arc<SessionController> {
    Arc::new(SessionController::new(
        Arc::new(WorkspaceStore::new()),
        Arc::new(provider),
    ))
}

/// Fails the first N calls, then delegates to a scripted provider
struct FlakyProvider {
    remaining_failures: Mutex<u32>,
    inner: ScriptedProvider,
}

#[async_trait]
impl ChatProvider for FlakyProvider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProviderError::Api {
                    status: 429,
                    message: "resource exhausted".to_string(),
                });
            }
        }
        self.inner.stream_chat(request).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_task_oriented_exchange() {
    let provider = ScriptedProvider::new(vec![
        ScriptEvent::Chunk(StreamChunk::Thinking {
            content: "The user wants the full report.".to_string(),
        }),
        ScriptEvent::Chunk(StreamChunk::ToolCallStart {
            id: "tc-1".to_string(),
            name: "build_financial_model".to_string(),
            input: serde_json::json!({"title": "Q1 Model", "scenarios": 3}),
        }),
        ScriptEvent::Delay(Duration::from_millis(1500)),
        ScriptEvent::Chunk(StreamChunk::ToolCallEnd {
            id: "tc-1".to_string(),
            output: serde_json::json!({"status": "completed", "scenarios": ["Base", "Bull", "Bear"]}),
        }),
        ScriptEvent::Chunk(StreamChunk::Text {
            content: "<plan>\nQ1 Financial Report\nPulling financial data\nRunning scenarios\nCompiling report\n</plan>\n"
                .to_string(),
        }),
        ScriptEvent::Chunk(StreamChunk::Text {
            content: "The model is built — ".to_string(),
        }),
        ScriptEvent::Chunk(StreamChunk::Text {
            content: "base case holds 22 months of runway.".to_string(),
        }),
    ]);
    let controller = controller(provider);

    let handle = controller
        .submit("finance", "Build the Q1 model and report back")
        .unwrap();
    handle.await.unwrap();

    let messages = controller.store().active_messages("finance");
    assert_eq!(messages.len(), 2);
    let reply = &messages[1];

    assert_eq!(reply.thinking.as_deref(), Some("The user wants the full report."));
    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].status, ToolCallStatus::Done);
    assert_eq!(reply.task_title.as_deref(), Some("Q1 Financial Report"));
    assert_eq!(reply.steps.len(), 3);
    assert_eq!(
        reply.content,
        "The model is built — base case holds 22 months of runway."
    );
    assert!(!reply.is_streaming);
    assert!(!reply.interrupted);

    // The linked task animates to completion on its own clock
    let task = &controller.store().tasks("finance")[0];
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.title, "Q1 Financial Report");

    tokio::time::sleep(Duration::from_millis(3 * 600 + 50)).await;
    let reply = &controller.store().active_messages("finance")[1];
    assert!(reply.steps.iter().all(|s| s.status == StepStatus::Done));
    assert_eq!(controller.store().tasks("finance")[0].status, TaskStatus::Done);
}

#[tokio::test]
async fn test_concurrent_agents_stream_independently() {
    let provider = ScriptedProvider::streaming_text(["on it."], Duration::ZERO);
    let controller = controller(provider);

    let finance = controller.submit("finance", "runway check").unwrap();
    let legal = controller.submit("legal", "contract check").unwrap();
    finance.await.unwrap();
    legal.await.unwrap();

    for agent_id in ["finance", "legal"] {
        let messages = controller.store().active_messages(agent_id);
        assert_eq!(messages.len(), 2, "agent {agent_id}");
        assert_eq!(messages[1].content, "on it.");
        assert!(!messages[1].interrupted);
        assert!(!messages[1].is_streaming);
    }
}

#[tokio::test]
async fn test_retry_after_rate_limit_succeeds() {
    let provider = FlakyProvider {
        remaining_failures: Mutex::new(1),
        inner: ScriptedProvider::streaming_text(["recovered."], Duration::ZERO),
    };
    let controller = controller(provider);

    controller.submit("legal", "draft the NDA").unwrap().await.unwrap();
    assert_eq!(controller.last_error("legal"), Some(ErrorKind::RateLimited));

    controller.retry("legal").unwrap().await.unwrap();
    assert!(controller.last_error("legal").is_none());

    let messages = controller.store().active_messages("legal");
    let users = messages.iter().filter(|m| m.role == MessageRole::User).count();
    assert_eq!(users, 1, "retry must not duplicate the user message");
    assert_eq!(messages.last().unwrap().content, "recovered.");
}

#[tokio::test]
async fn test_conversation_lifecycle_through_controller() {
    let provider = ScriptedProvider::streaming_text(["noted."], Duration::ZERO);
    let controller = controller(provider);

    controller
        .submit("designer", "Refresh the homepage hero for the launch")
        .unwrap()
        .await
        .unwrap();

    let store = controller.store();
    let first = store.active_conversation("designer").unwrap();
    assert_eq!(
        first.title.as_deref(),
        Some("Refresh the homepage hero for the launch")
    );

    controller.create_conversation("designer");
    let second = store.active_conversation("designer").unwrap();
    assert_ne!(first.id, second.id);
    assert!(second.title.is_none());
    assert!(store.active_messages("designer").is_empty());

    controller.switch_conversation("designer", &first.id);
    assert_eq!(store.active_conversation("designer").unwrap().id, first.id);
    assert_eq!(store.active_messages("designer").len(), 2);

    controller.delete_conversation("designer", &first.id);
    // The surviving conversation becomes active
    assert_eq!(store.active_conversation("designer").unwrap().id, second.id);

    controller.delete_conversation("designer", &second.id);
    assert!(store.active_conversation("designer").is_none());
}
