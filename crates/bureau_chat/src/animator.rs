//! Timer-driven step animation.
//!
//! A detected plan block is a structural hint, not a literal execution log,
//! so step progress is driven on a fixed cadence independent of the text
//! stream's pace. The animator owns its own cancellation token, separate
//! from the network cancellation: both are cancelled on abort, but one
//! drives UI pacing and the other drives data flow.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use bureau_core::{AgentStep, StepStatus, TaskStatus, WorkspaceAction, WorkspaceStore};

/// Handle to one running step animation.
///
/// Dropping the handle detaches the animation (it runs to completion);
/// cancellation must be explicit.
#[derive(Debug)]
pub struct StepAnimator {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StepAnimator {
    /// Start animating the given steps on `stagger` cadence.
    ///
    /// Step 0 is marked running immediately. Each tick marks its step done
    /// and the next one running; the final tick marks the linked task done.
    pub fn start(
        store: Arc<WorkspaceStore>,
        agent_id: impl Into<String>,
        message_id: impl Into<String>,
        task_id: Option<String>,
        steps: Vec<AgentStep>,
        stagger: Duration,
    ) -> Self {
        let agent_id = agent_id.into();
        let message_id = message_id.into();
        let cancel = CancellationToken::new();

        if let Some(first) = steps.first() {
            store.dispatch(WorkspaceAction::UpdateStep {
                agent_id: agent_id.clone(),
                message_id: message_id.clone(),
                step_id: first.id.clone(),
                status: StepStatus::Running,
            });
        }

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            for (index, step) in steps.iter().enumerate() {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(stagger) => {}
                }
                // The sleep can complete in the same poll round as a cancel;
                // a fired tick must still not mutate after cancellation.
                if token.is_cancelled() {
                    return;
                }

                store.dispatch(WorkspaceAction::UpdateStep {
                    agent_id: agent_id.clone(),
                    message_id: message_id.clone(),
                    step_id: step.id.clone(),
                    status: StepStatus::Done,
                });

                match steps.get(index + 1) {
                    Some(next) => {
                        store.dispatch(WorkspaceAction::UpdateStep {
                            agent_id: agent_id.clone(),
                            message_id: message_id.clone(),
                            step_id: next.id.clone(),
                            status: StepStatus::Running,
                        });
                    }
                    None => {
                        if let Some(task_id) = &task_id {
                            store.dispatch(WorkspaceAction::UpdateTaskStatus {
                                agent_id: agent_id.clone(),
                                task_id: task_id.clone(),
                                status: TaskStatus::Done,
                            });
                        }
                        debug!(agent_id = %agent_id, "step animation complete");
                    }
                }
            }
        });

        Self { cancel, task }
    }

    /// Cancel all pending ticks. Whatever step was mid-flight keeps its
    /// current status.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the animation has run to completion or been cancelled
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bureau_core::{ChatMessage, Task};

    const AGENT: &str = "finance";
    const STAGGER: Duration = Duration::from_millis(600);

    /// Store with a streaming shell carrying `n` pending steps; returns the
    /// message id, step list and linked task id.
    fn plan_fixture(store: &Arc<WorkspaceStore>, n: usize) -> (String, Vec<AgentStep>, String) {
        let shell = ChatMessage::agent_shell(AGENT);
        let message_id = shell.id.clone();
        store.dispatch(WorkspaceAction::StartStreaming {
            agent_id: AGENT.to_string(),
            message: shell,
        });

        let steps: Vec<AgentStep> = (0..n)
            .map(|i| AgentStep::pending(format!("Step {i}")))
            .collect();
        store.dispatch(WorkspaceAction::SetSteps {
            agent_id: AGENT.to_string(),
            message_id: message_id.clone(),
            steps: steps.clone(),
            task_title: Some("Fixture".to_string()),
        });

        let task = Task::from_plan(AGENT, "Fixture", message_id.clone());
        let task_id = task.id.clone();
        store.dispatch(WorkspaceAction::AddTask { task });

        (message_id, steps, task_id)
    }

    fn statuses(store: &WorkspaceStore, message_id: &str) -> Vec<StepStatus> {
        store
            .find_message(AGENT, message_id)
            .unwrap()
            .steps
            .iter()
            .map(|s| s.status)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_advance_on_cadence() {
        let store = Arc::new(WorkspaceStore::new());
        let (message_id, steps, task_id) = plan_fixture(&store, 3);

        let animator = StepAnimator::start(
            store.clone(),
            AGENT,
            message_id.clone(),
            Some(task_id.clone()),
            steps,
            STAGGER,
        );

        // Step 0 runs immediately
        assert_eq!(
            statuses(&store, &message_id),
            vec![StepStatus::Running, StepStatus::Pending, StepStatus::Pending]
        );

        tokio::time::sleep(STAGGER + Duration::from_millis(10)).await;
        assert_eq!(
            statuses(&store, &message_id),
            vec![StepStatus::Done, StepStatus::Running, StepStatus::Pending]
        );

        tokio::time::sleep(2 * STAGGER).await;
        assert_eq!(
            statuses(&store, &message_id),
            vec![StepStatus::Done, StepStatus::Done, StepStatus::Done]
        );
        assert_eq!(store.tasks(AGENT)[0].status, TaskStatus::Done);
        assert!(animator.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_freezes_progress() {
        let store = Arc::new(WorkspaceStore::new());
        let (message_id, steps, task_id) = plan_fixture(&store, 3);

        let animator = StepAnimator::start(
            store.clone(),
            AGENT,
            message_id.clone(),
            Some(task_id.clone()),
            steps,
            STAGGER,
        );

        // 700ms in: step 0 done, step 1 running
        tokio::time::sleep(Duration::from_millis(700)).await;
        animator.cancel();

        // Time keeps passing; nothing moves any more
        tokio::time::sleep(5 * STAGGER).await;
        assert_eq!(
            statuses(&store, &message_id),
            vec![StepStatus::Done, StepStatus::Running, StepStatus::Pending]
        );
        let task = store
            .tasks(AGENT)
            .into_iter()
            .find(|t| t.id == task_id)
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_step_plan_completes_task() {
        let store = Arc::new(WorkspaceStore::new());
        let (message_id, steps, task_id) = plan_fixture(&store, 1);

        let _animator = StepAnimator::start(
            store.clone(),
            AGENT,
            message_id.clone(),
            Some(task_id),
            steps,
            STAGGER,
        );

        tokio::time::sleep(STAGGER + Duration::from_millis(10)).await;
        assert_eq!(statuses(&store, &message_id), vec![StepStatus::Done]);
        assert_eq!(store.tasks(AGENT)[0].status, TaskStatus::Done);
    }
}
