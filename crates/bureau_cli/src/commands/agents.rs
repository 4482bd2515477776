//! Agents command - list agents with their derived status.

use anyhow::Result;
use clap::Args;

use bureau_chat::catalog;
use bureau_core::{AgentStatus, WorkspaceAction, WorkspaceStore};

#[derive(Args)]
pub struct AgentsArgs {}

pub async fn execute(_args: AgentsArgs) -> Result<()> {
    let store = WorkspaceStore::new();
    for task in catalog::seed_tasks() {
        store.dispatch(WorkspaceAction::AddTask { task });
    }

    println!("Agents:");
    for agent in catalog::builtin_agents() {
        let status = store.agent_status(&agent.id);
        println!(
            "  {} {:<8} {:<16} {:<12} {}",
            agent.emoji,
            agent.name,
            agent.role,
            status_label(status),
            agent.description
        );
    }
    Ok(())
}

pub fn status_label(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Idle => "idle",
        AgentStatus::Working => "working",
        AgentStatus::NeedsInput => "needs-input",
        AgentStatus::Failed => "failed",
    }
}
