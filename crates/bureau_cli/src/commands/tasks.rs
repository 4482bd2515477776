//! Tasks command - show an agent's task board.

use anyhow::Result;
use clap::Args;

use bureau_chat::catalog;
use bureau_core::{Task, TaskStatus, WorkspaceAction, WorkspaceStore};

/// Board section order, most urgent first
const SECTION_ORDER: [TaskStatus; 5] = [
    TaskStatus::NeedsInput,
    TaskStatus::InProgress,
    TaskStatus::Scheduled,
    TaskStatus::Done,
    TaskStatus::Failed,
];

#[derive(Args)]
pub struct TasksArgs {
    /// Agent id (e.g. chief-of-staff, designer, finance, legal)
    pub agent: String,
}

pub async fn execute(args: TasksArgs) -> Result<()> {
    let agent = catalog::agent(&args.agent)
        .ok_or_else(|| anyhow::anyhow!("Unknown agent: {}", args.agent))?;

    let store = WorkspaceStore::new();
    for task in catalog::seed_tasks() {
        store.dispatch(WorkspaceAction::AddTask { task });
    }

    let tasks = store.tasks(&agent.id);
    println!("{} {} — {}", agent.emoji, agent.name, agent.role);

    if tasks.is_empty() {
        println!("  (no tasks)");
        return Ok(());
    }

    for status in SECTION_ORDER {
        let section: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
        if section.is_empty() {
            continue;
        }
        println!("\n{}", section_label(status));
        for task in section {
            println!("  • {}", task.title);
            if !task.description.is_empty() {
                println!("      {}", task.description);
            }
        }
    }
    Ok(())
}

fn section_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NeedsInput => "⏸  Needs input",
        TaskStatus::InProgress => "▶  In progress",
        TaskStatus::Scheduled => "📅 Scheduled",
        TaskStatus::Done => "✅ Done",
        TaskStatus::Failed => "❌ Failed",
    }
}
