//! CLI command definitions.
//!
//! Each subcommand maps to one view of the agent workspace: the agent
//! sidebar, an agent's task board, or an interactive chat.

use clap::{Parser, Subcommand};

pub mod agents;
pub mod chat;
pub mod tasks;

/// Bureau - a workspace of role-based AI agents
#[derive(Parser)]
#[command(name = "bureau")]
#[command(version, about = "Bureau - a workspace of role-based AI agents")]
#[command(long_about = r#"
Bureau is a multi-agent chat workspace: role-based agents with their own
personas, per-agent conversations and tasks, and streaming replies with
inline plan animation and tool-call cards.

COMMANDS:
  agents → List agents with their derived status
  tasks  → Show an agent's task board
  chat   → Chat with an agent (streaming)

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List agents with their derived status
    Agents(agents::AgentsArgs),

    /// Show an agent's task board
    Tasks(tasks::TasksArgs),

    /// Chat with an agent
    Chat(chat::ChatArgs),
}
