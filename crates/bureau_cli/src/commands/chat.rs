//! Chat command - interactive streaming chat with one agent.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::info;

use bureau_chat::catalog;
use bureau_chat::{
    ChatError, ChatProvider, GeminiProvider, ScriptEvent, ScriptedProvider, SessionController,
    StreamChunk,
};
use bureau_core::{ChatMessage, MessageRole, StepStatus, WorkspaceAction, WorkspaceStore};

#[derive(Args)]
pub struct ChatArgs {
    /// Agent id (e.g. chief-of-staff, designer, finance, legal)
    #[arg(default_value = catalog::DEFAULT_AGENT_ID)]
    pub agent: String,

    /// Send a single message and exit instead of starting a REPL
    #[arg(short, long)]
    pub message: Option<String>,

    /// Use the offline scripted provider even when GEMINI_API_KEY is set
    #[arg(long)]
    pub offline: bool,
}

pub async fn execute(args: ChatArgs) -> Result<()> {
    let agent = catalog::agent(&args.agent)
        .ok_or_else(|| anyhow::anyhow!("Unknown agent: {}", args.agent))?;

    let store = Arc::new(WorkspaceStore::new());
    for task in catalog::seed_tasks() {
        store.dispatch(WorkspaceAction::AddTask { task });
    }

    let provider: Arc<dyn ChatProvider> = if args.offline {
        Arc::new(demo_provider())
    } else {
        match GeminiProvider::from_env() {
            Some(gemini) => {
                info!(model = gemini.model(), "using Gemini provider");
                Arc::new(gemini)
            }
            None => {
                println!("(GEMINI_API_KEY not set — running the offline demo provider)");
                Arc::new(demo_provider())
            }
        }
    };

    let controller = Arc::new(SessionController::new(Arc::clone(&store), provider));

    println!("{} {} — {}", agent.emoji, agent.name, agent.role);
    println!("{}", agent.description);

    if let Some(message) = args.message {
        return run_turn(&controller, &agent.id, &message).await;
    }

    println!("Type a message; /retry replays after an error, /new starts a conversation, /quit exits.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&agent.name);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                controller.create_conversation(&agent.id);
                println!("(new conversation)");
            }
            "/retry" => {
                let reply_index = store.active_messages(&agent.id).len();
                match controller.retry(&agent.id) {
                    Ok(handle) => follow(&controller, &agent.id, reply_index, handle).await?,
                    Err(ChatError::NoUserMessage) => println!("(nothing to retry yet)"),
                    Err(err) => return Err(err.into()),
                }
            }
            text => run_turn(&controller, &agent.id, text).await?,
        }
    }
    Ok(())
}

fn prompt(name: &str) {
    print!("\n{name} ▸ ");
    let _ = std::io::stdout().flush();
}

/// Submit one message and render its streamed reply
async fn run_turn(controller: &Arc<SessionController>, agent_id: &str, text: &str) -> Result<()> {
    // The reply shell lands right after the user message we append
    let reply_index = controller.store().active_messages(agent_id).len() + 1;
    let handle = match controller.submit(agent_id, text) {
        Ok(handle) => handle,
        Err(ChatError::EmptyInput) => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    follow(controller, agent_id, reply_index, handle).await
}

/// Render a streaming reply as it lands in the store, then summarize steps,
/// tool calls and errors once the stream settles. Ctrl-C stops the stream.
async fn follow(
    controller: &Arc<SessionController>,
    agent_id: &str,
    reply_index: usize,
    mut handle: JoinHandle<()>,
) -> Result<()> {
    let store = Arc::clone(controller.store());
    let mut printed = 0usize;
    let mut ticker = tokio::time::interval(Duration::from_millis(50));

    loop {
        tokio::select! {
            _ = &mut handle => break,
            _ = tokio::signal::ctrl_c() => {
                controller.stop(agent_id);
                println!("\n⏹  stopped");
            }
            _ = ticker.tick() => {
                printed = print_new_content(&store, agent_id, reply_index, printed);
            }
        }
    }
    printed = print_new_content(&store, agent_id, reply_index, printed);
    if printed > 0 {
        println!();
    }

    if let Some(reply) = reply_at(&store, agent_id, reply_index) {
        if reply.thinking.is_some() {
            println!("💭 thought for a moment");
        }
        for call in &reply.tool_calls {
            let output = call
                .output
                .as_ref()
                .map(|o| o.to_string())
                .unwrap_or_else(|| "…".to_string());
            println!("🔧 {} → {}", call.name, output);
        }
        if !reply.steps.is_empty() {
            wait_for_steps(&store, agent_id, reply_index).await;
            let settled = reply_at(&store, agent_id, reply_index).unwrap_or_else(|| reply.clone());
            println!("📋 {}", settled.task_title.as_deref().unwrap_or("Plan"));
            for step in &settled.steps {
                println!("   {} {}", step_icon(step.status), step.label);
            }
        }
        if reply.interrupted {
            println!("· interrupted");
        }
    }

    if let Some(kind) = controller.last_error(agent_id) {
        println!("⚠️  {} (/retry to try again)", kind.user_message());
    }
    Ok(())
}

fn reply_at(store: &WorkspaceStore, agent_id: &str, index: usize) -> Option<ChatMessage> {
    store
        .active_messages(agent_id)
        .get(index)
        .filter(|m| m.role == MessageRole::Agent)
        .cloned()
}

/// Print whatever content arrived since the last tick; returns the new
/// printed length. Content is append-only, so the old length is always a
/// valid boundary.
fn print_new_content(
    store: &WorkspaceStore,
    agent_id: &str,
    reply_index: usize,
    printed: usize,
) -> usize {
    let Some(reply) = reply_at(store, agent_id, reply_index) else {
        return printed;
    };
    if reply.content.len() > printed {
        print!("{}", &reply.content[printed..]);
        let _ = std::io::stdout().flush();
        return reply.content.len();
    }
    printed
}

/// Give the step animation time to play out before the summary
async fn wait_for_steps(store: &WorkspaceStore, agent_id: &str, reply_index: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        let Some(reply) = reply_at(store, agent_id, reply_index) else {
            return;
        };
        let settled = reply
            .steps
            .iter()
            .all(|s| matches!(s.status, StepStatus::Done | StepStatus::Error));
        // An interrupted reply freezes its animation; don't wait it out
        if settled || reply.interrupted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn step_icon(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "○",
        StepStatus::Running => "◐",
        StepStatus::Done => "●",
        StepStatus::Error => "✗",
    }
}

/// Offline provider: a canned reply that exercises thinking, plan animation
/// and streamed text without a network call
fn demo_provider() -> ScriptedProvider {
    ScriptedProvider::new(vec![
        ScriptEvent::Chunk(StreamChunk::Thinking {
            content: "Breaking the request into concrete steps.".to_string(),
        }),
        ScriptEvent::Delay(Duration::from_millis(400)),
        ScriptEvent::Chunk(StreamChunk::Text {
            content: "<plan>\nDraft Working Plan\nReviewing the request\nPulling context\nWriting the draft\n</plan>\n".to_string(),
        }),
        ScriptEvent::Delay(Duration::from_millis(300)),
        ScriptEvent::Chunk(StreamChunk::Text {
            content: "Here's my take: I'd start with the outline, ".to_string(),
        }),
        ScriptEvent::Delay(Duration::from_millis(250)),
        ScriptEvent::Chunk(StreamChunk::Text {
            content: "then fill in the sections that need your sign-off first.".to_string(),
        }),
    ])
}
