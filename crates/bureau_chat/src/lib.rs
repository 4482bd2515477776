//! # bureau_chat - Streaming chat engine for Bureau
//!
//! This crate turns an incremental model stream into workspace state:
//! - **Session controller**: one in-flight call per agent, with a first-chunk
//!   watchdog, cooperative cancellation and error classification
//! - **Plan detection**: a one-shot classifier for the `<plan>` block agents
//!   embed at the start of multi-step answers
//! - **Step animation**: timer-driven step progress, independent of the
//!   stream's actual pace
//! - **Agent catalog**: built-in personas, tool declaration tables and seed
//!   tasks
//! - **Providers**: the `ChatProvider` boundary plus a Gemini SSE adapter
//!   and a deterministic scripted provider
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   chunks    ┌───────────────────┐   actions   ┌────────────────┐
//! │ ChatProvider │────────────▶│ SessionController │────────────▶│ WorkspaceStore │
//! └──────────────┘             └───────┬───────────┘             └────────────────┘
//!        ▲                             │ plan detected                   ▲
//!        │                     ┌───────▼───────┐      timed ticks       │
//!   gemini / scripted          │ StepAnimator  │────────────────────────┘
//!                              └───────────────┘
//! ```
//!
//! The provider's chunk union is matched exhaustively in the session
//! controller and nowhere else; everything downstream sees only store
//! actions.

pub mod animator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gemini;
pub mod plan;
pub mod provider;
pub mod scripted;
pub mod session;

pub use animator::*;
pub use config::*;
pub use error::*;
pub use gemini::GeminiProvider;
pub use plan::*;
pub use provider::*;
pub use scripted::*;
pub use session::*;
