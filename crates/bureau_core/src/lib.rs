//! # bureau_core - Domain model and workspace store for Bureau
//!
//! This crate holds the shared state of a multi-agent chat workspace:
//! - Conversation, message, tool-call and plan-step types
//! - Tasks and the derived per-agent status
//! - The `WorkspaceStore`: a single-writer, action-dispatch state container
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │ WorkspaceAction │────▶│  WorkspaceStore  │
//! └─────────────────┘     │  (reducer+lock)  │
//!                         └────────┬─────────┘
//!                                  │ selectors
//!         ┌────────────────────────┼────────────────────────┐
//!         ▼                        ▼                        ▼
//! ┌───────────────┐      ┌───────────────┐       ┌───────────────┐
//! │ Conversations │      │   Messages    │       │     Tasks     │
//! └───────────────┘      └───────────────┘       └───────────────┘
//! ```
//!
//! All mutation funnels through [`WorkspaceAction`] variants; there is no
//! other write path. Actions referencing ids that no longer exist are
//! silently ignored, because streaming callbacks routinely race user-driven
//! deletion.

pub mod agent;
pub mod store;
pub mod task;
pub mod types;

pub use agent::*;
pub use store::*;
pub use task::*;
pub use types::*;
