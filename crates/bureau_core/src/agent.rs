//! Agent identity.
//!
//! Agents are static personas loaded at startup; they are never mutated at
//! runtime. The built-in catalog lives in `bureau_chat`.

use serde::{Deserialize, Serialize};

/// Static identity of a workspace agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentProfile {
    /// Stable identifier, e.g. `"chief-of-staff"`
    pub id: String,
    /// Display name, e.g. `"Craig"`
    pub name: String,
    /// Role shown in the sidebar, e.g. `"Chief of Staff"`
    pub role: String,
    /// One-sentence description of what the agent covers
    pub description: String,
    pub emoji: String,
}

impl AgentProfile {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        description: impl Into<String>,
        emoji: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            description: description.into(),
            emoji: emoji.into(),
        }
    }
}
