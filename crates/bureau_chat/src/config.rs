//! Tunable knobs for the chat engine.
//!
//! These values are presentation-tuned, not protocol constants; nothing
//! downstream depends on their exact magnitudes.

use std::time::Duration;

/// Configuration for sessions, plan detection and step animation
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// How long to wait for the first chunk before raising a timeout.
    /// Tool calls can take a while before yielding anything, hence generous.
    pub first_chunk_timeout: Duration,
    /// Cadence at which plan steps advance, independent of the stream
    pub step_stagger: Duration,
    /// Minimum buffered length before a non-plan prefix verdict is allowed
    pub plan_open_latency: usize,
    /// Buffered length after which an unclosed plan block is given up on
    pub plan_buffer_cap: usize,
    /// Simulated tool execution delay used by the Gemini adapter
    pub tool_call_delay: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            first_chunk_timeout: Duration::from_secs(60),
            step_stagger: Duration::from_millis(600),
            plan_open_latency: 5,
            plan_buffer_cap: 300,
            tool_call_delay: Duration::from_millis(1500),
        }
    }
}
