//! Provider boundary for streaming model calls.
//!
//! The chat engine only depends on three things at this seam: chunks arrive
//! in order, the stream can be terminated early by dropping it, and the call
//! may fail either on open or mid-stream. The chunk union is closed and is
//! matched exhaustively in exactly one place (the session controller); it
//! never leaks past that boundary.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bureau_core::ChatMessage;

#[cfg(test)]
use mockall::automock;

/// A typed chunk of incremental model output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Incremental thinking trace
    Thinking { content: String },
    /// Incremental visible text
    Text { content: String },
    /// The model started a tool invocation
    ToolCallStart {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// A tool invocation produced its result
    ToolCallEnd { id: String, output: serde_json::Value },
}

/// Declared capability of an agent, passed through to the provider.
///
/// Tool selection is the model's job; this side only declares and renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDecl {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool parameters
    pub parameters: serde_json::Value,
}

/// One streaming request: full message history plus the persona prompt
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub agent_id: String,
    pub messages: Vec<ChatMessage>,
    pub system_prompt: String,
    pub tools: Vec<ToolDecl>,
}

/// Errors raised by a provider, on open or mid-stream
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed stream payload: {0}")]
    Malformed(String),
}

/// Ordered stream of chunks. Dropping the stream cancels the call.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

/// An opaque async source of typed chunks.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open one streaming chat call for the given request
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_serde_tagging() {
        let chunk = StreamChunk::Text {
            content: "hi".to_string(),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "text");

        let parsed: StreamChunk = serde_json::from_value(serde_json::json!({
            "type": "tool_call_start",
            "id": "tc-1",
            "name": "draft_document",
            "input": {"title": "NDA"}
        }))
        .unwrap();
        match parsed {
            StreamChunk::ToolCallStart { id, name, .. } => {
                assert_eq!(id, "tc-1");
                assert_eq!(name, "draft_document");
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }
}
