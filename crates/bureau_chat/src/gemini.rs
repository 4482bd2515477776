//! Gemini streaming adapter.
//!
//! Maps the provider boundary onto the Gemini `streamGenerateContent` SSE
//! endpoint: thought parts become thinking chunks, text parts become text
//! chunks, and a function call triggers the simulated tool execution: the
//! call start is surfaced, a canned result is returned after a delay, and a
//! follow-up turn streams the model's response to that result. Tool
//! execution here is a stand-in; the canned results live in the catalog.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use bureau_core::{ChatMessage, MessageRole};

use crate::catalog;
use crate::config::ChatConfig;
use crate::provider::{ChatProvider, ChatRequest, ChunkStream, ProviderError, StreamChunk};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

const TOOL_USAGE_NOTE: &str = "\n\nYou have an optional tool available. Only invoke it when \
the user explicitly asks to create or generate the specific artifact it produces. For all \
other questions and conversations respond normally using your expertise. Never refuse a \
request just because it doesn't involve the tool.";

/// Streaming Gemini provider
pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    tool_call_delay: Duration,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: reqwest::Client::new(),
            tool_call_delay: ChatConfig::default().tool_call_delay,
        }
    }

    /// Build a provider from `GEMINI_API_KEY`; `None` when it is unset.
    /// `GEMINI_MODEL` overrides the default model.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty())?;
        let model = std::env::var("GEMINI_MODEL").ok().filter(|m| !m.is_empty());
        Some(Self::new(api_key, model))
    }

    /// Override the simulated tool execution delay
    pub fn with_tool_call_delay(mut self, delay: Duration) -> Self {
        self.tool_call_delay = delay;
        self
    }

    /// Get the current model
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        let (tx, rx) = mpsc::channel::<Result<StreamChunk, ProviderError>>(32);

        let driver = StreamDriver {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            tool_call_delay: self.tool_call_delay,
            request,
        };
        tokio::spawn(async move {
            driver.run(tx).await;
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }
}

/// Drives one call (and its optional tool follow-up turn) into a channel.
/// The consumer dropping the stream closes the channel, which stops the
/// driver at its next send.
struct StreamDriver {
    client: reqwest::Client,
    api_key: String,
    model: String,
    tool_call_delay: Duration,
    request: ChatRequest,
}

impl StreamDriver {
    async fn run(self, tx: mpsc::Sender<Result<StreamChunk, ProviderError>>) {
        if let Err(err) = self.drive(&tx).await {
            let _ = tx.send(Err(err)).await;
        }
    }

    async fn drive(
        &self,
        tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
    ) -> Result<(), ProviderError> {
        let mut contents: Vec<ContentPayload> = self
            .request
            .messages
            .iter()
            .filter_map(content_from_message)
            .collect();

        let Some(call) = self.stream_turn(&contents, tx, true).await? else {
            return Ok(());
        };

        // The model chose its tool: surface the call, simulate execution,
        // then stream the follow-up turn with the canned result.
        debug!(tool = %call.name, "simulating tool execution");
        let tool_id = format!("tc-{}", uuid::Uuid::new_v4());
        if !forward(
            tx,
            StreamChunk::ToolCallStart {
                id: tool_id.clone(),
                name: call.name.clone(),
                input: call.args.clone(),
            },
        )
        .await
        {
            return Ok(());
        }

        tokio::select! {
            _ = tx.closed() => return Ok(()),
            _ = tokio::time::sleep(self.tool_call_delay) => {}
        }

        let output = catalog::canned_tool_result(&call.name);
        if !forward(
            tx,
            StreamChunk::ToolCallEnd {
                id: tool_id,
                output: output.clone(),
            },
        )
        .await
        {
            return Ok(());
        }

        contents.push(ContentPayload {
            role: Some("model".to_string()),
            parts: vec![PartPayload {
                text: None,
                function_call: Some(call.clone()),
                function_response: None,
            }],
        });
        contents.push(ContentPayload {
            role: Some("user".to_string()),
            parts: vec![PartPayload {
                text: None,
                function_call: None,
                function_response: Some(FunctionResponsePayload {
                    name: call.name,
                    response: output,
                }),
            }],
        });

        self.stream_turn(&contents, tx, false).await?;
        Ok(())
    }

    /// Stream one generateContent turn. With `capture_call` set, a function
    /// call part is captured instead of streamed and any co-yielded text is
    /// suppressed, mirroring the tool-call handshake.
    async fn stream_turn(
        &self,
        contents: &[ContentPayload],
        tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
        capture_call: bool,
    ) -> Result<Option<FunctionCall>, ProviderError> {
        let has_tools = capture_call && !self.request.tools.is_empty();
        let system_text = if has_tools {
            format!("{}{TOOL_USAGE_NOTE}", self.request.system_prompt)
        } else {
            self.request.system_prompt.clone()
        };

        let body = GenerateRequest {
            system_instruction: Some(ContentPayload {
                role: None,
                parts: vec![PartPayload {
                    text: Some(system_text),
                    function_call: None,
                    function_response: None,
                }],
            }),
            contents: contents.to_vec(),
            tools: if has_tools {
                vec![ToolsPayload {
                    function_declarations: self
                        .request
                        .tools
                        .iter()
                        .map(|t| FunctionDeclPayload {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        })
                        .collect(),
                }]
            } else {
                Vec::new()
            },
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 2048,
                thinking_config: ThinkingConfig {
                    thinking_budget: -1,
                    include_thoughts: true,
                },
            },
        };

        let url = format!(
            "{GEMINI_BASE_URL}/models/{}:streamGenerateContent?alt=sse",
            self.model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut captured: Option<FunctionCall> = None;
        // Byte buffer: a multi-byte character may straddle two network
        // chunks, so decoding happens per line, never per chunk.
        let mut buffer: Vec<u8> = Vec::new();
        let mut bytes = response.bytes_stream();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| ProviderError::Network(e.to_string()))?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = buffer.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line_bytes);
                if !self
                    .handle_line(line.trim_end(), tx, capture_call, &mut captured)
                    .await?
                {
                    return Ok(None);
                }
            }
        }
        let tail = String::from_utf8_lossy(&buffer);
        if !self
            .handle_line(tail.trim_end(), tx, capture_call, &mut captured)
            .await?
        {
            return Ok(None);
        }

        Ok(captured)
    }

    /// Process one SSE line. Returns Ok(false) when the consumer went away.
    async fn handle_line(
        &self,
        line: &str,
        tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
        capture_call: bool,
        captured: &mut Option<FunctionCall>,
    ) -> Result<bool, ProviderError> {
        let Some(payload) = parse_data_line(line)? else {
            return Ok(true);
        };

        for candidate in payload.candidates {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if let Some(call) = part.function_call {
                    if capture_call {
                        *captured = Some(call);
                    }
                    continue;
                }
                let Some(text) = part.text else { continue };
                // Once a function call is seen this turn, co-yielded text
                // is suppressed
                if text.is_empty() || captured.is_some() {
                    continue;
                }
                let chunk = if part.thought {
                    StreamChunk::Thinking { content: text }
                } else {
                    StreamChunk::Text { content: text }
                };
                if !forward(tx, chunk).await {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

async fn forward(
    tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
    chunk: StreamChunk,
) -> bool {
    tx.send(Ok(chunk)).await.is_ok()
}

/// Parse one SSE line into a stream payload; non-data lines yield `None`
fn parse_data_line(line: &str) -> Result<Option<StreamResponse>, ProviderError> {
    let Some(data) = line.strip_prefix("data: ") else {
        return Ok(None);
    };
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    serde_json::from_str(data)
        .map(Some)
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

/// Map a chat message into a Gemini content turn; empty messages (e.g. an
/// interrupted shell that never got text) are skipped
fn content_from_message(message: &ChatMessage) -> Option<ContentPayload> {
    if message.content.is_empty() {
        return None;
    }
    let role = match message.role {
        MessageRole::User => "user",
        MessageRole::Agent => "model",
    };
    Some(ContentPayload {
        role: Some(role.to_string()),
        parts: vec![PartPayload {
            text: Some(message.content.clone()),
            function_call: None,
            function_response: None,
        }],
    })
}

// Gemini API types

#[derive(Debug, Serialize)]
struct GenerateRequest {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ContentPayload>,
    contents: Vec<ContentPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolsPayload>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct ContentPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<PartPayload>,
}

#[derive(Debug, Clone, Serialize)]
struct PartPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponsePayload>,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionResponsePayload {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolsPayload {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<FunctionDeclPayload>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclPayload {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "thinkingConfig")]
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "thinkingBudget")]
    thinking_budget: i32,
    #[serde(rename = "includeThoughts")]
    include_thoughts: bool,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    #[serde(rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}
