//! Deterministic scripted provider.
//!
//! Plays back a fixed sequence of chunks, delays and errors. Used by the
//! offline demo mode of the CLI and by session tests, where a real provider
//! would make runs non-reproducible. Dropping the returned stream stops
//! playback, the same cooperative cancellation contract real providers obey.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::provider::{ChatProvider, ChatRequest, ChunkStream, ProviderError, StreamChunk};

/// One scripted playback event
#[derive(Debug, Clone)]
pub enum ScriptEvent {
    /// Yield a chunk downstream
    Chunk(StreamChunk),
    /// Sleep before the next event
    Delay(Duration),
    /// Yield a mid-stream error
    Error(ProviderError),
}

/// Provider that replays the same script for every call
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    script: Vec<ScriptEvent>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ScriptEvent>) -> Self {
        Self { script }
    }

    /// Script that streams the given text pieces with a small delay between
    /// them, the way provider output typically trickles in
    pub fn streaming_text<I, S>(pieces: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut script = Vec::new();
        for (i, piece) in pieces.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                script.push(ScriptEvent::Delay(delay));
            }
            script.push(ScriptEvent::Chunk(StreamChunk::Text {
                content: piece.into(),
            }));
        }
        Self::new(script)
    }

    /// Provider whose stream never yields; useful for exercising the
    /// first-chunk watchdog
    pub fn silent() -> Self {
        Self { script: Vec::new() }
    }

    fn is_silent(&self) -> bool {
        self.script.is_empty()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(&self, _request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        if self.is_silent() {
            return Ok(futures::stream::pending().boxed());
        }

        let events = self.script.clone().into_iter();
        let stream = futures::stream::unfold(events, |mut events| async move {
            loop {
                match events.next()? {
                    ScriptEvent::Delay(delay) => {
                        tokio::time::sleep(delay).await;
                    }
                    ScriptEvent::Chunk(chunk) => return Some((Ok(chunk), events)),
                    ScriptEvent::Error(err) => return Some((Err(err), events)),
                }
            }
        });
        Ok(stream.boxed())
    }
}
