//! Error types for the chat engine.

use thiserror::Error;

use crate::provider::ProviderError;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors raised around a streaming session
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("timed out waiting for the first chunk")]
    Timeout,

    #[error("message is empty")]
    EmptyInput,

    #[error("conversation has no user message to retry")]
    NoUserMessage,
}

/// Retryable error category surfaced to the user, one slot per agent.
///
/// Classification is a substring heuristic over the provider's error text;
/// `Timeout` is only ever raised locally by the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    Network,
    Timeout,
    Generic,
}

impl ErrorKind {
    /// Classify a session error into its retryable category
    pub fn classify(err: &ChatError) -> Self {
        if matches!(err, ChatError::Timeout) {
            return Self::Timeout;
        }
        let msg = err.to_string().to_lowercase();
        if msg.contains("rate") || msg.contains("429") {
            Self::RateLimited
        } else if msg.contains("network") || msg.contains("fetch") {
            Self::Network
        } else {
            Self::Generic
        }
    }

    /// Banner text shown next to the retry control
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RateLimited => "Rate limited — wait a moment before trying again.",
            Self::Network => "Connection lost — check your network and retry.",
            Self::Timeout => "Response timed out — try again.",
            Self::Generic => "Something went wrong. Try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        let err = ChatError::Provider(ProviderError::Api {
            status: 429,
            message: "quota exceeded".to_string(),
        });
        assert_eq!(ErrorKind::classify(&err), ErrorKind::RateLimited);

        let err = ChatError::Provider(ProviderError::Network(
            "rate limit hit upstream".to_string(),
        ));
        assert_eq!(ErrorKind::classify(&err), ErrorKind::RateLimited);
    }

    #[test]
    fn test_classify_network() {
        let err = ChatError::Provider(ProviderError::Network("connection reset".to_string()));
        assert_eq!(ErrorKind::classify(&err), ErrorKind::Network);
    }

    #[test]
    fn test_classify_timeout_and_generic() {
        assert_eq!(ErrorKind::classify(&ChatError::Timeout), ErrorKind::Timeout);

        let err = ChatError::Provider(ProviderError::Malformed("odd payload".to_string()));
        assert_eq!(ErrorKind::classify(&err), ErrorKind::Generic);
    }
}
