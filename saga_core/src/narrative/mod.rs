//! Narrative generator port.
//!
//! The generator is an external service that turns an assembled prompt into
//! free text. Nothing it returns is trusted: [`parse_response`] extracts the
//! structured payload and the turn engine sanitizes it further.

mod choice;
mod response;
mod retry;

pub use choice::*;
pub use response::*;
pub use retry::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Failures talking to the generator or reading its output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("generator timed out")]
    Timeout,

    /// The service refused the request outright.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("generation cancelled")]
    Cancelled,
}

impl GeneratorError {
    /// Transient failures and bad payloads are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GeneratorError::Transport(_) | GeneratorError::Timeout | GeneratorError::Malformed(_)
        )
    }
}

/// Which prompt template a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    /// A normal turn expecting narrative, choices and state changes.
    Turn,
    /// A final death scene. Only prose is expected back.
    Death,
}

/// One call to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeRequest {
    pub kind: RequestKind,
    pub system: String,
    pub prompt: String,
    pub turn_id: Uuid,
}

/// Anything that can write the next piece of the story.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, request: &NarrativeRequest) -> Result<String, GeneratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(GeneratorError::Timeout.is_retryable());
        assert!(GeneratorError::Transport("reset".into()).is_retryable());
        assert!(GeneratorError::Malformed("no json".into()).is_retryable());
        assert!(!GeneratorError::Rejected("content policy".into()).is_retryable());
        assert!(!GeneratorError::Cancelled.is_retryable());
    }
}
