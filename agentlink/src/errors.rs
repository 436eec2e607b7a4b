//! Error types for registry and task management operations.

use a2a_types::InvalidAgentCard;
use thiserror::Error;

/// Main error type for agentlink operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Fetching or validating a remote agent card failed.
    #[error("discovery failed for {url}: {reason}")]
    Discovery { url: String, reason: String },

    /// No registered agent under the given URL.
    #[error("agent not found: {url}")]
    AgentNotFound { url: String },

    /// No task under the given id.
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// A payload failed validation.
    #[error("validation error: {reason}")]
    Validation { reason: String },
}

impl AgentError {
    pub fn discovery(url: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentError::Discovery {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn task_not_found(task_id: impl Into<String>) -> Self {
        AgentError::TaskNotFound {
            task_id: task_id.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        AgentError::Validation {
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results with AgentError.
pub type AgentResult<T> = std::result::Result<T, AgentError>;

impl From<InvalidAgentCard> for AgentError {
    fn from(error: InvalidAgentCard) -> Self {
        AgentError::Validation {
            reason: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(error: serde_json::Error) -> Self {
        AgentError::Validation {
            reason: error.to_string(),
        }
    }
}
