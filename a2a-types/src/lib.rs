//! # A2A (Agent2Agent) Protocol Types
//!
//! Wire-level data structures for the Agent-to-Agent (A2A) delegation
//! protocol. The types are designed for serialization and deserialization
//! with `serde` and use the protocol's camelCase field names on the wire.
//!
//! The protocol lets one program:
//! - Discover a remote agent's capabilities via its `AgentCard`.
//! - Delegate units of work as `Task`s and track them to a terminal state.
//! - Exchange `Message`s and receive `Artifact`s, possibly chunked.
//! - Consume incremental updates as a `StreamEvent` union.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod agent_card;
pub use agent_card::{AgentCard, AgentSkill, InvalidAgentCard};

/// JSON-RPC version string used in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Well-known path of the agent descriptor, relative to an agent's base URL.
pub const AGENT_CARD_PATH: &str = ".well-known/agent-card.json";

/// Sentinel payload that ends an SSE stream.
pub const SSE_DONE_SENTINEL: &str = "[DONE]";

// ============================================================================
// JSON-RPC 2.0 Envelopes
// ============================================================================

/// Represents a JSON-RPC 2.0 identifier, which can be a string, number, or null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JsonRpcId {
    Integer(i64),
    String(String),
    Null,
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// The version of the JSON-RPC protocol. MUST be exactly "2.0".
    pub jsonrpc: String,
    /// A unique identifier established by the client.
    pub id: JsonRpcId,
    /// The name of the method to be invoked.
    pub method: String,
    /// Parameter values to be used during the method invocation.
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn new(id: JsonRpcId, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response envelope carrying either `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<JsonRpcId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<JsonRpcId>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// A JSON-RPC 2.0 error object, included in an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// A number that indicates the error type that occurred.
    pub code: i32,
    /// A short description of the error.
    pub message: String,
    /// Additional information about the error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ============================================================================
// Task Lifecycle
// ============================================================================

/// Defines the lifecycle states of a Task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// The task has been submitted and is awaiting execution.
    Submitted,
    /// The agent is actively working on the task.
    Working,
    /// The task is paused and waiting for input from the user.
    InputRequired,
    /// The task has been successfully completed.
    Completed,
    /// The task failed due to an error during execution.
    Failed,
    /// The task has been canceled by the user.
    Canceled,
    /// The task was rejected by the agent and was not started.
    Rejected,
    /// The task is in an unknown or indeterminate state.
    Unknown,
}

impl TaskState {
    /// True for the four states from which no further transition is permitted.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::Rejected
        )
    }
}

/// The status of a task at a specific point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    /// The current state of the task's lifecycle.
    pub state: TaskState,
    /// An optional human-readable message providing more details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// An ISO 8601 datetime string indicating when this status was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: None,
        }
    }
}

/// A single unit of delegated work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// A unique identifier for the task, generated by the server for a new task.
    pub id: String,
    /// Groups related tasks and interactions.
    #[serde(rename = "contextId")]
    pub context_id: String,
    /// The current status of the task.
    pub status: TaskStatus,
    /// Messages exchanged during the task, oldest first.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub history: Vec<Message>,
    /// Artifacts generated by the agent during execution.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub artifacts: Vec<Artifact>,
    /// Optional extension metadata. Merged, not replaced, on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

// ============================================================================
// Messages and Artifacts
// ============================================================================

/// Identifies the sender of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// For messages sent by the client/user.
    User,
    /// For messages sent by the agent/service.
    Agent,
}

/// A single message in the conversation between a user and an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// A unique identifier for the message, generated by the sender.
    #[serde(skip_serializing_if = "Option::is_none", rename = "messageId")]
    pub message_id: Option<String>,
    /// Identifies the sender of the message.
    pub role: MessageRole,
    /// Ordered content parts that form the message body.
    pub parts: Vec<Part>,
}

impl Message {
    /// A single-part plain-text user message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            message_id: Some(uuid::Uuid::new_v4().to_string()),
            role: MessageRole::User,
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

/// A discriminated union representing a part of a message or artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    /// A text segment.
    Text { text: String },
    /// A structured data segment (e.g., JSON).
    Data { data: serde_json::Value },
    /// A file located at a specific URI.
    File {
        uri: String,
        #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
        mime_type: Option<String>,
    },
}

/// An output blob produced by a task, possibly delivered incrementally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    /// A unique identifier for the artifact within the scope of the task.
    #[serde(rename = "artifactId")]
    pub artifact_id: String,
    /// Ordered content parts that make up the artifact.
    pub parts: Vec<Part>,
    /// If true, merge into an existing artifact of the same id instead of
    /// appending a new entry.
    #[serde(default)]
    pub append: bool,
    /// Marks streaming completion for this artifact.
    #[serde(default, rename = "lastChunk")]
    pub last_chunk: bool,
    /// An optional human-readable name for the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ============================================================================
// Streaming Events
// ============================================================================

/// One event on a task update stream.
///
/// Exactly one tag is present on the wire; serde's external tagging produces
/// `{"task": ...}`, `{"statusUpdate": ...}`, `{"artifactUpdate": ...}` or
/// `{"message": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StreamEvent {
    /// A full task snapshot replacing local state.
    #[serde(rename = "task")]
    Task(Task),
    /// A status-only update.
    #[serde(rename = "statusUpdate")]
    StatusUpdate(StatusUpdate),
    /// A new or merged artifact.
    #[serde(rename = "artifactUpdate")]
    ArtifactUpdate(ArtifactUpdate),
    /// A message appended to the task history.
    #[serde(rename = "message")]
    Message(Message),
}

impl StreamEvent {
    /// The status carried by this event, for the variants that have one.
    pub fn status(&self) -> Option<&TaskStatus> {
        match self {
            StreamEvent::Task(task) => Some(&task.status),
            StreamEvent::StatusUpdate(update) => Some(&update.status),
            _ => None,
        }
    }

    /// The task state carried by this event, if any.
    pub fn task_state(&self) -> Option<TaskState> {
        self.status().map(|s| s.state)
    }
}

/// Payload of a [`StreamEvent::StatusUpdate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub status: TaskStatus,
}

/// Payload of a [`StreamEvent::ArtifactUpdate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactUpdate {
    pub artifact: Artifact,
}

// ============================================================================
// Push Notifications
// ============================================================================

/// Configuration handed to a remote agent so it can push task updates back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushNotificationConfig {
    /// A unique id for this configuration.
    pub id: String,
    /// The webhook URL, including the task id.
    pub url: String,
    /// Opaque bearer secret the agent must present on every delivery.
    pub token: String,
    /// Subscribed terminal-state names.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<String>,
}

// ============================================================================
// Task Listing
// ============================================================================

/// Filter and pagination parameters for `tasks/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTasksParams {
    #[serde(skip_serializing_if = "Option::is_none", rename = "contextId")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "pageSize")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "pageToken")]
    pub page_token: Option<String>,
}

/// One page of tasks returned by `tasks/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    #[serde(rename = "totalSize")]
    pub total_size: u32,
}
