//! # A2A Client
//!
//! An async client for the Agent-to-Agent (A2A) protocol. Talks JSON-RPC 2.0
//! over HTTP to a single agent endpoint and decodes server-sent event streams
//! into typed task updates.
//!
//! ## Example
//!
//! ```rust,no_run
//! use a2a_client::{A2aClient, CallOptions, SendOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = A2aClient::new("http://localhost:9000");
//!     match client.send_text("Summarize this document", CallOptions::default()).await? {
//!         SendOutcome::Task(task) => println!("task {} is {:?}", task.id, task.status.state),
//!         SendOutcome::Message(reply) => println!("direct reply: {reply:?}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod sse;

pub use client::{
    A2aClient, CallOptions, EventStream, SendOutcome, StreamOptions, WaitOptions,
    DEFAULT_CALL_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
};
pub use error::{ClientError, ClientResult};
pub use sse::{SseFrame, SseLineDecoder};

// Re-export the protocol types callers need to construct requests and
// inspect responses.
pub use a2a_types::{
    AgentCard, AgentSkill, Artifact, ListTasksParams, Message, MessageRole, Part, StreamEvent,
    Task, TaskList, TaskState, TaskStatus,
};
