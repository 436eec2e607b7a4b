//! # agentlink-webhook
//!
//! Push notification endpoint for the A2A delegation protocol. Remote
//! agents deliver task updates with per-task bearer tokens; accepted
//! updates feed the shared [`agentlink::TaskManager`] and are fanned out
//! to local subscribers.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentlink::TaskManager;
//! use agentlink_webhook::WebhookReceiver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tasks = Arc::new(TaskManager::new());
//!     let mut receiver = WebhookReceiver::new(tasks);
//!     let port = receiver.start().await?;
//!     let config = receiver.generate_config("task-123");
//!     println!("agents push to {} (port {port})", config.url);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod receiver;

pub use error::{WebhookError, WebhookResult};
pub use receiver::{WebhookDelivery, WebhookReceiver, DEFAULT_PATH_PREFIX, MAX_BODY_BYTES};
