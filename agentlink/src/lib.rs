//! # agentlink
//!
//! Client-side infrastructure for delegating work to remote agents over the
//! A2A protocol:
//!
//! - [`AgentRegistry`] discovers agents via their well-known card, indexes
//!   their skills and tracks reachability.
//! - [`TaskManager`] tracks delegated tasks to a terminal state, applies
//!   incremental updates and fans change events out to listeners.
//!
//! Wire types live in [`a2a_types`]; the JSON-RPC/SSE transport lives in
//! [`a2a_client`].

pub mod errors;
pub mod registry;
pub mod task;

pub use errors::{AgentError, AgentResult};
pub use registry::{
    AgentFilter, AgentRegistry, DiscoverOptions, RefreshOutcome, RegisteredAgent,
};
pub use task::{
    CleanupOptions, CreateTaskOptions, ManagedTask, TaskEvent, TaskEventReceiver, TaskManager,
};
