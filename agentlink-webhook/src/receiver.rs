//! HTTP endpoint that receives push notifications from remote agents.
//!
//! Remote agents deliver task updates as `POST {prefix}/{taskId}` with a
//! per-task bearer token minted by [`WebhookReceiver::generate_config`].
//! Accepted updates are applied to the shared [`TaskManager`] and fanned
//! out to local subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use a2a_types::{PushNotificationConfig, StreamEvent};
use agentlink::{AgentError, TaskManager};

use crate::error::{WebhookError, WebhookResult};

/// Hard cap on delivery bodies.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default URL prefix for delivery routes.
pub const DEFAULT_PATH_PREFIX: &str = "/webhooks";

/// Terminal-state names a push config subscribes to.
const TERMINAL_EVENTS: [&str; 4] = ["completed", "failed", "canceled", "rejected"];

/// One accepted delivery, handed to local subscribers after the update has
/// been applied.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub task_id: String,
    pub event: StreamEvent,
    /// Request headers, for callers that care about tracing or signatures.
    pub headers: HashMap<String, String>,
}

#[derive(Clone)]
struct ReceiverState {
    tasks: Arc<TaskManager>,
    /// task id -> expected bearer token.
    tokens: Arc<DashMap<String, String>>,
    subscribers: Arc<std::sync::Mutex<Vec<mpsc::UnboundedSender<WebhookDelivery>>>>,
}

impl ReceiverState {
    fn deliver(&self, delivery: WebhookDelivery) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|sender| sender.send(delivery.clone()).is_ok());
    }
}

struct Running {
    port: u16,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

/// Push notification endpoint with per-task token auth.
pub struct WebhookReceiver {
    state: ReceiverState,
    path_prefix: String,
    port: u16,
    external_url: Option<String>,
    running: Option<Running>,
}

impl WebhookReceiver {
    pub fn new(tasks: Arc<TaskManager>) -> Self {
        Self {
            state: ReceiverState {
                tasks,
                tokens: Arc::new(DashMap::new()),
                subscribers: Arc::new(std::sync::Mutex::new(Vec::new())),
            },
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            port: 0,
            external_url: None,
            running: None,
        }
    }

    /// Route prefix for deliveries; must start with `/`.
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Public base URL advertised in generated configs, for deployments
    /// behind a proxy. Defaults to the local bind address.
    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    /// Change the bind port. Only allowed while stopped.
    pub fn set_port(&mut self, port: u16) -> WebhookResult<()> {
        if self.running.is_some() {
            return Err(WebhookError::AlreadyRunning);
        }
        self.port = port;
        Ok(())
    }

    /// The bound port while running, otherwise the configured port.
    pub fn port(&self) -> u16 {
        self.running.as_ref().map_or(self.port, |r| r.port)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Mint a push config for a task: a fresh random bearer token and the
    /// delivery URL the remote agent must POST to.
    pub fn generate_config(&self, task_id: &str) -> PushNotificationConfig {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        self.state
            .tokens
            .insert(task_id.to_string(), token.clone());

        PushNotificationConfig {
            id: uuid::Uuid::new_v4().to_string(),
            url: format!("{}{}/{}", self.base_url(), self.path_prefix, task_id),
            token,
            events: TERMINAL_EVENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Invalidate the push token of a task. Returns false when none exists.
    pub fn revoke(&self, task_id: &str) -> bool {
        self.state.tokens.remove(task_id).is_some()
    }

    /// Invalidate every push token.
    pub fn clear_tokens(&self) {
        self.state.tokens.clear();
    }

    /// Receive accepted deliveries. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<WebhookDelivery> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.state
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sender);
        receiver
    }

    /// Bind and serve. Returns the bound port (useful with port 0).
    pub async fn start(&mut self) -> WebhookResult<u16> {
        if self.running.is_some() {
            return Err(WebhookError::AlreadyRunning);
        }

        let listener =
            tokio::net::TcpListener::bind(("127.0.0.1", self.port)).await?;
        let port = listener.local_addr()?.port();

        let app = Router::new()
            .nest(
                &self.path_prefix,
                Router::new()
                    .route("/:task_id", post(handle_delivery))
                    .with_state(self.state.clone()),
            )
            .layer(CorsLayer::permissive());

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await });
            if let Err(error) = server.await {
                tracing::error!(%error, "webhook server exited with error");
            }
        });

        tracing::info!(port, prefix = %self.path_prefix, "webhook receiver listening");
        self.running = Some(Running {
            port,
            shutdown,
            handle,
        });
        Ok(port)
    }

    /// Graceful shutdown. A no-op when not running.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
            if let Err(error) = running.handle.await {
                tracing::warn!(%error, "webhook server task panicked during shutdown");
            }
        }
    }

    fn base_url(&self) -> String {
        match &self.external_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://127.0.0.1:{}", self.port()),
        }
    }
}

impl Drop for WebhookReceiver {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
        }
    }
}

/// Delivery handler. Rejections happen in a fixed order: unknown task id,
/// then bad token, then oversize body, then malformed payload.
async fn handle_delivery(
    State(state): State<ReceiverState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, WebhookError> {
    let expected = state
        .tokens
        .get(&task_id)
        .map(|token| token.clone())
        .ok_or(WebhookError::UnknownTask)?;

    let presented = bearer_token(&headers).ok_or(WebhookError::InvalidToken)?;
    if presented != expected {
        tracing::warn!(%task_id, "rejected delivery with mismatched token");
        return Err(WebhookError::InvalidToken);
    }

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| WebhookError::PayloadTooLarge)?;
    let event: StreamEvent = serde_json::from_slice(&bytes)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    state
        .tasks
        .apply_stream_event(&task_id, event.clone())
        .map_err(|error| match error {
            AgentError::TaskNotFound { .. } => WebhookError::UnknownTask,
            other => WebhookError::Internal(other.to_string()),
        })?;

    // One-shot tokens: a terminal update ends the delivery contract.
    if event.task_state().is_some_and(|state| state.is_terminal()) {
        state.tokens.remove(&task_id);
        tracing::debug!(%task_id, "task reached terminal state, push token revoked");
    }

    state.deliver(WebhookDelivery {
        task_id,
        event,
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
    });

    Ok((StatusCode::OK, Json(serde_json::json!({ "ok": true }))))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
