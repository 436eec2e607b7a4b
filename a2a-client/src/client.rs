//! JSON-RPC client for talking to a single A2A agent endpoint.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use a2a_types::{
    JsonRpcId, JsonRpcRequest, JsonRpcResponse, ListTasksParams, Message, StreamEvent, Task,
    TaskList,
};

use crate::error::{ClientError, ClientResult};
use crate::sse::{SseFrame, SseLineDecoder};

/// Default overall deadline for a unary call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default inter-event deadline for a streaming call. Streams are long-lived,
/// so the idle window is much larger than the unary deadline.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default polling cadence for [`A2aClient::send_text_and_wait`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default maximum wait for [`A2aClient::send_text_and_wait`].
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(120);

/// Per-call knobs for unary requests.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Overall deadline covering connect, send and response parsing.
    pub timeout: Duration,
    /// Optional external cancellation. Winning the race against the
    /// response aborts the call with a [`ClientError::Timeout`].
    pub cancel: Option<CancellationToken>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
            cancel: None,
        }
    }
}

/// Per-call knobs for streaming requests.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Deadline for establishing the stream (until response headers arrive).
    pub timeout: Duration,
    /// Maximum silence between consecutive chunks once the stream is open.
    pub idle_timeout: Duration,
    /// Optional external cancellation, checked between chunks.
    pub cancel: Option<CancellationToken>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            cancel: None,
        }
    }
}

/// Polling parameters for [`A2aClient::send_text_and_wait`].
#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub call: CallOptions,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            call: CallOptions::default(),
        }
    }
}

/// What `message/send` produced: a tracked task or a direct reply.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Task(Task),
    Message(Message),
}

impl SendOutcome {
    pub fn task(self) -> Option<Task> {
        match self {
            SendOutcome::Task(task) => Some(task),
            SendOutcome::Message(_) => None,
        }
    }
}

/// A pinned stream of task update events.
pub type EventStream = Pin<Box<dyn Stream<Item = ClientResult<StreamEvent>> + Send>>;

/// Client for one A2A agent endpoint.
///
/// Cheap to clone; the underlying HTTP connection pool is shared.
#[derive(Debug, Clone)]
pub struct A2aClient {
    http: reqwest::Client,
    endpoint_url: String,
    auth_token: Option<String>,
    extra_headers: HashMap<String, String>,
    request_id: Arc<AtomicU64>,
}

impl A2aClient {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint_url: endpoint_url.into(),
            auth_token: None,
            extra_headers: HashMap::new(),
            request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Use a preconfigured HTTP client (custom pool, proxy, TLS).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Attach a bearer token to every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Attach an extra header to every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    fn next_request_id(&self) -> JsonRpcId {
        JsonRpcId::Integer(self.request_id.fetch_add(1, Ordering::Relaxed) as i64)
    }

    // ------------------------------------------------------------------
    // Unary operations
    // ------------------------------------------------------------------

    /// Send a message to the agent. The agent either opens (or advances) a
    /// task or replies directly with a message.
    pub async fn send_message(
        &self,
        message: Message,
        options: CallOptions,
    ) -> ClientResult<SendOutcome> {
        let result = self
            .call("message/send", json!({ "message": message }), &options)
            .await?;

        #[derive(Deserialize)]
        struct SendResult {
            task: Option<Task>,
            message: Option<Message>,
        }

        // Servers differ: some wrap the result, some return a bare task.
        let wrapped: SendResult = serde_json::from_value(result.clone())?;
        if let Some(task) = wrapped.task {
            return Ok(SendOutcome::Task(task));
        }
        if let Some(message) = wrapped.message {
            return Ok(SendOutcome::Message(message));
        }
        serde_json::from_value::<Task>(result)
            .map(SendOutcome::Task)
            .map_err(|_| {
                ClientError::validation("message/send result carries neither task nor message")
            })
    }

    /// Send a single-part text message.
    pub async fn send_text(
        &self,
        text: impl Into<String>,
        options: CallOptions,
    ) -> ClientResult<SendOutcome> {
        self.send_message(Message::user_text(text), options).await
    }

    /// Send a text message, then poll `tasks/get` until the task reaches a
    /// terminal state or `max_wait` elapses.
    ///
    /// A direct message reply is returned as-is; there is nothing to wait for.
    pub async fn send_text_and_wait(
        &self,
        text: impl Into<String>,
        options: WaitOptions,
    ) -> ClientResult<SendOutcome> {
        let outcome = self.send_text(text, options.call.clone()).await?;
        let task = match outcome {
            SendOutcome::Message(_) => return Ok(outcome),
            SendOutcome::Task(task) => task,
        };
        if task.status.state.is_terminal() {
            return Ok(SendOutcome::Task(task));
        }

        let task_id = task.id.clone();
        let deadline = tokio::time::Instant::now() + options.max_wait;
        loop {
            tokio::time::sleep(options.poll_interval).await;
            if tokio::time::Instant::now() >= deadline {
                return Err(ClientError::timeout(format!(
                    "task {task_id} did not reach a terminal state within {:?}",
                    options.max_wait
                )));
            }
            let task = self.get_task(&task_id, options.call.clone()).await?;
            if task.status.state.is_terminal() {
                return Ok(SendOutcome::Task(task));
            }
        }
    }

    /// Fetch the current state of a task.
    pub async fn get_task(&self, task_id: &str, options: CallOptions) -> ClientResult<Task> {
        let result = self
            .call("tasks/get", json!({ "id": task_id }), &options)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Request cancellation of a task. Returns the task as the agent sees it
    /// after the request; the agent may refuse and leave the state unchanged.
    pub async fn cancel_task(&self, task_id: &str, options: CallOptions) -> ClientResult<Task> {
        let result = self
            .call("tasks/cancel", json!({ "id": task_id }), &options)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// List tasks known to the agent, with optional filters and pagination.
    pub async fn list_tasks(
        &self,
        params: ListTasksParams,
        options: CallOptions,
    ) -> ClientResult<TaskList> {
        let result = self
            .call("tasks/list", serde_json::to_value(&params)?, &options)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    // ------------------------------------------------------------------
    // Streaming operations
    // ------------------------------------------------------------------

    /// Send a message and stream task updates as they happen.
    ///
    /// The stream ends on the `[DONE]` sentinel, on a terminal task state,
    /// or with an error item on timeout, cancellation or transport failure.
    pub async fn send_streaming_message(
        &self,
        message: Message,
        options: StreamOptions,
    ) -> ClientResult<EventStream> {
        self.open_stream("message/stream", json!({ "message": message }), options)
            .await
    }

    /// Re-attach to the update stream of an existing task.
    pub async fn subscribe_to_task(
        &self,
        task_id: &str,
        options: StreamOptions,
    ) -> ClientResult<EventStream> {
        self.open_stream("tasks/subscribe", json!({ "id": task_id }), options)
            .await
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn rpc_request(&self, method: &str, params: Value) -> reqwest::RequestBuilder {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        let mut builder = self.http.post(&self.endpoint_url).json(&request);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &self.extra_headers {
            builder = builder.header(name, value);
        }
        builder
    }

    async fn call(&self, method: &str, params: Value, options: &CallOptions) -> ClientResult<Value> {
        let exchange = async {
            let response = self.rpc_request(method, params).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::transport(
                    format!("agent returned HTTP {status}"),
                    Some(status.as_u16()),
                ));
            }
            let envelope: JsonRpcResponse = response.json().await?;
            if let Some(error) = envelope.error {
                return Err(ClientError::Protocol {
                    code: error.code,
                    message: error.message,
                    data: error.data,
                });
            }
            envelope
                .result
                .ok_or_else(|| ClientError::validation("response carries neither result nor error"))
        };
        bounded(exchange, options.timeout, options.cancel.as_ref(), method).await
    }

    async fn open_stream(
        &self,
        method: &str,
        params: Value,
        options: StreamOptions,
    ) -> ClientResult<EventStream> {
        let connect = async {
            let response = self
                .rpc_request(method, params)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::transport(
                    format!("agent returned HTTP {status}"),
                    Some(status.as_u16()),
                ));
            }
            Ok(response)
        };
        let response = bounded(connect, options.timeout, options.cancel.as_ref(), method).await?;

        let idle_timeout = options.idle_timeout;
        let cancel = options.cancel;
        let stream = async_stream::stream! {
            let mut body = response.bytes_stream();
            let mut decoder = SseLineDecoder::new();
            loop {
                let chunk = tokio::select! {
                    _ = cancelled(&cancel) => {
                        yield Err(ClientError::timeout("stream canceled"));
                        return;
                    }
                    next = tokio::time::timeout(idle_timeout, body.next()) => match next {
                        Err(_) => {
                            yield Err(ClientError::timeout(format!(
                                "no stream data for {idle_timeout:?}"
                            )));
                            return;
                        }
                        // Server closed the connection without [DONE].
                        Ok(None) => return,
                        Ok(Some(Err(error))) => {
                            yield Err(error.into());
                            return;
                        }
                        Ok(Some(Ok(chunk))) => chunk,
                    },
                };
                for frame in decoder.feed(&chunk) {
                    match frame {
                        SseFrame::Done => return,
                        SseFrame::Event(event) => {
                            let terminal =
                                event.task_state().is_some_and(|state| state.is_terminal());
                            yield Ok(event);
                            // A terminal state ends the stream even if the
                            // server never sends the sentinel.
                            if terminal {
                                return;
                            }
                        }
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Resolve when the token is canceled, or never if there is no token.
async fn cancelled(cancel: &Option<CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Race a fallible future against a deadline and an optional cancellation.
async fn bounded<F, T>(
    work: F,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
    method: &str,
) -> ClientResult<T>
where
    F: std::future::Future<Output = ClientResult<T>>,
{
    let deadline_err = || ClientError::timeout(format!("{method} exceeded {timeout:?}"));
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(ClientError::timeout(format!("{method} canceled"))),
            result = tokio::time::timeout(timeout, work) => {
                result.map_err(|_| deadline_err())?
            }
        },
        None => tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| deadline_err())?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_types::{TaskState, TaskStatus};

    fn sample_task(state: TaskState) -> Value {
        serde_json::to_value(Task {
            id: "t1".into(),
            context_id: "c1".into(),
            status: TaskStatus::new(state),
            history: vec![],
            artifacts: vec![],
            metadata: None,
        })
        .unwrap()
    }

    #[test]
    fn request_ids_are_monotonic() {
        let client = A2aClient::new("http://localhost:9000");
        let first = client.next_request_id();
        let second = client.next_request_id();
        assert_eq!(first, JsonRpcId::Integer(1));
        assert_eq!(second, JsonRpcId::Integer(2));
    }

    #[test]
    fn clones_share_the_id_counter() {
        let client = A2aClient::new("http://localhost:9000");
        let clone = client.clone();
        assert_eq!(client.next_request_id(), JsonRpcId::Integer(1));
        assert_eq!(clone.next_request_id(), JsonRpcId::Integer(2));
    }

    #[test]
    fn bare_task_result_parses_as_task_outcome() {
        // The fallback path in send_message accepts an unwrapped task.
        let value = sample_task(TaskState::Submitted);
        let task: Task = serde_json::from_value(value).unwrap();
        assert_eq!(task.status.state, TaskState::Submitted);
    }

    #[tokio::test]
    async fn bounded_respects_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result: ClientResult<()> = bounded(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            Duration::from_secs(10),
            Some(&token),
            "tasks/get",
        )
        .await;
        assert!(matches!(result, Err(ClientError::Timeout { .. })));
    }

    #[tokio::test]
    async fn bounded_respects_deadline() {
        tokio::time::pause();
        let work = bounded(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            Duration::from_secs(1),
            None,
            "tasks/get",
        );
        let result: ClientResult<()> = work.await;
        assert!(matches!(result, Err(ClientError::Timeout { .. })));
    }
}
