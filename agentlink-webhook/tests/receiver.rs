//! Black-box tests of the webhook endpoint over real HTTP.

use std::sync::Arc;

use agentlink::{CreateTaskOptions, TaskManager};
use agentlink_webhook::WebhookReceiver;

use a2a_types::{StatusUpdate, StreamEvent, Task, TaskState, TaskStatus};

fn tracked_task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        context_id: "c1".to_string(),
        status: TaskStatus::new(TaskState::Submitted),
        history: vec![],
        artifacts: vec![],
        metadata: None,
    }
}

fn status_event(state: TaskState) -> StreamEvent {
    StreamEvent::StatusUpdate(StatusUpdate {
        status: TaskStatus::new(state),
    })
}

async fn start_receiver() -> (Arc<TaskManager>, WebhookReceiver) {
    let tasks = Arc::new(TaskManager::new());
    let mut receiver = WebhookReceiver::new(tasks.clone());
    receiver.start().await.unwrap();
    (tasks, receiver)
}

#[tokio::test]
async fn accepted_delivery_updates_the_task() {
    let (tasks, receiver) = start_receiver().await;
    tasks.register(tracked_task("t1"), CreateTaskOptions::default());
    let config = receiver.generate_config("t1");

    let response = reqwest::Client::new()
        .post(&config.url)
        .bearer_auth(&config.token)
        .json(&status_event(TaskState::Working))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        tasks.get("t1").unwrap().task.status.state,
        TaskState::Working
    );
}

#[tokio::test]
async fn terminal_delivery_revokes_the_token() {
    let (tasks, receiver) = start_receiver().await;
    tasks.register(tracked_task("t1"), CreateTaskOptions::default());
    let config = receiver.generate_config("t1");
    let client = reqwest::Client::new();

    let response = client
        .post(&config.url)
        .bearer_auth(&config.token)
        .json(&status_event(TaskState::Completed))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(!tasks.get("t1").unwrap().is_active);

    // The token died with the task.
    let replay = client
        .post(&config.url)
        .bearer_auth(&config.token)
        .json(&status_event(TaskState::Working))
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), 404);
}

#[tokio::test]
async fn unknown_task_id_is_404_even_with_a_valid_looking_token() {
    let (_tasks, receiver) = start_receiver().await;
    let url = format!("http://127.0.0.1:{}/webhooks/nope", receiver.port());

    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth("deadbeef")
        .json(&status_event(TaskState::Working))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn wrong_or_missing_token_is_401() {
    let (tasks, receiver) = start_receiver().await;
    tasks.register(tracked_task("t1"), CreateTaskOptions::default());
    let config = receiver.generate_config("t1");
    let client = reqwest::Client::new();

    let wrong = client
        .post(&config.url)
        .bearer_auth("not-the-token")
        .json(&status_event(TaskState::Working))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    let missing = client
        .post(&config.url)
        .json(&status_event(TaskState::Working))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    // Rejected deliveries never touch the task.
    assert_eq!(
        tasks.get("t1").unwrap().task.status.state,
        TaskState::Submitted
    );
}

#[tokio::test]
async fn wrong_method_is_405() {
    let (tasks, receiver) = start_receiver().await;
    tasks.register(tracked_task("t1"), CreateTaskOptions::default());
    let config = receiver.generate_config("t1");

    let response = reqwest::Client::new()
        .get(&config.url)
        .bearer_auth(&config.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn oversize_body_is_413() {
    let (tasks, receiver) = start_receiver().await;
    tasks.register(tracked_task("t1"), CreateTaskOptions::default());
    let config = receiver.generate_config("t1");

    let oversize = vec![b'x'; agentlink_webhook::MAX_BODY_BYTES + 1];
    let response = reqwest::Client::new()
        .post(&config.url)
        .bearer_auth(&config.token)
        .body(oversize)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 413);
}

#[tokio::test]
async fn malformed_payload_is_400() {
    let (tasks, receiver) = start_receiver().await;
    tasks.register(tracked_task("t1"), CreateTaskOptions::default());
    let config = receiver.generate_config("t1");

    let response = reqwest::Client::new()
        .post(&config.url)
        .bearer_auth(&config.token)
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn subscribers_see_accepted_deliveries() {
    let (tasks, receiver) = start_receiver().await;
    tasks.register(tracked_task("t1"), CreateTaskOptions::default());
    let config = receiver.generate_config("t1");
    let mut deliveries = receiver.subscribe();

    reqwest::Client::new()
        .post(&config.url)
        .bearer_auth(&config.token)
        .json(&status_event(TaskState::Working))
        .send()
        .await
        .unwrap();

    let delivery = deliveries.recv().await.unwrap();
    assert_eq!(delivery.task_id, "t1");
    assert!(delivery.headers.contains_key("authorization"));
}

#[tokio::test]
async fn stop_releases_the_port() {
    let tasks = Arc::new(TaskManager::new());
    let mut receiver = WebhookReceiver::new(tasks);
    let port = receiver.start().await.unwrap();
    assert!(receiver.is_running());
    assert!(receiver.start().await.is_err());
    assert!(receiver.set_port(0).is_err());

    receiver.stop().await;
    assert!(!receiver.is_running());

    receiver.set_port(port).unwrap();
    let reused = receiver.start().await.unwrap();
    assert_eq!(reused, port);
    receiver.stop().await;
}
