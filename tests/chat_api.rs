use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

use skinai_chat::config::{AppConfig, AssistantConfig, ServerConfig, StorageConfig};
use skinai_chat::llm::{ChatTransport, EventStream};
use skinai_chat::normalized::NormalizedEvent;
use skinai_chat::server::{
    ChatStateResponse, ClearResponse, StopResponse, build_router, build_state,
};
use skinai_chat::session::{
    MemoryStore, Role, SessionSnapshot, TransportStatus, UiMessage, decode_snapshot,
};

/// Replies with fixed chunks, optionally never finishing.
struct ScriptedTransport {
    chunks: Vec<&'static str>,
    hang: bool,
}

#[async_trait::async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(&self, _history: Vec<UiMessage>) -> anyhow::Result<EventStream> {
        let mut events = vec![Ok(NormalizedEvent::StreamStart {
            request_id: "req-1".to_string(),
        })];
        events.extend(self.chunks.iter().map(|c| {
            Ok(NormalizedEvent::MessageDelta {
                text: (*c).to_string(),
            })
        }));

        let head = futures::stream::iter(events);
        let stream: EventStream = if self.hang {
            Box::pin(futures::StreamExt::chain(head, futures::stream::pending()))
        } else {
            Box::pin(futures::StreamExt::chain(
                head,
                futures::stream::iter([Ok(NormalizedEvent::Done)]),
            ))
        };
        Ok(stream)
    }
}

fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        storage: StorageConfig {
            enabled: false,
            dir: String::new(),
            key: "chat-messages".to_string(),
        },
        assistant: AssistantConfig {
            name: "Glow".to_string(),
            owner_name: "Owner".to_string(),
            clear_chat_text: "New Chat".to_string(),
        },
    })
}

fn server_with(store: Arc<MemoryStore>, transport: ScriptedTransport) -> TestServer {
    let state = build_state(test_config(), store, Arc::new(transport));
    TestServer::new(build_router(state)).unwrap()
}

fn replying(chunks: Vec<&'static str>) -> ScriptedTransport {
    ScriptedTransport {
        chunks,
        hang: false,
    }
}

/// Poll GET /api/chat until `done` holds.
async fn wait_for(
    server: &TestServer,
    done: impl Fn(&ChatStateResponse) -> bool,
) -> ChatStateResponse {
    for _ in 0..200 {
        let state: ChatStateResponse = server.get("/api/chat").await.json();
        if done(&state) {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("chat never reached the expected state");
}

#[tokio::test]
async fn test_page_is_served() {
    let server = server_with(Arc::new(MemoryStore::new()), replying(vec![]));

    let response = server.get("/").await;
    assert_eq!(response.status_code(), 200);
    let html = response.text();
    assert!(html.contains("<title>Glow</title>"));
    assert!(html.contains("New Chat"));
}

#[tokio::test]
async fn test_first_visit_shows_single_welcome() {
    let store = Arc::new(MemoryStore::new());
    let server = server_with(Arc::clone(&store), replying(vec![]));

    let first: ChatStateResponse = server.get("/api/chat").await.json();
    let second: ChatStateResponse = server.get("/api/chat").await.json();

    assert!(first.hydrated);
    assert_eq!(first.status, TransportStatus::Ready);
    assert_eq!(first.messages.len(), 1);
    assert_eq!(first.messages[0].role, Role::Assistant);
    assert!(first.messages[0].id.starts_with("welcome-"));
    assert_eq!(second.messages, first.messages);

    let saved = decode_snapshot(&store.raw().unwrap()).unwrap();
    assert_eq!(saved.messages, first.messages);
}

#[tokio::test]
async fn test_restored_history_is_not_welcomed() {
    let snapshot = SessionSnapshot {
        messages: vec![UiMessage::new("u1", Role::User, "hello")],
        durations: [("a0".to_string(), 10)].into_iter().collect(),
    };
    let raw = serde_json::to_string(&snapshot).unwrap();
    let server = server_with(Arc::new(MemoryStore::with_raw(raw)), replying(vec![]));

    let state: ChatStateResponse = server.get("/api/chat").await.json();
    assert_eq!(state.messages, snapshot.messages);
    assert_eq!(state.durations, snapshot.durations);
}

#[tokio::test]
async fn test_composer_validation() {
    let server = server_with(Arc::new(MemoryStore::new()), replying(vec![]));

    let blank = server.post("/api/chat").json(&json!({ "message": "   " })).await;
    assert_eq!(blank.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let long = "a".repeat(2001);
    let too_long = server.post("/api/chat").json(&json!({ "message": long })).await;
    assert_eq!(too_long.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    // Nothing was sent
    let state: ChatStateResponse = server.get("/api/chat").await.json();
    assert_eq!(state.messages.len(), 1);
}

#[tokio::test]
async fn test_send_streams_reply_and_records_duration() {
    let store = Arc::new(MemoryStore::new());
    let server = server_with(Arc::clone(&store), replying(vec!["Use ", "sunscreen."]));

    let response = server
        .post("/api/chat")
        .json(&json!({ "message": "  What should I use daily?  " }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);

    let state = wait_for(&server, |s| {
        s.status == TransportStatus::Ready && s.messages.len() == 3 && !s.durations.is_empty()
    })
    .await;

    let user = &state.messages[1];
    let reply = &state.messages[2];
    assert_eq!(user.role, Role::User);
    assert_eq!(user.text(), "What should I use daily?");
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.text(), "Use sunscreen.");
    assert!(state.durations.contains_key(&reply.id));

    let saved = decode_snapshot(&store.raw().unwrap()).unwrap();
    assert_eq!(saved.messages.len(), 3);
    assert_eq!(saved.messages[2].text(), "Use sunscreen.");
}

#[tokio::test]
async fn test_busy_send_conflicts_and_stop_keeps_partial_reply() {
    let server = server_with(
        Arc::new(MemoryStore::new()),
        ScriptedTransport {
            chunks: vec!["Partial"],
            hang: true,
        },
    );

    let first = server.post("/api/chat").json(&json!({ "message": "hi" })).await;
    assert_eq!(first.status_code(), StatusCode::ACCEPTED);

    wait_for(&server, |s| s.status == TransportStatus::Streaming && s.messages.len() == 3).await;

    let second = server.post("/api/chat").json(&json!({ "message": "again" })).await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);

    let stop: StopResponse = server.post("/api/chat/stop").await.json();
    assert!(stop.stopped);

    let state = wait_for(&server, |s| s.status == TransportStatus::Ready).await;
    assert_eq!(state.messages.len(), 3);
    assert_eq!(state.messages[2].text(), "Partial");

    // Nothing left to stop
    let again: StopResponse = server.post("/api/chat/stop").await.json();
    assert!(!again.stopped);
}

#[tokio::test]
async fn test_clear_resets_and_confirms() {
    let store = Arc::new(MemoryStore::new());
    let server = server_with(Arc::clone(&store), replying(vec!["ok"]));

    server.post("/api/chat").json(&json!({ "message": "hi" })).await;
    wait_for(&server, |s| s.status == TransportStatus::Ready && s.messages.len() == 3).await;

    let cleared: ClearResponse = server.post("/api/chat/clear").await.json();
    assert!(cleared.cleared);
    assert_eq!(cleared.notice, "Chat cleared!");

    let saved = decode_snapshot(&store.raw().unwrap()).unwrap();
    assert!(saved.is_empty());

    // The welcome already fired for this controller, so the wall stays empty
    let state: ChatStateResponse = server.get("/api/chat").await.json();
    assert!(state.messages.is_empty());
    assert!(state.durations.is_empty());
    assert_eq!(state.status, TransportStatus::Ready);
}

#[tokio::test]
async fn test_clear_of_restored_history_welcomes_on_next_mount() {
    let snapshot = SessionSnapshot {
        messages: vec![UiMessage::new("u1", Role::User, "hello")],
        ..SessionSnapshot::default()
    };
    let raw = serde_json::to_string(&snapshot).unwrap();
    let server = server_with(Arc::new(MemoryStore::with_raw(raw)), replying(vec![]));

    server.post("/api/chat/clear").await;

    let state: ChatStateResponse = server.get("/api/chat").await.json();
    assert_eq!(state.messages.len(), 1);
    assert!(state.messages[0].id.starts_with("welcome-"));
}
