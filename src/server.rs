use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::llm::{ChatTransport, LlmSettings, Orchestrator};
use crate::prompts::{self, CLEARED_NOTICE};
use crate::session::{
    ChatController, ChatEvent, DurationMap, ExchangeUpdates, SnapshotStore, TransportStatus,
    UiMessage, open_store,
};
use crate::ui::{DurationTracker, MAX_MESSAGE_CHARS, render_page};

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, settings: LlmSettings) -> anyhow::Result<()> {
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        provider = ?settings.provider,
        "LLM configuration loaded"
    );

    let store = open_store(&config.storage);
    let system_prompt = prompts::system_prompt(&config.assistant, Utc::now());
    let transport: Arc<dyn ChatTransport> = Arc::new(Orchestrator::new(settings, system_prompt));

    let state = build_state(Arc::clone(&config), store, transport);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Hydrate the conversation and start its background tasks.
///
/// Must be called inside a tokio runtime.
pub fn build_state(
    config: Arc<AppConfig>,
    store: Arc<dyn SnapshotStore>,
    transport: Arc<dyn ChatTransport>,
) -> AppState {
    let (mut controller, updates) = ChatController::new(store, transport);
    controller.initialize();

    // Subscribe before the controller is shared so no reply start is missed.
    let events = controller.subscribe();
    let tracker = DurationTracker::from(controller.status());

    let chat = Arc::new(Mutex::new(controller));
    tokio::spawn(pump_updates(Arc::clone(&chat), updates));
    tokio::spawn(observe_durations(Arc::clone(&chat), events, tracker));

    AppState { chat, config }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/api/chat", get(api_get_chat).post(api_send))
        .route("/api/chat/stop", post(api_stop))
        .route("/api/chat/clear", post(api_clear))
        .route("/api/chat/events", get(api_events))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Background tasks
// ─────────────────────────────────────────────────────────────────────────────

/// Feed exchange progress into the controller, one update at a time.
async fn pump_updates(chat: Arc<Mutex<ChatController>>, mut updates: ExchangeUpdates) {
    while let Some(update) = updates.recv().await {
        chat.lock().await.apply(update);
    }
    tracing::debug!("Exchange update channel closed");
}

/// Time assistant replies off the event feed and record the results.
async fn observe_durations(
    chat: Arc<Mutex<ChatController>>,
    mut events: broadcast::Receiver<ChatEvent>,
    mut tracker: DurationTracker,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some((id, elapsed_ms)) = tracker.observe(&event, Instant::now()) {
                    tracing::debug!(message_id = %id, elapsed_ms, "Reply finished streaming");
                    chat.lock().await.record_duration(&id, elapsed_ms);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Duration observer lagged behind the event feed");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Page
// ─────────────────────────────────────────────────────────────────────────────

/// GET / - The chat page.
async fn chat_page(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state.config.assistant))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Current conversation as seen by the page.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatStateResponse {
    pub messages: Vec<UiMessage>,
    pub durations: DurationMap,
    pub status: TransportStatus,
    pub hydrated: bool,
}

/// GET /api/chat - Conversation state. Doubles as the page mount, so the
/// welcome check runs here too.
async fn api_get_chat(State(state): State<AppState>) -> Json<ChatStateResponse> {
    let mut chat = state.chat.lock().await;
    chat.maybe_inject_welcome();

    Json(ChatStateResponse {
        messages: chat.messages().to_vec(),
        durations: chat.durations().clone(),
        status: chat.status(),
        hydrated: chat.is_hydrated(),
    })
}

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct SendRequest {
    /// Composer text.
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendResponse {
    pub status: TransportStatus,
}

/// POST /api/chat - Submit a user message.
async fn api_send(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<(StatusCode, Json<SendResponse>), (StatusCode, String)> {
    let text = req.message.trim();
    if text.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Message cannot be empty".to_string(),
        ));
    }
    let chars = text.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Message is too long ({chars} of {MAX_MESSAGE_CHARS} characters)"),
        ));
    }

    let mut chat = state.chat.lock().await;
    if !chat.send_user_message(text) {
        return Err((
            StatusCode::CONFLICT,
            "A reply is still in progress".to_string(),
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SendResponse {
            status: chat.status(),
        }),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub stopped: bool,
}

/// POST /api/chat/stop - Stop the reply in flight.
async fn api_stop(State(state): State<AppState>) -> Json<StopResponse> {
    let stopped = state.chat.lock().await.stop();
    Json(StopResponse { stopped })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: bool,
    pub notice: String,
}

/// POST /api/chat/clear - Reset the conversation.
async fn api_clear(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.chat.lock().await.clear();
    Json(ClearResponse {
        cleared,
        notice: CLEARED_NOTICE.to_string(),
    })
}

/// GET /api/chat/events - SSE feed of controller events.
async fn api_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send> {
    let rx = state.chat.lock().await.subscribe();

    let stream = BroadcastStream::new(rx).map(|item| {
        let event = match item {
            Ok(event) => sse_event(&event),
            // The page reloads state after missing events.
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "SSE subscriber lagged; asking page to resync");
                Event::default().event("message").data(r#"{"type":"resync"}"#)
            }
        };
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Frame a controller event for SSE.
fn sse_event(event: &ChatEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event("message").data(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_event_carries_tagged_json() {
        let event = ChatEvent::MessageDelta {
            id: "a1".to_string(),
            text: "Hi".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"message.delta","data":{"id":"a1","text":"Hi"}}"#);
        // Framing must not panic on any variant.
        let _ = sse_event(&ChatEvent::Cleared);
    }
}
