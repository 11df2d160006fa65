//! The chat session controller.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::exchange::{self, ExchangeUpdate};
use super::message::{DurationMap, Role, SessionSnapshot, UiMessage};
use super::store::SnapshotStore;
use crate::llm::ChatTransport;
use crate::prompts::WELCOME_TEXT;

/// Capacity of the presentation event feed.
const EVENT_CAPACITY: usize = 256;

/// Receiving half for updates from in-flight exchanges.
pub type ExchangeUpdates = mpsc::UnboundedReceiver<ExchangeUpdate>;

/// Phase of the exchange with the remote model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportStatus {
    /// Nothing in flight; the composer may send.
    #[default]
    Ready,
    /// Request handed to the transport, nothing streamed yet.
    Submitted,
    /// Reply is streaming in.
    Streaming,
    /// The last exchange failed; the composer may send again.
    Error,
}

impl TransportStatus {
    /// An exchange is in flight: sending is blocked and stop is available.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Submitted | Self::Streaming)
    }
}

/// Change notification for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// Transport status changed.
    #[serde(rename = "status")]
    Status {
        /// New status.
        status: TransportStatus,
    },
    /// A message joined the conversation.
    #[serde(rename = "message.appended")]
    MessageAppended {
        /// The new message as it stands now.
        message: UiMessage,
    },
    /// Streamed text was appended to an assistant message.
    #[serde(rename = "message.delta")]
    MessageDelta {
        /// Message identifier.
        id: String,
        /// Appended fragment.
        text: String,
    },
    /// An assistant message finished streaming.
    #[serde(rename = "message.finished")]
    MessageFinished {
        /// Message identifier.
        id: String,
    },
    /// A reply duration was stored.
    #[serde(rename = "duration.recorded")]
    DurationRecorded {
        /// Message identifier.
        id: String,
        /// Elapsed streaming time.
        elapsed_ms: u64,
    },
    /// The conversation was reset.
    #[serde(rename = "cleared")]
    Cleared,
}

/// Bookkeeping for the exchange currently in flight.
#[derive(Debug)]
struct InFlight {
    exchange: u64,
    cancel: CancellationToken,
    assistant_ids: Vec<String>,
}

/// Owns one conversation and mediates between storage, transport and UI.
///
/// All mutation happens through `&mut self` on a single timeline. Exchange
/// tasks report back through [`ExchangeUpdates`]; the host feeds those into
/// [`ChatController::apply`].
pub struct ChatController {
    store: Arc<dyn SnapshotStore>,
    transport: Arc<dyn ChatTransport>,
    messages: Vec<UiMessage>,
    durations: DurationMap,
    status: TransportStatus,
    hydrated: bool,
    welcome_injected: bool,
    next_exchange: u64,
    in_flight: Option<InFlight>,
    updates_tx: mpsc::UnboundedSender<ExchangeUpdate>,
    events: broadcast::Sender<ChatEvent>,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for ChatController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController")
            .field("store", &self.store)
            .field("messages", &self.messages.len())
            .field("durations", &self.durations.len())
            .field("status", &self.status)
            .field("hydrated", &self.hydrated)
            .field("in_flight", &self.in_flight.as_ref().map(|f| f.exchange))
            .finish()
    }
}

impl ChatController {
    /// Create an un-hydrated controller. Call [`ChatController::initialize`] next.
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        transport: Arc<dyn ChatTransport>,
    ) -> (Self, ExchangeUpdates) {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let controller = Self {
            store,
            transport,
            messages: Vec::new(),
            durations: DurationMap::new(),
            status: TransportStatus::Ready,
            hydrated: false,
            welcome_injected: false,
            next_exchange: 0,
            in_flight: None,
            updates_tx,
            events,
        };
        (controller, updates_rx)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Conversation in order.
    #[must_use]
    pub fn messages(&self) -> &[UiMessage] {
        &self.messages
    }

    /// Recorded reply durations.
    #[must_use]
    pub fn durations(&self) -> &DurationMap {
        &self.durations
    }

    /// Current transport status.
    #[must_use]
    pub fn status(&self) -> TransportStatus {
        self.status
    }

    /// Whether persisted state has been loaded.
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Current state as a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            durations: self.durations.clone(),
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Load the persisted snapshot into live state, then run the welcome check.
    ///
    /// Runs once; later calls do nothing. Never fails: unreadable storage
    /// hydrates an empty conversation.
    pub fn initialize(&mut self) {
        if self.hydrated {
            return;
        }

        let snapshot = self.store.load();
        tracing::info!(
            name: "session.hydrated",
            messages = snapshot.messages.len(),
            durations = snapshot.durations.len(),
            "Chat session hydrated"
        );
        self.messages = snapshot.messages;
        self.durations = snapshot.durations;
        self.hydrated = true;

        self.maybe_inject_welcome();
    }

    /// Add the welcome message if the conversation is empty.
    ///
    /// Fires at most once per controller and only after hydration. Returns
    /// whether a message was added.
    pub fn maybe_inject_welcome(&mut self) -> bool {
        if !self.hydrated || self.welcome_injected || !self.messages.is_empty() {
            return false;
        }

        let id = format!("welcome-{}", Utc::now().timestamp_millis());
        let welcome = UiMessage::new(id, Role::Assistant, WELCOME_TEXT);
        tracing::debug!(message_id = %welcome.id, "Injecting welcome message");

        self.messages.push(welcome.clone());
        self.welcome_injected = true;
        self.emit(ChatEvent::MessageAppended { message: welcome });
        self.persist();
        true
    }

    /// Append a user turn and start streaming the reply.
    ///
    /// Returns `false` without side effects when the trimmed text is empty or
    /// an exchange is already in flight. Must be called inside a tokio runtime.
    pub fn send_user_message(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring blank message");
            return false;
        }
        if self.status.is_busy() {
            tracing::warn!(status = ?self.status, "Send rejected while an exchange is in flight");
            return false;
        }

        let message = UiMessage::user(text);
        self.messages.push(message.clone());
        self.emit(ChatEvent::MessageAppended { message });
        self.persist();

        self.next_exchange += 1;
        let exchange = self.next_exchange;
        let cancel = CancellationToken::new();
        self.in_flight = Some(InFlight {
            exchange,
            cancel: cancel.clone(),
            assistant_ids: Vec::new(),
        });
        self.set_status(TransportStatus::Submitted);

        tracing::info!(
            name: "exchange.submitted",
            exchange,
            history = self.messages.len(),
            "User message submitted"
        );
        tokio::spawn(exchange::drive(
            Arc::clone(&self.transport),
            self.messages.clone(),
            exchange,
            cancel,
            self.updates_tx.clone(),
        ));
        true
    }

    /// Request cancellation of the in-flight exchange.
    ///
    /// Returns `false` unless the status is `submitted` or `streaming`. The
    /// status returns to `ready` when the exchange acknowledges; partial
    /// content stays in the conversation.
    pub fn stop(&mut self) -> bool {
        if !self.status.is_busy() {
            return false;
        }
        let Some(flight) = &self.in_flight else {
            return false;
        };
        tracing::info!(name: "exchange.stop_requested", exchange = flight.exchange, "Stop requested");
        flight.cancel.cancel();
        true
    }

    /// Store how long an assistant reply took to stream. Last write wins.
    ///
    /// Ignored when the message is no longer part of the conversation, e.g.
    /// a reply that finished just before a clear.
    pub fn record_duration(&mut self, message_id: &str, elapsed_ms: u64) {
        if !self.messages.iter().any(|m| m.id == message_id) {
            tracing::debug!(message_id, elapsed_ms, "Dropping duration for unknown message");
            return;
        }
        self.durations.insert(message_id.to_string(), elapsed_ms);
        self.emit(ChatEvent::DurationRecorded {
            id: message_id.to_string(),
            elapsed_ms,
        });
        self.persist();
    }

    /// Reset the conversation and persist the empty snapshot.
    ///
    /// Any in-flight exchange is cancelled and its later updates ignored.
    /// Returns `true` so callers can confirm to the user.
    pub fn clear(&mut self) -> bool {
        if let Some(flight) = self.in_flight.take() {
            flight.cancel.cancel();
        }
        self.messages.clear();
        self.durations.clear();
        self.set_status(TransportStatus::Ready);
        self.emit(ChatEvent::Cleared);
        self.persist();
        tracing::info!(name: "session.cleared", "Chat cleared");
        true
    }

    /// Fold an update from an exchange task into the live state.
    ///
    /// Updates from exchanges that are no longer current are dropped.
    pub fn apply(&mut self, update: ExchangeUpdate) {
        let current = self.in_flight.as_ref().map(|f| f.exchange);
        if current != Some(update.exchange()) {
            tracing::debug!(exchange = update.exchange(), "Dropping update from stale exchange");
            return;
        }

        match update {
            ExchangeUpdate::Streaming { .. } => self.set_status(TransportStatus::Streaming),
            ExchangeUpdate::Delta {
                message_id, text, ..
            } => self.apply_delta(message_id, text),
            ExchangeUpdate::Finished { cancelled, .. } => {
                let flight = self.in_flight.take();
                for id in flight.map(|f| f.assistant_ids).unwrap_or_default() {
                    self.emit(ChatEvent::MessageFinished { id });
                }
                if cancelled {
                    tracing::debug!("Stop acknowledged");
                }
                self.set_status(TransportStatus::Ready);
                self.persist();
            }
            ExchangeUpdate::Failed { error, .. } => {
                self.in_flight = None;
                tracing::warn!(name: "session.exchange_failed", error = %error, "Exchange failed, partial reply kept");
                self.set_status(TransportStatus::Error);
                self.persist();
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn apply_delta(&mut self, message_id: String, text: String) {
        self.set_status(TransportStatus::Streaming);

        if let Some(existing) = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id == message_id)
        {
            existing.push_text(&text);
            self.emit(ChatEvent::MessageDelta {
                id: message_id,
                text,
            });
            return;
        }

        let message = UiMessage::new(message_id.clone(), Role::Assistant, text);
        if let Some(flight) = self.in_flight.as_mut() {
            flight.assistant_ids.push(message_id);
        }
        self.messages.push(message.clone());
        self.emit(ChatEvent::MessageAppended { message });
        self.persist();
    }

    fn set_status(&mut self, status: TransportStatus) {
        if self.status != status {
            self.status = status;
            self.emit(ChatEvent::Status { status });
        }
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Save the live state, but never before hydration.
    fn persist(&self) {
        if !self.hydrated {
            tracing::debug!("Skipping save before hydration");
            return;
        }
        self.store.save(&self.snapshot());
    }
}
