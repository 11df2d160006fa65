//! Chat session state.
//!
//! One [`ChatController`] owns one conversation: the ordered message list,
//! per-message reply durations and the transport status. It hydrates from a
//! [`SnapshotStore`], hands user turns to a [`crate::llm::ChatTransport`] and
//! materializes the streamed reply from the [`ExchangeUpdate`]s the in-flight
//! exchange reports back.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use skinai_chat::session::{ChatController, MemoryStore, TransportStatus};
//! # use skinai_chat::llm::{ChatTransport, EventStream};
//! # use skinai_chat::session::UiMessage;
//! # struct Offline;
//! # #[async_trait::async_trait]
//! # impl ChatTransport for Offline {
//! #     async fn send(&self, _h: Vec<UiMessage>) -> anyhow::Result<EventStream> {
//! #         anyhow::bail!("offline")
//! #     }
//! # }
//!
//! let (mut chat, _updates) = ChatController::new(Arc::new(MemoryStore::new()), Arc::new(Offline));
//! chat.initialize();
//!
//! // First visit: a single welcome message from the assistant.
//! assert_eq!(chat.messages().len(), 1);
//! assert_eq!(chat.status(), TransportStatus::Ready);
//! ```

mod controller;
mod exchange;
mod message;
mod store;

pub use controller::{ChatController, ChatEvent, ExchangeUpdates, TransportStatus};
pub use exchange::ExchangeUpdate;
pub use message::{DurationMap, MessagePart, Role, SessionSnapshot, UiMessage};
pub use store::{
    FileStore, MemoryStore, SnapshotStore, StoreError, UnavailableStore, decode_snapshot,
    encode_snapshot, open_store,
};
