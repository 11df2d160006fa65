//! Message wall bookkeeping.
//!
//! The controller does not time replies itself. The wall watches the event
//! feed, notes when an assistant reply first appears and reports the elapsed
//! time once that reply finishes streaming.

use std::collections::HashMap;
use std::time::Instant;

use crate::session::{ChatEvent, Role, TransportStatus};

/// Times assistant replies from first appearance to completion.
#[derive(Debug, Default)]
pub struct DurationTracker {
    busy: bool,
    started: HashMap<String, Instant>,
}

impl DurationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of replies currently being timed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.started.len()
    }

    /// Feed one event. Returns `(message_id, elapsed_ms)` when a timed reply
    /// has just finished.
    pub fn observe(&mut self, event: &ChatEvent, now: Instant) -> Option<(String, u64)> {
        match event {
            ChatEvent::Status { status } => {
                self.busy = status.is_busy();
                // A failed reply never finishes; an idle wall times nothing.
                if !self.busy {
                    self.started.clear();
                }
                None
            }
            // Only replies that arrive during an exchange are timed; the
            // welcome message is appended while idle.
            ChatEvent::MessageAppended { message }
                if self.busy && message.role == Role::Assistant =>
            {
                self.started.entry(message.id.clone()).or_insert(now);
                None
            }
            ChatEvent::MessageFinished { id } => {
                let started = self.started.remove(id)?;
                let elapsed = now.saturating_duration_since(started).as_millis();
                Some((id.clone(), u64::try_from(elapsed).unwrap_or(u64::MAX)))
            }
            ChatEvent::Cleared => {
                self.busy = false;
                self.started.clear();
                None
            }
            _ => None,
        }
    }

    /// Whether the tracker currently believes an exchange is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

impl From<TransportStatus> for DurationTracker {
    fn from(status: TransportStatus) -> Self {
        Self {
            busy: status.is_busy(),
            started: HashMap::new(),
        }
    }
}
