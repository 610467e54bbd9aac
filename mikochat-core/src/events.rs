//! Notifications from the chat core to whatever renders it.
//!
//! The core never calls into a UI. It emits [`ChatEvent`]s on every
//! subscriber's channel; a closed receiver is dropped on the next emit.

use crate::entitlement::PlanStatus;
use crate::types::{Message, SessionSummary};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A transient system notice that stays until cleared ("Miko is thinking...")
    NoticeShown(String),
    /// A transient notice that expires on its own
    NotificationShown(String),
    /// All transient notices should be removed
    NoticesCleared,
    TypingIndicator(bool),
    /// Whether the user may submit input
    InputAvailability(bool),
    MessageAppended(Message),
    /// The whole visible history changed (session switch, new chat)
    HistoryReplaced(Vec<Message>),
    /// Display-only reasoning from the first phase of a thinking turn
    ReasoningReady(String),
    /// Session list in display order
    SessionsChanged(Vec<SessionSummary>),
    /// A user-visible warning, e.g. a failed save
    Warning(String),
    PlaybackStarted {
        message_id: String,
        audio: Arc<[u8]>,
    },
    PlaybackStopped {
        message_id: String,
    },
    CaptureStarted,
    CaptureStopped,
    PlanChanged(PlanStatus),
}

/// Fan-out of [`ChatEvent`]s to any number of subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ChatEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: ChatEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<ChatEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
