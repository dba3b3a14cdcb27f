//! Connection events for the host
//!
//! Exactly one subscriber at a time. Subscribing again replaces the previous
//! receiver; a receiver that was dropped is detached on the next emit.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Connected,
    Disconnected,
}

/// Serialized as `{"type": "...", "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrinterEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Option<Value>,
}

impl PrinterEvent {
    pub fn connected(data: Option<Value>) -> Self {
        Self {
            kind: EventKind::Connected,
            data,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            kind: EventKind::Disconnected,
            data: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct EventNotifier {
    sink: Mutex<Option<mpsc::UnboundedSender<PrinterEvent>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single subscriber, replacing any previous one
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PrinterEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.sink.lock().replace(tx).is_some() {
            debug!("Replaced previous event subscriber");
        }
        rx
    }

    pub fn unsubscribe(&self) {
        self.sink.lock().take();
    }

    pub fn has_subscriber(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Deliver to the current subscriber; `false` when nobody listens
    pub fn emit(&self, event: PrinterEvent) -> bool {
        let mut sink = self.sink.lock();
        let Some(tx) = sink.as_ref() else {
            return false;
        };
        if tx.send(event).is_err() {
            debug!("Event subscriber dropped, detaching");
            *sink = None;
            return false;
        }
        true
    }
}
