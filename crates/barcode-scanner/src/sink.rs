//! Outward event channel

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// Consumer-facing event emitter
pub trait EventSink: Send + Sync {
    fn emit(&self, event_name: &str, payload: Value);
}

/// Event as delivered through a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: Value,
}

/// Sink forwarding events into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<EmittedEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the host reads events from
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EmittedEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event_name: &str, payload: Value) {
        let event = EmittedEvent {
            name: event_name.to_string(),
            payload,
        };
        if self.sender.send(event).is_err() {
            debug!("Event receiver dropped, discarding {}", event_name);
        }
    }
}
