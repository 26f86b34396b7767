//! Shared application state for the API adapter.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::GuardConfig;
use crate::dispatcher::Dispatcher;
use crate::domain::{BroadcastSink, TelemetryEvent};

/// State handed to every API handler: the core dispatcher plus the
/// broadcast channel the WebSocket layer drains.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    events: Arc<BroadcastSink>,
}

impl AppState {
    /// Build the state: wires a broadcast sink into a fresh dispatcher.
    pub fn new(config: GuardConfig) -> Self {
        let events = Arc::new(BroadcastSink::new(config.broadcast_capacity));
        let dispatcher = Arc::new(Dispatcher::new(config, events.clone()));
        Self { dispatcher, events }
    }

    /// The core dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.events.subscribe()
    }

    /// Number of live stream subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }
}
