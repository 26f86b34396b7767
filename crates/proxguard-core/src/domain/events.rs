//! Events fanned out from the core to subscribers.
//!
//! The core never talks to a transport directly: every fused update and
//! alert goes through an [`EventSink`]. The server wires a
//! [`BroadcastSink`] into the WebSocket layer; tests inject a
//! [`CapturingSink`] and assert on what was emitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::alert::Alert;
use super::device::{DeviceId, PlanarPoint};

/// A message emitted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    /// A device's fused state changed
    #[serde(rename = "position:update", rename_all = "camelCase")]
    PositionUpdate {
        /// Device that moved
        device_id: DeviceId,
        /// Latitude in degrees
        lat: f64,
        /// Longitude in degrees
        lng: f64,
        /// Heading in degrees, `[0, 360)`
        heading: f64,
        /// Speed proxy in m/s
        speed_mps: f64,
        /// Sensor confidence in `[0, 1]`
        confidence: f64,
        /// Indoor position, if trilaterated this packet
        #[serde(skip_serializing_if = "Option::is_none")]
        indoor_pos: Option<PlanarPoint>,
        /// Fixed infrastructure flag
        is_base_station: bool,
        /// Wall-clock milliseconds of the update
        timestamp: i64,
    },
    /// A deduplicated safety alert
    #[serde(rename = "alert")]
    Alert {
        /// The alert record
        alert: Alert,
    },
    /// A device was removed from the store
    #[serde(rename = "device:left", rename_all = "camelCase")]
    DeviceLeft {
        /// Device that left
        device_id: DeviceId,
    },
    /// A skeleton record was registered
    #[serde(rename = "registered", rename_all = "camelCase")]
    Registered {
        /// Registered device
        device_id: DeviceId,
        /// Human-readable confirmation
        message: String,
    },
    /// Keep-alive ping for stream subscribers
    #[serde(rename = "heartbeat")]
    Heartbeat {
        /// Emission time
        timestamp: DateTime<Utc>,
    },
    /// Stream-level error notification
    #[serde(rename = "error")]
    Error {
        /// Machine-readable code
        code: String,
        /// Human-readable message
        message: String,
    },
}

impl TelemetryEvent {
    /// Topic name of this event, as seen on the wire.
    pub fn topic(&self) -> &'static str {
        match self {
            TelemetryEvent::PositionUpdate { .. } => "position:update",
            TelemetryEvent::Alert { .. } => "alert",
            TelemetryEvent::DeviceLeft { .. } => "device:left",
            TelemetryEvent::Registered { .. } => "registered",
            TelemetryEvent::Heartbeat { .. } => "heartbeat",
            TelemetryEvent::Error { .. } => "error",
        }
    }
}

/// Sink for events produced by the core.
pub trait EventSink: Send + Sync {
    /// Emit one event. Implementations must not block the dispatch path.
    fn emit(&self, event: TelemetryEvent);
}

/// Event sink backed by a tokio broadcast channel.
///
/// Send errors are ignored: with no subscribers there is nobody to tell.
pub struct BroadcastSink {
    tx: broadcast::Sender<TelemetryEvent>,
}

impl BroadcastSink {
    /// Create a sink with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Get a receiver for the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: TelemetryEvent) {
        let _ = self.tx.send(event);
    }
}

/// Event sink that records everything, for tests.
#[derive(Debug, Default)]
pub struct CapturingSink {
    events: parking_lot::Mutex<Vec<TelemetryEvent>>,
}

impl CapturingSink {
    /// Create an empty capturing sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Drain and return everything emitted so far.
    pub fn take(&self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut self.events.lock())
    }

    /// Count of events with the given topic.
    pub fn count_topic(&self, topic: &str) -> usize {
        self.events.lock().iter().filter(|e| e.topic() == topic).count()
    }
}

impl EventSink for CapturingSink {
    fn emit(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}
