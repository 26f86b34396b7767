//! Request and response bodies for the REST adapter.
//!
//! The ingest payload deserializes straight into the domain
//! [`SensorPacket`](crate::domain::SensorPacket); the types here cover
//! the remaining endpoints.

use serde::{Deserialize, Serialize};

use crate::alerting::ProximityEvent;
use crate::domain::{DeviceId, DeviceState, GeoPoint};

/// Request body for registering a device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Whether the device is a fixed base station
    #[serde(default)]
    pub is_base_station: bool,
    /// Known position for fixed devices
    #[serde(default)]
    pub known_position: Option<GeoPoint>,
}

/// Response body for a successful registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// Registered device
    pub device_id: DeviceId,
    /// Human-readable confirmation
    pub message: String,
}

/// Acknowledgement for an accepted sensor packet.
///
/// Acceptance only means the packet was handed to the dispatcher;
/// semantically invalid packets are still dropped silently inside the
/// core.
#[derive(Debug, Clone, Serialize)]
pub struct IngestAck {
    /// Always true for a parsed body
    pub accepted: bool,
}

/// Device list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListResponse {
    /// Current device snapshots
    pub devices: Vec<DeviceState>,
    /// Count of devices in the list
    pub total: usize,
}

/// Raw proximity scan response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    /// Current proximity events, no dedup applied
    pub events: Vec<ProximityEvent>,
    /// Count of events in the list
    pub total: usize,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "ok" when the process answers
    pub status: &'static str,
    /// Devices currently tracked
    pub devices: usize,
    /// Live stream subscribers
    pub subscribers: usize,
    /// Crate version
    pub version: &'static str,
}

/// Commands a WebSocket client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WsCommand {
    /// Reply with the current active device list
    ListDevices,
    /// Bind this socket to a device so closing the socket disconnects it
    #[serde(rename_all = "camelCase")]
    Bind {
        /// Device to bind
        device_id: DeviceId,
    },
}
