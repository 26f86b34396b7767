//! Alert types for proximity and speed notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::device::DeviceId;

/// Unique identifier for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    /// Create a new random alert ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of alerts the core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// Two devices inside the warning distance
    #[serde(rename = "PROXIMITY_WARNING")]
    ProximityWarning,
    /// Two devices inside the collision distance
    #[serde(rename = "COLLISION_WARNING")]
    CollisionWarning,
    /// A device above the configured speed limit
    #[serde(rename = "SPEED_EXCEEDED")]
    SpeedExceeded,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::ProximityWarning => write!(f, "PROXIMITY_WARNING"),
            AlertKind::CollisionWarning => write!(f, "COLLISION_WARNING"),
            AlertKind::SpeedExceeded => write!(f, "SPEED_EXCEEDED"),
        }
    }
}

/// Severity of a proximity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Inside the warning distance but outside the collision distance
    Warning,
    /// Inside the collision distance
    Collision,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Collision => write!(f, "collision"),
        }
    }
}

/// An alert dispatched to subscribers and retained in device rings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique alert identifier
    pub id: AlertId,
    /// What happened
    pub kind: AlertKind,
    /// Severity of the underlying classification
    pub severity: Severity,
    /// Participating devices (two for proximity, one for speed)
    pub devices: Vec<DeviceId>,
    /// The measured quantity: meters for proximity, m/s for speed,
    /// rounded to two decimals
    pub measurement: f64,
    /// Configured limit the measurement was checked against, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    /// Human-readable description
    pub message: String,
    /// ISO-8601 emission timestamp
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Build a proximity alert for a device pair at `distance_m` meters.
    pub fn proximity(
        a: &DeviceId,
        b: &DeviceId,
        distance_m: f64,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let kind = match severity {
            Severity::Collision => AlertKind::CollisionWarning,
            Severity::Warning => AlertKind::ProximityWarning,
        };
        let message = match severity {
            Severity::Collision => format!(
                "COLLISION RISK: devices {a} and {b} are {distance_m:.2}m apart"
            ),
            Severity::Warning => {
                format!("Devices {a} and {b} are {distance_m:.2}m apart")
            }
        };
        Self {
            id: AlertId::new(),
            kind,
            severity,
            devices: vec![a.clone(), b.clone()],
            measurement: distance_m,
            limit: None,
            message,
            timestamp,
        }
    }

    /// Build a speed alert for a device moving at `speed_mps`.
    pub fn speed(
        device: &DeviceId,
        speed_mps: f64,
        limit_mps: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AlertId::new(),
            kind: AlertKind::SpeedExceeded,
            severity: Severity::Warning,
            devices: vec![device.clone()],
            measurement: speed_mps,
            limit: Some(limit_mps),
            message: format!(
                "Device {device} exceeds the speed limit: {speed_mps:.2} m/s (limit {limit_mps} m/s)"
            ),
            timestamp,
        }
    }

    /// True when the given device participates in this alert.
    pub fn involves(&self, device: &DeviceId) -> bool {
        self.devices.iter().any(|d| d == device)
    }
}
