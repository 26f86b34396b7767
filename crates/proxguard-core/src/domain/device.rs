//! Device state: the central entity tracked by the world model.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::alert::Alert;

/// Maximum number of recent alerts retained per device.
pub const DEVICE_ALERT_RING: usize = 50;

/// Opaque stable identifier for a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier is empty (such packets are dropped).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A raw 3-axis sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Vector3 {
    /// Create a new 3-vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean magnitude.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// True when all components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// An outdoor WGS-84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
}

impl GeoPoint {
    /// Create a new geographic point.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// An indoor position in a local metric frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarPoint {
    /// East offset in meters
    pub x: f64,
    /// North offset in meters
    pub y: f64,
}

impl PlanarPoint {
    /// Create a new planar point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another planar point.
    pub fn distance_to(&self, other: &PlanarPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// The last accepted accelerometer/gyroscope/magnetometer triple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSensorFrame {
    /// Accelerometer sample (m/s²)
    pub accel: Vector3,
    /// Gyroscope sample (rad/s)
    pub gyro: Vector3,
    /// Magnetometer sample (μT)
    pub mag: Vector3,
}

impl RawSensorFrame {
    /// True when every axis of every sensor is finite.
    pub fn is_finite(&self) -> bool {
        self.accel.is_finite() && self.gyro.is_finite() && self.mag.is_finite()
    }
}

/// A GPS fix carried in a sensor packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsFix {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
    /// Reported horizontal accuracy in meters, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl GpsFix {
    /// The fix as a geographic point.
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// An RSSI observation of a neighboring beacon, with the beacon's
/// known planar position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RssiBeacon {
    /// Identifier of the observed beacon
    pub device_id: DeviceId,
    /// Observed signal strength in dBm
    pub rssi: f64,
    /// Known position of the beacon in the local metric frame
    pub position: PlanarPoint,
}

/// An inbound sensor packet from a device.
///
/// This is the payload of the `ingest` command. Field names follow the
/// mobile clients' JSON wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPacket {
    /// Originating device
    pub device_id: DeviceId,
    /// Accelerometer sample
    pub accelerometer: Vector3,
    /// Gyroscope sample
    pub gyroscope: Vector3,
    /// Magnetometer sample
    pub magnetometer: Vector3,
    /// Optional GPS fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsFix>,
    /// Whether the sender is a fixed base station
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_base_station: Option<bool>,
    /// RSSI observations of visible beacons
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rssi_beacons: Vec<RssiBeacon>,
    /// Client-side capture timestamp (milliseconds), informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl SensorPacket {
    /// The raw sensor triple carried by this packet.
    pub fn sensor_frame(&self) -> RawSensorFrame {
        RawSensorFrame {
            accel: self.accelerometer,
            gyro: self.gyroscope,
            mag: self.magnetometer,
        }
    }

    /// Validate the packet. Invalid packets are dropped silently by the
    /// dispatcher, never surfaced as errors.
    pub fn is_valid(&self) -> bool {
        if self.device_id.is_empty() {
            return false;
        }
        if !self.sensor_frame().is_finite() {
            return false;
        }
        if let Some(gps) = &self.gps {
            if !gps.lat.is_finite() || !gps.lng.is_finite() {
                return false;
            }
        }
        self.rssi_beacons.iter().all(|b| {
            b.rssi.is_finite() && b.position.x.is_finite() && b.position.y.is_finite()
        })
    }
}

/// Authoritative state of one tracked device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    /// Stable identifier, unique in the store
    pub device_id: DeviceId,
    /// Fixed infrastructure flag; base stations serve as trilateration
    /// anchors and are never scored as mobile proximity targets
    #[serde(default)]
    pub is_base_station: bool,
    /// Outdoor position; absent until the first fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoPoint>,
    /// Indoor position; present only while ≥3 anchors are visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indoor_position: Option<PlanarPoint>,
    /// Heading in degrees, `[0, 360)`, North = 0, clockwise
    #[serde(default)]
    pub heading: f64,
    /// Non-negative speed proxy in m/s
    #[serde(default)]
    pub speed_mps: f64,
    /// Sensor-stability confidence in `[0, 1]`
    #[serde(default)]
    pub confidence: f64,
    /// Wall-clock milliseconds of the last accepted update
    pub last_update: i64,
    /// Last observed RSSI per neighbor, dBm
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub rssi: HashMap<DeviceId, i32>,
    /// Last accepted raw sensor triple, for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_raw_sensor: Option<RawSensorFrame>,
    /// Ring of recent alerts attributable to this device, newest first
    #[serde(default, skip_serializing_if = "VecDeque::is_empty")]
    pub alerts: VecDeque<Alert>,
}

impl DeviceState {
    /// Create a fresh skeleton record for a device entering the store.
    pub fn new(device_id: DeviceId, now_ms: i64) -> Self {
        Self {
            device_id,
            is_base_station: false,
            position: None,
            indoor_position: None,
            heading: 0.0,
            speed_mps: 0.0,
            confidence: 0.0,
            last_update: now_ms,
            rssi: HashMap::new(),
            last_raw_sensor: None,
            alerts: VecDeque::new(),
        }
    }

    /// Shallow-merge a patch over this record. Fields absent from the
    /// patch are preserved unchanged.
    pub fn apply(&mut self, patch: DevicePatch) {
        if let Some(flag) = patch.is_base_station {
            self.is_base_station = flag;
        }
        if let Some(pos) = patch.position {
            self.position = Some(pos);
        }
        if let Some(indoor) = patch.indoor_position {
            self.indoor_position = indoor;
        }
        if let Some(heading) = patch.heading {
            self.heading = heading;
        }
        if let Some(speed) = patch.speed_mps {
            self.speed_mps = speed;
        }
        if let Some(confidence) = patch.confidence {
            self.confidence = confidence;
        }
        if let Some(rssi) = patch.rssi {
            self.rssi = rssi;
        }
        if let Some(frame) = patch.last_raw_sensor {
            self.last_raw_sensor = Some(frame);
        }
    }

    /// Prepend an alert to the device's ring, truncating to the cap.
    pub fn push_alert(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
        self.alerts.truncate(DEVICE_ALERT_RING);
    }

    /// True when the device carries any known position, outdoor or indoor.
    pub fn has_known_position(&self) -> bool {
        self.position.is_some() || self.indoor_position.is_some()
    }

    /// Project this record to its summary form.
    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            device_id: self.device_id.clone(),
            position: self.position,
            indoor_position: self.indoor_position,
            heading: self.heading,
            speed_mps: self.speed_mps,
            is_base_station: self.is_base_station,
            last_updated: self.last_update,
        }
    }
}

/// A shallow-merge patch against a [`DeviceState`].
///
/// `None` leaves the field untouched. `indoor_position` uses a nested
/// option so a patch can explicitly clear a stale indoor fix.
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    /// Set the base-station flag
    pub is_base_station: Option<bool>,
    /// Set the outdoor position
    pub position: Option<GeoPoint>,
    /// Set or clear the indoor position
    pub indoor_position: Option<Option<PlanarPoint>>,
    /// Set the heading (already normalized to `[0, 360)`)
    pub heading: Option<f64>,
    /// Set the speed proxy
    pub speed_mps: Option<f64>,
    /// Set the confidence score
    pub confidence: Option<f64>,
    /// Replace the neighbor RSSI map
    pub rssi: Option<HashMap<DeviceId, i32>>,
    /// Set the diagnostic raw sensor frame
    pub last_raw_sensor: Option<RawSensorFrame>,
}

/// Projection of a device used by summary queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    /// Stable identifier
    pub device_id: DeviceId,
    /// Outdoor position, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoPoint>,
    /// Indoor position, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indoor_position: Option<PlanarPoint>,
    /// Heading in degrees
    pub heading: f64,
    /// Speed proxy in m/s
    pub speed_mps: f64,
    /// Fixed infrastructure flag
    pub is_base_station: bool,
    /// Wall-clock milliseconds of the last update
    pub last_updated: i64,
}

/// Store-wide summary: counts plus one projection per device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    /// Number of devices currently tracked
    pub total_devices: usize,
    /// How many of those are base stations
    pub base_stations: usize,
    /// Per-device projections
    pub devices: Vec<DeviceSummary>,
}
