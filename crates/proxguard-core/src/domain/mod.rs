//! Domain model: devices, alerts, and the event contract.

pub mod alert;
pub mod device;
pub mod events;

pub use alert::{Alert, AlertId, AlertKind, Severity};
pub use device::{
    DeviceId, DevicePatch, DeviceState, DeviceSummary, GeoPoint, GpsFix, PlanarPoint,
    RawSensorFrame, RssiBeacon, SensorPacket, StoreSummary, Vector3, DEVICE_ALERT_RING,
};
pub use events::{BroadcastSink, CapturingSink, EventSink, TelemetryEvent};
