//! # ProxGuard Core
//!
//! Real-time telemetry core for an autonomous-navigation safety service.
//!
//! Mobile devices (vehicles, pedestrians, robots) stream raw
//! inertial-sensor and radio packets; this crate fuses them into a
//! continuously-updated world map of device positions and velocities and
//! emits proximity and speed alerts whenever devices approach collision
//! risk.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      proxguard-core                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌────────┐   ┌──────────────┐   ┌───────────────────┐   │
//! │  │ Fusion │   │ Localization │   │     Alerting      │   │
//! │  │(smooth,│──▶│ (GPS / dead  │──▶│ (pairwise scan,   │   │
//! │  │heading)│   │  reckoning,  │   │  dedup, builders) │   │
//! │  └────────┘   │trilateration)│   └───────────────────┘   │
//! │       ▲       └──────┬───────┘             │             │
//! │       │              ▼                     ▼             │
//! │  ┌────┴─────────────────────────────────────────────┐    │
//! │  │           Dispatcher  +  Device store            │    │
//! │  └──────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Per inbound packet the [`Dispatcher`] fuses the sensor triple,
//! resolves a position, upserts the [`store::DeviceStore`], scans for
//! proximity events, and emits deduplicated alerts through the
//! [`domain::EventSink`]. Transport (REST, WebSocket) is a thin adapter
//! in [`api`]; periodic maintenance (prune, snapshot, dedup sweep) is
//! driven by the server binary.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use proxguard_core::{Dispatcher, GuardConfig};
//! use proxguard_core::domain::{CapturingSink, DeviceId, SensorPacket, Vector3};
//!
//! let sink = Arc::new(CapturingSink::new());
//! let dispatcher = Dispatcher::new(GuardConfig::default(), sink.clone());
//!
//! dispatcher.ingest_at(
//!     SensorPacket {
//!         device_id: DeviceId::from("dev-a"),
//!         accelerometer: Vector3::new(0.0, 0.0, 9.81),
//!         gyroscope: Vector3::default(),
//!         magnetometer: Vector3::new(20.0, 0.0, 40.0),
//!         gps: None,
//!         is_base_station: None,
//!         rssi_beacons: Vec::new(),
//!         timestamp: None,
//!     },
//!     1_000,
//! );
//!
//! assert_eq!(dispatcher.list_devices().len(), 1);
//! assert_eq!(sink.count_topic("position:update"), 1);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod fusion;
pub mod localization;
pub mod store;

pub use alerting::{AlertBuilder, ProximityEvent, ProximityScanner};
pub use api::{create_router, AppState};
pub use config::{FusionConfig, GuardConfig, GuardConfigBuilder, IndoorConfig, SafetyConfig};
pub use dispatcher::{wall_clock_ms, Dispatcher};
pub use domain::{
    Alert, AlertId, AlertKind, BroadcastSink, CapturingSink, DeviceId, DevicePatch, DeviceState,
    DeviceSummary, EventSink, GeoPoint, GpsFix, PlanarPoint, RawSensorFrame, RssiBeacon,
    SensorPacket, Severity, StoreSummary, TelemetryEvent, Vector3,
};
pub use fusion::{FusedSample, FusionEngine, SmoothingBuffer};
pub use localization::{PositionEstimator, Trilaterator};
pub use store::DeviceStore;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Unified error type for core operations.
///
/// The hot path never produces these: malformed input is dropped and
/// degenerate geometry yields absent fields. Errors surface only from
/// snapshot persistence, and callers treat them as non-fatal.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Snapshot I/O error
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization error
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Alert, AlertBuilder, AlertKind, BroadcastSink, CapturingSink, Dispatcher, DeviceId,
        DeviceState, EventSink, FusionEngine, GeoPoint, GuardConfig, GuardError, PlanarPoint,
        PositionEstimator, ProximityEvent, ProximityScanner, Result, SensorPacket, Severity,
        StoreSummary, TelemetryEvent, Trilaterator, Vector3,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
