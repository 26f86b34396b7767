//! Per-packet orchestration: ingest → fuse → position → scan → emit.
//!
//! The dispatcher owns every core component and is the only writer of
//! the device store on the ingest path, which gives each device the
//! serial update ordering the contract requires. Every time-dependent
//! entry point has an `*_at(now_ms)` form so tests drive a synthetic
//! clock; the plain forms use the wall clock.

use std::sync::Arc;

use chrono::Utc;

use crate::alerting::{AlertBuilder, ProximityEvent, ProximityScanner};
use crate::config::GuardConfig;
use crate::domain::{
    DeviceId, DevicePatch, DeviceState, EventSink, GeoPoint, SensorPacket, StoreSummary,
    TelemetryEvent,
};
use crate::fusion::FusionEngine;
use crate::localization::PositionEstimator;
use crate::store::{snapshot, DeviceStore};
use crate::GuardError;

/// Current wall-clock time in milliseconds.
pub fn wall_clock_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// The core dispatcher.
pub struct Dispatcher {
    config: GuardConfig,
    store: Arc<DeviceStore>,
    fusion: FusionEngine,
    estimator: PositionEstimator,
    scanner: ProximityScanner,
    alerts: AlertBuilder,
    sink: Arc<dyn EventSink>,
    /// Serializes the dispatch path: one packet is fused, positioned,
    /// scanned, and emitted before the next begins, regardless of how
    /// many transport threads call in.
    dispatch_lock: parking_lot::Mutex<()>,
}

impl Dispatcher {
    /// Create a dispatcher with an empty store.
    pub fn new(config: GuardConfig, sink: Arc<dyn EventSink>) -> Self {
        let fusion = FusionEngine::new(&config.fusion, &config.safety);
        let estimator = PositionEstimator::new(config.indoor.clone());
        let scanner = ProximityScanner::new(config.safety.clone());
        let alerts = AlertBuilder::new(config.dedup_window_ms);
        Self {
            config,
            store: Arc::new(DeviceStore::new()),
            fusion,
            estimator,
            scanner,
            alerts,
            sink,
            dispatch_lock: parking_lot::Mutex::new(()),
        }
    }

    /// The shared device store.
    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Ingest a sensor packet at the current wall-clock time.
    pub fn ingest(&self, packet: SensorPacket) {
        self.ingest_at(packet, wall_clock_ms());
    }

    /// Ingest a sensor packet at an explicit time.
    ///
    /// Malformed packets (empty ID, non-finite sensor values) are
    /// dropped silently per the failure contract.
    pub fn ingest_at(&self, packet: SensorPacket, now_ms: i64) {
        if !packet.is_valid() {
            tracing::debug!("dropping malformed sensor packet");
            return;
        }

        let _serial = self.dispatch_lock.lock();
        let device_id = packet.device_id.clone();
        let frame = packet.sensor_frame();

        let fused = self.fusion.fuse(&device_id, &frame);
        let prev = self.store.get(&device_id);
        let resolved = self.estimator.resolve(prev.as_ref(), &packet, &fused, now_ms);

        let state = self.store.update(
            &device_id,
            DevicePatch {
                is_base_station: packet.is_base_station,
                position: Some(resolved.position),
                indoor_position: Some(resolved.indoor_position),
                heading: fused.heading,
                speed_mps: Some(fused.speed_mps),
                confidence: Some(fused.confidence),
                rssi: resolved.rssi,
                last_raw_sensor: Some(frame),
            },
            now_ms,
        );

        self.sink.emit(TelemetryEvent::PositionUpdate {
            device_id: state.device_id.clone(),
            lat: state.position.map(|p| p.lat).unwrap_or(0.0),
            lng: state.position.map(|p| p.lng).unwrap_or(0.0),
            heading: state.heading,
            speed_mps: state.speed_mps,
            confidence: state.confidence,
            indoor_pos: state.indoor_position,
            is_base_station: state.is_base_station,
            timestamp: now_ms,
        });

        let devices = self.store.get_all();
        let events = self.scanner.scan(&devices);
        for alert in self.alerts.build_proximity(&events, now_ms) {
            tracing::info!(kind = %alert.kind, message = %alert.message, "alert emitted");
            for participant in &alert.devices {
                self.store.add_alert(participant, alert.clone());
            }
            self.sink.emit(TelemetryEvent::Alert { alert });
        }

        if let Some(alert) =
            self.alerts.build_speed(&state, self.config.safety.max_speed_mps, now_ms)
        {
            tracing::info!(kind = %alert.kind, message = %alert.message, "alert emitted");
            self.store.add_alert(&device_id, alert.clone());
            self.sink.emit(TelemetryEvent::Alert { alert });
        }
    }

    /// Register a skeleton record at the current wall-clock time.
    pub fn register(
        &self,
        device_id: &DeviceId,
        is_base_station: bool,
        known_position: Option<GeoPoint>,
    ) -> DeviceState {
        self.register_at(device_id, is_base_station, known_position, wall_clock_ms())
    }

    /// Register a skeleton record at an explicit time.
    pub fn register_at(
        &self,
        device_id: &DeviceId,
        is_base_station: bool,
        known_position: Option<GeoPoint>,
        now_ms: i64,
    ) -> DeviceState {
        let _serial = self.dispatch_lock.lock();
        let state = self.store.update(
            device_id,
            DevicePatch {
                is_base_station: Some(is_base_station),
                position: known_position,
                ..Default::default()
            },
            now_ms,
        );

        let message = if is_base_station {
            format!("Device {device_id} registered as base station")
        } else {
            format!("Device {device_id} registered")
        };
        tracing::debug!(device_id = %device_id, is_base_station, "device registered");
        self.sink.emit(TelemetryEvent::Registered {
            device_id: device_id.clone(),
            message,
        });

        state
    }

    /// Remove a device and tear down its smoothing buffers. Returns true
    /// when the device existed.
    pub fn disconnect(&self, device_id: &DeviceId) -> bool {
        let _serial = self.dispatch_lock.lock();
        let removed = self.store.remove(device_id).is_some();
        if removed {
            self.fusion.remove(device_id);
            tracing::debug!(device_id = %device_id, "device disconnected");
            self.sink.emit(TelemetryEvent::DeviceLeft {
                device_id: device_id.clone(),
            });
        }
        removed
    }

    /// Current snapshot of every tracked device.
    pub fn list_devices(&self) -> Vec<DeviceState> {
        self.store.get_all()
    }

    /// Raw proximity events for the current world, without dedup.
    pub fn scan_alerts(&self) -> Vec<ProximityEvent> {
        self.scanner.scan(&self.store.get_all())
    }

    /// Raw proximity events restricted to one device.
    pub fn scan_alerts_for(&self, device_id: &DeviceId) -> Vec<ProximityEvent> {
        self.scanner.scan_for_device(&self.store.get_all(), device_id)
    }

    /// Store summary projection.
    pub fn summary(&self) -> StoreSummary {
        self.store.summary()
    }

    /// Prune stale devices at the current wall-clock time.
    pub fn prune(&self) -> Vec<DeviceId> {
        self.prune_at(wall_clock_ms())
    }

    /// Prune stale devices at an explicit time, tearing down their
    /// smoothing buffers in lockstep.
    pub fn prune_at(&self, now_ms: i64) -> Vec<DeviceId> {
        let _serial = self.dispatch_lock.lock();
        let pruned = self.store.prune(now_ms, self.config.device_ttl_ms);
        for device_id in &pruned {
            self.fusion.remove(device_id);
        }
        pruned
    }

    /// Sweep aged entries out of the alert dedup table.
    pub fn sweep_dedup(&self) -> usize {
        self.sweep_dedup_at(wall_clock_ms())
    }

    /// Sweep the dedup table at an explicit time.
    pub fn sweep_dedup_at(&self, now_ms: i64) -> usize {
        let evicted = self.alerts.sweep(now_ms);
        if evicted > 0 {
            tracing::debug!(evicted, "dedup table swept");
        }
        evicted
    }

    /// Persist the store to the configured snapshot path.
    pub fn save_snapshot(&self) -> Result<(), GuardError> {
        self.save_snapshot_at(wall_clock_ms())
    }

    /// Persist the store at an explicit time.
    pub fn save_snapshot_at(&self, now_ms: i64) -> Result<(), GuardError> {
        snapshot::save(&self.config.snapshot_path, &self.store, now_ms)
    }

    /// Restore the store from the configured snapshot path, refreshing
    /// every `last_update` to now.
    pub fn load_snapshot(&self) -> Result<usize, GuardError> {
        self.load_snapshot_at(wall_clock_ms())
    }

    /// Restore the store at an explicit time.
    pub fn load_snapshot_at(&self, now_ms: i64) -> Result<usize, GuardError> {
        snapshot::load(&self.config.snapshot_path, &self.store, now_ms)
    }
}
