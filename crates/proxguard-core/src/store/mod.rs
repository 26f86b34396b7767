//! The authoritative in-memory map of device state.
//!
//! All mutation goes through an exclusive write lock; readers get
//! consistent copies of the active list and scans run on those copies.

pub mod snapshot;

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::{Alert, DeviceId, DevicePatch, DeviceState, StoreSummary};

/// In-memory device store with TTL pruning.
pub struct DeviceStore {
    devices: RwLock<HashMap<DeviceId, DeviceState>>,
}

impl DeviceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Shallow-merge `patch` over the existing entry, creating a fresh
    /// record when the device is new. Always forces `last_update` to
    /// `now_ms`. Returns the merged value.
    pub fn update(&self, device_id: &DeviceId, patch: DevicePatch, now_ms: i64) -> DeviceState {
        let mut devices = self.devices.write();
        let state = devices
            .entry(device_id.clone())
            .or_insert_with(|| DeviceState::new(device_id.clone(), now_ms));
        state.apply(patch);
        state.last_update = now_ms;
        state.clone()
    }

    /// Look up one device.
    pub fn get(&self, device_id: &DeviceId) -> Option<DeviceState> {
        self.devices.read().get(device_id).cloned()
    }

    /// Consistent copy of every tracked device.
    pub fn get_all(&self) -> Vec<DeviceState> {
        self.devices.read().values().cloned().collect()
    }

    /// Every device flagged as a base station.
    pub fn base_stations(&self) -> Vec<DeviceState> {
        self.devices
            .read()
            .values()
            .filter(|d| d.is_base_station)
            .cloned()
            .collect()
    }

    /// Prepend an alert to a device's bounded ring. No-op for unknown
    /// devices.
    pub fn add_alert(&self, device_id: &DeviceId, alert: Alert) {
        if let Some(state) = self.devices.write().get_mut(device_id) {
            state.push_alert(alert);
        }
    }

    /// Unconditionally delete a device. Returns the removed state.
    pub fn remove(&self, device_id: &DeviceId) -> Option<DeviceState> {
        self.devices.write().remove(device_id)
    }

    /// Drop devices whose `last_update` is older than `ttl_ms`.
    ///
    /// Base stations registered with a known position are exempt: they
    /// hold fixed positions and legitimately never send mobile-sensor
    /// updates. Returns the IDs that were pruned.
    pub fn prune(&self, now_ms: i64, ttl_ms: i64) -> Vec<DeviceId> {
        let cutoff = now_ms - ttl_ms;
        let mut devices = self.devices.write();
        let stale: Vec<DeviceId> = devices
            .values()
            .filter(|d| d.last_update < cutoff && !(d.is_base_station && d.has_known_position()))
            .map(|d| d.device_id.clone())
            .collect();
        for id in &stale {
            devices.remove(id);
            tracing::debug!(device_id = %id, "pruned stale device");
        }
        stale
    }

    /// Counts plus a per-device projection.
    pub fn summary(&self) -> StoreSummary {
        let devices = self.devices.read();
        let base_stations = devices.values().filter(|d| d.is_base_station).count();
        StoreSummary {
            total_devices: devices.len(),
            base_stations,
            devices: devices.values().map(|d| d.summary()).collect(),
        }
    }

    /// Number of tracked devices.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Replace the store contents wholesale (snapshot restore).
    pub fn replace_all(&self, entries: Vec<DeviceState>) {
        let mut devices = self.devices.write();
        devices.clear();
        for entry in entries {
            devices.insert(entry.device_id.clone(), entry);
        }
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
