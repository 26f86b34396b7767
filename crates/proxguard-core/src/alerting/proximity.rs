//! Pairwise proximity scanning and severity classification.

use crate::config::SafetyConfig;
use crate::domain::{DeviceId, DeviceState, Severity};
use crate::localization::PositionEstimator;

/// A device pair inside the warning distance. Safe pairs are never
/// materialized.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityEvent {
    /// First device of the unordered pair
    pub device_a: DeviceId,
    /// Second device of the unordered pair
    pub device_b: DeviceId,
    /// Separation in meters, rounded to two decimals
    pub distance_m: f64,
    /// Classification against the configured thresholds
    pub severity: Severity,
}

impl ProximityEvent {
    /// True when the given device is part of the pair.
    pub fn involves(&self, device_id: &DeviceId) -> bool {
        &self.device_a == device_id || &self.device_b == device_id
    }
}

/// Scans the active device snapshot for pairs at collision risk.
///
/// The scan is `O(n²)` in active devices, which is intentional at the
/// fleet sizes in scope; a spatial index can replace the inner loop
/// without changing this interface.
pub struct ProximityScanner {
    safety: SafetyConfig,
}

impl ProximityScanner {
    /// Create a scanner with the given thresholds.
    pub fn new(safety: SafetyConfig) -> Self {
        Self { safety }
    }

    /// Scan every unordered pair of mobile devices.
    ///
    /// Base stations are fixed infrastructure and are not scored as
    /// proximity targets; devices without an outdoor fix are skipped.
    /// Each qualifying pair appears exactly once.
    pub fn scan(&self, devices: &[DeviceState]) -> Vec<ProximityEvent> {
        let mobiles: Vec<&DeviceState> = devices
            .iter()
            .filter(|d| !d.is_base_station && d.position.is_some())
            .collect();

        let mut events = Vec::new();
        for i in 0..mobiles.len() {
            for j in (i + 1)..mobiles.len() {
                if let Some(event) = self.classify_pair(mobiles[i], mobiles[j]) {
                    events.push(event);
                }
            }
        }
        events
    }

    /// Scan restricted to pairs containing `device_id`.
    pub fn scan_for_device(
        &self,
        devices: &[DeviceState],
        device_id: &DeviceId,
    ) -> Vec<ProximityEvent> {
        self.scan(devices)
            .into_iter()
            .filter(|event| event.involves(device_id))
            .collect()
    }

    fn classify_pair(&self, a: &DeviceState, b: &DeviceState) -> Option<ProximityEvent> {
        let distance = PositionEstimator::distance_between(a, b)?;
        let severity = if distance < self.safety.collision_distance_m {
            Severity::Collision
        } else if distance < self.safety.warning_distance_m {
            Severity::Warning
        } else {
            return None;
        };

        Some(ProximityEvent {
            device_a: a.device_id.clone(),
            device_b: b.device_id.clone(),
            distance_m: round2(distance),
            severity,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
