//! Alert construction with a time-windowed deduplication table.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::domain::{Alert, DeviceId, DeviceState};

use super::proximity::ProximityEvent;

/// Builds proximity and speed alerts, suppressing repeats of the same
/// alert key inside the dedup window.
///
/// The table is shared between the dispatch path and the periodic sweep,
/// so it lives behind a mutex.
pub struct AlertBuilder {
    dedup_window_ms: i64,
    last_emitted: Mutex<HashMap<String, i64>>,
}

impl AlertBuilder {
    /// Create a builder with the given dedup window.
    pub fn new(dedup_window_ms: i64) -> Self {
        Self {
            dedup_window_ms,
            last_emitted: Mutex::new(HashMap::new()),
        }
    }

    /// Dedup key for an unordered device pair.
    pub fn proximity_key(a: &DeviceId, b: &DeviceId) -> String {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        format!("proximity:{first}:{second}")
    }

    /// Dedup key for a speed event.
    pub fn speed_key(device_id: &DeviceId) -> String {
        format!("speed:{device_id}")
    }

    /// Emit iff the key has no entry or its last emission is outside the
    /// window; records the emission time on success.
    pub fn should_emit(&self, key: &str, now_ms: i64) -> bool {
        let mut table = self.last_emitted.lock();
        match table.get(key) {
            Some(last) if now_ms - last <= self.dedup_window_ms => false,
            _ => {
                table.insert(key.to_string(), now_ms);
                true
            }
        }
    }

    /// Build alerts for a batch of proximity events, deduplicated per
    /// pair key. The emitted alert carries the event's severity.
    pub fn build_proximity(&self, events: &[ProximityEvent], now_ms: i64) -> Vec<Alert> {
        let timestamp = millis_to_datetime(now_ms);
        events
            .iter()
            .filter(|event| {
                self.should_emit(&Self::proximity_key(&event.device_a, &event.device_b), now_ms)
            })
            .map(|event| {
                Alert::proximity(
                    &event.device_a,
                    &event.device_b,
                    event.distance_m,
                    event.severity,
                    timestamp,
                )
            })
            .collect()
    }

    /// Build a speed alert when the device exceeds `max_speed_mps`, at
    /// most once per dedup window.
    pub fn build_speed(
        &self,
        device: &DeviceState,
        max_speed_mps: f64,
        now_ms: i64,
    ) -> Option<Alert> {
        if device.speed_mps <= max_speed_mps {
            return None;
        }
        if !self.should_emit(&Self::speed_key(&device.device_id), now_ms) {
            return None;
        }
        Some(Alert::speed(
            &device.device_id,
            round2(device.speed_mps),
            max_speed_mps,
            millis_to_datetime(now_ms),
        ))
    }

    /// Evict table entries older than twice the dedup window. Returns the
    /// number of evicted keys.
    pub fn sweep(&self, now_ms: i64) -> usize {
        let cutoff = now_ms - 2 * self.dedup_window_ms;
        let mut table = self.last_emitted.lock();
        let before = table.len();
        table.retain(|_, last| *last >= cutoff);
        before - table.len()
    }

    /// Number of live dedup entries.
    pub fn tracked_keys(&self) -> usize {
        self.last_emitted.lock().len()
    }
}

fn millis_to_datetime(now_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(now_ms)
        .single()
        .unwrap_or_else(Utc::now)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertKind, GeoPoint, Severity};

    const WINDOW: i64 = 3_000;

    fn make_event(severity: Severity) -> ProximityEvent {
        ProximityEvent {
            device_a: DeviceId::from("dev-a"),
            device_b: DeviceId::from("dev-b"),
            distance_m: 3.34,
            severity,
        }
    }

    #[test]
    fn test_key_is_order_insensitive() {
        let a = DeviceId::from("dev-a");
        let b = DeviceId::from("dev-b");
        assert_eq!(
            AlertBuilder::proximity_key(&a, &b),
            AlertBuilder::proximity_key(&b, &a)
        );
        assert_eq!(AlertBuilder::proximity_key(&a, &b), "proximity:dev-a:dev-b");
    }

    #[test]
    fn test_should_emit_once_per_window() {
        let builder = AlertBuilder::new(WINDOW);
        assert!(builder.should_emit("proximity:a:b", 0));
        assert!(!builder.should_emit("proximity:a:b", 1_000));
        assert!(!builder.should_emit("proximity:a:b", 3_000));
        // Outside the window the key emits again.
        assert!(builder.should_emit("proximity:a:b", 3_001));
        assert!(!builder.should_emit("proximity:a:b", 4_000));
    }

    #[test]
    fn test_identical_pair_deduplicates_across_scans() {
        let builder = AlertBuilder::new(WINDOW);
        let events = vec![make_event(Severity::Warning)];

        let first = builder.build_proximity(&events, 0);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, AlertKind::ProximityWarning);

        // Second identical scan within the window: nothing new.
        assert!(builder.build_proximity(&events, 1_500).is_empty());

        // After the window elapses the pair may alert again.
        let third = builder.build_proximity(&events, 3_500);
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn test_severity_escalation_shares_the_pair_key() {
        let builder = AlertBuilder::new(WINDOW);
        let warning = vec![make_event(Severity::Warning)];
        let collision = vec![make_event(Severity::Collision)];

        assert_eq!(builder.build_proximity(&warning, 0).len(), 1);
        // The collision uses the same proximity key, so it is suppressed
        // until the dedup window elapses.
        assert!(builder.build_proximity(&collision, 1_000).is_empty());

        let escalated = builder.build_proximity(&collision, 3_500);
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].kind, AlertKind::CollisionWarning);
    }

    #[test]
    fn test_speed_alert_threshold_and_dedup() {
        let builder = AlertBuilder::new(WINDOW);
        let mut device = DeviceState::new(DeviceId::from("dev-a"), 0);
        device.position = Some(GeoPoint::new(0.0, 0.0));

        device.speed_mps = 14.9;
        assert!(builder.build_speed(&device, 15.0, 0).is_none());

        device.speed_mps = 16.213;
        let alert = builder.build_speed(&device, 15.0, 0).unwrap();
        assert_eq!(alert.kind, AlertKind::SpeedExceeded);
        assert!((alert.measurement - 16.21).abs() < 1e-9);
        assert_eq!(alert.limit, Some(15.0));

        // Still speeding inside the window: suppressed.
        assert!(builder.build_speed(&device, 15.0, 2_000).is_none());
        assert!(builder.build_speed(&device, 15.0, 3_500).is_some());
    }

    #[test]
    fn test_sweep_evicts_aged_keys() {
        let builder = AlertBuilder::new(WINDOW);
        builder.should_emit("proximity:a:b", 0);
        builder.should_emit("speed:dev-a", 5_000);
        assert_eq!(builder.tracked_keys(), 2);

        // At t=6500 only entries older than 2 windows (< 500) go.
        assert_eq!(builder.sweep(6_500), 1);
        assert_eq!(builder.tracked_keys(), 1);

        assert_eq!(builder.sweep(12_000), 1);
        assert_eq!(builder.tracked_keys(), 0);
    }

    #[test]
    fn test_emission_bound_over_duration() {
        // Over T = 10s with a 3s window, the same key emits at most
        // ceil(T / window) = 4 times.
        let builder = AlertBuilder::new(WINDOW);
        let events = vec![make_event(Severity::Warning)];
        let mut emitted = 0;
        for now in (0..10_000).step_by(100) {
            emitted += builder.build_proximity(&events, now).len();
        }
        assert!(emitted <= 4, "emitted {emitted} times");
        assert!(emitted >= 3);
    }
}
