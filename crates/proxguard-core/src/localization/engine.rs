//! Position estimation: GPS versus dead reckoning, plus indoor
//! trilateration when enough anchors are visible.

use std::collections::HashMap;

use crate::config::IndoorConfig;
use crate::domain::{DeviceId, DeviceState, GeoPoint, PlanarPoint, SensorPacket};
use crate::fusion::FusedSample;

use super::geodesy;
use super::trilateration::{RangedAnchor, Trilaterator};

/// Outcome of resolving one packet against the previous device state.
#[derive(Debug, Clone)]
pub struct ResolvedPosition {
    /// New outdoor position
    pub position: GeoPoint,
    /// Indoor fix, when ≥ the anchor minimum was visible and the
    /// geometry was solvable
    pub indoor_position: Option<PlanarPoint>,
    /// Replacement neighbor RSSI map, when the packet carried beacons
    pub rssi: Option<HashMap<DeviceId, i32>>,
}

/// Chooses between GPS and dead reckoning, and derives indoor fixes.
pub struct PositionEstimator {
    trilaterator: Trilaterator,
}

impl PositionEstimator {
    /// Create an estimator with the given indoor model.
    pub fn new(indoor: IndoorConfig) -> Self {
        Self {
            trilaterator: Trilaterator::new(indoor),
        }
    }

    /// Resolve the next position for a device.
    ///
    /// Precedence:
    /// 1. start from the previous stored position, else the packet's GPS
    ///    fix, else the origin;
    /// 2. take the GPS fix outright when fusion asked for GPS and a fix
    ///    is present;
    /// 3. otherwise advance the previous position by dead reckoning over
    ///    the time since the device's last update.
    pub fn resolve(
        &self,
        prev: Option<&DeviceState>,
        packet: &SensorPacket,
        fused: &FusedSample,
        now_ms: i64,
    ) -> ResolvedPosition {
        let base = prev
            .and_then(|p| p.position)
            .or_else(|| packet.gps.map(|fix| fix.point()))
            .unwrap_or(GeoPoint::new(0.0, 0.0));

        let position = match (fused.should_use_gps, packet.gps) {
            (true, Some(fix)) => fix.point(),
            _ => match prev {
                Some(prev_state) => {
                    let dt_ms = (now_ms - prev_state.last_update).max(0);
                    let heading = fused.heading.unwrap_or(prev_state.heading);
                    geodesy::dead_reckon(&base, heading, fused.speed_mps, dt_ms)
                }
                None => base,
            },
        };

        ResolvedPosition {
            position,
            indoor_position: self.indoor_fix(packet),
            rssi: self.rssi_map(packet),
        }
    }

    /// Great-circle distance between two devices' outdoor positions.
    /// `None` when either device has no fix yet.
    pub fn distance_between(a: &DeviceState, b: &DeviceState) -> Option<f64> {
        match (&a.position, &b.position) {
            (Some(pa), Some(pb)) => Some(geodesy::haversine_m(pa, pb)),
            _ => None,
        }
    }

    fn indoor_fix(&self, packet: &SensorPacket) -> Option<PlanarPoint> {
        if packet.rssi_beacons.len() < self.trilaterator.min_anchors() {
            return None;
        }

        let anchors: Vec<RangedAnchor> = packet
            .rssi_beacons
            .iter()
            .map(|beacon| RangedAnchor {
                position: beacon.position,
                range_m: self.trilaterator.rssi_to_distance(beacon.rssi),
            })
            .collect();

        self.trilaterator.locate(&anchors)
    }

    fn rssi_map(&self, packet: &SensorPacket) -> Option<HashMap<DeviceId, i32>> {
        if packet.rssi_beacons.is_empty() {
            return None;
        }
        Some(
            packet
                .rssi_beacons
                .iter()
                .map(|b| (b.device_id.clone(), b.rssi.round() as i32))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GpsFix, RssiBeacon, Vector3};

    fn make_fused(speed_mps: f64, confidence: f64, should_use_gps: bool) -> FusedSample {
        FusedSample {
            heading: Some(0.0),
            speed_mps,
            confidence,
            smoothed_accel: Vector3::default(),
            smoothed_gyro: Vector3::default(),
            smoothed_mag: Vector3::default(),
            should_use_gps,
        }
    }

    fn make_packet(id: &str, gps: Option<GpsFix>) -> SensorPacket {
        SensorPacket {
            device_id: DeviceId::from(id),
            accelerometer: Vector3::new(0.0, 0.0, 9.81),
            gyroscope: Vector3::default(),
            magnetometer: Vector3::new(20.0, 0.0, 40.0),
            gps,
            is_base_station: None,
            rssi_beacons: Vec::new(),
            timestamp: None,
        }
    }

    #[test]
    fn test_first_packet_uses_gps_as_base() {
        let estimator = PositionEstimator::new(IndoorConfig::default());
        let packet = make_packet(
            "dev-a",
            Some(GpsFix { lat: 12.0, lng: 34.0, accuracy: None }),
        );
        let resolved = estimator.resolve(None, &packet, &make_fused(1.0, 0.9, false), 1_000);
        assert_eq!(resolved.position, GeoPoint::new(12.0, 34.0));
    }

    #[test]
    fn test_first_packet_without_gps_is_origin() {
        let estimator = PositionEstimator::new(IndoorConfig::default());
        let packet = make_packet("dev-a", None);
        let resolved = estimator.resolve(None, &packet, &make_fused(1.0, 0.9, false), 1_000);
        assert_eq!(resolved.position, GeoPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_low_confidence_prefers_gps_over_dead_reckoning() {
        let estimator = PositionEstimator::new(IndoorConfig::default());
        let mut prev = DeviceState::new(DeviceId::from("dev-a"), 0);
        prev.position = Some(GeoPoint::new(10.0, 10.0));
        prev.heading = 90.0;

        let packet = make_packet(
            "dev-a",
            Some(GpsFix { lat: 10.5, lng: 10.5, accuracy: Some(3.0) }),
        );
        let resolved =
            estimator.resolve(Some(&prev), &packet, &make_fused(5.0, 0.2, true), 2_000);
        assert_eq!(resolved.position, GeoPoint::new(10.5, 10.5));
    }

    #[test]
    fn test_confident_motion_dead_reckons_from_previous_fix() {
        let estimator = PositionEstimator::new(IndoorConfig::default());
        let mut prev = DeviceState::new(DeviceId::from("dev-a"), 1_000);
        prev.position = Some(GeoPoint::new(0.0, 0.0));

        // 10 m/s due north for one second, GPS present but not trusted
        // over dead reckoning at high confidence.
        let packet = make_packet(
            "dev-a",
            Some(GpsFix { lat: 50.0, lng: 50.0, accuracy: None }),
        );
        let resolved =
            estimator.resolve(Some(&prev), &packet, &make_fused(10.0, 0.9, false), 2_000);

        let expected_lat = (10.0 / geodesy::EARTH_RADIUS_M).to_degrees();
        assert!((resolved.position.lat - expected_lat).abs() < 1e-12);
        assert!(resolved.position.lng.abs() < 1e-12);
    }

    #[test]
    fn test_indoor_fix_requires_three_beacons() {
        let estimator = PositionEstimator::new(IndoorConfig::default());
        let tri = Trilaterator::with_defaults();
        let target = PlanarPoint::new(3.0, 4.0);

        let beacon = |id: &str, pos: PlanarPoint| {
            // Invert the path-loss model so the estimator recovers the
            // exact range.
            let range = pos.distance_to(&target);
            let rssi = -40.0 - 20.0 * range.log10();
            assert!((tri.rssi_to_distance(rssi) - range).abs() < 1e-9);
            RssiBeacon { device_id: DeviceId::from(id), rssi, position: pos }
        };

        let mut packet = make_packet("dev-a", None);
        packet.rssi_beacons = vec![
            beacon("anchor-1", PlanarPoint::new(0.0, 0.0)),
            beacon("anchor-2", PlanarPoint::new(10.0, 0.0)),
        ];
        let fused = make_fused(0.0, 0.9, false);
        assert!(estimator.resolve(None, &packet, &fused, 0).indoor_position.is_none());

        packet.rssi_beacons.push(beacon("anchor-3", PlanarPoint::new(5.0, 10.0)));
        let fix = estimator
            .resolve(None, &packet, &fused, 0)
            .indoor_position
            .unwrap();
        assert!((fix.x - target.x).abs() < 1e-6);
        assert!((fix.y - target.y).abs() < 1e-6);
    }

    #[test]
    fn test_rssi_map_tracks_beacons() {
        let estimator = PositionEstimator::new(IndoorConfig::default());
        let mut packet = make_packet("dev-a", None);
        packet.rssi_beacons = vec![RssiBeacon {
            device_id: DeviceId::from("anchor-1"),
            rssi: -57.6,
            position: PlanarPoint::new(0.0, 0.0),
        }];

        let resolved = estimator.resolve(None, &packet, &make_fused(0.0, 0.9, false), 0);
        let rssi = resolved.rssi.unwrap();
        assert_eq!(rssi.get(&DeviceId::from("anchor-1")), Some(&-58));
    }
}
