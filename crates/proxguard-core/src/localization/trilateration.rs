//! RSSI ranging and 2-D trilateration against fixed anchors.

use crate::config::IndoorConfig;
use crate::domain::PlanarPoint;

/// An anchor with an estimated range to the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangedAnchor {
    /// Known anchor position in the local metric frame
    pub position: PlanarPoint,
    /// Estimated range to the target, meters
    pub range_m: f64,
}

/// Trilaterator: converts RSSI observations to ranges and solves for a
/// planar position from three anchors.
pub struct Trilaterator {
    config: IndoorConfig,
}

impl Trilaterator {
    /// Create a trilaterator with the given propagation model.
    pub fn new(config: IndoorConfig) -> Self {
        Self { config }
    }

    /// Create with default model constants.
    pub fn with_defaults() -> Self {
        Self::new(IndoorConfig::default())
    }

    /// Convert an RSSI observation to a distance estimate via the
    /// log-distance path-loss model:
    /// `d = 10^((rssi_ref − rssi) / (10 · n))`, in meters.
    pub fn rssi_to_distance(&self, rssi_dbm: f64) -> f64 {
        let exponent =
            (self.config.rssi_at_one_meter - rssi_dbm) / (10.0 * self.config.path_loss_exponent);
        10.0_f64.powf(exponent)
    }

    /// Minimum number of anchors required for a fix.
    pub fn min_anchors(&self) -> usize {
        self.config.min_base_stations
    }

    /// Solve for a 2-D position from the first three anchors.
    ///
    /// Translates so anchor A is the origin, builds the orthonormal basis
    /// `ex = (B−A)/‖B−A‖`, `ey ⟂ ex`, and solves
    ///
    /// ```text
    /// x = (rA² − rB² + d²) / (2d)
    /// y = (rA² − rC² + i² + j² − 2ix) / (2j)
    /// ```
    ///
    /// with scalar `i = (C−A)·ex` and `j` the ey-component of `C−A`.
    ///
    /// Returns `None` for degenerate geometry: fewer than three anchors,
    /// coincident A/B (`d = 0`), collinear anchors (`j = 0`), or a
    /// non-finite solution.
    pub fn locate(&self, anchors: &[RangedAnchor]) -> Option<PlanarPoint> {
        if anchors.len() < 3 {
            return None;
        }

        let a = anchors[0];
        let b = anchors[1];
        let c = anchors[2];

        let ab_x = b.position.x - a.position.x;
        let ab_y = b.position.y - a.position.y;
        let d = (ab_x * ab_x + ab_y * ab_y).sqrt();
        if d == 0.0 {
            return None;
        }

        let ex_x = ab_x / d;
        let ex_y = ab_y / d;

        let ac_x = c.position.x - a.position.x;
        let ac_y = c.position.y - a.position.y;
        let i = ac_x * ex_x + ac_y * ex_y;

        let ey_raw_x = ac_x - i * ex_x;
        let ey_raw_y = ac_y - i * ex_y;
        let j = (ey_raw_x * ey_raw_x + ey_raw_y * ey_raw_y).sqrt();
        if j == 0.0 {
            return None;
        }

        let ey_x = ey_raw_x / j;
        let ey_y = ey_raw_y / j;

        let ra2 = a.range_m * a.range_m;
        let rb2 = b.range_m * b.range_m;
        let rc2 = c.range_m * c.range_m;

        let x = (ra2 - rb2 + d * d) / (2.0 * d);
        let y = (ra2 - rc2 + i * i + j * j - 2.0 * i * x) / (2.0 * j);

        let px = a.position.x + x * ex_x + y * ey_x;
        let py = a.position.y + x * ex_y + y * ey_y;
        if !px.is_finite() || !py.is_finite() {
            return None;
        }

        Some(PlanarPoint::new(px, py))
    }
}
