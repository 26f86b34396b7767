//! Localization context: geodesic math, RSSI trilateration, and the
//! positioning engine.

pub mod engine;
pub mod geodesy;
pub mod trilateration;

pub use engine::{PositionEstimator, ResolvedPosition};
pub use geodesy::{dead_reckon, haversine_m, normalize_heading, EARTH_RADIUS_M};
pub use trilateration::{RangedAnchor, Trilaterator};
