//! Runtime configuration: thresholds, window sizes, TTLs, and the RSSI
//! propagation model.
//!
//! All values default to the production constants and can be overridden
//! either through [`GuardConfig::builder`] or through `PROXGUARD_*`
//! environment variables via [`GuardConfig::from_env`].

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Distance and speed thresholds for safety classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Pair distance below which a collision is flagged (meters)
    pub collision_distance_m: f64,
    /// Pair distance below which a warning is flagged (meters)
    pub warning_distance_m: f64,
    /// Speed above which a speed alert is emitted (m/s)
    pub max_speed_mps: f64,
    /// Confidence below which the positioning engine prefers GPS
    pub sensor_confidence_threshold: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            collision_distance_m: 2.0,
            warning_distance_m: 5.0,
            max_speed_mps: 15.0,
            sensor_confidence_threshold: 0.6,
        }
    }
}

/// Sensor-fusion tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Moving-average window length per axis buffer
    pub smoothing_window: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { smoothing_window: 5 }
    }
}

/// Indoor positioning model constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndoorConfig {
    /// Path-loss exponent `n` of the log-distance model
    pub path_loss_exponent: f64,
    /// Reference RSSI measured at one meter (dBm)
    pub rssi_at_one_meter: f64,
    /// Minimum visible anchors required for trilateration
    pub min_base_stations: usize,
}

impl Default for IndoorConfig {
    fn default() -> Self {
        Self {
            path_loss_exponent: 2.0,
            rssi_at_one_meter: -40.0,
            min_base_stations: 3,
        }
    }
}

/// Complete core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Safety thresholds
    pub safety: SafetyConfig,
    /// Fusion tuning
    pub fusion: FusionConfig,
    /// Indoor positioning constants
    pub indoor: IndoorConfig,
    /// Staleness cutoff for device pruning (milliseconds)
    pub device_ttl_ms: i64,
    /// Minimum interval between emissions of the same alert key (ms)
    pub dedup_window_ms: i64,
    /// Snapshot file location
    pub snapshot_path: PathBuf,
    /// Capacity of the event broadcast channel
    pub broadcast_capacity: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            safety: SafetyConfig::default(),
            fusion: FusionConfig::default(),
            indoor: IndoorConfig::default(),
            device_ttl_ms: 30_000,
            dedup_window_ms: 3_000,
            snapshot_path: PathBuf::from("data/info.json"),
            broadcast_capacity: 1024,
        }
    }
}

impl GuardConfig {
    /// Create a configuration builder.
    pub fn builder() -> GuardConfigBuilder {
        GuardConfigBuilder::default()
    }

    /// Build a configuration from defaults overridden by `PROXGUARD_*`
    /// environment variables. Absent or unparsable values fall back to
    /// the default silently.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        override_from_env("PROXGUARD_COLLISION_DISTANCE_M", &mut config.safety.collision_distance_m);
        override_from_env("PROXGUARD_WARNING_DISTANCE_M", &mut config.safety.warning_distance_m);
        override_from_env("PROXGUARD_MAX_SPEED_MPS", &mut config.safety.max_speed_mps);
        override_from_env(
            "PROXGUARD_SENSOR_CONFIDENCE_THRESHOLD",
            &mut config.safety.sensor_confidence_threshold,
        );
        override_from_env("PROXGUARD_SMOOTHING_WINDOW", &mut config.fusion.smoothing_window);
        override_from_env("PROXGUARD_RSSI_PATH_LOSS_EXPONENT", &mut config.indoor.path_loss_exponent);
        override_from_env("PROXGUARD_RSSI_MEASURED_AT_1M", &mut config.indoor.rssi_at_one_meter);
        override_from_env("PROXGUARD_MIN_BASE_STATIONS", &mut config.indoor.min_base_stations);
        override_from_env("PROXGUARD_DEVICE_TTL_MS", &mut config.device_ttl_ms);
        override_from_env("PROXGUARD_DEDUP_WINDOW_MS", &mut config.dedup_window_ms);

        if let Ok(path) = std::env::var("PROXGUARD_SNAPSHOT_PATH") {
            if !path.is_empty() {
                config.snapshot_path = PathBuf::from(path);
            }
        }

        config
    }
}

fn override_from_env<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => {
                tracing::warn!(key, %raw, "ignoring unparsable environment override");
            }
        }
    }
}

/// Builder for [`GuardConfig`].
#[derive(Debug, Default)]
pub struct GuardConfigBuilder {
    config: GuardConfig,
}

impl GuardConfigBuilder {
    /// Set the collision distance in meters.
    pub fn collision_distance_m(mut self, meters: f64) -> Self {
        self.config.safety.collision_distance_m = meters.max(0.0);
        self
    }

    /// Set the warning distance in meters.
    pub fn warning_distance_m(mut self, meters: f64) -> Self {
        self.config.safety.warning_distance_m = meters.max(0.0);
        self
    }

    /// Set the speed-alert threshold in m/s.
    pub fn max_speed_mps(mut self, speed: f64) -> Self {
        self.config.safety.max_speed_mps = speed.max(0.0);
        self
    }

    /// Set the GPS-fallback confidence threshold.
    pub fn sensor_confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.safety.sensor_confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the smoothing window length. Clamped to at least one sample.
    pub fn smoothing_window(mut self, window: usize) -> Self {
        self.config.fusion.smoothing_window = window.max(1);
        self
    }

    /// Set the RSSI path-loss exponent.
    pub fn path_loss_exponent(mut self, n: f64) -> Self {
        self.config.indoor.path_loss_exponent = n;
        self
    }

    /// Set the reference RSSI at one meter.
    pub fn rssi_at_one_meter(mut self, dbm: f64) -> Self {
        self.config.indoor.rssi_at_one_meter = dbm;
        self
    }

    /// Set the trilateration anchor minimum.
    pub fn min_base_stations(mut self, count: usize) -> Self {
        self.config.indoor.min_base_stations = count.max(3);
        self
    }

    /// Set the device staleness cutoff in milliseconds.
    pub fn device_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.config.device_ttl_ms = ttl_ms;
        self
    }

    /// Set the alert dedup window in milliseconds.
    pub fn dedup_window_ms(mut self, window_ms: i64) -> Self {
        self.config.dedup_window_ms = window_ms;
        self
    }

    /// Set the snapshot file path.
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = path.into();
        self
    }

    /// Set the broadcast channel capacity.
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.config.broadcast_capacity = capacity.max(1);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GuardConfig {
        self.config
    }
}
