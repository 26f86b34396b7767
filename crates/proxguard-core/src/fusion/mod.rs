//! Sensor fusion: smoothing, tilt-compensated heading, speed proxy, and
//! the confidence score that drives GPS fallback.

pub mod smoothing;

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::config::{FusionConfig, SafetyConfig};
use crate::domain::{DeviceId, RawSensorFrame, Vector3};
use crate::localization::geodesy::normalize_heading;

pub use smoothing::{SensorAxis, SmoothingBuffer};

/// Fusion output for one accepted packet.
#[derive(Debug, Clone)]
pub struct FusedSample {
    /// Tilt-compensated heading in degrees `[0, 360)`; `None` when the
    /// smoothed accelerometer has zero norm (gravity unobservable)
    pub heading: Option<f64>,
    /// Speed proxy: Euclidean magnitude of the smoothed accelerometer.
    /// This is not integrated velocity and must not be treated as one.
    pub speed_mps: f64,
    /// Stability confidence in `[0, 1]`, from accelerometer Z variance
    pub confidence: f64,
    /// Denoised accelerometer reading
    pub smoothed_accel: Vector3,
    /// Denoised gyroscope reading
    pub smoothed_gyro: Vector3,
    /// Denoised magnetometer reading
    pub smoothed_mag: Vector3,
    /// True when confidence fell below the GPS-fallback threshold
    pub should_use_gps: bool,
}

/// Per-device fusion engine.
///
/// Owns the smoothing buffers; buffers are created on a device's first
/// sample and removed with [`FusionEngine::remove`] when the device
/// disconnects or is pruned.
pub struct FusionEngine {
    window: usize,
    confidence_threshold: f64,
    buffers: RwLock<HashMap<DeviceId, SmoothingBuffer>>,
}

impl FusionEngine {
    /// Create an engine from fusion and safety settings.
    pub fn new(fusion: &FusionConfig, safety: &SafetyConfig) -> Self {
        Self {
            window: fusion.smoothing_window.max(1),
            confidence_threshold: safety.sensor_confidence_threshold,
            buffers: RwLock::new(HashMap::new()),
        }
    }

    /// Fuse one raw sensor frame for a device.
    pub fn fuse(&self, device_id: &DeviceId, frame: &RawSensorFrame) -> FusedSample {
        let mut buffers = self.buffers.write();
        let buffer = buffers
            .entry(device_id.clone())
            .or_insert_with(|| SmoothingBuffer::new(self.window));

        let smoothed_accel = buffer.smooth(SensorAxis::Accelerometer, frame.accel);
        let smoothed_gyro = buffer.smooth(SensorAxis::Gyroscope, frame.gyro);
        let smoothed_mag = buffer.smooth(SensorAxis::Magnetometer, frame.mag);

        let confidence = match buffer.accel_z_variance() {
            Some(variance) => (1.0 - variance / 10.0).clamp(0.0, 1.0),
            None => 0.5,
        };

        FusedSample {
            heading: tilt_compensated_heading(&smoothed_accel, &smoothed_mag),
            speed_mps: smoothed_accel.magnitude(),
            confidence,
            smoothed_accel,
            smoothed_gyro,
            smoothed_mag,
            should_use_gps: confidence < self.confidence_threshold,
        }
    }

    /// Tear down the smoothing buffers for a device.
    pub fn remove(&self, device_id: &DeviceId) {
        self.buffers.write().remove(device_id);
    }

    /// True when the device currently has buffers.
    pub fn has_buffers(&self, device_id: &DeviceId) -> bool {
        self.buffers.read().contains_key(device_id)
    }

    /// Accelerometer samples currently buffered for a device.
    pub fn buffered_samples(&self, device_id: &DeviceId) -> usize {
        self.buffers
            .read()
            .get(device_id)
            .map(|b| b.len(SensorAxis::Accelerometer))
            .unwrap_or(0)
    }
}

/// Heading from gravity-referenced tilt compensation of the
/// magnetometer.
///
/// The smoothed accelerometer is normalized to unit gravity, pitch and
/// roll are recovered from it, and the magnetometer is rotated into the
/// horizontal plane before taking `atan2(−My, Mx)`. Returns `None` when
/// gravity is unobservable (zero-norm accelerometer) or the result is
/// not finite.
pub fn tilt_compensated_heading(accel: &Vector3, mag: &Vector3) -> Option<f64> {
    let norm = accel.magnitude();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }

    let ax = accel.x / norm;
    let ay = accel.y / norm;

    let pitch = (-ax).clamp(-1.0, 1.0).asin();
    let roll = ay.atan2(pitch.cos());

    let mx = mag.x * pitch.cos() + mag.z * pitch.sin();
    let my = mag.x * roll.sin() * pitch.sin() + mag.y * roll.cos()
        - mag.z * roll.sin() * pitch.cos();

    let heading = (-my).atan2(mx).to_degrees();
    if !heading.is_finite() {
        return None;
    }
    Some(normalize_heading(heading))
}
