//! Per-device bounded smoothing windows for the three inertial sensors.

use std::collections::VecDeque;

use crate::domain::Vector3;

/// Which sensor stream a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorAxis {
    /// Accelerometer stream
    Accelerometer,
    /// Gyroscope stream
    Gyroscope,
    /// Magnetometer stream
    Magnetometer,
}

/// Three bounded FIFO windows of 3-vector samples, one per sensor.
///
/// Created on a device's first sample and torn down in lockstep with the
/// device. The window length never exceeds the configured size.
#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    window: usize,
    accel: VecDeque<Vector3>,
    gyro: VecDeque<Vector3>,
    mag: VecDeque<Vector3>,
}

impl SmoothingBuffer {
    /// Create an empty buffer with the given window length.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            accel: VecDeque::with_capacity(window),
            gyro: VecDeque::with_capacity(window),
            mag: VecDeque::with_capacity(window),
        }
    }

    /// Push a sample onto one axis window, trim to the window length, and
    /// return the component-wise mean over the current contents. The mean
    /// is the denoised reading used by all downstream steps.
    pub fn smooth(&mut self, axis: SensorAxis, sample: Vector3) -> Vector3 {
        let window = self.window;
        let buffer = self.buffer_mut(axis);
        buffer.push_back(sample);
        while buffer.len() > window {
            buffer.pop_front();
        }
        Self::mean(self.buffer(axis))
    }

    /// Number of samples currently held for an axis.
    pub fn len(&self, axis: SensorAxis) -> usize {
        self.buffer(axis).len()
    }

    /// True when no samples have been seen on the given axis.
    pub fn is_empty(&self, axis: SensorAxis) -> bool {
        self.buffer(axis).is_empty()
    }

    /// Population variance of the accelerometer Z components across the
    /// window. `None` with fewer than two samples.
    pub fn accel_z_variance(&self) -> Option<f64> {
        if self.accel.len() < 2 {
            return None;
        }
        let n = self.accel.len() as f64;
        let mean = self.accel.iter().map(|v| v.z).sum::<f64>() / n;
        let variance = self
            .accel
            .iter()
            .map(|v| (v.z - mean) * (v.z - mean))
            .sum::<f64>()
            / n;
        Some(variance)
    }

    fn buffer(&self, axis: SensorAxis) -> &VecDeque<Vector3> {
        match axis {
            SensorAxis::Accelerometer => &self.accel,
            SensorAxis::Gyroscope => &self.gyro,
            SensorAxis::Magnetometer => &self.mag,
        }
    }

    fn buffer_mut(&mut self, axis: SensorAxis) -> &mut VecDeque<Vector3> {
        match axis {
            SensorAxis::Accelerometer => &mut self.accel,
            SensorAxis::Gyroscope => &mut self.gyro,
            SensorAxis::Magnetometer => &mut self.mag,
        }
    }

    fn mean(buffer: &VecDeque<Vector3>) -> Vector3 {
        if buffer.is_empty() {
            return Vector3::default();
        }
        let n = buffer.len() as f64;
        let sum = buffer.iter().fold(Vector3::default(), |acc, v| {
            Vector3::new(acc.x + v.x, acc.y + v.y, acc.z + v.z)
        });
        Vector3::new(sum.x / n, sum.y / n, sum.z / n)
    }
}
