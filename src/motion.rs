//! Motion samples and the clock they are stamped with

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Acceleration (including gravity) along the three device axes, in m/s²
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One reading from the device motion sensor
///
/// Transient: samples are evaluated and dropped, never stored beyond the
/// last-known acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Milliseconds on the [`MotionClock`] that stamped the sample
    pub t: u64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, t: u64) -> Self {
        Self { x, y, z, t }
    }

    pub fn acceleration(&self) -> Acceleration {
        Acceleration {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }

    /// True if any single axis exceeds `threshold` in magnitude
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.x.abs() > threshold || self.y.abs() > threshold || self.z.abs() > threshold
    }
}

/// Monotonic millisecond clock shared by the sensor and the runtime
///
/// Built on `tokio::time::Instant` so tests running with a paused clock see
/// consistent timestamps for samples and liveness ticks.
#[derive(Debug, Clone, Copy)]
pub struct MotionClock {
    origin: Instant,
}

impl MotionClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Stamp raw axis readings with the current time
    pub fn sample(&self, x: f64, y: f64, z: f64) -> MotionSample {
        MotionSample::new(x, y, z, self.now_ms())
    }
}

impl Default for MotionClock {
    fn default() -> Self {
        Self::new()
    }
}
