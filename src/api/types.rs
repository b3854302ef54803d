//! API request and response types

use crate::divination::{HexagramCode, HexagramEntry};
use serde::{Deserialize, Serialize};

/// Raw accelerometer reading posted by the browser; missing axes read as 0
#[derive(Debug, Default, Deserialize)]
pub struct MotionRequest {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

impl MotionRequest {
    pub fn axes(&self) -> (f64, f64, f64) {
        (
            self.x.unwrap_or(0.0),
            self.y.unwrap_or(0.0),
            self.z.unwrap_or(0.0),
        )
    }
}

/// Response for a posted motion sample
#[derive(Debug, Serialize)]
pub struct MotionResponse {
    /// Whether a listener took the sample
    pub accepted: bool,
}

/// The browser's answer to a permission prompt
#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub granted: bool,
}

/// Response for a permission answer
#[derive(Debug, Serialize)]
pub struct PermissionAnswerResponse {
    /// False if no prompt was waiting for an answer
    pub delivered: bool,
}

/// A table entry; unknown codes come back as the placeholder with `known: false`
#[derive(Debug, Serialize)]
pub struct HexagramResponse {
    pub code: HexagramCode,
    pub known: bool,
    pub entry: HexagramEntry,
}

/// Generic success response; commands that turn out to be no-ops still succeed
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub ok: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
