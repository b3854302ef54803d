//! HTTP API for the divination service
//!
//! The browser is the rendering layer. It reads snapshots, streams events,
//! posts accelerometer samples and answers permission prompts.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::divination::HexagramTable;
use crate::motion::MotionClock;
use crate::runtime::{ChannelMotionSensor, ClientPermission, DivinationHandle};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: DivinationHandle,
    pub sensor: Arc<ChannelMotionSensor>,
    /// `None` when motion access is granted implicitly
    pub permission: Option<Arc<ClientPermission>>,
    pub table: Arc<HexagramTable>,
    pub clock: MotionClock,
}
