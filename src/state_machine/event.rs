//! Events that can occur in a session

use crate::divination::Line;
use crate::motion::MotionSample;
use serde::{Deserialize, Serialize};

/// What asked for a toss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TossSource {
    Manual,
    Shake,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    Start,
    RequestToss {
        /// Sample that triggered the toss; `None` for manual tosses
        sample: Option<MotionSample>,
        source: TossSource,
    },
    Reset,

    // Timer events
    TossLanded {
        /// Epoch the settle was scheduled in
        epoch: u64,
        line: Line,
    },
}
