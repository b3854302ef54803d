//! Effects produced by state transitions

use crate::motion::MotionSample;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Sleep, toss the coins, then feed back `TossLanded`
    ScheduleSettle {
        delay: Duration,
        epoch: u64,
        sample: Option<MotionSample>,
    },

    /// Abort the pending settle timer, if any
    CancelSettle,

    /// Make sure the motion listener is live (asks for permission first if
    /// it was never asked)
    EngageSensor,

    /// Deregister the motion listener
    ReleaseSensor,

    /// A toss landed; shake detection may fire again
    RearmShake,

    /// Tell the user something
    Notify { message: String },

    /// Publish the new session snapshot to readers
    PublishSnapshot,
}

impl Effect {
    pub fn notify(message: impl Into<String>) -> Self {
        Effect::Notify {
            message: message.into(),
        }
    }

    pub fn schedule_settle(delay: Duration, epoch: u64, sample: Option<MotionSample>) -> Self {
        Effect::ScheduleSettle {
            delay,
            epoch,
            sample,
        }
    }
}
