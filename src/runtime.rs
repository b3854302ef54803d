//! Runtime for executing a divination session
//!
//! One task owns the session, the shake detector and the coin engine. Callers
//! talk to it through a [`DivinationHandle`]: commands go in over a mailbox,
//! snapshots come out over a `watch` cell and SSE events over a broadcast.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{Collaborators, DivinationRuntime, RuntimeSettings};
pub use traits::*;

use crate::divination::{Line, LineKind, Reading, LINE_POSITIONS};
use crate::motion::{Acceleration, MotionSample};
use crate::shake::{PermissionOutcome, ShakeDetector, ShakePhase};
use crate::state_machine::Session;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Operations the rendering layer may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Toss,
    Reset,
    RevokePermission,
}

/// Everything the runtime task receives through its mailbox
#[derive(Debug)]
pub(crate) enum Message {
    Command(Command),
    /// The settle delay for a toss scheduled in `epoch` has elapsed
    SettleElapsed {
        epoch: u64,
        sample: Option<MotionSample>,
    },
    ProbeFinished {
        supported: bool,
    },
    PermissionResolved(PermissionOutcome),
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { snapshot: SessionSnapshot },
    Snapshot { snapshot: SessionSnapshot },
    Notice { message: String },
    Vibrate { duration_ms: u64 },
    PermissionRequested,
}

/// A thrown line as shown to readers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineView {
    pub position: &'static str,
    pub kind: LineKind,
    pub kind_name: &'static str,
    #[serde(flatten)]
    pub line: Line,
}

impl LineView {
    fn new(index: usize, line: Line) -> Self {
        let kind = line.kind();
        Self {
            position: LINE_POSITIONS.get(index).copied().unwrap_or(""),
            kind,
            kind_name: kind.name(),
            line,
        }
    }
}

/// Shake flags as shown to readers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShakeView {
    pub phase: ShakePhase,
    pub armed: bool,
    pub manual: bool,
    pub shake_detected: bool,
    pub last_trigger_time: Option<u64>,
    pub cooldown_ms: u64,
    pub threshold_per_axis: f64,
    pub acceleration: Acceleration,
}

impl ShakeView {
    fn new(detector: &ShakeDetector) -> Self {
        let state = detector.state();
        Self {
            phase: detector.phase(),
            armed: state.armed,
            manual: detector.phase().is_manual(),
            shake_detected: detector.shake_detected(),
            last_trigger_time: state.last_trigger_time,
            cooldown_ms: state.cooldown_ms,
            threshold_per_axis: state.threshold_per_axis,
            acceleration: detector.acceleration(),
        }
    }
}

/// Read-only view of the session and the shake detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub epoch: u64,
    pub step: u8,
    pub flipping: bool,
    pub lines: Vec<LineView>,
    pub reading: Option<Reading>,
    pub shake: ShakeView,
}

impl SessionSnapshot {
    pub fn capture(session: &Session, detector: &ShakeDetector) -> Self {
        Self {
            epoch: session.epoch(),
            step: session.step(),
            flipping: session.flipping(),
            lines: session
                .lines()
                .iter()
                .enumerate()
                .map(|(i, line)| LineView::new(i, *line))
                .collect(),
            reading: session.reading().cloned(),
            shake: ShakeView::new(detector),
        }
    }
}

/// Handle to interact with a running divination session
#[derive(Clone)]
pub struct DivinationHandle {
    mailbox: mpsc::Sender<Message>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    shutdown: CancellationToken,
}

impl DivinationHandle {
    pub async fn start(&self) {
        self.send(Command::Start).await;
    }

    /// Manual toss; ignored while a toss is in flight or outside steps 1-6
    pub async fn request_toss(&self) {
        self.send(Command::Toss).await;
    }

    pub async fn reset(&self) {
        self.send(Command::Reset).await;
    }

    pub async fn revoke_permission(&self) {
        self.send(Command::RevokePermission).await;
    }

    pub async fn send(&self, command: Command) {
        if self.mailbox.send(Message::Command(command)).await.is_err() {
            tracing::debug!(?command, "Runtime stopped, dropping command");
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch cell updated on every state change
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Stop the runtime task; the motion listener is released on the way out
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
