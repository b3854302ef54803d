//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use super::SseEvent;
use crate::motion::MotionSample;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

/// Capacity of the sample channel handed out by `register`
pub const SAMPLE_BUFFER: usize = 64;

/// Source of device motion samples
#[async_trait]
pub trait MotionSensor: Send + Sync {
    /// Resolve to true if a live sample proves the device delivers motion
    /// events: one seen within the last `window`, or one arriving within the
    /// next. False otherwise.
    async fn probe(&self, window: Duration) -> bool;

    /// Start listening. Replaces any previous registration.
    fn register(&self) -> mpsc::Receiver<MotionSample>;

    /// Stop listening. No samples are delivered afterwards.
    fn deregister(&self);
}

/// User answer to a motion permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionResponse {
    Granted,
    Denied,
}

/// Platform permission API; absent on platforms that grant implicitly
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn request_motion_permission(&self) -> Result<PermissionResponse, String>;
}

/// Best-effort haptic feedback
#[async_trait]
pub trait Haptics: Send + Sync {
    async fn vibrate(&self, duration: Duration) -> Result<(), String>;
}

/// User-visible notices
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: MotionSensor + ?Sized> MotionSensor for Arc<T> {
    async fn probe(&self, window: Duration) -> bool {
        (**self).probe(window).await
    }

    fn register(&self) -> mpsc::Receiver<MotionSample> {
        (**self).register()
    }

    fn deregister(&self) {
        (**self).deregister();
    }
}

#[async_trait]
impl<T: PermissionProvider + ?Sized> PermissionProvider for Arc<T> {
    async fn request_motion_permission(&self) -> Result<PermissionResponse, String> {
        (**self).request_motion_permission().await
    }
}

#[async_trait]
impl<T: Haptics + ?Sized> Haptics for Arc<T> {
    async fn vibrate(&self, duration: Duration) -> Result<(), String> {
        (**self).vibrate(duration).await
    }
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, message: &str) {
        (**self).notify(message);
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Motion sensor fed by samples the browser posts over HTTP. Clients
/// stream samples for as long as the page is open, registered or not.
pub struct ChannelMotionSensor {
    listener: Mutex<Option<mpsc::Sender<MotionSample>>>,
    /// When the last sample arrived
    seen: watch::Sender<Option<Instant>>,
}

impl Default for ChannelMotionSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMotionSensor {
    pub fn new() -> Self {
        Self {
            listener: Mutex::new(None),
            seen: watch::Sender::new(None),
        }
    }

    /// Deliver a sample to the registered listener. Returns false if nobody
    /// is listening or the listener is backed up.
    pub fn push(&self, sample: MotionSample) -> bool {
        self.seen.send_replace(Some(Instant::now()));
        let listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        match listener.as_ref() {
            Some(tx) => tx.try_send(sample).is_ok(),
            None => false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait]
impl MotionSensor for ChannelMotionSensor {
    async fn probe(&self, window: Duration) -> bool {
        let mut seen = self.seen.subscribe();
        let last = *seen.borrow_and_update();
        if last.is_some_and(|at| at.elapsed() <= window) {
            return true;
        }
        let fresh = tokio::time::timeout(window, seen.changed()).await;
        fresh.is_ok_and(|changed| changed.is_ok())
    }

    fn register(&self) -> mpsc::Receiver<MotionSample> {
        let (tx, rx) = mpsc::channel(SAMPLE_BUFFER);
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    fn deregister(&self) {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Permission asked of the browser over SSE and answered over HTTP
pub struct ClientPermission {
    broadcast_tx: broadcast::Sender<SseEvent>,
    pending: Mutex<Option<oneshot::Sender<bool>>>,
    timeout: Duration,
}

impl ClientPermission {
    pub fn new(broadcast_tx: broadcast::Sender<SseEvent>, timeout: Duration) -> Self {
        Self {
            broadcast_tx,
            pending: Mutex::new(None),
            timeout,
        }
    }

    /// Deliver the user's answer. Returns false if no request was waiting.
    pub fn answer(&self, granted: bool) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        pending.is_some_and(|tx| tx.send(granted).is_ok())
    }
}

#[async_trait]
impl PermissionProvider for ClientPermission {
    async fn request_motion_permission(&self) -> Result<PermissionResponse, String> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        if self.broadcast_tx.send(SseEvent::PermissionRequested).is_err() {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            return Err("no client connected to ask for motion permission".to_string());
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(true)) => Ok(PermissionResponse::Granted),
            Ok(Ok(false)) => Ok(PermissionResponse::Denied),
            Ok(Err(_)) => Err("permission request was superseded".to_string()),
            Err(_) => {
                self.pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                Err(format!(
                    "no permission answer within {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }
}

/// Haptics forwarded to connected clients
pub struct BroadcastHaptics {
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl BroadcastHaptics {
    pub fn new(broadcast_tx: broadcast::Sender<SseEvent>) -> Self {
        Self { broadcast_tx }
    }
}

#[async_trait]
impl Haptics for BroadcastHaptics {
    async fn vibrate(&self, duration: Duration) -> Result<(), String> {
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.broadcast_tx
            .send(SseEvent::Vibrate { duration_ms })
            .map(|_| ())
            .map_err(|_| "no client connected".to_string())
    }
}

/// Notices forwarded to connected clients
pub struct BroadcastNotifier {
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl BroadcastNotifier {
    pub fn new(broadcast_tx: broadcast::Sender<SseEvent>) -> Self {
        Self { broadcast_tx }
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(message, "Notice");
        let _ = self.broadcast_tx.send(SseEvent::Notice {
            message: message.to_string(),
        });
    }
}
