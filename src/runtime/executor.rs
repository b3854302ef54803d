//! Divination runtime executor

use super::traits::{Haptics, MotionSensor, Notifier, PermissionProvider, PermissionResponse};
use super::{Command, DivinationHandle, Message, SessionSnapshot, SseEvent};

use crate::divination::{CoinTossEngine, EntropySource, HexagramTable};
use crate::motion::{MotionClock, MotionSample};
use crate::shake::{
    PermissionOutcome, SampleOutcome, ShakeConfig, ShakeDetector, ShakePhase, MANUAL_PROMPT,
    SHAKE_PROMPT,
};
use crate::state_machine::{transition, Effect, Event, Session, SessionContext, TossSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const MAILBOX_CAPACITY: usize = 64;

/// Timing knobs for the runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeSettings {
    pub shake: ShakeConfig,
    pub settle_delay: Duration,
    pub liveness_interval: Duration,
    /// How long a starting session waits for a live sample. Zero skips the
    /// probe and trusts that the sensor works.
    pub probe_window: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            shake: ShakeConfig::default(),
            settle_delay: Duration::from_millis(800),
            liveness_interval: Duration::from_millis(500),
            probe_window: Duration::from_millis(500),
        }
    }
}

/// The collaborators the runtime talks to
#[derive(Clone)]
pub struct Collaborators {
    pub sensor: Arc<dyn MotionSensor>,
    /// `None` means the platform grants motion access implicitly
    pub permission: Option<Arc<dyn PermissionProvider>>,
    pub haptics: Arc<dyn Haptics>,
    pub notifier: Arc<dyn Notifier>,
}

/// Single owner of the session, the shake detector and the coin engine
pub struct DivinationRuntime<E: EntropySource> {
    context: SessionContext,
    settings: RuntimeSettings,
    session: Session,
    detector: ShakeDetector,
    engine: CoinTossEngine<E>,
    collaborators: Collaborators,
    clock: MotionClock,
    mailbox_rx: mpsc::Receiver<Message>,
    /// Weak so the loop ends once every handle is dropped
    mailbox_tx: mpsc::WeakSender<Message>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    /// Present only while the motion listener is registered
    sample_rx: Option<mpsc::Receiver<MotionSample>>,
    settle_task: Option<JoinHandle<()>>,
    probe_task: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl<E: EntropySource + 'static> DivinationRuntime<E> {
    pub fn new(
        table: Arc<HexagramTable>,
        settings: RuntimeSettings,
        entropy: E,
        collaborators: Collaborators,
        clock: MotionClock,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> (Self, DivinationHandle) {
        let context = SessionContext::new(table, settings.settle_delay);
        let session = Session::new();
        let detector = ShakeDetector::new(settings.shake);
        let (mailbox_tx, mailbox_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(SessionSnapshot::capture(&session, &detector));
        let shutdown = CancellationToken::new();

        let handle = DivinationHandle {
            mailbox: mailbox_tx.clone(),
            snapshot_rx,
            broadcast_tx: broadcast_tx.clone(),
            shutdown: shutdown.clone(),
        };

        let runtime = Self {
            context,
            settings,
            session,
            detector,
            engine: CoinTossEngine::new(entropy),
            collaborators,
            clock,
            mailbox_rx,
            mailbox_tx: mailbox_tx.downgrade(),
            snapshot_tx,
            broadcast_tx,
            sample_rx: None,
            settle_task: None,
            probe_task: None,
            shutdown,
        };
        (runtime, handle)
    }

    /// Run on a fresh task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        tracing::info!(
            threshold = self.settings.shake.threshold_per_axis,
            cooldown_ms = self.settings.shake.cooldown_ms,
            "Starting divination runtime"
        );

        let shutdown = self.shutdown.clone();
        let mut liveness = tokio::time::interval(self.settings.liveness_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Process events in a loop - no recursion
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                message = self.mailbox_rx.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => break,
                },
                sample = next_sample(&mut self.sample_rx) => match sample {
                    Some(sample) => self.handle_sample(sample).await,
                    None => self.sample_rx = None,
                },
                _ = liveness.tick() => self.handle_liveness_tick(),
            }
        }

        self.cancel_settle();
        if let Some(task) = self.probe_task.take() {
            task.abort();
        }
        self.release_sensor();
        tracing::info!("Divination runtime stopped");
    }

    async fn handle_message(&mut self, message: Message) {
        match message {
            Message::Command(Command::Start) => self.dispatch(Event::Start).await,
            Message::Command(Command::Toss) => {
                self.dispatch(Event::RequestToss {
                    sample: None,
                    source: TossSource::Manual,
                })
                .await;
            }
            Message::Command(Command::Reset) => self.dispatch(Event::Reset).await,
            Message::Command(Command::RevokePermission) => {
                tracing::info!("Motion permission revoked");
                if let Some(notice) = self.detector.revoke() {
                    self.collaborators.notifier.notify(notice);
                }
                self.release_sensor();
                self.publish_snapshot();
            }

            Message::SettleElapsed { epoch, sample } => {
                self.settle_task = None;
                if epoch != self.session.epoch() {
                    tracing::debug!(epoch, "Dropping settle from a reset session");
                    return;
                }
                let line = self.engine.toss(sample.as_ref());
                tracing::info!(
                    step = self.session.step(),
                    value = line.value(),
                    changing = line.changing(),
                    "Coins landed"
                );
                self.dispatch(Event::TossLanded { epoch, line }).await;
            }

            Message::ProbeFinished { supported } => {
                self.probe_task = None;
                tracing::info!(supported, "Motion support probe finished");
                if let Some(notice) = self.detector.probe_finished(supported) {
                    self.collaborators.notifier.notify(notice);
                }
                if self.in_progress() {
                    self.engage_sensor();
                }
                self.publish_snapshot();
            }

            Message::PermissionResolved(outcome) => {
                match &outcome {
                    PermissionOutcome::Failed(reason) => {
                        tracing::warn!(reason = %reason, "Motion permission request failed");
                    }
                    other => tracing::info!(outcome = ?other, "Motion permission resolved"),
                }
                if let Some(notice) = self.detector.permission_resolved(&outcome) {
                    self.collaborators.notifier.notify(notice);
                }
                if self.detector.phase().is_listening() && self.in_progress() {
                    self.register_sensor();
                }
                self.publish_snapshot();
            }
        }
    }

    /// Apply an event through the pure transition and execute its effects
    async fn dispatch(&mut self, event: Event) {
        let result = match transition(&self.session, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                // Rejections are no-ops, not errors
                tracing::debug!(error = %e, "Ignoring event");
                return;
            }
        };

        self.session = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect).await;
        }
    }

    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ScheduleSettle {
                delay,
                epoch,
                sample,
            } => {
                self.cancel_settle();
                let mailbox = self.mailbox_tx.clone();
                self.settle_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    post(&mailbox, Message::SettleElapsed { epoch, sample }).await;
                }));
            }

            Effect::CancelSettle => self.cancel_settle(),

            Effect::EngageSensor => {
                // Manual fallbacks from an earlier session get another chance
                self.detector.begin_session();
                self.engage_sensor();
            }

            Effect::ReleaseSensor => self.release_sensor(),

            Effect::RearmShake => self.detector.rearm(),

            Effect::Notify { message } => self.collaborators.notifier.notify(&message),

            Effect::PublishSnapshot => self.publish_snapshot(),
        }
    }

    async fn handle_sample(&mut self, sample: MotionSample) {
        // Session state is read here, at dispatch time
        let outcome = self.detector.on_sample(sample, self.session.toss_gate());
        match outcome {
            SampleOutcome::Triggered(sample) => {
                tracing::info!(
                    x = sample.x,
                    y = sample.y,
                    z = sample.z,
                    t = sample.t,
                    "Shake detected"
                );
                if let Err(e) = self
                    .collaborators
                    .haptics
                    .vibrate(self.settings.shake.vibrate)
                    .await
                {
                    tracing::debug!(error = %e, "Haptic feedback unavailable");
                }
                self.dispatch(Event::RequestToss {
                    sample: Some(sample),
                    source: TossSource::Shake,
                })
                .await;
            }
            SampleOutcome::Throttled | SampleOutcome::NotArmed => {}
            SampleOutcome::Gated | SampleOutcome::Quiet | SampleOutcome::CoolingDown => {
                self.refresh_snapshot();
            }
        }
    }

    fn handle_liveness_tick(&mut self) {
        if self.detector.liveness_tick(self.clock.now_ms()) {
            tracing::debug!("Shake went quiet");
            self.publish_snapshot();
        }
    }

    fn start_probe(&mut self) {
        if self.probe_task.is_some() {
            return;
        }
        if self.settings.probe_window.is_zero() {
            self.detector.probe_finished(true);
            self.refresh_snapshot();
            return;
        }

        let sensor = self.collaborators.sensor.clone();
        let window = self.settings.probe_window;
        let mailbox = self.mailbox_tx.clone();
        tracing::debug!(?window, "Probing for motion events");
        self.probe_task = Some(tokio::spawn(async move {
            let supported = sensor.probe(window).await;
            post(&mailbox, Message::ProbeFinished { supported }).await;
        }));
    }

    /// Start-of-session guidance and listener setup
    fn engage_sensor(&mut self) {
        if self.detector.phase() == ShakePhase::Probing {
            self.start_probe();
        }
        match self.detector.phase() {
            ShakePhase::Probing | ShakePhase::Requesting => {}
            ShakePhase::Unsupported | ShakePhase::Denied => {
                self.collaborators.notifier.notify(MANUAL_PROMPT);
            }
            ShakePhase::Idle => self.request_permission(),
            ShakePhase::Armed | ShakePhase::Triggered => {
                self.register_sensor();
                self.collaborators.notifier.notify(SHAKE_PROMPT);
            }
        }
    }

    fn request_permission(&mut self) {
        if !self.detector.begin_permission_request() {
            return;
        }

        let Some(provider) = self.collaborators.permission.clone() else {
            tracing::info!("No permission API, motion access granted implicitly");
            let mailbox = self.mailbox_tx.clone();
            tokio::spawn(async move {
                post(&mailbox, Message::PermissionResolved(PermissionOutcome::Granted)).await;
            });
            return;
        };

        tracing::info!("Requesting motion permission");
        let mailbox = self.mailbox_tx.clone();
        tokio::spawn(async move {
            let outcome = match provider.request_motion_permission().await {
                Ok(PermissionResponse::Granted) => PermissionOutcome::Granted,
                Ok(PermissionResponse::Denied) => PermissionOutcome::Denied,
                Err(e) => PermissionOutcome::Failed(e),
            };
            post(&mailbox, Message::PermissionResolved(outcome)).await;
        });
    }

    fn register_sensor(&mut self) {
        if self.sample_rx.is_none() {
            tracing::debug!("Registering motion listener");
            self.sample_rx = Some(self.collaborators.sensor.register());
        }
    }

    fn release_sensor(&mut self) {
        if self.sample_rx.take().is_some() {
            tracing::debug!("Deregistering motion listener");
            self.collaborators.sensor.deregister();
        }
    }

    fn cancel_settle(&mut self) {
        if let Some(task) = self.settle_task.take() {
            task.abort();
        }
    }

    /// Steps 1-6, whether or not a toss is in flight
    fn in_progress(&self) -> bool {
        (1..=6).contains(&self.session.step())
    }

    /// Update the watch cell only
    fn refresh_snapshot(&self) {
        self.snapshot_tx
            .send_replace(SessionSnapshot::capture(&self.session, &self.detector));
    }

    /// Update the watch cell and tell SSE clients
    fn publish_snapshot(&self) {
        let snapshot = SessionSnapshot::capture(&self.session, &self.detector);
        self.snapshot_tx.send_replace(snapshot.clone());
        let _ = self.broadcast_tx.send(SseEvent::Snapshot { snapshot });
    }
}

/// Deliver to the runtime if any handle still keeps it alive
async fn post(mailbox: &mpsc::WeakSender<Message>, message: Message) {
    if let Some(tx) = mailbox.upgrade() {
        let _ = tx.send(message).await;
    }
}

/// Next sample from the listener, or pending forever while unregistered
async fn next_sample(rx: &mut Option<mpsc::Receiver<MotionSample>>) -> Option<MotionSample> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
