//! Mock implementations for testing
//!
//! These mocks enable integration testing without a browser.

use super::traits::*;
use super::{Collaborators, DivinationHandle, DivinationRuntime, RuntimeSettings, SessionSnapshot};
use crate::divination::{CoinFace, EntropySource, HexagramTable};
use crate::motion::{MotionClock, MotionSample};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// Mock Motion Sensor
// ============================================================================

/// Sensor whose support is fixed up front and whose samples are pushed by the test
pub struct MockMotionSensor {
    supported: bool,
    listener: Mutex<Option<mpsc::Sender<MotionSample>>>,
    pub registrations: AtomicUsize,
    pub deregistrations: AtomicUsize,
}

impl MockMotionSensor {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            listener: Mutex::new(None),
            registrations: AtomicUsize::new(0),
            deregistrations: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, sample: MotionSample) -> bool {
        match self.listener.lock().unwrap().as_ref() {
            Some(tx) => tx.try_send(sample).is_ok(),
            None => false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.listener.lock().unwrap().is_some()
    }
}

#[async_trait]
impl MotionSensor for MockMotionSensor {
    async fn probe(&self, _window: Duration) -> bool {
        self.supported
    }

    fn register(&self) -> mpsc::Receiver<MotionSample> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(SAMPLE_BUFFER);
        *self.listener.lock().unwrap() = Some(tx);
        rx
    }

    fn deregister(&self) {
        self.deregistrations.fetch_add(1, Ordering::SeqCst);
        self.listener.lock().unwrap().take();
    }
}

// ============================================================================
// Mock Permission, Haptics, Notifier
// ============================================================================

/// Permission API that always gives the same answer
pub struct MockPermission {
    response: Result<PermissionResponse, String>,
    pub requests: AtomicUsize,
}

impl MockPermission {
    pub fn granting() -> Self {
        Self::answering(Ok(PermissionResponse::Granted))
    }

    pub fn denying() -> Self {
        Self::answering(Ok(PermissionResponse::Denied))
    }

    pub fn failing(reason: &str) -> Self {
        Self::answering(Err(reason.to_string()))
    }

    fn answering(response: Result<PermissionResponse, String>) -> Self {
        Self {
            response,
            requests: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PermissionProvider for MockPermission {
    async fn request_motion_permission(&self) -> Result<PermissionResponse, String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Records vibrations; optionally fails every one
#[derive(Default)]
pub struct MockHaptics {
    pub fail: bool,
    pub pulses: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Haptics for MockHaptics {
    async fn vibrate(&self, duration: Duration) -> Result<(), String> {
        self.pulses.lock().unwrap().push(duration);
        if self.fail {
            Err("vibration unsupported".to_string())
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn recorded(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn count(&self, notice: &str) -> usize {
        self.recorded().iter().filter(|n| n.as_str() == notice).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

// ============================================================================
// Mock Entropy
// ============================================================================

/// Always lands the same faces and records the sample each toss was given
pub struct FixedFaces {
    faces: [CoinFace; 3],
    pub seen: Arc<Mutex<Vec<Option<MotionSample>>>>,
}

impl FixedFaces {
    pub fn new(faces: [CoinFace; 3]) -> Self {
        Self {
            faces,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl EntropySource for FixedFaces {
    fn draw_faces(&mut self, sample: Option<&MotionSample>) -> [CoinFace; 3] {
        self.seen.lock().unwrap().push(sample.copied());
        self.faces
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

pub struct TestRuntime {
    pub handle: DivinationHandle,
    pub sensor: Arc<MockMotionSensor>,
    pub permission: Option<Arc<MockPermission>>,
    pub haptics: Arc<MockHaptics>,
    pub notifier: Arc<RecordingNotifier>,
    pub tosses: Arc<Mutex<Vec<Option<MotionSample>>>>,
    pub clock: MotionClock,
    pub settings: RuntimeSettings,
    runtime_task: tokio::task::JoinHandle<()>,
}

impl TestRuntime {
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder::new()
    }
}

pub struct TestRuntimeBuilder {
    supported: bool,
    permission: Option<MockPermission>,
    haptics: MockHaptics,
    faces: [CoinFace; 3],
    settings: RuntimeSettings,
}

impl TestRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            supported: true,
            permission: None,
            haptics: MockHaptics::default(),
            faces: [CoinFace::Heads; 3],
            settings: RuntimeSettings::default(),
        }
    }

    pub fn supported(mut self, supported: bool) -> Self {
        self.supported = supported;
        self
    }

    pub fn permission(mut self, permission: MockPermission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn haptics(mut self, haptics: MockHaptics) -> Self {
        self.haptics = haptics;
        self
    }

    pub fn faces(mut self, faces: [CoinFace; 3]) -> Self {
        self.faces = faces;
        self
    }

    pub fn build(self) -> TestRuntime {
        let sensor = Arc::new(MockMotionSensor::new(self.supported));
        let permission = self.permission.map(Arc::new);
        let haptics = Arc::new(self.haptics);
        let notifier = Arc::new(RecordingNotifier::default());
        let entropy = FixedFaces::new(self.faces);
        let tosses = entropy.seen.clone();
        let clock = MotionClock::new();
        let (broadcast_tx, _) = broadcast::channel(128);

        let collaborators = Collaborators {
            sensor: sensor.clone(),
            permission: permission
                .clone()
                .map(|p| p as Arc<dyn PermissionProvider>),
            haptics: haptics.clone(),
            notifier: notifier.clone(),
        };

        let (runtime, handle) = DivinationRuntime::new(
            Arc::new(HexagramTable::builtin().unwrap()),
            self.settings,
            entropy,
            collaborators,
            clock,
            broadcast_tx,
        );
        let runtime_handle = runtime.spawn();

        TestRuntime {
            handle,
            sensor,
            permission,
            haptics,
            notifier,
            tosses,
            clock,
            settings: self.settings,
            runtime_task: runtime_handle,
        }
    }
}

impl Default for TestRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRuntime {
    /// Wait until the published snapshot satisfies `predicate`
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
        timeout: Duration,
    ) -> bool {
        let mut rx = self.handle.watch();
        let reached = matches!(
            tokio::time::timeout(timeout, rx.wait_for(predicate)).await,
            Ok(Ok(_))
        );
        reached
    }

    pub async fn wait_for_step(&self, step: u8) -> bool {
        self.wait_for(|s| s.step == step && !s.flipping, Duration::from_secs(5))
            .await
    }

    /// Push a sample stamped with the runtime's clock
    pub fn shake(&self, x: f64, y: f64, z: f64) -> bool {
        self.sensor.push(self.clock.sample(x, y, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shake::{
        ShakePhase, DENIED_NOTICE, GRANTED_NOTICE, MANUAL_PROMPT, SHAKE_NOTICE,
        UNSUPPORTED_NOTICE,
    };

    async fn armed_runtime(builder: TestRuntimeBuilder) -> TestRuntime {
        let rt = builder.build();
        rt.handle.start().await;
        assert!(rt.wait_for(|s| s.shake.armed, Duration::from_secs(5)).await);
        assert!(rt.sensor.is_registered());
        rt
    }

    /// Integration test: six manual tosses on a device without motion events
    #[tokio::test(start_paused = true)]
    async fn test_manual_divination_completes() {
        let rt = TestRuntime::new().supported(false).build();
        // Nothing is probed until a session starts
        assert_eq!(rt.handle.snapshot().shake.phase, ShakePhase::Probing);

        rt.handle.start().await;
        assert!(
            rt.wait_for(|s| s.shake.phase == ShakePhase::Unsupported, Duration::from_secs(5))
                .await
        );
        assert!(rt.wait_for_step(1).await);
        for step in 2..=7 {
            rt.handle.request_toss().await;
            assert!(rt.wait_for_step(step).await, "stuck before step {step}");
        }

        let snapshot = rt.handle.snapshot();
        assert_eq!(snapshot.lines.len(), 6);
        assert_eq!(snapshot.lines[0].position, "初爻");
        assert_eq!(snapshot.lines[5].position, "上爻");
        let reading = snapshot.reading.unwrap();
        assert_eq!(reading.primary.name, "乾");
        assert_eq!(reading.changed.unwrap().name, "坤");

        assert_eq!(rt.notifier.count(UNSUPPORTED_NOTICE), 1);
        assert_eq!(rt.notifier.count(MANUAL_PROMPT), 1);
        assert_eq!(rt.sensor.registrations.load(Ordering::SeqCst), 0);
        // Manual tosses carry no sample
        assert!(rt.tosses.lock().unwrap().iter().all(Option::is_none));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_toss_while_flipping_is_ignored() {
        let rt = TestRuntime::new().supported(false).build();
        rt.handle.start().await;
        rt.handle.request_toss().await;
        rt.handle.request_toss().await;

        assert!(rt.wait_for_step(2).await);
        tokio::time::sleep(rt.settings.settle_delay * 3).await;

        let snapshot = rt.handle.snapshot();
        assert_eq!(snapshot.step, 2);
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(rt.tosses.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toss_before_start_is_ignored() {
        let rt = TestRuntime::new().supported(false).build();
        rt.handle.request_toss().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rt.handle.snapshot().step, 0);
        assert!(rt.tosses.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shake_triggers_one_toss() {
        let rt = armed_runtime(TestRuntime::new()).await;

        assert!(rt.shake(14.0, 0.3, 9.8));
        assert!(rt.wait_for_step(2).await);

        assert_eq!(rt.haptics.pulses.lock().unwrap().as_slice(), &[Duration::from_millis(200)]);
        assert_eq!(rt.notifier.count(SHAKE_NOTICE), 1);
        let tosses = rt.tosses.lock().unwrap().clone();
        assert_eq!(tosses.len(), 1);
        assert!((tosses[0].unwrap().x - 14.0).abs() < f64::EPSILON);
        // The listener stays up for the next step
        assert!(rt.sensor.is_registered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gentle_motion_does_not_toss() {
        let rt = armed_runtime(TestRuntime::new()).await;
        rt.shake(0.5, 0.2, 7.9);
        assert!(
            rt.wait_for(|s| (s.shake.acceleration.z - 7.9).abs() < f64::EPSILON, Duration::from_secs(1))
                .await
        );
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rt.handle.snapshot().step, 1);
        assert!(rt.tosses.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_haptics_do_not_block_toss() {
        let haptics = MockHaptics {
            fail: true,
            ..MockHaptics::default()
        };
        let rt = armed_runtime(TestRuntime::new().haptics(haptics)).await;
        rt.shake(0.0, -20.0, 0.0);
        assert!(rt.wait_for_step(2).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_granted_by_provider() {
        let rt = armed_runtime(TestRuntime::new().permission(MockPermission::granting())).await;
        let permission = rt.permission.as_ref().unwrap();
        assert_eq!(permission.requests.load(Ordering::SeqCst), 1);
        assert_eq!(rt.notifier.count(GRANTED_NOTICE), 1);

        // A granted permission carries over to the next session
        rt.handle.reset().await;
        rt.handle.start().await;
        assert!(
            rt.wait_for(
                |s| s.epoch == 1 && s.step == 1 && s.shake.armed,
                Duration::from_secs(5)
            )
            .await
        );
        assert!(rt.sensor.is_registered());
        assert_eq!(permission.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_falls_back_to_manual() {
        for permission in [MockPermission::denying(), MockPermission::failing("boom")] {
            let rt = TestRuntime::new().permission(permission).build();
            rt.handle.start().await;
            assert!(
                rt.wait_for(|s| s.shake.phase == ShakePhase::Denied, Duration::from_secs(5))
                    .await
            );
            assert!(rt.handle.snapshot().shake.manual);
            assert_eq!(rt.notifier.count(DENIED_NOTICE), 1);
            assert!(!rt.sensor.is_registered());

            rt.handle.request_toss().await;
            assert!(rt.wait_for_step(2).await);

            // The next session asks again
            rt.handle.reset().await;
            rt.handle.start().await;
            assert!(
                rt.wait_for(
                    |s| s.epoch == 1 && s.step == 1 && s.shake.phase == ShakePhase::Denied,
                    Duration::from_secs(5)
                )
                .await
            );
            let permission = rt.permission.as_ref().unwrap();
            assert_eq!(permission.requests.load(Ordering::SeqCst), 2);
            assert_eq!(rt.notifier.count(DENIED_NOTICE), 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_discards_pending_toss() {
        let rt = TestRuntime::new().supported(false).build();
        rt.handle.start().await;
        rt.handle.request_toss().await;
        assert!(rt.wait_for(|s| s.flipping, Duration::from_secs(1)).await);

        rt.handle.reset().await;
        rt.handle.start().await;
        tokio::time::sleep(rt.settings.settle_delay * 3).await;

        let snapshot = rt.handle.snapshot();
        assert_eq!(snapshot.epoch, 1);
        assert_eq!(snapshot.step, 1);
        assert!(snapshot.lines.is_empty());
        assert!(!snapshot.flipping);
        assert!(rt.tosses.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_releases_listener() {
        let rt = armed_runtime(TestRuntime::new()).await;
        rt.handle.reset().await;
        assert!(rt.wait_for(|s| s.step == 0, Duration::from_secs(1)).await);
        assert!(!rt.sensor.is_registered());
        assert!(!rt.shake(20.0, 0.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_releases_listener() {
        let builder = TestRuntime::new().faces([CoinFace::Heads, CoinFace::Tails, CoinFace::Heads]);
        let rt = armed_runtime(builder).await;
        for step in 2..=7 {
            rt.handle.request_toss().await;
            assert!(rt.wait_for_step(step).await);
        }
        assert!(!rt.sensor.is_registered());

        let reading = rt.handle.snapshot().reading.unwrap();
        assert_eq!(reading.primary.name, "乾");
        assert!(!reading.has_changes);
        assert_eq!(reading.changed, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revoke_releases_listener() {
        let rt = armed_runtime(TestRuntime::new()).await;
        rt.handle.revoke_permission().await;
        assert!(
            rt.wait_for(|s| s.shake.phase == ShakePhase::Denied, Duration::from_secs(1))
                .await
        );
        assert!(!rt.sensor.is_registered());
        assert_eq!(rt.notifier.count(DENIED_NOTICE), 1);

        // Manual tosses still work
        rt.handle.request_toss().await;
        assert!(rt.wait_for_step(2).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_listener() {
        let rt = armed_runtime(TestRuntime::new()).await;
        rt.handle.shutdown();
        tokio::time::timeout(Duration::from_secs(1), rt.runtime_task)
            .await
            .unwrap()
            .unwrap();
        assert!(!rt.sensor.is_registered());
        assert_eq!(rt.sensor.deregistrations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_runtime() {
        let rt = armed_runtime(TestRuntime::new()).await;
        let TestRuntime {
            handle,
            sensor,
            runtime_task,
            ..
        } = rt;
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), runtime_task)
            .await
            .unwrap()
            .unwrap();
        assert!(!sensor.is_registered());
    }

    // ========================================================================
    // Browser-fed sensor
    // ========================================================================

    struct BrowserRuntime {
        handle: DivinationHandle,
        sensor: Arc<ChannelMotionSensor>,
        notifier: Arc<RecordingNotifier>,
        clock: MotionClock,
    }

    /// Production sensor wiring with default settings and no permission API
    fn browser_runtime() -> BrowserRuntime {
        let sensor = Arc::new(ChannelMotionSensor::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = MotionClock::new();
        let (broadcast_tx, _) = broadcast::channel(128);
        let collaborators = Collaborators {
            sensor: sensor.clone(),
            permission: None,
            haptics: Arc::new(MockHaptics::default()),
            notifier: notifier.clone(),
        };
        let (runtime, handle) = DivinationRuntime::new(
            Arc::new(HexagramTable::builtin().unwrap()),
            RuntimeSettings::default(),
            FixedFaces::new([CoinFace::Heads; 3]),
            collaborators,
            clock,
            broadcast_tx,
        );
        runtime.spawn();
        BrowserRuntime {
            handle,
            sensor,
            notifier,
            clock,
        }
    }

    async fn wait_for(
        handle: &DivinationHandle,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> bool {
        let mut rx = handle.watch();
        let reached = matches!(
            tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate)).await,
            Ok(Ok(_))
        );
        reached
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_connecting_late_still_arms() {
        let rt = browser_runtime();
        // The page opens well after the server came up
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!rt.sensor.push(rt.clock.sample(0.1, 0.2, 9.8)));

        rt.handle.start().await;
        assert!(wait_for(&rt.handle, |s| s.shake.armed).await);
        assert!(rt.sensor.is_registered());

        assert!(rt.sensor.push(rt.clock.sample(20.0, 0.0, 9.8)));
        assert!(wait_for(&rt.handle, |s| s.step == 2 && !s.flipping).await);
        assert_eq!(rt.notifier.count(SHAKE_NOTICE), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_session_is_probed_again() {
        let rt = browser_runtime();
        rt.handle.start().await;
        assert!(wait_for(&rt.handle, |s| s.shake.phase == ShakePhase::Unsupported).await);
        assert!(!rt.sensor.is_registered());
        assert_eq!(rt.notifier.count(UNSUPPORTED_NOTICE), 1);

        // Motion starts flowing; the next session picks it up
        rt.handle.reset().await;
        rt.sensor.push(rt.clock.sample(0.0, 0.0, 9.8));
        rt.handle.start().await;
        assert!(wait_for(&rt.handle, |s| s.epoch == 1 && s.step == 1 && s.shake.armed).await);
        assert!(rt.sensor.is_registered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shake_flag_clears_after_quiet_window() {
        let rt = armed_runtime(TestRuntime::new()).await;
        rt.shake(0.0, 0.0, 30.0);
        assert!(rt.wait_for(|s| s.shake.shake_detected, Duration::from_secs(1)).await);
        assert!(rt.wait_for(|s| !s.shake.shake_detected, Duration::from_secs(5)).await);
        assert!(rt.handle.snapshot().shake.last_trigger_time.is_some());
    }
}
