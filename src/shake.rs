//! Shake detection
//!
//! A debounced threshold state machine over motion samples. It owns no
//! timers and no listeners: the runtime feeds it samples, permission outcomes
//! and liveness ticks, and acts on what it returns. That keeps the trigger
//! rule testable without a sensor.

use crate::motion::{Acceleration, MotionSample};
use serde::Serialize;
use std::time::Duration;


/// Tunable detection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeConfig {
    /// Per-axis acceleration threshold. Needs calibration per device class.
    pub threshold_per_axis: f64,
    /// Minimum gap between two accepted triggers
    pub cooldown_ms: u64,
    /// Samples closer than this to the last processed one are dropped
    pub sample_interval_ms: u64,
    /// `shake_detected` clears once no trigger has landed for this long
    pub quiet_window_ms: u64,
    /// Haptic pulse requested on each trigger
    pub vibrate: Duration,
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            threshold_per_axis: 8.0,
            cooldown_ms: 600,
            sample_interval_ms: 100,
            quiet_window_ms: 2_000,
            vibrate: Duration::from_millis(200),
        }
    }
}

/// Where the detector is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShakePhase {
    /// Support not confirmed yet; probed when a session starts
    Probing,
    /// No motion events on this device; manual tosses only
    Unsupported,
    /// Supported, permission not asked yet
    Idle,
    /// Permission request in flight
    Requesting,
    /// Listening for shakes
    Armed,
    /// A shake fired and its toss has not landed yet
    Triggered,
    /// Permission denied, failed or revoked; manual tosses only
    Denied,
}

impl ShakePhase {
    /// Tosses must be started by hand in this phase
    pub fn is_manual(self) -> bool {
        matches!(self, ShakePhase::Unsupported | ShakePhase::Denied)
    }

    /// Permission granted and the listener should be live
    pub fn is_listening(self) -> bool {
        matches!(self, ShakePhase::Armed | ShakePhase::Triggered)
    }
}

/// Outcome of a permission request as seen by the detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    /// The request itself failed; treated exactly like a denial
    Failed(String),
}

/// The session state a sample is judged against, read at dispatch time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TossGate {
    pub step: u8,
    pub flipping: bool,
}

impl TossGate {
    pub fn accepting(self) -> bool {
        (1..=6).contains(&self.step) && !self.flipping
    }
}

/// Trigger bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShakeState {
    pub armed: bool,
    pub last_trigger_time: Option<u64>,
    pub cooldown_ms: u64,
    pub threshold_per_axis: f64,
}

/// What happened to one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Not listening; sample discarded
    NotArmed,
    /// Arrived inside the sample interval; discarded
    Throttled,
    /// Recorded, but the session is not accepting a toss
    Gated,
    /// Recorded, below threshold
    Quiet,
    /// Above threshold but inside the cooldown
    CoolingDown,
    /// Accepted: exactly one toss should follow
    Triggered(MotionSample),
}

pub const UNSUPPORTED_NOTICE: &str =
    "Motion sensing is not available on this device; tossing with virtual coins.";
pub const DENIED_NOTICE: &str = "Motion permission was not granted; tossing with virtual coins.";
pub const GRANTED_NOTICE: &str = "Motion permission granted. Shake your device to toss the coins.";
pub const SHAKE_NOTICE: &str = "Shake detected! Tossing the coins...";
pub const SHAKE_PROMPT: &str = "Shake your device to toss the coins!";
pub const MANUAL_PROMPT: &str = "Using virtual coins. Press toss to continue.";

#[derive(Debug, Clone)]
pub struct ShakeDetector {
    config: ShakeConfig,
    phase: ShakePhase,
    last_trigger_time: Option<u64>,
    last_processed: Option<u64>,
    acceleration: Acceleration,
    shake_detected: bool,
    manual_notified: bool,
}

impl ShakeDetector {
    pub fn new(config: ShakeConfig) -> Self {
        Self {
            config,
            phase: ShakePhase::Probing,
            last_trigger_time: None,
            last_processed: None,
            acceleration: Acceleration::default(),
            shake_detected: false,
            manual_notified: false,
        }
    }

    pub fn phase(&self) -> ShakePhase {
        self.phase
    }

    pub fn config(&self) -> &ShakeConfig {
        &self.config
    }

    pub fn acceleration(&self) -> Acceleration {
        self.acceleration
    }

    /// Informational flag: a shake landed recently
    pub fn shake_detected(&self) -> bool {
        self.shake_detected
    }

    pub fn state(&self) -> ShakeState {
        ShakeState {
            armed: self.phase == ShakePhase::Armed,
            last_trigger_time: self.last_trigger_time,
            cooldown_ms: self.config.cooldown_ms,
            threshold_per_axis: self.config.threshold_per_axis,
        }
    }

    /// Support probe finished. Returns a notice the first time the device
    /// turns out to be unsupported.
    pub fn probe_finished(&mut self, supported: bool) -> Option<&'static str> {
        if self.phase != ShakePhase::Probing {
            return None;
        }
        if supported {
            self.phase = ShakePhase::Idle;
            None
        } else {
            self.phase = ShakePhase::Unsupported;
            self.manual_notice(UNSUPPORTED_NOTICE)
        }
    }

    /// A new session is starting. Manual fallbacks are retried: an
    /// unsupported device is probed again and a denial is asked again. A
    /// granted permission carries over.
    pub fn begin_session(&mut self) {
        self.manual_notified = false;
        self.last_processed = None;
        match self.phase {
            ShakePhase::Unsupported => self.phase = ShakePhase::Probing,
            ShakePhase::Denied => self.phase = ShakePhase::Idle,
            ShakePhase::Triggered => self.phase = ShakePhase::Armed,
            ShakePhase::Probing | ShakePhase::Idle | ShakePhase::Requesting | ShakePhase::Armed => {}
        }
    }

    /// Move to `Requesting` if permission has not been asked yet. Returns
    /// true when the caller should issue the request.
    pub fn begin_permission_request(&mut self) -> bool {
        if self.phase == ShakePhase::Idle {
            self.phase = ShakePhase::Requesting;
            true
        } else {
            false
        }
    }

    /// Resolve an in-flight permission request
    pub fn permission_resolved(&mut self, outcome: &PermissionOutcome) -> Option<&'static str> {
        if self.phase != ShakePhase::Requesting {
            return None;
        }
        match outcome {
            PermissionOutcome::Granted => {
                self.arm();
                Some(GRANTED_NOTICE)
            }
            PermissionOutcome::Denied | PermissionOutcome::Failed(_) => {
                self.phase = ShakePhase::Denied;
                self.manual_notice(DENIED_NOTICE)
            }
        }
    }

    /// Permission withdrawn after it was granted
    pub fn revoke(&mut self) -> Option<&'static str> {
        if !self.phase.is_listening() && self.phase != ShakePhase::Requesting {
            return None;
        }
        self.phase = ShakePhase::Denied;
        self.shake_detected = false;
        self.last_processed = None;
        self.manual_notice(DENIED_NOTICE)
    }

    /// The toss a trigger started has landed
    pub fn rearm(&mut self) {
        if self.phase == ShakePhase::Triggered {
            self.phase = ShakePhase::Armed;
        }
    }

    /// Evaluate one sample against the trigger rule
    pub fn on_sample(&mut self, sample: MotionSample, gate: TossGate) -> SampleOutcome {
        if !self.phase.is_listening() {
            return SampleOutcome::NotArmed;
        }

        let now = sample.t;
        if let Some(last) = self.last_processed {
            if now.saturating_sub(last) < self.config.sample_interval_ms {
                return SampleOutcome::Throttled;
            }
        }
        self.last_processed = Some(now);
        self.acceleration = sample.acceleration();

        if !gate.accepting() {
            return SampleOutcome::Gated;
        }
        // The session is taking tosses again, so whatever we triggered has landed
        self.rearm();

        if !sample.exceeds(self.config.threshold_per_axis) {
            return SampleOutcome::Quiet;
        }
        if let Some(last) = self.last_trigger_time {
            if now.saturating_sub(last) <= self.config.cooldown_ms {
                return SampleOutcome::CoolingDown;
            }
        }

        self.last_trigger_time = Some(now);
        self.shake_detected = true;
        self.phase = ShakePhase::Triggered;
        SampleOutcome::Triggered(sample)
    }

    /// Periodic liveness check. Returns true if `shake_detected` was cleared.
    pub fn liveness_tick(&mut self, now: u64) -> bool {
        if !self.shake_detected {
            return false;
        }
        let quiet = self
            .last_trigger_time
            .map_or(true, |last| now.saturating_sub(last) > self.config.quiet_window_ms);
        if quiet {
            self.shake_detected = false;
        }
        quiet
    }

    fn arm(&mut self) {
        self.phase = ShakePhase::Armed;
        self.last_processed = None;
    }

    fn manual_notice(&mut self, notice: &'static str) -> Option<&'static str> {
        if self.manual_notified {
            None
        } else {
            self.manual_notified = true;
            Some(notice)
        }
    }
}
