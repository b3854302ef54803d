//! Service configuration from environment variables

use crate::runtime::RuntimeSettings;
use crate::shake::ShakeConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DivinationConfig {
    pub port: u16,
    /// JSON table replacing the embedded one
    pub table_path: Option<PathBuf>,
    pub runtime: RuntimeSettings,
    /// How long to wait for the browser to answer a permission prompt
    pub permission_timeout: Duration,
    /// When false the platform is treated as having no permission API
    pub require_permission: bool,
}

impl Default for DivinationConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            table_path: None,
            runtime: RuntimeSettings::default(),
            permission_timeout: Duration::from_secs(30),
            require_permission: true,
        }
    }
}

impl DivinationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep their default
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let shake = defaults.runtime.shake;
        let env = Env { lookup };

        Self {
            port: env.parse("DIVINATION_PORT").unwrap_or(defaults.port),
            table_path: env.get("DIVINATION_TABLE_PATH").map(PathBuf::from),
            runtime: RuntimeSettings {
                shake: ShakeConfig {
                    threshold_per_axis: env
                        .parse::<f64>("DIVINATION_SHAKE_THRESHOLD")
                        .filter(|t| t.is_finite() && *t > 0.0)
                        .unwrap_or(shake.threshold_per_axis),
                    cooldown_ms: env
                        .parse("DIVINATION_SHAKE_COOLDOWN_MS")
                        .unwrap_or(shake.cooldown_ms),
                    sample_interval_ms: env
                        .parse("DIVINATION_SAMPLE_INTERVAL_MS")
                        .unwrap_or(shake.sample_interval_ms),
                    quiet_window_ms: env
                        .parse("DIVINATION_QUIET_WINDOW_MS")
                        .unwrap_or(shake.quiet_window_ms),
                    vibrate: env.millis("DIVINATION_VIBRATE_MS").unwrap_or(shake.vibrate),
                },
                settle_delay: env
                    .millis("DIVINATION_SETTLE_MS")
                    .unwrap_or(defaults.runtime.settle_delay),
                liveness_interval: env
                    .millis("DIVINATION_LIVENESS_INTERVAL_MS")
                    .filter(|d| !d.is_zero())
                    .unwrap_or(defaults.runtime.liveness_interval),
                probe_window: env
                    .millis("DIVINATION_PROBE_MS")
                    .unwrap_or(defaults.runtime.probe_window),
            },
            permission_timeout: env
                .millis("DIVINATION_PERMISSION_TIMEOUT_MS")
                .unwrap_or(defaults.permission_timeout),
            require_permission: env
                .parse("DIVINATION_REQUIRE_PERMISSION")
                .unwrap_or(defaults.require_permission),
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparsable setting");
                None
            }
        }
    }

    fn millis(&self, key: &str) -> Option<Duration> {
        self.parse::<u64>(key).map(Duration::from_millis)
    }
}
