use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub signin: SignInConfig,
}

/// UI dispatch loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// How long an idle cycle waits for work, in milliseconds (default: 16).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound of callbacks run by one `poll` cycle (default: 256).
    #[serde(default = "default_max_callbacks_per_cycle")]
    pub max_callbacks_per_cycle: usize,
    /// Thread name prefix for spawned workers (default: "uibind-worker").
    #[serde(default = "default_worker_name_prefix")]
    pub worker_name_prefix: String,
}

impl DispatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Settings of the Sign-In walkthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignInConfig {
    /// Simulated credential verification latency in milliseconds (default: 200).
    #[serde(default = "default_signin_latency_ms")]
    pub latency_ms: u64,
    /// User ids accepted by the walkthrough authenticator.
    #[serde(default = "default_accepted_ids")]
    pub accepted_ids: Vec<String>,
}

impl SignInConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    16
}

fn default_max_callbacks_per_cycle() -> usize {
    256
}

fn default_worker_name_prefix() -> String {
    "uibind-worker".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_signin_latency_ms() -> u64 {
    200
}

fn default_accepted_ids() -> Vec<String> {
    vec!["admin".to_string()]
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_callbacks_per_cycle: default_max_callbacks_per_cycle(),
            worker_name_prefix: default_worker_name_prefix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for SignInConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_signin_latency_ms(),
            accepted_ids: default_accepted_ids(),
        }
    }
}
