use std::time::Duration;

use serde::Deserialize;

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    #[serde(default)]
    pub preemption: PreemptionConfig,
    #[serde(default)]
    pub stagger: StaggerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub persist: PersistConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
}

/// How long before expiry a token gets replaced.
/// margin = base_minutes + random(0..=jitter_minutes)
#[derive(Debug, Deserialize, Clone)]
pub struct PreemptionConfig {
    #[serde(default = "default_preemption_base_minutes")]
    pub base_minutes: u64,
    #[serde(default = "default_preemption_jitter_minutes")]
    pub jitter_minutes: u64,
    /// rearm floor when a fresh token already lives inside the margin
    #[serde(default = "default_preemption_min_delay_seconds")]
    pub min_delay_seconds: u64,
}

impl Default for PreemptionConfig {
    fn default() -> Self {
        Self {
            base_minutes: default_preemption_base_minutes(),
            jitter_minutes: default_preemption_jitter_minutes(),
            min_delay_seconds: default_preemption_min_delay_seconds(),
        }
    }
}

impl PreemptionConfig {
    pub fn base(&self) -> Duration {
        Duration::from_secs(self.base_minutes.saturating_mul(60))
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_minutes.saturating_mul(60))
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_secs(self.min_delay_seconds)
    }
}

/// Spacing of first fetches for credentials without a stored token.
/// invariant: jitter_seconds < step_seconds
#[derive(Debug, Deserialize, Clone)]
pub struct StaggerConfig {
    #[serde(default = "default_stagger_step_seconds")]
    pub step_seconds: u64,
    #[serde(default = "default_stagger_jitter_seconds")]
    pub jitter_seconds: u64,
}

impl Default for StaggerConfig {
    fn default() -> Self {
        Self {
            step_seconds: default_stagger_step_seconds(),
            jitter_seconds: default_stagger_jitter_seconds(),
        }
    }
}

impl StaggerConfig {
    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_seconds)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// per attempt
    #[serde(default = "default_fetch_timeout_seconds")]
    pub timeout_seconds: u64,
    /// wait before retry n is min(step * n, max)
    #[serde(default = "default_backoff_step_seconds")]
    pub backoff_step_seconds: u64,
    #[serde(default = "default_backoff_max_seconds")]
    pub backoff_max_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_fetch_timeout_seconds(),
            backoff_step_seconds: default_backoff_step_seconds(),
            backoff_max_seconds: default_backoff_max_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistConfig {
    /// retries after the first failed write
    #[serde(default = "default_persist_retries")]
    pub retries: u32,
    /// will be mutiply by 2 on every attempt until max_delay_ms
    #[serde(default = "default_persist_base_delay_ms")]
    pub base_delay_ms: u64,
    /// invariant: >= base_delay_ms
    #[serde(default = "default_persist_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            retries: default_persist_retries(),
            base_delay_ms: default_persist_base_delay_ms(),
            max_delay_ms: default_persist_max_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_preemption_base_minutes() -> u64 {
    1800
}

fn default_preemption_jitter_minutes() -> u64 {
    180
}

fn default_preemption_min_delay_seconds() -> u64 {
    60
}

fn default_stagger_step_seconds() -> u64 {
    120
}

fn default_stagger_jitter_seconds() -> u64 {
    55
}

fn default_fetch_timeout_seconds() -> u64 {
    15
}

fn default_backoff_step_seconds() -> u64 {
    5
}

fn default_backoff_max_seconds() -> u64 {
    60
}

fn default_persist_retries() -> u32 {
    5
}

fn default_persist_base_delay_ms() -> u64 {
    200
}

fn default_persist_max_delay_ms() -> u64 {
    5000
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> String {
    "9100".to_string()
}
