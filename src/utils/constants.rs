//! Process-wide defaults

pub const DEFAULT_CONFIG_PATH: &str = "token-rotator.yaml";

/// Upper bound for a single issuer request; the per-attempt worker timeout
/// normally fires first
pub const HTTP_CLIENT_TIMEOUT_SECS: u64 = 30;
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const USER_AGENT: &str = concat!("token-rotator/", env!("CARGO_PKG_VERSION"));
