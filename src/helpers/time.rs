use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Delay until `expiry - margin`, clamped to zero when already past
pub fn delay_before_expiry(expiry: DateTime<Utc>, now: DateTime<Utc>, margin: Duration) -> Duration {
    (expiry - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .saturating_sub(margin)
}

/// Compact human form used in logs, e.g. `1d 6h 3m 5s`
pub fn humanize(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return "now".to_owned();
    }
    let (days, hours, minutes, seconds) = (total / 86_400, total / 3600 % 24, total / 60 % 60, total % 60);
    [(days, "d"), (hours, "h"), (minutes, "m"), (seconds, "s")]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn get_instant() -> Instant {
    Instant::now()
}
