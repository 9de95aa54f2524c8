use chrono::{DateTime, Duration, Utc};

/// Seconds to wait from a `Retry-After` header value
///
/// Only the delta-seconds form is understood; anything else falls back to
/// `default_secs`.
pub(super) fn retry_after_secs(header: Option<&str>, default_secs: u64) -> u64 {
    header
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default_secs)
}

/// Absolute cooldown deadline for a rate-limit response received at `now`
pub(super) fn cooldown_deadline(now: DateTime<Utc>, retry_after_secs: u64) -> DateTime<Utc> {
    let secs = i64::try_from(retry_after_secs).unwrap_or(i64::MAX / 1000);
    now + Duration::seconds(secs.min(24 * 60 * 60))
}
