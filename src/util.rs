use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};

static SESSION_SEED: OnceLock<u128> = OnceLock::new();
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

#[inline]
pub(crate) fn unix_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
        })
}

/// Process-unique session uuid: a random per-process seed mixed with a
/// monotonically increasing counter, so two calls never collide.
pub(crate) fn next_session_uuid() -> uuid::Uuid {
    let seed = *SESSION_SEED.get_or_init(|| {
        let hi = u128::from(fastrand::u64(..));
        let lo = u128::from(fastrand::u64(..));
        (hi << 64) | lo
    });
    let seq = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    uuid::Uuid::from_u128(seed ^ u128::from(seq))
}

/// `chatcmpl-<uuid>` id used for both stream and non-stream completions.
pub(crate) fn completion_id(session: uuid::Uuid) -> String {
    let mut out = String::with_capacity(9 + 36);
    out.push_str("chatcmpl-");
    out.push_str(session.hyphenated().encode_lower(&mut uuid::Uuid::encode_buffer()));
    out
}

/// `call_<session hex>_<n>`; `n` counts calls within one session.
pub(crate) fn call_id(session: uuid::Uuid, n: u64) -> String {
    let mut out = String::with_capacity(5 + 32 + 21);
    out.push_str("call_");
    out.push_str(session.simple().encode_lower(&mut uuid::Uuid::encode_buffer()));
    out.push('_');
    out.push_str(&n.to_string());
    out
}

/// RFC 3339 UTC timestamp with millisecond precision.
pub(crate) fn iso8601_from_millis(millis: u64) -> String {
    let millis = i64::try_from(millis).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time as an RFC 3339 UTC timestamp.
pub(crate) fn iso8601_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
