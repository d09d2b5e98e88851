//! Shared primitive types used across the whole core.

use chrono::{DateTime, Utc};

/// Stable identifier of a complaint (uuid v4 text).
pub type ComplaintId = String;

/// Opaque user identifier handed over by the auth layer.
pub type UserId = String;

/// Every persisted instant is UTC.
pub type Timestamp = DateTime<Utc>;

/// Persisted timestamps are unix milliseconds so range filters stay numeric.
pub fn to_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(ms: i64) -> Timestamp {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
