//! Expiration Module
//!
//! Expiry arithmetic for stored records.
//!
//! Records carry their expiry instant as whole Unix seconds. A record whose
//! instant has passed is logically absent even though it may still be in the
//! table: the table's own TTL sweep deletes it eventually, never this crate.

use crate::provider::{AttributeValue, Item};

/// Sentinel returned by `ttl` for keys with no remaining lifetime.
pub const NO_TTL: i64 = -1;

// == Clock ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// == Expires At ==
/// Computes the expiry instant in seconds: `round((now + ttl) / 1000)`.
pub fn compute_expires_at(ttl_ms: u64, now_ms: i64) -> i64 {
    let deadline_ms = now_ms.saturating_add(i64::try_from(ttl_ms).unwrap_or(i64::MAX));
    // Half-up rounding, matching round() for the non-negative instants we produce
    deadline_ms.saturating_add(500).div_euclid(1000)
}

/// Builds the expiry attribute value for a record written at `now_ms`.
pub fn expiration_attribute(ttl_ms: u64, now_ms: i64) -> AttributeValue {
    AttributeValue::number(compute_expires_at(ttl_ms, now_ms))
}

/// Reads the expiry instant of a record, if it has a numeric one.
pub fn expires_at(record: &Item, attribute: &str) -> Option<i64> {
    record.get(attribute).and_then(AttributeValue::as_i64)
}

// == Is Expired ==
/// Checks whether an expiry instant lies strictly before `now_ms`.
pub fn is_expired(expires_at: i64, now_ms: i64) -> bool {
    expires_at.saturating_mul(1000) < now_ms
}

/// Checks a record's expiry attribute. Records without one never expire.
pub fn is_record_expired(record: &Item, attribute: &str, now_ms: i64) -> bool {
    expires_at(record, attribute).is_some_and(|at| is_expired(at, now_ms))
}

// == Remaining ==
/// Remaining lifetime in milliseconds, or [`NO_TTL`] when there is none left.
pub fn remaining_ttl_ms(expires_at: Option<i64>, now_ms: i64) -> i64 {
    match expires_at {
        Some(at) if !is_expired(at, now_ms) => at.saturating_mul(1000) - now_ms,
        _ => NO_TTL,
    }
}
