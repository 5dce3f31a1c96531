//! Shared value types for the fleetsync store boundary.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Value persisted by backends that manage expiry themselves.
///
/// Backends with native TTL support (etcd) never see this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredValue {
    pub value: String,
    /// Unix timestamp (seconds) after which the entry is considered gone.
    pub expires_at: Option<u64>,
}

impl StoredValue {
    /// Wrap a value, stamping an expiry if a TTL is given.
    pub fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| epoch_secs().saturating_add(ttl_secs(ttl))),
        }
    }

    /// Whether this entry has outlived its TTL at `now` (unix seconds).
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Whole seconds covering `ttl`, rounded up so a partial second still
/// counts as one.
pub fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0))
}

/// Current unix time in whole seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
