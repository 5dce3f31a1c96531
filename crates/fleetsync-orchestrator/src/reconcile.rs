//! Exclusive-membership reconciliation.
//!
//! A host is registered under at most one version, and holds at most one
//! status value per check type. Both invariants are restored the same way:
//! after writing the one key that should exist, delete every other key in
//! the host's membership set.

use fleetsync_state::{KvStore, StoreResult};
use tracing::debug;

/// Delete every key in `members` except `keep`.
///
/// Returns the keys that were actually present and removed. Keys that are
/// already gone are not an error.
pub async fn retain_only<S, I>(store: &S, members: I, keep: &str) -> StoreResult<Vec<String>>
where
    S: KvStore,
    I: IntoIterator<Item = String>,
{
    let mut removed = Vec::new();
    for key in members {
        if key == keep {
            continue;
        }
        if store.delete(&key).await? {
            debug!(%key, %keep, "removed stale membership");
            removed.push(key);
        }
    }
    Ok(removed)
}
