//! redb table definitions for the local store.
//!
//! The local store mirrors the shared store's flat key space in one table:
//! `&str` path keys, `&[u8]` JSON-serialized [`StoredValue`](crate::StoredValue)s.

use redb::TableDefinition;

/// Every key, keyed by its full path (`/running_version/{version}/{host}`).
pub const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");
