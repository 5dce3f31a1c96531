//! LocalStore: redb-backed key-value store.
//!
//! Serves single-node fleets and development setups where every process
//! on the host shares one database file. redb locks the file for as long
//! as a `Database` is open, so a file-backed store opens it per operation
//! and waits for the lock when another process holds it. Values are
//! JSON-serialized `StoredValue`s so TTLs survive restarts; expired entries
//! are filtered on read and removed by `purge_expired`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use redb::{Database, DatabaseError, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::KvStore;
use crate::tables::KV;
use crate::types::{epoch_secs, StoredValue};

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Default wait for another process to release the database file.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_RETRY: Duration = Duration::from_millis(10);

#[derive(Clone)]
enum Handle {
    /// Opened per operation.
    File(PathBuf),
    /// Lives as long as the store.
    Memory(Arc<Database>),
}

/// Thread-safe local store backed by redb.
#[derive(Clone)]
pub struct LocalStore {
    handle: Handle,
    lock_timeout: Duration,
}

impl LocalStore {
    /// Open (or create) a persistent store at the given path.
    ///
    /// A file currently held by another process is fine: it exists and its
    /// holder created the tables.
    pub fn open(path: &Path) -> StoreResult<Self> {
        match Database::create(path) {
            Ok(db) => ensure_tables(&db)?,
            Err(DatabaseError::DatabaseAlreadyOpen) => {
                debug!(?path, "database held by another process");
            }
            Err(e) => return Err(StoreError::Open(e.to_string())),
        }
        debug!(?path, "local store opened");
        Ok(Self {
            handle: Handle::File(path.to_path_buf()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        ensure_tables(&db)?;
        debug!("in-memory local store opened");
        Ok(Self {
            handle: Handle::Memory(Arc::new(db)),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// How long an operation waits for the file lock before giving up
    /// with `StoreError::Unreachable`.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Run `op` against the database, opening the file first if needed.
    async fn with_db<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send,
    {
        match &self.handle {
            Handle::Memory(db) => op(db),
            Handle::File(path) => {
                let db = self.acquire(path).await?;
                op(&db)
            }
        }
    }

    async fn acquire(&self, path: &Path) -> StoreResult<Database> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match Database::create(path) {
                Ok(db) => return Ok(db),
                Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(DatabaseError::DatabaseAlreadyOpen) => {
                    return Err(StoreError::Unreachable(format!(
                        "{}: database busy for {:?}",
                        path.display(),
                        self.lock_timeout
                    )));
                }
                Err(e) => return Err(StoreError::Open(e.to_string())),
            }
        }
    }

    /// Drop every expired entry. Returns the number purged.
    pub async fn purge_expired(&self) -> StoreResult<u32> {
        let purged = self.with_db(purge_expired).await?;
        if purged > 0 {
            debug!(count = purged, "purged expired keys");
        }
        Ok(purged)
    }
}

fn ensure_tables(db: &Database) -> StoreResult<()> {
    let txn = db.begin_write().map_err(map_err!(Transaction))?;
    txn.open_table(KV).map_err(map_err!(Table))?;
    txn.commit().map_err(map_err!(Transaction))?;
    Ok(())
}

fn get_live(db: &Database, key: &str) -> StoreResult<Option<StoredValue>> {
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = txn.open_table(KV).map_err(map_err!(Table))?;
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let stored: StoredValue =
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok((!stored.is_expired_at(epoch_secs())).then_some(stored))
        }
        None => Ok(None),
    }
}

fn put(db: &Database, key: &str, stored: &StoredValue) -> StoreResult<()> {
    let value = serde_json::to_vec(stored).map_err(map_err!(Serialize))?;
    let txn = db.begin_write().map_err(map_err!(Transaction))?;
    {
        let mut table = txn.open_table(KV).map_err(map_err!(Table))?;
        table
            .insert(key, value.as_slice())
            .map_err(map_err!(Write))?;
    }
    txn.commit().map_err(map_err!(Transaction))?;
    Ok(())
}

fn remove(db: &Database, key: &str) -> StoreResult<bool> {
    // An expired entry counts as already gone.
    let live = get_live(db, key)?.is_some();
    let txn = db.begin_write().map_err(map_err!(Transaction))?;
    {
        let mut table = txn.open_table(KV).map_err(map_err!(Table))?;
        table.remove(key).map_err(map_err!(Write))?;
    }
    txn.commit().map_err(map_err!(Transaction))?;
    Ok(live)
}

fn scan(db: &Database, prefix: &str) -> StoreResult<Vec<String>> {
    let now = epoch_secs();
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = txn.open_table(KV).map_err(map_err!(Table))?;
    let mut keys = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        if !key.value().starts_with(prefix) {
            continue;
        }
        let stored: StoredValue =
            serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        if !stored.is_expired_at(now) {
            keys.push(key.value().to_string());
        }
    }
    Ok(keys)
}

fn purge_expired(db: &Database) -> StoreResult<u32> {
    let now = epoch_secs();
    // Collect keys in a read transaction first.
    let expired: Vec<String> = {
        let txn = db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(KV).map_err(map_err!(Table))?;
        let mut expired = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let stored: StoredValue =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if stored.is_expired_at(now) {
                expired.push(key.value().to_string());
            }
        }
        expired
    };
    let txn = db.begin_write().map_err(map_err!(Transaction))?;
    {
        let mut table = txn.open_table(KV).map_err(map_err!(Table))?;
        for key in &expired {
            table.remove(key.as_str()).map_err(map_err!(Write))?;
        }
    }
    txn.commit().map_err(map_err!(Transaction))?;
    Ok(expired.len() as u32)
}

impl KvStore for LocalStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let stored = self.with_db(|db| get_live(db, key)).await?;
        Ok(stored.map(|stored| stored.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let stored = StoredValue::new(value, ttl);
        self.with_db(|db| put(db, key, &stored)).await?;
        debug!(%key, ?ttl, "key stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let existed = self.with_db(|db| remove(db, key)).await?;
        debug!(%key, existed, "key deleted");
        Ok(existed)
    }

    async fn find(&self, prefix: &str) -> StoreResult<Option<Vec<String>>> {
        let keys = self.with_db(|db| scan(db, prefix)).await?;
        Ok((!keys.is_empty()).then_some(keys))
    }

    async fn members(&self) -> StoreResult<Vec<String>> {
        // A local database is its own (single) cluster member.
        Ok(vec!["local".to_string()])
    }
}
