//! The in-process named-lock fallback (§5 "Shared-resource policy", §9
//! open questions): native targets have no platform named-lock primitive,
//! so a process-wide map of per-key mutexes stands in for one.

use crate::key::CacheKey;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Hands out one advisory lock per [`CacheKey`], so concurrent readers of
/// the same query serialize on a single server-cursor advance while readers
/// of different queries never contend.
#[derive(Debug, Default)]
pub struct QueryLockTable {
    locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl QueryLockTable {
    /// Builds an empty lock table.
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquires the advisory lock for `key`, creating it on first use.
    pub async fn lock(&self, key: CacheKey) -> OwnedQueryLock {
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        OwnedQueryLock {
            _guard: mutex.lock_owned().await,
        }
    }
}

/// An acquired advisory lock; the lock is released when this value is
/// dropped.
pub struct OwnedQueryLock {
    _guard: tokio::sync::OwnedMutexGuard<()>,
}
