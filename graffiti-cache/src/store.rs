//! The `InboxCache` trait and its two backends: `redb` for on-disk
//! persistence (§6 `graffiti-inbox-cache`) and an in-memory map for
//! anonymous or ephemeral sessions.

use crate::error::CacheError;
use crate::key::CacheKey;
use crate::query_state::QueryCacheEntry;
use async_trait::async_trait;
use dashmap::DashMap;
use graffiti_types::label::LabeledMessage;
use lru::LruCache;
use redb::{Database, ReadableTable, TableDefinition};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};

const MESSAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("m");
const QUERIES: TableDefinition<&str, &[u8]> = TableDefinition::new("q");

/// The local cache backing an inbox client: labeled messages by composite
/// key, and per-query cursor state by [`CacheKey`].
#[async_trait]
pub trait InboxCache: Send + Sync {
    /// Looks up a cached labeled message by its composite `enc(url):enc(id)`
    /// key.
    async fn get_message(&self, composite_key: &str) -> Result<Option<LabeledMessage>, CacheError>;

    /// Inserts or overwrites a cached labeled message.
    async fn put_message(
        &self,
        composite_key: &str,
        message: &LabeledMessage,
    ) -> Result<(), CacheError>;

    /// Looks up the persisted cursor state for a query.
    async fn get_query_state(
        &self,
        key: CacheKey,
    ) -> Result<Option<QueryCacheEntry>, CacheError>;

    /// Inserts or overwrites a query's cursor state.
    async fn put_query_state(
        &self,
        key: CacheKey,
        state: &QueryCacheEntry,
    ) -> Result<(), CacheError>;

    /// Discards a query's cursor state (e.g. after `CursorExpired`).
    async fn delete_query_state(&self, key: CacheKey) -> Result<(), CacheError>;
}

/// An on-disk cache backed by `redb`, persisting across process restarts.
#[derive(Clone)]
pub struct RedbInboxCache {
    db: Arc<Database>,
}

impl RedbInboxCache {
    /// Opens (creating if absent) the cache database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let db = Database::create(path).map_err(|e| CacheError::Backend(e.to_string()))?;
        {
            let w = db
                .begin_write()
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            w.open_table(MESSAGES)
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            w.open_table(QUERIES)
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            w.commit().map_err(|e| CacheError::Backend(e.to_string()))?;
        }
        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl InboxCache for RedbInboxCache {
    async fn get_message(
        &self,
        composite_key: &str,
    ) -> Result<Option<LabeledMessage>, CacheError> {
        let db = self.db.clone();
        let key = composite_key.to_string();
        tokio::task::spawn_blocking(move || {
            let r = db.begin_read().map_err(|e| CacheError::Backend(e.to_string()))?;
            let table = r
                .open_table(MESSAGES)
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            match table
                .get(key.as_str())
                .map_err(|e| CacheError::Backend(e.to_string()))?
            {
                Some(bytes) => {
                    let msg = serde_json::from_slice(bytes.value())
                        .map_err(|e| CacheError::Encoding(e.to_string()))?;
                    Ok(Some(msg))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?
    }

    async fn put_message(
        &self,
        composite_key: &str,
        message: &LabeledMessage,
    ) -> Result<(), CacheError> {
        let db = self.db.clone();
        let key = composite_key.to_string();
        let bytes = serde_json::to_vec(message).map_err(|e| CacheError::Encoding(e.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let w = db.begin_write().map_err(|e| CacheError::Backend(e.to_string()))?;
            {
                let mut table = w
                    .open_table(MESSAGES)
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
            }
            w.commit().map_err(|e| CacheError::Backend(e.to_string()))
        })
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?
    }

    async fn get_query_state(&self, key: CacheKey) -> Result<Option<QueryCacheEntry>, CacheError> {
        let db = self.db.clone();
        let hex_key = key.to_hex();
        tokio::task::spawn_blocking(move || {
            let r = db.begin_read().map_err(|e| CacheError::Backend(e.to_string()))?;
            let table = r
                .open_table(QUERIES)
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            match table
                .get(hex_key.as_str())
                .map_err(|e| CacheError::Backend(e.to_string()))?
            {
                Some(bytes) => {
                    let state = serde_json::from_slice(bytes.value())
                        .map_err(|e| CacheError::Encoding(e.to_string()))?;
                    Ok(Some(state))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?
    }

    async fn put_query_state(
        &self,
        key: CacheKey,
        state: &QueryCacheEntry,
    ) -> Result<(), CacheError> {
        let db = self.db.clone();
        let hex_key = key.to_hex();
        let bytes = serde_json::to_vec(state).map_err(|e| CacheError::Encoding(e.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let w = db.begin_write().map_err(|e| CacheError::Backend(e.to_string()))?;
            {
                let mut table = w
                    .open_table(QUERIES)
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
                table
                    .insert(hex_key.as_str(), bytes.as_slice())
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
            }
            w.commit().map_err(|e| CacheError::Backend(e.to_string()))
        })
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?
    }

    async fn delete_query_state(&self, key: CacheKey) -> Result<(), CacheError> {
        let db = self.db.clone();
        let hex_key = key.to_hex();
        tokio::task::spawn_blocking(move || {
            let w = db.begin_write().map_err(|e| CacheError::Backend(e.to_string()))?;
            {
                let mut table = w
                    .open_table(QUERIES)
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
                table
                    .remove(hex_key.as_str())
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
            }
            w.commit().map_err(|e| CacheError::Backend(e.to_string()))
        })
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?
    }
}

/// Bound on the number of labeled messages an [`InMemoryInboxCache`] holds
/// at once; anonymous/ephemeral sessions have no persistence to fall back
/// on, so the cache evicts least-recently-used entries rather than growing
/// without bound.
const MAX_IN_MEMORY_MESSAGES: usize = 10_000;

/// An in-memory cache, used for anonymous reads or when no `cache_dir` is
/// configured (§6 `GraffitiConfig::cache_dir`).
#[derive(Debug)]
pub struct InMemoryInboxCache {
    messages: Mutex<LruCache<String, LabeledMessage>>,
    queries: DashMap<CacheKey, QueryCacheEntry>,
}

impl Default for InMemoryInboxCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryInboxCache {
    /// Builds an empty in-memory cache, bounded to
    /// [`MAX_IN_MEMORY_MESSAGES`] labeled messages.
    pub fn new() -> Self {
        let capacity = NonZeroUsize::new(MAX_IN_MEMORY_MESSAGES).unwrap_or(NonZeroUsize::MIN);
        Self {
            messages: Mutex::new(LruCache::new(capacity)),
            queries: DashMap::new(),
        }
    }
}

#[async_trait]
impl InboxCache for InMemoryInboxCache {
    async fn get_message(
        &self,
        composite_key: &str,
    ) -> Result<Option<LabeledMessage>, CacheError> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| CacheError::Backend("in-memory message cache lock poisoned".into()))?;
        Ok(messages.get(composite_key).cloned())
    }

    async fn put_message(
        &self,
        composite_key: &str,
        message: &LabeledMessage,
    ) -> Result<(), CacheError> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| CacheError::Backend("in-memory message cache lock poisoned".into()))?;
        messages.put(composite_key.to_string(), message.clone());
        Ok(())
    }

    async fn get_query_state(&self, key: CacheKey) -> Result<Option<QueryCacheEntry>, CacheError> {
        Ok(self.queries.get(&key).map(|e| e.value().clone()))
    }

    async fn put_query_state(
        &self,
        key: CacheKey,
        state: &QueryCacheEntry,
    ) -> Result<(), CacheError> {
        self.queries.insert(key, state.clone());
        Ok(())
    }

    async fn delete_query_state(&self, key: CacheKey) -> Result<(), CacheError> {
        self.queries.remove(&key);
        Ok(())
    }
}
