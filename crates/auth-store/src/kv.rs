//! Key/value backend seam
//!
//! The stores need five primitives: get, set, set-with-ttl, conditional
//! insert (NX, optionally with ttl), and delete. Redis provides all of them
//! as single atomic commands — document-level atomicity is all the gateway
//! requires, so there are no transactions here.
//!
//! The memory backend exists for tests and local development. It mirrors
//! Redis semantics: NX is atomic under the map lock, and expired entries are
//! dropped lazily on access, the same passive-expiry model Redis uses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Backend-agnostic handle the stores clone freely.
#[derive(Clone)]
pub enum Kv {
    Redis(redis::aio::ConnectionManager),
    Memory(MemoryKv),
}

impl Kv {
    /// Connect to Redis and return a managed (auto-reconnecting) handle.
    pub async fn connect_redis(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Backend(format!("invalid redis url: {e}")))?;
        let manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Backend(format!("redis connect failed: {e}")))?;
        debug!(url, "connected to redis");
        Ok(Kv::Redis(manager))
    }

    /// In-process backend with the same observable semantics.
    pub fn memory() -> Self {
        Kv::Memory(MemoryKv::default())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            Kv::Redis(manager) => {
                let mut conn = manager.clone();
                let value: Option<String> = redis::cmd("GET")
                    .arg(key)
                    .query_async(&mut conn)
                    .await?;
                Ok(value)
            }
            Kv::Memory(mem) => Ok(mem.get(key)),
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        match self {
            Kv::Redis(manager) => {
                let mut conn = manager.clone();
                let _: () = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query_async(&mut conn)
                    .await?;
                Ok(())
            }
            Kv::Memory(mem) => {
                mem.insert(key, value, None);
                Ok(())
            }
        }
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        match self {
            Kv::Redis(manager) => {
                let mut conn = manager.clone();
                let _: () = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("EX")
                    .arg(ttl.as_secs().max(1))
                    .query_async(&mut conn)
                    .await?;
                Ok(())
            }
            Kv::Memory(mem) => {
                mem.insert(key, value, Some(ttl));
                Ok(())
            }
        }
    }

    /// Insert only if absent. Returns `true` when this call created the key —
    /// the atomicity of this primitive is what rejects racing duplicates.
    pub async fn set_nx_ex(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        match self {
            Kv::Redis(manager) => {
                let mut conn = manager.clone();
                let mut cmd = redis::cmd("SET");
                cmd.arg(key).arg(value).arg("NX");
                if let Some(ttl) = ttl {
                    cmd.arg("EX").arg(ttl.as_secs().max(1));
                }
                // SET ... NX replies OK on insert, nil when the key exists
                let reply: Option<String> = cmd.query_async(&mut conn).await?;
                Ok(reply.is_some())
            }
            Kv::Memory(mem) => Ok(mem.insert_nx(key, value, ttl)),
        }
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        match self {
            Kv::Redis(manager) => {
                let mut conn = manager.clone();
                let _: () = redis::cmd("DEL")
                    .arg(key)
                    .query_async(&mut conn)
                    .await?;
                Ok(())
            }
            Kv::Memory(mem) => {
                mem.remove(key);
                Ok(())
            }
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self {
            Kv::Redis(manager) => {
                let mut conn = manager.clone();
                let n: i64 = redis::cmd("EXISTS")
                    .arg(key)
                    .query_async(&mut conn)
                    .await?;
                Ok(n > 0)
            }
            Kv::Memory(mem) => Ok(mem.get(key).is_some()),
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Shared in-process map with lazy TTL expiry.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn insert(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let mut entries = self.entries.lock();
        entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
    }

    fn insert_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        let mut entries = self.entries.lock();
        let live = entries.get(key).is_some_and(|e| !e.expired());
        if live {
            return false;
        }
        entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        true
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
