//! Availability cache
//!
//! TTL cache for availability projections, sharded for per-key locking.
//! Each hotel has a version counter; the executor bumps it on relevant
//! transitions, which drops every cached entry computed under the older
//! version. A reader therefore never observes version v after v+1.
//!
//! Entries past TTL are still served but flagged `stale`; confirmation
//! guards bypass the cache entirely.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::RoomType;

const SHARD_COUNT: usize = 16;

/// Cache key: one availability question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub hotel_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub room_type: Option<RoomType>,
}

/// A cached value plus its freshness flag
#[derive(Debug, Clone)]
pub struct Cached<V> {
    pub value: V,
    pub stale: bool,
}

struct Entry<V> {
    value: V,
    version: u64,
    inserted_at: DateTime<Utc>,
}

/// Sharded TTL cache with per-hotel version invalidation
pub struct TtlCache<V> {
    shards: Vec<RwLock<HashMap<CacheKey, Entry<V>>>>,
    versions: RwLock<HashMap<Uuid, Arc<AtomicU64>>>,
    ttl: chrono::Duration,
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    pub fn new(ttl_secs: u64) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect();
        Self {
            shards,
            versions: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::seconds(ttl_secs as i64),
        }
    }

    fn shard_for(&self, key: &CacheKey) -> &RwLock<HashMap<CacheKey, Entry<V>>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    async fn version_counter(&self, hotel_id: Uuid) -> Arc<AtomicU64> {
        {
            let versions = self.versions.read().await;
            if let Some(counter) = versions.get(&hotel_id) {
                return Arc::clone(counter);
            }
        }
        let mut versions = self.versions.write().await;
        Arc::clone(versions.entry(hotel_id).or_default())
    }

    /// Current invalidation version for a hotel.
    pub async fn hotel_version(&self, hotel_id: Uuid) -> u64 {
        self.version_counter(hotel_id).await.load(Ordering::Acquire)
    }

    /// Look up a cached value. Entries written under an older hotel version
    /// are treated as absent; entries past TTL are returned with
    /// `stale: true`.
    pub async fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Cached<V>> {
        let version = self.hotel_version(key.hotel_id).await;
        let shard = self.shard_for(key).read().await;
        let entry = shard.get(key)?;
        if entry.version < version {
            return None;
        }
        Some(Cached {
            value: entry.value.clone(),
            stale: now - entry.inserted_at > self.ttl,
        })
    }

    pub async fn put(&self, key: CacheKey, value: V, now: DateTime<Utc>) {
        let version = self.hotel_version(key.hotel_id).await;
        let mut shard = self.shard_for(&key).write().await;
        shard.insert(
            key,
            Entry {
                value,
                version,
                inserted_at: now,
            },
        );
    }

    /// Drop every cached projection for a hotel by bumping its version.
    pub async fn invalidate_hotel(&self, hotel_id: Uuid) {
        let counter = self.version_counter(hotel_id).await;
        let version = counter.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(hotel_id = %hotel_id, version, "Availability cache invalidated");
    }
}
