// Copyright 2026 lrusim Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    fmt::Debug,
    sync::{atomic::Ordering, Arc},
};

use lrusim_common::{
    key::{in_domain, Key, DEFAULT_LOW_WATER_MARK, DEFAULT_MAX_KEY},
    metrics::{Metrics, MetricsSnapshot},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    eviction::{CleanOutcome, DecayPolicy, EvictionPass},
    gate::{GateOutcome, WatermarkGate},
    snapshot::Snapshot,
    store::{AtomicStore, MutexStore, Reference, ShardedStore, Store},
};

/// Largest key domain accepted by [`StoreConfig::Atomic`], which allocates one word per key.
pub const ATOMIC_STORE_MAX_KEY: Key = 1 << 24;

/// Largest shard count accepted by [`StoreConfig::Sharded`].
pub const MAX_SHARDS: usize = 1 << 16;

/// Locking strategy of the entry store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreConfig {
    /// A single mutex around the whole store.
    Mutex,
    /// Independently locked hash shards.
    ///
    /// `None` picks `4 * expected_concurrency` rounded up to a power of two, capped by the key
    /// domain and [`MAX_SHARDS`].
    Sharded {
        /// Shard count.
        shards: Option<usize>,
    },
    /// One atomic word per key, no locks.
    Atomic,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sharded { shards: None }
    }
}

/// Configuration of a [`Cache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Number of threads expected to access the cache concurrently.
    pub expected_concurrency: usize,
    /// Exclusive upper bound of the key domain.
    pub max_key: Key,
    /// A blocking clean waits until the cache holds more entries than this.
    pub low_water_mark: usize,
    /// Decay rule applied by eviction passes.
    pub decay_policy: DecayPolicy,
    /// Locking strategy of the entry store.
    pub store: StoreConfig,
}

/// Builder of a [`Cache`].
///
/// `CacheBuilder::new(n).build()` is the one-time initialization of the cache; it must complete
/// before any thread accesses the cache.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    config: CacheConfig,
}

impl CacheBuilder {
    /// Start building a cache sized for `expected_concurrency` accessor threads.
    pub fn new(expected_concurrency: usize) -> Self {
        Self {
            config: CacheConfig {
                expected_concurrency: expected_concurrency.max(1),
                max_key: DEFAULT_MAX_KEY,
                low_water_mark: DEFAULT_LOW_WATER_MARK,
                decay_policy: DecayPolicy::default(),
                store: StoreConfig::default(),
            },
        }
    }

    /// Set the key domain to `[0, max_key)`.
    ///
    /// The default value is [`DEFAULT_MAX_KEY`].
    pub fn with_max_key(mut self, max_key: Key) -> Self {
        self.config.max_key = max_key;
        self
    }

    /// Set the low water mark gating blocking eviction passes.
    ///
    /// The default value is [`DEFAULT_LOW_WATER_MARK`].
    pub fn with_low_water_mark(mut self, low_water_mark: usize) -> Self {
        self.config.low_water_mark = low_water_mark;
        self
    }

    /// Set the decay rule of eviction passes.
    ///
    /// The default value is [`DecayPolicy::Reset`].
    pub fn with_decay_policy(mut self, decay_policy: DecayPolicy) -> Self {
        self.config.decay_policy = decay_policy;
        self
    }

    /// Set the locking strategy of the entry store.
    pub fn with_store_config(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    fn verify(&self) -> Result<()> {
        let config = &self.config;
        if config.max_key == 0 {
            return Err(Error::ConfigError("max key must be greater than 0".to_string()));
        }
        if config.low_water_mark as u128 >= config.max_key as u128 {
            return Err(Error::ConfigError(format!(
                "low water mark ({}) must be less than max key ({}), or blocking cleans never proceed",
                config.low_water_mark, config.max_key
            )));
        }
        match config.store {
            StoreConfig::Sharded { shards: Some(0) } => {
                return Err(Error::ConfigError("shard count must be greater than 0".to_string()))
            }
            StoreConfig::Sharded { shards: Some(shards) } if shards > MAX_SHARDS => {
                return Err(Error::ConfigError(format!("shard count ({shards}) exceeds the limit ({MAX_SHARDS})")))
            }
            StoreConfig::Atomic if config.max_key > ATOMIC_STORE_MAX_KEY => {
                return Err(Error::ConfigError(format!(
                    "max key ({}) exceeds the atomic store limit ({ATOMIC_STORE_MAX_KEY})",
                    config.max_key
                )))
            }
            _ => {}
        }
        Ok(())
    }

    /// Build the cache with the given configuration.
    pub fn build(self) -> Result<Cache> {
        self.verify()?;

        let config = self.config;
        let domain = usize::try_from(config.max_key).unwrap_or(usize::MAX);
        let capacity = domain.min(1 << 20);

        let cache = match config.store {
            StoreConfig::Mutex => Cache::Mutex(RawCache::new(MutexStore::new(capacity), config)),
            StoreConfig::Sharded { shards } => {
                let shards = shards.unwrap_or_else(|| {
                    config
                        .expected_concurrency
                        .saturating_mul(4)
                        .min(domain)
                        .min(MAX_SHARDS)
                });
                Cache::Sharded(RawCache::new(ShardedStore::new(shards, capacity), config))
            }
            StoreConfig::Atomic => Cache::Atomic(RawCache::new(AtomicStore::new(config.max_key), config)),
        };
        tracing::debug!(config = ?cache.config(), "[cache]: initialized");
        Ok(cache)
    }
}

struct RawCacheInner<S>
where
    S: Store,
{
    store: S,
    gate: WatermarkGate,
    eviction: EvictionPass,

    config: CacheConfig,
    metrics: Arc<Metrics>,
}

/// The cache core, generic over its entry store.
///
/// Cloning is cheap and every clone shares the same entries.
pub struct RawCache<S>
where
    S: Store,
{
    inner: Arc<RawCacheInner<S>>,
}

impl<S> Clone for RawCache<S>
where
    S: Store,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> Debug for RawCache<S>
where
    S: Store,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCache")
            .field("config", &self.inner.config)
            .field("len", &self.inner.store.len())
            .finish()
    }
}

impl<S> RawCache<S>
where
    S: Store,
{
    /// Wrap `store` into a cache core.
    pub fn new(store: S, config: CacheConfig) -> Self {
        let metrics = Arc::new(Metrics::default());
        let inner = RawCacheInner {
            store,
            gate: WatermarkGate::new(config.low_water_mark, metrics.clone()),
            eviction: EvictionPass::new(config.decay_policy),
            config,
            metrics,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Reference `key`: bump its entry, or insert it with a single reference.
    ///
    /// Never blocks beyond the store's own critical section. An error is fatal for the caller.
    pub fn reference(&self, key: Key) -> Result<Reference> {
        if !in_domain(key, self.inner.config.max_key) {
            return Err(Error::KeyOutOfRange {
                key,
                max_key: self.inner.config.max_key,
            });
        }
        let reference = self.inner.store.reference(key)?;
        if reference == Reference::Inserted {
            self.inner.gate.notify_size_changed();
        }
        Ok(reference)
    }

    /// Run one eviction pass.
    ///
    /// With `block`, first wait until the cache holds more entries than the low water mark; if
    /// the cache is shut down meanwhile (or already), return [`CleanOutcome::Aborted`] without
    /// sweeping.
    pub fn clean(&self, block: bool) -> CleanOutcome {
        let inner = &self.inner;
        if block && inner.gate.wait_until_above_watermark(|| inner.store.len()) == GateOutcome::Shutdown {
            inner.metrics.clean_abort.fetch_add(1, Ordering::Relaxed);
            return CleanOutcome::Aborted;
        }

        let stats = inner.eviction.run(&inner.store);
        inner.metrics.clean_pass.fetch_add(1, Ordering::Relaxed);
        inner.metrics.evict.fetch_add(stats.evicted as u64, Ordering::Relaxed);
        inner.metrics.decay.fetch_add(stats.decayed as u64, Ordering::Relaxed);
        CleanOutcome::Swept(stats)
    }

    /// Release every thread parked in a blocking clean, now and in the future.
    ///
    /// Entries are left untouched. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.gate.release_all() {
            tracing::debug!(len = self.inner.store.len(), "[cache]: shutdown");
        }
    }

    /// Returns `true` once [`RawCache::shutdown`] has been called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.gate.is_released()
    }

    /// List the resident entries.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from(self.inner.store.snapshot())
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Returns `true` if no entry is resident.
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// The configuration the cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Counters of eviction passes and gate waits.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.dump()
    }

    /// The underlying entry store.
    pub fn store(&self) -> &S {
        &self.inner.store
    }
}

/// Cache core backed by a [`MutexStore`].
pub type MutexCache = RawCache<MutexStore>;
/// Cache core backed by a [`ShardedStore`].
pub type ShardedCache = RawCache<ShardedStore>;
/// Cache core backed by an [`AtomicStore`].
pub type AtomicCache = RawCache<AtomicStore>;

/// The approximate LRU cache, over any of the supported entry stores.
#[derive(Clone)]
pub enum Cache {
    /// Single-lock store.
    Mutex(MutexCache),
    /// Sharded store.
    Sharded(ShardedCache),
    /// Lock-free store.
    Atomic(AtomicCache),
}

impl Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mutex(_) => f.debug_tuple("Cache::MutexCache").finish(),
            Self::Sharded(_) => f.debug_tuple("Cache::ShardedCache").finish(),
            Self::Atomic(_) => f.debug_tuple("Cache::AtomicCache").finish(),
        }
    }
}

impl From<MutexCache> for Cache {
    fn from(cache: MutexCache) -> Self {
        Self::Mutex(cache)
    }
}

impl From<ShardedCache> for Cache {
    fn from(cache: ShardedCache) -> Self {
        Self::Sharded(cache)
    }
}

impl From<AtomicCache> for Cache {
    fn from(cache: AtomicCache) -> Self {
        Self::Atomic(cache)
    }
}

impl Cache {
    /// Reference `key`. See [`RawCache::reference`].
    pub fn reference(&self, key: Key) -> Result<Reference> {
        match self {
            Cache::Mutex(cache) => cache.reference(key),
            Cache::Sharded(cache) => cache.reference(key),
            Cache::Atomic(cache) => cache.reference(key),
        }
    }

    /// Run one eviction pass. See [`RawCache::clean`].
    pub fn clean(&self, block: bool) -> CleanOutcome {
        match self {
            Cache::Mutex(cache) => cache.clean(block),
            Cache::Sharded(cache) => cache.clean(block),
            Cache::Atomic(cache) => cache.clean(block),
        }
    }

    /// Release blocked cleaners for good. See [`RawCache::shutdown`].
    pub fn shutdown(&self) {
        match self {
            Cache::Mutex(cache) => cache.shutdown(),
            Cache::Sharded(cache) => cache.shutdown(),
            Cache::Atomic(cache) => cache.shutdown(),
        }
    }

    /// Returns `true` once [`Cache::shutdown`] has been called.
    pub fn is_shutdown(&self) -> bool {
        match self {
            Cache::Mutex(cache) => cache.is_shutdown(),
            Cache::Sharded(cache) => cache.is_shutdown(),
            Cache::Atomic(cache) => cache.is_shutdown(),
        }
    }

    /// List the resident entries.
    pub fn snapshot(&self) -> Snapshot {
        match self {
            Cache::Mutex(cache) => cache.snapshot(),
            Cache::Sharded(cache) => cache.snapshot(),
            Cache::Atomic(cache) => cache.snapshot(),
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        match self {
            Cache::Mutex(cache) => cache.len(),
            Cache::Sharded(cache) => cache.len(),
            Cache::Atomic(cache) => cache.len(),
        }
    }

    /// Returns `true` if no entry is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configuration the cache was built with.
    pub fn config(&self) -> &CacheConfig {
        match self {
            Cache::Mutex(cache) => cache.config(),
            Cache::Sharded(cache) => cache.config(),
            Cache::Atomic(cache) => cache.config(),
        }
    }

    /// Counters of eviction passes and gate waits.
    pub fn metrics(&self) -> MetricsSnapshot {
        match self {
            Cache::Mutex(cache) => cache.metrics(),
            Cache::Sharded(cache) => cache.metrics(),
            Cache::Atomic(cache) => cache.metrics(),
        }
    }
}
