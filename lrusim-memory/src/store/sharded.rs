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

use std::sync::atomic::{AtomicUsize, Ordering};

use hashbrown::{hash_map::Entry as HashMapEntry, HashMap};
use itertools::Itertools;
use lrusim_common::key::Key;
use parking_lot::Mutex;
use twox_hash::XxHash64;

use super::{Reference, Store, Sweep};
use crate::{
    error::{Error, Result},
    eviction::{DecayPolicy, SweepStats},
    record::{Decay, Entry, EntrySnapshot},
};

type Shard = Mutex<HashMap<Key, Entry>>;

/// A store split into independently locked hash shards.
///
/// References to keys of different shards never contend. An eviction pass locks one shard at a
/// time, so accessors only wait for the shard currently being swept.
#[derive(Debug)]
pub struct ShardedStore {
    shards: Vec<Shard>,
    len: AtomicUsize,
}

impl ShardedStore {
    /// Create a store with `shards` shards (rounded up to a power of two), pre-sized for
    /// `capacity` entries in total.
    pub fn new(shards: usize, capacity: usize) -> Self {
        let shards = shards.max(1).next_power_of_two();
        let shard_capacity = capacity.div_ceil(shards);
        let shards = (0..shards)
            .map(|_| Mutex::new(HashMap::with_capacity(shard_capacity)))
            .collect_vec();
        Self {
            shards,
            len: AtomicUsize::new(0),
        }
    }

    /// Number of shards.
    pub fn shards(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard(&self, key: Key) -> &Shard {
        let hash = XxHash64::oneshot(0, &key.to_le_bytes());
        &self.shards[hash as usize & (self.shards.len() - 1)]
    }
}

impl Store for ShardedStore {
    fn reference(&self, key: Key) -> Result<Reference> {
        let mut shard = self.shard(key).lock();
        if let Some(entry) = shard.get_mut(&key) {
            entry.touch();
            return Ok(Reference::Hit);
        }
        shard
            .try_reserve(1)
            .map_err(|reason| Error::ResourceExhausted { key, reason })?;
        shard.insert(key, Entry::new());
        self.len.fetch_add(1, Ordering::SeqCst);
        Ok(Reference::Inserted)
    }

    fn remove_if_unused(&self, key: Key, policy: DecayPolicy) -> Sweep {
        let mut shard = self.shard(key).lock();
        let HashMapEntry::Occupied(mut o) = shard.entry(key) else {
            return Sweep::Absent;
        };
        let decay = o.get_mut().decay(policy);
        if decay == Decay::Evict {
            o.remove();
            self.len.fetch_sub(1, Ordering::SeqCst);
        }
        decay.into()
    }

    fn keys(&self) -> Vec<Key> {
        self.shards
            .iter()
            .flat_map(|shard| shard.lock().keys().copied().collect_vec())
            .collect()
    }

    fn sweep(&self, policy: DecayPolicy) -> SweepStats {
        let mut stats = SweepStats::default();
        for shard in self.shards.iter() {
            let mut shard = shard.lock();
            let mut evicted = 0;
            shard.retain(|_, entry| {
                let decay = entry.decay(policy);
                stats.record(decay.into());
                if decay == Decay::Evict {
                    evicted += 1;
                }
                decay == Decay::Keep
            });
            self.len.fetch_sub(evicted, Ordering::SeqCst);
        }
        stats
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.shards
            .iter()
            .flat_map(|shard| {
                shard
                    .lock()
                    .iter()
                    .map(|(key, entry)| entry.snapshot(*key))
                    .collect_vec()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharded_store_rounds_shards() {
        assert_eq!(ShardedStore::new(0, 16).shards(), 1);
        assert_eq!(ShardedStore::new(5, 16).shards(), 8);
        assert_eq!(ShardedStore::new(64, 16).shards(), 64);
    }

    #[test]
    fn test_sharded_store_spreads_keys() {
        let store = ShardedStore::new(4, 1024);
        for key in 0..1024 {
            store.reference(key).unwrap();
        }
        assert_eq!(store.len(), 1024);
        for shard in store.shards.iter() {
            assert!(!shard.lock().is_empty());
        }
    }
}
