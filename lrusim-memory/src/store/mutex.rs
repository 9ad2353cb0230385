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
use lrusim_common::key::Key;
use parking_lot::Mutex;

use super::{Reference, Store, Sweep};
use crate::{
    error::{Error, Result},
    eviction::{DecayPolicy, SweepStats},
    record::{Decay, Entry, EntrySnapshot},
};

/// A store guarded by a single mutex.
///
/// Every operation, including a whole eviction pass, serializes on the same lock.
#[derive(Debug, Default)]
pub struct MutexStore {
    entries: Mutex<HashMap<Key, Entry>>,
    len: AtomicUsize,
}

impl MutexStore {
    /// Create a store pre-sized for `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity)),
            len: AtomicUsize::new(0),
        }
    }
}

impl Store for MutexStore {
    fn reference(&self, key: Key) -> Result<Reference> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&key) {
            entry.touch();
            return Ok(Reference::Hit);
        }
        entries
            .try_reserve(1)
            .map_err(|reason| Error::ResourceExhausted { key, reason })?;
        entries.insert(key, Entry::new());
        self.len.store(entries.len(), Ordering::SeqCst);
        Ok(Reference::Inserted)
    }

    fn remove_if_unused(&self, key: Key, policy: DecayPolicy) -> Sweep {
        let mut entries = self.entries.lock();
        let HashMapEntry::Occupied(mut o) = entries.entry(key) else {
            return Sweep::Absent;
        };
        let decay = o.get_mut().decay(policy);
        if decay == Decay::Evict {
            o.remove();
            self.len.store(entries.len(), Ordering::SeqCst);
        }
        decay.into()
    }

    fn keys(&self) -> Vec<Key> {
        self.entries.lock().keys().copied().collect()
    }

    fn sweep(&self, policy: DecayPolicy) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| {
            let decay = entry.decay(policy);
            stats.record(decay.into());
            decay == Decay::Keep
        });
        self.len.store(entries.len(), Ordering::SeqCst);
        stats
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.entries
            .lock()
            .iter()
            .map(|(key, entry)| entry.snapshot(*key))
            .collect()
    }
}
