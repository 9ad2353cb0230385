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

//! Entry stores: the key to entry mapping and its locking strategy.
//!
//! Every store guarantees key uniqueness and makes each entry transition (insert, bump, decay,
//! remove) atomic with respect to any other operation on the same key. They differ only in how
//! much of the store a single operation excludes:
//!
//! - [`MutexStore`]: everything, behind one lock.
//! - [`ShardedStore`]: one hash shard.
//! - [`AtomicStore`]: one atomic word, no locks at all.

use lrusim_common::key::Key;

use crate::{
    error::Result,
    eviction::{DecayPolicy, SweepStats},
    record::{Decay, EntrySnapshot},
};

/// Outcome of [`Store::reference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// The key was absent and a new entry was created.
    Inserted,
    /// The key was resident and its entry was bumped.
    Hit,
}

/// Per-entry outcome of an eviction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// The entry had no references left and was removed.
    Evicted,
    /// The entry was kept and its reference count decayed.
    Decayed,
    /// The key was not resident.
    Absent,
}

impl From<Decay> for Sweep {
    fn from(decay: Decay) -> Self {
        match decay {
            Decay::Evict => Sweep::Evicted,
            Decay::Keep => Sweep::Decayed,
        }
    }
}

/// A concurrent key to entry mapping.
pub trait Store: Send + Sync + 'static {
    /// Bump the entry of `key`, inserting it with a single reference if absent.
    ///
    /// Must not scan the store.
    fn reference(&self, key: Key) -> Result<Reference>;

    /// Apply one decay step to the entry of `key`, removing it if `policy` finds it unused.
    fn remove_if_unused(&self, key: Key, policy: DecayPolicy) -> Sweep;

    /// Keys resident at the time of the call.
    fn keys(&self) -> Vec<Key>;

    /// Apply [`Store::remove_if_unused`] to every resident entry once.
    ///
    /// Entries inserted while the sweep is running may or may not be visited.
    fn sweep(&self, policy: DecayPolicy) -> SweepStats {
        let mut stats = SweepStats::default();
        for key in self.keys() {
            stats.record(self.remove_if_unused(key, policy));
        }
        stats
    }

    /// Number of live entries.
    ///
    /// Readable without taking any store lock, and sequentially consistent with respect to the
    /// insertions that change it.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no entry.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List the resident entries, in no particular order.
    fn snapshot(&self) -> Vec<EntrySnapshot>;
}

mod atomic;
mod mutex;
mod sharded;

pub use atomic::AtomicStore;
pub use mutex::MutexStore;
pub use sharded::ShardedStore;

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{Arc, Barrier},
        thread,
    };

    use itertools::Itertools;

    use super::*;

    const MAX_KEY: Key = 256;

    fn stores() -> Vec<(&'static str, Arc<dyn Store>)> {
        vec![
            ("mutex", Arc::new(MutexStore::new(MAX_KEY as usize))),
            ("sharded", Arc::new(ShardedStore::new(8, MAX_KEY as usize))),
            ("atomic", Arc::new(AtomicStore::new(MAX_KEY))),
        ]
    }

    fn refs_of(store: &dyn Store, key: Key) -> Option<u64> {
        store.snapshot().into_iter().find(|e| e.key == key).map(|e| e.refs)
    }

    #[test]
    fn test_store_reference() {
        for (name, store) in stores() {
            assert_eq!(store.reference(7).unwrap(), Reference::Inserted, "{name}");
            assert_eq!(store.reference(7).unwrap(), Reference::Hit, "{name}");
            assert_eq!(store.reference(8).unwrap(), Reference::Inserted, "{name}");
            assert_eq!(store.len(), 2, "{name}");
            assert_eq!(refs_of(store.as_ref(), 7), Some(2), "{name}");
            assert_eq!(refs_of(store.as_ref(), 8), Some(1), "{name}");
            assert_eq!(store.keys().into_iter().sorted().collect_vec(), vec![7, 8], "{name}");
        }
    }

    #[test]
    fn test_store_remove_if_unused() {
        for (name, store) in stores() {
            store.reference(3).unwrap();
            store.reference(3).unwrap();

            assert_eq!(store.remove_if_unused(3, DecayPolicy::Reset), Sweep::Decayed, "{name}");
            assert_eq!(refs_of(store.as_ref(), 3), Some(0), "{name}");
            assert_eq!(store.len(), 1, "{name}");

            assert_eq!(store.remove_if_unused(3, DecayPolicy::Reset), Sweep::Evicted, "{name}");
            assert_eq!(refs_of(store.as_ref(), 3), None, "{name}");
            assert!(store.is_empty(), "{name}");

            assert_eq!(store.remove_if_unused(3, DecayPolicy::Reset), Sweep::Absent, "{name}");

            // An evicted key comes back fresh.
            assert_eq!(store.reference(3).unwrap(), Reference::Inserted, "{name}");
            assert_eq!(refs_of(store.as_ref(), 3), Some(1), "{name}");
        }
    }

    #[test]
    fn test_store_sweep_decrement() {
        for (name, store) in stores() {
            for _ in 0..3 {
                store.reference(1).unwrap();
            }
            store.reference(2).unwrap();

            let stats = store.sweep(DecayPolicy::Decrement);
            assert_eq!(
                stats,
                SweepStats {
                    visited: 2,
                    evicted: 1,
                    decayed: 1
                },
                "{name}"
            );
            assert_eq!(refs_of(store.as_ref(), 1), Some(2), "{name}");
            assert_eq!(refs_of(store.as_ref(), 2), None, "{name}");

            let stats = store.sweep(DecayPolicy::Decrement);
            assert_eq!((stats.evicted, stats.decayed), (0, 1), "{name}");
            assert_eq!(store.keys(), vec![1], "{name}");

            let stats = store.sweep(DecayPolicy::Decrement);
            assert_eq!((stats.evicted, stats.decayed), (1, 0), "{name}");
            assert!(store.is_empty(), "{name}");
        }
    }

    #[test]
    fn test_store_concurrent_insert_race() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 1000;

        for (name, store) in stores() {
            let handles = (0..THREADS)
                .map(|_| {
                    let store = store.clone();
                    thread::spawn(move || {
                        let mut inserted = 0;
                        for _ in 0..ROUNDS {
                            if store.reference(42).unwrap() == Reference::Inserted {
                                inserted += 1;
                            }
                        }
                        inserted
                    })
                })
                .collect_vec();
            let inserted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

            assert_eq!(inserted, 1, "{name}");
            assert_eq!(store.len(), 1, "{name}");
            assert_eq!(refs_of(store.as_ref(), 42), Some((THREADS * ROUNDS) as u64), "{name}");
        }
    }

    #[test]
    fn test_store_uniqueness_under_sweeps() {
        const THREADS: u64 = 4;

        for (name, store) in stores() {
            let accessors = (0..THREADS)
                .map(|t| {
                    let store = store.clone();
                    thread::spawn(move || {
                        for i in 0..20_000u64 {
                            store.reference((i * 7 + t) % 16).unwrap();
                        }
                    })
                })
                .collect_vec();
            let cleaner = {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        store.sweep(DecayPolicy::Reset);
                        let keys = store.keys();
                        let unique: HashSet<_> = keys.iter().copied().collect();
                        assert_eq!(keys.len(), unique.len());
                    }
                })
            };
            accessors.into_iter().for_each(|h| h.join().unwrap());
            cleaner.join().unwrap();

            let snapshot = store.snapshot();
            assert_eq!(snapshot.len(), store.len(), "{name}");
            assert!(snapshot.iter().map(|e| e.key).all_unique(), "{name}");
        }
    }

    #[test]
    fn test_store_reference_races_removal() {
        const KEY: Key = 11;
        const ROUNDS: usize = 2000;

        for (name, store) in stores() {
            // Start every round from a resident entry with a zero count, so the removal evicts it
            // unless the racing reference lands first.
            assert_eq!(store.reference(KEY).unwrap(), Reference::Inserted, "{name}");
            assert_eq!(store.remove_if_unused(KEY, DecayPolicy::Reset), Sweep::Decayed, "{name}");
            let mut inserted = 1usize;
            let mut evicted = 0usize;

            let barrier = Arc::new(Barrier::new(3));
            let referencer = {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    (0..ROUNDS)
                        .map(|_| {
                            barrier.wait();
                            let reference = store.reference(KEY).unwrap();
                            barrier.wait();
                            reference
                        })
                        .collect_vec()
                })
            };
            let remover = {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    (0..ROUNDS)
                        .map(|_| {
                            barrier.wait();
                            let sweep = store.remove_if_unused(KEY, DecayPolicy::Reset);
                            barrier.wait();
                            sweep
                        })
                        .collect_vec()
                })
            };

            let mut after = Vec::with_capacity(ROUNDS);
            for _ in 0..ROUNDS {
                barrier.wait();
                barrier.wait();
                let refs = refs_of(store.as_ref(), KEY);
                after.push(refs);
                // Decay a fresh insert back to a zero count for the next round.
                if refs == Some(1) {
                    assert_eq!(store.remove_if_unused(KEY, DecayPolicy::Reset), Sweep::Decayed, "{name}");
                }
            }
            let references = referencer.join().unwrap();
            let sweeps = remover.join().unwrap();

            let rounds = references.iter().zip_eq(sweeps.iter()).zip_eq(after.iter());
            for (round, ((reference, sweep), refs)) in rounds.enumerate() {
                match (reference, sweep) {
                    // The reference bumped the entry before the removal decayed it.
                    (Reference::Hit, Sweep::Decayed) => assert_eq!(*refs, Some(0), "{name} round {round}"),
                    // The removal evicted the entry and the reference inserted it again.
                    (Reference::Inserted, Sweep::Evicted) => assert_eq!(*refs, Some(1), "{name} round {round}"),
                    outcome => panic!("{name} round {round}: reference lost, outcome: {outcome:?}, refs: {refs:?}"),
                }
                if *reference == Reference::Inserted {
                    inserted += 1;
                }
                if *sweep == Sweep::Evicted {
                    evicted += 1;
                }
            }

            assert_eq!(inserted - evicted, store.len(), "{name}");
            assert_eq!(store.len(), 1, "{name}");
            assert_eq!(refs_of(store.as_ref(), KEY), Some(0), "{name}");
        }
    }
}
