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

use std::sync::atomic::{AtomicIsize, AtomicU64, Ordering};

use itertools::Itertools;
use lrusim_common::key::Key;

use super::{Reference, Store, Sweep};
use crate::{
    error::{Error, Result},
    eviction::DecayPolicy,
    record::{Decay, Entry, EntrySnapshot, VACANT},
};

/// A lock-free store with one atomic slot per key of the domain.
///
/// Each slot holds a packed [`Entry`] (see [`Entry::pack`]) or [`VACANT`]. Every transition is a
/// single compare-and-swap on the slot, so a reference racing with a removal of the same key
/// either bumps the entry before it is removed or re-inserts it afterwards.
#[derive(Debug)]
pub struct AtomicStore {
    slots: Box<[AtomicU64]>,
    /// An insert and a removal of the same key may publish their count updates out of order,
    /// so the counter is signed and clamped on read.
    len: AtomicIsize,
}

impl AtomicStore {
    /// Create a store covering keys `[0, max_key)`.
    pub fn new(max_key: Key) -> Self {
        let slots = (0..max_key).map(|_| AtomicU64::new(VACANT)).collect_vec();
        Self {
            slots: slots.into_boxed_slice(),
            len: AtomicIsize::new(0),
        }
    }

    #[inline]
    fn slot(&self, key: Key) -> Option<&AtomicU64> {
        usize::try_from(key).ok().and_then(|index| self.slots.get(index))
    }
}

impl Store for AtomicStore {
    fn reference(&self, key: Key) -> Result<Reference> {
        let slot = self.slot(key).ok_or(Error::KeyOutOfRange {
            key,
            max_key: self.slots.len() as Key,
        })?;
        let prev = slot
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let entry = match Entry::unpack(bits) {
                    Some(mut entry) => {
                        entry.touch();
                        entry
                    }
                    None => Entry::new(),
                };
                Some(entry.pack())
            })
            .unwrap_or_else(|bits| bits);

        if prev == VACANT {
            self.len.fetch_add(1, Ordering::SeqCst);
            Ok(Reference::Inserted)
        } else {
            Ok(Reference::Hit)
        }
    }

    fn remove_if_unused(&self, key: Key, policy: DecayPolicy) -> Sweep {
        let Some(slot) = self.slot(key) else {
            return Sweep::Absent;
        };
        let mut sweep = Sweep::Absent;
        let _ = slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            sweep = Sweep::Absent;
            let mut entry = Entry::unpack(bits)?;
            let decay = entry.decay(policy);
            sweep = decay.into();
            match decay {
                Decay::Evict => Some(VACANT),
                Decay::Keep => Some(entry.pack()),
            }
        });
        if sweep == Sweep::Evicted {
            self.len.fetch_sub(1, Ordering::SeqCst);
        }
        sweep
    }

    fn keys(&self) -> Vec<Key> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.load(Ordering::Acquire) != VACANT)
            .map(|(index, _)| index as Key)
            .collect()
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst).max(0) as usize
    }

    fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| Entry::unpack(slot.load(Ordering::Acquire)).map(|e| e.snapshot(index as Key)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_store_out_of_range() {
        let store = AtomicStore::new(4);
        assert!(matches!(
            store.reference(4),
            Err(Error::KeyOutOfRange { key: 4, max_key: 4 })
        ));
        assert_eq!(store.remove_if_unused(4, DecayPolicy::Reset), Sweep::Absent);
        assert!(store.is_empty());
    }
}
