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

use lrusim_common::key::Key;
use serde::{Deserialize, Serialize};

use crate::eviction::DecayPolicy;

const PRESENT: u64 = 1 << 63;
const RECENT: u64 = 1 << 62;

/// Largest reference count an entry can hold. Further references saturate.
pub const MAX_REFS: u64 = RECENT - 1;

/// Packed representation of an absent key.
pub const VACANT: u64 = 0;

/// The state kept for every resident key.
///
/// An entry is created by the first reference to its key, bumped by every further reference,
/// and decayed or removed by eviction passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    refs: u64,
    recent: bool,
}

/// What an eviction pass decided for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decay {
    /// The entry had no references since the last pass and must be removed.
    Evict,
    /// The entry survives this pass with its reference count decayed.
    Keep,
}

impl Default for Entry {
    fn default() -> Self {
        Self::new()
    }
}

impl Entry {
    /// A freshly inserted entry, referenced once.
    pub fn new() -> Self {
        Self { refs: 1, recent: true }
    }

    /// Reference count, as left by the last eviction pass plus references since.
    pub fn refs(&self) -> u64 {
        self.refs
    }

    /// Whether the entry was referenced since the last eviction pass.
    pub fn is_recent(&self) -> bool {
        self.recent
    }

    /// Record one more reference.
    #[inline]
    pub fn touch(&mut self) {
        self.refs = (self.refs + 1).min(MAX_REFS);
        self.recent = true;
    }

    /// Apply one eviction pass to the entry.
    ///
    /// An entry with a zero reference count is always evicted. Otherwise its count is decayed
    /// according to `policy` and the recently-used mark is cleared.
    #[inline]
    pub fn decay(&mut self, policy: DecayPolicy) -> Decay {
        let refs = match policy {
            DecayPolicy::Reset if self.refs > 0 => 0,
            DecayPolicy::Decrement if self.refs > 1 => self.refs - 1,
            _ => return Decay::Evict,
        };
        self.refs = refs;
        self.recent = false;
        Decay::Keep
    }

    /// Encode the entry into a single word: a present bit, a recent bit and 62 bits of count.
    #[inline]
    pub fn pack(&self) -> u64 {
        let recent = if self.recent { RECENT } else { 0 };
        PRESENT | recent | self.refs.min(MAX_REFS)
    }

    /// Decode a word produced by [`Entry::pack`]. Returns `None` for [`VACANT`].
    #[inline]
    pub fn unpack(bits: u64) -> Option<Self> {
        if bits & PRESENT == 0 {
            return None;
        }
        Some(Self {
            refs: bits & MAX_REFS,
            recent: bits & RECENT != 0,
        })
    }

    /// Describe the entry as resident under `key`.
    pub fn snapshot(&self, key: Key) -> EntrySnapshot {
        EntrySnapshot {
            key,
            refs: self.refs,
            recent: self.recent,
        }
    }
}

/// Read-only view of a resident entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntrySnapshot {
    /// The key.
    pub key: Key,
    /// Reference count at the time of the snapshot.
    pub refs: u64,
    /// Recently-used mark at the time of the snapshot.
    pub recent: bool,
}
