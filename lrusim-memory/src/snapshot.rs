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

use std::fmt::Display;

use lrusim_common::key::Key;

use crate::record::EntrySnapshot;

/// A listing of the resident entries, sorted by key.
///
/// Taken without stopping accessors or cleaners. Depending on the store it is either
/// point-in-time consistent (single lock) or consistent per shard / per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<EntrySnapshot>,
}

impl From<Vec<EntrySnapshot>> for Snapshot {
    fn from(mut entries: Vec<EntrySnapshot>) -> Self {
        entries.sort_unstable_by_key(|entry| entry.key);
        Self { entries }
    }
}

impl Snapshot {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entry was resident.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry of `key`.
    pub fn get(&self, key: Key) -> Option<&EntrySnapshot> {
        self.entries
            .binary_search_by_key(&key, |entry| entry.key)
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Returns `true` if `key` was resident.
    pub fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    /// Resident keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.entries.iter().map(|entry| entry.key)
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &EntrySnapshot> {
        self.entries.iter()
    }

    /// Sum of all reference counts.
    pub fn total_refs(&self) -> u64 {
        self.entries.iter().map(|entry| entry.refs).sum()
    }
}

impl Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "cache contents ({} entries):", self.entries.len())?;
        for entry in &self.entries {
            let mark = if entry.recent { "*" } else { " " };
            writeln!(f, "  {:>6}{mark} refs: {}", entry.key, entry.refs)?;
        }
        Ok(())
    }
}
