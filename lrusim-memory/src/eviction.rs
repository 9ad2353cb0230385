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

use std::ops::AddAssign;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::store::{Store, Sweep};

/// How an eviction pass decays the reference count of an entry.
///
/// Entries with a zero reference count are removed under either policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecayPolicy {
    /// Remove entries at zero, reset every other count to zero.
    ///
    /// Any referenced entry survives the next pass; an entry not referenced between two
    /// consecutive passes is removed by the second one.
    #[default]
    Reset,
    /// Decrease the count by one and remove the entry once it reaches zero.
    ///
    /// An entry referenced `n` times since it was inserted survives `n - 1` passes.
    Decrement,
}

/// Accounting of a single eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries examined.
    pub visited: usize,
    /// Entries removed.
    pub evicted: usize,
    /// Entries kept with a decayed reference count.
    pub decayed: usize,
}

impl SweepStats {
    /// Account for one per-entry outcome.
    #[inline]
    pub fn record(&mut self, sweep: Sweep) {
        match sweep {
            Sweep::Evicted => self.evicted += 1,
            Sweep::Decayed => self.decayed += 1,
            Sweep::Absent => return,
        }
        self.visited += 1;
    }
}

impl AddAssign for SweepStats {
    fn add_assign(&mut self, rhs: Self) {
        self.visited += rhs.visited;
        self.evicted += rhs.evicted;
        self.decayed += rhs.decayed;
    }
}

/// Result of [`crate::Cache::clean`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanOutcome {
    /// A full pass ran.
    Swept(SweepStats),
    /// A blocking pass was released by shutdown and did not sweep.
    Aborted,
}

impl CleanOutcome {
    /// Returns `true` if the pass was aborted by shutdown.
    pub fn is_aborted(&self) -> bool {
        matches!(self, CleanOutcome::Aborted)
    }
}

/// Runs eviction passes one at a time.
///
/// Passes exclude each other through an internal mutex. They do not exclude references: the
/// store is responsible for making each per-entry transition atomic.
#[derive(Debug, Default)]
pub struct EvictionPass {
    running: Mutex<()>,
    policy: DecayPolicy,
}

impl EvictionPass {
    /// Create a pass runner with the given decay policy.
    pub fn new(policy: DecayPolicy) -> Self {
        Self {
            running: Mutex::new(()),
            policy,
        }
    }

    /// The decay policy applied by every pass.
    pub fn policy(&self) -> DecayPolicy {
        self.policy
    }

    /// Sweep every entry of `store` once.
    pub fn run<S>(&self, store: &S) -> SweepStats
    where
        S: Store + ?Sized,
    {
        let _running = self.running.lock();
        let stats = store.sweep(self.policy);
        tracing::trace!(?stats, remaining = store.len(), "[eviction]: pass done");
        stats
    }
}
