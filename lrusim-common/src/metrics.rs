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

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated by eviction passes and the watermark gate.
///
/// The reference path is not counted here. Accessors keep their own counters.
#[derive(Debug, Default)]
pub struct Metrics {
    /// completed eviction passes
    pub clean_pass: AtomicU64,
    /// blocking passes released by shutdown before sweeping
    pub clean_abort: AtomicU64,
    /// entries removed by eviction passes
    pub evict: AtomicU64,
    /// entries kept but decayed by eviction passes
    pub decay: AtomicU64,
    /// times a blocking pass had to park in the watermark gate
    pub gate_wait: AtomicU64,
}

impl Metrics {
    /// Take a point-in-time copy of all counters.
    pub fn dump(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            clean_pass: self.clean_pass.load(Ordering::Relaxed),
            clean_abort: self.clean_abort.load(Ordering::Relaxed),
            evict: self.evict.load(Ordering::Relaxed),
            decay: self.decay.load(Ordering::Relaxed),
            gate_wait: self.gate_wait.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// completed eviction passes
    pub clean_pass: u64,
    /// blocking passes released by shutdown before sweeping
    pub clean_abort: u64,
    /// entries removed by eviction passes
    pub evict: u64,
    /// entries kept but decayed by eviction passes
    pub decay: u64,
    /// times a blocking pass had to park in the watermark gate
    pub gate_wait: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "clean passes: {}", self.clean_pass)?;
        writeln!(f, "clean aborts: {}", self.clean_abort)?;
        writeln!(f, "evicted: {}", self.evict)?;
        writeln!(f, "decayed: {}", self.decay)?;
        write!(f, "gate waits: {}", self.gate_wait)
    }
}
