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

pub use lrusim_common::{key::Key, metrics::MetricsSnapshot};

pub use crate::{
    cache::{
        AtomicCache, Cache, CacheBuilder, CacheConfig, MutexCache, RawCache, ShardedCache, StoreConfig,
        ATOMIC_STORE_MAX_KEY, MAX_SHARDS,
    },
    error::{Error, Result},
    eviction::{CleanOutcome, DecayPolicy, EvictionPass, SweepStats},
    gate::{GateOutcome, WatermarkGate},
    record::{Decay, Entry, EntrySnapshot, MAX_REFS},
    snapshot::Snapshot,
    store::{AtomicStore, MutexStore, Reference, ShardedStore, Store, Sweep},
};
