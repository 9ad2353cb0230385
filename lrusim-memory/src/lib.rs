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

//! A fixed-domain, approximate LRU cache built for concurrency experiments.
//!
//! Accessor threads [`Cache::reference`] keys; eviction passes ([`Cache::clean`]) sweep the
//! resident entries and decay or remove them based on a coarse reference count instead of exact
//! recency. A blocking pass parks until the cache holds more entries than a low water mark, and
//! [`Cache::shutdown`] releases it for good.
//!
//! The entry store behind the cache is pluggable ([`store::Store`]) so different locking
//! strategies can be benchmarked against each other under the same protocol:
//!
//! ```
//! use lrusim_memory::{CacheBuilder, StoreConfig};
//!
//! let cache = CacheBuilder::new(4)
//!     .with_store_config(StoreConfig::Atomic)
//!     .build()
//!     .unwrap();
//!
//! cache.reference(1).unwrap();
//! cache.clean(false);
//! assert_eq!(cache.snapshot().get(1).unwrap().refs, 0);
//!
//! cache.shutdown();
//! assert!(cache.clean(true).is_aborted());
//! ```

mod cache;
mod error;
mod eviction;
mod gate;
mod record;
mod snapshot;

pub mod store;

mod prelude;
pub use prelude::*;
