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

/// Key type of the simulated cache.
///
/// Valid keys live in `[0, max_key)`, where `max_key` is fixed when the cache is built.
pub type Key = u64;

/// Default upper bound (exclusive) of the key domain.
pub const DEFAULT_MAX_KEY: Key = 1024;

/// Default low water mark.
///
/// A blocking eviction pass waits until the cache holds more entries than this.
pub const DEFAULT_LOW_WATER_MARK: usize = 32;

/// Returns `true` if `key` falls into `[0, max_key)`.
#[inline]
pub fn in_domain(key: Key, max_key: Key) -> bool {
    key < max_key
}
