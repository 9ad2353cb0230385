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

/// In-memory cache error.
///
/// The cache core has no recoverable error path: callers are expected to report any of these
/// and terminate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The key is outside of the configured key domain.
    #[error("key {key} out of range [0, {max_key})")]
    KeyOutOfRange {
        /// The rejected key.
        key: Key,
        /// Exclusive upper bound of the key domain.
        max_key: Key,
    },
    /// Memory for a new entry could not be reserved.
    #[error("resource exhausted while inserting key {key}: {reason:?}")]
    ResourceExhausted {
        /// The key being inserted.
        key: Key,
        /// The allocator failure.
        reason: hashbrown::TryReserveError,
    },
    /// Config error.
    #[error("config error: {0}")]
    ConfigError(String),
}

/// In-memory cache result.
pub type Result<T> = std::result::Result<T, Error>;
