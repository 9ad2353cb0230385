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

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use lrusim_common::metrics::Metrics;
use parking_lot::{Condvar, Mutex};

/// Result of waiting on a [`WatermarkGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// The store holds more entries than the low water mark.
    Proceed,
    /// The gate was released by shutdown.
    Shutdown,
}

/// Parks blocking eviction passes until the store grows above the low water mark.
///
/// The predicate is read from the store's size counter, which is updated outside of the gate
/// lock. Lost wakeups are ruled out by a Dekker-style handshake: a waiter announces itself in
/// `waiters` before re-reading the size, and a notifier re-reads `waiters` after publishing the
/// new size. Both sides use sequentially consistent operations, so at least one of them sees
/// the other.
#[derive(Debug)]
pub struct WatermarkGate {
    low_water_mark: usize,

    lock: Mutex<()>,
    condvar: Condvar,

    waiters: AtomicUsize,
    released: AtomicBool,

    metrics: Arc<Metrics>,
}

impl WatermarkGate {
    /// Create a gate that lets passes through once the size exceeds `low_water_mark`.
    pub fn new(low_water_mark: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            low_water_mark,
            lock: Mutex::new(()),
            condvar: Condvar::new(),
            waiters: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            metrics,
        }
    }

    /// The configured low water mark.
    pub fn low_water_mark(&self) -> usize {
        self.low_water_mark
    }

    /// Block until `size() > low_water_mark` or the gate is released.
    ///
    /// `size` is re-evaluated after every wakeup, spurious or not. A released gate always wins
    /// over a satisfied predicate.
    pub fn wait_until_above_watermark<F>(&self, size: F) -> GateOutcome
    where
        F: Fn() -> usize,
    {
        if self.is_released() {
            return GateOutcome::Shutdown;
        }
        if size() > self.low_water_mark {
            return GateOutcome::Proceed;
        }

        let mut guard = self.lock.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let mut parked = false;
        let outcome = loop {
            if self.released.load(Ordering::SeqCst) {
                break GateOutcome::Shutdown;
            }
            if size() > self.low_water_mark {
                break GateOutcome::Proceed;
            }
            if !parked {
                parked = true;
                self.metrics.gate_wait.fetch_add(1, Ordering::Relaxed);
            }
            self.condvar.wait(&mut guard);
        };
        self.waiters.fetch_sub(1, Ordering::SeqCst);

        tracing::trace!(?outcome, parked, "[gate]: wait finished");
        outcome
    }

    /// Wake every parked pass so it re-checks the predicate.
    ///
    /// Must be called after the size increase has been published. Costs a single atomic load
    /// when no pass is parked.
    pub fn notify_size_changed(&self) {
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return;
        }
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }

    /// Release every current and future waiter with [`GateOutcome::Shutdown`].
    ///
    /// Idempotent. Returns `true` for the call that actually released the gate.
    pub fn release_all(&self) -> bool {
        let _guard = self.lock.lock();
        let first = !self.released.swap(true, Ordering::SeqCst);
        self.condvar.notify_all();
        first
    }

    /// Returns `true` once [`WatermarkGate::release_all`] has been called.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use itertools::Itertools;

    use super::*;

    fn gate(low_water_mark: usize) -> Arc<WatermarkGate> {
        Arc::new(WatermarkGate::new(low_water_mark, Arc::new(Metrics::default())))
    }

    #[test]
    fn test_gate_proceeds_above_watermark() {
        let gate = gate(4);
        assert_eq!(gate.wait_until_above_watermark(|| 5), GateOutcome::Proceed);
    }

    #[test]
    fn test_gate_released_wins() {
        let gate = gate(4);
        assert!(gate.release_all());
        assert!(!gate.release_all());
        assert!(gate.is_released());
        assert_eq!(gate.wait_until_above_watermark(|| 100), GateOutcome::Shutdown);
    }

    #[test]
    fn test_gate_notify_wakes_waiter() {
        let gate = gate(4);
        let size = Arc::new(AtomicUsize::new(0));

        let handle = {
            let gate = gate.clone();
            let size = size.clone();
            thread::spawn(move || gate.wait_until_above_watermark(|| size.load(Ordering::SeqCst)))
        };

        for _ in 0..5 {
            thread::sleep(Duration::from_millis(5));
            size.fetch_add(1, Ordering::SeqCst);
            gate.notify_size_changed();
        }

        assert_eq!(handle.join().unwrap(), GateOutcome::Proceed);
        assert_eq!(gate.waiters.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_gate_release_wakes_all_waiters() {
        let gate = gate(4);

        let handles = (0..4)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || gate.wait_until_above_watermark(|| 0))
            })
            .collect_vec();

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        gate.release_all();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), GateOutcome::Shutdown);
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
