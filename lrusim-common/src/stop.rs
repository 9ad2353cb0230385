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

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

/// A cloneable stop signal.
///
/// Workers poll [`StopSignal::is_stopped`] in their loops. The coordinating thread can sleep on
/// [`StopSignal::wait_timeout`], which returns early as soon as anyone calls [`StopSignal::stop`].
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    /// Create a signal in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the signal. Idempotent.
    ///
    /// Returns `true` if this call was the one that stopped it.
    pub fn stop(&self) -> bool {
        let _guard = self.inner.mutex.lock();
        let first = !self.inner.stopped.swap(true, Ordering::AcqRel);
        self.inner.condvar.notify_all();
        first
    }

    /// Check whether the signal has been flipped.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Block until the signal is flipped or `timeout` elapses.
    ///
    /// Returns `true` if the signal was flipped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.mutex.lock();
        while !self.is_stopped() {
            if self.inner.condvar.wait_until(&mut guard, deadline).timed_out() {
                return self.is_stopped();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_stop_signal_idempotent() {
        let signal = StopSignal::new();
        assert!(!signal.is_stopped());
        assert!(signal.stop());
        assert!(!signal.stop());
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_stop_signal_timeout() {
        let signal = StopSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_stop_signal_wakes_waiters() {
        let signal = StopSignal::new();
        let handles = (0..4)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.wait_timeout(Duration::from_secs(60)))
            })
            .collect_vec();

        thread::sleep(Duration::from_millis(10));
        signal.stop();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
