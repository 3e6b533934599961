// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`AdaptiveWait`] is a building block which can be integrated into busy loops to make them
//! less CPU consuming.
//!
//! The strategy is that for [`ADAPTIVE_WAIT_YIELD_REPETITIONS`] the wait call will yield,
//! then it increases its waiting time to [`ADAPTIVE_WAIT_INITIAL_WAITING_TIME`] for the next
//! [`ADAPTIVE_WAIT_INITIAL_REPETITIONS`] and after that every further wait will wait
//! [`ADAPTIVE_WAIT_FINAL_WAITING_TIME`].
//!
//! # Example
//!
//! ```
//! use membus_bb_concurrency::adaptive_wait::AdaptiveWait;
//!
//! let mut attempts = 0;
//! let mut adaptive_wait = AdaptiveWait::new();
//! while { attempts += 1; attempts < 10 } {
//!     // loop which waits for some event
//!     adaptive_wait.wait();
//! }
//! ```

use core::time::Duration;

pub const ADAPTIVE_WAIT_YIELD_REPETITIONS: u64 = 10000;
pub const ADAPTIVE_WAIT_INITIAL_REPETITIONS: u64 = ADAPTIVE_WAIT_YIELD_REPETITIONS + 100;
pub const ADAPTIVE_WAIT_INITIAL_WAITING_TIME: Duration = Duration::from_micros(100);
pub const ADAPTIVE_WAIT_FINAL_WAITING_TIME: Duration = Duration::from_millis(1);

/// Busy-wait helper which starts cheap and backs off the longer the waited-for event does
/// not occur.
#[derive(Debug, Default)]
pub struct AdaptiveWait {
    yield_count: u64,
}

impl AdaptiveWait {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times [`AdaptiveWait::wait()`] was called or how often the closure
    /// in [`AdaptiveWait::wait_while()`] was invoked.
    pub fn yield_count(&self) -> u64 {
        self.yield_count
    }

    /// Waits once according to the backoff strategy.
    pub fn wait(&mut self) {
        self.yield_count += 1;

        if self.yield_count <= ADAPTIVE_WAIT_YIELD_REPETITIONS {
            std::thread::yield_now();
        } else if self.yield_count <= ADAPTIVE_WAIT_INITIAL_REPETITIONS {
            std::thread::sleep(ADAPTIVE_WAIT_INITIAL_WAITING_TIME);
        } else {
            std::thread::sleep(ADAPTIVE_WAIT_FINAL_WAITING_TIME);
        }
    }

    /// Waits until the provided predicate returns false.
    pub fn wait_while<F: FnMut() -> bool>(&mut self, mut predicate: F) {
        while predicate() {
            self.wait();
        }
    }
}
