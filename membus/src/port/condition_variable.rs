// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small shared record through which a subscriber port can wake a waiting process. It is
//! the attachment point for event loop integrations which block on incoming data.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use core::time::Duration;

use membus_bb_concurrency::adaptive_wait::AdaptiveWait;

use crate::port::base_port::RuntimeName;

/// Lives in the daemon's port pool. Carries a trigger counter which is incremented by
/// notifiers and consumed by the single waiting process.
#[repr(C)]
#[derive(Debug)]
pub struct ConditionVariableData {
    runtime_name: RuntimeName,
    trigger_counter: AtomicU64,
    to_be_destroyed: AtomicBool,
}

impl ConditionVariableData {
    pub fn new(runtime_name: RuntimeName) -> Self {
        Self {
            runtime_name,
            trigger_counter: AtomicU64::new(0),
            to_be_destroyed: AtomicBool::new(false),
        }
    }

    pub fn runtime_name(&self) -> &RuntimeName {
        &self.runtime_name
    }

    pub fn mark_to_be_destroyed(&self) {
        self.to_be_destroyed.store(true, Ordering::Release);
    }

    pub fn is_to_be_destroyed(&self) -> bool {
        self.to_be_destroyed.load(Ordering::Acquire)
    }

    /// Wakes the waiting process.
    pub fn notify(&self) {
        self.trigger_counter.fetch_add(1, Ordering::Release);
    }

    /// Consumes all pending triggers. Returns the number of notifications since the last
    /// call.
    pub fn try_take(&self) -> u64 {
        self.trigger_counter.swap(0, Ordering::Acquire)
    }

    /// Waits until a trigger arrives or the timeout elapses. Returns the number of
    /// consumed notifications, zero on timeout or when the record is torn down while
    /// waiting.
    pub fn timed_wait(&self, timeout: Duration) -> u64 {
        let deadline = std::time::Instant::now() + timeout;
        let mut adaptive_wait = AdaptiveWait::new();

        loop {
            let triggers = self.try_take();
            if triggers != 0 {
                return triggers;
            }

            if self.is_to_be_destroyed() || std::time::Instant::now() >= deadline {
                return 0;
            }

            adaptive_wait.wait();
        }
    }
}
