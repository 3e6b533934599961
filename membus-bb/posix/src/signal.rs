// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal signal handling: routes `SIGTERM` and `SIGINT` into a process-wide flag which
//! long running loops poll to terminate gracefully.

use core::sync::atomic::{AtomicBool, Ordering};

static TERMINATION_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn termination_handler(_signal: i32) {
    TERMINATION_REQUESTED.store(true, Ordering::Relaxed);
}

/// Installs the handler which routes `SIGTERM` and `SIGINT` into the flag returned by
/// [`termination_requested()`]. Can be called multiple times.
pub fn register_termination_handler() {
    unsafe {
        libc::signal(libc::SIGTERM, termination_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, termination_handler as libc::sighandler_t);
    }
}

/// Returns true once a termination signal was delivered.
pub fn termination_requested() -> bool {
    TERMINATION_REQUESTED.load(Ordering::Relaxed)
}

/// Sets or clears the termination flag manually, mainly to request a graceful shutdown
/// from another thread or from tests.
pub fn set_termination_requested(value: bool) {
    TERMINATION_REQUESTED.store(value, Ordering::Relaxed);
}
