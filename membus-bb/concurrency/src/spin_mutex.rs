// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A spin-based mutex whose lock word is a single atomic so it can protect compound updates
//! on data structures which reside in shared memory and are accessed by multiple processes.
//! Intended for short critical sections only; waiters back off with
//! [`AdaptiveWait`](crate::adaptive_wait::AdaptiveWait).

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

use crate::adaptive_wait::AdaptiveWait;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// Interprocess capable spin lock around a value of type `T`.
#[repr(C)]
#[derive(Debug, Default)]
pub struct SpinMutex<T> {
    value: UnsafeCell<T>,
    state: AtomicU32,
}

unsafe impl<T: Send> Send for SpinMutex<T> {}
unsafe impl<T: Send> Sync for SpinMutex<T> {}

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
            state: AtomicU32::new(UNLOCKED),
        }
    }

    /// Acquires the lock, backing off adaptively while it is contended.
    pub fn lock(&self) -> SpinMutexGuard<'_, T> {
        let mut adaptive_wait = AdaptiveWait::new();
        while self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            adaptive_wait.wait();
        }

        SpinMutexGuard { mutex: self }
    }

    /// Tries to acquire the lock without waiting.
    pub fn try_lock(&self) -> Option<SpinMutexGuard<'_, T>> {
        match self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => Some(SpinMutexGuard { mutex: self }),
            Err(_) => None,
        }
    }
}

/// Guard which releases the [`SpinMutex`] on drop.
#[derive(Debug)]
pub struct SpinMutexGuard<'a, T> {
    mutex: &'a SpinMutex<T>,
}

impl<T> Deref for SpinMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for SpinMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Drop for SpinMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.state.store(UNLOCKED, Ordering::Release);
    }
}
