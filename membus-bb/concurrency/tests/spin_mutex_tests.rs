// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus_bb_concurrency::spin_mutex::SpinMutex;
use membus_bb_testing::assert_that;

#[test]
fn spin_mutex_protects_the_value() {
    let sut = SpinMutex::new(0u64);

    *sut.lock() += 1;
    *sut.lock() += 1;

    assert_that!(*sut.lock(), eq 2);
}

#[test]
fn spin_mutex_try_lock_fails_while_locked() {
    let sut = SpinMutex::new(0u64);

    let guard = sut.lock();
    assert_that!(sut.try_lock(), is_none);
    drop(guard);
    assert_that!(sut.try_lock(), is_some);
}

#[test]
fn spin_mutex_concurrent_increments_are_not_lost() {
    const THREADS: usize = 4;
    const INCREMENTS: usize = 10000;
    let sut = SpinMutex::new(0u64);

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..INCREMENTS {
                    *sut.lock() += 1;
                }
            });
        }
    });

    assert_that!(*sut.lock(), eq (THREADS * INCREMENTS) as u64);
}
