// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashSet;

use membus_bb_lock_free::mpmc::unique_index_set::*;
use membus_bb_testing::assert_that;

#[test]
fn mpmc_unique_index_set_acquire_and_release_works() {
    const CAPACITY: usize = 128;
    let sut = FixedSizeUniqueIndexSet::<CAPACITY>::new();

    let mut indices = vec![];
    for i in 0..CAPACITY {
        assert_that!(sut.borrowed_indices(), eq i);
        let index = unsafe { sut.acquire_raw_index() };
        assert_that!(index, is_some);
        indices.push(index.unwrap());
    }

    assert_that!(unsafe { sut.acquire_raw_index() }, is_none);
    assert_that!(sut.borrowed_indices(), eq CAPACITY);

    for index in indices {
        unsafe { sut.release_raw_index(index) };
    }
    assert_that!(sut.borrowed_indices(), eq 0);
}

#[test]
fn mpmc_unique_index_set_acquired_indices_are_unique() {
    const CAPACITY: usize = 128;
    let sut = FixedSizeUniqueIndexSet::<CAPACITY>::new();

    let mut indices = HashSet::new();
    while let Some(index) = unsafe { sut.acquire_raw_index() } {
        assert_that!(indices.insert(index), eq true);
        assert_that!((index as usize) < CAPACITY, eq true);
    }
    assert_that!(indices, len CAPACITY);
}

#[test]
fn mpmc_unique_index_set_released_index_can_be_acquired_again() {
    const CAPACITY: usize = 4;
    let sut = FixedSizeUniqueIndexSet::<CAPACITY>::new();

    let mut indices = vec![];
    while let Some(index) = unsafe { sut.acquire_raw_index() } {
        indices.push(index);
    }

    unsafe { sut.release_raw_index(indices[2]) };
    let index = unsafe { sut.acquire_raw_index() };
    assert_that!(index, eq Some(indices[2]));
}

#[test]
fn mpmc_unique_index_set_concurrent_acquire_release_works() {
    const CAPACITY: usize = 64;
    const ITERATIONS: usize = 5000;
    const THREADS: usize = 4;
    let sut = FixedSizeUniqueIndexSet::<CAPACITY>::new();

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    if let Some(index) = unsafe { sut.acquire_raw_index() } {
                        std::thread::yield_now();
                        unsafe { sut.release_raw_index(index) };
                    }
                }
            });
        }
    });

    assert_that!(sut.borrowed_indices(), eq 0);
}
