// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus_bb_elementary::allocator::BaseAllocator;
use membus_bb_elementary::bump_allocator::BumpAllocator;
use membus_bb_memory::pool_allocator::*;
use membus_bb_testing::assert_that;

const BUCKET_SIZE: usize = 128;
const BUCKET_ALIGNMENT: usize = 8;
const NUMBER_OF_BUCKETS: usize = 8;

struct TestFixture {
    // u64 backing storage guarantees the bucket alignment
    raw_memory: Box<[u64]>,
}

impl TestFixture {
    fn new() -> Self {
        Self {
            raw_memory: vec![
                0u64;
                PoolAllocator::memory_size(
                    unsafe {
                        Layout::from_size_align_unchecked(BUCKET_SIZE, BUCKET_ALIGNMENT)
                    },
                    NUMBER_OF_BUCKETS
                ) / 8
                    + 1
            ]
            .into_boxed_slice(),
        }
    }

    fn create_pool_allocator(&mut self) -> PoolAllocator {
        let mut sut = unsafe {
            PoolAllocator::new_uninit(
                Layout::from_size_align_unchecked(BUCKET_SIZE, BUCKET_ALIGNMENT),
                NUMBER_OF_BUCKETS,
            )
        };
        let allocator = BumpAllocator::new(self.raw_memory.as_mut_ptr().cast());
        unsafe { sut.init(&allocator).expect("enough memory is provided") };
        sut
    }
}

#[test]
fn pool_allocator_is_set_up_correctly() {
    let mut test = TestFixture::new();
    let sut = test.create_pool_allocator();

    assert_that!(sut.bucket_size(), eq BUCKET_SIZE);
    assert_that!(sut.max_alignment(), eq BUCKET_ALIGNMENT);
    assert_that!(sut.number_of_buckets() as usize, eq NUMBER_OF_BUCKETS);
    assert_that!(sut.used_buckets(), eq 0);
}

#[test]
fn pool_allocator_acquire_all_memory_works() {
    let mut test = TestFixture::new();
    let sut = test.create_pool_allocator();

    let mut buckets = vec![];
    for i in 0..NUMBER_OF_BUCKETS {
        assert_that!(sut.used_buckets(), eq i);
        let memory = sut.allocate(unsafe { Layout::from_size_align_unchecked(100, 1) });
        assert_that!(memory, is_ok);
        let bucket = memory.unwrap();
        assert_that!(unsafe { bucket.as_ref() }.as_ptr() as usize, aligned_to BUCKET_ALIGNMENT);
        buckets.push(bucket);
    }

    let memory = sut.allocate(unsafe { Layout::from_size_align_unchecked(100, 1) });
    assert_that!(memory, is_err);
}

#[test]
fn pool_allocator_allocate_more_than_bucket_size_fails() {
    let mut test = TestFixture::new();
    let sut = test.create_pool_allocator();

    let memory =
        sut.allocate(unsafe { Layout::from_size_align_unchecked(BUCKET_SIZE + 1, 1) });
    assert_that!(memory, is_err);
}

#[test]
fn pool_allocator_allocate_more_than_bucket_alignment_fails() {
    let mut test = TestFixture::new();
    let sut = test.create_pool_allocator();

    let memory = sut
        .allocate(unsafe { Layout::from_size_align_unchecked(64, 2 * BUCKET_ALIGNMENT) });
    assert_that!(memory, is_err);
}

#[test]
fn pool_allocator_deallocated_bucket_can_be_acquired_again() {
    let mut test = TestFixture::new();
    let sut = test.create_pool_allocator();

    let mut buckets = vec![];
    while let Some(bucket) = sut.allocate_bucket() {
        buckets.push(bucket);
    }
    assert_that!(buckets, len NUMBER_OF_BUCKETS);

    let released = buckets.pop().unwrap();
    unsafe { sut.deallocate_bucket(released) };
    assert_that!(sut.used_buckets(), eq NUMBER_OF_BUCKETS - 1);

    let reacquired = sut.allocate_bucket();
    assert_that!(reacquired, eq Some(released));
}
