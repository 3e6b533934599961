// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus_bb_lock_free::spsc::safely_overflowing_index_queue::*;
use membus_bb_testing::assert_that;

#[test]
fn spsc_safely_overflowing_index_queue_push_works_until_full() {
    const CAPACITY: usize = 128;
    let sut = FixedSizeSafelyOverflowingIndexQueue::<CAPACITY>::new();

    assert_that!(sut.capacity(), eq CAPACITY);
    assert_that!(sut, len 0);
    assert_that!(sut.is_full(), eq false);
    assert_that!(sut, is_empty);

    let mut sut_producer = sut.acquire_producer().unwrap();

    for i in 0..CAPACITY {
        assert_that!(sut, len i);
        assert_that!(sut_producer.push(i as u64), is_none);
    }
    let oldest = sut_producer.push(1234);
    assert_that!(oldest, is_some);
    assert_that!(oldest.unwrap(), eq 0);

    assert_that!(sut.capacity(), eq CAPACITY);
    assert_that!(sut, len CAPACITY);
    assert_that!(sut.is_full(), eq true);
    assert_that!(sut, is_not_empty);
}

#[test]
fn spsc_safely_overflowing_index_queue_pop_works_until_empty() {
    const CAPACITY: usize = 128;
    let sut = FixedSizeSafelyOverflowingIndexQueue::<CAPACITY>::new();
    let mut sut_producer = sut.acquire_producer().unwrap();
    for i in 0..CAPACITY {
        assert_that!(sut_producer.push(i as u64), is_none);
    }

    let mut sut_consumer = sut.acquire_consumer().unwrap();
    for i in 0..CAPACITY {
        assert_that!(sut, len CAPACITY - i);
        let result = sut_consumer.pop();
        assert_that!(result, is_some);
        assert_that!(result.unwrap(), eq i as u64);
    }
    assert_that!(sut_consumer.pop(), is_none);

    assert_that!(sut, len 0);
    assert_that!(sut.is_full(), eq false);
    assert_that!(sut, is_empty);
}

#[test]
fn spsc_safely_overflowing_index_queue_overflow_keeps_the_most_recent_values() {
    const CAPACITY: usize = 4;
    const PUSHES: usize = 10;
    let sut = FixedSizeSafelyOverflowingIndexQueue::<CAPACITY>::new();
    let mut sut_producer = sut.acquire_producer().unwrap();

    for i in 0..PUSHES {
        let displaced = sut_producer.push(i as u64);
        if i < CAPACITY {
            assert_that!(displaced, is_none);
        } else {
            assert_that!(displaced, eq Some((i - CAPACITY) as u64));
        }
    }

    let mut sut_consumer = sut.acquire_consumer().unwrap();
    for i in PUSHES - CAPACITY..PUSHES {
        assert_that!(sut_consumer.pop(), eq Some(i as u64));
    }
    assert_that!(sut_consumer.pop(), is_none);
}

#[test]
fn spsc_safely_overflowing_index_queue_reduced_capacity_works() {
    const CAPACITY: usize = 128;
    let sut = FixedSizeSafelyOverflowingIndexQueue::<CAPACITY>::new_with_reduced_capacity(3);

    assert_that!(sut.capacity(), eq 3);

    let mut sut_producer = sut.acquire_producer().unwrap();
    assert_that!(sut_producer.push(1), is_none);
    assert_that!(sut_producer.push(2), is_none);
    assert_that!(sut_producer.push(3), is_none);
    assert_that!(sut_producer.push(4), eq Some(1));
}

#[test]
fn spsc_safely_overflowing_index_queue_get_consumer_twice_fails() {
    let sut = FixedSizeSafelyOverflowingIndexQueue::<1024>::new();
    let _consumer = sut.acquire_consumer().unwrap();
    assert_that!(sut.acquire_consumer(), is_none);
}

#[test]
fn spsc_safely_overflowing_index_queue_get_consumer_after_release_succeeds() {
    let sut = FixedSizeSafelyOverflowingIndexQueue::<1024>::new();
    {
        let _consumer = sut.acquire_consumer();
    }
    assert_that!(sut.acquire_consumer(), is_some);
}

#[test]
fn spsc_safely_overflowing_index_queue_get_producer_twice_fails() {
    let sut = FixedSizeSafelyOverflowingIndexQueue::<1024>::new();
    let _producer = sut.acquire_producer().unwrap();
    assert_that!(sut.acquire_producer(), is_none);
}

#[test]
fn spsc_safely_overflowing_index_queue_get_producer_after_release_succeeds() {
    let sut = FixedSizeSafelyOverflowingIndexQueue::<1024>::new();
    {
        let _producer = sut.acquire_producer();
    }
    assert_that!(sut.acquire_producer(), is_some);
}

#[test]
fn spsc_safely_overflowing_index_queue_concurrent_push_pop_preserves_order() {
    const CAPACITY: usize = 128;
    const VALUES: u64 = 10000;
    let sut = FixedSizeSafelyOverflowingIndexQueue::<CAPACITY>::new();

    std::thread::scope(|s| {
        s.spawn(|| {
            let mut producer = sut.acquire_producer().unwrap();
            for i in 0..VALUES {
                while sut.is_full() {
                    std::thread::yield_now();
                }
                assert_that!(producer.push(i), is_none);
            }
        });

        s.spawn(|| {
            let mut consumer = sut.acquire_consumer().unwrap();
            let mut expected = 0;
            while expected < VALUES {
                if let Some(value) = consumer.pop() {
                    assert_that!(value, eq expected);
                    expected += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });
    });
}
