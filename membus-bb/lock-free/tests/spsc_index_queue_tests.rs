// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus_bb_lock_free::spsc::index_queue::*;
use membus_bb_testing::assert_that;

#[test]
fn spsc_index_queue_rejects_when_full() {
    const CAPACITY: usize = 8;
    let sut = FixedSizeIndexQueue::<CAPACITY>::new();
    let mut sut_producer = sut.acquire_producer().unwrap();

    for i in 0..CAPACITY {
        assert_that!(sut_producer.push(i as u64), eq true);
    }
    assert_that!(sut_producer.push(1234), eq false);
    assert_that!(sut, len CAPACITY);
    assert_that!(sut.is_full(), eq true);
}

#[test]
fn spsc_index_queue_pop_returns_fifo_order() {
    const CAPACITY: usize = 8;
    let sut = FixedSizeIndexQueue::<CAPACITY>::new();
    let mut sut_producer = sut.acquire_producer().unwrap();
    let mut sut_consumer = sut.acquire_consumer().unwrap();

    assert_that!(sut_consumer.pop(), is_none);

    for i in 0..CAPACITY {
        assert_that!(sut_producer.push(i as u64), eq true);
    }
    for i in 0..CAPACITY {
        assert_that!(sut_consumer.pop(), eq Some(i as u64));
    }
    assert_that!(sut_consumer.pop(), is_none);
    assert_that!(sut, is_empty);
}

#[test]
fn spsc_index_queue_push_pop_alteration_works() {
    const CAPACITY: usize = 8;
    let sut = FixedSizeIndexQueue::<CAPACITY>::new();
    let mut sut_producer = sut.acquire_producer().unwrap();
    let mut sut_consumer = sut.acquire_consumer().unwrap();

    for i in 0..4 * CAPACITY as u64 {
        assert_that!(sut_producer.push(i), eq true);
        assert_that!(sut_consumer.pop(), eq Some(i));
    }
}

#[test]
fn spsc_index_queue_get_producer_twice_fails() {
    let sut = FixedSizeIndexQueue::<128>::new();
    let _producer = sut.acquire_producer().unwrap();
    assert_that!(sut.acquire_producer(), is_none);
}

#[test]
fn spsc_index_queue_get_consumer_twice_fails() {
    let sut = FixedSizeIndexQueue::<128>::new();
    let _consumer = sut.acquire_consumer().unwrap();
    assert_that!(sut.acquire_consumer(), is_none);
}
