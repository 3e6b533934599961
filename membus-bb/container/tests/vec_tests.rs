// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus_bb_container::vec::FixedSizeVec;
use membus_bb_testing::assert_that;

#[test]
fn vec_push_pop_works() {
    const CAPACITY: usize = 12;
    let mut sut = FixedSizeVec::<u64, CAPACITY>::new();

    assert_that!(sut, is_empty);
    for i in 0..CAPACITY as u64 {
        assert_that!(sut.push(i), eq true);
    }
    assert_that!(sut.push(1234), eq false);
    assert_that!(sut.is_full(), eq true);

    for i in (0..CAPACITY as u64).rev() {
        assert_that!(sut.pop(), eq Some(i));
    }
    assert_that!(sut.pop(), is_none);
}

#[test]
fn vec_deref_to_slice_works() {
    let mut sut = FixedSizeVec::<u64, 8>::new();
    sut.push(10);
    sut.push(20);
    sut.push(30);

    assert_that!(sut[1], eq 20);
    assert_that!(sut.iter().sum::<u64>(), eq 60);
    assert_that!(sut, contains 30);
}

#[test]
fn vec_remove_preserves_order() {
    let mut sut = FixedSizeVec::<u64, 8>::new();
    for i in 0..5 {
        sut.push(i);
    }

    assert_that!(sut.remove(1), eq 1);
    assert_that!(sut, len 4);
    assert_that!(sut[0], eq 0);
    assert_that!(sut[1], eq 2);
    assert_that!(sut[2], eq 3);
    assert_that!(sut[3], eq 4);

    assert_that!(sut.remove(3), eq 4);
    assert_that!(sut, len 3);
}

#[test]
fn vec_clear_removes_everything() {
    let mut sut = FixedSizeVec::<u64, 8>::new();
    sut.push(1);
    sut.push(2);
    sut.clear();

    assert_that!(sut, is_empty);
    assert_that!(sut.pop(), is_none);
}
