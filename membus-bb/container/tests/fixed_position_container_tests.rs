// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus_bb_container::fixed_position_container::FixedPositionContainer;
use membus_bb_testing::assert_that;

#[test]
fn fixed_position_container_insert_until_full_works() {
    const CAPACITY: usize = 8;
    let mut sut = FixedPositionContainer::<u64, CAPACITY>::new();

    for i in 0..CAPACITY as u64 {
        assert_that!(sut.insert(i), is_some);
    }
    assert_that!(sut.is_full(), eq true);
    assert_that!(sut.insert(1234), is_none);
    assert_that!(sut, len CAPACITY);
}

#[test]
fn fixed_position_container_elements_do_not_move_on_removal() {
    const CAPACITY: usize = 8;
    let mut sut = FixedPositionContainer::<u64, CAPACITY>::new();

    let first = sut.insert(10).unwrap();
    let second = sut.insert(20).unwrap();
    let third = sut.insert(30).unwrap();

    assert_that!(sut.remove(second.as_ptr()), eq true);

    // the neighbors keep their position and value
    assert_that!(unsafe { *first.as_ptr() }, eq 10);
    assert_that!(unsafe { *third.as_ptr() }, eq 30);

    // the freed slot is reused for the next insertion
    let reinserted = sut.insert(40).unwrap();
    assert_that!(reinserted.as_ptr() as usize, eq second.as_ptr() as usize);
}

#[test]
fn fixed_position_container_remove_foreign_pointer_fails() {
    let mut sut = FixedPositionContainer::<u64, 4>::new();
    sut.insert(1);

    let foreign = 55u64;
    assert_that!(sut.remove(&foreign as *const u64), eq false);
    assert_that!(sut, len 1);
}

#[test]
fn fixed_position_container_remove_twice_fails() {
    let mut sut = FixedPositionContainer::<u64, 4>::new();
    let element = sut.insert(1).unwrap();

    assert_that!(sut.remove(element.as_ptr()), eq true);
    assert_that!(sut.remove(element.as_ptr()), eq false);
    assert_that!(sut, is_empty);
}

#[test]
fn fixed_position_container_iter_visits_only_used_slots() {
    let mut sut = FixedPositionContainer::<u64, 8>::new();
    let _first = sut.insert(1).unwrap();
    let second = sut.insert(2).unwrap();
    let _third = sut.insert(3).unwrap();
    sut.remove(second.as_ptr());

    let values: Vec<u64> = sut.iter().copied().collect();
    assert_that!(values, eq vec![1, 3]);
}

#[test]
fn fixed_position_container_drops_stored_elements() {
    use std::rc::Rc;

    let witness = Rc::new(());
    {
        let mut sut = FixedPositionContainer::<Rc<()>, 4>::new();
        sut.insert(Rc::clone(&witness));
        sut.insert(Rc::clone(&witness));
        assert_that!(Rc::strong_count(&witness), eq 3);
    }
    assert_that!(Rc::strong_count(&witness), eq 1);
}
