// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::sync::atomic::{AtomicU64, Ordering};

use membus_bb_elementary::relative_ptr::*;
use membus_bb_elementary::segment_registry::{SegmentId, SegmentRegistry};
use membus_bb_testing::assert_that;

// the process wide registry is shared by all tests of this binary, every test uses its
// own id
static NEXT_SEGMENT_ID: AtomicU64 = AtomicU64::new(30);

fn register_segment(memory: &[u8]) -> SegmentId {
    let id = SegmentId::new(NEXT_SEGMENT_ID.fetch_add(1, Ordering::Relaxed));
    SegmentRegistry::instance()
        .register(id, memory.as_ptr() as usize, memory.len())
        .unwrap();
    id
}

#[test]
fn relative_ptr_null_works() {
    let sut = RelativePointer::<u64>::null();
    assert_that!(sut.is_null(), eq true);
    assert_that!(sut.as_ptr(), eq core::ptr::null());
    assert_that!(RelativePointer::<u64>::default().is_null(), eq true);
}

#[test]
fn relative_ptr_resolves_into_registered_segment() {
    let memory = [0u8; 512];
    let id = register_segment(&memory);

    let sut = RelativePointer::<u8>::new(id, 100);
    assert_that!(sut.segment_id(), eq id);
    assert_that!(sut.offset(), eq 100);
    assert_that!(sut.as_ptr() as usize, eq memory.as_ptr() as usize + 100);
}

#[test]
fn relative_ptr_from_ptr_binds_to_the_containing_segment() {
    let memory = [0u8; 512];
    let id = register_segment(&memory);

    let position = unsafe { memory.as_ptr().add(42) };
    let sut = RelativePointer::from_ptr(position);

    assert_that!(sut.segment_id(), eq id);
    assert_that!(sut.offset(), eq 42);
    assert_that!(sut.as_ptr(), eq position);
}

#[test]
fn relative_ptr_from_unregistered_ptr_falls_back_to_absolute() {
    let value = 1234u64;
    let sut = RelativePointer::from_ptr(&value as *const u64);

    assert_that!(sut.segment_id().value(), eq 0);
    assert_that!(sut.as_ptr(), eq & value as *const u64);
    assert_that!(unsafe { *sut.as_ptr() }, eq 1234);
}

#[test]
fn relative_ptr_value_encoding_round_trip_works() {
    let memory = [0u8; 512];
    let id = register_segment(&memory);

    let sut = RelativePointer::<u8>::new(id, 256);
    let decoded = RelativePointer::<u8>::from_value(sut.as_value());

    assert_that!(decoded, eq sut);
    assert_that!(decoded.as_ptr(), eq sut.as_ptr());
}

#[test]
fn relative_ptr_null_value_encoding_round_trip_works() {
    let sut = RelativePointer::<u8>::null();
    assert_that!(sut.as_value(), eq u64::MAX);
    assert_that!(RelativePointer::<u8>::from_value(u64::MAX).is_null(), eq true);
}
