// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus_bb_container::byte_string::FixedSizeByteString;
use membus_bb_testing::assert_that;

#[test]
fn byte_string_new_is_empty() {
    let sut = FixedSizeByteString::<16>::new();
    assert_that!(sut, is_empty);
    assert_that!(sut.len(), eq 0);
    assert_that!(FixedSizeByteString::<16>::capacity(), eq 16);
}

#[test]
fn byte_string_from_bytes_works() {
    let sut = FixedSizeByteString::<16>::from_bytes(b"hello world").unwrap();
    assert_that!(sut.len(), eq 11);
    assert_that!(sut.as_bytes(), eq b"hello world");
    assert_that!(sut, eq b"hello world");
}

#[test]
fn byte_string_from_bytes_rejects_overlong_content() {
    let sut = FixedSizeByteString::<4>::from_bytes(b"hello world");
    assert_that!(sut, is_err);
}

#[test]
fn byte_string_from_bytes_truncated_cuts_the_content() {
    let sut = FixedSizeByteString::<4>::from_bytes_truncated(b"hello world");
    assert_that!(sut.len(), eq 4);
    assert_that!(sut.as_bytes(), eq b"hell");
}

#[test]
fn byte_string_push_bytes_until_full_works() {
    let mut sut = FixedSizeByteString::<8>::new();
    assert_that!(sut.push_bytes(b"abcd"), is_ok);
    assert_that!(sut.push_bytes(b"efgh"), is_ok);
    assert_that!(sut.is_full(), eq true);
    assert_that!(sut.push(b'x'), is_err);
    assert_that!(sut.as_bytes(), eq b"abcdefgh");
}

#[test]
fn byte_string_is_null_terminated() {
    let sut = FixedSizeByteString::<8>::from_bytes(b"abc").unwrap();
    let c_str = sut.as_c_str();
    assert_that!(unsafe { *c_str.add(3) }, eq 0);

    let full = FixedSizeByteString::<4>::from_bytes(b"abcd").unwrap();
    assert_that!(unsafe { *full.as_c_str().add(4) }, eq 0);
}

#[test]
fn byte_string_equality_works() {
    let sut_a = FixedSizeByteString::<16>::from_bytes(b"fuu").unwrap();
    let sut_b = FixedSizeByteString::<16>::from_bytes(b"fuu").unwrap();
    let sut_c = FixedSizeByteString::<16>::from_bytes(b"bar").unwrap();

    assert_that!(sut_a, eq sut_b);
    assert_that!(sut_a, ne sut_c);
}

#[test]
fn byte_string_clear_works() {
    let mut sut = FixedSizeByteString::<16>::from_bytes(b"something").unwrap();
    sut.clear();
    assert_that!(sut, is_empty);
    assert_that!(unsafe { *sut.as_c_str() }, eq 0);
}

#[test]
fn byte_string_display_escapes_non_printable_characters() {
    let sut = FixedSizeByteString::<16>::from_bytes(b"a\nb\x01").unwrap();
    assert_that!(format!("{}", sut), eq "a\\nb\\x01".to_string());
}
