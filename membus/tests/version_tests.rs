// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus::version::*;
use membus_bb_testing::assert_that;

fn version(major: u64, minor: u64, patch: u64, commit_tag: &str) -> VersionInfo {
    let major = major.to_string();
    let minor = minor.to_string();
    let patch = patch.to_string();
    VersionInfo::deserialize(&[major.as_str(), minor.as_str(), patch.as_str(), commit_tag])
        .unwrap()
}

#[test]
fn version_info_serialization_round_trip_works() {
    let sut = VersionInfo::current();

    let serialized = sut.serialize();
    let entries: Vec<&str> = serialized.iter().map(|entry| entry.as_str()).collect();
    let deserialized = VersionInfo::deserialize(&entries).unwrap();

    assert_that!(deserialized, eq sut);
    assert_that!(deserialized.commit_tag(), eq sut.commit_tag());
}

#[test]
fn version_info_deserialize_rejects_wrong_field_count() {
    let result = VersionInfo::deserialize(&["0", "1", "0"]);
    assert_that!(result.err(), eq Some(VersionInfoParseError::WrongNumberOfFields));
}

#[test]
fn version_info_deserialize_rejects_non_numeric_fields() {
    let result = VersionInfo::deserialize(&["0", "one", "0", "tag"]);
    assert_that!(result.err(), eq Some(VersionInfoParseError::InvalidNumericField));
}

#[test]
fn version_info_compatibility_requires_matching_major_and_minor() {
    let sut = VersionInfo::current();

    let same_build = version(sut.major(), sut.minor(), sut.patch(), sut.commit_tag());
    assert_that!(sut.is_compatible_to(&same_build), eq true);
    assert_that!(sut.is_same_build_as(&same_build), eq true);

    // a differing patch or commit tag is informational, not a rejection reason
    let other_build = version(sut.major(), sut.minor(), sut.patch() + 1, "somewhere_else");
    assert_that!(sut.is_compatible_to(&other_build), eq true);
    assert_that!(sut.is_same_build_as(&other_build), eq false);

    let other_minor = version(sut.major(), sut.minor() + 1, 0, sut.commit_tag());
    assert_that!(sut.is_compatible_to(&other_minor), eq false);

    let other_major = version(sut.major() + 1, sut.minor(), 0, sut.commit_tag());
    assert_that!(sut.is_compatible_to(&other_major), eq false);
}
