// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The version of the shared memory layout and the ipc protocol. Every client sends its
//! [`VersionInfo`] with the registration request; the daemon rejects incompatible clients
//! before any shared resource is handed out.

use core::fmt::Display;

use membus_bb_log::fail;

use crate::constants::{VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH};

/// The commit-ish build tag carried in the [`VersionInfo`], settable at build time.
pub const VERSION_COMMIT_TAG: &str = match option_env!("MEMBUS_COMMIT_TAG") {
    Some(commit_tag) => commit_tag,
    None => "unreleased",
};

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum VersionInfoParseError {
    WrongNumberOfFields,
    InvalidNumericField,
}

/// Version of one communication participant: semantic version plus a commit-ish tag which
/// identifies the exact build.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct VersionInfo {
    major: u64,
    minor: u64,
    patch: u64,
    commit_tag: String,
}

impl VersionInfo {
    /// The version of this build.
    pub fn current() -> VersionInfo {
        VersionInfo {
            major: VERSION_MAJOR,
            minor: VERSION_MINOR,
            patch: VERSION_PATCH,
            commit_tag: VERSION_COMMIT_TAG.to_string(),
        }
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn commit_tag(&self) -> &str {
        &self.commit_tag
    }

    /// Two versions are compatible when major and minor match; patch and commit tag are
    /// informational and never a reason for rejection.
    pub fn is_compatible_to(&self, other: &VersionInfo) -> bool {
        self.major == other.major && self.minor == other.minor
    }

    /// Returns true when the builds are identical, down to the commit tag.
    pub fn is_same_build_as(&self, other: &VersionInfo) -> bool {
        self == other
    }

    /// Encodes the version into ipc frame entries.
    pub fn serialize(&self) -> [String; 4] {
        [
            self.major.to_string(),
            self.minor.to_string(),
            self.patch.to_string(),
            self.commit_tag.clone(),
        ]
    }

    /// Decodes a version from ipc frame entries, the inverse of
    /// [`VersionInfo::serialize()`].
    pub fn deserialize(entries: &[&str]) -> Result<VersionInfo, VersionInfoParseError> {
        let msg = "Unable to deserialize version info";
        let origin = "VersionInfo::deserialize()";
        if entries.len() != 4 {
            fail!(from origin, with VersionInfoParseError::WrongNumberOfFields,
                "{} since {} fields were provided instead of 4.", msg, entries.len());
        }

        let parse = |field: &str| -> Result<u64, VersionInfoParseError> {
            match field.parse::<u64>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    fail!(from origin, with VersionInfoParseError::InvalidNumericField,
                        "{} since \"{}\" is no valid decimal number.", msg, field);
                }
            }
        };

        Ok(VersionInfo {
            major: parse(entries[0])?,
            minor: parse(entries[1])?,
            patch: parse(entries[2])?,
            commit_tag: entries[3].to_string(),
        })
    }
}

impl Display for VersionInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}.{}.{} ({})",
            self.major, self.minor, self.patch, self.commit_tag
        )
    }
}
