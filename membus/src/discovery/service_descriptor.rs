// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `(service, instance, event)` triple which identifies a topic.

use core::fmt::Display;

use membus_bb_container::byte_string::FixedSizeByteString;
use membus_bb_log::fail;

use crate::constants::SERVICE_STRING_LENGTH;

/// Bounded string type of the descriptor fields.
pub type ServiceString = FixedSizeByteString<SERVICE_STRING_LENGTH>;

/// The reserved wildcard token of [`ServiceDescriptor`] searches.
pub const WILDCARD: &[u8] = b"*";

/// Identifies the interface a service originates from. Services offered by local ports
/// belong to [`SourceInterface::Internal`], gateway ports tag their services with their own
/// interface so offers are not echoed back to them.
#[repr(u32)]
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Default)]
pub enum SourceInterface {
    #[default]
    Internal = 0,
    External = 1,
}

impl SourceInterface {
    pub fn from_u32(value: u32) -> Option<SourceInterface> {
        match value {
            0 => Some(SourceInterface::Internal),
            1 => Some(SourceInterface::External),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ServiceDescriptorError {
    EntryTooLong,
}

/// A `(service, instance, event)` triple of bounded strings. Lives in shared memory inside
/// every port, therefore `repr(C)` with fixed-capacity strings.
#[repr(C)]
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct ServiceDescriptor {
    service: ServiceString,
    instance: ServiceString,
    event: ServiceString,
    source_interface: SourceInterface,
}

impl ServiceDescriptor {
    pub fn new(
        service: &[u8],
        instance: &[u8],
        event: &[u8],
    ) -> Result<Self, ServiceDescriptorError> {
        let msg = "Unable to create service descriptor";
        let create = |field: &[u8]| -> Result<ServiceString, ServiceDescriptorError> {
            match ServiceString::from_bytes(field) {
                Ok(v) => Ok(v),
                Err(_) => {
                    fail!(from "ServiceDescriptor::new()", with ServiceDescriptorError::EntryTooLong,
                        "{} since an entry exceeds the maximum supported length of {}.",
                        msg, SERVICE_STRING_LENGTH);
                }
            }
        };

        Ok(Self {
            service: create(service)?,
            instance: create(instance)?,
            event: create(event)?,
            source_interface: SourceInterface::Internal,
        })
    }

    pub fn service(&self) -> &ServiceString {
        &self.service
    }

    pub fn instance(&self) -> &ServiceString {
        &self.instance
    }

    pub fn event(&self) -> &ServiceString {
        &self.event
    }

    pub fn source_interface(&self) -> SourceInterface {
        self.source_interface
    }

    pub fn set_source_interface(&mut self, source_interface: SourceInterface) {
        self.source_interface = source_interface;
    }

    /// Returns true when service and instance match the provided search keys, [`None`]
    /// behaves like the wildcard.
    pub fn matches_search(&self, service: Option<&[u8]>, instance: Option<&[u8]>) -> bool {
        let field_matches = |field: &ServiceString, key: Option<&[u8]>| match key {
            None => true,
            Some(key) => field.as_bytes() == key,
        };

        field_matches(&self.service, service) && field_matches(&self.instance, instance)
    }
}

impl Display for ServiceDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Service: {}, Instance: {}, Event: {}",
            self.service, self.instance, self.event
        )
    }
}
