// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The state every port kind shares.

use core::sync::atomic::{AtomicBool, Ordering};

use membus_bb_container::byte_string::FixedSizeByteString;

use crate::constants::RUNTIME_NAME_LENGTH;
use crate::discovery::service_descriptor::ServiceDescriptor;
use crate::port::options::NodeName;

/// Bounded string type for runtime (process) names.
pub type RuntimeName = FixedSizeByteString<RUNTIME_NAME_LENGTH>;

/// Uniquely identifies a port for the lifetime of the daemon.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub struct UniquePortId(pub u64);

/// Fields embedded in every port data record.
#[repr(C)]
#[derive(Debug)]
pub struct BasePortData {
    service: ServiceDescriptor,
    runtime_name: RuntimeName,
    node_name: NodeName,
    unique_id: u64,
    to_be_destroyed: AtomicBool,
}

impl BasePortData {
    pub fn new(
        service: ServiceDescriptor,
        runtime_name: RuntimeName,
        node_name: NodeName,
        unique_id: UniquePortId,
    ) -> Self {
        Self {
            service,
            runtime_name,
            node_name,
            unique_id: unique_id.0,
            to_be_destroyed: AtomicBool::new(false),
        }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn runtime_name(&self) -> &RuntimeName {
        &self.runtime_name
    }

    pub fn node_name(&self) -> &NodeName {
        &self.node_name
    }

    pub fn unique_id(&self) -> UniquePortId {
        UniquePortId(self.unique_id)
    }

    /// Tells the next discovery pass to tear the port down cleanly.
    pub fn mark_to_be_destroyed(&self) {
        self.to_be_destroyed.store(true, Ordering::Release);
    }

    pub fn is_to_be_destroyed(&self) -> bool {
        self.to_be_destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn to_be_destroyed_flag(&self) -> &AtomicBool {
        &self.to_be_destroyed
    }
}
