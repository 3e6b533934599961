// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A node groups the ports of one process under a name. The record exists so the daemon
//! can enumerate the structure of a process, it carries no machinery of its own.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::port::base_port::RuntimeName;
use crate::port::options::NodeName;

/// Lives in the daemon's port pool.
#[repr(C)]
#[derive(Debug)]
pub struct NodeData {
    runtime_name: RuntimeName,
    node_name: NodeName,
    to_be_destroyed: AtomicBool,
}

impl NodeData {
    pub fn new(runtime_name: RuntimeName, node_name: NodeName) -> Self {
        Self {
            runtime_name,
            node_name,
            to_be_destroyed: AtomicBool::new(false),
        }
    }

    pub fn runtime_name(&self) -> &RuntimeName {
        &self.runtime_name
    }

    pub fn node_name(&self) -> &NodeName {
        &self.node_name
    }

    pub fn mark_to_be_destroyed(&self) {
        self.to_be_destroyed.store(true, Ordering::Release);
    }

    pub fn is_to_be_destroyed(&self) -> bool {
        self.to_be_destroyed.load(Ordering::Acquire)
    }
}
