// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The directory of all port data records. [`PortPoolData`] is placement-constructed into
//! the management segment; every record is stored in a fixed-position container so
//! relative pointers to it stay valid for its whole lifetime. The pool is mutated only by
//! the daemon.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

use membus_bb_container::fixed_position_container::FixedPositionContainer;
use membus_bb_elementary::placement_default::PlacementDefault;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_elementary::unique_id::UniqueId;
use membus_bb_log::error_hook::ErrorLevel;
use membus_bb_log::report_error;

use crate::constants::{
    MAX_APPLICATIONS, MAX_CONDITION_VARIABLES, MAX_INTERFACES, MAX_NODES, MAX_PUBLISHERS,
    MAX_SUBSCRIBERS,
};
use crate::discovery::service_descriptor::{ServiceDescriptor, SourceInterface};
use crate::memory::memory_manager::MemoryManager;
use crate::port::application::ApplicationPortData;
use crate::port::base_port::{RuntimeName, UniquePortId};
use crate::port::condition_variable::ConditionVariableData;
use crate::port::interface::InterfacePortData;
use crate::port::node::NodeData;
use crate::port::options::{NodeName, PublisherOptions, SubscriberOptions};
use crate::port::publisher::PublisherPortData;
use crate::port::subscriber::SubscriberPortData;

/// A fixed-size port list is exhausted.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum PortPoolError {
    PublisherListFull,
    SubscriberListFull,
    InterfaceListFull,
    ApplicationListFull,
    NodeListFull,
    ConditionVariableListFull,
}

/// Lives at the beginning of the management segment.
#[repr(C)]
#[derive(Debug)]
pub struct PortPoolData {
    publishers: FixedPositionContainer<PublisherPortData, MAX_PUBLISHERS>,
    subscribers: FixedPositionContainer<SubscriberPortData, MAX_SUBSCRIBERS>,
    interfaces: FixedPositionContainer<InterfacePortData, MAX_INTERFACES>,
    applications: FixedPositionContainer<ApplicationPortData, MAX_APPLICATIONS>,
    nodes: FixedPositionContainer<NodeData, MAX_NODES>,
    condition_variables: FixedPositionContainer<ConditionVariableData, MAX_CONDITION_VARIABLES>,
    service_registry_epoch: AtomicU64,
    daemon_id: u64,
}

impl PortPoolData {
    /// Constructs the pool directly at the provided memory position. The pool is too
    /// large to be materialized on the stack first.
    ///
    /// # Safety
    ///
    ///  * `ptr` must point to uninitialized memory fitting [`PortPoolData`] in size and
    ///    alignment
    ///
    pub unsafe fn placement_new(ptr: *mut PortPoolData, daemon_id: u64) {
        unsafe {
            PlacementDefault::placement_default(core::ptr::addr_of_mut!((*ptr).publishers));
            PlacementDefault::placement_default(core::ptr::addr_of_mut!((*ptr).subscribers));
            PlacementDefault::placement_default(core::ptr::addr_of_mut!((*ptr).interfaces));
            PlacementDefault::placement_default(core::ptr::addr_of_mut!((*ptr).applications));
            PlacementDefault::placement_default(core::ptr::addr_of_mut!((*ptr).nodes));
            PlacementDefault::placement_default(core::ptr::addr_of_mut!(
                (*ptr).condition_variables
            ));
            core::ptr::addr_of_mut!((*ptr).service_registry_epoch).write(AtomicU64::new(0));
            core::ptr::addr_of_mut!((*ptr).daemon_id).write(daemon_id);
        }
    }

    pub fn daemon_id(&self) -> u64 {
        self.daemon_id
    }

    /// The epoch advances on every service registry change, clients poll it to detect
    /// changes cheaply without an ipc round trip.
    pub fn service_registry_epoch(&self) -> u64 {
        self.service_registry_epoch.load(Ordering::Acquire)
    }
}

/// Typed facade through which the daemon creates, enumerates and removes port data
/// records.
#[derive(Debug)]
pub struct PortPool {
    data: NonNull<PortPoolData>,
}

impl PortPool {
    /// # Safety
    ///
    ///  * `data` must point to an initialized [`PortPoolData`] which outlives the pool
    ///
    pub unsafe fn new(data: NonNull<PortPoolData>) -> Self {
        Self { data }
    }

    fn data(&mut self) -> &mut PortPoolData {
        unsafe { self.data.as_mut() }
    }

    /// Increments the service registry epoch. Must happen before the broadcast of the
    /// change it represents.
    pub fn increment_service_registry_epoch(&mut self) {
        self.data()
            .service_registry_epoch
            .fetch_add(1, Ordering::Release);
    }

    pub fn add_publisher_port(
        &mut self,
        service: ServiceDescriptor,
        runtime_name: RuntimeName,
        options: &PublisherOptions,
        memory_manager: RelativePointer<MemoryManager>,
    ) -> Result<NonNull<PublisherPortData>, PortPoolError> {
        let port = PublisherPortData::new(
            service,
            runtime_name,
            options,
            memory_manager,
            UniquePortId(UniqueId::new().value()),
        );

        match self.data().publishers.insert(port) {
            Some(port) => Ok(port),
            None => {
                report_error!(from self, ErrorLevel::Severe,
                    "Unable to create another publisher port, the limit of {} is reached.",
                    MAX_PUBLISHERS);
                Err(PortPoolError::PublisherListFull)
            }
        }
    }

    pub fn remove_publisher_port(&mut self, port: NonNull<PublisherPortData>) {
        self.data().publishers.remove(port.as_ptr());
    }

    pub fn publisher_ports(&mut self) -> Vec<NonNull<PublisherPortData>> {
        self.data().publishers.iter_ptr().collect()
    }

    pub fn add_subscriber_port(
        &mut self,
        service: ServiceDescriptor,
        runtime_name: RuntimeName,
        options: &SubscriberOptions,
    ) -> Result<NonNull<SubscriberPortData>, PortPoolError> {
        let port = SubscriberPortData::new(
            service,
            runtime_name,
            options,
            UniquePortId(UniqueId::new().value()),
        );

        match self.data().subscribers.insert(port) {
            Some(port) => Ok(port),
            None => {
                report_error!(from self, ErrorLevel::Severe,
                    "Unable to create another subscriber port, the limit of {} is reached.",
                    MAX_SUBSCRIBERS);
                Err(PortPoolError::SubscriberListFull)
            }
        }
    }

    pub fn remove_subscriber_port(&mut self, port: NonNull<SubscriberPortData>) {
        self.data().subscribers.remove(port.as_ptr());
    }

    pub fn subscriber_ports(&mut self) -> Vec<NonNull<SubscriberPortData>> {
        self.data().subscribers.iter_ptr().collect()
    }

    pub fn add_interface_port(
        &mut self,
        runtime_name: RuntimeName,
        source_interface: SourceInterface,
    ) -> Result<NonNull<InterfacePortData>, PortPoolError> {
        match self
            .data()
            .interfaces
            .insert(InterfacePortData::new(runtime_name, source_interface))
        {
            Some(port) => Ok(port),
            None => {
                report_error!(from self, ErrorLevel::Severe,
                    "Unable to create another interface port, the limit of {} is reached.",
                    MAX_INTERFACES);
                Err(PortPoolError::InterfaceListFull)
            }
        }
    }

    pub fn remove_interface_port(&mut self, port: NonNull<InterfacePortData>) {
        self.data().interfaces.remove(port.as_ptr());
    }

    pub fn interface_ports(&mut self) -> Vec<NonNull<InterfacePortData>> {
        self.data().interfaces.iter_ptr().collect()
    }

    pub fn add_application_port(
        &mut self,
        runtime_name: RuntimeName,
    ) -> Result<NonNull<ApplicationPortData>, PortPoolError> {
        match self
            .data()
            .applications
            .insert(ApplicationPortData::new(runtime_name))
        {
            Some(port) => Ok(port),
            None => {
                report_error!(from self, ErrorLevel::Severe,
                    "Unable to create another application port, the limit of {} is reached.",
                    MAX_APPLICATIONS);
                Err(PortPoolError::ApplicationListFull)
            }
        }
    }

    pub fn remove_application_port(&mut self, port: NonNull<ApplicationPortData>) {
        self.data().applications.remove(port.as_ptr());
    }

    pub fn application_ports(&mut self) -> Vec<NonNull<ApplicationPortData>> {
        self.data().applications.iter_ptr().collect()
    }

    pub fn add_node(
        &mut self,
        runtime_name: RuntimeName,
        node_name: NodeName,
    ) -> Result<NonNull<NodeData>, PortPoolError> {
        match self
            .data()
            .nodes
            .insert(NodeData::new(runtime_name, node_name))
        {
            Some(node) => Ok(node),
            None => {
                report_error!(from self, ErrorLevel::Severe,
                    "Unable to create another node, the limit of {} is reached.", MAX_NODES);
                Err(PortPoolError::NodeListFull)
            }
        }
    }

    pub fn remove_node(&mut self, node: NonNull<NodeData>) {
        self.data().nodes.remove(node.as_ptr());
    }

    pub fn nodes(&mut self) -> Vec<NonNull<NodeData>> {
        self.data().nodes.iter_ptr().collect()
    }

    pub fn add_condition_variable(
        &mut self,
        runtime_name: RuntimeName,
    ) -> Result<NonNull<ConditionVariableData>, PortPoolError> {
        match self
            .data()
            .condition_variables
            .insert(ConditionVariableData::new(runtime_name))
        {
            Some(condition_variable) => Ok(condition_variable),
            None => {
                report_error!(from self, ErrorLevel::Severe,
                    "Unable to create another condition variable, the limit of {} is reached.",
                    MAX_CONDITION_VARIABLES);
                Err(PortPoolError::ConditionVariableListFull)
            }
        }
    }

    pub fn remove_condition_variable(&mut self, condition_variable: NonNull<ConditionVariableData>) {
        self.data()
            .condition_variables
            .remove(condition_variable.as_ptr());
    }

    pub fn condition_variables(&mut self) -> Vec<NonNull<ConditionVariableData>> {
        self.data().condition_variables.iter_ptr().collect()
    }
}
