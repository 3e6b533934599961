// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The discovery pass of the daemon. In every pass the port manager drains the pending
//! discovery messages of all ports, matches publishers and subscribers, maintains the
//! service registry and tears down every port which is flagged for destruction.

use core::ptr::NonNull;

use membus_bb_elementary::enum_gen;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_log::error_hook::ErrorLevel;
use membus_bb_log::{debug, error, fail, report_error, trace};

use crate::daemon::port_pool::{PortPool, PortPoolError};
use crate::discovery::message::{
    DiscoveryMessage, DiscoveryMessageSubType, DiscoveryMessageType,
};
use crate::discovery::service_descriptor::{ServiceDescriptor, SourceInterface, WILDCARD};
use crate::discovery::service_registry::ServiceRegistry;
use crate::memory::memory_manager::MemoryManager;
use crate::port::application::{ApplicationPort, ApplicationPortData};
use crate::port::base_port::RuntimeName;
use crate::port::condition_variable::ConditionVariableData;
use crate::port::interface::{InterfacePort, InterfacePortData};
use crate::port::node::NodeData;
use crate::port::options::{NodeName, PublisherOptions, SubscriberOptions};
use crate::port::publisher::{PublisherPortData, PublisherPortDaemon, PublisherPortUser};
use crate::port::subscriber::{SubscriberPortData, SubscriberPortDaemon, SubscriberPortUser};

enum_gen! {
    /// Failures when creating a port on behalf of a client request.
    PortCreationError

  entry:
    NoUniqueCreated

  mapping:
    PortPoolError
}

/// Matches publishers and subscribers and supervises the lifecycle of every port.
/// Daemon-local; the port data it manages lives in the management segment.
#[derive(Debug)]
pub struct PortManager {
    port_pool: PortPool,
    service_registry: ServiceRegistry,
    memory_manager: RelativePointer<MemoryManager>,
}

impl PortManager {
    pub fn new(port_pool: PortPool, memory_manager: RelativePointer<MemoryManager>) -> Self {
        Self {
            port_pool,
            service_registry: ServiceRegistry::new(),
            memory_manager,
        }
    }

    pub fn service_registry(&self) -> &ServiceRegistry {
        &self.service_registry
    }

    /// Creates a publisher port. Every service can have at most one live publisher, a
    /// second one is rejected.
    pub fn acquire_publisher_port_data(
        &mut self,
        service: &ServiceDescriptor,
        options: &PublisherOptions,
        runtime_name: &RuntimeName,
    ) -> Result<NonNull<PublisherPortData>, PortCreationError> {
        for port in self.port_pool.publisher_ports() {
            let publisher = unsafe { PublisherPortDaemon::new(port) };
            if publisher.service() == service && !publisher.is_to_be_destroyed() {
                fail!(from self, with PortCreationError::NoUniqueCreated,
                    "Unable to create a publisher for {} since the service is already published by \"{}\".",
                    service, publisher.runtime_name());
            }
        }

        Ok(fail!(from self,
            when self.port_pool.add_publisher_port(
                service.clone(),
                runtime_name.clone(),
                options,
                self.memory_manager,
            ),
            to PortCreationError,
            "Unable to create a publisher port for {}.", service))
    }

    pub fn acquire_subscriber_port_data(
        &mut self,
        service: &ServiceDescriptor,
        options: &SubscriberOptions,
        runtime_name: &RuntimeName,
    ) -> Result<NonNull<SubscriberPortData>, PortCreationError> {
        Ok(fail!(from self,
            when self
                .port_pool
                .add_subscriber_port(service.clone(), runtime_name.clone(), options),
            to PortCreationError,
            "Unable to create a subscriber port for {}.", service))
    }

    pub fn acquire_interface_port_data(
        &mut self,
        runtime_name: &RuntimeName,
        source_interface: SourceInterface,
    ) -> Result<NonNull<InterfacePortData>, PortCreationError> {
        Ok(fail!(from self,
            when self
                .port_pool
                .add_interface_port(runtime_name.clone(), source_interface),
            to PortCreationError,
            "Unable to create an interface port."))
    }

    pub fn acquire_application_port_data(
        &mut self,
        runtime_name: &RuntimeName,
    ) -> Result<NonNull<ApplicationPortData>, PortCreationError> {
        Ok(fail!(from self,
            when self.port_pool.add_application_port(runtime_name.clone()),
            to PortCreationError,
            "Unable to create an application port."))
    }

    pub fn acquire_node_data(
        &mut self,
        runtime_name: &RuntimeName,
        node_name: &NodeName,
    ) -> Result<NonNull<NodeData>, PortCreationError> {
        Ok(fail!(from self,
            when self
                .port_pool
                .add_node(runtime_name.clone(), node_name.clone()),
            to PortCreationError,
            "Unable to create a node."))
    }

    pub fn acquire_condition_variable_data(
        &mut self,
        runtime_name: &RuntimeName,
    ) -> Result<NonNull<ConditionVariableData>, PortCreationError> {
        Ok(fail!(from self,
            when self.port_pool.add_condition_variable(runtime_name.clone()),
            to PortCreationError,
            "Unable to create a condition variable."))
    }

    /// One discovery pass: drain every port's pending discovery traffic, update the
    /// registry, match peers and tear down every port flagged for destruction. After a
    /// finite number of passes without new user actions no port emits further messages.
    pub fn do_discovery(&mut self) {
        self.handle_publisher_ports();
        self.handle_subscriber_ports();
        self.handle_applications();
        self.handle_interfaces();
        self.handle_nodes();
        self.handle_condition_variables();
    }

    fn add_to_service_registry(&mut self, service: &ServiceDescriptor) {
        if self.service_registry.add(service).is_err() {
            error!(from self, "Unable to register the offered service {}.", service);
            return;
        }
        // the epoch must advance before the offer is broadcast so a reader observing the
        // new epoch sees the new set on its next find
        self.port_pool.increment_service_registry_epoch();
    }

    fn remove_from_service_registry(&mut self, service: &ServiceDescriptor) {
        self.service_registry.remove(service);
        self.port_pool.increment_service_registry_epoch();
    }

    fn handle_publisher_ports(&mut self) {
        for port in self.port_pool.publisher_ports() {
            let mut publisher = unsafe { PublisherPortDaemon::new(port) };

            if let Some(message) = publisher.try_get_discovery_message() {
                match message.message_type {
                    DiscoveryMessageType::Offer => self.add_to_service_registry(&message.service),
                    DiscoveryMessageType::StopOffer => {
                        self.remove_from_service_registry(&message.service)
                    }
                    _ => {
                        report_error!(from self, ErrorLevel::Moderate,
                            "A publisher port emitted the invalid discovery message {:?}.",
                            message.message_type);
                        continue;
                    }
                }

                self.send_to_all_matching_subscriber_ports(&message, &mut publisher);
                self.send_to_all_matching_interface_ports(&message);
            }

            if publisher.is_to_be_destroyed() {
                self.destroy_publisher_port(port);
            }
        }
    }

    fn handle_subscriber_ports(&mut self) {
        for port in self.port_pool.subscriber_ports() {
            let mut subscriber = unsafe { SubscriberPortDaemon::new(port) };

            if let Some(message) = subscriber.try_get_discovery_message() {
                match message.message_type {
                    DiscoveryMessageType::Sub | DiscoveryMessageType::Unsub => {
                        if !self.send_to_all_matching_publisher_ports(&message, &mut subscriber) {
                            debug!(from self,
                                "No matching publisher for the {:?} of {}.",
                                message.message_type, message.service);
                            let nack = DiscoveryMessage::new(
                                DiscoveryMessageType::Nack,
                                message.service.clone(),
                            );
                            subscriber.dispatch_discovery_message(&nack);
                        }
                    }
                    _ => {
                        report_error!(from self, ErrorLevel::Moderate,
                            "A subscriber port emitted the invalid discovery message {:?}.",
                            message.message_type);
                    }
                }
            }

            if subscriber.is_to_be_destroyed() {
                self.destroy_subscriber_port(port);
            }
        }
    }

    fn handle_applications(&mut self) {
        for port in self.port_pool.application_ports() {
            let application = unsafe { ApplicationPort::new(port) };

            while let Some(message) = application.try_get_message() {
                match message.message_type {
                    DiscoveryMessageType::Offer => self.add_to_service_registry(&message.service),
                    DiscoveryMessageType::StopOffer => {
                        self.remove_from_service_registry(&message.service)
                    }
                    _ => {
                        report_error!(from self, ErrorLevel::Moderate,
                            "An application port submitted the invalid discovery message {:?}.",
                            message.message_type);
                        continue;
                    }
                }

                self.send_to_all_matching_interface_ports(&message);
            }

            if unsafe { port.as_ref() }.is_to_be_destroyed() {
                self.port_pool.remove_application_port(port);
                trace!(from self, "destroyed application port");
            }
        }
    }

    fn handle_interfaces(&mut self) {
        let mut ports_for_initial_forwarding = Vec::new();

        for port in self.port_pool.interface_ports() {
            let data = unsafe { port.as_ref() };
            if data.is_to_be_destroyed() {
                self.port_pool.remove_interface_port(port);
                trace!(from self, "destroyed interface port");
                continue;
            }

            if data.take_initial_offer_forward_flag() {
                ports_for_initial_forwarding.push(port);
            }
        }

        if ports_for_initial_forwarding.is_empty() {
            return;
        }

        // replay everything which is currently offered to the new interfaces
        for service in self.service_registry.services() {
            let mut message = DiscoveryMessage::new(DiscoveryMessageType::Offer, service);
            message.sub_type = DiscoveryMessageSubType::Service;

            for port in &ports_for_initial_forwarding {
                let interface = unsafe { InterfacePort::new(*port) };
                if message.service.source_interface() != interface.source_interface() {
                    interface.dispatch(&message);
                }
            }
        }
    }

    fn handle_nodes(&mut self) {
        for node in self.port_pool.nodes() {
            if unsafe { node.as_ref() }.is_to_be_destroyed() {
                self.port_pool.remove_node(node);
                trace!(from self, "destroyed node");
            }
        }
    }

    fn handle_condition_variables(&mut self) {
        for condition_variable in self.port_pool.condition_variables() {
            if unsafe { condition_variable.as_ref() }.is_to_be_destroyed() {
                self.port_pool.remove_condition_variable(condition_variable);
                trace!(from self, "destroyed condition variable");
            }
        }
    }

    /// Dispatches a Sub or Unsub to every publisher with the same service descriptor and
    /// feeds the Ack or Nack back into the subscriber. Returns false when no publisher
    /// matched.
    fn send_to_all_matching_publisher_ports(
        &mut self,
        message: &DiscoveryMessage,
        subscriber: &mut SubscriberPortDaemon,
    ) -> bool {
        let mut publisher_found = false;

        for port in self.port_pool.publisher_ports() {
            let mut publisher = unsafe { PublisherPortDaemon::new(port) };
            if publisher.service() != subscriber.service() {
                continue;
            }

            if let Some(response) = publisher.dispatch_discovery_message(message) {
                let reaction = subscriber.dispatch_discovery_message(&response);
                debug_assert!(reaction.is_none(), "Ack and Nack provoke no further reaction.");
            }
            publisher_found = true;
        }

        publisher_found
    }

    /// Dispatches an Offer or StopOffer to every subscriber with the same service
    /// descriptor. A subscriber reacting with a Sub is connected to the publisher right
    /// away.
    fn send_to_all_matching_subscriber_ports(
        &mut self,
        message: &DiscoveryMessage,
        publisher: &mut PublisherPortDaemon,
    ) {
        for port in self.port_pool.subscriber_ports() {
            let mut subscriber = unsafe { SubscriberPortDaemon::new(port) };
            if subscriber.service() != publisher.service() {
                continue;
            }

            if let Some(response) = subscriber.dispatch_discovery_message(message) {
                debug_assert!(
                    message.message_type == DiscoveryMessageType::Offer,
                    "Only an Offer provokes a subscriber reaction."
                );

                if let Some(publisher_response) = publisher.dispatch_discovery_message(&response) {
                    let reaction = subscriber.dispatch_discovery_message(&publisher_response);
                    debug_assert!(
                        reaction.is_none(),
                        "Ack and Nack provoke no further reaction."
                    );
                }
            }
        }
    }

    fn send_to_all_matching_interface_ports(&mut self, message: &DiscoveryMessage) {
        for port in self.port_pool.interface_ports() {
            let interface = unsafe { InterfacePort::new(port) };
            // never echo a message back onto the interface it came from
            if message.service.source_interface() != interface.source_interface() {
                interface.dispatch(message);
            }
        }
    }

    /// Orderly teardown of a publisher port: release every chunk, withdraw the offer,
    /// distribute the StopOffer and remove the port from the pool.
    pub fn destroy_publisher_port(&mut self, port: NonNull<PublisherPortData>) {
        let mut publisher = unsafe { PublisherPortDaemon::new(port) };
        let publisher_user =
            PublisherPortUser::new(RelativePointer::from_ptr(port.as_ptr() as *const _));

        publisher.release_all_chunks();
        publisher_user.stop_offer();

        if let Some(message) = publisher.try_get_discovery_message() {
            debug_assert!(message.message_type == DiscoveryMessageType::StopOffer);

            self.remove_from_service_registry(&message.service);
            self.send_to_all_matching_subscriber_ports(&message, &mut publisher);
            self.send_to_all_matching_interface_ports(&message);
        }

        self.port_pool.remove_publisher_port(port);
        trace!(from self, "destroyed publisher port");
    }

    /// Orderly teardown of a subscriber port: release every chunk, withdraw the
    /// subscription and remove the port from the pool.
    pub fn destroy_subscriber_port(&mut self, port: NonNull<SubscriberPortData>) {
        let mut subscriber = unsafe { SubscriberPortDaemon::new(port) };
        let subscriber_user =
            SubscriberPortUser::new(RelativePointer::from_ptr(port.as_ptr() as *const _));

        subscriber.release_all_chunks();
        subscriber_user.unsubscribe();

        if let Some(message) = subscriber.try_get_discovery_message() {
            debug_assert!(message.message_type == DiscoveryMessageType::Unsub);
            self.send_to_all_matching_publisher_ports(&message, &mut subscriber);
        }

        self.port_pool.remove_subscriber_port(port);
        trace!(from self, "destroyed subscriber port");
    }

    /// Flags every port of a process for destruction, the next discovery pass tears them
    /// down in order.
    pub fn mark_ports_of_process(&mut self, runtime_name: &str) {
        let runtime_name = RuntimeName::from_bytes_truncated(runtime_name.as_bytes());

        for port in self.port_pool.publisher_ports() {
            let data = unsafe { port.as_ref() };
            if *data.base().runtime_name() == runtime_name {
                data.base().mark_to_be_destroyed();
            }
        }
        for port in self.port_pool.subscriber_ports() {
            let data = unsafe { port.as_ref() };
            if *data.base().runtime_name() == runtime_name {
                data.base().mark_to_be_destroyed();
            }
        }
        for port in self.port_pool.interface_ports() {
            let data = unsafe { port.as_ref() };
            if *data.runtime_name() == runtime_name {
                data.mark_to_be_destroyed();
            }
        }
        for port in self.port_pool.application_ports() {
            let data = unsafe { port.as_ref() };
            if *data.runtime_name() == runtime_name {
                data.mark_to_be_destroyed();
            }
        }
        for node in self.port_pool.nodes() {
            let data = unsafe { node.as_ref() };
            if *data.runtime_name() == runtime_name {
                data.mark_to_be_destroyed();
            }
        }
        for condition_variable in self.port_pool.condition_variables() {
            let data = unsafe { condition_variable.as_ref() };
            if *data.runtime_name() == runtime_name {
                data.mark_to_be_destroyed();
            }
        }
    }

    /// Immediately tears down every port of a process. Used when a process unregisters or
    /// its stale unmonitored record is replaced.
    pub fn delete_ports_of_process(&mut self, runtime_name: &str) {
        self.mark_ports_of_process(runtime_name);

        let name = RuntimeName::from_bytes_truncated(runtime_name.as_bytes());
        for port in self.port_pool.publisher_ports() {
            if *unsafe { port.as_ref() }.base().runtime_name() == name {
                self.destroy_publisher_port(port);
            }
        }
        for port in self.port_pool.subscriber_ports() {
            if *unsafe { port.as_ref() }.base().runtime_name() == name {
                self.destroy_subscriber_port(port);
            }
        }
        for port in self.port_pool.interface_ports() {
            if *unsafe { port.as_ref() }.runtime_name() == name {
                self.port_pool.remove_interface_port(port);
            }
        }
        for port in self.port_pool.application_ports() {
            if *unsafe { port.as_ref() }.runtime_name() == name {
                self.port_pool.remove_application_port(port);
            }
        }
        for node in self.port_pool.nodes() {
            if *unsafe { node.as_ref() }.runtime_name() == name {
                self.port_pool.remove_node(node);
            }
        }
        for condition_variable in self.port_pool.condition_variables() {
            if *unsafe { condition_variable.as_ref() }.runtime_name() == name {
                self.port_pool.remove_condition_variable(condition_variable);
            }
        }
    }

    /// Answers a service search and forwards the Find to every interface port.
    pub fn find_service(
        &mut self,
        service: Option<&[u8]>,
        instance: Option<&[u8]>,
    ) -> Vec<ServiceDescriptor> {
        let searched = ServiceDescriptor::new(
            service.unwrap_or(WILDCARD),
            instance.unwrap_or(WILDCARD),
            WILDCARD,
        );
        if let Ok(searched) = searched {
            let message = DiscoveryMessage::new(DiscoveryMessageType::Find, searched);
            self.send_to_all_matching_interface_ports(&message);
        }

        self.service_registry.find(service, instance)
    }
}
