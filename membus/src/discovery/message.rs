// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The messages of the discovery protocol. They are exchanged between ports exclusively
//! through the daemon's discovery pass and stored in the inboxes of interface and
//! application ports, therefore the message is a plain `repr(C)` value type.

use membus_bb_elementary::relative_ptr::RelativePointer;

use crate::discovery::service_descriptor::ServiceDescriptor;
use crate::port::chunk_queue::ChunkQueueData;

#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum DiscoveryMessageType {
    Offer,
    StopOffer,
    Sub,
    Unsub,
    Ack,
    Nack,
    Find,
    Reply,
}

/// Distinguishes whether an offer describes a plain service or a service with field
/// semantics, forwarded to interface ports.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Default)]
pub enum DiscoveryMessageSubType {
    #[default]
    NoSubType,
    Service,
    Event,
}

/// One discovery protocol message.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct DiscoveryMessage {
    pub message_type: DiscoveryMessageType,
    pub sub_type: DiscoveryMessageSubType,
    pub service: ServiceDescriptor,
    /// Number of recent chunks a subscriber requests to be replayed on connect.
    pub history_request: u64,
    /// A subscriber which sets this is only compatible with history capable publishers.
    pub requires_publisher_history_support: bool,
    /// The chunk queue of the requesting subscriber port, null for all message types which
    /// do not request a connection.
    pub queue: RelativePointer<ChunkQueueData>,
}

impl DiscoveryMessage {
    pub fn new(message_type: DiscoveryMessageType, service: ServiceDescriptor) -> Self {
        Self {
            message_type,
            sub_type: DiscoveryMessageSubType::default(),
            service,
            history_request: 0,
            requires_publisher_history_support: false,
            queue: RelativePointer::null(),
        }
    }
}
