// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The subscriber port. [`SubscriberPortData`] lives in the daemon's port pool; the owning
//! process operates through the [`SubscriberPortUser`] view while the daemon drives the
//! subscription state machine through the [`SubscriberPortDaemon`] view.
//!
//! State machine driven by the two views:
//!
//! | state                 | event              | next                  | emits |
//! |-----------------------|--------------------|-----------------------|-------|
//! | not subscribed        | user `subscribe`   | subscribe requested   | Sub   |
//! | subscribe requested   | Ack                | subscribed            | -     |
//! | subscribe requested   | Nack               | wait for offer        | -     |
//! | subscribed            | user `unsubscribe` | unsubscribe requested | Unsub |
//! | unsubscribe requested | Ack/Nack           | not subscribed        | -     |
//! | subscribed            | peer StopOffer     | wait for offer        | -     |
//! | wait for offer        | peer Offer         | subscribe requested   | Sub   |
//!
//! The state lives in a shared atomic so the owning process observes every transition
//! immediately.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_log::warn;

use crate::discovery::message::{DiscoveryMessage, DiscoveryMessageType};
use crate::discovery::service_descriptor::ServiceDescriptor;
use crate::memory::chunk_header::ChunkHeader;
use crate::port::base_port::{BasePortData, RuntimeName, UniquePortId};
use crate::port::chunk_queue::ChunkQueueData;
use crate::port::chunk_receiver::{
    ChunkReceiveError, ChunkReceiver, ChunkReceiverData, ChunkReleaseError,
};
use crate::port::condition_variable::ConditionVariableData;
use crate::port::options::SubscriberOptions;

/// The subscription state of a subscriber port.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum SubscriptionState {
    NotSubscribed = 0,
    SubscribeRequested = 1,
    Subscribed = 2,
    UnsubscribeRequested = 3,
    /// The subscription was not answered or the publisher disappeared; the port
    /// re-subscribes as soon as a matching offer arrives.
    WaitForOffer = 4,
}

impl SubscriptionState {
    fn from_u8(value: u8) -> SubscriptionState {
        match value {
            0 => SubscriptionState::NotSubscribed,
            1 => SubscriptionState::SubscribeRequested,
            2 => SubscriptionState::Subscribed,
            3 => SubscriptionState::UnsubscribeRequested,
            _ => SubscriptionState::WaitForOffer,
        }
    }
}

/// A chunk received from a subscriber port. The chunk stays tracked by the port until it
/// is released, death of the owning process releases it through the port teardown.
#[derive(Debug)]
pub struct Chunk {
    header: RelativePointer<ChunkHeader>,
}

impl Chunk {
    pub(crate) fn new(header: RelativePointer<ChunkHeader>) -> Self {
        Self { header }
    }

    pub(crate) fn relative_header(&self) -> RelativePointer<ChunkHeader> {
        self.header
    }

    pub fn header(&self) -> &ChunkHeader {
        unsafe { &*self.header.as_ptr() }
    }

    pub fn sequence_number(&self) -> u64 {
        self.header().sequence_number()
    }

    /// The used payload of the chunk.
    pub fn payload(&self) -> &[u8] {
        let header = self.header();
        unsafe { core::slice::from_raw_parts(header.payload_ptr(), header.used_size() as usize) }
    }
}

/// Lives in the daemon's port pool.
#[repr(C)]
#[derive(Debug)]
pub struct SubscriberPortData {
    base: BasePortData,
    receiver: ChunkReceiverData,
    subscribe_requested: AtomicBool,
    subscription_state: AtomicU8,
    history_request: u64,
    requires_publisher_history_support: bool,
}

impl SubscriberPortData {
    pub fn new(
        service: ServiceDescriptor,
        runtime_name: RuntimeName,
        options: &SubscriberOptions,
        unique_id: UniquePortId,
    ) -> Self {
        Self {
            base: BasePortData::new(
                service,
                runtime_name,
                options.node_name.clone(),
                unique_id,
            ),
            receiver: ChunkReceiverData::new(
                options.clamped_queue_capacity() as usize,
                options.queue_full_policy,
                unique_id.0,
            ),
            subscribe_requested: AtomicBool::new(options.subscribe_on_create),
            subscription_state: AtomicU8::new(SubscriptionState::NotSubscribed as u8),
            history_request: options.history_request,
            requires_publisher_history_support: options.requires_publisher_history_support,
        }
    }

    pub fn base(&self) -> &BasePortData {
        &self.base
    }

    pub fn history_request(&self) -> u64 {
        self.history_request
    }

    fn queue_ptr(&self) -> RelativePointer<ChunkQueueData> {
        RelativePointer::from_ptr(self.receiver.queue() as *const ChunkQueueData)
    }

    fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.subscription_state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SubscriptionState) {
        self.subscription_state.store(state as u8, Ordering::Release);
    }
}

/// View of the process which owns the port.
#[derive(Debug)]
pub struct SubscriberPortUser {
    data: RelativePointer<SubscriberPortData>,
}

impl SubscriberPortUser {
    pub fn new(data: RelativePointer<SubscriberPortData>) -> Self {
        Self { data }
    }

    fn data(&self) -> &SubscriberPortData {
        unsafe { &*self.data.as_ptr() }
    }

    pub fn id(&self) -> UniquePortId {
        self.data().base.unique_id()
    }

    pub fn service(&self) -> &ServiceDescriptor {
        self.data().base.service()
    }

    /// Requests the daemon to connect the port to a matching publisher.
    pub fn subscribe(&self) {
        self.data()
            .subscribe_requested
            .store(true, Ordering::Release);
    }

    /// Requests the daemon to disconnect the port.
    pub fn unsubscribe(&self) {
        self.data()
            .subscribe_requested
            .store(false, Ordering::Release);
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.data().state()
    }

    /// Returns true when the queue holds at least one chunk.
    pub fn has_chunks(&self) -> bool {
        ChunkReceiver::new(&self.data().receiver).has_chunks()
    }

    /// Returns whether the queue dropped chunks on overflow since the last call and
    /// clears the flag.
    pub fn has_lost_chunks(&self) -> bool {
        ChunkReceiver::new(&self.data().receiver).has_lost_chunks()
    }

    /// Receives the oldest queued chunk. Returns [`None`] when the queue is empty.
    pub fn try_get_chunk(&self) -> Result<Option<Chunk>, ChunkReceiveError> {
        ChunkReceiver::new(&self.data().receiver)
            .try_get_chunk()
            .map(|chunk| chunk.map(Chunk::new))
    }

    /// Releases a received chunk, returning it to its pool when this was the last
    /// reference anywhere.
    pub fn release_chunk(&self, chunk: Chunk) -> Result<(), ChunkReleaseError> {
        ChunkReceiver::new(&self.data().receiver).release_chunk(chunk.relative_header())
    }

    /// Releases every queued chunk without handing it to the user.
    pub fn release_queued_chunks(&self) {
        ChunkReceiver::new(&self.data().receiver).release_queued_chunks()
    }

    /// Attaches a condition variable which is notified on every delivered chunk.
    pub fn set_condition_variable(
        &self,
        condition_variable: RelativePointer<ConditionVariableData>,
    ) {
        self.data().receiver.queue().set_trigger(condition_variable);
    }

    /// Detaches the condition variable.
    pub fn unset_condition_variable(&self) {
        self.data().receiver.queue().unset_trigger();
    }
}

/// View of the daemon which drives the discovery protocol of the port.
#[derive(Debug)]
pub struct SubscriberPortDaemon {
    data: NonNull<SubscriberPortData>,
}

impl SubscriberPortDaemon {
    /// # Safety
    ///
    ///  * `data` must point to a [`SubscriberPortData`] inside the port pool and stay
    ///    valid for the lifetime of this view
    ///
    pub unsafe fn new(data: NonNull<SubscriberPortData>) -> Self {
        Self { data }
    }

    fn data(&self) -> &SubscriberPortData {
        unsafe { self.data.as_ref() }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        self.data().base.service()
    }

    pub fn runtime_name(&self) -> &RuntimeName {
        self.data().base.runtime_name()
    }

    pub fn is_to_be_destroyed(&self) -> bool {
        self.data().base.is_to_be_destroyed()
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.data().state()
    }

    fn subscription_message(&self) -> DiscoveryMessage {
        let data = self.data();
        let mut message =
            DiscoveryMessage::new(DiscoveryMessageType::Sub, data.base.service().clone());
        message.history_request = data.history_request;
        message.requires_publisher_history_support = data.requires_publisher_history_support;
        message.queue = data.queue_ptr();
        message
    }

    /// Picks up a subscription state change the user requested. Emits the Sub or Unsub
    /// which the discovery pass dispatches to the matching publisher.
    pub fn try_get_discovery_message(&mut self) -> Option<DiscoveryMessage> {
        let data = self.data();
        let requested = data.subscribe_requested.load(Ordering::Acquire);

        match (requested, data.state()) {
            (true, SubscriptionState::NotSubscribed) => {
                data.set_state(SubscriptionState::SubscribeRequested);
                Some(self.subscription_message())
            }
            (false, SubscriptionState::Subscribed) => {
                data.set_state(SubscriptionState::UnsubscribeRequested);
                let mut message =
                    DiscoveryMessage::new(DiscoveryMessageType::Unsub, data.base.service().clone());
                message.queue = data.queue_ptr();
                Some(message)
            }
            (false, SubscriptionState::WaitForOffer) => {
                data.set_state(SubscriptionState::NotSubscribed);
                None
            }
            _ => None,
        }
    }

    /// Processes a message of the matching publisher and returns a possible reaction, a
    /// re-subscription on a fresh offer.
    pub fn dispatch_discovery_message(
        &mut self,
        message: &DiscoveryMessage,
    ) -> Option<DiscoveryMessage> {
        let data = self.data();

        match message.message_type {
            DiscoveryMessageType::Ack => {
                match data.state() {
                    SubscriptionState::SubscribeRequested => {
                        data.set_state(SubscriptionState::Subscribed)
                    }
                    SubscriptionState::UnsubscribeRequested => {
                        data.set_state(SubscriptionState::NotSubscribed)
                    }
                    state => {
                        warn!(from self, "Received an Ack in the unexpected state {:?}.", state);
                    }
                }
                None
            }
            DiscoveryMessageType::Nack => {
                match data.state() {
                    SubscriptionState::SubscribeRequested => {
                        data.set_state(SubscriptionState::WaitForOffer)
                    }
                    SubscriptionState::UnsubscribeRequested => {
                        data.set_state(SubscriptionState::NotSubscribed)
                    }
                    state => {
                        warn!(from self, "Received a Nack in the unexpected state {:?}.", state);
                    }
                }
                None
            }
            DiscoveryMessageType::StopOffer => {
                if matches!(
                    data.state(),
                    SubscriptionState::Subscribed | SubscriptionState::SubscribeRequested
                ) {
                    data.set_state(SubscriptionState::WaitForOffer);
                }
                None
            }
            DiscoveryMessageType::Offer => {
                let requested = data.subscribe_requested.load(Ordering::Acquire);
                let state = data.state();
                let resubscribe = requested
                    && matches!(
                        state,
                        SubscriptionState::WaitForOffer | SubscriptionState::NotSubscribed
                    );

                if resubscribe {
                    data.set_state(SubscriptionState::SubscribeRequested);
                    Some(self.subscription_message())
                } else {
                    None
                }
            }
            _ => {
                warn!(from self,
                    "The port received the unexpected discovery message {:?}.",
                    message.message_type);
                None
            }
        }
    }

    /// Releases every held and every queued chunk. Used on port teardown.
    pub fn release_all_chunks(&mut self) {
        ChunkReceiver::new(&self.data().receiver).release_all();
    }

    /// The chunk queue of this port, handed to the publisher on connect.
    pub fn queue_ptr(&self) -> RelativePointer<ChunkQueueData> {
        self.data().queue_ptr()
    }
}
