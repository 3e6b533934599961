// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The publisher port. [`PublisherPortData`] lives in the daemon's port pool; the owning
//! process operates through the [`PublisherPortUser`] view while the daemon drives the
//! offer state machine through the [`PublisherPortDaemon`] view.
//!
//! State machine driven by the two views:
//!
//! | state            | event                      | next             | emits      |
//! |------------------|----------------------------|------------------|------------|
//! | not offered      | user `offer`               | offer pending    | Offer      |
//! | offer pending    | daemon picks up the flag   | offered          | -          |
//! | offered          | peer Sub, compatible       | offered          | Ack        |
//! | offered          | peer Sub, incompatible     | offered          | Nack       |
//! | offered          | peer Unsub                 | offered          | Ack        |
//! | offered          | user `stop_offer`          | not offered      | StopOffer  |

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_log::warn;

use crate::discovery::message::{DiscoveryMessage, DiscoveryMessageType};
use crate::discovery::service_descriptor::ServiceDescriptor;
use crate::memory::chunk_header::ChunkHeader;
use crate::memory::memory_manager::MemoryManager;
use crate::port::base_port::{BasePortData, RuntimeName, UniquePortId};
use crate::port::chunk_sender::{ChunkLoanError, ChunkSendError, ChunkSender, ChunkSenderData};
use crate::port::options::{ConsumerTooSlowPolicy, PublisherOptions, QueueFullPolicy};

/// A chunk loaned from a publisher port. The loan stays tracked by the port until it is
/// sent or released, death of the owning process releases it through the port teardown.
#[derive(Debug)]
pub struct ChunkMut {
    header: RelativePointer<ChunkHeader>,
}

impl ChunkMut {
    pub(crate) fn new(header: RelativePointer<ChunkHeader>) -> Self {
        Self { header }
    }

    pub(crate) fn relative_header(&self) -> RelativePointer<ChunkHeader> {
        self.header
    }

    pub fn header(&self) -> &ChunkHeader {
        unsafe { &*self.header.as_ptr() }
    }

    /// The writable payload of the chunk.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let header = unsafe { &mut *self.header.as_mut_ptr() };
        let len = header.payload_size() as usize;
        unsafe { core::slice::from_raw_parts_mut(header.payload_mut_ptr(), len) }
    }

    /// Copies `payload` to the beginning of the chunk payload and adjusts the used size.
    /// Bytes which do not fit are truncated.
    pub fn write_payload(&mut self, payload: &[u8]) {
        let target = self.payload_mut();
        let len = core::cmp::min(target.len(), payload.len());
        target[..len].copy_from_slice(&payload[..len]);
        unsafe { &mut *self.header.as_mut_ptr() }.used_size = len as u64;
    }
}

/// Lives in the daemon's port pool.
#[repr(C)]
#[derive(Debug)]
pub struct PublisherPortData {
    base: BasePortData,
    sender: ChunkSenderData,
    offering_requested: AtomicBool,
    offered: AtomicBool,
    subscriber_too_slow_policy: ConsumerTooSlowPolicy,
}

impl PublisherPortData {
    pub fn new(
        service: ServiceDescriptor,
        runtime_name: RuntimeName,
        options: &PublisherOptions,
        memory_manager: RelativePointer<MemoryManager>,
        unique_id: UniquePortId,
    ) -> Self {
        Self {
            base: BasePortData::new(
                service,
                runtime_name,
                options.node_name.clone(),
                unique_id,
            ),
            sender: ChunkSenderData::new(memory_manager, options.clamped_history_capacity()),
            offering_requested: AtomicBool::new(options.offer_on_create),
            offered: AtomicBool::new(false),
            subscriber_too_slow_policy: options.subscriber_too_slow_policy,
        }
    }

    pub fn base(&self) -> &BasePortData {
        &self.base
    }

    pub fn history_capacity(&self) -> u64 {
        self.sender.distributor().history_capacity()
    }

    pub fn subscriber_too_slow_policy(&self) -> ConsumerTooSlowPolicy {
        self.subscriber_too_slow_policy
    }

    fn to_be_destroyed_flag(&self) -> &AtomicBool {
        // the sender blocks on this flag while it waits for a slow consumer
        self.base.to_be_destroyed_flag()
    }
}

/// View of the process which owns the port.
#[derive(Debug)]
pub struct PublisherPortUser {
    data: RelativePointer<PublisherPortData>,
}

impl PublisherPortUser {
    pub fn new(data: RelativePointer<PublisherPortData>) -> Self {
        Self { data }
    }

    fn data(&self) -> &PublisherPortData {
        unsafe { &*self.data.as_ptr() }
    }

    pub fn id(&self) -> UniquePortId {
        self.data().base.unique_id()
    }

    pub fn service(&self) -> &ServiceDescriptor {
        self.data().base.service()
    }

    /// Requests the daemon to announce the service. Offering an already offered port is a
    /// no-op.
    pub fn offer(&self) {
        self.data().offering_requested.store(true, Ordering::Release);
    }

    /// Requests the daemon to withdraw the service. Stopping a never offered port is a
    /// no-op.
    pub fn stop_offer(&self) {
        self.data()
            .offering_requested
            .store(false, Ordering::Release);
    }

    /// True once the daemon has processed the offer.
    pub fn is_offered(&self) -> bool {
        self.data().offered.load(Ordering::Acquire)
    }

    /// True while at least one subscriber is connected.
    pub fn has_subscribers(&self) -> bool {
        ChunkSender::new(&self.data().sender).distributor().number_of_queues() != 0
    }

    /// Loans a chunk which can carry a payload of `payload_size` bytes.
    pub fn try_allocate_chunk(&self, payload_size: usize) -> Result<ChunkMut, ChunkLoanError> {
        ChunkSender::new(&self.data().sender)
            .try_allocate(payload_size)
            .map(ChunkMut::new)
    }

    /// Delivers a loaned chunk to every connected subscriber. When `sequence_number` is
    /// [`None`] the port's own counter stamps the chunk. Returns the number of subscribers
    /// the chunk was delivered to.
    pub fn send_chunk(
        &self,
        chunk: ChunkMut,
        sequence_number: Option<u64>,
    ) -> Result<usize, ChunkSendError> {
        let data = self.data();
        ChunkSender::new(&data.sender).send_chunk(
            chunk.relative_header(),
            sequence_number,
            data.subscriber_too_slow_policy,
            data.to_be_destroyed_flag(),
        )
    }

    /// Returns a loaned chunk without sending it.
    pub fn release_chunk(&self, chunk: ChunkMut) {
        ChunkSender::new(&self.data().sender).release_chunk(chunk.relative_header());
    }
}

/// View of the daemon which drives the discovery protocol of the port.
#[derive(Debug)]
pub struct PublisherPortDaemon {
    data: NonNull<PublisherPortData>,
}

impl PublisherPortDaemon {
    /// # Safety
    ///
    ///  * `data` must point to a [`PublisherPortData`] inside the port pool and stay
    ///    valid for the lifetime of this view
    ///
    pub unsafe fn new(data: NonNull<PublisherPortData>) -> Self {
        Self { data }
    }

    fn data(&self) -> &PublisherPortData {
        unsafe { self.data.as_ref() }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        self.data().base.service()
    }

    pub fn runtime_name(&self) -> &RuntimeName {
        self.data().base.runtime_name()
    }

    pub fn is_offered(&self) -> bool {
        self.data().offered.load(Ordering::Acquire)
    }

    pub fn is_to_be_destroyed(&self) -> bool {
        self.data().base.is_to_be_destroyed()
    }

    /// Picks up an offer state change the user requested and acknowledges it. Emits the
    /// Offer or StopOffer which the discovery pass broadcasts.
    pub fn try_get_discovery_message(&mut self) -> Option<DiscoveryMessage> {
        let data = self.data();
        let requested = data.offering_requested.load(Ordering::Acquire);
        let offered = data.offered.load(Ordering::Acquire);

        if requested == offered {
            return None;
        }

        data.offered.store(requested, Ordering::Release);
        let message_type = match requested {
            true => DiscoveryMessageType::Offer,
            false => DiscoveryMessageType::StopOffer,
        };

        Some(DiscoveryMessage::new(
            message_type,
            data.base.service().clone(),
        ))
    }

    /// Processes a Sub or Unsub of a matching subscriber port and returns the Ack or Nack
    /// which has to be dispatched back to it.
    pub fn dispatch_discovery_message(
        &mut self,
        message: &DiscoveryMessage,
    ) -> Option<DiscoveryMessage> {
        let data = self.data();

        match message.message_type {
            DiscoveryMessageType::Sub => {
                let nack = || {
                    Some(DiscoveryMessage::new(
                        DiscoveryMessageType::Nack,
                        data.base.service().clone(),
                    ))
                };

                if !self.is_offered() || message.queue.is_null() {
                    return nack();
                }

                // connect-time compatibility: backpressure needs a waiting publisher,
                // history replay needs a history capable publisher
                let queue = unsafe { &*message.queue.as_ptr() };
                if queue.queue_full_policy() == QueueFullPolicy::BlockProducer
                    && data.subscriber_too_slow_policy == ConsumerTooSlowPolicy::DiscardOldestData
                {
                    return nack();
                }
                if message.requires_publisher_history_support && data.history_capacity() == 0 {
                    return nack();
                }

                let mut distributor = ChunkSender::new(&data.sender).distributor();
                match distributor.try_add_queue(message.queue, message.history_request) {
                    Ok(()) => Some(DiscoveryMessage::new(
                        DiscoveryMessageType::Ack,
                        data.base.service().clone(),
                    )),
                    Err(_) => nack(),
                }
            }
            DiscoveryMessageType::Unsub => {
                if !message.queue.is_null() {
                    ChunkSender::new(&data.sender)
                        .distributor()
                        .try_remove_queue(message.queue);
                }

                Some(DiscoveryMessage::new(
                    DiscoveryMessageType::Ack,
                    data.base.service().clone(),
                ))
            }
            _ => {
                warn!(from self,
                    "The port received the unexpected discovery message {:?}.",
                    message.message_type);
                None
            }
        }
    }

    /// Detaches every subscriber queue, drops the history and releases all loaned chunks
    /// so they return to their pools once every other holder releases them. Used on port
    /// teardown.
    pub fn release_all_chunks(&mut self) {
        let mut sender = ChunkSender::new(&self.data().sender);
        sender.distributor().remove_all_queues();
        sender.distributor().clear_history();
        sender.release_all();
    }
}
