// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The inbox of a subscriber port: a bounded lock-free queue of encoded chunk references.
//! The publisher side pushes through the [`ChunkQueuePusher`], the subscribing process
//! pops through the [`ChunkQueuePopper`].

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_lock_free::spsc::safely_overflowing_index_queue::FixedSizeSafelyOverflowingIndexQueue;

use crate::constants::MAX_SUBSCRIBER_QUEUE_CAPACITY;
use crate::memory::shared_chunk::SharedChunk;
use crate::port::condition_variable::ConditionVariableData;
use crate::port::options::QueueFullPolicy;

const NO_TRIGGER: u64 = u64::MAX;

/// Lives inside the subscriber port data. The queue transports chunk references encoded as
/// `u64` between the publishing and the subscribing process.
#[repr(C)]
#[derive(Debug)]
pub struct ChunkQueueData {
    queue: FixedSizeSafelyOverflowingIndexQueue<MAX_SUBSCRIBER_QUEUE_CAPACITY>,
    unique_id: u64,
    queue_full_policy: QueueFullPolicy,
    has_lost_chunks: AtomicBool,
    trigger: AtomicU64,
}

impl ChunkQueueData {
    pub fn new(capacity: usize, queue_full_policy: QueueFullPolicy, unique_id: u64) -> Self {
        Self {
            queue: FixedSizeSafelyOverflowingIndexQueue::new_with_reduced_capacity(capacity),
            unique_id,
            queue_full_policy,
            has_lost_chunks: AtomicBool::new(false),
            trigger: AtomicU64::new(NO_TRIGGER),
        }
    }

    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    pub fn queue_full_policy(&self) -> QueueFullPolicy {
        self.queue_full_policy
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Attaches a condition variable which is notified on every delivered chunk.
    pub fn set_trigger(&self, condition_variable: RelativePointer<ConditionVariableData>) {
        self.trigger
            .store(condition_variable.as_value(), Ordering::Release);
    }

    /// Detaches the condition variable.
    pub fn unset_trigger(&self) {
        self.trigger.store(NO_TRIGGER, Ordering::Release);
    }

    fn notify_trigger(&self) {
        let trigger = self.trigger.load(Ordering::Acquire);
        if trigger != NO_TRIGGER {
            let condition_variable =
                RelativePointer::<ConditionVariableData>::from_value(trigger);
            unsafe { &*condition_variable.as_ptr() }.notify();
        }
    }
}

/// Outcome of a push through the [`ChunkQueuePusher`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ChunkPushResult {
    /// The chunk reference is in the queue.
    Delivered,
    /// The queue is full and its policy demands producer backpressure, the reference was
    /// not taken over.
    Full,
}

/// Publisher side view on a [`ChunkQueueData`].
///
/// All pushes into one queue must be serialized by the caller, the distributor guarantees
/// this by pushing only under its lock.
#[derive(Debug)]
pub struct ChunkQueuePusher<'a> {
    queue: &'a ChunkQueueData,
}

impl<'a> ChunkQueuePusher<'a> {
    pub fn new(queue: &'a ChunkQueueData) -> Self {
        Self { queue }
    }

    /// Pushes a chunk reference honoring the queue's full policy. With
    /// [`QueueFullPolicy::DiscardOldestData`] a full queue drops its oldest reference to
    /// admit the new one and the loss is flagged; with [`QueueFullPolicy::BlockProducer`]
    /// a full queue rejects the push and the caller has to wait for the consumer.
    pub fn push(&mut self, chunk: SharedChunk) -> ChunkPushResult {
        if self.queue.is_full() && self.queue.queue_full_policy() == QueueFullPolicy::BlockProducer
        {
            drop(chunk);
            return ChunkPushResult::Full;
        }

        // the consumer only ever removes entries, after the check above an overflow can
        // only displace the oldest entry of a DiscardOldestData queue
        if let Some(displaced) = unsafe { self.queue.queue.push(chunk.into_value()) } {
            drop(unsafe { SharedChunk::from_value(displaced) });
            self.queue.has_lost_chunks.store(true, Ordering::Release);
        }

        self.queue.notify_trigger();
        ChunkPushResult::Delivered
    }
}

/// Subscriber side view on a [`ChunkQueueData`].
#[derive(Debug)]
pub struct ChunkQueuePopper<'a> {
    queue: &'a ChunkQueueData,
}

impl<'a> ChunkQueuePopper<'a> {
    pub fn new(queue: &'a ChunkQueueData) -> Self {
        Self { queue }
    }

    /// Pops the oldest chunk reference. At most one thread may pop at a time.
    pub fn pop(&mut self) -> Option<SharedChunk> {
        unsafe { self.queue.queue.pop() }.map(|value| unsafe { SharedChunk::from_value(value) })
    }

    /// Returns whether the queue dropped chunks on overflow since the last call and
    /// clears the flag.
    pub fn take_lost_chunks_flag(&mut self) -> bool {
        self.queue.has_lost_chunks.swap(false, Ordering::AcqRel)
    }

    /// Pops and releases every queued chunk reference.
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}
