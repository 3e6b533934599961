// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The outbox of a publisher port. The distributor fans a chunk out to the queues of all
//! connected subscriber ports and keeps a bounded history of recent chunks which is
//! replayed to late subscribers.
//!
//! The distributor stores relative pointers to the subscriber queues, never owning
//! references - the queue stays owned by its subscriber port. Teardown detaches the queue
//! from the distributor first and destroys it afterwards, so a queue reachable under the
//! distributor lock is always alive.

use core::sync::atomic::{AtomicBool, Ordering};

use membus_bb_concurrency::adaptive_wait::AdaptiveWait;
use membus_bb_concurrency::spin_mutex::SpinMutex;
use membus_bb_container::queue::FixedSizeQueue;
use membus_bb_container::vec::FixedSizeVec;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_log::fail;

use crate::constants::{MAX_HISTORY_CAPACITY, MAX_SUBSCRIBERS_PER_PUBLISHER};
use crate::memory::shared_chunk::SharedChunk;
use crate::port::chunk_queue::{ChunkPushResult, ChunkQueueData, ChunkQueuePusher};
use crate::port::options::ConsumerTooSlowPolicy;

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ChunkDistributorAddQueueError {
    QueueListFull,
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ChunkDeliveryError {
    /// A blocking delivery was interrupted since the port is being torn down.
    InterruptedByPortDestruction,
}

#[derive(Debug)]
struct DistributorState {
    queues: FixedSizeVec<RelativePointer<ChunkQueueData>, MAX_SUBSCRIBERS_PER_PUBLISHER>,
    history: FixedSizeQueue<u64, MAX_HISTORY_CAPACITY>,
}

/// Lives inside the publisher port data. The queue list and the history are compound
/// state, they are protected with an interprocess spin lock which is held only for short,
/// bounded sections - a blocking delivery waits outside of the lock.
#[repr(C)]
#[derive(Debug)]
pub struct ChunkDistributorData {
    state: SpinMutex<DistributorState>,
    history_capacity: u64,
}

impl ChunkDistributorData {
    /// Creates a new distributor with the provided history capacity, clamped to
    /// [`MAX_HISTORY_CAPACITY`].
    pub fn new(history_capacity: u64) -> Self {
        Self {
            state: SpinMutex::new(DistributorState {
                queues: FixedSizeVec::new(),
                history: FixedSizeQueue::new(),
            }),
            history_capacity: core::cmp::min(history_capacity, MAX_HISTORY_CAPACITY as u64),
        }
    }

    pub fn history_capacity(&self) -> u64 {
        self.history_capacity
    }
}

/// Process-local view which operates on a [`ChunkDistributorData`].
#[derive(Debug)]
pub struct ChunkDistributor<'a> {
    data: &'a ChunkDistributorData,
}

impl<'a> ChunkDistributor<'a> {
    pub fn new(data: &'a ChunkDistributorData) -> Self {
        Self { data }
    }

    /// Number of currently connected subscriber queues.
    pub fn number_of_queues(&self) -> usize {
        self.data.state.lock().queues.len()
    }

    /// Number of chunks currently held in the history.
    pub fn history_len(&self) -> usize {
        self.data.state.lock().history.len()
    }

    /// Connects a subscriber queue and replays the most recent
    /// `min(requested_history, history held, queue capacity)` chunks oldest-first. The
    /// replayed chunks precede every subsequently delivered chunk in the queue. Connecting
    /// an already connected queue is a no-op.
    pub fn try_add_queue(
        &mut self,
        queue: RelativePointer<ChunkQueueData>,
        requested_history: u64,
    ) -> Result<(), ChunkDistributorAddQueueError> {
        let mut state = self.data.state.lock();
        let queue_ref = unsafe { &*queue.as_ptr() };

        if state
            .queues
            .iter()
            .any(|q| unsafe { &*q.as_ptr() }.unique_id() == queue_ref.unique_id())
        {
            return Ok(());
        }

        if !state.queues.push(queue) {
            fail!(from self, with ChunkDistributorAddQueueError::QueueListFull,
                "Unable to add the subscriber queue since the queue list supports at most {} entries.",
                MAX_SUBSCRIBERS_PER_PUBLISHER);
        }

        let replay_count = core::cmp::min(
            core::cmp::min(requested_history, state.history.len() as u64),
            queue_ref.capacity() as u64,
        ) as usize;
        let replay_start = state.history.len() - replay_count;

        for i in replay_start..state.history.len() {
            let value = unsafe { state.history.get_unchecked(i) };
            let chunk = unsafe { SharedChunk::from_value(SharedChunk::clone_value(value)) };
            ChunkQueuePusher::new(queue_ref).push(chunk);
        }

        Ok(())
    }

    /// Detaches a subscriber queue. Returns true when the queue was connected.
    pub fn try_remove_queue(&mut self, queue: RelativePointer<ChunkQueueData>) -> bool {
        let unique_id = unsafe { &*queue.as_ptr() }.unique_id();
        let mut state = self.data.state.lock();

        for i in 0..state.queues.len() {
            if unsafe { &*state.queues[i].as_ptr() }.unique_id() == unique_id {
                state.queues.remove(i);
                return true;
            }
        }

        false
    }

    /// Detaches every subscriber queue.
    pub fn remove_all_queues(&mut self) {
        self.data.state.lock().queues.clear();
    }

    /// Drops the history, releasing the chunk references it holds.
    pub fn clear_history(&mut self) {
        let mut state = self.data.state.lock();
        while let Some(value) = state.history.pop() {
            drop(unsafe { SharedChunk::from_value(value) });
        }
    }

    /// Delivers a chunk to every connected queue honoring each queue's full policy, then
    /// appends it to the history. With [`ConsumerTooSlowPolicy::WaitForConsumer`] a full
    /// backpressure queue suspends the delivery until the consumer made space, the queue
    /// was detached or `to_be_destroyed` was set. Returns the number of queues the chunk
    /// was delivered to.
    pub fn deliver(
        &mut self,
        chunk: SharedChunk,
        publisher_policy: ConsumerTooSlowPolicy,
        to_be_destroyed: &AtomicBool,
    ) -> Result<usize, ChunkDeliveryError> {
        let queue_ids: FixedSizeVec<u64, MAX_SUBSCRIBERS_PER_PUBLISHER> = {
            let state = self.data.state.lock();
            let mut ids = FixedSizeVec::new();
            for queue in state.queues.iter() {
                ids.push(unsafe { &*queue.as_ptr() }.unique_id());
            }
            ids
        };

        let mut number_of_deliveries = 0;
        for unique_id in queue_ids.iter() {
            let mut adaptive_wait = AdaptiveWait::new();
            loop {
                let state = self.data.state.lock();
                let queue = match state
                    .queues
                    .iter()
                    .find(|q| unsafe { &*q.as_ptr() }.unique_id() == *unique_id)
                {
                    Some(queue) => unsafe { &*queue.as_ptr() },
                    // the queue was detached while we waited
                    None => break,
                };

                if queue.is_full()
                    && queue.queue_full_policy()
                        == crate::port::options::QueueFullPolicy::BlockProducer
                    && publisher_policy == ConsumerTooSlowPolicy::WaitForConsumer
                {
                    drop(state);
                    if to_be_destroyed.load(Ordering::Acquire) {
                        fail!(from self, with ChunkDeliveryError::InterruptedByPortDestruction,
                            "The delivery was interrupted since the port is being torn down.");
                    }
                    adaptive_wait.wait();
                    continue;
                }

                if ChunkQueuePusher::new(queue).push(chunk.clone()) == ChunkPushResult::Delivered {
                    number_of_deliveries += 1;
                }
                break;
            }
        }

        if self.data.history_capacity > 0 {
            let mut state = self.data.state.lock();
            if state.history.len() as u64 == self.data.history_capacity {
                if let Some(oldest) = state.history.pop() {
                    drop(unsafe { SharedChunk::from_value(oldest) });
                }
            }
            state.history.push(chunk.clone().into_value());
        }

        Ok(number_of_deliveries)
    }
}
