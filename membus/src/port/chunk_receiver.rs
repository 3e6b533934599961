// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The receiving half of a subscriber port: pops chunks from the queue and tracks every
//! chunk the user currently holds. The held-chunk list owns the references, so the daemon
//! can reclaim all of them when the owning process dies.

use membus_bb_concurrency::spin_mutex::SpinMutex;
use membus_bb_container::vec::FixedSizeVec;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_log::fail;

use crate::constants::MAX_CHUNKS_HELD_PER_SUBSCRIBER;
use crate::memory::chunk_header::ChunkHeader;
use crate::memory::shared_chunk::SharedChunk;
use crate::port::chunk_queue::{ChunkQueueData, ChunkQueuePopper};
use crate::port::options::QueueFullPolicy;

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ChunkReceiveError {
    /// The port already holds the maximum number of chunks.
    TooManyChunksHeldInParallel,
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ChunkReleaseError {
    /// The provided chunk is not held by this port.
    ChunkNotHeld,
}

/// Lives inside the subscriber port data.
#[repr(C)]
#[derive(Debug)]
pub struct ChunkReceiverData {
    queue: ChunkQueueData,
    held_chunks: SpinMutex<FixedSizeVec<u64, MAX_CHUNKS_HELD_PER_SUBSCRIBER>>,
}

impl ChunkReceiverData {
    pub fn new(queue_capacity: usize, queue_full_policy: QueueFullPolicy, queue_id: u64) -> Self {
        Self {
            queue: ChunkQueueData::new(queue_capacity, queue_full_policy, queue_id),
            held_chunks: SpinMutex::new(FixedSizeVec::new()),
        }
    }

    pub fn queue(&self) -> &ChunkQueueData {
        &self.queue
    }
}

/// Process-local view which operates on a [`ChunkReceiverData`].
#[derive(Debug)]
pub struct ChunkReceiver<'a> {
    data: &'a ChunkReceiverData,
}

impl<'a> ChunkReceiver<'a> {
    pub fn new(data: &'a ChunkReceiverData) -> Self {
        Self { data }
    }

    /// Returns true when the queue holds at least one chunk.
    pub fn has_chunks(&self) -> bool {
        !self.data.queue.is_empty()
    }

    /// Returns whether the queue dropped chunks on overflow since the last call and
    /// clears the flag.
    pub fn has_lost_chunks(&mut self) -> bool {
        ChunkQueuePopper::new(&self.data.queue).take_lost_chunks_flag()
    }

    /// Number of chunks the user currently holds.
    pub fn number_of_held_chunks(&self) -> usize {
        self.data.held_chunks.lock().len()
    }

    /// Pops the oldest chunk from the queue and adds it to the held-chunk list. Returns
    /// [`None`] when the queue is empty. At most one thread may receive at a time.
    pub fn try_get_chunk(
        &mut self,
    ) -> Result<Option<RelativePointer<ChunkHeader>>, ChunkReceiveError> {
        let mut held_chunks = self.data.held_chunks.lock();
        if held_chunks.is_full() {
            fail!(from self, with ChunkReceiveError::TooManyChunksHeldInParallel,
                "Unable to receive another chunk since the port holds the maximum of {} chunks.",
                MAX_CHUNKS_HELD_PER_SUBSCRIBER);
        }

        match ChunkQueuePopper::new(&self.data.queue).pop() {
            Some(chunk) => {
                let header = chunk.relative_header();
                held_chunks.push(chunk.into_value());
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }

    /// Releases a chunk which was received with [`ChunkReceiver::try_get_chunk()`],
    /// returning it to its pool when this was the last reference.
    pub fn release_chunk(
        &mut self,
        chunk: RelativePointer<ChunkHeader>,
    ) -> Result<(), ChunkReleaseError> {
        let value = chunk.as_value();
        let mut held_chunks = self.data.held_chunks.lock();

        for i in 0..held_chunks.len() {
            if held_chunks[i] == value {
                held_chunks.remove(i);
                drop(unsafe { SharedChunk::from_value(value) });
                return Ok(());
            }
        }

        fail!(from self, with ChunkReleaseError::ChunkNotHeld,
            "Unable to release the chunk since it is not held by this port.");
    }

    /// Releases every queued chunk without handing it to the user.
    pub fn release_queued_chunks(&mut self) {
        ChunkQueuePopper::new(&self.data.queue).clear();
    }

    /// Releases every held and every queued chunk. Used on port teardown.
    pub fn release_all(&mut self) {
        self.release_queued_chunks();

        let mut held_chunks = self.data.held_chunks.lock();
        while let Some(value) = held_chunks.pop() {
            drop(unsafe { SharedChunk::from_value(value) });
        }
    }
}
