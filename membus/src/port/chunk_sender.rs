// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The sending half of a publisher port: loans chunks to the user, stamps and delivers
//! them through the embedded distributor and tracks every chunk which is currently loaned
//! out. The loaned-chunk list owns the references, so the daemon can reclaim all of them
//! when the owning process dies.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use membus_bb_concurrency::spin_mutex::SpinMutex;
use membus_bb_container::vec::FixedSizeVec;
use membus_bb_elementary::enum_gen;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_log::fail;

use crate::constants::MAX_CHUNKS_ALLOCATED_PER_PUBLISHER;
use crate::memory::chunk_header::{current_time_millis, ChunkHeader};
use crate::memory::memory_manager::{ChunkAllocationError, MemoryManager};
use crate::memory::shared_chunk::SharedChunk;
use crate::port::chunk_distributor::{
    ChunkDeliveryError, ChunkDistributor, ChunkDistributorData,
};
use crate::port::options::ConsumerTooSlowPolicy;

enum_gen! {
    /// Failures when loaning a chunk with [`ChunkSender::try_allocate()`].
    ChunkLoanError

  entry:
    TooManyChunksAllocatedInParallel

  mapping:
    ChunkAllocationError
}

enum_gen! {
    /// Failures when delivering a chunk with [`ChunkSender::send_chunk()`].
    ChunkSendError

  entry:
    ChunkNotAllocated

  mapping:
    ChunkDeliveryError
}

/// Lives inside the publisher port data.
#[repr(C)]
#[derive(Debug)]
pub struct ChunkSenderData {
    distributor: ChunkDistributorData,
    loaned_chunks: SpinMutex<FixedSizeVec<u64, MAX_CHUNKS_ALLOCATED_PER_PUBLISHER>>,
    memory_manager: RelativePointer<MemoryManager>,
    sequence_counter: AtomicU64,
}

impl ChunkSenderData {
    pub fn new(memory_manager: RelativePointer<MemoryManager>, history_capacity: u64) -> Self {
        Self {
            distributor: ChunkDistributorData::new(history_capacity),
            loaned_chunks: SpinMutex::new(FixedSizeVec::new()),
            memory_manager,
            sequence_counter: AtomicU64::new(0),
        }
    }

    pub fn distributor(&self) -> &ChunkDistributorData {
        &self.distributor
    }
}

/// Process-local view which operates on a [`ChunkSenderData`].
#[derive(Debug)]
pub struct ChunkSender<'a> {
    data: &'a ChunkSenderData,
}

impl<'a> ChunkSender<'a> {
    pub fn new(data: &'a ChunkSenderData) -> Self {
        Self { data }
    }

    pub fn distributor(&self) -> ChunkDistributor<'a> {
        ChunkDistributor::new(&self.data.distributor)
    }

    /// Number of chunks currently loaned to the user.
    pub fn number_of_loaned_chunks(&self) -> usize {
        self.data.loaned_chunks.lock().len()
    }

    /// Loans a chunk which can carry a payload of `payload_size` bytes. The loan is
    /// tracked until it is sent with [`ChunkSender::send_chunk()`] or returned with
    /// [`ChunkSender::release_chunk()`].
    pub fn try_allocate(
        &mut self,
        payload_size: usize,
    ) -> Result<RelativePointer<ChunkHeader>, ChunkLoanError> {
        let mut loaned_chunks = self.data.loaned_chunks.lock();
        if loaned_chunks.is_full() {
            fail!(from self, with ChunkLoanError::TooManyChunksAllocatedInParallel,
                "Unable to loan another chunk since the port supports at most {} loaned chunks.",
                MAX_CHUNKS_ALLOCATED_PER_PUBLISHER);
        }

        let memory_manager = unsafe { &*self.data.memory_manager.as_ptr() };
        let chunk = fail!(from self,
            when memory_manager.allocate_chunk(payload_size, 0),
            to ChunkLoanError,
            "Unable to loan a chunk of {} bytes.", payload_size);

        let header = chunk.relative_header();
        loaned_chunks.push(chunk.into_value());
        Ok(header)
    }

    fn take_loan(&mut self, chunk: RelativePointer<ChunkHeader>) -> Option<SharedChunk> {
        let value = chunk.as_value();
        let mut loaned_chunks = self.data.loaned_chunks.lock();

        for i in 0..loaned_chunks.len() {
            if loaned_chunks[i] == value {
                loaned_chunks.remove(i);
                return Some(unsafe { SharedChunk::from_value(value) });
            }
        }

        None
    }

    /// Stamps the delivery timestamp and the sequence number and fans the chunk out to
    /// every connected subscriber queue and into the history. When `sequence_number` is
    /// [`None`] the port's own counter is used. Returns the number of subscribers the
    /// chunk was delivered to.
    pub fn send_chunk(
        &mut self,
        chunk: RelativePointer<ChunkHeader>,
        sequence_number: Option<u64>,
        publisher_policy: ConsumerTooSlowPolicy,
        to_be_destroyed: &AtomicBool,
    ) -> Result<usize, ChunkSendError> {
        let mut chunk = match self.take_loan(chunk) {
            Some(chunk) => chunk,
            None => {
                fail!(from self, with ChunkSendError::ChunkNotAllocated,
                    "Unable to send the chunk since it is not loaned from this port.");
            }
        };

        let header = chunk.header_mut();
        header.sequence_number = match sequence_number {
            Some(sequence_number) => sequence_number,
            None => self.data.sequence_counter.fetch_add(1, Ordering::Relaxed),
        };
        header.timestamp = current_time_millis();

        Ok(fail!(from self,
            when self.distributor().deliver(chunk, publisher_policy, to_be_destroyed),
            to ChunkSendError,
            "Unable to deliver the chunk."))
    }

    /// Returns a loaned chunk without sending it.
    pub fn release_chunk(&mut self, chunk: RelativePointer<ChunkHeader>) -> bool {
        self.take_loan(chunk).is_some()
    }

    /// Releases every loaned chunk. Used on port teardown when the owning process cannot
    /// do it anymore.
    pub fn release_all(&mut self) {
        let mut loaned_chunks = self.data.loaned_chunks.lock();
        while let Some(value) = loaned_chunks.pop() {
            drop(unsafe { SharedChunk::from_value(value) });
        }
    }
}
