// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The chunk allocator of one data segment: an ordered collection of
//! [`MemPool`](crate::memory::mem_pool::MemPool)s with strictly ascending chunk sizes.

use core::ptr::NonNull;
use core::sync::atomic::AtomicU64;

use membus_bb_container::vec::RelocatableVec;
use membus_bb_elementary::allocator::{AllocationError, BaseAllocator};
use membus_bb_elementary::math::unaligned_mem_size;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_elementary::relocatable_container::RelocatableContainer;
use membus_bb_log::{fail, fatal_panic};

use crate::config::MemPoolEntry;
use crate::memory::chunk_header::ChunkHeader;
use crate::memory::mem_pool::MemPool;
use crate::memory::shared_chunk::SharedChunk;

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ChunkAllocationError {
    /// The payload does not fit into the largest chunk size class of the segment.
    ExceedsMaximumChunkSize,
    /// The fitting pool has no free chunks. There is no fall-through to a larger pool,
    /// sizing the pools is the responsibility of the operator.
    NoMemory,
}

/// Size-classed chunk allocator, resident in the data segment it manages.
#[repr(C)]
#[derive(Debug)]
pub struct MemoryManager {
    pools: RelocatableVec<MemPool>,
}

impl MemoryManager {
    /// Creates a new uninitialized [`MemoryManager`] for `number_of_pools` size classes.
    ///
    /// # Safety
    ///
    ///  * Before it can be used [`MemoryManager::init()`] must be called once.
    ///
    pub unsafe fn new_uninit(number_of_pools: usize) -> Self {
        Self {
            pools: unsafe { RelocatableVec::new_uninit(number_of_pools) },
        }
    }

    /// Initializes the manager and all its pools from the provided allocator. The entries
    /// must be in canonical form, see [`crate::config::Memory::optimize()`].
    ///
    /// # Safety
    ///
    ///  * Must be called exactly once before any other method is called.
    ///  * `entries` must have the length provided to [`MemoryManager::new_uninit()`].
    ///
    pub unsafe fn init<Allocator: BaseAllocator>(
        &mut self,
        allocator: &Allocator,
        entries: &[MemPoolEntry],
    ) -> Result<(), AllocationError> {
        unsafe {
            fail!(from self, when self.pools.init(allocator),
                "Unable to initialize the pool list.")
        };

        let mut previous_chunk_size = 0;
        for entry in entries {
            let chunk_size = ChunkHeader::required_chunk_size(entry.chunk_size);
            if chunk_size <= previous_chunk_size {
                fatal_panic!(from self,
                    "The mempool entries are not strictly ascending, entry {:?} is out of order.",
                    entry);
            }
            previous_chunk_size = chunk_size;

            // a pool is movable until it is initialized
            unsafe {
                self.pools
                    .push(MemPool::new_uninit(chunk_size, entry.chunk_count))
            };
        }

        for i in 0..self.pools.len() {
            unsafe {
                fail!(from "MemoryManager::init()", when self.pools[i].init(allocator),
                    "Unable to initialize mempool {}.", i)
            };
        }

        Ok(())
    }

    /// Returns the amount of memory an initialized [`MemoryManager`] with the provided
    /// entries acquires.
    pub fn memory_size(entries: &[MemPoolEntry]) -> usize {
        let mut size = unaligned_mem_size::<MemPool>(entries.len());
        for entry in entries {
            size += MemPool::memory_size(
                ChunkHeader::required_chunk_size(entry.chunk_size),
                entry.chunk_count,
            );
        }
        size
    }

    /// Returns the pools ordered by ascending chunk size.
    pub fn pools(&self) -> &[MemPool] {
        &self.pools
    }

    /// Allocates a chunk for the provided payload size from the smallest fitting pool and
    /// writes the [`ChunkHeader`]. The initial sequence number and timestamp are zero, the
    /// sender stamps them at delivery time.
    pub fn allocate_chunk(
        &self,
        payload_size: usize,
        sequence_number: u64,
    ) -> Result<SharedChunk, ChunkAllocationError> {
        let msg = "Unable to allocate a chunk";
        let required_size = ChunkHeader::required_chunk_size(payload_size) as u64;

        let pool = match self
            .pools
            .iter()
            .find(|pool| pool.chunk_size() >= required_size)
        {
            Some(pool) => pool,
            None => {
                fail!(from self, with ChunkAllocationError::ExceedsMaximumChunkSize,
                    "{} since the payload size {} exceeds the largest chunk size class.",
                    msg, payload_size);
            }
        };

        let chunk = match pool.allocate() {
            Some(chunk) => chunk,
            None => {
                fail!(from self, with ChunkAllocationError::NoMemory,
                    "{} of {} bytes since the fitting pool is out of chunks.",
                    msg, payload_size);
            }
        };

        let header = chunk.as_ptr() as *mut ChunkHeader;
        unsafe {
            header.write(ChunkHeader {
                mem_pool: RelativePointer::from_ptr(pool as *const MemPool),
                chunk_size: pool.chunk_size(),
                payload_size: payload_size as u64,
                used_size: payload_size as u64,
                sequence_number,
                timestamp: 0,
                reference_counter: AtomicU64::new(1),
            })
        };

        Ok(unsafe { SharedChunk::from_allocation(NonNull::new_unchecked(header)) })
    }
}
