// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One size class of a data segment. A [`MemPool`] owns a fixed number of equally sized
//! chunks; allocation and release are lock-free so chunks can be returned from every
//! process which has the segment mapped.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

use membus_bb_elementary::allocator::{AllocationError, BaseAllocator, Layout};
use membus_bb_memory::pool_allocator::PoolAllocator;

use crate::constants::CHUNK_ALIGNMENT;

/// A lock-free pool of equally sized chunks, resident in a shared memory segment.
#[repr(C)]
#[derive(Debug)]
pub struct MemPool {
    allocator: PoolAllocator,
    chunk_size: u64,
    used_chunks: AtomicU64,
    min_free_chunks: AtomicU64,
}

impl MemPool {
    /// Creates a new uninitialized [`MemPool`] with `chunk_count` chunks of `chunk_size`
    /// bytes each.
    ///
    /// # Safety
    ///
    ///  * Before the pool can be used [`MemPool::init()`] must be called once.
    ///
    pub unsafe fn new_uninit(chunk_size: usize, chunk_count: usize) -> Self {
        Self {
            allocator: unsafe {
                PoolAllocator::new_uninit(
                    Layout::from_size_align_unchecked(chunk_size, CHUNK_ALIGNMENT),
                    chunk_count,
                )
            },
            chunk_size: chunk_size as u64,
            used_chunks: AtomicU64::new(0),
            min_free_chunks: AtomicU64::new(chunk_count as u64),
        }
    }

    /// Initializes the pool by acquiring its free list and chunk memory from the provided
    /// allocator.
    ///
    /// # Safety
    ///
    ///  * Must be called exactly once before any other method is called.
    ///
    pub unsafe fn init<Allocator: BaseAllocator>(
        &mut self,
        allocator: &Allocator,
    ) -> Result<(), AllocationError> {
        unsafe { self.allocator.init(allocator) }
    }

    /// Returns the amount of memory an initialized [`MemPool`] with the provided
    /// properties acquires.
    pub const fn memory_size(chunk_size: usize, chunk_count: usize) -> usize {
        PoolAllocator::memory_size(
            unsafe { Layout::from_size_align_unchecked(chunk_size, CHUNK_ALIGNMENT) },
            chunk_count,
        )
    }

    /// Size of one chunk, header included.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Total number of chunks of the pool.
    pub fn chunk_count(&self) -> u64 {
        self.allocator.number_of_buckets() as u64
    }

    /// Number of currently allocated chunks.
    pub fn used_chunks(&self) -> u64 {
        self.used_chunks.load(Ordering::Relaxed)
    }

    /// Low-water mark of the free chunks, an introspection value which shows how close the
    /// pool ever came to running empty.
    pub fn min_free_chunks(&self) -> u64 {
        self.min_free_chunks.load(Ordering::Relaxed)
    }

    /// Acquires one chunk. Returns [`None`] when the pool is empty.
    pub fn allocate(&self) -> Option<NonNull<u8>> {
        let chunk = self.allocator.allocate_bucket()?;

        let used = self.used_chunks.fetch_add(1, Ordering::Relaxed) + 1;
        let free = self.chunk_count() - used;
        self.min_free_chunks.fetch_min(free, Ordering::Relaxed);

        Some(chunk)
    }

    /// Returns a chunk to the pool.
    ///
    /// # Safety
    ///
    ///  * `chunk` must have been acquired with [`MemPool::allocate()`] from this pool and
    ///    must not be returned twice
    ///
    pub unsafe fn free(&self, chunk: NonNull<u8>) {
        unsafe { self.allocator.deallocate_bucket(chunk) };
        self.used_chunks.fetch_sub(1, Ordering::Relaxed);
    }
}
