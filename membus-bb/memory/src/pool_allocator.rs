// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A **threadsafe**, **lock-free** bucket allocator which partitions the provided memory
//! into buckets of equal size with a given alignment. The memory chunks cannot be resized or
//! be greater than the bucket size.
//!
//! The allocator is **shared-memory capable**: the bucket array is addressed with a
//! [`RelocatablePointer`] and the free list is lock-free, so buckets can be allocated and
//! released from every process which has the owning segment mapped.
//!
//! # Example
//!
//! ```
//! use membus_bb_elementary::allocator::BaseAllocator;
//! use membus_bb_elementary::bump_allocator::BumpAllocator;
//! use membus_bb_elementary::relocatable_container::RelocatableContainer;
//! use membus_bb_memory::pool_allocator::*;
//!
//! const BUCKET_COUNT: usize = 8;
//! let bucket_layout = Layout::from_size_align(128, 8).unwrap();
//! let mut memory = [0u8; 2048];
//!
//! let allocator = BumpAllocator::new(memory.as_mut_ptr());
//! let mut pool = unsafe { PoolAllocator::new_uninit(bucket_layout, BUCKET_COUNT) };
//! unsafe { pool.init(&allocator).expect("enough memory provided") };
//!
//! let chunk = pool.allocate(Layout::from_size_align(48, 4).unwrap()).unwrap();
//! unsafe { pool.deallocate(chunk.cast(), Layout::from_size_align(48, 4).unwrap()) };
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

pub use core::alloc::Layout;
pub use core::ptr::NonNull;

use membus_bb_elementary::allocator::{AllocationError, BaseAllocator};
use membus_bb_elementary::math::align;
use membus_bb_elementary::pointer_trait::PointerTrait;
use membus_bb_elementary::relocatable_container::RelocatableContainer;
use membus_bb_elementary::relocatable_ptr::RelocatablePointer;
use membus_bb_lock_free::mpmc::unique_index_set::UniqueIndexSet;
use membus_bb_log::{fail, fatal_panic};

/// A **non-movable** bucket allocator with a runtime fixed number of buckets.
#[repr(C)]
#[derive(Debug)]
pub struct PoolAllocator {
    buckets: UniqueIndexSet,
    start: RelocatablePointer<u8>,
    bucket_size: usize,
    bucket_alignment: usize,
    is_memory_initialized: AtomicBool,
}

unsafe impl Send for PoolAllocator {}
unsafe impl Sync for PoolAllocator {}

impl PoolAllocator {
    /// Creates a new uninitialized [`PoolAllocator`] with `number_of_buckets` buckets of
    /// the provided layout.
    ///
    /// # Safety
    ///
    ///  * Before the allocator can be used [`PoolAllocator::init()`] must be called once.
    ///
    pub unsafe fn new_uninit(bucket_layout: Layout, number_of_buckets: usize) -> Self {
        Self {
            buckets: unsafe { UniqueIndexSet::new_uninit(number_of_buckets) },
            start: unsafe { RelocatablePointer::new_uninit() },
            bucket_size: bucket_layout.size(),
            bucket_alignment: bucket_layout.align(),
            is_memory_initialized: AtomicBool::new(false),
        }
    }

    /// Initializes the allocator by acquiring the free list and bucket memory from the
    /// provided allocator.
    ///
    /// # Safety
    ///
    ///  * Must be called exactly once before any other method is called.
    ///
    pub unsafe fn init<Allocator: BaseAllocator>(
        &mut self,
        allocator: &Allocator,
    ) -> Result<(), AllocationError> {
        if self.is_memory_initialized.load(Ordering::Relaxed) {
            fatal_panic!(from self,
                "Memory already initialized. Initializing it twice may lead to undefined behavior.");
        }

        unsafe {
            fail!(from self, when self.buckets.init(allocator),
                "Unable to initialize the underlying free list.")
        };

        unsafe {
            self.start.init(fail!(from self, when allocator.allocate(
                    Layout::from_size_align_unchecked(
                        self.bucket_stride() * self.number_of_buckets() as usize,
                        self.bucket_alignment)),
                "Failed to initialize since the allocation of the bucket memory failed."))
        };

        self.is_memory_initialized.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Returns the amount of memory an initialized [`PoolAllocator`] with the provided
    /// properties acquires.
    pub const fn memory_size(bucket_layout: Layout, number_of_buckets: usize) -> usize {
        UniqueIndexSet::const_memory_size(number_of_buckets)
            + align(bucket_layout.size(), bucket_layout.align()) * number_of_buckets
            + bucket_layout.align()
            - 1
    }

    pub fn number_of_buckets(&self) -> u32 {
        self.buckets.capacity()
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    pub fn max_alignment(&self) -> usize {
        self.bucket_alignment
    }

    /// Returns the number of currently allocated buckets.
    pub fn used_buckets(&self) -> usize {
        self.buckets.borrowed_indices()
    }

    fn bucket_stride(&self) -> usize {
        align(self.bucket_size, self.bucket_alignment)
    }

    fn start_address(&self) -> usize {
        unsafe { self.start.as_ptr() as usize }
    }

    #[inline(always)]
    fn verify_init(&self, source: &str) {
        debug_assert!(
            self.is_memory_initialized.load(Ordering::Relaxed),
            "Undefined behavior when calling PoolAllocator::{source} and the object is not initialized."
        );
    }

    fn verify_ptr_is_managed_by_allocator(&self, ptr: NonNull<u8>) {
        let position = ptr.as_ptr() as usize;
        debug_assert!(
            !(position < self.start_address()
                || position
                    >= self.start_address()
                        + self.bucket_stride() * self.number_of_buckets() as usize
                || (position - self.start_address()) % self.bucket_stride() != 0),
            "The pointer {ptr:?} is not managed by this allocator."
        );
    }

    fn bucket_index(&self, ptr: NonNull<u8>) -> u32 {
        self.verify_ptr_is_managed_by_allocator(ptr);
        ((ptr.as_ptr() as usize - self.start_address()) / self.bucket_stride()) as u32
    }

    /// Allocates a bucket without size verification.
    pub fn allocate_bucket(&self) -> Option<NonNull<u8>> {
        self.verify_init("allocate_bucket()");

        unsafe { self.buckets.acquire_raw_index() }.map(|index| unsafe {
            NonNull::new_unchecked(
                (self.start_address() + index as usize * self.bucket_stride()) as *mut u8,
            )
        })
    }

    /// Releases a previously allocated bucket.
    ///
    /// # Safety
    ///
    ///  * `ptr` must have been allocated with [`PoolAllocator::allocate_bucket()`] or
    ///    [`PoolAllocator::allocate()`] and must not be released twice
    ///
    pub unsafe fn deallocate_bucket(&self, ptr: NonNull<u8>) {
        self.verify_init("deallocate_bucket()");
        unsafe { self.buckets.release_raw_index(self.bucket_index(ptr)) };
    }
}

impl BaseAllocator for PoolAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocationError> {
        self.verify_init("allocate()");

        if layout.size() > self.bucket_size {
            fail!(from self, with AllocationError::SizeTooLarge,
                "The requested allocation size {} is greater than the maximum supported size of {}.",
                layout.size(), self.bucket_size);
        }

        if layout.align() > self.bucket_alignment {
            fail!(from self, with AllocationError::AlignmentFailure,
                "The requested allocation alignment {} is greater than the maximum supported alignment of {}.",
                layout.align(), self.bucket_alignment);
        }

        match self.allocate_bucket() {
            Some(ptr) => Ok(unsafe {
                NonNull::new_unchecked(core::ptr::slice_from_raw_parts_mut(
                    ptr.as_ptr(),
                    layout.size(),
                ))
            }),
            None => {
                fail!(from self, with AllocationError::OutOfMemory,
                    "No more buckets available to allocate {} bytes with an alignment of {}.",
                    layout.size(), layout.align());
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        unsafe { self.deallocate_bucket(ptr) };
    }
}
