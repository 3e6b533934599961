// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A **threadsafe** and **lock-free** set of indices. Can be used as a building block for
//! allocators or lock-free containers. When it is created it is filled with indices which
//! can be acquired and returned. The free list is a LIFO whose head carries a 16 bit ABA
//! counter.
//!
//! # Example
//!
//! ```
//! use membus_bb_lock_free::mpmc::unique_index_set::*;
//!
//! const CAPACITY: usize = 128;
//!
//! let index_set = FixedSizeUniqueIndexSet::<CAPACITY>::new();
//!
//! let new_index = match unsafe { index_set.acquire_raw_index() } {
//!     None => panic!("Out of indices"),
//!     Some(i) => i,
//! };
//!
//! println!("Acquired index {}", new_index);
//!
//! // return the index to the index set
//! unsafe { index_set.release_raw_index(new_index) };
//! ```

use core::alloc::Layout;
use core::cell::UnsafeCell;
use core::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};

use membus_bb_elementary::allocator::{AllocationError, BaseAllocator};
use membus_bb_elementary::bump_allocator::BumpAllocator;
use membus_bb_elementary::pointer_trait::PointerTrait;
use membus_bb_elementary::relocatable_container::RelocatableContainer;
use membus_bb_elementary::relocatable_ptr::RelocatablePointer;
use membus_bb_log::{fail, fatal_panic};

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum UniqueIndexSetCreationError {
    ProvidedCapacityGreaterThanMaxCapacity,
    ProvidedCapacityIsZero,
}

struct HeadDetails {
    head: u32,
    aba: u16,
    borrowed_indices: u32,
}

impl HeadDetails {
    fn from(value: u64) -> Self {
        Self {
            head: ((value & 0xffffff0000000000) >> 40) as u32,
            aba: ((value & 0x000000ffff000000) >> 24) as u16,
            borrowed_indices: (value & 0x0000000000ffffff) as u32,
        }
    }

    fn value(&self) -> u64 {
        (((self.head & 0x00ffffff) as u64) << 40)
            | (self.aba as u64) << 24
            | ((self.borrowed_indices & 0x00ffffff) as u64)
    }
}

/// A **non-movable** UniqueIndexSet with a runtime fixed capacity. The compile time version
/// is called [`FixedSizeUniqueIndexSet`].
#[repr(C)]
#[derive(Debug)]
pub struct UniqueIndexSet {
    data_ptr: RelocatablePointer<UnsafeCell<u32>>,
    capacity: u32,
    head: AtomicU64,
    is_memory_initialized: AtomicBool,
}

unsafe impl Sync for UniqueIndexSet {}
unsafe impl Send for UniqueIndexSet {}

impl RelocatableContainer for UniqueIndexSet {
    unsafe fn new_uninit(capacity: usize) -> Self {
        debug_assert!(
            capacity < 2usize.pow(24) - 1,
            "The provided capacity exceeds the maximum supported capacity of the UniqueIndexSet"
        );

        Self {
            data_ptr: unsafe { RelocatablePointer::new_uninit() },
            capacity: capacity as u32,
            head: AtomicU64::new(0),
            is_memory_initialized: AtomicBool::new(false),
        }
    }

    unsafe fn init<T: BaseAllocator>(&mut self, allocator: &T) -> Result<(), AllocationError> {
        if self.is_memory_initialized.load(Ordering::Relaxed) {
            fatal_panic!(from self,
                "Memory already initialized. Initializing it twice may lead to undefined behavior.");
        }

        unsafe {
            self.data_ptr.init(fail!(from self, when allocator
                .allocate(Layout::from_size_align_unchecked(
                    core::mem::size_of::<u32>() * (self.capacity + 1) as usize,
                    core::mem::align_of::<u32>())),
                "Failed to initialize since the allocation of the data memory failed."))
        };

        for i in 0..self.capacity + 1 {
            unsafe {
                (self.data_ptr.as_ptr() as *mut UnsafeCell<u32>)
                    .offset(i as isize)
                    .write(UnsafeCell::new(i + 1))
            };
        }

        self.is_memory_initialized.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn memory_size(capacity: usize) -> usize {
        Self::const_memory_size(capacity)
    }
}

impl UniqueIndexSet {
    #[inline(always)]
    fn verify_init(&self, source: &str) {
        debug_assert!(
            self.is_memory_initialized.load(Ordering::Relaxed),
            "Undefined behavior when calling \"{}\" and the object is not initialized.",
            source
        );
    }

    /// The compile time version of [`RelocatableContainer::memory_size()`]
    pub const fn const_memory_size(capacity: usize) -> usize {
        core::mem::size_of::<UnsafeCell<u32>>() * (capacity + 1) + core::mem::align_of::<u32>() - 1
    }

    /// Returns the capacity of the [`UniqueIndexSet`].
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the number of currently borrowed indices.
    pub fn borrowed_indices(&self) -> usize {
        HeadDetails::from(self.head.load(Ordering::Relaxed)).borrowed_indices as usize
    }

    /// Acquires a raw ([`u32`]) index from the [`UniqueIndexSet`]. Returns [`None`] when no
    /// more indices are available. The index **must** be returned manually with
    /// [`UniqueIndexSet::release_raw_index()`].
    ///
    /// # Safety
    ///
    ///  * The object must be initialized with [`RelocatableContainer::init()`].
    ///  * The index must be manually released with [`UniqueIndexSet::release_raw_index()`]
    ///    otherwise the index is leaked.
    pub unsafe fn acquire_raw_index(&self) -> Option<u32> {
        self.verify_init("acquire_raw_index");
        let mut old_value = self.head.load(Ordering::Acquire);
        let mut old = HeadDetails::from(old_value);

        loop {
            if old.head >= self.capacity {
                return None;
            }

            let new_value = HeadDetails {
                head: *self.get_next_free_index(old.head),
                aba: old.aba.wrapping_add(1),
                borrowed_indices: old.borrowed_indices + 1,
            }
            .value();

            old = match self.head.compare_exchange(
                old_value,
                new_value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(v) => {
                    old_value = v;
                    HeadDetails::from(v)
                }
            }
        }

        let index = old.head;
        *self.get_next_free_index(index) = self.capacity + 1;

        fence(Ordering::Acquire);
        Some(index)
    }

    /// Releases a raw index.
    ///
    /// # Safety
    ///
    ///  * It must be ensured that the index was acquired before and is not released twice.
    ///  * Shall only be used when the index was acquired with
    ///    [`UniqueIndexSet::acquire_raw_index()`]
    pub unsafe fn release_raw_index(&self, index: u32) {
        self.verify_init("release_raw_index");
        fence(Ordering::Release);

        let mut old_value = self.head.load(Ordering::Acquire);
        let mut old = HeadDetails::from(old_value);

        loop {
            *self.get_next_free_index(index) = old.head;

            let new_value = HeadDetails {
                head: index,
                aba: old.aba.wrapping_add(1),
                borrowed_indices: old.borrowed_indices - 1,
            }
            .value();

            old = match self.head.compare_exchange(
                old_value,
                new_value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return;
                }
                Err(v) => {
                    old_value = v;
                    HeadDetails::from(v)
                }
            };
        }
    }

    #[allow(clippy::mut_from_ref)]
    // convenience function to access the internally mutable free list entries
    fn get_next_free_index(&self, index: u32) -> &mut u32 {
        unsafe { &mut *(*self.data_ptr.as_ptr().offset(index as isize)).get() }
    }
}

/// The compile time fixed size version of the [`UniqueIndexSet`].
#[derive(Debug)]
#[repr(C)]
pub struct FixedSizeUniqueIndexSet<const CAPACITY: usize> {
    state: UniqueIndexSet,
    next_free_index: [UnsafeCell<u32>; CAPACITY],
    next_free_index_plus_one: UnsafeCell<u32>,
}

unsafe impl<const CAPACITY: usize> Sync for FixedSizeUniqueIndexSet<CAPACITY> {}
unsafe impl<const CAPACITY: usize> Send for FixedSizeUniqueIndexSet<CAPACITY> {}

impl<const CAPACITY: usize> Default for FixedSizeUniqueIndexSet<CAPACITY> {
    fn default() -> Self {
        let mut new_self = Self {
            state: unsafe { UniqueIndexSet::new_uninit(CAPACITY) },
            next_free_index: core::array::from_fn(|i| UnsafeCell::new(i as u32 + 1)),
            next_free_index_plus_one: UnsafeCell::new(CAPACITY as u32 + 1),
        };

        let allocator = BumpAllocator::new(new_self.next_free_index.as_mut_ptr().cast());
        unsafe {
            new_self
                .state
                .init(&allocator)
                .expect("All required memory is preallocated.")
        };
        new_self
    }
}

impl<const CAPACITY: usize> FixedSizeUniqueIndexSet<CAPACITY> {
    /// Creates a new [`FixedSizeUniqueIndexSet`].
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`UniqueIndexSet::capacity()`]
    pub fn capacity(&self) -> u32 {
        self.state.capacity()
    }

    /// See [`UniqueIndexSet::acquire_raw_index()`]
    ///
    /// # Safety
    ///
    ///  * The acquired index must be returned manually with
    ///    [`FixedSizeUniqueIndexSet::release_raw_index()`]
    ///
    pub unsafe fn acquire_raw_index(&self) -> Option<u32> {
        unsafe { self.state.acquire_raw_index() }
    }

    /// See [`UniqueIndexSet::release_raw_index()`]
    ///
    /// # Safety
    ///
    ///  * The released index must have been acquired with
    ///    [`FixedSizeUniqueIndexSet::acquire_raw_index()`]
    ///  * The index should not be released twice
    ///
    pub unsafe fn release_raw_index(&self, index: u32) {
        unsafe { self.state.release_raw_index(index) }
    }

    /// See [`UniqueIndexSet::borrowed_indices()`]
    pub fn borrowed_indices(&self) -> usize {
        self.state.borrowed_indices()
    }
}

#[cfg(test)]
mod test {
    use membus_bb_testing::assert_that;

    use super::HeadDetails;

    #[test]
    fn head_details() {
        let sut_value = HeadDetails {
            head: 12345,
            aba: 6789,
            borrowed_indices: 54321,
        }
        .value();

        let sut = HeadDetails::from(sut_value);

        assert_that!(sut.head, eq 12345);
        assert_that!(sut.aba, eq 6789);
        assert_that!(sut.borrowed_indices, eq 54321);
    }
}
