// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Three vector flavors with a fixed capacity: [`Vec`] (heap-backed, movable),
//! [`RelocatableVec`] (non-movable, shared-memory capable, runtime capacity) and
//! [`FixedSizeVec`] (self-contained, compile-time capacity).
//!
//! # Example
//!
//! ```
//! use membus_bb_container::vec::FixedSizeVec;
//!
//! let mut vec = FixedSizeVec::<u64, 12>::new();
//! vec.push(123);
//!
//! println!("pop from vec {}", vec.pop().unwrap());
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use core::{
    alloc::Layout,
    marker::PhantomData,
    mem::MaybeUninit,
    ops::{Deref, DerefMut},
};

use membus_bb_elementary::bump_allocator::BumpAllocator;
use membus_bb_elementary::math::unaligned_mem_size;
use membus_bb_elementary::owning_pointer::{GenericOwningPointer, OwningPointer};
use membus_bb_elementary::pointer_trait::{GenericPointer, PointerTrait};
use membus_bb_elementary::relocatable_container::RelocatableContainer;
use membus_bb_elementary::relocatable_ptr::{GenericRelocatablePointer, RelocatablePointer};
use membus_bb_log::{fail, fatal_panic};

/// Vector with run-time fixed size capacity. In contrast to its counterpart the
/// [`RelocatableVec`] it is movable but is not shared memory compatible.
pub type Vec<T> = details::MetaVec<T, GenericOwningPointer>;

/// **Non-movable** relocatable vector with runtime fixed size capacity.
pub type RelocatableVec<T> = details::MetaVec<T, GenericRelocatablePointer>;

#[doc(hidden)]
pub mod details {
    use super::*;

    #[repr(C)]
    #[derive(Debug)]
    pub struct MetaVec<T, Ptr: GenericPointer> {
        data_ptr: Ptr::Type<MaybeUninit<T>>,
        capacity: usize,
        len: usize,
        is_initialized: AtomicBool,
        _phantom_data: PhantomData<T>,
    }

    unsafe impl<T: Send, Ptr: GenericPointer> Send for MetaVec<T, Ptr> {}

    impl<T, Ptr: GenericPointer> Drop for MetaVec<T, Ptr> {
        fn drop(&mut self) {
            if self.is_initialized.load(Ordering::Relaxed) {
                unsafe { self.clear_impl() };
            }
        }
    }

    impl<T> Vec<T> {
        /// Creates a new [`Vec`] with the provided capacity.
        pub fn new(capacity: usize) -> Self {
            Self {
                data_ptr: OwningPointer::<MaybeUninit<T>>::new_with_alloc(capacity),
                capacity,
                len: 0,
                is_initialized: AtomicBool::new(true),
                _phantom_data: PhantomData,
            }
        }
    }

    impl<T> RelocatableContainer for MetaVec<T, GenericRelocatablePointer> {
        unsafe fn new_uninit(capacity: usize) -> Self {
            Self {
                data_ptr: unsafe { RelocatablePointer::new_uninit() },
                capacity,
                len: 0,
                is_initialized: AtomicBool::new(false),
                _phantom_data: PhantomData,
            }
        }

        unsafe fn init<Allocator: membus_bb_elementary::allocator::BaseAllocator>(
            &mut self,
            allocator: &Allocator,
        ) -> Result<(), membus_bb_elementary::allocator::AllocationError> {
            if self.is_initialized.load(Ordering::Relaxed) {
                fatal_panic!(from "Vec::init()",
                    "Memory already initialized. Initializing it twice may lead to undefined behavior.");
            }

            unsafe {
                self.data_ptr.init(fail!(from "Vec::init()", when allocator
                    .allocate(Layout::from_size_align_unchecked(
                        core::mem::size_of::<T>() * self.capacity,
                        core::mem::align_of::<T>(),
                    )), "Failed to initialize since the allocation of the data memory failed."
                ))
            };
            self.is_initialized.store(true, Ordering::Relaxed);

            Ok(())
        }

        fn memory_size(capacity: usize) -> usize {
            Self::const_memory_size(capacity)
        }
    }

    impl<T, Ptr: GenericPointer> Deref for MetaVec<T, Ptr> {
        type Target = [T];

        fn deref(&self) -> &Self::Target {
            self.verify_init("deref()");
            unsafe { core::slice::from_raw_parts((*self.data_ptr.as_ptr()).as_ptr(), self.len) }
        }
    }

    impl<T, Ptr: GenericPointer> DerefMut for MetaVec<T, Ptr> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            self.verify_init("deref_mut()");
            unsafe {
                core::slice::from_raw_parts_mut(
                    (*self.data_ptr.as_mut_ptr()).as_mut_ptr(),
                    self.len,
                )
            }
        }
    }

    impl<T: PartialEq, Ptr: GenericPointer> PartialEq for MetaVec<T, Ptr> {
        fn eq(&self, other: &Self) -> bool {
            if other.len() != self.len() {
                return false;
            }

            for i in 0..self.len() {
                if other[i] != self[i] {
                    return false;
                }
            }

            true
        }
    }

    impl<T: Eq, Ptr: GenericPointer> Eq for MetaVec<T, Ptr> {}

    impl<T, Ptr: GenericPointer> MetaVec<T, Ptr> {
        #[inline(always)]
        fn verify_init(&self, source: &str) {
            debug_assert!(
                self.is_initialized.load(Ordering::Relaxed),
                "Undefined behavior when calling Vec::{source} and the object is not initialized."
            );
        }

        /// Returns the amount of memory the payload of a vector with the provided capacity
        /// requires.
        pub const fn const_memory_size(capacity: usize) -> usize {
            unaligned_mem_size::<T>(capacity)
        }

        /// Returns the capacity of the vector
        pub fn capacity(&self) -> usize {
            self.capacity
        }

        /// Returns the number of elements stored inside the vector
        pub fn len(&self) -> usize {
            self.len
        }

        /// Returns true if the vector is empty, otherwise false
        pub fn is_empty(&self) -> bool {
            self.len == 0
        }

        /// Returns true if the vector is full, otherwise false
        pub fn is_full(&self) -> bool {
            self.len == self.capacity
        }

        pub(crate) unsafe fn push_impl(&mut self, value: T) -> bool {
            if self.is_full() {
                return false;
            }

            self.verify_init("push()");
            self.push_unchecked(value);
            true
        }

        fn push_unchecked(&mut self, value: T) {
            unsafe {
                self.data_ptr
                    .as_mut_ptr()
                    .add(self.len)
                    .write(MaybeUninit::new(value))
            };

            self.len += 1;
        }

        pub(crate) unsafe fn pop_impl(&mut self) -> Option<T> {
            if self.is_empty() {
                return None;
            }

            self.verify_init("pop()");
            Some(self.pop_unchecked())
        }

        fn pop_unchecked(&mut self) -> T {
            let value = core::mem::replace(
                unsafe { &mut *self.data_ptr.as_mut_ptr().add(self.len - 1) },
                MaybeUninit::uninit(),
            );
            self.len -= 1;

            unsafe { value.assume_init() }
        }

        pub(crate) unsafe fn remove_impl(&mut self, index: usize) -> T {
            debug_assert!(index < self.len, "Removing an out-of-bounds index.");

            self.verify_init("remove()");
            let value = core::mem::replace(
                unsafe { &mut *self.data_ptr.as_mut_ptr().add(index) },
                MaybeUninit::uninit(),
            );

            for i in index..self.len - 1 {
                unsafe {
                    let next = core::ptr::read(self.data_ptr.as_ptr().add(i + 1));
                    self.data_ptr.as_mut_ptr().add(i).write(next);
                }
            }
            self.len -= 1;

            unsafe { value.assume_init() }
        }

        pub(crate) unsafe fn clear_impl(&mut self) {
            for _ in 0..self.len {
                self.pop_unchecked();
            }
        }
    }

    impl<T> RelocatableVec<T> {
        /// Adds an element at the end of the vector. If the vector is full it returns false,
        /// otherwise true.
        ///
        /// # Safety
        ///
        ///  * The object must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn push(&mut self, value: T) -> bool {
            unsafe { self.push_impl(value) }
        }

        /// Removes the last element. If the vector is empty it returns [`None`].
        ///
        /// # Safety
        ///
        ///  * The object must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn pop(&mut self) -> Option<T> {
            unsafe { self.pop_impl() }
        }

        /// Removes the element at `index` while preserving the order of the remaining
        /// elements.
        ///
        /// # Safety
        ///
        ///  * The object must be initialized with [`RelocatableContainer::init()`].
        ///  * `index` must be smaller than [`MetaVec::len()`].
        pub unsafe fn remove(&mut self, index: usize) -> T {
            unsafe { self.remove_impl(index) }
        }

        /// Removes all elements from the vector.
        ///
        /// # Safety
        ///
        ///  * The object must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn clear(&mut self) {
            unsafe { self.clear_impl() }
        }
    }

    impl<T> Vec<T> {
        /// Adds an element at the end of the vector. If the vector is full it returns false,
        /// otherwise true.
        pub fn push(&mut self, value: T) -> bool {
            unsafe { self.push_impl(value) }
        }

        /// Removes the last element. If the vector is empty it returns [`None`].
        pub fn pop(&mut self) -> Option<T> {
            unsafe { self.pop_impl() }
        }

        /// Removes the element at `index` while preserving the order of the remaining
        /// elements. `index` must be smaller than [`MetaVec::len()`].
        pub fn remove(&mut self, index: usize) -> T {
            unsafe { self.remove_impl(index) }
        }

        /// Removes all elements from the vector.
        pub fn clear(&mut self) {
            unsafe { self.clear_impl() }
        }
    }
}

/// Self-contained vector with compile-time fixed capacity, shared-memory compatible.
#[repr(C)]
#[derive(Debug)]
pub struct FixedSizeVec<T, const CAPACITY: usize> {
    state: RelocatableVec<T>,
    data: [MaybeUninit<T>; CAPACITY],
}

impl<T, const CAPACITY: usize> Default for FixedSizeVec<T, CAPACITY> {
    fn default() -> Self {
        let mut new_self = Self {
            state: unsafe { RelocatableVec::new_uninit(CAPACITY) },
            data: core::array::from_fn(|_| MaybeUninit::uninit()),
        };

        let allocator = BumpAllocator::new(new_self.data.as_mut_ptr().cast());
        unsafe {
            new_self
                .state
                .init(&allocator)
                .expect("All required memory is preallocated.")
        };

        new_self
    }
}

impl<T, const CAPACITY: usize> Deref for FixedSizeVec<T, CAPACITY> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.state.deref()
    }
}

impl<T, const CAPACITY: usize> DerefMut for FixedSizeVec<T, CAPACITY> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state.deref_mut()
    }
}

impl<T: PartialEq, const CAPACITY: usize> PartialEq for FixedSizeVec<T, CAPACITY> {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl<T: Eq, const CAPACITY: usize> Eq for FixedSizeVec<T, CAPACITY> {}

impl<'a, T, const CAPACITY: usize> IntoIterator for &'a FixedSizeVec<T, CAPACITY> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, const CAPACITY: usize> FixedSizeVec<T, CAPACITY> {
    /// Creates a new empty [`FixedSizeVec`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the capacity of the vector.
    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }

    /// Returns the number of elements stored inside the vector.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Returns true if the vector is empty, otherwise false.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Returns true if the vector is full, otherwise false.
    pub fn is_full(&self) -> bool {
        self.state.is_full()
    }

    /// Adds an element at the end of the vector. If the vector is full it returns false,
    /// otherwise true.
    pub fn push(&mut self, value: T) -> bool {
        unsafe { self.state.push(value) }
    }

    /// Removes the last element. If the vector is empty it returns [`None`].
    pub fn pop(&mut self) -> Option<T> {
        unsafe { self.state.pop() }
    }

    /// Removes the element at `index` while preserving the order of the remaining elements.
    /// `index` must be smaller than [`FixedSizeVec::len()`].
    pub fn remove(&mut self, index: usize) -> T {
        unsafe { self.state.remove(index) }
    }

    /// Removes all elements from the vector.
    pub fn clear(&mut self) {
        unsafe { self.state.clear() }
    }
}
