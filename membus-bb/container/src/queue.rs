// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Three single-threaded queue flavors with a fixed capacity: [`Queue`] (heap-backed,
//! movable), [`RelocatableQueue`] (non-movable, shared-memory capable, runtime capacity) and
//! [`FixedSizeQueue`] (self-contained, compile-time capacity). The queue is no concurrency
//! primitive, compound updates must be protected externally.
//!
//! # Example
//!
//! ```
//! use membus_bb_container::queue::FixedSizeQueue;
//!
//! let mut queue = FixedSizeQueue::<u64, 12>::new();
//! queue.push(123);
//!
//! println!("pop from queue {}", queue.pop().unwrap());
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use core::{alloc::Layout, fmt::Debug, marker::PhantomData, mem::MaybeUninit};

use membus_bb_elementary::bump_allocator::BumpAllocator;
use membus_bb_elementary::math::unaligned_mem_size;
use membus_bb_elementary::owning_pointer::{GenericOwningPointer, OwningPointer};
use membus_bb_elementary::pointer_trait::{GenericPointer, PointerTrait};
use membus_bb_elementary::relocatable_container::RelocatableContainer;
use membus_bb_elementary::relocatable_ptr::{GenericRelocatablePointer, RelocatablePointer};
use membus_bb_log::{fail, fatal_panic};

/// Queue with run-time fixed size capacity. In contrast to its counterpart the
/// [`RelocatableQueue`] it is movable but is not shared memory compatible.
pub type Queue<T> = details::MetaQueue<T, GenericOwningPointer>;

/// **Non-movable** relocatable queue with runtime fixed size capacity.
pub type RelocatableQueue<T> = details::MetaQueue<T, GenericRelocatablePointer>;

#[doc(hidden)]
pub mod details {
    use super::*;

    #[repr(C)]
    #[derive(Debug)]
    pub struct MetaQueue<T, Ptr: GenericPointer> {
        data_ptr: Ptr::Type<MaybeUninit<T>>,
        start: usize,
        len: usize,
        capacity: usize,
        is_initialized: AtomicBool,
        _phantom_data: PhantomData<T>,
    }

    unsafe impl<T: Send, Ptr: GenericPointer> Send for MetaQueue<T, Ptr> {}

    impl<T, Ptr: GenericPointer> Drop for MetaQueue<T, Ptr> {
        fn drop(&mut self) {
            if self.is_initialized.load(Ordering::Relaxed) {
                unsafe { self.clear_impl() };
            }
        }
    }

    impl<T> Queue<T> {
        /// Creates a new [`Queue`] with the provided capacity.
        pub fn new(capacity: usize) -> Self {
            Self {
                data_ptr: OwningPointer::<MaybeUninit<T>>::new_with_alloc(capacity),
                start: 0,
                len: 0,
                capacity,
                is_initialized: AtomicBool::new(true),
                _phantom_data: PhantomData,
            }
        }

        /// Removes all elements from the queue.
        pub fn clear(&mut self) {
            unsafe { self.clear_impl() }
        }

        /// Returns a reference to the element at the beginning of the queue without
        /// removing it. If the queue is empty it returns [`None`].
        pub fn peek(&self) -> Option<&T> {
            unsafe { self.peek_impl() }
        }

        /// Removes the element from the beginning of the queue. If the queue is empty it
        /// returns [`None`].
        pub fn pop(&mut self) -> Option<T> {
            unsafe { self.pop_impl() }
        }

        /// Adds an element at the end of the queue. If the queue is full it returns false,
        /// otherwise true.
        pub fn push(&mut self, value: T) -> bool {
            unsafe { self.push_impl(value) }
        }

        /// Adds an element at the end of the queue. If the queue is full it returns the
        /// oldest element, otherwise [`None`].
        pub fn push_with_overflow(&mut self, value: T) -> Option<T> {
            unsafe { self.push_with_overflow_impl(value) }
        }
    }

    impl<T> RelocatableContainer for MetaQueue<T, GenericRelocatablePointer> {
        unsafe fn new_uninit(capacity: usize) -> Self {
            Self {
                data_ptr: unsafe { RelocatablePointer::new_uninit() },
                start: 0,
                len: 0,
                capacity,
                is_initialized: AtomicBool::new(false),
                _phantom_data: PhantomData,
            }
        }

        unsafe fn init<Allocator: membus_bb_elementary::allocator::BaseAllocator>(
            &mut self,
            allocator: &Allocator,
        ) -> Result<(), membus_bb_elementary::allocator::AllocationError> {
            if self.is_initialized.load(Ordering::Relaxed) {
                fatal_panic!(from "Queue::init()",
                    "Memory already initialized. Initializing it twice may lead to undefined behavior.");
            }

            unsafe {
                self.data_ptr.init(fail!(from "Queue::init()", when allocator
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

    impl<T> RelocatableQueue<T> {
        /// Removes all elements from the queue.
        ///
        /// # Safety
        ///
        ///  * The object must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn clear(&mut self) {
            unsafe { self.clear_impl() }
        }

        /// Returns a reference to the element at the beginning of the queue without
        /// removing it. If the queue is empty it returns [`None`].
        ///
        /// # Safety
        ///
        ///  * The object must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn peek(&self) -> Option<&T> {
            unsafe { self.peek_impl() }
        }

        /// Removes the element from the beginning of the queue. If the queue is empty it
        /// returns [`None`].
        ///
        /// # Safety
        ///
        ///  * The object must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn pop(&mut self) -> Option<T> {
            unsafe { self.pop_impl() }
        }

        /// Adds an element at the end of the queue. If the queue is full it returns false,
        /// otherwise true.
        ///
        /// # Safety
        ///
        ///  * The object must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn push(&mut self, value: T) -> bool {
            unsafe { self.push_impl(value) }
        }

        /// Adds an element at the end of the queue. If the queue is full it returns the
        /// oldest element, otherwise [`None`].
        ///
        /// # Safety
        ///
        ///  * The object must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn push_with_overflow(&mut self, value: T) -> Option<T> {
            unsafe { self.push_with_overflow_impl(value) }
        }
    }

    impl<T: Copy + Debug, Ptr: GenericPointer + Debug> MetaQueue<T, Ptr> {
        /// Returns a copy of the element stored at index. The index is starting by 0 for the
        /// oldest element until [`MetaQueue::len()`].
        ///
        /// # Safety
        ///
        ///   * Must satisfy `index` < [`MetaQueue::len()`]
        pub unsafe fn get_unchecked(&self, index: usize) -> T {
            unsafe {
                (*self
                    .data_ptr
                    .as_ptr()
                    .add((self.start + index) % self.capacity))
                .assume_init()
            }
        }
    }

    impl<T, Ptr: GenericPointer> MetaQueue<T, Ptr> {
        #[inline(always)]
        fn verify_init(&self, source: &str) {
            debug_assert!(
                self.is_initialized.load(Ordering::Relaxed),
                "Undefined behavior when calling Queue::{source} and the object is not initialized."
            );
        }

        /// Returns the amount of memory the payload of a queue with the provided capacity
        /// requires.
        pub const fn const_memory_size(capacity: usize) -> usize {
            unaligned_mem_size::<T>(capacity)
        }

        /// Returns the capacity of the queue.
        pub fn capacity(&self) -> usize {
            self.capacity
        }

        /// Returns the number of elements stored inside the queue.
        pub fn len(&self) -> usize {
            self.len
        }

        /// Returns true if the queue is empty, otherwise false.
        pub fn is_empty(&self) -> bool {
            self.len == 0
        }

        /// Returns true if the queue is full, otherwise false.
        pub fn is_full(&self) -> bool {
            self.len == self.capacity
        }

        pub(crate) unsafe fn clear_impl(&mut self) {
            while unsafe { self.pop_impl() }.is_some() {}
        }

        pub(crate) unsafe fn peek_impl(&self) -> Option<&T> {
            if self.is_empty() {
                return None;
            }

            self.verify_init("peek()");
            Some(unsafe {
                (*self.data_ptr.as_ptr().add(self.start % self.capacity)).assume_init_ref()
            })
        }

        pub(crate) unsafe fn pop_impl(&mut self) -> Option<T> {
            if self.is_empty() {
                return None;
            }

            self.verify_init("pop()");
            let value = core::mem::replace(
                unsafe { &mut *self.data_ptr.as_mut_ptr().add(self.start % self.capacity) },
                MaybeUninit::uninit(),
            );
            self.start = (self.start + 1) % self.capacity;
            self.len -= 1;

            Some(unsafe { value.assume_init() })
        }

        pub(crate) unsafe fn push_impl(&mut self, value: T) -> bool {
            if self.is_full() {
                return false;
            }

            self.verify_init("push()");
            unsafe { self.unchecked_push(value) };
            true
        }

        pub(crate) unsafe fn push_with_overflow_impl(&mut self, value: T) -> Option<T> {
            let overridden_value = if self.is_full() {
                unsafe { self.pop_impl() }
            } else {
                None
            };

            self.verify_init("push_with_overflow()");
            unsafe { self.unchecked_push(value) };
            overridden_value
        }

        unsafe fn unchecked_push(&mut self, value: T) {
            unsafe {
                self.data_ptr
                    .as_mut_ptr()
                    .add((self.start + self.len) % self.capacity)
                    .write(MaybeUninit::new(value))
            };
            self.len += 1;
        }
    }
}

/// Self-contained queue with compile-time fixed capacity, shared-memory compatible.
#[repr(C)]
#[derive(Debug)]
pub struct FixedSizeQueue<T, const CAPACITY: usize> {
    state: RelocatableQueue<T>,
    data: [MaybeUninit<T>; CAPACITY],
}

impl<T, const CAPACITY: usize> Default for FixedSizeQueue<T, CAPACITY> {
    fn default() -> Self {
        let mut new_self = Self {
            state: unsafe { RelocatableQueue::new_uninit(CAPACITY) },
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

impl<T, const CAPACITY: usize> FixedSizeQueue<T, CAPACITY> {
    /// Creates a new empty [`FixedSizeQueue`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.state.capacity()
    }

    /// Returns the number of elements stored inside the queue.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Returns true if the queue is empty, otherwise false.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Returns true if the queue is full, otherwise false.
    pub fn is_full(&self) -> bool {
        self.state.is_full()
    }

    /// Removes all elements from the queue.
    pub fn clear(&mut self) {
        unsafe { self.state.clear() }
    }

    /// Returns a reference to the element at the beginning of the queue without removing
    /// it. If the queue is empty it returns [`None`].
    pub fn peek(&self) -> Option<&T> {
        unsafe { self.state.peek() }
    }

    /// Removes the element from the beginning of the queue. If the queue is empty it
    /// returns [`None`].
    pub fn pop(&mut self) -> Option<T> {
        unsafe { self.state.pop() }
    }

    /// Adds an element at the end of the queue. If the queue is full it returns false,
    /// otherwise true.
    pub fn push(&mut self, value: T) -> bool {
        unsafe { self.state.push(value) }
    }

    /// Adds an element at the end of the queue. If the queue is full it returns the oldest
    /// element, otherwise [`None`].
    pub fn push_with_overflow(&mut self, value: T) -> Option<T> {
        unsafe { self.state.push_with_overflow(value) }
    }
}

impl<T: Copy + Debug, const CAPACITY: usize> FixedSizeQueue<T, CAPACITY> {
    /// See [`details::MetaQueue::get_unchecked()`]
    ///
    /// # Safety
    ///
    ///   * Must satisfy `index` < [`FixedSizeQueue::len()`]
    pub unsafe fn get_unchecked(&self, index: usize) -> T {
        unsafe { self.state.get_unchecked(index) }
    }
}
