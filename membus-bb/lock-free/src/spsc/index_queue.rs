// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A **threadsafe** **lock-free** single producer single consumer queue which can store
//! [`u64`] integers or indices. When the queue is full the newest value is rejected.
//!
//! # Example
//!
//! ```
//! use membus_bb_lock_free::spsc::index_queue::*;
//!
//! const QUEUE_CAPACITY: usize = 128;
//! let queue = FixedSizeIndexQueue::<QUEUE_CAPACITY>::new();
//!
//! let mut producer = match queue.acquire_producer() {
//!     None => panic!("a producer has been already acquired."),
//!     Some(p) => p,
//! };
//!
//! if !producer.push(1234) {
//!     println!("queue is full");
//! }
//!
//! let mut consumer = match queue.acquire_consumer() {
//!     None => panic!("a consumer has been already acquired."),
//!     Some(p) => p,
//! };
//!
//! match consumer.pop() {
//!     None => println!("queue is empty"),
//!     Some(v) => println!("got {}", v)
//! }
//! ```

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use core::{alloc::Layout, cell::UnsafeCell, fmt::Debug};

use membus_bb_elementary::bump_allocator::BumpAllocator;
use membus_bb_elementary::math::unaligned_mem_size;
use membus_bb_elementary::owning_pointer::OwningPointer;
use membus_bb_elementary::pointer_trait::PointerTrait;
use membus_bb_elementary::relocatable_container::RelocatableContainer;
use membus_bb_elementary::relocatable_ptr::RelocatablePointer;
use membus_bb_log::{fail, fatal_panic};

/// The [`Producer`] of the [`IndexQueue`]/[`FixedSizeIndexQueue`] which can add values to it
/// via [`Producer::push()`].
pub struct Producer<'a, PointerType: PointerTrait<UnsafeCell<u64>> + Debug> {
    queue: &'a details::IndexQueue<PointerType>,
}

impl<PointerType: PointerTrait<UnsafeCell<u64>> + Debug> Producer<'_, PointerType> {
    /// Adds a new value to the queue. If the queue is full it returns false, otherwise true.
    pub fn push(&mut self, t: u64) -> bool {
        unsafe { self.queue.push(t) }
    }
}

impl<PointerType: PointerTrait<UnsafeCell<u64>> + Debug> Drop for Producer<'_, PointerType> {
    fn drop(&mut self) {
        self.queue.has_producer.store(true, Ordering::Relaxed);
    }
}

/// The [`Consumer`] of the [`IndexQueue`]/[`FixedSizeIndexQueue`] which can acquire values
/// from it via [`Consumer::pop()`].
pub struct Consumer<'a, PointerType: PointerTrait<UnsafeCell<u64>> + Debug> {
    queue: &'a details::IndexQueue<PointerType>,
}

impl<PointerType: PointerTrait<UnsafeCell<u64>> + Debug> Consumer<'_, PointerType> {
    /// Acquires a value from the queue. If the queue is empty it returns [`None`].
    pub fn pop(&mut self) -> Option<u64> {
        unsafe { self.queue.pop() }
    }
}

impl<PointerType: PointerTrait<UnsafeCell<u64>> + Debug> Drop for Consumer<'_, PointerType> {
    fn drop(&mut self) {
        self.queue.has_consumer.store(true, Ordering::Relaxed);
    }
}

/// Non-relocatable version of the index queue
pub type IndexQueue = details::IndexQueue<OwningPointer<UnsafeCell<u64>>>;

/// Relocatable version of the index queue
pub type RelocatableIndexQueue = details::IndexQueue<RelocatablePointer<UnsafeCell<u64>>>;

pub mod details {
    use super::*;

    /// A threadsafe lock-free index queue with a capacity which can be set up at runtime,
    /// when the queue is created.
    #[repr(C)]
    #[derive(Debug)]
    pub struct IndexQueue<PointerType: PointerTrait<UnsafeCell<u64>>> {
        data_ptr: PointerType,
        capacity: usize,
        write_position: AtomicU64,
        read_position: AtomicU64,
        pub(super) has_producer: AtomicBool,
        pub(super) has_consumer: AtomicBool,
        is_memory_initialized: AtomicBool,
    }

    unsafe impl<PointerType: PointerTrait<UnsafeCell<u64>>> Sync for IndexQueue<PointerType> {}
    unsafe impl<PointerType: PointerTrait<UnsafeCell<u64>>> Send for IndexQueue<PointerType> {}

    impl IndexQueue<OwningPointer<UnsafeCell<u64>>> {
        pub fn new(capacity: usize) -> Self {
            let mut data_ptr = OwningPointer::<UnsafeCell<u64>>::new_with_alloc(capacity + 1);

            for i in 0..capacity + 1 {
                unsafe { data_ptr.as_mut_ptr().add(i).write(UnsafeCell::new(0)) };
            }

            Self {
                data_ptr,
                capacity,
                write_position: AtomicU64::new(0),
                read_position: AtomicU64::new(0),
                has_producer: AtomicBool::new(true),
                has_consumer: AtomicBool::new(true),
                is_memory_initialized: AtomicBool::new(true),
            }
        }
    }

    impl RelocatableContainer for IndexQueue<RelocatablePointer<UnsafeCell<u64>>> {
        unsafe fn new_uninit(capacity: usize) -> Self {
            Self {
                data_ptr: unsafe { RelocatablePointer::new_uninit() },
                capacity,
                write_position: AtomicU64::new(0),
                read_position: AtomicU64::new(0),
                has_producer: AtomicBool::new(true),
                has_consumer: AtomicBool::new(true),
                is_memory_initialized: AtomicBool::new(false),
            }
        }

        unsafe fn init<T: membus_bb_elementary::allocator::BaseAllocator>(
            &mut self,
            allocator: &T,
        ) -> Result<(), membus_bb_elementary::allocator::AllocationError> {
            if self.is_memory_initialized.load(Ordering::Relaxed) {
                fatal_panic!(from self,
                    "Memory already initialized. Initializing it twice may lead to undefined behavior.");
            }

            unsafe {
                self.data_ptr.init(fail!(from self, when allocator
                .allocate(Layout::from_size_align_unchecked(
                        core::mem::size_of::<u64>() * (self.capacity + 1),
                        core::mem::align_of::<u64>())),
                "Failed to initialize since the allocation of the data memory failed."))
            };

            for i in 0..self.capacity + 1 {
                unsafe {
                    (self.data_ptr.as_ptr() as *mut UnsafeCell<u64>)
                        .add(i)
                        .write(UnsafeCell::new(0))
                };
            }

            self.is_memory_initialized.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn memory_size(capacity: usize) -> usize {
            Self::const_memory_size(capacity)
        }
    }

    impl<PointerType: PointerTrait<UnsafeCell<u64>> + Debug> IndexQueue<PointerType> {
        #[inline(always)]
        fn verify_init(&self, source: &str) {
            debug_assert!(
                self.is_memory_initialized.load(Ordering::Relaxed),
                "Undefined behavior when calling IndexQueue::{source} and the object is not initialized."
            );
        }

        /// Returns the amount of memory required to create an [`IndexQueue`] with the
        /// provided capacity.
        pub const fn const_memory_size(capacity: usize) -> usize {
            unaligned_mem_size::<UnsafeCell<u64>>(capacity + 1)
        }

        fn at(&self, position: u64) -> *mut u64 {
            unsafe {
                (*self
                    .data_ptr
                    .as_ptr()
                    .add((position % (self.capacity as u64 + 1)) as usize))
                .get()
            }
        }

        /// Acquires the [`Producer`] of the queue. Threadsafe and lock-free but when another
        /// thread has already acquired the producer it returns [`None`] since it is a single
        /// producer single consumer queue.
        pub fn acquire_producer(&self) -> Option<Producer<'_, PointerType>> {
            self.verify_init("acquire_producer()");
            match self.has_producer.compare_exchange(
                true,
                false,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => Some(Producer { queue: self }),
                Err(_) => None,
            }
        }

        /// Acquires the [`Consumer`] of the queue. Threadsafe and lock-free but when another
        /// thread has already acquired the consumer it returns [`None`].
        pub fn acquire_consumer(&self) -> Option<Consumer<'_, PointerType>> {
            self.verify_init("acquire_consumer()");
            match self.has_consumer.compare_exchange(
                true,
                false,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => Some(Consumer { queue: self }),
                Err(_) => None,
            }
        }

        /// Push an index into the queue. If the queue is full the value is rejected and
        /// false is returned.
        ///
        /// # Safety
        ///
        ///  * Must not be called concurrently, at most one thread may push.
        ///  * The memory must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn push(&self, value: u64) -> bool {
            let write_position = self.write_position.load(Ordering::Relaxed);
            let is_full =
                write_position == self.read_position.load(Ordering::Relaxed) + self.capacity as u64;

            if is_full {
                return false;
            }

            unsafe { self.at(write_position).write(value) };
            ////////////////
            // SYNC POINT
            ////////////////
            self.write_position
                .store(write_position + 1, Ordering::Release);

            true
        }

        /// Acquires an index from the queue. If the queue is empty [`None`] is returned.
        ///
        /// # Safety
        ///
        ///  * Must not be called concurrently, at most one thread may pop.
        ///  * The memory must be initialized with [`RelocatableContainer::init()`].
        pub unsafe fn pop(&self) -> Option<u64> {
            let read_position = self.read_position.load(Ordering::Relaxed);
            ////////////////
            // SYNC POINT
            ////////////////
            let is_empty = read_position == self.write_position.load(Ordering::Acquire);

            if is_empty {
                return None;
            }

            let value = unsafe { *self.at(read_position) };
            // prevent that the value read and the read_position update are reordered
            // according to the AS-IF rule
            core::sync::atomic::fence(Ordering::AcqRel);
            self.read_position
                .store(read_position + 1, Ordering::Relaxed);

            Some(value)
        }

        fn acquire_read_and_write_position(&self) -> (u64, u64) {
            loop {
                let write_position = self.write_position.load(Ordering::Relaxed);
                let read_position = self.read_position.load(Ordering::Relaxed);

                if write_position == self.write_position.load(Ordering::Relaxed)
                    && read_position == self.read_position.load(Ordering::Relaxed)
                {
                    return (write_position, read_position);
                }
            }
        }

        /// Returns true when the queue is empty, otherwise false. In a concurrent setup the
        /// information can be out-of-date as soon as it is acquired.
        pub fn is_empty(&self) -> bool {
            let (write_position, read_position) = self.acquire_read_and_write_position();
            write_position == read_position
        }

        /// Returns the current length. In a concurrent setup the information can be
        /// out-of-date as soon as it is acquired.
        pub fn len(&self) -> usize {
            let (write_position, read_position) = self.acquire_read_and_write_position();
            (write_position - read_position) as usize
        }

        /// Returns the capacity of the queue.
        pub const fn capacity(&self) -> usize {
            self.capacity
        }

        /// Returns true when the queue is full, otherwise false. In a concurrent setup the
        /// information can be out-of-date as soon as it is acquired.
        pub fn is_full(&self) -> bool {
            let (write_position, read_position) = self.acquire_read_and_write_position();
            write_position == read_position + self.capacity as u64
        }
    }
}

/// The compile-time fixed size version of the [`IndexQueue`].
#[derive(Debug)]
#[repr(C)]
pub struct FixedSizeIndexQueue<const CAPACITY: usize> {
    state: RelocatableIndexQueue,
    data: [UnsafeCell<u64>; CAPACITY],
    data_plus_one: UnsafeCell<u64>,
}

unsafe impl<const CAPACITY: usize> Sync for FixedSizeIndexQueue<CAPACITY> {}
unsafe impl<const CAPACITY: usize> Send for FixedSizeIndexQueue<CAPACITY> {}

impl<const CAPACITY: usize> Default for FixedSizeIndexQueue<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> FixedSizeIndexQueue<CAPACITY> {
    /// Creates a new empty [`FixedSizeIndexQueue`].
    pub fn new() -> Self {
        let mut new_self = Self {
            state: unsafe { RelocatableIndexQueue::new_uninit(CAPACITY) },
            data: core::array::from_fn(|_| UnsafeCell::new(0)),
            data_plus_one: UnsafeCell::new(0),
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

    /// See [`details::IndexQueue::acquire_producer()`]
    pub fn acquire_producer(&self) -> Option<Producer<'_, RelocatablePointer<UnsafeCell<u64>>>> {
        self.state.acquire_producer()
    }

    /// See [`details::IndexQueue::acquire_consumer()`]
    pub fn acquire_consumer(&self) -> Option<Consumer<'_, RelocatablePointer<UnsafeCell<u64>>>> {
        self.state.acquire_consumer()
    }

    /// See [`details::IndexQueue::push()`]
    ///
    /// # Safety
    ///
    /// * It must be ensured that no other thread/process calls this method concurrently
    ///
    pub unsafe fn push(&self, value: u64) -> bool {
        unsafe { self.state.push(value) }
    }

    /// See [`details::IndexQueue::pop()`]
    ///
    /// # Safety
    ///
    /// * It must be ensured that no other thread/process calls this method concurrently
    ///
    pub unsafe fn pop(&self) -> Option<u64> {
        unsafe { self.state.pop() }
    }

    /// See [`details::IndexQueue::is_empty()`]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// See [`details::IndexQueue::len()`]
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// See [`details::IndexQueue::capacity()`]
    pub const fn capacity(&self) -> usize {
        self.state.capacity()
    }

    /// See [`details::IndexQueue::is_full()`]
    pub fn is_full(&self) -> bool {
        self.state.is_full()
    }
}
