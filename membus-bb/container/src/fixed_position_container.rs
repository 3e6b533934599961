// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A container whose elements never move. Insertion placement-constructs the value in the
//! first free slot and returns a pointer to it, removal destructs in place and marks the
//! slot free without shifting any neighbor. Pointers to elements therefore stay valid for
//! the whole element lifetime, which makes the container suitable as backing storage for
//! objects which are referred to with relative pointers from other processes.
//!
//! The container itself is no concurrency primitive, it must be mutated by a single thread.
//!
//! # Example
//!
//! ```
//! use membus_bb_container::fixed_position_container::FixedPositionContainer;
//!
//! let mut container = FixedPositionContainer::<u64, 12>::new();
//!
//! let element = container.insert(1234).unwrap();
//! container.remove(element.as_ptr());
//! ```

use core::fmt::Debug;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use membus_bb_elementary::placement_default::PlacementDefault;

/// Container with compile-time fixed capacity whose elements have a stable memory position.
#[repr(C)]
pub struct FixedPositionContainer<T, const CAPACITY: usize> {
    data: [MaybeUninit<T>; CAPACITY],
    is_used: [bool; CAPACITY],
    len: usize,
}

impl<T, const CAPACITY: usize> Debug for FixedPositionContainer<T, CAPACITY> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "FixedPositionContainer<{}, {}> {{ len: {} }}",
            core::any::type_name::<T>(),
            CAPACITY,
            self.len
        )
    }
}

impl<T, const CAPACITY: usize> Default for FixedPositionContainer<T, CAPACITY> {
    fn default() -> Self {
        Self {
            data: core::array::from_fn(|_| MaybeUninit::uninit()),
            is_used: [false; CAPACITY],
            len: 0,
        }
    }
}

impl<T, const CAPACITY: usize> Drop for FixedPositionContainer<T, CAPACITY> {
    fn drop(&mut self) {
        self.clear()
    }
}

impl<T, const CAPACITY: usize> PlacementDefault for FixedPositionContainer<T, CAPACITY> {
    unsafe fn placement_default(ptr: *mut Self) {
        // the slots stay uninitialized until they are marked used
        unsafe {
            let is_used = core::ptr::addr_of_mut!((*ptr).is_used);
            (*is_used).as_mut_ptr().write_bytes(0, CAPACITY);
            core::ptr::addr_of_mut!((*ptr).len).write(0);
        }
    }
}

impl<T, const CAPACITY: usize> FixedPositionContainer<T, CAPACITY> {
    /// Creates a new empty [`FixedPositionContainer`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the capacity of the container.
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// Returns the number of stored elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the container is empty, otherwise false.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true when the container is full, otherwise false.
    pub fn is_full(&self) -> bool {
        self.len == CAPACITY
    }

    /// Constructs `value` in the first free slot and returns a pointer to it which stays
    /// valid until the element is removed. When the container is full it returns [`None`].
    pub fn insert(&mut self, value: T) -> Option<NonNull<T>> {
        for i in 0..CAPACITY {
            if !self.is_used[i] {
                self.data[i].write(value);
                self.is_used[i] = true;
                self.len += 1;
                return Some(unsafe { NonNull::new_unchecked(self.data[i].as_mut_ptr()) });
            }
        }

        None
    }

    /// Destructs the element `ptr` points to and marks its slot free. Returns false when
    /// `ptr` does not point to a used slot of this container.
    pub fn remove(&mut self, ptr: *const T) -> bool {
        match self.slot_of(ptr) {
            Some(i) if self.is_used[i] => {
                unsafe { self.data[i].as_mut_ptr().drop_in_place() };
                self.is_used[i] = false;
                self.len -= 1;
                true
            }
            _ => false,
        }
    }

    /// Removes all elements.
    pub fn clear(&mut self) {
        for i in 0..CAPACITY {
            if self.is_used[i] {
                unsafe { self.data[i].as_mut_ptr().drop_in_place() };
                self.is_used[i] = false;
            }
        }
        self.len = 0;
    }

    /// Iterates over all stored elements.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.is_used
            .iter()
            .enumerate()
            .filter(|(_, is_used)| **is_used)
            .map(|(i, _)| unsafe { self.data[i].assume_init_ref() })
    }

    /// Iterates over all stored elements and hands out pointers with a stable position.
    pub fn iter_ptr(&mut self) -> impl Iterator<Item = NonNull<T>> + '_ {
        let data = self.data.as_mut_ptr();
        self.is_used
            .iter()
            .enumerate()
            .filter(|(_, is_used)| **is_used)
            .map(move |(i, _)| unsafe { NonNull::new_unchecked((*data.add(i)).as_mut_ptr()) })
    }

    fn slot_of(&self, ptr: *const T) -> Option<usize> {
        let start = self.data.as_ptr() as usize;
        let position = ptr as usize;
        let slot_size = core::mem::size_of::<MaybeUninit<T>>();

        if position < start || (position - start) % slot_size != 0 {
            return None;
        }

        let index = (position - start) / slot_size;
        match index < CAPACITY {
            true => Some(index),
            false => None,
        }
    }
}
