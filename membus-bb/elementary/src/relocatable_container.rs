// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Describes a container which can be shared between processes.

use crate::allocator::{AllocationError, BaseAllocator};

/// Describes a container which can be shared between processes. Since shared memory is
/// usually mapped at a different virtual memory position in every process the underlying
/// constructs must not rely on absolute memory positions.
pub trait RelocatableContainer {
    /// Creates a new uninitialized container.
    ///
    /// # Safety
    ///
    ///  * Before the container can be used [`RelocatableContainer::init()`] must be called
    ///    exactly once.
    ///
    unsafe fn new_uninit(capacity: usize) -> Self;

    /// Initializes an uninitialized container by allocating its payload memory from the
    /// provided allocator. The allocator must have at least
    /// [`RelocatableContainer::memory_size()`] bytes available.
    ///
    /// # Safety
    ///
    ///  * Must be called exactly once before any other method is called.
    ///  * Shall only be used when the container was created with
    ///    [`RelocatableContainer::new_uninit()`]
    ///
    unsafe fn init<T: BaseAllocator>(&mut self, allocator: &T) -> Result<(), AllocationError>;

    /// Returns the amount of additional memory the object requires from the allocator in the
    /// [`RelocatableContainer::init()`] call, including alignment overhead.
    fn memory_size(capacity: usize) -> usize;
}
