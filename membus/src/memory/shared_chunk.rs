// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The process-local, reference counted handle to a chunk.

use core::fmt::Debug;
use core::ptr::NonNull;
use core::sync::atomic::{fence, Ordering};

use membus_bb_elementary::relative_ptr::RelativePointer;

use crate::memory::chunk_header::ChunkHeader;

/// Smart handle to a chunk. Creating a handle increments the reference counter inside the
/// [`ChunkHeader`], dropping it decrements the counter and returns the chunk to its owning
/// [`MemPool`](crate::memory::mem_pool::MemPool) when it was the last one - in whichever
/// process that happens.
///
/// While any [`SharedChunk`] to a chunk exists in any process the chunk is not reused.
pub struct SharedChunk {
    header: RelativePointer<ChunkHeader>,
}

impl Debug for SharedChunk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SharedChunk {{ header: {:?} }}", self.header)
    }
}

impl SharedChunk {
    /// Takes over the initial reference of a freshly allocated chunk.
    ///
    /// # Safety
    ///
    ///  * `header` must point to an initialized [`ChunkHeader`] whose reference counter
    ///    accounts for this handle
    ///
    pub(crate) unsafe fn from_allocation(header: NonNull<ChunkHeader>) -> Self {
        Self {
            header: RelativePointer::from_ptr(header.as_ptr()),
        }
    }

    /// Decodes a chunk reference which was encoded with [`SharedChunk::into_value()`] and
    /// takes over its reference.
    ///
    /// # Safety
    ///
    ///  * `value` must have been created with [`SharedChunk::into_value()`] and must not be
    ///    decoded twice
    ///
    pub(crate) unsafe fn from_value(value: u64) -> Self {
        Self {
            header: RelativePointer::from_value(value),
        }
    }

    /// Encodes the handle into a `u64` so it can travel through the lock-free index
    /// queues. The reference the handle owned travels with the value.
    pub(crate) fn into_value(self) -> u64 {
        let value = self.header.as_value();
        core::mem::forget(self);
        value
    }

    /// Creates an additional reference to an encoded chunk without consuming the encoded
    /// value.
    ///
    /// # Safety
    ///
    ///  * `value` must refer to a chunk which holds at least one reference
    ///
    pub(crate) unsafe fn clone_value(value: u64) -> u64 {
        let ptr = RelativePointer::<ChunkHeader>::from_value(value);
        let header = unsafe { &*ptr.as_ptr() };
        header.reference_counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Returns the relative pointer to the chunk header.
    pub fn relative_header(&self) -> RelativePointer<ChunkHeader> {
        self.header
    }

    pub fn header(&self) -> &ChunkHeader {
        unsafe { &*self.header.as_ptr() }
    }

    pub(crate) fn header_mut(&mut self) -> &mut ChunkHeader {
        unsafe { &mut *self.header.as_mut_ptr() }
    }

    pub fn payload_ptr(&self) -> *const u8 {
        self.header().payload_ptr()
    }
}

impl Clone for SharedChunk {
    fn clone(&self) -> Self {
        self.header()
            .reference_counter
            .fetch_add(1, Ordering::Relaxed);

        Self {
            header: self.header,
        }
    }
}

impl Drop for SharedChunk {
    fn drop(&mut self) {
        let header = self.header();
        if header.reference_counter.fetch_sub(1, Ordering::Release) == 1 {
            fence(Ordering::Acquire);

            let mem_pool = unsafe { &*header.mem_pool.as_ptr() };
            unsafe {
                mem_pool.free(NonNull::new_unchecked(
                    self.header.as_mut_ptr() as *mut u8
                ))
            };
        }
    }
}
