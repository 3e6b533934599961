// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A pointer which can be stored in shared memory and dereferenced in every process which has
//! mapped the target segment. In contrast to
//! [`RelocatablePointer`](crate::relocatable_ptr::RelocatablePointer) it can point across
//! segment boundaries since it stores the [`SegmentId`] of its pointee together with the
//! offset from the segment base.

use core::fmt::Debug;
use core::marker::PhantomData;

use crate::segment_registry::{SegmentId, SegmentRegistry, ABSOLUTE_SEGMENT_ID};

/// Sentinel id of the null [`RelativePointer`].
pub const NULL_SEGMENT_ID: u64 = u64::MAX;
/// Sentinel offset of the null [`RelativePointer`].
pub const NULL_OFFSET: u64 = u64::MAX;

const RAW_OFFSET_BITS: u32 = 48;
const RAW_OFFSET_MASK: u64 = (1 << RAW_OFFSET_BITS) - 1;

/// A `(segment-id, offset)` pair which resolves to `base(segment-id) + offset` through the
/// process-local [`SegmentRegistry`]. With the reserved id 0 it behaves like an ordinary
/// absolute pointer.
///
/// Dereferencing a non-null [`RelativePointer`] whose segment is not registered in the
/// calling process is a programming error.
#[repr(C)]
pub struct RelativePointer<T> {
    segment_id: u64,
    offset: u64,
    _phantom: PhantomData<T>,
}

impl<T> Debug for RelativePointer<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "RelativePointer<{}> {{ segment_id: {}, offset: {} }}",
            core::any::type_name::<T>(),
            self.segment_id,
            self.offset
        )
    }
}

impl<T> Clone for RelativePointer<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RelativePointer<T> {}

impl<T> PartialEq for RelativePointer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.segment_id == other.segment_id && self.offset == other.offset
    }
}

impl<T> Eq for RelativePointer<T> {}

impl<T> Default for RelativePointer<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> RelativePointer<T> {
    /// Creates a new [`RelativePointer`] from an id and the offset from the segment base.
    pub fn new(segment_id: SegmentId, offset: u64) -> Self {
        Self {
            segment_id: segment_id.value(),
            offset,
            _phantom: PhantomData,
        }
    }

    /// Creates the null [`RelativePointer`].
    pub const fn null() -> Self {
        Self {
            segment_id: NULL_SEGMENT_ID,
            offset: NULL_OFFSET,
            _phantom: PhantomData,
        }
    }

    /// Creates a new [`RelativePointer`] from an absolute pointer. When the pointer is inside
    /// a registered segment the pointer is bound to that segment, otherwise it falls back to
    /// the reserved absolute id 0.
    pub fn from_ptr(ptr: *const T) -> Self {
        if ptr.is_null() {
            return Self::null();
        }

        let address = ptr as usize;
        let registry = SegmentRegistry::instance();
        match registry.search(address) {
            Some(id) => Self::new(
                id,
                // the segment is registered, offset_of cannot fail
                registry.offset_of(id, address).unwrap(),
            ),
            None => Self::new(ABSOLUTE_SEGMENT_ID, address as u64),
        }
    }

    pub fn is_null(&self) -> bool {
        self.segment_id == NULL_SEGMENT_ID && self.offset == NULL_OFFSET
    }

    pub fn segment_id(&self) -> SegmentId {
        SegmentId::new(self.segment_id)
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Resolves the [`RelativePointer`] in the address space of the calling process. Returns
    /// a null pointer when it is null or the segment is not registered.
    pub fn as_ptr(&self) -> *const T {
        if self.is_null() {
            return core::ptr::null();
        }

        match SegmentRegistry::instance().ptr_of(SegmentId::new(self.segment_id), self.offset) {
            Some(address) => address as *const T,
            None => {
                debug_assert!(
                    false,
                    "Dereferencing a relative pointer into the unregistered segment {}.",
                    self.segment_id
                );
                core::ptr::null()
            }
        }
    }

    /// See [`RelativePointer::as_ptr()`].
    pub fn as_mut_ptr(&self) -> *mut T {
        self.as_ptr() as *mut T
    }

    /// Encodes the [`RelativePointer`] into a single `u64` so it can travel through the
    /// index queues: the upper 16 bit carry the segment id, the lower 48 bit the offset.
    pub fn as_value(&self) -> u64 {
        if self.is_null() {
            return u64::MAX;
        }

        debug_assert!(
            self.segment_id < (1 << (u64::BITS - RAW_OFFSET_BITS)) && self.offset <= RAW_OFFSET_MASK,
            "The relative pointer (segment id {}, offset {}) cannot be encoded into a u64.",
            self.segment_id,
            self.offset
        );

        (self.segment_id << RAW_OFFSET_BITS) | self.offset
    }

    /// Inverse of [`RelativePointer::as_value()`].
    pub fn from_value(value: u64) -> Self {
        if value == u64::MAX {
            return Self::null();
        }

        Self {
            segment_id: value >> RAW_OFFSET_BITS,
            offset: value & RAW_OFFSET_MASK,
            _phantom: PhantomData,
        }
    }
}
