// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-local registry of mapped shared-memory segments. Every process maps the same
//! segment at a different virtual address; the registry binds a stable [`SegmentId`] to the
//! local `(base, size)` mapping so that
//! [`RelativePointer`](crate::relative_ptr::RelativePointer)s can be resolved in the address
//! space of the current process.
//!
//! The registry is one of the two process-wide singletons of the system, accessible via
//! [`SegmentRegistry::instance()`].
//!
//! # Example
//!
//! ```
//! use membus_bb_elementary::segment_registry::*;
//!
//! let mut memory = [0u8; 1024];
//! let id = SegmentId::new(5);
//!
//! let registry = SegmentRegistry::instance();
//! registry.register(id, memory.as_ptr() as usize, memory.len()).unwrap();
//!
//! let inside = memory.as_ptr() as usize + 100;
//! assert_eq!(registry.search(inside), Some(id));
//! assert_eq!(registry.offset_of(id, inside), Some(100));
//!
//! registry.unregister(id);
//! ```

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use membus_bb_log::fail;

/// Maximum number of segments a process can have registered at the same time.
pub const SEGMENT_REGISTRY_CAPACITY: usize = 64;

/// The reserved id under which a [`RelativePointer`](crate::relative_ptr::RelativePointer)
/// behaves like an ordinary absolute pointer, the offset is measured relative to address 0.
pub const ABSOLUTE_SEGMENT_ID: SegmentId = SegmentId(0);

/// Identifies one mapped shared-memory segment. Assigned by the creator of the segment and
/// stable across all processes which map it.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct SegmentId(u64);

impl SegmentId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum SegmentRegistrationError {
    /// The id is outside of the supported range of the registry.
    CapacityExceeded,
    /// The id is already bound to a different mapping.
    AlreadyRegistered,
    /// Id 0 is reserved for absolute pointer behavior and cannot be bound.
    ReservedId,
}

#[derive(Debug)]
struct Slot {
    base: AtomicUsize,
    size: AtomicUsize,
    is_used: AtomicBool,
}

impl Slot {
    fn new() -> Self {
        Self {
            base: AtomicUsize::new(0),
            size: AtomicUsize::new(0),
            is_used: AtomicBool::new(false),
        }
    }
}

/// Fixed-capacity table of segment mappings. Readers are lock-free, writers serialize with a
/// lock which is held during registration only.
#[derive(Debug)]
pub struct SegmentRegistry {
    slots: [Slot; SEGMENT_REGISTRY_CAPACITY],
    registration_lock: Mutex<()>,
}

impl Default for SegmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentRegistry {
    /// Creates an independent registry. Relative pointers always resolve through
    /// [`SegmentRegistry::instance()`], an independent registry is useful for bookkeeping
    /// of additional mappings and for tests.
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::new()),
            registration_lock: Mutex::new(()),
        }
    }

    /// Returns the process-wide registry instance.
    pub fn instance() -> &'static SegmentRegistry {
        static INSTANCE: OnceLock<SegmentRegistry> = OnceLock::new();
        INSTANCE.get_or_init(SegmentRegistry::new)
    }

    /// Binds `id` to the mapping `[base, base + size)`. Registration is one-shot per id;
    /// registering the identical mapping again is a no-op, a different mapping fails.
    pub fn register(
        &self,
        id: SegmentId,
        base: usize,
        size: usize,
    ) -> Result<(), SegmentRegistrationError> {
        let msg = "Unable to register segment";
        if id == ABSOLUTE_SEGMENT_ID {
            fail!(from self, with SegmentRegistrationError::ReservedId,
                "{} {:?} since the id is reserved for absolute pointer behavior.", msg, id);
        }

        if id.value() >= SEGMENT_REGISTRY_CAPACITY as u64 {
            fail!(from self, with SegmentRegistrationError::CapacityExceeded,
                "{} {:?} since the id exceeds the maximum supported id of {}.",
                msg, id, SEGMENT_REGISTRY_CAPACITY - 1);
        }

        let _guard = self.registration_lock.lock().unwrap();
        let slot = &self.slots[id.value() as usize];

        if slot.is_used.load(Ordering::Relaxed) {
            if slot.base.load(Ordering::Relaxed) == base
                && slot.size.load(Ordering::Relaxed) == size
            {
                return Ok(());
            }

            fail!(from self, with SegmentRegistrationError::AlreadyRegistered,
                "{} {:?} since the id is already bound to a different mapping.", msg, id);
        }

        slot.base.store(base, Ordering::Relaxed);
        slot.size.store(size, Ordering::Relaxed);
        slot.is_used.store(true, Ordering::Release);
        Ok(())
    }

    /// Removes the binding of `id`. Returns true when a binding was removed.
    pub fn unregister(&self, id: SegmentId) -> bool {
        if id == ABSOLUTE_SEGMENT_ID || id.value() >= SEGMENT_REGISTRY_CAPACITY as u64 {
            return false;
        }

        let _guard = self.registration_lock.lock().unwrap();
        self.slots[id.value() as usize]
            .is_used
            .swap(false, Ordering::Release)
    }

    /// Returns the local base address of the segment or [`None`] when the id is not
    /// registered in this process.
    pub fn base(&self, id: SegmentId) -> Option<usize> {
        if id == ABSOLUTE_SEGMENT_ID {
            return Some(0);
        }

        if id.value() >= SEGMENT_REGISTRY_CAPACITY as u64 {
            return None;
        }

        let slot = &self.slots[id.value() as usize];
        match slot.is_used.load(Ordering::Acquire) {
            true => Some(slot.base.load(Ordering::Relaxed)),
            false => None,
        }
    }

    /// Returns the id of the registered segment whose mapping contains `address`.
    pub fn search(&self, address: usize) -> Option<SegmentId> {
        for (id, slot) in self.slots.iter().enumerate().skip(1) {
            if slot.is_used.load(Ordering::Acquire) {
                let base = slot.base.load(Ordering::Relaxed);
                let size = slot.size.load(Ordering::Relaxed);
                if base <= address && address < base + size {
                    return Some(SegmentId::new(id as u64));
                }
            }
        }

        None
    }

    /// Returns the distance of `address` from the base of the segment or [`None`] when the
    /// id is not registered in this process.
    pub fn offset_of(&self, id: SegmentId, address: usize) -> Option<u64> {
        self.base(id).map(|base| (address - base) as u64)
    }

    /// Inverse of [`SegmentRegistry::offset_of()`].
    pub fn ptr_of(&self, id: SegmentId, offset: u64) -> Option<usize> {
        self.base(id).map(|base| base + offset as usize)
    }
}
