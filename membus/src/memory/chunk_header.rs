// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The fixed-size prefix inside every chunk of a data segment.

use core::sync::atomic::AtomicU64;

use membus_bb_elementary::math::align;
use membus_bb_elementary::relative_ptr::RelativePointer;

use crate::constants::CHUNK_ALIGNMENT;
use crate::memory::mem_pool::MemPool;

/// Returns the current wall-clock time in milliseconds since the unix epoch, the timestamp
/// format of [`ChunkHeader::timestamp`].
pub fn current_time_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Prefix of every chunk. The payload starts at the header address plus the aligned header
/// size, see [`ChunkHeader::payload_ptr()`].
#[repr(C)]
#[derive(Debug)]
pub struct ChunkHeader {
    /// The pool the chunk was allocated from and has to be returned to.
    pub(crate) mem_pool: RelativePointer<MemPool>,
    /// Size of the whole chunk, header included.
    pub(crate) chunk_size: u64,
    /// Payload size the user requested at allocation time.
    pub(crate) payload_size: u64,
    /// Payload bytes which are actually used, defaults to the payload size.
    pub(crate) used_size: u64,
    /// Set by the sender right before delivery, either automatically from the port's
    /// counter or by the user.
    pub(crate) sequence_number: u64,
    /// Delivery timestamp in milliseconds since the unix epoch.
    pub(crate) timestamp: u64,
    /// Number of [`SharedChunk`](crate::memory::shared_chunk::SharedChunk) handles to the
    /// chunk over all processes.
    pub(crate) reference_counter: AtomicU64,
}

impl ChunkHeader {
    /// Returns the size of the header including the padding up to the payload.
    pub const fn aligned_size() -> usize {
        align(core::mem::size_of::<ChunkHeader>(), CHUNK_ALIGNMENT)
    }

    /// Returns the chunk size required to carry the provided payload.
    pub const fn required_chunk_size(payload_size: usize) -> usize {
        Self::aligned_size() + align(payload_size, CHUNK_ALIGNMENT)
    }

    pub fn payload_size(&self) -> u64 {
        self.payload_size
    }

    pub fn used_size(&self) -> u64 {
        self.used_size
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Returns the payload address of the chunk.
    pub fn payload_ptr(&self) -> *const u8 {
        unsafe { (self as *const Self as *const u8).add(Self::aligned_size()) }
    }

    /// See [`ChunkHeader::payload_ptr()`].
    pub fn payload_mut_ptr(&mut self) -> *mut u8 {
        unsafe { (self as *mut Self as *mut u8).add(Self::aligned_size()) }
    }
}
