// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composition of the shared memory segments. A [`MemoryBlock`] describes one payload of a
//! segment; the [`MemoryProvider`] packs all registered blocks into one layout, creates
//! the segment and announces the assigned memory to every block in registration order so
//! it can placement-construct its payload. Teardown destroys in reverse order.

use core::ptr::NonNull;

use membus_bb_elementary::bump_allocator::BumpAllocator;
use membus_bb_elementary::math::{align, align_to};
use membus_bb_log::{fail, fatal_panic, trace};
use membus_bb_posix::creation_mode::CreationMode;
use membus_bb_posix::permission::Permission;
use membus_bb_posix::shared_memory::{
    SharedMemory, SharedMemoryBuilder, SharedMemoryCreationError,
};

use crate::config::MemPoolEntry;
use crate::daemon::port_pool::PortPoolData;
use crate::memory::memory_manager::MemoryManager;

/// One payload of a shared memory segment.
pub trait MemoryBlock {
    /// Number of bytes the block requires.
    fn size(&self) -> usize;

    /// Required alignment of the block's memory.
    fn alignment(&self) -> usize;

    /// Announces the memory assigned to the block. The block placement-constructs its
    /// payload here.
    fn on_memory_available(&mut self, memory: NonNull<u8>);

    /// Destructs the payload. Called in reverse registration order before the segment is
    /// removed.
    fn destroy(&mut self);
}

/// Creates one shared memory segment out of the provided [`MemoryBlock`]s. The blocks
/// stay owned by the caller so it keeps access to the constructed payloads.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    shared_memory: Option<SharedMemory>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn layout(blocks: &[&mut dyn MemoryBlock]) -> (usize, Vec<usize>) {
        let mut offsets = Vec::with_capacity(blocks.len());
        let mut size = 0;
        for block in blocks {
            size = align(size, block.alignment());
            offsets.push(size);
            size += block.size();
        }
        (size, offsets)
    }

    /// Computes the packed layout of the blocks, creates the segment and announces the
    /// assigned memory to every block in order.
    pub fn create_and_announce(
        &mut self,
        segment_name: &str,
        permission: Permission,
        blocks: &mut [&mut dyn MemoryBlock],
    ) -> Result<(), SharedMemoryCreationError> {
        debug_assert!(
            self.shared_memory.is_none(),
            "The provider has already created its segment."
        );
        let (size, offsets) = Self::layout(blocks);

        let shared_memory = fail!(from self,
            when SharedMemoryBuilder::new(segment_name)
                .size(size)
                .creation_mode(CreationMode::PurgeAndCreate)
                .permission(permission)
                .create(),
            "Unable to create the segment \"{}\" of {} bytes.", segment_name, size);

        let base = shared_memory.base_address().as_ptr();
        for (block, offset) in blocks.iter_mut().zip(offsets) {
            block.on_memory_available(unsafe { NonNull::new_unchecked(base.add(offset)) });
        }

        trace!(from self, "created segment \"{}\" with {} bytes", segment_name, size);
        self.shared_memory = Some(shared_memory);
        Ok(())
    }

    /// Destroys the block payloads in reverse order and removes the segment.
    pub fn destroy_and_remove(&mut self, blocks: &mut [&mut dyn MemoryBlock]) {
        for block in blocks.iter_mut().rev() {
            block.destroy();
        }
        self.shared_memory = None;
    }

    pub fn segment(&self) -> Option<&SharedMemory> {
        self.shared_memory.as_ref()
    }
}

/// Places the [`PortPoolData`] into the management segment.
#[derive(Debug, Default)]
pub struct PortPoolMemoryBlock {
    daemon_id: u64,
    port_pool: Option<NonNull<PortPoolData>>,
}

impl PortPoolMemoryBlock {
    pub fn new(daemon_id: u64) -> Self {
        Self {
            daemon_id,
            port_pool: None,
        }
    }

    pub fn port_pool(&self) -> Option<NonNull<PortPoolData>> {
        self.port_pool
    }
}

impl MemoryBlock for PortPoolMemoryBlock {
    fn size(&self) -> usize {
        core::mem::size_of::<PortPoolData>()
    }

    fn alignment(&self) -> usize {
        core::mem::align_of::<PortPoolData>()
    }

    fn on_memory_available(&mut self, memory: NonNull<u8>) {
        let port_pool = memory.as_ptr() as *mut PortPoolData;
        unsafe { PortPoolData::placement_new(port_pool, self.daemon_id) };
        self.port_pool = Some(unsafe { NonNull::new_unchecked(port_pool) });
    }

    fn destroy(&mut self) {
        if let Some(port_pool) = self.port_pool.take() {
            unsafe { port_pool.as_ptr().drop_in_place() };
        }
    }
}

/// Places the [`MemoryManager`] with all its pools into the data segment.
#[derive(Debug)]
pub struct MemoryManagerMemoryBlock {
    entries: Vec<MemPoolEntry>,
    memory_manager: Option<NonNull<MemoryManager>>,
}

impl MemoryManagerMemoryBlock {
    /// The entries must be in canonical form, see [`crate::config::Memory::optimize()`].
    pub fn new(entries: Vec<MemPoolEntry>) -> Self {
        Self {
            entries,
            memory_manager: None,
        }
    }

    pub fn memory_manager(&self) -> Option<NonNull<MemoryManager>> {
        self.memory_manager
    }
}

impl MemoryBlock for MemoryManagerMemoryBlock {
    fn size(&self) -> usize {
        align_to::<MemoryManager>(core::mem::size_of::<MemoryManager>())
            + MemoryManager::memory_size(&self.entries)
    }

    fn alignment(&self) -> usize {
        core::mem::align_of::<MemoryManager>()
    }

    fn on_memory_available(&mut self, memory: NonNull<u8>) {
        let memory_manager = memory.as_ptr() as *mut MemoryManager;
        unsafe { memory_manager.write(MemoryManager::new_uninit(self.entries.len())) };

        let payload_start = align(
            memory.as_ptr() as usize + core::mem::size_of::<MemoryManager>(),
            core::mem::align_of::<MemoryManager>(),
        );
        let allocator = BumpAllocator::new(payload_start as *mut u8);

        // the block was sized for exactly these entries, the initialization cannot run out
        // of memory
        fatal_panic!(from self,
            when unsafe { (*memory_manager).init(&allocator, &self.entries) },
            "Failed to initialize the memory manager in the announced memory.");

        self.memory_manager = Some(unsafe { NonNull::new_unchecked(memory_manager) });
    }

    fn destroy(&mut self) {
        if let Some(memory_manager) = self.memory_manager.take() {
            unsafe { memory_manager.as_ptr().drop_in_place() };
        }
    }
}
