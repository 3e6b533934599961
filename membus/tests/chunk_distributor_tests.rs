// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::sync::atomic::{AtomicBool, Ordering};

use membus::config::MemPoolEntry;
use membus::memory::memory_manager::MemoryManager;
use membus::memory::shared_chunk::SharedChunk;
use membus::port::chunk_distributor::{
    ChunkDeliveryError, ChunkDistributor, ChunkDistributorData,
};
use membus::port::chunk_queue::{ChunkQueueData, ChunkQueuePopper};
use membus::port::options::{ConsumerTooSlowPolicy, QueueFullPolicy};
use membus_bb_elementary::bump_allocator::BumpAllocator;
use membus_bb_elementary::math::align_to;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_testing::assert_that;

fn create_memory_manager(chunk_size: usize, chunk_count: usize) -> &'static MemoryManager {
    let entries = [MemPoolEntry {
        chunk_size,
        chunk_count,
    }];
    let size = align_to::<MemoryManager>(core::mem::size_of::<MemoryManager>())
        + MemoryManager::memory_size(&entries);
    let memory: &'static mut [u64] = Box::leak(vec![0u64; size / 8 + 1].into_boxed_slice());
    let base = memory.as_mut_ptr() as *mut u8;

    let memory_manager = base as *mut MemoryManager;
    unsafe { memory_manager.write(MemoryManager::new_uninit(entries.len())) };
    let payload_start = unsafe {
        base.add(align_to::<MemoryManager>(core::mem::size_of::<MemoryManager>()))
    };
    let allocator = BumpAllocator::new(payload_start);
    unsafe {
        (*memory_manager)
            .init(&allocator, &entries)
            .expect("the backing memory is sized for the entries")
    };

    unsafe { &*memory_manager }
}

fn allocate_chunk(memory_manager: &MemoryManager, sequence_number: u64) -> SharedChunk {
    memory_manager.allocate_chunk(16, sequence_number).unwrap()
}

fn pop_sequence(queue: &ChunkQueueData) -> Option<u64> {
    ChunkQueuePopper::new(queue)
        .pop()
        .map(|chunk| chunk.header().sequence_number())
}

#[test]
fn chunk_distributor_delivers_in_publication_order() {
    let memory_manager = create_memory_manager(64, 8);
    let data = ChunkDistributorData::new(0);
    let queue = ChunkQueueData::new(8, QueueFullPolicy::DiscardOldestData, 1);
    let not_destroyed = AtomicBool::new(false);

    let mut sut = ChunkDistributor::new(&data);
    sut.try_add_queue(RelativePointer::from_ptr(&queue), 0)
        .unwrap();

    for sequence_number in 0..3 {
        let delivered = sut
            .deliver(
                allocate_chunk(memory_manager, sequence_number),
                ConsumerTooSlowPolicy::DiscardOldestData,
                &not_destroyed,
            )
            .unwrap();
        assert_that!(delivered, eq 1);
    }

    for sequence_number in 0..3 {
        assert_that!(pop_sequence(&queue), eq Some(sequence_number));
    }
    assert_that!(pop_sequence(&queue), is_none);
}

#[test]
fn chunk_distributor_overflow_keeps_the_most_recent_chunks() {
    const QUEUE_CAPACITY: usize = 4;
    const PUBLICATIONS: u64 = 10;
    let memory_manager = create_memory_manager(64, 16);
    let data = ChunkDistributorData::new(0);
    let queue = ChunkQueueData::new(QUEUE_CAPACITY, QueueFullPolicy::DiscardOldestData, 1);
    let not_destroyed = AtomicBool::new(false);

    let mut sut = ChunkDistributor::new(&data);
    sut.try_add_queue(RelativePointer::from_ptr(&queue), 0)
        .unwrap();

    for sequence_number in 0..PUBLICATIONS {
        sut.deliver(
            allocate_chunk(memory_manager, sequence_number),
            ConsumerTooSlowPolicy::DiscardOldestData,
            &not_destroyed,
        )
        .unwrap();
    }

    let mut popper = ChunkQueuePopper::new(&queue);
    assert_that!(popper.take_lost_chunks_flag(), eq true);
    assert_that!(popper.take_lost_chunks_flag(), eq false);

    // the queue holds exactly the most recent chunks in publication order
    for sequence_number in PUBLICATIONS - QUEUE_CAPACITY as u64..PUBLICATIONS {
        assert_that!(pop_sequence(&queue), eq Some(sequence_number));
    }
    assert_that!(pop_sequence(&queue), is_none);

    // every displaced chunk was returned to the pool
    assert_that!(memory_manager.pools()[0].used_chunks(), eq 0);
}

#[test]
fn chunk_distributor_replays_history_oldest_first() {
    let memory_manager = create_memory_manager(64, 8);
    let data = ChunkDistributorData::new(2);
    let queue = ChunkQueueData::new(8, QueueFullPolicy::DiscardOldestData, 1);
    let not_destroyed = AtomicBool::new(false);

    let mut sut = ChunkDistributor::new(&data);
    for sequence_number in 1..4 {
        sut.deliver(
            allocate_chunk(memory_manager, sequence_number),
            ConsumerTooSlowPolicy::DiscardOldestData,
            &not_destroyed,
        )
        .unwrap();
    }
    assert_that!(sut.history_len(), eq 2);

    // a late subscriber receives the last min(n, history capacity, request) chunks
    sut.try_add_queue(RelativePointer::from_ptr(&queue), 2)
        .unwrap();
    assert_that!(pop_sequence(&queue), eq Some(2));
    assert_that!(pop_sequence(&queue), eq Some(3));
    assert_that!(pop_sequence(&queue), is_none);

    // replayed chunks precede any subsequently delivered chunk
    sut.deliver(
        allocate_chunk(memory_manager, 4),
        ConsumerTooSlowPolicy::DiscardOldestData,
        &not_destroyed,
    )
    .unwrap();
    assert_that!(pop_sequence(&queue), eq Some(4));
}

#[test]
fn chunk_distributor_replay_is_bounded_by_the_queue_capacity() {
    let memory_manager = create_memory_manager(64, 16);
    let data = ChunkDistributorData::new(8);
    let queue = ChunkQueueData::new(2, QueueFullPolicy::DiscardOldestData, 1);
    let not_destroyed = AtomicBool::new(false);

    let mut sut = ChunkDistributor::new(&data);
    for sequence_number in 0..6 {
        sut.deliver(
            allocate_chunk(memory_manager, sequence_number),
            ConsumerTooSlowPolicy::DiscardOldestData,
            &not_destroyed,
        )
        .unwrap();
    }

    sut.try_add_queue(RelativePointer::from_ptr(&queue), 100)
        .unwrap();

    assert_that!(pop_sequence(&queue), eq Some(4));
    assert_that!(pop_sequence(&queue), eq Some(5));
    assert_that!(pop_sequence(&queue), is_none);
}

#[test]
fn chunk_distributor_removed_queue_is_not_delivered_to() {
    let memory_manager = create_memory_manager(64, 8);
    let data = ChunkDistributorData::new(0);
    let queue = ChunkQueueData::new(8, QueueFullPolicy::DiscardOldestData, 1);
    let not_destroyed = AtomicBool::new(false);

    let mut sut = ChunkDistributor::new(&data);
    sut.try_add_queue(RelativePointer::from_ptr(&queue), 0)
        .unwrap();
    assert_that!(sut.number_of_queues(), eq 1);

    assert_that!(sut.try_remove_queue(RelativePointer::from_ptr(&queue)), eq true);
    assert_that!(sut.number_of_queues(), eq 0);

    let delivered = sut
        .deliver(
            allocate_chunk(memory_manager, 1),
            ConsumerTooSlowPolicy::DiscardOldestData,
            &not_destroyed,
        )
        .unwrap();
    assert_that!(delivered, eq 0);
    assert_that!(queue.is_empty(), eq true);
}

#[test]
fn chunk_distributor_blocks_the_producer_until_the_consumer_makes_space() {
    let memory_manager = create_memory_manager(64, 8);
    let data = ChunkDistributorData::new(0);
    let queue = ChunkQueueData::new(1, QueueFullPolicy::BlockProducer, 1);
    let not_destroyed = AtomicBool::new(false);
    let second_delivery_finished = AtomicBool::new(false);

    let mut sut = ChunkDistributor::new(&data);
    sut.try_add_queue(RelativePointer::from_ptr(&queue), 0)
        .unwrap();

    sut.deliver(
        allocate_chunk(memory_manager, 1),
        ConsumerTooSlowPolicy::WaitForConsumer,
        &not_destroyed,
    )
    .unwrap();

    std::thread::scope(|s| {
        s.spawn(|| {
            let mut sut = ChunkDistributor::new(&data);
            sut.deliver(
                allocate_chunk(memory_manager, 2),
                ConsumerTooSlowPolicy::WaitForConsumer,
                &not_destroyed,
            )
            .unwrap();
            second_delivery_finished.store(true, Ordering::Relaxed);
        });

        std::thread::sleep(core::time::Duration::from_millis(100));
        // the queue is full and was not consumed, the delivery must still be pending
        assert_that!(second_delivery_finished.load(Ordering::Relaxed), eq false);

        assert_that!(pop_sequence(&queue), eq Some(1));
    });

    assert_that!(second_delivery_finished.load(Ordering::Relaxed), eq true);
    assert_that!(pop_sequence(&queue), eq Some(2));
}

#[test]
fn chunk_distributor_blocked_delivery_aborts_on_port_destruction() {
    let memory_manager = create_memory_manager(64, 8);
    let data = ChunkDistributorData::new(0);
    let queue = ChunkQueueData::new(1, QueueFullPolicy::BlockProducer, 1);
    let to_be_destroyed = AtomicBool::new(false);

    let mut sut = ChunkDistributor::new(&data);
    sut.try_add_queue(RelativePointer::from_ptr(&queue), 0)
        .unwrap();

    sut.deliver(
        allocate_chunk(memory_manager, 1),
        ConsumerTooSlowPolicy::WaitForConsumer,
        &to_be_destroyed,
    )
    .unwrap();

    std::thread::scope(|s| {
        let handle = s.spawn(|| {
            let mut sut = ChunkDistributor::new(&data);
            sut.deliver(
                allocate_chunk(memory_manager, 2),
                ConsumerTooSlowPolicy::WaitForConsumer,
                &to_be_destroyed,
            )
        });

        std::thread::sleep(core::time::Duration::from_millis(50));
        to_be_destroyed.store(true, Ordering::Relaxed);

        let result = handle.join().unwrap();
        assert_that!(
            result.err(),
            eq Some(ChunkDeliveryError::InterruptedByPortDestruction)
        );
    });
}
