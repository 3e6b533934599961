// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drives a complete publisher/subscriber round through the discovery pass, the way the
//! daemon does it, with the port pool and the mempools placed in process-local memory.

use core::alloc::Layout;
use core::ptr::NonNull;

use membus::config::MemPoolEntry;
use membus::daemon::port_manager::{PortCreationError, PortManager};
use membus::daemon::port_pool::{PortPool, PortPoolData};
use membus::discovery::service_descriptor::ServiceDescriptor;
use membus::memory::memory_manager::MemoryManager;
use membus::port::base_port::RuntimeName;
use membus::port::options::*;
use membus::port::publisher::PublisherPortUser;
use membus::port::subscriber::{SubscriberPortUser, SubscriptionState};
use membus_bb_elementary::bump_allocator::BumpAllocator;
use membus_bb_elementary::math::align_to;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_testing::assert_that;

struct TestDaemon {
    port_manager: PortManager,
    port_pool_data: NonNull<PortPoolData>,
}

impl TestDaemon {
    fn new() -> Self {
        // the port pool is far too large for the stack, place it like the daemon does
        let port_pool_memory =
            unsafe { std::alloc::alloc(Layout::new::<PortPoolData>()) } as *mut PortPoolData;
        unsafe { PortPoolData::placement_new(port_pool_memory, 0) };
        let port_pool = unsafe { PortPool::new(NonNull::new_unchecked(port_pool_memory)) };

        let entries = [MemPoolEntry {
            chunk_size: 128,
            chunk_count: 32,
        }];
        let size = align_to::<MemoryManager>(core::mem::size_of::<MemoryManager>())
            + MemoryManager::memory_size(&entries);
        let memory: &'static mut [u64] = Box::leak(vec![0u64; size / 8 + 1].into_boxed_slice());
        let base = memory.as_mut_ptr() as *mut u8;
        let memory_manager = base as *mut MemoryManager;
        unsafe { memory_manager.write(MemoryManager::new_uninit(entries.len())) };
        let allocator = BumpAllocator::new(unsafe {
            base.add(align_to::<MemoryManager>(core::mem::size_of::<MemoryManager>()))
        });
        unsafe {
            (*memory_manager)
                .init(&allocator, &entries)
                .expect("the backing memory is sized for the entries")
        };

        Self {
            port_manager: PortManager::new(
                port_pool,
                RelativePointer::from_ptr(memory_manager as *const MemoryManager),
            ),
            port_pool_data: unsafe { NonNull::new_unchecked(port_pool_memory) },
        }
    }

    fn service_registry_epoch(&self) -> u64 {
        unsafe { self.port_pool_data.as_ref() }.service_registry_epoch()
    }

    fn create_publisher(
        &mut self,
        runtime_name: &str,
        options: &PublisherOptions,
    ) -> Result<PublisherPortUser, PortCreationError> {
        let port = self.port_manager.acquire_publisher_port_data(
            &service(),
            options,
            &RuntimeName::from_bytes_truncated(runtime_name.as_bytes()),
        )?;
        Ok(PublisherPortUser::new(RelativePointer::from_ptr(
            port.as_ptr() as *const _,
        )))
    }

    fn create_subscriber(
        &mut self,
        runtime_name: &str,
        options: &SubscriberOptions,
    ) -> Result<SubscriberPortUser, PortCreationError> {
        let port = self.port_manager.acquire_subscriber_port_data(
            &service(),
            options,
            &RuntimeName::from_bytes_truncated(runtime_name.as_bytes()),
        )?;
        Ok(SubscriberPortUser::new(RelativePointer::from_ptr(
            port.as_ptr() as *const _,
        )))
    }
}

fn service() -> ServiceDescriptor {
    ServiceDescriptor::new(b"Radar", b"FrontRight", b"Objects").unwrap()
}

fn publish(publisher: &PublisherPortUser, sequence_number: u64) {
    let mut chunk = publisher.try_allocate_chunk(8).unwrap();
    chunk.write_payload(&sequence_number.to_le_bytes());
    publisher.send_chunk(chunk, Some(sequence_number)).unwrap();
}

fn received_sequence(subscriber: &SubscriberPortUser) -> Option<u64> {
    subscriber.try_get_chunk().unwrap().map(|chunk| {
        let sequence_number = chunk.sequence_number();
        subscriber.release_chunk(chunk).unwrap();
        sequence_number
    })
}

#[test]
fn discovery_connects_a_publisher_and_a_subscriber_and_data_flows_in_order() {
    let mut daemon = TestDaemon::new();

    let publisher = daemon
        .create_publisher(
            "A",
            &PublisherOptions {
                history_capacity: 2,
                ..PublisherOptions::default()
            },
        )
        .unwrap();
    let subscriber = daemon
        .create_subscriber(
            "B",
            &SubscriberOptions {
                history_request: 2,
                ..SubscriberOptions::default()
            },
        )
        .unwrap();

    daemon.port_manager.do_discovery();

    assert_that!(publisher.is_offered(), eq true);
    assert_that!(publisher.has_subscribers(), eq true);
    assert_that!(subscriber.subscription_state(), eq SubscriptionState::Subscribed);

    publish(&publisher, 1);
    publish(&publisher, 2);
    publish(&publisher, 3);

    assert_that!(received_sequence(&subscriber), eq Some(1));
    assert_that!(received_sequence(&subscriber), eq Some(2));
    assert_that!(received_sequence(&subscriber), eq Some(3));
    assert_that!(received_sequence(&subscriber), is_none);
    assert_that!(subscriber.has_lost_chunks(), eq false);
}

#[test]
fn late_subscriber_receives_the_history_before_new_chunks() {
    let mut daemon = TestDaemon::new();

    let publisher = daemon
        .create_publisher(
            "A",
            &PublisherOptions {
                history_capacity: 2,
                ..PublisherOptions::default()
            },
        )
        .unwrap();
    daemon.port_manager.do_discovery();

    publish(&publisher, 1);
    publish(&publisher, 2);
    publish(&publisher, 3);

    let subscriber = daemon
        .create_subscriber(
            "B",
            &SubscriberOptions {
                history_request: 2,
                ..SubscriberOptions::default()
            },
        )
        .unwrap();
    daemon.port_manager.do_discovery();

    // the last min(n, history capacity, request) chunks arrive in publication order
    assert_that!(received_sequence(&subscriber), eq Some(2));
    assert_that!(received_sequence(&subscriber), eq Some(3));
    assert_that!(received_sequence(&subscriber), is_none);

    publish(&publisher, 4);
    assert_that!(received_sequence(&subscriber), eq Some(4));
}

#[test]
fn unconsumed_subscriber_keeps_the_most_recent_chunks_and_flags_the_loss() {
    let mut daemon = TestDaemon::new();

    let publisher = daemon
        .create_publisher("A", &PublisherOptions::default())
        .unwrap();
    let subscriber = daemon
        .create_subscriber(
            "B",
            &SubscriberOptions {
                queue_capacity: 4,
                ..SubscriberOptions::default()
            },
        )
        .unwrap();
    daemon.port_manager.do_discovery();

    for sequence_number in 1..=10 {
        publish(&publisher, sequence_number);
    }

    assert_that!(subscriber.has_lost_chunks(), eq true);
    for sequence_number in 7..=10 {
        assert_that!(received_sequence(&subscriber), eq Some(sequence_number));
    }
    assert_that!(received_sequence(&subscriber), is_none);
}

#[test]
fn a_second_publisher_on_the_same_service_is_rejected() {
    let mut daemon = TestDaemon::new();

    let _publisher = daemon
        .create_publisher("A", &PublisherOptions::default())
        .unwrap();

    let result = daemon.create_publisher("C", &PublisherOptions::default());
    assert_that!(result.err(), eq Some(PortCreationError::NoUniqueCreated));
}

#[test]
fn death_of_the_publishing_process_parks_the_subscriber() {
    let mut daemon = TestDaemon::new();

    let publisher = daemon
        .create_publisher("A", &PublisherOptions::default())
        .unwrap();
    let subscriber = daemon
        .create_subscriber("B", &SubscriberOptions::default())
        .unwrap();
    daemon.port_manager.do_discovery();
    assert_that!(subscriber.subscription_state(), eq SubscriptionState::Subscribed);

    publish(&publisher, 1);

    // the monitoring detected the death of "A", the next discovery pass tears its
    // ports down and the subscriber starts waiting for a new offer
    daemon.port_manager.mark_ports_of_process("A");
    daemon.port_manager.do_discovery();

    assert_that!(subscriber.subscription_state(), eq SubscriptionState::WaitForOffer);
    assert_that!(daemon.port_manager.service_registry(), is_empty);

    // the chunk which was already delivered is still readable
    assert_that!(received_sequence(&subscriber), eq Some(1));

    // a new publisher on the same service reconnects the subscriber
    let publisher = daemon
        .create_publisher("D", &PublisherOptions::default())
        .unwrap();
    daemon.port_manager.do_discovery();
    assert_that!(subscriber.subscription_state(), eq SubscriptionState::Subscribed);

    publish(&publisher, 2);
    assert_that!(received_sequence(&subscriber), eq Some(2));
}

#[test]
fn discovery_converges_after_a_finite_number_of_passes() {
    let mut daemon = TestDaemon::new();

    let publisher = daemon
        .create_publisher("A", &PublisherOptions::default())
        .unwrap();
    let subscriber = daemon
        .create_subscriber("B", &SubscriberOptions::default())
        .unwrap();

    daemon.port_manager.do_discovery();
    let registry_size = daemon.port_manager.service_registry().len();

    // without new user actions further passes change nothing
    for _ in 0..5 {
        daemon.port_manager.do_discovery();
        assert_that!(publisher.is_offered(), eq true);
        assert_that!(subscriber.subscription_state(), eq SubscriptionState::Subscribed);
        assert_that!(daemon.port_manager.service_registry().len(), eq registry_size);
    }
}

#[test]
fn service_registry_epoch_advances_with_every_offer_and_withdrawal() {
    let mut daemon = TestDaemon::new();
    assert_that!(daemon.service_registry_epoch(), eq 0);

    let publisher = daemon
        .create_publisher("A", &PublisherOptions::default())
        .unwrap();
    daemon.port_manager.do_discovery();
    let epoch_after_offer = daemon.service_registry_epoch();
    assert_that!(epoch_after_offer, ge 1);

    publisher.stop_offer();
    daemon.port_manager.do_discovery();
    assert_that!(daemon.service_registry_epoch(), gt epoch_after_offer);

    // without state transitions the epoch stays put
    let epoch = daemon.service_registry_epoch();
    daemon.port_manager.do_discovery();
    assert_that!(daemon.service_registry_epoch(), eq epoch);
}

#[test]
fn publisher_port_capacity_is_bounded() {
    let mut daemon = TestDaemon::new();
    let runtime_name = RuntimeName::from_bytes(b"A").unwrap();

    for i in 0..membus::constants::MAX_PUBLISHERS {
        let service = ServiceDescriptor::new(
            format!("service_{}", i).as_bytes(),
            b"instance",
            b"event",
        )
        .unwrap();
        let result = daemon.port_manager.acquire_publisher_port_data(
            &service,
            &PublisherOptions::default(),
            &runtime_name,
        );
        assert_that!(result, is_ok);
    }

    let service = ServiceDescriptor::new(b"one_too_many", b"instance", b"event").unwrap();
    let result = daemon.port_manager.acquire_publisher_port_data(
        &service,
        &PublisherOptions::default(),
        &runtime_name,
    );
    assert_that!(result, is_err);
}

#[test]
fn find_service_answers_exact_and_wildcard_searches() {
    let mut daemon = TestDaemon::new();

    let _publisher = daemon
        .create_publisher("A", &PublisherOptions::default())
        .unwrap();
    daemon.port_manager.do_discovery();

    let exact = daemon
        .port_manager
        .find_service(Some(b"Radar"), Some(b"FrontRight"));
    assert_that!(exact, len 1);
    assert_that!(exact[0], eq service());

    assert_that!(daemon.port_manager.find_service(None, None), len 1);
    assert_that!(daemon.port_manager.find_service(Some(b"Lidar"), None), len 0);
}
