// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::ptr::NonNull;

use membus::config::MemPoolEntry;
use membus::discovery::message::{DiscoveryMessage, DiscoveryMessageType};
use membus::discovery::service_descriptor::ServiceDescriptor;
use membus::memory::memory_manager::MemoryManager;
use membus::port::base_port::{RuntimeName, UniquePortId};
use membus::port::chunk_sender::ChunkLoanError;
use membus::port::options::*;
use membus::port::publisher::{PublisherPortDaemon, PublisherPortData, PublisherPortUser};
use membus::port::subscriber::{
    SubscriberPortDaemon, SubscriberPortData, SubscriberPortUser, SubscriptionState,
};
use membus_bb_elementary::bump_allocator::BumpAllocator;
use membus_bb_elementary::math::align_to;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_testing::assert_that;

fn create_memory_manager() -> &'static MemoryManager {
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

    unsafe { &*memory_manager }
}

fn service() -> ServiceDescriptor {
    ServiceDescriptor::new(b"Radar", b"FrontRight", b"Objects").unwrap()
}

fn create_publisher(options: &PublisherOptions) -> Box<PublisherPortData> {
    let memory_manager = create_memory_manager();
    Box::new(PublisherPortData::new(
        service(),
        RuntimeName::from_bytes(b"publisher_app").unwrap(),
        options,
        RelativePointer::from_ptr(memory_manager as *const MemoryManager),
        UniquePortId(1),
    ))
}

fn create_subscriber(options: &SubscriberOptions) -> Box<SubscriberPortData> {
    Box::new(SubscriberPortData::new(
        service(),
        RuntimeName::from_bytes(b"subscriber_app").unwrap(),
        options,
        UniquePortId(2),
    ))
}

fn publisher_views(
    data: &PublisherPortData,
) -> (PublisherPortUser, PublisherPortDaemon) {
    let user = PublisherPortUser::new(RelativePointer::from_ptr(data as *const _));
    let daemon = unsafe {
        PublisherPortDaemon::new(NonNull::new_unchecked(
            data as *const PublisherPortData as *mut PublisherPortData,
        ))
    };
    (user, daemon)
}

fn subscriber_views(
    data: &SubscriberPortData,
) -> (SubscriberPortUser, SubscriberPortDaemon) {
    let user = SubscriberPortUser::new(RelativePointer::from_ptr(data as *const _));
    let daemon = unsafe {
        SubscriberPortDaemon::new(NonNull::new_unchecked(
            data as *const SubscriberPortData as *mut SubscriberPortData,
        ))
    };
    (user, daemon)
}

fn subscription_of(subscriber: &SubscriberPortDaemon) -> DiscoveryMessage {
    let mut message = DiscoveryMessage::new(DiscoveryMessageType::Sub, service());
    message.queue = subscriber.queue_ptr();
    message
}

#[test]
fn publisher_offer_emits_one_offer_message() {
    let data = create_publisher(&PublisherOptions {
        offer_on_create: false,
        ..PublisherOptions::default()
    });
    let (user, mut daemon) = publisher_views(&data);

    assert_that!(daemon.try_get_discovery_message(), is_none);
    assert_that!(user.is_offered(), eq false);

    user.offer();
    let message = daemon.try_get_discovery_message();
    assert_that!(message, is_some);
    assert_that!(message.unwrap().message_type, eq DiscoveryMessageType::Offer);
    assert_that!(user.is_offered(), eq true);

    // offering twice is equivalent to offering once
    user.offer();
    assert_that!(daemon.try_get_discovery_message(), is_none);
}

#[test]
fn publisher_stop_offer_from_not_offered_is_a_no_op() {
    let data = create_publisher(&PublisherOptions {
        offer_on_create: false,
        ..PublisherOptions::default()
    });
    let (user, mut daemon) = publisher_views(&data);

    user.stop_offer();
    assert_that!(daemon.try_get_discovery_message(), is_none);
}

#[test]
fn publisher_stop_offer_emits_stop_offer_message() {
    let data = create_publisher(&PublisherOptions::default());
    let (user, mut daemon) = publisher_views(&data);

    let message = daemon.try_get_discovery_message();
    assert_that!(message.unwrap().message_type, eq DiscoveryMessageType::Offer);

    user.stop_offer();
    let message = daemon.try_get_discovery_message();
    assert_that!(message.unwrap().message_type, eq DiscoveryMessageType::StopOffer);
    assert_that!(user.is_offered(), eq false);
}

#[test]
fn publisher_acks_a_compatible_subscription() {
    let publisher_data = create_publisher(&PublisherOptions::default());
    let subscriber_data = create_subscriber(&SubscriberOptions::default());
    let (user, mut daemon) = publisher_views(&publisher_data);
    let (_, subscriber_daemon) = subscriber_views(&subscriber_data);

    daemon.try_get_discovery_message();

    let response = daemon.dispatch_discovery_message(&subscription_of(&subscriber_daemon));
    assert_that!(response.unwrap().message_type, eq DiscoveryMessageType::Ack);
    assert_that!(user.has_subscribers(), eq true);
}

#[test]
fn publisher_nacks_a_subscription_while_not_offered() {
    let publisher_data = create_publisher(&PublisherOptions {
        offer_on_create: false,
        ..PublisherOptions::default()
    });
    let subscriber_data = create_subscriber(&SubscriberOptions::default());
    let (_, mut daemon) = publisher_views(&publisher_data);
    let (_, subscriber_daemon) = subscriber_views(&subscriber_data);

    let response = daemon.dispatch_discovery_message(&subscription_of(&subscriber_daemon));
    assert_that!(response.unwrap().message_type, eq DiscoveryMessageType::Nack);
}

#[test]
fn publisher_nacks_an_incompatible_queue_full_policy() {
    // a backpressure subscriber is incompatible with a discarding publisher
    let publisher_data = create_publisher(&PublisherOptions {
        subscriber_too_slow_policy: ConsumerTooSlowPolicy::DiscardOldestData,
        ..PublisherOptions::default()
    });
    let subscriber_data = create_subscriber(&SubscriberOptions {
        queue_full_policy: QueueFullPolicy::BlockProducer,
        ..SubscriberOptions::default()
    });
    let (user, mut daemon) = publisher_views(&publisher_data);
    let (_, subscriber_daemon) = subscriber_views(&subscriber_data);

    daemon.try_get_discovery_message();

    let response = daemon.dispatch_discovery_message(&subscription_of(&subscriber_daemon));
    assert_that!(response.unwrap().message_type, eq DiscoveryMessageType::Nack);
    assert_that!(user.has_subscribers(), eq false);
}

#[test]
fn publisher_nacks_a_history_requiring_subscriber_without_history_support() {
    let publisher_data = create_publisher(&PublisherOptions {
        history_capacity: 0,
        ..PublisherOptions::default()
    });
    let subscriber_data = create_subscriber(&SubscriberOptions {
        requires_publisher_history_support: true,
        ..SubscriberOptions::default()
    });
    let (_, mut daemon) = publisher_views(&publisher_data);
    let (_, subscriber_daemon) = subscriber_views(&subscriber_data);

    daemon.try_get_discovery_message();

    let mut subscription = subscription_of(&subscriber_daemon);
    subscription.requires_publisher_history_support = true;
    let response = daemon.dispatch_discovery_message(&subscription);
    assert_that!(response.unwrap().message_type, eq DiscoveryMessageType::Nack);
}

#[test]
fn publisher_unsubscription_detaches_the_queue() {
    let publisher_data = create_publisher(&PublisherOptions::default());
    let subscriber_data = create_subscriber(&SubscriberOptions::default());
    let (user, mut daemon) = publisher_views(&publisher_data);
    let (_, subscriber_daemon) = subscriber_views(&subscriber_data);

    daemon.try_get_discovery_message();
    daemon.dispatch_discovery_message(&subscription_of(&subscriber_daemon));
    assert_that!(user.has_subscribers(), eq true);

    let mut unsubscription = DiscoveryMessage::new(DiscoveryMessageType::Unsub, service());
    unsubscription.queue = subscriber_daemon.queue_ptr();
    let response = daemon.dispatch_discovery_message(&unsubscription);
    assert_that!(response.unwrap().message_type, eq DiscoveryMessageType::Ack);
    assert_that!(user.has_subscribers(), eq false);
}

#[test]
fn publisher_loan_limit_is_enforced() {
    let data = create_publisher(&PublisherOptions::default());
    let (user, _) = publisher_views(&data);

    let mut chunks = vec![];
    for _ in 0..membus::constants::MAX_CHUNKS_ALLOCATED_PER_PUBLISHER {
        chunks.push(user.try_allocate_chunk(16).unwrap());
    }

    let result = user.try_allocate_chunk(16);
    assert_that!(
        result.err(),
        eq Some(ChunkLoanError::TooManyChunksAllocatedInParallel)
    );

    // a released loan makes room for a new one
    user.release_chunk(chunks.pop().unwrap());
    assert_that!(user.try_allocate_chunk(16), is_ok);
}

#[test]
fn subscriber_subscribe_walks_through_the_state_machine() {
    let data = create_subscriber(&SubscriberOptions {
        subscribe_on_create: false,
        ..SubscriberOptions::default()
    });
    let (user, mut daemon) = subscriber_views(&data);

    assert_that!(user.subscription_state(), eq SubscriptionState::NotSubscribed);
    assert_that!(daemon.try_get_discovery_message(), is_none);

    user.subscribe();
    let message = daemon.try_get_discovery_message();
    assert_that!(message, is_some);
    assert_that!(message.unwrap().message_type, eq DiscoveryMessageType::Sub);
    assert_that!(user.subscription_state(), eq SubscriptionState::SubscribeRequested);

    let ack = DiscoveryMessage::new(DiscoveryMessageType::Ack, service());
    assert_that!(daemon.dispatch_discovery_message(&ack), is_none);
    assert_that!(user.subscription_state(), eq SubscriptionState::Subscribed);

    user.unsubscribe();
    let message = daemon.try_get_discovery_message();
    assert_that!(message.unwrap().message_type, eq DiscoveryMessageType::Unsub);
    assert_that!(user.subscription_state(), eq SubscriptionState::UnsubscribeRequested);

    assert_that!(daemon.dispatch_discovery_message(&ack), is_none);
    assert_that!(user.subscription_state(), eq SubscriptionState::NotSubscribed);
}

#[test]
fn subscriber_nack_parks_the_port_until_the_next_offer() {
    let data = create_subscriber(&SubscriberOptions::default());
    let (user, mut daemon) = subscriber_views(&data);

    let message = daemon.try_get_discovery_message();
    assert_that!(message.unwrap().message_type, eq DiscoveryMessageType::Sub);

    let nack = DiscoveryMessage::new(DiscoveryMessageType::Nack, service());
    assert_that!(daemon.dispatch_discovery_message(&nack), is_none);
    assert_that!(user.subscription_state(), eq SubscriptionState::WaitForOffer);

    // a fresh offer triggers the re-subscription
    let offer = DiscoveryMessage::new(DiscoveryMessageType::Offer, service());
    let response = daemon.dispatch_discovery_message(&offer);
    assert_that!(response.unwrap().message_type, eq DiscoveryMessageType::Sub);
    assert_that!(user.subscription_state(), eq SubscriptionState::SubscribeRequested);
}

#[test]
fn subscriber_stop_offer_parks_a_subscribed_port() {
    let data = create_subscriber(&SubscriberOptions::default());
    let (user, mut daemon) = subscriber_views(&data);

    daemon.try_get_discovery_message();
    let ack = DiscoveryMessage::new(DiscoveryMessageType::Ack, service());
    daemon.dispatch_discovery_message(&ack);
    assert_that!(user.subscription_state(), eq SubscriptionState::Subscribed);

    let stop_offer = DiscoveryMessage::new(DiscoveryMessageType::StopOffer, service());
    assert_that!(daemon.dispatch_discovery_message(&stop_offer), is_none);
    assert_that!(user.subscription_state(), eq SubscriptionState::WaitForOffer);
}

#[test]
fn condition_variable_wakes_the_waiter() {
    use membus::port::condition_variable::ConditionVariableData;

    let sut = ConditionVariableData::new(RuntimeName::from_bytes(b"waiter_app").unwrap());

    assert_that!(sut.try_take(), eq 0);
    assert_that!(sut.timed_wait(core::time::Duration::from_millis(10)), eq 0);

    sut.notify();
    sut.notify();
    assert_that!(sut.timed_wait(core::time::Duration::from_millis(10)), eq 2);
    assert_that!(sut.try_take(), eq 0);
}

#[test]
fn subscriber_trigger_notifies_the_condition_variable_on_delivery() {
    use membus::port::condition_variable::ConditionVariableData;

    let publisher_data = create_publisher(&PublisherOptions::default());
    let subscriber_data = create_subscriber(&SubscriberOptions::default());
    let (publisher, mut publisher_daemon) = publisher_views(&publisher_data);
    let (subscriber, subscriber_daemon) = subscriber_views(&subscriber_data);

    publisher_daemon.try_get_discovery_message();
    publisher_daemon.dispatch_discovery_message(&subscription_of(&subscriber_daemon));

    let condition_variable =
        ConditionVariableData::new(RuntimeName::from_bytes(b"subscriber_app").unwrap());
    subscriber.set_condition_variable(RelativePointer::from_ptr(
        &condition_variable as *const ConditionVariableData,
    ));

    let chunk = publisher.try_allocate_chunk(8).unwrap();
    publisher.send_chunk(chunk, None).unwrap();
    assert_that!(condition_variable.try_take(), eq 1);

    subscriber.unset_condition_variable();
    let chunk = publisher.try_allocate_chunk(8).unwrap();
    publisher.send_chunk(chunk, None).unwrap();
    assert_that!(condition_variable.try_take(), eq 0);
}

#[test]
fn subscriber_receive_and_release_works() {
    let publisher_data = create_publisher(&PublisherOptions::default());
    let subscriber_data = create_subscriber(&SubscriberOptions::default());
    let (publisher, mut publisher_daemon) = publisher_views(&publisher_data);
    let (subscriber, subscriber_daemon) = subscriber_views(&subscriber_data);

    publisher_daemon.try_get_discovery_message();
    publisher_daemon.dispatch_discovery_message(&subscription_of(&subscriber_daemon));

    assert_that!(subscriber.has_chunks(), eq false);
    assert_that!(subscriber.try_get_chunk().unwrap().is_none(), eq true);

    let mut chunk = publisher.try_allocate_chunk(16).unwrap();
    chunk.write_payload(b"hello");
    assert_that!(publisher.send_chunk(chunk, Some(5)), eq Ok(1));

    assert_that!(subscriber.has_chunks(), eq true);
    let received = subscriber.try_get_chunk().unwrap().unwrap();
    assert_that!(received.sequence_number(), eq 5);
    assert_that!(received.payload(), eq b"hello");

    assert_that!(subscriber.release_chunk(received), is_ok);
    assert_that!(subscriber.has_lost_chunks(), eq false);
}
