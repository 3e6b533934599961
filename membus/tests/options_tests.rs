// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus::port::options::*;
use membus_bb_testing::assert_that;

#[test]
fn publisher_options_serialization_round_trip_works() {
    let sut = PublisherOptions {
        history_capacity: 7,
        node_name: NodeName::from_bytes(b"radar_node").unwrap(),
        offer_on_create: false,
        subscriber_too_slow_policy: ConsumerTooSlowPolicy::WaitForConsumer,
    };

    let serialized = sut.serialize();
    let entries: Vec<&str> = serialized.iter().map(|entry| entry.as_str()).collect();
    let deserialized = PublisherOptions::deserialize(&entries).unwrap();

    assert_that!(deserialized, eq sut);
}

#[test]
fn publisher_options_default_round_trip_works() {
    let sut = PublisherOptions::default();

    let serialized = sut.serialize();
    let entries: Vec<&str> = serialized.iter().map(|entry| entry.as_str()).collect();
    let deserialized = PublisherOptions::deserialize(&entries).unwrap();

    assert_that!(deserialized, eq sut);
}

#[test]
fn publisher_options_deserialize_rejects_out_of_range_policy() {
    let result = PublisherOptions::deserialize(&["0", "node", "1", "2"]);
    assert_that!(result.err(), eq Some(OptionsDeserializationError::EnumValueOutOfRange));
}

#[test]
fn publisher_options_deserialize_rejects_wrong_field_count() {
    let result = PublisherOptions::deserialize(&["0", "node", "1"]);
    assert_that!(result.err(), eq Some(OptionsDeserializationError::WrongNumberOfFields));
}

#[test]
fn publisher_options_deserialize_rejects_non_numeric_fields() {
    let result = PublisherOptions::deserialize(&["abc", "node", "1", "0"]);
    assert_that!(result.err(), eq Some(OptionsDeserializationError::InvalidNumericField));
}

#[test]
fn subscriber_options_serialization_round_trip_works() {
    let sut = SubscriberOptions {
        queue_capacity: 16,
        history_request: 4,
        node_name: NodeName::from_bytes(b"fusion_node").unwrap(),
        subscribe_on_create: false,
        queue_full_policy: QueueFullPolicy::BlockProducer,
        requires_publisher_history_support: true,
    };

    let serialized = sut.serialize();
    let entries: Vec<&str> = serialized.iter().map(|entry| entry.as_str()).collect();
    let deserialized = SubscriberOptions::deserialize(&entries).unwrap();

    assert_that!(deserialized, eq sut);
}

#[test]
fn subscriber_options_deserialize_rejects_out_of_range_policy() {
    let result = SubscriberOptions::deserialize(&["4", "0", "node", "1", "7", "0"]);
    assert_that!(result.err(), eq Some(OptionsDeserializationError::EnumValueOutOfRange));
}

#[test]
fn subscriber_options_deserialize_rejects_invalid_boolean() {
    let result = SubscriberOptions::deserialize(&["4", "0", "node", "2", "0", "0"]);
    assert_that!(result.err(), eq Some(OptionsDeserializationError::EnumValueOutOfRange));
}

#[test]
fn subscriber_options_queue_capacity_is_clamped() {
    let mut sut = SubscriberOptions {
        queue_capacity: 0,
        ..SubscriberOptions::default()
    };
    assert_that!(sut.clamped_queue_capacity(), eq 1);

    sut.queue_capacity = u64::MAX;
    assert_that!(
        sut.clamped_queue_capacity(),
        eq membus::constants::MAX_SUBSCRIBER_QUEUE_CAPACITY as u64
    );
}
