// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The configuration of publisher and subscriber ports together with their wire encoding.
//! The options travel as decimal text fields inside the ipc frames; enum fields are
//! validated against their allowed range on decode.

use membus_bb_container::byte_string::FixedSizeByteString;
use membus_bb_log::fail;

use crate::constants::{MAX_HISTORY_CAPACITY, MAX_SUBSCRIBER_QUEUE_CAPACITY, NODE_NAME_LENGTH};

/// Bounded string type for node names.
pub type NodeName = FixedSizeByteString<NODE_NAME_LENGTH>;

/// Tells a publisher how to treat a subscriber whose queue is full.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Default)]
pub enum ConsumerTooSlowPolicy {
    /// Wait until the subscriber consumed a chunk and its queue has space again.
    WaitForConsumer = 0,
    /// Discard the oldest chunk in the subscriber queue and push the newest one.
    #[default]
    DiscardOldestData = 1,
}

impl ConsumerTooSlowPolicy {
    pub fn from_u8(value: u8) -> Option<ConsumerTooSlowPolicy> {
        match value {
            0 => Some(ConsumerTooSlowPolicy::WaitForConsumer),
            1 => Some(ConsumerTooSlowPolicy::DiscardOldestData),
            _ => None,
        }
    }
}

/// Requested by a subscriber to define the behavior when its queue is full.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Default)]
pub enum QueueFullPolicy {
    /// Request the publisher to block until the queue has space.
    BlockProducer = 0,
    /// Discard the oldest chunk to admit the newest one.
    #[default]
    DiscardOldestData = 1,
}

impl QueueFullPolicy {
    pub fn from_u8(value: u8) -> Option<QueueFullPolicy> {
        match value {
            0 => Some(QueueFullPolicy::BlockProducer),
            1 => Some(QueueFullPolicy::DiscardOldestData),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum OptionsDeserializationError {
    WrongNumberOfFields,
    InvalidNumericField,
    EnumValueOutOfRange,
    NodeNameTooLong,
}

/// Configuration of a publisher port.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PublisherOptions {
    /// Number of recent chunks the publisher keeps for replay to late subscribers,
    /// clamped to [`MAX_HISTORY_CAPACITY`].
    pub history_capacity: u64,
    /// The node the publisher belongs to.
    pub node_name: NodeName,
    /// Offer the service immediately when the port is created.
    pub offer_on_create: bool,
    /// How to treat a subscriber whose queue is full.
    pub subscriber_too_slow_policy: ConsumerTooSlowPolicy,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            history_capacity: 0,
            node_name: NodeName::new(),
            offer_on_create: true,
            subscriber_too_slow_policy: ConsumerTooSlowPolicy::default(),
        }
    }
}

impl PublisherOptions {
    /// Encodes the options into ipc frame entries.
    pub fn serialize(&self) -> [String; 4] {
        [
            self.history_capacity.to_string(),
            String::from_utf8_lossy(self.node_name.as_bytes()).into_owned(),
            (self.offer_on_create as u8).to_string(),
            (self.subscriber_too_slow_policy as u8).to_string(),
        ]
    }

    /// Decodes options from ipc frame entries, the inverse of
    /// [`PublisherOptions::serialize()`].
    pub fn deserialize(entries: &[&str]) -> Result<Self, OptionsDeserializationError> {
        let msg = "Unable to deserialize publisher options";
        let origin = "PublisherOptions::deserialize()";
        if entries.len() != 4 {
            fail!(from origin, with OptionsDeserializationError::WrongNumberOfFields,
                "{} since {} fields were provided instead of 4.", msg, entries.len());
        }

        let history_capacity = parse_u64(origin, msg, entries[0])?;
        let node_name = match NodeName::from_bytes(entries[1].as_bytes()) {
            Ok(v) => v,
            Err(_) => {
                fail!(from origin, with OptionsDeserializationError::NodeNameTooLong,
                    "{} since the node name exceeds the maximum supported length.", msg);
            }
        };
        let offer_on_create = parse_bool(origin, msg, entries[2])?;
        let subscriber_too_slow_policy =
            match ConsumerTooSlowPolicy::from_u8(parse_u64(origin, msg, entries[3])? as u8) {
                Some(v) => v,
                None => {
                    fail!(from origin, with OptionsDeserializationError::EnumValueOutOfRange,
                        "{} since the consumer too slow policy is out of range.", msg);
                }
            };

        Ok(Self {
            history_capacity,
            node_name,
            offer_on_create,
            subscriber_too_slow_policy,
        })
    }

    /// Returns the history capacity clamped to the supported maximum.
    pub fn clamped_history_capacity(&self) -> u64 {
        core::cmp::min(self.history_capacity, MAX_HISTORY_CAPACITY as u64)
    }
}

/// Configuration of a subscriber port.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SubscriberOptions {
    /// Capacity of the chunk queue, clamped to [`MAX_SUBSCRIBER_QUEUE_CAPACITY`].
    pub queue_capacity: u64,
    /// Number of recent chunks the subscriber requests to receive on connect.
    pub history_request: u64,
    /// The node the subscriber belongs to.
    pub node_name: NodeName,
    /// Subscribe immediately when the port is created.
    pub subscribe_on_create: bool,
    /// Behavior when the queue is full.
    pub queue_full_policy: QueueFullPolicy,
    /// Only connect to history capable publishers.
    pub requires_publisher_history_support: bool,
}

impl Default for SubscriberOptions {
    fn default() -> Self {
        Self {
            queue_capacity: MAX_SUBSCRIBER_QUEUE_CAPACITY as u64,
            history_request: 0,
            node_name: NodeName::new(),
            subscribe_on_create: true,
            queue_full_policy: QueueFullPolicy::default(),
            requires_publisher_history_support: false,
        }
    }
}

impl SubscriberOptions {
    /// Encodes the options into ipc frame entries.
    pub fn serialize(&self) -> [String; 6] {
        [
            self.queue_capacity.to_string(),
            self.history_request.to_string(),
            String::from_utf8_lossy(self.node_name.as_bytes()).into_owned(),
            (self.subscribe_on_create as u8).to_string(),
            (self.queue_full_policy as u8).to_string(),
            (self.requires_publisher_history_support as u8).to_string(),
        ]
    }

    /// Decodes options from ipc frame entries, the inverse of
    /// [`SubscriberOptions::serialize()`].
    pub fn deserialize(entries: &[&str]) -> Result<Self, OptionsDeserializationError> {
        let msg = "Unable to deserialize subscriber options";
        let origin = "SubscriberOptions::deserialize()";
        if entries.len() != 6 {
            fail!(from origin, with OptionsDeserializationError::WrongNumberOfFields,
                "{} since {} fields were provided instead of 6.", msg, entries.len());
        }

        let queue_capacity = parse_u64(origin, msg, entries[0])?;
        let history_request = parse_u64(origin, msg, entries[1])?;
        let node_name = match NodeName::from_bytes(entries[2].as_bytes()) {
            Ok(v) => v,
            Err(_) => {
                fail!(from origin, with OptionsDeserializationError::NodeNameTooLong,
                    "{} since the node name exceeds the maximum supported length.", msg);
            }
        };
        let subscribe_on_create = parse_bool(origin, msg, entries[3])?;
        let queue_full_policy =
            match QueueFullPolicy::from_u8(parse_u64(origin, msg, entries[4])? as u8) {
                Some(v) => v,
                None => {
                    fail!(from origin, with OptionsDeserializationError::EnumValueOutOfRange,
                        "{} since the queue full policy is out of range.", msg);
                }
            };
        let requires_publisher_history_support = parse_bool(origin, msg, entries[5])?;

        Ok(Self {
            queue_capacity,
            history_request,
            node_name,
            subscribe_on_create,
            queue_full_policy,
            requires_publisher_history_support,
        })
    }

    /// Returns the queue capacity clamped to the supported range.
    pub fn clamped_queue_capacity(&self) -> u64 {
        (self.queue_capacity).clamp(1, MAX_SUBSCRIBER_QUEUE_CAPACITY as u64)
    }
}

fn parse_u64(
    origin: &str,
    msg: &str,
    field: &str,
) -> Result<u64, OptionsDeserializationError> {
    match field.parse::<u64>() {
        Ok(v) => Ok(v),
        Err(_) => {
            fail!(from origin, with OptionsDeserializationError::InvalidNumericField,
                "{} since \"{}\" is no valid decimal number.", msg, field);
        }
    }
}

fn parse_bool(
    origin: &str,
    msg: &str,
    field: &str,
) -> Result<bool, OptionsDeserializationError> {
    match parse_u64(origin, msg, field)? {
        0 => Ok(false),
        1 => Ok(true),
        v => {
            fail!(from origin, with OptionsDeserializationError::EnumValueOutOfRange,
                "{} since \"{}\" is no valid boolean encoding.", msg, v);
        }
    }
}
