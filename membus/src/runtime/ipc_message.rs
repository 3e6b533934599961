// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The line-framed text messages exchanged between clients and the daemon. Every frame is
//! a sequence of entries joined by a single delimiter, `TYPE|field1|field2|...`, every
//! entry terminated by the delimiter.
//!
//! The registration frame carries the full
//! [`VersionInfo`](crate::version::VersionInfo) of the client:
//!
//! ```text
//! REG|name|pid|uid|monitored|transmission ts|major|minor|patch|commit tag|
//! ```

use core::fmt::Display;

use membus_bb_log::fail;

/// The delimiter between the entries of a frame.
pub const IPC_MESSAGE_DELIMITER: char = '|';

/// The message types the daemon accepts and emits. Every request is answered with its
/// `..Ack` counterpart or with [`IpcMessageType::Error`].
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum IpcMessageType {
    Reg,
    RegAck,
    CreatePublisher,
    CreatePublisherAck,
    CreateSubscriber,
    CreateSubscriberAck,
    CreateInterface,
    CreateInterfaceAck,
    CreateApplication,
    CreateApplicationAck,
    CreateConditionVariable,
    CreateConditionVariableAck,
    CreateNode,
    CreateNodeAck,
    FindService,
    FindServiceAck,
    Keepalive,
    PrepareAppTermination,
    PrepareAppTerminationAck,
    TerminationAck,
    Error,
}

impl IpcMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpcMessageType::Reg => "REG",
            IpcMessageType::RegAck => "REG_ACK",
            IpcMessageType::CreatePublisher => "CREATE_PUBLISHER",
            IpcMessageType::CreatePublisherAck => "CREATE_PUBLISHER_ACK",
            IpcMessageType::CreateSubscriber => "CREATE_SUBSCRIBER",
            IpcMessageType::CreateSubscriberAck => "CREATE_SUBSCRIBER_ACK",
            IpcMessageType::CreateInterface => "CREATE_INTERFACE",
            IpcMessageType::CreateInterfaceAck => "CREATE_INTERFACE_ACK",
            IpcMessageType::CreateApplication => "CREATE_APPLICATION",
            IpcMessageType::CreateApplicationAck => "CREATE_APPLICATION_ACK",
            IpcMessageType::CreateConditionVariable => "CREATE_CONDITION_VARIABLE",
            IpcMessageType::CreateConditionVariableAck => "CREATE_CONDITION_VARIABLE_ACK",
            IpcMessageType::CreateNode => "CREATE_NODE",
            IpcMessageType::CreateNodeAck => "CREATE_NODE_ACK",
            IpcMessageType::FindService => "FIND_SERVICE",
            IpcMessageType::FindServiceAck => "FIND_SERVICE_ACK",
            IpcMessageType::Keepalive => "KEEPALIVE",
            IpcMessageType::PrepareAppTermination => "PREPARE_APP_TERMINATION",
            IpcMessageType::PrepareAppTerminationAck => "PREPARE_APP_TERMINATION_ACK",
            IpcMessageType::TerminationAck => "TERMINATION_ACK",
            IpcMessageType::Error => "ERROR",
        }
    }

    pub fn from_str(value: &str) -> Option<IpcMessageType> {
        Some(match value {
            "REG" => IpcMessageType::Reg,
            "REG_ACK" => IpcMessageType::RegAck,
            "CREATE_PUBLISHER" => IpcMessageType::CreatePublisher,
            "CREATE_PUBLISHER_ACK" => IpcMessageType::CreatePublisherAck,
            "CREATE_SUBSCRIBER" => IpcMessageType::CreateSubscriber,
            "CREATE_SUBSCRIBER_ACK" => IpcMessageType::CreateSubscriberAck,
            "CREATE_INTERFACE" => IpcMessageType::CreateInterface,
            "CREATE_INTERFACE_ACK" => IpcMessageType::CreateInterfaceAck,
            "CREATE_APPLICATION" => IpcMessageType::CreateApplication,
            "CREATE_APPLICATION_ACK" => IpcMessageType::CreateApplicationAck,
            "CREATE_CONDITION_VARIABLE" => IpcMessageType::CreateConditionVariable,
            "CREATE_CONDITION_VARIABLE_ACK" => IpcMessageType::CreateConditionVariableAck,
            "CREATE_NODE" => IpcMessageType::CreateNode,
            "CREATE_NODE_ACK" => IpcMessageType::CreateNodeAck,
            "FIND_SERVICE" => IpcMessageType::FindService,
            "FIND_SERVICE_ACK" => IpcMessageType::FindServiceAck,
            "KEEPALIVE" => IpcMessageType::Keepalive,
            "PREPARE_APP_TERMINATION" => IpcMessageType::PrepareAppTermination,
            "PREPARE_APP_TERMINATION_ACK" => IpcMessageType::PrepareAppTerminationAck,
            "TERMINATION_ACK" => IpcMessageType::TerminationAck,
            "ERROR" => IpcMessageType::Error,
            _ => return None,
        })
    }
}

/// The error kinds an [`IpcMessageType::Error`] reply carries.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum IpcMessageErrorType {
    NoUniqueCreated,
    PublisherListFull,
    SubscriberListFull,
    InterfaceListFull,
    ApplicationListFull,
    ConditionVariableListFull,
    NodeDataListFull,
    RequestPublisherNoWritableShmSegment,
    RegistrationFailed,
    VersionMismatch,
    MessageNotSupported,
}

impl IpcMessageErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpcMessageErrorType::NoUniqueCreated => "NO_UNIQUE_CREATED",
            IpcMessageErrorType::PublisherListFull => "PUBLISHER_LIST_FULL",
            IpcMessageErrorType::SubscriberListFull => "SUBSCRIBER_LIST_FULL",
            IpcMessageErrorType::InterfaceListFull => "INTERFACE_LIST_FULL",
            IpcMessageErrorType::ApplicationListFull => "APPLICATION_LIST_FULL",
            IpcMessageErrorType::ConditionVariableListFull => "CONDITION_VARIABLE_LIST_FULL",
            IpcMessageErrorType::NodeDataListFull => "NODE_DATA_LIST_FULL",
            IpcMessageErrorType::RequestPublisherNoWritableShmSegment => {
                "REQUEST_PUBLISHER_NO_WRITABLE_SHM_SEGMENT"
            }
            IpcMessageErrorType::RegistrationFailed => "REGISTRATION_FAILED",
            IpcMessageErrorType::VersionMismatch => "VERSION_MISMATCH",
            IpcMessageErrorType::MessageNotSupported => "MESSAGE_NOT_SUPPORTED",
        }
    }

    pub fn from_str(value: &str) -> Option<IpcMessageErrorType> {
        Some(match value {
            "NO_UNIQUE_CREATED" => IpcMessageErrorType::NoUniqueCreated,
            "PUBLISHER_LIST_FULL" => IpcMessageErrorType::PublisherListFull,
            "SUBSCRIBER_LIST_FULL" => IpcMessageErrorType::SubscriberListFull,
            "INTERFACE_LIST_FULL" => IpcMessageErrorType::InterfaceListFull,
            "APPLICATION_LIST_FULL" => IpcMessageErrorType::ApplicationListFull,
            "CONDITION_VARIABLE_LIST_FULL" => IpcMessageErrorType::ConditionVariableListFull,
            "NODE_DATA_LIST_FULL" => IpcMessageErrorType::NodeDataListFull,
            "REQUEST_PUBLISHER_NO_WRITABLE_SHM_SEGMENT" => {
                IpcMessageErrorType::RequestPublisherNoWritableShmSegment
            }
            "REGISTRATION_FAILED" => IpcMessageErrorType::RegistrationFailed,
            "VERSION_MISMATCH" => IpcMessageErrorType::VersionMismatch,
            "MESSAGE_NOT_SUPPORTED" => IpcMessageErrorType::MessageNotSupported,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum IpcMessageParseError {
    MessageIncomplete,
    EntryContainsDelimiter,
}

/// One delimited frame. The first entry is the message type, the remaining entries are
/// the payload fields.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct IpcMessage {
    entries: Vec<String>,
}

impl IpcMessage {
    pub fn new(message_type: IpcMessageType) -> Self {
        Self {
            entries: vec![message_type.as_str().to_string()],
        }
    }

    /// Creates an error reply frame.
    pub fn new_error(error: IpcMessageErrorType) -> Self {
        let mut message = Self::new(IpcMessageType::Error);
        message.add(error.as_str());
        message
    }

    /// Appends one entry. The entry must not contain the delimiter.
    pub fn add<T: Display>(&mut self, entry: T) -> &mut Self {
        let entry = entry.to_string();
        debug_assert!(
            !entry.contains(IPC_MESSAGE_DELIMITER),
            "An ipc message entry must not contain the delimiter."
        );
        self.entries.push(entry);
        self
    }

    /// Returns the message type of the frame, [`None`] when the type is unknown.
    pub fn message_type(&self) -> Option<IpcMessageType> {
        self.entries
            .first()
            .and_then(|entry| IpcMessageType::from_str(entry))
    }

    /// Returns the payload entries, the message type excluded.
    pub fn payload(&self) -> Vec<&str> {
        self.entries
            .iter()
            .skip(1)
            .map(|entry| entry.as_str())
            .collect()
    }

    pub fn number_of_payload_entries(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    /// Encodes the frame, every entry terminated by the delimiter.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for entry in &self.entries {
            bytes.extend_from_slice(entry.as_bytes());
            bytes.push(IPC_MESSAGE_DELIMITER as u8);
        }
        bytes
    }

    /// Decodes a frame, the inverse of [`IpcMessage::to_bytes()`].
    pub fn from_bytes(bytes: &[u8]) -> Result<IpcMessage, IpcMessageParseError> {
        let msg = "Unable to parse ipc message";
        let origin = "IpcMessage::from_bytes()";
        let contents = String::from_utf8_lossy(bytes);

        if !contents.ends_with(IPC_MESSAGE_DELIMITER) {
            fail!(from origin, with IpcMessageParseError::MessageIncomplete,
                "{} since the frame is not terminated with the delimiter.", msg);
        }

        let entries: Vec<String> = contents
            .trim_end_matches(IPC_MESSAGE_DELIMITER)
            .split(IPC_MESSAGE_DELIMITER)
            .map(|entry| entry.to_string())
            .collect();

        if entries.is_empty() || entries[0].is_empty() {
            fail!(from origin, with IpcMessageParseError::MessageIncomplete,
                "{} since the frame carries no message type.", msg);
        }

        Ok(IpcMessage { entries })
    }
}
