// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membus::runtime::ipc_message::*;
use membus_bb_testing::assert_that;

#[test]
fn ipc_message_encoding_round_trip_works() {
    let mut sut = IpcMessage::new(IpcMessageType::CreatePublisher);
    sut.add("my_app").add("Radar").add(42);

    let decoded = IpcMessage::from_bytes(&sut.to_bytes()).unwrap();

    assert_that!(decoded, eq sut);
    assert_that!(decoded.message_type(), eq Some(IpcMessageType::CreatePublisher));
    assert_that!(decoded.payload(), eq vec!["my_app", "Radar", "42"]);
}

#[test]
fn ipc_message_frame_layout_is_delimited_text() {
    let mut sut = IpcMessage::new(IpcMessageType::Keepalive);
    sut.add("my_app");

    assert_that!(sut.to_bytes(), eq b"KEEPALIVE|my_app|".to_vec());
}

#[test]
fn ipc_message_unterminated_frame_is_rejected() {
    let result = IpcMessage::from_bytes(b"KEEPALIVE|my_app");
    assert_that!(result.err(), eq Some(IpcMessageParseError::MessageIncomplete));
}

#[test]
fn ipc_message_empty_frame_is_rejected() {
    let result = IpcMessage::from_bytes(b"");
    assert_that!(result.err(), eq Some(IpcMessageParseError::MessageIncomplete));
}

#[test]
fn ipc_message_unknown_type_is_reported_as_none() {
    let decoded = IpcMessage::from_bytes(b"SOMETHING_ELSE|my_app|").unwrap();
    assert_that!(decoded.message_type(), is_none);
}

#[test]
fn ipc_message_error_frame_carries_the_error_kind() {
    let sut = IpcMessage::new_error(IpcMessageErrorType::NoUniqueCreated);

    let decoded = IpcMessage::from_bytes(&sut.to_bytes()).unwrap();
    assert_that!(decoded.message_type(), eq Some(IpcMessageType::Error));
    assert_that!(
        IpcMessageErrorType::from_str(decoded.payload()[0]),
        eq Some(IpcMessageErrorType::NoUniqueCreated)
    );
}

#[test]
fn ipc_message_type_string_mapping_is_bijective() {
    let types = [
        IpcMessageType::Reg,
        IpcMessageType::RegAck,
        IpcMessageType::CreatePublisher,
        IpcMessageType::CreatePublisherAck,
        IpcMessageType::CreateSubscriber,
        IpcMessageType::CreateSubscriberAck,
        IpcMessageType::CreateInterface,
        IpcMessageType::CreateInterfaceAck,
        IpcMessageType::CreateApplication,
        IpcMessageType::CreateApplicationAck,
        IpcMessageType::CreateConditionVariable,
        IpcMessageType::CreateConditionVariableAck,
        IpcMessageType::CreateNode,
        IpcMessageType::CreateNodeAck,
        IpcMessageType::FindService,
        IpcMessageType::FindServiceAck,
        IpcMessageType::Keepalive,
        IpcMessageType::PrepareAppTermination,
        IpcMessageType::PrepareAppTerminationAck,
        IpcMessageType::TerminationAck,
        IpcMessageType::Error,
    ];

    for message_type in types {
        assert_that!(IpcMessageType::from_str(message_type.as_str()), eq Some(message_type));
    }
}
