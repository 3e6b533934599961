// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::time::Duration;

use membus_bb_posix::creation_mode::CreationMode;
use membus_bb_posix::unix_datagram_socket::*;
use membus_bb_testing::assert_that;

fn unique_name(tag: &str) -> String {
    format!("membus_socket_test_{}_{}", std::process::id(), tag)
}

#[test]
fn unix_datagram_socket_send_receive_works() {
    let name = unique_name("send_receive");
    let receiver = UnixDatagramReceiverBuilder::new(&name)
        .creation_mode(CreationMode::PurgeAndCreate)
        .create()
        .unwrap();
    let sender = UnixDatagramSenderBuilder::new(&name).create().unwrap();

    assert_that!(sender.try_send(b"hello world"), eq Ok(true));

    let mut buffer = [0u8; 32];
    let len = receiver
        .timed_receive(&mut buffer, Duration::from_millis(500))
        .unwrap();
    assert_that!(len, eq 11);
    assert_that!(&buffer[..len], eq b"hello world");
}

#[test]
fn unix_datagram_socket_try_receive_without_data_returns_zero() {
    let name = unique_name("empty");
    let receiver = UnixDatagramReceiverBuilder::new(&name)
        .creation_mode(CreationMode::PurgeAndCreate)
        .create()
        .unwrap();

    let mut buffer = [0u8; 32];
    assert_that!(receiver.try_receive(&mut buffer), eq Ok(0));
}

#[test]
fn unix_datagram_socket_timed_receive_times_out() {
    let name = unique_name("timeout");
    let receiver = UnixDatagramReceiverBuilder::new(&name)
        .creation_mode(CreationMode::PurgeAndCreate)
        .create()
        .unwrap();

    let mut buffer = [0u8; 32];
    let start = std::time::Instant::now();
    let len = receiver
        .timed_receive(&mut buffer, Duration::from_millis(50))
        .unwrap();

    assert_that!(len, eq 0);
    assert_that!(start.elapsed(), ge Duration::from_millis(40));
}

#[test]
fn unix_datagram_socket_connecting_to_missing_receiver_fails() {
    let result = UnixDatagramSenderBuilder::new(&unique_name("missing")).create();
    assert_that!(result.err(), eq Some(UnixDatagramCreationError::DoesNotExist));
}

#[test]
fn unix_datagram_socket_exclusive_creation_of_existing_socket_fails() {
    let name = unique_name("exclusive");
    let _receiver = UnixDatagramReceiverBuilder::new(&name)
        .creation_mode(CreationMode::PurgeAndCreate)
        .create()
        .unwrap();

    let result = UnixDatagramReceiverBuilder::new(&name)
        .creation_mode(CreationMode::CreateExclusive)
        .create();
    assert_that!(result.err(), eq Some(UnixDatagramCreationError::AlreadyExist));
}

#[test]
fn unix_datagram_socket_multiple_messages_arrive_in_order() {
    let name = unique_name("ordering");
    let receiver = UnixDatagramReceiverBuilder::new(&name)
        .creation_mode(CreationMode::PurgeAndCreate)
        .create()
        .unwrap();
    let sender = UnixDatagramSenderBuilder::new(&name).create().unwrap();

    for i in 0..10u8 {
        assert_that!(sender.try_send(&[i]), eq Ok(true));
    }

    let mut buffer = [0u8; 4];
    for i in 0..10u8 {
        let len = receiver
            .timed_receive(&mut buffer, Duration::from_millis(500))
            .unwrap();
        assert_that!(len, eq 1);
        assert_that!(buffer[0], eq i);
    }
}
