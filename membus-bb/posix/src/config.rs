// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Platform settings of the posix abstraction layer.

/// Directory in which all unix datagram sockets of the system are created.
pub const UNIX_DOMAIN_SOCKET_DIRECTORY: &str = "/tmp/membus/";

/// Maximum path length of a unix domain socket supported by every targeted platform.
pub const UNIX_DOMAIN_SOCKET_PATH_LENGTH: usize = 108;

/// Prefix of every shared memory object the system creates.
pub const SHARED_MEMORY_NAME_PREFIX: &str = "membus_";

/// Maximum size of a single datagram exchanged over the ipc channel.
pub const MAX_DATAGRAM_SIZE: usize = 4096;
