// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compile-time constants of the system. Every fixed-capacity container in shared memory is
//! dimensioned here.

use core::time::Duration;

use membus_bb_elementary::segment_registry::SegmentId;

/// Version of the shared memory layout and the ipc protocol, exchanged at registration
/// time as part of the [`VersionInfo`](crate::version::VersionInfo). Clients with a
/// different major or minor version are rejected.
pub const VERSION_MAJOR: u64 = 0;
pub const VERSION_MINOR: u64 = 1;
pub const VERSION_PATCH: u64 = 0;

/// Maximum number of publisher ports the daemon can manage.
pub const MAX_PUBLISHERS: usize = 512;
/// Maximum number of subscriber ports the daemon can manage.
pub const MAX_SUBSCRIBERS: usize = 1024;
/// Maximum number of interface ports the daemon can manage.
pub const MAX_INTERFACES: usize = 4;
/// Maximum number of application ports the daemon can manage.
pub const MAX_APPLICATIONS: usize = 256;
/// Maximum number of node records the daemon can manage.
pub const MAX_NODES: usize = 512;
/// Maximum number of condition variables the daemon can manage.
pub const MAX_CONDITION_VARIABLES: usize = 512;
/// Maximum number of processes which can be registered at the same time.
pub const MAX_PROCESSES: usize = 256;
/// Maximum number of distinct services the registry can hold.
pub const MAX_SERVICES: usize = 512;

/// Maximum number of subscribers which can be connected to one publisher.
pub const MAX_SUBSCRIBERS_PER_PUBLISHER: usize = 256;
/// Capacity bound of every subscriber chunk queue, the configured queue capacity is
/// clamped to this value.
pub const MAX_SUBSCRIBER_QUEUE_CAPACITY: usize = 256;
/// Upper bound of the publisher history, the configured history capacity is clamped to
/// this value.
pub const MAX_HISTORY_CAPACITY: usize = 16;
/// Maximum number of chunks a publisher can have loaned to the user at the same time.
pub const MAX_CHUNKS_ALLOCATED_PER_PUBLISHER: usize = 8;
/// Maximum number of chunks a subscriber can hold at the same time.
pub const MAX_CHUNKS_HELD_PER_SUBSCRIBER: usize = 256;
/// Capacity of the discovery message inbox of interface and application ports.
pub const MAX_PORT_INBOX_CAPACITY: usize = 64;

/// Capacity of the bounded strings of a service descriptor.
pub const SERVICE_STRING_LENGTH: usize = 100;
/// Capacity of a runtime (process) name.
pub const RUNTIME_NAME_LENGTH: usize = 100;
/// Capacity of a node name.
pub const NODE_NAME_LENGTH: usize = 100;

/// Period of the daemon's discovery and monitoring pass.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_millis(100);
/// Interval in which every monitored client has to send a keep alive message.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(300);
/// A monitored client which was silent for longer than this is considered dead.
pub const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_millis(1500);
/// Time the daemon waits for clients to acknowledge the termination request before it
/// escalates to signals.
pub const TERMINATION_ACK_TIMEOUT: Duration = Duration::from_millis(2000);
/// Timeout of a single ipc request/response cycle on the client side.
pub const IPC_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000);
/// Receive timeout of the daemon's ipc loop, bounds the shutdown latency.
pub const IPC_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// Segment id under which every process registers the data segment mapping.
pub const DATA_SEGMENT_ID: SegmentId = SegmentId::new(1);
/// Segment id under which every process registers the management segment mapping.
pub const MANAGEMENT_SEGMENT_ID: SegmentId = SegmentId::new(2);

/// Alignment of every chunk and of the chunk payload.
pub const CHUNK_ALIGNMENT: usize = 8;

/// Default name of the daemon, determines the well-known ipc channel and the segment
/// names.
pub const DEFAULT_DAEMON_NAME: &str = "membus";
