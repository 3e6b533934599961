// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The discovery protocol: the [`ServiceDescriptor`](service_descriptor::ServiceDescriptor)
//! naming a topic, the [`DiscoveryMessage`](message::DiscoveryMessage)s exchanged between
//! ports through the daemon and the [`ServiceRegistry`](service_registry::ServiceRegistry)
//! indexing all offered services.

pub mod message;
pub mod service_descriptor;
pub mod service_registry;
