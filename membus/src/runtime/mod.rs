// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The client side of the system: the [`IpcMessage`](ipc_message::IpcMessage) frames which
//! travel between clients and the daemon and the per-process
//! [`Runtime`](runtime::Runtime) which registers with the daemon and creates ports.

pub mod ipc_message;
#[allow(clippy::module_inception)]
pub mod runtime;
