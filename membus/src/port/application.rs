// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The application port through which a client process can feed Offer and StopOffer
//! messages into the discovery, for services it manages outside of regular publisher
//! ports. The daemon drains the inbox in every discovery pass.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use membus_bb_concurrency::spin_mutex::SpinMutex;
use membus_bb_container::queue::FixedSizeQueue;
use membus_bb_elementary::relative_ptr::RelativePointer;

use crate::constants::MAX_PORT_INBOX_CAPACITY;
use crate::discovery::message::DiscoveryMessage;
use crate::port::base_port::RuntimeName;

/// Lives in the daemon's port pool.
#[repr(C)]
#[derive(Debug)]
pub struct ApplicationPortData {
    runtime_name: RuntimeName,
    inbox: SpinMutex<FixedSizeQueue<DiscoveryMessage, MAX_PORT_INBOX_CAPACITY>>,
    to_be_destroyed: AtomicBool,
}

impl ApplicationPortData {
    pub fn new(runtime_name: RuntimeName) -> Self {
        Self {
            runtime_name,
            inbox: SpinMutex::new(FixedSizeQueue::new()),
            to_be_destroyed: AtomicBool::new(false),
        }
    }

    pub fn runtime_name(&self) -> &RuntimeName {
        &self.runtime_name
    }

    pub fn mark_to_be_destroyed(&self) {
        self.to_be_destroyed.store(true, Ordering::Release);
    }

    pub fn is_to_be_destroyed(&self) -> bool {
        self.to_be_destroyed.load(Ordering::Acquire)
    }
}

/// View on an [`ApplicationPortData`], used by the owning process to submit messages and
/// by the daemon to drain them.
#[derive(Debug)]
pub struct ApplicationPort {
    data: NonNull<ApplicationPortData>,
}

impl ApplicationPort {
    /// # Safety
    ///
    ///  * `data` must point to an [`ApplicationPortData`] inside the port pool and stay
    ///    valid for the lifetime of this view
    ///
    pub unsafe fn new(data: NonNull<ApplicationPortData>) -> Self {
        Self { data }
    }

    /// Creates a view from a relative pointer, the client side counterpart of
    /// [`ApplicationPort::new()`].
    pub fn from_relative(data: RelativePointer<ApplicationPortData>) -> Self {
        Self {
            data: NonNull::new(data.as_mut_ptr()).expect("the port data pointer is non-null"),
        }
    }

    fn data(&self) -> &ApplicationPortData {
        unsafe { self.data.as_ref() }
    }

    /// Puts a discovery message into the inbox. A full inbox drops the oldest message.
    pub fn dispatch(&self, message: &DiscoveryMessage) {
        self.data()
            .inbox
            .lock()
            .push_with_overflow(message.clone());
    }

    /// Takes the oldest message out of the inbox.
    pub fn try_get_message(&self) -> Option<DiscoveryMessage> {
        self.data().inbox.lock().pop()
    }
}
