// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interface port through which gateway processes observe the discovery traffic. The
//! daemon forwards every Offer and StopOffer whose source interface differs from the
//! port's own interface into the port's inbox; a freshly created port additionally
//! receives a replay of everything which is currently offered.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use membus_bb_concurrency::spin_mutex::SpinMutex;
use membus_bb_container::queue::FixedSizeQueue;
use membus_bb_elementary::relative_ptr::RelativePointer;

use crate::constants::MAX_PORT_INBOX_CAPACITY;
use crate::discovery::message::DiscoveryMessage;
use crate::discovery::service_descriptor::SourceInterface;
use crate::port::base_port::RuntimeName;

/// Lives in the daemon's port pool.
#[repr(C)]
#[derive(Debug)]
pub struct InterfacePortData {
    runtime_name: RuntimeName,
    source_interface: SourceInterface,
    inbox: SpinMutex<FixedSizeQueue<DiscoveryMessage, MAX_PORT_INBOX_CAPACITY>>,
    do_initial_offer_forward: AtomicBool,
    to_be_destroyed: AtomicBool,
}

impl InterfacePortData {
    pub fn new(runtime_name: RuntimeName, source_interface: SourceInterface) -> Self {
        Self {
            runtime_name,
            source_interface,
            inbox: SpinMutex::new(FixedSizeQueue::new()),
            do_initial_offer_forward: AtomicBool::new(true),
            to_be_destroyed: AtomicBool::new(false),
        }
    }

    pub fn runtime_name(&self) -> &RuntimeName {
        &self.runtime_name
    }

    pub fn source_interface(&self) -> SourceInterface {
        self.source_interface
    }

    pub fn mark_to_be_destroyed(&self) {
        self.to_be_destroyed.store(true, Ordering::Release);
    }

    pub fn is_to_be_destroyed(&self) -> bool {
        self.to_be_destroyed.load(Ordering::Acquire)
    }

    /// Returns whether the port still awaits the replay of the currently offered services
    /// and clears the flag.
    pub fn take_initial_offer_forward_flag(&self) -> bool {
        self.do_initial_offer_forward.swap(false, Ordering::AcqRel)
    }
}

/// View on an [`InterfacePortData`], used by the daemon to dispatch messages and by the
/// owning gateway process to drain its inbox.
#[derive(Debug)]
pub struct InterfacePort {
    data: NonNull<InterfacePortData>,
}

impl InterfacePort {
    /// # Safety
    ///
    ///  * `data` must point to an [`InterfacePortData`] inside the port pool and stay
    ///    valid for the lifetime of this view
    ///
    pub unsafe fn new(data: NonNull<InterfacePortData>) -> Self {
        Self { data }
    }

    /// Creates a view from a relative pointer, the client side counterpart of
    /// [`InterfacePort::new()`].
    pub fn from_relative(data: RelativePointer<InterfacePortData>) -> Self {
        Self {
            data: NonNull::new(data.as_mut_ptr()).expect("the port data pointer is non-null"),
        }
    }

    fn data(&self) -> &InterfacePortData {
        unsafe { self.data.as_ref() }
    }

    pub fn source_interface(&self) -> SourceInterface {
        self.data().source_interface()
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
