// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Abstraction of a process with signal delivery.

use core::fmt::Display;

use membus_bb_log::fail;

/// Signals which can be sent to a [`Process`].
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum Signal {
    Terminate,
    Kill,
}

impl Signal {
    fn value(&self) -> i32 {
        match self {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum SignalSendError {
    ProcessDoesNotExist,
    InsufficientPermissions,
    UnknownError(i32),
}

/// Returns the user id the calling process runs under.
pub fn current_user_id() -> u32 {
    unsafe { libc::getuid() }
}

/// Identifies a process.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub struct ProcessId(i32);

impl ProcessId {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl Display for ProcessId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a process handle through which signals can be delivered.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub struct Process {
    id: ProcessId,
}

impl Process {
    /// Returns a handle to the calling process.
    pub fn from_self() -> Process {
        Process {
            id: ProcessId::new(unsafe { libc::getpid() }),
        }
    }

    /// Creates a handle from a raw process id.
    pub fn from_pid(id: ProcessId) -> Process {
        Process { id }
    }

    /// Returns the id of the process.
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Sends a signal to the process.
    pub fn send_signal(&self, signal: Signal) -> Result<(), SignalSendError> {
        if unsafe { libc::kill(self.id.value(), signal.value()) } == -1 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            match errno {
                libc::ESRCH => {
                    fail!(from self, with SignalSendError::ProcessDoesNotExist,
                        "Unable to send {:?} since the process does not exist.", signal);
                }
                libc::EPERM => {
                    fail!(from self, with SignalSendError::InsufficientPermissions,
                        "Unable to send {:?} due to insufficient permissions.", signal);
                }
                v => {
                    fail!(from self, with SignalSendError::UnknownError(v),
                        "Unable to send {:?} since an unknown error occurred ({}).", signal, v);
                }
            }
        }

        Ok(())
    }

    /// Returns true when the process is still alive.
    pub fn is_alive(&self) -> bool {
        unsafe { libc::kill(self.id.value(), 0) == 0 }
    }
}
