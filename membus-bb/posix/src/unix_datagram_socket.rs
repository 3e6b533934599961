// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Abstraction of datagram based unix domain sockets. The [`UnixDatagramReceiver`] creates
//! a socket and the [`UnixDatagramSender`] connects to it and sends messages.
//!
//! # Example
//!
//! ```no_run
//! use membus_bb_posix::creation_mode::CreationMode;
//! use membus_bb_posix::unix_datagram_socket::*;
//!
//! let receiver = UnixDatagramReceiverBuilder::new("my_socket")
//!                         .creation_mode(CreationMode::PurgeAndCreate)
//!                         .create().unwrap();
//!
//! let sender = UnixDatagramSenderBuilder::new("my_socket")
//!                         .create().unwrap();
//!
//! sender.try_send(b"hello").unwrap();
//!
//! let mut buffer = [0u8; 16];
//! receiver.try_receive(&mut buffer).unwrap();
//! ```

use core::fmt::Debug;
use core::time::Duration;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;

use membus_bb_log::{fail, trace, warn};

use crate::config::{MAX_DATAGRAM_SIZE, UNIX_DOMAIN_SOCKET_DIRECTORY};
use crate::creation_mode::CreationMode;
use crate::permission::Permission;

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum UnixDatagramCreationError {
    SocketNameTooLong,
    AlreadyExist,
    DoesNotExist,
    InsufficientPermissions,
    SocketDirectoryNotCreatable,
    UnknownError,
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum UnixDatagramSendError {
    MessageTooLarge,
    ConnectionRefused,
    ReceiverDoesNotExist,
    UnknownError,
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum UnixDatagramReceiveError {
    MessageTooLarge,
    UnknownError,
}

fn socket_path(name: &str) -> PathBuf {
    PathBuf::from(UNIX_DOMAIN_SOCKET_DIRECTORY).join(name)
}

/// Builder for the [`UnixDatagramReceiver`].
#[derive(Debug)]
pub struct UnixDatagramReceiverBuilder {
    name: String,
    creation_mode: CreationMode,
    permission: Permission,
}

impl UnixDatagramReceiverBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            creation_mode: CreationMode::default(),
            permission: Permission::OWNER_ALL | Permission::GROUP_ALL | Permission::OTHERS_ALL,
        }
    }

    pub fn creation_mode(mut self, creation_mode: CreationMode) -> Self {
        self.creation_mode = creation_mode;
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    pub fn create(self) -> Result<UnixDatagramReceiver, UnixDatagramCreationError> {
        let msg = "Unable to create unix datagram receiver";
        let path = socket_path(&self.name);

        if std::fs::create_dir_all(UNIX_DOMAIN_SOCKET_DIRECTORY).is_err() {
            fail!(from self, with UnixDatagramCreationError::SocketDirectoryNotCreatable,
                "{} since the socket directory \"{}\" could not be created.",
                msg, UNIX_DOMAIN_SOCKET_DIRECTORY);
        }

        if path.as_os_str().len() >= crate::config::UNIX_DOMAIN_SOCKET_PATH_LENGTH {
            fail!(from self, with UnixDatagramCreationError::SocketNameTooLong,
                "{} since the socket path \"{:?}\" is too long.", msg, path);
        }

        match self.creation_mode {
            CreationMode::PurgeAndCreate => {
                std::fs::remove_file(&path).ok();
            }
            CreationMode::CreateExclusive => {
                if path.exists() {
                    fail!(from self, with UnixDatagramCreationError::AlreadyExist,
                        "{} since the socket already exists.", msg);
                }
            }
            CreationMode::OpenOrCreate => {
                // a datagram socket cannot be reopened for receiving, treat it like purge
                std::fs::remove_file(&path).ok();
            }
        }

        let socket = match UnixDatagram::bind(&path) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                fail!(from self, with UnixDatagramCreationError::InsufficientPermissions,
                    "{} due to insufficient permissions.", msg);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                fail!(from self, with UnixDatagramCreationError::AlreadyExist,
                    "{} since the socket already exists.", msg);
            }
            Err(_) => {
                fail!(from self, with UnixDatagramCreationError::UnknownError,
                    "{} since an unknown error occurred.", msg);
            }
        };

        let c_path = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())
            .expect("socket paths do not contain null bytes");
        if unsafe { libc::chmod(c_path.as_ptr(), self.permission.as_mode() as libc::mode_t) } == -1
        {
            warn!(from self, "Unable to set the permissions of the socket.");
        }

        trace!(from self, "created");
        Ok(UnixDatagramReceiver {
            name: self.name,
            path,
            socket,
        })
    }
}

/// Receiving endpoint of a unix datagram socket. Owns the socket file and removes it on
/// drop.
#[derive(Debug)]
pub struct UnixDatagramReceiver {
    name: String,
    path: PathBuf,
    socket: UnixDatagram,
}

impl UnixDatagramReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receives a datagram without blocking. Returns the number of received bytes, 0 when
    /// no datagram was pending.
    pub fn try_receive(&self, buffer: &mut [u8]) -> Result<usize, UnixDatagramReceiveError> {
        self.socket.set_nonblocking(true).ok();
        self.evaluate_receive_result(self.socket.recv(buffer))
    }

    /// Waits at most `timeout` for a datagram. Returns the number of received bytes, 0 on
    /// timeout.
    pub fn timed_receive(
        &self,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UnixDatagramReceiveError> {
        self.socket.set_nonblocking(false).ok();
        self.socket.set_read_timeout(Some(timeout)).ok();
        self.evaluate_receive_result(self.socket.recv(buffer))
    }

    /// Blocks until a datagram arrives.
    pub fn blocking_receive(&self, buffer: &mut [u8]) -> Result<usize, UnixDatagramReceiveError> {
        self.socket.set_nonblocking(false).ok();
        self.socket.set_read_timeout(None).ok();
        self.evaluate_receive_result(self.socket.recv(buffer))
    }

    fn evaluate_receive_result(
        &self,
        result: std::io::Result<usize>,
    ) -> Result<usize, UnixDatagramReceiveError> {
        match result {
            Ok(len) => Ok(len),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(0)
            }
            Err(_) => {
                fail!(from self, with UnixDatagramReceiveError::UnknownError,
                    "Unable to receive a datagram since an unknown error occurred.");
            }
        }
    }
}

impl Drop for UnixDatagramReceiver {
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).ok();
    }
}

/// Builder for the [`UnixDatagramSender`].
#[derive(Debug)]
pub struct UnixDatagramSenderBuilder {
    name: String,
}

impl UnixDatagramSenderBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn create(self) -> Result<UnixDatagramSender, UnixDatagramCreationError> {
        let msg = "Unable to create unix datagram sender";
        let path = socket_path(&self.name);

        let socket = match UnixDatagram::unbound() {
            Ok(v) => v,
            Err(_) => {
                fail!(from self, with UnixDatagramCreationError::UnknownError,
                    "{} since the socket could not be created.", msg);
            }
        };

        match socket.connect(&path) {
            Ok(_) => (),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fail!(from self, with UnixDatagramCreationError::DoesNotExist,
                    "{} since the receiving socket \"{:?}\" does not exist.", msg, path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                fail!(from self, with UnixDatagramCreationError::InsufficientPermissions,
                    "{} due to insufficient permissions.", msg);
            }
            Err(_) => {
                fail!(from self, with UnixDatagramCreationError::UnknownError,
                    "{} since an unknown error occurred.", msg);
            }
        }

        Ok(UnixDatagramSender {
            name: self.name,
            socket,
        })
    }
}

/// Sending endpoint of a unix datagram socket.
#[derive(Debug)]
pub struct UnixDatagramSender {
    name: String,
    socket: UnixDatagram,
}

impl UnixDatagramSender {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends a datagram without blocking. Returns true when the message was delivered to
    /// the receiving socket buffer.
    pub fn try_send(&self, bytes: &[u8]) -> Result<bool, UnixDatagramSendError> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            fail!(from self, with UnixDatagramSendError::MessageTooLarge,
                "Unable to send a datagram of {} bytes since it exceeds the maximum supported size of {}.",
                bytes.len(), MAX_DATAGRAM_SIZE);
        }

        self.socket.set_nonblocking(true).ok();
        match self.socket.send(bytes) {
            Ok(len) => Ok(len == bytes.len()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                fail!(from self, with UnixDatagramSendError::ConnectionRefused,
                    "Unable to send a datagram since the receiver refused the connection.");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fail!(from self, with UnixDatagramSendError::ReceiverDoesNotExist,
                    "Unable to send a datagram since the receiver does not exist anymore.");
            }
            Err(_) => {
                fail!(from self, with UnixDatagramSendError::UnknownError,
                    "Unable to send a datagram since an unknown error occurred.");
            }
        }
    }
}
