// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Abstraction of a named POSIX shared memory object which maps the object into the
//! process address space. The creator owns the underlying OS resource and removes it on
//! drop.
//!
//! # Example
//!
//! ```no_run
//! use membus_bb_posix::creation_mode::CreationMode;
//! use membus_bb_posix::permission::Permission;
//! use membus_bb_posix::shared_memory::SharedMemoryBuilder;
//!
//! let shm = SharedMemoryBuilder::new("my_segment")
//!                 .size(1024 * 1024)
//!                 .creation_mode(CreationMode::PurgeAndCreate)
//!                 .permission(Permission::OWNER_ALL | Permission::GROUP_ALL)
//!                 .create().unwrap();
//!
//! println!("segment mapped at {:?}", shm.base_address());
//! ```

use core::fmt::Debug;
use core::ptr::NonNull;
use std::ffi::CString;

use membus_bb_log::{fail, trace, warn};

use crate::creation_mode::CreationMode;
use crate::permission::Permission;

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum SharedMemoryCreationError {
    AlreadyExist,
    DoesNotExist,
    NameInvalid,
    InsufficientPermissions,
    InsufficientMemory,
    PerProcessFileHandleLimitReached,
    SystemWideFileHandleLimitReached,
    SizeAdjustmentFailed,
    MappingFailed,
    UnknownError(i32),
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum SharedMemoryRemoveError {
    InsufficientPermissions,
    UnknownError(i32),
}

fn to_shm_name(name: &str) -> Result<CString, SharedMemoryCreationError> {
    let msg = "The shared memory name is invalid";
    match CString::new(format!("/{}", name)) {
        Ok(v) => Ok(v),
        Err(_) => {
            fail!(from "SharedMemory::to_shm_name()", with SharedMemoryCreationError::NameInvalid,
                "{} since it contains a null byte (\"{}\").", msg, name);
        }
    }
}

/// Builder for [`SharedMemory`] objects.
#[derive(Debug)]
pub struct SharedMemoryBuilder {
    name: String,
    size: usize,
    creation_mode: CreationMode,
    permission: Permission,
}

impl SharedMemoryBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size: 0,
            creation_mode: CreationMode::default(),
            permission: Permission::OWNER_READ | Permission::OWNER_WRITE,
        }
    }

    /// Sets the size of the shared memory object.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn creation_mode(mut self, creation_mode: CreationMode) -> Self {
        self.creation_mode = creation_mode;
        self
    }

    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    /// Creates a new shared memory object with the configured size, takes ownership of the
    /// underlying OS resource.
    pub fn create(self) -> Result<SharedMemory, SharedMemoryCreationError> {
        let msg = "Unable to create shared memory";
        let shm_name = to_shm_name(&self.name)?;

        if self.creation_mode == CreationMode::PurgeAndCreate {
            SharedMemory::remove(&self.name).ok();
        }

        let oflags = match self.creation_mode {
            CreationMode::OpenOrCreate => libc::O_CREAT | libc::O_RDWR,
            _ => libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
        };

        let fd = unsafe {
            libc::shm_open(
                shm_name.as_ptr(),
                oflags,
                self.permission.as_mode() as libc::mode_t,
            )
        };
        if fd == -1 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            match errno {
                libc::EEXIST => {
                    fail!(from self, with SharedMemoryCreationError::AlreadyExist,
                        "{} since a shared memory object with the name already exists.", msg);
                }
                libc::EACCES => {
                    fail!(from self, with SharedMemoryCreationError::InsufficientPermissions,
                        "{} due to insufficient permissions.", msg);
                }
                libc::EMFILE => {
                    fail!(from self, with SharedMemoryCreationError::PerProcessFileHandleLimitReached,
                        "{} since the per-process file handle limit is reached.", msg);
                }
                libc::ENFILE => {
                    fail!(from self, with SharedMemoryCreationError::SystemWideFileHandleLimitReached,
                        "{} since the system-wide file handle limit is reached.", msg);
                }
                v => {
                    fail!(from self, with SharedMemoryCreationError::UnknownError(v),
                        "{} since an unknown error occurred ({}).", msg, v);
                }
            }
        }

        if unsafe { libc::ftruncate(fd, self.size as libc::off_t) } == -1 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(shm_name.as_ptr()) };
            fail!(from self, with SharedMemoryCreationError::SizeAdjustmentFailed,
                "{} since the size could not be set ({}).", msg, errno);
        }

        let base = Self::map(fd, self.size)?;

        trace!(from self, "created");
        Ok(SharedMemory {
            name: self.name,
            base,
            size: self.size,
            fd,
            has_ownership: true,
        })
    }

    /// Opens an existing shared memory object. The configured size is ignored, the actual
    /// size is acquired from the object itself.
    pub fn open(self) -> Result<SharedMemory, SharedMemoryCreationError> {
        let msg = "Unable to open shared memory";
        let shm_name = to_shm_name(&self.name)?;

        let fd = unsafe { libc::shm_open(shm_name.as_ptr(), libc::O_RDWR, 0) };
        if fd == -1 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            match errno {
                libc::ENOENT => {
                    fail!(from self, with SharedMemoryCreationError::DoesNotExist,
                        "{} since no shared memory object with the name exists.", msg);
                }
                libc::EACCES => {
                    fail!(from self, with SharedMemoryCreationError::InsufficientPermissions,
                        "{} due to insufficient permissions.", msg);
                }
                v => {
                    fail!(from self, with SharedMemoryCreationError::UnknownError(v),
                        "{} since an unknown error occurred ({}).", msg, v);
                }
            }
        }

        let mut stat = core::mem::MaybeUninit::<libc::stat>::uninit();
        if unsafe { libc::fstat(fd, stat.as_mut_ptr()) } == -1 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            unsafe { libc::close(fd) };
            fail!(from self, with SharedMemoryCreationError::UnknownError(errno),
                "{} since the size could not be acquired ({}).", msg, errno);
        }
        let size = unsafe { stat.assume_init() }.st_size as usize;

        let base = Self::map(fd, size)?;

        trace!(from self, "opened");
        Ok(SharedMemory {
            name: self.name,
            base,
            size,
            fd,
            has_ownership: false,
        })
    }

    fn map(fd: i32, size: usize) -> Result<NonNull<u8>, SharedMemoryCreationError> {
        let base = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if base == libc::MAP_FAILED {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            unsafe { libc::close(fd) };
            if errno == libc::ENOMEM {
                fail!(from "SharedMemoryBuilder::map()", with SharedMemoryCreationError::InsufficientMemory,
                    "Unable to map shared memory due to insufficient memory.");
            }
            fail!(from "SharedMemoryBuilder::map()", with SharedMemoryCreationError::MappingFailed,
                "Unable to map shared memory ({}).", errno);
        }

        Ok(unsafe { NonNull::new_unchecked(base as *mut u8) })
    }
}

/// A mapped POSIX shared memory object.
pub struct SharedMemory {
    name: String,
    base: NonNull<u8>,
    size: usize,
    fd: i32,
    has_ownership: bool,
}

unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

impl Debug for SharedMemory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "SharedMemory {{ name: {}, base: {:?}, size: {}, has_ownership: {} }}",
            self.name, self.base, self.size, self.has_ownership
        )
    }
}

impl SharedMemory {
    /// Removes a shared memory object from the system without mapping it. Returns true when
    /// an object was removed.
    pub fn remove(name: &str) -> Result<bool, SharedMemoryRemoveError> {
        let shm_name = match to_shm_name(name) {
            Ok(v) => v,
            Err(_) => return Ok(false),
        };

        if unsafe { libc::shm_unlink(shm_name.as_ptr()) } == -1 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            match errno {
                libc::ENOENT => return Ok(false),
                libc::EACCES => {
                    fail!(from "SharedMemory::remove()", with SharedMemoryRemoveError::InsufficientPermissions,
                        "Unable to remove shared memory \"{}\" due to insufficient permissions.", name);
                }
                v => {
                    fail!(from "SharedMemory::remove()", with SharedMemoryRemoveError::UnknownError(v),
                        "Unable to remove shared memory \"{}\" since an unknown error occurred ({}).", name, v);
                }
            }
        }

        trace!(from "SharedMemory::remove()", "removed \"{}\"", name);
        Ok(true)
    }

    /// Returns the name of the shared memory object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the base address of the mapping in the current process.
    pub fn base_address(&self) -> NonNull<u8> {
        self.base
    }

    /// Returns the size of the mapping.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns true when this object owns the underlying OS resource and removes it on
    /// drop.
    pub fn has_ownership(&self) -> bool {
        self.has_ownership
    }

    /// Releases the ownership of the underlying OS resource so it survives the drop of
    /// this object.
    pub fn release_ownership(&mut self) {
        self.has_ownership = false;
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        if unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.size) } == -1 {
            warn!(from self, "Unable to unmap the shared memory mapping.");
        }

        if unsafe { libc::close(self.fd) } == -1 {
            warn!(from self, "Unable to close the shared memory file descriptor.");
        }

        if self.has_ownership {
            Self::remove(&self.name).ok();
        }
    }
}
