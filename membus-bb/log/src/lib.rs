// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simplistic logger with 6 [`LogLevel`]s which can be set via [`set_log_level()`] and read via
//! [`get_log_level()`].
//!
//! The crate provides convenience macros which combine error handling directly with the logger.
//! The [`fail!`] macro logs and returns when a call produced an error containing result, the
//! [`fatal_panic!`] macro logs and calls [`panic!`].
//!
//! # Example
//!
//! ```
//! use membus_bb_log::{debug, error, info, trace, warn};
//!
//! #[derive(Debug)]
//! struct MyDataType {
//!     value: u64
//! }
//!
//! impl MyDataType {
//!     fn log_stuff(&self) {
//!         trace!("trace message");
//!         debug!(from self, "hello {}", 123);
//!         info!(from "Custom::Origin", "world");
//!         warn!("warning");
//!         error!(from self, "bla {}", 1);
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! ```
//! use membus_bb_log::fail;
//!
//! #[derive(Debug)]
//! struct MyDataType {
//!     value: u64
//! }
//!
//! impl MyDataType {
//!     fn do_stuff(&self, value: u64) -> Result<(), ()> {
//!         if value == 0 { Err(()) } else { Ok(()) }
//!     }
//!
//!     fn do_more_stuff(&self) -> Result<(), u64> {
//!         // fail when do_stuff.is_err() and return the error 1234
//!         fail!(from self, when self.do_stuff(0),
//!                 with 1234, "Failed while calling do_stuff");
//!         Ok(())
//!     }
//! }
//! ```

#[macro_use]
pub mod log;
#[macro_use]
pub mod fail;
#[macro_use]
pub mod error_hook;
pub mod logger;

use core::fmt::Arguments;
use core::sync::atomic::{AtomicU8, Ordering};
use std::cell::UnsafeCell;
use std::env;
use std::sync::Once;

static DEFAULT_LOGGER: logger::console::Logger = logger::console::Logger::new();

const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

/// Environment variable from which the log level is read on startup.
pub const LOG_LEVEL_ENV_NAME: &str = "MEMBUS_LOG_LEVEL";

struct LoggerCell(UnsafeCell<Option<&'static dyn Log>>);
unsafe impl Send for LoggerCell {}
unsafe impl Sync for LoggerCell {}

static LOGGER: LoggerCell = LoggerCell(UnsafeCell::new(None));
static LOG_LEVEL: AtomicU8 = AtomicU8::new(DEFAULT_LOG_LEVEL as u8);
static INIT: Once = Once::new();

/// Interface every logger has to implement.
pub trait Log: Send + Sync {
    /// logs a message
    fn log(&self, log_level: LogLevel, origin: Arguments, formatted_message: Arguments);
}

/// Describes the log level.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    fn from_str_fuzzy(log_level_string: &str, log_level_fallback: LogLevel) -> LogLevel {
        match log_level_string.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "fatal" => LogLevel::Fatal,
            _ => log_level_fallback,
        }
    }
}

/// Sets the log level from the environment variable `MEMBUS_LOG_LEVEL`, and if the variable is
/// not set it uses the provided fallback.
pub fn set_log_level_from_env_or(v: LogLevel) {
    let log_level = env::var(LOG_LEVEL_ENV_NAME)
        .ok()
        .map(|s| LogLevel::from_str_fuzzy(&s, v))
        .unwrap_or(v);
    set_log_level(log_level);
}

/// Sets the log level from the environment variable `MEMBUS_LOG_LEVEL` or defaults it to
/// [`LogLevel::Info`].
pub fn set_log_level_from_env_or_default() {
    set_log_level_from_env_or(DEFAULT_LOG_LEVEL);
}

/// Sets the current log level.
pub fn set_log_level(v: LogLevel) {
    LOG_LEVEL.store(v as u8, Ordering::Relaxed);
}

/// Returns the current log level.
pub fn get_log_level() -> u8 {
    LOG_LEVEL.load(Ordering::Relaxed)
}

/// Sets the [`Log`]ger. Can be called only once at the beginning of the program. If the
/// [`Log`]ger is already set it returns false and does not update it.
pub fn set_logger<T: Log + 'static>(value: &'static T) -> bool {
    let mut set_logger_success = false;
    INIT.call_once(|| {
        unsafe { *LOGGER.0.get() = Some(value) };
        set_logger_success = true;
    });
    set_logger_success
}

/// Returns a reference to the [`Log`]ger.
pub fn get_logger() -> &'static dyn Log {
    INIT.call_once(|| {
        unsafe { *LOGGER.0.get() = Some(&DEFAULT_LOGGER) };
    });

    // after INIT ran the cell is never written again
    unsafe { (*LOGGER.0.get()).unwrap() }
}

#[doc(hidden)]
pub fn __internal_print_log_msg(log_level: LogLevel, origin: Arguments, args: Arguments) {
    if get_log_level() <= log_level as u8 {
        get_logger().log(log_level, origin, args)
    }
}
