// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A process-wide hook through which error conditions of a defined severity are reported,
//! in addition to the typed error the affected call returns. The default hook logs,
//! [`ErrorLevel::Moderate`] as an error and [`ErrorLevel::Severe`] as fatal; an
//! application can install its own [`ErrorHook`] once at startup which may escalate a
//! severe condition up to an abort.
//!
//! # Example
//!
//! ```
//! use membus_bb_log::error_hook::ErrorLevel;
//! use membus_bb_log::report_error;
//!
//! #[derive(Debug)]
//! struct MyContainer {
//!     capacity: u64
//! }
//!
//! impl MyContainer {
//!     fn on_overflow(&self) {
//!         report_error!(from self, ErrorLevel::Severe,
//!             "The container with a capacity of {} overflowed.", self.capacity);
//!     }
//! }
//! ```

use core::fmt::Arguments;
use std::cell::UnsafeCell;
use std::sync::Once;

use crate::{LogLevel, __internal_print_log_msg};

/// Severity of a reported error condition.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ErrorLevel {
    /// The system compensates the condition, the affected operation fails in a defined
    /// way.
    Moderate,
    /// A serious condition, usually an exhausted fixed-size resource. The default hook
    /// logs it fatally, a custom hook may abort the process.
    Severe,
}

/// Interface every error hook has to implement.
pub trait ErrorHook: Send + Sync {
    /// Called once for every reported error condition.
    fn on_error(&self, error_level: ErrorLevel, origin: Arguments, description: Arguments);
}

struct DefaultErrorHook;

impl ErrorHook for DefaultErrorHook {
    fn on_error(&self, error_level: ErrorLevel, origin: Arguments, description: Arguments) {
        match error_level {
            ErrorLevel::Moderate => __internal_print_log_msg(LogLevel::Error, origin, description),
            ErrorLevel::Severe => __internal_print_log_msg(LogLevel::Fatal, origin, description),
        }
    }
}

static DEFAULT_ERROR_HOOK: DefaultErrorHook = DefaultErrorHook;

struct ErrorHookCell(UnsafeCell<Option<&'static dyn ErrorHook>>);
unsafe impl Send for ErrorHookCell {}
unsafe impl Sync for ErrorHookCell {}

static ERROR_HOOK: ErrorHookCell = ErrorHookCell(UnsafeCell::new(None));
static INIT: Once = Once::new();

/// Sets the [`ErrorHook`]. Can be called only once at the beginning of the program. If
/// the hook is already set it returns false and does not update it.
pub fn set_error_hook<T: ErrorHook + 'static>(value: &'static T) -> bool {
    let mut set_error_hook_success = false;
    INIT.call_once(|| {
        unsafe { *ERROR_HOOK.0.get() = Some(value) };
        set_error_hook_success = true;
    });
    set_error_hook_success
}

/// Returns a reference to the [`ErrorHook`].
pub fn get_error_hook() -> &'static dyn ErrorHook {
    INIT.call_once(|| {
        unsafe { *ERROR_HOOK.0.get() = Some(&DEFAULT_ERROR_HOOK) };
    });

    // after INIT ran the cell is never written again
    unsafe { (*ERROR_HOOK.0.get()).unwrap() }
}

#[doc(hidden)]
pub fn __internal_report_error(error_level: ErrorLevel, origin: Arguments, args: Arguments) {
    get_error_hook().on_error(error_level, origin, args)
}

/// Reports an error condition to the process-wide [`ErrorHook`]. Reporting never replaces
/// the typed error the affected call returns to its caller.
#[macro_export(local_inner_macros)]
macro_rules! report_error {
    ($error_level:expr, $($e:expr),*) => {
        $crate::error_hook::__internal_report_error($error_level, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $error_level:expr, $($e:expr),*) => {
        $crate::error_hook::__internal_report_error($error_level, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
}
