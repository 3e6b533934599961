// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contains all macros to log messages.

/// Logs a trace message.
#[macro_export(local_inner_macros)]
macro_rules! trace {
    ($($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Trace, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Trace, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
    (from $o:expr, when $call:expr, $($e:expr),*) => {
        {
            let result = $call;
            if result.is_err() {
                $crate::__internal_print_log_msg($crate::LogLevel::Trace, std::format_args!("{:?}", $o), std::format_args!($($e),*))
            }
        }
    }
}

/// Logs a debug message.
#[macro_export(local_inner_macros)]
macro_rules! debug {
    ($($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Debug, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Debug, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
    (from $o:expr, when $call:expr, $($e:expr),*) => {
        {
            let result = $call;
            if result.is_err() {
                $crate::__internal_print_log_msg($crate::LogLevel::Debug, std::format_args!("{:?}", $o), std::format_args!($($e),*))
            }
        }
    }
}

/// Logs an info message.
#[macro_export(local_inner_macros)]
macro_rules! info {
    ($($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Info, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Info, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
    (from $o:expr, when $call:expr, $($e:expr),*) => {
        {
            let result = $call;
            if result.is_err() {
                $crate::__internal_print_log_msg($crate::LogLevel::Info, std::format_args!("{:?}", $o), std::format_args!($($e),*))
            }
        }
    }
}

/// Logs a warning message.
#[macro_export(local_inner_macros)]
macro_rules! warn {
    ($($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Warn, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Warn, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
    (from $o:expr, when $call:expr, $($e:expr),*) => {
        {
            let result = $call;
            if result.is_err() {
                $crate::__internal_print_log_msg($crate::LogLevel::Warn, std::format_args!("{:?}", $o), std::format_args!($($e),*))
            }
        }
    }
}

/// Logs an error message.
#[macro_export(local_inner_macros)]
macro_rules! error {
    ($($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Error, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::__internal_print_log_msg($crate::LogLevel::Error, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
    (from $o:expr, when $call:expr, $($e:expr),*) => {
        {
            let result = $call;
            if result.is_err() {
                $crate::__internal_print_log_msg($crate::LogLevel::Error, std::format_args!("{:?}", $o), std::format_args!($($e),*))
            }
        }
    }
}

/// Logs a fatal message and calls [`panic!`].
#[macro_export(local_inner_macros)]
macro_rules! fatal_panic {
    ($($message:expr),*) => {
        {
            $crate::__internal_print_log_msg($crate::LogLevel::Fatal, std::format_args!(""), std::format_args!($($message),*));
            core::panic!($($message),*);
        }
    };
    (from $origin:expr, $($message:expr),*) => {
        {
            $crate::__internal_print_log_msg($crate::LogLevel::Fatal, std::format_args!("{:?}", $origin), std::format_args!($($message),*));
            core::panic!("From: {:?}: {}", $origin, std::format!($($message),*));
        }
    };
    (from $origin:expr, when $call:expr, $($message:expr),*) => {
        {
            let result = $call;
            match result.is_err() {
                true => {
                    fatal_panic!(from $origin, $($message),*);
                }
                false => {
                    result.ok().unwrap()
                }
            }
        }
    };
}
