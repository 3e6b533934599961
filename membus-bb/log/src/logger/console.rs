// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The default [`Logger`] implementation which prints to stderr.

use core::sync::atomic::{AtomicU64, Ordering};
use std::io::IsTerminal;

use crate::LogLevel;

pub struct Logger {
    counter: AtomicU64,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    fn log_level_string(log_level: LogLevel) -> &'static str {
        if std::io::stderr().is_terminal() {
            match log_level {
                LogLevel::Trace => "\x1b[0;90m[T]",
                LogLevel::Debug => "\x1b[0;93m[D]",
                LogLevel::Info => "\x1b[0;92m[I]",
                LogLevel::Warn => "\x1b[0;33m[W]",
                LogLevel::Error => "\x1b[0;31m[E]",
                LogLevel::Fatal => "\x1b[1;4;91m[F]",
            }
        } else {
            match log_level {
                LogLevel::Trace => "[T]",
                LogLevel::Debug => "[D]",
                LogLevel::Info => "[I]",
                LogLevel::Warn => "[W]",
                LogLevel::Error => "[E]",
                LogLevel::Fatal => "[F]",
            }
        }
    }

    fn color_reset() -> &'static str {
        if std::io::stderr().is_terminal() {
            "\x1b[0m"
        } else {
            ""
        }
    }
}

impl crate::Log for Logger {
    fn log(
        &self,
        log_level: LogLevel,
        origin: core::fmt::Arguments,
        formatted_message: core::fmt::Arguments,
    ) {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let origin = origin.to_string();

        if origin.is_empty() {
            eprintln!(
                "{} {} {}{}",
                counter,
                Self::log_level_string(log_level),
                formatted_message,
                Self::color_reset(),
            );
        } else {
            eprintln!(
                "{} {} {} | {}{}",
                counter,
                Self::log_level_string(log_level),
                origin,
                formatted_message,
                Self::color_reset(),
            );
        }
    }
}
