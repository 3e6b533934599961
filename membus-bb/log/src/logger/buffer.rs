// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A [`Logger`] that stores every log message in an internal buffer. Useful to verify log
//! output in tests.

use std::sync::Mutex;

use crate::LogLevel;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Entry {
    pub log_level: LogLevel,
    pub origin: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Logger {
    buffer: Mutex<Vec<Entry>>,
}

impl Logger {
    pub const fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of all stored log entries.
    pub fn content(&self) -> Vec<Entry> {
        self.buffer.lock().unwrap().clone()
    }

    /// Removes all stored log entries.
    pub fn clear(&self) {
        self.buffer.lock().unwrap().clear()
    }
}

impl crate::Log for Logger {
    fn log(
        &self,
        log_level: LogLevel,
        origin: core::fmt::Arguments,
        formatted_message: core::fmt::Arguments,
    ) {
        self.buffer.lock().unwrap().push(Entry {
            log_level,
            origin: origin.to_string(),
            message: formatted_message.to_string(),
        });
    }
}
