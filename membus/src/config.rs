// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime configuration of the daemon and its clients.
//!
//! # Example
//!
//! ```
//! use membus::config::Config;
//!
//! // create a default config and override some entries
//! let mut custom_config = Config::default();
//! custom_config.daemon.name = "my_daemon".to_string();
//! custom_config.memory.entries.push(
//!     membus::config::MemPoolEntry { chunk_size: 65536, chunk_count: 100 });
//! ```

use core::time::Duration;

use membus_bb_elementary::lazy_singleton::LazySingleton;
use membus_bb_log::{fail, trace, warn};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DAEMON_NAME;

/// Path of the config file which [`Config::global_config()`] tries to load.
pub const DEFAULT_CONFIG_FILE: &str = "config/membus.toml";

/// Failures occurring while creating a new [`Config`] object with [`Config::from_file()`].
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ConfigCreationError {
    FailedToReadConfigFileContents,
    UnableToDeserializeContents,
}

/// One mempool size class: `chunk_count` chunks which can carry a payload of up to
/// `chunk_size` bytes each.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
pub struct MemPoolEntry {
    pub chunk_size: usize,
    pub chunk_count: usize,
}

/// The mempool layout of the data segment.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct Memory {
    pub entries: Vec<MemPoolEntry>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            entries: vec![
                MemPoolEntry {
                    chunk_size: 128,
                    chunk_count: 64,
                },
                MemPoolEntry {
                    chunk_size: 1024,
                    chunk_count: 64,
                },
                MemPoolEntry {
                    chunk_size: 16384,
                    chunk_count: 32,
                },
                MemPoolEntry {
                    chunk_size: 131072,
                    chunk_count: 16,
                },
            ],
        }
    }
}

impl Memory {
    /// Brings the entries into the canonical form the
    /// [`MemoryManager`](crate::memory::memory_manager::MemoryManager) requires: sorted by
    /// ascending chunk size, entries with equal size merged, zero-sized entries dropped.
    pub fn optimize(&mut self) {
        self.entries.retain(|entry| {
            if entry.chunk_size == 0 || entry.chunk_count == 0 {
                warn!(from "Memory::optimize()",
                    "Dropping the mempool entry {:?} since it is empty.", entry);
                return false;
            }
            true
        });
        self.entries.sort_by_key(|entry| entry.chunk_size);

        let mut merged: Vec<MemPoolEntry> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match merged.last_mut() {
                Some(last) if last.chunk_size == entry.chunk_size => {
                    last.chunk_count += entry.chunk_count;
                }
                _ => merged.push(*entry),
            }
        }
        self.entries = merged;
    }
}

/// All configurable settings of the daemon.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct Daemon {
    /// Name of the daemon, determines the well-known ipc channel and the shared memory
    /// segment names.
    pub name: String,
    /// Period of the discovery and monitoring pass in milliseconds.
    pub discovery_interval_ms: u64,
    /// Interval in which monitored clients must send a keep alive message, in
    /// milliseconds.
    pub keep_alive_interval_ms: u64,
    /// A monitored client which was silent for longer than this is considered dead, in
    /// milliseconds.
    pub keep_alive_timeout_ms: u64,
    /// Time the daemon waits for termination acknowledgements on shutdown, in
    /// milliseconds.
    pub termination_ack_timeout_ms: u64,
}

impl Default for Daemon {
    fn default() -> Self {
        Self {
            name: DEFAULT_DAEMON_NAME.to_string(),
            discovery_interval_ms: crate::constants::DISCOVERY_INTERVAL.as_millis() as u64,
            keep_alive_interval_ms: crate::constants::KEEP_ALIVE_INTERVAL.as_millis() as u64,
            keep_alive_timeout_ms: crate::constants::KEEP_ALIVE_TIMEOUT.as_millis() as u64,
            termination_ack_timeout_ms: crate::constants::TERMINATION_ACK_TIMEOUT.as_millis()
                as u64,
        }
    }
}

impl Daemon {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_millis(self.keep_alive_timeout_ms)
    }

    pub fn termination_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.termination_ack_timeout_ms)
    }
}

/// Represents the configuration that membus will utilize.
#[derive(Serialize, Deserialize, Default, Debug, Clone, Eq, PartialEq)]
pub struct Config {
    pub daemon: Daemon,
    pub memory: Memory,
}

static MEMBUS_CONFIG: LazySingleton<Config> = LazySingleton::<Config>::new();

impl Config {
    /// Loads a configuration from a toml file.
    pub fn from_file(config_file: &str) -> Result<Config, ConfigCreationError> {
        let msg = "Unable to create config from file";
        let contents = fail!(from "Config::from_file()",
            when std::fs::read_to_string(config_file),
            with ConfigCreationError::FailedToReadConfigFileContents,
            "{} since the file \"{}\" could not be read.", msg, config_file);

        match toml::from_str(&contents) {
            Ok(config) => {
                trace!(from "Config::from_file()", "loaded \"{}\"", config_file);
                Ok(config)
            }
            Err(e) => {
                fail!(from "Config::from_file()",
                    with ConfigCreationError::UnableToDeserializeContents,
                    "{} since the contents could not be deserialized ({}).", msg, e);
            }
        }
    }

    /// Sets up the global configuration from a file. If the global configuration was
    /// already set up it fails.
    pub fn setup_global_config_from_file(
        config_file: &str,
    ) -> Result<&'static Config, ConfigCreationError> {
        if MEMBUS_CONFIG.is_initialized() {
            return Ok(MEMBUS_CONFIG.get());
        }

        if !MEMBUS_CONFIG.set_value(Config::from_file(config_file)?) {
            warn!(from "Config::setup_global_config_from_file()",
                "The global config was already set up by another thread.");
        }

        Ok(MEMBUS_CONFIG.get())
    }

    /// Returns the global configuration. When no configuration file was loaded before it
    /// returns the default settings.
    pub fn global_config() -> &'static Config {
        if !MEMBUS_CONFIG.is_initialized() {
            MEMBUS_CONFIG.set_value(Config::default());
        }

        MEMBUS_CONFIG.get()
    }

    /// The well-known ipc channel of the daemon.
    pub fn daemon_socket_name(&self) -> &str {
        &self.daemon.name
    }

    /// Name of the management segment which carries the port pool.
    pub fn management_segment_name(&self) -> String {
        format!("{}_management", self.daemon.name)
    }

    /// Name of the data segment which carries the mempools.
    pub fn data_segment_name(&self) -> String {
        format!("{}_data", self.daemon.name)
    }
}
