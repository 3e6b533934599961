// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Supervision of the registered client processes: registration with duplicate-name
//! handling, keep-alive based liveness monitoring and the ordered teardown of everything a
//! dead process left behind.

use core::time::Duration;
use std::time::Instant;

use membus_bb_log::{debug, fail, warn};
use membus_bb_posix::process::ProcessId;
use membus_bb_posix::unix_datagram_socket::{UnixDatagramSender, UnixDatagramSenderBuilder};

use crate::daemon::port_manager::PortManager;
use crate::runtime::ipc_message::IpcMessage;
use crate::version::VersionInfo;

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ProcessRegistrationError {
    /// A monitored process with the same name is still alive; the stale record is removed
    /// by the monitoring pass, not by a new registration.
    ProcessAlreadyRegistered,
    ProcessListFull,
    /// The client speaks an incompatible protocol version.
    VersionMismatch,
    /// The inbox socket of the process could not be connected.
    InboxNotReachable,
}

/// One registered client process.
#[derive(Debug)]
pub struct ProcessRecord {
    runtime_name: String,
    pid: ProcessId,
    is_monitored: bool,
    last_keep_alive: Instant,
    session_id: u64,
    version: VersionInfo,
    sender: UnixDatagramSender,
}

impl ProcessRecord {
    pub fn runtime_name(&self) -> &str {
        &self.runtime_name
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn is_monitored(&self) -> bool {
        self.is_monitored
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn version(&self) -> &VersionInfo {
        &self.version
    }

    /// Sends a frame to the inbox of the process.
    pub fn send(&self, message: &IpcMessage) -> bool {
        self.sender.try_send(&message.to_bytes()).unwrap_or(false)
    }
}

/// Owns the records of all registered client processes. Daemon-local, mutated by the ipc
/// request thread and read by the monitoring pass under the daemon's state lock.
#[derive(Debug)]
pub struct ProcessManager {
    processes: Vec<ProcessRecord>,
    next_session_id: u64,
    max_processes: usize,
    keep_alive_timeout: Duration,
}

impl ProcessManager {
    pub fn new(max_processes: usize, keep_alive_timeout: Duration) -> Self {
        Self {
            processes: Vec::new(),
            next_session_id: 1,
            max_processes,
            keep_alive_timeout,
        }
    }

    pub fn processes(&self) -> &[ProcessRecord] {
        &self.processes
    }

    pub fn process(&self, runtime_name: &str) -> Option<&ProcessRecord> {
        self.processes
            .iter()
            .find(|process| process.runtime_name == runtime_name)
    }

    /// Registers a process. A name collision with an unmonitored record is resolved by
    /// removing the stale record together with its ports; a collision with a monitored
    /// record is rejected since the monitoring pass is responsible for reaping it.
    pub fn register_process(
        &mut self,
        port_manager: &mut PortManager,
        runtime_name: &str,
        pid: ProcessId,
        is_monitored: bool,
        version: VersionInfo,
    ) -> Result<&ProcessRecord, ProcessRegistrationError> {
        let msg = "Unable to register the process";

        let daemon_version = VersionInfo::current();
        if !daemon_version.is_compatible_to(&version) {
            fail!(from self, with ProcessRegistrationError::VersionMismatch,
                "{} \"{}\" since it speaks version {} but the daemon requires {}.",
                msg, runtime_name, version, daemon_version);
        }

        if !daemon_version.is_same_build_as(&version) {
            debug!(from self,
                "The process \"{}\" runs the compatible build {} while the daemon runs {}.",
                runtime_name, version, daemon_version);
        }

        if let Some(index) = self
            .processes
            .iter()
            .position(|process| process.runtime_name == runtime_name)
        {
            if self.processes[index].is_monitored {
                fail!(from self, with ProcessRegistrationError::ProcessAlreadyRegistered,
                    "{} \"{}\" since a monitored process with the same name is registered; \
                    its termination was not detected yet.", msg, runtime_name);
            }

            warn!(from self,
                "The unmonitored process \"{}\" is registered again, removing its previous ports.",
                runtime_name);
            port_manager.delete_ports_of_process(runtime_name);
            self.processes.remove(index);
        }

        if self.processes.len() == self.max_processes {
            fail!(from self, with ProcessRegistrationError::ProcessListFull,
                "{} \"{}\" since the limit of {} processes is reached.",
                msg, runtime_name, self.max_processes);
        }

        let sender = fail!(from self,
            when UnixDatagramSenderBuilder::new(runtime_name).create(),
            with ProcessRegistrationError::InboxNotReachable,
            "{} \"{}\" since its inbox socket could not be connected.", msg, runtime_name);

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        self.processes.push(ProcessRecord {
            runtime_name: runtime_name.to_string(),
            pid,
            is_monitored,
            last_keep_alive: Instant::now(),
            session_id,
            version,
            sender,
        });

        debug!(from self, "registered process \"{}\" with pid {}", runtime_name, pid);
        Ok(self.processes.last().expect("the record was just added"))
    }

    /// Removes a process record together with all its ports. Returns false when no record
    /// with the name exists.
    pub fn unregister_process(
        &mut self,
        port_manager: &mut PortManager,
        runtime_name: &str,
    ) -> bool {
        match self
            .processes
            .iter()
            .position(|process| process.runtime_name == runtime_name)
        {
            Some(index) => {
                port_manager.delete_ports_of_process(runtime_name);
                self.processes.remove(index);
                debug!(from self, "unregistered process \"{}\"", runtime_name);
                true
            }
            None => false,
        }
    }

    /// Refreshes the keep-alive timestamp of a process. Returns false when no record with
    /// the name exists.
    pub fn update_liveliness(&mut self, runtime_name: &str) -> bool {
        match self
            .processes
            .iter_mut()
            .find(|process| process.runtime_name == runtime_name)
        {
            Some(process) => {
                process.last_keep_alive = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Flags the ports of every monitored process which missed its keep-alive deadline
    /// for destruction and removes the process record. The next discovery pass tears the
    /// ports down.
    pub fn monitor_processes(&mut self, port_manager: &mut PortManager) {
        let now = Instant::now();
        let keep_alive_timeout = self.keep_alive_timeout;

        let mut index = 0;
        while index < self.processes.len() {
            let process = &self.processes[index];
            if process.is_monitored
                && now.duration_since(process.last_keep_alive) > keep_alive_timeout
            {
                warn!(from self,
                    "The process \"{}\" (pid {}) missed its keep alive deadline, removing it.",
                    process.runtime_name, process.pid);

                port_manager.mark_ports_of_process(&process.runtime_name);
                self.processes.remove(index);
                continue;
            }
            index += 1;
        }
    }

    /// Sends a frame to the inbox of every registered process.
    pub fn broadcast(&self, message: &IpcMessage) {
        for process in &self.processes {
            if !process.send(message) {
                warn!(from self,
                    "Unable to deliver a {:?} frame to the process \"{}\".",
                    message.message_type(), process.runtime_name);
            }
        }
    }

    /// Removes every process record, used on daemon shutdown after the clients were
    /// terminated.
    pub fn remove_all_processes(&mut self, port_manager: &mut PortManager) {
        while let Some(process) = self.processes.pop() {
            port_manager.delete_ports_of_process(&process.runtime_name);
        }
    }
}
