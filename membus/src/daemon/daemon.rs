// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The daemon process: creates the shared memory segments, serves the ipc requests of the
//! clients and runs the periodic discovery and monitoring pass. One daemon runs per host.

#![allow(clippy::module_inception)]

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use membus_bb_elementary::enum_gen;
use membus_bb_elementary::lazy_singleton::LazySingleton;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_elementary::segment_registry::SegmentRegistry;
use membus_bb_elementary::unique_id::UniqueId;
use membus_bb_log::{debug, error, fail, info, warn};
use membus_bb_posix::creation_mode::CreationMode;
use membus_bb_posix::permission::Permission;
use membus_bb_posix::process::{Process, ProcessId, Signal};
use membus_bb_posix::shared_memory::SharedMemoryCreationError;
use membus_bb_posix::signal;
use membus_bb_posix::unix_datagram_socket::{
    UnixDatagramCreationError, UnixDatagramReceiver, UnixDatagramReceiverBuilder,
    UnixDatagramSenderBuilder,
};

use crate::config::Config;
use crate::constants::{
    DATA_SEGMENT_ID, IPC_RECEIVE_TIMEOUT, MANAGEMENT_SEGMENT_ID, MAX_PROCESSES,
};
use crate::daemon::memory::{
    MemoryBlock, MemoryManagerMemoryBlock, MemoryProvider, PortPoolMemoryBlock,
};
use crate::daemon::port_manager::{PortCreationError, PortManager};
use crate::daemon::port_pool::PortPool;
use crate::daemon::process_manager::{ProcessManager, ProcessRegistrationError};
use crate::discovery::service_descriptor::{
    ServiceDescriptor, SourceInterface, WILDCARD,
};
use crate::port::base_port::RuntimeName;
use crate::port::options::{NodeName, PublisherOptions, SubscriberOptions};
use crate::runtime::ipc_message::{
    IpcMessage, IpcMessageErrorType, IpcMessageType,
};
use crate::version::VersionInfo;

/// The daemon's own identity, shared with the clients through the port pool so stale
/// segments of a previous daemon incarnation can be told apart. Initialize-once; a second
/// daemon in the same process is an error.
static DAEMON_ID: LazySingleton<u64> = LazySingleton::<u64>::new();

enum_gen! {
    /// Failures when creating a [`Daemon`] with the [`DaemonBuilder`].
    DaemonCreationError

  entry:
    DaemonAlreadyRunningInProcess,
    SegmentRegistrationFailed

  mapping:
    SharedMemoryCreationError,
    UnixDatagramCreationError
}

/// Builder for the [`Daemon`].
#[derive(Debug, Default)]
pub struct DaemonBuilder {
    config: Option<Config>,
}

impl DaemonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the provided configuration instead of the global one.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn create(self) -> Result<Daemon, DaemonCreationError> {
        let mut config = self
            .config
            .unwrap_or_else(|| Config::global_config().clone());
        config.memory.optimize();
        Daemon::new(config)
    }
}

struct DaemonState {
    port_manager: PortManager,
    process_manager: ProcessManager,
}

// the raw port pointers inside the PortManager refer into the management segment which
// lives as long as the daemon
unsafe impl Send for DaemonState {}

/// The central daemon. Owns the management and the data segment, the well-known ipc
/// channel and the discovery machinery.
pub struct Daemon {
    config: Config,
    management_provider: MemoryProvider,
    data_provider: MemoryProvider,
    port_pool_block: PortPoolMemoryBlock,
    memory_manager_block: MemoryManagerMemoryBlock,
    receiver: UnixDatagramReceiver,
    state: Arc<Mutex<DaemonState>>,
    shutdown: Arc<AtomicBool>,
    segments_destroyed: bool,
}

impl core::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Daemon {{ name: {} }}", self.config.daemon.name)
    }
}

impl Daemon {
    fn new(config: Config) -> Result<Daemon, DaemonCreationError> {
        let msg = "Unable to create the daemon";
        let origin = "Daemon::new()";

        let daemon_id = UniqueId::new().value();
        if !DAEMON_ID.set_value(daemon_id) {
            fail!(from origin, with DaemonCreationError::DaemonAlreadyRunningInProcess,
                "{} since another daemon is already running in this process.", msg);
        }

        let segment_permission = Permission::OWNER_ALL | Permission::GROUP_ALL;

        // management segment with the port pool
        let mut management_provider = MemoryProvider::new();
        let mut port_pool_block = PortPoolMemoryBlock::new(daemon_id);
        fail!(from origin,
            when management_provider.create_and_announce(
                &config.management_segment_name(),
                segment_permission,
                &mut [&mut port_pool_block as &mut dyn MemoryBlock],
            ),
            to DaemonCreationError,
            "{} since the management segment could not be created.", msg);

        // data segment with the mempools
        let mut data_provider = MemoryProvider::new();
        let mut memory_manager_block =
            MemoryManagerMemoryBlock::new(config.memory.entries.clone());
        fail!(from origin,
            when data_provider.create_and_announce(
                &config.data_segment_name(),
                segment_permission,
                &mut [&mut memory_manager_block as &mut dyn MemoryBlock],
            ),
            to DaemonCreationError,
            "{} since the data segment could not be created.", msg);

        let registry = SegmentRegistry::instance();
        let management_segment = management_provider.segment().expect("announced above");
        let data_segment = data_provider.segment().expect("announced above");
        if registry
            .register(
                MANAGEMENT_SEGMENT_ID,
                management_segment.base_address().as_ptr() as usize,
                management_segment.size(),
            )
            .is_err()
            || registry
                .register(
                    DATA_SEGMENT_ID,
                    data_segment.base_address().as_ptr() as usize,
                    data_segment.size(),
                )
                .is_err()
        {
            fail!(from origin, with DaemonCreationError::SegmentRegistrationFailed,
                "{} since the segments could not be registered in this process.", msg);
        }

        let receiver = fail!(from origin,
            when UnixDatagramReceiverBuilder::new(config.daemon_socket_name())
                .creation_mode(CreationMode::PurgeAndCreate)
                .create(),
            to DaemonCreationError,
            "{} since the well-known ipc channel could not be created.", msg);

        let port_pool = unsafe {
            PortPool::new(port_pool_block.port_pool().expect("announced above"))
        };
        let memory_manager = RelativePointer::from_ptr(
            memory_manager_block
                .memory_manager()
                .expect("announced above")
                .as_ptr() as *const _,
        );

        let state = DaemonState {
            port_manager: PortManager::new(port_pool, memory_manager),
            process_manager: ProcessManager::new(
                MAX_PROCESSES,
                config.daemon.keep_alive_timeout(),
            ),
        };

        info!(from origin, "daemon \"{}\" is up", config.daemon.name);
        Ok(Daemon {
            config,
            management_provider,
            data_provider,
            port_pool_block,
            memory_manager_block,
            receiver,
            state: Arc::new(Mutex::new(state)),
            shutdown: Arc::new(AtomicBool::new(false)),
            segments_destroyed: false,
        })
    }

    /// Serves ipc requests and runs the periodic discovery pass until a termination
    /// signal arrives, then shuts every client down in order and removes all resources.
    pub fn run(&mut self) {
        signal::register_termination_handler();

        let state = Arc::clone(&self.state);
        let shutdown = Arc::clone(&self.shutdown);
        let discovery_interval = self.config.daemon.discovery_interval();

        let discovery_thread = std::thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                {
                    let mut state = state.lock().expect("the daemon state lock is not poisoned");
                    let DaemonState {
                        port_manager,
                        process_manager,
                    } = &mut *state;
                    process_manager.monitor_processes(port_manager);
                    port_manager.do_discovery();
                }
                std::thread::sleep(discovery_interval);
            }
        });

        let mut buffer = [0u8; membus_bb_posix::config::MAX_DATAGRAM_SIZE];
        while !signal::termination_requested() {
            match self.receiver.timed_receive(&mut buffer, IPC_RECEIVE_TIMEOUT) {
                Ok(0) => (),
                Ok(len) => self.handle_request(&buffer[..len]),
                Err(_) => break,
            }
        }

        self.shutdown.store(true, Ordering::Relaxed);
        discovery_thread
            .join()
            .expect("the discovery thread does not panic");

        self.shutdown_clients();
        self.destroy_segments();
    }

    /// Requests a graceful shutdown, can be called from any thread.
    pub fn request_shutdown(&self) {
        signal::set_termination_requested(true);
    }

    fn handle_request(&mut self, bytes: &[u8]) {
        let message = match IpcMessage::from_bytes(bytes) {
            Ok(message) => message,
            Err(_) => {
                warn!(from self, "Discarding an unparsable ipc frame.");
                return;
            }
        };

        let message_type = match message.message_type() {
            Some(message_type) => message_type,
            None => {
                warn!(from self, "Discarding an ipc frame with an unknown message type.");
                return;
            }
        };

        let payload = message.payload();
        if payload.is_empty() {
            warn!(from self, "Discarding a {:?} frame without a runtime name.", message_type);
            return;
        }
        let runtime_name = payload[0].to_string();

        let reply = match message_type {
            IpcMessageType::Reg => self.on_register(&runtime_name, &payload),
            IpcMessageType::CreatePublisher => self.on_create_publisher(&runtime_name, &payload),
            IpcMessageType::CreateSubscriber => self.on_create_subscriber(&runtime_name, &payload),
            IpcMessageType::CreateInterface => self.on_create_interface(&runtime_name, &payload),
            IpcMessageType::CreateApplication => self.on_create_application(&runtime_name),
            IpcMessageType::CreateNode => self.on_create_node(&runtime_name, &payload),
            IpcMessageType::CreateConditionVariable => {
                self.on_create_condition_variable(&runtime_name)
            }
            IpcMessageType::FindService => self.on_find_service(&payload),
            IpcMessageType::Keepalive => {
                self.state
                    .lock()
                    .expect("the daemon state lock is not poisoned")
                    .process_manager
                    .update_liveliness(&runtime_name);
                None
            }
            IpcMessageType::TerminationAck => {
                let mut state = self
                    .state
                    .lock()
                    .expect("the daemon state lock is not poisoned");
                let DaemonState {
                    port_manager,
                    process_manager,
                } = &mut *state;
                process_manager.unregister_process(port_manager, &runtime_name);
                None
            }
            _ => {
                warn!(from self, "Received the unsupported request {:?}.", message_type);
                Some(IpcMessage::new_error(IpcMessageErrorType::MessageNotSupported))
            }
        };

        if let Some(reply) = reply {
            self.send_reply(&runtime_name, &reply);
        }
    }

    /// Delivers a reply to the inbox of the requesting process, falling back to an
    /// ad-hoc connection when the process is not (yet) registered.
    fn send_reply(&self, runtime_name: &str, reply: &IpcMessage) {
        let state = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned");
        if let Some(process) = state.process_manager.process(runtime_name) {
            if !process.send(reply) {
                warn!(from self, "Unable to reply to the process \"{}\".", runtime_name);
            }
            return;
        }
        drop(state);

        match UnixDatagramSenderBuilder::new(runtime_name).create() {
            Ok(sender) => {
                sender.try_send(&reply.to_bytes()).ok();
            }
            Err(_) => {
                warn!(from self,
                    "Unable to reply to the unregistered process \"{}\".", runtime_name);
            }
        }
    }

    fn on_register(&mut self, runtime_name: &str, payload: &[&str]) -> Option<IpcMessage> {
        // REG | runtime name | pid | uid | monitored | transmission ts
        //     | version major | version minor | version patch | commit tag
        if payload.len() != 9 {
            return Some(IpcMessage::new_error(IpcMessageErrorType::RegistrationFailed));
        }

        let pid = payload[1].parse::<i32>().ok()?;
        let is_monitored = payload[3] == "1";
        let transmission_timestamp = payload[4].to_string();
        let version = match VersionInfo::deserialize(&payload[5..9]) {
            Ok(version) => version,
            Err(_) => {
                return Some(IpcMessage::new_error(IpcMessageErrorType::RegistrationFailed));
            }
        };

        let mut state = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned");
        let DaemonState {
            port_manager,
            process_manager,
        } = &mut *state;

        let session_id = match process_manager.register_process(
            port_manager,
            runtime_name,
            ProcessId::new(pid),
            is_monitored,
            version,
        ) {
            Ok(record) => record.session_id(),
            Err(ProcessRegistrationError::VersionMismatch) => {
                return Some(IpcMessage::new_error(IpcMessageErrorType::VersionMismatch));
            }
            Err(_) => {
                return Some(IpcMessage::new_error(IpcMessageErrorType::RegistrationFailed));
            }
        };
        drop(state);

        let management_segment = self.management_provider.segment().expect("created at startup");
        let data_segment = self.data_provider.segment().expect("created at startup");

        let mut reply = IpcMessage::new(IpcMessageType::RegAck);
        reply
            .add(management_segment.size())
            .add(MANAGEMENT_SEGMENT_ID.value())
            .add(data_segment.size())
            .add(DATA_SEGMENT_ID.value())
            .add(transmission_timestamp)
            .add(session_id);
        Some(reply)
    }

    fn management_offset_of<T>(&self, ptr: NonNull<T>) -> u64 {
        let base = self
            .management_provider
            .segment()
            .expect("created at startup")
            .base_address()
            .as_ptr() as usize;
        (ptr.as_ptr() as usize - base) as u64
    }

    fn port_reply<T>(&self, ack: IpcMessageType, port: NonNull<T>) -> IpcMessage {
        let mut reply = IpcMessage::new(ack);
        reply
            .add(self.management_offset_of(port))
            .add(MANAGEMENT_SEGMENT_ID.value());
        reply
    }

    fn require_registered(&self, runtime_name: &str) -> bool {
        self.state
            .lock()
            .expect("the daemon state lock is not poisoned")
            .process_manager
            .process(runtime_name)
            .is_some()
    }

    fn on_create_publisher(&mut self, runtime_name: &str, payload: &[&str]) -> Option<IpcMessage> {
        // CREATE_PUBLISHER | runtime name | service | instance | event | options..
        if payload.len() != 8 || !self.require_registered(runtime_name) {
            return Some(IpcMessage::new_error(IpcMessageErrorType::MessageNotSupported));
        }

        let service = ServiceDescriptor::new(
            payload[1].as_bytes(),
            payload[2].as_bytes(),
            payload[3].as_bytes(),
        )
        .ok()?;
        let options = PublisherOptions::deserialize(&payload[4..8]).ok()?;
        let runtime = RuntimeName::from_bytes_truncated(runtime_name.as_bytes());

        let result = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned")
            .port_manager
            .acquire_publisher_port_data(&service, &options, &runtime);

        Some(match result {
            Ok(port) => self.port_reply(IpcMessageType::CreatePublisherAck, port),
            Err(PortCreationError::NoUniqueCreated) => {
                IpcMessage::new_error(IpcMessageErrorType::NoUniqueCreated)
            }
            Err(_) => IpcMessage::new_error(IpcMessageErrorType::PublisherListFull),
        })
    }

    fn on_create_subscriber(&mut self, runtime_name: &str, payload: &[&str]) -> Option<IpcMessage> {
        // CREATE_SUBSCRIBER | runtime name | service | instance | event | options..
        if payload.len() != 10 || !self.require_registered(runtime_name) {
            return Some(IpcMessage::new_error(IpcMessageErrorType::MessageNotSupported));
        }

        let service = ServiceDescriptor::new(
            payload[1].as_bytes(),
            payload[2].as_bytes(),
            payload[3].as_bytes(),
        )
        .ok()?;
        let options = SubscriberOptions::deserialize(&payload[4..10]).ok()?;
        let runtime = RuntimeName::from_bytes_truncated(runtime_name.as_bytes());

        let result = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned")
            .port_manager
            .acquire_subscriber_port_data(&service, &options, &runtime);

        Some(match result {
            Ok(port) => self.port_reply(IpcMessageType::CreateSubscriberAck, port),
            Err(_) => IpcMessage::new_error(IpcMessageErrorType::SubscriberListFull),
        })
    }

    fn on_create_interface(&mut self, runtime_name: &str, payload: &[&str]) -> Option<IpcMessage> {
        // CREATE_INTERFACE | runtime name | source interface
        if payload.len() != 2 || !self.require_registered(runtime_name) {
            return Some(IpcMessage::new_error(IpcMessageErrorType::MessageNotSupported));
        }

        let source_interface = payload[1]
            .parse::<u32>()
            .ok()
            .and_then(SourceInterface::from_u32)?;
        let runtime = RuntimeName::from_bytes_truncated(runtime_name.as_bytes());

        let result = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned")
            .port_manager
            .acquire_interface_port_data(&runtime, source_interface);

        Some(match result {
            Ok(port) => self.port_reply(IpcMessageType::CreateInterfaceAck, port),
            Err(_) => IpcMessage::new_error(IpcMessageErrorType::InterfaceListFull),
        })
    }

    fn on_create_application(&mut self, runtime_name: &str) -> Option<IpcMessage> {
        if !self.require_registered(runtime_name) {
            return Some(IpcMessage::new_error(IpcMessageErrorType::MessageNotSupported));
        }
        let runtime = RuntimeName::from_bytes_truncated(runtime_name.as_bytes());

        let result = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned")
            .port_manager
            .acquire_application_port_data(&runtime);

        Some(match result {
            Ok(port) => self.port_reply(IpcMessageType::CreateApplicationAck, port),
            Err(_) => IpcMessage::new_error(IpcMessageErrorType::ApplicationListFull),
        })
    }

    fn on_create_node(&mut self, runtime_name: &str, payload: &[&str]) -> Option<IpcMessage> {
        // CREATE_NODE | runtime name | node name
        if payload.len() != 2 || !self.require_registered(runtime_name) {
            return Some(IpcMessage::new_error(IpcMessageErrorType::MessageNotSupported));
        }
        let runtime = RuntimeName::from_bytes_truncated(runtime_name.as_bytes());
        let node_name = NodeName::from_bytes_truncated(payload[1].as_bytes());

        let result = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned")
            .port_manager
            .acquire_node_data(&runtime, &node_name);

        Some(match result {
            Ok(node) => self.port_reply(IpcMessageType::CreateNodeAck, node),
            Err(_) => IpcMessage::new_error(IpcMessageErrorType::NodeDataListFull),
        })
    }

    fn on_create_condition_variable(&mut self, runtime_name: &str) -> Option<IpcMessage> {
        if !self.require_registered(runtime_name) {
            return Some(IpcMessage::new_error(IpcMessageErrorType::MessageNotSupported));
        }
        let runtime = RuntimeName::from_bytes_truncated(runtime_name.as_bytes());

        let result = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned")
            .port_manager
            .acquire_condition_variable_data(&runtime);

        Some(match result {
            Ok(condition_variable) => {
                self.port_reply(IpcMessageType::CreateConditionVariableAck, condition_variable)
            }
            Err(_) => IpcMessage::new_error(IpcMessageErrorType::ConditionVariableListFull),
        })
    }

    fn on_find_service(&mut self, payload: &[&str]) -> Option<IpcMessage> {
        // FIND_SERVICE | runtime name | service | instance
        if payload.len() != 3 {
            return Some(IpcMessage::new_error(IpcMessageErrorType::MessageNotSupported));
        }

        let to_key = |field: &str| -> Option<Vec<u8>> {
            match field.as_bytes() == WILDCARD {
                true => None,
                false => Some(field.as_bytes().to_vec()),
            }
        };
        let service = to_key(payload[1]);
        let instance = to_key(payload[2]);

        let services = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned")
            .port_manager
            .find_service(service.as_deref(), instance.as_deref());

        let mut reply = IpcMessage::new(IpcMessageType::FindServiceAck);
        reply.add(services.len());
        for service in services {
            reply
                .add(service.service())
                .add(service.instance())
                .add(service.event());
        }
        Some(reply)
    }

    /// The shutdown ladder: ask every client to terminate, wait for acknowledgements,
    /// escalate to SIGTERM and finally SIGKILL. All shared resources are released
    /// afterwards no matter how the clients behaved.
    fn shutdown_clients(&mut self) {
        let termination_request = IpcMessage::new(IpcMessageType::PrepareAppTermination);
        {
            let state = self
                .state
                .lock()
                .expect("the daemon state lock is not poisoned");
            if state.process_manager.processes().is_empty() {
                return;
            }
            state.process_manager.broadcast(&termination_request);
        }

        // collect acknowledgements until every client answered or the timeout elapsed
        let deadline = Instant::now() + self.config.daemon.termination_ack_timeout();
        let mut buffer = [0u8; membus_bb_posix::config::MAX_DATAGRAM_SIZE];
        while Instant::now() < deadline {
            {
                let state = self
                    .state
                    .lock()
                    .expect("the daemon state lock is not poisoned");
                if state.process_manager.processes().is_empty() {
                    break;
                }
            }

            let len = self
                .receiver
                .timed_receive(&mut buffer, IPC_RECEIVE_TIMEOUT)
                .unwrap_or(0);
            if len == 0 {
                continue;
            }

            if let Ok(message) = IpcMessage::from_bytes(&buffer[..len]) {
                let is_termination_ack = matches!(
                    message.message_type(),
                    Some(IpcMessageType::PrepareAppTerminationAck)
                        | Some(IpcMessageType::TerminationAck)
                );
                if is_termination_ack {
                    if let Some(runtime_name) = message.payload().first() {
                        let mut state = self
                            .state
                            .lock()
                            .expect("the daemon state lock is not poisoned");
                        let DaemonState {
                            port_manager,
                            process_manager,
                        } = &mut *state;
                        process_manager.unregister_process(port_manager, runtime_name);
                    }
                }
            }
        }

        let mut state = self
            .state
            .lock()
            .expect("the daemon state lock is not poisoned");
        let DaemonState {
            port_manager,
            process_manager,
        } = &mut *state;

        for process in process_manager.processes() {
            warn!(from self,
                "The process \"{}\" did not acknowledge the termination, sending SIGTERM.",
                process.runtime_name());
            Process::from_pid(process.pid()).send_signal(Signal::Terminate).ok();
        }

        let sigterm_deadline = Instant::now() + self.config.daemon.termination_ack_timeout();
        while Instant::now() < sigterm_deadline {
            if process_manager
                .processes()
                .iter()
                .all(|process| !Process::from_pid(process.pid()).is_alive())
            {
                break;
            }
            std::thread::sleep(core::time::Duration::from_millis(10));
        }

        for process in process_manager.processes() {
            let process_handle = Process::from_pid(process.pid());
            if process_handle.is_alive() {
                error!(from self,
                    "The process \"{}\" ignored SIGTERM, sending SIGKILL.",
                    process.runtime_name());
                process_handle.send_signal(Signal::Kill).ok();
            }
        }

        process_manager.remove_all_processes(port_manager);
        port_manager.do_discovery();
        debug!(from self, "all clients are shut down");
    }

    fn destroy_segments(&mut self) {
        if self.segments_destroyed {
            return;
        }
        self.segments_destroyed = true;

        let registry = SegmentRegistry::instance();
        self.data_provider
            .destroy_and_remove(&mut [&mut self.memory_manager_block as &mut dyn MemoryBlock]);
        registry.unregister(DATA_SEGMENT_ID);
        self.management_provider
            .destroy_and_remove(&mut [&mut self.port_pool_block as &mut dyn MemoryBlock]);
        registry.unregister(MANAGEMENT_SEGMENT_ID);
        info!(from self, "daemon \"{}\" is down", self.config.daemon.name);
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.destroy_segments();
    }
}
