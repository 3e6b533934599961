// Copyright (c) 2024 Contributors to the membus project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-process client runtime. On creation it registers with the daemon, maps the
//! shared memory segments and starts the keep-alive thread; afterwards it creates ports on
//! behalf of the user.
//!
//! When the daemon dies while the client is running every request times out with
//! [`RequestError::DaemonUnreachable`]; already created ports keep operating on the still
//! mapped shared memory but no new discovery events are delivered.
//!
//! # Example
//!
//! ```no_run
//! use membus::discovery::service_descriptor::ServiceDescriptor;
//! use membus::port::options::PublisherOptions;
//! use membus::runtime::runtime::Runtime;
//!
//! let runtime = Runtime::new("my_app").unwrap();
//!
//! let service = ServiceDescriptor::new(b"Radar", b"FrontRight", b"Objects").unwrap();
//! let publisher = runtime
//!     .create_publisher(&service, &PublisherOptions::default())
//!     .unwrap();
//!
//! let mut chunk = publisher.try_allocate_chunk(256).unwrap();
//! chunk.write_payload(b"hello");
//! publisher.send_chunk(chunk, None).unwrap();
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use membus_bb_elementary::enum_gen;
use membus_bb_elementary::relative_ptr::RelativePointer;
use membus_bb_elementary::segment_registry::{SegmentId, SegmentRegistry};
use membus_bb_log::{debug, fail, trace, warn};
use membus_bb_posix::creation_mode::CreationMode;
use membus_bb_posix::process::{current_user_id, Process};
use membus_bb_posix::shared_memory::{
    SharedMemory, SharedMemoryBuilder, SharedMemoryCreationError,
};
use membus_bb_posix::unix_datagram_socket::{
    UnixDatagramCreationError, UnixDatagramReceiver, UnixDatagramReceiverBuilder,
    UnixDatagramSender, UnixDatagramSenderBuilder,
};

use crate::config::Config;
use crate::constants::IPC_REQUEST_TIMEOUT;
use crate::daemon::port_pool::PortPoolData;
use crate::discovery::service_descriptor::{ServiceDescriptor, SourceInterface, WILDCARD};
use crate::memory::chunk_header::current_time_millis;
use crate::port::application::ApplicationPort;
use crate::port::condition_variable::ConditionVariableData;
use crate::port::interface::InterfacePort;
use crate::port::node::NodeData;
use crate::port::options::{PublisherOptions, SubscriberOptions};
use crate::port::publisher::PublisherPortUser;
use crate::port::subscriber::SubscriberPortUser;
use crate::runtime::ipc_message::{IpcMessage, IpcMessageErrorType, IpcMessageType};
use crate::version::VersionInfo;

enum_gen! {
    /// Failures when creating a [`Runtime`].
    RuntimeCreationError

  entry:
    DaemonUnreachable,
    RegistrationRejected,
    InvalidRegistrationResponse

  mapping:
    UnixDatagramCreationError,
    SharedMemoryCreationError
}

/// Failures of a single request/response cycle with the daemon.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum RequestError {
    /// The daemon did not answer within the request timeout. The runtime is degraded:
    /// existing ports keep working but no new discovery events arrive.
    DaemonUnreachable,
    /// The daemon rejected the request with the contained error kind.
    RequestRejected(IpcMessageErrorType),
    InvalidResponse,
}

/// The per-process access point to the daemon.
#[derive(Debug)]
pub struct Runtime {
    runtime_name: String,
    config: Config,
    channel: Mutex<RequestChannel>,
    management_segment: SharedMemory,
    _data_segment: SharedMemory,
    session_id: u64,
    keep_alive_stop: Arc<AtomicBool>,
    keep_alive_thread: Option<std::thread::JoinHandle<()>>,
}

#[derive(Debug)]
struct RequestChannel {
    sender: UnixDatagramSender,
    inbox: UnixDatagramReceiver,
}

impl RequestChannel {
    /// Sends a request and waits for a reply of the expected type. Unrelated frames which
    /// arrive in between are answered where necessary and skipped.
    fn request(
        &mut self,
        runtime_name: &str,
        request: &IpcMessage,
        expected: IpcMessageType,
    ) -> Result<IpcMessage, RequestError> {
        let origin = "RequestChannel::request()";
        if !self.sender.try_send(&request.to_bytes()).unwrap_or(false) {
            fail!(from origin, with RequestError::DaemonUnreachable,
                "The request {:?} could not be delivered to the daemon.", request.message_type());
        }

        let deadline = Instant::now() + IPC_REQUEST_TIMEOUT;
        let mut buffer = [0u8; membus_bb_posix::config::MAX_DATAGRAM_SIZE];

        loop {
            let now = Instant::now();
            if now >= deadline {
                fail!(from origin, with RequestError::DaemonUnreachable,
                    "The daemon did not answer the request {:?} in time.", request.message_type());
            }

            let len = self
                .inbox
                .timed_receive(&mut buffer, deadline - now)
                .unwrap_or(0);
            if len == 0 {
                continue;
            }

            let response = match IpcMessage::from_bytes(&buffer[..len]) {
                Ok(response) => response,
                Err(_) => continue,
            };

            match response.message_type() {
                Some(message_type) if message_type == expected => return Ok(response),
                Some(IpcMessageType::Error) => {
                    let error = response
                        .payload()
                        .first()
                        .and_then(|kind| IpcMessageErrorType::from_str(kind))
                        .ok_or(RequestError::InvalidResponse)?;
                    fail!(from origin, with RequestError::RequestRejected(error),
                        "The daemon rejected the request {:?} with {:?}.",
                        request.message_type(), error);
                }
                Some(IpcMessageType::PrepareAppTermination) => {
                    let mut ack = IpcMessage::new(IpcMessageType::PrepareAppTerminationAck);
                    ack.add(runtime_name);
                    self.sender.try_send(&ack.to_bytes()).ok();
                }
                _ => {
                    warn!(from origin,
                        "Skipping the unexpected frame {:?} while waiting for {:?}.",
                        response.message_type(), expected);
                }
            }
        }
    }
}

impl Runtime {
    /// Registers the process under `runtime_name` with the daemon of the global
    /// configuration.
    pub fn new(runtime_name: &str) -> Result<Runtime, RuntimeCreationError> {
        Self::with_config(runtime_name, Config::global_config().clone())
    }

    /// Registers the process under `runtime_name` with the daemon of the provided
    /// configuration.
    pub fn with_config(
        runtime_name: &str,
        config: Config,
    ) -> Result<Runtime, RuntimeCreationError> {
        let msg = "Unable to create the runtime";
        let origin = "Runtime::new()";

        let inbox = fail!(from origin,
            when UnixDatagramReceiverBuilder::new(runtime_name)
                .creation_mode(CreationMode::PurgeAndCreate)
                .create(),
            to RuntimeCreationError,
            "{} since the inbox socket could not be created.", msg);

        let sender = fail!(from origin,
            when UnixDatagramSenderBuilder::new(config.daemon_socket_name()).create(),
            with RuntimeCreationError::DaemonUnreachable,
            "{} since the daemon's ipc channel could not be connected.", msg);

        let mut channel = RequestChannel { sender, inbox };

        // REG | runtime name | pid | uid | monitored | transmission ts | version info
        let mut registration = IpcMessage::new(IpcMessageType::Reg);
        registration
            .add(runtime_name)
            .add(Process::from_self().id())
            .add(current_user_id())
            .add(1)
            .add(current_time_millis());
        for entry in VersionInfo::current().serialize() {
            registration.add(entry);
        }

        let response = fail!(from origin,
            when channel.request(runtime_name, &registration, IpcMessageType::RegAck),
            with RuntimeCreationError::RegistrationRejected,
            "{} since the daemon rejected the registration.", msg);

        let payload = response.payload();
        if payload.len() != 6 {
            fail!(from origin, with RuntimeCreationError::InvalidRegistrationResponse,
                "{} since the registration response has {} instead of 6 fields.",
                msg, payload.len());
        }

        let parse = |field: &str| -> Result<u64, RuntimeCreationError> {
            match field.parse::<u64>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    fail!(from origin, with RuntimeCreationError::InvalidRegistrationResponse,
                        "{} since the registration response field \"{}\" is no number.",
                        msg, field);
                }
            }
        };
        let management_size = parse(payload[0])?;
        let management_segment_id = SegmentId::new(parse(payload[1])?);
        let data_size = parse(payload[2])?;
        let data_segment_id = SegmentId::new(parse(payload[3])?);
        let session_id = parse(payload[5])?;

        let management_segment = Self::attach_segment(
            &config.management_segment_name(),
            management_segment_id,
            management_size,
        )?;
        let data_segment =
            Self::attach_segment(&config.data_segment_name(), data_segment_id, data_size)?;

        let keep_alive_stop = Arc::new(AtomicBool::new(false));
        let keep_alive_thread = Self::start_keep_alive_thread(
            runtime_name,
            &config,
            Arc::clone(&keep_alive_stop),
        );

        trace!(from origin, "runtime \"{}\" is registered", runtime_name);
        Ok(Runtime {
            runtime_name: runtime_name.to_string(),
            config,
            channel: Mutex::new(channel),
            management_segment,
            _data_segment: data_segment,
            session_id,
            keep_alive_stop,
            keep_alive_thread: Some(keep_alive_thread),
        })
    }

    fn attach_segment(
        name: &str,
        segment_id: SegmentId,
        expected_size: u64,
    ) -> Result<SharedMemory, RuntimeCreationError> {
        let msg = "Unable to attach the segment";
        let origin = "Runtime::attach_segment()";

        let segment = fail!(from origin,
            when SharedMemoryBuilder::new(name).open(),
            to RuntimeCreationError,
            "{} \"{}\".", msg, name);

        if segment.size() as u64 != expected_size {
            fail!(from origin, with RuntimeCreationError::InvalidRegistrationResponse,
                "{} \"{}\" since its size {} differs from the announced size {}.",
                msg, name, segment.size(), expected_size);
        }

        fail!(from origin,
            when SegmentRegistry::instance().register(
                segment_id,
                segment.base_address().as_ptr() as usize,
                segment.size(),
            ),
            with RuntimeCreationError::InvalidRegistrationResponse,
            "{} \"{}\" since it could not be registered locally.", msg, name);

        Ok(segment)
    }

    fn start_keep_alive_thread(
        runtime_name: &str,
        config: &Config,
        stop: Arc<AtomicBool>,
    ) -> std::thread::JoinHandle<()> {
        let runtime_name = runtime_name.to_string();
        let daemon_socket_name = config.daemon_socket_name().to_string();
        let interval = config.daemon.keep_alive_interval();

        std::thread::spawn(move || {
            let mut keep_alive = IpcMessage::new(IpcMessageType::Keepalive);
            keep_alive.add(&runtime_name);
            let frame = keep_alive.to_bytes();

            while !stop.load(Ordering::Relaxed) {
                if let Ok(sender) = UnixDatagramSenderBuilder::new(&daemon_socket_name).create() {
                    while !stop.load(Ordering::Relaxed) {
                        if sender.try_send(&frame).is_err() {
                            break;
                        }
                        std::thread::sleep(interval);
                    }
                }

                if !stop.load(Ordering::Relaxed) {
                    // the daemon is gone, retry the connection with a coarse period
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        })
    }

    pub fn runtime_name(&self) -> &str {
        &self.runtime_name
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    fn port_pool_data(&self) -> &PortPoolData {
        // the port pool is the first payload of the management segment
        unsafe { &*(self.management_segment.base_address().as_ptr() as *const PortPoolData) }
    }

    /// The current service registry epoch. Advances with every offered or withdrawn
    /// service, polling it is cheaper than a find request.
    pub fn service_registry_epoch(&self) -> u64 {
        self.port_pool_data().service_registry_epoch()
    }

    fn request(
        &self,
        request: &IpcMessage,
        expected: IpcMessageType,
    ) -> Result<IpcMessage, RequestError> {
        self.channel
            .lock()
            .expect("the request channel lock is not poisoned")
            .request(&self.runtime_name, request, expected)
    }

    fn parse_port_response<T>(
        &self,
        response: &IpcMessage,
    ) -> Result<RelativePointer<T>, RequestError> {
        let payload = response.payload();
        if payload.len() != 2 {
            return Err(RequestError::InvalidResponse);
        }

        let offset = payload[0]
            .parse::<u64>()
            .map_err(|_| RequestError::InvalidResponse)?;
        let segment_id = payload[1]
            .parse::<u64>()
            .map_err(|_| RequestError::InvalidResponse)?;

        Ok(RelativePointer::new(SegmentId::new(segment_id), offset))
    }

    /// Asks the daemon to create a publisher port and wraps it into its user view.
    pub fn create_publisher(
        &self,
        service: &ServiceDescriptor,
        options: &PublisherOptions,
    ) -> Result<PublisherPortUser, RequestError> {
        let mut request = IpcMessage::new(IpcMessageType::CreatePublisher);
        request
            .add(&self.runtime_name)
            .add(service.service())
            .add(service.instance())
            .add(service.event());
        for entry in options.serialize() {
            request.add(entry);
        }

        let response = self.request(&request, IpcMessageType::CreatePublisherAck)?;
        Ok(PublisherPortUser::new(self.parse_port_response(&response)?))
    }

    /// Asks the daemon to create a subscriber port and wraps it into its user view.
    pub fn create_subscriber(
        &self,
        service: &ServiceDescriptor,
        options: &SubscriberOptions,
    ) -> Result<SubscriberPortUser, RequestError> {
        let mut request = IpcMessage::new(IpcMessageType::CreateSubscriber);
        request
            .add(&self.runtime_name)
            .add(service.service())
            .add(service.instance())
            .add(service.event());
        for entry in options.serialize() {
            request.add(entry);
        }

        let response = self.request(&request, IpcMessageType::CreateSubscriberAck)?;
        Ok(SubscriberPortUser::new(self.parse_port_response(&response)?))
    }

    /// Asks the daemon to create an interface port for the provided source interface.
    pub fn create_interface(
        &self,
        source_interface: SourceInterface,
    ) -> Result<InterfacePort, RequestError> {
        let mut request = IpcMessage::new(IpcMessageType::CreateInterface);
        request
            .add(&self.runtime_name)
            .add(source_interface as u32);

        let response = self.request(&request, IpcMessageType::CreateInterfaceAck)?;
        Ok(InterfacePort::from_relative(
            self.parse_port_response(&response)?,
        ))
    }

    /// Asks the daemon to create an application port.
    pub fn create_application(&self) -> Result<ApplicationPort, RequestError> {
        let mut request = IpcMessage::new(IpcMessageType::CreateApplication);
        request.add(&self.runtime_name);

        let response = self.request(&request, IpcMessageType::CreateApplicationAck)?;
        Ok(ApplicationPort::from_relative(
            self.parse_port_response(&response)?,
        ))
    }

    /// Asks the daemon to create a node record.
    pub fn create_node(&self, node_name: &str) -> Result<RelativePointer<NodeData>, RequestError> {
        let mut request = IpcMessage::new(IpcMessageType::CreateNode);
        request.add(&self.runtime_name).add(node_name);

        let response = self.request(&request, IpcMessageType::CreateNodeAck)?;
        self.parse_port_response(&response)
    }

    /// Asks the daemon to create a condition variable which can be attached to
    /// subscriber ports.
    pub fn create_condition_variable(
        &self,
    ) -> Result<RelativePointer<ConditionVariableData>, RequestError> {
        let mut request = IpcMessage::new(IpcMessageType::CreateConditionVariable);
        request.add(&self.runtime_name);

        let response = self.request(&request, IpcMessageType::CreateConditionVariableAck)?;
        self.parse_port_response(&response)
    }

    /// Searches the services known to the daemon. [`None`] behaves like the wildcard.
    pub fn find_service(
        &self,
        service: Option<&str>,
        instance: Option<&str>,
    ) -> Result<Vec<ServiceDescriptor>, RequestError> {
        let wildcard = core::str::from_utf8(WILDCARD).expect("the wildcard token is utf-8");
        let mut request = IpcMessage::new(IpcMessageType::FindService);
        request
            .add(&self.runtime_name)
            .add(service.unwrap_or(wildcard))
            .add(instance.unwrap_or(wildcard));

        let response = self.request(&request, IpcMessageType::FindServiceAck)?;
        let payload = response.payload();
        if payload.is_empty() {
            return Err(RequestError::InvalidResponse);
        }

        let count = payload[0]
            .parse::<usize>()
            .map_err(|_| RequestError::InvalidResponse)?;
        if payload.len() != 1 + count * 3 {
            return Err(RequestError::InvalidResponse);
        }

        let mut services = Vec::with_capacity(count);
        for triple in payload[1..].chunks(3) {
            services.push(
                ServiceDescriptor::new(
                    triple[0].as_bytes(),
                    triple[1].as_bytes(),
                    triple[2].as_bytes(),
                )
                .map_err(|_| RequestError::InvalidResponse)?,
            );
        }
        Ok(services)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.keep_alive_stop.store(true, Ordering::Relaxed);
        if let Some(keep_alive_thread) = self.keep_alive_thread.take() {
            keep_alive_thread.join().ok();
        }

        // announce the voluntary termination, a dead daemon is tolerated
        let mut termination = IpcMessage::new(IpcMessageType::TerminationAck);
        termination.add(&self.runtime_name);
        if let Ok(channel) = self.channel.lock() {
            channel.sender.try_send(&termination.to_bytes()).ok();
        }

        debug!(from "Runtime::drop()", "runtime \"{}\" is shut down", self.runtime_name);
    }
}
