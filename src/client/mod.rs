/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing the public tokio-based MQTT endpoint and the types necessary to invoke
operations on it.
 */

pub(crate) mod shared_impl;
pub(crate) mod tokio_impl;

pub use tokio_impl::TokioEndpointOptions;

use crate::client::shared_impl::*;
use crate::client::tokio_impl::*;
use crate::config::*;
use crate::error::{SchistError, SchistResult};
use crate::mqtt::*;
use crate::mqtt::disconnect::validate_disconnect_packet_outbound;
use crate::packet_id::PacketIdAllocator;
use crate::protocol::*;
use crate::validate::*;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Async result type for a publish operation
pub type PublishResultFuture = dyn Future<Output = PublishResult> + Send;

/// Async result type for a subscribe operation
pub type SubscribeResultFuture = dyn Future<Output = SubscribeResult> + Send;

/// Async result type for an unsubscribe operation
pub type UnsubscribeResultFuture = dyn Future<Output = UnsubscribeResult> + Send;

/// Additional options for a stop invocation.
#[derive(Debug, Default)]
pub struct StopOptions {

    /// MQTT Disconnect packet the endpoint should transmit before closing the connection and
    /// entering the Stopped state.
    pub(crate) disconnect: Option<DisconnectPacket>,
}

impl StopOptions {

    /// Returns a builder that constructs StopOptions instances
    pub fn builder() -> StopOptionsBuilder {
        StopOptionsBuilder::new()
    }
}

/// Builder type for StopOptions instances
#[derive(Debug, Default)]
pub struct StopOptionsBuilder {
    options: StopOptions
}

impl StopOptionsBuilder {
    pub(crate) fn new() -> Self {
        StopOptionsBuilder {
            ..Default::default()
        }
    }

    /// Configures the stop invocation to send a Disconnect packet before closing the connection
    pub fn with_disconnect_packet(mut self, disconnect: DisconnectPacket) -> Self {
        self.options.disconnect = Some(disconnect);
        self
    }

    pub fn build(self) -> StopOptions {
        self.options
    }
}

/// Controls how the endpoint's reconnect delay is randomized between attempts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExponentialBackoffJitterType {

    /// The reconnect delay is the exact exponentially-growing period, with no randomization.
    None,

    /// The reconnect delay is drawn uniformly from [0, current exponential period).
    #[default]
    Uniform,
}

/// Configuration for the endpoint's reconnect behavior after a connection failure or
/// disconnection.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectOptions {
    pub(crate) reconnect_period_jitter: ExponentialBackoffJitterType,
    pub(crate) base_reconnect_period: Duration,
    pub(crate) max_reconnect_period: Duration,
    pub(crate) reconnect_stability_reset_period: Duration,
}

impl ReconnectOptions {
    pub(crate) fn normalize(&mut self) {
        if self.base_reconnect_period > self.max_reconnect_period {
            self.base_reconnect_period = self.max_reconnect_period;
        }

        if self.max_reconnect_period < Duration::from_millis(1) {
            self.max_reconnect_period = Duration::from_millis(1);
        }
    }
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        ReconnectOptions {
            reconnect_period_jitter: ExponentialBackoffJitterType::default(),
            base_reconnect_period: Duration::from_secs(1),
            max_reconnect_period: Duration::from_secs(120),
            reconnect_stability_reset_period: Duration::from_secs(30),
        }
    }
}

/// Runtime-level configuration for an endpoint: transport connect timeout, reconnect
/// behavior, default event listener, and (optionally) a shared packet identifier allocator.
#[derive(Default)]
pub struct EndpointRuntimeOptions {
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) reconnect_options: ReconnectOptions,
    pub(crate) default_event_listener: Option<EndpointEventListener>,
    pub(crate) packet_id_allocator: Option<Arc<PacketIdAllocator>>,
}

impl EndpointRuntimeOptions {

    /// Returns a builder that constructs EndpointRuntimeOptions instances
    pub fn builder() -> EndpointRuntimeOptionsBuilder {
        EndpointRuntimeOptionsBuilder::new()
    }
}

/// Builder type for EndpointRuntimeOptions instances
#[derive(Default)]
pub struct EndpointRuntimeOptionsBuilder {
    options: EndpointRuntimeOptions
}

impl EndpointRuntimeOptionsBuilder {
    pub(crate) fn new() -> Self {
        EndpointRuntimeOptionsBuilder {
            ..Default::default()
        }
    }

    /// Bounds the time interval the endpoint will wait for the transport-level connection to
    /// be established before abandoning the attempt.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.options.connect_timeout = Some(connect_timeout);
        self
    }

    /// Configures how the endpoint delays between reconnect attempts
    pub fn with_reconnect_options(mut self, reconnect_options: ReconnectOptions) -> Self {
        self.options.reconnect_options = reconnect_options;
        self
    }

    /// Attaches a listener that receives every endpoint event.  Equivalent to calling
    /// add_event_listener immediately after construction, but without the race.
    pub fn with_default_event_listener(mut self, listener: EndpointEventListener) -> Self {
        self.options.default_event_listener = Some(listener);
        self
    }

    /// Shares a packet identifier allocator with the endpoint.  Useful for callers that want to
    /// block for an identifier (via acquire_wait) before submitting a publish, rather than have
    /// an exhausted id space fail the operation.
    pub fn with_packet_id_allocator(mut self, allocator: Arc<PacketIdAllocator>) -> Self {
        self.options.packet_id_allocator = Some(allocator);
        self
    }

    pub fn build(self) -> EndpointRuntimeOptions {
        self.options
    }
}

/// An event emitted every time the endpoint begins a connection attempt
#[derive(Debug)]
pub struct ConnectionAttemptEvent {}

/// An event emitted whenever a connection attempt resolves successfully
#[derive(Debug)]
pub struct ConnectionSuccessEvent {

    /// Connack received from the peer
    pub connack: ConnackPacket,

    /// Set of protocol-related values negotiated by the handshake
    pub settings: NegotiatedSettings
}

/// An event emitted whenever a connection attempt fails
#[derive(Debug)]
pub struct ConnectionFailureEvent {

    /// Error describing the failure
    pub error: SchistError,

    /// If the failure was due to a rejecting Connack, that Connack
    pub connack: Option<ConnackPacket>,
}

/// An event emitted whenever an established connection is shut down, for any reason
#[derive(Debug)]
pub struct DisconnectionEvent {

    /// Error describing why the connection went down
    pub error: SchistError,

    /// If the connection was closed by a peer-sent Disconnect packet, that packet
    pub disconnect: Option<DisconnectPacket>,
}

/// An event emitted when the endpoint reaches the Stopped state
#[derive(Debug)]
pub struct StoppedEvent {}

/// An event emitted whenever an application-facing Publish is received
#[derive(Debug)]
pub struct PublishReceivedEvent {

    /// The Publish packet
    pub publish: PublishPacket
}

/// An event emitted by a server-role endpoint when the peer's Connect packet arrives
#[derive(Debug)]
pub struct ConnectReceivedEvent {

    /// The Connect packet
    pub connect: ConnectPacket
}

/// An event emitted by a server-role endpoint when a Subscribe packet arrives
#[derive(Debug)]
pub struct SubscribeReceivedEvent {

    /// The Subscribe packet
    pub subscribe: SubscribePacket
}

/// An event emitted by a server-role endpoint when an Unsubscribe packet arrives
#[derive(Debug)]
pub struct UnsubscribeReceivedEvent {

    /// The Unsubscribe packet
    pub unsubscribe: UnsubscribePacket
}

/// An event emitted by a server-role endpoint when a Pingreq arrives.  The endpoint answers
/// the ping itself; this event is purely informational.
#[derive(Debug)]
pub struct PingreqReceivedEvent {}

/// Union of all events emitted by the endpoint
#[derive(Debug)]
pub enum EndpointEvent {
    ConnectionAttempt(ConnectionAttemptEvent),
    ConnectionSuccess(ConnectionSuccessEvent),
    ConnectionFailure(ConnectionFailureEvent),
    Disconnection(DisconnectionEvent),
    Stopped(StoppedEvent),
    PublishReceived(PublishReceivedEvent),
    ConnectReceived(ConnectReceivedEvent),
    SubscribeReceived(SubscribeReceivedEvent),
    UnsubscribeReceived(UnsubscribeReceivedEvent),
    PingreqReceived(PingreqReceivedEvent),
}

/// Callback signature for endpoint event listeners
pub type EndpointEventListenerCallback = dyn Fn(Arc<EndpointEvent>) + Send + Sync;

/// Union of all supported event listener forms
#[derive(Clone)]
pub enum EndpointEventListener {

    /// A function invoked on the runtime for every emitted event
    Callback(Arc<EndpointEventListenerCallback>)
}

impl fmt::Debug for EndpointEventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointEventListener::Callback(_) => { write!(f, "EndpointEventListener::Callback(...)") }
        }
    }
}

/// Opaque handle to an attached event listener, used for removal
#[derive(Debug, Eq, PartialEq)]
pub struct ListenerHandle {
    id: u64
}

/// An MQTT endpoint running on a tokio runtime.
///
/// The endpoint is a handle to an event loop task that owns the protocol engine and the
/// transport.  All operations are submitted over a channel; packet-bearing operations return
/// futures that resolve when the MQTT exchange runs to completion.
pub struct MqttEndpoint {
    pub(crate) user_state: UserRuntimeState,

    pub(crate) listener_id_allocator: Mutex<u64>,
}

impl MqttEndpoint {

    /// Creates a new endpoint and spawns its event loop on the supplied tokio runtime.  The
    /// endpoint starts in the Stopped state; call start() to begin connecting.
    pub fn new_with_tokio<T>(endpoint_options: EndpointOptions, connect_options: ConnectOptions, runtime_options: EndpointRuntimeOptions, tokio_options: TokioEndpointOptions<T>, runtime_handle: &runtime::Handle) -> MqttEndpoint
        where T : AsyncRead + AsyncWrite + Send + Sync + 'static {
        let endpoint_impl = EndpointImpl::new(endpoint_options, connect_options, runtime_options);
        let (user_state, runtime_state) = create_runtime_states(tokio_options);

        spawn_endpoint_impl(endpoint_impl, runtime_state, runtime_handle);

        MqttEndpoint {
            user_state,
            listener_id_allocator: Mutex::new(1),
        }
    }

    /// Signals the endpoint that it should attempt to establish (and maintain) a connection
    pub fn start(&self) -> SchistResult<()> {
        self.user_state.try_send(OperationOptions::Start())
    }

    /// Signals the endpoint that it should close any current connection and enter the Stopped
    /// state, optionally after transmitting a Disconnect packet
    pub fn stop(&self, options: Option<StopOptions>) -> SchistResult<()> {
        let options = options.unwrap_or_default();

        if let Some(disconnect) = &options.disconnect {
            validate_disconnect_packet_outbound(disconnect)?;
        }

        let mut stop_options_internal = StopOptionsInternal {
            ..Default::default()
        };

        if options.disconnect.is_some() {
            stop_options_internal.disconnect = Some(Box::new(MqttPacket::Disconnect(options.disconnect.unwrap())));
        }

        self.user_state.try_send(OperationOptions::Stop(stop_options_internal))
    }

    /// Signals the endpoint to shut down permanently.  All incomplete operations are failed and
    /// the event loop task exits.
    pub fn close(&self) -> SchistResult<()> {
        self.user_state.try_send(OperationOptions::Shutdown())
    }

    /// Submits a Publish operation to the endpoint
    pub fn publish(&self, packet: PublishPacket, options: Option<PublishOptions>) -> Pin<Box<PublishResultFuture>> {
        let boxed_packet = Box::new(MqttPacket::Publish(packet));
        if let Err(error) = validate_packet_outbound(&boxed_packet) {
            return Box::pin(async move { Err(error) });
        }

        submit_async_endpoint_operation!(self, Publish, PublishOptionsInternal, options.unwrap_or_default(), boxed_packet)
    }

    /// Submits a Subscribe operation to the endpoint
    pub fn subscribe(&self, packet: SubscribePacket, options: Option<SubscribeOptions>) -> Pin<Box<SubscribeResultFuture>> {
        let boxed_packet = Box::new(MqttPacket::Subscribe(packet));
        if let Err(error) = validate_packet_outbound(&boxed_packet) {
            return Box::pin(async move { Err(error) });
        }

        submit_async_endpoint_operation!(self, Subscribe, SubscribeOptionsInternal, options.unwrap_or_default(), boxed_packet)
    }

    /// Submits an Unsubscribe operation to the endpoint
    pub fn unsubscribe(&self, packet: UnsubscribePacket, options: Option<UnsubscribeOptions>) -> Pin<Box<UnsubscribeResultFuture>> {
        let boxed_packet = Box::new(MqttPacket::Unsubscribe(packet));
        if let Err(error) = validate_packet_outbound(&boxed_packet) {
            return Box::pin(async move { Err(error) });
        }

        submit_async_endpoint_operation!(self, Unsubscribe, UnsubscribeOptionsInternal, options.unwrap_or_default(), boxed_packet)
    }

    /// Attaches a listener that receives all endpoint events
    pub fn add_event_listener(&self, listener: EndpointEventListener) -> SchistResult<ListenerHandle> {
        let mut current_id = self.listener_id_allocator.lock().unwrap();
        let listener_id = *current_id;
        *current_id += 1;

        self.user_state.try_send(OperationOptions::AddListener(listener_id, listener))?;

        Ok(ListenerHandle {
            id: listener_id
        })
    }

    /// Detaches a previously-attached event listener
    pub fn remove_event_listener(&self, listener: ListenerHandle) -> SchistResult<()> {
        self.user_state.try_send(OperationOptions::RemoveListener(listener.id))
    }
}
