/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::client::*;
use crate::client::tokio_impl::*;
use crate::config::*;
use crate::error::{SchistError, SchistResult};
use crate::mqtt::*;
use crate::packet_id::PacketIdAllocator;
use crate::protocol::*;

use log::*;
use rand::Rng;

use std::collections::{HashMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_CONNECT_TIMEOUT : Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
pub(crate) struct StopOptionsInternal {
    pub disconnect: Option<Box<MqttPacket>>,
}

pub(crate) enum OperationOptions {
    Publish(Box<MqttPacket>, PublishOptionsInternal),
    Subscribe(Box<MqttPacket>, SubscribeOptionsInternal),
    Unsubscribe(Box<MqttPacket>, UnsubscribeOptionsInternal),
    Start(),
    Stop(StopOptionsInternal),
    Shutdown(),
    AddListener(u64, EndpointEventListener),
    RemoveListener(u64)
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub(crate) enum EndpointImplState {
    Stopped,
    Connecting,
    Connected,
    PendingReconnect,
    Shutdown,
    // possibly need a pending stopped state for async connection shutdown
}

impl Display for EndpointImplState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointImplState::Stopped => { write!(f, "Stopped") }
            EndpointImplState::Connecting => { write!(f, "Connecting") }
            EndpointImplState::Connected => { write!(f, "Connected") }
            EndpointImplState::PendingReconnect => { write!(f, "PendingReconnect") }
            EndpointImplState::Shutdown => { write!(f, "Shutdown") }
        }
    }
}

pub(crate) struct EndpointImpl {
    protocol_state: ProtocolState,
    listeners: HashMap<u64, EndpointEventListener>,

    current_state: EndpointImplState,
    desired_state: EndpointImplState,

    desired_stop_options: Option<StopOptionsInternal>,

    packet_events: VecDeque<PacketEvent>,

    last_connack: Option<ConnackPacket>,
    last_disconnect: Option<DisconnectPacket>,
    last_error: Option<SchistError>,

    successful_connect_time: Option<Instant>,
    next_reconnect_period: Duration,
    reconnect_options: ReconnectOptions,

    connect_timeout: Duration,

    // connack deadline, measured from transport connection success
    connack_timeout: Duration,

    read_buffer_size: usize,

    current_time: Instant,
}


impl EndpointImpl {

    pub(crate) fn new(endpoint_options: EndpointOptions, connect_options: ConnectOptions, mut runtime_options: EndpointRuntimeOptions) -> Self {
        debug!("Creating new MQTT endpoint - endpoint options: {}", endpoint_options);
        debug!("Creating new MQTT endpoint - connect options: {:?}", connect_options);

        let current_time = Instant::now();
        let connack_timeout = endpoint_options.connack_timeout;
        let read_buffer_size = endpoint_options.read_buffer_size;

        let packet_id_allocator = runtime_options.packet_id_allocator.take()
            .unwrap_or_else(|| Arc::new(PacketIdAllocator::new()));

        let state_config = ProtocolStateConfig {
            connect_options,
            endpoint_options,
            base_timestamp: current_time,
            packet_id_allocator,
        };

        let mut endpoint_impl = EndpointImpl {
            protocol_state: ProtocolState::new(state_config),
            listeners: HashMap::new(),
            current_state: EndpointImplState::Stopped,
            desired_state: EndpointImplState::Stopped,
            desired_stop_options: None,
            packet_events: VecDeque::new(),
            last_connack: None,
            last_disconnect: None,
            last_error: None,
            successful_connect_time: None,
            next_reconnect_period: runtime_options.reconnect_options.base_reconnect_period,
            reconnect_options: runtime_options.reconnect_options,
            connect_timeout: runtime_options.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            connack_timeout,
            read_buffer_size,
            current_time
        };

        endpoint_impl.reconnect_options.normalize();

        if let Some(listener) = runtime_options.default_event_listener {
            endpoint_impl.listeners.insert(0, listener);
        }

        endpoint_impl
    }

    pub(crate) fn connect_timeout(&self) -> &Duration {
        &self.connect_timeout
    }

    pub(crate) fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub(crate) fn get_current_state(&self) -> EndpointImplState {
        self.current_state
    }

    pub(crate) fn get_protocol_state(&self) -> ProtocolStateType {
        self.protocol_state.state()
    }

    pub(crate) fn add_listener(&mut self, id: u64, listener: EndpointEventListener) {
        self.listeners.insert(id, listener);
    }

    pub(crate) fn remove_listener(&mut self, id: u64) {
        self.listeners.remove(&id);
    }

    pub(crate) fn broadcast_event(&self, event: Arc<EndpointEvent>) {
        debug!("Broadcasting endpoint event: {:?}", *event);

        for listener in self.listeners.values() {
            spawn_event_callback(event.clone(), listener.clone());
        }
    }

    pub(crate) fn apply_error(&mut self, error: SchistError) {
        debug!("Applying error to endpoint: {}", error);

        if self.last_error.is_none() {
            self.last_error = Some(error);
        }
    }

    fn set_current_time(&mut self, current_time: Instant) {
        self.current_time = current_time;
    }

    pub(crate) fn handle_incoming_operation(&mut self, operation: OperationOptions, current_time: Instant) {
        self.set_current_time(current_time);

        match operation {
            OperationOptions::Publish(packet, internal_options) => {
                debug!("Submitting publish operation to protocol state");
                let user_event_context = UserEventContext {
                    event: UserEvent::Publish(packet, internal_options),
                    current_time
                };

                self.protocol_state.handle_user_event(user_event_context);
            }
            OperationOptions::Subscribe(packet, internal_options) => {
                debug!("Submitting subscribe operation to protocol state");
                let user_event_context = UserEventContext {
                    event: UserEvent::Subscribe(packet, internal_options),
                    current_time
                };

                self.protocol_state.handle_user_event(user_event_context);
            }
            OperationOptions::Unsubscribe(packet, internal_options) => {
                debug!("Submitting unsubscribe operation to protocol state");
                let user_event_context = UserEventContext {
                    event: UserEvent::Unsubscribe(packet, internal_options),
                    current_time
                };

                self.protocol_state.handle_user_event(user_event_context);
            }
            OperationOptions::Start() => {
                debug!("Updating desired state to Connected");
                self.desired_stop_options = None;
                self.desired_state = EndpointImplState::Connected;
            }
            OperationOptions::Stop(options) => {
                if let Some(disconnect) = &options.disconnect {
                    debug!("Submitting disconnect operation to protocol state");
                    let disconnect_context = UserEventContext {
                        event: UserEvent::Disconnect(disconnect.clone()),
                        current_time
                    };

                    self.protocol_state.handle_user_event(disconnect_context);
                }

                debug!("Updating desired state to Stopped");
                self.desired_stop_options = Some(options);
                self.desired_state = EndpointImplState::Stopped;
            }
            OperationOptions::Shutdown() => {
                debug!("Updating desired state to Shutdown");
                self.protocol_state.reset(&current_time);
                self.desired_state = EndpointImplState::Shutdown;
            }
            OperationOptions::AddListener(id, listener) => {
                debug!("Adding listener {} to endpoint events", id);
                self.add_listener(id, listener);
            }
            OperationOptions::RemoveListener(id) => {
                debug!("Removing listener {} from endpoint events", id);
                self.remove_listener(id);
            }
        }
    }

    fn dispatch_packet_events(&mut self) {
        let mut events = VecDeque::new();
        mem::swap(&mut events, &mut self.packet_events);

        for event in events {
            match event {
                PacketEvent::Publish(publish) => {
                    debug!("dispatch_packet_events - publish packet");
                    let publish_event = PublishReceivedEvent {
                        publish,
                    };

                    self.broadcast_event(Arc::new(EndpointEvent::PublishReceived(publish_event)));
                }
                PacketEvent::Disconnect(disconnect) => {
                    debug!("dispatch_packet_events - peer disconnect packet");
                    self.last_disconnect = Some(disconnect);
                }
                PacketEvent::Connack(connack) => {
                    debug!("dispatch_packet_events - connack packet");
                    let reason_code = connack.reason_code;
                    self.last_connack = Some(connack);
                    if reason_code == ConnectReasonCode::Success {
                        self.successful_connect_time = Some(self.current_time);
                        self.emit_connection_success_event();
                    }
                }
                PacketEvent::Connect(connect) => {
                    debug!("dispatch_packet_events - connect packet");
                    let connect_event = ConnectReceivedEvent {
                        connect,
                    };

                    self.broadcast_event(Arc::new(EndpointEvent::ConnectReceived(connect_event)));
                }
                PacketEvent::Subscribe(subscribe) => {
                    debug!("dispatch_packet_events - subscribe packet");
                    let subscribe_event = SubscribeReceivedEvent {
                        subscribe,
                    };

                    self.broadcast_event(Arc::new(EndpointEvent::SubscribeReceived(subscribe_event)));
                }
                PacketEvent::Unsubscribe(unsubscribe) => {
                    debug!("dispatch_packet_events - unsubscribe packet");
                    let unsubscribe_event = UnsubscribeReceivedEvent {
                        unsubscribe,
                    };

                    self.broadcast_event(Arc::new(EndpointEvent::UnsubscribeReceived(unsubscribe_event)));
                }
                PacketEvent::Pingreq => {
                    debug!("dispatch_packet_events - pingreq packet");
                    self.broadcast_event(Arc::new(EndpointEvent::PingreqReceived(PingreqReceivedEvent {})));
                }
            }
        }

        self.packet_events.clear();
    }

    pub(crate) fn handle_incoming_bytes(&mut self, bytes: &[u8], current_time: Instant) -> SchistResult<()> {
        debug!("endpoint impl - handle_incoming_bytes: {} bytes", bytes.len());
        self.set_current_time(current_time);

        let mut context = NetworkEventContext {
            event: NetworkEvent::IncomingData(bytes),
            current_time,
            packet_events: &mut self.packet_events
        };

        let result = self.protocol_state.handle_network_event(&mut context);
        self.dispatch_packet_events();
        result
    }

    pub(crate) fn handle_write_completion(&mut self, current_time: Instant) -> SchistResult<()> {
        debug!("endpoint impl - handle_write_completion");
        self.set_current_time(current_time);

        let mut context = NetworkEventContext {
            event: NetworkEvent::WriteCompletion,
            current_time,
            packet_events: &mut self.packet_events
        };

        self.protocol_state.handle_network_event(&mut context)
    }

    pub(crate) fn handle_service(&mut self, outbound_data: &mut Vec<u8>, current_time: Instant) -> SchistResult<()> {
        debug!("endpoint impl - handle_service");
        self.set_current_time(current_time);

        let mut context = ServiceContext {
            to_socket: outbound_data,
            current_time,
        };

        self.protocol_state.service(&mut context)
    }

    fn clamp_reconnect_period(&self, mut reconnect_period: Duration) -> Duration {
        if reconnect_period > self.reconnect_options.max_reconnect_period {
            reconnect_period = self.reconnect_options.max_reconnect_period;
        }

        reconnect_period
    }

    fn compute_uniform_jitter_period(&self, max_nanos: u128) -> Duration {
        let mut rng = rand::thread_rng();
        let uniform_nanos = rng.gen_range(0..max_nanos);
        Duration::from_nanos(uniform_nanos as u64)
    }

    pub(crate) fn compute_reconnect_period(&mut self) -> Duration {
        let reconnect_period = self.next_reconnect_period;
        self.next_reconnect_period = self.clamp_reconnect_period(self.next_reconnect_period * 2);

        match self.reconnect_options.reconnect_period_jitter {
            ExponentialBackoffJitterType::None => {
                reconnect_period
            }
            ExponentialBackoffJitterType::Uniform => {
                self.compute_uniform_jitter_period(reconnect_period.as_nanos())
            }
        }
    }

    pub(crate) fn compute_optional_state_transition(&self) -> Option<EndpointImplState> {
        match self.current_state {
            EndpointImplState::Stopped => {
                match self.desired_state {
                    EndpointImplState::Connected => {
                        return Some(EndpointImplState::Connecting)
                    }
                    EndpointImplState::Shutdown => {
                        return Some(EndpointImplState::Shutdown)
                    }
                    _ => {}
                }
            }

            EndpointImplState::Connecting | EndpointImplState::PendingReconnect => {
                if self.desired_state != EndpointImplState::Connected {
                    return Some(EndpointImplState::Stopped)
                }
            }

            EndpointImplState::Connected => {
                if self.desired_state != EndpointImplState::Connected {
                    if let Some(stop_options) = &self.desired_stop_options {
                        if stop_options.disconnect.is_none() {
                            return Some(EndpointImplState::Stopped);
                        }
                    } else {
                        return Some(EndpointImplState::Stopped);
                    }
                }
            }

            _ => { }
        }

        None
    }

    pub(crate) fn get_next_connected_service_time(&mut self, current_time: Instant) -> Option<Instant> {
        self.set_current_time(current_time);

        if self.current_state == EndpointImplState::Connected {
            return self.protocol_state.get_next_service_timepoint(&current_time);
        }

        None
    }

    fn emit_connection_attempt_event(&self) {
        let connection_attempt_event = ConnectionAttemptEvent {
        };

        self.broadcast_event(Arc::new(EndpointEvent::ConnectionAttempt(connection_attempt_event)));
    }

    fn emit_connection_success_event(&self) {
        let settings = self.protocol_state.get_negotiated_settings().as_ref().unwrap();

        let connection_success_event = ConnectionSuccessEvent {
            connack: self.last_connack.as_ref().unwrap().clone(),
            settings: settings.clone(),
        };

        self.broadcast_event(Arc::new(EndpointEvent::ConnectionSuccess(connection_success_event)));
    }

    fn emit_connection_failure_event(&mut self) {
        let mut connection_failure_event = ConnectionFailureEvent {
            error: self.last_error.take().unwrap_or(SchistError::new_connection_establishment_failure("unknown failure source")),
            connack: None,
        };

        if let Some(connack) = &self.last_connack {
            connection_failure_event.connack = Some(connack.clone());
        }

        self.broadcast_event(Arc::new(EndpointEvent::ConnectionFailure(connection_failure_event)));
    }

    fn emit_disconnection_event(&mut self) {
        let mut disconnection_event = DisconnectionEvent {
            error: self.last_error.take().unwrap_or(SchistError::new_connection_closed("disconnection with no source error")),
            disconnect: None,
        };

        if let Some(disconnect) = &self.last_disconnect {
            disconnection_event.disconnect = Some(disconnect.clone());
        }

        self.broadcast_event(Arc::new(EndpointEvent::Disconnection(disconnection_event)));
    }

    fn emit_stopped_event(&self) {
        let stopped_event = StoppedEvent {
        };

        self.broadcast_event(Arc::new(EndpointEvent::Stopped(stopped_event)));
    }

    pub(crate) fn transition_to_state(&mut self, mut new_state: EndpointImplState, current_time: Instant) -> SchistResult<()> {
        self.set_current_time(current_time);

        let old_state = self.current_state;
        if old_state == new_state {
            return Ok(());
        }

        // Displeasing hacks to support state transition short-circuits.  We need two:
        //
        //  (1) PendingReconnect -> Stopped after a disconnect packet has been flushed.
        //      We can't break out of connected until the disconnect is written to the socket,
        //      and so we suspend the desired != current check to support that since flushing a
        //      disconnect will halt the protocol state.  But then we blindly transition to
        //      pending reconnect which isn't right, so correct that here.
        //  (2) Stopped -> Shutdown after a close operation has been received.
        //      Stopped does not have a natural exit point except operation receipt.  But we've
        //      received the last operation in theory, so we need to jump to shutdown immediately
        //      without waiting on a select
        //
        //  TODO: these indicate some flaws in the overall contract/model that should be corrected
        if new_state == EndpointImplState::PendingReconnect && self.desired_state != EndpointImplState::Connected {
            new_state = EndpointImplState::Stopped;
        }

        if new_state == EndpointImplState::Stopped && self.desired_state == EndpointImplState::Shutdown {
            new_state = EndpointImplState::Shutdown;
        }

        debug!("endpoint impl transition_to_state - old state: {}, new_state: {}", old_state, new_state);

        if new_state == EndpointImplState::Connected {
            let mut connection_opened_context = NetworkEventContext {
                event: NetworkEvent::ConnectionOpened(ConnectionOpenedContext{
                    establishment_timeout: current_time + self.connack_timeout,
                }),
                current_time,
                packet_events: &mut self.packet_events
            };

            self.protocol_state.handle_network_event(&mut connection_opened_context)?;
        } else if old_state == EndpointImplState::Connected {
            let mut connection_closed_context = NetworkEventContext {
                event: NetworkEvent::ConnectionClosed,
                current_time,
                packet_events: &mut self.packet_events
            };

            self.protocol_state.handle_network_event(&mut connection_closed_context)?;
        }

        if new_state == EndpointImplState::Connecting {
            self.last_error = None;
            self.last_connack = None;
            self.last_disconnect = None;
            self.emit_connection_attempt_event();
        }

        if old_state == EndpointImplState::Connecting && new_state != EndpointImplState::Connected {
            self.emit_connection_failure_event();
        }

        if old_state == EndpointImplState::Connected {
            if let Some(connack) = &self.last_connack {
                if connack.reason_code == ConnectReasonCode::Success {
                    self.emit_disconnection_event();
                } else {
                    self.emit_connection_failure_event();
                }
            } else {
                self.emit_connection_failure_event();
            }

            if let Some(successful_connect_timepoint) = self.successful_connect_time {
                if (current_time - successful_connect_timepoint) > self.reconnect_options.reconnect_stability_reset_period {
                    self.next_reconnect_period = self.reconnect_options.base_reconnect_period;
                }
            }

            self.successful_connect_time = None;
        }

        if new_state == EndpointImplState::Stopped {
            self.desired_stop_options = None;
            self.emit_stopped_event();
        }

        self.current_state = new_state;

        Ok(())
    }
}
