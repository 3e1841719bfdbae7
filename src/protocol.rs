/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

// Internal module that implements most of the MQTT spec with respect to endpoint protocol behavior

use crate::alias::*;
use crate::config::*;
use crate::decode::*;
use crate::encode::*;
use crate::error::{fold_mqtt_result, SchistError, SchistResult};
use crate::mqtt::*;
use crate::mqtt::connack::*;
use crate::mqtt::utils::*;
use crate::packet_id::PacketIdAllocator;
use crate::store::*;
use crate::validate::*;

use log::*;

use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::*;
use std::fmt::*;
use std::mem;
use std::sync::Arc;
use std::time::*;

/// Additional options attached to a publish submission.
#[derive(Debug, Default)]
pub struct PublishOptions {
    pub(crate) ack_timeout: Option<Duration>,
}

impl PublishOptions {

    /// Returns a builder that constructs PublishOptions instances
    pub fn builder() -> PublishOptionsBuilder {
        PublishOptionsBuilder::new()
    }
}

/// Builder type for PublishOptions instances
#[derive(Debug, Default)]
pub struct PublishOptionsBuilder {
    options: PublishOptions
}

impl PublishOptionsBuilder {
    pub(crate) fn new() -> Self {
        PublishOptionsBuilder {
            ..Default::default()
        }
    }

    /// Bounds the time interval between the publish being written to the transport and receipt
    /// of its final ack.  Overrides any endpoint-level ack timeout for this operation.
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.options.ack_timeout = Some(ack_timeout);
        self
    }

    pub fn build(self) -> PublishOptions {
        self.options
    }
}

/// Additional options attached to a subscribe submission.
#[derive(Debug, Default)]
pub struct SubscribeOptions {
    pub(crate) ack_timeout: Option<Duration>,
}

impl SubscribeOptions {

    /// Returns a builder that constructs SubscribeOptions instances
    pub fn builder() -> SubscribeOptionsBuilder {
        SubscribeOptionsBuilder::new()
    }
}

/// Builder type for SubscribeOptions instances
#[derive(Debug, Default)]
pub struct SubscribeOptionsBuilder {
    options: SubscribeOptions
}

impl SubscribeOptionsBuilder {
    pub(crate) fn new() -> Self {
        SubscribeOptionsBuilder {
            ..Default::default()
        }
    }

    /// Bounds the time interval between the subscribe being written to the transport and receipt
    /// of the corresponding suback.  Overrides any endpoint-level ack timeout for this operation.
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.options.ack_timeout = Some(ack_timeout);
        self
    }

    pub fn build(self) -> SubscribeOptions {
        self.options
    }
}

/// Additional options attached to an unsubscribe submission.
#[derive(Debug, Default)]
pub struct UnsubscribeOptions {
    pub(crate) ack_timeout: Option<Duration>,
}

impl UnsubscribeOptions {

    /// Returns a builder that constructs UnsubscribeOptions instances
    pub fn builder() -> UnsubscribeOptionsBuilder {
        UnsubscribeOptionsBuilder::new()
    }
}

/// Builder type for UnsubscribeOptions instances
#[derive(Debug, Default)]
pub struct UnsubscribeOptionsBuilder {
    options: UnsubscribeOptions
}

impl UnsubscribeOptionsBuilder {
    pub(crate) fn new() -> Self {
        UnsubscribeOptionsBuilder {
            ..Default::default()
        }
    }

    /// Bounds the time interval between the unsubscribe being written to the transport and
    /// receipt of the corresponding unsuback.  Overrides any endpoint-level ack timeout for this
    /// operation.
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.options.ack_timeout = Some(ack_timeout);
        self
    }

    pub fn build(self) -> UnsubscribeOptions {
        self.options
    }
}

/// The peer's response to the first or second phase of a QoS 2 publish exchange.
#[derive(Debug)]
pub enum Qos2Response {

    /// The exchange failed at the first phase; contains the failing pubrec.
    Pubrec(PubrecPacket),

    /// The exchange ran to completion; contains the final pubcomp.
    Pubcomp(PubcompPacket),
}

impl Display for Qos2Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Qos2Response::Pubrec(_) => { write!(f, "Pubrec") }
            Qos2Response::Pubcomp(_) => { write!(f, "Pubcomp") }
        }
    }
}

/// The final outcome of a successfully-delivered publish, by quality of service.
#[derive(Debug)]
pub enum PublishResponse {

    /// QoS 0 publishes complete when their bytes are accepted by the transport.
    Qos0,

    /// QoS 1 publishes complete on receipt of the corresponding puback.
    Qos1(PubackPacket),

    /// QoS 2 publishes complete when the two-phase exchange resolves.
    Qos2(Qos2Response),
}

impl Display for PublishResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            PublishResponse::Qos0 => { write!(f, "Qos0") }
            PublishResponse::Qos1(_) => { write!(f, "Qos1") }
            PublishResponse::Qos2(response) => { write!(f, "Qos2 ( {} )", response) }
        }
    }
}

/// Result of a publish operation
pub type PublishResult = SchistResult<PublishResponse>;

/// Result of a subscribe operation
pub type SubscribeResult = SchistResult<SubackPacket>;

/// Result of an unsubscribe operation
pub type UnsubscribeResult = SchistResult<UnsubackPacket>;

pub(crate) type PublishResponseHandler = Box<dyn FnOnce(PublishResult) -> SchistResult<()> + Send>;
pub(crate) type SubscribeResponseHandler = Box<dyn FnOnce(SubscribeResult) -> SchistResult<()> + Send>;
pub(crate) type UnsubscribeResponseHandler = Box<dyn FnOnce(UnsubscribeResult) -> SchistResult<()> + Send>;

pub(crate) struct PublishOptionsInternal {
    pub options: PublishOptions,
    pub response_handler: Option<PublishResponseHandler>,
}

pub(crate) struct SubscribeOptionsInternal {
    pub options: SubscribeOptions,
    pub response_handler: Option<SubscribeResponseHandler>,
}

pub(crate) struct UnsubscribeOptionsInternal {
    pub options: UnsubscribeOptions,
    pub response_handler: Option<UnsubscribeResponseHandler>,
}

enum EndpointOperationOptions {
    Publish(PublishOptionsInternal),
    Subscribe(SubscribeOptionsInternal),
    Unsubscribe(UnsubscribeOptionsInternal),
}

// Data structure that tracks the state of an MQTT operation.  This includes both user-submitted
// operations and internally-generated ones.  Every outbound packet corresponds to an operation.
// This packet correspondence is 1-1 with the single exception of a pubrel being associated with a
// qos2 publish.
pub(crate) struct EndpointOperation {

    // Every operation has a unique id, starting at 1.  Id allocation is serialized based on
    // time-of-submission.  In this way, complying with MQTT spec ordering requirements ends up
    // being sorts of id sequences.
    id: u64,

    // The base packet associated with this operation.
    pub(crate) packet: Box<MqttPacket>,

    // unpleasant hack to let the same operation track both the original qos 2 publish and the
    // followup pubrel
    pub(crate) qos2_pubrel: Option<Box<MqttPacket>>,

    // MQTT packet id that has been assigned to this operation.  Assignment is also reflected in
    // the packet itself.
    packet_id: Option<u16>,

    // Additional options (primarily completion handler) for an operation
    options: Option<EndpointOperationOptions>,

    // Always starts as None
    //
    // Set when the operation is flushed to the socket (but before write completion)
    // When the operation completes (by either write completion for pingreqs and qos 0 publishes,
    // final ack for subscribe, unsubscribe and qos1+ publishes), we bump the next ping
    // timepoint to at least (this value + the keep alive interval).
    //
    // The details are complicated, but it boils down to this:
    //
    // The next ping timepoint is based on the transmission time of the last peer-acknowledged
    // packet sent by this endpoint.
    ping_extension_base_timepoint: Option<Instant>,
}

impl EndpointOperation {
    pub fn bind_packet_id(&mut self, packet_id: u16) {
        debug!("Operation {} binding to packet id {}", self.id, packet_id);
        self.packet_id = Some(packet_id);
        self.apply_packet_id(packet_id);
    }

    pub fn unbind_packet_id(&mut self) {
        debug!("Operation {} unbinding packet id", self.id);
        self.packet_id = None;
        self.apply_packet_id(0);
    }

    fn apply_packet_id(&mut self, packet_id: u16) {
        match &mut *self.packet {
            MqttPacket::Subscribe(subscribe) => subscribe.packet_id = packet_id,
            MqttPacket::Unsubscribe(unsubscribe) => unsubscribe.packet_id = packet_id,
            MqttPacket::Publish(publish) => publish.packet_id = packet_id,
            _ => panic!("Packet type does not carry a packet id"),
        }
    }
}

// Most received packets stay internal or are routed to an operation's response handler.  The
// rest are surfaced to the endpoint's owner.  Which ones those are depends on the endpoint
// role: clients surface connacks, publishes, and disconnects; servers additionally surface the
// connection-management packets clients send them.
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) enum PacketEvent {
    Connack(ConnackPacket),
    Publish(PublishPacket),
    Disconnect(DisconnectPacket),
    Connect(ConnectPacket),
    Subscribe(SubscribePacket),
    Unsubscribe(UnsubscribePacket),
    Pingreq,
}

pub(crate) struct ConnectionOpenedContext {
    pub(crate) establishment_timeout: Instant,
}

// The endpoint's protocol state is completely uncoupled from networking data types.  We offer
// a simple interface that models and handles all relevant events.
pub(crate) enum NetworkEvent<'a> {
    ConnectionOpened(ConnectionOpenedContext),
    ConnectionClosed,
    IncomingData(&'a [u8]),
    WriteCompletion
}

pub(crate) struct NetworkEventContext<'a> {
    pub(crate) event: NetworkEvent<'a>,
    pub(crate) current_time: Instant,

    // output field for packets that the endpoint's owner is interested in
    pub(crate) packet_events: &'a mut VecDeque<PacketEvent>,
}

// The four actions users can take with respect to protocol state.  Start/stop is handled
// by the containing endpoint.
pub(crate) enum UserEvent {
    Publish(Box<MqttPacket>, PublishOptionsInternal),
    Subscribe(Box<MqttPacket>, SubscribeOptionsInternal),
    Unsubscribe(Box<MqttPacket>, UnsubscribeOptionsInternal),
    Disconnect(Box<MqttPacket>)
}

pub(crate) struct UserEventContext {
    pub(crate) event: UserEvent,
    pub(crate) current_time: Instant,
}

pub(crate) struct ServiceContext<'a> {
    // output field for all data that should be written to the socket.  A single service pass
    // coalesces every currently-writable packet into this buffer; no further bytes are encoded
    // until the transport reports write completion for it.
    pub(crate) to_socket: &'a mut Vec<u8>,
    pub(crate) current_time: Instant,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum ProtocolStateType {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Halted
}

pub(crate) fn is_connection_established(state: ProtocolStateType) -> bool {
    state == ProtocolStateType::Connected
}

impl Display for ProtocolStateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let name = match self {
            ProtocolStateType::Disconnected => "Disconnected",
            ProtocolStateType::Connecting => "Connecting",
            ProtocolStateType::Connected => "Connected",
            ProtocolStateType::Disconnecting => "Disconnecting",
            ProtocolStateType::Halted => "Halted",
        };

        f.write_str(name)
    }
}

pub(crate) struct ProtocolStateConfig {
    pub connect_options: ConnectOptions,

    pub endpoint_options: EndpointOptions,

    pub base_timestamp: Instant,

    // shared with the containing endpoint so blocking acquisition can happen off-engine
    pub packet_id_allocator: Arc<PacketIdAllocator>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ProtocolQueueType {
    User,
    HighPriority,
}

impl Display for ProtocolQueueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let name = match self {
            ProtocolQueueType::User => "User",
            ProtocolQueueType::HighPriority => "HighPriority",
        };

        f.write_str(name)
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum ProtocolQueueServiceMode {
    All,
    HighPriorityOnly,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ProtocolEnqueuePosition {
    Front,
    Back
}

impl Display for ProtocolEnqueuePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let name = match self {
            ProtocolEnqueuePosition::Front => "Front",
            ProtocolEnqueuePosition::Back => "Back",
        };

        f.write_str(name)
    }
}

enum OperationResponse {
    Publish(PublishResponse),
    Subscribe(SubackPacket),
    Unsubscribe(UnsubackPacket),
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) struct OperationTimeoutRecord {
    id: u64,
    timeout: Instant
}

impl PartialOrd for OperationTimeoutRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.timeout.cmp(&other.timeout))
    }
}

impl Ord for OperationTimeoutRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timeout.cmp(&other.timeout)
    }
}

// Primary data structure that tracks MQTT-related state for the containing endpoint.
pub(crate) struct ProtocolState {
    pub(crate) config: ProtocolStateConfig,

    pub(crate) state: ProtocolStateType,

    // the need to model time in a simple, test-controllable fashion leads to a solution where
    // the state thinks in time based on elapsed milliseconds since the state was created.  This
    // allows for simple time mocking which lets us simulate the passage of time "instantly."
    pub(crate) current_time: Instant,
    pub(crate) elapsed_time_ms: u128,

    // Flag set by the service function after encoding bytes to be written to the socket.
    // Unset when we receive notice that the socket has fully accepted all encoded bytes.
    // No additional bytes are encoded while this flag is set.
    pub(crate) pending_write_completion: bool,

    // All incomplete operations tracked by the endpoint
    pub(crate) operations: HashMap<u64, EndpointOperation>,

    // (Optional) Timeouts for all ack-based operations (qos1+ publish, subscribe, unsubscribe)
    // The timeout only covers the period between operation-written-to-socket and
    // response-received-from-socket.  The time an operation spends in an intake queue is not
    // bounded by anything.
    pub(crate) operation_ack_timeouts: BinaryHeap<Reverse<OperationTimeoutRecord>>,

    // Intake queues

    // lowest priority queue; all user operations are added to the end on submission
    pub(crate) user_operation_queue: VecDeque<u64>,

    // contains qos1+ publishes that were interrupted by a disconnect; spec compliance requires
    // these be re-sent first on session resumption using the original order and packet ids
    pub(crate) resubmit_operation_queue: VecDeque<u64>,

    // highest priority queue; for acks, pings, disconnect
    pub(crate) high_priority_operation_queue: VecDeque<u64>,

    // Tracks the packet ids of incoming qos2 publishes that haven't been released yet.  When
    // we receive a qos2 publish whose packet id is in here, we can ignore it because it's a
    // duplicate delivery.  Packet ids are removed when we receive a pubrel for it.
    pub(crate) qos2_incomplete_incoming_publishes: HashSet<u16>,

    // Tracks the packet ids bound to outbound ack-based operations.  Does not reset between
    // connections.  The ids themselves come from the shared allocator; this map points back at
    // the owning operations for replay.
    // { packet id -> operation id }
    pub(crate) allocated_packet_ids: HashMap<u16, u64>,

    // Tracks all qos1+ publishes that have been written to the socket but not yet completed.
    // A Qos2 publish will be in this map from the time the publish is written until the pubcomp is
    // received or there is a disconnection.
    // { packet id -> operation id }
    pub(crate) pending_publish_operations: HashMap<u16, u64>,

    // Tracks all subscribes and unsubscribes that have been written to the socket but not yet
    // completed.
    // { packet id -> operation id }
    pub(crate) pending_non_publish_operations: HashMap<u16, u64>,

    // Tracks all incomplete operations that don't use acks that have been written to the socket.
    // These operations will be completed on the next write completion event.
    pub(crate) pending_write_completion_operations: VecDeque<u64>,

    // Unacknowledged qos1+ packets, retained across disconnects for session-resumption replay
    pub(crate) resend_store: OutboundResendStore,

    // Connection-scoped set of negotiated protocol values
    pub(crate) current_settings: Option<NegotiatedSettings>,

    // monotonically-increasing operation id value
    pub(crate) next_operation_id: u64,

    // Tracks if the containing endpoint has previously successfully connected.  Used to
    // conditionally rejoin sessions.
    pub(crate) has_connected_successfully: bool,

    // MQTT packet decode; encode writes straight into the service context's buffer
    pub(crate) decoder: Decoder,

    // Point in time we should send another ping.  If None, we are in the middle of a ping.
    pub(crate) next_ping_timepoint: Option<Instant>,

    // Point in time that our current ping will time out.  If none, we are not in the middle of a
    // ping.
    pub(crate) ping_timeout_timepoint: Option<Instant>,

    // Point in time that we will consider the initial CONNECT packet/request to have timed out.
    pub(crate) connack_timeout_timepoint: Option<Instant>,

    // Topic aliasing support
    pub(crate) outbound_alias_resolver: RefCell<Box<dyn OutboundAliasResolver + Send>>,
    pub(crate) inbound_alias_resolver: InboundAliasResolver,

    // Current MQTT version in use
    pub(crate) protocol_version: ProtocolVersion,

    // Which side of the CONNECT/CONNACK handshake this endpoint drives
    pub(crate) endpoint_role: EndpointRole,
}

impl Display for ProtocolState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let level = log::max_level();
        match level {
            LevelFilter::Debug => {
                self.log_debug(f)
            }
            LevelFilter::Trace => {
                self.log_trace(f)
            }
            _ => { Ok(()) }
        }
    }
}

impl ProtocolState {

    // Crate-public API

    pub(crate) fn new(mut config: ProtocolStateConfig) -> ProtocolState {
        let outbound_resolver : Box<dyn OutboundAliasResolver + Send> =
            config.endpoint_options.outbound_alias_resolver.take().unwrap_or_else(|| Box::new(NullOutboundAliasResolver::new()));
        let inbound_resolver = InboundAliasResolver::new(config.connect_options.topic_alias_maximum.unwrap_or(0));
        let base_time = config.base_timestamp;
        let protocol_version = config.endpoint_options.protocol_version;
        let endpoint_role = config.endpoint_options.endpoint_role;
        let resend_store = OutboundResendStore::new(!config.endpoint_options.replay_expired_publishes);

        ProtocolState {
            config,
            state: ProtocolStateType::Disconnected,
            current_time: base_time,
            elapsed_time_ms: 0,
            pending_write_completion : false,
            operations: HashMap::new(),
            operation_ack_timeouts: BinaryHeap::new(),
            user_operation_queue: VecDeque::new(),
            resubmit_operation_queue: VecDeque::new(),
            high_priority_operation_queue: VecDeque::new(),
            qos2_incomplete_incoming_publishes: HashSet::new(),
            allocated_packet_ids: HashMap::new(),
            pending_publish_operations: HashMap::new(),
            pending_non_publish_operations: HashMap::new(),
            pending_write_completion_operations: VecDeque::new(),
            resend_store,
            current_settings: None,
            next_operation_id : 1,
            has_connected_successfully: false,
            decoder: Decoder::new(),
            next_ping_timepoint: None,
            ping_timeout_timepoint: None,
            connack_timeout_timepoint: None,
            outbound_alias_resolver: RefCell::new(outbound_resolver),
            inbound_alias_resolver: inbound_resolver,
            protocol_version,
            endpoint_role,
        }
    }

    pub(crate) fn state(&self) -> ProtocolStateType {
        self.state
    }

    pub(crate) fn handle_network_event(&mut self, context: &mut NetworkEventContext) -> SchistResult<()> {
        self.update_internal_clock(&context.current_time);

        let result = match &context.event {
            NetworkEvent::ConnectionOpened(_) => self.handle_network_event_connection_opened(context),
            NetworkEvent::ConnectionClosed => self.handle_network_event_connection_closed(context),
            NetworkEvent::WriteCompletion => self.handle_network_event_write_completion(context),
            NetworkEvent::IncomingData(data) => self.handle_network_event_incoming_data(context, data),
        };

        // An error result halts the endpoint.  This is not always an ERROR-error.  For example,
        // write completion that includes a disconnect packet will return an error, allowing us
        // to reset the endpoint nicely.
        self.finish_event_pass("handle_network_event", &result);

        result
    }

    pub(crate) fn service(&mut self, context: &mut ServiceContext) -> SchistResult<()> {
        self.update_internal_clock(&context.current_time);

        let result = match self.state {
            ProtocolStateType::Disconnected => self.service_disconnected(context),
            ProtocolStateType::Connecting => self.service_connecting(context),
            ProtocolStateType::Connected => self.service_connected(context),
            ProtocolStateType::Disconnecting => self.service_disconnecting(context),
            ProtocolStateType::Halted => Err(SchistError::new_internal_state_error("protocol state previously halted")),
        };

        self.finish_event_pass("service", &result);

        result
    }

    // Shared tail of every event-driven entry point: dump state at the current log level and
    // halt on any error result.
    fn finish_event_pass(&mut self, entry_point: &str, result: &SchistResult<()>) {
        self.log_state();

        if result.is_err() {
            error!("[{} ms] {} - final result: {:?}", self.elapsed_time_ms, entry_point, result);
            self.change_state(ProtocolStateType::Halted);
        } else {
            debug!("[{} ms] {} - final result: {:?}", self.elapsed_time_ms, entry_point, result);
        }
    }

    pub(crate) fn handle_user_event(&mut self, context: UserEventContext) {
        self.update_internal_clock(&context.current_time);

        // Disconnects jump the line; everything else waits its turn in the user queue.
        let (op_id, queue, position) = match context.event {
            UserEvent::Subscribe(packet, options) =>
                (self.create_operation(packet, Some(EndpointOperationOptions::Subscribe(options))), ProtocolQueueType::User, ProtocolEnqueuePosition::Back),
            UserEvent::Unsubscribe(packet, options) =>
                (self.create_operation(packet, Some(EndpointOperationOptions::Unsubscribe(options))), ProtocolQueueType::User, ProtocolEnqueuePosition::Back),
            UserEvent::Publish(packet, options) =>
                (self.create_operation(packet, Some(EndpointOperationOptions::Publish(options))), ProtocolQueueType::User, ProtocolEnqueuePosition::Back),
            UserEvent::Disconnect(disconnect) =>
                (self.create_operation(disconnect, None), ProtocolQueueType::HighPriority, ProtocolEnqueuePosition::Front),
        };

        assert_ne!(op_id, 0);

        if let Some(check_operation) = self.operations.get(&op_id) {
            if !self.operation_packet_passes_offline_queue_policy(&check_operation.packet) {
                debug!("[{} ms] handle_user_event - operation {} failed by offline queue policy", self.elapsed_time_ms, op_id);
                let _ = self.complete_operation_as_failure(op_id, SchistError::new_offline_queue_policy_failed());
                return;
            }
        }

        debug!("[{} ms] handle_user_event - queuing operation with id {} into {} of {} queue", self.elapsed_time_ms, op_id, position, queue);
        self.enqueue_operation(op_id, queue, position);

        self.log_state();
    }

    pub(crate) fn get_next_service_timepoint(&mut self, current_time: &Instant) -> Option<Instant> {
        self.update_internal_clock(current_time);

        let next_service_time = match self.state {
            ProtocolStateType::Disconnected => self.get_next_service_timepoint_disconnected(),
            ProtocolStateType::Connecting => self.get_next_service_timepoint_connecting(),
            ProtocolStateType::Connected => self.get_next_service_timepoint_connected(),
            ProtocolStateType::Disconnecting => self.get_next_service_timepoint_disconnecting(),
            ProtocolStateType::Halted => None,
        };

        if let Some(next_timepoint) = &next_service_time {
            debug!("[{} ms] get_next_service_timepoint - state {}, target_elapsed_time: {} ms", self.elapsed_time_ms, self.state, self.get_elapsed_millis(next_timepoint));
        } else {
            debug!("[{} ms] get_next_service_timepoint - state {}, target_elapsed_time: NEVER", self.elapsed_time_ms, self.state);
        }

        next_service_time
    }

    pub(crate) fn reset(&mut self, current_time: &Instant) {
        self.update_internal_clock(current_time);

        if self.state != ProtocolStateType::Disconnected {
            self.state = ProtocolStateType::Halted;
        }

        let operations : Vec<u64> = self.operations.keys().copied().collect();
        for id in operations {
            let _ = self.complete_operation_as_failure(id, SchistError::new_endpoint_closed());
        }

        self.pending_write_completion = false;
        self.operations.clear();
        self.operation_ack_timeouts.clear();
        self.user_operation_queue.clear();
        self.resubmit_operation_queue.clear();
        self.high_priority_operation_queue.clear();
        self.qos2_incomplete_incoming_publishes.clear();
        self.allocated_packet_ids.clear();
        self.pending_publish_operations.clear();
        self.pending_non_publish_operations.clear();
        self.pending_write_completion_operations.clear();
        self.resend_store.reset();
        self.config.packet_id_allocator.reset();
        self.current_settings = None;
        self.has_connected_successfully = false;
        self.next_ping_timepoint = None;
        self.ping_timeout_timepoint = None;
        self.connack_timeout_timepoint = None;
    }

    // Private Implementation

    fn operation_packet_passes_offline_queue_policy(&self, packet: &MqttPacket) -> bool {
        if self.state == ProtocolStateType::Connected {
            return true;
        }

        does_packet_pass_offline_queue_policy(packet, &self.config.endpoint_options.offline_queue_policy)
    }

    fn write_state_prefix(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "ProtocolState: {{ state:{}, elapsed_time_ms:{}, pending_write_completion:{},", self.state, self.elapsed_time_ms, self.pending_write_completion)
    }

    fn write_packet_id_table<'a, T>(f: &mut Formatter<'_>, label: &str, entries: T) -> Result where T : Iterator<Item = (&'a u16, &'a u64)> {
        write!(f, " {}: {{", label)?;
        for (packet_id, operation_id) in entries {
            write!(f, " ({}, {})", *packet_id, *operation_id)?;
        }
        write!(f, " }},")
    }

    fn log_debug(&self, f: &mut Formatter<'_>) -> Result {
        self.write_state_prefix(f)?;
        write!(f, " operations:{} items, operation_ack_timeouts:{} timeouts pending,", self.operations.len(), self.operation_ack_timeouts.len())?;
        write!(f, " user_operation_queue:{} items, resubmit_operation_queue:{} items, high_priority_operation_queue:{} items,", self.user_operation_queue.len(), self.resubmit_operation_queue.len(), self.high_priority_operation_queue.len())?;
        write!(f, " qos2_incomplete_incoming_publishes:{} operations, allocated_packet_ids:{} ids,", self.qos2_incomplete_incoming_publishes.len(), self.allocated_packet_ids.len())?;
        write!(f, " pending_publish_operations:{} operations, pending_non_publish_operations:{} operations, pending_write_completion_operations:{} operations,", self.pending_publish_operations.len(), self.pending_non_publish_operations.len(), self.pending_write_completion_operations.len())?;
        write!(f, " next_operation_id:{} }}", self.next_operation_id)
    }

    fn log_trace(&self, f: &mut Formatter<'_>) -> Result {
        self.write_state_prefix(f)?;

        write!(f, " operations:{{")?;
        for (id, operation) in self.operations.iter() {
            write!(f, " ({},{})", *id, mqtt_packet_to_str(&operation.packet))?;
        }
        write!(f, " }},")?;

        write!(f, " operation_ack_timeouts:{} timeouts pending,", self.operation_ack_timeouts.len())?;
        write!(f, " user_operation_queue:{:?},", self.user_operation_queue)?;
        write!(f, " resubmit_operation_queue: {:?},", self.resubmit_operation_queue)?;
        write!(f, " high_priority_operation_queue: {:?},", self.high_priority_operation_queue)?;
        write!(f, " qos2_incomplete_incoming_publishes: {:?},", self.qos2_incomplete_incoming_publishes)?;

        Self::write_packet_id_table(f, "allocated_packet_ids", self.allocated_packet_ids.iter())?;
        Self::write_packet_id_table(f, "pending_publish_operations", self.pending_publish_operations.iter())?;
        Self::write_packet_id_table(f, "pending_non_publish_operations", self.pending_non_publish_operations.iter())?;

        write!(f, " pending_write_completion_operations: {:?},", self.pending_write_completion_operations)?;
        write!(f, " next_operation_id: {} }}", self.next_operation_id)
    }

    fn log_state(&self) {
        match log::max_level() {
            LevelFilter::Debug => debug!("{}", self),
            LevelFilter::Trace => trace!("{}", self),
            _ => {}
        }
    }

    fn update_internal_clock(&mut self, current_time: &Instant) {
        self.current_time = *current_time;
        self.elapsed_time_ms = (*current_time - self.config.base_timestamp).as_millis();
    }

    fn get_elapsed_millis(&self, timepoint: &Instant) -> u128 {
        (*timepoint - self.config.base_timestamp).as_millis()
    }

    fn partition_operation_queue_by_queue_policy(&self, queue: &VecDeque<u64>, policy: &OfflineQueuePolicy) -> (VecDeque<u64>, VecDeque<u64>) {
        partition_operations_by_queue_policy(queue.iter().filter(|id| {
            self.operations.contains_key(*id)
        }).map(|id| {
            (*id, &*self.operations.get(id).unwrap().packet)
        }), policy)
    }

    fn should_retain_high_priority_operation(&self, id: u64) -> bool {
        if let Some(operation) = self.operations.get(&id) {
            if operation.qos2_pubrel.is_some() {
                return true;
            }
        }

        false
    }

    fn partition_high_priority_queue_for_disconnect<T>(&self, iterator: T) -> (VecDeque<u64>, VecDeque<u64>) where T : Iterator<Item = u64> {
        let mut retained = VecDeque::new();
        let mut rejected = VecDeque::new();

        iterator.for_each(|id| {
            if self.should_retain_high_priority_operation(id) {
                retained.push_back(id);
            } else {
                rejected.push_back(id);
            }
        });

        (retained, rejected)
    }

    fn apply_disconnect_completion(&mut self, operation: &EndpointOperation) -> SchistResult<()> {
        if let MqttPacket::Disconnect(_) = &*operation.packet {
            if self.state == ProtocolStateType::Disconnecting {
                self.state = ProtocolStateType::Halted;
            }
            info!("[{} ms] apply_disconnect_completion - user-requested disconnect operation {} completed", self.elapsed_time_ms, operation.id);
            return Err(SchistError::new_user_initiated_disconnect());
        }

        Ok(())
    }

    // Releases every table entry and allocator binding the operation's packet id holds.
    fn release_packet_id_bindings(&mut self, operation: &EndpointOperation) {
        if let Some(packet_id) = operation.packet_id {
            self.allocated_packet_ids.remove(&packet_id);
            self.pending_publish_operations.remove(&packet_id);
            self.pending_non_publish_operations.remove(&packet_id);
            self.resend_store.complete(packet_id);
            self.config.packet_id_allocator.release(packet_id);
        }
    }

    fn complete_operation_as_success(&mut self, id : u64, completion_result: Option<OperationResponse>) -> SchistResult<()> {
        let Some(operation) = self.operations.remove(&id) else {
            error!("[{} ms] complete_operation_as_success - operation id {} does not exist", self.elapsed_time_ms, id);
            return Err(SchistError::new_internal_state_error("cannot complete an operation that does not exist"));
        };

        self.release_packet_id_bindings(&operation);
        self.apply_ping_extension_on_operation_success(&operation);
        self.apply_disconnect_completion(&operation)?;

        match operation.options {
            None => {
                info!("[{} ms] complete_operation_as_success - internal {} operation {} completed", self.elapsed_time_ms, mqtt_packet_to_str(&operation.packet), id);
                Ok(())
            }
            Some(mut options) => {
                info!("[{} ms] complete_operation_as_success - user {} operation {} completed", self.elapsed_time_ms, mqtt_packet_to_str(&operation.packet), id);
                complete_operation_with_result(&mut options, completion_result)
            }
        }
    }

    fn complete_operation_as_failure(&mut self, id : u64, error: SchistError) -> SchistResult<()> {
        let Some(operation) = self.operations.remove(&id) else {
            // not fatal; the limits of the priority queue implementation used for timeouts
            // can result in situations where we try to fail an operation that has already
            // completed
            warn!("[{} ms] complete_operation_as_failure ({}) - operation id {} does not exist", self.elapsed_time_ms, error, id);
            return Ok(())
        };

        self.release_packet_id_bindings(&operation);
        self.apply_disconnect_completion(&operation)?;

        match operation.options {
            None => {
                info!("[{} ms] complete_operation_as_failure ({}) - internal {} operation {} completed", self.elapsed_time_ms, error, mqtt_packet_to_str(&operation.packet), id);
                Ok(())
            }
            Some(mut options) => {
                info!("[{} ms] complete_operation_as_failure ({}) - user {} operation {} completed", self.elapsed_time_ms, error, mqtt_packet_to_str(&operation.packet), id);
                complete_operation_with_error(&mut options, error)
            }
        }
    }

    fn complete_operation_sequence_as_failure<T>(&mut self, iterator: T, error_fn: fn() -> SchistError) -> SchistResult<()> where T : Iterator<Item = u64> {
        let mut result = Ok(());
        for id in iterator {
            result = fold_mqtt_result(result, self.complete_operation_as_failure(id, error_fn()));
        }

        result
    }

    fn complete_operation_sequence_as_empty_success<T>(&mut self, iterator: T) -> SchistResult<()> where T : Iterator<Item = u64> {
        let mut result = Ok(());
        for id in iterator {
            result = fold_mqtt_result(result, self.complete_operation_as_success(id, None));
        }

        result
    }

    fn handle_network_event_connection_opened(&mut self, context: &NetworkEventContext) -> SchistResult<()> {
        if self.state != ProtocolStateType::Disconnected {
            error!("[{} ms] handle_network_event_connection_opened - called in invalid state", self.elapsed_time_ms);
            self.change_state(ProtocolStateType::Halted);
            return Err(SchistError::new_internal_state_error("connection opened in an invalid state"));
        }

        let NetworkEvent::ConnectionOpened(connection_opened_context) = &context.event else {
            panic!("Connection opened handler reached with a different event type");
        };

        info!("[{} ms] handle_network_event_connection_opened", self.elapsed_time_ms);
        self.pending_write_completion = false;
        self.decoder.reset_for_new_connection();

        match self.endpoint_role {
            EndpointRole::Client => {
                self.change_state(ProtocolStateType::Connecting);

                // Queue up a Connect packet
                let connect = self.create_connect();
                let connect_op_id = self.create_operation(connect, None);

                self.enqueue_operation(connect_op_id, ProtocolQueueType::HighPriority, ProtocolEnqueuePosition::Front);

                let connack_timeout = connection_opened_context.establishment_timeout;

                debug!("[{} ms] handle_network_event_connection_opened - setting connack timeout to {} ms", self.elapsed_time_ms, self.get_elapsed_millis(&connack_timeout));
                self.connack_timeout_timepoint = Some(connack_timeout);
            }
            EndpointRole::Server => {
                // the accept-side handshake lives above this layer; by the time the
                // transport hands us a connection the session is live
                self.change_state(ProtocolStateType::Connected);
                self.current_settings = Some(build_server_role_settings(&self.config.connect_options));
                self.outbound_alias_resolver.borrow_mut().reset_for_new_connection(0);
                self.inbound_alias_resolver.reset_for_new_connection();
                self.next_ping_timepoint = None;
                self.ping_timeout_timepoint = None;
            }
        }

        Ok(())
    }

    fn handle_network_event_connection_closed(&mut self, _: &mut NetworkEventContext) -> SchistResult<()> {
        if self.state == ProtocolStateType::Disconnected {
            error!("[{} ms] handle_network_event_connection_closed - called in invalid state", self.elapsed_time_ms);
            return Err(SchistError::new_internal_state_error("connection closed in an invalid state"));
        }

        info!("[{} ms] handle_network_event_connection_closed", self.elapsed_time_ms);
        self.change_state(ProtocolStateType::Disconnected);
        self.connack_timeout_timepoint = None;
        self.next_ping_timepoint = None;
        self.ping_timeout_timepoint = None;
        self.operation_ack_timeouts.clear();

        let mut result : SchistResult<()> = Ok(());

        // High priority queue: pubacks, pings, pubrecs, pubcomps and disconnects can all be
        // failed without consequence.  Pubrels are left alone but not requeued; when the
        // pending publish table is processed below, the associated operation will land in the
        // resubmit queue.
        let high_priority = mem::take(&mut self.high_priority_operation_queue);
        let (_, failures) = self.partition_high_priority_queue_for_disconnect(high_priority.into_iter());

        result = fold_mqtt_result(result, self.complete_operation_sequence_as_failure(failures.into_iter(), generate_connection_closed_error));

        // Operations waiting on write completion are either requeued (if they pass the offline
        // queue policy, e.g. qos 0 publish under preserve-all) or failed on the spot.
        let awaiting_write_completion = mem::take(&mut self.pending_write_completion_operations);
        let (mut retained, rejected) = self.partition_operation_queue_by_queue_policy(&awaiting_write_completion, &self.config.endpoint_options.offline_queue_policy);

        self.user_operation_queue.append(&mut retained);
        result = fold_mqtt_result(result, self.complete_operation_sequence_as_failure(rejected.into_iter(), generate_offline_queue_policy_failed_error));

        // Unacked qos1+ publishes (and their pubrels) get marked duplicate and moved to the
        // resubmit queue.  They are re-checked on the next successful connection: if no session
        // is resumed, the offline queue policy gets applied to them then.
        let unacked_publishes = mem::take(&mut self.pending_publish_operations);
        for (_, id) in unacked_publishes {
            self.set_publish_duplicate_flag(id, true);
            self.resubmit_operation_queue.push_back(id);
        }

        // Unacked subscribes and unsubscribes return to the user queue and take their chances
        // with the offline queue policy below.
        let unacked_sub_unsubs = mem::take(&mut self.pending_non_publish_operations);
        for (_, id) in unacked_sub_unsubs {
            self.user_operation_queue.push_front(id);
        }

        let user_queue = mem::take(&mut self.user_operation_queue);
        let (mut retained_user, rejected_user) = self.partition_operation_queue_by_queue_policy(&user_queue, &self.config.endpoint_options.offline_queue_policy);
        result = fold_mqtt_result(result, self.complete_operation_sequence_as_failure(rejected_user.into_iter(), generate_offline_queue_policy_failed_error));

        self.user_operation_queue.append(&mut retained_user);

        result
    }

    fn handle_network_event_write_completion(&mut self, _: &NetworkEventContext) -> SchistResult<()> {
        if self.state == ProtocolStateType::Halted || self.state == ProtocolStateType::Disconnected {
            error!("[{} ms] handle_network_event_write_completion - called in invalid state", self.elapsed_time_ms);
            return Err(SchistError::new_internal_state_error("write completion in an invalid state"));
        }

        if !self.pending_write_completion {
            error!("[{} ms] handle_network_event_write_completion - called with no pending completion", self.elapsed_time_ms);
            self.change_state(ProtocolStateType::Halted);

            return Err(SchistError::new_internal_state_error("write completion called with no pending completion"));
        }

        debug!("[{} ms] handle_network_event - write completion", self.elapsed_time_ms);

        self.pending_write_completion = false;

        let completions = mem::take(&mut self.pending_write_completion_operations);
        self.complete_operation_sequence_as_empty_success(completions.into_iter())
    }

    fn change_state(&mut self, next_state: ProtocolStateType) {
        debug!("[{} ms] change_state - transitioning from {} to {}", self.elapsed_time_ms, self.state, next_state);
        self.state = next_state;
    }

    fn is_connect_packet(&self, id: u64) -> bool {
        if let Some(operation) = self.operations.get(&id) {
            return mqtt_packet_to_packet_type(&operation.packet) == PacketType::Connect;
        }

        false
    }

    fn is_connect_in_queue(&self) -> bool {
        self.high_priority_operation_queue.iter().any(|id| self.is_connect_packet(*id))
    }

    fn handle_network_event_incoming_data(&mut self, context: &mut NetworkEventContext, data: &[u8]) -> SchistResult<()> {
        if self.state == ProtocolStateType::Disconnected || self.state == ProtocolStateType::Halted {
            error!("[{} ms] handle_network_event_incoming_data - called in invalid state", self.elapsed_time_ms);
            return Err(SchistError::new_internal_state_error("incoming network data while in an invalid state"));
        }

        if self.state == ProtocolStateType::Connecting && self.is_connect_in_queue() {
            error!("[{} ms] handle_network_event_incoming_data - data received before CONNECT sent", self.elapsed_time_ms);
            self.change_state(ProtocolStateType::Halted);
            return Err(SchistError::new_protocol_error("data received before CONNECT sent"));
        }

        debug!("[{} ms] handle_network_event_incoming_data received {} bytes", self.elapsed_time_ms, data.len());
        let mut decoded_packets = VecDeque::new();
        let mut decode_context = DecodingContext {
            maximum_packet_size: self.get_maximum_incoming_packet_size(),
            protocol_version: self.protocol_version,
            decoded_packets: &mut decoded_packets
        };

        if let Err(error) = self.decoder.decode_bytes(data, &mut decode_context) {
            return Err(self.halt_incoming_data("decode failure", error));
        }

        for mut packet in decoded_packets {
            if let MqttPacket::Publish(publish) = &mut(*packet) {
                if let Err(error) = self.inbound_alias_resolver.resolve_topic_alias(&publish.topic_alias, &mut publish.topic) {
                    error!("[{} ms] handle_network_event_incoming_data - topic alias resolution failure", self.elapsed_time_ms);
                    return Err(error);
                }
            }

            let validation_context = InboundValidationContext {
                negotiated_settings : self.current_settings.as_ref()
            };

            if let Err(error) = validate_packet_inbound_internal(&packet, &validation_context) {
                return Err(self.halt_incoming_data("incoming packet validation failure", error));
            }

            if let Err(error) = self.handle_packet(packet, context) {
                return Err(self.halt_incoming_data("packet handling failure", error));
            }
        }

        Ok(())
    }

    fn halt_incoming_data(&mut self, description: &str, error: SchistError) -> SchistError {
        error!("[{} ms] handle_network_event_incoming_data - {}", self.elapsed_time_ms, description);
        self.change_state(ProtocolStateType::Halted);
        error
    }

    // blocks packet processing if the next packet is a qos1+ publish and
    // we are at the negotiated limit for unacknowledged qos1+ publishes.  This is technically
    // not spec-compliant because the spec requires receive maximum to not block other non-publish
    // packets from going out.  The intent of that requirement was to keep acks, pings,
    // disconnects all flowing while at the maximum, and those bypass this check by virtue of
    // living in the high priority queue.
    fn does_operation_pass_receive_maximum_flow_control(&self, id: u64) -> bool {
        if let Some(settings) = &self.current_settings {
            if self.pending_publish_operations.len() >= settings.receive_maximum_from_peer as usize {
                if let Some(operation) = self.operations.get(&id) {
                    if let MqttPacket::Publish(publish) = &*operation.packet {
                        if publish.qos != QualityOfService::AtMostOnce {
                            return false;
                        }
                    }
                }
            }
        }

        true
    }

    fn dequeue_operation(&mut self, mode: ProtocolQueueServiceMode) -> Option<u64> {
        if self.pending_write_completion {
            return None;
        }

        if let Some(id) = self.high_priority_operation_queue.pop_front() {
            return Some(id);
        }

        if mode == ProtocolQueueServiceMode::HighPriorityOnly {
            return None;
        }

        // resubmissions go out ahead of fresh user operations, both subject to flow control
        if let Some(front_id) = self.resubmit_operation_queue.front().copied() {
            if !self.does_operation_pass_receive_maximum_flow_control(front_id) {
                return None;
            }

            return self.resubmit_operation_queue.pop_front();
        }

        if let Some(front_id) = self.user_operation_queue.front().copied() {
            if !self.does_operation_pass_receive_maximum_flow_control(front_id) {
                return None;
            }

            return self.user_operation_queue.pop_front();
        }

        None
    }

    fn compute_outbound_alias_resolution(&self, packet: &MqttPacket) -> OutboundAliasResolution {
        if let MqttPacket::Publish(publish) = packet {
            return self.outbound_alias_resolver.borrow_mut().resolve_and_apply_topic_alias(&publish.topic_alias, &publish.topic);
        }

        OutboundAliasResolution{ ..Default::default() }
    }

    fn get_next_ack_timeout(&mut self) -> Option<u64> {
        if let Some(reverse_record) = self.operation_ack_timeouts.peek() {
            let record = &reverse_record.0;
            if record.timeout <= self.current_time {
                return Some(record.id);
            }
        }

        None
    }

    fn process_ack_timeouts(&mut self) -> SchistResult<()> {
        let mut result = Ok(());

        while let Some(id) = self.get_next_ack_timeout() {
            self.operation_ack_timeouts.pop();
            result = fold_mqtt_result(result, self.complete_operation_as_failure(id, SchistError::new_ack_timeout()));
        }

        result
    }

    fn get_operation_timeout_duration(&self, operation: &EndpointOperation) -> Option<Duration> {
        let operation_timeout = match &operation.options {
            Some(EndpointOperationOptions::Publish(publish_options)) => publish_options.options.ack_timeout,
            Some(EndpointOperationOptions::Subscribe(subscribe_options)) => subscribe_options.options.ack_timeout,
            Some(EndpointOperationOptions::Unsubscribe(unsubscribe_options)) => unsubscribe_options.options.ack_timeout,
            None => return None,
        };

        operation_timeout.or(self.config.endpoint_options.ack_timeout)
    }

    fn start_operation_ack_timeout(&mut self, id: u64, now: Instant) {
        let mut timeout_duration_option : Option<Duration> = None;
        if let Some(operation) = self.operations.get(&id) {
            timeout_duration_option = self.get_operation_timeout_duration(operation);
        }

        if let Some(timeout_duration) = timeout_duration_option {
            let timeout = now + timeout_duration;

            let timeout_record = OperationTimeoutRecord {
                id,
                timeout
            };

            self.operation_ack_timeouts.push(Reverse(timeout_record));
        }
    }

    fn apply_ping_extension_on_operation_success(&mut self, operation: &EndpointOperation) {
        let mut extension_base_option : Option<Instant> = None;

        match &*operation.packet {
            MqttPacket::Subscribe(_) | MqttPacket::Unsubscribe(_) => {
                extension_base_option = operation.ping_extension_base_timepoint;
            }
            MqttPacket::Publish(publish) => {
                if publish.qos != QualityOfService::AtMostOnce {
                    extension_base_option = operation.ping_extension_base_timepoint;
                }
            }
            _ => {}
        }

        if let (Some(extension_base), Some(settings)) = (extension_base_option, &self.current_settings) {
            let potential_extension = extension_base + Duration::from_secs(settings.server_keep_alive as u64);
            if self.next_ping_timepoint.is_some() && potential_extension > self.next_ping_timepoint.unwrap() {
                self.next_ping_timepoint = Some(potential_extension);
            }
        }
    }

    fn on_operation_fully_written(&mut self, id: u64, now: Instant) -> SchistResult<()> {
        let operation = self.operations.get_mut(&id).unwrap();
        let mut resend_record : Option<(u16, Box<MqttPacket>)> = None;

        match &*operation.packet {
            MqttPacket::Subscribe(subscribe) => {
                self.pending_non_publish_operations.insert(subscribe.packet_id, id);
            }
            MqttPacket::Unsubscribe(unsubscribe) => {
                self.pending_non_publish_operations.insert(unsubscribe.packet_id, id);
            }
            MqttPacket::Publish(publish) => {
                if publish.qos == QualityOfService::AtMostOnce {
                    self.pending_write_completion_operations.push_back(id);
                } else {
                    self.pending_publish_operations.insert(publish.packet_id, id);
                    if let Some(pubrel) = &operation.qos2_pubrel {
                        // the bytes just flushed were the pubrel, which supersedes the publish
                        // as this exchange's replay packet
                        self.resend_store.complete(publish.packet_id);
                        resend_record = Some((publish.packet_id, pubrel.clone()));
                    } else {
                        resend_record = Some((publish.packet_id, operation.packet.clone()));
                    }
                }
            }
            MqttPacket::Disconnect(_) => {
                self.state = ProtocolStateType::Disconnecting;
                self.pending_write_completion_operations.push_back(id);
            }
            _ => {
                self.pending_write_completion_operations.push_back(id);
            }
        }

        operation.ping_extension_base_timepoint = Some(now);

        if let Some((packet_id, packet)) = resend_record {
            self.resend_store.record(packet_id, packet, now)?;
        }

        self.start_operation_ack_timeout(id, now);

        Ok(())
    }

    fn service_disconnected(&mut self, _: &mut ServiceContext) -> SchistResult<()> {
        debug!("[{} ms] service_disconnected", self.elapsed_time_ms);
        Ok(())
    }

    fn service_queue_aux(&mut self, context: &mut ServiceContext, mode: ProtocolQueueServiceMode) -> SchistResult<()> {
        while self.state == ProtocolStateType::Connecting || self.state == ProtocolStateType::Connected {
            let Some(id) = self.dequeue_operation(mode) else {
                debug!("[{} ms] service_queue - no operations ready for processing", self.elapsed_time_ms);
                return Ok(())
            };

            debug!("[{} ms] service_queue - operation {} dequeued for processing", self.elapsed_time_ms, id);
            if !self.operations.contains_key(&id) {
                warn!("[{} ms] service_queue - operation {} does not exist", self.elapsed_time_ms, id);
                continue;
            }

            // an exhausted packet id space fails this operation, not the connection
            if let Err(error) = self.acquire_packet_id_for_operation(id) {
                warn!("[{} ms] service_queue - operation {} could not bind a packet id", self.elapsed_time_ms, id);
                self.complete_operation_as_failure(id, error)?;
                continue;
            }

            let operation = self.operations.get(&id).unwrap();
            let mut packet = &*operation.packet;
            if let Some(pubrel) = &operation.qos2_pubrel {
                packet = &**pubrel;
            }

            let outbound_alias_resolution = self.compute_outbound_alias_resolution(packet);

            let validation_context = OutboundValidationContext {
                negotiated_settings : self.current_settings.as_ref(),
                connect_options: Some(&self.config.connect_options),
                outbound_alias_resolution: Some(outbound_alias_resolution)
            };

            if let Err(error) = validate_packet_outbound_internal(packet, &validation_context) {
                warn!("[{} ms] service_queue - {} operation {} failed last-chance validation", self.elapsed_time_ms, mqtt_packet_to_str(packet), id);
                self.complete_operation_as_failure(id, error)?;
                continue;
            }

            let encode_context = EncodingContext {
                outbound_alias_resolution,
                protocol_version: self.protocol_version,
            };

            encode_packet_to_buffer(packet, &encode_context, context.to_socket)?;
            debug!("[{} ms] service_queue - operation {} encoded to outbound buffer", self.elapsed_time_ms, id);

            self.on_operation_fully_written(id, context.current_time)?;

            if !self.config.endpoint_options.bulk_write {
                return Ok(())
            }
        }

        Ok(())
    }

    fn service_queue(&mut self, context: &mut ServiceContext, mode: ProtocolQueueServiceMode) -> SchistResult<()> {
        let to_socket_length = context.to_socket.len();

        let result = self.service_queue_aux(context, mode);

        if context.to_socket.len() != to_socket_length {
            self.pending_write_completion = true;
        }

        result
    }

    fn service_connecting(&mut self, context: &mut ServiceContext) -> SchistResult<()> {
        debug!("[{} ms] service_connecting", self.elapsed_time_ms);

        if context.current_time >= self.connack_timeout_timepoint.unwrap() {
            error!("[{} ms] service_connecting - connack timeout exceeded", self.elapsed_time_ms);
            return Err(SchistError::new_connection_establishment_failure("connack response timeout reached"));
        }

        self.service_queue(context, ProtocolQueueServiceMode::HighPriorityOnly)?;

        Ok(())
    }

    fn service_keep_alive(&mut self, context: &mut ServiceContext) -> SchistResult<()> {
        if let Some(ping_timeout) = &self.ping_timeout_timepoint {
            if &context.current_time >= ping_timeout {
                error!("[{} ms] service_keep_alive - keep alive timeout exceeded", self.elapsed_time_ms);
                return Err(SchistError::new_connection_closed("keep alive timeout exceeded"));
            }
        } else if let Some(next_ping) = &self.next_ping_timepoint {
            if &context.current_time >= next_ping {
                debug!("[{} ms] service_keep_alive - next ping time reached, sending ping", self.elapsed_time_ms);
                let ping = Box::new(MqttPacket::Pingreq(PingreqPacket{}));
                let ping_op_id = self.create_operation(ping, None);

                self.enqueue_operation(ping_op_id, ProtocolQueueType::HighPriority, ProtocolEnqueuePosition::Front);

                let server_keep_alive = self.current_settings.as_ref().unwrap().server_keep_alive as u64;

                // Regardless of ping timeout configuration, if we haven't heard anything by KeepAlive * 1.5, then
                // close the connection.  Computed in milliseconds so a one second keep alive still
                // leaves a non-zero response window.
                let final_timeout = self.config.endpoint_options.ping_timeout.min(Duration::from_millis(server_keep_alive * 500));
                self.ping_timeout_timepoint = Some(context.current_time + final_timeout);

                if server_keep_alive > 0 {
                    self.next_ping_timepoint = Some(context.current_time + Duration::from_secs(server_keep_alive));
                }
            }
        }

        Ok(())
    }

    fn service_connected(&mut self, context: &mut ServiceContext) -> SchistResult<()> {
        debug!("[{} ms] service_connected", self.elapsed_time_ms);

        self.service_keep_alive(context)?;
        self.service_queue(context, ProtocolQueueServiceMode::All)?;
        self.process_ack_timeouts()?;

        Ok(())
    }

    fn service_disconnecting(&mut self, _: &mut ServiceContext) -> SchistResult<()> {
        debug!("[{} ms] service_disconnecting", self.elapsed_time_ms);

        self.process_ack_timeouts()?;

        Ok(())
    }

    fn get_next_service_timepoint_protocol_queue(&self, mode: ProtocolQueueServiceMode) -> Option<Instant> {
        if self.pending_write_completion {
            return None;
        }

        if !self.high_priority_operation_queue.is_empty() {
            return Some(self.current_time);
        }

        if mode == ProtocolQueueServiceMode::All {
            // the head operation may be blocked by receive_maximum flow control
            let head = self.resubmit_operation_queue.front().or(self.user_operation_queue.front());
            if let Some(head_id) = head {
                if !self.does_operation_pass_receive_maximum_flow_control(*head_id) {
                    return None;
                }

                return Some(self.current_time);
            }
        }

        None
    }

    fn get_next_service_timepoint_disconnected(&self) -> Option<Instant> {
        None
    }

    fn get_next_service_timepoint_connecting(&self) -> Option<Instant> {
        fold_timepoint(&self.get_next_service_timepoint_protocol_queue(ProtocolQueueServiceMode::HighPriorityOnly), &self.connack_timeout_timepoint.unwrap())
    }

    fn get_next_service_timepoint_connected(&self) -> Option<Instant> {
        let mut next_service_time: Option<Instant> = fold_optional_timepoint_min(&None, &self.ping_timeout_timepoint);

        if let Some(ack_timeout) = self.operation_ack_timeouts.peek() {
            next_service_time = fold_timepoint(&next_service_time, &ack_timeout.0.timeout);
        }

        if self.pending_write_completion {
            return next_service_time;
        }

        next_service_time = fold_optional_timepoint_min(&next_service_time, &self.next_ping_timepoint);

        fold_optional_timepoint_min(&self.get_next_service_timepoint_protocol_queue( ProtocolQueueServiceMode::All), &next_service_time)
    }

    fn get_next_service_timepoint_disconnecting(&self) -> Option<Instant> {
        let mut next_service_time = self.get_next_service_timepoint_protocol_queue(ProtocolQueueServiceMode::HighPriorityOnly);

        if let Some(ack_timeout) = self.operation_ack_timeouts.peek() {
            next_service_time = fold_timepoint(&next_service_time, &ack_timeout.0.timeout);
        }

        next_service_time
    }

    fn unbind_operation_packet_id(&mut self, id: u64) {
        if let Some(operation) = self.operations.get_mut(&id) {
            if let Some(packet_id) = operation.packet_id {
                self.allocated_packet_ids.remove(&packet_id);
                self.config.packet_id_allocator.release(packet_id);
                operation.unbind_packet_id();
            }
        }
    }

    fn clear_qos2_state(&mut self, id: u64) {
        if let Some(operation) = self.operations.get_mut(&id) {
            operation.qos2_pubrel = None;
        }
    }

    fn set_publish_duplicate_flag(&mut self, id: u64, value: bool) {
        if let Some(operation) = self.operations.get_mut(&id) {
            if let MqttPacket::Publish(publish) = &mut *operation.packet {
                debug!("[{} ms] set_publish_duplicate_flag - setting publish operation {} duplicate field to {}", self.elapsed_time_ms, id, value);
                publish.duplicate = value;
            }
        }
    }

    fn apply_replay_packet_to_operation(&mut self, id: u64, packet: Box<MqttPacket>) {
        if let Some(operation) = self.operations.get_mut(&id) {
            match &*packet {
                MqttPacket::Pubrel(_) => {
                    operation.qos2_pubrel = Some(packet);
                }
                _ => {
                    operation.packet = packet;
                }
            }
        }
    }

    fn apply_session_present_to_connection(&mut self, session_present: bool, now: Instant) -> SchistResult<()> {
        let mut result = Ok(());

        if !session_present {
            info!("[{} ms] apply_session_present_to_connection - starting a clean session", self.elapsed_time_ms);

            // No session.  Everything in the resubmit queue gets checked against the offline
            // policy and either failed or moved to the user queue.
            let resubmit = mem::take(&mut self.resubmit_operation_queue);
            let (mut retained, rejected) = self.partition_operation_queue_by_queue_policy(&resubmit, &self.config.endpoint_options.offline_queue_policy);

            for id in &retained {
                self.set_publish_duplicate_flag(*id, false);
            }
            self.user_operation_queue.append(&mut retained);

            result = self.complete_operation_sequence_as_failure(rejected.into_iter(), generate_offline_queue_policy_failed_error);

            self.resend_store.reset();
            self.qos2_incomplete_incoming_publishes.clear();

            // inbound alias bindings only survive a reconnect alongside the session they
            // belong to
            self.inbound_alias_resolver.reset_for_new_connection();

            assert!(self.resubmit_operation_queue.is_empty());
        } else {
            info!("[{} ms] apply_session_present_to_connection - successfully rejoined a session", self.elapsed_time_ms);

            // Session resumed.  The redelivery store is the authority on replay content: it
            // refreshes duplicate flags, recomputes message expiry against elapsed time, and
            // names the entries whose expiry has lapsed.
            let (replay, expired) = self.resend_store.pending(now);

            for packet_id in expired {
                if let Some(operation_id) = self.allocated_packet_ids.get(&packet_id).copied() {
                    debug!("[{} ms] apply_session_present_to_connection - operation {} expired awaiting replay", self.elapsed_time_ms, operation_id);
                    result = fold_mqtt_result(result, self.complete_operation_as_failure(operation_id, SchistError::new_ack_timeout()));
                }
            }

            for entry in replay {
                if let Some(operation_id) = self.allocated_packet_ids.get(&entry.packet_id).copied() {
                    self.apply_replay_packet_to_operation(operation_id, entry.packet);
                }
            }

            let operations = &self.operations;
            self.resubmit_operation_queue.retain(|id| operations.contains_key(id));
        }

        // at this point, anything in the user queue is starting over, so drop any packet id
        // associations and reset qos2 publishes
        let user_queue = mem::take(&mut self.user_operation_queue);
        for id in &user_queue {
            self.unbind_operation_packet_id(*id);
            self.clear_qos2_state(*id);
        }
        self.user_operation_queue = user_queue;

        // re-establish submission order after all the shuffling
        sort_operation_deque(&mut self.resubmit_operation_queue);
        sort_operation_deque(&mut self.user_operation_queue);

        assert!(self.high_priority_operation_queue.is_empty());
        assert!(self.pending_publish_operations.is_empty());
        assert!(self.pending_non_publish_operations.is_empty());
        assert!(self.operation_ack_timeouts.is_empty());
        assert!(self.pending_write_completion_operations.is_empty());

        result
    }

    fn handle_connack(&mut self, packet: Box<MqttPacket>, context: &mut NetworkEventContext) -> SchistResult<()> {
        let MqttPacket::Connack(connack) = *packet else {
            panic!("handle_connack - invalid input");
        };

        info!("[{} ms] handle_connack - processing CONNACK packet", self.elapsed_time_ms);

        if self.endpoint_role != EndpointRole::Client {
            error!("[{} ms] handle_connack - connack received by a server endpoint", self.elapsed_time_ms);
            return Err(SchistError::new_protocol_error("connack received by a server endpoint"));
        }

        if self.state != ProtocolStateType::Connecting {
            error!("[{} ms] handle_connack - invalid state to receive a connack", self.elapsed_time_ms);
            return Err(SchistError::new_protocol_error("invalid state for connack receipt"));
        }

        if connack.reason_code != ConnectReasonCode::Success {
            error!("[{} ms] handle_connack - connection rejected with reason code {:?}", self.elapsed_time_ms, connack.reason_code);
            context.packet_events.push_back(PacketEvent::Connack(connack));
            return Err(SchistError::new_connection_establishment_failure("peer rejected connection attempt with failing connack"));
        }

        validate_connack_packet_inbound_internal(&connack)?;

        self.change_state(ProtocolStateType::Connected);
        self.has_connected_successfully = true;

        let settings = build_negotiated_settings(&self.config, &connack, &self.current_settings);
        debug!("[{} ms] handle_connack - negotiated settings: {}", self.elapsed_time_ms, &settings);

        let server_keep_alive = settings.server_keep_alive as u64;
        self.current_settings = Some(settings);
        self.connack_timeout_timepoint = None;
        self.outbound_alias_resolver.borrow_mut().reset_for_new_connection(connack.topic_alias_maximum.unwrap_or(0));

        self.ping_timeout_timepoint = None;
        self.next_ping_timepoint = match server_keep_alive {
            0 => None,
            seconds => Some(context.current_time + Duration::from_secs(seconds)),
        };

        self.apply_session_present_to_connection(connack.session_present, context.current_time)?;

        context.packet_events.push_back(PacketEvent::Connack(connack));

        Ok(())
    }

    // The connection-management packets clients send.  A server-role endpoint surfaces them to
    // its owner; a client-role endpoint receiving one is facing a broken peer.
    fn check_server_role_for_receive(&self, packet_name: &str) -> SchistResult<()> {
        if self.endpoint_role != EndpointRole::Server {
            error!("[{} ms] {} received by a client endpoint", self.elapsed_time_ms, packet_name);
            return Err(SchistError::new_protocol_error("client-to-server packet received by a client endpoint"));
        }

        Ok(())
    }

    fn handle_connect(&mut self, packet: Box<MqttPacket>, context: &mut NetworkEventContext) -> SchistResult<()> {
        info!("[{} ms] handle_connect - processing CONNECT packet", self.elapsed_time_ms);
        self.check_server_role_for_receive("CONNECT")?;

        let MqttPacket::Connect(connect) = *packet else {
            panic!("handle_connect - invalid input");
        };

        context.packet_events.push_back(PacketEvent::Connect(connect));
        Ok(())
    }

    fn handle_subscribe(&mut self, packet: Box<MqttPacket>, context: &mut NetworkEventContext) -> SchistResult<()> {
        info!("[{} ms] handle_subscribe - processing SUBSCRIBE packet", self.elapsed_time_ms);
        self.check_server_role_for_receive("SUBSCRIBE")?;

        let MqttPacket::Subscribe(subscribe) = *packet else {
            panic!("handle_subscribe - invalid input");
        };

        context.packet_events.push_back(PacketEvent::Subscribe(subscribe));
        Ok(())
    }

    fn handle_unsubscribe(&mut self, packet: Box<MqttPacket>, context: &mut NetworkEventContext) -> SchistResult<()> {
        info!("[{} ms] handle_unsubscribe - processing UNSUBSCRIBE packet", self.elapsed_time_ms);
        self.check_server_role_for_receive("UNSUBSCRIBE")?;

        let MqttPacket::Unsubscribe(unsubscribe) = *packet else {
            panic!("handle_unsubscribe - invalid input");
        };

        context.packet_events.push_back(PacketEvent::Unsubscribe(unsubscribe));
        Ok(())
    }

    fn handle_pingreq(&mut self, context: &mut NetworkEventContext) -> SchistResult<()> {
        info!("[{} ms] handle_pingreq - processing PINGREQ packet", self.elapsed_time_ms);
        self.check_server_role_for_receive("PINGREQ")?;

        context.packet_events.push_back(PacketEvent::Pingreq);

        let pingresp = Box::new(MqttPacket::Pingresp(PingrespPacket{}));
        let pingresp_op_id = self.create_operation(pingresp, None);

        self.enqueue_operation(pingresp_op_id, ProtocolQueueType::HighPriority, ProtocolEnqueuePosition::Back);

        Ok(())
    }

    fn handle_pingresp(&mut self) -> SchistResult<()> {
        info!("[{} ms] handle_pingresp - processing PINGRESP packet", self.elapsed_time_ms);
        match self.state {
            ProtocolStateType::Connected |  ProtocolStateType::Disconnecting => {
                if self.ping_timeout_timepoint.is_some() {
                    self.ping_timeout_timepoint = None;
                    Ok(())
                } else {
                    error!("[{} ms] handle_pingresp - no matching PINGREQ", self.elapsed_time_ms);
                    Err(SchistError::new_protocol_error("pingresp received without an outstanding pingreq"))
                }
            }
            _ => {
                error!("[{} ms] handle_pingresp - invalid state to receive a PINGRESP", self.elapsed_time_ms);
                Err(SchistError::new_protocol_error("invalid state to receive a pingresp"))
            }
        }
    }

    // Shared guard for handlers whose packets are only valid on an established connection.
    fn check_established_for_receive(&self, packet_name: &str) -> SchistResult<()> {
        match self.state {
            ProtocolStateType::Disconnected | ProtocolStateType::Connecting => {
                error!("[{} ms] invalid state to receive a {}", self.elapsed_time_ms, packet_name);
                Err(SchistError::new_protocol_error("packet receipt requires an established connection"))
            }
            _ => Ok(())
        }
    }

    // Routes an ack to the operation bound to its packet id.  An ack with no pending
    // operation is a protocol violation.
    fn complete_acked_operation(&mut self, operation_id: Option<u64>, response: OperationResponse, packet_name: &str, packet_id: u16) -> SchistResult<()> {
        if let Some(id) = operation_id {
            return self.complete_operation_as_success(id, Some(response));
        }

        error!("[{} ms] no matching operation corresponding to {} packet id {}", self.elapsed_time_ms, packet_name, packet_id);
        Err(SchistError::new_protocol_error("ack received with no matching pending operation"))
    }

    fn handle_suback(&mut self, packet: Box<MqttPacket>) -> SchistResult<()> {
        info!("[{} ms] handle_suback - processing SUBACK packet", self.elapsed_time_ms);
        self.check_established_for_receive("SUBACK")?;

        let MqttPacket::Suback(suback) = *packet else {
            panic!("handle_suback - invalid input");
        };

        let packet_id = suback.packet_id;
        let operation_id = self.pending_non_publish_operations.get(&packet_id).copied();
        self.complete_acked_operation(operation_id, OperationResponse::Subscribe(suback), "SUBACK", packet_id)
    }

    fn handle_unsuback(&mut self, packet: Box<MqttPacket>) -> SchistResult<()> {
        info!("[{} ms] handle_unsuback - processing UNSUBACK packet", self.elapsed_time_ms);
        self.check_established_for_receive("UNSUBACK")?;

        let MqttPacket::Unsuback(unsuback) = *packet else {
            panic!("handle_unsuback - invalid input");
        };

        let packet_id = unsuback.packet_id;
        let operation_id = self.pending_non_publish_operations.get(&packet_id).copied();
        self.complete_acked_operation(operation_id, OperationResponse::Unsubscribe(unsuback), "UNSUBACK", packet_id)
    }

    fn handle_puback(&mut self, packet: Box<MqttPacket>) -> SchistResult<()> {
        info!("[{} ms] handle_puback - processing PUBACK packet", self.elapsed_time_ms);
        self.check_established_for_receive("PUBACK")?;

        let MqttPacket::Puback(puback) = *packet else {
            panic!("handle_puback - invalid input");
        };

        let packet_id = puback.packet_id;
        let operation_id = self.pending_publish_operations.get(&packet_id).copied();
        self.complete_acked_operation(operation_id, OperationResponse::Publish(PublishResponse::Qos1(puback)), "PUBACK", packet_id)
    }

    fn handle_pubrec(&mut self, packet: Box<MqttPacket>) -> SchistResult<()> {
        info!("[{} ms] handle_pubrec - processing PUBREC packet", self.elapsed_time_ms);
        self.check_established_for_receive("PUBREC")?;

        let MqttPacket::Pubrec(pubrec) = *packet else {
            panic!("handle_pubrec - invalid input");
        };

        let packet_id = pubrec.packet_id;
        let Some(operation_id) = self.pending_publish_operations.get(&packet_id).copied() else {
            error!("[{} ms] handle_pubrec - no matching operation corresponding to PUBREC packet id {}", self.elapsed_time_ms, packet_id);
            return Err(SchistError::new_protocol_error("no pending operation exists for incoming pubrec"));
        };

        // a failing pubrec ends the exchange here; success continues it with a pubrel
        if pubrec.reason_code as u8 >= 128 {
            return self.complete_operation_as_success(operation_id, Some(OperationResponse::Publish(PublishResponse::Qos2(Qos2Response::Pubrec(pubrec)))));
        }

        let Some(operation) = self.operations.get_mut(&operation_id) else {
            warn!("[{} ms] handle_pubrec - operation {} corresponding to packet id {} does not exist", self.elapsed_time_ms, operation_id, packet_id);
            return Ok(());
        };

        let is_qos2_publish = matches!(&*operation.packet, MqttPacket::Publish(publish) if publish.qos == QualityOfService::ExactlyOnce);
        if !is_qos2_publish {
            error!("[{} ms] handle_pubrec - operation {} corresponding to packet id {} is not a QoS 2 publish", self.elapsed_time_ms, operation_id, packet_id);
            return Err(SchistError::new_protocol_error("pubrec received for a pending operation that is not a qos2 publish"));
        }

        operation.qos2_pubrel = Some(Box::new(MqttPacket::Pubrel(PubrelPacket {
            packet_id,
            ..Default::default()
        })));

        self.enqueue_operation(operation_id, ProtocolQueueType::HighPriority, ProtocolEnqueuePosition::Back);
        Ok(())
    }

    fn handle_pubrel(&mut self, packet: Box<MqttPacket>) -> SchistResult<()> {
        info!("[{} ms] handle_pubrel - processing PUBREL packet", self.elapsed_time_ms);
        self.check_established_for_receive("PUBREL")?;

        let MqttPacket::Pubrel(pubrel) = &*packet else {
            panic!("handle_pubrel - invalid input");
        };

        self.qos2_incomplete_incoming_publishes.remove(&pubrel.packet_id);

        let pubcomp = Box::new(MqttPacket::Pubcomp(PubcompPacket{
            packet_id: pubrel.packet_id,
            ..Default::default()
        }));
        let pubcomp_op_id = self.create_operation(pubcomp, None);

        self.enqueue_operation(pubcomp_op_id, ProtocolQueueType::HighPriority, ProtocolEnqueuePosition::Back);

        Ok(())
    }

    fn handle_pubcomp(&mut self, packet: Box<MqttPacket>) -> SchistResult<()> {
        info!("[{} ms] handle_pubcomp - processing PUBCOMP packet", self.elapsed_time_ms);
        self.check_established_for_receive("PUBCOMP")?;

        let MqttPacket::Pubcomp(pubcomp) = *packet else {
            panic!("handle_pubcomp - invalid input");
        };

        let packet_id = pubcomp.packet_id;
        let operation_id = self.pending_publish_operations.get(&packet_id).copied();
        self.complete_acked_operation(operation_id, OperationResponse::Publish(PublishResponse::Qos2(Qos2Response::Pubcomp(pubcomp))), "PUBCOMP", packet_id)
    }

    fn handle_publish(&mut self, packet: Box<MqttPacket>, context: &mut NetworkEventContext) -> SchistResult<()> {
        info!("[{} ms] handle_publish - processing PUBLISH packet", self.elapsed_time_ms);
        self.check_established_for_receive("PUBLISH")?;

        let MqttPacket::Publish(publish) = *packet else {
            panic!("handle_publish - invalid input");
        };

        let packet_id = publish.packet_id;
        let qos = publish.qos;

        // qos2 duplicate suppression: a packet id already in the incomplete set means this
        // delivery was surfaced before; ack it but do not surface it again
        let surface = qos != QualityOfService::ExactlyOnce || !self.qos2_incomplete_incoming_publishes.contains(&packet_id);
        if surface {
            if qos == QualityOfService::ExactlyOnce {
                self.qos2_incomplete_incoming_publishes.insert(packet_id);
            }
            context.packet_events.push_back(PacketEvent::Publish(publish));
        }

        let ack = match qos {
            QualityOfService::AtMostOnce => return Ok(()),
            QualityOfService::AtLeastOnce => MqttPacket::Puback(PubackPacket{ packet_id, ..Default::default() }),
            QualityOfService::ExactlyOnce => MqttPacket::Pubrec(PubrecPacket{ packet_id, ..Default::default() }),
        };

        let ack_op_id = self.create_operation(Box::new(ack), None);
        self.enqueue_operation(ack_op_id, ProtocolQueueType::HighPriority, ProtocolEnqueuePosition::Back);

        Ok(())
    }

    fn handle_disconnect(&mut self, packet: Box<MqttPacket>, context: &mut NetworkEventContext) -> SchistResult<()> {
        info!("[{} ms] handle_disconnect - processing DISCONNECT packet", self.elapsed_time_ms);

        // per spec, the server must always send a CONNACK before a DISCONNECT is valid
        self.check_established_for_receive("DISCONNECT")?;

        let MqttPacket::Disconnect(disconnect) = *packet else {
            panic!("handle_disconnect - invalid input");
        };

        if self.protocol_version == ProtocolVersion::Mqtt311 && self.endpoint_role == EndpointRole::Client {
            // 311 disconnects only flow from client to server
            error!("[{} ms] handle_disconnect - MQTT311 forbids server-side disconnects", self.elapsed_time_ms);
            return Err(SchistError::new_protocol_error("MQTT311 forbids server-side disconnects"));
        }

        context.packet_events.push_back(PacketEvent::Disconnect(disconnect));

        Err(SchistError::new_connection_closed("peer-initiated disconnect received"))
    }

    fn handle_auth(&mut self, _: Box<MqttPacket>, _: &mut NetworkEventContext) -> SchistResult<()> {
        info!("[{} ms] handle_auth - processing AUTH packet", self.elapsed_time_ms);
        Err(SchistError::new_protocol_error("auth exchanges are not supported"))
    }

    fn handle_packet(&mut self, packet: Box<MqttPacket>, context: &mut NetworkEventContext) -> SchistResult<()> {
        match &*packet {
            MqttPacket::Connack(_) => self.handle_connack(packet, context),
            MqttPacket::Publish(_) => self.handle_publish(packet, context),
            MqttPacket::Pingresp(_) => self.handle_pingresp(),
            MqttPacket::Disconnect(_) => self.handle_disconnect(packet, context),
            MqttPacket::Suback(_) => self.handle_suback(packet),
            MqttPacket::Unsuback(_) => self.handle_unsuback(packet),
            MqttPacket::Puback(_) => self.handle_puback(packet),
            MqttPacket::Pubcomp(_) => self.handle_pubcomp(packet),
            MqttPacket::Pubrel(_) => self.handle_pubrel(packet),
            MqttPacket::Pubrec(_) => self.handle_pubrec(packet),
            MqttPacket::Connect(_) => self.handle_connect(packet, context),
            MqttPacket::Subscribe(_) => self.handle_subscribe(packet, context),
            MqttPacket::Unsubscribe(_) => self.handle_unsubscribe(packet, context),
            MqttPacket::Pingreq(_) => self.handle_pingreq(context),
            MqttPacket::Auth(_) => self.handle_auth(packet, context),
        }
    }

    fn get_maximum_incoming_packet_size(&self) -> u32 {
        self.config.connect_options.maximum_packet_size_bytes.unwrap_or(MAXIMUM_VARIABLE_LENGTH_INTEGER as u32)
    }

    fn get_queue(&mut self, queue_type: ProtocolQueueType) -> &mut VecDeque<u64> {
        match queue_type {
            ProtocolQueueType::User => &mut self.user_operation_queue,
            ProtocolQueueType::HighPriority => &mut self.high_priority_operation_queue,
        }
    }

    fn enqueue_operation(&mut self, id: u64, queue_type: ProtocolQueueType, position: ProtocolEnqueuePosition) {
        if !self.operations.contains_key(&id) {
            panic!("Attempt to enqueue a non-existent operation");
        }

        debug!("[{} ms] enqueue_operation - operation {} added to {} of queue {} ", self.elapsed_time_ms, id, position, queue_type);
        let queue = self.get_queue(queue_type);
        match position {
            ProtocolEnqueuePosition::Front => { queue.push_front(id); }
            ProtocolEnqueuePosition::Back => { queue.push_back(id); }
        }
    }

    fn create_operation(&mut self, packet: Box<MqttPacket>, options: Option<EndpointOperationOptions>) -> u64 {
        let id = self.next_operation_id;
        self.next_operation_id += 1;

        info!("[{} ms] create_operation - building {} operation with id {}", self.elapsed_time_ms, mqtt_packet_to_str(&packet), id);
        debug!("[{} ms] create_operation - operation {}: {}", self.elapsed_time_ms, id, &packet);

        let operation = EndpointOperation {
            id,
            packet,
            qos2_pubrel: None,
            packet_id: None,
            options,
            ping_extension_base_timepoint : None,
        };

        self.operations.insert(id, operation);

        id
    }

    fn create_connect(&self) -> Box<MqttPacket> {
        let mut connect = self.config.connect_options.to_connect_packet(self.has_connected_successfully);

        if connect.client_id.is_none() {
            if let Some(settings) = &self.current_settings {
                connect.client_id = Some(settings.client_id.clone());
            }
        }

        Box::new(MqttPacket::Connect(connect))
    }

    fn acquire_packet_id_for_operation(&mut self, operation_id: u64) -> SchistResult<()> {
        let operation = self.operations.get(&operation_id).unwrap();

        if let Some(packet_id) = operation.packet_id {
            debug!("[{} ms] acquire_packet_id_for_operation - operation {} reusing existing packet id binding: {}", self.elapsed_time_ms, operation_id, packet_id);
            return Ok(());
        }

        match &*operation.packet {
            MqttPacket::Subscribe(_) | MqttPacket::Unsubscribe(_) => { }
            MqttPacket::Publish(publish) => {
                if publish.qos == QualityOfService::AtMostOnce {
                    return Ok(());
                }
            }
            _ => { return Ok(()); }
        }

        let packet_id = self.config.packet_id_allocator.acquire()?;
        self.allocated_packet_ids.insert(packet_id, operation_id);

        let operation = self.operations.get_mut(&operation_id).unwrap();
        operation.bind_packet_id(packet_id);

        Ok(())
    }

    // Test accessors
    pub(crate) fn get_negotiated_settings(&self) -> &Option<NegotiatedSettings> {
        &self.current_settings
    }
}

fn generate_connection_closed_error() -> SchistError {
    SchistError::new_connection_closed("internal operation failed due to connection close event")
}

fn generate_offline_queue_policy_failed_error() -> SchistError {
    SchistError::new_offline_queue_policy_failed()
}

fn build_negotiated_settings(config: &ProtocolStateConfig, packet: &ConnackPacket, existing_settings: &Option<NegotiatedSettings>) -> NegotiatedSettings {
    let connect = &config.connect_options;

    // Degenerate fallback: MQTT311 allows an empty client id and servers are allowed to auto
    // assign one in response, but have no way of communicating the assigned id back to the
    // client.  We could forbid the client to do this, but then we'd be more restrictive than
    // the spec.
    let final_client_id = packet.assigned_client_identifier.clone()
        .or_else(|| connect.client_id.clone())
        .or_else(|| existing_settings.as_ref().map(|settings| settings.client_id.clone()))
        .unwrap_or_default();

    NegotiatedSettings {
        maximum_qos : packet.maximum_qos.unwrap_or(QualityOfService::ExactlyOnce),
        session_expiry_interval : packet.session_expiry_interval.unwrap_or(connect.session_expiry_interval_seconds.unwrap_or(0)),
        receive_maximum_from_peer : packet.receive_maximum.unwrap_or(65535),
        maximum_packet_size_to_peer : packet.maximum_packet_size.unwrap_or(MAXIMUM_VARIABLE_LENGTH_INTEGER as u32),
        topic_alias_maximum_to_peer : packet.topic_alias_maximum.unwrap_or(0),
        server_keep_alive : packet.server_keep_alive.unwrap_or(connect.keep_alive_interval_seconds.unwrap_or(0)),
        retain_available : packet.retain_available.unwrap_or(true),
        wildcard_subscriptions_available : packet.wildcard_subscriptions_available.unwrap_or(true),
        subscription_identifiers_available : packet.subscription_identifiers_available.unwrap_or(true),
        shared_subscriptions_available : packet.shared_subscriptions_available.unwrap_or(true),
        rejoined_session : packet.session_present,
        client_id : final_client_id
    }
}

// A server-role endpoint has no CONNECT/CONNACK exchange of its own to negotiate from, so it
// runs the connection with a fully-permissive settings block.
fn build_server_role_settings(connect: &ConnectOptions) -> NegotiatedSettings {
    NegotiatedSettings {
        maximum_qos : QualityOfService::ExactlyOnce,
        session_expiry_interval : 0,
        receive_maximum_from_peer : 65535,
        maximum_packet_size_to_peer : MAXIMUM_VARIABLE_LENGTH_INTEGER as u32,
        topic_alias_maximum_to_peer : 0,
        server_keep_alive : 0,
        retain_available : true,
        wildcard_subscriptions_available : true,
        subscription_identifiers_available : true,
        shared_subscriptions_available : true,
        rejoined_session : false,
        client_id : connect.client_id.clone().unwrap_or_default()
    }
}

fn complete_operation_with_result(operation_options: &mut EndpointOperationOptions, completion_result: Option<OperationResponse>) -> SchistResult<()> {
    match (operation_options, completion_result) {
        (EndpointOperationOptions::Publish(publish_options), None) => {
            let handler = publish_options.response_handler.take().unwrap();
            let _ = handler(Ok(PublishResponse::Qos0));
            Ok(())
        }
        (EndpointOperationOptions::Publish(publish_options), Some(OperationResponse::Publish(publish_response))) => {
            let handler = publish_options.response_handler.take().unwrap();
            let _ = handler(Ok(publish_response));
            Ok(())
        }
        (EndpointOperationOptions::Subscribe(subscribe_options), Some(OperationResponse::Subscribe(suback))) => {
            let handler = subscribe_options.response_handler.take().unwrap();
            let _ = handler(Ok(suback));
            Ok(())
        }
        (EndpointOperationOptions::Unsubscribe(unsubscribe_options), Some(OperationResponse::Unsubscribe(unsuback))) => {
            let handler = unsubscribe_options.response_handler.take().unwrap();
            let _ = handler(Ok(unsuback));
            Ok(())
        }
        _ => Err(SchistError::new_internal_state_error("operation result does not match operation type")),
    }
}

fn complete_operation_with_error(operation_options: &mut EndpointOperationOptions, error: SchistError) -> SchistResult<()> {
    match operation_options {
        EndpointOperationOptions::Publish(publish_options) => {
            let _ = (publish_options.response_handler.take().unwrap())(Err(error));
        }
        EndpointOperationOptions::Subscribe(subscribe_options) => {
            let _ = (subscribe_options.response_handler.take().unwrap())(Err(error));
        }
        EndpointOperationOptions::Unsubscribe(unsubscribe_options) => {
            let _ = (unsubscribe_options.response_handler.take().unwrap())(Err(error));
        }
    }

    Ok(())
}

pub(crate) fn does_packet_pass_offline_queue_policy(packet: &MqttPacket, policy: &OfflineQueuePolicy) -> bool {
    match packet {
        MqttPacket::Subscribe(_) | MqttPacket::Unsubscribe(_) =>
            !matches!(policy, OfflineQueuePolicy::PreserveQos1PlusPublishes | OfflineQueuePolicy::PreserveNothing),
        MqttPacket::Publish(publish) => match policy {
            OfflineQueuePolicy::PreserveNothing => false,
            OfflineQueuePolicy::PreserveQos1PlusPublishes | OfflineQueuePolicy::PreserveAcknowledged =>
                publish.qos != QualityOfService::AtMostOnce,
            _ => true,
        },
        _ => false,
    }
}

fn partition_operations_by_queue_policy<'a, T>(iterator: T, policy: &OfflineQueuePolicy) -> (VecDeque<u64>, VecDeque<u64>) where T : Iterator<Item = (u64, &'a MqttPacket)> {
    let mut retained : VecDeque<u64> = VecDeque::new();
    let mut filtered : VecDeque<u64> = VecDeque::new();

    for (id, packet) in iterator {
        if does_packet_pass_offline_queue_policy(packet, policy) {
            retained.push_back(id);
        } else {
            filtered.push_back(id);
        }
    }

    (retained, filtered)
}

fn sort_operation_deque(operations: &mut VecDeque<u64>) {
    operations.rotate_right(operations.as_slices().1.len());
    operations.as_mut_slices().0.sort();
}

fn fold_timepoint(base: &Option<Instant>, new: &Instant) -> Option<Instant> {
    Some(base.map_or(*new, |base_timepoint| base_timepoint.min(*new)))
}

fn fold_optional_timepoint_min(base: &Option<Instant>, new: &Option<Instant>) -> Option<Instant> {
    match (base, new) {
        (Some(base_timepoint), Some(new_timepoint)) => Some(*base_timepoint.min(new_timepoint)),
        (Some(_), None) => *base,
        (None, _) => *new,
    }
}
