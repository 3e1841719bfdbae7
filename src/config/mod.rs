/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing types for configuring an MQTT endpoint.
 */

use crate::alias::OutboundAliasResolver;
use crate::mqtt::*;

use std::fmt;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// Determines how the endpoint treats queued and newly-submitted operations while it has no
/// active connection.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum OfflineQueuePolicy {

    /// All operations are queued while offline
    #[default]
    PreserveAll,

    /// Only operations with acks (qos1+ publish, subscribe, unsubscribe) are queued while offline
    PreserveAcknowledged,

    /// Only qos1+ publishes are queued while offline
    PreserveQos1PlusPublishes,

    /// No operations are queued while offline; everything is failed with an offline queue
    /// policy error
    PreserveNothing,
}

/// Determines when a connecting endpoint will ask the peer to resume an existing session.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum RejoinSessionPolicy {

    /// Attempt to rejoin only after a previous connection succeeded
    #[default]
    PostSuccess,

    /// Always attempt to rejoin a session
    Always,

    /// Never attempt to rejoin a session
    Never
}

pub(crate) const DEFAULT_KEEP_ALIVE_SECONDS : u16 = 1200;

/// Configuration options that determine the field values of the CONNECT packet sent out on each
/// connection attempt.  Almost equivalent to ConnectPacket, but there are a few differences that
/// make exposing a ConnectPacket directly awkward and potentially misleading.
#[derive(Debug, Clone)]
pub struct ConnectOptions {

    /// The maximum time interval, in seconds, that is permitted to elapse between the point at
    /// which one MQTT packet finishes transmitting and the point the next starts.  PINGREQ
    /// packets maintain this property.  If the responding CONNACK carries a server keep alive,
    /// that value wins the negotiation.
    pub(crate) keep_alive_interval_seconds: Option<u16>,

    /// Configuration value that determines how the endpoint will attempt to rejoin sessions
    pub(crate) rejoin_session_policy: RejoinSessionPolicy,

    /// A unique string identifying the client to the server.  Used to restore session state
    /// between connections.  If left empty, the server will auto-assign a unique client id which
    /// is used verbatim on reconnect attempts afterwards.
    pub(crate) client_id: Option<String>,

    /// A string value that the server may use for authentication and authorization.
    pub(crate) username: Option<String>,

    /// Opaque binary data that the server may use for authentication and authorization.
    pub(crate) password: Option<Vec<u8>>,

    /// A time interval, in seconds, that the connecting endpoint requests the peer to persist
    /// this connection's session state for.  Must be non-zero to successfully rejoin a session.
    pub(crate) session_expiry_interval_seconds: Option<u32>,

    /// If true, requests that the server send response information in the subsequent CONNACK.
    pub(crate) request_response_information: Option<bool>,

    /// If true, requests that the server send additional diagnostic information (via reason
    /// string or user properties) in DISCONNECT or CONNACK packets.
    pub(crate) request_problem_information: Option<bool>,

    /// Notifies the peer of the maximum number of in-flight QoS 1 and 2 messages this endpoint
    /// is willing to handle.
    pub(crate) receive_maximum: Option<u16>,

    /// Maximum number of topic aliases this endpoint will accept on inbound publishes.  If not
    /// set, inbound topic aliasing is unsupported.
    pub(crate) topic_alias_maximum: Option<u16>,

    /// Notifies the peer of the maximum packet size this endpoint is willing to receive.
    pub(crate) maximum_packet_size_bytes: Option<u32>,

    /// A time interval, in seconds, that the server should wait (for a session reconnection)
    /// before sending the will message associated with the connection's session.
    pub(crate) will_delay_interval_seconds: Option<u32>,

    /// The definition of a message to be published when the connection's session is destroyed
    /// by the server or when the will delay interval has elapsed, whichever comes first.
    pub(crate) will: Option<PublishPacket>,

    /// Set of user properties to include with all CONNECT packets.
    pub(crate) user_properties: Option<Vec<UserProperty>>,
}

impl ConnectOptions {

    /// Returns a builder that constructs ConnectOptions instances
    pub fn builder() -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new()
    }

    pub(crate) fn to_connect_packet(&self, connected_previously: bool) -> ConnectPacket {
        let clean_start =
            match self.rejoin_session_policy {
                RejoinSessionPolicy::PostSuccess => {
                    !connected_previously
                }
                RejoinSessionPolicy::Always => {
                    false
                }
                RejoinSessionPolicy::Never => {
                    true
                }
            };

        ConnectPacket {
            keep_alive_interval_seconds: self.keep_alive_interval_seconds.unwrap_or(0),
            clean_start,
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            session_expiry_interval_seconds: self.session_expiry_interval_seconds,
            request_response_information: self.request_response_information,
            request_problem_information: self.request_problem_information,
            receive_maximum: self.receive_maximum,
            topic_alias_maximum: self.topic_alias_maximum,
            maximum_packet_size_bytes: self.maximum_packet_size_bytes,
            authentication_method: None,
            authentication_data: None,
            will_delay_interval_seconds: self.will_delay_interval_seconds,
            will: self.will.clone(),
            user_properties: self.user_properties.clone(),
        }
    }

    /// Replaces the username on an already-built options instance
    pub fn set_username(&mut self, username: Option<&str>) {
        self.username = username.map(str::to_string);
    }

    /// Replaces the password on an already-built options instance
    pub fn set_password(&mut self, password: Option<&[u8]>) {
        self.password = password.map(|p| p.to_vec());
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            keep_alive_interval_seconds: Some(DEFAULT_KEEP_ALIVE_SECONDS),
            rejoin_session_policy: RejoinSessionPolicy::PostSuccess,
            client_id: None,
            username: None,
            password: None,
            session_expiry_interval_seconds: None,
            request_response_information: None,
            request_problem_information: None,
            receive_maximum: None,
            topic_alias_maximum: None,
            maximum_packet_size_bytes: None,
            will_delay_interval_seconds: None,
            will: None,
            user_properties: None,
        }
    }
}

/// Builder type for ConnectOptions instances
#[derive(Debug, Default)]
pub struct ConnectOptionsBuilder {
    options: ConnectOptions
}

impl ConnectOptionsBuilder {
    pub(crate) fn new() -> Self {
        ConnectOptionsBuilder {
            ..Default::default()
        }
    }

    pub fn with_keep_alive_interval_seconds(mut self, keep_alive: Option<u16>) -> Self {
        self.options.keep_alive_interval_seconds = keep_alive;
        self
    }

    pub fn with_rejoin_session_policy(mut self, policy: RejoinSessionPolicy) -> Self {
        self.options.rejoin_session_policy = policy;
        self
    }

    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.options.client_id = Some(client_id.to_string());
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.options.username = Some(username.to_string());
        self
    }

    pub fn with_password(mut self, password: &[u8]) -> Self {
        self.options.password = Some(password.to_vec());
        self
    }

    pub fn with_session_expiry_interval_seconds(mut self, session_expiry_interval_seconds: u32) -> Self {
        self.options.session_expiry_interval_seconds = Some(session_expiry_interval_seconds);
        self
    }

    pub fn with_request_response_information(mut self, request_response_information: bool) -> Self {
        self.options.request_response_information = Some(request_response_information);
        self
    }

    pub fn with_request_problem_information(mut self, request_problem_information: bool) -> Self {
        self.options.request_problem_information = Some(request_problem_information);
        self
    }

    pub fn with_receive_maximum(mut self, receive_maximum: u16) -> Self {
        self.options.receive_maximum = Some(receive_maximum);
        self
    }

    pub fn with_topic_alias_maximum(mut self, topic_alias_maximum: u16) -> Self {
        self.options.topic_alias_maximum = Some(topic_alias_maximum);
        self
    }

    pub fn with_maximum_packet_size_bytes(mut self, maximum_packet_size_bytes: u32) -> Self {
        self.options.maximum_packet_size_bytes = Some(maximum_packet_size_bytes);
        self
    }

    pub fn with_will_delay_interval_seconds(mut self, will_delay_interval_seconds: u32) -> Self {
        self.options.will_delay_interval_seconds = Some(will_delay_interval_seconds);
        self
    }

    pub fn with_will(mut self, will: PublishPacket) -> Self {
        self.options.will = Some(will);
        self
    }

    pub fn with_user_properties(mut self, user_properties: Vec<UserProperty>) -> Self {
        self.options.user_properties = Some(user_properties);
        self
    }

    pub fn build(self) -> ConnectOptions {
        self.options
    }
}

/// The set of protocol values in force for the lifetime of a single connection, derived from the
/// CONNECT/CONNACK exchange.
#[derive(Default, Clone, PartialEq, Eq, Debug)]
pub struct NegotiatedSettings {

    /// The maximum QoS allowed between this endpoint and its peer.
    pub maximum_qos : QualityOfService,

    /// The amount of time in seconds the peer will retain the session after a disconnect.
    pub session_expiry_interval : u32,

    /// The number of QoS 1 and QoS 2 publications the peer is willing to process concurrently.
    pub receive_maximum_from_peer : u16,

    /// The maximum packet size the peer is willing to accept.
    pub maximum_packet_size_to_peer : u32,

    /// The highest value the peer will accept as a topic alias on publishes sent to it.
    pub topic_alias_maximum_to_peer : u16,

    /// The amount of time in seconds before the peer will disconnect this endpoint for
    /// inactivity.
    pub server_keep_alive : u16,

    /// Whether or not the server supports retained messages.
    pub retain_available : bool,

    /// Whether or not the server supports wildcard subscriptions.
    pub wildcard_subscriptions_available : bool,

    /// Whether or not the server supports subscription identifiers.
    pub subscription_identifiers_available : bool,

    /// Whether or not the server supports shared subscriptions.
    pub shared_subscriptions_available : bool,

    /// Whether or not the connection rejoined an existing session.
    pub rejoined_session : bool,

    /// Client id in use for the current connection
    pub client_id : String
}

impl fmt::Display for NegotiatedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "NegotiatedSettings {{")?;
        writeln!(f, "  maximum_qos: {}", self.maximum_qos)?;
        writeln!(f, "  session_expiry_interval: {}", self.session_expiry_interval)?;
        writeln!(f, "  receive_maximum_from_peer: {}", self.receive_maximum_from_peer)?;
        writeln!(f, "  maximum_packet_size_to_peer: {}", self.maximum_packet_size_to_peer)?;
        writeln!(f, "  topic_alias_maximum_to_peer: {}", self.topic_alias_maximum_to_peer)?;
        writeln!(f, "  server_keep_alive: {}", self.server_keep_alive)?;
        writeln!(f, "  retain_available: {}", self.retain_available)?;
        writeln!(f, "  wildcard_subscriptions_available: {}", self.wildcard_subscriptions_available)?;
        writeln!(f, "  subscription_identifiers_available: {}", self.subscription_identifiers_available)?;
        writeln!(f, "  shared_subscriptions_available: {}", self.shared_subscriptions_available)?;
        writeln!(f, "  rejoined_session: {}", self.rejoined_session)?;
        writeln!(f, "  client_id: {}", self.client_id)?;
        write!(f, "}}")?;

        Ok(())
    }
}

pub(crate) const DEFAULT_CONNACK_TIMEOUT : Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_PING_TIMEOUT : Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_READ_BUFFER_SIZE : usize = 16 * 1024;

/// Configuration for a single endpoint's protocol behavior, independent of any particular
/// connection's CONNECT field values.
pub struct EndpointOptions {

    /// MQTT protocol version spoken on the wire
    pub(crate) protocol_version: ProtocolVersion,

    /// Which side of the CONNECT/CONNACK handshake this endpoint drives
    pub(crate) endpoint_role: EndpointRole,

    /// How queued and newly-submitted operations are treated while offline
    pub(crate) offline_queue_policy: OfflineQueuePolicy,

    /// Time interval to wait for a CONNACK after submitting a CONNECT before giving up on the
    /// connection attempt
    pub(crate) connack_timeout: Duration,

    /// Time interval to wait for a PINGRESP after sending a PINGREQ before judging the
    /// connection dead
    pub(crate) ping_timeout: Duration,

    /// Optional bound on the time interval between an ack-based operation being written to the
    /// transport and its ack arriving
    pub(crate) ack_timeout: Option<Duration>,

    /// Outbound topic alias resolution strategy; defaults to no aliasing
    pub(crate) outbound_alias_resolver: Option<Box<dyn OutboundAliasResolver + Send>>,

    /// Size of the buffer used for bulk reads from the transport
    pub(crate) read_buffer_size: usize,

    /// When true, all currently-writable packets are coalesced into a single transport write
    /// per service pass
    pub(crate) bulk_write: bool,

    /// When true, session-resumption replay resends publishes whose message expiry interval
    /// has already elapsed rather than dropping them
    pub(crate) replay_expired_publishes: bool,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        EndpointOptions {
            protocol_version: ProtocolVersion::Mqtt5,
            endpoint_role: EndpointRole::Client,
            offline_queue_policy: OfflineQueuePolicy::PreserveAcknowledged,
            connack_timeout: DEFAULT_CONNACK_TIMEOUT,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            ack_timeout: None,
            outbound_alias_resolver: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            bulk_write: true,
            replay_expired_publishes: false,
        }
    }
}

impl fmt::Display for EndpointOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EndpointOptions {{")?;
        writeln!(f, "  protocol_version: {}", self.protocol_version)?;
        writeln!(f, "  endpoint_role: {}", self.endpoint_role)?;
        writeln!(f, "  offline_queue_policy: {:?}", self.offline_queue_policy)?;
        writeln!(f, "  connack_timeout: {:?}", self.connack_timeout)?;
        writeln!(f, "  ping_timeout: {:?}", self.ping_timeout)?;
        writeln!(f, "  ack_timeout: {:?}", self.ack_timeout)?;
        if self.outbound_alias_resolver.is_some() {
            writeln!(f, "  outbound_alias_resolver: Some(...)")?;
        } else {
            writeln!(f, "  outbound_alias_resolver: None")?;
        }
        writeln!(f, "  read_buffer_size: {}", self.read_buffer_size)?;
        writeln!(f, "  bulk_write: {}", self.bulk_write)?;
        writeln!(f, "  replay_expired_publishes: {}", self.replay_expired_publishes)?;
        write!(f, "}}")?;

        Ok(())
    }
}

impl Debug for EndpointOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointOptions {{ ")?;
        write!(f, "protocol_version: {}, ", self.protocol_version)?;
        write!(f, "endpoint_role: {}, ", self.endpoint_role)?;
        write!(f, "offline_queue_policy: {:?}, ", self.offline_queue_policy)?;
        write!(f, "connack_timeout: {:?}, ", self.connack_timeout)?;
        write!(f, "ping_timeout: {:?}, ", self.ping_timeout)?;
        write!(f, "ack_timeout: {:?}, ", self.ack_timeout)?;
        if self.outbound_alias_resolver.is_some() {
            write!(f, "outbound_alias_resolver: Some(...), ")?;
        } else {
            write!(f, "outbound_alias_resolver: None, ")?;
        };
        write!(f, "read_buffer_size: {}, ", self.read_buffer_size)?;
        write!(f, "bulk_write: {}, ", self.bulk_write)?;
        write!(f, "replay_expired_publishes: {}, ", self.replay_expired_publishes)?;

        write!(f, "}}")
    }
}

impl EndpointOptions {

    /// Returns a builder that constructs EndpointOptions instances
    pub fn builder() -> EndpointOptionsBuilder {
        EndpointOptionsBuilder::new()
    }
}

/// Builder type for EndpointOptions instances
#[derive(Debug, Default)]
pub struct EndpointOptionsBuilder {
    options: EndpointOptions
}

impl EndpointOptionsBuilder {
    pub(crate) fn new() -> Self {
        EndpointOptionsBuilder {
            options: EndpointOptions {
                ..Default::default()
            }
        }
    }

    pub fn with_protocol_version(mut self, protocol_version: ProtocolVersion) -> Self {
        self.options.protocol_version = protocol_version;
        self
    }

    pub fn with_endpoint_role(mut self, endpoint_role: EndpointRole) -> Self {
        self.options.endpoint_role = endpoint_role;
        self
    }

    pub fn with_offline_queue_policy(mut self, offline_queue_policy: OfflineQueuePolicy) -> Self {
        self.options.offline_queue_policy = offline_queue_policy;
        self
    }

    pub fn with_connack_timeout(mut self, connack_timeout: Duration) -> Self {
        self.options.connack_timeout = connack_timeout;
        self
    }

    pub fn with_ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.options.ping_timeout = ping_timeout;
        self
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.options.ack_timeout = Some(ack_timeout);
        self
    }

    pub fn with_outbound_alias_resolver(mut self, outbound_alias_resolver: Box<dyn OutboundAliasResolver + Send>) -> Self {
        self.options.outbound_alias_resolver = Some(outbound_alias_resolver);
        self
    }

    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.options.read_buffer_size = read_buffer_size;
        self
    }

    pub fn with_bulk_write(mut self, bulk_write: bool) -> Self {
        self.options.bulk_write = bulk_write;
        self
    }

    pub fn with_replay_expired_publishes(mut self, replay_expired_publishes: bool) -> Self {
        self.options.replay_expired_publishes = replay_expired_publishes;
        self
    }

    pub fn build(self) -> EndpointOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_options_builder_defaults() {
        let options = ConnectOptions::builder().build();

        assert_eq!(Some(DEFAULT_KEEP_ALIVE_SECONDS), options.keep_alive_interval_seconds);
        assert_eq!(RejoinSessionPolicy::PostSuccess, options.rejoin_session_policy);
        assert_eq!(None, options.client_id);
        assert_eq!(None, options.session_expiry_interval_seconds);
    }

    #[test]
    fn connect_options_to_connect_packet_rejoin_policies() {
        let post_success = ConnectOptions::builder()
            .with_rejoin_session_policy(RejoinSessionPolicy::PostSuccess)
            .build();

        assert!(post_success.to_connect_packet(false).clean_start);
        assert!(!post_success.to_connect_packet(true).clean_start);

        let always = ConnectOptions::builder()
            .with_rejoin_session_policy(RejoinSessionPolicy::Always)
            .build();

        assert!(!always.to_connect_packet(false).clean_start);
        assert!(!always.to_connect_packet(true).clean_start);

        let never = ConnectOptions::builder()
            .with_rejoin_session_policy(RejoinSessionPolicy::Never)
            .build();

        assert!(never.to_connect_packet(false).clean_start);
        assert!(never.to_connect_packet(true).clean_start);
    }

    #[test]
    fn connect_options_to_connect_packet_field_passthrough() {
        let options = ConnectOptions::builder()
            .with_keep_alive_interval_seconds(Some(60))
            .with_client_id("squawk")
            .with_username("parrot")
            .with_password("polly".as_bytes())
            .with_session_expiry_interval_seconds(3600)
            .with_receive_maximum(20)
            .with_topic_alias_maximum(10)
            .with_maximum_packet_size_bytes(128 * 1024)
            .build();

        let packet = options.to_connect_packet(false);

        assert_eq!(60, packet.keep_alive_interval_seconds);
        assert_eq!(Some("squawk".to_string()), packet.client_id);
        assert_eq!(Some("parrot".to_string()), packet.username);
        assert_eq!(Some("polly".as_bytes().to_vec()), packet.password);
        assert_eq!(Some(3600), packet.session_expiry_interval_seconds);
        assert_eq!(Some(20), packet.receive_maximum);
        assert_eq!(Some(10), packet.topic_alias_maximum);
        assert_eq!(Some(128 * 1024), packet.maximum_packet_size_bytes);
        assert_eq!(None, packet.authentication_method);
    }

    #[test]
    fn connect_options_unique_client_ids_stay_distinct() {
        let first = ConnectOptions::builder()
            .with_client_id(format!("endpoint-{}", uuid::Uuid::new_v4()).as_str())
            .build();
        let second = ConnectOptions::builder()
            .with_client_id(format!("endpoint-{}", uuid::Uuid::new_v4()).as_str())
            .build();

        assert_ne!(first.to_connect_packet(false).client_id, second.to_connect_packet(false).client_id);
    }

    #[test]
    fn endpoint_options_builder_defaults() {
        let options = EndpointOptions::builder().build();

        assert_eq!(ProtocolVersion::Mqtt5, options.protocol_version);
        assert_eq!(EndpointRole::Client, options.endpoint_role);
        assert_eq!(OfflineQueuePolicy::PreserveAcknowledged, options.offline_queue_policy);
        assert_eq!(DEFAULT_CONNACK_TIMEOUT, options.connack_timeout);
        assert_eq!(DEFAULT_PING_TIMEOUT, options.ping_timeout);
        assert_eq!(None, options.ack_timeout);
        assert!(options.outbound_alias_resolver.is_none());
        assert!(options.bulk_write);
    }

    #[test]
    fn endpoint_options_display_includes_core_fields() {
        let options = EndpointOptions::builder()
            .with_endpoint_role(EndpointRole::Server)
            .with_read_buffer_size(4096)
            .build();

        let rendered = format!("{}", options);

        assert!(rendered.contains("endpoint_role: Server"));
        assert!(rendered.contains("read_buffer_size: 4096"));
        assert!(rendered.contains("outbound_alias_resolver: None"));
    }
}
