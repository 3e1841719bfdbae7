/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing structured data types that model the MQTT 3.1.1 and MQTT5 specifications.
 */

use std::fmt;

pub(crate) mod auth;
pub(crate) mod connack;
pub(crate) mod connect;
pub(crate) mod disconnect;
pub(crate) mod ping;
pub(crate) mod puback;
pub(crate) mod pubcomp;
pub(crate) mod publish;
pub(crate) mod pubrec;
pub(crate) mod pubrel;
pub(crate) mod suback;
pub(crate) mod subscribe;
pub(crate) mod unsuback;
pub(crate) mod unsubscribe;
pub(crate) mod utils;

/// MQTT protocol version that an endpoint speaks on the wire.
///
/// Negotiated (by configuration) before the connection is opened; both peers must agree.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProtocolVersion {

    /// MQTT 3.1.1, protocol level 4 on the wire
    Mqtt311,

    /// MQTT 5, protocol level 5 on the wire
    #[default]
    Mqtt5,
}

/// The role an endpoint plays in an MQTT connection.
///
/// Role determines which inbound packet types are legal and which direction of the
/// CONNECT/CONNACK handshake the endpoint drives.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EndpointRole {

    /// The endpoint initiates the connection and sends CONNECT
    #[default]
    Client,

    /// The endpoint accepts connections and answers CONNECT with CONNACK
    Server,
}

/// MQTT message delivery quality of service.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901234) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub enum QualityOfService {

    /// The message is delivered according to the capabilities of the underlying network. No response is sent by the
    /// receiver and no retry is performed by the sender. The message arrives at the receiver either once or not at all.
    #[default]
    AtMostOnce = 0,

    /// A level of service that ensures that the message arrives at the receiver at least once.
    AtLeastOnce = 1,

    /// A level of service that ensures that the message arrives at the receiver exactly once.
    ExactlyOnce = 2,
}

/// Optional property describing a PUBLISH payload's format.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901111) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PayloadFormatIndicator {

    /// The payload is arbitrary binary data
    #[default]
    Bytes = 0,

    /// The payload is a well-formed utf-8 string value.
    Utf8 = 1,
}

/// Configures how retained messages should be handled when subscribing
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901169) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RetainHandlingType {

    /// Server should send all retained messages on topics that match the subscription's filter.
    #[default]
    SendOnSubscribe = 0,

    /// Server should send all retained messages on topics that match the subscription's filter, where the subscription
    /// did not already exist.
    SendOnSubscribeIfNew = 1,

    /// Subscribe must not trigger any retained message publishes from the server.
    DontSend = 2,
}

/// Result of a connect request as determined by the MQTT server.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901079) encoding values.
/// For 3.1.1 connections, the coarser return code is mapped onto the closest of these values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectReasonCode {

    /// Returned when the connection is accepted.
    #[default]
    Success = 0,

    /// Returned when the server has a failure but does not want to specify a reason or none
    /// of the other reason codes apply.
    UnspecifiedError = 128,

    /// Returned when data in the CONNECT packet could not be correctly parsed by the server.
    MalformedPacket = 129,

    /// Returned when data in the CONNECT packet does not conform to the MQTT5 specification requirements.
    ProtocolError = 130,

    /// Returned when the CONNECT packet is valid but was not accepted by the server.
    ImplementationSpecificError = 131,

    /// Returned when the server does not support the MQTT protocol version specified in the connection.
    UnsupportedProtocolVersion = 132,

    /// Returned when the client identifier in the CONNECT packet is a valid string but not one that
    /// is allowed on the server.
    ClientIdentifierNotValid = 133,

    /// Returned when the server does not accept the username and/or password specified by the client
    /// in the connection packet.
    BadUsernameOrPassword = 134,

    /// Returned when the client is not authorized to connect to the server.
    NotAuthorized = 135,

    /// Returned when the MQTT5 server is not available.
    ServerUnavailable = 136,

    /// Returned when the server is too busy to make a connection. It is recommended that the client try again later.
    ServerBusy = 137,

    /// Returned when the client has been banned from the server.
    Banned = 138,

    /// Returned when the authentication method used in the connection is either not supported on the server or it does
    /// not match the authentication method currently in use in the CONNECT packet.
    BadAuthenticationMethod = 140,

    /// Returned when the Will topic name sent in the CONNECT packet is correctly formed, but is not accepted by
    /// the server.
    TopicNameInvalid = 144,

    /// Returned when the CONNECT packet exceeded the maximum permissible size on the server.
    PacketTooLarge = 149,

    /// Returned when the quota limits set on the server have been met and/or exceeded.
    QuotaExceeded = 151,

    /// Returned when the Will payload in the CONNECT packet does not match the specified payload format indicator.
    PayloadFormatInvalid = 153,

    /// Returned when the server does not retain messages but the CONNECT packet on the client had Will retain enabled.
    RetainNotSupported = 154,

    /// Returned when the server does not support the QOS setting in the Will QOS in the CONNECT packet.
    QosNotSupported = 155,

    /// Returned when the server is telling the client to temporarily use another server instead of the one they
    /// are trying to connect to.
    UseAnotherServer = 156,

    /// Returned when the server is telling the client to permanently use another server instead of the one they
    /// are trying to connect to.
    ServerMoved = 157,

    /// Returned when the server connection rate limit has been exceeded.
    ConnectionRateExceeded = 159,
}

/// Reason code inside PUBACK packets that indicates the result of the associated publish request.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901124) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PubackReasonCode {

    /// Returned when the (QoS 1) publish was accepted by the recipient.
    #[default]
    Success = 0,

    /// Returned when the (QoS 1) publish was accepted but there were no matching subscribers.
    NoMatchingSubscribers = 16,

    /// Returned when the (QoS 1) publish was not accepted and the receiver does not want to specify a reason or none
    /// of the other reason codes apply.
    UnspecifiedError = 128,

    /// Returned when the (QoS 1) publish was valid but the receiver was not willing to accept it.
    ImplementationSpecificError = 131,

    /// Returned when the (QoS 1) publish was not authorized by the receiver.
    NotAuthorized = 135,

    /// Returned when the topic name was valid but the receiver was not willing to accept it.
    TopicNameInvalid = 144,

    /// Returned when the packet identifier used in the associated PUBLISH was already in use.
    /// This can indicate a mismatch in the session state between client and server.
    PacketIdentifierInUse = 145,

    /// Returned when the associated publish failed because an implementation or administrative limit was exceeded.
    QuotaExceeded = 151,

    /// Returned when the publish payload format does not match the format indicated by the payload format indicator.
    PayloadFormatInvalid = 153,
}

/// Reason code inside PUBREC packets that indicates the result of the first phase of the
/// associated QoS 2 publish request.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901134) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PubrecReasonCode {

    /// Returned when the (QoS 2) publish was accepted by the recipient.
    #[default]
    Success = 0,

    /// Returned when the (QoS 2) publish was accepted but there were no matching subscribers.
    NoMatchingSubscribers = 16,

    /// Returned when the (QoS 2) publish was not accepted and the receiver does not want to specify a reason or none
    /// of the other reason codes apply.
    UnspecifiedError = 128,

    /// Returned when the (QoS 2) publish was valid but the receiver was not willing to accept it.
    ImplementationSpecificError = 131,

    /// Returned when the (QoS 2) publish was not authorized by the receiver.
    NotAuthorized = 135,

    /// Returned when the topic name was valid but the receiver was not willing to accept it.
    TopicNameInvalid = 144,

    /// Returned when the packet identifier used in the associated PUBLISH was already in use.
    /// This can indicate a mismatch in the session state between client and server.
    PacketIdentifierInUse = 145,

    /// Returned when the associated publish failed because an implementation or administrative limit was exceeded.
    QuotaExceeded = 151,

    /// Returned when the publish payload format does not match the format indicated by the payload format indicator.
    PayloadFormatInvalid = 153,
}

/// Reason code inside PUBREL packets that indicates the result of the second phase of the
/// associated QoS 2 publish request.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901144) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PubrelReasonCode {

    /// Returned when the associated packet identifier was found and released.
    #[default]
    Success = 0,

    /// Returned when the associated packet identifier was not found in the receiver's session state.
    PacketIdentifierNotFound = 146,
}

/// Reason code inside PUBCOMP packets that indicates the result of the final phase of the
/// associated QoS 2 publish request.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901154) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PubcompReasonCode {

    /// Returned when the QoS 2 exchange completed cleanly.
    #[default]
    Success = 0,

    /// Returned when the associated packet identifier was not found in the receiver's session state.
    PacketIdentifierNotFound = 146,
}

/// Reason code inside SUBACK packet payloads that specifies the result of each subscription in the
/// associated SUBSCRIBE packet.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901178) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SubackReasonCode {

    /// Returned when the subscription was accepted and the maximum QOS sent will be QOS 0.
    #[default]
    GrantedQos0 = 0,

    /// Returned when the subscription was accepted and the maximum QOS sent will be QOS 1.
    GrantedQos1 = 1,

    /// Returned when the subscription was accepted and the maximum QOS sent will be QOS 2.
    GrantedQos2 = 2,

    /// Returned when the connection was closed but the sender does not want to specify a reason or none
    /// of the other reason codes apply.
    UnspecifiedError = 128,

    /// Returned when the subscription was valid but the server did not accept it.
    ImplementationSpecificError = 131,

    /// Returned when the client was not authorized to make the subscription on the server.
    NotAuthorized = 135,

    /// Returned when the subscription topic filter was correctly formed but not allowed for the client.
    TopicFilterInvalid = 143,

    /// Returned when the packet identifier was already in use on the server.
    PacketIdentifierInUse = 145,

    /// Returned when a subscribe-related quota set on the server was exceeded.
    QuotaExceeded = 151,

    /// Returned when the subscription's topic filter was a shared subscription and the server does not support
    /// shared subscriptions.
    SharedSubscriptionsNotSupported = 158,

    /// Returned when the SUBSCRIBE packet contained a subscription identifier and the server does not support
    /// subscription identifiers.
    SubscriptionIdentifiersNotSupported = 161,

    /// Returned when the subscription's topic filter contains a wildcard but the server does not support
    /// wildcard subscriptions.
    WildcardSubscriptionsNotSupported = 162,
}

/// Reason code inside UNSUBACK packet payloads that specifies the result of each topic filter in the
/// associated UNSUBSCRIBE packet.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901194) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UnsubackReasonCode {

    /// Returned when the unsubscribe was successful and the client is no longer subscribed to the topic filter on the server.
    #[default]
    Success = 0,

    /// Returned when the topic filter did not match one of the client's existing subscriptions on the server.
    NoSubscriptionExisted = 17,

    /// Returned when the unsubscribe of the topic filter was not accepted and the server does not want to specify a
    /// reason or none of the other reason codes apply.
    UnspecifiedError = 128,

    /// Returned when the topic filter was valid but the server does not accept an unsubscribe for it.
    ImplementationSpecificError = 131,

    /// Returned when the client was not authorized to unsubscribe from that topic filter on the server.
    NotAuthorized = 135,

    /// Returned when the topic filter was correctly formed but is not allowed for the client on the server.
    TopicFilterInvalid = 143,

    /// Returned when the packet identifier was already in use on the server.
    PacketIdentifierInUse = 145,
}

/// Reason code inside DISCONNECT packets.  Helps determine why a connection was terminated.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901208) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DisconnectReasonCode {

    /// Returned when the remote endpoint wishes to disconnect normally. Will not trigger the publish of a Will message if a
    /// Will message was configured on the connection.
    ///
    /// May be sent by the client or server.
    #[default]
    NormalDisconnection = 0,

    /// Returns when the client wants to disconnect but requires that the server publish the Will message configured
    /// on the connection.
    ///
    /// May only be sent by the client.
    DisconnectWithWillMessage = 4,

    /// Returned when the connection was closed but the sender does not want to specify a reason or none
    /// of the other reason codes apply.
    ///
    /// May be sent by the client or the server.
    UnspecifiedError = 128,

    /// Indicates the remote endpoint received a packet that does not conform to the MQTT specification.
    ///
    /// May be sent by the client or the server.
    MalformedPacket = 129,

    /// Returned when an unexpected or out-of-order packet was received by the remote endpoint.
    ///
    /// May be sent by the client or the server.
    ProtocolError = 130,

    /// Returned when a valid packet was received by the remote endpoint, but could not be processed by the current implementation.
    ///
    /// May be sent by the client or the server.
    ImplementationSpecificError = 131,

    /// Returned when the remote endpoint received a packet where the sender was not authorized for the implied action.
    ///
    /// May only be sent by the server.
    NotAuthorized = 135,

    /// Returned when the server is busy and cannot continue processing packets from the client.
    ///
    /// May only be sent by the server.
    ServerBusy = 137,

    /// Returned when the server is shutting down.
    ///
    /// May only be sent by the server.
    ServerShuttingDown = 139,

    /// Returned when the server closes the connection because no packet from the client has been received in
    /// 1.5 times the keep alive interval.
    ///
    /// May only be sent by the server.
    KeepAliveTimeout = 141,

    /// Returned when the server has established another connection with the same client ID as a client's current
    /// connection, causing the current client to become disconnected.
    ///
    /// May only be sent by the server.
    SessionTakenOver = 142,

    /// Returned when the topic filter name is correctly formed but not accepted by the server.
    ///
    /// May only be sent by the server.
    TopicFilterInvalid = 143,

    /// Returned when topic name is correctly formed, but is not accepted.
    ///
    /// May be sent by the client or the server.
    TopicNameInvalid = 144,

    /// Returned when the remote endpoint reached a state where there were more in-progress QoS1+ publishes then the
    /// limit it established for itself when the connection was opened.
    ///
    /// May be sent by the client or the server.
    ReceiveMaximumExceeded = 147,

    /// Returned when the remote endpoint receives a PUBLISH packet that contained a topic alias greater than the
    /// maximum topic alias limit that it established for itself when the connection was opened.
    ///
    /// May be sent by the client or the server.
    TopicAliasInvalid = 148,

    /// Returned when the remote endpoint received a packet whose size was greater than the maximum packet size limit
    /// it established for itself when the connection was opened.
    ///
    /// May be sent by the client or the server.
    PacketTooLarge = 149,

    /// Returned when the remote endpoint's incoming data rate was too high.
    ///
    /// May be sent by the client or the server.
    MessageRateTooHigh = 150,

    /// Returned when an internal quota of the remote endpoint was exceeded.
    ///
    /// May be sent by the client or the server.
    QuotaExceeded = 151,

    /// Returned when the connection was closed due to an administrative action.
    ///
    /// May be sent by the client or the server.
    AdministrativeAction = 152,

    /// Returned when the remote endpoint received a packet where payload format did not match the format specified
    /// by the payload format indicator.
    ///
    /// May be sent by the client or the server.
    PayloadFormatInvalid = 153,

    /// Returned when the server does not support retained messages.
    ///
    /// May only be sent by the server.
    RetainNotSupported = 154,

    /// Returned when the client sends a QoS that is greater than the maximum QoS established when the connection was
    /// opened.
    ///
    /// May only be sent by the server.
    QosNotSupported = 155,

    /// Returned when the server is telling the client to temporarily use another server instead of the one they
    /// are trying to connect to.
    ///
    /// May only be sent by the server.
    UseAnotherServer = 156,

    /// Returned when the server is telling the client to permanently use another server instead of the one they
    /// are trying to connect to.
    ///
    /// May only be sent by the server.
    ServerMoved = 157,

    /// Returned when the server does not support shared subscriptions.
    ///
    /// May only be sent by the server.
    SharedSubscriptionsNotSupported = 158,

    /// Returned when the server disconnects the client due to the connection rate being too high.
    ///
    /// May only be sent by the server.
    ConnectionRateExceeded = 159,

    /// Returned when the maximum connection time authorized for the connection was exceeded.
    ///
    /// May only be sent by the server.
    MaximumConnectTime = 160,

    /// Returned when the server does not support subscription identifiers.
    ///
    /// May only be sent by the server.
    SubscriptionIdentifiersNotSupported = 161,

    /// Returned when the server does not support wildcard subscriptions.
    ///
    /// May only be sent by the server.
    WildcardSubscriptionsNotSupported = 162,
}

/// Reason code inside AUTH packets that specifies the authentication exchange's current state.
///
/// Enum values match [MQTT5 spec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901220) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AuthenticateReasonCode {

    /// Returned when the authentication exchange completed successfully.
    #[default]
    Success = 0,

    /// Returned when the sender wants the receiver to perform another step of the authentication exchange.
    ContinueAuthentication = 24,

    /// Returned when the client wants to re-run the authentication exchange on an established connection.
    ReAuthenticate = 25,
}

/// Data model for MQTT5 user properties.
///
/// A user property is a name-value pair of utf-8 strings that can be added to mqtt5 packets. Names are
/// not unique; a given name may appear more than once in a packet.
///
/// User properties are required to be utf-8, but some implementations of MQTT5 clients and brokers do
/// not enforce this.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserProperty {

    /// User property name
    pub name: String,

    /// User property value
    pub value: String,
}

/// Specifies a single subscription within a Subscribe operation
///
/// See [MQTT5 Subscription Options](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901169)
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Subscription {

    /// Topic filter to subscribe to
    pub topic_filter: String,

    /// Maximum QoS on which the subscriber will accept publish messages.  Negotiated QoS may be different.
    pub qos: QualityOfService,

    /// Should the server not send publishes to a client when that client was the one who sent the publish?
    /// Ignored by 3.1.1 encodes.
    pub no_local: bool,

    /// Should messages sent due to this subscription keep the retain flag preserved on the message?
    /// Ignored by 3.1.1 encodes.
    pub retain_as_published: bool,

    /// Should retained messages on matching topics be sent in reaction to this subscription?
    /// Ignored by 3.1.1 encodes.
    pub retain_handling_type: RetainHandlingType,
}

/// Data model of an [MQTT5 PUBLISH](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901100) packet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublishPacket {

    /// Packet identifier of the exchange, non-zero only for QoS 1 and 2.  Assigned by the engine;
    /// a user-supplied value is overwritten at send time.
    pub packet_id: u16,

    /// Sent publishes - the topic this message should be published to.
    ///
    /// Received publishes - the topic this message was published to, or empty if an alias-only
    /// publish that has not yet passed through inbound alias resolution.
    pub topic: String,

    /// Sent publishes - QoS level to deliver this message at.
    ///
    /// Received publishes - QoS level the server delivered at, less than or equal to the granted
    /// subscription maximum.
    pub qos: QualityOfService,

    /// True if this is a redelivery of an earlier attempt of the same QoS 1 or 2 exchange.
    pub duplicate: bool,

    /// True if this should be or was a retained message.
    pub retain: bool,

    /// The message body.
    pub payload: Option<Vec<u8>>,

    /// Property specifying the format of the payload.  The engine does not enforce or react
    /// to this value in any way.
    pub payload_format: Option<PayloadFormatIndicator>,

    /// Maximum amount of time, in seconds, that the message may be held by the receiving end
    /// before delivery or expiry.  Recomputed on session-resumption resend.
    pub message_expiry_interval_seconds: Option<u32>,

    /// Topic alias bound to or standing in for the topic field.  Assigned by the engine's
    /// outbound alias resolution; inbound values are resolved and then cleared before delivery.
    pub topic_alias: Option<u16>,

    /// Opaque topic describing where the mqtt-based request/response responder should publish a response.
    pub response_topic: Option<String>,

    /// Opaque binary data used to correlate an mqtt-based request/response request with its response.
    pub correlation_data: Option<Vec<u8>>,

    /// Received publishes only - the subscription identifiers of all the subscriptions this
    /// message matched.
    pub subscription_identifiers: Option<Vec<u32>>,

    /// Property specifying the content type of the payload.  Not internally meaningful to MQTT.
    pub content_type: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,
}

/// Data model of an [MQTT5 CONNECT](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901033) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectPacket {

    /// Maximum interval, in seconds, that is permitted to elapse between the point at which the client
    /// finishes transmitting one MQTT packet and the point it starts sending the next, before the
    /// server treats the connection as dead.
    pub keep_alive_interval_seconds: u16,

    /// Whether the client requests that the server discard any existing session state.
    pub clean_start: bool,

    /// A unique string identifying the client to the server.  If left empty, a unique value
    /// is generated at connect time.
    pub client_id: Option<String>,

    /// A string value that the server may use for client authentication and authorization.
    pub username: Option<String>,

    /// Opaque binary data that the server may use for client authentication and authorization.
    pub password: Option<Vec<u8>>,

    /// Time interval, in seconds, that the server should wait (for a session reconnection) before it
    /// destroys the session's state.  MQTT5 only.
    pub session_expiry_interval_seconds: Option<u32>,

    /// If set to true, requests that the server send response information in the subsequent CONNACK.
    pub request_response_information: Option<bool>,

    /// If set to true, requests that the server send additional diagnostic information on failed
    /// operations.
    pub request_problem_information: Option<bool>,

    /// Maximum number of in-flight QoS 1 and 2 messages the client is willing to handle.
    pub receive_maximum: Option<u16>,

    /// Maximum topic alias value that the client will accept on inbound publishes.
    pub topic_alias_maximum: Option<u16>,

    /// Maximum packet size, in bytes, that the client is willing to receive.
    pub maximum_packet_size_bytes: Option<u32>,

    /// Authentication method to use for an extended authentication exchange.
    pub authentication_method: Option<String>,

    /// Initial payload of an extended authentication exchange.
    pub authentication_data: Option<Vec<u8>>,

    /// Time interval, in seconds, that the server should wait before publishing the Will message
    /// after the session is disrupted.
    pub will_delay_interval_seconds: Option<u32>,

    /// Definition of a message to be published when the connection's session is destroyed without
    /// a clean disconnect.
    pub will: Option<PublishPacket>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,
}

/// Data model of an [MQTT5 CONNACK](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901074) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnackPacket {

    /// True if the server is resuming an existing session rather than starting a new one.
    pub session_present: bool,

    /// Result of the connection attempt.
    pub reason_code: ConnectReasonCode,

    /// The session expiry interval that the server actually used, if different from the requested one.
    pub session_expiry_interval: Option<u32>,

    /// Maximum number of in-flight QoS 1 and 2 messages the server is willing to handle.
    pub receive_maximum: Option<u16>,

    /// Maximum message delivery QoS that the server will accept or deliver.
    pub maximum_qos: Option<QualityOfService>,

    /// Whether the server supports retained messages.
    pub retain_available: Option<bool>,

    /// Maximum packet size, in bytes, that the server is willing to receive.
    pub maximum_packet_size: Option<u32>,

    /// Client identifier assigned by the server when the CONNECT contained none.
    pub assigned_client_identifier: Option<String>,

    /// Maximum topic alias value that the server will accept on inbound publishes.
    pub topic_alias_maximum: Option<u16>,

    /// Additional diagnostic information about the connection result.
    pub reason_string: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,

    /// Whether the server supports wildcard subscriptions.
    pub wildcard_subscriptions_available: Option<bool>,

    /// Whether the server supports subscription identifiers.
    pub subscription_identifiers_available: Option<bool>,

    /// Whether the server supports shared subscriptions.
    pub shared_subscriptions_available: Option<bool>,

    /// Keep alive interval the server requires, overriding the client's requested value.
    pub server_keep_alive: Option<u16>,

    /// Opaque response information for mqtt-based request/response support.
    pub response_information: Option<String>,

    /// Alternate server the client should use, paired with UseAnotherServer/ServerMoved reason codes.
    pub server_reference: Option<String>,

    /// Authentication method used in the authentication exchange, echoed from the CONNECT.
    pub authentication_method: Option<String>,

    /// Final payload of the authentication exchange.
    pub authentication_data: Option<Vec<u8>>,
}

/// Data model of an [MQTT5 PUBACK](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901121) packet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PubackPacket {

    /// Packet identifier of the QoS 1 publish this packet acknowledges.
    pub packet_id: u16,

    /// Success indicator or failure reason for the associated publish.
    pub reason_code: PubackReasonCode,

    /// Additional diagnostic information about the result.
    pub reason_string: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,
}

/// Data model of an [MQTT5 PUBREC](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901131) packet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PubrecPacket {

    /// Packet identifier of the QoS 2 publish this packet acknowledges.
    pub packet_id: u16,

    /// Success indicator or failure reason for the first phase of the exchange.
    pub reason_code: PubrecReasonCode,

    /// Additional diagnostic information about the result.
    pub reason_string: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,
}

/// Data model of an [MQTT5 PUBREL](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901141) packet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PubrelPacket {

    /// Packet identifier of the QoS 2 exchange this packet continues.
    pub packet_id: u16,

    /// Success indicator or failure reason for the second phase of the exchange.
    pub reason_code: PubrelReasonCode,

    /// Additional diagnostic information about the result.
    pub reason_string: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,
}

/// Data model of an [MQTT5 PUBCOMP](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901151) packet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PubcompPacket {

    /// Packet identifier of the QoS 2 exchange this packet completes.
    pub packet_id: u16,

    /// Success indicator or failure reason for the final phase of the exchange.
    pub reason_code: PubcompReasonCode,

    /// Additional diagnostic information about the result.
    pub reason_string: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,
}

/// Data model of an [MQTT5 SUBSCRIBE](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901161) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscribePacket {

    /// Packet identifier correlating this request with its SUBACK.  Assigned by the engine.
    pub packet_id: u16,

    /// List of topic filter subscriptions that the sender wishes to add or modify.
    pub subscriptions: Vec<Subscription>,

    /// A positive integer to associate with all subscriptions in this request.  MQTT5 only.
    pub subscription_identifier: Option<u32>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,
}

/// Data model of an [MQTT5 SUBACK](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901171) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubackPacket {

    /// Packet identifier of the SUBSCRIBE this packet acknowledges.
    pub packet_id: u16,

    /// Additional diagnostic information about the result.
    pub reason_string: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,

    /// A list of reason codes indicating the result of each individual subscription entry in the
    /// associated SUBSCRIBE packet, in order.
    pub reason_codes: Vec<SubackReasonCode>,
}

/// Data model of an [MQTT5 UNSUBSCRIBE](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901179) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnsubscribePacket {

    /// Packet identifier correlating this request with its UNSUBACK.  Assigned by the engine.
    pub packet_id: u16,

    /// List of topic filters that the sender wishes to unsubscribe from.
    pub topic_filters: Vec<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,
}

/// Data model of an [MQTT5 UNSUBACK](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901187) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnsubackPacket {

    /// Packet identifier of the UNSUBSCRIBE this packet acknowledges.
    pub packet_id: u16,

    /// Additional diagnostic information about the result.
    pub reason_string: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,

    /// A list of reason codes indicating the result of each individual topic filter entry in the
    /// associated UNSUBSCRIBE packet, in order.
    pub reason_codes: Vec<UnsubackReasonCode>,
}

/// Data model of an [MQTT5 PINGREQ](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901195) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PingreqPacket {}

/// Data model of an [MQTT5 PINGRESP](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901200) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PingrespPacket {}

/// Data model of an [MQTT5 DISCONNECT](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901205) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisconnectPacket {

    /// Why the connection is being or was closed.
    pub reason_code: DisconnectReasonCode,

    /// Change to the session expiry interval negotiated at connection time.  May not be zero
    /// if the negotiated interval was zero.
    pub session_expiry_interval_seconds: Option<u32>,

    /// Additional diagnostic information about the disconnect.
    pub reason_string: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,

    /// Alternate server the client should use, paired with UseAnotherServer/ServerMoved reason codes.
    pub server_reference: Option<String>,
}

/// Data model of an [MQTT5 AUTH](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901217) packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthPacket {

    /// Current state of the extended authentication exchange.
    pub reason_code: AuthenticateReasonCode,

    /// Authentication method this exchange uses.  Must match the method specified in the CONNECT.
    pub authentication_method: Option<String>,

    /// Method-specific binary payload of this step of the exchange.
    pub authentication_data: Option<Vec<u8>>,

    /// Additional diagnostic information about the exchange.
    pub reason_string: Option<String>,

    /// Set of MQTT5 user properties attached to the packet.
    pub user_properties: Option<Vec<UserProperty>>,
}

/// Algebraic union of all MQTT packet types.
#[derive(Clone, Debug, PartialEq)]
pub enum MqttPacket {
    Connect(ConnectPacket),
    Connack(ConnackPacket),
    Publish(PublishPacket),
    Puback(PubackPacket),
    Pubrec(PubrecPacket),
    Pubrel(PubrelPacket),
    Pubcomp(PubcompPacket),
    Subscribe(SubscribePacket),
    Suback(SubackPacket),
    Unsubscribe(UnsubscribePacket),
    Unsuback(UnsubackPacket),
    Pingreq(PingreqPacket),
    Pingresp(PingrespPacket),
    Disconnect(DisconnectPacket),
    Auth(AuthPacket),
}

/// An enum indicating the kind of MQTT packet
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PacketType {

    /// A [Connect](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901033) packet
    Connect,

    /// A [Connack](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901074) packet
    Connack,

    /// A [Publish](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901100) packet
    Publish,

    /// A [Puback](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901121) packet
    Puback,

    /// A [Pubrec](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901131) packet
    Pubrec,

    /// A [Pubrel](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901141) packet
    Pubrel,

    /// A [Pubcomp](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901151) packet
    Pubcomp,

    /// A [Subscribe](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901161) packet
    Subscribe,

    /// A [Suback](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901171) packet
    Suback,

    /// An [Unsubscribe](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901179) packet
    Unsubscribe,

    /// An [Unsuback](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901187) packet
    Unsuback,

    /// A [Pingreq](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901195) packet
    Pingreq,

    /// A [Pingresp](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901200) packet
    Pingresp,

    /// A [Disconnect](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901205) packet
    Disconnect,

    /// An [Auth](https://docs.oasis-open.org/mqtt/mqtt/v5.0/os/mqtt-v5.0-os.html#_Toc3901217) packet
    Auth,
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PacketType::Connect => { write!(f, "ConnectPacket") }
            PacketType::Connack => { write!(f, "ConnackPacket") }
            PacketType::Publish => { write!(f, "PublishPacket") }
            PacketType::Puback => { write!(f, "PubackPacket") }
            PacketType::Pubrec => { write!(f, "PubrecPacket") }
            PacketType::Pubrel => { write!(f, "PubrelPacket") }
            PacketType::Pubcomp => { write!(f, "PubcompPacket") }
            PacketType::Subscribe => { write!(f, "SubscribePacket") }
            PacketType::Suback => { write!(f, "SubackPacket") }
            PacketType::Unsubscribe => { write!(f, "UnsubscribePacket") }
            PacketType::Unsuback => { write!(f, "UnsubackPacket") }
            PacketType::Pingreq => { write!(f, "PingreqPacket") }
            PacketType::Pingresp => { write!(f, "PingrespPacket") }
            PacketType::Disconnect => { write!(f, "DisconnectPacket") }
            PacketType::Auth => { write!(f, "AuthPacket") }
        }
    }
}
