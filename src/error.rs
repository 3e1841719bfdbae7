/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
A module containing the core crate error enumeration, context structures, and conversion
definitions.
 */

use crate::mqtt::PacketType;

use std::error::Error;
use std::fmt;

// most variants carry nothing but a source chain; the context structs and constructors are
// stamped out below
macro_rules! define_error_context_with_source {
    ($context_type: ident, $constructor_name: ident) => {
        #[doc = concat!("Additional details about a ", stringify!($context_type), " error variant")]
        #[derive(Debug)]
        pub struct $context_type {
            source: Box<dyn Error + Send + Sync + 'static>
        }

        impl SchistError {
            pub(crate) fn $constructor_name(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
                SchistError::$context_type($context_type {
                    source : source.into()
                })
            }
        }
    };
}

macro_rules! define_error_context_without_source {
    ($context_type: ident, $constructor_name: ident) => {
        #[doc = concat!("Additional details about a ", stringify!($context_type), " error variant")]
        #[derive(Debug)]
        pub struct $context_type {
        }

        impl SchistError {
            pub(crate) fn $constructor_name() -> Self {
                SchistError::$context_type($context_type {})
            }
        }
    };
}

/// Additional details about a StdIoError error variant
#[derive(Debug)]
pub struct StdIoError {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a TransportError error variant
#[derive(Debug)]
pub struct TransportError {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a PacketValidation error variant
#[derive(Debug)]
pub struct PacketValidationContext {

    /// type of packet that failed validation
    pub packet_type: PacketType,

    source: Box<dyn Error + Send + Sync + 'static>
}

/// Basic error type for the entire schist-mqtt crate.
#[derive(Debug)]
#[non_exhaustive]
pub enum SchistError {

    /// Failure encountered while using an operation-related channel
    OperationChannelFailure(OperationChannelFailure),

    /// Error encountered while attempting to encode an MQTT packet
    EncodingFailure(EncodingFailure),

    /// Error encountered while attempting to decode an incoming MQTT packet.  This is distinct
    /// from errors that arise from packets that violate protocol behavior specifications.
    /// Examples include bad header flags, mismatches between remaining length
    /// fields and overall packet length, unknown property identifiers, etc...
    DecodingFailure(DecodingFailure),

    /// Generic error emitted when the remote endpoint behaves in a way that violates the MQTT
    /// specification and cannot be safely ignored or recovered from.
    ProtocolError(ProtocolError),

    /// Error emitted when an inbound publish arrives with an unknown or out-of-range topic alias.
    InboundTopicAliasNotValid(InboundTopicAliasNotValid),

    /// Error emitted when something happens that should never happen.  Always indicates
    /// a bug in the engine.
    InternalStateError(InternalStateError),

    /// Error emitted when a successfully established connection subsequently gets closed for
    /// some reason.
    ConnectionClosed(ConnectionClosed),

    /// Error applied to MQTT operations that are failed because the endpoint is offline and the
    /// configured offline policy rejects the operation.
    OfflineQueuePolicyFailed(OfflineQueuePolicyFailed),

    /// Error applied to user-submitted operations when no Ack packet arrives within the
    /// operation's timeout interval.
    AckTimeout(AckTimeout),

    /// Error reported to a caller that requested a packet identifier while every value in the
    /// id space was bound to an in-flight exchange.  Local and recoverable; never fatal to
    /// the connection.
    PacketIdSpaceExhausted(PacketIdSpaceExhausted),

    /// Error applied to all unfinished operations when the owning endpoint is closed.
    EndpointClosed(EndpointClosed),

    /// Error emitted after sending a user-submitted Disconnect packet as part of a `stop()`
    /// invocation.  Does not indicate an actual failure.
    UserInitiatedDisconnect(UserInitiatedDisconnect),

    /// Error emitted when a connection attempt fails prior to receipt of a successful
    /// Connack packet.
    ConnectionEstablishmentFailure(ConnectionEstablishmentFailure),

    /// Generic error wrapping std::io::Error
    StdIoError(StdIoError),

    /// Generic error propagated opaquely from the transport boundary.
    TransportError(TransportError),

    /// Error emitted when a packet is submitted or received that violates the MQTT
    /// specification.
    PacketValidation(PacketValidationContext),
}

define_error_context_with_source!(OperationChannelFailure, new_operation_channel_failure);
define_error_context_with_source!(EncodingFailure, new_encoding_failure);
define_error_context_with_source!(DecodingFailure, new_decoding_failure);
define_error_context_with_source!(ProtocolError, new_protocol_error);
define_error_context_with_source!(InboundTopicAliasNotValid, new_inbound_topic_alias_not_valid);
define_error_context_with_source!(InternalStateError, new_internal_state_error);
define_error_context_with_source!(ConnectionClosed, new_connection_closed);
define_error_context_with_source!(ConnectionEstablishmentFailure, new_connection_establishment_failure);

define_error_context_without_source!(OfflineQueuePolicyFailed, new_offline_queue_policy_failed);
define_error_context_without_source!(AckTimeout, new_ack_timeout);
define_error_context_without_source!(PacketIdSpaceExhausted, new_packet_id_space_exhausted);
define_error_context_without_source!(EndpointClosed, new_endpoint_closed);
define_error_context_without_source!(UserInitiatedDisconnect, new_user_initiated_disconnect);

impl SchistError {

    /// Constructs a StdIoError variant from an existing error.  Typically this should be a
    /// std::io::Error
    #[doc(hidden)]
    pub fn new_std_io_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::StdIoError(
            StdIoError {
                source : source.into()
            }
        )
    }

    /// Constructs a new TransportError variant from an existing error.  Typically this should be
    /// an error surfacing from whatever implements the byte-stream transport boundary.
    #[doc(hidden)]
    pub fn new_transport_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::TransportError(
            TransportError {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_packet_validation(packet_type: PacketType, source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::PacketValidation(
            PacketValidationContext {
                packet_type,
                source : source.into()
            }
        )
    }
}

impl Error for SchistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SchistError::OperationChannelFailure(context) => Some(context.source.as_ref()),
            SchistError::DecodingFailure(context) => Some(context.source.as_ref()),
            SchistError::EncodingFailure(context) => Some(context.source.as_ref()),
            SchistError::ProtocolError(context) => Some(context.source.as_ref()),
            SchistError::InboundTopicAliasNotValid(context) => Some(context.source.as_ref()),
            SchistError::ConnectionEstablishmentFailure(context) => Some(context.source.as_ref()),
            SchistError::InternalStateError(context) => Some(context.source.as_ref()),
            SchistError::ConnectionClosed(context) => Some(context.source.as_ref()),
            SchistError::StdIoError(context) => Some(context.source.as_ref()),
            SchistError::TransportError(context) => Some(context.source.as_ref()),
            SchistError::PacketValidation(context) => Some(context.source.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for SchistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            SchistError::OperationChannelFailure(_) => "failure encountered while sending/receiving on an MQTT operation-related channel",
            SchistError::DecodingFailure(_) => "failure encountered while decoding an incoming MQTT packet",
            SchistError::EncodingFailure(_) => "failure encountered while encoding an outbound MQTT packet",
            SchistError::ProtocolError(_) => "remote endpoint behavior disallowed by the mqtt spec",
            SchistError::InboundTopicAliasNotValid(_) => "topic alias value on incoming publish is not valid",
            SchistError::InternalStateError(_) => "engine reached an invalid internal state; almost certainly a bug",
            SchistError::ConnectionClosed(_) => "connection was closed; source contains further details",
            SchistError::OfflineQueuePolicyFailed(_) => "operation failed due to the offline queue policy and the fact that the endpoint is currently offline",
            SchistError::AckTimeout(_) => "the operation's timeout triggered prior to receiving an ack from the remote endpoint",
            SchistError::PacketIdSpaceExhausted(_) => "no unused packet identifier was available for the operation",
            SchistError::EndpointClosed(_) => "the operation was incomplete prior to the endpoint being closed",
            SchistError::UserInitiatedDisconnect(_) => "connection was shut down by user action",
            SchistError::ConnectionEstablishmentFailure(_) => "failed to establish an MQTT connection to the remote endpoint",
            SchistError::StdIoError(_) => "generic error wrapper for std::io::Error when no more specialized error is appropriate; source contains further details",
            SchistError::TransportError(_) => "transport error; source contains further details",
            SchistError::PacketValidation(context) => {
                return write!(f, "{} contains a property that violates the mqtt spec", context.packet_type);
            }
        };

        f.write_str(message)
    }
}

impl From<std::io::Error> for SchistError {
    fn from(error: std::io::Error) -> Self {
        SchistError::new_std_io_error(error)
    }
}

impl From<core::str::Utf8Error> for SchistError {
    fn from(err: core::str::Utf8Error) -> Self {
        SchistError::new_decoding_failure(err)
    }
}

#[cfg(feature="tokio")]
impl From<tokio::sync::oneshot::error::RecvError> for SchistError {
    fn from(err: tokio::sync::oneshot::error::RecvError) -> Self {
        SchistError::new_operation_channel_failure(err)
    }
}

impl <T> From<std::sync::mpsc::SendError<T>> for SchistError
where T : Send + Sync + 'static {
    fn from(err: std::sync::mpsc::SendError<T>) -> Self {
        SchistError::new_operation_channel_failure(err)
    }
}

impl From<std::sync::mpsc::RecvError> for SchistError {
    fn from(err: std::sync::mpsc::RecvError) -> Self {
        SchistError::new_operation_channel_failure(err)
    }
}

/// Crate-wide result type for functions that can fail
pub type SchistResult<T> = Result<T, SchistError>;

pub(crate) fn fold_mqtt_result<T>(base: SchistResult<T>, new_result: SchistResult<T>) -> SchistResult<T> {
    new_result?;
    base
}
