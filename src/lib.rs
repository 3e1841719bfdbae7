/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
An MQTT 3.1.1/5.0 endpoint protocol engine, usable in either the client or broker-facing role.

The heart of the crate is a runtime-independent protocol state machine: bytes and time go in,
bytes and completed operations come out.  A tokio-based endpoint that drives that state machine
over an arbitrary AsyncRead + AsyncWrite transport is available behind the `tokio` feature.
 */

pub mod alias;
#[cfg(feature = "tokio")]
pub mod client;
pub mod config;
mod decode;
mod encode;
pub mod error;
mod logging;
mod mqtt;
mod packet_id;
mod protocol;
mod store;
mod validate;

pub use error::{SchistError, SchistResult};

pub use packet_id::PacketIdAllocator;

pub use protocol::{
    PublishOptions,
    PublishOptionsBuilder,
    SubscribeOptions,
    SubscribeOptionsBuilder,
    UnsubscribeOptions,
    UnsubscribeOptionsBuilder,
    Qos2Response,
    PublishResponse,
    PublishResult,
    SubscribeResult,
    UnsubscribeResult,
};

/* Re-export all packet and protocol types at the root level */
pub use mqtt::ProtocolVersion;
pub use mqtt::EndpointRole;
pub use mqtt::QualityOfService;
pub use mqtt::PayloadFormatIndicator;
pub use mqtt::RetainHandlingType;
pub use mqtt::ConnectReasonCode;
pub use mqtt::PubackReasonCode;
pub use mqtt::PubrecReasonCode;
pub use mqtt::PubrelReasonCode;
pub use mqtt::PubcompReasonCode;
pub use mqtt::DisconnectReasonCode;
pub use mqtt::SubackReasonCode;
pub use mqtt::UnsubackReasonCode;
pub use mqtt::AuthenticateReasonCode;
pub use mqtt::UserProperty;
pub use mqtt::Subscription;

pub use mqtt::AuthPacket;
pub use mqtt::ConnackPacket;
pub use mqtt::ConnectPacket;
pub use mqtt::DisconnectPacket;
pub use mqtt::PingreqPacket;
pub use mqtt::PingrespPacket;
pub use mqtt::PubackPacket;
pub use mqtt::PubcompPacket;
pub use mqtt::PublishPacket;
pub use mqtt::PubrecPacket;
pub use mqtt::PubrelPacket;
pub use mqtt::SubackPacket;
pub use mqtt::SubscribePacket;
pub use mqtt::UnsubackPacket;
pub use mqtt::UnsubscribePacket;
