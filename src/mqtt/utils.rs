/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing miscellaneous constants and conversion functions related to the MQTT specifications.
 */

use crate::error::{SchistError, SchistResult};
use crate::mqtt::*;

use log::error;
use std::fmt;

pub(crate) const PACKET_TYPE_CONNECT: u8 = 1;
pub(crate) const PACKET_TYPE_CONNACK: u8 = 2;
pub(crate) const PACKET_TYPE_PUBLISH: u8 = 3;
pub(crate) const PACKET_TYPE_PUBACK: u8 = 4;
pub(crate) const PACKET_TYPE_PUBREC: u8 = 5;
pub(crate) const PACKET_TYPE_PUBREL: u8 = 6;
pub(crate) const PACKET_TYPE_PUBCOMP: u8 = 7;
pub(crate) const PACKET_TYPE_SUBSCRIBE: u8 = 8;
pub(crate) const PACKET_TYPE_SUBACK: u8 = 9;
pub(crate) const PACKET_TYPE_UNSUBSCRIBE: u8 = 10;
pub(crate) const PACKET_TYPE_UNSUBACK: u8 = 11;
pub(crate) const PACKET_TYPE_PINGREQ: u8 = 12;
pub(crate) const PACKET_TYPE_PINGRESP: u8 = 13;
pub(crate) const PACKET_TYPE_DISCONNECT: u8 = 14;
pub(crate) const PACKET_TYPE_AUTH: u8 = 15;

pub(crate) const PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR: u8 = 1;
pub(crate) const PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL: u8 = 2;
pub(crate) const PROPERTY_KEY_CONTENT_TYPE: u8 = 3;
pub(crate) const PROPERTY_KEY_RESPONSE_TOPIC: u8 = 8;
pub(crate) const PROPERTY_KEY_CORRELATION_DATA: u8 = 9;
pub(crate) const PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER: u8 = 11;
pub(crate) const PROPERTY_KEY_SESSION_EXPIRY_INTERVAL: u8 = 17;
pub(crate) const PROPERTY_KEY_ASSIGNED_CLIENT_IDENTIFIER: u8 = 18;
pub(crate) const PROPERTY_KEY_SERVER_KEEP_ALIVE: u8 = 19;
pub(crate) const PROPERTY_KEY_AUTHENTICATION_METHOD: u8 = 21;
pub(crate) const PROPERTY_KEY_AUTHENTICATION_DATA: u8 = 22;
pub(crate) const PROPERTY_KEY_REQUEST_PROBLEM_INFORMATION: u8 = 23;
pub(crate) const PROPERTY_KEY_WILL_DELAY_INTERVAL: u8 = 24;
pub(crate) const PROPERTY_KEY_REQUEST_RESPONSE_INFORMATION: u8 = 25;
pub(crate) const PROPERTY_KEY_RESPONSE_INFORMATION: u8 = 26;
pub(crate) const PROPERTY_KEY_SERVER_REFERENCE: u8 = 28;
pub(crate) const PROPERTY_KEY_REASON_STRING: u8 = 31;
pub(crate) const PROPERTY_KEY_RECEIVE_MAXIMUM: u8 = 33;
pub(crate) const PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM: u8 = 34;
pub(crate) const PROPERTY_KEY_TOPIC_ALIAS: u8 = 35;
pub(crate) const PROPERTY_KEY_MAXIMUM_QOS: u8 = 36;
pub(crate) const PROPERTY_KEY_RETAIN_AVAILABLE: u8 = 37;
pub(crate) const PROPERTY_KEY_USER_PROPERTY: u8 = 38;
pub(crate) const PROPERTY_KEY_MAXIMUM_PACKET_SIZE: u8 = 39;
pub(crate) const PROPERTY_KEY_WILDCARD_SUBSCRIPTIONS_AVAILABLE: u8 = 40;
pub(crate) const PROPERTY_KEY_SUBSCRIPTION_IDENTIFIERS_AVAILABLE: u8 = 41;
pub(crate) const PROPERTY_KEY_SHARED_SUBSCRIPTIONS_AVAILABLE: u8 = 42;

pub(crate) const PUBLISH_PACKET_FIXED_HEADER_DUPLICATE_FLAG : u8 = 8;
pub(crate) const PUBLISH_PACKET_FIXED_HEADER_RETAIN_FLAG : u8 = 1;
pub(crate) const QOS_MASK : u8 = 3;

pub(crate) const CONNECT_PACKET_CLEAN_START_FLAG_MASK : u8 = 1 << 1;
pub(crate) const CONNECT_PACKET_HAS_WILL_FLAG_MASK : u8 = 1 << 2;
pub(crate) const CONNECT_PACKET_WILL_RETAIN_FLAG_MASK : u8 = 1 << 5;
pub(crate) const CONNECT_PACKET_WILL_QOS_FLAG_SHIFT : u8 = 3;
pub(crate) const CONNECT_PACKET_HAS_USERNAME_FLAG_MASK : u8 = 1 << 7;
pub(crate) const CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK : u8 = 1 << 6;

pub(crate) const CONNECT_FIRST_BYTE : u8 = PACKET_TYPE_CONNECT << 4;
pub(crate) const CONNACK_FIRST_BYTE : u8 = PACKET_TYPE_CONNACK << 4;
pub(crate) const PUBACK_FIRST_BYTE : u8 = PACKET_TYPE_PUBACK << 4;
pub(crate) const PUBREC_FIRST_BYTE : u8 = PACKET_TYPE_PUBREC << 4;
pub(crate) const PUBREL_FIRST_BYTE : u8 = (PACKET_TYPE_PUBREL << 4) | (0x02u8);
pub(crate) const PUBCOMP_FIRST_BYTE : u8 = PACKET_TYPE_PUBCOMP << 4;
pub(crate) const SUBSCRIBE_FIRST_BYTE : u8 = (PACKET_TYPE_SUBSCRIBE << 4) | (0x02u8);
pub(crate) const SUBACK_FIRST_BYTE : u8 = PACKET_TYPE_SUBACK << 4;
pub(crate) const UNSUBSCRIBE_FIRST_BYTE : u8 = (PACKET_TYPE_UNSUBSCRIBE << 4) | (0x02u8);
pub(crate) const UNSUBACK_FIRST_BYTE : u8 = PACKET_TYPE_UNSUBACK << 4;
pub(crate) const PINGREQ_FIRST_BYTE : u8 = PACKET_TYPE_PINGREQ << 4;
pub(crate) const PINGRESP_FIRST_BYTE : u8 = PACKET_TYPE_PINGRESP << 4;
pub(crate) const DISCONNECT_FIRST_BYTE : u8 = PACKET_TYPE_DISCONNECT << 4;
pub(crate) const AUTH_FIRST_BYTE : u8 = PACKET_TYPE_AUTH << 4;

pub(crate) const SUBSCRIPTION_OPTIONS_NO_LOCAL_MASK : u8 = 1u8 << 2;
pub(crate) const SUBSCRIPTION_OPTIONS_RETAIN_AS_PUBLISHED_MASK : u8 = 1u8 << 3;
pub(crate) const SUBSCRIPTION_OPTIONS_RETAIN_HANDLING_SHIFT : u8 = 4;

pub(crate) const MAXIMUM_VARIABLE_LENGTH_INTEGER : usize = (1 << 28) - 1;
pub(crate) const MAXIMUM_STRING_PROPERTY_LENGTH : usize = 65535;
pub(crate) const MAXIMUM_BINARY_PROPERTY_LENGTH : usize = 65535;

macro_rules! define_u8_enum_conversion {
    ($enum_type: ident, $conversion_fn: ident, [ $(($variant: ident, $value: expr)),+ ]) => {
        pub(crate) fn $conversion_fn(value: u8) -> SchistResult<$enum_type> {
            match value {
                $($value => { Ok($enum_type::$variant) })+
                _ => {
                    let message = format!("{} - invalid {} value ({})", stringify!($conversion_fn), stringify!($enum_type), value);
                    error!("{}", message);
                    Err(SchistError::new_decoding_failure(message))
                }
            }
        }

        impl fmt::Display for $enum_type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    $($enum_type::$variant => { write!(f, "{} ({})", $value, stringify!($variant)) })+
                }
            }
        }
    };
}

define_u8_enum_conversion!(QualityOfService, convert_u8_to_quality_of_service, [
    (AtMostOnce, 0),
    (AtLeastOnce, 1),
    (ExactlyOnce, 2)
]);

define_u8_enum_conversion!(PayloadFormatIndicator, convert_u8_to_payload_format_indicator, [
    (Bytes, 0),
    (Utf8, 1)
]);

define_u8_enum_conversion!(RetainHandlingType, convert_u8_to_retain_handling_type, [
    (SendOnSubscribe, 0),
    (SendOnSubscribeIfNew, 1),
    (DontSend, 2)
]);

define_u8_enum_conversion!(ConnectReasonCode, convert_u8_to_connect_reason_code, [
    (Success, 0),
    (UnspecifiedError, 128),
    (MalformedPacket, 129),
    (ProtocolError, 130),
    (ImplementationSpecificError, 131),
    (UnsupportedProtocolVersion, 132),
    (ClientIdentifierNotValid, 133),
    (BadUsernameOrPassword, 134),
    (NotAuthorized, 135),
    (ServerUnavailable, 136),
    (ServerBusy, 137),
    (Banned, 138),
    (BadAuthenticationMethod, 140),
    (TopicNameInvalid, 144),
    (PacketTooLarge, 149),
    (QuotaExceeded, 151),
    (PayloadFormatInvalid, 153),
    (RetainNotSupported, 154),
    (QosNotSupported, 155),
    (UseAnotherServer, 156),
    (ServerMoved, 157),
    (ConnectionRateExceeded, 159)
]);

define_u8_enum_conversion!(PubackReasonCode, convert_u8_to_puback_reason_code, [
    (Success, 0),
    (NoMatchingSubscribers, 16),
    (UnspecifiedError, 128),
    (ImplementationSpecificError, 131),
    (NotAuthorized, 135),
    (TopicNameInvalid, 144),
    (PacketIdentifierInUse, 145),
    (QuotaExceeded, 151),
    (PayloadFormatInvalid, 153)
]);

define_u8_enum_conversion!(PubrecReasonCode, convert_u8_to_pubrec_reason_code, [
    (Success, 0),
    (NoMatchingSubscribers, 16),
    (UnspecifiedError, 128),
    (ImplementationSpecificError, 131),
    (NotAuthorized, 135),
    (TopicNameInvalid, 144),
    (PacketIdentifierInUse, 145),
    (QuotaExceeded, 151),
    (PayloadFormatInvalid, 153)
]);

define_u8_enum_conversion!(PubrelReasonCode, convert_u8_to_pubrel_reason_code, [
    (Success, 0),
    (PacketIdentifierNotFound, 146)
]);

define_u8_enum_conversion!(PubcompReasonCode, convert_u8_to_pubcomp_reason_code, [
    (Success, 0),
    (PacketIdentifierNotFound, 146)
]);

define_u8_enum_conversion!(SubackReasonCode, convert_u8_to_suback_reason_code, [
    (GrantedQos0, 0),
    (GrantedQos1, 1),
    (GrantedQos2, 2),
    (UnspecifiedError, 128),
    (ImplementationSpecificError, 131),
    (NotAuthorized, 135),
    (TopicFilterInvalid, 143),
    (PacketIdentifierInUse, 145),
    (QuotaExceeded, 151),
    (SharedSubscriptionsNotSupported, 158),
    (SubscriptionIdentifiersNotSupported, 161),
    (WildcardSubscriptionsNotSupported, 162)
]);

define_u8_enum_conversion!(UnsubackReasonCode, convert_u8_to_unsuback_reason_code, [
    (Success, 0),
    (NoSubscriptionExisted, 17),
    (UnspecifiedError, 128),
    (ImplementationSpecificError, 131),
    (NotAuthorized, 135),
    (TopicFilterInvalid, 143),
    (PacketIdentifierInUse, 145)
]);

define_u8_enum_conversion!(DisconnectReasonCode, convert_u8_to_disconnect_reason_code, [
    (NormalDisconnection, 0),
    (DisconnectWithWillMessage, 4),
    (UnspecifiedError, 128),
    (MalformedPacket, 129),
    (ProtocolError, 130),
    (ImplementationSpecificError, 131),
    (NotAuthorized, 135),
    (ServerBusy, 137),
    (ServerShuttingDown, 139),
    (KeepAliveTimeout, 141),
    (SessionTakenOver, 142),
    (TopicFilterInvalid, 143),
    (TopicNameInvalid, 144),
    (ReceiveMaximumExceeded, 147),
    (TopicAliasInvalid, 148),
    (PacketTooLarge, 149),
    (MessageRateTooHigh, 150),
    (QuotaExceeded, 151),
    (AdministrativeAction, 152),
    (PayloadFormatInvalid, 153),
    (RetainNotSupported, 154),
    (QosNotSupported, 155),
    (UseAnotherServer, 156),
    (ServerMoved, 157),
    (SharedSubscriptionsNotSupported, 158),
    (ConnectionRateExceeded, 159),
    (MaximumConnectTime, 160),
    (SubscriptionIdentifiersNotSupported, 161),
    (WildcardSubscriptionsNotSupported, 162)
]);

define_u8_enum_conversion!(AuthenticateReasonCode, convert_u8_to_authenticate_reason_code, [
    (Success, 0),
    (ContinueAuthentication, 24),
    (ReAuthenticate, 25)
]);

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolVersion::Mqtt311 => { write!(f, "Mqtt311") }
            ProtocolVersion::Mqtt5 => { write!(f, "Mqtt5") }
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EndpointRole::Client => { write!(f, "Client") }
            EndpointRole::Server => { write!(f, "Server") }
        }
    }
}

/// The wire-level protocol level byte carried by CONNECT's variable header.
pub(crate) fn protocol_version_to_level(version: ProtocolVersion) -> u8 {
    match version {
        ProtocolVersion::Mqtt311 => { 4 }
        ProtocolVersion::Mqtt5 => { 5 }
    }
}

pub(crate) fn convert_protocol_level_to_version(level: u8) -> SchistResult<ProtocolVersion> {
    match level {
        4 => { Ok(ProtocolVersion::Mqtt311) }
        5 => { Ok(ProtocolVersion::Mqtt5) }
        _ => {
            let message = format!("convert_protocol_level_to_version - unsupported protocol level ({})", level);
            error!("{}", message);
            Err(SchistError::new_decoding_failure(message))
        }
    }
}

/// Maps a 3.1.1 CONNACK return code onto the closest MQTT5 connect reason code.
pub(crate) fn convert_311_connack_return_code(value: u8) -> SchistResult<ConnectReasonCode> {
    match value {
        0 => { Ok(ConnectReasonCode::Success) }
        1 => { Ok(ConnectReasonCode::UnsupportedProtocolVersion) }
        2 => { Ok(ConnectReasonCode::ClientIdentifierNotValid) }
        3 => { Ok(ConnectReasonCode::ServerUnavailable) }
        4 => { Ok(ConnectReasonCode::BadUsernameOrPassword) }
        5 => { Ok(ConnectReasonCode::NotAuthorized) }
        _ => {
            let message = format!("convert_311_connack_return_code - invalid return code ({})", value);
            error!("{}", message);
            Err(SchistError::new_decoding_failure(message))
        }
    }
}

/// Maps a connect reason code back down to its 3.1.1 CONNACK return code equivalent.
pub(crate) fn connect_reason_code_to_311_return_code(reason_code: ConnectReasonCode) -> u8 {
    match reason_code {
        ConnectReasonCode::Success => { 0 }
        ConnectReasonCode::UnsupportedProtocolVersion => { 1 }
        ConnectReasonCode::ClientIdentifierNotValid => { 2 }
        ConnectReasonCode::ServerUnavailable | ConnectReasonCode::ServerBusy => { 3 }
        ConnectReasonCode::BadUsernameOrPassword => { 4 }
        _ => { 5 }
    }
}

/// Maps a 3.1.1 SUBACK return code onto the closest MQTT5 suback reason code.
pub(crate) fn convert_311_suback_return_code(value: u8) -> SchistResult<SubackReasonCode> {
    match value {
        0 => { Ok(SubackReasonCode::GrantedQos0) }
        1 => { Ok(SubackReasonCode::GrantedQos1) }
        2 => { Ok(SubackReasonCode::GrantedQos2) }
        128 => { Ok(SubackReasonCode::UnspecifiedError) }
        _ => {
            let message = format!("convert_311_suback_return_code - invalid return code ({})", value);
            error!("{}", message);
            Err(SchistError::new_decoding_failure(message))
        }
    }
}

/// Maps a suback reason code back down to its 3.1.1 SUBACK return code equivalent.
pub(crate) fn suback_reason_code_to_311_return_code(reason_code: SubackReasonCode) -> u8 {
    match reason_code {
        SubackReasonCode::GrantedQos0 => { 0 }
        SubackReasonCode::GrantedQos1 => { 1 }
        SubackReasonCode::GrantedQos2 => { 2 }
        _ => { 128 }
    }
}

pub(crate) fn mqtt_packet_to_packet_type(packet: &MqttPacket) -> PacketType {
    match packet {
        MqttPacket::Connect(_) => { PacketType::Connect }
        MqttPacket::Connack(_) => { PacketType::Connack }
        MqttPacket::Publish(_) => { PacketType::Publish }
        MqttPacket::Puback(_) => { PacketType::Puback }
        MqttPacket::Pubrec(_) => { PacketType::Pubrec }
        MqttPacket::Pubrel(_) => { PacketType::Pubrel }
        MqttPacket::Pubcomp(_) => { PacketType::Pubcomp }
        MqttPacket::Subscribe(_) => { PacketType::Subscribe }
        MqttPacket::Suback(_) => { PacketType::Suback }
        MqttPacket::Unsubscribe(_) => { PacketType::Unsubscribe }
        MqttPacket::Unsuback(_) => { PacketType::Unsuback }
        MqttPacket::Pingreq(_) => { PacketType::Pingreq }
        MqttPacket::Pingresp(_) => { PacketType::Pingresp }
        MqttPacket::Disconnect(_) => { PacketType::Disconnect }
        MqttPacket::Auth(_) => { PacketType::Auth }
    }
}

pub(crate) fn packet_type_to_str(packet_type: u8) -> &'static str {
    match packet_type {
        PACKET_TYPE_CONNECT => { "Connect" }
        PACKET_TYPE_CONNACK => { "Connack" }
        PACKET_TYPE_PUBLISH => { "Publish" }
        PACKET_TYPE_PUBACK => { "Puback" }
        PACKET_TYPE_PUBREC => { "Pubrec" }
        PACKET_TYPE_PUBREL => { "Pubrel" }
        PACKET_TYPE_PUBCOMP => { "Pubcomp" }
        PACKET_TYPE_SUBSCRIBE => { "Subscribe" }
        PACKET_TYPE_SUBACK => { "Suback" }
        PACKET_TYPE_UNSUBSCRIBE => { "Unsubscribe" }
        PACKET_TYPE_UNSUBACK => { "Unsuback" }
        PACKET_TYPE_PINGREQ => { "Pingreq" }
        PACKET_TYPE_PINGRESP => { "Pingresp" }
        PACKET_TYPE_DISCONNECT => { "Disconnect" }
        PACKET_TYPE_AUTH => { "Auth" }
        _ => {
            "Unknown"
        }
    }
}

pub(crate) fn mqtt_packet_to_str(packet: &MqttPacket) -> &'static str {
    match packet {
        MqttPacket::Connect(_) => { "CONNECT" }
        MqttPacket::Connack(_) => { "CONNACK" }
        MqttPacket::Publish(_) => { "PUBLISH" }
        MqttPacket::Puback(_) => { "PUBACK" }
        MqttPacket::Pubrec(_) => { "PUBREC" }
        MqttPacket::Pubrel(_) => { "PUBREL" }
        MqttPacket::Pubcomp(_) => { "PUBCOMP" }
        MqttPacket::Subscribe(_) => { "SUBSCRIBE" }
        MqttPacket::Suback(_) => { "SUBACK" }
        MqttPacket::Unsubscribe(_) => { "UNSUBSCRIBE" }
        MqttPacket::Unsuback(_) => { "UNSUBACK" }
        MqttPacket::Pingreq(_) => { "PINGREQ" }
        MqttPacket::Pingresp(_) => { "PINGRESP" }
        MqttPacket::Disconnect(_) => { "DISCONNECT" }
        MqttPacket::Auth(_) => { "AUTH" }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn u8_to_quality_of_service_conversions() {
        assert_eq!(QualityOfService::AtMostOnce, convert_u8_to_quality_of_service(0).unwrap());
        assert_eq!(QualityOfService::AtLeastOnce, convert_u8_to_quality_of_service(1).unwrap());
        assert_eq!(QualityOfService::ExactlyOnce, convert_u8_to_quality_of_service(2).unwrap());
        assert_matches!(convert_u8_to_quality_of_service(3), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn u8_to_reason_code_conversion_rejects_unknown_values() {
        assert_matches!(convert_u8_to_connect_reason_code(1), Err(SchistError::DecodingFailure(_)));
        assert_matches!(convert_u8_to_puback_reason_code(200), Err(SchistError::DecodingFailure(_)));
        assert_matches!(convert_u8_to_disconnect_reason_code(163), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn connack_return_code_mapping_311() {
        for return_code in 0u8..6u8 {
            let reason_code = convert_311_connack_return_code(return_code).unwrap();
            assert_eq!(return_code, connect_reason_code_to_311_return_code(reason_code));
        }

        assert_matches!(convert_311_connack_return_code(6), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn suback_return_code_mapping_311() {
        for return_code in [0u8, 1u8, 2u8, 128u8] {
            let reason_code = convert_311_suback_return_code(return_code).unwrap();
            assert_eq!(return_code, suback_reason_code_to_311_return_code(reason_code));
        }

        assert_eq!(128, suback_reason_code_to_311_return_code(SubackReasonCode::QuotaExceeded));
        assert_matches!(convert_311_suback_return_code(3), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn protocol_level_conversions() {
        assert_eq!(ProtocolVersion::Mqtt311, convert_protocol_level_to_version(4).unwrap());
        assert_eq!(ProtocolVersion::Mqtt5, convert_protocol_level_to_version(5).unwrap());
        assert_matches!(convert_protocol_level_to_version(3), Err(SchistError::DecodingFailure(_)));
    }
}
