/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::alias::*;
use crate::config::*;
use crate::error::{SchistError, SchistResult};
use crate::mqtt::*;
use crate::mqtt::auth::*;
use crate::mqtt::connack::*;
use crate::mqtt::connect::*;
use crate::mqtt::disconnect::*;
use crate::mqtt::puback::*;
use crate::mqtt::pubcomp::*;
use crate::mqtt::publish::*;
use crate::mqtt::pubrec::*;
use crate::mqtt::pubrel::*;
use crate::mqtt::suback::*;
use crate::mqtt::subscribe::*;
use crate::mqtt::unsubscribe::*;
use crate::mqtt::unsuback::*;
use crate::mqtt::utils::*;

use log::*;

pub(crate) struct OutboundValidationContext<'a> {

    // maximum packet size, maximum qos, retain/wildcard/shared-sub availability
    pub negotiated_settings : Option<&'a NegotiatedSettings>,

    // session_expiry_interval for disconnect constraints
    pub connect_options: Option<&'a ConnectOptions>,

    pub outbound_alias_resolution: Option<OutboundAliasResolution>
}

pub(crate) struct InboundValidationContext<'a> {
    pub negotiated_settings : Option<&'a NegotiatedSettings>,
}

pub(crate) fn packet_validation_error(packet_type: PacketType, message: String) -> SchistError {
    error!("{}", message);
    SchistError::new_packet_validation(packet_type, message)
}

pub(crate) fn validate_string_length(value: &str, packet_type: PacketType, function_name: &str, field_name: &str) -> SchistResult<()> {
    if value.len() > MAXIMUM_STRING_PROPERTY_LENGTH {
        return Err(packet_validation_error(packet_type, format!("{} - {} string field too long", function_name, field_name)));
    }

    Ok(())
}

pub(crate) fn validate_optional_string_length(optional_string: &Option<String>, packet_type: PacketType, function_name: &str, field_name: &str) -> SchistResult<()> {
    if let Some(value) = optional_string {
        validate_string_length(value.as_str(), packet_type, function_name, field_name)?;
    }

    Ok(())
}

pub(crate) fn validate_optional_binary_length(optional_data: &Option<Vec<u8>>, packet_type: PacketType, function_name: &str, field_name: &str) -> SchistResult<()> {
    if let Some(value) = optional_data {
        if value.len() > MAXIMUM_BINARY_PROPERTY_LENGTH {
            return Err(packet_validation_error(packet_type, format!("{} - {} binary field too long", function_name, field_name)));
        }
    }

    Ok(())
}

pub(crate) fn validate_user_properties(properties: &Option<Vec<UserProperty>>, packet_type: PacketType, function_name: &str) -> SchistResult<()> {
    if let Some(props) = properties {
        for property in props {
            validate_string_length(property.name.as_str(), packet_type, function_name, "UserProperty Name")?;
            validate_string_length(property.value.as_str(), packet_type, function_name, "UserProperty Value")?;
        }
    }

    Ok(())
}

/// Validates user-submitted packets against protocol requirements that do not depend on any
/// connection-bound state.  Connection-bound constraints like maximum_qos and
/// maximum_packet_size are checked by a different function right before a packet hits the
/// wire.
///
/// Utf-8 codepoints are not currently checked by any validation function.
pub(crate) fn validate_packet_outbound(packet: &MqttPacket) -> SchistResult<()> {
    match packet {
        MqttPacket::Auth(auth) => validate_auth_packet_outbound(auth),
        MqttPacket::Connect(connect) => validate_connect_packet_outbound(connect),
        MqttPacket::Disconnect(disconnect) => validate_disconnect_packet_outbound(disconnect),
        MqttPacket::Pingreq(_) => Ok(()),
        MqttPacket::Puback(puback) => validate_puback_packet_outbound(puback),
        MqttPacket::Pubcomp(pubcomp) => validate_pubcomp_packet_outbound(pubcomp),
        MqttPacket::Publish(publish) => validate_publish_packet_outbound(publish),
        MqttPacket::Pubrec(pubrec) => validate_pubrec_packet_outbound(pubrec),
        MqttPacket::Pubrel(pubrel) => validate_pubrel_packet_outbound(pubrel),
        MqttPacket::Subscribe(subscribe) => validate_subscribe_packet_outbound(subscribe),
        MqttPacket::Unsubscribe(unsubscribe) => validate_unsubscribe_packet_outbound(unsubscribe),
        _ => {
            error!("validate_packet_outbound - unexpected packet type");
            Err(SchistError::new_protocol_error("validate_packet_outbound - unexpected packet type"))
        }
    }
}

/// Validates outbound packets against per-connection dynamic constraints.  Called internally
/// right before a packet is seated as the current operation of the protocol state machine.
pub(crate) fn validate_packet_outbound_internal(packet: &MqttPacket, context: &OutboundValidationContext) -> SchistResult<()> {
    match packet {
        MqttPacket::Auth(auth) => validate_auth_packet_outbound_internal(auth, context),
        MqttPacket::Connect(_) | MqttPacket::Pingreq(_) | MqttPacket::Pingresp(_) => Ok(()),
        MqttPacket::Disconnect(disconnect) => validate_disconnect_packet_outbound_internal(disconnect, context),
        MqttPacket::Puback(puback) => validate_puback_packet_outbound_internal(puback, context),
        MqttPacket::Pubcomp(pubcomp) => validate_pubcomp_packet_outbound_internal(pubcomp, context),
        MqttPacket::Publish(publish) => validate_publish_packet_outbound_internal(publish, context),
        MqttPacket::Pubrec(pubrec) => validate_pubrec_packet_outbound_internal(pubrec, context),
        MqttPacket::Pubrel(pubrel) => validate_pubrel_packet_outbound_internal(pubrel, context),
        MqttPacket::Subscribe(subscribe) => validate_subscribe_packet_outbound_internal(subscribe, context),
        MqttPacket::Unsubscribe(unsubscribe) => validate_unsubscribe_packet_outbound_internal(unsubscribe, context),
        _ => {
            error!("validate_packet_outbound_internal - unexpected packet type");
            Err(SchistError::new_protocol_error("validate_packet_outbound_internal - unexpected packet type"))
        }
    }
}

/// Validates inbound packets against protocol requirements.  Structural problems like invalid
/// string or binary lengths are impossible here because the decoder built the packet.
pub(crate) fn validate_packet_inbound_internal(packet: &MqttPacket, context: &InboundValidationContext) -> SchistResult<()> {
    match packet {
        MqttPacket::Auth(auth) => validate_auth_packet_inbound_internal(auth, context),
        MqttPacket::Connack(connack) => validate_connack_packet_inbound_internal(connack),
        MqttPacket::Disconnect(disconnect) => validate_disconnect_packet_inbound_internal(disconnect, context),
        // inbound handshake and subscription packets are structurally validated by the
        // decoder; whether they are legal for this endpoint is a role question settled at
        // dispatch
        MqttPacket::Connect(_) | MqttPacket::Pingreq(_) | MqttPacket::Pingresp(_) => Ok(()),
        MqttPacket::Subscribe(_) | MqttPacket::Unsubscribe(_) => Ok(()),
        MqttPacket::Puback(puback) => validate_puback_packet_inbound_internal(puback, context),
        MqttPacket::Pubcomp(pubcomp) => validate_pubcomp_packet_inbound_internal(pubcomp, context),
        MqttPacket::Publish(publish) => validate_publish_packet_inbound_internal(publish, context),
        MqttPacket::Pubrec(pubrec) => validate_pubrec_packet_inbound_internal(pubrec, context),
        MqttPacket::Pubrel(pubrel) => validate_pubrel_packet_inbound_internal(pubrel, context),
        MqttPacket::Suback(suback) => validate_suback_packet_inbound_internal(suback, context),
        MqttPacket::Unsuback(unsuback) => validate_unsuback_packet_inbound_internal(unsuback, context),
    }
}

macro_rules! validate_optional_integer_non_zero {
    ($value_name: ident, $optional_integer_expr: expr, $packet_type: expr, $function_name: expr, $field_name: expr) => {
        if let Some($value_name) = $optional_integer_expr {
            if $value_name == 0 {
                return Err(packet_validation_error($packet_type, format!("{} - {} integer field is zero", $function_name, $field_name)));
            }
        }
    };
}

pub(crate) use validate_optional_integer_non_zero;

macro_rules! validate_ack_outbound {
    ($function_name: ident, $packet_type_name: ident, $packet_type: expr, $validate_function_name: expr) => {
        pub(crate) fn $function_name(packet: &$packet_type_name) -> SchistResult<()> {
            validate_optional_string_length(&packet.reason_string, $packet_type, $validate_function_name, "reason_string")?;
            validate_user_properties(&packet.user_properties, $packet_type, $validate_function_name)
        }
    };
}

pub(crate) use validate_ack_outbound;

macro_rules! validate_ack_outbound_internal {
    ($function_name: ident, $packet_type_name: ident, $packet_type: expr, $packet_length_function_name: ident, $validate_function_name: expr) => {
        pub(crate) fn $function_name(packet: &$packet_type_name, context: &OutboundValidationContext) -> SchistResult<()> {
            let (total_remaining_length, _) = $packet_length_function_name(packet)?;
            let prefix_length = 1 + compute_variable_length_integer_encode_size(total_remaining_length as usize)? as u32;
            if prefix_length + total_remaining_length > context.negotiated_settings.unwrap().maximum_packet_size_to_peer {
                return Err(packet_validation_error($packet_type, format!("{} - packet length exceeds allowed maximum to peer", $validate_function_name)));
            }

            if packet.packet_id == 0 {
                return Err(packet_validation_error($packet_type, format!("{} - packet id is zero", $validate_function_name)));
            }

            Ok(())
        }
    };
}

pub(crate) use validate_ack_outbound_internal;

macro_rules! validate_ack_inbound_internal {
    ($function_name: ident, $packet_type_name: ident, $packet_type: expr, $validate_function_name: expr) => {
        pub(crate) fn $function_name(packet: &$packet_type_name, _: &InboundValidationContext) -> SchistResult<()> {
            if packet.packet_id == 0 {
                return Err(packet_validation_error($packet_type, format!("{} - packet id is zero", $validate_function_name)));
            }

            Ok(())
        }
    };
}

pub(crate) use validate_ack_inbound_internal;

pub(crate) fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty()
        && topic.len() <= MAXIMUM_STRING_PROPERTY_LENGTH
        && !topic.contains(['#', '+'])
}

// if the topic filter is not valid, then the other fields are not to be trusted
pub(crate) struct TopicFilterProperties {
    pub is_valid: bool,
    pub is_shared: bool,
    pub has_wildcard: bool
}

fn is_shared_topic_filter(segments: &[&str]) -> bool {
    if segments.len() < 3 || segments[0] != "$share" {
        return false;
    }

    // the share name must be a non-empty literal
    let share_name = segments[1];
    if share_name.is_empty() || share_name.contains(['#', '+']) {
        return false;
    }

    // and the filter part after it must be non-empty too
    segments.len() > 3 || !segments[2].is_empty()
}

fn compute_topic_filter_properties(filter: &str) -> TopicFilterProperties {
    let mut properties = TopicFilterProperties {
        is_valid: true,
        is_shared: false,
        has_wildcard: false
    };

    if filter.is_empty() || filter.len() > MAXIMUM_STRING_PROPERTY_LENGTH {
        properties.is_valid = false;
        return properties;
    }

    let segments : Vec<&str> = filter.split('/').collect();
    properties.is_shared = is_shared_topic_filter(&segments);

    let last_index = segments.len() - 1;
    for (index, segment) in segments.iter().enumerate() {
        match *segment {
            "#" => {
                properties.has_wildcard = true;
                if index != last_index {
                    // the multi-level wildcard terminates a filter
                    properties.is_valid = false;
                    break;
                }
            }
            "+" => {
                properties.has_wildcard = true;
            }
            _ => {
                if segment.contains(['#', '+']) {
                    // wildcards must occupy a whole segment
                    properties.is_valid = false;
                    break;
                }
            }
        }
    }

    properties
}

pub(crate) fn is_valid_topic_filter_internal(filter: &str, context: &OutboundValidationContext, no_local: Option<bool>) -> bool {
    let properties = compute_topic_filter_properties(filter);
    if !properties.is_valid {
        return false;
    }

    let settings = context.negotiated_settings.unwrap();
    if properties.is_shared && (!settings.shared_subscriptions_available || no_local == Some(true)) {
        return false;
    }

    if properties.has_wildcard && !settings.wildcard_subscriptions_available {
        return false;
    }

    true
}
