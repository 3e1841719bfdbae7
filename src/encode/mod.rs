/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub(crate) mod utils;

use crate::alias::OutboundAliasResolution;
use crate::error::{SchistError, SchistResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::auth::*;
use crate::mqtt::connack::*;
use crate::mqtt::connect::*;
use crate::mqtt::disconnect::*;
use crate::mqtt::ping::*;
use crate::mqtt::puback::*;
use crate::mqtt::pubcomp::*;
use crate::mqtt::publish::*;
use crate::mqtt::pubrec::*;
use crate::mqtt::pubrel::*;
use crate::mqtt::suback::*;
use crate::mqtt::subscribe::*;
use crate::mqtt::unsuback::*;
use crate::mqtt::unsubscribe::*;

/// Per-packet context the serializer needs beyond the packet itself.
#[derive(Default)]
pub(crate) struct EncodingContext {
    pub(crate) protocol_version: ProtocolVersion,

    pub(crate) outbound_alias_resolution: OutboundAliasResolution,
}

fn encode_packet5(mqtt_packet: &MqttPacket, context: &EncodingContext, dest: &mut Vec<u8>) -> SchistResult<()> {
    match mqtt_packet {
        MqttPacket::Connect(packet) => { write_connect_packet5(packet, dest) }
        MqttPacket::Connack(packet) => { write_connack_packet5(packet, dest) }
        MqttPacket::Publish(packet) => { write_publish_packet5(packet, &context.outbound_alias_resolution, dest) }
        MqttPacket::Puback(packet) => { write_puback_packet5(packet, dest) }
        MqttPacket::Pubrec(packet) => { write_pubrec_packet5(packet, dest) }
        MqttPacket::Pubrel(packet) => { write_pubrel_packet5(packet, dest) }
        MqttPacket::Pubcomp(packet) => { write_pubcomp_packet5(packet, dest) }
        MqttPacket::Subscribe(packet) => { write_subscribe_packet5(packet, dest) }
        MqttPacket::Suback(packet) => { write_suback_packet5(packet, dest) }
        MqttPacket::Unsubscribe(packet) => { write_unsubscribe_packet5(packet, dest) }
        MqttPacket::Unsuback(packet) => { write_unsuback_packet5(packet, dest) }
        MqttPacket::Pingreq(packet) => { write_pingreq_packet(packet, dest) }
        MqttPacket::Pingresp(packet) => { write_pingresp_packet(packet, dest) }
        MqttPacket::Disconnect(packet) => { write_disconnect_packet5(packet, dest) }
        MqttPacket::Auth(packet) => { write_auth_packet5(packet, dest) }
    }
}

fn encode_packet311(mqtt_packet: &MqttPacket, context: &EncodingContext, dest: &mut Vec<u8>) -> SchistResult<()> {
    match mqtt_packet {
        MqttPacket::Connect(packet) => { write_connect_packet311(packet, dest) }
        MqttPacket::Connack(packet) => { write_connack_packet311(packet, dest) }
        MqttPacket::Publish(packet) => { write_publish_packet311(packet, &context.outbound_alias_resolution, dest) }
        MqttPacket::Puback(packet) => { write_puback_packet311(packet, dest) }
        MqttPacket::Pubrec(packet) => { write_pubrec_packet311(packet, dest) }
        MqttPacket::Pubrel(packet) => { write_pubrel_packet311(packet, dest) }
        MqttPacket::Pubcomp(packet) => { write_pubcomp_packet311(packet, dest) }
        MqttPacket::Subscribe(packet) => { write_subscribe_packet311(packet, dest) }
        MqttPacket::Suback(packet) => { write_suback_packet311(packet, dest) }
        MqttPacket::Unsubscribe(packet) => { write_unsubscribe_packet311(packet, dest) }
        MqttPacket::Unsuback(packet) => { write_unsuback_packet311(packet, dest) }
        MqttPacket::Pingreq(packet) => { write_pingreq_packet(packet, dest) }
        MqttPacket::Pingresp(packet) => { write_pingresp_packet(packet, dest) }
        MqttPacket::Disconnect(packet) => { write_disconnect_packet311(packet, dest) }
        MqttPacket::Auth(_) => {
            Err(SchistError::new_encoding_failure("auth packets may not be sent on 311 connections"))
        }
    }
}

/// Serializes a packet into the destination buffer using the wire format of the context's
/// protocol version.
///
/// On failure, the destination buffer may contain a partially written packet and must be
/// discarded by the caller.
pub(crate) fn encode_packet_to_buffer(mqtt_packet: &MqttPacket, context: &EncodingContext, dest: &mut Vec<u8>) -> SchistResult<()> {
    log_packet("Encoding outbound packet: ", mqtt_packet);

    match context.protocol_version {
        ProtocolVersion::Mqtt5 => { encode_packet5(mqtt_packet, context, dest) }
        ProtocolVersion::Mqtt311 => { encode_packet311(mqtt_packet, context, dest) }
    }
}
