/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::{SchistError, SchistResult};
use crate::mqtt::*;
use crate::mqtt::utils::*;
use crate::validate::*;

use log::*;
use std::fmt;

fn compute_topic_filters_length(packet: &UnsubscribePacket) -> usize {
    packet.topic_filters.iter().map(|filter| filter.len() + 2).sum()
}

#[rustfmt::skip]
fn compute_unsubscribe_packet_length_properties5(packet: &UnsubscribePacket) -> SchistResult<(u32, u32)> {
    let property_section_length = compute_user_properties_length(&packet.user_properties);

    let total_remaining_length =
        2
        + compute_variable_length_integer_encode_size(property_section_length)?
        + property_section_length
        + compute_topic_filters_length(packet);

    Ok((total_remaining_length as u32, property_section_length as u32))
}

#[rustfmt::skip]
pub(crate) fn write_unsubscribe_packet5(packet: &UnsubscribePacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let (total_remaining_length, unsubscribe_property_length) = compute_unsubscribe_packet_length_properties5(packet)?;

    dest.push(UNSUBSCRIBE_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    encode_u16(packet.packet_id, dest);
    encode_vli(unsubscribe_property_length, dest)?;
    encode_user_properties!(dest, packet.user_properties);

    for topic_filter in &packet.topic_filters {
        encode_length_prefixed_string(topic_filter, dest)?;
    }

    Ok(())
}

pub(crate) fn write_unsubscribe_packet311(packet: &UnsubscribePacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let total_remaining_length = (2 + compute_topic_filters_length(packet)) as u32;

    dest.push(UNSUBSCRIBE_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    encode_u16(packet.packet_id, dest);

    for topic_filter in &packet.topic_filters {
        encode_length_prefixed_string(topic_filter, dest)?;
    }

    Ok(())
}

fn decode_unsubscribe_properties(properties: &mut ByteCursor, packet : &mut UnsubscribePacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
            _ => {
                error!("decode_unsubscribe_properties - invalid property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for unsubscribe packet"));
            }
        }
    }

    Ok(())
}

pub(crate) fn decode_unsubscribe_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != UNSUBSCRIBE_FIRST_BYTE {
        error!("decode_unsubscribe_packet5 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for unsubscribe packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = UnsubscribePacket { ..Default::default() };

    packet.packet_id = body.read_u16()?;

    let mut properties = body.split_off_property_section(false)?;
    decode_unsubscribe_properties(&mut properties, &mut packet)?;

    while !body.is_empty() {
        packet.topic_filters.push(body.read_string()?);
    }

    Ok(Box::new(MqttPacket::Unsubscribe(packet)))
}

pub(crate) fn decode_unsubscribe_packet311(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != UNSUBSCRIBE_FIRST_BYTE {
        error!("decode_unsubscribe_packet311 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for unsubscribe packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = UnsubscribePacket { ..Default::default() };

    packet.packet_id = body.read_u16()?;

    while !body.is_empty() {
        packet.topic_filters.push(body.read_string()?);
    }

    Ok(Box::new(MqttPacket::Unsubscribe(packet)))
}

pub(crate) fn validate_unsubscribe_packet_outbound(packet: &UnsubscribePacket) -> SchistResult<()> {
    if packet.packet_id != 0 {
        return Err(packet_validation_error(PacketType::Unsubscribe, "validate_unsubscribe_packet_outbound - packet id may not be set".to_string()));
    }

    if packet.topic_filters.is_empty() {
        return Err(packet_validation_error(PacketType::Unsubscribe, "validate_unsubscribe_packet_outbound - empty topic filters list".to_string()));
    }

    // topic filters are checked in detail in the internal validator

    validate_user_properties(&packet.user_properties, PacketType::Unsubscribe, "validate_unsubscribe_packet_outbound")
}

pub(crate) fn validate_unsubscribe_packet_outbound_internal(packet: &UnsubscribePacket, context: &OutboundValidationContext) -> SchistResult<()> {
    let (total_remaining_length, _) = compute_unsubscribe_packet_length_properties5(packet)?;
    let prefix_length = 1 + compute_variable_length_integer_encode_size(total_remaining_length as usize)? as u32;
    if prefix_length + total_remaining_length > context.negotiated_settings.unwrap().maximum_packet_size_to_peer {
        return Err(packet_validation_error(PacketType::Unsubscribe, "validate_unsubscribe_packet_outbound_internal - packet length exceeds allowed maximum to peer".to_string()));
    }

    if packet.packet_id == 0 {
        return Err(packet_validation_error(PacketType::Unsubscribe, "validate_unsubscribe_packet_outbound_internal - packet id is zero".to_string()));
    }

    for filter in &packet.topic_filters {
        if !is_valid_topic_filter_internal(filter, context, None) {
            return Err(packet_validation_error(PacketType::Unsubscribe, format!("validate_unsubscribe_packet_outbound_internal - invalid topic filter '{}'", filter)));
        }
    }

    Ok(())
}

impl fmt::Display for UnsubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("UnsubscribePacket");
        s.field("packet_id", &self.packet_id);
        s.field("topic_filters", &self.topic_filters);
        if let Some(user_properties) = &self.user_properties {
            s.field("user_properties", user_properties);
        }
        s.finish()
    }
}
