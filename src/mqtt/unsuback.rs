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

#[rustfmt::skip]
fn compute_unsuback_packet_length_properties5(packet: &UnsubackPacket) -> SchistResult<(u32, u32)> {
    let mut unsuback_property_section_length = compute_user_properties_length(&packet.user_properties);
    add_optional_string_property_length!(unsuback_property_section_length, packet.reason_string);

    let mut total_remaining_length : usize = 2 + compute_variable_length_integer_encode_size(unsuback_property_section_length)?;
    total_remaining_length += unsuback_property_section_length;

    total_remaining_length += packet.reason_codes.len();

    Ok((total_remaining_length as u32, unsuback_property_section_length as u32))
}

#[rustfmt::skip]
pub(crate) fn write_unsuback_packet5(packet: &UnsubackPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let (total_remaining_length, unsuback_property_length) = compute_unsuback_packet_length_properties5(packet)?;

    dest.push(UNSUBACK_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    encode_u16(packet.packet_id, dest);
    encode_vli(unsuback_property_length, dest)?;

    encode_optional_string_property!(dest, PROPERTY_KEY_REASON_STRING, packet.reason_string);
    encode_user_properties!(dest, packet.user_properties);

    for reason_code in &packet.reason_codes {
        dest.push(*reason_code as u8);
    }

    Ok(())
}

pub(crate) fn write_unsuback_packet311(packet: &UnsubackPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    // 3.1.1 unsubacks carry no result codes, just the acked packet id
    dest.push(UNSUBACK_FIRST_BYTE);
    dest.push(2);

    encode_u16(packet.packet_id, dest);

    Ok(())
}

fn decode_unsuback_properties(properties: &mut ByteCursor, packet : &mut UnsubackPacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_REASON_STRING => { set_once(&mut packet.reason_string, properties.read_string()?)?; }
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
            _ => {
                error!("decode_unsuback_properties - invalid property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for unsuback packet"));
            }
        }
    }

    Ok(())
}

pub(crate) fn decode_unsuback_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != UNSUBACK_FIRST_BYTE {
        error!("decode_unsuback_packet5 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for unsuback packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = UnsubackPacket { ..Default::default() };

    packet.packet_id = body.read_u16()?;

    let mut properties = body.split_off_property_section(false)?;
    decode_unsuback_properties(&mut properties, &mut packet)?;

    packet.reason_codes.reserve(body.remaining());
    while !body.is_empty() {
        packet.reason_codes.push(body.read_enum(convert_u8_to_unsuback_reason_code)?);
    }

    Ok(Box::new(MqttPacket::Unsuback(packet)))
}

pub(crate) fn decode_unsuback_packet311(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != UNSUBACK_FIRST_BYTE {
        error!("decode_unsuback_packet311 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for unsuback packet"));
    }

    if packet_body.len() != 2 {
        error!("decode_unsuback_packet311 - invalid remaining length");
        return Err(SchistError::new_decoding_failure("invalid remaining length for unsuback packet"));
    }

    let packet = UnsubackPacket {
        packet_id : ByteCursor::new(packet_body).read_u16()?,
        ..Default::default()
    };

    Ok(Box::new(MqttPacket::Unsuback(packet)))
}

validate_ack_inbound_internal!(validate_unsuback_packet_inbound_internal, UnsubackPacket, PacketType::Unsuback, "validate_unsuback_packet_inbound_internal");

impl fmt::Display for UnsubackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("UnsubackPacket");
        s.field("packet_id", &self.packet_id);
        s.field("reason_codes", &self.reason_codes);
        if let Some(reason_string) = &self.reason_string {
            s.field("reason_string", reason_string);
        }
        if let Some(user_properties) = &self.user_properties {
            s.field("user_properties", user_properties);
        }
        s.finish()
    }
}
