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
fn compute_suback_packet_length_properties5(packet: &SubackPacket) -> SchistResult<(u32, u32)> {
    let mut suback_property_section_length = compute_user_properties_length(&packet.user_properties);
    add_optional_string_property_length!(suback_property_section_length, packet.reason_string);

    let mut total_remaining_length : usize = 2 + compute_variable_length_integer_encode_size(suback_property_section_length)?;
    total_remaining_length += suback_property_section_length;

    total_remaining_length += packet.reason_codes.len();

    Ok((total_remaining_length as u32, suback_property_section_length as u32))
}

#[rustfmt::skip]
pub(crate) fn write_suback_packet5(packet: &SubackPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let (total_remaining_length, suback_property_length) = compute_suback_packet_length_properties5(packet)?;

    dest.push(SUBACK_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    encode_u16(packet.packet_id, dest);
    encode_vli(suback_property_length, dest)?;

    encode_optional_string_property!(dest, PROPERTY_KEY_REASON_STRING, packet.reason_string);
    encode_user_properties!(dest, packet.user_properties);

    for reason_code in &packet.reason_codes {
        dest.push(*reason_code as u8);
    }

    Ok(())
}

pub(crate) fn write_suback_packet311(packet: &SubackPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let total_remaining_length = (2 + packet.reason_codes.len()) as u32;

    dest.push(SUBACK_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    encode_u16(packet.packet_id, dest);

    for reason_code in &packet.reason_codes {
        dest.push(suback_reason_code_to_311_return_code(*reason_code));
    }

    Ok(())
}

fn decode_suback_properties(properties: &mut ByteCursor, packet : &mut SubackPacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_REASON_STRING => { set_once(&mut packet.reason_string, properties.read_string()?)?; }
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
            _ => {
                error!("decode_suback_properties - invalid property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for suback packet"));
            }
        }
    }

    Ok(())
}

pub(crate) fn decode_suback_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != SUBACK_FIRST_BYTE {
        error!("decode_suback_packet5 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for suback packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = SubackPacket { ..Default::default() };

    packet.packet_id = body.read_u16()?;

    let mut properties = body.split_off_property_section(false)?;
    decode_suback_properties(&mut properties, &mut packet)?;

    packet.reason_codes.reserve(body.remaining());
    while !body.is_empty() {
        packet.reason_codes.push(body.read_enum(convert_u8_to_suback_reason_code)?);
    }

    Ok(Box::new(MqttPacket::Suback(packet)))
}

pub(crate) fn decode_suback_packet311(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != SUBACK_FIRST_BYTE {
        error!("decode_suback_packet311 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for suback packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = SubackPacket { ..Default::default() };

    packet.packet_id = body.read_u16()?;

    packet.reason_codes.reserve(body.remaining());
    while !body.is_empty() {
        packet.reason_codes.push(body.read_enum(convert_311_suback_return_code)?);
    }

    Ok(Box::new(MqttPacket::Suback(packet)))
}

validate_ack_inbound_internal!(validate_suback_packet_inbound_internal, SubackPacket, PacketType::Suback, "validate_suback_packet_inbound_internal");

impl fmt::Display for SubackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("SubackPacket");
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

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::testing::*;

    fn do_suback_round_trip_encode_decode_default_test(protocol_version: ProtocolVersion) {
        let packet = SubackPacket {
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Suback(packet), protocol_version));
    }

    #[test]
    fn suback_round_trip_encode_decode_default5() {
        do_suback_round_trip_encode_decode_default_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn suback_round_trip_encode_decode_default311() {
        do_suback_round_trip_encode_decode_default_test(ProtocolVersion::Mqtt311);
    }

    #[test]
    fn suback_round_trip_encode_decode_required5() {
        let packet = SubackPacket {
            packet_id : 1023,
            reason_codes : vec![
                SubackReasonCode::GrantedQos1,
                SubackReasonCode::QuotaExceeded,
                SubackReasonCode::SubscriptionIdentifiersNotSupported,
            ],
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Suback(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn suback_round_trip_encode_decode_required311() {
        let packet = SubackPacket {
            packet_id : 1023,
            reason_codes : vec![
                SubackReasonCode::GrantedQos0,
                SubackReasonCode::GrantedQos2,
                SubackReasonCode::UnspecifiedError,
            ],
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Suback(packet), ProtocolVersion::Mqtt311));
    }

    fn create_suback_all_properties() -> SubackPacket {
        SubackPacket {
            packet_id : 1023,
            reason_codes : vec![
                SubackReasonCode::GrantedQos2,
                SubackReasonCode::UnspecifiedError,
                SubackReasonCode::SharedSubscriptionsNotSupported
            ],
            reason_string : Some("some grants reduced".to_string()),
            user_properties: Some(vec!(
                UserProperty{name: "region".to_string(), value: "us-east-1".to_string()},
                UserProperty{name: "fleet".to_string(), value: "canary".to_string()},
            ))
        }
    }

    #[test]
    fn suback_round_trip_encode_decode_all5() {
        let packet = create_suback_all_properties();
        assert!(do_round_trip_encode_decode_test(&MqttPacket::Suback(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn suback_round_trip_encode_decode_all311() {
        let packet = create_suback_all_properties();
        let expected_packet = SubackPacket {
            packet_id : packet.packet_id,
            reason_codes : vec![
                SubackReasonCode::GrantedQos2,
                SubackReasonCode::UnspecifiedError,
                SubackReasonCode::UnspecifiedError
            ],
            ..Default::default()
        };

        assert!(do_311_filter_encode_decode_test(&MqttPacket::Suback(packet), &MqttPacket::Suback(expected_packet)));
    }

    fn do_suback_decode_failure_bad_fixed_header_test(protocol_version: ProtocolVersion) {
        let packet = SubackPacket {
            packet_id : 1023,
            reason_codes : vec![
                SubackReasonCode::GrantedQos1,
                SubackReasonCode::QuotaExceeded,
                SubackReasonCode::SubscriptionIdentifiersNotSupported,
            ],
            ..Default::default()
        };

        do_fixed_header_flag_decode_failure_test(&MqttPacket::Suback(packet), protocol_version, 15);
    }

    #[test]
    fn suback_decode_failure_bad_fixed_header5() {
        do_suback_decode_failure_bad_fixed_header_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn suback_decode_failure_bad_fixed_header311() {
        let packet = SubackPacket {
            packet_id : 1023,
            reason_codes : vec![
                SubackReasonCode::GrantedQos0,
            ],
            ..Default::default()
        };

        do_fixed_header_flag_decode_failure_test(&MqttPacket::Suback(packet), ProtocolVersion::Mqtt311, 15);
    }

    #[test]
    fn suback_decode_failure_reason_code_invalid5() {
        let packet = SubackPacket {
            packet_id : 1023,
            reason_codes : vec![
                SubackReasonCode::GrantedQos1
            ],
            ..Default::default()
        };

        let corrupt_reason_code = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            // single-code suback with no properties puts the payload at byte 5
            clone[5] = 196;

            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Suback(packet), ProtocolVersion::Mqtt5, corrupt_reason_code);
    }

    #[test]
    fn suback_decode_failure_return_code_invalid311() {
        let packet = SubackPacket {
            packet_id : 1023,
            reason_codes : vec![
                SubackReasonCode::GrantedQos1
            ],
            ..Default::default()
        };

        let corrupt_return_code = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            // 311 subacks have no property section; payload starts at byte 4
            clone[4] = 3;

            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Suback(packet), ProtocolVersion::Mqtt311, corrupt_return_code);
    }

    const SUBACK_PACKET_TEST_PROPERTY_LENGTH_INDEX : usize = 4;
    const SUBACK_PACKET_TEST_PAYLOAD_INDEX : usize = 12;

    #[test]
    fn suback_decode_failure_duplicate_reason_string5() {

        let packet = SubackPacket {
            packet_id : 1023,
            reason_string: Some("busy".to_string()),
            reason_codes : vec![
                SubackReasonCode::GrantedQos1
            ],
            ..Default::default()
        };

        let duplicate_reason_string = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            clone[1] += 4;
            clone[SUBACK_PACKET_TEST_PROPERTY_LENGTH_INDEX] += 4;

            clone.insert(SUBACK_PACKET_TEST_PAYLOAD_INDEX, 65);
            clone.insert(SUBACK_PACKET_TEST_PAYLOAD_INDEX, 1);
            clone.insert(SUBACK_PACKET_TEST_PAYLOAD_INDEX, 0);
            clone.insert(SUBACK_PACKET_TEST_PAYLOAD_INDEX, PROPERTY_KEY_REASON_STRING);

            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Suback(packet), ProtocolVersion::Mqtt5, duplicate_reason_string);
    }

    #[test]
    fn suback_decode_failure_inbound_packet_size5() {
        let packet = create_suback_all_properties();

        do_inbound_size_decode_failure_test(&MqttPacket::Suback(packet), ProtocolVersion::Mqtt5);
    }

    #[test]
    fn suback_decode_failure_inbound_packet_size311() {
        let packet = SubackPacket {
            packet_id : 1023,
            reason_codes : vec![
                SubackReasonCode::GrantedQos0,
                SubackReasonCode::GrantedQos1,
            ],
            ..Default::default()
        };

        do_inbound_size_decode_failure_test(&MqttPacket::Suback(packet), ProtocolVersion::Mqtt311);
    }

    use crate::validate::testing::*;

    test_ack_validate_failure_inbound_packet_id_zero!(suback_validate_failure_internal_packet_id_zero, Suback, create_suback_all_properties, PacketType::Suback);
}
