/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::utils::*;
use crate::encode::utils::*;
use crate::error::{SchistError, SchistResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;
use crate::validate::*;

use log::*;
use std::fmt;

#[rustfmt::skip]
fn compute_auth_packet_length_properties5(packet: &AuthPacket) -> SchistResult<(u32, u32)> {
    let mut auth_property_section_length = compute_user_properties_length(&packet.user_properties);

    add_optional_string_property_length!(auth_property_section_length, packet.authentication_method);
    add_optional_bytes_property_length!(auth_property_section_length, packet.authentication_data);
    add_optional_string_property_length!(auth_property_section_length, packet.reason_string);

    // 2-byte auth packets are allowed when there are no properties and the reason code is success
    if auth_property_section_length == 0 && packet.reason_code == AuthenticateReasonCode::Success {
        return Ok((0, 0));
    }

    let mut total_remaining_length : usize = 1 + compute_variable_length_integer_encode_size(auth_property_section_length)?;
    total_remaining_length += auth_property_section_length;

    Ok((total_remaining_length as u32, auth_property_section_length as u32))
}

#[rustfmt::skip]
pub(crate) fn write_auth_packet5(packet: &AuthPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let (total_remaining_length, auth_property_length) = compute_auth_packet_length_properties5(packet)?;

    dest.push(AUTH_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    if total_remaining_length == 0 {
        return Ok(());
    }

    dest.push(packet.reason_code as u8);
    encode_vli(auth_property_length, dest)?;

    encode_optional_string_property!(dest, PROPERTY_KEY_AUTHENTICATION_METHOD, packet.authentication_method);
    encode_optional_bytes_property!(dest, PROPERTY_KEY_AUTHENTICATION_DATA, packet.authentication_data);
    encode_optional_string_property!(dest, PROPERTY_KEY_REASON_STRING, packet.reason_string);
    encode_user_properties!(dest, packet.user_properties);

    Ok(())
}

fn decode_auth_properties(properties: &mut ByteCursor, packet : &mut AuthPacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_AUTHENTICATION_METHOD => { set_once(&mut packet.authentication_method, properties.read_string()?)?; }
            PROPERTY_KEY_AUTHENTICATION_DATA => { set_once(&mut packet.authentication_data, properties.read_binary()?)?; }
            PROPERTY_KEY_REASON_STRING => { set_once(&mut packet.reason_string, properties.read_string()?)?; }
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
            _ => {
                error!("decode_auth_properties - invalid property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for auth packet"));
            }
        }
    }

    Ok(())
}

pub(crate) fn decode_auth_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != AUTH_FIRST_BYTE {
        error!("decode_auth_packet5 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for auth packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = AuthPacket { ..Default::default() };

    /* 2-byte auth packets imply success with no properties */
    if !body.is_empty() {
        packet.reason_code = body.read_enum(convert_u8_to_authenticate_reason_code)?;

        let mut properties = body.split_off_property_section(true)?;
        decode_auth_properties(&mut properties, &mut packet)?;
    }

    Ok(Box::new(MqttPacket::Auth(packet)))
}

pub(crate) fn validate_auth_packet_outbound(packet: &AuthPacket) -> SchistResult<()> {

    if packet.authentication_method.is_none() {
        // optional from an encode/decode perspective, required from a protocol perspective
        error!("validate_auth_packet_outbound - authentication method must be set");
        return Err(SchistError::new_packet_validation(PacketType::Auth, "missing authentication_method field"));
    }

    validate_optional_string_length(&packet.authentication_method, PacketType::Auth, "validate_auth_packet_outbound", "authentication_method")?;
    validate_optional_binary_length(&packet.authentication_data, PacketType::Auth, "validate_auth_packet_outbound", "authentication_data")?;
    validate_optional_string_length(&packet.reason_string, PacketType::Auth, "validate_auth_packet_outbound", "reason_string")?;
    validate_user_properties(&packet.user_properties, PacketType::Auth, "validate_auth_packet_outbound")?;

    Ok(())
}

pub(crate) fn validate_auth_packet_outbound_internal(packet: &AuthPacket, context: &OutboundValidationContext) -> SchistResult<()> {

    let (total_remaining_length, _) = compute_auth_packet_length_properties5(packet)?;
    let total_packet_length = 1 + total_remaining_length + compute_variable_length_integer_encode_size(total_remaining_length as usize)? as u32;
    if total_packet_length > context.negotiated_settings.unwrap().maximum_packet_size_to_peer {
        error!("validate_auth_packet_outbound_internal - packet length exceeds maximum packet size allowed to peer");
        return Err(SchistError::new_packet_validation(PacketType::Auth, "packet length exceeds maximum allowed packet size"));
    }

    Ok(())
}

pub(crate) fn validate_auth_packet_inbound_internal(packet: &AuthPacket, _: &InboundValidationContext) -> SchistResult<()> {

    if packet.authentication_method.is_none() {
        // optional from an encode/decode perspective, required from a protocol perspective
        error!("validate_auth_packet_inbound_internal - authentication method must be set");
        return Err(SchistError::new_packet_validation(PacketType::Auth, "missing authentication_method field"));
    }

    Ok(())
}

impl fmt::Display for AuthPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("AuthPacket");
        s.field("reason_code", &self.reason_code);
        if let Some(authentication_method) = &self.authentication_method {
            s.field("authentication_method", authentication_method);
        }
        if let Some(authentication_data) = &self.authentication_data {
            s.field("authentication_data", &Redacted(authentication_data.len()));
        }
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
    use crate::decode::testing::*;
    use super::*;

    #[test]
    fn auth_round_trip_encode_decode_default5() {
        let packet = AuthPacket {
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Auth(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn auth_round_trip_encode_decode_required5() {
        let packet = AuthPacket {
            reason_code : AuthenticateReasonCode::ContinueAuthentication,
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Auth(packet), ProtocolVersion::Mqtt5));
    }

    fn create_all_properties_auth_packet() -> AuthPacket {
        AuthPacket {
            reason_code : AuthenticateReasonCode::ContinueAuthentication,
            authentication_method : Some("SCRAM-SHA-1".to_string()),
            authentication_data : Some("server-first-message".as_bytes().to_vec()),
            reason_string : Some("continue the exchange".to_string()),
            user_properties: Some(vec!(
                UserProperty{name: "region".to_string(), value: "us-west-2".to_string()},
                UserProperty{name: "fleet".to_string(), value: "canary".to_string()},
            )),
        }
    }

    #[test]
    fn auth_round_trip_encode_decode_all_properties5() {
        let packet = create_all_properties_auth_packet();

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Auth(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn auth_encode_failure311() {
        let packet = create_all_properties_auth_packet();

        let context = crate::encode::EncodingContext {
            protocol_version: ProtocolVersion::Mqtt311,
            ..Default::default()
        };

        let mut dest = Vec::new();
        assert!(crate::encode::encode_packet_to_buffer(&MqttPacket::Auth(packet), &context, &mut dest).is_err());
    }

    #[test]
    fn auth_decode_failure_bad_fixed_header5() {
        let packet = AuthPacket {
            reason_code : AuthenticateReasonCode::ContinueAuthentication,
            ..Default::default()
        };

        do_fixed_header_flag_decode_failure_test(&MqttPacket::Auth(packet), ProtocolVersion::Mqtt5, 1);
    }

    #[test]
    fn auth_decode_failure_bad_reason_code5() {
        let packet = AuthPacket {
            reason_code : AuthenticateReasonCode::ContinueAuthentication,
            ..Default::default()
        };

        let corrupt_reason_code = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            // the reason code is at position 2
            clone[2] = 1;

            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Auth(packet), ProtocolVersion::Mqtt5, corrupt_reason_code);
    }

    #[test]
    fn auth_decode_failure_duplicate_properties5() {
        let base = AuthPacket {
            reason_code : AuthenticateReasonCode::ContinueAuthentication,
            ..Default::default()
        };

        let cases : Vec<(AuthPacket, Vec<u8>)> = vec!(
            (AuthPacket { authentication_method : Some("A".to_string()), ..base.clone() },
             vec!(PROPERTY_KEY_AUTHENTICATION_METHOD, 0, 1, 66)),
            (AuthPacket { authentication_data : Some("A".as_bytes().to_vec()), ..base.clone() },
             vec!(PROPERTY_KEY_AUTHENTICATION_DATA, 0, 1, 66)),
            (AuthPacket { reason_string : Some("busy".to_string()), ..base.clone() },
             vec!(PROPERTY_KEY_REASON_STRING, 0, 2, 72, 105)),
        );

        for (packet, duplicate_property) in cases {
            let append_duplicate = | bytes: &[u8] | -> Vec<u8> {
                let mut clone = bytes.to_vec();

                clone[1] += duplicate_property.len() as u8;
                clone[3] += duplicate_property.len() as u8;
                clone.extend_from_slice(&duplicate_property);

                clone
            };

            do_mutated_decode_failure_test(&MqttPacket::Auth(packet), ProtocolVersion::Mqtt5, append_duplicate);
        }
    }

    #[test]
    fn auth_decode_failure_inbound_packet_size5() {
        let packet = AuthPacket {
            reason_code : AuthenticateReasonCode::ContinueAuthentication,
            reason_string : Some("quota exhausted".to_string()),
            ..Default::default()
        };

        do_inbound_size_decode_failure_test(&MqttPacket::Auth(packet), ProtocolVersion::Mqtt5);
    }

    use crate::validate::testing::*;

    #[test]
    fn auth_validate_success_all_properties() {
        let packet = MqttPacket::Auth(create_all_properties_auth_packet());

        assert!(validate_packet_outbound(&packet).is_ok());

        let test_validation_context = create_pinned_validation_context();

        let outbound_validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);
        assert!(validate_packet_outbound_internal(&packet, &outbound_validation_context).is_ok());

        let inbound_validation_context = create_inbound_validation_context_from_pinned(&test_validation_context);
        assert!(validate_packet_inbound_internal(&packet, &inbound_validation_context).is_ok());
    }

    #[test]
    fn auth_validate_outbound_failure_authentication_method_length() {
        let mut packet = create_all_properties_auth_packet();
        packet.authentication_method = Some("a".repeat(65537));

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Auth(packet)), PacketType::Auth);
    }

    #[test]
    fn auth_validate_outbound_failure_authentication_method_missing() {
        let mut packet = create_all_properties_auth_packet();
        packet.authentication_method = None;

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Auth(packet)), PacketType::Auth);
    }

    #[test]
    fn auth_validate_inbound_failure_authentication_method_missing() {
        let mut packet = create_all_properties_auth_packet();
        packet.authentication_method = None;

        let test_validation_context = create_pinned_validation_context();
        let inbound_validation_context = create_inbound_validation_context_from_pinned(&test_validation_context);
        verify_validation_failure!(validate_packet_inbound_internal(&MqttPacket::Auth(packet), &inbound_validation_context), PacketType::Auth);
    }

    #[test]
    fn auth_validate_outbound_failure_authentication_data_length() {
        let mut packet = create_all_properties_auth_packet();
        packet.authentication_data = Some(vec![0; 128 * 1024]);

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Auth(packet)), PacketType::Auth);
    }

    #[test]
    fn auth_validate_outbound_failure_reason_string_length() {
        let mut packet = create_all_properties_auth_packet();
        packet.reason_string = Some("a".repeat(199000));

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Auth(packet)), PacketType::Auth);
    }

    #[test]
    fn auth_validate_outbound_failure_invalid_user_properties() {
        let mut packet = create_all_properties_auth_packet();
        packet.user_properties = Some(create_invalid_user_properties());

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Auth(packet)), PacketType::Auth);
    }

    #[test]
    fn auth_validate_failure_outbound_size5() {
        let packet = create_all_properties_auth_packet();

        do_outbound_size_validate_failure_test(&MqttPacket::Auth(packet), PacketType::Auth);
    }
}
