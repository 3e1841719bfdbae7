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
fn compute_disconnect_packet_length_properties5(packet: &DisconnectPacket) -> SchistResult<(u32, u32)> {
    let mut disconnect_property_section_length = compute_user_properties_length(&packet.user_properties);

    add_optional_u32_property_length!(disconnect_property_section_length, packet.session_expiry_interval_seconds);
    add_optional_string_property_length!(disconnect_property_section_length, packet.reason_string);
    add_optional_string_property_length!(disconnect_property_section_length, packet.server_reference);

    if disconnect_property_section_length == 0 {
        if packet.reason_code == DisconnectReasonCode::NormalDisconnection {
            return Ok((0, 0));
        } else {
            return Ok((1, 0));
        }
    }

    let mut total_remaining_length : usize = 1 + compute_variable_length_integer_encode_size(disconnect_property_section_length)?;
    total_remaining_length += disconnect_property_section_length;

    Ok((total_remaining_length as u32, disconnect_property_section_length as u32))
}

#[rustfmt::skip]
pub(crate) fn write_disconnect_packet5(packet: &DisconnectPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let (total_remaining_length, disconnect_property_length) = compute_disconnect_packet_length_properties5(packet)?;

    dest.push(DISCONNECT_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    if disconnect_property_length == 0 && packet.reason_code == DisconnectReasonCode::NormalDisconnection {
        return Ok(());
    }

    dest.push(packet.reason_code as u8);

    if disconnect_property_length == 0 {
        return Ok(());
    }

    encode_vli(disconnect_property_length, dest)?;

    encode_optional_u32_property!(dest, PROPERTY_KEY_SESSION_EXPIRY_INTERVAL, packet.session_expiry_interval_seconds);
    encode_optional_string_property!(dest, PROPERTY_KEY_REASON_STRING, packet.reason_string);
    encode_optional_string_property!(dest, PROPERTY_KEY_SERVER_REFERENCE, packet.server_reference);
    encode_user_properties!(dest, packet.user_properties);

    Ok(())
}

pub(crate) fn write_disconnect_packet311(_: &DisconnectPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    // 3.1.1 disconnects are empty; reason codes and properties do not exist
    dest.push(DISCONNECT_FIRST_BYTE);
    dest.push(0);

    Ok(())
}

fn decode_disconnect_properties(properties: &mut ByteCursor, packet : &mut DisconnectPacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_SESSION_EXPIRY_INTERVAL => { set_once(&mut packet.session_expiry_interval_seconds, properties.read_u32()?)?; }
            PROPERTY_KEY_REASON_STRING => { set_once(&mut packet.reason_string, properties.read_string()?)?; }
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
            PROPERTY_KEY_SERVER_REFERENCE => { set_once(&mut packet.server_reference, properties.read_string()?)?; }
            _ => {
                error!("decode_disconnect_properties - invalid property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for disconnect packet"));
            }
        }
    }

    Ok(())
}

pub(crate) fn decode_disconnect_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != DISCONNECT_FIRST_BYTE {
        error!("decode_disconnect_packet5 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for disconnect packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = DisconnectPacket { ..Default::default() };

    /* an empty body is a normal disconnection; reason code and properties are both optional */
    if !body.is_empty() {
        packet.reason_code = body.read_enum(convert_u8_to_disconnect_reason_code)?;
    }

    if !body.is_empty() {
        let mut properties = body.split_off_property_section(true)?;
        decode_disconnect_properties(&mut properties, &mut packet)?;
    }

    Ok(Box::new(MqttPacket::Disconnect(packet)))
}

pub(crate) fn decode_disconnect_packet311(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != DISCONNECT_FIRST_BYTE {
        error!("decode_disconnect_packet311 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for disconnect packet"));
    }

    if !packet_body.is_empty() {
        error!("decode_disconnect_packet311 - invalid remaining length");
        return Err(SchistError::new_decoding_failure("invalid remaining length for disconnect packet"));
    }

    Ok(Box::new(MqttPacket::Disconnect(DisconnectPacket { ..Default::default() })))
}

pub(crate) fn validate_disconnect_packet_outbound(packet: &DisconnectPacket) -> SchistResult<()> {

    validate_optional_string_length(&packet.reason_string, PacketType::Disconnect, "validate_disconnect_packet_outbound", "reason_string")?;
    validate_user_properties(&packet.user_properties, PacketType::Disconnect, "validate_disconnect_packet_outbound")?;
    validate_optional_string_length(&packet.server_reference, PacketType::Disconnect, "validate_disconnect_packet_outbound", "server_reference")?;

    Ok(())
}

pub(crate) fn validate_disconnect_packet_outbound_internal(packet: &DisconnectPacket, context: &OutboundValidationContext) -> SchistResult<()> {

    let (total_remaining_length, _) = compute_disconnect_packet_length_properties5(packet)?;
    let total_packet_length = 1 + total_remaining_length + compute_variable_length_integer_encode_size(total_remaining_length as usize)? as u32;
    if total_packet_length > context.negotiated_settings.unwrap().maximum_packet_size_to_peer {
        error!("validate_disconnect_packet_outbound_internal - packet length exceeds maximum packet size allowed to peer");
        return Err(SchistError::new_packet_validation(PacketType::Disconnect, "packet length exceeds maximum packet size"));
    }

    // a session expiry interval may not be rewritten to a non-zero value if the CONNECT
    // established a zero one
    let mut connect_session_expiry_interval = 0;
    if let Some(connect) = &context.connect_options {
        connect_session_expiry_interval = connect.session_expiry_interval_seconds.unwrap_or(0);
    }
    let disconnect_session_expiry_interval = packet.session_expiry_interval_seconds.unwrap_or(connect_session_expiry_interval);

    if connect_session_expiry_interval == 0 && disconnect_session_expiry_interval > 0 {
        error!("validate_disconnect_packet_outbound_internal - session expiry interval cannot be non-zero when connect session expiry interval was zero");
        return Err(SchistError::new_packet_validation(PacketType::Disconnect, "session_expiry_interval cannot be non-zero in this connection context"));
    }

    Ok(())
}

pub(crate) fn validate_disconnect_packet_inbound_internal(packet: &DisconnectPacket, _: &InboundValidationContext) -> SchistResult<()> {

    // only the connecting side may attach a session expiry interval to a disconnect
    if packet.session_expiry_interval_seconds.is_some() {
        error!("validate_disconnect_packet_inbound_internal - session expiry interval is non zero");
        return Err(SchistError::new_packet_validation(PacketType::Disconnect, "session_expiry_interval is non zero"));
    }

    Ok(())
}

impl fmt::Display for DisconnectPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("DisconnectPacket");
        s.field("reason_code", &self.reason_code);
        if let Some(session_expiry_interval_seconds) = &self.session_expiry_interval_seconds {
            s.field("session_expiry_interval_seconds", session_expiry_interval_seconds);
        }
        if let Some(reason_string) = &self.reason_string {
            s.field("reason_string", reason_string);
        }
        if let Some(server_reference) = &self.server_reference {
            s.field("server_reference", server_reference);
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
    use crate::config::*;
    use crate::decode::testing::*;

    fn do_disconnect_round_trip_encode_decode_default_test(protocol_version: ProtocolVersion) {
        let packet = DisconnectPacket {
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Disconnect(packet), protocol_version));
    }

    #[test]
    fn disconnect_round_trip_encode_decode_default5() {
        do_disconnect_round_trip_encode_decode_default_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn disconnect_round_trip_encode_decode_default311() {
        do_disconnect_round_trip_encode_decode_default_test(ProtocolVersion::Mqtt311);
    }

    #[test]
    fn disconnect_round_trip_encode_decode_abnormal_reason_code5() {
        let packet = DisconnectPacket {
            reason_code : DisconnectReasonCode::ConnectionRateExceeded,
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5));
    }

    fn create_disconnect_packet_all_properties() -> DisconnectPacket {
         DisconnectPacket {
            reason_code : DisconnectReasonCode::ConnectionRateExceeded,
            reason_string : Some("connection rate exceeded".to_string()),
            server_reference : Some("backup.example.com".to_string()),
            session_expiry_interval_seconds : Some(14400),
            user_properties: Some(vec!(
                UserProperty{name: "region".to_string(), value: "us-east-1".to_string()},
                UserProperty{name: "fleet".to_string(), value: "canary".to_string()},
            )),
        }
    }

    #[test]
    fn disconnect_round_trip_encode_decode_all_properties5() {
        let packet = create_disconnect_packet_all_properties();

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn disconnect_round_trip_encode_decode_all_properties311() {
        let packet = create_disconnect_packet_all_properties();
        let expected_packet = DisconnectPacket {
            ..Default::default()
        };

        assert!(do_311_filter_encode_decode_test(&MqttPacket::Disconnect(packet), &MqttPacket::Disconnect(expected_packet)));
    }

    fn do_disconnect_decode_failure_bad_fixed_header_test(protocol_version: ProtocolVersion) {
        let packet = DisconnectPacket {
            ..Default::default()
        };

        do_fixed_header_flag_decode_failure_test(&MqttPacket::Disconnect(packet), protocol_version, 12);
    }

    #[test]
    fn disconnect_decode_failure_bad_fixed_header5() {
        do_disconnect_decode_failure_bad_fixed_header_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn disconnect_decode_failure_bad_fixed_header311() {
        do_disconnect_decode_failure_bad_fixed_header_test(ProtocolVersion::Mqtt311);
    }

    #[test]
    fn disconnect_decode_failure_bad_reason_code5() {
        let packet = DisconnectPacket {
            reason_code : DisconnectReasonCode::DisconnectWithWillMessage,
            ..Default::default()
        };

        let corrupt_reason_code = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            // for this packet, the reason code is in byte 2
            clone[2] = 240;

            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5, corrupt_reason_code);
    }

    #[test]
    fn disconnect_decode_failure_duplicate_properties5() {
        // all-properties disconnect keeps the remaining length at byte 1 and the property
        // section length at byte 3, both single-byte vlis
        let duplicate_properties : Vec<Vec<u8>> = vec!(
            vec!(PROPERTY_KEY_REASON_STRING, 0, 2, 67, 67),
            vec!(PROPERTY_KEY_SERVER_REFERENCE, 0, 4, 68, 69, 82, 80),
            vec!(PROPERTY_KEY_SESSION_EXPIRY_INTERVAL, 1, 2, 3, 4),
        );

        for duplicate_property in duplicate_properties {
            let append_duplicate = | bytes: &[u8] | -> Vec<u8> {
                let mut clone = bytes.to_vec();

                clone[1] += duplicate_property.len() as u8;
                clone[3] += duplicate_property.len() as u8;
                clone.extend_from_slice(&duplicate_property);

                clone
            };

            do_mutated_decode_failure_test(&MqttPacket::Disconnect(create_disconnect_packet_all_properties()), ProtocolVersion::Mqtt5, append_duplicate);
        }
    }

    #[test]
    fn disconnect_decode_failure_inbound_packet_size5() {
        let packet = create_disconnect_packet_all_properties();

        do_inbound_size_decode_failure_test(&MqttPacket::Disconnect(packet), ProtocolVersion::Mqtt5);
    }

    use crate::validate::testing::*;

    #[test]
    fn disconnect_validate_success() {
        let mut packet = create_disconnect_packet_all_properties();
        packet.session_expiry_interval_seconds = None;
        let mqtt_packet = MqttPacket::Disconnect(packet);

        assert!(validate_packet_outbound(&mqtt_packet).is_ok());

        let test_validation_context = create_pinned_validation_context();

        let outbound_validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);
        assert!(validate_packet_outbound_internal(&mqtt_packet, &outbound_validation_context).is_ok());

        let inbound_validation_context = create_inbound_validation_context_from_pinned(&test_validation_context);
        assert!(validate_packet_inbound_internal(&mqtt_packet, &inbound_validation_context).is_ok());
    }

    #[test]
    fn disconnect_validate_failure_reason_string_length() {
        let mut packet = create_disconnect_packet_all_properties();
        packet.reason_string = Some("A".repeat(128 * 1024).to_string());

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Disconnect(packet)), PacketType::Disconnect);
    }

    #[test]
    fn disconnect_validate_failure_user_properties_invalid() {
        let mut packet = create_disconnect_packet_all_properties();
        packet.user_properties = Some(create_invalid_user_properties());

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Disconnect(packet)), PacketType::Disconnect);
    }

    #[test]
    fn disconnect_validate_failure_server_reference_length() {
        let mut packet = create_disconnect_packet_all_properties();
        packet.server_reference = Some("Z".repeat(65 * 1024).to_string());

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Disconnect(packet)), PacketType::Disconnect);
    }

    #[test]
    fn disconnect_validate_failure_inbound_session_expiry_interval_set() {
        let packet = MqttPacket::Disconnect( DisconnectPacket {
            reason_code: DisconnectReasonCode::ConnectionRateExceeded,
            session_expiry_interval_seconds: Some(3600),
            ..Default::default()
        });

        let test_validation_context = create_pinned_validation_context();
        let validation_context = create_inbound_validation_context_from_pinned(&test_validation_context);

        verify_validation_failure!(validate_packet_inbound_internal(&packet, &validation_context), PacketType::Disconnect);
    }

    #[test]
    fn disconnect_validate_failure_outbound_session_expiry_interval_set_after_implicit_zero() {
        let packet = create_disconnect_packet_all_properties();

        let mut test_validation_context = create_pinned_validation_context();
        test_validation_context.connect_options = ConnectOptions::builder().build();

        let validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);

        verify_validation_failure!(validate_packet_outbound_internal(&MqttPacket::Disconnect(packet), &validation_context), PacketType::Disconnect);
    }

    #[test]
    fn disconnect_validate_failure_outbound_session_expiry_interval_set_after_explicit_zero() {
        let packet = create_disconnect_packet_all_properties();

        let mut test_validation_context = create_pinned_validation_context();
        test_validation_context.connect_options = ConnectOptions::builder().with_session_expiry_interval_seconds(0).build();

        let validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);

        verify_validation_failure!(validate_packet_outbound_internal(&MqttPacket::Disconnect(packet), &validation_context), PacketType::Disconnect);
    }

    #[test]
    fn disconnect_validate_failure_outbound_size5() {
        let packet = DisconnectPacket {
            reason_code: DisconnectReasonCode::MalformedPacket,
            reason_string: Some("first byte was not a valid packet type".to_string()),
            ..Default::default()
        };

        do_outbound_size_validate_failure_test(&MqttPacket::Disconnect(packet), PacketType::Disconnect);
    }
}
