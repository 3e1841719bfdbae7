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
fn compute_connack_packet_length_properties5(packet: &ConnackPacket) -> SchistResult<(u32, u32)> {

    let mut connack_property_section_length = compute_user_properties_length(&packet.user_properties);

    add_optional_u32_property_length!(connack_property_section_length, packet.session_expiry_interval);
    add_optional_u16_property_length!(connack_property_section_length, packet.receive_maximum);
    add_optional_u8_property_length!(connack_property_section_length, packet.maximum_qos);
    add_optional_u8_property_length!(connack_property_section_length, packet.retain_available);
    add_optional_u32_property_length!(connack_property_section_length, packet.maximum_packet_size);
    add_optional_string_property_length!(connack_property_section_length, packet.assigned_client_identifier);
    add_optional_u16_property_length!(connack_property_section_length, packet.topic_alias_maximum);
    add_optional_string_property_length!(connack_property_section_length, packet.reason_string);
    add_optional_u8_property_length!(connack_property_section_length, packet.wildcard_subscriptions_available);
    add_optional_u8_property_length!(connack_property_section_length, packet.subscription_identifiers_available);
    add_optional_u8_property_length!(connack_property_section_length, packet.shared_subscriptions_available);
    add_optional_u16_property_length!(connack_property_section_length, packet.server_keep_alive);
    add_optional_string_property_length!(connack_property_section_length, packet.response_information);
    add_optional_string_property_length!(connack_property_section_length, packet.server_reference);
    add_optional_string_property_length!(connack_property_section_length, packet.authentication_method);
    add_optional_bytes_property_length!(connack_property_section_length, packet.authentication_data);

    let mut total_remaining_length : usize = compute_variable_length_integer_encode_size(connack_property_section_length)?;

    /* variable header: 1 byte flags, 1 byte reason code */
    total_remaining_length += 2;
    total_remaining_length += connack_property_section_length;

    Ok((total_remaining_length as u32, connack_property_section_length as u32))
}

#[rustfmt::skip]
pub(crate) fn write_connack_packet5(packet: &ConnackPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let (total_remaining_length, connack_property_length) = compute_connack_packet_length_properties5(packet)?;

    dest.push(CONNACK_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    dest.push(if packet.session_present { 1u8 } else { 0u8 });
    dest.push(packet.reason_code as u8);

    encode_vli(connack_property_length, dest)?;
    encode_optional_u32_property!(dest, PROPERTY_KEY_SESSION_EXPIRY_INTERVAL, packet.session_expiry_interval);
    encode_optional_u16_property!(dest, PROPERTY_KEY_RECEIVE_MAXIMUM, packet.receive_maximum);
    encode_optional_enum_property!(dest, PROPERTY_KEY_MAXIMUM_QOS, packet.maximum_qos);
    encode_optional_boolean_property!(dest, PROPERTY_KEY_RETAIN_AVAILABLE, packet.retain_available);
    encode_optional_u32_property!(dest, PROPERTY_KEY_MAXIMUM_PACKET_SIZE, packet.maximum_packet_size);
    encode_optional_string_property!(dest, PROPERTY_KEY_ASSIGNED_CLIENT_IDENTIFIER, packet.assigned_client_identifier);
    encode_optional_u16_property!(dest, PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM, packet.topic_alias_maximum);
    encode_optional_string_property!(dest, PROPERTY_KEY_REASON_STRING, packet.reason_string);
    encode_user_properties!(dest, packet.user_properties);
    encode_optional_boolean_property!(dest, PROPERTY_KEY_WILDCARD_SUBSCRIPTIONS_AVAILABLE, packet.wildcard_subscriptions_available);
    encode_optional_boolean_property!(dest, PROPERTY_KEY_SUBSCRIPTION_IDENTIFIERS_AVAILABLE, packet.subscription_identifiers_available);
    encode_optional_boolean_property!(dest, PROPERTY_KEY_SHARED_SUBSCRIPTIONS_AVAILABLE, packet.shared_subscriptions_available);
    encode_optional_u16_property!(dest, PROPERTY_KEY_SERVER_KEEP_ALIVE, packet.server_keep_alive);
    encode_optional_string_property!(dest, PROPERTY_KEY_RESPONSE_INFORMATION, packet.response_information);
    encode_optional_string_property!(dest, PROPERTY_KEY_SERVER_REFERENCE, packet.server_reference);
    encode_optional_string_property!(dest, PROPERTY_KEY_AUTHENTICATION_METHOD, packet.authentication_method);
    encode_optional_bytes_property!(dest, PROPERTY_KEY_AUTHENTICATION_DATA, packet.authentication_data);

    Ok(())
}

pub(crate) fn write_connack_packet311(packet: &ConnackPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    dest.push(CONNACK_FIRST_BYTE);
    dest.push(2); // remaining length
    dest.push(if packet.session_present { 1u8 } else { 0u8 });
    dest.push(connect_reason_code_to_311_return_code(packet.reason_code));

    Ok(())
}

fn decode_connack_session_present(flags: u8) -> SchistResult<bool> {
    match flags {
        0 => Ok(false),
        1 => Ok(true),
        _ => {
            error!("ConnackPacket decode - reserved bits set in flags field");
            Err(SchistError::new_decoding_failure("reserved bits set in connack flags field"))
        }
    }
}

#[rustfmt::skip]
fn decode_connack_properties(properties: &mut ByteCursor, packet: &mut ConnackPacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_SESSION_EXPIRY_INTERVAL => { set_once(&mut packet.session_expiry_interval, properties.read_u32()?)?; }
            PROPERTY_KEY_RECEIVE_MAXIMUM => { set_once(&mut packet.receive_maximum, properties.read_u16()?)?; }
            PROPERTY_KEY_MAXIMUM_QOS => { set_once(&mut packet.maximum_qos, properties.read_enum(convert_u8_to_quality_of_service)?)?; }
            PROPERTY_KEY_RETAIN_AVAILABLE => { set_once(&mut packet.retain_available, properties.read_bool()?)?; }
            PROPERTY_KEY_MAXIMUM_PACKET_SIZE => { set_once(&mut packet.maximum_packet_size, properties.read_u32()?)?; }
            PROPERTY_KEY_ASSIGNED_CLIENT_IDENTIFIER => { set_once(&mut packet.assigned_client_identifier, properties.read_string()?)?; }
            PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM => { set_once(&mut packet.topic_alias_maximum, properties.read_u16()?)?; }
            PROPERTY_KEY_REASON_STRING => { set_once(&mut packet.reason_string, properties.read_string()?)?; }
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
            PROPERTY_KEY_WILDCARD_SUBSCRIPTIONS_AVAILABLE => { set_once(&mut packet.wildcard_subscriptions_available, properties.read_bool()?)?; }
            PROPERTY_KEY_SUBSCRIPTION_IDENTIFIERS_AVAILABLE => { set_once(&mut packet.subscription_identifiers_available, properties.read_bool()?)?; }
            PROPERTY_KEY_SHARED_SUBSCRIPTIONS_AVAILABLE => { set_once(&mut packet.shared_subscriptions_available, properties.read_bool()?)?; }
            PROPERTY_KEY_SERVER_KEEP_ALIVE => { set_once(&mut packet.server_keep_alive, properties.read_u16()?)?; }
            PROPERTY_KEY_RESPONSE_INFORMATION => { set_once(&mut packet.response_information, properties.read_string()?)?; }
            PROPERTY_KEY_SERVER_REFERENCE => { set_once(&mut packet.server_reference, properties.read_string()?)?; }
            PROPERTY_KEY_AUTHENTICATION_METHOD => { set_once(&mut packet.authentication_method, properties.read_string()?)?; }
            PROPERTY_KEY_AUTHENTICATION_DATA => { set_once(&mut packet.authentication_data, properties.read_binary()?)?; }
            _ => {
                error!("ConnackPacket decode - invalid property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for connack packet"));
            }
        }
    }

    Ok(())
}

pub(crate) fn decode_connack_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != CONNACK_FIRST_BYTE {
        error!("ConnackPacket decode - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for connack packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = ConnackPacket { ..Default::default() };

    packet.session_present = decode_connack_session_present(body.read_u8()?)?;
    packet.reason_code = body.read_enum(convert_u8_to_connect_reason_code)?;

    let mut properties = body.split_off_property_section(true)?;
    decode_connack_properties(&mut properties, &mut packet)?;

    Ok(Box::new(MqttPacket::Connack(packet)))
}

pub(crate) fn decode_connack_packet311(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != CONNACK_FIRST_BYTE {
        error!("ConnackPacket decode - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for connack packet"));
    }

    if packet_body.len() != 2 {
        error!("ConnackPacket decode - invalid remaining length for 311 connack");
        return Err(SchistError::new_decoding_failure("invalid remaining length for connack packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let packet = ConnackPacket {
        session_present : decode_connack_session_present(body.read_u8()?)?,
        reason_code : body.read_enum(convert_311_connack_return_code)?,
        ..Default::default()
    };

    Ok(Box::new(MqttPacket::Connack(packet)))
}

pub(crate) fn validate_connack_packet_inbound_internal(packet: &ConnackPacket) -> SchistResult<()> {

    if packet.session_present && packet.reason_code != ConnectReasonCode::Success {
        let message = "validate_connack_packet_inbound_internal - session present on unsuccessful connect";
        error!("{}", message);
        return Err(SchistError::new_packet_validation(PacketType::Connack, message));
    }

    validate_optional_integer_non_zero!(receive_maximum, packet.receive_maximum, PacketType::Connack, "validate_connack_packet_inbound_internal", "receive_maximum");

    if let Some(maximum_qos) = packet.maximum_qos {
        if maximum_qos == QualityOfService::ExactlyOnce {
            let message = "validate_connack_packet_inbound_internal - maximum qos should never be Qos2";
            error!("{}", message);
            return Err(SchistError::new_packet_validation(PacketType::Connack, message));
        }
    }

    validate_optional_integer_non_zero!(maximum_packet_size, packet.maximum_packet_size, PacketType::Connack, "validate_connack_packet_inbound_internal", "maximum_packet_size");

    Ok(())
}

impl fmt::Display for ConnackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("ConnackPacket");
        s.field("session_present", &self.session_present);
        s.field("reason_code", &self.reason_code);
        if let Some(session_expiry_interval) = &self.session_expiry_interval { s.field("session_expiry_interval", session_expiry_interval); }
        if let Some(receive_maximum) = &self.receive_maximum { s.field("receive_maximum", receive_maximum); }
        if let Some(maximum_qos) = &self.maximum_qos { s.field("maximum_qos", maximum_qos); }
        if let Some(retain_available) = &self.retain_available { s.field("retain_available", retain_available); }
        if let Some(maximum_packet_size) = &self.maximum_packet_size { s.field("maximum_packet_size", maximum_packet_size); }
        if let Some(assigned_client_identifier) = &self.assigned_client_identifier { s.field("assigned_client_identifier", assigned_client_identifier); }
        if let Some(topic_alias_maximum) = &self.topic_alias_maximum { s.field("topic_alias_maximum", topic_alias_maximum); }
        if let Some(reason_string) = &self.reason_string { s.field("reason_string", reason_string); }
        if let Some(user_properties) = &self.user_properties { s.field("user_properties", user_properties); }
        if let Some(wildcard_subscriptions_available) = &self.wildcard_subscriptions_available { s.field("wildcard_subscriptions_available", wildcard_subscriptions_available); }
        if let Some(subscription_identifiers_available) = &self.subscription_identifiers_available { s.field("subscription_identifiers_available", subscription_identifiers_available); }
        if let Some(shared_subscriptions_available) = &self.shared_subscriptions_available { s.field("shared_subscriptions_available", shared_subscriptions_available); }
        if let Some(server_keep_alive) = &self.server_keep_alive { s.field("server_keep_alive", server_keep_alive); }
        if let Some(response_information) = &self.response_information { s.field("response_information", response_information); }
        if let Some(server_reference) = &self.server_reference { s.field("server_reference", server_reference); }
        if let Some(authentication_method) = &self.authentication_method { s.field("authentication_method", authentication_method); }
        if let Some(authentication_data) = &self.authentication_data { s.field("authentication_data", &Redacted(authentication_data.len())); }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::testing::*;

    #[test]
    fn connack_round_trip_encode_decode_default5() {
        let packet = ConnackPacket {
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Connack(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn connack_round_trip_encode_decode_default311() {
        let packet = ConnackPacket {
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Connack(packet), ProtocolVersion::Mqtt311));
    }

    #[test]
    fn connack_round_trip_encode_decode_required5() {
        let packet = ConnackPacket {
            session_present : true,
            reason_code : ConnectReasonCode::Banned,
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Connack(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn connack_round_trip_encode_decode_required311() {
        let packet = ConnackPacket {
            session_present : true,
            reason_code : ConnectReasonCode::UnsupportedProtocolVersion,
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Connack(packet), ProtocolVersion::Mqtt311));
    }

    fn create_all_properties_connack_packet() -> ConnackPacket {
        ConnackPacket {
            session_present : true,
            reason_code : ConnectReasonCode::Success,

            session_expiry_interval: Some(7200),
            receive_maximum: Some(200),
            maximum_qos: Some(QualityOfService::AtLeastOnce),
            retain_available: Some(true),
            maximum_packet_size: Some(256 * 1024),
            assigned_client_identifier: Some("generated-id-3172".to_string()),
            topic_alias_maximum: Some(30),
            reason_string: Some("connection accepted with restrictions".to_string()),
            user_properties: Some(vec!(
                UserProperty{name: "region".to_string(), value: "us-east-1".to_string()},
                UserProperty{name: "".to_string(), value: "empty-name-allowed".to_string()},
            )),
            wildcard_subscriptions_available: Some(true),
            subscription_identifiers_available: Some(false),
            shared_subscriptions_available: Some(true),
            server_keep_alive: Some(1600),
            response_information: Some("responses/inbound".to_string()),
            server_reference: Some("backup.example.com".to_string()),
            authentication_method: Some("SCRAM-SHA-1".to_string()),
            authentication_data: Some("initial-challenge".as_bytes().to_vec()),
        }
    }

    #[test]
    fn connack_round_trip_encode_decode_all5() {
        let packet = create_all_properties_connack_packet();

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Connack(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn connack_round_trip_encode_decode_all311() {
        let mut packet = create_all_properties_connack_packet();
        packet.reason_code = ConnectReasonCode::BadUsernameOrPassword;

        let expected_packet = ConnackPacket {
            session_present : packet.session_present,
            reason_code : packet.reason_code,
            ..Default::default()
        };

        assert!(do_311_filter_encode_decode_test(&MqttPacket::Connack(packet), &MqttPacket::Connack(expected_packet)));
    }

    fn create_minimal_connack_packet() -> ConnackPacket {
        ConnackPacket {
            session_present : true,
            reason_code : ConnectReasonCode::Success,
            ..Default::default()
        }
    }

    #[test]
    fn connack_decode_failure_bad_fixed_header5() {
        do_fixed_header_flag_decode_failure_test(&MqttPacket::Connack(create_minimal_connack_packet()), ProtocolVersion::Mqtt5, 5);
    }

    #[test]
    fn connack_decode_failure_bad_fixed_header311() {
        let packet = ConnackPacket {
            session_present : false,
            reason_code : ConnectReasonCode::ServerUnavailable,
            ..Default::default()
        };

        do_fixed_header_flag_decode_failure_test(&MqttPacket::Connack(packet), ProtocolVersion::Mqtt311, 5);
    }

    fn do_connack_decode_failure_bad_variable_header_flags_test(protocol_version: ProtocolVersion) {
        let corrupt_variable_header_flags = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            // for this packet, the flags are byte 2
            clone[2] |= 8;

            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Connack(create_minimal_connack_packet()), protocol_version, corrupt_variable_header_flags);
    }

    #[test]
    fn connack_decode_failure_bad_variable_header_flags5() {
        do_connack_decode_failure_bad_variable_header_flags_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn connack_decode_failure_bad_variable_header_flags311() {
        do_connack_decode_failure_bad_variable_header_flags_test(ProtocolVersion::Mqtt311);
    }

    fn do_connack_decode_failure_bad_reason_code_test(protocol_version: ProtocolVersion) {
        let corrupt_reason_code = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            // for this packet, the reason code is in byte 3
            clone[3] = 255;

            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Connack(create_minimal_connack_packet()), protocol_version, corrupt_reason_code);
    }

    #[test]
    fn connack_decode_failure_bad_reason_code5() {
        do_connack_decode_failure_bad_reason_code_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn connack_decode_failure_bad_reason_code311() {
        do_connack_decode_failure_bad_reason_code_test(ProtocolVersion::Mqtt311);
    }

    #[test]
    fn connack_decode_failure_duplicate_properties5() {
        // each case holds a packet carrying a single property and the wire bytes for a
        // second copy of that property
        let cases: Vec<(ConnackPacket, Vec<u8>)> = vec!(
            (ConnackPacket { session_expiry_interval : Some(3600), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_SESSION_EXPIRY_INTERVAL, 0, 0, 14, 16]),
            (ConnackPacket { receive_maximum : Some(10), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_RECEIVE_MAXIMUM, 0, 5]),
            (ConnackPacket { maximum_qos : Some(QualityOfService::AtLeastOnce), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_MAXIMUM_QOS, 0]),
            (ConnackPacket { retain_available : Some(true), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_RETAIN_AVAILABLE, 0]),
            (ConnackPacket { maximum_packet_size : Some(128 * 1024), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_MAXIMUM_PACKET_SIZE, 0, 2, 0, 0]),
            (ConnackPacket { assigned_client_identifier : Some("a".to_string()), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_ASSIGNED_CLIENT_IDENTIFIER, 0, 2, 65, 65]),
            (ConnackPacket { topic_alias_maximum : Some(12), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM, 0, 15]),
            (ConnackPacket { reason_string : Some("What".to_string()), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_REASON_STRING, 0, 2, 78, 111]),
            (ConnackPacket { wildcard_subscriptions_available : Some(true), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_WILDCARD_SUBSCRIPTIONS_AVAILABLE, 0]),
            (ConnackPacket { subscription_identifiers_available : Some(true), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_SUBSCRIPTION_IDENTIFIERS_AVAILABLE, 1]),
            (ConnackPacket { shared_subscriptions_available : Some(true), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_SHARED_SUBSCRIPTIONS_AVAILABLE, 1]),
            (ConnackPacket { server_keep_alive : Some(1200), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_SERVER_KEEP_ALIVE, 0, 20]),
            (ConnackPacket { response_information : Some("A/topic".to_string()), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_RESPONSE_INFORMATION, 0, 2, 78, 111]),
            (ConnackPacket { server_reference : Some("fail.example.com".to_string()), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_SERVER_REFERENCE, 0, 2, 104, 105]),
            (ConnackPacket { authentication_method : Some("rock-paper-scissors".to_string()), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_AUTHENTICATION_METHOD, 0, 3, 49, 50, 51]),
            (ConnackPacket { authentication_data : Some("privatekey".as_bytes().to_vec()), ..create_minimal_connack_packet() },
                vec![PROPERTY_KEY_AUTHENTICATION_DATA, 0, 4, 0xde, 0xad, 0xbe, 0xef]),
        );

        for (packet, duplicate_property) in cases {
            let append_duplicate = | bytes: &[u8] | -> Vec<u8> {
                let mut clone = bytes.to_vec();

                // bump the total remaining length and the property section length, then
                // tack the second copy onto the end
                clone[1] += duplicate_property.len() as u8;
                clone[4] += duplicate_property.len() as u8;
                clone.extend_from_slice(&duplicate_property);

                clone
            };

            do_mutated_decode_failure_test(&MqttPacket::Connack(packet), ProtocolVersion::Mqtt5, append_duplicate);
        }
    }

    #[test]
    fn connack_decode_failure_invalid_property_values5() {
        // each packet carries exactly one single-byte property, so the property value
        // lands in byte 6
        let cases: Vec<(ConnackPacket, u8)> = vec!(
            (ConnackPacket { maximum_qos : Some(QualityOfService::AtLeastOnce), ..create_minimal_connack_packet() }, 3),
            (ConnackPacket { retain_available : Some(true), ..create_minimal_connack_packet() }, 2),
            (ConnackPacket { wildcard_subscriptions_available : Some(true), ..create_minimal_connack_packet() }, 255),
            (ConnackPacket { subscription_identifiers_available : Some(true), ..create_minimal_connack_packet() }, 31),
            (ConnackPacket { shared_subscriptions_available : Some(true), ..create_minimal_connack_packet() }, 2),
        );

        for (packet, invalid_value) in cases {
            let corrupt_property_value = | bytes: &[u8] | -> Vec<u8> {
                let mut clone = bytes.to_vec();
                clone[6] = invalid_value;
                clone
            };

            do_mutated_decode_failure_test(&MqttPacket::Connack(packet), ProtocolVersion::Mqtt5, corrupt_property_value);
        }
    }

    #[test]
    fn connack_decode_failure_packet_size5() {
        let packet = ConnackPacket {
            authentication_data : Some("privatekey".as_bytes().to_vec()),
            ..create_minimal_connack_packet()
        };

        do_inbound_size_decode_failure_test(&MqttPacket::Connack(packet), ProtocolVersion::Mqtt5);
    }

    #[test]
    fn connack_decode_failure_packet_size311() {
        do_inbound_size_decode_failure_test(&MqttPacket::Connack(create_minimal_connack_packet()), ProtocolVersion::Mqtt311);
    }

    use crate::validate::testing::*;

    fn do_connack_validate_failure_test(packet: ConnackPacket) {
        let test_validation_context = create_pinned_validation_context();
        let validation_context = create_inbound_validation_context_from_pinned(&test_validation_context);

        verify_validation_failure!(validate_packet_inbound_internal(&MqttPacket::Connack(packet), &validation_context), PacketType::Connack);
    }

    #[test]
    fn connack_validate_success_all_properties() {
        let packet = create_all_properties_connack_packet();

        let test_validation_context = create_pinned_validation_context();
        let validation_context = create_inbound_validation_context_from_pinned(&test_validation_context);

        assert!(validate_packet_inbound_internal(&MqttPacket::Connack(packet), &validation_context).is_ok());
    }

    #[test]
    fn connack_validate_failure_session_present_failed_reason_code() {
        let mut packet = create_all_properties_connack_packet();
        packet.session_present = true;
        packet.reason_code = ConnectReasonCode::BadUsernameOrPassword;

        do_connack_validate_failure_test(packet);
    }

    #[test]
    fn connack_validate_failure_receive_maximum_zero() {
        let mut packet = create_all_properties_connack_packet();
        packet.receive_maximum = Some(0);

        do_connack_validate_failure_test(packet);
    }

    #[test]
    fn connack_validate_failure_maximum_qos_2() {
        let mut packet = create_all_properties_connack_packet();
        packet.maximum_qos = Some(QualityOfService::ExactlyOnce);

        do_connack_validate_failure_test(packet);
    }

    #[test]
    fn connack_validate_failure_maximum_packet_size_zero() {
        let mut packet = create_all_properties_connack_packet();
        packet.maximum_packet_size = Some(0);

        do_connack_validate_failure_test(packet);
    }
}
