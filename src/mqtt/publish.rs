/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::alias::*;
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
fn compute_publish_packet_length_properties(packet: &PublishPacket, alias_resolution: &OutboundAliasResolution) -> SchistResult<(u32, u32)> {
    let mut publish_property_section_length = compute_user_properties_length(&packet.user_properties);

    add_optional_u8_property_length!(publish_property_section_length, packet.payload_format);
    add_optional_u32_property_length!(publish_property_section_length, packet.message_expiry_interval_seconds);
    add_optional_u16_property_length!(publish_property_section_length, alias_resolution.alias);
    add_optional_string_property_length!(publish_property_section_length, packet.content_type);
    add_optional_string_property_length!(publish_property_section_length, packet.response_topic);
    add_optional_bytes_property_length!(publish_property_section_length, packet.correlation_data);

    /* outbound subscription identifiers only occur on the server side of the connection */
    if let Some(subscription_identifiers) = &packet.subscription_identifiers {
        for val in subscription_identifiers.iter() {
            let encoding_size = compute_variable_length_integer_encode_size(*val as usize)?;
            publish_property_section_length += 1 + encoding_size;
        }
    }

    /*
     * Remaining Length:
     * Variable Header
     *  - Topic Name
     *  - Packet Identifier
     *  - Property Length as VLI x
     *  - All Properties x
     * Payload
     */

    let mut total_remaining_length = compute_variable_length_integer_encode_size(publish_property_section_length)?;

    /* Topic name */
    total_remaining_length += 2;
    if !alias_resolution.skip_topic {
        total_remaining_length += packet.topic.len();
    }

    /* Optional (qos1+) packet id */
    if packet.qos != QualityOfService::AtMostOnce {
        total_remaining_length += 2;
    }

    total_remaining_length += publish_property_section_length;

    if let Some(payload) = &packet.payload {
        total_remaining_length += payload.len();
    }

    Ok((total_remaining_length as u32, publish_property_section_length as u32))
}

/*
 * Fixed Header
 * byte 1:
 *  bits 4-7: MQTT Control Packet Type
 *  bit 3: DUP flag
 *  bit 1-2: QoS level
 *  bit 0: RETAIN
 * byte 2-x: Remaining Length as Variable Byte Integer (1-4 bytes)
 */
fn compute_publish_fixed_header_first_byte(packet: &PublishPacket) -> u8 {
    let mut first_byte: u8 = PACKET_TYPE_PUBLISH << 4;

    if packet.duplicate {
        first_byte |= 1u8 << 3;
    }

    first_byte |= (packet.qos as u8) << 1;

    if packet.retain {
        first_byte |= 1u8;
    }

    first_byte
}

#[rustfmt::skip]
pub(crate) fn write_publish_packet5(packet: &PublishPacket, resolution: &OutboundAliasResolution, dest: &mut Vec<u8>) -> SchistResult<()> {

    let (total_remaining_length, publish_property_length) = compute_publish_packet_length_properties(packet, resolution)?;

    dest.push(compute_publish_fixed_header_first_byte(packet));
    encode_vli(total_remaining_length, dest)?;

    if resolution.skip_topic {
        // empty topic since an existing alias binding was used
        encode_u16(0, dest);
    } else {
        encode_length_prefixed_string(&packet.topic, dest)?;
    }

    if packet.qos != QualityOfService::AtMostOnce {
        encode_u16(packet.packet_id, dest);
    }
    encode_vli(publish_property_length, dest)?;

    encode_optional_enum_property!(dest, PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR, packet.payload_format);
    encode_optional_u32_property!(dest, PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL, packet.message_expiry_interval_seconds);
    encode_optional_u16_property!(dest, PROPERTY_KEY_TOPIC_ALIAS, resolution.alias);
    encode_optional_string_property!(dest, PROPERTY_KEY_RESPONSE_TOPIC, packet.response_topic);
    encode_optional_bytes_property!(dest, PROPERTY_KEY_CORRELATION_DATA, packet.correlation_data);

    if let Some(subscription_identifiers) = &packet.subscription_identifiers {
        for val in subscription_identifiers {
            dest.push(PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER);
            encode_vli(*val, dest)?;
        }
    }

    encode_optional_string_property!(dest, PROPERTY_KEY_CONTENT_TYPE, packet.content_type);
    encode_user_properties!(dest, packet.user_properties);

    if let Some(payload) = &packet.payload {
        dest.extend_from_slice(payload);
    }

    Ok(())
}

#[rustfmt::skip]
pub(crate) fn write_publish_packet311(packet: &PublishPacket, _: &OutboundAliasResolution, dest: &mut Vec<u8>) -> SchistResult<()> {

    let mut total_remaining_length = 2 + packet.topic.len();

    if packet.qos != QualityOfService::AtMostOnce {
        total_remaining_length += 2;
    }

    if let Some(payload) = &packet.payload {
        total_remaining_length += payload.len();
    }

    dest.push(compute_publish_fixed_header_first_byte(packet));
    encode_vli(total_remaining_length as u32, dest)?;

    encode_length_prefixed_string(&packet.topic, dest)?;

    if packet.qos != QualityOfService::AtMostOnce {
        encode_u16(packet.packet_id, dest);
    }

    if let Some(payload) = &packet.payload {
        dest.extend_from_slice(payload);
    }

    Ok(())
}

fn decode_publish_properties(properties: &mut ByteCursor, packet : &mut PublishPacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR => { set_once(&mut packet.payload_format, properties.read_enum(convert_u8_to_payload_format_indicator)?)?; }
            PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL => { set_once(&mut packet.message_expiry_interval_seconds, properties.read_u32()?)?; }
            PROPERTY_KEY_TOPIC_ALIAS => { set_once(&mut packet.topic_alias, properties.read_u16()?)?; }
            PROPERTY_KEY_RESPONSE_TOPIC => { set_once(&mut packet.response_topic, properties.read_string()?)?; }
            PROPERTY_KEY_CORRELATION_DATA => { set_once(&mut packet.correlation_data, properties.read_binary()?)?; }
            PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER => {
                /* unlike the other properties, subscription identifiers may repeat */
                let subscription_id = properties.read_vli()?;
                packet.subscription_identifiers.get_or_insert_with(Vec::new).push(subscription_id as u32);
            }
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
            PROPERTY_KEY_CONTENT_TYPE => { set_once(&mut packet.content_type, properties.read_string()?)?; }
            _ => {
                error!("decode_publish_properties - invalid property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for publish packet"));
            }
        }
    }

    Ok(())
}

/* dup, qos, and retain ride in the low nibble of the fixed header first byte */
fn apply_publish_fixed_header_flags(first_byte: u8, packet: &mut PublishPacket) -> SchistResult<()> {
    packet.duplicate = (first_byte & PUBLISH_PACKET_FIXED_HEADER_DUPLICATE_FLAG) != 0;
    packet.retain = (first_byte & PUBLISH_PACKET_FIXED_HEADER_RETAIN_FLAG) != 0;
    packet.qos = convert_u8_to_quality_of_service((first_byte >> 1) & QOS_MASK)?;

    Ok(())
}

pub(crate) fn decode_publish_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    let mut packet = PublishPacket { ..Default::default() };
    apply_publish_fixed_header_flags(first_byte, &mut packet)?;

    let mut body = ByteCursor::new(packet_body);
    packet.topic = body.read_string()?;

    if packet.qos != QualityOfService::AtMostOnce {
        packet.packet_id = body.read_u16()?;
    }

    /* whatever follows the property section is the payload */
    let mut properties = body.split_off_property_section(false)?;
    decode_publish_properties(&mut properties, &mut packet)?;

    let payload = body.read_remainder();
    if !payload.is_empty() {
        packet.payload = Some(payload.to_vec());
    }

    Ok(Box::new(MqttPacket::Publish(packet)))
}

pub(crate) fn decode_publish_packet311(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    let mut packet = PublishPacket { ..Default::default() };
    apply_publish_fixed_header_flags(first_byte, &mut packet)?;

    let mut body = ByteCursor::new(packet_body);
    packet.topic = body.read_string()?;

    if packet.qos != QualityOfService::AtMostOnce {
        packet.packet_id = body.read_u16()?;
    }

    let payload = body.read_remainder();
    if !payload.is_empty() {
        packet.payload = Some(payload.to_vec());
    }

    Ok(Box::new(MqttPacket::Publish(packet)))
}

pub(crate) fn validate_publish_packet_outbound(packet: &PublishPacket) -> SchistResult<()> {

    if packet.packet_id != 0 {
        error!("validate_publish_packet_outbound - packet id may not be set");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "packet id is set"));
    }

    if packet.duplicate {
        error!("validate_publish_packet_outbound - duplicate flag is set");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "duplicate flag is set"));
    }

    validate_string_length(&packet.topic, PacketType::Publish, "validate_publish_packet_outbound", "topic")?;

    if !is_valid_topic(&packet.topic) {
        error!("validate_publish_packet_outbound - invalid topic");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "invalid topic"));
    }

    if let Some(alias) = packet.topic_alias {
        if alias == 0 {
            error!("validate_publish_packet_outbound - topic alias is zero");
            return Err(SchistError::new_packet_validation(PacketType::Publish, "topic alias is zero"));
        }
    }

    if packet.subscription_identifiers.is_some() {
        error!("validate_publish_packet_outbound - subscription identifiers may only be attached by the receiving endpoint");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "subscription identifiers may not be set"));
    }

    if let Some(response_topic) = &packet.response_topic {
        if !is_valid_topic(response_topic) {
            error!("validate_publish_packet_outbound - invalid response topic");
            return Err(SchistError::new_packet_validation(PacketType::Publish, "invalid response topic"));
        }

        validate_string_length(response_topic, PacketType::Publish, "validate_publish_packet_outbound", "response_topic")?;
    }

    validate_user_properties(&packet.user_properties, PacketType::Publish, "validate_publish_packet_outbound")?;
    validate_optional_binary_length(&packet.correlation_data, PacketType::Publish, "validate_publish_packet_outbound", "correlation_data")?;
    validate_optional_string_length(&packet.content_type, PacketType::Publish, "validate_publish_packet_outbound", "content_type")?;

    Ok(())
}

pub(crate) fn validate_publish_packet_outbound_internal(packet: &PublishPacket, context: &OutboundValidationContext) -> SchistResult<()> {

    let (total_remaining_length, _) = compute_publish_packet_length_properties(packet, &context.outbound_alias_resolution.unwrap_or(OutboundAliasResolution{..Default::default() }))?;
    let total_packet_length = 1 + total_remaining_length + compute_variable_length_integer_encode_size(total_remaining_length as usize)? as u32;
    if total_packet_length > context.negotiated_settings.unwrap().maximum_packet_size_to_peer {
        error!("validate_publish_packet_outbound_internal - packet length exceeds maximum packet size allowed to peer");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "packet length exceeds maximum packet size allowed"));
    }

    if packet.packet_id == 0 && packet.qos != QualityOfService::AtMostOnce {
        error!("validate_publish_packet_outbound_internal - packet id must be non zero");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "packet id is zero"));
    }

    let settings = context.negotiated_settings.unwrap();
    if packet.retain && !settings.retain_available {
        error!("validate_publish_packet_outbound_internal - retained messages not allowed on this connection");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "session forbids retain"));
    }

    match settings.maximum_qos {
        QualityOfService::AtMostOnce => {
            if packet.qos != QualityOfService::AtMostOnce {
                error!("validate_publish_packet_outbound_internal - quality of service exceeds established maximum");
                return Err(SchistError::new_packet_validation(PacketType::Publish, "qos exceeds session maximum"));
            }
        }
        QualityOfService::AtLeastOnce => {
            if packet.qos == QualityOfService::ExactlyOnce {
                error!("validate_publish_packet_outbound_internal - quality of service exceeds established maximum");
                return Err(SchistError::new_packet_validation(PacketType::Publish, "qos exceeds session maximum"));
            }
        }
        _ => {}
    }

    Ok(())
}

pub(crate) fn validate_publish_packet_inbound_internal(packet: &PublishPacket, _: &InboundValidationContext) -> SchistResult<()> {

    /* alias resolution happens after decode and before validation, so by now we should have a real topic */
    if packet.topic.is_empty() {
        error!("validate_publish_packet_inbound_internal - topic could not be resolved");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "topic could not be resolved"));
    }

    if packet.packet_id == 0 && packet.qos != QualityOfService::AtMostOnce {
        error!("validate_publish_packet_inbound_internal - packet id must be non zero");
        return Err(SchistError::new_packet_validation(PacketType::Publish, "packet id is zero"));
    }

    Ok(())
}

impl fmt::Display for PublishPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("PublishPacket");
        s.field("packet_id", &self.packet_id);
        s.field("topic", &self.topic);
        s.field("qos", &self.qos);
        s.field("duplicate", &self.duplicate);
        s.field("retain", &self.retain);
        if let Some(payload) = &self.payload {
            s.field("payload", &Elided(payload.len()));
        }
        if let Some(payload_format) = &self.payload_format {
            s.field("payload_format", payload_format);
        }
        if let Some(message_expiry_interval_seconds) = &self.message_expiry_interval_seconds {
            s.field("message_expiry_interval_seconds", message_expiry_interval_seconds);
        }
        if let Some(topic_alias) = &self.topic_alias {
            s.field("topic_alias", topic_alias);
        }
        if let Some(response_topic) = &self.response_topic {
            s.field("response_topic", response_topic);
        }
        if let Some(correlation_data) = &self.correlation_data {
            s.field("correlation_data", &Elided(correlation_data.len()));
        }
        if let Some(subscription_identifiers) = &self.subscription_identifiers {
            s.field("subscription_identifiers", subscription_identifiers);
        }
        if let Some(content_type) = &self.content_type {
            s.field("content_type", content_type);
        }
        if let Some(user_properties) = &self.user_properties {
            s.field("user_properties", user_properties);
        }
        s.finish()
    }
}

// Some convenience constructors
impl PublishPacket {

    /// Common-case constructor for PublishPackets that don't need special configuration
    pub fn new(topic: &str, qos: QualityOfService, payload: &[u8]) -> Self {
        PublishPacket {
            topic: topic.to_string(),
            qos,
            payload: Some(payload.to_vec()),
            ..Default::default()
        }
    }

    /// Common-case constructor for payload-less PublishPackets that don't need special configuration
    pub fn new_empty(topic: &str, qos: QualityOfService) -> Self {
        PublishPacket {
            topic: topic.to_string(),
            qos,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::testing::*;
    use crate::validate::testing::*;

    fn do_publish_round_trip_encode_decode_default_test(protocol_version: ProtocolVersion) {
        let packet = PublishPacket {
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Publish(packet), protocol_version));
    }

    #[test]
    fn publish_round_trip_encode_decode_default5() {
        do_publish_round_trip_encode_decode_default_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn publish_round_trip_encode_decode_default311() {
        do_publish_round_trip_encode_decode_default_test(ProtocolVersion::Mqtt311);
    }

    fn do_publish_round_trip_encode_decode_basic_test(protocol_version: ProtocolVersion) {
        let packet = PublishPacket {
            topic: "hello/world".to_string(),
            qos: QualityOfService::AtLeastOnce,
            packet_id: 47,
            payload: Some("a payload".as_bytes().to_vec()),
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Publish(packet), protocol_version));
    }

    #[test]
    fn publish_round_trip_encode_decode_basic5() {
        do_publish_round_trip_encode_decode_basic_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn publish_round_trip_encode_decode_basic311() {
        do_publish_round_trip_encode_decode_basic_test(ProtocolVersion::Mqtt311);
    }

    fn create_publish_with_all_fields() -> PublishPacket {
        PublishPacket {
            packet_id: 47,
            topic: "status/device47/telemetry".to_string(),
            qos: QualityOfService::AtLeastOnce,
            duplicate: true,
            retain: true,
            payload: Some("{\"battery\":71}".as_bytes().to_vec()),
            payload_format: Some(PayloadFormatIndicator::Utf8),
            message_expiry_interval_seconds : Some(3600),
            topic_alias: Some(10),
            response_topic: Some("acks/device47".to_string()),
            correlation_data: Some(vec!(1, 2, 3, 4, 5)),
            subscription_identifiers: Some(vec!(10, 20, 256, 32768)),
            content_type: Some("application/json".to_string()),
            user_properties: Some(vec!(
                UserProperty{name: "region".to_string(), value: "us-west-2".to_string()},
                UserProperty{name: "fleet".to_string(), value: "canary".to_string()},
                UserProperty{name: "build".to_string(), value: "20260828".to_string()},
            ))
        }
    }

    fn create_outbound_publish_with_all_fields() -> PublishPacket {
        let mut packet = create_publish_with_all_fields();
        packet.subscription_identifiers = None;

        packet
    }

    #[test]
    fn publish_round_trip_encode_decode_all_fields5() {
        let packet = create_publish_with_all_fields();
        assert!(do_round_trip_encode_decode_test(&MqttPacket::Publish(packet), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn publish_round_trip_encode_decode_all_311_fields311() {
        let packet = PublishPacket {
            packet_id: 47,
            topic: "hello/world".to_string(),
            qos: QualityOfService::ExactlyOnce,
            duplicate: true,
            retain: true,
            payload: Some("a payload".as_bytes().to_vec()),
            ..Default::default()
        };

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Publish(packet), ProtocolVersion::Mqtt311));
    }

    fn do_publish_round_trip_encode_decode_payload_size_test(protocol_version: ProtocolVersion, payload_size: usize) {
        let mut publish = create_publish_with_all_fields();
        if protocol_version == ProtocolVersion::Mqtt311 {
            publish = PublishPacket {
                packet_id: 47,
                topic: "hello/world".to_string(),
                qos: QualityOfService::AtLeastOnce,
                ..Default::default()
            };
        }

        publish.payload = Some(vec![0; payload_size]);

        let packet = &MqttPacket::Publish(publish);

        let decode_fragment_sizes : Vec<usize> = vec!(1, 2, 3, 5, 7);

        for decode_size in decode_fragment_sizes.iter() {
            assert!(do_single_encode_decode_test(packet, protocol_version, *decode_size, 5));
        }
    }

    #[test]
    fn publish_round_trip_encode_decode_all_fields_2byte_payload5() {
        do_publish_round_trip_encode_decode_payload_size_test(ProtocolVersion::Mqtt5, 257);
    }

    #[test]
    fn publish_round_trip_encode_decode_all_fields_2byte_payload311() {
        do_publish_round_trip_encode_decode_payload_size_test(ProtocolVersion::Mqtt311, 257);
    }

    #[test]
    fn publish_round_trip_encode_decode_all_fields_3byte_payload5() {
        do_publish_round_trip_encode_decode_payload_size_test(ProtocolVersion::Mqtt5, 32768);
    }

    #[test]
    fn publish_round_trip_encode_decode_all_fields_3byte_payload311() {
        do_publish_round_trip_encode_decode_payload_size_test(ProtocolVersion::Mqtt311, 32768);
    }

    #[test]
    fn publish_round_trip_encode_decode_all_fields_4byte_payload5() {
        do_publish_round_trip_encode_decode_payload_size_test(ProtocolVersion::Mqtt5, 128 * 128 * 128);
    }

    fn create_minimal_qos1_publish() -> PublishPacket {
        PublishPacket {
            topic: "hello/world".to_string(),
            qos: QualityOfService::AtLeastOnce,
            packet_id: 1,
            ..Default::default()
        }
    }

    fn do_publish_decode_failure_invalid_qos_test(protocol_version: ProtocolVersion) {
        let invalidate_qos = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            clone[0] |= 6; // Qos "3"

            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Publish(create_minimal_qos1_publish()), protocol_version, invalidate_qos);
    }

    #[test]
    fn publish_decode_failure_invalid_qos5() {
        do_publish_decode_failure_invalid_qos_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn publish_decode_failure_invalid_qos311() {
        do_publish_decode_failure_invalid_qos_test(ProtocolVersion::Mqtt311);
    }

    // with an 11-byte topic and a qos1 packet id, the property section length always lands here
    const PUBLISH_PACKET_TEST_PROPERTY_LENGTH_INDEX : usize = 17;

    #[test]
    fn publish_decode_failure_invalid_payload_format_indicator5() {
        let mut packet = create_minimal_qos1_publish();
        packet.payload_format = Some(PayloadFormatIndicator::Utf8);

        let invalidate_payload_format = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();

            clone[PUBLISH_PACKET_TEST_PROPERTY_LENGTH_INDEX + 2] = 2;

            clone
        };

        do_mutated_decode_failure_test(&MqttPacket::Publish(packet), ProtocolVersion::Mqtt5, invalidate_payload_format);
    }

    #[test]
    fn publish_decode_failure_duplicate_properties5() {
        let base = create_minimal_qos1_publish();

        // topic aliases are applied at encode time from the resolver rather than from the
        // packet, so that case injects both copies of the property instead of one
        let cases : Vec<(PublishPacket, Vec<u8>)> = vec!(
            (PublishPacket { payload_format : Some(PayloadFormatIndicator::Utf8), ..base.clone() },
             vec!(PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR, 0)),
            (PublishPacket { message_expiry_interval_seconds : Some(1), ..base.clone() },
             vec!(PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL, 1, 2, 3, 4)),
            (base.clone(),
             vec!(PROPERTY_KEY_TOPIC_ALIAS, 0, 3, PROPERTY_KEY_TOPIC_ALIAS, 0, 4)),
            (PublishPacket { response_topic : Some("a/b".to_string()), ..base.clone() },
             vec!(PROPERTY_KEY_RESPONSE_TOPIC, 0, 2, 65, 66)),
            (PublishPacket { correlation_data : Some("a".as_bytes().to_vec()), ..base.clone() },
             vec!(PROPERTY_KEY_CORRELATION_DATA, 0, 2, 1, 5)),
            (PublishPacket { content_type : Some("JSON".to_string()), ..base.clone() },
             vec!(PROPERTY_KEY_CONTENT_TYPE, 0, 2, 66, 65)),
        );

        for (packet, duplicate_property) in cases {
            let append_duplicate = | bytes: &[u8] | -> Vec<u8> {
                let mut clone = bytes.to_vec();

                clone[1] += duplicate_property.len() as u8;
                clone[PUBLISH_PACKET_TEST_PROPERTY_LENGTH_INDEX] += duplicate_property.len() as u8;
                clone.extend_from_slice(&duplicate_property);

                clone
            };

            do_mutated_decode_failure_test(&MqttPacket::Publish(packet), ProtocolVersion::Mqtt5, append_duplicate);
        }
    }

    fn do_publish_decode_failure_inbound_packet_size_test(protocol_version: ProtocolVersion) {
        let packet = PublishPacket {
            topic: "hello/world".to_string(),
            qos: QualityOfService::AtLeastOnce,
            packet_id: 1,
            payload: Some("temperature reading 23.5".as_bytes().to_vec()),
            ..Default::default()
        };

        do_inbound_size_decode_failure_test(&MqttPacket::Publish(packet), protocol_version);
    }

    #[test]
    fn publish_decode_failure_inbound_packet_size5() {
        do_publish_decode_failure_inbound_packet_size_test(ProtocolVersion::Mqtt5);
    }

    #[test]
    fn publish_decode_failure_inbound_packet_size311() {
        do_publish_decode_failure_inbound_packet_size_test(ProtocolVersion::Mqtt311);
    }

    #[test]
    fn publish_validate_success() {
        let mut packet = create_publish_with_all_fields();
        packet.subscription_identifiers = None;
        packet.packet_id = 0;
        packet.duplicate = false;

        let outbound_packet = MqttPacket::Publish(packet);

        assert!(validate_packet_outbound(&outbound_packet).is_ok());

        let mut packet2 = create_publish_with_all_fields();
        packet2.subscription_identifiers = None;

        let outbound_internal_packet = MqttPacket::Publish(packet2);

        let mut test_validation_context = create_pinned_validation_context();
        test_validation_context.settings.maximum_qos = QualityOfService::ExactlyOnce;

        let outbound_validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);
        assert!(validate_packet_outbound_internal(&outbound_internal_packet, &outbound_validation_context).is_ok());

        let inbound_validation_context = create_inbound_validation_context_from_pinned(&test_validation_context);
        assert!(validate_packet_inbound_internal(&outbound_internal_packet, &inbound_validation_context).is_ok());
    }

    #[test]
    fn publish_validate_failure_outbound_qos_zero_and_duplicate() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.qos = QualityOfService::AtMostOnce;
        packet.duplicate = true;

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_qos_zero_and_packet_id() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.qos = QualityOfService::AtMostOnce;
        packet.packet_id = 1;

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_outbound_failure_topic_length() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.packet_id = 0;
        packet.duplicate = false;
        packet.topic = "A".repeat(65536).to_string();

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_outbound_failure_topic_invalid() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.packet_id = 0;
        packet.duplicate = false;
        packet.topic = "A/+/B".to_string();

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_topic_alias_zero() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.packet_id = 0;
        packet.duplicate = false;
        packet.topic_alias = Some(0);

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_response_topic_invalid() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.packet_id = 0;
        packet.duplicate = false;
        packet.response_topic = Some("A/#/B".to_string());

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_response_topic_length() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.packet_id = 0;
        packet.duplicate = false;
        packet.response_topic = Some("AB".repeat(33000).to_string());

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_subscription_identifiers_exist() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.packet_id = 0;
        packet.duplicate = false;
        packet.subscription_identifiers = Some(vec![2, 3, 4]);

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_user_properties_invalid() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.packet_id = 0;
        packet.duplicate = false;
        packet.user_properties = Some(create_invalid_user_properties());

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_correlation_data_length() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.packet_id = 0;
        packet.duplicate = false;
        packet.correlation_data = Some(vec![0; 80 * 1024]);

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_content_type_length() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.packet_id = 0;
        packet.duplicate = false;
        packet.content_type = Some("CD".repeat(33000).to_string());

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Publish(packet)), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_size() {
        let mut packet = create_publish_with_all_fields();
        packet.topic_alias = None;
        packet.subscription_identifiers = None;

        do_outbound_size_validate_failure_test(&MqttPacket::Publish(packet), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_internal_retain_unavailable() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.retain = true;

        let packet = MqttPacket::Publish(packet);

        let mut test_validation_context = create_pinned_validation_context();
        test_validation_context.settings.retain_available = false;

        let outbound_validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);
        verify_validation_failure!(validate_packet_outbound_internal(&packet, &outbound_validation_context), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_internal_maximum_qos_qos0_exceeded() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.qos = QualityOfService::AtLeastOnce;

        let packet = MqttPacket::Publish(packet);

        let mut test_validation_context = create_pinned_validation_context();
        test_validation_context.settings.maximum_qos = QualityOfService::AtMostOnce;

        let outbound_validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);
        verify_validation_failure!(validate_packet_outbound_internal(&packet, &outbound_validation_context), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_outbound_internal_maximum_qos_qos1_exceeded() {
        let mut packet = create_outbound_publish_with_all_fields();
        packet.qos = QualityOfService::ExactlyOnce;

        let packet = MqttPacket::Publish(packet);

        let mut test_validation_context = create_pinned_validation_context();
        test_validation_context.settings.maximum_qos = QualityOfService::AtLeastOnce;

        let outbound_validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);
        verify_validation_failure!(validate_packet_outbound_internal(&packet, &outbound_validation_context), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_inbound_empty_topic() {
        let mut packet = create_publish_with_all_fields();
        packet.topic = "".to_string();

        let test_validation_context = create_pinned_validation_context();
        let validation_context = create_inbound_validation_context_from_pinned(&test_validation_context);

        verify_validation_failure!(validate_packet_inbound_internal(&MqttPacket::Publish(packet), &validation_context), PacketType::Publish);
    }

    #[test]
    fn publish_validate_failure_qos1plus_packet_id_zero() {
        let mut packet = create_publish_with_all_fields();
        packet.subscription_identifiers = None;
        packet.packet_id = 0;

        let packet = MqttPacket::Publish(packet);

        let test_validation_context = create_pinned_validation_context();

        let outbound_validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);
        verify_validation_failure!(validate_packet_outbound_internal(&packet, &outbound_validation_context), PacketType::Publish);

        let inbound_validation_context = create_inbound_validation_context_from_pinned(&test_validation_context);
        verify_validation_failure!(validate_packet_inbound_internal(&packet, &inbound_validation_context), PacketType::Publish);
    }
}
