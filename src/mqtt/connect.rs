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

static MQTT5_CONNECT_PROTOCOL_BYTES: [u8; 7] = [0, 4, 77, 81, 84, 84, 5];
static MQTT311_CONNECT_PROTOCOL_BYTES: [u8; 7] = [0, 4, 77, 81, 84, 84, 4];

fn compute_connect_flags(packet: &ConnectPacket) -> u8 {
    let mut flags: u8 = 0;
    if packet.clean_start {
        flags |= CONNECT_PACKET_CLEAN_START_FLAG_MASK;
    }

    if let Some(will) = &packet.will {
        flags |= CONNECT_PACKET_HAS_WILL_FLAG_MASK;
        flags |= (will.qos as u8) << CONNECT_PACKET_WILL_QOS_FLAG_SHIFT;
        if will.retain {
            flags |= CONNECT_PACKET_WILL_RETAIN_FLAG_MASK;
        }
    }

    if packet.password.is_some() {
        flags |= CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK;
    }

    if packet.username.is_some() {
        flags |= CONNECT_PACKET_HAS_USERNAME_FLAG_MASK;
    }

    flags
}

#[rustfmt::skip]
fn compute_connect_packet_length_properties5(packet: &ConnectPacket) -> SchistResult<(u32, u32, u32)> {
    let mut connect_property_section_length = compute_user_properties_length(&packet.user_properties);

    add_optional_u32_property_length!(connect_property_section_length, packet.session_expiry_interval_seconds);
    add_optional_u16_property_length!(connect_property_section_length, packet.receive_maximum);
    add_optional_u32_property_length!(connect_property_section_length, packet.maximum_packet_size_bytes);
    add_optional_u16_property_length!(connect_property_section_length, packet.topic_alias_maximum);
    add_optional_u8_property_length!(connect_property_section_length, packet.request_response_information);
    add_optional_u8_property_length!(connect_property_section_length, packet.request_problem_information);
    add_optional_string_property_length!(connect_property_section_length, packet.authentication_method);
    add_optional_bytes_property_length!(connect_property_section_length, packet.authentication_data);

    /* variable header: 6 byte protocol string, 1 byte level, 1 byte flags, 2 byte keep alive */
    let mut variable_header_length = compute_variable_length_integer_encode_size(connect_property_section_length)?;
    variable_header_length += 10 + connect_property_section_length;

    let mut payload_length : usize = 0;
    add_optional_string_length!(payload_length, packet.client_id);

    let mut will_property_length : usize = 0;
    if let Some(will) = &packet.will {
        will_property_length = compute_user_properties_length(&will.user_properties);

        add_optional_u32_property_length!(will_property_length, packet.will_delay_interval_seconds);
        add_optional_u8_property_length!(will_property_length, will.payload_format);
        add_optional_u32_property_length!(will_property_length, will.message_expiry_interval_seconds);
        add_optional_string_property_length!(will_property_length, will.content_type);
        add_optional_string_property_length!(will_property_length, will.response_topic);
        add_optional_bytes_property_length!(will_property_length, will.correlation_data);

        payload_length += compute_variable_length_integer_encode_size(will_property_length)?;
        payload_length += will_property_length;
        payload_length += 2 + will.topic.len();
        add_optional_bytes_length!(payload_length, will.payload);
    }

    if let Some(username) = &packet.username {
        payload_length += 2 + username.len();
    }

    if let Some(password) = &packet.password {
        payload_length += 2 + password.len();
    }

    let total_remaining_length : usize = payload_length + variable_header_length;

    if total_remaining_length > MAXIMUM_VARIABLE_LENGTH_INTEGER {
        error!("compute_connect_packet_length_properties5 - packet length exceeds maximum variable length integer");
        return Err(SchistError::new_encoding_failure("connect packet length exceeds maximum variable length integer"));
    }

    Ok((total_remaining_length as u32, connect_property_section_length as u32, will_property_length as u32))
}

#[rustfmt::skip]
pub(crate) fn write_connect_packet5(packet: &ConnectPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let (total_remaining_length, connect_property_length, will_property_length) = compute_connect_packet_length_properties5(packet)?;

    dest.push(CONNECT_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;
    dest.extend_from_slice(&MQTT5_CONNECT_PROTOCOL_BYTES);
    dest.push(compute_connect_flags(packet));
    encode_u16(packet.keep_alive_interval_seconds, dest);

    encode_vli(connect_property_length, dest)?;
    encode_optional_u32_property!(dest, PROPERTY_KEY_SESSION_EXPIRY_INTERVAL, packet.session_expiry_interval_seconds);
    encode_optional_u16_property!(dest, PROPERTY_KEY_RECEIVE_MAXIMUM, packet.receive_maximum);
    encode_optional_u32_property!(dest, PROPERTY_KEY_MAXIMUM_PACKET_SIZE, packet.maximum_packet_size_bytes);
    encode_optional_u16_property!(dest, PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM, packet.topic_alias_maximum);
    encode_optional_boolean_property!(dest, PROPERTY_KEY_REQUEST_RESPONSE_INFORMATION, packet.request_response_information);
    encode_optional_boolean_property!(dest, PROPERTY_KEY_REQUEST_PROBLEM_INFORMATION, packet.request_problem_information);
    encode_optional_string_property!(dest, PROPERTY_KEY_AUTHENTICATION_METHOD, packet.authentication_method);
    encode_optional_bytes_property!(dest, PROPERTY_KEY_AUTHENTICATION_DATA, packet.authentication_data);
    encode_user_properties!(dest, packet.user_properties);

    if let Some(client_id) = &packet.client_id {
        encode_length_prefixed_string(client_id, dest)?;
    } else {
        encode_u16(0, dest);
    }

    if let Some(will) = &packet.will {
        encode_vli(will_property_length, dest)?;
        encode_optional_u32_property!(dest, PROPERTY_KEY_WILL_DELAY_INTERVAL, packet.will_delay_interval_seconds);
        encode_optional_enum_property!(dest, PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR, will.payload_format);
        encode_optional_u32_property!(dest, PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL, will.message_expiry_interval_seconds);
        encode_optional_string_property!(dest, PROPERTY_KEY_CONTENT_TYPE, will.content_type);
        encode_optional_string_property!(dest, PROPERTY_KEY_RESPONSE_TOPIC, will.response_topic);
        encode_optional_bytes_property!(dest, PROPERTY_KEY_CORRELATION_DATA, will.correlation_data);
        encode_user_properties!(dest, will.user_properties);

        encode_length_prefixed_string(&will.topic, dest)?;
        if let Some(payload) = &will.payload {
            encode_length_prefixed_bytes(payload, dest)?;
        } else {
            encode_u16(0, dest);
        }
    }

    if let Some(username) = &packet.username {
        encode_length_prefixed_string(username, dest)?;
    }

    if let Some(password) = &packet.password {
        encode_length_prefixed_bytes(password, dest)?;
    }

    Ok(())
}

fn compute_connect_packet_length311(packet: &ConnectPacket) -> SchistResult<u32> {

    let variable_header_length = 10;

    let mut payload_length : usize = 0;
    add_optional_string_length!(payload_length, packet.client_id);

    if let Some(will) = &packet.will {
        payload_length += 2 + will.topic.len();
        add_optional_bytes_length!(payload_length, will.payload);
    }

    if let Some(username) = &packet.username {
        payload_length += 2 + username.len();
    }

    if let Some(password) = &packet.password {
        payload_length += 2 + password.len();
    }

    let total_remaining_length : usize = payload_length + variable_header_length;

    if total_remaining_length > MAXIMUM_VARIABLE_LENGTH_INTEGER {
        error!("compute_connect_packet_length311 - packet length exceeds maximum variable length integer");
        return Err(SchistError::new_encoding_failure("connect packet length exceeds maximum variable length integer"));
    }

    Ok(total_remaining_length as u32)
}

pub(crate) fn write_connect_packet311(packet: &ConnectPacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let total_remaining_length = compute_connect_packet_length311(packet)?;

    dest.push(CONNECT_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;
    dest.extend_from_slice(&MQTT311_CONNECT_PROTOCOL_BYTES);
    dest.push(compute_connect_flags(packet));
    encode_u16(packet.keep_alive_interval_seconds, dest);

    if let Some(client_id) = &packet.client_id {
        encode_length_prefixed_string(client_id, dest)?;
    } else {
        encode_u16(0, dest);
    }

    if let Some(will) = &packet.will {
        encode_length_prefixed_string(&will.topic, dest)?;
        if let Some(payload) = &will.payload {
            encode_length_prefixed_bytes(payload, dest)?;
        } else {
            encode_u16(0, dest);
        }
    }

    if let Some(username) = &packet.username {
        encode_length_prefixed_string(username, dest)?;
    }

    if let Some(password) = &packet.password {
        encode_length_prefixed_bytes(password, dest)?;
    }

    Ok(())
}

#[rustfmt::skip]
fn decode_connect_properties(properties: &mut ByteCursor, packet: &mut ConnectPacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_SESSION_EXPIRY_INTERVAL => { set_once(&mut packet.session_expiry_interval_seconds, properties.read_u32()?)?; }
            PROPERTY_KEY_RECEIVE_MAXIMUM => { set_once(&mut packet.receive_maximum, properties.read_u16()?)?; }
            PROPERTY_KEY_MAXIMUM_PACKET_SIZE => { set_once(&mut packet.maximum_packet_size_bytes, properties.read_u32()?)?; }
            PROPERTY_KEY_TOPIC_ALIAS_MAXIMUM => { set_once(&mut packet.topic_alias_maximum, properties.read_u16()?)?; }
            PROPERTY_KEY_REQUEST_RESPONSE_INFORMATION => { set_once(&mut packet.request_response_information, properties.read_bool()?)?; }
            PROPERTY_KEY_REQUEST_PROBLEM_INFORMATION => { set_once(&mut packet.request_problem_information, properties.read_bool()?)?; }
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
            PROPERTY_KEY_AUTHENTICATION_METHOD => { set_once(&mut packet.authentication_method, properties.read_string()?)?; }
            PROPERTY_KEY_AUTHENTICATION_DATA => { set_once(&mut packet.authentication_data, properties.read_binary()?)?; }
            _ => {
                error!("ConnectPacket decode - invalid property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for connect packet"));
            }
        }
    }

    Ok(())
}

#[rustfmt::skip]
fn decode_will_properties(properties: &mut ByteCursor, will: &mut PublishPacket, connect: &mut ConnectPacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_WILL_DELAY_INTERVAL => { set_once(&mut connect.will_delay_interval_seconds, properties.read_u32()?)?; }
            PROPERTY_KEY_PAYLOAD_FORMAT_INDICATOR => { set_once(&mut will.payload_format, properties.read_enum(convert_u8_to_payload_format_indicator)?)?; }
            PROPERTY_KEY_MESSAGE_EXPIRY_INTERVAL => { set_once(&mut will.message_expiry_interval_seconds, properties.read_u32()?)?; }
            PROPERTY_KEY_CONTENT_TYPE => { set_once(&mut will.content_type, properties.read_string()?)?; }
            PROPERTY_KEY_RESPONSE_TOPIC => { set_once(&mut will.response_topic, properties.read_string()?)?; }
            PROPERTY_KEY_CORRELATION_DATA => { set_once(&mut will.correlation_data, properties.read_binary()?)?; }
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut will.user_properties)?; }
            _ => {
                error!("ConnectPacket decode - invalid will property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for connect packet will"));
            }
        }
    }

    Ok(())
}

const CONNECT_HEADER_PROTOCOL_LENGTH : usize = 7;

struct ConnectFlags {
    clean_start: bool,
    has_will: bool,
    will_retain: bool,
    will_qos: QualityOfService,
    has_username: bool,
    has_password: bool,
}

/* flag/field semantics are version independent */
fn decode_connect_flags(connect_flags: u8) -> SchistResult<ConnectFlags> {
    if (connect_flags & 0x01) != 0 {
        error!("ConnectPacket decode - connect flags reserved bit set");
        return Err(SchistError::new_decoding_failure("connect flags reserved bit set"));
    }

    let has_will = (connect_flags & CONNECT_PACKET_HAS_WILL_FLAG_MASK) != 0;
    let will_retain = (connect_flags & CONNECT_PACKET_WILL_RETAIN_FLAG_MASK) != 0;
    let will_qos = convert_u8_to_quality_of_service((connect_flags >> CONNECT_PACKET_WILL_QOS_FLAG_SHIFT) & QOS_MASK)?;

    if !has_will && (will_retain || will_qos != QualityOfService::AtMostOnce) {
        error!("ConnectPacket decode - no will but will flags set");
        return Err(SchistError::new_decoding_failure("will flags set on will-less connect packet"));
    }

    Ok(ConnectFlags {
        clean_start : (connect_flags & CONNECT_PACKET_CLEAN_START_FLAG_MASK) != 0,
        has_will,
        will_retain,
        will_qos,
        has_username : (connect_flags & CONNECT_PACKET_HAS_USERNAME_FLAG_MASK) != 0,
        has_password : (connect_flags & CONNECT_PACKET_HAS_PASSWORD_FLAG_MASK) != 0,
    })
}

fn decode_connect_will(body: &mut ByteCursor, flags: &ConnectFlags, packet: &mut ConnectPacket, protocol_version: ProtocolVersion) -> SchistResult<()> {
    let mut will = PublishPacket {
        qos : flags.will_qos,
        retain : flags.will_retain,
        ..Default::default()
    };

    if protocol_version == ProtocolVersion::Mqtt5 {
        let mut will_properties = body.split_off_property_section(false)?;
        decode_will_properties(&mut will_properties, &mut will, packet)?;
    }

    will.topic = body.read_string()?;
    will.payload = body.read_optional_binary()?;

    packet.will = Some(will);

    Ok(())
}

pub(crate) fn decode_connect_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != CONNECT_FIRST_BYTE {
        error!("ConnectPacket decode - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for connect packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    if body.read_slice(CONNECT_HEADER_PROTOCOL_LENGTH)? != MQTT5_CONNECT_PROTOCOL_BYTES {
        error!("ConnectPacket decode - invalid protocol prefix");
        return Err(SchistError::new_decoding_failure("invalid protocol prefix for connect packet"));
    }

    let mut packet = ConnectPacket { ..Default::default() };

    let flags = decode_connect_flags(body.read_u8()?)?;
    packet.clean_start = flags.clean_start;
    packet.keep_alive_interval_seconds = body.read_u16()?;

    let mut properties = body.split_off_property_section(false)?;
    decode_connect_properties(&mut properties, &mut packet)?;

    packet.client_id = body.read_optional_string()?;

    if flags.has_will {
        decode_connect_will(&mut body, &flags, &mut packet, ProtocolVersion::Mqtt5)?;
    }

    if flags.has_username {
        packet.username = Some(body.read_string()?);
    }

    if flags.has_password {
        packet.password = Some(body.read_binary()?);
    }

    if !body.is_empty() {
        error!("ConnectPacket decode - unexpected bytes after payload");
        return Err(SchistError::new_decoding_failure("body length does not match expected overall packet length for connect packet"));
    }

    Ok(Box::new(MqttPacket::Connect(packet)))
}

pub(crate) fn decode_connect_packet311(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != CONNECT_FIRST_BYTE {
        error!("ConnectPacket decode - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for connect packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    if body.read_slice(CONNECT_HEADER_PROTOCOL_LENGTH)? != MQTT311_CONNECT_PROTOCOL_BYTES {
        error!("ConnectPacket decode - invalid protocol prefix");
        return Err(SchistError::new_decoding_failure("invalid protocol prefix for connect packet"));
    }

    let mut packet = ConnectPacket { ..Default::default() };

    let flags = decode_connect_flags(body.read_u8()?)?;
    packet.clean_start = flags.clean_start;
    packet.keep_alive_interval_seconds = body.read_u16()?;
    packet.client_id = body.read_optional_string()?;

    if flags.has_will {
        decode_connect_will(&mut body, &flags, &mut packet, ProtocolVersion::Mqtt311)?;
    }

    if flags.has_username {
        packet.username = Some(body.read_string()?);
    }

    if flags.has_password {
        packet.password = Some(body.read_binary()?);
    }

    if !body.is_empty() {
        error!("ConnectPacket decode - unexpected bytes after payload");
        return Err(SchistError::new_decoding_failure("body length does not match expected overall packet length for connect packet"));
    }

    Ok(Box::new(MqttPacket::Connect(packet)))
}

pub(crate) fn validate_connect_packet_outbound(packet: &ConnectPacket) -> SchistResult<()> {

    validate_optional_string_length(&packet.client_id, PacketType::Connect, "validate_connect_packet_outbound", "client_id")?;
    validate_optional_integer_non_zero!(receive_maximum, packet.receive_maximum, PacketType::Connect, "validate_connect_packet_outbound", "receive_maximum");
    validate_optional_integer_non_zero!(maximum_packet_size, packet.maximum_packet_size_bytes, PacketType::Connect, "validate_connect_packet_outbound", "maximum_packet_size");

    if packet.authentication_data.is_some() && packet.authentication_method.is_none() {
        error!("validate_connect_packet_outbound - authentication data without authentication method");
        return Err(SchistError::new_packet_validation(PacketType::Connect, "authentication data without authentication method"));
    }

    validate_optional_string_length(&packet.authentication_method, PacketType::Connect, "validate_connect_packet_outbound", "authentication_method")?;
    validate_optional_binary_length(&packet.authentication_data, PacketType::Connect, "validate_connect_packet_outbound", "authentication_data")?;
    validate_optional_string_length(&packet.username, PacketType::Connect, "validate_connect_packet_outbound", "username")?;
    validate_optional_binary_length(&packet.password, PacketType::Connect, "validate_connect_packet_outbound", "password")?;
    validate_user_properties(&packet.user_properties, PacketType::Connect, "validate_connect_packet_outbound")?;

    if let Some(will) = &packet.will {
        validate_optional_string_length(&will.content_type, PacketType::Connect, "(will)validate_connect_packet_outbound", "content_type")?;
        validate_optional_string_length(&will.response_topic, PacketType::Connect, "(will)validate_connect_packet_outbound", "response_topic")?;
        validate_optional_binary_length(&will.correlation_data, PacketType::Connect, "(will)validate_connect_packet_outbound", "correlation_data")?;
        validate_user_properties(&will.user_properties, PacketType::Connect, "(will)validate_connect_packet_outbound")?;
        validate_string_length(will.topic.as_str(), PacketType::Connect, "(will)validate_connect_packet_outbound", "topic")?;
        validate_optional_binary_length(&will.payload, PacketType::Connect, "(will)validate_connect_packet_outbound", "payload")?;
    }

    Ok(())
}

impl fmt::Display for ConnectPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("ConnectPacket");
        s.field("keep_alive_interval_seconds", &self.keep_alive_interval_seconds);
        s.field("clean_start", &self.clean_start);
        if let Some(client_id) = &self.client_id { s.field("client_id", client_id); }
        if let Some(username) = &self.username { s.field("username", &Redacted(username.len())); }
        if let Some(password) = &self.password { s.field("password", &Redacted(password.len())); }
        if let Some(session_expiry_interval_seconds) = &self.session_expiry_interval_seconds { s.field("session_expiry_interval_seconds", session_expiry_interval_seconds); }
        if let Some(request_response_information) = &self.request_response_information { s.field("request_response_information", request_response_information); }
        if let Some(request_problem_information) = &self.request_problem_information { s.field("request_problem_information", request_problem_information); }
        if let Some(receive_maximum) = &self.receive_maximum { s.field("receive_maximum", receive_maximum); }
        if let Some(topic_alias_maximum) = &self.topic_alias_maximum { s.field("topic_alias_maximum", topic_alias_maximum); }
        if let Some(maximum_packet_size_bytes) = &self.maximum_packet_size_bytes { s.field("maximum_packet_size_bytes", maximum_packet_size_bytes); }
        if let Some(authentication_method) = &self.authentication_method { s.field("authentication_method", authentication_method); }
        if let Some(authentication_data) = &self.authentication_data { s.field("authentication_data", &Redacted(authentication_data.len())); }
        if let Some(user_properties) = &self.user_properties { s.field("user_properties", user_properties); }
        if let Some(will_delay_interval_seconds) = &self.will_delay_interval_seconds { s.field("will_delay_interval_seconds", will_delay_interval_seconds); }
        if let Some(will) = &self.will { s.field("will", &format_args!("{}", will)); }
        s.finish()
    }
}
