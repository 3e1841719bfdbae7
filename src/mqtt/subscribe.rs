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

// each subscription is a length-prefixed filter plus an options byte
fn compute_subscriptions_length(packet: &SubscribePacket) -> usize {
    packet.subscriptions.iter().map(|subscription| subscription.topic_filter.len() + 3).sum()
}

#[rustfmt::skip]
fn compute_subscribe_packet_length_properties5(packet: &SubscribePacket) -> SchistResult<(u32, u32)> {
    let mut property_section_length = compute_user_properties_length(&packet.user_properties);
    add_optional_u32_property_length!(property_section_length, packet.subscription_identifier);

    let total_remaining_length =
        2
        + compute_variable_length_integer_encode_size(property_section_length)?
        + property_section_length
        + compute_subscriptions_length(packet);

    Ok((total_remaining_length as u32, property_section_length as u32))
}

fn compute_subscription_options_byte5(subscription: &Subscription) -> u8 {
    let mut options_byte = subscription.qos as u8;

    if subscription.no_local {
        options_byte |= SUBSCRIPTION_OPTIONS_NO_LOCAL_MASK;
    }

    if subscription.retain_as_published {
        options_byte |= SUBSCRIPTION_OPTIONS_RETAIN_AS_PUBLISHED_MASK;
    }

    options_byte |= (subscription.retain_handling_type as u8) << SUBSCRIPTION_OPTIONS_RETAIN_HANDLING_SHIFT;

    options_byte
}

#[rustfmt::skip]
pub(crate) fn write_subscribe_packet5(packet: &SubscribePacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let (total_remaining_length, subscribe_property_length) = compute_subscribe_packet_length_properties5(packet)?;

    dest.push(SUBSCRIBE_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    encode_u16(packet.packet_id, dest);
    encode_vli(subscribe_property_length, dest)?;
    encode_optional_u32_property!(dest, PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER, packet.subscription_identifier);
    encode_user_properties!(dest, packet.user_properties);

    for subscription in &packet.subscriptions {
        encode_length_prefixed_string(&subscription.topic_filter, dest)?;
        dest.push(compute_subscription_options_byte5(subscription));
    }

    Ok(())
}

pub(crate) fn write_subscribe_packet311(packet: &SubscribePacket, dest: &mut Vec<u8>) -> SchistResult<()> {
    let total_remaining_length = (2 + compute_subscriptions_length(packet)) as u32;

    dest.push(SUBSCRIBE_FIRST_BYTE);
    encode_vli(total_remaining_length, dest)?;

    encode_u16(packet.packet_id, dest);

    for subscription in &packet.subscriptions {
        encode_length_prefixed_string(&subscription.topic_filter, dest)?;
        dest.push(subscription.qos as u8);
    }

    Ok(())
}

fn decode_subscribe_properties(properties: &mut ByteCursor, packet : &mut SubscribePacket) -> SchistResult<()> {
    while !properties.is_empty() {
        let property_key = properties.read_u8()?;
        match property_key {
            PROPERTY_KEY_SUBSCRIPTION_IDENTIFIER => { set_once(&mut packet.subscription_identifier, properties.read_u32()?)?; }
            PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
            _ => {
                error!("decode_subscribe_properties - invalid property type ({})", property_key);
                return Err(SchistError::new_decoding_failure("invalid property type for subscribe packet"));
            }
        }
    }

    Ok(())
}

const SUBSCRIPTION_OPTIONS_RESERVED_BITS_MASK5 : u8 = 192;
const SUBSCRIPTION_OPTIONS_RESERVED_BITS_MASK311 : u8 = 252;

fn decode_subscription5(body: &mut ByteCursor) -> SchistResult<Subscription> {
    let topic_filter = body.read_string()?;
    let options = body.read_u8()?;

    if (options & SUBSCRIPTION_OPTIONS_RESERVED_BITS_MASK5) != 0 {
        error!("decode_subscription5 - invalid subscription option reserved bit flags");
        return Err(SchistError::new_decoding_failure("invalid subscription option reserved bit flags for subscribe packet"));
    }

    Ok(Subscription {
        topic_filter,
        qos: convert_u8_to_quality_of_service(options & 0x03)?,
        no_local: (options & SUBSCRIPTION_OPTIONS_NO_LOCAL_MASK) != 0,
        retain_as_published: (options & SUBSCRIPTION_OPTIONS_RETAIN_AS_PUBLISHED_MASK) != 0,
        retain_handling_type: convert_u8_to_retain_handling_type((options >> SUBSCRIPTION_OPTIONS_RETAIN_HANDLING_SHIFT) & 0x03)?,
    })
}

fn decode_subscription311(body: &mut ByteCursor) -> SchistResult<Subscription> {
    let topic_filter = body.read_string()?;
    let options = body.read_u8()?;

    if (options & SUBSCRIPTION_OPTIONS_RESERVED_BITS_MASK311) != 0 {
        error!("decode_subscription311 - invalid subscription option reserved bit flags");
        return Err(SchistError::new_decoding_failure("invalid subscription option reserved bit flags for subscribe packet"));
    }

    Ok(Subscription {
        topic_filter,
        qos: convert_u8_to_quality_of_service(options & 0x03)?,
        ..Default::default()
    })
}

pub(crate) fn decode_subscribe_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != SUBSCRIBE_FIRST_BYTE {
        error!("decode_subscribe_packet5 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for subscribe packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = SubscribePacket { ..Default::default() };

    packet.packet_id = body.read_u16()?;

    let mut properties = body.split_off_property_section(false)?;
    decode_subscribe_properties(&mut properties, &mut packet)?;

    while !body.is_empty() {
        packet.subscriptions.push(decode_subscription5(&mut body)?);
    }

    Ok(Box::new(MqttPacket::Subscribe(packet)))
}

pub(crate) fn decode_subscribe_packet311(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    if first_byte != SUBSCRIBE_FIRST_BYTE {
        error!("decode_subscribe_packet311 - invalid first byte");
        return Err(SchistError::new_decoding_failure("invalid first byte for subscribe packet"));
    }

    let mut body = ByteCursor::new(packet_body);
    let mut packet = SubscribePacket { ..Default::default() };

    packet.packet_id = body.read_u16()?;

    while !body.is_empty() {
        packet.subscriptions.push(decode_subscription311(&mut body)?);
    }

    Ok(Box::new(MqttPacket::Subscribe(packet)))
}

pub(crate) fn validate_subscribe_packet_outbound(packet: &SubscribePacket) -> SchistResult<()> {
    if packet.packet_id != 0 {
        return Err(packet_validation_error(PacketType::Subscribe, "validate_subscribe_packet_outbound - packet id may not be set".to_string()));
    }

    if packet.subscriptions.is_empty() {
        return Err(packet_validation_error(PacketType::Subscribe, "validate_subscribe_packet_outbound - empty subscription set".to_string()));
    }

    validate_user_properties(&packet.user_properties, PacketType::Subscribe, "validate_subscribe_packet_outbound")
}

pub(crate) fn validate_subscribe_packet_outbound_internal(packet: &SubscribePacket, context: &OutboundValidationContext) -> SchistResult<()> {
    let (total_remaining_length, _) = compute_subscribe_packet_length_properties5(packet)?;
    let prefix_length = 1 + compute_variable_length_integer_encode_size(total_remaining_length as usize)? as u32;
    if prefix_length + total_remaining_length > context.negotiated_settings.unwrap().maximum_packet_size_to_peer {
        return Err(packet_validation_error(PacketType::Subscribe, "validate_subscribe_packet_outbound_internal - packet length exceeds allowed maximum to peer".to_string()));
    }

    if packet.packet_id == 0 {
        return Err(packet_validation_error(PacketType::Subscribe, "validate_subscribe_packet_outbound_internal - packet id is zero".to_string()));
    }

    for subscription in &packet.subscriptions {
        if !is_valid_topic_filter_internal(&subscription.topic_filter, context, Some(subscription.no_local)) {
            return Err(packet_validation_error(PacketType::Subscribe, format!("validate_subscribe_packet_outbound_internal - invalid topic filter '{}'", subscription.topic_filter)));
        }
    }

    Ok(())
}

impl fmt::Display for SubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("SubscribePacket");
        s.field("packet_id", &self.packet_id);
        s.field("subscriptions", &self.subscriptions);
        if let Some(subscription_identifier) = &self.subscription_identifier {
            s.field("subscription_identifier", subscription_identifier);
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
    use crate::validate::testing::*;

    fn create_single_subscription_packet() -> MqttPacket {
        MqttPacket::Subscribe(SubscribePacket {
            packet_id : 3021,
            subscriptions : vec![ Subscription { topic_filter: "devices/11/status".to_string(), qos: QualityOfService::AtLeastOnce, ..Default::default() } ],
            ..Default::default()
        })
    }

    fn create_subscribe_all_properties() -> SubscribePacket {
        SubscribePacket {
            packet_id : 3021,
            subscriptions : vec![
                Subscription {
                    topic_filter: "plant/line4/conveyor/speed".to_string(),
                    qos: QualityOfService::ExactlyOnce,
                    retain_as_published: true,
                    no_local: false,
                    retain_handling_type: RetainHandlingType::DontSend
                },
                Subscription {
                    topic_filter: "telemetry/+/battery".to_string(),
                    qos: QualityOfService::AtMostOnce,
                    retain_as_published: false,
                    no_local: true,
                    retain_handling_type: RetainHandlingType::SendOnSubscribeIfNew
                }
            ],
            subscription_identifier : Some(41),
            user_properties: Some(vec!(
                UserProperty{name: "fleet".to_string(), value: "canary".to_string()},
            )),
        }
    }

    #[test]
    fn subscribe_round_trip_encode_decode() {
        for protocol_version in [ProtocolVersion::Mqtt5, ProtocolVersion::Mqtt311] {
            assert!(do_round_trip_encode_decode_test(&MqttPacket::Subscribe(SubscribePacket { ..Default::default() }), protocol_version));
            assert!(do_round_trip_encode_decode_test(&create_single_subscription_packet(), protocol_version));
        }

        assert!(do_round_trip_encode_decode_test(&MqttPacket::Subscribe(create_subscribe_all_properties()), ProtocolVersion::Mqtt5));
    }

    #[test]
    fn subscribe_round_trip_drops_properties_for_311() {
        // a 311 peer sees only filter + qos per subscription
        let packet = create_subscribe_all_properties();
        let expected_packet = SubscribePacket {
            packet_id: packet.packet_id,
            subscriptions: packet.subscriptions.iter().map(|subscription| {
                Subscription {
                    topic_filter: subscription.topic_filter.clone(),
                    qos: subscription.qos,
                    ..Default::default()
                }
            }).collect(),
            ..Default::default()
        };

        assert!(do_311_filter_encode_decode_test(&MqttPacket::Subscribe(packet), &MqttPacket::Subscribe(expected_packet)));
    }

    #[test]
    fn subscribe_decode_failure_bad_fixed_header() {
        do_fixed_header_flag_decode_failure_test(&create_single_subscription_packet(), ProtocolVersion::Mqtt5, 7);
        do_fixed_header_flag_decode_failure_test(&create_single_subscription_packet(), ProtocolVersion::Mqtt311, 7);
    }

    // 311 has no properties field, so the options byte of the first subscription sits
    // one byte earlier than in the 5 encoding
    const OPTIONS_BYTE_INDEX5 : usize = 24;
    const OPTIONS_BYTE_INDEX311 : usize = 23;

    fn do_subscription_options_corruption_test(protocol_version: ProtocolVersion, index: usize, corruption_mask: u8) {
        let corrupt_options_byte = | bytes: &[u8] | -> Vec<u8> {
            let mut clone = bytes.to_vec();
            clone[index] |= corruption_mask;
            clone
        };

        do_mutated_decode_failure_test(&create_single_subscription_packet(), protocol_version, corrupt_options_byte);
    }

    #[test]
    fn subscribe_decode_failure_subscription_qos3() {
        do_subscription_options_corruption_test(ProtocolVersion::Mqtt5, OPTIONS_BYTE_INDEX5, 0x03);
        do_subscription_options_corruption_test(ProtocolVersion::Mqtt311, OPTIONS_BYTE_INDEX311, 0x03);
    }

    #[test]
    fn subscribe_decode_failure_subscription_retain_handling3() {
        do_subscription_options_corruption_test(ProtocolVersion::Mqtt5, OPTIONS_BYTE_INDEX5, 0x03 << 4);
    }

    #[test]
    fn subscribe_decode_failure_subscription_reserved_bits() {
        do_subscription_options_corruption_test(ProtocolVersion::Mqtt5, OPTIONS_BYTE_INDEX5, SUBSCRIPTION_OPTIONS_RESERVED_BITS_MASK5);
        do_subscription_options_corruption_test(ProtocolVersion::Mqtt311, OPTIONS_BYTE_INDEX311, SUBSCRIPTION_OPTIONS_RESERVED_BITS_MASK311);
    }

    #[test]
    fn subscribe_decode_failure_inbound_packet_size5() {
        do_inbound_size_decode_failure_test(&MqttPacket::Subscribe(create_subscribe_all_properties()), ProtocolVersion::Mqtt5);
    }

    #[test]
    fn subscribe_decode_failure_inbound_packet_size311() {
        // the fixture must survive a 311 round trip intact, so no 5-only fields
        do_inbound_size_decode_failure_test(&create_single_subscription_packet(), ProtocolVersion::Mqtt311);
    }

    #[test]
    fn subscribe_validate_success() {
        let mut packet = create_subscribe_all_properties();
        packet.packet_id = 0;

        assert!(validate_packet_outbound(&MqttPacket::Subscribe(packet)).is_ok());

        let mut bound_packet = create_subscribe_all_properties();
        bound_packet.packet_id = 1;

        let test_validation_context = create_pinned_validation_context();
        let outbound_validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);

        assert!(validate_packet_outbound_internal(&MqttPacket::Subscribe(bound_packet), &outbound_validation_context).is_ok());
    }

    fn do_subscribe_outbound_validate_failure_test(mutate: impl FnOnce(&mut SubscribePacket)) {
        let mut packet = create_subscribe_all_properties();
        mutate(&mut packet);

        verify_validation_failure!(validate_packet_outbound(&MqttPacket::Subscribe(packet)), PacketType::Subscribe);
    }

    #[test]
    fn subscribe_validate_failure_outbound_packet_id_non_zero() {
        do_subscribe_outbound_validate_failure_test(|packet| { packet.packet_id = 1; });
    }

    #[test]
    fn subscribe_validate_failure_outbound_topic_filters_empty() {
        do_subscribe_outbound_validate_failure_test(|packet| { packet.subscriptions = vec![]; });
    }

    #[test]
    fn subscribe_validate_failure_outbound_user_properties_invalid() {
        do_subscribe_outbound_validate_failure_test(|packet| { packet.user_properties = Some(create_invalid_user_properties()); });
    }

    #[test]
    fn subscribe_validate_failure_outbound_size() {
        do_outbound_size_validate_failure_test(&MqttPacket::Subscribe(create_subscribe_all_properties()), PacketType::Subscribe);
    }

    fn do_subscribe_outbound_internal_validate_failure_test(mutate: impl FnOnce(&mut SubscribePacket), adjust_settings: impl FnOnce(&mut crate::config::NegotiatedSettings)) {
        let mut packet = create_subscribe_all_properties();
        mutate(&mut packet);

        let mut test_validation_context = create_pinned_validation_context();
        adjust_settings(&mut test_validation_context.settings);

        let outbound_validation_context = create_outbound_validation_context_from_pinned(&test_validation_context);

        verify_validation_failure!(validate_packet_outbound_internal(&MqttPacket::Subscribe(packet), &outbound_validation_context), PacketType::Subscribe);
    }

    #[test]
    fn subscribe_validate_failure_outbound_internal_packet_id_zero() {
        do_subscribe_outbound_internal_validate_failure_test(|packet| { packet.packet_id = 0; }, |_| {});
    }

    #[test]
    fn subscribe_validate_failure_outbound_internal_topic_filter_invalid() {
        do_subscribe_outbound_internal_validate_failure_test(
            |packet| { packet.subscriptions[0].topic_filter = "a/#/c".to_string(); },
            |_| {});
    }

    #[test]
    fn subscribe_validate_failure_outbound_internal_shared_topic_filter_not_allowed() {
        do_subscribe_outbound_internal_validate_failure_test(
            |packet| {
                packet.subscriptions[0].topic_filter = "$share/sharename/hello/world".to_string();
                packet.subscriptions[0].no_local = false;
            },
            |settings| { settings.shared_subscriptions_available = false; });
    }

    #[test]
    fn subscribe_validate_failure_outbound_internal_shared_topic_filter_no_local() {
        do_subscribe_outbound_internal_validate_failure_test(
            |packet| {
                packet.subscriptions[0].topic_filter = "$share/sharename/hello/world".to_string();
                packet.subscriptions[0].no_local = true;
            },
            |_| {});
    }

    #[test]
    fn subscribe_validate_failure_outbound_internal_wildcard_topic_filter_not_allowed() {
        do_subscribe_outbound_internal_validate_failure_test(
            |packet| { packet.subscriptions[0].topic_filter = "a/+/+".to_string(); },
            |settings| { settings.wildcard_subscriptions_available = false; });
    }
}
