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
define_ack_packet_lengths_function!(compute_pubrel_packet_length_properties, PubrelPacket, PubrelReasonCode);

#[rustfmt::skip]
define_ack_packet_encode_function5!(write_pubrel_packet5, PubrelPacket, PubrelReasonCode, PUBREL_FIRST_BYTE, compute_pubrel_packet_length_properties);
define_ack_packet_encode_function311!(write_pubrel_packet311, PubrelPacket, PUBREL_FIRST_BYTE);

define_ack_packet_decode_properties_function!(decode_pubrel_properties, PubrelPacket, "decode_pubrel_properties");
define_ack_packet_decode_function5!(decode_pubrel_packet5, Pubrel, PubrelPacket, "decode_pubrel_packet5", PUBREL_FIRST_BYTE, convert_u8_to_pubrel_reason_code, decode_pubrel_properties);
define_ack_packet_decode_function311!(decode_pubrel_packet311, Pubrel, PubrelPacket, "decode_pubrel_packet311", PUBREL_FIRST_BYTE);

validate_ack_outbound!(validate_pubrel_packet_outbound, PubrelPacket, PacketType::Pubrel, "validate_pubrel_packet_outbound");
validate_ack_outbound_internal!(validate_pubrel_packet_outbound_internal, PubrelPacket, PacketType::Pubrel, compute_pubrel_packet_length_properties, "validate_pubrel_packet_outbound_internal");
validate_ack_inbound_internal!(validate_pubrel_packet_inbound_internal, PubrelPacket, PacketType::Pubrel, "validate_pubrel_packet_inbound_internal");

define_ack_packet_display_trait!(PubrelPacket, "PubrelPacket");

#[cfg(test)]
mod tests {

    use super::*;
    use crate::decode::testing::*;
    use crate::validate::testing::*;

    fn create_pubrel_with_all_properties() -> PubrelPacket {
        PubrelPacket {
            packet_id: 42,
            reason_code: PubrelReasonCode::PacketIdentifierNotFound,
            reason_string: Some("no matching packet id found".to_string()),
            user_properties: Some(vec!(
                UserProperty{name: "region".to_string(), value: "us-west-2".to_string()},
                UserProperty{name: "build".to_string(), value: "20260828".to_string()},
            ))
        }
    }

    fn create_pubrel_decode_fixture() -> AckPacketDecodeFixture {
        AckPacketDecodeFixture {
            default_packet: MqttPacket::Pubrel(PubrelPacket { ..Default::default() }),
            success_packet: MqttPacket::Pubrel(PubrelPacket {
                packet_id: 12,
                reason_code: PubrelReasonCode::Success,
                ..Default::default()
            }),
            failure_packet: MqttPacket::Pubrel(PubrelPacket {
                packet_id: 65530,
                reason_code: PubrelReasonCode::PacketIdentifierNotFound,
                ..Default::default()
            }),
            all_properties_packet: MqttPacket::Pubrel(create_pubrel_with_all_properties()),
            fixed_header_flags_mask: 13,
            invalid_reason_code: 12,
        }
    }

    #[test]
    fn pubrel_round_trip_encode_decode() {
        do_ack_round_trip_encode_decode_tests(&create_pubrel_decode_fixture());
    }

    #[test]
    fn pubrel_decode_failures() {
        do_ack_decode_failure_tests(&create_pubrel_decode_fixture());
    }

    test_ack_validate_success!(pubrel_validate_success, Pubrel, create_pubrel_with_all_properties);
    test_ack_validate_failure_reason_string_length!(pubrel_validate_failure_reason_string_length, Pubrel, create_pubrel_with_all_properties, PacketType::Pubrel);
    test_ack_validate_failure_invalid_user_properties!(pubrel_validate_failure_invalid_user_properties, Pubrel, create_pubrel_with_all_properties, PacketType::Pubrel);
    test_ack_validate_failure_outbound_size!(pubrel_validate_failure_outbound_size, Pubrel, create_pubrel_with_all_properties, PacketType::Pubrel);
    test_ack_validate_failure_packet_id_zero!(pubrel_validate_failure_packet_id_zero, Pubrel, create_pubrel_with_all_properties, PacketType::Pubrel);
}
