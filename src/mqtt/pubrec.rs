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
define_ack_packet_lengths_function!(compute_pubrec_packet_length_properties, PubrecPacket, PubrecReasonCode);

#[rustfmt::skip]
define_ack_packet_encode_function5!(write_pubrec_packet5, PubrecPacket, PubrecReasonCode, PUBREC_FIRST_BYTE, compute_pubrec_packet_length_properties);
define_ack_packet_encode_function311!(write_pubrec_packet311, PubrecPacket, PUBREC_FIRST_BYTE);

define_ack_packet_decode_properties_function!(decode_pubrec_properties, PubrecPacket, "decode_pubrec_properties");
define_ack_packet_decode_function5!(decode_pubrec_packet5, Pubrec, PubrecPacket, "decode_pubrec_packet5", PUBREC_FIRST_BYTE, convert_u8_to_pubrec_reason_code, decode_pubrec_properties);
define_ack_packet_decode_function311!(decode_pubrec_packet311, Pubrec, PubrecPacket, "decode_pubrec_packet311", PUBREC_FIRST_BYTE);

validate_ack_outbound!(validate_pubrec_packet_outbound, PubrecPacket, PacketType::Pubrec, "validate_pubrec_packet_outbound");
validate_ack_outbound_internal!(validate_pubrec_packet_outbound_internal, PubrecPacket, PacketType::Pubrec, compute_pubrec_packet_length_properties, "validate_pubrec_packet_outbound_internal");
validate_ack_inbound_internal!(validate_pubrec_packet_inbound_internal, PubrecPacket, PacketType::Pubrec, "validate_pubrec_packet_inbound_internal");

define_ack_packet_display_trait!(PubrecPacket, "PubrecPacket");
