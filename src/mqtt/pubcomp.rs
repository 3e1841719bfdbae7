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
define_ack_packet_lengths_function!(compute_pubcomp_packet_length_properties, PubcompPacket, PubcompReasonCode);

#[rustfmt::skip]
define_ack_packet_encode_function5!(write_pubcomp_packet5, PubcompPacket, PubcompReasonCode, PUBCOMP_FIRST_BYTE, compute_pubcomp_packet_length_properties);
define_ack_packet_encode_function311!(write_pubcomp_packet311, PubcompPacket, PUBCOMP_FIRST_BYTE);

define_ack_packet_decode_properties_function!(decode_pubcomp_properties, PubcompPacket, "decode_pubcomp_properties");
define_ack_packet_decode_function5!(decode_pubcomp_packet5, Pubcomp, PubcompPacket, "decode_pubcomp_packet5", PUBCOMP_FIRST_BYTE, convert_u8_to_pubcomp_reason_code, decode_pubcomp_properties);
define_ack_packet_decode_function311!(decode_pubcomp_packet311, Pubcomp, PubcompPacket, "decode_pubcomp_packet311", PUBCOMP_FIRST_BYTE);

validate_ack_outbound!(validate_pubcomp_packet_outbound, PubcompPacket, PacketType::Pubcomp, "validate_pubcomp_packet_outbound");
validate_ack_outbound_internal!(validate_pubcomp_packet_outbound_internal, PubcompPacket, PacketType::Pubcomp, compute_pubcomp_packet_length_properties, "validate_pubcomp_packet_outbound_internal");
validate_ack_inbound_internal!(validate_pubcomp_packet_inbound_internal, PubcompPacket, PacketType::Pubcomp, "validate_pubcomp_packet_inbound_internal");

define_ack_packet_display_trait!(PubcompPacket, "PubcompPacket");
