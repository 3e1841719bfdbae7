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
define_ack_packet_lengths_function!(compute_puback_packet_length_properties, PubackPacket, PubackReasonCode);

#[rustfmt::skip]
define_ack_packet_encode_function5!(write_puback_packet5, PubackPacket, PubackReasonCode, PUBACK_FIRST_BYTE, compute_puback_packet_length_properties);
define_ack_packet_encode_function311!(write_puback_packet311, PubackPacket, PUBACK_FIRST_BYTE);

define_ack_packet_decode_properties_function!(decode_puback_properties, PubackPacket, "decode_puback_properties");
define_ack_packet_decode_function5!(decode_puback_packet5, Puback, PubackPacket, "decode_puback_packet5", PUBACK_FIRST_BYTE, convert_u8_to_puback_reason_code, decode_puback_properties);
define_ack_packet_decode_function311!(decode_puback_packet311, Puback, PubackPacket, "decode_puback_packet311", PUBACK_FIRST_BYTE);

validate_ack_outbound!(validate_puback_packet_outbound, PubackPacket, PacketType::Puback, "validate_puback_packet_outbound");
validate_ack_outbound_internal!(validate_puback_packet_outbound_internal, PubackPacket, PacketType::Puback, compute_puback_packet_length_properties, "validate_puback_packet_outbound_internal");
validate_ack_inbound_internal!(validate_puback_packet_inbound_internal, PubackPacket, PacketType::Puback, "validate_puback_packet_inbound_internal");

define_ack_packet_display_trait!(PubackPacket, "PubackPacket");
