/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::error::{SchistError, SchistResult};
use crate::mqtt::*;
use crate::mqtt::utils::*;

use log::*;
use std::fmt;

// both ping packets are empty; everything but the packet type byte is shared
macro_rules! define_ping_packet_functions {
    ($packet_type: ident, $packet_type_name: ident, $first_byte: ident, $display_text: expr, $write_function_name: ident, $decode_function_name: ident, $decode_log_name: expr) => {
        pub(crate) fn $write_function_name(_: &$packet_type_name, dest: &mut Vec<u8>) -> SchistResult<()> {
            dest.push($first_byte);
            dest.push(0);

            Ok(())
        }

        pub(crate) fn $decode_function_name(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
            if !packet_body.is_empty() {
                error!("{} - non-zero remaining length", $decode_log_name);
                return Err(SchistError::new_decoding_failure("non-zero remaining length for ping packet"));
            }

            if first_byte != $first_byte {
                error!("{} - invalid first byte", $decode_log_name);
                return Err(SchistError::new_decoding_failure("invalid first byte for ping packet"));
            }

            Ok(Box::new(MqttPacket::$packet_type($packet_type_name{})))
        }

        impl fmt::Display for $packet_type_name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str($display_text)
            }
        }
    };
}

define_ping_packet_functions!(Pingreq, PingreqPacket, PINGREQ_FIRST_BYTE, "PingreqPacket { }", write_pingreq_packet, decode_pingreq_packet, "decode_pingreq_packet");
define_ping_packet_functions!(Pingresp, PingrespPacket, PINGRESP_FIRST_BYTE, "PingrespPacket { }", write_pingresp_packet, decode_pingresp_packet, "decode_pingresp_packet");
