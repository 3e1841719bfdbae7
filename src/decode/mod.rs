/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub(crate) mod utils;

use crate::decode::utils::*;
use crate::error::{SchistError, SchistResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;

use crate::mqtt::auth::*;
use crate::mqtt::connack::*;
use crate::mqtt::connect::*;
use crate::mqtt::disconnect::*;
use crate::mqtt::ping::*;
use crate::mqtt::puback::*;
use crate::mqtt::pubcomp::*;
use crate::mqtt::publish::*;
use crate::mqtt::pubrec::*;
use crate::mqtt::pubrel::*;
use crate::mqtt::suback::*;
use crate::mqtt::subscribe::*;
use crate::mqtt::unsuback::*;
use crate::mqtt::unsubscribe::*;

use log::*;

use std::collections::*;

const DECODE_BUFFER_DEFAULT_SIZE : usize = 16 * 1024;

#[derive(Copy, Clone, Eq, PartialEq)]
enum DecoderState {
    ReadPacketType,
    ReadTotalRemainingLength,
    ReadPacketBody,
    TerminalError
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum DecoderDirective {
    OutOfData,
    Continue,
    TerminalError
}

pub(crate) struct DecodingContext<'a> {
    /// Inbound packet size limit; packets that exceed it fail the connection.  Zero means
    /// no limit beyond the variable length integer maximum.
    pub(crate) maximum_packet_size : u32,

    pub(crate) protocol_version : ProtocolVersion,

    pub(crate) decoded_packets: &'a mut VecDeque<Box<MqttPacket>>
}

/// Incremental packet deframer and decoder.
///
/// Accepts arbitrary fragments of the inbound byte stream and appends every completed packet
/// to the context's decoded packet queue.  A decode failure is terminal; the decoder refuses
/// all further input until reset for a new connection.
pub(crate) struct Decoder {
    state: DecoderState,

    scratch: Vec<u8>,

    first_byte: Option<u8>,

    remaining_length : Option<usize>,
}

fn decode_packet5(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    let packet_type = first_byte >> 4;

    match packet_type {
        PACKET_TYPE_CONNECT => { decode_connect_packet5(first_byte, packet_body) }
        PACKET_TYPE_CONNACK => { decode_connack_packet5(first_byte, packet_body) }
        PACKET_TYPE_PUBLISH => { decode_publish_packet5(first_byte, packet_body) }
        PACKET_TYPE_PUBACK => { decode_puback_packet5(first_byte, packet_body) }
        PACKET_TYPE_PUBREC => { decode_pubrec_packet5(first_byte, packet_body) }
        PACKET_TYPE_PUBREL => { decode_pubrel_packet5(first_byte, packet_body) }
        PACKET_TYPE_PUBCOMP => { decode_pubcomp_packet5(first_byte, packet_body) }
        PACKET_TYPE_SUBSCRIBE => { decode_subscribe_packet5(first_byte, packet_body) }
        PACKET_TYPE_SUBACK => { decode_suback_packet5(first_byte, packet_body) }
        PACKET_TYPE_UNSUBSCRIBE => { decode_unsubscribe_packet5(first_byte, packet_body) }
        PACKET_TYPE_UNSUBACK => { decode_unsuback_packet5(first_byte, packet_body) }
        PACKET_TYPE_PINGREQ => { decode_pingreq_packet(first_byte, packet_body) }
        PACKET_TYPE_PINGRESP => { decode_pingresp_packet(first_byte, packet_body) }
        PACKET_TYPE_DISCONNECT => { decode_disconnect_packet5(first_byte, packet_body) }
        PACKET_TYPE_AUTH => { decode_auth_packet5(first_byte, packet_body) }
        _ => {
            error!("decode_packet5 - invalid packet type ({})", packet_type);
            Err(SchistError::new_decoding_failure("invalid packet type value"))
        }
    }
}

fn decode_packet311(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
    let packet_type = first_byte >> 4;

    match packet_type {
        PACKET_TYPE_CONNECT => { decode_connect_packet311(first_byte, packet_body) }
        PACKET_TYPE_CONNACK => { decode_connack_packet311(first_byte, packet_body) }
        PACKET_TYPE_PUBLISH => { decode_publish_packet311(first_byte, packet_body) }
        PACKET_TYPE_PUBACK => { decode_puback_packet311(first_byte, packet_body) }
        PACKET_TYPE_PUBREC => { decode_pubrec_packet311(first_byte, packet_body) }
        PACKET_TYPE_PUBREL => { decode_pubrel_packet311(first_byte, packet_body) }
        PACKET_TYPE_PUBCOMP => { decode_pubcomp_packet311(first_byte, packet_body) }
        PACKET_TYPE_SUBSCRIBE => { decode_subscribe_packet311(first_byte, packet_body) }
        PACKET_TYPE_SUBACK => { decode_suback_packet311(first_byte, packet_body) }
        PACKET_TYPE_UNSUBSCRIBE => { decode_unsubscribe_packet311(first_byte, packet_body) }
        PACKET_TYPE_UNSUBACK => { decode_unsuback_packet311(first_byte, packet_body) }
        PACKET_TYPE_PINGREQ => { decode_pingreq_packet(first_byte, packet_body) }
        PACKET_TYPE_PINGRESP => { decode_pingresp_packet(first_byte, packet_body) }
        PACKET_TYPE_DISCONNECT => { decode_disconnect_packet311(first_byte, packet_body) }
        _ => {
            error!("decode_packet311 - invalid packet type ({})", packet_type);
            Err(SchistError::new_decoding_failure("invalid packet type value"))
        }
    }
}

fn decode_packet(first_byte: u8, packet_body: &[u8], protocol_version: ProtocolVersion) -> SchistResult<Box<MqttPacket>> {
    debug!("Decoding a packet of type {}", packet_type_to_str(first_byte >> 4));

    match protocol_version {
        ProtocolVersion::Mqtt5 => { decode_packet5(first_byte, packet_body) }
        ProtocolVersion::Mqtt311 => { decode_packet311(first_byte, packet_body) }
    }
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder {
            state: DecoderState::ReadPacketType,
            scratch : Vec::<u8>::with_capacity(DECODE_BUFFER_DEFAULT_SIZE),
            first_byte : None,
            remaining_length : None,
        }
    }

    pub fn reset_for_new_connection(&mut self) {
        self.reset();
    }

    /// How many additional bytes are known to be required before the in-progress packet can
    /// complete, if that is determinable from the data consumed so far.
    pub fn bytes_required(&self) -> Option<usize> {
        match self.state {
            DecoderState::ReadPacketBody => {
                Some(self.remaining_length.unwrap() - self.scratch.len())
            }
            _ => { None }
        }
    }

    fn process_read_packet_type<'a>(&mut self, bytes: &'a [u8]) -> (DecoderDirective, &'a[u8]) {
        if bytes.is_empty() {
            return (DecoderDirective::OutOfData, bytes);
        }

        self.first_byte = Some(bytes[0]);
        self.state = DecoderState::ReadTotalRemainingLength;

        (DecoderDirective::Continue, &bytes[1..])
    }

    fn process_read_total_remaining_length<'a>(&mut self, bytes: &'a[u8], context: &DecodingContext) -> (DecoderDirective, &'a[u8]) {
        if bytes.is_empty() {
            return (DecoderDirective::OutOfData, bytes);
        }

        self.scratch.push(bytes[0]);
        let remaining_bytes = &bytes[1..];

        let decode_vli_result = decode_vli(&self.scratch);
        if let Ok(DecodeVliResult::Value(remaining_length, _)) = decode_vli_result {
            let mut maximum_size = context.maximum_packet_size;
            if maximum_size == 0 {
                maximum_size = MAXIMUM_VARIABLE_LENGTH_INTEGER as u32;
            }

            let total_packet_size = remaining_length + 1 + self.scratch.len() as u32;
            if total_packet_size <= maximum_size {
                self.remaining_length = Some(remaining_length as usize);
                self.state = DecoderState::ReadPacketBody;
                self.scratch.clear();
                (DecoderDirective::Continue, remaining_bytes)
            } else {
                error!("Decoder - packet size ({}) exceeds inbound maximum ({})", total_packet_size, maximum_size);
                (DecoderDirective::TerminalError, remaining_bytes)
            }
        } else if self.scratch.len() >= 4 {
            (DecoderDirective::TerminalError, remaining_bytes)
        } else if !remaining_bytes.is_empty() {
            (DecoderDirective::Continue, remaining_bytes)
        } else {
            (DecoderDirective::OutOfData, remaining_bytes)
        }
    }

    fn process_read_packet_body<'a>(&mut self, bytes: &'a[u8], context: &mut DecodingContext) -> (DecoderDirective, &'a[u8]) {
        let read_so_far = self.scratch.len();
        let bytes_needed = self.remaining_length.unwrap() - read_so_far;
        if bytes_needed > bytes.len() {
            self.scratch.extend_from_slice(bytes);
            return (DecoderDirective::OutOfData, &[]);
        }

        let packet_slice : &[u8] =
            if !self.scratch.is_empty() {
                self.scratch.extend_from_slice(&bytes[..bytes_needed]);
                &self.scratch
            } else {
                &bytes[..bytes_needed]
            };

        if let Ok(packet) = decode_packet(self.first_byte.unwrap(), packet_slice, context.protocol_version) {
            log_packet("Successfully decoded incoming packet: ", &packet);
            context.decoded_packets.push_back(packet);

            self.reset_for_new_packet();
            return (DecoderDirective::Continue, &bytes[bytes_needed..]);
        }

        (DecoderDirective::TerminalError, &[])
    }

    pub fn decode_bytes(&mut self, bytes: &[u8], context: &mut DecodingContext) -> SchistResult<()> {
        let mut current_slice = bytes;

        let mut decode_result = DecoderDirective::Continue;
        while decode_result == DecoderDirective::Continue {
            match self.state {
                DecoderState::ReadPacketType => {
                    (decode_result, current_slice) = self.process_read_packet_type(current_slice);
                }

                DecoderState::ReadTotalRemainingLength => {
                    (decode_result, current_slice) = self.process_read_total_remaining_length(current_slice, context);
                }

                DecoderState::ReadPacketBody => {
                    (decode_result, current_slice) = self.process_read_packet_body(current_slice, context);
                }

                _ => {
                    decode_result = DecoderDirective::TerminalError;
                }
            }
        }

        if decode_result == DecoderDirective::TerminalError {
            self.state = DecoderState::TerminalError;
            return Err(SchistError::new_decoding_failure("malformed inbound packet data"));
        }

        Ok(())
    }

    fn reset_for_new_packet(&mut self) {
        if self.state != DecoderState::TerminalError {
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.state = DecoderState::ReadPacketType;
        self.scratch.clear();
        self.first_byte = None;
        self.remaining_length = None;
    }
}
