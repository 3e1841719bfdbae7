/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::error::{SchistError, SchistResult};
use crate::mqtt::UserProperty;

use log::*;

#[derive(Eq, PartialEq, Debug)]
pub(crate) enum DecodeVliResult<'a> {
    InsufficientData,
    Value(u32, &'a[u8]), /* (decoded value, remaining bytes) */
}

/// Decodes a variable length integer from the front of a buffer that may be incomplete.
/// Only the deframer tolerates partial data; everything past the fixed header reads through
/// a ByteCursor, which treats truncation as a decode failure.
pub(crate) fn decode_vli(buffer: &[u8]) -> SchistResult<DecodeVliResult> {
    let mut value: u32 = 0;

    for (index, byte) in buffer.iter().take(4).enumerate() {
        value |= ((byte & 0x7F) as u32) << (7 * index as u32);
        if byte & 0x80 == 0 {
            return Ok(DecodeVliResult::Value(value, &buffer[(index + 1)..]));
        }
    }

    if buffer.len() < 4 {
        return Ok(DecodeVliResult::InsufficientData);
    }

    error!("decode_vli - continuation bit set on final variable length integer byte");
    Err(SchistError::new_decoding_failure("continuation bit set on final variable length integer byte"))
}

/// Forward-only reader over a complete packet body.  Every read validates the remaining
/// length first and converts truncation into a decode failure, so per-packet decode
/// functions never index the body directly.
pub(crate) struct ByteCursor<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteCursor<'a> {

    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        ByteCursor {
            bytes
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len()
    }

    fn advance(&mut self, count: usize) -> SchistResult<&'a [u8]> {
        if count > self.bytes.len() {
            error!("ByteCursor - packet body too short for field of length {}", count);
            return Err(SchistError::new_decoding_failure("packet body too short for field"));
        }

        let (field_bytes, rest) = self.bytes.split_at(count);
        self.bytes = rest;

        Ok(field_bytes)
    }

    pub(crate) fn read_slice(&mut self, count: usize) -> SchistResult<&'a [u8]> {
        self.advance(count)
    }

    pub(crate) fn read_u8(&mut self) -> SchistResult<u8> {
        Ok(self.advance(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> SchistResult<u16> {
        Ok(u16::from_be_bytes(self.advance(2)?.try_into().unwrap()))
    }

    pub(crate) fn read_u32(&mut self) -> SchistResult<u32> {
        Ok(u32::from_be_bytes(self.advance(4)?.try_into().unwrap()))
    }

    pub(crate) fn read_bool(&mut self) -> SchistResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => {
                error!("ByteCursor - invalid byte value ({}) for boolean field", value);
                Err(SchistError::new_decoding_failure("invalid byte value for boolean field"))
            }
        }
    }

    pub(crate) fn read_enum<T>(&mut self, converter: fn(u8) -> SchistResult<T>) -> SchistResult<T> {
        converter(self.read_u8()?)
    }

    pub(crate) fn read_vli(&mut self) -> SchistResult<usize> {
        match decode_vli(self.bytes)? {
            DecodeVliResult::InsufficientData => {
                error!("ByteCursor - truncated variable length integer");
                Err(SchistError::new_decoding_failure("truncated variable length integer"))
            }
            DecodeVliResult::Value(value, rest) => {
                self.bytes = rest;
                Ok(value as usize)
            }
        }
    }

    pub(crate) fn read_string(&mut self) -> SchistResult<String> {
        let length = self.read_u16()? as usize;
        let raw = self.advance(length)?;

        Ok(std::str::from_utf8(raw)?.to_string())
    }

    /// Length-prefixed string read where a zero length means the field is absent rather
    /// than empty.
    pub(crate) fn read_optional_string(&mut self) -> SchistResult<Option<String>> {
        let value = self.read_string()?;
        if value.is_empty() {
            return Ok(None);
        }

        Ok(Some(value))
    }

    pub(crate) fn read_binary(&mut self) -> SchistResult<Vec<u8>> {
        let length = self.read_u16()? as usize;

        Ok(self.advance(length)?.to_vec())
    }

    /// Length-prefixed binary read where a zero length means the field is absent.
    pub(crate) fn read_optional_binary(&mut self) -> SchistResult<Option<Vec<u8>>> {
        let value = self.read_binary()?;
        if value.is_empty() {
            return Ok(None);
        }

        Ok(Some(value))
    }

    pub(crate) fn read_user_property(&mut self, properties: &mut Option<Vec<UserProperty>>) -> SchistResult<()> {
        let name = self.read_string()?;
        let value = self.read_string()?;

        properties.get_or_insert_with(Vec::new).push(UserProperty { name, value });

        Ok(())
    }

    /// Splits off the next `count` bytes as an independent cursor, bounding a
    /// length-prefixed section like a property block.
    pub(crate) fn split_off_section(&mut self, count: usize) -> SchistResult<ByteCursor<'a>> {
        Ok(ByteCursor::new(self.advance(count)?))
    }

    /// Splits off the property section whose variable-length-integer length prefix sits at
    /// the cursor.  When `exhaustive` is set the section must consume everything left in
    /// the body.
    pub(crate) fn split_off_property_section(&mut self, exhaustive: bool) -> SchistResult<ByteCursor<'a>> {
        let section_length = self.read_vli()?;
        if exhaustive && section_length != self.remaining() {
            error!("ByteCursor - property section length does not match remaining packet length");
            return Err(SchistError::new_decoding_failure("property section length does not match remaining packet length"));
        }

        self.split_off_section(section_length)
    }

    pub(crate) fn read_remainder(&mut self) -> &'a [u8] {
        let rest = self.bytes;
        self.bytes = &[];

        rest
    }
}

/// Stores a freshly decoded property value, failing the decode if the property already
/// appeared earlier in the packet.
pub(crate) fn set_once<T>(slot: &mut Option<T>, value: T) -> SchistResult<()> {
    if slot.is_some() {
        error!("packet decode - duplicate packet property");
        return Err(SchistError::new_decoding_failure("duplicate packet property"));
    }

    *slot = Some(value);

    Ok(())
}

macro_rules! define_ack_packet_decode_properties_function {
    ($function_name: ident, $packet_type: ident, $function_name_as_string: expr) => {
        fn $function_name(properties: &mut ByteCursor, packet : &mut $packet_type) -> SchistResult<()> {
            while !properties.is_empty() {
                match properties.read_u8()? {
                    PROPERTY_KEY_USER_PROPERTY => { properties.read_user_property(&mut packet.user_properties)?; }
                    PROPERTY_KEY_REASON_STRING => { set_once(&mut packet.reason_string, properties.read_string()?)?; }
                    key => {
                        error!("{} - invalid property type ({})", $function_name_as_string, key);
                        return Err(SchistError::new_decoding_failure("invalid property for ack packet"));
                    }
                }
            }

            Ok(())
        }
    };
}

pub(crate) use define_ack_packet_decode_properties_function;

macro_rules! define_ack_packet_decode_function5 {
    ($function_name: ident, $mqtt_packet_type:ident, $packet_type: ident, $function_name_as_string: expr, $first_byte: expr, $reason_code_converter_function_name: ident, $decode_properties_function_name: ident) => {
        pub(crate) fn $function_name(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
            if first_byte != $first_byte {
                error!("{} - invalid first byte", $function_name_as_string);
                return Err(SchistError::new_decoding_failure("invalid first byte for ack packet"));
            }

            let mut body = ByteCursor::new(packet_body);
            let mut packet = $packet_type { ..Default::default() };

            packet.packet_id = body.read_u16()?;
            if body.is_empty() {
                /* Success is the default, so nothing to do */
                return Ok(Box::new(MqttPacket::$mqtt_packet_type(packet)));
            }

            packet.reason_code = body.read_enum($reason_code_converter_function_name)?;
            if !body.is_empty() {
                let mut properties = body.split_off_property_section(true)?;
                $decode_properties_function_name(&mut properties, &mut packet)?;
            }

            Ok(Box::new(MqttPacket::$mqtt_packet_type(packet)))
        }
    };
}

pub(crate) use define_ack_packet_decode_function5;

macro_rules! define_ack_packet_decode_function311 {
    ($function_name: ident, $mqtt_packet_type:ident, $packet_type: ident, $function_name_as_string: expr, $first_byte: expr) => {
        pub(crate) fn $function_name(first_byte: u8, packet_body: &[u8]) -> SchistResult<Box<MqttPacket>> {
            if first_byte != $first_byte {
                error!("{} - invalid first byte", $function_name_as_string);
                return Err(SchistError::new_decoding_failure("invalid first byte for ack packet"));
            }

            if packet_body.len() != 2 {
                error!("{} - invalid remaining length", $function_name_as_string);
                return Err(SchistError::new_decoding_failure("invalid remaining length for 311 ack packet"));
            }

            let packet = $packet_type {
                packet_id : ByteCursor::new(packet_body).read_u16()?,
                ..Default::default()
            };

            Ok(Box::new(MqttPacket::$mqtt_packet_type(packet)))
        }
    };
}

pub(crate) use define_ack_packet_decode_function311;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn vli_decode_single_and_multi_byte() {
        assert_eq!(DecodeVliResult::Value(0, &[][..]), decode_vli(&[0]).unwrap());
        assert_eq!(DecodeVliResult::Value(127, &[5][..]), decode_vli(&[127, 5]).unwrap());
        assert_eq!(DecodeVliResult::Value(128, &[][..]), decode_vli(&[0x80, 1]).unwrap());
        assert_eq!(DecodeVliResult::Value(16384, &[][..]), decode_vli(&[0x80, 0x80, 1]).unwrap());
    }

    #[test]
    fn vli_decode_partial_data() {
        assert_eq!(DecodeVliResult::InsufficientData, decode_vli(&[]).unwrap());
        assert_eq!(DecodeVliResult::InsufficientData, decode_vli(&[0x80]).unwrap());
        assert_eq!(DecodeVliResult::InsufficientData, decode_vli(&[0x80, 0x80, 0x80]).unwrap());
    }

    #[test]
    fn vli_decode_overlong() {
        assert_matches!(decode_vli(&[0x80, 0x80, 0x80, 0x80, 1]), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn cursor_truncation_is_a_decode_failure() {
        let mut cursor = ByteCursor::new(&[1, 2, 3]);
        assert_matches!(cursor.read_u32(), Err(SchistError::DecodingFailure(_)));

        let mut cursor = ByteCursor::new(&[0, 5, 65, 66]);
        assert_matches!(cursor.read_string(), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn cursor_rejects_invalid_boolean_byte() {
        let mut cursor = ByteCursor::new(&[2]);
        assert_matches!(cursor.read_bool(), Err(SchistError::DecodingFailure(_)));
    }

    #[test]
    fn cursor_optional_string_empty_is_absent() {
        let mut cursor = ByteCursor::new(&[0, 0, 0, 1, 97]);
        assert_eq!(None, cursor.read_optional_string().unwrap());
        assert_eq!(Some("a".to_string()), cursor.read_optional_string().unwrap());
    }

    #[test]
    fn set_once_rejects_duplicates() {
        let mut slot = None;
        set_once(&mut slot, 5u32).unwrap();
        assert_matches!(set_once(&mut slot, 6u32), Err(SchistError::DecodingFailure(_)));
        assert_eq!(Some(5), slot);
    }
}
