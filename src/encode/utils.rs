/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::error::{SchistError, SchistResult};
use crate::mqtt::UserProperty;
use crate::mqtt::utils::*;

pub(crate) fn compute_user_properties_length(properties: &Option<Vec<UserProperty>>) -> usize {
    let mut total = 0;
    if let Some(props) = properties {
        let property_count = props.len();
        total += property_count * 5; // 4 bytes of length-prefix per property, 1 byte for property key
        for property in props {
            total += property.name.len();
            total += property.value.len();
        }
    }

    total
}

pub(crate) fn compute_variable_length_integer_encode_size(value: usize) -> SchistResult<usize> {
    if value < 1usize << 7 {
        Ok(1)
    } else if value < 1usize << 14 {
        Ok(2)
    } else if value < 1usize << 21 {
        Ok(3)
    } else if value < 1usize << 28 {
        Ok(4)
    } else {
        Err(SchistError::new_encoding_failure("value exceeds maximum encodable variable length integer"))
    }
}

pub(crate) fn encode_vli(value: u32, dest: &mut Vec<u8>) -> SchistResult<()> {
    if value > MAXIMUM_VARIABLE_LENGTH_INTEGER as u32 {
        return Err(SchistError::new_encoding_failure("value exceeds maximum encodable variable length integer"));
    }

    let mut done = false;
    let mut val = value;
    while !done {
        let mut byte: u8 = (val & 0x7F) as u8;
        val /= 128;

        if val != 0 {
            byte |= 128;
        }

        dest.push(byte);

        done = val == 0;
    }

    Ok(())
}

pub(crate) fn encode_u16(value: u16, dest: &mut Vec<u8>) {
    dest.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn encode_u32(value: u32, dest: &mut Vec<u8>) {
    dest.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn encode_length_prefixed_string(value: &str, dest: &mut Vec<u8>) -> SchistResult<()> {
    if value.len() > MAXIMUM_STRING_PROPERTY_LENGTH {
        return Err(SchistError::new_encoding_failure("string value exceeds maximum length-prefixable size"));
    }

    encode_u16(value.len() as u16, dest);
    dest.extend_from_slice(value.as_bytes());

    Ok(())
}

pub(crate) fn encode_length_prefixed_bytes(value: &[u8], dest: &mut Vec<u8>) -> SchistResult<()> {
    if value.len() > MAXIMUM_BINARY_PROPERTY_LENGTH {
        return Err(SchistError::new_encoding_failure("binary value exceeds maximum length-prefixable size"));
    }

    encode_u16(value.len() as u16, dest);
    dest.extend_from_slice(value);

    Ok(())
}

macro_rules! encode_optional_u8_property {
    ($dest: ident, $property_key: expr, $optional_value: expr) => {
        if let Some(val) = $optional_value {
            $dest.push($property_key);
            $dest.push(val);
        }
    };
}

pub(crate) use encode_optional_u8_property;

macro_rules! encode_optional_u16_property {
    ($dest: ident, $property_key: expr, $optional_value: expr) => {
        if let Some(val) = $optional_value {
            $dest.push($property_key);
            encode_u16(val, $dest);
        }
    };
}

pub(crate) use encode_optional_u16_property;

macro_rules! encode_optional_u32_property {
    ($dest: ident, $property_key: expr, $optional_value: expr) => {
        if let Some(val) = $optional_value {
            $dest.push($property_key);
            encode_u32(val, $dest);
        }
    };
}

pub(crate) use encode_optional_u32_property;

macro_rules! encode_optional_enum_property {
    ($dest: ident, $property_key: expr, $optional_value: expr) => {
        if let Some(val) = $optional_value {
            $dest.push($property_key);
            $dest.push(val as u8);
        }
    };
}

pub(crate) use encode_optional_enum_property;

macro_rules! encode_optional_boolean_property {
    ($dest: ident, $property_key: expr, $optional_value: expr) => {
        if let Some(val) = $optional_value {
            $dest.push($property_key);
            $dest.push(if val { 1u8 } else { 0u8 });
        }
    };
}

pub(crate) use encode_optional_boolean_property;

macro_rules! encode_optional_string_property {
    ($dest: ident, $property_key: expr, $optional_value: expr) => {
        if let Some(val) = &$optional_value {
            $dest.push($property_key);
            encode_length_prefixed_string(val, $dest)?;
        }
    };
}

pub(crate) use encode_optional_string_property;

macro_rules! encode_optional_bytes_property {
    ($dest: ident, $property_key: expr, $optional_value: expr) => {
        if let Some(val) = &$optional_value {
            $dest.push($property_key);
            encode_length_prefixed_bytes(val, $dest)?;
        }
    };
}

pub(crate) use encode_optional_bytes_property;

macro_rules! encode_user_properties {
    ($dest: ident, $properties_ref: expr) => {
        if let Some(properties) = &$properties_ref {
            for user_property in properties.iter() {
                $dest.push(PROPERTY_KEY_USER_PROPERTY);
                encode_length_prefixed_string(&user_property.name, $dest)?;
                encode_length_prefixed_string(&user_property.value, $dest)?;
            }
        }
    };
}

pub(crate) use encode_user_properties;

macro_rules! add_optional_u8_property_length {
    ($target: ident, $optional_value: expr) => {
        if $optional_value.is_some() {
            $target += 2;
        }
    };
}

pub(crate) use add_optional_u8_property_length;

macro_rules! add_optional_u16_property_length {
    ($target: ident, $optional_value: expr) => {
        if $optional_value.is_some() {
            $target += 3;
        }
    };
}

pub(crate) use add_optional_u16_property_length;

macro_rules! add_optional_u32_property_length {
    ($target: ident, $optional_value: expr) => {
        if $optional_value.is_some() {
            $target += 5;
        }
    };
}

pub(crate) use add_optional_u32_property_length;

macro_rules! add_optional_string_property_length {
    ($target: ident, $optional_value: expr) => {
        if let Some(val) = &$optional_value {
            $target += 3 + val.len();
        }
    };
}

pub(crate) use add_optional_string_property_length;

macro_rules! add_optional_bytes_property_length {
    ($target: ident, $optional_value: expr) => {
        if let Some(val) = &$optional_value {
            $target += 3 + val.len();
        }
    };
}

pub(crate) use add_optional_bytes_property_length;

macro_rules! add_optional_string_length {
    ($target: ident, $optional_value: expr) => {
        $target += 2;
        if let Some(val) = &$optional_value {
            $target += val.len();
        }
    };
}

pub(crate) use add_optional_string_length;

macro_rules! add_optional_bytes_length {
    ($target: ident, $optional_value: expr) => {
        $target += 2;
        if let Some(val) = &$optional_value {
            $target += val.len();
        }
    };
}

pub(crate) use add_optional_bytes_length;

macro_rules! define_ack_packet_lengths_function {
    ($function_name: ident, $packet_type: ident, $reason_code_type: ident) => {
        fn $function_name(packet: &$packet_type) -> SchistResult<(u32, u32)> {
            let mut property_section_length = compute_user_properties_length(&packet.user_properties);

            add_optional_string_property_length!(property_section_length, packet.reason_string);

            if property_section_length == 0 {
                if packet.reason_code == $reason_code_type::Success {
                    return Ok((2, 0));
                } else {
                    return Ok((3, 0));
                }
            }

            Ok(((3 + property_section_length + compute_variable_length_integer_encode_size(property_section_length)?) as u32, property_section_length as u32))
        }
    };
}

pub(crate) use define_ack_packet_lengths_function;

macro_rules! define_ack_packet_encode_function5 {
    ($function_name: ident, $packet_type: ident, $reason_code_type: ident, $first_byte: expr, $length_function: ident) => {
        pub(crate) fn $function_name(packet: &$packet_type, dest: &mut Vec<u8>) -> SchistResult<()> {
            let (total_remaining_length, property_length) = $length_function(packet)?;

            dest.push($first_byte);
            encode_vli(total_remaining_length, dest)?;

            /* Variable header */
            encode_u16(packet.packet_id, dest);

            /* per spec: empty properties + success = allowed to drop the reason code */
            if packet.reason_code == $reason_code_type::Success && property_length == 0 {
                debug_assert_eq!(2, total_remaining_length);
                return Ok(());
            }

            dest.push(packet.reason_code as u8);

            /* empty properties = allowed to drop the property length vli */
            if property_length == 0 {
                debug_assert_eq!(3, total_remaining_length);
                return Ok(());
            }

            encode_vli(property_length, dest)?;
            encode_optional_string_property!(dest, PROPERTY_KEY_REASON_STRING, packet.reason_string);
            encode_user_properties!(dest, packet.user_properties);

            Ok(())
        }
    };
}

pub(crate) use define_ack_packet_encode_function5;

macro_rules! define_ack_packet_encode_function311 {
    ($function_name: ident, $packet_type: ident, $first_byte: expr) => {
        pub(crate) fn $function_name(packet: &$packet_type, dest: &mut Vec<u8>) -> SchistResult<()> {
            dest.push($first_byte);
            encode_vli(2, dest)?;
            encode_u16(packet.packet_id, dest);

            Ok(())
        }
    };
}

pub(crate) use define_ack_packet_encode_function311;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::utils::*;

    macro_rules! assert_vli_encoding_equals {
        ($target: ident, $value: expr, $expected_result: expr) => {{
            let mut $target = Vec::<u8>::with_capacity(4);
            assert!(encode_vli($value, &mut $target).is_ok());
            assert_eq!($expected_result, &$target[..]);
        }};
    }

    macro_rules! assert_vli_encoding_fails {
        ($target: ident, $value: expr) => {{
            let mut $target = Vec::<u8>::with_capacity(4);
            assert!(encode_vli($value, &mut $target).is_err());
        }};
    }

    macro_rules! assert_vli_round_trip_success {
        ($value: expr) => {{
            let mut dest = Vec::<u8>::with_capacity(4);
            assert!(encode_vli($value, &mut dest).is_ok());

            for i in 1..dest.len() {
                let insufficient_data_result = decode_vli(&dest[..i]);
                assert!(insufficient_data_result.is_ok());
                assert_eq!(
                    DecodeVliResult::InsufficientData,
                    insufficient_data_result.unwrap()
                );
            }

            let final_result = decode_vli(&dest);
            let expected_bytes =
                compute_variable_length_integer_encode_size($value as usize).unwrap();
            assert!(final_result.is_ok());
            assert_eq!(
                DecodeVliResult::Value($value, &dest[expected_bytes..]),
                final_result.unwrap()
            );
        }};
    }

    #[test]
    fn vli_round_trips() {
        assert_vli_round_trip_success!(0);
        assert_vli_round_trip_success!(1);
        assert_vli_round_trip_success!(47);
        assert_vli_round_trip_success!(127);
        assert_vli_round_trip_success!(128);
        assert_vli_round_trip_success!(129);
        assert_vli_round_trip_success!(511);
        assert_vli_round_trip_success!(8000);
        assert_vli_round_trip_success!(16383);
        assert_vli_round_trip_success!(16384);
        assert_vli_round_trip_success!(16385);
        assert_vli_round_trip_success!(100000);
        assert_vli_round_trip_success!(4200000);
        assert_vli_round_trip_success!(34200000);
        assert_vli_round_trip_success!(MAXIMUM_VARIABLE_LENGTH_INTEGER as u32);
    }

    #[test]
    fn encode_vli_successes() {
        assert_vli_encoding_equals!(dest, 0, [0u8]);
        assert_vli_encoding_equals!(dest, 1, [1u8]);
        assert_vli_encoding_equals!(dest, 127, [127u8]);
        assert_vli_encoding_equals!(dest, 128, [0x80u8, 1u8]);
        assert_vli_encoding_equals!(dest, 129, [0x81u8, 1u8]);
    }

    #[test]
    fn encode_vli_failures() {
        assert_vli_encoding_fails!(dest, MAXIMUM_VARIABLE_LENGTH_INTEGER as u32 + 1);
        assert_vli_encoding_fails!(dest, 0x80000000u32);
        assert_vli_encoding_fails!(dest, 0xFFFFFFFFu32);
    }

    #[test]
    #[rustfmt::skip]
    fn compute_vli_encoding_size_successes() {
        assert_eq!(1, compute_variable_length_integer_encode_size(0).unwrap());
        assert_eq!(1, compute_variable_length_integer_encode_size(1).unwrap());
        assert_eq!(1, compute_variable_length_integer_encode_size(127).unwrap());
        assert_eq!(2, compute_variable_length_integer_encode_size(128).unwrap());
        assert_eq!(2, compute_variable_length_integer_encode_size(256).unwrap());
        assert_eq!(2, compute_variable_length_integer_encode_size(16383).unwrap());
        assert_eq!(3, compute_variable_length_integer_encode_size(16384).unwrap());
        assert_eq!(3, compute_variable_length_integer_encode_size(16385).unwrap());
        assert_eq!(3, compute_variable_length_integer_encode_size(2097151).unwrap());
        assert_eq!(4, compute_variable_length_integer_encode_size(2097152).unwrap());
        assert_eq!(4, compute_variable_length_integer_encode_size(MAXIMUM_VARIABLE_LENGTH_INTEGER).unwrap());
    }

    #[test]
    #[rustfmt::skip]
    fn compute_vli_encoding_size_failures() {
        assert!(compute_variable_length_integer_encode_size(MAXIMUM_VARIABLE_LENGTH_INTEGER + 1).is_err());
        assert!(compute_variable_length_integer_encode_size(u32::MAX as usize).is_err());
        assert!(compute_variable_length_integer_encode_size(usize::MAX).is_err());
    }
}
