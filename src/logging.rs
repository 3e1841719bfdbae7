/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Helpers for rendering packets into the log without leaking payloads or credentials.

use crate::mqtt::*;
use crate::mqtt::utils::*;

use log::*;
use std::fmt;

/// Debug stand-in for byte fields whose contents must never reach the logs.
pub(crate) struct Redacted(pub(crate) usize);

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} bytes redacted>", self.0)
    }
}

/// Debug stand-in for bulk byte fields (payloads, correlation data) logged by size only.
pub(crate) struct Elided(pub(crate) usize);

impl fmt::Debug for Elided {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} bytes>", self.0)
    }
}

macro_rules! define_ack_packet_display_trait {
    ($packet_type: ident, $packet_type_as_string: expr) => {
        impl fmt::Display for $packet_type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                let mut s = f.debug_struct($packet_type_as_string);
                s.field("packet_id", &self.packet_id);
                s.field("reason_code", &self.reason_code);
                if let Some(reason_string) = &self.reason_string {
                    s.field("reason_string", reason_string);
                }
                if let Some(user_properties) = &self.user_properties {
                    s.field("user_properties", user_properties);
                }
                s.finish()
            }
        }
    };
}

pub(crate) use define_ack_packet_display_trait;

impl fmt::Display for MqttPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MqttPacket::Connect(packet) => { packet.fmt(f) }
            MqttPacket::Connack(packet) => { packet.fmt(f) }
            MqttPacket::Publish(packet) => { packet.fmt(f) }
            MqttPacket::Puback(packet) => { packet.fmt(f) }
            MqttPacket::Pubrec(packet) => { packet.fmt(f) }
            MqttPacket::Pubrel(packet) => { packet.fmt(f) }
            MqttPacket::Pubcomp(packet) => { packet.fmt(f) }
            MqttPacket::Subscribe(packet) => { packet.fmt(f) }
            MqttPacket::Suback(packet) => { packet.fmt(f) }
            MqttPacket::Unsubscribe(packet) => { packet.fmt(f) }
            MqttPacket::Unsuback(packet) => { packet.fmt(f) }
            MqttPacket::Pingreq(packet) => { packet.fmt(f) }
            MqttPacket::Pingresp(packet) => { packet.fmt(f) }
            MqttPacket::Disconnect(packet) => { packet.fmt(f) }
            MqttPacket::Auth(packet) => { packet.fmt(f) }
        }
    }
}

/// Logs a packet summary at info level and the full packet contents at debug level and below.
pub(crate) fn log_packet(prefix: &str, packet: &MqttPacket) {
    match log::max_level() {
        LevelFilter::Info => {
            info!("{}{}", prefix, mqtt_packet_to_packet_type(packet));
        }
        LevelFilter::Debug | LevelFilter::Trace => {
            debug!("{}{}", prefix, packet);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_fields_render_size_only() {
        assert_eq!("<12 bytes redacted>", format!("{:?}", Redacted(12)));
        assert_eq!("<256 bytes>", format!("{:?}", Elided(256)));
    }
}
