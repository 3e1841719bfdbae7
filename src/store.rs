/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
A module containing the outbound redelivery store used to satisfy the MQTT session retransmission
requirements for QoS 1 and 2 message delivery.

The store tracks every in-flight QoS 1+ PUBLISH (and every PUBREL that follows a PUBREC) from the
moment it is written to the transport until the terminal ack arrives.  On a session-resuming
reconnect the surviving entries are replayed in their original send order.
 */

use crate::error::{SchistError, SchistResult};
use crate::mqtt::*;

use log::*;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

struct StoreEntry {
    packet: Box<MqttPacket>,

    // position in the overall outbound send order; replay is ordered by this
    send_sequence: u64,

    recorded_at: Instant,
}

/// A single replayable packet produced by draining the store.
pub(crate) struct ResendEntry {
    pub packet_id: u16,
    pub packet: Box<MqttPacket>,
}

/// Tracks unacknowledged QoS 1+ packets for retransmission on session resumption.
pub(crate) struct OutboundResendStore {
    entries: HashMap<u16, StoreEntry>,

    next_send_sequence: u64,

    // when false, entries whose recomputed message expiry has elapsed are still replayed with
    // a minimal remaining interval instead of being dropped
    drop_expired: bool,
}

impl OutboundResendStore {

    pub(crate) fn new(drop_expired: bool) -> Self {
        OutboundResendStore {
            entries: HashMap::new(),
            next_send_sequence: 0,
            drop_expired,
        }
    }

    /// Records a packet at the moment it is written to the transport.  A second record for a
    /// packet id with a live entry indicates an engine bug, not peer misbehavior.
    pub(crate) fn record(&mut self, packet_id: u16, packet: Box<MqttPacket>, now: Instant) -> SchistResult<()> {
        if self.entries.contains_key(&packet_id) {
            error!("OutboundResendStore - record invoked for packet id ({}) with a live entry", packet_id);
            return Err(SchistError::new_internal_state_error("duplicate redelivery store record for live packet id"));
        }

        let send_sequence = self.next_send_sequence;
        self.next_send_sequence += 1;

        self.entries.insert(packet_id, StoreEntry {
            packet,
            send_sequence,
            recorded_at: now,
        });

        Ok(())
    }

    /// Removes the entry for a packet id on receipt of its terminal ack.  Returns false when no
    /// entry exists, letting the caller raise the protocol violation.
    pub(crate) fn complete(&mut self, packet_id: u16) -> bool {
        self.entries.remove(&packet_id).is_some()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drains the store for replay after a session-resuming reconnect.
    ///
    /// Replay preserves the original send order.  PUBLISH entries get the duplicate flag set and
    /// their message expiry recomputed against elapsed wall time; entries whose recomputed
    /// expiry has elapsed are dropped and their ids returned separately for release.
    pub(crate) fn pending(&mut self, now: Instant) -> (VecDeque<ResendEntry>, Vec<u16>) {
        let mut live : Vec<(u16, StoreEntry)> = self.entries.drain().collect();
        live.sort_by_key(|(_, entry)| entry.send_sequence);

        let mut replay = VecDeque::with_capacity(live.len());
        let mut expired = Vec::new();

        for (packet_id, entry) in live {
            let mut packet = entry.packet;

            if let MqttPacket::Publish(publish) = packet.as_mut() {
                publish.duplicate = true;

                if let Some(expiry_seconds) = publish.message_expiry_interval_seconds {
                    let elapsed_seconds = now.saturating_duration_since(entry.recorded_at).as_secs();
                    if elapsed_seconds >= expiry_seconds as u64 {
                        if self.drop_expired {
                            debug!("OutboundResendStore - dropping expired publish with packet id ({})", packet_id);
                            expired.push(packet_id);
                            continue;
                        }

                        publish.message_expiry_interval_seconds = Some(1);
                    } else {
                        publish.message_expiry_interval_seconds = Some(expiry_seconds - elapsed_seconds as u32);
                    }
                }
            }

            replay.push_back(ResendEntry {
                packet_id,
                packet,
            });
        }

        (replay, expired)
    }

    /// Clears all entries without replay.  Invoked on clean start.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
    }
}
