/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
A module containing the packet identifier allocator used for outbound ack-based operations.

MQTT packet identifiers live in [1, 65535] and must be unique among in-flight exchanges in a
given direction.  The allocator hands out the smallest currently-unused value, which keeps
identifiers small and stable in logs and makes leaked identifiers stand out.
 */

use crate::error::{SchistError, SchistResult};

use log::*;
use std::collections::{HashSet, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub(crate) const MAXIMUM_PACKET_ID : u16 = u16::MAX;

struct AllocatorState {

    allocated: HashSet<u16>,

    // lower bound on the smallest unallocated id; advances on acquire, retreats on release
    cursor: u16,

    // FIFO tickets for blocked acquire_wait callers
    waiters: VecDeque<u64>,
    next_ticket: u64,

    // bumped by reset(); waiters from an older epoch fail out
    epoch: u64,

    maximum_id: u16,
}

impl AllocatorState {

    fn acquire_smallest_free(&mut self) -> Option<u16> {
        if self.allocated.len() >= self.maximum_id as usize {
            return None;
        }

        let mut candidate = self.cursor;
        while self.allocated.contains(&candidate) {
            candidate += 1;
        }

        if candidate > self.maximum_id {
            return None;
        }

        self.allocated.insert(candidate);
        self.cursor = candidate.saturating_add(1);

        Some(candidate)
    }
}

/// Thread-safe allocator for MQTT packet identifiers.
///
/// Identifiers are handed out smallest-first; callers that can tolerate blocking use
/// `acquire_wait` and are served in FIFO order as identifiers free up.
pub struct PacketIdAllocator {
    state: Mutex<AllocatorState>,
    signal: Condvar,
}

impl PacketIdAllocator {

    /// Creates a new allocator spanning the full MQTT packet id space.
    pub fn new() -> Self {
        PacketIdAllocator::new_with_maximum_id(MAXIMUM_PACKET_ID)
    }

    pub(crate) fn new_with_maximum_id(maximum_id: u16) -> Self {
        assert!(maximum_id >= 1);

        PacketIdAllocator {
            state: Mutex::new(AllocatorState {
                allocated: HashSet::new(),
                cursor: 1,
                waiters: VecDeque::new(),
                next_ticket: 0,
                epoch: 0,
                maximum_id,
            }),
            signal: Condvar::new(),
        }
    }

    /// Acquires the smallest unused packet identifier without blocking.
    pub fn acquire(&self) -> SchistResult<u16> {
        let mut state = self.state.lock().unwrap();

        if let Some(id) = state.acquire_smallest_free() {
            return Ok(id);
        }

        debug!("PacketIdAllocator - id space exhausted on non-blocking acquire");
        Err(SchistError::new_packet_id_space_exhausted())
    }

    /// Acquires the smallest unused packet identifier, blocking up to `timeout` for one to
    /// become free.  Blocked callers are served in arrival order.
    pub fn acquire_wait(&self, timeout: Duration) -> SchistResult<u16> {
        let deadline = Instant::now() + timeout;

        let mut state = self.state.lock().unwrap();

        if state.waiters.is_empty() {
            if let Some(id) = state.acquire_smallest_free() {
                return Ok(id);
            }
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push_back(ticket);

        let epoch = state.epoch;

        loop {
            if state.epoch != epoch {
                return Err(SchistError::new_endpoint_closed());
            }

            if state.waiters.front() == Some(&ticket) {
                if let Some(id) = state.acquire_smallest_free() {
                    state.waiters.pop_front();
                    self.signal.notify_all();
                    return Ok(id);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                if let Some(position) = state.waiters.iter().position(|waiter| *waiter == ticket) {
                    state.waiters.remove(position);
                }
                self.signal.notify_all();

                debug!("PacketIdAllocator - acquire_wait timed out");
                return Err(SchistError::new_ack_timeout());
            }

            let (guard, _) = self.signal.wait_timeout(state, deadline - now).unwrap();
            state = guard;
        }
    }

    /// Returns a packet identifier to the free pool and wakes the eldest blocked acquirer.
    /// Releasing an id that is not currently allocated is a no-op.
    pub fn release(&self, id: u16) {
        let mut state = self.state.lock().unwrap();

        if state.allocated.remove(&id) {
            if id < state.cursor {
                state.cursor = id;
            }

            self.signal.notify_all();
        }
    }

    /// Clears all allocations and fails every blocked acquirer.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();

        state.allocated.clear();
        state.cursor = 1;
        state.epoch += 1;
        state.waiters.clear();

        self.signal.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn allocated_count(&self) -> usize {
        self.state.lock().unwrap().allocated.len()
    }
}

impl Default for PacketIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn packet_id_acquire_is_smallest_first() {
        let allocator = PacketIdAllocator::new();

        assert_eq!(1, allocator.acquire().unwrap());
        assert_eq!(2, allocator.acquire().unwrap());
        assert_eq!(3, allocator.acquire().unwrap());

        allocator.release(2);

        assert_eq!(2, allocator.acquire().unwrap());
        assert_eq!(4, allocator.acquire().unwrap());
    }

    #[test]
    fn packet_id_acquire_exhausted() {
        let allocator = PacketIdAllocator::new_with_maximum_id(3);

        assert_eq!(1, allocator.acquire().unwrap());
        assert_eq!(2, allocator.acquire().unwrap());
        assert_eq!(3, allocator.acquire().unwrap());

        assert_matches!(allocator.acquire(), Err(SchistError::PacketIdSpaceExhausted(_)));

        allocator.release(1);
        assert_eq!(1, allocator.acquire().unwrap());
    }

    #[test]
    fn packet_id_release_is_idempotent() {
        let allocator = PacketIdAllocator::new_with_maximum_id(2);

        assert_eq!(1, allocator.acquire().unwrap());

        allocator.release(1);
        allocator.release(1);
        allocator.release(40000);

        assert_eq!(0, allocator.allocated_count());

        assert_eq!(1, allocator.acquire().unwrap());
        assert_eq!(2, allocator.acquire().unwrap());
    }

    #[test]
    fn packet_id_acquire_wait_immediate_when_free() {
        let allocator = PacketIdAllocator::new();

        assert_eq!(1, allocator.acquire_wait(Duration::from_millis(50)).unwrap());
    }

    #[test]
    fn packet_id_acquire_wait_timeout() {
        let allocator = PacketIdAllocator::new_with_maximum_id(1);

        assert_eq!(1, allocator.acquire().unwrap());
        assert_matches!(allocator.acquire_wait(Duration::from_millis(20)), Err(SchistError::AckTimeout(_)));
    }

    #[test]
    fn packet_id_acquire_wait_unblocks_on_release() {
        let allocator = Arc::new(PacketIdAllocator::new_with_maximum_id(1));

        assert_eq!(1, allocator.acquire().unwrap());

        let waiter_allocator = allocator.clone();
        let waiter = thread::spawn(move || {
            waiter_allocator.acquire_wait(Duration::from_secs(10))
        });

        thread::sleep(Duration::from_millis(20));
        allocator.release(1);

        assert_eq!(1, waiter.join().unwrap().unwrap());
    }

    #[test]
    fn packet_id_acquire_wait_fifo_wakeup() {
        let allocator = Arc::new(PacketIdAllocator::new_with_maximum_id(1));

        assert_eq!(1, allocator.acquire().unwrap());

        let (grant_sender, grant_receiver) = mpsc::channel();

        let mut waiters = Vec::new();
        for waiter_index in 0..3u32 {
            let waiter_allocator = allocator.clone();
            let waiter_grant_sender = grant_sender.clone();

            waiters.push(thread::spawn(move || {
                let id = waiter_allocator.acquire_wait(Duration::from_secs(10)).unwrap();
                waiter_grant_sender.send(waiter_index).unwrap();
                waiter_allocator.release(id);
            }));

            // stagger arrival so queue order matches spawn order
            thread::sleep(Duration::from_millis(20));
        }

        allocator.release(1);

        for waiter in waiters {
            waiter.join().unwrap();
        }

        assert_eq!(0, grant_receiver.recv().unwrap());
        assert_eq!(1, grant_receiver.recv().unwrap());
        assert_eq!(2, grant_receiver.recv().unwrap());
    }

    #[test]
    fn packet_id_reset_fails_waiters_and_clears_allocations() {
        let allocator = Arc::new(PacketIdAllocator::new_with_maximum_id(1));

        assert_eq!(1, allocator.acquire().unwrap());

        let waiter_allocator = allocator.clone();
        let waiter = thread::spawn(move || {
            waiter_allocator.acquire_wait(Duration::from_secs(10))
        });

        thread::sleep(Duration::from_millis(20));
        allocator.reset();

        assert_matches!(waiter.join().unwrap(), Err(SchistError::EndpointClosed(_)));

        assert_eq!(0, allocator.allocated_count());
        assert_eq!(1, allocator.acquire().unwrap());
    }

    #[test]
    fn packet_id_concurrent_acquires_are_unique() {
        let allocator = Arc::new(PacketIdAllocator::new());

        let mut join_handles = Vec::new();
        for _ in 0..8 {
            let thread_allocator = allocator.clone();
            join_handles.push(thread::spawn(move || {
                let mut ids = Vec::new();
                for _ in 0..100 {
                    ids.push(thread_allocator.acquire().unwrap());
                }
                ids
            }));
        }

        let mut all_ids : Vec<u16> = Vec::new();
        for handle in join_handles {
            all_ids.extend(handle.join().unwrap());
        }

        let unique : HashSet<u16> = all_ids.iter().copied().collect();
        assert_eq!(all_ids.len(), unique.len());
    }
}
