//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Fixed-capacity connection table
//!
//! Slots are handed out round-robin starting after the most recently
//! assigned one, so a freed slot is not reused immediately while others
//! are free. A released slot keeps its last occupant for display until
//! the slot is reassigned.

use crate::connection::{Connection, NetworkWriter};
use crate::{ConnectionId, GatewayError, Result, SlotInfo};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Default)]
struct Slot {
    active: bool,
    occupant: Option<Arc<Connection>>,
}

struct Slots {
    entries: Vec<Slot>,
    last_assigned: usize,
}

/// Table of N connection slots
pub struct ConnectionTable {
    slots: Mutex<Slots>,
    next_id: AtomicU64,
}

impl ConnectionTable {
    /// Create a table with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        let entries = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            slots: Mutex::new(Slots {
                entries,
                last_assigned: capacity.saturating_sub(1),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.lock().entries.len()
    }

    /// Number of occupied slots
    pub fn active_count(&self) -> usize {
        self.lock().entries.iter().filter(|slot| slot.active).count()
    }

    /// Connections admitted since the table was created
    pub fn total_admitted(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }

    /// Claim the next free slot for a new socket
    ///
    /// Returns `None` when every slot is occupied; the writer is dropped
    /// and the caller is expected to drop the socket.
    pub(crate) fn allocate(
        &self,
        peer_addr: SocketAddr,
        writer: NetworkWriter,
        cancel: CancellationToken,
    ) -> Option<Arc<Connection>> {
        let mut slots = self.lock();
        let capacity = slots.entries.len();
        let start = slots.last_assigned;
        let index = (1..=capacity)
            .map(|offset| (start + offset) % capacity)
            .find(|&index| !slots.entries[index].active);

        let index = index?;

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let conn = Arc::new(Connection::new(id, index, peer_addr, writer, cancel));
        slots.entries[index] = Slot {
            active: true,
            occupant: Some(Arc::clone(&conn)),
        };
        slots.last_assigned = index;
        debug!(connection_id = %id, slot = index, peer = %peer_addr, "Slot assigned");
        Some(conn)
    }

    /// Mark a slot free, keeping its occupant for display
    pub(crate) fn release(&self, slot: usize, id: ConnectionId) {
        let mut slots = self.lock();
        if let Some(entry) = slots.entries.get_mut(slot) {
            if entry.occupant.as_ref().is_some_and(|conn| conn.id() == id) {
                entry.active = false;
                debug!(connection_id = %id, slot, "Slot released");
            }
        }
    }

    /// Look up an active connection by ID
    pub fn find(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.lock()
            .entries
            .iter()
            .filter(|slot| slot.active)
            .filter_map(|slot| slot.occupant.as_ref())
            .find(|conn| conn.id() == id)
            .cloned()
    }

    /// All connections currently occupying a slot
    pub fn active(&self) -> Vec<Arc<Connection>> {
        self.lock()
            .entries
            .iter()
            .filter(|slot| slot.active)
            .filter_map(|slot| slot.occupant.clone())
            .collect()
    }

    /// Close the serial device held by another connection
    ///
    /// Returns whether a device was open.
    pub fn close_serial_of(&self, id: ConnectionId) -> Result<bool> {
        let conn = self.find(id).ok_or(GatewayError::ConnectionNotFound(id))?;
        Ok(conn.close_serial())
    }

    /// One row per slot, in slot order
    pub fn rows(&self) -> Vec<SlotInfo> {
        self.lock()
            .entries
            .iter()
            .enumerate()
            .map(|(index, slot)| match &slot.occupant {
                Some(conn) => conn.info(slot.active),
                None => SlotInfo::vacant(index),
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
