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

//! Core types for the gateway

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Lifetime identifier of a connection (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a connection's worker currently is (stored as atomic u8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Running the command menu
    Menu = 0,
    /// Bridging bytes between the socket and the serial device
    Pumping = 1,
    /// Worker finished, slot released
    Terminated = 2,
}

impl ConnectionState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Menu,
            1 => Self::Pumping,
            _ => Self::Terminated,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Menu => write!(f, "menu"),
            Self::Pumping => write!(f, "pumping"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Snapshot of one connection table slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    /// Slot index
    pub slot: usize,
    /// A worker currently owns the slot
    pub active: bool,
    /// The occupant holds the serial device open
    pub serial: bool,
    /// The occupant is in (or will return to) the menu
    pub menu: bool,
    /// Binary mode
    pub binary: bool,
    /// Server echo
    pub echo: bool,
    /// Keepalive emission
    pub keepalive: bool,
    /// Current or last occupant
    pub id: Option<ConnectionId>,
    /// Bytes read from the network
    pub bytes_received: u64,
    /// Bytes written to the network
    pub bytes_sent: u64,
    /// Peer of the current or last occupant
    pub peer_addr: Option<SocketAddr>,
}

impl SlotInfo {
    /// A slot that has never been used
    pub fn vacant(slot: usize) -> Self {
        Self {
            slot,
            active: false,
            serial: false,
            menu: false,
            binary: false,
            echo: false,
            keepalive: false,
            id: None,
            bytes_received: 0,
            bytes_sent: 0,
            peer_addr: None,
        }
    }
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Number of occupied slots
    pub active_connections: usize,
    /// Slot count
    pub capacity: usize,
    /// Connections admitted into a slot since start
    pub total_connections: u64,
    /// Server bind address
    pub bind_address: SocketAddr,
    /// Server uptime
    pub uptime: Duration,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GatewayServer {{ active: {}/{}, total: {}, addr: {}, uptime: {:?} }}",
            self.active_connections,
            self.capacity,
            self.total_connections,
            self.bind_address,
            self.uptime
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id() {
        let id1 = ConnectionId::new(1);
        let id2 = ConnectionId::new(2);

        assert_eq!(id1.as_u64(), 1);
        assert_ne!(id1, id2);
        assert!(id1 < id2);
        assert_eq!(id2.to_string(), "2");
    }

    #[test]
    fn test_connection_state_conversion() {
        for state in [
            ConnectionState::Menu,
            ConnectionState::Pumping,
            ConnectionState::Terminated,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ConnectionState::from_u8(200), ConnectionState::Terminated);
    }

    #[test]
    fn test_vacant_slot() {
        let info = SlotInfo::vacant(3);
        assert_eq!(info.slot, 3);
        assert!(!info.active);
        assert!(info.id.is_none());
        assert!(info.peer_addr.is_none());
    }
}
