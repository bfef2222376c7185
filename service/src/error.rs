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

//! Error types for the gateway
//!
//! Serial and configuration failures never leave a connection: the menu
//! reports them to the user directly. What remains here concerns sockets,
//! the server lifecycle and lookups across the connection table.

use crate::types::ConnectionId;
use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway error types
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error from a socket or the listener
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No active connection with the given ID
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// Server was already started
    #[error("Server already running")]
    ServerAlreadyRunning,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Generic error with a message
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let err = GatewayError::ConnectionNotFound(ConnectionId::new(42));
        assert_eq!(err.to_string(), "Connection 42 not found");
        assert_eq!(GatewayError::ServerNotRunning.to_string(), "Server not running");
    }

    #[test]
    fn test_io_error_converts() {
        fn fail() -> Result<()> {
            Err(io::Error::from(io::ErrorKind::NotConnected))?
        }
        assert!(matches!(fail(), Err(GatewayError::Io(e)) if e.kind() == io::ErrorKind::NotConnected));
    }
}
