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

//! Per-connection record shared by a worker, its serial reader and the menu
//! commands of other connections.

use crate::{ConnectionId, ConnectionState, Result, SlotInfo};
use metrics::counter;
use serialgate_serial::SerialDevice;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

/// Write half of a client socket
pub type NetworkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One connection occupying a table slot
///
/// Flags are atomics so the menu of any connection can inspect them
/// without coordinating with the owning worker. The network writer sits
/// behind an async mutex because both the worker and the serial reader
/// task write to the socket.
pub struct Connection {
    // Metadata
    id: ConnectionId,
    slot: usize,
    peer_addr: SocketAddr,
    created_at: Instant,

    // Flags
    echo: AtomicBool,
    binary: AtomicBool,
    keepalive: AtomicBool,
    run_menu: AtomicBool,
    state: AtomicU8,

    // Serial device
    serial: Mutex<Option<Arc<dyn SerialDevice>>>,
    serial_connected: AtomicBool,

    // Counters
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,

    // Network output and task control
    writer: tokio::sync::Mutex<Option<NetworkWriter>>,
    cancel: CancellationToken,
    session: Mutex<Option<CancellationToken>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Create the record for a freshly admitted socket
    pub(crate) fn new(
        id: ConnectionId,
        slot: usize,
        peer_addr: SocketAddr,
        writer: NetworkWriter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            slot,
            peer_addr,
            created_at: Instant::now(),
            echo: AtomicBool::new(false),
            binary: AtomicBool::new(false),
            keepalive: AtomicBool::new(false),
            run_menu: AtomicBool::new(true),
            state: AtomicU8::new(ConnectionState::Menu.as_u8()),
            serial: Mutex::new(None),
            serial_connected: AtomicBool::new(false),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            writer: tokio::sync::Mutex::new(Some(writer)),
            cancel,
            session: Mutex::new(None),
            pump: Mutex::new(None),
        }
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the slot index
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get when the connection was admitted
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Get the worker state
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Server echo of menu input
    pub fn is_echo(&self) -> bool {
        self.echo.load(Ordering::Acquire)
    }

    pub(crate) fn set_echo(&self, on: bool) {
        self.echo.store(on, Ordering::Release);
    }

    /// Binary mode (no CR transcoding towards the serial device)
    pub fn is_binary(&self) -> bool {
        self.binary.load(Ordering::Acquire)
    }

    pub(crate) fn set_binary(&self, on: bool) {
        self.binary.store(on, Ordering::Release);
    }

    /// Flip binary mode, returning the new value
    pub(crate) fn toggle_binary(&self) -> bool {
        !self.binary.fetch_xor(true, Ordering::AcqRel)
    }

    /// Keepalive NOP emission
    pub fn is_keepalive(&self) -> bool {
        self.keepalive.load(Ordering::Acquire)
    }

    /// Flip keepalive, returning the new value
    pub(crate) fn toggle_keepalive(&self) -> bool {
        !self.keepalive.fetch_xor(true, Ordering::AcqRel)
    }

    /// True while the worker runs (or should return to) the menu
    pub fn run_menu(&self) -> bool {
        self.run_menu.load(Ordering::Acquire)
    }

    pub(crate) fn set_run_menu(&self, on: bool) {
        self.run_menu.store(on, Ordering::Release);
    }

    /// True while the serial device is held open
    pub fn is_serial_connected(&self) -> bool {
        self.serial_connected.load(Ordering::Acquire)
    }

    /// The open serial device, if any
    pub(crate) fn serial(&self) -> Option<Arc<dyn SerialDevice>> {
        lock(&self.serial).clone()
    }

    /// Path of the open serial device, if any
    pub fn serial_path(&self) -> Option<String> {
        lock(&self.serial).as_ref().map(|device| device.path().to_string())
    }

    pub(crate) fn attach_serial(&self, device: Arc<dyn SerialDevice>) {
        *lock(&self.serial) = Some(device);
        self.serial_connected.store(true, Ordering::Release);
    }

    /// Close the serial device and stop the current pump session
    ///
    /// Safe to call from any connection. The device is released once the
    /// pump tasks holding it have observed the cancellation. Returns false
    /// if no device was open.
    #[instrument(skip(self), fields(connection_id = %self.id))]
    pub fn close_serial(&self) -> bool {
        self.serial_connected.store(false, Ordering::Release);
        let device = lock(&self.serial).take();
        if let Some(session) = lock(&self.session).as_ref() {
            session.cancel();
        }
        match device {
            Some(device) => {
                info!(path = device.path(), "Serial device closed");
                true
            }
            None => false,
        }
    }

    /// Start a pump session tied to this connection's lifetime
    pub(crate) fn begin_session(&self) -> CancellationToken {
        let session = self.cancel.child_token();
        *lock(&self.session) = Some(session.clone());
        session
    }

    /// Cancel and forget the current pump session
    pub(crate) fn end_session(&self) {
        if let Some(session) = lock(&self.session).take() {
            session.cancel();
        }
    }

    pub(crate) fn has_pump(&self) -> bool {
        lock(&self.pump).is_some()
    }

    pub(crate) fn set_pump(&self, handle: JoinHandle<()>) {
        *lock(&self.pump) = Some(handle);
    }

    pub(crate) fn take_pump(&self) -> Option<JoinHandle<()>> {
        lock(&self.pump).take()
    }

    /// Stop everything this connection is doing
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True once the connection has been told to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the connection is told to stop
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Get bytes sent to the network
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Get bytes received from the network
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub(crate) fn record_received(&self, n: usize) {
        self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Write bytes to the client unmodified
    ///
    /// Gives up as soon as the connection is told to stop, even if the
    /// client stopped reading.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        select! {
            biased;
            _ = self.cancelled() => Err(io::Error::from(io::ErrorKind::ConnectionAborted).into()),
            sent = self.write_all(data) => sent,
        }
    }

    async fn write_all(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected).into());
        };
        writer.write_all(data).await?;
        writer.flush().await?;
        self.bytes_sent.fetch_add(data.len() as u64, Ordering::Relaxed);
        trace!(connection_id = %self.id, len = data.len(), "Sent to network");
        Ok(())
    }

    /// Shut down and drop the network writer
    pub(crate) async fn close_network(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(connection_id = %self.id, error = %e, "Socket shutdown failed");
            }
            counter!("serialgate.connections.closed").increment(1);
        }
    }

    /// Snapshot for the connection table display
    pub fn info(&self, active: bool) -> SlotInfo {
        SlotInfo {
            slot: self.slot,
            active,
            serial: self.is_serial_connected(),
            menu: self.run_menu(),
            binary: self.is_binary(),
            echo: self.is_echo(),
            keepalive: self.is_keepalive(),
            id: Some(self.id),
            bytes_received: self.bytes_received(),
            bytes_sent: self.bytes_sent(),
            peer_addr: Some(self.peer_addr),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .field("serial_connected", &self.is_serial_connected())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serialgate_serial::{MemoryOpener, SerialConfig, SerialOpener};
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tracing_test::traced_test;

    pub(crate) fn test_connection(id: u64, slot: usize) -> (Arc<Connection>, DuplexStream) {
        let (near, far) = tokio::io::duplex(4096);
        let conn = Connection::new(
            ConnectionId::new(id),
            slot,
            "127.0.0.1:4000".parse().unwrap(),
            Box::new(near),
            CancellationToken::new(),
        );
        (Arc::new(conn), far)
    }

    #[test]
    fn test_initial_flags() {
        let (conn, _far) = test_connection(1, 0);
        assert!(conn.run_menu());
        assert!(!conn.is_echo());
        assert!(!conn.is_binary());
        assert!(!conn.is_keepalive());
        assert!(!conn.is_serial_connected());
        assert_eq!(conn.state(), ConnectionState::Menu);
    }

    #[test]
    fn test_toggles_return_new_value() {
        let (conn, _far) = test_connection(1, 0);
        assert!(conn.toggle_keepalive());
        assert!(conn.is_keepalive());
        assert!(!conn.toggle_keepalive());
        assert!(conn.toggle_binary());
        assert!(!conn.toggle_binary());
    }

    #[tokio::test]
    async fn test_send_counts_bytes() {
        let (conn, mut far) = test_connection(1, 0);
        conn.send(b"hello").await.unwrap();
        assert_eq!(conn.bytes_sent(), 5);

        let mut buf = [0u8; 5];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (conn, _far) = test_connection(1, 0);
        conn.close_network().await;
        assert!(conn.send(b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_send_to_stalled_client_stops_on_shutdown() {
        let (conn, _far) = test_connection(1, 0);
        let sender = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.send(&vec![b'x'; 64 * 1024]).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!sender.is_finished());

        conn.shutdown();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), sender)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_close_serial_releases_device() {
        let opener = MemoryOpener::new();
        let (conn, _far) = test_connection(1, 0);
        let device = opener.open(&SerialConfig::default()).await.unwrap();
        conn.attach_serial(device);
        let session = conn.begin_session();

        assert!(conn.is_serial_connected());
        assert!(opener.is_held(1));

        assert!(conn.close_serial());
        assert!(!conn.is_serial_connected());
        assert!(session.is_cancelled());
        assert!(!opener.is_held(1));
        assert!(!conn.close_serial());
        assert!(logs_contain("Serial device closed"));
    }

    #[test]
    fn test_session_is_child_of_connection() {
        let (conn, _far) = test_connection(1, 0);
        let session = conn.begin_session();
        conn.shutdown();
        assert!(session.is_cancelled());
        assert!(conn.is_cancelled());
    }
}
