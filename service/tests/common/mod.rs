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

//! Helpers shared by the gateway integration tests

#![allow(dead_code)]

use serialgate_serial::{MemoryOpener, SerialOpener};
use serialgate_service::{GatewayConfig, GatewayServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};

/// Upper bound for any single wait in these tests
pub const WAIT: Duration = Duration::from_secs(5);

/// Loopback configuration with short timers
pub fn test_config() -> GatewayConfig {
    GatewayConfig::new("127.0.0.1:0".parse().unwrap())
        .with_keepalive_interval(Duration::from_millis(200))
        .with_break_duration(Duration::from_millis(5))
        .with_shutdown_timeout(Duration::from_secs(2))
}

/// Start a gateway backed by the given opener
pub async fn start_gateway(config: GatewayConfig, opener: Arc<dyn SerialOpener>) -> GatewayServer {
    let server = GatewayServer::new(config, opener).await.unwrap();
    server.start().await.unwrap();
    server
}

/// Start a default gateway on an in-memory serial backend
pub async fn start_memory_gateway() -> (GatewayServer, MemoryOpener) {
    let opener = MemoryOpener::new();
    let server = start_gateway(test_config(), Arc::new(opener.clone())).await;
    (server, opener)
}

/// A raw telnet client
pub struct Client {
    stream: TcpStream,
    unread: Vec<u8>,
}

impl Client {
    /// Connect without waiting for the greeting
    pub async fn connect_raw(addr: SocketAddr) -> Self {
        let stream = timeout(WAIT, TcpStream::connect(addr)).await.unwrap().unwrap();
        Self {
            stream,
            unread: Vec::new(),
        }
    }

    /// Connect and consume the greeting up to the first prompt
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut client = Self::connect_raw(addr).await;
        client.expect(b"> ").await;
        client
    }

    /// Write raw bytes
    pub async fn send(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.unwrap();
    }

    /// Send a menu line and return everything up to the next prompt
    pub async fn command(&mut self, line: &str) -> String {
        self.send(format!("{line}\r\n").as_bytes()).await;
        String::from_utf8_lossy(&self.expect(b"> ").await).into_owned()
    }

    /// Read until `needle` appears; returns the output through the needle
    pub async fn expect(&mut self, needle: &[u8]) -> Vec<u8> {
        let deadline = Instant::now() + WAIT;
        loop {
            if let Some(pos) = find(&self.unread, needle) {
                let rest = self.unread.split_off(pos + needle.len());
                return std::mem::replace(&mut self.unread, rest);
            }
            let mut buf = [0u8; 1024];
            let n = match tokio::time::timeout_at(deadline, self.stream.read(&mut buf)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => panic!("read failed waiting for {:?}: {e}", String::from_utf8_lossy(needle)),
                Err(_) => panic!(
                    "timed out waiting for {:?}, got {:?}",
                    String::from_utf8_lossy(needle),
                    String::from_utf8_lossy(&self.unread)
                ),
            };
            assert!(
                n > 0,
                "connection closed waiting for {:?}, got {:?}",
                String::from_utf8_lossy(needle),
                String::from_utf8_lossy(&self.unread)
            );
            self.unread.extend_from_slice(&buf[..n]);
        }
    }

    /// True if the server closes the connection (output is discarded)
    pub async fn closed(&mut self) -> bool {
        let deadline = Instant::now() + WAIT;
        loop {
            let mut buf = [0u8; 1024];
            match tokio::time::timeout_at(deadline, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Poll `check` until it holds or the wait expires
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
