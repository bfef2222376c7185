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

//! Robustness tests: hostile or malformed client input and failing devices

mod common;

use async_trait::async_trait;
use bytes::Bytes;
use common::{Client, WAIT, eventually, start_gateway, start_memory_gateway, test_config};
use serialgate_serial::{SerialConfig, SerialDevice, SerialError, SerialOpener, SerialResult};
use serialgate_telnetcodec::consts::{DO, IAC, SB, SE, WILL, option};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Device whose writes fail once `broken` is set
struct FlakyDevice {
    broken: Arc<AtomicBool>,
}

#[async_trait]
impl SerialDevice for FlakyDevice {
    fn path(&self) -> &str {
        "flaky0"
    }

    async fn read(&self, _max: usize) -> io::Result<Bytes> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(Bytes::new())
    }

    async fn write(&self, _data: &[u8]) -> io::Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable unplugged"))
        } else {
            Ok(())
        }
    }

    async fn send_break(&self, _hold: Duration) -> io::Result<()> {
        Ok(())
    }
}

struct FlakyOpener {
    broken: Arc<AtomicBool>,
}

#[async_trait]
impl SerialOpener for FlakyOpener {
    async fn open(&self, config: &SerialConfig) -> SerialResult<Arc<dyn SerialDevice>> {
        if config.port.get() != 1 {
            return Err(SerialError::Open {
                path: format!("flaky{}", config.port),
                reason: "no such device".into(),
            });
        }
        Ok(Arc::new(FlakyDevice {
            broken: Arc::clone(&self.broken),
        }))
    }
}

#[tokio::test]
async fn test_serial_write_failure_returns_to_menu() {
    let broken = Arc::new(AtomicBool::new(false));
    let opener = FlakyOpener {
        broken: Arc::clone(&broken),
    };
    let server = start_gateway(test_config(), Arc::new(opener)).await;
    let mut client = Client::connect(server.local_addr()).await;

    client.send(b"open\r\n").await;
    client.expect(b"Connected to flaky0").await;

    broken.store(true, Ordering::SeqCst);
    client.send(b"data").await;
    client.expect(b"Serial port closed.\r\n> ").await;

    let status = client.command("status").await;
    assert!(status.contains("Device:     closed"), "{status}");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_extremely_long_line_is_truncated() {
    let (server, _opener) = start_memory_gateway().await;
    let mut client = Client::connect(server.local_addr()).await;

    let line = "x".repeat(10_000);
    let reply = client.command(&line).await;
    let echoed = reply
        .trim_start_matches("Unknown command: ")
        .split("\r\n")
        .next()
        .unwrap();
    assert_eq!(echoed.len(), 128);

    assert!(client.command("status").await.contains("Serial:"));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_control_and_high_bytes_ignored_in_menu() {
    let (server, _opener) = start_memory_gateway().await;
    let mut client = Client::connect(server.local_addr()).await;

    client.send(b"st\x01a\x1b\x80t\xfeus\r\n").await;
    let reply = String::from_utf8_lossy(&client.expect(b"> ").await).into_owned();
    assert!(reply.contains("Serial:"), "{reply}");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_negotiation_is_ignored() {
    let (server, _opener) = start_memory_gateway().await;
    let mut client = Client::connect(server.local_addr()).await;

    // WILL from the client and options the gateway does not implement
    client.send(&[IAC, WILL, option::ECHO, IAC, DO, 24, IAC, 0x42]).await;
    client.send(&[IAC, SB, 24, 1, 2, 3, IAC, SE]).await;
    let status = client.command("status").await;
    assert!(status.contains("echo=off"), "{status}");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_aborted_subnegotiation_recovers() {
    let (server, _opener) = start_memory_gateway().await;
    let mut client = Client::connect(server.local_addr()).await;

    // IAC followed by a data byte inside SB aborts it
    client.send(&[IAC, SB, option::STATUS, IAC, b'x']).await;
    assert!(client.command("status").await.contains("Serial:"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_escaped_iac_flood_reaches_device_halved() {
    let (server, opener) = start_memory_gateway().await;
    let mut client = Client::connect(server.local_addr()).await;

    client.send(b"binary\r\n").await;
    client.expect(b"> ").await;
    client.send(b"open\r\n").await;
    client.expect(b"Connected to").await;

    let flood = vec![IAC; 8192];
    client.send(&flood).await;
    let device = opener.device(1).unwrap();
    let written = device.wait_written(4096, WAIT).await;
    assert_eq!(written.len(), 4096);
    assert!(written.iter().all(|&b| b == IAC));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connection_spam() {
    let (server, _opener) = start_memory_gateway().await;
    let addr = server.local_addr();

    for _ in 0..32 {
        let client = Client::connect_raw(addr).await;
        drop(client);
    }

    assert!(eventually(|| server.connection_count() == 0).await);
    let mut client = Client::connect(addr).await;
    assert!(client.command("status").await.contains("Serial:"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_parameters_keep_previous_values() {
    let (server, _opener) = start_memory_gateway().await;
    let mut client = Client::connect(server.local_addr()).await;

    for (line, message) in [
        ("port 0", "invalid port number '0'"),
        ("port 17", "invalid port number '17'"),
        ("speed 0", "invalid speed '0'"),
        ("speed fast", "invalid speed 'fast'"),
        ("data 4", "invalid data bits '4'"),
        ("parity sometimes", "invalid parity 'sometimes'"),
        ("stop 3", "invalid stop bits '3'"),
    ] {
        let reply = client.command(line).await;
        assert!(reply.contains(message), "{line}: {reply}");
    }

    assert_eq!(server.serial_config().snapshot(), SerialConfig::default());
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stalled_client_does_not_pin_device() {
    let (server, opener) = start_memory_gateway().await;
    let mut stalled = Client::connect(server.local_addr()).await;
    let mut other = Client::connect(server.local_addr()).await;

    stalled.send(b"open\r\n").await;
    stalled.expect(b"Connected to mem1").await;

    // More output than the socket buffers hold; the client never reads it
    opener.device(1).unwrap().inject(&vec![b'#'; 16 * 1024 * 1024]);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(
        other
            .command("kill_conn 1")
            .await
            .contains("Closed serial port of connection 1.")
    );
    assert!(eventually(|| !opener.is_held(1)).await);

    other.send(b"open\r\n").await;
    other.expect(b"Connected to mem1").await;

    let started = Instant::now();
    server.shutdown().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert!(!opener.is_held(1));
}
