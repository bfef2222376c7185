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

//! In-memory serial devices
//!
//! A stand-in backend for exercising the gateway without hardware. Each
//! port can be held open by one handle at a time, like a real device opened
//! for exclusive access. Tests inject device output, inspect what was
//! written and count break pulses.

use crate::config::SerialConfig;
use crate::device::{SerialDevice, SerialOpener};
use crate::result::{SerialError, SerialResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep, timeout};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct OpenerState {
    opened: Vec<(SerialConfig, Arc<MemoryDevice>)>,
    leases: HashMap<u8, Weak<()>>,
    missing: HashSet<u8>,
}

/// Opener for [`MemoryDevice`]s
#[derive(Clone)]
pub struct MemoryOpener {
    read_timeout: Duration,
    state: Arc<Mutex<OpenerState>>,
}

impl Default for MemoryOpener {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(20),
            state: Arc::default(),
        }
    }
}

impl MemoryOpener {
    /// Create an opener where every port exists
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bounded wait applied to every read
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Make `port` behave as if it did not exist
    pub fn remove_port(&self, port: u8) {
        lock(&self.state).missing.insert(port);
    }

    /// Every configuration that was successfully opened, oldest first
    pub fn opened_configs(&self) -> Vec<SerialConfig> {
        lock(&self.state)
            .opened
            .iter()
            .map(|(config, _)| *config)
            .collect()
    }

    /// The most recently opened device for `port`
    pub fn device(&self, port: u8) -> Option<Arc<MemoryDevice>> {
        lock(&self.state)
            .opened
            .iter()
            .rev()
            .find(|(config, _)| config.port.get() == port)
            .map(|(_, device)| Arc::clone(device))
    }

    /// True while some handle holds `port` open
    pub fn is_held(&self, port: u8) -> bool {
        lock(&self.state)
            .leases
            .get(&port)
            .is_some_and(|lease| lease.strong_count() > 0)
    }

    /// Wait until `port` has been opened `count` times
    pub async fn wait_opened(&self, port: u8, count: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        loop {
            let opened = lock(&self.state)
                .opened
                .iter()
                .filter(|(config, _)| config.port.get() == port)
                .count();
            if opened >= count {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl SerialOpener for MemoryOpener {
    async fn open(&self, config: &SerialConfig) -> SerialResult<Arc<dyn SerialDevice>> {
        let port = config.port.get();
        let path = config.device_path(Some("mem{n}"));
        let mut state = lock(&self.state);
        if state.missing.contains(&port) {
            return Err(SerialError::Open {
                path,
                reason: "no such device".to_string(),
            });
        }
        if state
            .leases
            .get(&port)
            .is_some_and(|lease| lease.strong_count() > 0)
        {
            return Err(SerialError::Open {
                path,
                reason: "device is busy".to_string(),
            });
        }

        let lease = Arc::new(());
        state.leases.insert(port, Arc::downgrade(&lease));
        let device = Arc::new(MemoryDevice::new(path, self.read_timeout));
        state.opened.push((*config, Arc::clone(&device)));
        Ok(Arc::new(MemoryHandle {
            device,
            _lease: lease,
        }))
    }
}

/// Shared state of one in-memory port
pub struct MemoryDevice {
    path: String,
    read_timeout: Duration,
    input: Mutex<VecDeque<u8>>,
    input_ready: Notify,
    written: Mutex<Vec<u8>>,
    breaks: AtomicUsize,
}

impl MemoryDevice {
    fn new(path: String, read_timeout: Duration) -> Self {
        Self {
            path,
            read_timeout,
            input: Mutex::default(),
            input_ready: Notify::new(),
            written: Mutex::default(),
            breaks: AtomicUsize::new(0),
        }
    }

    /// Queue bytes as if the attached equipment had sent them
    pub fn inject(&self, data: &[u8]) {
        lock(&self.input).extend(data.iter().copied());
        self.input_ready.notify_one();
    }

    /// Everything written to the device so far
    pub fn written(&self) -> Vec<u8> {
        lock(&self.written).clone()
    }

    /// Wait until at least `len` bytes were written, returning them
    pub async fn wait_written(&self, len: usize, within: Duration) -> Vec<u8> {
        let deadline = Instant::now() + within;
        loop {
            let written = self.written();
            if written.len() >= len || Instant::now() >= deadline {
                return written;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }

    /// Number of break pulses sent
    pub fn break_count(&self) -> usize {
        self.breaks.load(Ordering::SeqCst)
    }

    fn drain(&self, max: usize) -> Bytes {
        let mut input = lock(&self.input);
        let n = max.min(input.len());
        input.drain(..n).collect::<Vec<u8>>().into()
    }
}

struct MemoryHandle {
    device: Arc<MemoryDevice>,
    _lease: Arc<()>,
}

#[async_trait]
impl SerialDevice for MemoryHandle {
    fn path(&self) -> &str {
        &self.device.path
    }

    async fn read(&self, max: usize) -> io::Result<Bytes> {
        let data = self.device.drain(max);
        if !data.is_empty() {
            return Ok(data);
        }
        let _ = timeout(self.device.read_timeout, self.device.input_ready.notified()).await;
        Ok(self.device.drain(max))
    }

    async fn write(&self, data: &[u8]) -> io::Result<()> {
        lock(&self.device.written).extend_from_slice(data);
        Ok(())
    }

    async fn send_break(&self, hold: Duration) -> io::Result<()> {
        sleep(hold).await;
        self.device.breaks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortNumber;

    fn config(port: u8) -> SerialConfig {
        SerialConfig::default().with_port(PortNumber::new(port).unwrap())
    }

    #[tokio::test]
    async fn second_open_of_held_port_fails() {
        let opener = MemoryOpener::new();
        let first = opener.open(&config(2)).await.ok().unwrap();
        assert!(opener.is_held(2));
        let err = opener.open(&config(2)).await.err().unwrap();
        assert!(err.to_string().contains("busy"));

        drop(first);
        assert!(!opener.is_held(2));
        assert!(opener.open(&config(2)).await.is_ok());
    }

    #[tokio::test]
    async fn removed_port_does_not_exist() {
        let opener = MemoryOpener::new();
        opener.remove_port(5);
        assert!(opener.open(&config(5)).await.err().unwrap().is_unavailable());
    }

    #[tokio::test]
    async fn read_times_out_empty_then_delivers_injected_bytes() {
        let opener = MemoryOpener::new();
        let handle = opener.open(&config(1)).await.ok().unwrap();
        assert!(handle.read(64).await.unwrap().is_empty());

        opener.device(1).unwrap().inject(b"login: ");
        assert_eq!(&handle.read(64).await.unwrap()[..], b"login: ");
    }

    #[tokio::test]
    async fn writes_and_breaks_are_recorded() {
        let opener = MemoryOpener::new();
        let handle = opener.open(&config(1)).await.ok().unwrap();
        handle.write(b"ab").await.unwrap();
        handle.write(b"c").await.unwrap();
        handle.send_break(Duration::from_millis(1)).await.unwrap();

        let device = opener.device(1).unwrap();
        assert_eq!(device.written(), b"abc");
        assert_eq!(device.break_count(), 1);
    }
}
