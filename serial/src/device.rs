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

//! Device and opener traits

use crate::config::SerialConfig;
use crate::result::SerialResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// An open serial device.
///
/// Reads and writes may be issued concurrently from different tasks. Reads
/// wait at most the backend's read timeout and return an empty buffer when
/// nothing arrived; an empty read is not an error.
#[async_trait]
pub trait SerialDevice: Send + Sync + 'static {
    /// Device path this handle was opened on
    fn path(&self) -> &str;

    /// Read up to `max` bytes, waiting no longer than the read timeout
    async fn read(&self, max: usize) -> io::Result<Bytes>;

    /// Write every byte of `data`
    async fn write(&self, data: &[u8]) -> io::Result<()>;

    /// Hold a break condition for `hold`, then release it
    async fn send_break(&self, hold: Duration) -> io::Result<()>;
}

/// Opens serial devices from a configuration snapshot
#[async_trait]
pub trait SerialOpener: Send + Sync + 'static {
    /// Open and configure the device named by `config`
    async fn open(&self, config: &SerialConfig) -> SerialResult<Arc<dyn SerialDevice>>;
}
