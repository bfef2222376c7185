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

//! # Serialgate Serial Adapter
//!
//! Serial line configuration and device access for the gateway.
//!
//! - [`SerialConfig`] and its validated parameter types
//! - [`SharedSerialConfig`], the process-wide copy mutated by menu sessions
//! - [`SerialDevice`] / [`SerialOpener`], the seam between the connection
//!   engine and a concrete backend
//! - [`SystemSerialOpener`], backed by the `serialport` crate
//! - [`MemoryOpener`], an in-memory backend for tests

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(
    clippy::option_if_let_else,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

mod config;
mod device;
mod memory;
mod result;
mod system;

pub use self::config::{
    BaudRate, DataBits, Parity, PortNumber, SerialConfig, SharedSerialConfig, StopBits,
};
pub use self::device::{SerialDevice, SerialOpener};
pub use self::memory::{MemoryDevice, MemoryOpener};
pub use self::result::{ConfigError, SerialError, SerialResult};
pub use self::system::{SystemSerialDevice, SystemSerialOpener};
