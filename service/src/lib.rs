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

//! Serialgate connection engine
//!
//! Accepts telnet clients into a fixed table of connection slots. Each
//! client gets a small command menu for choosing serial settings and,
//! after `open`, a transparent bridge to the serial device. All clients
//! share one serial configuration; the device itself can be held by one
//! connection at a time.
//!
//! # Architecture
//!
//! ```text
//! GatewayServer
//!     ↓
//! ConnectionTable (N slots, round-robin)
//!     ↓
//! ConnectionWorker ──→ Menu
//!     ↓
//! bridge pump ──→ SerialDevice
//! ```
//!
//! # Example
//!
//! ```no_run
//! use serialgate_serial::MemoryOpener;
//! use serialgate_service::{GatewayConfig, GatewayServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::new("127.0.0.1:2323".parse()?);
//!     let server = GatewayServer::new(config, Arc::new(MemoryOpener::new())).await?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

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
mod connection;
mod error;
mod menu;
mod pump;
mod server;
mod table;
mod types;
mod worker;

pub use config::GatewayConfig;
pub use connection::{Connection, NetworkWriter};
pub use error::{GatewayError, Result};
pub use menu::{LineEditor, Menu, MenuOutcome, PROMPT};
pub use pump::{CookedFilter, PumpExit};
pub use server::GatewayServer;
pub use table::ConnectionTable;
pub use types::{ConnectionId, ConnectionState, ServerSnapshot, SlotInfo};
pub use worker::{ConnectionWorker, WorkerContext};
