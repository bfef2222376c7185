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

//! # Serialgate Telnet Option Decoder
//!
//! The subset of the Telnet protocol (RFC 854) a serial console gateway
//! needs: enough option negotiation to get echo, binary mode and keepalive
//! behaviour, plus the control functions a console user reaches for
//! (interrupt, break, are-you-there, status).
//!
//! Decoding is byte-at-a-time. [`TelnetDecoder::feed`] reports whether the
//! byte belongs to the data stream and which [`TelnetAction`], if any, the
//! byte completed. The decoder holds no I/O handles; callers apply actions
//! to their own connection state.
//!
//! ```rust
//! use serialgate_telnetcodec::{TelnetDecoder, TelnetAction, consts};
//!
//! let mut decoder = TelnetDecoder::new();
//! let input = [b'o', b'k', consts::IAC, consts::DO, consts::option::BINARY];
//! let mut data = Vec::new();
//! let mut actions = Vec::new();
//! for byte in input {
//!     let feed = decoder.feed(byte);
//!     if feed.passthrough {
//!         data.push(byte);
//!     }
//!     actions.extend(feed.action);
//! }
//! assert_eq!(data, b"ok");
//! assert_eq!(actions, vec![TelnetAction::SetBinary(true)]);
//! ```
//!
//! ## Related RFCs
//!
//! - RFC 854: Telnet Protocol Specification
//! - RFC 856: Telnet Binary Transmission
//! - RFC 857: Telnet Echo Option
//! - RFC 858: Telnet Suppress Go Ahead Option
//! - RFC 859: Telnet Status Option

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

pub mod consts;
mod decoder;
mod event;
pub mod reply;

pub use self::decoder::{DecoderState, TelnetDecoder, Verb};
pub use self::event::{Feed, TelnetAction};
