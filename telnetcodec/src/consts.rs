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

//! Telnet protocol byte values (RFC 854 and friends)

/// Null
pub const NUL: u8 = 0x00;
/// Backspace
pub const BS: u8 = 0x08;
/// Line Feed
pub const LF: u8 = 0x0A;
/// Carriage Return
pub const CR: u8 = 0x0D;
/// Delete
pub const DEL: u8 = 0x7F;

/// End of Record
pub const EOR: u8 = 0xEF;
/// End of Subnegotiation
pub const SE: u8 = 0xF0;
/// No Operation
pub const NOP: u8 = 0xF1;
/// Data Mark
pub const DM: u8 = 0xF2;
/// Break
pub const BRK: u8 = 0xF3;
/// Interrupt Process
pub const IP: u8 = 0xF4;
/// Abort Output
pub const AO: u8 = 0xF5;
/// Are You There
pub const AYT: u8 = 0xF6;
/// Erase Character
pub const EC: u8 = 0xF7;
/// Erase Line
pub const EL: u8 = 0xF8;
/// Go Ahead
pub const GA: u8 = 0xF9;
/// Subnegotiation Begin
pub const SB: u8 = 0xFA;
/// WILL
pub const WILL: u8 = 0xFB;
/// WON'T
pub const WONT: u8 = 0xFC;
/// DO
pub const DO: u8 = 0xFD;
/// DON'T
pub const DONT: u8 = 0xFE;
/// Interpret As Command
pub const IAC: u8 = 0xFF;

/// Option codes
pub mod option {
    /// Binary Transmission (RFC 856)
    pub const BINARY: u8 = 0x00;
    /// Echo (RFC 857)
    pub const ECHO: u8 = 0x01;
    /// Suppress Go Ahead (RFC 858)
    pub const SGA: u8 = 0x03;
    /// Status (RFC 859)
    pub const STATUS: u8 = 0x05;

    /// Status subnegotiation commands
    pub mod status {
        /// IS
        pub const IS: u8 = 0x00;
        /// SEND
        pub const SEND: u8 = 0x01;
    }
}
