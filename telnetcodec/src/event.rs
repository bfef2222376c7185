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

//! Decoder output types

/// Side effect requested by a recognized Telnet sequence.
///
/// The decoder never performs these itself; the owner of the connection
/// applies them to its flags, socket or serial device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TelnetAction {
    /// `DO ECHO` (true) or `DONT ECHO` (false)
    SetEcho(bool),
    /// `DO BINARY` (true) or `DONT BINARY` (false)
    SetBinary(bool),
    /// `IAC IP`, leave the pump and return to the menu
    Interrupt,
    /// `IAC AYT`, answer with an acknowledgement string
    AreYouThere,
    /// `IAC BRK`, pulse a break condition on the serial line
    Break,
    /// `IAC SB STATUS SEND IAC SE`, reply with the negotiated state
    StatusRequest,
}

/// Result of feeding one byte to the decoder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feed {
    /// Whether the byte belongs to the application data stream
    pub passthrough: bool,
    /// Side effect completed by this byte, if any
    pub action: Option<TelnetAction>,
}

impl Feed {
    /// Plain data byte
    pub const DATA: Feed = Feed {
        passthrough: true,
        action: None,
    };

    /// Byte swallowed as part of a protocol sequence
    pub const CONSUMED: Feed = Feed {
        passthrough: false,
        action: None,
    };

    /// Byte that completed a sequence with a side effect
    pub fn action(action: TelnetAction) -> Feed {
        Feed {
            passthrough: false,
            action: Some(action),
        }
    }
}
