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

//! Telnet option decoder
//!
//! A byte-driven state machine that strips protocol sequences out of a raw
//! stream. Every call consumes exactly the byte it is handed; multi-byte
//! sequences are reassembled from the state held between calls.

use crate::consts::{self, option};
use crate::event::{Feed, TelnetAction};
use tracing::{debug, trace, warn};

/// Option negotiation verb awaiting its option byte
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    /// WILL
    Will,
    /// WON'T
    Wont,
    /// DO
    Do,
    /// DON'T
    Dont,
}

impl Verb {
    /// Parse a verb from its command byte
    pub fn from_byte(byte: u8) -> Option<Verb> {
        match byte {
            consts::WILL => Some(Verb::Will),
            consts::WONT => Some(Verb::Wont),
            consts::DO => Some(Verb::Do),
            consts::DONT => Some(Verb::Dont),
            _ => None,
        }
    }

    /// Command byte for this verb
    pub fn to_byte(self) -> u8 {
        match self {
            Verb::Will => consts::WILL,
            Verb::Wont => consts::WONT,
            Verb::Do => consts::DO,
            Verb::Dont => consts::DONT,
        }
    }
}

/// Internal state of a [`TelnetDecoder`].
///
/// - `Idle`: ordinary data; IAC moves to `Escape`.
/// - `Escape`: IAC received, the next byte is a command.
/// - `Negotiate`: WILL/WONT/DO/DONT received, the next byte is the option.
/// - `SubnegotiateOption`: IAC SB received, the next byte is the option.
/// - `SubnegotiateBody`: collecting the body until IAC SE. Only the first
///   body byte is retained, which is all the options handled here need.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecoderState {
    /// Normal data
    #[default]
    Idle,
    /// Received IAC
    Escape,
    /// Received IAC and a negotiation verb
    Negotiate(Verb),
    /// Received IAC SB
    SubnegotiateOption,
    /// Inside a subnegotiation body
    SubnegotiateBody {
        /// Option being subnegotiated
        option: u8,
        /// First body byte, if one has arrived
        command: Option<u8>,
        /// Previous body byte was IAC
        escape: bool,
    },
}

/// Per-connection Telnet decoder.
///
/// # Example
/// ```
/// use serialgate_telnetcodec::{TelnetDecoder, TelnetAction, consts};
///
/// let mut decoder = TelnetDecoder::new();
/// assert!(decoder.feed(b'a').passthrough);
/// assert!(!decoder.feed(consts::IAC).passthrough);
/// let feed = decoder.feed(consts::IP);
/// assert_eq!(feed.action, Some(TelnetAction::Interrupt));
/// ```
#[derive(Clone, Debug, Default)]
pub struct TelnetDecoder {
    state: DecoderState,
}

impl TelnetDecoder {
    /// Create a decoder in the idle state
    pub fn new() -> TelnetDecoder {
        TelnetDecoder::default()
    }

    /// Current state
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// True when no sequence is partially decoded
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::Idle
    }

    /// Drop any partially decoded sequence
    pub fn reset(&mut self) {
        self.state = DecoderState::Idle;
    }

    /// Consume one byte.
    ///
    /// Returns whether the byte should be delivered to the application and
    /// any side effect the byte completed. `IAC IAC` yields a single
    /// passthrough `0xFF` on the second byte.
    pub fn feed(&mut self, byte: u8) -> Feed {
        let (next, feed) = step(self.state, byte);
        trace!(?next, byte, passthrough = feed.passthrough, "telnet decoder step");
        self.state = next;
        feed
    }
}

fn step(state: DecoderState, byte: u8) -> (DecoderState, Feed) {
    use DecoderState::{Escape, Idle, Negotiate, SubnegotiateBody, SubnegotiateOption};

    match (state, byte) {
        (Idle, consts::IAC) => (Escape, Feed::CONSUMED),
        (Idle, _) => (Idle, Feed::DATA),

        (Escape, consts::IAC) => (Idle, Feed::DATA),
        (Escape, consts::IP) => (Idle, Feed::action(TelnetAction::Interrupt)),
        (Escape, consts::AYT) => (Idle, Feed::action(TelnetAction::AreYouThere)),
        (Escape, consts::BRK) => (Idle, Feed::action(TelnetAction::Break)),
        (Escape, consts::SB) => (SubnegotiateOption, Feed::CONSUMED),
        (Escape, consts::WILL) => (Negotiate(Verb::Will), Feed::CONSUMED),
        (Escape, consts::WONT) => (Negotiate(Verb::Wont), Feed::CONSUMED),
        (Escape, consts::DO) => (Negotiate(Verb::Do), Feed::CONSUMED),
        (Escape, consts::DONT) => (Negotiate(Verb::Dont), Feed::CONSUMED),
        (
            Escape,
            consts::NOP | consts::DM | consts::GA | consts::AO | consts::EC | consts::EL | consts::EOR,
        ) => (Idle, Feed::CONSUMED),
        (Escape, _) => {
            debug!("Received unknown command {:#X}", byte);
            (Idle, Feed::CONSUMED)
        }

        (Negotiate(verb), _) => (Idle, negotiate(verb, byte)),

        (SubnegotiateOption, _) => (
            SubnegotiateBody {
                option: byte,
                command: None,
                escape: false,
            },
            Feed::CONSUMED,
        ),
        (
            SubnegotiateBody {
                option,
                command,
                escape: false,
            },
            consts::IAC,
        ) => (
            SubnegotiateBody {
                option,
                command,
                escape: true,
            },
            Feed::CONSUMED,
        ),
        (
            SubnegotiateBody {
                option,
                command,
                escape: false,
            },
            _,
        ) => (
            SubnegotiateBody {
                option,
                command: command.or(Some(byte)),
                escape: false,
            },
            Feed::CONSUMED,
        ),
        (
            SubnegotiateBody {
                option,
                command,
                escape: true,
            },
            consts::SE,
        ) => (Idle, subnegotiation(option, command)),
        (
            SubnegotiateBody {
                option,
                command,
                escape: true,
            },
            consts::IAC,
        ) => (
            SubnegotiateBody {
                option,
                command: command.or(Some(consts::IAC)),
                escape: false,
            },
            Feed::CONSUMED,
        ),
        (SubnegotiateBody { option, .. }, _) => {
            warn!(
                "Received unknown or invalid command {:#X} during subnegotiation of option {}. Aborting",
                byte, option
            );
            (Idle, Feed::CONSUMED)
        }
    }
}

fn negotiate(verb: Verb, opt: u8) -> Feed {
    match (verb, opt) {
        (Verb::Do, option::ECHO) => Feed::action(TelnetAction::SetEcho(true)),
        (Verb::Dont, option::ECHO) => Feed::action(TelnetAction::SetEcho(false)),
        (Verb::Do, option::BINARY) => Feed::action(TelnetAction::SetBinary(true)),
        (Verb::Dont, option::BINARY) => Feed::action(TelnetAction::SetBinary(false)),
        _ => {
            debug!(?verb, option = opt, "Ignoring option negotiation");
            Feed::CONSUMED
        }
    }
}

fn subnegotiation(opt: u8, command: Option<u8>) -> Feed {
    match (opt, command) {
        (option::STATUS, Some(option::status::SEND)) => Feed::action(TelnetAction::StatusRequest),
        _ => {
            debug!(option = opt, ?command, "Ignoring subnegotiation");
            Feed::CONSUMED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(decoder: &mut TelnetDecoder, bytes: &[u8]) -> Vec<Feed> {
        bytes.iter().map(|b| decoder.feed(*b)).collect()
    }

    #[test]
    fn plain_bytes_pass_through() {
        let mut decoder = TelnetDecoder::new();
        for feed in feed_all(&mut decoder, b"hello\r\n") {
            assert_eq!(feed, Feed::DATA);
        }
        assert!(decoder.is_idle());
    }

    #[test]
    fn escaped_iac_is_one_literal_byte() {
        let mut decoder = TelnetDecoder::new();
        let feeds = feed_all(&mut decoder, &[consts::IAC, consts::IAC]);
        assert_eq!(feeds, vec![Feed::CONSUMED, Feed::DATA]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn negotiation_holds_state_between_calls() {
        let mut decoder = TelnetDecoder::new();
        assert_eq!(decoder.feed(consts::IAC), Feed::CONSUMED);
        assert_eq!(decoder.state(), DecoderState::Escape);
        assert_eq!(decoder.feed(consts::DO), Feed::CONSUMED);
        assert_eq!(decoder.state(), DecoderState::Negotiate(Verb::Do));
        assert_eq!(
            decoder.feed(option::ECHO),
            Feed::action(TelnetAction::SetEcho(true))
        );
        assert!(decoder.is_idle());
    }

    #[test]
    fn unknown_command_is_swallowed() {
        let mut decoder = TelnetDecoder::new();
        let feeds = feed_all(&mut decoder, &[consts::IAC, 0x42, b'x']);
        assert_eq!(feeds, vec![Feed::CONSUMED, Feed::CONSUMED, Feed::DATA]);
    }

    #[test]
    fn subnegotiation_keeps_first_body_byte() {
        let mut decoder = TelnetDecoder::new();
        feed_all(&mut decoder, &[consts::IAC, consts::SB, option::STATUS, option::status::SEND]);
        assert_eq!(
            decoder.state(),
            DecoderState::SubnegotiateBody {
                option: option::STATUS,
                command: Some(option::status::SEND),
                escape: false,
            }
        );
    }

    #[test]
    fn verb_round_trips_through_byte() {
        for verb in [Verb::Will, Verb::Wont, Verb::Do, Verb::Dont] {
            assert_eq!(Verb::from_byte(verb.to_byte()), Some(verb));
        }
        assert_eq!(Verb::from_byte(consts::SB), None);
    }
}
