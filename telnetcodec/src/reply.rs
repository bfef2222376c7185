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

//! Encoders for the few sequences the gateway sends itself

use crate::consts::{self, option};
use crate::decoder::Verb;
use bytes::{BufMut, BytesMut};

/// Text sent back in answer to `IAC AYT`
pub const ARE_YOU_THERE_REPLY: &[u8] = b"\r\n[serialgate: yes]\r\n";

/// Append `IAC <verb> <option>`
pub fn negotiate(dst: &mut BytesMut, verb: Verb, opt: u8) {
    dst.reserve(3);
    dst.put_u8(consts::IAC);
    dst.put_u8(verb.to_byte());
    dst.put_u8(opt);
}

/// Append the negotiation the server opens every session with.
///
/// Offering to echo and to suppress go-ahead puts well-behaved clients
/// into character-at-a-time mode; their `DO ECHO` reply enables echo.
pub fn greeting(dst: &mut BytesMut) {
    negotiate(dst, Verb::Will, option::ECHO);
    negotiate(dst, Verb::Will, option::SGA);
}

/// Append the keepalive no-op `IAC NOP`
pub fn keepalive(dst: &mut BytesMut) {
    dst.reserve(2);
    dst.put_u8(consts::IAC);
    dst.put_u8(consts::NOP);
}

/// Append `IAC SB STATUS IS <echo> <sga> IAC SE` (RFC 859)
pub fn status_reply(dst: &mut BytesMut, echo: bool, sga: bool) {
    let will = |enabled: bool| if enabled { consts::WILL } else { consts::WONT };
    dst.reserve(10);
    dst.put_slice(&[consts::IAC, consts::SB, option::STATUS, option::status::IS]);
    dst.put_slice(&[will(echo), option::ECHO]);
    dst.put_slice(&[will(sga), option::SGA]);
    dst.put_slice(&[consts::IAC, consts::SE]);
}
