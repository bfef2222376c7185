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

//! Command menu: line editing and command dispatch

use crate::connection::Connection;
use crate::{ConnectionId, GatewayError, SlotInfo, WorkerContext};
use bytes::{BufMut, BytesMut};
use serialgate_serial::ConfigError;
use serialgate_telnetcodec::consts::{BS, CR, DEL, LF, NUL};
use std::fmt::Write;
use tracing::{debug, info};

/// Prompt sent after the banner and after every processed line
pub const PROMPT: &[u8] = b"> ";

const HELP: &str = "\
Commands:\r
  help                 show this list\r
  status               show serial settings and connection flags\r
  copyright            show license information\r
  port <1-16>          select the serial port\r
  speed <baud>         set the line speed\r
  data <5-8>           set the data bits\r
  parity <p>           no, odd, even, mark or space\r
  stop <1|1.5|2>       set the stop bits\r
  open [port]          open the serial port and start bridging\r
  close                close the serial port\r
  keepalive            toggle keepalive NOPs\r
  binary               toggle binary mode\r
  show_conn_table      list connection slots\r
  kill_conn <id>       close another connection's serial port\r
  quit                 disconnect\r
While bridging, send a telnet Interrupt Process to return here.\r
";

const COPYRIGHT: &str = "\
serialgate, a telnet to serial port gateway\r
Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.\r
Licensed under the Apache License, Version 2.0 or the MIT license.\r
";

/// Buffers one command line with minimal editing
#[derive(Debug)]
pub struct LineEditor {
    buffer: Vec<u8>,
    limit: usize,
    after_cr: bool,
}

impl LineEditor {
    /// Create an editor that keeps at most `limit` characters
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(limit),
            limit,
            after_cr: false,
        }
    }

    /// Discard any partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.after_cr = false;
    }

    /// True if the last byte fed was a CR that ended a line
    pub fn ended_on_cr(&self) -> bool {
        self.after_cr
    }

    /// Feed one data byte, appending any echo to `echo_out`
    ///
    /// Returns the completed line when the byte terminates one.
    pub fn push(&mut self, byte: u8, echo: bool, echo_out: &mut BytesMut) -> Option<String> {
        let after_cr = std::mem::replace(&mut self.after_cr, false);
        match byte {
            CR => {
                self.after_cr = true;
                Some(self.finish(echo, echo_out))
            }
            LF | NUL if after_cr => None,
            LF => Some(self.finish(echo, echo_out)),
            BS | DEL => {
                if self.buffer.pop().is_some() {
                    echo_out.put_slice(&[BS, b' ', BS]);
                }
                None
            }
            0x20..=0x7E => {
                if self.buffer.len() < self.limit {
                    self.buffer.push(byte);
                    if echo {
                        echo_out.put_u8(byte);
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn finish(&mut self, echo: bool, echo_out: &mut BytesMut) -> String {
        if echo {
            echo_out.put_slice(b"\r\n");
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        line
    }
}

/// What the worker does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    /// Stay in the menu
    Continue,
    /// Open the serial device (if needed) and start bridging
    Open,
    /// Disconnect
    Quit,
}

/// Runs one command line on behalf of a connection
pub struct Menu<'a> {
    ctx: &'a WorkerContext,
    conn: &'a Connection,
}

impl<'a> Menu<'a> {
    /// Create a menu for `conn`
    pub fn new(ctx: &'a WorkerContext, conn: &'a Connection) -> Self {
        Self { ctx, conn }
    }

    /// Execute `line`, appending the reply to `out`
    pub fn execute(&self, line: &str, out: &mut String) -> MenuOutcome {
        let line = line.trim();
        let (command, param) = match line.split_once(char::is_whitespace) {
            Some((command, param)) => (command, Some(param.trim())),
            None => (line, None),
        };
        debug!(connection_id = %self.conn.id(), command, ?param, "Menu command");

        match command.to_ascii_lowercase().as_str() {
            "" => {}
            "help" | "?" => out.push_str(HELP),
            "copyright" => out.push_str(COPYRIGHT),
            "status" => self.status(out),
            "port" => self.set(out, "port", param, |v| {
                self.ctx.serial.set_port(v).map(|p| p.to_string())
            }),
            "speed" => self.set(out, "speed", param, |v| {
                self.ctx.serial.set_speed(v).map(|s| s.to_string())
            }),
            "data" => self.set(out, "data bits", param, |v| {
                self.ctx.serial.set_data_bits(v).map(|d| d.to_string())
            }),
            "parity" => self.set(out, "parity", param, |v| {
                self.ctx.serial.set_parity(v).map(|p| p.to_string())
            }),
            "stop" => self.set(out, "stop bits", param, |v| {
                self.ctx.serial.set_stop_bits(v).map(|s| s.to_string())
            }),
            "open" => {
                if let Some(port) = param {
                    if let Err(e) = self.ctx.serial.set_port(port) {
                        let _ = write!(out, "{e}\r\n");
                        return MenuOutcome::Continue;
                    }
                }
                return MenuOutcome::Open;
            }
            "close" => {
                self.conn.set_run_menu(true);
                if self.conn.close_serial() {
                    out.push_str("Serial port closed.\r\n");
                } else {
                    out.push_str("Serial port is not open.\r\n");
                }
            }
            "keepalive" => {
                let on = self.conn.toggle_keepalive();
                let _ = write!(out, "Keepalive {}.\r\n", on_off(on));
            }
            "binary" => {
                let on = self.conn.toggle_binary();
                let _ = write!(out, "Binary mode {}.\r\n", on_off(on));
            }
            "show_conn_table" => self.show_conn_table(out),
            "kill_conn" => self.kill_conn(out, param),
            "quit" | "exit" => {
                out.push_str("Goodbye.\r\n");
                return MenuOutcome::Quit;
            }
            _ => {
                let _ = write!(out, "Unknown command: {line}\r\nType 'help' for a list of commands.\r\n");
            }
        }
        MenuOutcome::Continue
    }

    fn set<F>(&self, out: &mut String, name: &str, param: Option<&str>, apply: F)
    where
        F: FnOnce(&str) -> Result<String, ConfigError>,
    {
        let Some(value) = param else {
            let _ = write!(out, "Missing {name} value.\r\n");
            return;
        };
        match apply(value) {
            Ok(value) => {
                info!(connection_id = %self.conn.id(), setting = name, %value, "Serial setting changed");
                let _ = write!(out, "{} set to {value}.\r\n", capitalize(name));
            }
            Err(e) => {
                let _ = write!(out, "{e}\r\n");
            }
        }
    }

    fn status(&self, out: &mut String) {
        let serial = self.ctx.serial.snapshot();
        let device = match self.conn.serial_path() {
            Some(path) => format!("open ({path})"),
            None => format!("closed ({})", self.ctx.config.device_path(&serial)),
        };
        let _ = write!(
            out,
            "Serial:     {serial}\r\n\
             Device:     {device}\r\n\
             Connection: id={} slot={} echo={} binary={} keepalive={}\r\n",
            self.conn.id(),
            self.conn.slot(),
            on_off(self.conn.is_echo()),
            on_off(self.conn.is_binary()),
            on_off(self.conn.is_keepalive()),
        );
    }

    fn show_conn_table(&self, out: &mut String) {
        out.push_str(" slot active serial menu binary echo keepalive     id      net-rx      net-tx  peer\r\n");
        for row in self.ctx.table.rows() {
            render_row(out, &row, row.id == Some(self.conn.id()));
        }
    }

    fn kill_conn(&self, out: &mut String, param: Option<&str>) {
        let Some(param) = param else {
            out.push_str("Missing connection id.\r\n");
            return;
        };
        let Ok(target) = param.parse::<u64>().map(ConnectionId::new) else {
            let _ = write!(out, "Invalid connection id '{param}'.\r\n");
            return;
        };
        if target == self.conn.id() {
            out.push_str("Use 'close' to close your own serial port.\r\n");
            return;
        }
        match self.ctx.table.close_serial_of(target) {
            Ok(true) => {
                info!(connection_id = %self.conn.id(), target = %target, "Closed serial port of another connection");
                let _ = write!(out, "Closed serial port of connection {target}.\r\n");
            }
            Ok(false) => {
                let _ = write!(out, "Connection {target} has no open serial port.\r\n");
            }
            Err(GatewayError::ConnectionNotFound(_)) => {
                let _ = write!(out, "No active connection with id {target}.\r\n");
            }
            Err(e) => {
                let _ = write!(out, "{e}\r\n");
            }
        }
    }
}

fn render_row(out: &mut String, row: &SlotInfo, own: bool) {
    let mark = if own { '*' } else { ' ' };
    match (row.id, row.peer_addr) {
        (Some(id), Some(peer)) => {
            let _ = write!(
                out,
                "{mark}{:>4} {:<6} {:<6} {:<4} {:<6} {:<4} {:<9} {:>6} {:>11} {:>11}  {peer}\r\n",
                row.slot,
                yes_no(row.active),
                yes_no(row.serial),
                yes_no(row.menu),
                yes_no(row.binary),
                yes_no(row.echo),
                yes_no(row.keepalive),
                id,
                row.bytes_received,
                row.bytes_sent,
            );
        }
        _ => {
            let _ = write!(out, "{mark}{:>4} free\r\n", row.slot);
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

fn yes_no(on: bool) -> &'static str {
    if on { "yes" } else { "no" }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
