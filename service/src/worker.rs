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

//! Connection worker
//!
//! One worker task owns the read half of a client socket. It alternates
//! between the command menu and a bridge session:
//!
//! ```text
//! greeting → menu ──open──→ pump (network→serial here, serial→network
//!             ↑               in a spawned reader task)
//!             └──interrupt / serial closed──┘
//! ```
//!
//! Every exit path runs `cleanup`, which releases the serial device
//! before the slot is handed back to the table.

use crate::connection::Connection;
use crate::menu::{LineEditor, Menu, MenuOutcome, PROMPT};
use crate::pump::{CookedFilter, PumpExit, spawn_serial_reader};
use crate::{ConnectionState, ConnectionTable, GatewayConfig};
use bytes::{BufMut, BytesMut};
use metrics::{counter, gauge};
use serialgate_serial::{SerialDevice, SerialOpener, SharedSerialConfig};
use serialgate_telnetcodec::consts::{LF, NUL};
use serialgate_telnetcodec::{TelnetAction, TelnetDecoder, reply};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::select;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

const BANNER: &[u8] = b"\r\nserialgate serial port gateway\r\nType 'help' for a list of commands.\r\n";

/// State shared by every connection worker
pub struct WorkerContext {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Serial settings used by the next `open`, shared by all connections
    pub serial: SharedSerialConfig,
    /// Serial backend
    pub opener: Arc<dyn SerialOpener>,
    /// Connection slots
    pub table: ConnectionTable,
}

impl WorkerContext {
    /// Build the shared state from a configuration and a serial backend
    pub fn new(config: GatewayConfig, opener: Arc<dyn SerialOpener>) -> Self {
        Self {
            serial: SharedSerialConfig::new(config.serial),
            table: ConnectionTable::new(config.max_connections),
            config,
            opener,
        }
    }
}

enum Input {
    Data,
    Idle,
    Closed,
    Stopped,
}

enum MenuExit {
    Open,
    Disconnect,
}

/// Connection worker that manages a single connection's lifecycle
pub struct ConnectionWorker<R> {
    conn: Arc<Connection>,
    reader: R,
    ctx: Arc<WorkerContext>,
    decoder: TelnetDecoder,
    editor: LineEditor,
    cooked: CookedFilter,
    /// Input read by the menu past an `open` command
    pending: BytesMut,
}

impl<R> ConnectionWorker<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Create a worker for an admitted connection
    pub fn new(conn: Arc<Connection>, reader: R, ctx: Arc<WorkerContext>) -> Self {
        let editor = LineEditor::new(ctx.config.line_limit);
        Self {
            conn,
            reader,
            ctx,
            decoder: TelnetDecoder::new(),
            editor,
            cooked: CookedFilter::new(),
            pending: BytesMut::new(),
        }
    }

    /// Run until the client disconnects, quits, or the server shuts down
    #[instrument(
        name = "connection",
        skip(self),
        fields(connection_id = %self.conn.id(), slot = self.conn.slot(), peer = %self.conn.peer_addr())
    )]
    pub async fn run(mut self) {
        debug!("Connection started");

        if self.greet().await {
            loop {
                match self.menu().await {
                    MenuExit::Open => {}
                    MenuExit::Disconnect => break,
                }
                let Some(device) = self.open_serial().await else {
                    continue;
                };
                let exit = self.pump(device).await;
                if !exit.returns_to_menu() {
                    break;
                }
                let notice: &[u8] = match exit {
                    PumpExit::Interrupted => b"\r\n[serialgate: menu]\r\n",
                    _ => b"\r\nSerial port closed.\r\n",
                };
                if !self.send_with_prompt(notice).await {
                    break;
                }
            }
        }

        self.cleanup().await;
    }

    async fn greet(&self) -> bool {
        let mut out = BytesMut::new();
        reply::greeting(&mut out);
        out.put_slice(BANNER);
        out.put_slice(PROMPT);
        self.write(&out).await
    }

    /// Read and execute command lines until `open`, `quit` or disconnect
    async fn menu(&mut self) -> MenuExit {
        self.conn.set_state(ConnectionState::Menu);
        self.conn.set_run_menu(true);
        let stop = self.conn.cancel_token();
        let mut buf = BytesMut::new();

        loop {
            match self.next_input(&mut buf, &stop).await {
                Input::Data => {}
                Input::Idle => continue,
                Input::Closed | Input::Stopped => return MenuExit::Disconnect,
            }

            let mut out = BytesMut::new();
            for (index, &byte) in buf.iter().enumerate() {
                let feed = self.decoder.feed(byte);
                if let Some(action) = feed.action {
                    if !self.write(&out).await {
                        return MenuExit::Disconnect;
                    }
                    out.clear();
                    self.apply(action).await;
                }
                if !feed.passthrough {
                    continue;
                }
                let Some(line) = self.editor.push(byte, self.conn.is_echo(), &mut out) else {
                    continue;
                };

                let mut text = String::new();
                let outcome = Menu::new(&self.ctx, &self.conn).execute(&line, &mut text);
                out.put_slice(text.as_bytes());
                match outcome {
                    MenuOutcome::Continue => out.put_slice(PROMPT),
                    MenuOutcome::Open => {
                        let mut rest = &buf[index + 1..];
                        if self.editor.ended_on_cr() && matches!(rest.first(), Some(&LF | &NUL)) {
                            rest = &rest[1..];
                            self.editor.clear();
                        }
                        self.pending.extend_from_slice(rest);
                        return if self.write(&out).await {
                            MenuExit::Open
                        } else {
                            MenuExit::Disconnect
                        };
                    }
                    MenuOutcome::Quit => {
                        self.write(&out).await;
                        return MenuExit::Disconnect;
                    }
                }
            }
            if !self.write(&out).await {
                return MenuExit::Disconnect;
            }
        }
    }

    /// Open the serial device with the current shared settings
    ///
    /// An already open device is reused. Failures are reported to this
    /// client only and leave it in the menu.
    async fn open_serial(&mut self) -> Option<Arc<dyn SerialDevice>> {
        if let Some(device) = self.conn.serial() {
            let notice = format!("Resuming {}.\r\n", device.path());
            self.write(notice.as_bytes()).await;
            return Some(device);
        }

        let config = self.ctx.serial.snapshot();
        match self.ctx.opener.open(&config).await {
            Ok(device) => {
                counter!("serialgate.serial.opens").increment(1);
                info!(path = device.path(), %config, "Serial device opened");
                self.conn.attach_serial(Arc::clone(&device));
                let notice = format!("Connected to {} ({config}).\r\n", device.path());
                self.write(notice.as_bytes()).await;
                Some(device)
            }
            Err(e) => {
                counter!("serialgate.serial.open_failures").increment(1);
                warn!(error = %e, %config, "Serial device open failed");
                let notice = format!("Cannot open serial port: {e}\r\n");
                self.send_with_prompt(notice.as_bytes()).await;
                None
            }
        }
    }

    /// Bridge the client and the serial device until the session ends
    async fn pump(&mut self, device: Arc<dyn SerialDevice>) -> PumpExit {
        let session = self.conn.begin_session();
        self.conn.set_run_menu(false);
        self.conn.set_state(ConnectionState::Pumping);

        // The menu consumed the CR of the `open` line; a trailing LF or NUL
        // must not reach the device.
        if self.editor.ended_on_cr() {
            self.cooked.expect_lf();
        } else {
            self.cooked.reset();
        }
        self.editor.clear();

        if !self.conn.has_pump() {
            let reader = spawn_serial_reader(
                Arc::clone(&self.conn),
                Arc::clone(&device),
                session.clone(),
                self.ctx.config.buffer_size,
            );
            self.conn.set_pump(reader);
        }

        info!(path = device.path(), "Bridge started");
        let exit = self.network_to_serial(&device, &session).await;

        session.cancel();
        self.conn.end_session();
        if let Some(reader) = self.conn.take_pump() {
            if let Err(e) = reader.await {
                warn!(error = %e, "Serial reader task failed");
            }
        }
        self.conn.set_run_menu(true);
        info!(?exit, "Bridge stopped");
        exit
    }

    async fn network_to_serial(
        &mut self,
        device: &Arc<dyn SerialDevice>,
        session: &CancellationToken,
    ) -> PumpExit {
        let mut buf = BytesMut::new();
        loop {
            if !self.conn.is_serial_connected() {
                return PumpExit::SerialClosed;
            }
            match self.next_input(&mut buf, session).await {
                Input::Data => {}
                Input::Idle => continue,
                Input::Closed => return PumpExit::NetworkClosed,
                Input::Stopped => return self.stop_reason(),
            }

            if self.strip_commands(&mut buf).await {
                return PumpExit::Interrupted;
            }
            if self.conn.is_binary() {
                self.cooked.finish_pending(&mut buf);
            } else {
                self.cooked.apply(&mut buf);
            }
            if buf.is_empty() {
                continue;
            }

            if let Err(e) = device.write(&buf).await {
                warn!(error = %e, "Serial write failed, closing device");
                self.conn.close_serial();
                return PumpExit::SerialClosed;
            }
            trace!(len = buf.len(), "Network to serial");
            counter!("serialgate.bytes.net_to_serial").increment(buf.len() as u64);
        }
    }

    /// Remove telnet commands from `buf` in place, applying their effects
    ///
    /// Returns true on an interrupt; the rest of the buffer is discarded.
    async fn strip_commands(&mut self, buf: &mut BytesMut) -> bool {
        let mut len = 0;
        for index in 0..buf.len() {
            let byte = buf[index];
            let feed = self.decoder.feed(byte);
            if let Some(action) = feed.action {
                self.apply(action).await;
                if self.conn.run_menu() {
                    buf.clear();
                    return true;
                }
            }
            if feed.passthrough {
                buf[len] = byte;
                len += 1;
            }
        }
        buf.truncate(len);
        false
    }

    fn stop_reason(&self) -> PumpExit {
        if self.conn.is_cancelled() {
            PumpExit::Cancelled
        } else if !self.conn.is_serial_connected() {
            PumpExit::SerialClosed
        } else if self.conn.run_menu() {
            PumpExit::Interrupted
        } else {
            PumpExit::NetworkClosed
        }
    }

    async fn apply(&self, action: TelnetAction) {
        debug!(?action, "Telnet action");
        match action {
            TelnetAction::SetEcho(on) => self.conn.set_echo(on),
            TelnetAction::SetBinary(on) => self.conn.set_binary(on),
            TelnetAction::Interrupt => self.conn.set_run_menu(true),
            TelnetAction::AreYouThere => {
                self.write(reply::ARE_YOU_THERE_REPLY).await;
            }
            TelnetAction::Break => match self.conn.serial() {
                Some(device) => {
                    if let Err(e) = device.send_break(self.ctx.config.break_duration).await {
                        warn!(error = %e, "Serial break failed");
                    }
                }
                None => debug!("Break ignored, no serial device open"),
            },
            TelnetAction::StatusRequest => {
                let mut out = BytesMut::new();
                reply::status_reply(&mut out, self.conn.is_echo(), true);
                self.write(&out).await;
            }
        }
    }

    /// Next chunk of client input, with keepalive on idle waits
    async fn next_input(&mut self, buf: &mut BytesMut, stop: &CancellationToken) -> Input {
        if !self.pending.is_empty() {
            *buf = std::mem::take(&mut self.pending);
            return Input::Data;
        }

        buf.clear();
        buf.reserve(self.ctx.config.buffer_size);
        let wait = self.ctx.config.keepalive_interval;
        let read = select! {
            biased;
            _ = stop.cancelled() => return Input::Stopped,
            read = timeout(wait, self.reader.read_buf(buf)) => read,
        };

        match read {
            Err(_) => {
                self.keepalive().await;
                Input::Idle
            }
            Ok(Ok(0)) => Input::Closed,
            Ok(Ok(n)) => {
                self.conn.record_received(n);
                trace!(len = n, "Network input");
                Input::Data
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Network read failed");
                Input::Closed
            }
        }
    }

    async fn keepalive(&self) {
        if self.conn.is_keepalive() {
            let mut out = BytesMut::new();
            reply::keepalive(&mut out);
            self.write(&out).await;
        }
    }

    async fn send_with_prompt(&self, data: &[u8]) -> bool {
        let mut out = BytesMut::with_capacity(data.len() + PROMPT.len());
        out.put_slice(data);
        out.put_slice(PROMPT);
        self.write(&out).await
    }

    /// Write to the client; false if the socket is gone
    async fn write(&self, data: &[u8]) -> bool {
        match self.conn.send(data).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Network write failed");
                false
            }
        }
    }

    /// Cleanup resources
    async fn cleanup(&mut self) {
        self.conn.set_state(ConnectionState::Terminated);
        self.conn.end_session();
        if let Some(reader) = self.conn.take_pump() {
            if let Err(e) = reader.await {
                warn!(error = %e, "Serial reader task failed");
            }
        }
        self.conn.close_serial();
        self.conn.close_network().await;
        self.ctx.table.release(self.conn.slot(), self.conn.id());
        gauge!("serialgate.connections.active").decrement(1.0);
        info!(
            bytes_received = self.conn.bytes_received(),
            bytes_sent = self.conn.bytes_sent(),
            duration = ?self.conn.created_at().elapsed(),
            "Connection closed"
        );
    }
}
