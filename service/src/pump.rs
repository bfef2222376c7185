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

//! Bridge pump pieces: cooked-mode transcoding for client input and the
//! task that copies serial output to the client.

use crate::connection::Connection;
use bytes::BytesMut;
use metrics::counter;
use serialgate_serial::SerialDevice;
use serialgate_telnetcodec::consts::{CR, LF, NUL};
use std::sync::Arc;
use tokio::select;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, trace, warn};

/// Why a pump session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The client sent an interrupt; back to the menu with the device open
    Interrupted,
    /// The serial device was closed (menu, another connection, or an I/O error)
    SerialClosed,
    /// The client went away
    NetworkClosed,
    /// The server is shutting down
    Cancelled,
}

impl PumpExit {
    /// True when the worker should return to the menu
    pub fn returns_to_menu(self) -> bool {
        matches!(self, PumpExit::Interrupted | PumpExit::SerialClosed)
    }
}

/// Collapses `CR NUL` and `CR LF` into a bare `CR`
///
/// Telnet clients send one of those pairs for the Return key; serial
/// consoles expect CR alone. The pending-CR bit survives between reads.
#[derive(Debug, Default, Clone)]
pub struct CookedFilter {
    pending_cr: bool,
}

impl CookedFilter {
    /// Create a filter with no pending CR
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget a CR seen at the end of the previous buffer
    pub fn reset(&mut self) {
        self.pending_cr = false;
    }

    /// Treat the stream as if a CR had just been seen
    pub fn expect_lf(&mut self) {
        self.pending_cr = true;
    }

    /// Drop an LF or NUL that completes a pending CR, then forget the CR
    ///
    /// Binary mode rewrites nothing else. An empty buffer keeps the CR
    /// pending.
    pub fn finish_pending(&mut self, buf: &mut BytesMut) {
        if buf.is_empty() {
            return;
        }
        if std::mem::take(&mut self.pending_cr) && matches!(buf.first(), Some(&LF | &NUL)) {
            let _ = buf.split_to(1);
        }
    }

    /// Rewrite `buf` in place
    pub fn apply(&mut self, buf: &mut BytesMut) {
        let mut len = 0;
        for read in 0..buf.len() {
            let byte = buf[read];
            if self.pending_cr && (byte == LF || byte == NUL) {
                self.pending_cr = false;
                continue;
            }
            self.pending_cr = byte == CR;
            buf[len] = byte;
            len += 1;
        }
        buf.truncate(len);
    }
}

/// Spawn the serial→network half of a pump session
///
/// Device output is written to the client verbatim. The task ends when
/// the session is cancelled, the device is closed or fails, or the
/// client write fails. A write blocked on a client that stopped reading
/// is abandoned on cancellation. Reads are never abandoned mid-flight, so
/// once the task has been joined no read holds the device.
pub(crate) fn spawn_serial_reader(
    conn: Arc<Connection>,
    device: Arc<dyn SerialDevice>,
    session: CancellationToken,
    chunk: usize,
) -> JoinHandle<()> {
    let span = info_span!("serial_reader", connection_id = %conn.id(), path = device.path());
    tokio::spawn(
        async move {
            while !session.is_cancelled() && conn.is_serial_connected() {
                let data = match device.read(chunk).await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(error = %e, "Serial read failed, closing device");
                        conn.close_serial();
                        break;
                    }
                };
                if data.is_empty() {
                    continue;
                }
                trace!(len = data.len(), "Serial to network");
                let sent = select! {
                    biased;
                    _ = session.cancelled() => break,
                    sent = conn.send(&data) => sent,
                };
                if let Err(e) = sent {
                    debug!(error = %e, "Network write failed, ending session");
                    session.cancel();
                    break;
                }
                counter!("serialgate.bytes.serial_to_net").increment(data.len() as u64);
            }
            debug!("Serial reader stopped");
        }
        .instrument(span),
    )
}
