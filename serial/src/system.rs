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

//! Serial devices backed by the operating system
//!
//! The `serialport` crate exposes blocking handles; every call runs on the
//! blocking thread pool. Reads and writes use separate handles obtained
//! with `try_clone` so a pending read never delays a write.

use crate::config::{DataBits, Parity, SerialConfig, StopBits};
use crate::device::{SerialDevice, SerialOpener};
use crate::result::{SerialError, SerialResult};
use async_trait::async_trait;
use bytes::Bytes;
use serialport::{ClearBuffer, FlowControl, SerialPort};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Opens devices through the `serialport` crate
#[derive(Debug, Clone)]
pub struct SystemSerialOpener {
    read_timeout: Duration,
    path_template: Option<String>,
}

impl Default for SystemSerialOpener {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(50),
            path_template: None,
        }
    }
}

impl SystemSerialOpener {
    /// Create an opener with the default read timeout and device naming
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bounded wait applied to every read
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Override the device naming (see [`SerialConfig::device_path`])
    pub fn with_path_template(mut self, template: Option<String>) -> Self {
        self.path_template = template;
        self
    }
}

fn data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn parity(path: &str, parity: Parity) -> SerialResult<serialport::Parity> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Odd => Ok(serialport::Parity::Odd),
        Parity::Even => Ok(serialport::Parity::Even),
        Parity::Mark | Parity::Space => Err(SerialError::Unsupported {
            path: path.to_string(),
            setting: format!("{} parity", parity),
        }),
    }
}

fn stop_bits(path: &str, stop: StopBits) -> SerialResult<serialport::StopBits> {
    match stop {
        StopBits::One => Ok(serialport::StopBits::One),
        StopBits::Two => Ok(serialport::StopBits::Two),
        StopBits::OnePointFive => Err(SerialError::Unsupported {
            path: path.to_string(),
            setting: "1.5 stop bits".to_string(),
        }),
    }
}

#[async_trait]
impl SerialOpener for SystemSerialOpener {
    #[instrument(skip(self, config), fields(config = %config))]
    async fn open(&self, config: &SerialConfig) -> SerialResult<Arc<dyn SerialDevice>> {
        let path = config.device_path(self.path_template.as_deref());
        debug!(path = %path, "Opening serial device");
        let builder = serialport::new(path.as_str(), config.speed.get())
            .data_bits(data_bits(config.data_bits))
            .parity(parity(&path, config.parity)?)
            .stop_bits(stop_bits(&path, config.stop_bits)?)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout);

        let open_path = path.clone();
        let (reader, writer) = tokio::task::spawn_blocking(move || open_blocking(builder, &open_path))
            .await
            .map_err(io::Error::other)??;

        info!(path = %path, "Serial device opened");
        Ok(Arc::new(SystemSerialDevice {
            path,
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        }))
    }
}

type PortPair = (Box<dyn SerialPort>, Box<dyn SerialPort>);

fn open_blocking(builder: serialport::SerialPortBuilder, path: &str) -> SerialResult<PortPair> {
    let open_error = |e: serialport::Error| SerialError::Open {
        path: path.to_string(),
        reason: e.to_string(),
    };
    let mut port = builder.open().map_err(open_error)?;

    // Modem control lines stay asserted for the whole session.
    if let Err(e) = port.write_data_terminal_ready(true) {
        warn!(path, error = %e, "Failed to assert DTR");
    }
    if let Err(e) = port.write_request_to_send(true) {
        warn!(path, error = %e, "Failed to assert RTS");
    }
    if let Err(e) = port.clear(ClearBuffer::Input) {
        debug!(path, error = %e, "Failed to discard stale input");
    }

    let writer = port.try_clone().map_err(open_error)?;
    Ok((port, writer))
}

/// An open operating-system serial device
pub struct SystemSerialDevice {
    path: String,
    reader: Arc<Mutex<Box<dyn SerialPort>>>,
    writer: Arc<Mutex<Box<dyn SerialPort>>>,
}

fn lock(port: &Mutex<Box<dyn SerialPort>>) -> MutexGuard<'_, Box<dyn SerialPort>> {
    port.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl SerialDevice for SystemSerialDevice {
    fn path(&self) -> &str {
        &self.path
    }

    async fn read(&self, max: usize) -> io::Result<Bytes> {
        let reader = Arc::clone(&self.reader);
        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; max];
            match lock(&reader).read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    Ok(Bytes::from(buf))
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Bytes::new()),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn write(&self, data: &[u8]) -> io::Result<()> {
        let writer = Arc::clone(&self.writer);
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut port = lock(&writer);
            port.write_all(&data)?;
            port.flush()
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn send_break(&self, hold: Duration) -> io::Result<()> {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let port = lock(&writer);
            port.set_break().map_err(io::Error::from)?;
            std::thread::sleep(hold);
            port.clear_break().map_err(io::Error::from)
        })
        .await
        .map_err(io::Error::other)?
    }
}

impl std::fmt::Debug for SystemSerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSerialDevice")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortNumber;
    use tracing_test::traced_test;

    #[test]
    fn unsupported_settings_are_rejected_before_opening() {
        assert!(matches!(
            parity("/dev/ttyS0", Parity::Mark),
            Err(SerialError::Unsupported { .. })
        ));
        assert!(matches!(
            stop_bits("/dev/ttyS0", StopBits::OnePointFive),
            Err(SerialError::Unsupported { .. })
        ));
        assert!(parity("/dev/ttyS0", Parity::Even).is_ok());
    }

    #[tokio::test]
    #[traced_test]
    async fn missing_device_fails_to_open() {
        let opener = SystemSerialOpener::new()
            .with_path_template(Some("/nonexistent/serialgate-tty{n}".to_string()));
        let config = SerialConfig::default().with_port(PortNumber::new(4).unwrap());
        let err = opener.open(&config).await.err().unwrap();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("/nonexistent/serialgate-tty4"));
        assert!(logs_contain("Opening serial device"));
        assert!(logs_contain("/nonexistent/serialgate-tty4"));
    }
}
