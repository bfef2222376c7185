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

//! Gateway configuration

use serialgate_serial::SerialConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Gateway configuration
///
/// Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use serialgate_service::GatewayConfig;
/// use std::time::Duration;
///
/// let config = GatewayConfig::new("127.0.0.1:2323".parse().unwrap())
///     .with_max_connections(4)
///     .with_keepalive_interval(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind the listener to
    pub bind_address: SocketAddr,

    /// Number of connection slots
    ///
    /// Connections arriving while every slot is occupied are dropped.
    pub max_connections: usize,

    /// Bounded wait on network reads
    ///
    /// Each time it elapses without input, a connection with keepalive
    /// enabled receives a NOP.
    pub keepalive_interval: Duration,

    /// Bounded wait on serial reads
    pub serial_read_timeout: Duration,

    /// How long a telnet BREAK holds the serial line in the break condition
    pub break_duration: Duration,

    /// Longest menu command line; further characters are dropped
    pub line_limit: usize,

    /// Read buffer size for network and serial reads
    pub buffer_size: usize,

    /// How long shutdown waits for connection workers to finish
    pub shutdown_timeout: Duration,

    /// Serial configuration in effect at startup
    pub serial: SerialConfig,

    /// Device path template (`{n}` is the port number, `{index}` the zero-based index)
    ///
    /// `None` uses the platform default naming.
    pub device_template: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 23)),
            max_connections: 8,
            keepalive_interval: Duration::from_secs(1),
            serial_read_timeout: Duration::from_millis(50),
            break_duration: Duration::from_millis(250),
            line_limit: 128,
            buffer_size: 1024,
            shutdown_timeout: Duration::from_secs(5),
            serial: SerialConfig::default(),
            device_template: None,
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the number of connection slots
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the keepalive interval
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the serial read timeout
    pub fn with_serial_read_timeout(mut self, timeout: Duration) -> Self {
        self.serial_read_timeout = timeout;
        self
    }

    /// Set the break duration
    pub fn with_break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }

    /// Set the menu line limit
    pub fn with_line_limit(mut self, limit: usize) -> Self {
        self.line_limit = limit;
        self
    }

    /// Set the buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the shutdown timeout duration
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the initial serial configuration
    pub fn with_serial(mut self, serial: SerialConfig) -> Self {
        self.serial = serial;
        self
    }

    /// Set the device path template
    pub fn with_device_template(mut self, template: Option<String>) -> Self {
        self.device_template = template;
        self
    }

    /// Path of the device the current serial port number maps to
    pub fn device_path(&self, serial: &SerialConfig) -> String {
        serial.device_path(self.device_template.as_deref())
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.keepalive_interval.is_zero() {
            return Err("keepalive_interval must be greater than 0".to_string());
        }

        if self.serial_read_timeout.is_zero() {
            return Err("serial_read_timeout must be greater than 0".to_string());
        }

        if self.line_limit == 0 {
            return Err("line_limit must be greater than 0".to_string());
        }

        if self.buffer_size == 0 {
            return Err("buffer_size must be greater than 0".to_string());
        }

        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialgate_serial::{BaudRate, PortNumber};

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_address.port(), 23);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.keepalive_interval, Duration::from_secs(1));
        assert_eq!(config.line_limit, 128);
        assert_eq!(config.serial, SerialConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let serial = SerialConfig::default()
            .with_port(PortNumber::new(2).unwrap())
            .with_speed(BaudRate::new(115_200).unwrap());
        let config = GatewayConfig::default()
            .with_max_connections(2)
            .with_break_duration(Duration::from_millis(10))
            .with_serial(serial);

        assert_eq!(config.max_connections, 2);
        assert_eq!(config.break_duration, Duration::from_millis(10));
        assert_eq!(config.serial.port.get(), 2);
        assert_eq!(config.serial.speed.get(), 115_200);
    }

    #[test]
    fn test_device_template() {
        let config = GatewayConfig::default().with_device_template(Some("/dev/ttyUSB{index}".into()));
        let serial = SerialConfig::default().with_port(PortNumber::new(3).unwrap());
        assert_eq!(config.device_path(&serial), "/dev/ttyUSB2");
    }

    #[test]
    fn test_validation() {
        let mut config = GatewayConfig::default();
        assert!(config.validate().is_ok());

        config.max_connections = 0;
        assert!(config.validate().is_err());

        config.max_connections = 8;
        config.keepalive_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.keepalive_interval = Duration::from_secs(1);
        config.line_limit = 0;
        assert!(config.validate().is_err());
    }
}
