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

//! Serial line configuration
//!
//! Every parameter type validates in its [`FromStr`] implementation, so a
//! value that exists is a value the gateway accepts. [`SharedSerialConfig`]
//! is the process-wide copy that menu sessions mutate and `open` reads.
//!
//! # Examples
//!
//! ```
//! use serialgate_serial::{DataBits, Parity, SharedSerialConfig};
//!
//! let shared = SharedSerialConfig::default();
//! shared.set_speed("19200").unwrap();
//! shared.set_parity("even").unwrap();
//! assert!(shared.set_data_bits("9").is_err());
//!
//! let config = shared.snapshot();
//! assert_eq!(config.speed.get(), 19200);
//! assert_eq!(config.parity, Parity::Even);
//! assert_eq!(config.data_bits, DataBits::Eight);
//! ```

use crate::result::ConfigError;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Serial port number, 1 through 16
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortNumber(u8);

impl PortNumber {
    /// Lowest valid port number
    pub const MIN: u8 = 1;
    /// Highest valid port number
    pub const MAX: u8 = 16;

    /// Create a port number, rejecting values outside 1-16
    pub fn new(port: u8) -> Option<PortNumber> {
        (Self::MIN..=Self::MAX).contains(&port).then_some(PortNumber(port))
    }

    /// The 1-based port number
    pub fn get(self) -> u8 {
        self.0
    }

    /// The 0-based index used by Unix device names
    pub fn index(self) -> u8 {
        self.0 - 1
    }
}

impl FromStr for PortNumber {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(PortNumber::new)
            .ok_or_else(|| ConfigError::InvalidPort(s.to_string()))
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Line speed in bits per second (non-zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BaudRate(u32);

impl BaudRate {
    /// Create a baud rate, rejecting zero
    pub fn new(speed: u32) -> Option<BaudRate> {
        (speed > 0).then_some(BaudRate(speed))
    }

    /// Bits per second
    pub fn get(self) -> u32 {
        self.0
    }
}

impl FromStr for BaudRate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .and_then(BaudRate::new)
            .ok_or_else(|| ConfigError::InvalidSpeed(s.to_string()))
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Character size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataBits {
    /// 5 bits
    Five,
    /// 6 bits
    Six,
    /// 7 bits
    Seven,
    /// 8 bits
    Eight,
}

impl DataBits {
    /// Number of bits
    pub fn bits(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl FromStr for DataBits {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "5" => Ok(DataBits::Five),
            "6" => Ok(DataBits::Six),
            "7" => Ok(DataBits::Seven),
            "8" => Ok(DataBits::Eight),
            _ => Err(ConfigError::InvalidDataBits(s.to_string())),
        }
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    /// No parity bit
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
    /// Parity bit always 1
    Mark,
    /// Parity bit always 0
    Space,
}

impl FromStr for Parity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no" | "none" => Ok(Parity::None),
            "odd" => Ok(Parity::Odd),
            "even" => Ok(Parity::Even),
            "mark" => Ok(Parity::Mark),
            "space" => Ok(Parity::Space),
            _ => Err(ConfigError::InvalidParity(s.to_string())),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Parity::None => "no",
            Parity::Odd => "odd",
            Parity::Even => "even",
            Parity::Mark => "mark",
            Parity::Space => "space",
        })
    }
}

/// Stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopBits {
    /// 1 stop bit
    One,
    /// 1.5 stop bits
    OnePointFive,
    /// 2 stop bits
    Two,
}

impl FromStr for StopBits {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(StopBits::One),
            "1.5" => Ok(StopBits::OnePointFive),
            "2" => Ok(StopBits::Two),
            _ => Err(ConfigError::InvalidStopBits(s.to_string())),
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopBits::One => "1",
            StopBits::OnePointFive => "1.5",
            StopBits::Two => "2",
        })
    }
}

/// Complete serial line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port number
    pub port: PortNumber,
    /// Line speed
    pub speed: BaudRate,
    /// Character size
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: PortNumber(1),
            speed: BaudRate(9600),
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl SerialConfig {
    /// Set the port number
    pub fn with_port(mut self, port: PortNumber) -> Self {
        self.port = port;
        self
    }

    /// Set the line speed
    pub fn with_speed(mut self, speed: BaudRate) -> Self {
        self.speed = speed;
        self
    }

    /// Set the character size
    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    /// Set the parity mode
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Set the stop bits
    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Device path for the configured port.
    ///
    /// A template may use `{n}` for the 1-based port number and `{index}`
    /// for the 0-based index. Without one the platform default is used:
    /// `\\.\COM<n>` on Windows, `/dev/ttyS<index>` elsewhere.
    pub fn device_path(&self, template: Option<&str>) -> String {
        match template {
            Some(template) => template
                .replace("{n}", &self.port.get().to_string())
                .replace("{index}", &self.port.index().to_string()),
            None => default_device_path(self.port),
        }
    }
}

#[cfg(windows)]
fn default_device_path(port: PortNumber) -> String {
    format!(r"\\.\COM{}", port.get())
}

#[cfg(not(windows))]
fn default_device_path(port: PortNumber) -> String {
    format!("/dev/ttyS{}", port.index())
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "port={} speed={} data={} parity={} stop={}",
            self.port, self.speed, self.data_bits, self.parity, self.stop_bits
        )
    }
}

/// Process-wide serial configuration shared by every connection.
///
/// Writers are serialized by a mutex but sessions are not: the last
/// successful setter wins, and `open` uses whatever is current at that
/// instant. Invalid input leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct SharedSerialConfig {
    inner: Arc<Mutex<SerialConfig>>,
}

impl SharedSerialConfig {
    /// Share an initial configuration
    pub fn new(config: SerialConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SerialConfig> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> SerialConfig {
        *self.lock()
    }

    /// Replace the whole configuration
    pub fn replace(&self, config: SerialConfig) {
        *self.lock() = config;
    }

    /// Parse and set the port number
    pub fn set_port(&self, value: &str) -> Result<PortNumber, ConfigError> {
        let port = value.parse()?;
        self.lock().port = port;
        Ok(port)
    }

    /// Parse and set the line speed
    pub fn set_speed(&self, value: &str) -> Result<BaudRate, ConfigError> {
        let speed = value.parse()?;
        self.lock().speed = speed;
        Ok(speed)
    }

    /// Parse and set the character size
    pub fn set_data_bits(&self, value: &str) -> Result<DataBits, ConfigError> {
        let data_bits = value.parse()?;
        self.lock().data_bits = data_bits;
        Ok(data_bits)
    }

    /// Parse and set the parity mode
    pub fn set_parity(&self, value: &str) -> Result<Parity, ConfigError> {
        let parity = value.parse()?;
        self.lock().parity = parity;
        Ok(parity)
    }

    /// Parse and set the stop bits
    pub fn set_stop_bits(&self, value: &str) -> Result<StopBits, ConfigError> {
        let stop_bits = value.parse()?;
        self.lock().stop_bits = stop_bits;
        Ok(stop_bits)
    }
}
