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

//! Error types for serial configuration and device access

/// Result type for serial device operations
pub type SerialResult<T> = Result<T, SerialError>;

/// A rejected serial configuration parameter.
///
/// The display text is what a menu user sees, so it names the offending
/// value and the accepted range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Port number outside 1-16 or not a number
    #[error("invalid port number '{0}' (expected 1-16)")]
    InvalidPort(String),

    /// Speed that is zero or not a number
    #[error("invalid speed '{0}' (expected a positive number)")]
    InvalidSpeed(String),

    /// Data bits other than 5, 6, 7 or 8
    #[error("invalid data bits '{0}' (expected 5, 6, 7 or 8)")]
    InvalidDataBits(String),

    /// Unknown parity name
    #[error("invalid parity '{0}' (expected no, odd, even, mark or space)")]
    InvalidParity(String),

    /// Stop bits other than 1, 1.5 or 2
    #[error("invalid stop bits '{0}' (expected 1, 1.5 or 2)")]
    InvalidStopBits(String),
}

/// Errors raised while opening or driving a serial device
#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    /// The device could not be opened (missing, or held by another consumer)
    #[error("cannot open {path}: {reason}")]
    Open {
        /// Device path that was attempted
        path: String,
        /// Backend description of the failure
        reason: String,
    },

    /// The configuration cannot be applied by the platform backend
    #[error("cannot configure {path}: {setting} is not supported")]
    Unsupported {
        /// Device path that was attempted
        path: String,
        /// Setting that was rejected
        setting: String,
    },

    /// An I/O error on an open device
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SerialError {
    /// True when the failure means the device is unavailable rather than misconfigured
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SerialError::Open { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_value_and_range() {
        let err = ConfigError::InvalidDataBits("9".to_string());
        assert_eq!(err.to_string(), "invalid data bits '9' (expected 5, 6, 7 or 8)");
    }

    #[test]
    fn open_error_is_unavailable() {
        let err = SerialError::Open {
            path: "/dev/ttyS0".to_string(),
            reason: "Device or resource busy".to_string(),
        };
        assert!(err.is_unavailable());
        assert_eq!(err.to_string(), "cannot open /dev/ttyS0: Device or resource busy");

        let err = SerialError::Unsupported {
            path: "COM1".to_string(),
            setting: "mark parity".to_string(),
        };
        assert!(!err.is_unavailable());
    }
}
