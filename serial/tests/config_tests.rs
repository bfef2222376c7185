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

//! Validation tests for the shared serial configuration

use serialgate_serial::{
    BaudRate, ConfigError, DataBits, Parity, PortNumber, SerialConfig, SharedSerialConfig,
    StopBits,
};

#[test]
fn every_valid_port_is_stored_exactly() {
    let shared = SharedSerialConfig::default();
    for port in 1..=16u8 {
        let set = shared.set_port(&port.to_string()).unwrap();
        assert_eq!(set.get(), port);
        assert_eq!(shared.snapshot().port.get(), port);
    }
}

#[test]
fn invalid_ports_leave_the_previous_value() {
    let shared = SharedSerialConfig::default();
    shared.set_port("7").unwrap();
    for bad in ["0", "17", "-1", "256", "seven", ""] {
        assert_eq!(
            shared.set_port(bad),
            Err(ConfigError::InvalidPort(bad.to_string()))
        );
        assert_eq!(shared.snapshot().port.get(), 7);
    }
}

#[test]
fn speeds() {
    let shared = SharedSerialConfig::default();
    for speed in [300u32, 9600, 19200, 115200, 921600] {
        shared.set_speed(&speed.to_string()).unwrap();
        assert_eq!(shared.snapshot().speed.get(), speed);
    }
    assert!(shared.set_speed("0").is_err());
    assert!(shared.set_speed("fast").is_err());
    assert_eq!(shared.snapshot().speed.get(), 921600);
}

#[test]
fn data_bits() {
    let shared = SharedSerialConfig::default();
    let cases = [
        ("5", DataBits::Five),
        ("6", DataBits::Six),
        ("7", DataBits::Seven),
        ("8", DataBits::Eight),
    ];
    for (text, expected) in cases {
        shared.set_data_bits(text).unwrap();
        assert_eq!(shared.snapshot().data_bits, expected);
        assert_eq!(expected.to_string(), text);
    }
    for bad in ["4", "9", "eight"] {
        assert!(shared.set_data_bits(bad).is_err());
        assert_eq!(shared.snapshot().data_bits, DataBits::Eight);
    }
}

#[test]
fn parities() {
    let shared = SharedSerialConfig::default();
    let cases = [
        ("no", Parity::None),
        ("odd", Parity::Odd),
        ("even", Parity::Even),
        ("mark", Parity::Mark),
        ("space", Parity::Space),
    ];
    for (text, expected) in cases {
        shared.set_parity(text).unwrap();
        assert_eq!(shared.snapshot().parity, expected);
    }
    assert!(shared.set_parity("sometimes").is_err());
    assert_eq!(shared.snapshot().parity, Parity::Space);
}

#[test]
fn stop_bits() {
    let shared = SharedSerialConfig::default();
    let cases = [
        ("1", StopBits::One),
        ("1.5", StopBits::OnePointFive),
        ("2", StopBits::Two),
    ];
    for (text, expected) in cases {
        shared.set_stop_bits(text).unwrap();
        assert_eq!(shared.snapshot().stop_bits, expected);
    }
    assert!(shared.set_stop_bits("2.5").is_err());
    assert_eq!(shared.snapshot().stop_bits, StopBits::Two);
}

#[test]
fn clones_share_one_configuration() {
    let first = SharedSerialConfig::new(SerialConfig::default());
    let second = first.clone();
    first.set_data_bits("7").unwrap();
    assert_eq!(second.snapshot().data_bits, DataBits::Seven);

    second.replace(
        SerialConfig::default()
            .with_port(PortNumber::new(3).unwrap())
            .with_speed(BaudRate::new(19200).unwrap()),
    );
    assert_eq!(first.snapshot().to_string(), "port=3 speed=19200 data=8 parity=no stop=1");
}
