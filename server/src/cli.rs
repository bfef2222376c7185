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

//! Command line interface

use clap::Parser;
use serialgate_serial::{BaudRate, DataBits, Parity, PortNumber, SerialConfig, StopBits};
use serialgate_service::GatewayConfig;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Telnet to serial port gateway
#[derive(Debug, Parser)]
#[command(name = "serialgated")]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    pub listen: IpAddr,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = 23)]
    pub port: u16,

    /// Number of simultaneous connections
    #[arg(long, default_value_t = 8)]
    pub slots: usize,

    /// Initial serial port number (1-16)
    #[arg(long, default_value = "1")]
    pub serial_port: PortNumber,

    /// Initial line speed
    #[arg(long, default_value = "9600")]
    pub speed: BaudRate,

    /// Initial data bits (5-8)
    #[arg(long, default_value = "8")]
    pub data_bits: DataBits,

    /// Initial parity (no, odd, even, mark, space)
    #[arg(long, default_value = "no")]
    pub parity: Parity,

    /// Initial stop bits (1, 1.5, 2)
    #[arg(long, default_value = "1")]
    pub stop_bits: StopBits,

    /// Device path template; `{n}` is the port number, `{index}` the zero-based index
    #[arg(long)]
    pub device_template: Option<String>,

    /// Seconds between keepalive NOPs on idle connections
    #[arg(long, default_value_t = 1)]
    pub keepalive: u64,

    /// Verbose logging (-v, -vv for more); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Gateway configuration described by the flags
    pub fn gateway_config(&self) -> GatewayConfig {
        let serial = SerialConfig::default()
            .with_port(self.serial_port)
            .with_speed(self.speed)
            .with_data_bits(self.data_bits)
            .with_parity(self.parity)
            .with_stop_bits(self.stop_bits);

        GatewayConfig::new(SocketAddr::new(self.listen, self.port))
            .with_max_connections(self.slots)
            .with_keepalive_interval(Duration::from_secs(self.keepalive))
            .with_device_template(self.device_template.clone())
            .with_serial(serial)
    }

    /// Default log filter for the verbosity level
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
