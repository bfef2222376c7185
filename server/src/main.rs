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

//! `serialgated`: telnet to serial port gateway daemon
//!
//! Listens for telnet clients and bridges them to the local serial ports
//! through a small command menu. Connect with any telnet client and type
//! `help`.

mod cli;

use clap::Parser;
use cli::Cli;
use serialgate_serial::SystemSerialOpener;
use serialgate_service::{GatewayServer, Result};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting serialgated v{}", env!("CARGO_PKG_VERSION"));
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "serialgated failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.gateway_config();
    let opener = SystemSerialOpener::new()
        .with_read_timeout(config.serial_read_timeout)
        .with_path_template(config.device_template.clone());

    let server = GatewayServer::new(config, Arc::new(opener)).await?;
    server.start().await?;
    info!(addr = %server.local_addr(), "Listening for telnet clients");

    shutdown_signal().await?;
    info!("Shutdown requested");
    server.shutdown().await
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
