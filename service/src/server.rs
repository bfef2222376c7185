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

//! Gateway server
//!
//! The GatewayServer owns the TCP listener, admits sockets into the
//! connection table and spawns one worker per admitted connection.

use crate::{
    ConnectionTable, ConnectionWorker, GatewayConfig, GatewayError, Result, ServerSnapshot,
    WorkerContext,
};
use futures_util::future::join_all;
use metrics::{counter, gauge};
use serialgate_serial::{SerialOpener, SharedSerialConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type Workers = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Telnet to serial gateway server
///
/// # Example
///
/// ```no_run
/// use serialgate_serial::SystemSerialOpener;
/// use serialgate_service::{GatewayConfig, GatewayServer};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = GatewayConfig::new("0.0.0.0:2323".parse()?);
///     let server = GatewayServer::new(config, Arc::new(SystemSerialOpener::new())).await?;
///
///     server.start().await?;
///     tokio::signal::ctrl_c().await?;
///     server.shutdown().await?;
///
///     Ok(())
/// }
/// ```
pub struct GatewayServer {
    /// State shared with workers
    ctx: Arc<WorkerContext>,
    /// Listener, moved into the accept loop on start
    listener: tokio::sync::Mutex<Option<TcpListener>>,
    /// Actual bind address
    bind_address: SocketAddr,
    /// Server start time
    started_at: Instant,
    /// Running flag
    running: AtomicBool,
    /// Parent of every connection's cancellation token
    shutdown: CancellationToken,
    /// Accept loop task handle
    accept_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    /// Worker task handles
    workers: Workers,
}

impl GatewayServer {
    /// Create a new server with the given configuration and serial backend
    ///
    /// This binds to the configured address but does not start accepting connections.
    /// Call `start()` to begin accepting connections.
    pub async fn new(config: GatewayConfig, opener: Arc<dyn SerialOpener>) -> Result<Self> {
        config.validate().map_err(GatewayError::Other)?;

        let listener = TcpListener::bind(config.bind_address).await?;
        let actual_addr = listener.local_addr()?;
        info!(
            addr = %actual_addr,
            slots = config.max_connections,
            serial = %config.serial,
            "Gateway bound"
        );

        Ok(Self {
            ctx: Arc::new(WorkerContext::new(config, opener)),
            listener: tokio::sync::Mutex::new(Some(listener)),
            bind_address: actual_addr,
            started_at: Instant::now(),
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            accept_handle: tokio::sync::Mutex::new(None),
            workers: Arc::default(),
        })
    }

    /// Start accepting connections
    pub async fn start(&self) -> Result<()> {
        let Some(listener) = self.listener.lock().await.take() else {
            return Err(GatewayError::ServerAlreadyRunning);
        };
        self.running.store(true, Ordering::SeqCst);

        info!(addr = %self.bind_address, "Starting gateway");
        let handle = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.ctx),
            self.shutdown.clone(),
            Arc::clone(&self.workers),
        ));
        *self.accept_handle.lock().await = Some(handle);

        Ok(())
    }

    /// Shutdown the server gracefully
    ///
    /// Stops accepting, tells every connection to stop and waits for the
    /// workers (up to the configured shutdown timeout) so that serial
    /// devices are released before returning.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::ServerNotRunning);
        }

        info!("Shutting down gateway");
        self.shutdown.cancel();

        if let Some(handle) = self.accept_handle.lock().await.take() {
            let _ = handle.await;
        }

        let workers: Vec<_> = lock(&self.workers).drain(..).collect();
        let pending = workers.len();
        let aborts: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();
        match tokio::time::timeout(self.ctx.config.shutdown_timeout, join_all(workers)).await {
            Ok(_) => info!(workers = pending, "Gateway shutdown complete"),
            Err(_) => {
                warn!(
                    timeout = ?self.ctx.config.shutdown_timeout,
                    "Workers did not finish in time, aborting"
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        Ok(())
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the server's bind address
    pub fn local_addr(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the number of occupied slots
    pub fn connection_count(&self) -> usize {
        self.ctx.table.active_count()
    }

    /// Get the connection table
    pub fn table(&self) -> &ConnectionTable {
        &self.ctx.table
    }

    /// Get the serial settings shared by all connections
    pub fn serial_config(&self) -> &SharedSerialConfig {
        &self.ctx.serial
    }

    /// Get the server configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.ctx.config
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            active_connections: self.ctx.table.active_count(),
            capacity: self.ctx.table.capacity(),
            total_connections: self.ctx.table.total_admitted(),
            bind_address: self.bind_address,
            uptime: self.started_at.elapsed(),
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<WorkerContext>,
    shutdown: CancellationToken,
    workers: Workers,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((socket, peer_addr)) => admit(&ctx, &shutdown, &workers, socket, peer_addr),
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                // Back off on errors to avoid tight loop
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }

    info!("Accept loop terminated");
}

fn admit(
    ctx: &Arc<WorkerContext>,
    shutdown: &CancellationToken,
    workers: &Workers,
    socket: TcpStream,
    peer_addr: SocketAddr,
) {
    if let Err(e) = socket.set_nodelay(true) {
        debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
    }
    let (reader, writer) = socket.into_split();

    let Some(conn) = ctx
        .table
        .allocate(peer_addr, Box::new(writer), shutdown.child_token())
    else {
        counter!("serialgate.connections.rejected").increment(1);
        warn!(
            peer = %peer_addr,
            capacity = ctx.table.capacity(),
            "No free connection slot, dropping connection"
        );
        return;
    };

    counter!("serialgate.connections.accepted").increment(1);
    gauge!("serialgate.connections.active").increment(1.0);
    info!(connection_id = %conn.id(), slot = conn.slot(), peer = %peer_addr, "Connection accepted");

    let worker = ConnectionWorker::new(conn, reader, Arc::clone(ctx));
    let mut workers = lock(workers);
    workers.retain(|handle| !handle.is_finished());
    workers.push(tokio::spawn(worker.run()));
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServer")
            .field("bind_address", &self.bind_address)
            .field("running", &self.is_running())
            .field("connection_count", &self.connection_count())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

// Implement Drop to ensure cleanup
impl Drop for GatewayServer {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            warn!("GatewayServer dropped while still running");
            self.running.store(false, Ordering::SeqCst);
            self.shutdown.cancel();
        }
    }
}
