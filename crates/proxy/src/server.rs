// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ProxyServer` lifecycle (spec §4.10 "Lifecycle"): bind, accept loop,
//! graceful stop, and the two-step SIGINT handler.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use distio_core::{DioError, DioResult, WorkerIdAllocator};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ProxyConfig;
use crate::session;

/// State shared by every session spawned off one listener (spec §4.10
/// "Resource limits").
pub struct ProxyShared {
    pub config: ProxyConfig,
    pub ids: WorkerIdAllocator,
    pub active_slaves: AtomicU32,
}

/// A running (or not-yet-started) proxy server instance.
pub struct ProxyServer {
    shared: Arc<ProxyShared>,
    shutdown: Arc<Notify>,
    local_addr: Mutex<Option<SocketAddr>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    sigint_task: Mutex<Option<JoinHandle<()>>>,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig) -> DioResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            shared: Arc::new(ProxyShared {
                config,
                ids: WorkerIdAllocator::new(),
                active_slaves: AtomicU32::new(0),
            }),
            shutdown: Arc::new(Notify::new()),
            local_addr: Mutex::new(None),
            accept_task: Mutex::new(None),
            sigint_task: Mutex::new(None),
        }))
    }

    /// Bind the listening socket and spawn the accept loop. Resolves once
    /// the socket is listening, reporting the bound address — useful when
    /// `port` was `0` (spec §4.10 "reports chosen port if system-assigned").
    pub async fn start(self: &Arc<Self>) -> DioResult<SocketAddr> {
        let addr = format!("0.0.0.0:{}", self.shared.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DioError::SpawnFailed(format!("bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DioError::SpawnFailed(format!("local_addr: {e}")))?;
        *self.local_addr.lock() = Some(local_addr);
        info!(addr = %local_addr, root = %self.shared.config.root.display(), "proxy listening");

        let shared = Arc::clone(&self.shared);
        let shutdown = Arc::clone(&self.shutdown);
        let task = tokio::spawn(accept_loop(listener, shared, shutdown));
        *self.accept_task.lock() = Some(task);
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Disconnect all sessions and close the listener (spec §4.10
    /// "`stop()` disconnects all sockets and closes the listener").
    pub fn stop(&self) {
        self.shutdown.notify_waiters();
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
    }

    /// Install the two-step SIGINT handler: first interrupt triggers a
    /// graceful `stop()` with a 500ms grace period, second forces an
    /// immediate exit (spec §4.10 "Lifecycle").
    pub fn bind_sigint(self: &Arc<Self>) {
        let server = Arc::clone(self);
        let task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("received interrupt, stopping gracefully");
            server.stop();
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(500)) => {}
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        warn!("received second interrupt, exiting immediately");
                        std::process::exit(130);
                    }
                }
            }
        });
        *self.sigint_task.lock() = Some(task);
    }

    pub fn unbind_sigint(&self) {
        if let Some(task) = self.sigint_task.lock().take() {
            task.abort();
        }
    }

    /// Resolve once `stop()` has been called, graceful or via SIGINT.
    pub async fn wait_for_stop(&self) {
        self.shutdown.notified().await;
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<ProxyShared>, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("proxy accept loop stopping");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let shared = Arc::clone(&shared);
                        tokio::spawn(async move {
                            if let Err(e) = session::handle_connection(stream, addr, shared).await {
                                warn!(%addr, error = %e, "session ended with error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "accept error"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ProxyAuth;

    #[tokio::test]
    async fn start_reports_chosen_port() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProxyConfig::new(dir.path()).with_port(0).with_auth(ProxyAuth::new());
        let server = ProxyServer::new(config).unwrap();
        let addr = server.start().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.stop();
    }
}
