// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote worker handle (spec §4.3, component C4): same public contract as
//! [`crate::local::LocalWorkerHandle`] but transported over a socket to a
//! proxy server (spec §4.10) instead of a child's stdio pipe.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use distio_core::{Command, DioError, DioResult, RequestMeta, Signal, WorkerId, WorkerState};
use distio_wire::{read_frame, write_frame, InitPayload, ProtocolError, RemoteEnvelope, WireRequest};
use parking_lot::Mutex;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::events::{channel, HandleEvent};
use crate::handle::{Counters, WorkerHandleOps, WorkerStats};
use crate::registry::Registry;
use crate::response::Response;

/// Configuration for one remote worker (spec §4.3, §4.10 "init").
#[derive(Debug, Clone)]
pub struct RemoteWorkerConfig {
    pub proxy_addr: String,
    pub script: String,
    pub alias: String,
    pub group: String,
    pub args: Vec<String>,
    /// Base64 (or passphrase-encrypted) credential blob (spec §4.10).
    pub authorization: Option<String>,
    pub default_timeout_ms: Option<u64>,
    pub catch_all: Option<bool>,
    pub close_timeout_ms: u64,
    /// Reconnection attempts before giving up (spec §4.3, default 3).
    pub max_reconnect_attempts: u32,
}

impl Default for RemoteWorkerConfig {
    fn default() -> Self {
        Self {
            proxy_addr: String::new(),
            script: String::new(),
            alias: String::new(),
            group: "global".to_string(),
            args: Vec::new(),
            authorization: None,
            default_timeout_ms: None,
            catch_all: None,
            close_timeout_ms: 10_000,
            max_reconnect_attempts: 3,
        }
    }
}

enum CloseState {
    NotStarted,
    InProgress(Arc<Notify>),
    Done(bool),
}

type Writer = WriteHalf<TcpStream>;

/// Controller-side object representing one proxy-hosted worker
/// (spec §4.3).
pub struct RemoteWorkerHandle {
    id: WorkerId,
    remote_id: Mutex<WorkerId>,
    alias: String,
    group: String,
    script_path: String,
    config: RemoteWorkerConfig,
    state: Mutex<WorkerState>,
    counters: Counters,
    dispatcher: Arc<Dispatcher>,
    writer: tokio::sync::Mutex<Option<Writer>>,
    events_tx: broadcast::Sender<HandleEvent>,
    close_state: Mutex<CloseState>,
    reconnects: AtomicU32,
    registry: Weak<Registry>,
    /// Self-reference so synchronous trait methods (`kill`) can still hand
    /// off async socket writes to a detached task.
    self_weak: Mutex<Weak<RemoteWorkerHandle>>,
}

impl RemoteWorkerHandle {
    /// Connect to the proxy, send `init`, and wait for the proxy to assign
    /// this worker's remote id (spec §4.3 "a server-assigned remote id",
    /// §4.10 "init").
    pub async fn connect(
        id: WorkerId,
        config: RemoteWorkerConfig,
        dispatcher: Arc<Dispatcher>,
        registry: &Arc<Registry>,
    ) -> DioResult<Arc<Self>> {
        let stream = TcpStream::connect(&config.proxy_addr)
            .await
            .map_err(|e| DioError::SpawnFailed(format!("connect to {}: {e}", config.proxy_addr)))?;
        let (mut reader, mut writer) = tokio::io::split(stream);

        let init = RemoteEnvelope::Init(InitPayload {
            count: 1,
            path: config.script.clone(),
            args: config.args.clone(),
            authorization: config.authorization.clone(),
        });
        write_frame(&mut writer, &init).await.map_err(|e| DioError::SpawnFailed(e.to_string()))?;

        let remote_id = match read_frame::<_, RemoteEnvelope>(&mut reader).await {
            Ok(RemoteEnvelope::Ready { worker_id }) => worker_id,
            Ok(RemoteEnvelope::Error(err)) if err.error.name == "Unauthorized" => {
                return Err(DioError::Unauthorized)
            }
            Ok(RemoteEnvelope::Error(err)) => {
                return Err(DioError::SpawnFailed(err.error.message))
            }
            Ok(_) => return Err(DioError::SpawnFailed("unexpected frame before ready".to_string())),
            Err(e) => return Err(DioError::SpawnFailed(e.to_string())),
        };

        let (events_tx, _) = channel();
        let handle = Arc::new(Self {
            id,
            remote_id: Mutex::new(remote_id),
            alias: config.alias.clone(),
            group: config.group.clone(),
            script_path: config.script.clone(),
            config,
            state: Mutex::new(WorkerState::Ready),
            counters: Counters::default(),
            dispatcher,
            writer: tokio::sync::Mutex::new(Some(writer)),
            events_tx,
            close_state: Mutex::new(CloseState::NotStarted),
            reconnects: AtomicU32::new(0),
            registry: Arc::downgrade(registry),
            self_weak: Mutex::new(Weak::new()),
        });
        *handle.self_weak.lock() = Arc::downgrade(&handle);

        info!(worker_id = %id, remote_id = %remote_id, addr = %handle.config.proxy_addr, "connected remote worker");
        spawn_reader(Arc::clone(&handle), reader);
        Ok(handle)
    }

    fn handle_envelope(self: &Arc<Self>, envelope: RemoteEnvelope) {
        match envelope {
            RemoteEnvelope::Message { frame, .. } => self.handle_inbound_frame(frame),
            RemoteEnvelope::Stdout { chunk, .. } => {
                let _ = self.events_tx.send(HandleEvent::Stdout(chunk));
            }
            RemoteEnvelope::Stderr { chunk, .. } => {
                let _ = self.events_tx.send(HandleEvent::Stderr(chunk));
            }
            RemoteEnvelope::SlaveExited { .. } | RemoteEnvelope::SlaveClosed { .. } => {
                let exited = matches!(envelope, RemoteEnvelope::SlaveExited { .. });
                if exited {
                    let _ = self.events_tx.send(HandleEvent::Exited);
                } else {
                    let _ = self.events_tx.send(HandleEvent::Closed);
                }
            }
            RemoteEnvelope::RemoteKilled { .. } => {
                *self.state.lock() = WorkerState::Exited;
            }
            RemoteEnvelope::Error(err) => {
                warn!(worker_id = %self.id, error = %err.error.message, "proxy rejected a frame");
            }
            RemoteEnvelope::Disconnect | RemoteEnvelope::Init(_) | RemoteEnvelope::Ready { .. } => {}
        }
    }

    fn handle_inbound_frame(self: &Arc<Self>, value: serde_json::Value) {
        match value.get("title").and_then(|t| t.as_str()) {
            Some(distio_wire::WireResponse::TITLE) => {
                match serde_json::from_value::<distio_wire::WireResponse>(value) {
                    Ok(resp) => {
                        if !resp.has_worker_magic()
                            || !self.dispatcher.secret().matches(&resp.secret_id, resp.secret_number)
                        {
                            debug!(worker_id = %self.id, "dropping remote response failing magic/secret check");
                            return;
                        }
                        self.dispatcher.complete(self.id, resp);
                    }
                    Err(e) => warn!(worker_id = %self.id, error = %e, "malformed remote response frame"),
                }
            }
            Some(distio_wire::WireException::TITLE) => {
                match serde_json::from_value::<distio_wire::WireException>(value) {
                    Ok(exc) => {
                        let _ = self.events_tx.send(HandleEvent::UncaughtException {
                            name: exc.error.name,
                            message: exc.error.message,
                        });
                    }
                    Err(e) => warn!(worker_id = %self.id, error = %e, "malformed remote exception frame"),
                }
            }
            _ => debug!(worker_id = %self.id, "discarding remote frame without worker magic"),
        }
    }

    /// Reconnect after a socket drop, up to `max_reconnect_attempts`. On
    /// exhaustion every pending request fails `Disconnected` and the
    /// handle becomes terminal (SPEC_FULL.md Open Question 4; spec §4.3
    /// "exhaustion → spawn-failed").
    async fn reconnect_or_give_up(self: &Arc<Self>) {
        let attempt = self.reconnects.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.config.max_reconnect_attempts {
            warn!(worker_id = %self.id, attempts = attempt, "remote worker exhausted reconnection attempts");
            self.teardown(WorkerState::SpawnFailed).await;
            return;
        }

        debug!(worker_id = %self.id, attempt, "attempting remote reconnect");
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        match TcpStream::connect(&self.config.proxy_addr).await {
            Ok(stream) => {
                let (reader, writer) = tokio::io::split(stream);
                let init = RemoteEnvelope::Init(InitPayload {
                    count: 1,
                    path: self.config.script.clone(),
                    args: self.config.args.clone(),
                    authorization: self.config.authorization.clone(),
                });
                let mut writer = writer;
                if write_frame(&mut writer, &init).await.is_err() {
                    self.teardown(WorkerState::Exited).await;
                    return;
                }
                *self.writer.lock().await = Some(writer);
                self.reconnects.store(0, Ordering::SeqCst);
                info!(worker_id = %self.id, "remote worker reconnected");
                spawn_reader(Arc::clone(self), reader);
            }
            Err(_) => {
                self.reconnect_or_give_up_boxed().await;
            }
        }
    }

    fn reconnect_or_give_up_boxed<'a>(
        self: &'a Arc<Self>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.reconnect_or_give_up())
    }

    async fn teardown(&self, terminal: WorkerState) {
        let already_terminal = {
            let mut state = self.state.lock();
            if state.is_terminal() {
                true
            } else {
                *state = terminal;
                false
            }
        };
        if already_terminal {
            return;
        }
        self.dispatcher.cancel_for_worker(self.id);
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        *self.writer.lock().await = None;
        let _ = self.events_tx.send(HandleEvent::Closed);
        let _ = self.events_tx.send(HandleEvent::Exited);
    }

    async fn write_envelope(&self, envelope: &RemoteEnvelope) -> DioResult<()> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else { return Err(DioError::Closed) };
        write_frame(writer, envelope).await.map_err(|_| DioError::Disconnected)
    }
}

fn spawn_reader(handle: Arc<RemoteWorkerHandle>, mut reader: ReadHalf<TcpStream>) {
    tokio::spawn(async move {
        loop {
            let frame: Result<RemoteEnvelope, ProtocolError> = read_frame(&mut reader).await;
            match frame {
                Ok(envelope) => handle.handle_envelope(envelope),
                Err(_) => {
                    handle.reconnect_or_give_up().await;
                    return;
                }
            }
        }
    });
}

#[async_trait]
impl WorkerHandleOps for RemoteWorkerHandle {
    fn id(&self) -> WorkerId {
        self.id
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn script_path(&self) -> &str {
        &self.script_path
    }

    fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    async fn exec(
        &self,
        command: Command,
        data: serde_json::Value,
        meta: RequestMeta,
    ) -> DioResult<Response> {
        if self.state().refuses_sends() {
            return Err(DioError::Closed);
        }
        let (request, rx) =
            self.dispatcher.begin(self.id, command, data, meta, self.config.default_timeout_ms, self.config.catch_all);
        let remote_id = *self.remote_id.lock();
        let envelope = wrap_request(remote_id, &request);
        self.write_envelope(&envelope).await?;
        self.counters.record_sent();
        let outcome = rx.await.map_err(|_| DioError::Disconnected)?;
        self.counters.record_received();
        outcome.into_result()
    }

    async fn close(&self) -> DioResult<bool> {
        if matches!(self.state(), WorkerState::Closed | WorkerState::Exited) {
            return Ok(true);
        }

        let waiter = {
            let mut guard = self.close_state.lock();
            match &*guard {
                CloseState::Done(ok) => return Ok(*ok),
                CloseState::InProgress(notify) => Some(Arc::clone(notify)),
                CloseState::NotStarted => {
                    *guard = CloseState::InProgress(Arc::new(Notify::new()));
                    None
                }
            }
        };

        if let Some(notify) = waiter {
            notify.notified().await;
            return match &*self.close_state.lock() {
                CloseState::Done(ok) => Ok(*ok),
                _ => Ok(true),
            };
        }

        *self.state.lock() = WorkerState::Closing;
        let meta = RequestMeta::default().with_timeout(self.config.close_timeout_ms);
        let result = self.exec(Command::Exit, serde_json::Value::Null, meta).await;
        let ok = result.is_ok();

        self.teardown(WorkerState::Closed).await;

        let waiters = {
            let mut guard = self.close_state.lock();
            let notify = match &*guard {
                CloseState::InProgress(n) => Some(Arc::clone(n)),
                _ => None,
            };
            *guard = CloseState::Done(ok);
            notify
        };
        if let Some(notify) = waiters {
            notify.notify_waiters();
        }
        Ok(ok)
    }

    fn kill(&self, signal: Signal) -> DioResult<()> {
        let remote_id = *self.remote_id.lock();
        let envelope = RemoteEnvelope::Message {
            worker_id: remote_id,
            frame: serde_json::json!({ "command": Command::RemoteKill(signal).wire_token() }),
        };
        *self.state.lock() = WorkerState::Exited;
        self.dispatcher.cancel_for_worker(self.id);
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        let _ = self.events_tx.send(HandleEvent::Exited);

        // `kill` is synchronous in the trait contract; the REMOTE_KILL_*
        // sentinel write happens best-effort on a detached task, same as
        // the local handle treats `kill` as fire-and-forget (spec §4.2
        // "forceful, no EXIT round-trip").
        if let Some(strong) = self.self_weak.lock().upgrade() {
            tokio::spawn(async move {
                let _ = strong.write_envelope(&envelope).await;
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<HandleEvent> {
        self.events_tx.subscribe()
    }
}

fn wrap_request(remote_id: WorkerId, request: &WireRequest) -> RemoteEnvelope {
    RemoteEnvelope::Message {
        worker_id: remote_id,
        frame: serde_json::to_value(request).unwrap_or(serde_json::Value::Null),
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
