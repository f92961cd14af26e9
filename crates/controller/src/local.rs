// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local worker handle (spec §4.2, component C3): forks the configured
//! script and owns its stdio pipe for the lifetime of the child.

use std::path::PathBuf;
use std::process::Stdio as StdStdio;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use distio_core::{Command, DioError, DioResult, RequestMeta, Signal, WorkerId, WorkerState};
use distio_wire::{build_child_args, read_frame, write_frame, ProtocolError, WireRequest, WireResponse};
use parking_lot::Mutex;
use tokio::io::AsyncBufReadExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::events::{channel, HandleEvent};
use crate::handle::{Counters, WorkerHandleOps, WorkerStats};
use crate::registry::Registry;
use crate::response::Response;

/// Whether a child's stdout/stderr are captured as handle events or
/// inherited from the controller process (spec §4.2 "Spawn").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    Silent,
    Inherit,
}

/// Everything needed to fork one local worker (spec §4.2 "Spawn").
#[derive(Debug, Clone)]
pub struct LocalWorkerConfig {
    pub script: PathBuf,
    pub alias: String,
    pub group: String,
    pub title: Option<String>,
    pub args: Vec<String>,
    pub stdio: StdioMode,
    pub default_timeout_ms: Option<u64>,
    pub catch_all: Option<bool>,
    /// Bound on the EXIT round-trip in `close()` (spec §4.2, default 10s).
    pub close_timeout_ms: u64,
}

impl Default for LocalWorkerConfig {
    fn default() -> Self {
        Self {
            script: PathBuf::new(),
            alias: String::new(),
            group: "global".to_string(),
            title: None,
            args: Vec::new(),
            stdio: StdioMode::Silent,
            default_timeout_ms: None,
            catch_all: None,
            close_timeout_ms: 10_000,
        }
    }
}

enum CloseState {
    NotStarted,
    InProgress(Arc<Notify>),
    Done(bool),
}

/// Controller-side object representing one forked child process
/// (spec §4.2).
pub struct LocalWorkerHandle {
    id: WorkerId,
    alias: String,
    group: String,
    script_path: String,
    state: Mutex<WorkerState>,
    counters: Counters,
    dispatcher: Arc<Dispatcher>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    events_tx: broadcast::Sender<HandleEvent>,
    default_timeout_ms: Option<u64>,
    catch_all: Option<bool>,
    close_timeout_ms: u64,
    close_state: Mutex<CloseState>,
    registry: Weak<Registry>,
}

impl LocalWorkerHandle {
    /// Fork the configured script and start servicing it (spec §4.2
    /// "Spawn"). On failure the caller never sees a live handle — the
    /// `SpawnFailed` state/`onSpawnError` callback in the source system
    /// become a plain `Err` here.
    pub async fn spawn(
        id: WorkerId,
        config: LocalWorkerConfig,
        dispatcher: Arc<Dispatcher>,
        registry: &Arc<Registry>,
    ) -> DioResult<Arc<Self>> {
        let args = build_child_args(&config.args, id, &config.alias, config.title.as_deref());
        let mut command = tokio::process::Command::new(&config.script);
        command.args(&args);
        command.stdin(StdStdio::piped());
        match config.stdio {
            StdioMode::Silent => {
                command.stdout(StdStdio::piped()).stderr(StdStdio::piped());
            }
            StdioMode::Inherit => {
                command.stdout(StdStdio::inherit()).stderr(StdStdio::inherit());
            }
        }

        let mut child = command.spawn().map_err(|e| {
            DioError::SpawnFailed(format!("{}: {e}", config.script.display()))
        })?;
        let stdin = child.stdin.take().ok_or_else(|| DioError::SpawnFailed("no stdin pipe".to_string()))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (events_tx, _) = channel();
        let handle = Arc::new(Self {
            id,
            alias: config.alias.clone(),
            group: config.group.clone(),
            script_path: config.script.display().to_string(),
            state: Mutex::new(WorkerState::Ready),
            counters: Counters::default(),
            dispatcher,
            stdin: tokio::sync::Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            events_tx,
            default_timeout_ms: config.default_timeout_ms,
            catch_all: config.catch_all,
            close_timeout_ms: config.close_timeout_ms,
            close_state: Mutex::new(CloseState::NotStarted),
            registry: Arc::downgrade(registry),
        });

        if let Some(stdout) = stdout {
            spawn_reader(Arc::clone(&handle), stdout);
        }
        if let Some(stderr) = stderr {
            spawn_stderr_forwarder(Arc::clone(&handle), stderr);
        }

        info!(worker_id = %id, alias = %handle.alias, script = %handle.script_path, "spawned local worker");
        Ok(handle)
    }

    fn handle_inbound_frame(self: &Arc<Self>, value: serde_json::Value) {
        match value.get("title").and_then(|t| t.as_str()) {
            Some(WireResponse::TITLE) => match serde_json::from_value::<WireResponse>(value) {
                Ok(resp) => {
                    if !resp.has_worker_magic()
                        || !self.dispatcher.secret().matches(&resp.secret_id, resp.secret_number)
                    {
                        debug!(worker_id = %self.id, "dropping response failing magic/secret check");
                        return;
                    }
                    self.dispatcher.complete(self.id, resp);
                }
                Err(e) => warn!(worker_id = %self.id, error = %e, "malformed response frame"),
            },
            Some(distio_wire::WireException::TITLE) => {
                match serde_json::from_value::<distio_wire::WireException>(value) {
                    Ok(exc) => {
                        warn!(worker_id = %self.id, name = %exc.error.name, message = %exc.error.message, "uncaught worker exception");
                        let _ = self.events_tx.send(HandleEvent::UncaughtException {
                            name: exc.error.name,
                            message: exc.error.message,
                        });
                    }
                    Err(e) => warn!(worker_id = %self.id, error = %e, "malformed exception frame"),
                }
            }
            _ => debug!(worker_id = %self.id, "discarding frame without worker magic"),
        }
    }

    async fn on_disconnect(self: &Arc<Self>) {
        let already_terminal = {
            let mut state = self.state.lock();
            if state.is_terminal() {
                true
            } else {
                *state = WorkerState::Exited;
                false
            }
        };
        if already_terminal {
            return;
        }
        debug!(worker_id = %self.id, "local worker disconnected");
        self.dispatcher.cancel_for_worker(self.id);
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        let _ = self.events_tx.send(HandleEvent::Closed);
        let _ = self.events_tx.send(HandleEvent::Exited);
        if let Some(mut child) = self.child.lock().take() {
            let _ = child.start_kill();
        }
    }

    async fn write_request(&self, request: &WireRequest) -> DioResult<()> {
        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else { return Err(DioError::Closed) };
        write_frame(stdin, request).await.map_err(|_| DioError::Disconnected)
    }

    /// Send the EXIT sentinel from inside `close()`, which has already
    /// moved the handle to `Closing` before this runs. `exec()`'s
    /// `refuses_sends` guard would otherwise reject the handle's own
    /// EXIT round-trip (spec §4.2 "sends EXIT ... marks state closing").
    async fn send_exit(&self, meta: RequestMeta) -> DioResult<Response> {
        let (request, rx) = self.dispatcher.begin(
            self.id,
            Command::Exit,
            serde_json::Value::Null,
            meta,
            self.default_timeout_ms,
            self.catch_all,
        );
        self.write_request(&request).await?;
        self.counters.record_sent();
        let outcome = rx.await.map_err(|_| DioError::Disconnected)?;
        self.counters.record_received();
        outcome.into_result()
    }
}

fn spawn_reader(handle: Arc<LocalWorkerHandle>, mut stdout: tokio::process::ChildStdout) {
    tokio::spawn(async move {
        loop {
            let frame: Result<serde_json::Value, ProtocolError> = read_frame(&mut stdout).await;
            match frame {
                Ok(value) => handle.handle_inbound_frame(value),
                Err(ProtocolError::ConnectionClosed) => {
                    handle.on_disconnect().await;
                    return;
                }
                Err(e) => {
                    warn!(worker_id = %handle.id, error = %e, "frame read error, treating as disconnect");
                    handle.on_disconnect().await;
                    return;
                }
            }
        }
    });
}

fn spawn_stderr_forwarder(handle: Arc<LocalWorkerHandle>, stderr: tokio::process::ChildStderr) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = handle.events_tx.send(HandleEvent::Stderr(line.into_bytes()));
        }
    });
}

#[async_trait]
impl WorkerHandleOps for LocalWorkerHandle {
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
            self.dispatcher.begin(self.id, command, data, meta, self.default_timeout_ms, self.catch_all);
        self.write_request(&request).await?;
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
        let meta = RequestMeta::default().with_timeout(self.close_timeout_ms);
        let result = self.send_exit(meta).await;
        let ok = result.is_ok();

        {
            let mut state = self.state.lock();
            if !state.is_terminal() {
                *state = WorkerState::Closed;
            }
        }
        self.dispatcher.cancel_for_worker(self.id);
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        let _ = self.events_tx.send(HandleEvent::Closed);
        let _ = self.events_tx.send(HandleEvent::Exited);
        if let Some(mut child) = self.child.lock().take() {
            let _ = child.start_kill();
        }

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
        let pid = {
            let guard = self.child.lock();
            guard.as_ref().and_then(|c| c.id())
        };
        if let Some(pid) = pid {
            send_signal(pid, signal)?;
        }
        *self.state.lock() = WorkerState::Exited;
        self.dispatcher.cancel_for_worker(self.id);
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        let _ = self.events_tx.send(HandleEvent::Exited);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<HandleEvent> {
        self.events_tx.subscribe()
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> DioResult<()> {
    use nix::sys::signal::{self, Signal as NixSignal};
    use nix::unistd::Pid;

    let nix_signal = match signal {
        Signal::Sigint => NixSignal::SIGINT,
        Signal::Sigterm => NixSignal::SIGTERM,
        Signal::Sighup => NixSignal::SIGHUP,
        Signal::Sigkill => NixSignal::SIGKILL,
        // No POSIX equivalent; SIGBREAK is a Windows-only console signal.
        Signal::Sigbreak => NixSignal::SIGTERM,
        Signal::Sigstop => NixSignal::SIGSTOP,
    };
    signal::kill(Pid::from_raw(pid as i32), nix_signal)
        .map_err(|e| DioError::WorkerError(format!("failed to signal pid {pid}: {e}")))
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: Signal) -> DioResult<()> {
    Err(DioError::BadArgument("signal delivery is only supported on unix".to_string()))
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
