// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection session (spec §4.10 "Per-session events handled"): relays
//! frames between one remote controller socket and the local children
//! forked on its behalf.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use distio_core::{Command, DioError, DioResult, Rid, WorkerId};
use distio_wire::{
    read_frame, write_frame, InitPayload, ProtocolError, RemoteEnvelope, RemoteSlaveError,
    WireErrorPayload, WireResponse,
};
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::child::{ChildEvent, ChildHandle};
use crate::server::ProxyShared;

/// Drive one accepted connection until it disconnects (spec §4.10).
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, shared: Arc<ProxyShared>) -> DioResult<()> {
    shared.config.auth.check_peer(&addr.ip().to_string())?;

    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut session = Session::new(Arc::clone(&shared));

    loop {
        tokio::select! {
            frame = read_frame::<_, RemoteEnvelope>(&mut reader) => {
                match frame {
                    Ok(envelope) => {
                        if session.handle_envelope(envelope, &mut writer).await? {
                            break;
                        }
                    }
                    Err(ProtocolError::ConnectionClosed) => break,
                    Err(e) => {
                        warn!(%addr, error = %e, "frame read error, closing session");
                        break;
                    }
                }
            }
            Some(event) = session.events_rx.recv() => {
                if session.handle_child_event(event, &mut writer).await? {
                    break;
                }
            }
        }
    }

    session.teardown().await;
    debug!(%addr, "session closed");
    Ok(())
}

struct Session {
    shared: Arc<ProxyShared>,
    children: HashMap<WorkerId, Arc<ChildHandle>>,
    events_tx: mpsc::UnboundedSender<ChildEvent>,
    events_rx: mpsc::UnboundedReceiver<ChildEvent>,
    pending_exit: HashSet<(WorkerId, Rid)>,
}

impl Session {
    fn new(shared: Arc<ProxyShared>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self { shared, children: HashMap::new(), events_tx, events_rx, pending_exit: HashSet::new() }
    }

    /// Returns `true` if the session should disconnect after this frame.
    async fn handle_envelope<W: AsyncWrite + Unpin>(
        &mut self,
        envelope: RemoteEnvelope,
        writer: &mut W,
    ) -> DioResult<bool> {
        match envelope {
            RemoteEnvelope::Init(init) => self.handle_init(init, writer).await,
            RemoteEnvelope::Message { worker_id, frame } => self.handle_message(worker_id, frame, writer).await,
            RemoteEnvelope::Disconnect => Ok(true),
            RemoteEnvelope::Ready { .. }
            | RemoteEnvelope::Stdout { .. }
            | RemoteEnvelope::Stderr { .. }
            | RemoteEnvelope::SlaveExited { .. }
            | RemoteEnvelope::SlaveClosed { .. }
            | RemoteEnvelope::RemoteKilled { .. }
            | RemoteEnvelope::Error(_) => Ok(false),
        }
    }

    async fn handle_init<W: AsyncWrite + Unpin>(&mut self, init: InitPayload, writer: &mut W) -> DioResult<bool> {
        if self.shared.config.auth.check_credentials(init.authorization.as_deref()).is_err() {
            let err = RemoteEnvelope::Error(RemoteSlaveError {
                worker_id: None,
                error: WireErrorPayload::new("Unauthorized", "invalid credentials"),
            });
            let _ = write_frame(writer, &err).await;
            return Ok(true);
        }

        let count = init.count.max(1);
        if let Some(max) = self.shared.config.max_concurrent_slaves {
            let active = self.shared.active_slaves.load(Ordering::SeqCst);
            if active + count > max {
                let err = RemoteEnvelope::Error(RemoteSlaveError {
                    worker_id: None,
                    error: WireErrorPayload::new("Error", "maxConcurrentSlaves exceeded, queue client-side"),
                });
                let _ = write_frame(writer, &err).await;
                return Ok(false);
            }
        }

        for _ in 0..count {
            let worker_id = self.shared.ids.next();
            let alias = format!("remote-{worker_id}");
            match ChildHandle::spawn(&self.shared.config.root, &init.path, &init.args, worker_id, &alias, self.events_tx.clone()).await {
                Ok(child) => {
                    self.shared.active_slaves.fetch_add(1, Ordering::SeqCst);
                    if let Some(after_ms) = self.shared.config.kill_slaves_after_ms {
                        spawn_kill_timer(Arc::clone(&child), after_ms, worker_id, self.events_tx.clone());
                    }
                    self.children.insert(worker_id, child);
                    info!(%worker_id, path = %init.path, "forked remote worker");
                    write_frame(writer, &RemoteEnvelope::Ready { worker_id })
                        .await
                        .map_err(|_| DioError::Disconnected)?;
                }
                Err(e) => {
                    warn!(path = %init.path, error = %e, "failed to fork remote worker");
                    let err = RemoteEnvelope::Error(RemoteSlaveError {
                        worker_id: None,
                        error: WireErrorPayload::new("SpawnError", e.to_string()),
                    });
                    let _ = write_frame(writer, &err).await;
                }
            }
        }
        Ok(false)
    }

    async fn handle_message<W: AsyncWrite + Unpin>(
        &mut self,
        worker_id: WorkerId,
        mut frame: serde_json::Value,
        writer: &mut W,
    ) -> DioResult<bool> {
        let Some(child) = self.children.get(&worker_id).cloned() else {
            let err = RemoteEnvelope::Error(RemoteSlaveError::unknown_worker(worker_id));
            let _ = write_frame(writer, &err).await;
            return Ok(false);
        };

        // Strip catchAll so error-vs-throw semantics stay controller-side
        // (spec §4.10 invariant "strip catchAll").
        if let Some(meta) = frame.get_mut("meta").and_then(|m| m.as_object_mut()) {
            meta.remove("catch_all");
            meta.remove("catchAll");
        }

        let command_token = frame.get("command").and_then(|c| c.as_str()).map(str::to_string);
        if let Some(token) = &command_token {
            if let Command::RemoteKill(signal) = Command::from_wire_token(token) {
                return match child.kill(signal) {
                    Ok(()) => {
                        self.retire(worker_id);
                        let _ = write_frame(writer, &RemoteEnvelope::RemoteKilled { worker_id }).await;
                        Ok(false)
                    }
                    Err(e) => {
                        let err = RemoteEnvelope::Error(RemoteSlaveError {
                            worker_id: Some(worker_id),
                            error: WireErrorPayload::new("Error", e.to_string()),
                        });
                        let _ = write_frame(writer, &err).await;
                        Ok(false)
                    }
                };
            }
        }

        let rid = frame.get("rid").and_then(|r| r.as_u64()).map(Rid);
        let Some(rid) = rid else {
            let err = RemoteEnvelope::Error(RemoteSlaveError::missing_field("rid"));
            let _ = write_frame(writer, &err).await;
            return Ok(false);
        };
        if command_token.as_deref() == Some("__exit__") {
            self.pending_exit.insert((worker_id, rid));
        }

        child.write_frame(&frame).await?;
        Ok(false)
    }

    /// Returns `true` if the session should disconnect after this event
    /// (spec §4.10 "if it's a sentinel EXIT, also disconnect the session
    /// after replying").
    async fn handle_child_event<W: AsyncWrite + Unpin>(
        &mut self,
        event: ChildEvent,
        writer: &mut W,
    ) -> DioResult<bool> {
        match event {
            ChildEvent::Frame(worker_id, value) => {
                let exit_rid = (value.get("title").and_then(|t| t.as_str()) == Some(WireResponse::TITLE))
                    .then(|| value.get("request").and_then(|r| r.get("rid")).and_then(|r| r.as_u64()))
                    .flatten()
                    .map(Rid);
                let is_exit_reply =
                    exit_rid.is_some_and(|rid| self.pending_exit.contains(&(worker_id, rid)));

                write_frame(writer, &RemoteEnvelope::Message { worker_id, frame: value })
                    .await
                    .map_err(|_| DioError::Disconnected)?;

                if is_exit_reply {
                    self.retire(worker_id);
                    let _ = write_frame(writer, &RemoteEnvelope::SlaveClosed { worker_id }).await;
                    return Ok(true);
                }
                Ok(false)
            }
            ChildEvent::Stdout(worker_id, chunk) => {
                let _ = write_frame(writer, &RemoteEnvelope::Stdout { worker_id, chunk }).await;
                Ok(false)
            }
            ChildEvent::Stderr(worker_id, chunk) => {
                let _ = write_frame(writer, &RemoteEnvelope::Stderr { worker_id, chunk }).await;
                Ok(false)
            }
            ChildEvent::Exited(worker_id) => {
                self.retire(worker_id);
                let _ = write_frame(writer, &RemoteEnvelope::SlaveExited { worker_id }).await;
                Ok(false)
            }
        }
    }

    fn retire(&mut self, worker_id: WorkerId) {
        if self.children.remove(&worker_id).is_some() {
            self.shared.active_slaves.fetch_sub(1, Ordering::SeqCst);
        }
        self.pending_exit.retain(|(w, _)| *w != worker_id);
    }

    async fn teardown(&mut self) {
        for (worker_id, child) in self.children.drain() {
            child.terminate().await;
            self.shared.active_slaves.fetch_sub(1, Ordering::SeqCst);
            let _ = worker_id;
        }
    }
}

fn spawn_kill_timer(
    child: Arc<ChildHandle>,
    after_ms: u64,
    worker_id: WorkerId,
    events: mpsc::UnboundedSender<ChildEvent>,
) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(after_ms)).await;
        child.terminate().await;
        let _ = events.send(ChildEvent::Exited(worker_id));
    });
}
