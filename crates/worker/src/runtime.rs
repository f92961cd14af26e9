// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker-side dispatch loop (spec §4.1, component C2).

use std::sync::Arc;

use distio_core::{Clock, Command, SystemClock, WorkerId};
use distio_wire::{read_frame, write_frame, ProtocolError, WireErrorPayload, WireException, WireRequest, WireResponse};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::handler::TaskInput;
use crate::registry::TaskRegistry;

/// Lifecycle state of the in-child runtime (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Running,
    Paused,
    Detaching,
}

/// Drives the request/response loop inside a worker process.
pub struct Runtime {
    worker_id: WorkerId,
    registry: TaskRegistry,
    state: Mutex<RuntimeState>,
    clock: Arc<dyn Clock>,
}

impl Runtime {
    pub fn new(worker_id: WorkerId, registry: TaskRegistry) -> Self {
        Self::with_clock(worker_id, registry, Arc::new(SystemClock))
    }

    pub fn with_clock(worker_id: WorkerId, registry: TaskRegistry, clock: Arc<dyn Clock>) -> Self {
        Self { worker_id, registry, state: Mutex::new(RuntimeState::Running), clock }
    }

    pub fn state(&self) -> RuntimeState {
        *self.state.lock()
    }

    /// New messages receive an immediate `NotAcceptingMessages` error
    /// while paused (spec §4.1).
    pub fn pause(&self) {
        let mut state = self.state.lock();
        if *state == RuntimeState::Running {
            *state = RuntimeState::Paused;
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        if *state == RuntimeState::Paused {
            *state = RuntimeState::Running;
        }
    }

    /// Run the dispatch loop until the stream closes or an EXIT is
    /// handled (after which the runtime is `detaching` and the loop
    /// returns once its final response is flushed).
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), ProtocolError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            if self.state() == RuntimeState::Detaching {
                return Ok(());
            }

            let request: WireRequest = match read_frame(&mut reader).await {
                Ok(req) => req,
                Err(ProtocolError::ConnectionClosed) => return Ok(()),
                Err(ProtocolError::Json(e)) => {
                    warn!(error = %e, "discarding malformed frame");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !request.has_controller_magic() {
                debug!("discarding frame without controller magic");
                continue;
            }

            match self.dispatch(request).await {
                Dispatched::Response(resp) => write_frame(&mut writer, &resp).await?,
                Dispatched::Exception(exc) => write_frame(&mut writer, &exc).await?,
                Dispatched::Discarded => {}
            }
        }
    }

    async fn dispatch(&self, request: WireRequest) -> Dispatched {
        if self.state() == RuntimeState::Detaching {
            return Dispatched::Discarded;
        }

        let echo = request.echo_without_secrets();
        let secret_id = request.secret_id.clone();
        let secret_number = request.secret_number;
        let sent = self.clock.epoch_ms();

        if self.state() == RuntimeState::Paused {
            return Dispatched::Response(WireResponse::err(
                sent,
                echo,
                WireErrorPayload::not_accepting_messages(),
                secret_id,
                secret_number,
            ));
        }

        match &request.command {
            Command::Ack => {
                let message = format!(
                    "Slave acknowledgement from={}, received={}, responded={}, started={}, uptime={}",
                    self.worker_id, sent, sent, sent, 0
                );
                Dispatched::Response(WireResponse::ok(
                    sent,
                    echo,
                    serde_json::json!({ "message": message }),
                    secret_id,
                    secret_number,
                ))
            }
            Command::Null => {
                Dispatched::Response(WireResponse::ok(sent, echo, serde_json::Value::Null, secret_id, secret_number))
            }
            Command::Exit => {
                *self.state.lock() = RuntimeState::Detaching;
                Dispatched::Response(WireResponse::ok(sent, echo, serde_json::Value::Null, secret_id, secret_number))
            }
            Command::RemoteKill(_) => {
                // Handled by the proxy/transport layer before reaching a worker
                // that only speaks the in-process contract; acknowledge so a
                // misrouted frame doesn't hang its caller.
                Dispatched::Response(WireResponse::ok(sent, echo, serde_json::Value::Null, secret_id, secret_number))
            }
            Command::User(name) => self.dispatch_user_task(name, request, echo, sent, secret_id, secret_number).await,
        }
    }

    async fn dispatch_user_task(
        &self,
        name: &str,
        request: WireRequest,
        echo: serde_json::Value,
        sent: u64,
        secret_id: String,
        secret_number: u64,
    ) -> Dispatched {
        let Some(task) = self.registry.get(name) else {
            return Dispatched::Response(WireResponse::err(
                sent,
                echo,
                WireErrorPayload::unknown_task(self.worker_id.0, name),
                secret_id,
                secret_number,
            ));
        };

        let input = TaskInput { data: request.data.clone(), meta: request.meta.clone(), raw_request: request };
        let worker_id = self.worker_id;

        // Run on a dedicated task so a panicking handler is caught as a
        // `JoinError` instead of taking down the whole dispatch loop,
        // mirroring "uncaught exception → out-of-band message, no rid
        // satisfied" (spec §4.1).
        match tokio::spawn(async move { task(input).await }).await {
            Ok(Ok(data)) => {
                Dispatched::Response(WireResponse::ok(sent, echo, data, secret_id, secret_number))
            }
            Ok(Err(task_error)) => Dispatched::Response(WireResponse::err(
                sent,
                echo,
                WireErrorPayload::new(task_error.name, task_error.message),
                secret_id,
                secret_number,
            )),
            Err(join_error) => Dispatched::Exception(WireException::new(
                worker_id,
                sent,
                WireErrorPayload::new("Error", join_error.to_string()),
            )),
        }
    }
}

enum Dispatched {
    Response(WireResponse),
    Exception(WireException),
    Discarded,
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
