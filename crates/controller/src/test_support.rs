// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory mock handle for exercising the orchestration patterns
//! without spawning real processes or sockets.

#![cfg(test)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use distio_core::{Command, DioError, DioResult, RequestMeta, Signal, WorkerId, WorkerState};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::events::{channel, HandleEvent};
use crate::handle::{Counters, WorkerHandleOps, WorkerStats};
use crate::response::Response;

/// A scripted reply a [`MockHandle`] gives for one `exec` call.
pub enum Scripted {
    Ok(serde_json::Value),
    Err(String),
    Delay(std::time::Duration, serde_json::Value),
}

pub struct MockHandle {
    id: WorkerId,
    alias: String,
    group: String,
    state: Mutex<WorkerState>,
    counters: Counters,
    txid: AtomicU64,
    events: broadcast::Sender<HandleEvent>,
    script: Mutex<Box<dyn FnMut(&str, &serde_json::Value) -> Scripted + Send>>,
}

impl MockHandle {
    /// Every call echoes its input data back as `{ value: data }`,
    /// matching the seed scenarios in spec §8.
    pub fn echo(id: u64, alias: &str) -> Arc<Self> {
        Self::scripted(id, alias, |_cmd, data| Scripted::Ok(data.clone()))
    }

    pub fn scripted(
        id: u64,
        alias: &str,
        f: impl FnMut(&str, &serde_json::Value) -> Scripted + Send + 'static,
    ) -> Arc<Self> {
        let (events, _) = channel();
        Arc::new(Self {
            id: WorkerId(id),
            alias: alias.to_string(),
            group: "global".to_string(),
            state: Mutex::new(WorkerState::Ready),
            counters: Counters::default(),
            txid: AtomicU64::new(1),
            events,
            script: Mutex::new(Box::new(f)),
        })
    }

}

#[async_trait]
impl WorkerHandleOps for MockHandle {
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
        "mock"
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
        _meta: RequestMeta,
    ) -> DioResult<Response> {
        if self.state().refuses_sends() {
            return Err(DioError::Closed);
        }
        self.counters.record_sent();
        let outcome = (self.script.lock())(&command.wire_token(), &data);
        let response = match outcome {
            Scripted::Ok(value) => Response {
                txid: distio_core::Txid(self.txid.fetch_add(1, Ordering::SeqCst)),
                rid: distio_core::Rid(0),
                from_worker_id: self.id,
                command,
                requested_at_ms: 0,
                received_ts: 1,
                data: value,
                error: None,
            },
            Scripted::Err(message) => Response {
                txid: distio_core::Txid(self.txid.fetch_add(1, Ordering::SeqCst)),
                rid: distio_core::Rid(0),
                from_worker_id: self.id,
                command,
                requested_at_ms: 0,
                received_ts: 1,
                data: serde_json::Value::Null,
                error: Some(crate::response::ResponseError {
                    name: "Error".to_string(),
                    message,
                    stack: None,
                }),
            },
            Scripted::Delay(duration, value) => {
                tokio::time::sleep(duration).await;
                Response {
                    txid: distio_core::Txid(self.txid.fetch_add(1, Ordering::SeqCst)),
                    rid: distio_core::Rid(0),
                    from_worker_id: self.id,
                    command,
                    requested_at_ms: 0,
                    received_ts: 1,
                    data: value,
                    error: None,
                }
            }
        };
        self.counters.record_received();
        Ok(response)
    }

    async fn close(&self) -> DioResult<bool> {
        let mut state = self.state.lock();
        if matches!(*state, WorkerState::Closed | WorkerState::Exited) {
            return Ok(true);
        }
        *state = WorkerState::Closed;
        Ok(true)
    }

    fn kill(&self, _signal: Signal) -> DioResult<()> {
        *self.state.lock() = WorkerState::Exited;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<HandleEvent> {
        self.events.subscribe()
    }
}
