// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatcher (spec §4.4, component C5): correlation table, rid
//! allocation, and timeout timers, shared by every handle in a controller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use distio_core::{
    Clock, Command, DioError, DioResult, RequestMeta, Rid, RidAllocator, SecretPair, SystemClock,
    Txid, TxidAllocator, WorkerId,
};
use distio_wire::{WireRequest, WireResponse};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::response::{Response, ResponseError};

struct Pending {
    tx: oneshot::Sender<DispatchOutcome>,
    command: Command,
    requested_at_ms: u64,
    catch_all: bool,
    timeout_ms: Option<u64>,
    timer: Option<JoinHandle<()>>,
}

/// The resolved outcome of one correlated request, still untranslated
/// into a `DioResult` (spec §4.4 "catchAll policy").
pub(crate) enum DispatchOutcome {
    Response(Response),
    Rejected(ResponseError),
}

impl DispatchOutcome {
    pub(crate) fn into_result(self) -> DioResult<Response> {
        match self {
            DispatchOutcome::Response(r) => Ok(r),
            DispatchOutcome::Rejected(e) => Err(DioError::WorkerError(e.to_string())),
        }
    }
}

/// Shared per-controller correlation engine: rid/txid allocation, the
/// `(target-worker-id, rid) -> pending-request` table, and the
/// per-controller secret pair (spec §3 "Correlation table", §4.4).
pub struct Dispatcher {
    rid_alloc: RidAllocator,
    txid_alloc: TxidAllocator,
    clock: Arc<dyn Clock>,
    secret: SecretPair,
    default_timeout_ms: Option<u64>,
    catch_all: bool,
    pending: Mutex<HashMap<(WorkerId, Rid), Pending>>,
}

impl Dispatcher {
    pub fn new(default_timeout_ms: Option<u64>, catch_all: bool) -> Arc<Self> {
        Self::with_clock(Arc::new(SystemClock), default_timeout_ms, catch_all)
    }

    pub fn with_clock(
        clock: Arc<dyn Clock>,
        default_timeout_ms: Option<u64>,
        catch_all: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            rid_alloc: RidAllocator::new(),
            txid_alloc: TxidAllocator::new(),
            clock,
            secret: SecretPair::generate(),
            default_timeout_ms,
            catch_all,
            pending: Mutex::new(HashMap::new()),
        })
    }

    pub fn secret(&self) -> &SecretPair {
        &self.secret
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn pending_count_for(&self, worker: WorkerId) -> usize {
        self.pending.lock().keys().filter(|(w, _)| *w == worker).count()
    }

    /// Begin a request: allocate a rid, build the wire frame, install a
    /// correlation entry (and timeout timer if applicable), and return
    /// the frame plus a receiver for its eventual outcome (spec §4.4
    /// "Send" steps 1-2; step 3 — handing the frame to the transport —
    /// is the caller's job).
    pub(crate) fn begin(
        self: &Arc<Self>,
        target: WorkerId,
        command: Command,
        data: serde_json::Value,
        meta: RequestMeta,
        handle_default_timeout_ms: Option<u64>,
        handle_catch_all: Option<bool>,
    ) -> (WireRequest, oneshot::Receiver<DispatchOutcome>) {
        let rid = self.rid_alloc.next();
        let now = self.clock.epoch_ms();
        let timeout_ms = meta.resolve_timeout_ms(handle_default_timeout_ms, self.default_timeout_ms);
        let catch_all = meta.resolve_catch_all(handle_catch_all, self.catch_all);

        let request = WireRequest::new(
            rid,
            target,
            command.clone(),
            data,
            meta,
            now,
            now,
            self.secret.secret_id.clone(),
            self.secret.secret_number,
        );

        let (tx, rx) = oneshot::channel();
        let timer = timeout_ms.filter(|&ms| ms > 0).map(|ms| {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                dispatcher.fire_timeout(target, rid);
            })
        });

        let pending = Pending { tx, command, requested_at_ms: now, catch_all, timeout_ms, timer };
        self.pending.lock().insert((target, rid), pending);
        (request, rx)
    }

    /// Complete a pending request with the worker's response, applying
    /// the resolved `catchAll` policy (spec §4.4 "catchAll policy").
    /// Frames with no matching correlation entry (late timeout, replay,
    /// duplicate) are dropped silently.
    pub(crate) fn complete(&self, worker: WorkerId, wire_response: WireResponse) {
        let Some(rid) = wire_response.request.get("rid").and_then(|v| v.as_u64()).map(Rid) else {
            trace!(%worker, "response missing echoed rid, dropping");
            return;
        };
        let command = wire_response
            .request
            .get("command")
            .and_then(|v| v.as_str())
            .map(Command::from_wire_token)
            .unwrap_or(Command::Null);

        let Some(mut pending) = self.pending.lock().remove(&(worker, rid)) else {
            trace!(%worker, %rid, "no pending entry for response, dropping");
            return;
        };
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let now = self.clock.epoch_ms();
        let txid = self.txid_alloc.next();
        let outcome = match wire_response.error {
            Some(err) if pending.catch_all => DispatchOutcome::Rejected(err.into()),
            Some(err) => DispatchOutcome::Response(Response {
                txid,
                rid,
                from_worker_id: worker,
                command,
                requested_at_ms: pending.requested_at_ms,
                received_ts: now,
                data: wire_response.data,
                error: Some(err.into()),
            }),
            None => DispatchOutcome::Response(Response {
                txid,
                rid,
                from_worker_id: worker,
                command,
                requested_at_ms: pending.requested_at_ms,
                received_ts: now,
                data: wire_response.data,
                error: None,
            }),
        };
        let _ = pending.tx.send(outcome);
    }

    fn fire_timeout(&self, worker: WorkerId, rid: Rid) {
        let Some(pending) = self.pending.lock().remove(&(worker, rid)) else { return };
        let now = self.clock.epoch_ms();
        let response = Response::timeout(
            self.txid_alloc.next(),
            rid,
            worker,
            pending.command,
            pending.requested_at_ms,
            now,
            pending.timeout_ms.unwrap_or(0),
        );
        let _ = pending.tx.send(DispatchOutcome::Response(response));
    }

    /// Fail every pending request for a handle that has torn down
    /// (spec §4.4 "Cancellation on teardown").
    pub(crate) fn cancel_for_worker(&self, worker: WorkerId) {
        let mut pending = self.pending.lock();
        let keys: Vec<(WorkerId, Rid)> =
            pending.keys().filter(|(w, _)| *w == worker).copied().collect();
        for key in keys {
            if let Some(mut entry) = pending.remove(&key) {
                if let Some(timer) = entry.timer.take() {
                    timer.abort();
                }
                let now = self.clock.epoch_ms();
                let response = Response::disconnected(
                    self.txid_alloc.next(),
                    key.1,
                    worker,
                    entry.command,
                    entry.requested_at_ms,
                    now,
                );
                let _ = entry.tx.send(DispatchOutcome::Response(response));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distio_core::FakeClock;
    use distio_wire::{WireErrorPayload, WireRequest};

    fn dispatcher() -> Arc<Dispatcher> {
        Dispatcher::with_clock(Arc::new(FakeClock::new(0)), None, false)
    }

    #[tokio::test]
    async fn completes_a_successful_response() {
        let dispatcher = dispatcher();
        let worker = WorkerId(1);
        let (request, rx) =
            dispatcher.begin(worker, Command::user("echo"), serde_json::json!("hi"), RequestMeta::default(), None, None);

        let wire_response = WireResponse::ok(
            0,
            request.echo_without_secrets(),
            serde_json::json!("hi"),
            request.secret_id.clone(),
            request.secret_number,
        );
        dispatcher.complete(worker, wire_response);

        let outcome = rx.await.unwrap();
        let response = outcome.into_result().unwrap();
        assert_eq!(response.data, serde_json::json!("hi"));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn catch_all_rejects_instead_of_resolving() {
        let dispatcher = dispatcher();
        let worker = WorkerId(1);
        let meta = RequestMeta::default().with_catch_all(true);
        let (request, rx) =
            dispatcher.begin(worker, Command::user("boom"), serde_json::Value::Null, meta, None, None);

        let wire_response = WireResponse::err(
            0,
            request.echo_without_secrets(),
            WireErrorPayload::new("Error", "kaboom"),
            request.secret_id.clone(),
            request.secret_number,
        );
        dispatcher.complete(worker, wire_response);

        let outcome = rx.await.unwrap();
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, DioError::WorkerError(msg) if msg.contains("kaboom")));
    }

    #[tokio::test]
    async fn cancel_for_worker_disconnects_pending() {
        let dispatcher = dispatcher();
        let worker = WorkerId(2);
        let (_request, rx) = dispatcher.begin(
            worker,
            Command::user("echo"),
            serde_json::Value::Null,
            RequestMeta::default(),
            None,
            None,
        );
        dispatcher.cancel_for_worker(worker);
        let response = rx.await.unwrap().into_result().unwrap();
        assert!(response.is_disconnected());
    }

    #[tokio::test]
    async fn unmatched_response_is_dropped_without_panicking() {
        let dispatcher = dispatcher();
        let fake_request = WireRequest::new(
            Rid(999),
            WorkerId(1),
            Command::user("echo"),
            serde_json::Value::Null,
            RequestMeta::default(),
            0,
            0,
            dispatcher.secret().secret_id.clone(),
            dispatcher.secret().secret_number,
        );
        let wire_response = WireResponse::ok(
            0,
            fake_request.echo_without_secrets(),
            serde_json::Value::Null,
            fake_request.secret_id.clone(),
            fake_request.secret_number,
        );
        dispatcher.complete(WorkerId(1), wire_response);
        assert_eq!(dispatcher.pending_count_for(WorkerId(1)), 0);
    }
}
