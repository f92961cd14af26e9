// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker-handle contract shared by local (C3) and remote (C4)
//! handles (spec §4.2, §4.3 "Same public contract as C3").

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use distio_core::{Command, DioResult, RequestMeta, Signal, WorkerId, WorkerState};
use tokio::sync::broadcast;

use crate::events::HandleEvent;
use crate::response::Response;

/// Point-in-time `sent`/`received` counters (spec §3, §7 `toString`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub sent: u64,
    pub received: u64,
}

impl WorkerStats {
    /// `sent - received`, i.e. requests still in flight.
    pub fn pending(&self) -> u64 {
        self.sent.saturating_sub(self.received)
    }
}

/// Atomic `sent`/`received` counters, incremented by the handle
/// implementations around a request's lifecycle (spec §7 "Slave#received
/// ... Implement it as a true received counter" / SPEC_FULL.md Open
/// Question 3).
#[derive(Default)]
pub(crate) struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
}

impl Counters {
    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            sent: self.sent.load(Ordering::SeqCst),
            received: self.received.load(Ordering::SeqCst),
        }
    }
}

/// Controller-side object representing one worker, local or remote
/// (spec §4.2 "Local worker handle", §4.3 "Remote worker handle").
#[async_trait]
pub trait WorkerHandleOps: Send + Sync {
    fn id(&self) -> WorkerId;
    fn alias(&self) -> &str;
    fn group(&self) -> &str;
    fn script_path(&self) -> &str;
    fn state(&self) -> WorkerState;
    fn stats(&self) -> WorkerStats;

    /// `idle(handle)` per spec §4.5: `pending-count == 0 AND state ==
    /// ready`.
    fn is_idle(&self) -> bool {
        self.state() == WorkerState::Ready && self.stats().pending() == 0
    }

    async fn exec(
        &self,
        command: Command,
        data: serde_json::Value,
        meta: RequestMeta,
    ) -> DioResult<Response>;

    async fn ack(&self) -> DioResult<Response> {
        self.exec(Command::Ack, serde_json::Value::Null, RequestMeta::default()).await
    }

    async fn noop(&self) -> DioResult<Response> {
        self.exec(Command::Null, serde_json::Value::Null, RequestMeta::default()).await
    }

    /// Idempotent: the first call sends EXIT and waits for the reply;
    /// later calls observe the same in-flight (or already-resolved)
    /// outcome without sending anything new (spec §4.2 "Close protocol",
    /// §8 "close on an already-closed handle resolves true").
    async fn close(&self) -> DioResult<bool>;

    /// Forceful, no EXIT round-trip (spec §4.2 "Send").
    fn kill(&self, signal: Signal) -> DioResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<HandleEvent>;
}

impl std::fmt::Display for dyn WorkerHandleOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        write!(
            f,
            "Slave id={}, alias={}, sent={}, received={}",
            self.id(),
            self.alias(),
            stats.sent,
            stats.received
        )
    }
}
