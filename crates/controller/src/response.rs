// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller-side `Response`/`ResponseArray` types (spec §3, §7).

use distio_core::{Command, Rid, Txid, WorkerId};
use distio_wire::WireErrorPayload;

/// `{message, stack, name}` error payload on a completed response
/// (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl From<WireErrorPayload> for ResponseError {
    fn from(payload: WireErrorPayload) -> Self {
        Self { name: payload.name, message: payload.message, stack: payload.stack }
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ResponseError {}

/// A completed request/response pair, or a controller-synthesized
/// timeout/disconnect (spec §3 "Response", "TimeoutResponse").
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub txid: Txid,
    pub rid: Rid,
    pub from_worker_id: WorkerId,
    pub command: Command,
    /// The originating request's `sent` timestamp — `duration_ms` is
    /// measured from here (SPEC_FULL.md Open Question 1).
    pub requested_at_ms: u64,
    pub received_ts: u64,
    pub data: serde_json::Value,
    pub error: Option<ResponseError>,
}

impl Response {
    /// `received_ts - request.sent_ts`, in milliseconds (SPEC_FULL.md
    /// Open Question 1 resolves the source's inconsistent units this way).
    pub fn duration_ms(&self) -> u64 {
        self.received_ts.saturating_sub(self.requested_at_ms)
    }

    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.name == "Timeout")
    }

    pub fn is_disconnected(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.name == "Disconnected")
    }

    /// Build the `TimeoutResponse` the controller synthesizes when a
    /// request's TTL elapses (spec §4.4 "Timeout").
    pub fn timeout(
        txid: Txid,
        rid: Rid,
        from_worker_id: WorkerId,
        command: Command,
        requested_at_ms: u64,
        received_ts: u64,
        timeout_ms: u64,
    ) -> Self {
        let message = format!(
            "Request #{} with command \"{}\" timed out after {}ms.",
            rid,
            command.wire_token(),
            timeout_ms
        );
        Self {
            txid,
            rid,
            from_worker_id,
            command,
            requested_at_ms,
            received_ts,
            data: serde_json::Value::Null,
            error: Some(ResponseError { name: "Timeout".to_string(), message, stack: None }),
        }
    }

    /// Built when a handle tears down with requests still pending
    /// (spec §4.4 "Cancellation on teardown").
    pub fn disconnected(
        txid: Txid,
        rid: Rid,
        from_worker_id: WorkerId,
        command: Command,
        requested_at_ms: u64,
        received_ts: u64,
    ) -> Self {
        Self {
            txid,
            rid,
            from_worker_id,
            command,
            requested_at_ms,
            received_ts,
            data: serde_json::Value::Null,
            error: Some(ResponseError {
                name: "Disconnected".to_string(),
                message: "worker disconnected".to_string(),
                stack: None,
            }),
        }
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Response: from={}, txid={}, rid={}, received={}, error={}",
            self.from_worker_id,
            self.txid,
            self.rid,
            self.received_ts,
            self.error.is_some()
        )
    }
}

/// Ordered collection of responses (spec §9 "Polymorphic collections").
///
/// Broadcast/scatter results are sorted by `from_worker_id` ascending
/// (spec §4.6, §5); pipeline/parallel/workpool results preserve
/// declaration/dispatch/completion order instead, so construction with
/// sorting is opt-in via [`ResponseArray::sorted_by_worker`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseArray(Vec<Response>);

impl ResponseArray {
    pub fn new(responses: Vec<Response>) -> Self {
        Self(responses)
    }

    /// Sorted by `from_worker_id` ascending, with a deterministic
    /// tie-break on `rid` (spec §4.6, §8 invariant).
    pub fn sorted_by_worker(mut responses: Vec<Response>) -> Self {
        responses.sort_by(|a, b| (a.from_worker_id, a.rid).cmp(&(b.from_worker_id, b.rid)));
        Self(responses)
    }

    pub fn values(&self) -> Vec<&serde_json::Value> {
        self.0.iter().map(|r| &r.data).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Response> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Response] {
        &self.0
    }
}

impl IntoIterator for ResponseArray {
    type Item = Response;
    type IntoIter = std::vec::IntoIter<Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Response> for ResponseArray {
    fn from_iter<I: IntoIterator<Item = Response>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distio_core::{Rid, Txid};

    fn resp(worker: u64, rid: u64) -> Response {
        Response {
            txid: Txid(1),
            rid: Rid(rid),
            from_worker_id: WorkerId(worker),
            command: Command::user("echo"),
            requested_at_ms: 0,
            received_ts: 10,
            data: serde_json::Value::Null,
            error: None,
        }
    }

    #[test]
    fn duration_is_received_minus_requested() {
        let r = resp(1, 1);
        assert_eq!(r.duration_ms(), 10);
    }

    #[test]
    fn sorted_by_worker_orders_ascending() {
        let array = ResponseArray::sorted_by_worker(vec![resp(3, 1), resp(1, 2), resp(2, 3)]);
        let ids: Vec<u64> = array.iter().map(|r| r.from_worker_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn timeout_message_matches_contract() {
        let r = Response::timeout(Txid(1), Rid(42), WorkerId(1), Command::user("sleep"), 0, 1, 1);
        assert_eq!(
            r.error.unwrap().message,
            "Request #42 with command \"sleep\" timed out after 1ms."
        );
    }

    #[test]
    fn display_matches_contract_shape() {
        let r = resp(7, 3);
        assert_eq!(r.to_string(), "Response: from=7, txid=1, rid=3, received=10, error=false");
    }
}
