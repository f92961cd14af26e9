// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy ↔ controller transport envelope (spec §4.10, §6 "Remote transport").
//!
//! The proxy multiplexes several named events over one socket; each frame
//! carries a `kind` tag plus a typed payload, still framed with the same
//! length-prefixed codec as the local stdio transport.

use distio_core::WorkerId;
use serde::{Deserialize, Serialize};

use crate::response::WireErrorPayload;

/// `init` session-setup payload: how many workers to fork and with what
/// script/options (spec §6 "init (session setup: {count, path, options})").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitPayload {
    pub count: u32,
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Base64 (or, with a passphrase, AES-GCM-encrypted-then-base64)
    /// credential blob, present only when the proxy enforces basic auth
    /// (spec §4.10 "Authorization").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
}

/// One frame of the proxy↔controller multiplex (spec §6 "Remote transport").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RemoteEnvelope {
    Init(InitPayload),
    /// Sent once per forked worker in reply to `Init`, carrying the
    /// proxy-assigned id the session must address it by from then on
    /// (spec §4.3 "a server-assigned remote id").
    Ready { worker_id: WorkerId },
    /// Carries a Request (controller→proxy) or Response (proxy→controller)
    /// as an opaque JSON value — both directions share this one event name
    /// on the wire (spec §6).
    Message { worker_id: WorkerId, frame: serde_json::Value },
    Stdout { worker_id: WorkerId, chunk: Vec<u8> },
    Stderr { worker_id: WorkerId, chunk: Vec<u8> },
    SlaveExited { worker_id: WorkerId },
    SlaveClosed { worker_id: WorkerId },
    RemoteKilled { worker_id: WorkerId },
    /// A frame the proxy could not process: unknown worker id, missing
    /// fields. The session stays open (spec §4.10 invariant).
    Error(RemoteSlaveError),
    Disconnect,
}

/// Response to a malformed or unaddressable frame (spec §4.10 invariant:
/// "the session is not torn down").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSlaveError {
    pub worker_id: Option<WorkerId>,
    pub error: WireErrorPayload,
}

impl RemoteSlaveError {
    pub fn unknown_worker(worker_id: WorkerId) -> Self {
        Self {
            worker_id: Some(worker_id),
            error: WireErrorPayload::new("ReferenceError", format!("no such worker {worker_id}")),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self {
            worker_id: None,
            error: WireErrorPayload::new("TypeError", format!("missing field \"{field}\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let env = RemoteEnvelope::SlaveExited { worker_id: WorkerId(3) };
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"slave-exited\""));
        let decoded: RemoteEnvelope = serde_json::from_str(&json).unwrap();
        assert!(matches!(decoded, RemoteEnvelope::SlaveExited { worker_id } if worker_id == WorkerId(3)));
    }

    #[test]
    fn init_payload_omits_authorization_when_absent() {
        let init = InitPayload { count: 2, path: "worker.sh".to_string(), args: vec![], authorization: None };
        let json = serde_json::to_value(RemoteEnvelope::Init(init)).unwrap();
        assert!(json.get("authorization").is_none());
    }
}
