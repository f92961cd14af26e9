// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use distio_core::WorkerId;
use serde::{Deserialize, Serialize};

use crate::response::WireErrorPayload;

/// Out-of-band exception, not tied to any `rid` (spec §4.1, §6).
///
/// Emitted when a worker's dispatch loop catches an error that isn't
/// attached to a pending request — it never satisfies a correlation
/// entry, and surfaces on the handle's `uncaughtException` event instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireException {
    pub title: String,
    pub from: WorkerId,
    pub sent: u64,
    pub error: WireErrorPayload,
}

impl WireException {
    pub const TITLE: &'static str = "SlaveIOException";

    pub fn new(from: WorkerId, sent: u64, error: WireErrorPayload) -> Self {
        Self { title: Self::TITLE.to_string(), from, sent, error }
    }

    pub fn has_worker_magic(&self) -> bool {
        self.title == Self::TITLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let exc = WireException::new(WorkerId(9), 123, WireErrorPayload::new("Error", "oops"));
        let json = serde_json::to_string(&exc).unwrap();
        let decoded: WireException = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, exc);
        assert!(decoded.has_worker_magic());
    }
}
