// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use distio_core::{Command, Rid, RequestMeta, WorkerId};
use serde::{Deserialize, Serialize};

/// Wire form of a controller→worker Request (spec §6).
///
/// `title` is always the literal `"MasterIOMessage"`; a worker discards any
/// frame whose title doesn't match, or that's missing `rid`/`for`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub title: String,
    pub rid: Rid,
    #[serde(rename = "for")]
    pub for_worker: WorkerId,
    pub command: Command,
    pub data: serde_json::Value,
    #[serde(default)]
    pub meta: RequestMeta,
    pub created: u64,
    pub sent: u64,
    pub secret_id: String,
    pub secret_number: u64,
}

impl WireRequest {
    pub const TITLE: &'static str = "MasterIOMessage";

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rid: Rid,
        for_worker: WorkerId,
        command: Command,
        data: serde_json::Value,
        meta: RequestMeta,
        created: u64,
        sent: u64,
        secret_id: String,
        secret_number: u64,
    ) -> Self {
        Self {
            title: Self::TITLE.to_string(),
            rid,
            for_worker,
            command,
            data,
            meta,
            created,
            sent,
            secret_id,
            secret_number,
        }
    }

    /// A frame is processable iff it carries the controller magic: the
    /// correct title plus rid/for fields present (guaranteed by the
    /// typed struct; this just checks the title, since serde already
    /// requires `rid`/`for` to deserialize at all) (spec §4.1).
    pub fn has_controller_magic(&self) -> bool {
        self.title == Self::TITLE
    }

    /// Echo of this request with secrets scrubbed, embedded in the
    /// `WireResponse` (spec §6).
    pub fn echo_without_secrets(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "rid": self.rid,
            "for": self.for_worker,
            "command": self.command.wire_token(),
            "data": self.data,
            "meta": self.meta,
            "created": self.created,
            "sent": self.sent,
        })
    }
}

/// Build the CLI arguments appended to a worker script invocation
/// (spec §6 "Worker CLI arguments").
pub fn build_child_args(
    user_args: &[String],
    worker_id: WorkerId,
    alias: &str,
    title: Option<&str>,
) -> Vec<String> {
    let mut args: Vec<String> = user_args.to_vec();
    args.push(format!("--slave-id={}", worker_id));
    args.push(format!("--slave-alias={}", alias));
    if let Some(title) = title {
        args.push(format!("--slave-title={}", title));
    }
    args
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
