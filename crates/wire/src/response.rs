// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// `{message, stack, name}` error payload carried on an error-bearing
/// response (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub name: String,
}

impl WireErrorPayload {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into(), stack: None }
    }

    pub fn unknown_task(worker_id: u64, command: &str) -> Self {
        Self::new(
            "ReferenceError",
            format!("Slave #{worker_id} does not listen to task \"{command}\""),
        )
    }

    pub fn not_accepting_messages() -> Self {
        Self::new("Error", "NotAcceptingMessages")
    }
}

/// Wire form of a worker→controller Response (spec §6).
///
/// `title` is always the literal `"SlaveIOResponse"`. The controller
/// discards any frame whose echoed `secret_id`/`secret_number` doesn't
/// match its own `SecretPair`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub title: String,
    pub sent: u64,
    pub request: serde_json::Value,
    pub error: Option<WireErrorPayload>,
    pub data: serde_json::Value,
    pub secret_id: String,
    pub secret_number: u64,
}

impl WireResponse {
    pub const TITLE: &'static str = "SlaveIOResponse";

    pub fn ok(
        sent: u64,
        request: serde_json::Value,
        data: serde_json::Value,
        secret_id: String,
        secret_number: u64,
    ) -> Self {
        Self {
            title: Self::TITLE.to_string(),
            sent,
            request,
            error: None,
            data,
            secret_id,
            secret_number,
        }
    }

    pub fn err(
        sent: u64,
        request: serde_json::Value,
        error: WireErrorPayload,
        secret_id: String,
        secret_number: u64,
    ) -> Self {
        Self {
            title: Self::TITLE.to_string(),
            sent,
            request,
            error: Some(error),
            data: serde_json::Value::Null,
            secret_id,
            secret_number,
        }
    }

    pub fn has_worker_magic(&self) -> bool {
        self.title == Self::TITLE
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
