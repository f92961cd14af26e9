// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request meta options recognized by the controller (spec §3).

use serde::{Deserialize, Serialize};

/// Options attached to a single request.
///
/// `timeout`/`catch_all` may also be set at handle or controller scope;
/// see [`RequestMeta::resolve_timeout_ms`] and
/// [`RequestMeta::resolve_catch_all`] for the precedence rules (spec §4.4).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Request-level TTL in milliseconds. `0` or absent means "use the
    /// next scope's default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// When true, a response carrying an error rejects the awaiting
    /// future instead of resolving with an error-bearing response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_all: Option<bool>,

    /// Scatter only: pre-batch payload size between workers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,
}

impl RequestMeta {
    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn with_catch_all(mut self, catch_all: bool) -> Self {
        self.catch_all = Some(catch_all);
        self
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = Some(chunk);
        self
    }

    /// Resolve the effective TTL: first non-zero of meta, handle default,
    /// controller default, else no timeout (spec §4.4 step 1).
    pub fn resolve_timeout_ms(
        &self,
        handle_default: Option<u64>,
        controller_default: Option<u64>,
    ) -> Option<u64> {
        [self.timeout, handle_default, controller_default]
            .into_iter()
            .flatten()
            .find(|&ms| ms != 0)
    }

    /// Resolve the effective catchAll policy: request meta overrides
    /// handle scope, which overrides controller scope. Default is off
    /// (spec §4.4).
    pub fn resolve_catch_all(&self, handle_scope: Option<bool>, controller_scope: bool) -> bool {
        self.catch_all.or(handle_scope).unwrap_or(controller_scope)
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
