// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds shared across the distio crates (spec §7).

use thiserror::Error;

/// Unified error type for distio operations.
///
/// `BadArgument` is the one kind callers should expect synchronously
/// (constructing a bad `Target`, a non-positive worker count, ...); every
/// other variant propagates through an awaited future.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DioError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("alias already in use: {0}")]
    DuplicateAlias(String),

    #[error("task already registered: {0}")]
    DuplicateTask(String),

    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("worker disconnected")]
    Disconnected,

    #[error(
        "Request #{rid} with command \"{command}\" timed out after {timeout_ms}ms."
    )]
    Timeout { rid: u64, command: String, timeout_ms: u64 },

    #[error("unauthorized")]
    Unauthorized,

    #[error("Slave #{worker_id} does not listen to task \"{command}\"")]
    UnknownTask { worker_id: u64, command: String },

    #[error("worker error: {0}")]
    WorkerError(String),

    #[error("operation on closed handle")]
    Closed,

    #[error("task has no target handle")]
    MissingTarget,

    #[error("no targets available")]
    NoTargets,

    #[error("not accepting messages")]
    NotAcceptingMessages,
}

pub type DioResult<T> = Result<T, DioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_matches_contract() {
        let err = DioError::Timeout { rid: 42, command: "sleep".into(), timeout_ms: 1 };
        assert_eq!(err.to_string(), "Request #42 with command \"sleep\" timed out after 1ms.");
    }

    #[test]
    fn unknown_task_message_matches_contract() {
        let err = DioError::UnknownTask { worker_id: 3, command: "frobnicate".into() };
        assert_eq!(err.to_string(), "Slave #3 does not listen to task \"frobnicate\"");
    }
}
