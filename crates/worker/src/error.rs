// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors raised by the worker-side runtime itself (spec §4.1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerRuntimeError {
    #[error("task already registered: {0}")]
    DuplicateTask(String),

    #[error("NotAcceptingMessages")]
    NotAcceptingMessages,

    #[error("Slave #{worker_id} does not listen to task \"{command}\"")]
    UnknownTask { worker_id: u64, command: String },
}
