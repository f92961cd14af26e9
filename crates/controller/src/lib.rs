// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! distio-controller: everything that runs in the controller process.
//!
//! Local (C3) and remote (C4) worker handles, the request dispatcher
//! (C5), the registry (C6), and the four orchestration patterns
//! (C7 broadcast, C8 workpool, C9a parallel, C9b pipeline, C9c scatter).

pub mod broadcast;
pub mod collections;
pub mod controller;
pub mod dispatcher;
pub mod events;
pub mod handle;
pub mod local;
pub mod parallel;
pub mod pipeline;
pub mod registry;
pub mod remote;
pub mod response;
pub mod scatter;
pub mod workpool;

#[cfg(test)]
mod test_support;

pub use broadcast::broadcast;
pub use collections::{sum, Handle, HandleList};
pub use controller::{Controller, ControllerConfig};
pub use events::HandleEvent;
pub use handle::{WorkerHandleOps, WorkerStats};
pub use local::{LocalWorkerConfig, LocalWorkerHandle, StdioMode};
pub use parallel::{Parallel, ParallelResult, Task};
pub use pipeline::{Intercept, InterceptFn, Pipeline, Stage};
pub use registry::{Registry, Selector};
pub use remote::{RemoteWorkerConfig, RemoteWorkerHandle};
pub use response::{Response, ResponseArray, ResponseError};
pub use scatter::scatter;
pub use workpool::Workpool;
