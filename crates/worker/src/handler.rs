// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task handler plumbing.
//!
//! The source system models task completion as a `complete(result)`
//! callback passed into the handler. In Rust the handler's own returned
//! `Future` already *is* the completion mechanism, so a task is simply an
//! `async fn(TaskInput) -> TaskOutcome` (spec §9 "Chained... objects" /
//! SPEC_FULL.md Open Question 6).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use distio_core::RequestMeta;
use distio_wire::WireRequest;

/// Input handed to a task handler.
#[derive(Debug, Clone)]
pub struct TaskInput {
    pub data: serde_json::Value,
    pub meta: RequestMeta,
    pub raw_request: WireRequest,
}

/// A task either produces data or a named error.
pub type TaskOutcome = Result<serde_json::Value, TaskError>;

/// Error value a task handler can return; becomes the response's
/// `error: {message, stack, name}` payload (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    pub name: String,
    pub message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { name: "Error".to_string(), message: message.into() }
    }

    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into() }
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for TaskError {}

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Type-erased, cloneable task handler.
pub(crate) type TaskFn = Arc<dyn Fn(TaskInput) -> BoxFuture<TaskOutcome> + Send + Sync>;

/// Wrap a typed async function into a type-erased `TaskFn`.
pub(crate) fn boxed<F, Fut>(f: F) -> TaskFn
where
    F: Fn(TaskInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskOutcome> + Send + 'static,
{
    Arc::new(move |input| Box::pin(f(input)))
}
