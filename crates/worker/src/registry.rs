// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task name → handler registry (spec §4.1).

use std::collections::HashMap;
use std::future::Future;

use distio_core::Command;

use crate::error::WorkerRuntimeError;
use crate::handler::{boxed, TaskFn, TaskInput, TaskOutcome};

/// Indexes registered tasks by name. Duplicate registration (including
/// registering a name that collides with the reserved sentinel namespace)
/// fails with `DuplicateTask`.
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskFn>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    /// A fresh registry with only the sentinel handlers pre-registered
    /// (ACK/NULL/EXIT are dispatched by the runtime directly and never
    /// go through this table; this constructor exists so `len()`/`names()`
    /// reflect only user tasks).
    pub fn new() -> Self {
        Self { tasks: HashMap::new() }
    }

    pub fn register<F, Fut>(&mut self, name: impl Into<String>, f: F) -> Result<(), WorkerRuntimeError>
    where
        F: Fn(TaskInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        let name = name.into();
        if Command::is_reserved(&name) {
            return Err(WorkerRuntimeError::DuplicateTask(name));
        }
        if self.tasks.contains_key(&name) {
            return Err(WorkerRuntimeError::DuplicateTask(name));
        }
        self.tasks.insert(name, boxed(f));
        Ok(())
    }

    pub(crate) fn get(&self, name: &str) -> Option<TaskFn> {
        self.tasks.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }
}
