// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parallel (spec §4.8, component C9a): a declarative bag of tasks,
//! each bound to a target handle, dispatched together and optionally
//! repeated.

use distio_core::{Command, DioError, DioResult, RequestMeta};
use futures_util::future::join_all;

use crate::collections::Handle;
use crate::response::{Response, ResponseArray};

/// One entry in a [`Parallel`] bag (spec §4.8 "`addTask(command, …).for(handle).times(n)`").
#[derive(Clone)]
pub struct Task {
    token: u64,
    command: Command,
    data: serde_json::Value,
    meta: RequestMeta,
    handle: Option<Handle>,
    times: u32,
}

impl Task {
    pub fn new(command: Command, data: serde_json::Value) -> Self {
        Self { token: 0, command, data, meta: RequestMeta::default(), handle: None, times: 1 }
    }

    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    /// `.for(handle)`.
    pub fn target(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// `.times(n)`.
    pub fn times(mut self, n: u32) -> Self {
        self.times = n.max(1);
        self
    }
}

/// A declarative bag of tasks dispatched together (spec §4.8).
#[derive(Default)]
pub struct Parallel {
    next_token: u64,
    tasks: Vec<Task>,
}

/// Result of [`Parallel::execute`]: a single round when no task repeats,
/// or one [`ResponseArray`] per round when any task's `times > 1`
/// (spec §4.8 "repeat the entire bag that many times and resolve with an
/// array-of-ResponseArray rounds").
pub enum ParallelResult {
    Single(ResponseArray),
    Rounds(Vec<ResponseArray>),
}

impl ParallelResult {
    pub fn into_rounds(self) -> Vec<ResponseArray> {
        match self {
            ParallelResult::Single(array) => vec![array],
            ParallelResult::Rounds(rounds) => rounds,
        }
    }
}

impl Parallel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the bag, returning a token usable with
    /// [`Parallel::remove_task`] (spec §4.8 "`addTask` ... appends").
    pub fn add_task(&mut self, mut task: Task) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        task.token = token;
        self.tasks.push(task);
        token
    }

    /// O(1) removal by token (spec §4.8 "`removeTask(token)` is O(1)").
    pub fn remove_task(&mut self, token: u64) {
        self.tasks.retain(|t| t.token != token);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Dispatch every task to its handle. Zero tasks resolves an empty
    /// `ResponseArray`; any task missing a handle rejects with
    /// `MissingTarget` before any send (spec §4.8 "execute").
    pub async fn execute(&self) -> DioResult<ParallelResult> {
        if self.tasks.is_empty() {
            return Ok(ParallelResult::Single(ResponseArray::new(Vec::new())));
        }
        for task in &self.tasks {
            if task.handle.is_none() {
                return Err(DioError::MissingTarget);
            }
        }

        let max_times = self.tasks.iter().map(|t| t.times).max().unwrap_or(1);
        if max_times <= 1 {
            let round = dispatch_round(&self.tasks).await?;
            return Ok(ParallelResult::Single(round));
        }

        let mut rounds = Vec::with_capacity(max_times as usize);
        for _ in 0..max_times {
            rounds.push(dispatch_round(&self.tasks).await?);
        }
        Ok(ParallelResult::Rounds(rounds))
    }
}

/// Dispatch every task in the bag once, in declaration order
/// (spec §5 "for parallel, in dispatch order per round").
async fn dispatch_round(tasks: &[Task]) -> DioResult<ResponseArray> {
    let futures = tasks.iter().map(|task| {
        let handle = task.handle.clone();
        let command = task.command.clone();
        let data = task.data.clone();
        let meta = task.meta.clone();
        async move {
            match handle {
                Some(handle) => handle.exec(command, data, meta).await,
                None => Err(DioError::MissingTarget),
            }
        }
    });
    let results: Vec<DioResult<Response>> = join_all(futures).await;
    let mut responses = Vec::with_capacity(results.len());
    for result in results {
        responses.push(result?);
    }
    Ok(ResponseArray::new(responses))
}
