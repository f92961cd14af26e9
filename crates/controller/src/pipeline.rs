// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline (spec §4.9, component C9b): an ordered sequence of tasks
//! where each task's response feeds the next task's input.

use distio_core::{Command, DioError, DioResult, RequestMeta};

use crate::collections::Handle;
use crate::response::Response;

/// What an intercept does with the response it was handed
/// (spec §4.9 "may mutate ... throw ... or call `exit`").
pub enum Intercept {
    /// Forward `response.data` (possibly mutated) to the next task.
    Continue(serde_json::Value),
    /// Reject the pipeline.
    Throw(DioError),
    /// Short-circuit with this response value, skipping remaining tasks.
    ExitWith(serde_json::Value),
    /// Short-circuit with this error, skipping remaining tasks.
    ExitWithError(DioError),
}

pub type InterceptFn = Box<dyn Fn(&Response) -> Intercept + Send + Sync>;

/// One stage of a [`Pipeline`] (spec §4.9 "ordered sequence of
/// `(command, target-handle, optional-intercept(res, exit))`").
pub struct Stage {
    command: Command,
    meta: RequestMeta,
    handle: Option<Handle>,
    intercept: Option<InterceptFn>,
}

impl Stage {
    pub fn new(command: Command) -> Self {
        Self { command, meta: RequestMeta::default(), handle: None, intercept: None }
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

    pub fn intercept(mut self, f: InterceptFn) -> Self {
        self.intercept = Some(f);
        self
    }
}

/// An ordered sequence of stages, each feeding the next (spec §4.9).
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// `.addTask(command).for(handle)` — appended in declaration order,
    /// which is also the execution order (spec §5 "for pipeline, in
    /// task-declaration order").
    pub fn add_stage(&mut self, stage: Stage) -> &mut Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Feed `initial_data` to the first stage; each stage's (possibly
    /// intercepted) response value becomes the next stage's input
    /// (spec §4.9 "execute"). An empty pipeline resolves `None`
    /// (spec §4.9 "An empty pipeline resolves with `null`").
    pub async fn execute(&self, initial_data: serde_json::Value) -> DioResult<Option<Response>> {
        if self.stages.is_empty() {
            return Ok(None);
        }

        let mut payload = initial_data;
        let mut last: Option<Response> = None;
        for stage in &self.stages {
            let Some(handle) = &stage.handle else { return Err(DioError::MissingTarget) };
            let response = handle.exec(stage.command.clone(), payload, stage.meta.clone()).await?;

            let (next_payload, outcome) = match &stage.intercept {
                Some(intercept) => match intercept(&response) {
                    Intercept::Continue(value) => (value, None),
                    Intercept::Throw(err) => return Err(err),
                    Intercept::ExitWith(value) => {
                        let mut exited = response.clone();
                        exited.data = value;
                        (serde_json::Value::Null, Some(Ok(exited)))
                    }
                    Intercept::ExitWithError(err) => (serde_json::Value::Null, Some(Err(err))),
                },
                None => (response.data.clone(), None),
            };

            if let Some(outcome) = outcome {
                return outcome.map(Some);
            }

            payload = next_payload;
            last = Some(response);
        }
        Ok(last)
    }
}
