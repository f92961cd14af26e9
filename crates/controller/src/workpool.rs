// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workpool (spec §4.7, component C8): an idle-aware round-robin
//! dispatcher with a pending-task queue.
//!
//! The scheduler is single-threaded-cooperative (spec §5): a `Mutex`
//! around the round-robin cursor and FIFO queue stands in for the
//! source's single-threaded event loop, and every completion re-ticks
//! the queue (spec §4.7 "each handle in S signals `response` on reply,
//! which re-ticks the queue").

use std::collections::VecDeque;
use std::sync::Arc;

use distio_core::{Command, DioError, DioResult, RequestMeta};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::collections::{Handle, HandleList};
use crate::response::{Response, ResponseArray};

struct Slot {
    command: Command,
    data: serde_json::Value,
    meta: RequestMeta,
    tx: oneshot::Sender<DioResult<Response>>,
}

struct State {
    handles: Vec<Handle>,
    cursor: usize,
    queue: VecDeque<Slot>,
    /// One outstanding request per handle from this workpool at most
    /// (spec §4.7 invariant), tracked independently of the handle's own
    /// `is_idle()` so that concurrent direct `exec` calls on the same
    /// handle don't starve the pool's own accounting.
    busy: Vec<bool>,
}

/// Idle-aware round-robin dispatcher over a fixed, non-empty set of
/// handles (spec §4.7).
pub struct Workpool {
    state: Mutex<State>,
}

impl Workpool {
    /// Construct a workpool over `handles`. `handles` must be non-empty
    /// (spec §4.7 "Construction: a non-empty set S of handles").
    pub fn new(handles: HandleList) -> DioResult<Arc<Self>> {
        let handles: Vec<Handle> = handles.into_vec();
        if handles.is_empty() {
            return Err(DioError::BadArgument("workpool requires at least one handle".to_string()));
        }
        let len = handles.len();
        Ok(Arc::new(Self {
            state: Mutex::new(State { handles, cursor: 0, queue: VecDeque::new(), busy: vec![false; len] }),
        }))
    }

    /// Enqueue one slot and return a future for its eventual response
    /// (spec §4.7 "do").
    pub async fn exec(
        self: &Arc<Self>,
        command: Command,
        data: serde_json::Value,
        meta: RequestMeta,
    ) -> DioResult<Response> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            state.queue.push_back(Slot { command, data, meta, tx });
        }
        self.tick();
        rx.await.map_err(|_| DioError::Disconnected)?
    }

    /// Repeatedly enqueue slots while `pred(i, responses_so_far)` holds,
    /// resolving once every enqueued slot has answered and the predicate
    /// has gone falsy (spec §4.7 "while(pred).do").
    pub async fn exec_while(
        self: &Arc<Self>,
        command: Command,
        data: serde_json::Value,
        meta: RequestMeta,
        mut pred: impl FnMut(usize, &[Response]) -> bool,
    ) -> DioResult<ResponseArray> {
        let mut responses = Vec::new();
        let mut i = 0usize;
        while pred(i, &responses) {
            let response = self.exec(command.clone(), data.clone(), meta.clone()).await?;
            responses.push(response);
            i += 1;
        }
        Ok(ResponseArray::new(responses))
    }

    /// Pop the next slot if an idle handle is available; otherwise leave
    /// the queue untouched (spec §4.7 "If no idle handle, the slot stays
    /// at head and the tick is a no-op").
    fn tick(self: &Arc<Self>) {
        let dispatch = {
            let mut state = self.state.lock();
            if state.queue.is_empty() {
                return;
            }
            let len = state.handles.len();
            let mut picked = None;
            for step in 0..len {
                let idx = (state.cursor + step) % len;
                if !state.busy[idx] && state.handles[idx].is_idle() {
                    picked = Some(idx);
                    break;
                }
            }
            let Some(idx) = picked else { return };
            let Some(slot) = state.queue.pop_front() else { return };
            state.cursor = (idx + 1) % len;
            state.busy[idx] = true;
            Some((idx, state.handles[idx].clone(), slot))
        };

        let Some((idx, handle, slot)) = dispatch else { return };
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let result = handle.exec(slot.command, slot.data, slot.meta).await;
            {
                let mut state = pool.state.lock();
                state.busy[idx] = false;
            }
            let _ = slot.tx.send(result);
            pool.tick();
        });
    }

    pub fn len(&self) -> usize {
        self.state.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHandle;

    fn pool_of_three() -> Arc<Workpool> {
        let mut handles = HandleList::new();
        handles.push(MockHandle::echo(1, "a"));
        handles.push(MockHandle::echo(2, "b"));
        handles.push(MockHandle::echo(3, "c"));
        Workpool::new(handles).unwrap()
    }

    #[tokio::test]
    async fn round_robins_across_three_workers_then_wraps() {
        let pool = pool_of_three();
        let mut ids = Vec::new();
        for _ in 0..4 {
            let response =
                pool.exec(Command::user("echo"), serde_json::json!("x"), RequestMeta::default()).await.unwrap();
            ids.push(response.from_worker_id.0);
        }
        assert_eq!(&ids[0..3], &[1, 2, 3]);
        assert_eq!(ids[3], 1);
    }

    #[tokio::test]
    async fn rejects_empty_handle_set() {
        let err = Workpool::new(HandleList::new()).unwrap_err();
        assert!(matches!(err, DioError::BadArgument(_)));
    }

    #[tokio::test]
    async fn while_collects_responses_until_predicate_false() {
        let pool = pool_of_three();
        let result = pool
            .exec_while(Command::user("echo"), serde_json::json!("x"), RequestMeta::default(), |i, _| i < 5)
            .await
            .unwrap();
        assert_eq!(result.len(), 5);
    }
}
