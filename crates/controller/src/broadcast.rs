// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast / tell (spec §4.6, component C7): fan one command out to a
//! resolved set of handles in parallel, aggregated ascending by
//! `from_worker_id`.

use distio_core::{Command, DioResult, RequestMeta};
use futures_util::future::join_all;

use crate::collections::HandleList;
use crate::response::{Response, ResponseArray};

/// Fan `command` out to every handle in `targets` concurrently.
///
/// An empty `targets` resolves an empty [`ResponseArray`] (spec §4.6,
/// §8 "broadcast to empty resolves empty"). If any individual send
/// rejects (e.g. a `catchAll` request whose worker errored), the whole
/// broadcast rejects with that error — matching the aggregate-future
/// semantics of the other orchestration patterns.
pub async fn broadcast(
    targets: &HandleList,
    command: Command,
    data: serde_json::Value,
    meta: RequestMeta,
) -> DioResult<ResponseArray> {
    if targets.is_empty() {
        return Ok(ResponseArray::new(Vec::new()));
    }

    let futures = targets.iter().map(|handle| {
        let command = command.clone();
        let data = data.clone();
        let meta = meta.clone();
        let handle = handle.clone();
        async move { handle.exec(command, data, meta).await }
    });

    let results: Vec<DioResult<Response>> = join_all(futures).await;
    let mut responses = Vec::with_capacity(results.len());
    for result in results {
        responses.push(result?);
    }
    Ok(ResponseArray::sorted_by_worker(responses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHandle;
    use distio_core::WorkerId;

    #[tokio::test]
    async fn empty_targets_resolve_empty() {
        let targets = HandleList::new();
        let result = broadcast(&targets, Command::Ack, serde_json::Value::Null, RequestMeta::default())
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn aggregates_sorted_by_worker_id() {
        let mut targets = HandleList::new();
        targets.push(MockHandle::echo(3, "c"));
        targets.push(MockHandle::echo(1, "a"));
        targets.push(MockHandle::echo(2, "b"));

        let result = broadcast(&targets, Command::user("echo"), serde_json::json!("x"), RequestMeta::default())
            .await
            .unwrap();

        let ids: Vec<u64> = result.iter().map(|r| r.from_worker_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(result.len(), 3);
        let _ = WorkerId(0);
    }

    #[tokio::test]
    async fn one_failing_handle_rejects_the_whole_broadcast() {
        let mut targets = HandleList::new();
        targets.push(MockHandle::echo(1, "a"));
        targets.push(MockHandle::scripted(2, "b", |_cmd, _data| {
            crate::test_support::Scripted::Err("boom".to_string())
        }));

        let meta = RequestMeta::default().with_catch_all(true);
        let err = broadcast(&targets, Command::user("echo"), serde_json::Value::Null, meta).await.unwrap_err();
        assert!(matches!(err, distio_core::DioError::WorkerError(_)));
    }
}
