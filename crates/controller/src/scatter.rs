// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scatter (spec §4.9b, component C9c): distribute a list of data items
//! round-robin (or pre-chunked) across a list of workers, exec each as
//! an independent request, and gather the responses.

use distio_core::{Command, DioError, DioResult, RequestMeta};
use futures_util::future::join_all;

use crate::collections::HandleList;
use crate::response::{Response, ResponseArray};

/// Distribute `items` across `workers` and gather all responses.
///
/// Empty `items` resolves an empty `ResponseArray`; empty `workers`
/// rejects with `NoTargets` (spec §4.9b). When `meta.chunk` is set,
/// items are pre-batched into contiguous chunks of that size, one chunk
/// per worker in round-robin order, before dispatch; otherwise each item
/// is its own request, round-robined one-by-one across `workers`
/// (spec §3 "`chunk`: scatter only — pre-batch payload between workers").
pub async fn scatter(
    task: Command,
    items: Vec<serde_json::Value>,
    workers: &HandleList,
    meta: RequestMeta,
) -> DioResult<ResponseArray> {
    if items.is_empty() {
        return Ok(ResponseArray::new(Vec::new()));
    }
    if workers.is_empty() {
        return Err(DioError::NoTargets);
    }

    let worker_list: Vec<_> = workers.iter().cloned().collect();
    let payloads: Vec<serde_json::Value> = match meta.chunk {
        Some(size) if size > 0 => items.chunks(size).map(|c| serde_json::Value::Array(c.to_vec())).collect(),
        _ => items,
    };

    let futures = payloads.into_iter().enumerate().map(|(i, payload)| {
        let handle = worker_list[i % worker_list.len()].clone();
        let task = task.clone();
        let meta = meta.clone();
        async move { handle.exec(task, payload, meta).await }
    });

    let results: Vec<DioResult<Response>> = join_all(futures).await;
    let mut responses = Vec::with_capacity(results.len());
    for result in results {
        responses.push(result?);
    }
    Ok(ResponseArray::new(responses))
}
