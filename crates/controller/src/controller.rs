// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The explicit `Controller` value user code creates (spec §9 "Global
//! mutable controller": "Re-architect the core as an explicit `Controller`
//! value created by user code").
//!
//! Ties together the registry (C6), the dispatcher (C5), and the
//! spawn/connect entry points for local (C3) and remote (C4) handles.

use std::sync::Arc;

use distio_core::{DioResult, WorkerId, WorkerIdAllocator};
use futures_util::future::join_all;

use crate::broadcast::broadcast as broadcast_impl;
use crate::collections::{Handle, HandleList};
use crate::dispatcher::Dispatcher;
use crate::local::{LocalWorkerConfig, LocalWorkerHandle};
use crate::registry::{Registry, Selector};
use crate::remote::{RemoteWorkerConfig, RemoteWorkerHandle};
use crate::response::ResponseArray;
use distio_core::{Command, RequestMeta};

/// Controller-wide defaults (spec §4.4 "Resolve TTL": "the first
/// non-zero of `meta.timeout`, `handle.defaultTimeout`,
/// `controller.defaultTimeout`").
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    pub default_timeout_ms: Option<u64>,
    pub catch_all: bool,
}

/// The controller process's view of its fleet of workers: owns the
/// registry and the shared dispatcher, and is the entry point for
/// spawning local workers or connecting to remote proxy-hosted ones.
pub struct Controller {
    ids: WorkerIdAllocator,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Arc<Self> {
        Arc::new(Self {
            ids: WorkerIdAllocator::new(),
            registry: Arc::new(Registry::new()),
            dispatcher: Dispatcher::new(config.default_timeout_ms, config.catch_all),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Fork one local worker and register it (spec §4.2 "Spawn").
    pub async fn spawn_local(&self, config: LocalWorkerConfig) -> DioResult<Handle> {
        let id = self.ids.next();
        let handle = LocalWorkerHandle::spawn(id, config, Arc::clone(&self.dispatcher), &self.registry).await?;
        self.registry.insert(handle.clone())?;
        Ok(handle)
    }

    /// Fork `count` local workers from the same config, each with a
    /// distinct alias suffix. `count <= 0` returns an empty collection
    /// and performs no spawn (spec §8 "createSlaves(0|negative, path)
    /// returns an empty collection and performs no spawn").
    pub async fn spawn_local_many(&self, count: i64, mut config: LocalWorkerConfig) -> DioResult<HandleList> {
        if count <= 0 {
            return Ok(HandleList::new());
        }
        let base_alias = config.alias.clone();
        let mut handles = HandleList::new();
        for i in 0..count {
            config.alias = if base_alias.is_empty() { format!("worker-{i}") } else { format!("{base_alias}-{i}") };
            handles.push(self.spawn_local(config.clone()).await?);
        }
        Ok(handles)
    }

    /// Connect to a remote proxy server and register the resulting
    /// handle (spec §4.3 "Connect").
    pub async fn connect_remote(&self, config: RemoteWorkerConfig) -> DioResult<Handle> {
        let id = self.ids.next();
        let handle = RemoteWorkerHandle::connect(id, config, Arc::clone(&self.dispatcher), &self.registry).await?;
        self.registry.insert(handle.clone())?;
        Ok(handle)
    }

    /// Resolve `selector` against the registry and fan `command` out to
    /// every matching live handle (spec §4.6 "broadcast").
    pub async fn broadcast(
        &self,
        selector: Selector,
        command: Command,
        data: serde_json::Value,
        meta: RequestMeta,
    ) -> DioResult<ResponseArray> {
        let targets = self.registry.resolve(&selector);
        broadcast_impl(&targets, command, data, meta).await
    }

    pub fn by_id(&self, id: WorkerId) -> Option<Handle> {
        self.registry.by_id(id)
    }

    pub fn by_alias(&self, alias: &str) -> Option<Handle> {
        self.registry.by_alias(alias)
    }

    /// Close every live handle concurrently and return once all have
    /// reached `Exited`/`Closed` (SPEC_FULL.md "Structured shutdown").
    pub async fn shutdown(&self) {
        let handles = self.registry.all();
        let futures = handles.iter().map(|h| {
            let h = h.clone();
            async move {
                let _ = h.close().await;
            }
        });
        join_all(futures).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHandle;

    #[tokio::test]
    async fn broadcast_resolves_through_registry() {
        let controller = Controller::new(ControllerConfig::default());
        controller.registry().insert(MockHandle::echo(1, "a")).unwrap();
        controller.registry().insert(MockHandle::echo(2, "b")).unwrap();

        let result = controller
            .broadcast(Selector::group("global"), Command::Ack, serde_json::Value::Null, RequestMeta::default())
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn shutdown_closes_every_handle() {
        let controller = Controller::new(ControllerConfig::default());
        let a = MockHandle::echo(1, "a");
        let b = MockHandle::echo(2, "b");
        controller.registry().insert(a.clone()).unwrap();
        controller.registry().insert(b.clone()).unwrap();

        controller.shutdown().await;
        assert_eq!(a.state(), distio_core::WorkerState::Closed);
        assert_eq!(b.state(), distio_core::WorkerState::Closed);
    }
}
