// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handle-level events (SPEC_FULL.md "Handle events").
//!
//! Explicit Rust shape of the source system's `EventEmitter`-based
//! `stdout`/`stderr`/`uncaughtException`/`closed`/`exited` events
//! (spec §4.2, §4.3).

use tokio::sync::broadcast;

/// One event raised by a worker handle over its lifetime.
#[derive(Debug, Clone)]
pub enum HandleEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    UncaughtException { name: String, message: String },
    Closed,
    Exited,
}

/// Broadcast capacity for handle event subscribers.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Build a fresh event channel for a handle.
pub(crate) fn channel() -> (broadcast::Sender<HandleEvent>, broadcast::Receiver<HandleEvent>) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
