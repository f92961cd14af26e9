// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types: worker ids, request/response correlation ids, and the
//! per-controller secret pair used to authenticate response frames.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Numeric id of a worker, unique within one controller process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates worker ids, starting at 1 and incrementing monotonically.
#[derive(Debug, Default)]
pub struct WorkerIdAllocator(AtomicU64);

impl WorkerIdAllocator {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> WorkerId {
        WorkerId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Request identifier, monotonic within a controller (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rid(pub u64);

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct RidAllocator(AtomicU64);

impl RidAllocator {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> Rid {
        Rid(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Response identifier, monotonic within a controller (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Txid(pub u64);

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct TxidAllocator(AtomicU64);

impl TxidAllocator {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> Txid {
        Txid(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Per-controller random tuple attached to every outbound `Request` and
/// echoed on every `Response`; frames whose echo doesn't match are dropped
/// as untrusted (spec §3, §9 "Private-symbol back-doors").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPair {
    pub secret_id: String,
    pub secret_number: u64,
}

impl SecretPair {
    /// Generate a new random secret pair for a controller instance.
    pub fn generate() -> Self {
        Self { secret_id: nanoid::nanoid!(12), secret_number: rand_u64() }
    }

    pub fn matches(&self, secret_id: &str, secret_number: u64) -> bool {
        self.secret_id == secret_id && self.secret_number == secret_number
    }
}

/// Small dependency-free random u64, good enough for an in-process
/// anti-spoofing nonce (not a cryptographic secret).
fn rand_u64() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
    let addr = &nanos as *const _ as u64;
    (nanos as u64) ^ addr.rotate_left(17) ^ 0x9E37_79B9_7F4A_7C15
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
