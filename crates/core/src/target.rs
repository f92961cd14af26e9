// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast/workpool/parallel target selectors (spec §9 "Dynamic selectors").
//!
//! The source library accepted a handle, a numeric id, a string alias, a
//! group name, or a collection of any of those via duck typing. Here it's a
//! single sum type; resolving it against a registry (done in
//! `distio-controller`) always flattens to a deduplicated handle set.

use crate::id::WorkerId;

/// Something that can be resolved to a set of worker handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(WorkerId),
    Alias(String),
    Group(String),
    List(Vec<Target>),
}

impl Target {
    pub fn id(id: WorkerId) -> Self {
        Target::Id(id)
    }

    pub fn alias(alias: impl Into<String>) -> Self {
        Target::Alias(alias.into())
    }

    pub fn group(name: impl Into<String>) -> Self {
        Target::Group(name.into())
    }

    pub fn list(targets: impl IntoIterator<Item = Target>) -> Self {
        Target::List(targets.into_iter().collect())
    }
}

impl From<WorkerId> for Target {
    fn from(id: WorkerId) -> Self {
        Target::Id(id)
    }
}

impl From<&str> for Target {
    fn from(alias: &str) -> Self {
        Target::Alias(alias.to_string())
    }
}

impl From<String> for Target {
    fn from(alias: String) -> Self {
        Target::Alias(alias)
    }
}
