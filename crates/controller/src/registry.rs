// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker registry (spec §4.5, component C6): indexes of live handles by
//! id, alias, group, and script path, consistent under one lock.

use std::collections::{HashMap, HashSet};

use distio_core::{DioError, DioResult, Target, WorkerId};
use parking_lot::RwLock;

use crate::collections::{Handle, HandleList};

/// A resolvable broadcast/workpool/parallel target (spec §9 "Dynamic
/// selectors"). Extends [`Target`] with a direct handle reference, since
/// `distio-core` has no I/O and can't name a handle type itself.
#[derive(Clone)]
pub enum Selector {
    Handle(Handle),
    Ref(Target),
    List(Vec<Selector>),
}

impl Selector {
    pub fn group(name: impl Into<String>) -> Self {
        Selector::Ref(Target::group(name))
    }

    pub fn list(selectors: impl IntoIterator<Item = Selector>) -> Self {
        Selector::List(selectors.into_iter().collect())
    }
}

impl From<Target> for Selector {
    fn from(target: Target) -> Self {
        Selector::Ref(target)
    }
}

impl From<Handle> for Selector {
    fn from(handle: Handle) -> Self {
        Selector::Handle(handle)
    }
}

impl From<WorkerId> for Selector {
    fn from(id: WorkerId) -> Self {
        Selector::Ref(Target::Id(id))
    }
}

impl From<&str> for Selector {
    fn from(alias: &str) -> Self {
        Selector::Ref(Target::alias(alias))
    }
}

impl From<String> for Selector {
    fn from(alias: String) -> Self {
        Selector::Ref(Target::alias(alias))
    }
}

#[derive(Default)]
struct Indexes {
    by_id: HashMap<WorkerId, Handle>,
    by_alias: HashMap<String, WorkerId>,
    by_group: HashMap<String, Vec<WorkerId>>,
    by_path: HashMap<String, Vec<WorkerId>>,
}

/// Indexes of every live worker handle in a controller (spec §3
/// "Registry", §4.5).
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Indexes>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly-spawned handle. Fails with `DuplicateAlias` if
    /// the alias is already in use by a live handle (spec §3 invariant 1).
    pub fn insert(&self, handle: Handle) -> DioResult<()> {
        let mut idx = self.inner.write();
        if idx.by_alias.contains_key(handle.alias()) {
            return Err(DioError::DuplicateAlias(handle.alias().to_string()));
        }
        let id = handle.id();
        idx.by_alias.insert(handle.alias().to_string(), id);
        idx.by_group.entry(handle.group().to_string()).or_default().push(id);
        idx.by_path.entry(handle.script_path().to_string()).or_default().push(id);
        idx.by_id.insert(id, handle);
        Ok(())
    }

    /// Remove a handle from all indexes. Called once a handle's state
    /// becomes `closed`/`exited`/`spawn-failed` (spec §3 invariant 3):
    /// "once set, the handle is removed from all registry indexes
    /// atomically" — this happens under the single write lock.
    pub fn remove(&self, id: WorkerId) {
        let mut idx = self.inner.write();
        let Some(handle) = idx.by_id.remove(&id) else { return };
        idx.by_alias.remove(handle.alias());
        if let Some(group) = idx.by_group.get_mut(handle.group()) {
            group.retain(|&wid| wid != id);
        }
        if let Some(paths) = idx.by_path.get_mut(handle.script_path()) {
            paths.retain(|&wid| wid != id);
        }
    }

    pub fn by_id(&self, id: WorkerId) -> Option<Handle> {
        self.inner.read().by_id.get(&id).cloned()
    }

    pub fn by_alias(&self, alias: &str) -> Option<Handle> {
        let idx = self.inner.read();
        idx.by_alias.get(alias).and_then(|id| idx.by_id.get(id).cloned())
    }

    pub fn in_group(&self, group: &str) -> HandleList {
        let idx = self.inner.read();
        idx.by_group.get(group).into_iter().flatten().filter_map(|id| idx.by_id.get(id).cloned()).collect()
    }

    pub fn not_in_group(&self, group: &str) -> HandleList {
        let idx = self.inner.read();
        idx.by_id.values().filter(|h| h.group() != group).cloned().collect()
    }

    pub fn with_path(&self, path: &str) -> HandleList {
        let idx = self.inner.read();
        idx.by_path.get(path).into_iter().flatten().filter_map(|id| idx.by_id.get(id).cloned()).collect()
    }

    pub fn all(&self) -> HandleList {
        self.inner.read().by_id.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    pub fn idle_count(&self) -> usize {
        self.inner.read().by_id.values().filter(|h| h.is_idle()).count()
    }

    pub fn busy_count(&self) -> usize {
        self.len() - self.idle_count()
    }

    pub fn idle_in_list(&self, handles: &HandleList) -> HandleList {
        handles.iter().filter(|h| h.is_idle()).cloned().collect()
    }

    pub fn least_busy_in_list(&self, handles: &HandleList) -> Option<Handle> {
        handles.iter().min_by_key(|h| h.stats().pending()).cloned()
    }

    /// Resolve a [`Selector`] to a deduplicated set of live handles
    /// (spec §9 "Dynamic selectors": "the resolver flattens to a
    /// deduplicated handle set against the registry").
    pub fn resolve(&self, selector: &Selector) -> HandleList {
        let mut seen = HashSet::new();
        let mut out = HandleList::new();
        self.resolve_into(selector, &mut out, &mut seen);
        out
    }

    fn resolve_into(&self, selector: &Selector, out: &mut HandleList, seen: &mut HashSet<WorkerId>) {
        match selector {
            Selector::Handle(handle) => {
                if seen.insert(handle.id()) {
                    out.push(handle.clone());
                }
            }
            Selector::Ref(target) => self.resolve_target_into(target, out, seen),
            Selector::List(list) => {
                for s in list {
                    self.resolve_into(s, out, seen);
                }
            }
        }
    }

    fn resolve_target_into(&self, target: &Target, out: &mut HandleList, seen: &mut HashSet<WorkerId>) {
        match target {
            Target::Id(id) => {
                if let Some(handle) = self.by_id(*id) {
                    if seen.insert(handle.id()) {
                        out.push(handle);
                    }
                }
            }
            Target::Alias(alias) => {
                if let Some(handle) = self.by_alias(alias) {
                    if seen.insert(handle.id()) {
                        out.push(handle);
                    }
                }
            }
            Target::Group(group) => {
                for handle in self.in_group(group) {
                    if seen.insert(handle.id()) {
                        out.push(handle);
                    }
                }
            }
            Target::List(list) => {
                for t in list {
                    self.resolve_target_into(t, out, seen);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
