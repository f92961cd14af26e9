use super::*;
use crate::test_support::MockHandle;

#[test]
fn insert_and_lookup_by_id_and_alias() {
    let registry = Registry::new();
    let handle = MockHandle::echo(1, "bob");
    registry.insert(handle.clone()).unwrap();

    assert!(registry.by_id(WorkerId(1)).is_some());
    assert!(registry.by_alias("bob").is_some());
    assert_eq!(registry.len(), 1);
}

#[test]
fn duplicate_alias_is_rejected() {
    let registry = Registry::new();
    registry.insert(MockHandle::echo(1, "bob")).unwrap();
    let err = registry.insert(MockHandle::echo(2, "bob")).unwrap_err();
    assert_eq!(err, DioError::DuplicateAlias("bob".to_string()));
}

#[test]
fn remove_clears_every_index() {
    let registry = Registry::new();
    let handle = MockHandle::echo(1, "bob");
    registry.insert(handle).unwrap();
    registry.remove(WorkerId(1));

    assert!(registry.by_id(WorkerId(1)).is_none());
    assert!(registry.by_alias("bob").is_none());
    assert!(registry.is_empty());
}

#[test]
fn in_group_returns_only_matching_group() {
    let registry = Registry::new();
    registry.insert(MockHandle::echo(1, "a")).unwrap();
    registry.insert(MockHandle::echo(2, "b")).unwrap();
    // Mock handles default to "global"; both land in the same group.
    assert_eq!(registry.in_group("global").len(), 2);
    assert_eq!(registry.in_group("nonexistent").len(), 0);
}

#[test]
fn resolve_flattens_and_dedups() {
    let registry = Registry::new();
    let h1 = MockHandle::echo(1, "a");
    let h2 = MockHandle::echo(2, "b");
    registry.insert(h1.clone()).unwrap();
    registry.insert(h2.clone()).unwrap();

    let selector = Selector::list([
        Selector::from(WorkerId(1)),
        Selector::from("b"),
        Selector::group("global"),
    ]);
    let resolved = registry.resolve(&selector);
    assert_eq!(resolved.len(), 2);
}

#[test]
fn resolve_handle_selector_does_not_require_registration() {
    let registry = Registry::new();
    let handle = MockHandle::echo(9, "floating");
    let selector: Selector = (handle as Handle).into();
    let resolved = registry.resolve(&selector);
    assert_eq!(resolved.len(), 1);
}
