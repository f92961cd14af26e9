// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn timeout_prefers_request_then_handle_then_controller() {
    let meta = RequestMeta::default().with_timeout(5);
    assert_eq!(meta.resolve_timeout_ms(Some(10), Some(20)), Some(5));

    let meta = RequestMeta::default();
    assert_eq!(meta.resolve_timeout_ms(Some(10), Some(20)), Some(10));
    assert_eq!(meta.resolve_timeout_ms(None, Some(20)), Some(20));
    assert_eq!(meta.resolve_timeout_ms(None, None), None);
}

#[test]
fn zero_timeout_is_skipped_in_favor_of_next_scope() {
    let meta = RequestMeta::default().with_timeout(0);
    assert_eq!(meta.resolve_timeout_ms(Some(0), Some(30)), Some(30));
}

#[test]
fn catch_all_precedence_request_over_handle_over_controller() {
    let meta = RequestMeta::default().with_catch_all(true);
    assert!(meta.resolve_catch_all(Some(false), false));

    let meta = RequestMeta::default();
    assert!(meta.resolve_catch_all(Some(true), false));
    assert!(!meta.resolve_catch_all(None, false));
    assert!(meta.resolve_catch_all(None, true));
}
