// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use distio_core::RequestMeta;

fn sample() -> WireRequest {
    WireRequest::new(
        Rid(1),
        WorkerId(2),
        Command::user("echo"),
        serde_json::json!("hi"),
        RequestMeta::default(),
        1000,
        1001,
        "secret".into(),
        42,
    )
}

#[test]
fn carries_the_controller_magic() {
    assert!(sample().has_controller_magic());
}

#[test]
fn wrong_title_fails_the_magic_check() {
    let mut req = sample();
    req.title = "SomethingElse".into();
    assert!(!req.has_controller_magic());
}

#[test]
fn round_trips_through_json() {
    let req = sample();
    let json = serde_json::to_string(&req).unwrap();
    let decoded: WireRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, req);
}

#[test]
fn echo_scrubs_secrets() {
    let echoed = sample().echo_without_secrets();
    assert!(echoed.get("secret_id").is_none());
    assert!(echoed.get("secret_number").is_none());
    assert_eq!(echoed["rid"], serde_json::json!(1));
}

#[test]
fn child_args_include_worker_identity() {
    let args = build_child_args(&["--foo".to_string()], WorkerId(5), "bob", None);
    assert_eq!(args, vec!["--foo", "--slave-id=5", "--slave-alias=bob"]);

    let args = build_child_args(&[], WorkerId(5), "bob", Some("title"));
    assert_eq!(args, vec!["--slave-id=5", "--slave-alias=bob", "--slave-title=title"]);
}
