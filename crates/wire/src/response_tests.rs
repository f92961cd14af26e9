// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn ok_response_has_no_error() {
    let resp =
        WireResponse::ok(100, serde_json::json!({}), serde_json::json!("hi"), "s".into(), 1);
    assert!(resp.error.is_none());
    assert!(resp.has_worker_magic());
}

#[test]
fn unknown_task_error_matches_contract_message() {
    let payload = WireErrorPayload::unknown_task(3, "frobnicate");
    assert_eq!(payload.name, "ReferenceError");
    assert_eq!(payload.message, "Slave #3 does not listen to task \"frobnicate\"");
}

#[test]
fn round_trips_through_json() {
    let resp = WireResponse::err(
        100,
        serde_json::json!({"rid": 1}),
        WireErrorPayload::new("Error", "boom"),
        "s".into(),
        7,
    );
    let json = serde_json::to_string(&resp).unwrap();
    let decoded: WireResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, resp);
}
