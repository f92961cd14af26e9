// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property: a Response survives encode→decode with no field drift
//! (spec §8 "Round-trip / idempotence"), excluding nothing here since the
//! secret pair is part of the typed struct (scrubbing happens at the
//! dispatcher layer, not the wire layer).

use distio_core::{Command, Rid, RequestMeta, WorkerId};
use proptest::prelude::*;

use crate::{WireErrorPayload, WireRequest, WireResponse};

fn arb_command() -> impl Strategy<Value = Command> {
    "[a-z]{1,12}".prop_map(Command::user)
}

proptest! {
    #[test]
    fn request_round_trips(
        rid in any::<u64>(),
        worker in any::<u64>(),
        command in arb_command(),
        created in any::<u64>(),
        sent in any::<u64>(),
        secret_number in any::<u64>(),
    ) {
        let req = WireRequest::new(
            Rid(rid),
            WorkerId(worker),
            command,
            serde_json::json!({"k": "v"}),
            RequestMeta::default().with_timeout(5),
            created,
            sent,
            "secret".to_string(),
            secret_number,
        );
        let json = serde_json::to_string(&req).unwrap();
        let decoded: WireRequest = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(decoded, req);
    }

    #[test]
    fn response_round_trips(
        sent in any::<u64>(),
        secret_number in any::<u64>(),
        has_error in any::<bool>(),
    ) {
        let resp = if has_error {
            WireResponse::err(
                sent,
                serde_json::json!({"rid": 1}),
                WireErrorPayload::new("Error", "boom"),
                "secret".to_string(),
                secret_number,
            )
        } else {
            WireResponse::ok(
                sent,
                serde_json::json!({"rid": 1}),
                serde_json::json!("value"),
                "secret".to_string(),
                secret_number,
            )
        };
        let json = serde_json::to_string(&resp).unwrap();
        let decoded: WireResponse = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(decoded, resp);
    }
}
